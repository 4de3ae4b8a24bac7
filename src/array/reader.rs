use crate::array::ArrayEntry;
use crate::error::{ConvertError, Result};
use crate::record::Record;
use std::io::BufRead;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Position {
    /// Just past `[`
    First,
    /// Just past an element
    Rest,
    /// Past the closing `]`
    Done,
}

/// Incremental reader for a top-level JSON array of key/value objects.
///
/// Each call to [`ArrayReader::next`] frames exactly one object from the
/// input and decodes it; the array as a whole is never buffered. Reading
/// stops at the closing `]`, so anything after the array is left unread in
/// the underlying stream.
pub struct ArrayReader<R> {
    input: R,
    position: Position,
    object: Vec<u8>,
}

impl<R: BufRead> ArrayReader<R> {
    /// Consume leading whitespace and the opening `[`
    pub fn open(mut input: R) -> Result<Self> {
        skip_whitespace(&mut input)?;
        match peek(&mut input)? {
            Some(b'[') => input.consume(1),
            Some(other) => {
                return Err(ConvertError::InvalidFormat(format!(
                    "expected JSON token '[', got {:?}",
                    char::from(other)
                )))
            }
            None => {
                return Err(ConvertError::InvalidFormat(
                    "expected JSON token '[', got end of input".into(),
                ))
            }
        }

        Ok(Self {
            input,
            position: Position::First,
            object: Vec::new(),
        })
    }

    /// Decode the next element, or `None` once the closing `]` has been read
    pub fn next(&mut self) -> Result<Option<Record>> {
        match self.next_entry()? {
            Some(entry) => entry.into_record().map(Some),
            None => Ok(None),
        }
    }

    /// Next element without base64-decoding its value
    pub fn next_entry(&mut self) -> Result<Option<ArrayEntry>> {
        if self.position == Position::Done {
            return Ok(None);
        }

        skip_whitespace(&mut self.input)?;
        match (self.position, peek(&mut self.input)?) {
            (_, Some(b']')) => {
                self.input.consume(1);
                self.position = Position::Done;
                return Ok(None);
            }
            (Position::Rest, Some(b',')) => {
                self.input.consume(1);
                skip_whitespace(&mut self.input)?;
            }
            (Position::Rest, Some(other)) => {
                return Err(ConvertError::InvalidFormat(format!(
                    "expected ',' or ']' after array element, got {:?}",
                    char::from(other)
                )))
            }
            (_, None) => return Err(unexpected_end()),
            _ => {}
        }

        match peek(&mut self.input)? {
            Some(b'{') => {}
            Some(other) => {
                return Err(ConvertError::InvalidFormat(format!(
                    "expected a JSON object, got {:?}",
                    char::from(other)
                )))
            }
            None => return Err(unexpected_end()),
        }

        self.frame_object()?;
        let entry: ArrayEntry = serde_json::from_slice(&self.object)?;
        self.position = Position::Rest;
        Ok(Some(entry))
    }

    /// Give back the underlying stream, positioned after the last byte read
    pub fn into_inner(self) -> R {
        self.input
    }

    /// Copy one balanced `{...}` value into `self.object`
    fn frame_object(&mut self) -> Result<()> {
        let Self { input, object, .. } = self;
        object.clear();

        let mut depth = 0usize;
        let mut in_string = false;
        let mut escaped = false;

        loop {
            let chunk = input.fill_buf()?;
            if chunk.is_empty() {
                return Err(unexpected_end());
            }

            let mut end = None;
            for (i, &b) in chunk.iter().enumerate() {
                if in_string {
                    if escaped {
                        escaped = false;
                    } else if b == b'\\' {
                        escaped = true;
                    } else if b == b'"' {
                        in_string = false;
                    }
                    continue;
                }
                match b {
                    b'"' => in_string = true,
                    b'{' | b'[' => depth += 1,
                    b'}' | b']' => {
                        depth -= 1;
                        if depth == 0 {
                            end = Some(i + 1);
                            break;
                        }
                    }
                    _ => {}
                }
            }

            let used = end.unwrap_or(chunk.len());
            object.extend_from_slice(&chunk[..used]);
            input.consume(used);
            if end.is_some() {
                return Ok(());
            }
        }
    }
}

fn unexpected_end() -> ConvertError {
    ConvertError::InvalidFormat("unexpected end of input inside JSON array".into())
}

fn peek<R: BufRead>(input: &mut R) -> Result<Option<u8>> {
    Ok(input.fill_buf()?.first().copied())
}

fn skip_whitespace<R: BufRead>(input: &mut R) -> Result<()> {
    while let Some(b' ' | b'\t' | b'\n' | b'\r') = peek(input)? {
        input.consume(1);
    }
    Ok(())
}
