use crate::array::ArrayEntry;
use crate::error::Result;
use crate::record::Record;
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use std::io::{BufWriter, Write};
use tracing::warn;

/// Incremental writer for a JSON array of key/value objects.
///
/// Output layout matches `consul kv export`: one element per block, each
/// object tab-indented one level inside the array.
pub struct ArrayWriter<W: Write> {
    output: BufWriter<W>,
    scratch: Vec<u8>,
    count: u64,
    closed: bool,
}

impl<W: Write> ArrayWriter<W> {
    /// Emit the opening `[`
    pub fn open(output: W) -> Result<Self> {
        let mut output = BufWriter::new(output);
        output.write_all(b"[\n")?;
        Ok(Self {
            output,
            scratch: Vec::new(),
            count: 0,
            closed: false,
        })
    }

    /// Append one element. The element is serialized in full before any of
    /// it reaches the output, so a failure never leaves a dangling separator.
    pub fn write(&mut self, record: &Record) -> Result<()> {
        let entry = ArrayEntry::from_record(record);

        self.scratch.clear();
        let mut serializer = serde_json::Serializer::with_formatter(
            &mut self.scratch,
            PrettyFormatter::with_indent(b"\t"),
        );
        entry.serialize(&mut serializer)?;

        let separator: &[u8] = if self.count == 0 { b"\t" } else { b",\n\t" };
        self.output.write_all(separator)?;
        for (i, line) in self.scratch.split(|&b| b == b'\n').enumerate() {
            if i > 0 {
                self.output.write_all(b"\n\t")?;
            }
            self.output.write_all(line)?;
        }

        self.count += 1;
        Ok(())
    }

    /// Emit the closing `]` and flush. Safe to call more than once; only
    /// the first call writes anything.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let trailer: &[u8] = if self.count == 0 { b"]\n" } else { b"\n]\n" };
        self.output.write_all(trailer)?;
        self.output.flush()?;
        Ok(())
    }
}

impl<W: Write> Drop for ArrayWriter<W> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("failed to close JSON array output: {}", e);
        }
    }
}
