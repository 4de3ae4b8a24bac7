use crate::backend::{Backend, EntryEncoding, TreeBackend};
use crate::compress::decompress;
use crate::error::{ConvertError, Result};
use std::path::Path;

/// Options for the read command
#[derive(Debug, Clone)]
pub struct ReadOptions {
    pub encoding: EntryEncoding,
    /// Undo value compression when the value carries a compression canary
    pub decompress: bool,
    /// Return the value byte-for-byte instead of a hex dump
    pub verbatim: bool,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            encoding: EntryEncoding::default(),
            decompress: true,
            verbatim: false,
        }
    }
}

/// Read the value stored at `key` in a tree
pub fn read_value(tree: &Path, key: &str, options: &ReadOptions) -> Result<Vec<u8>> {
    let backend = TreeBackend::open(tree, options.encoding)?;
    let value = backend
        .get(key)?
        .ok_or_else(|| ConvertError::NotFound(key.to_string()))?;

    let value = if options.decompress {
        decompress(&value)?.unwrap_or(value)
    } else {
        value
    };

    if options.verbatim {
        Ok(value)
    } else {
        Ok(hex_dump(&value).into_bytes())
    }
}

/// Canonical hex+ASCII dump, 16 bytes per line
pub fn hex_dump(data: &[u8]) -> String {
    let mut output = String::new();

    for (line, chunk) in data.chunks(16).enumerate() {
        output.push_str(&format!("{:08x}  ", line * 16));
        for i in 0..16 {
            match chunk.get(i) {
                Some(b) => {
                    output.push_str(&hex::encode([*b]));
                    output.push(' ');
                }
                None => output.push_str("   "),
            }
            if i == 7 || i == 15 {
                output.push(' ');
            }
        }

        output.push('|');
        for &b in chunk {
            output.push(if (32..=126).contains(&b) { b as char } else { '.' });
        }
        output.push_str("|\n");
    }
    output
}
