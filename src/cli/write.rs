use crate::backend::{Backend, EntryEncoding, TreeBackend};
use crate::compress::{compress, Compression};
use crate::error::Result;
use crate::record::Record;
use std::fs;
use std::io::Read;
use std::path::Path;
use tracing::debug;

/// Options for the write command
#[derive(Debug, Clone, Default)]
pub struct WriteOptions {
    pub encoding: EntryEncoding,
    /// Compress the value before storing it
    pub compress: Option<Compression>,
}

/// Resolve the value to write: `--data foo` is the literal `foo`,
/// `--data @foo` is the content of file `foo`, and no data reads `input`
pub fn load_value<R: Read>(data: Option<&str>, mut input: R) -> Result<Vec<u8>> {
    match data {
        Some(spec) => match spec.strip_prefix('@') {
            Some(file) => Ok(fs::read(file)?),
            None => Ok(spec.as_bytes().to_vec()),
        },
        None => {
            let mut value = Vec::new();
            input.read_to_end(&mut value)?;
            Ok(value)
        }
    }
}

/// Store `value` at `key` in an existing tree, replacing any previous value
pub fn write_value(tree: &Path, key: &str, value: Vec<u8>, options: &WriteOptions) -> Result<()> {
    let mut backend = TreeBackend::open(tree, options.encoding)?;

    let value = match options.compress {
        Some(algorithm) => compress(&value, algorithm)?,
        None => value,
    };

    let record = Record::new(key, value);
    record.validate()?;
    backend.put(&record)?;
    debug!(key, bytes = record.value.len(), "stored value");
    Ok(())
}
