use crate::error::{ConvertError, Result};

/// One key/value pair in flight between a source and a sink.
/// Keys are `/`-delimited paths; values are opaque bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub key: String,
    pub value: Vec<u8>,
}

impl Record {
    pub fn new(key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Reject records with an empty key or an empty value
    pub fn validate(&self) -> Result<()> {
        if self.key.is_empty() {
            return Err(ConvertError::EmptyKey);
        }
        if self.value.is_empty() {
            return Err(ConvertError::EmptyValue);
        }
        Ok(())
    }
}
