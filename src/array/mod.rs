//! Streaming access to a JSON array of key/value objects, the format written
//! by `consul kv export`:
//!
//! ```text
//! [
//! 	{
//! 		"Key": "vault/core/seal-config",
//! 		"Value": "eyJ0eXBlIjoic2hhbWlyIn0="
//! 	}
//! ]
//! ```
//!
//! Neither side holds more than one element in memory.

pub mod reader;
pub mod writer;

pub use reader::*;
pub use writer::*;

use crate::error::Result;
use crate::record::Record;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

/// One element of the array as it appears on the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArrayEntry {
    #[serde(rename = "Key", alias = "key")]
    pub key: String,
    /// Standard base64 with padding
    #[serde(
        rename = "Value",
        alias = "value",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub value: Option<String>,
}

impl ArrayEntry {
    pub fn from_record(record: &Record) -> Self {
        Self {
            key: record.key.clone(),
            value: Some(STANDARD.encode(&record.value)),
        }
    }

    /// Decode the base64 value. A missing or null value decodes as empty.
    pub fn into_record(self) -> Result<Record> {
        let value = match self.value {
            Some(encoded) => STANDARD.decode(encoded.as_bytes())?,
            None => Vec::new(),
        };
        Ok(Record::new(self.key, value))
    }
}
