use crate::backend::{Backend, EntryEncoding, TreeBackend};
use crate::error::Result;
use std::path::Path;

/// Options for the list command
#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    pub encoding: EntryEncoding,
}

/// List the direct children of `prefix` in a tree, one per line
pub fn list_keys(tree: &Path, prefix: &str, options: &ListOptions) -> Result<String> {
    let backend = TreeBackend::open(tree, options.encoding)?;
    let keys = backend.list(prefix)?;

    let mut output = String::new();
    for key in keys {
        output.push_str(&key);
        output.push('\n');
    }
    Ok(output)
}
