//! vault-convert - Streaming conversion of secret store data between a
//! Consul KV export and a filesystem storage tree
//!
//! Two on-disk representations of the same key/value records:
//!
//! - **Array format**: one JSON document holding an array of
//!   `{"Key": .., "Value": <base64>}` objects, as produced by
//!   `consul kv export` and consumed by `consul kv import`.
//! - **Tree format**: one file per record, at `<root>/<dirs>/_<leaf>`, as
//!   used by the filesystem storage backend.
//!
//! ## Pipeline
//!
//! ```text
//! tree  ──► Walker ──► Record ──► add_prefix ──► ArrayWriter ──► array
//! array ──► ArrayReader ──► Record ──► strip_prefix ──► TreeBackend ──► tree
//! ```
//!
//! Records stream through one at a time in both directions, so neither the
//! array nor the tree is ever held in memory as a whole.
//!
//! ## Example
//!
//! ```no_run
//! use vault_convert::convert::{array_to_tree, tree_to_array, ConvertOptions};
//! use std::path::Path;
//!
//! let options = ConvertOptions::default(); // key prefix "vault"
//! tree_to_array(Path::new("/var/lib/vault"), Path::new("vault.json"), &options).unwrap();
//! array_to_tree(Path::new("vault.json"), Path::new("/tmp/restored"), &options).unwrap();
//! ```

pub mod array;
pub mod backend;
pub mod cli;
pub mod compress;
pub mod convert;
pub mod error;
pub mod key;
pub mod record;
pub mod walker;

pub use array::{ArrayEntry, ArrayReader, ArrayWriter};
pub use backend::{Backend, EntryEncoding, TreeBackend};
pub use compress::Compression;
pub use convert::{array_to_tree, tree_to_array, ConvertOptions, ConvertSummary};
pub use error::{ConvertError, ErrorKind, Result};
pub use record::Record;
pub use walker::{WalkEntry, Walker};
