//! Directory-tree storage backend: one file per key.
//!
//! Layout follows the filesystem storage backend of the secret store:
//! `<root>/<key dirs>/_<key leaf>`. Directories are created owner-only
//! (0700) and files owner read-write (0600).

use crate::array::ArrayEntry;
use crate::error::{ConvertError, Result};
use crate::key::{key_to_relative_path, relative_path_to_key, LEAF_MARKER};
use crate::record::Record;
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// How a value is laid out inside its leaf file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EntryEncoding {
    /// File content is the value bytes, key comes from the path
    #[default]
    Raw,
    /// File content is a `{"Key":..,"Value":<base64>}` envelope
    Json,
}

impl std::str::FromStr for EntryEncoding {
    type Err = ConvertError;
    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "raw" => Ok(Self::Raw),
            "json" => Ok(Self::Json),
            _ => Err(ConvertError::InvalidConfig(format!("entry encoding: {}", s))),
        }
    }
}

/// Minimal key/value storage interface
pub trait Backend {
    /// Store a record, replacing any previous value
    fn put(&mut self, record: &Record) -> Result<()>;

    /// Value stored at `key`, or `None` if absent
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Direct children of `prefix`; sub-trees carry a trailing `/`
    fn list(&self, prefix: &str) -> Result<Vec<String>>;
}

/// [`Backend`] over a directory tree
#[derive(Debug, Clone)]
pub struct TreeBackend {
    root: PathBuf,
    encoding: EntryEncoding,
}

impl TreeBackend {
    /// Open an existing tree
    pub fn open(root: &Path, encoding: EntryEncoding) -> Result<Self> {
        let meta = fs::metadata(root)?;
        if !meta.is_dir() {
            return Err(ConvertError::InvalidConfig(format!(
                "{} is not a directory",
                root.display()
            )));
        }
        Ok(Self {
            root: root.to_path_buf(),
            encoding,
        })
    }

    /// Open a tree for writing, creating the root if needed and tightening
    /// its permissions to owner-only
    pub fn create(root: &Path, encoding: EntryEncoding) -> Result<Self> {
        create_private_dir_all(root)?;
        set_private_mode(root)?;
        Ok(Self {
            root: root.to_path_buf(),
            encoding,
        })
    }

    /// Decode the leaf file at `path` (a path under the root, as produced by
    /// walking the tree) into a record
    pub fn read_leaf(&self, path: &Path) -> Result<Record> {
        let relative = path.strip_prefix(&self.root).map_err(|_| {
            ConvertError::InvalidKey(format!(
                "{} is outside {}",
                path.display(),
                self.root.display()
            ))
        })?;
        let key = relative_path_to_key(relative)?;

        match self.encoding {
            EntryEncoding::Raw => Ok(Record::new(key, fs::read(path)?)),
            EntryEncoding::Json => {
                let reader = BufReader::new(File::open(path)?);
                let entry: ArrayEntry = serde_json::from_reader(reader)?;
                entry.into_record()
            }
        }
    }

    fn encode(&self, record: &Record) -> Result<Vec<u8>> {
        match self.encoding {
            EntryEncoding::Raw => Ok(record.value.clone()),
            EntryEncoding::Json => {
                let mut encoded = serde_json::to_vec(&ArrayEntry::from_record(record))?;
                encoded.push(b'\n');
                Ok(encoded)
            }
        }
    }

    fn decode(&self, content: Vec<u8>) -> Result<Vec<u8>> {
        match self.encoding {
            EntryEncoding::Raw => Ok(content),
            EntryEncoding::Json => {
                let entry: ArrayEntry = serde_json::from_slice(&content)?;
                Ok(entry.into_record()?.value)
            }
        }
    }
}

impl Backend for TreeBackend {
    fn put(&mut self, record: &Record) -> Result<()> {
        let path = self.root.join(key_to_relative_path(&record.key)?);
        let content = self.encode(record)?;

        if let Some(parent) = path.parent() {
            create_private_dir_all(parent)?;
        }

        let mut file = open_private_truncate(&path)?;
        file.write_all(&content)?;
        debug!(key = %record.key, path = %path.display(), bytes = content.len(), "wrote leaf");
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.root.join(key_to_relative_path(key)?);
        match fs::read(&path) {
            Ok(content) => self.decode(content).map(Some),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let mut dir = self.root.clone();
        for segment in prefix.split('/').filter(|s| !s.is_empty()) {
            if segment == "." || segment == ".." {
                return Err(ConvertError::InvalidKey(format!(
                    "{:?} has an unusable path segment",
                    prefix
                )));
            }
            dir.push(segment);
        }

        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry?;
            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                continue;
            };
            let file_type = entry.file_type()?;
            if file_type.is_dir() {
                names.push(format!("{}/", name));
            } else if let Some(leaf) = name.strip_prefix(LEAF_MARKER) {
                if !leaf.is_empty() {
                    names.push(leaf.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }
}

#[cfg(unix)]
fn create_private_dir_all(path: &Path) -> Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    fs::DirBuilder::new().recursive(true).mode(0o700).create(path)?;
    Ok(())
}

#[cfg(not(unix))]
fn create_private_dir_all(path: &Path) -> Result<()> {
    fs::create_dir_all(path)?;
    Ok(())
}

#[cfg(unix)]
fn set_private_mode(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o700))?;
    Ok(())
}

#[cfg(not(unix))]
fn set_private_mode(_path: &Path) -> Result<()> {
    Ok(())
}

/// Create or truncate `path` for writing, owner read-write only
pub(crate) fn open_private_truncate(path: &Path) -> Result<File> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    Ok(options.open(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use tempfile::tempdir;

    #[test]
    fn test_put_writes_underscore_leaf() {
        let dir = tempdir().unwrap();
        let mut backend = TreeBackend::create(dir.path(), EntryEncoding::Raw).unwrap();

        backend.put(&Record::new("secret/x", b"payload".to_vec())).unwrap();

        let written = fs::read(dir.path().join("secret").join("_x")).unwrap();
        assert_eq!(written, b"payload");
    }

    #[test]
    fn test_put_truncates_existing_leaf() {
        let dir = tempdir().unwrap();
        let mut backend = TreeBackend::create(dir.path(), EntryEncoding::Raw).unwrap();

        backend.put(&Record::new("k", b"a much longer value".to_vec())).unwrap();
        backend.put(&Record::new("k", b"short".to_vec())).unwrap();

        assert_eq!(backend.get("k").unwrap().unwrap(), b"short");
    }

    #[cfg(unix)]
    #[test]
    fn test_permissions_are_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let root = dir.path().join("tree");
        let mut backend = TreeBackend::create(&root, EntryEncoding::Raw).unwrap();
        backend.put(&Record::new("a/b/c", b"v".to_vec())).unwrap();

        let mode = |p: &Path| fs::metadata(p).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode(root.as_path()), 0o700);
        assert_eq!(mode(root.join("a/b").as_path()), 0o700);
        assert_eq!(mode(root.join("a/b/_c").as_path()), 0o600);
    }

    #[test]
    fn test_get_missing_key() {
        let dir = tempdir().unwrap();
        let backend = TreeBackend::create(dir.path(), EntryEncoding::Raw).unwrap();
        assert!(backend.get("nope/here").unwrap().is_none());
    }

    #[test]
    fn test_json_encoding_roundtrip() {
        let dir = tempdir().unwrap();
        let mut backend = TreeBackend::create(dir.path(), EntryEncoding::Json).unwrap();
        backend.put(&Record::new("core/keyring", vec![0u8, 255, 7])).unwrap();

        let raw = fs::read_to_string(dir.path().join("core/_keyring")).unwrap();
        assert_eq!(raw, "{\"Key\":\"core/keyring\",\"Value\":\"AP8H\"}\n");

        assert_eq!(backend.get("core/keyring").unwrap().unwrap(), vec![0u8, 255, 7]);
        let record = backend.read_leaf(&dir.path().join("core/_keyring")).unwrap();
        assert_eq!(record.key, "core/keyring");
    }

    #[test]
    fn test_read_leaf_json_requires_leaf_marker() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("stray"), b"{\"Key\":\"stray\",\"Value\":\"eA==\"}\n").unwrap();

        let backend = TreeBackend::open(dir.path(), EntryEncoding::Json).unwrap();
        let err = backend.read_leaf(&dir.path().join("stray")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
    }

    #[test]
    fn test_read_leaf_raw_derives_key_from_path() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("sys/token")).unwrap();
        fs::write(dir.path().join("sys/token/_id"), b"abc").unwrap();

        let backend = TreeBackend::open(dir.path(), EntryEncoding::Raw).unwrap();
        let record = backend.read_leaf(&dir.path().join("sys/token/_id")).unwrap();
        assert_eq!(record, Record::new("sys/token/id", b"abc".to_vec()));

        fs::write(dir.path().join("stray"), b"x").unwrap();
        let err = backend.read_leaf(&dir.path().join("stray")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
    }

    #[test]
    fn test_list_children() {
        let dir = tempdir().unwrap();
        let mut backend = TreeBackend::create(dir.path(), EntryEncoding::Raw).unwrap();
        for key in ["logical/a", "logical/b/c", "core/x"] {
            backend.put(&Record::new(key, b"v".to_vec())).unwrap();
        }

        assert_eq!(backend.list("").unwrap(), vec!["core/", "logical/"]);
        assert_eq!(backend.list("logical/").unwrap(), vec!["a", "b/"]);
        assert!(backend.list("missing/").unwrap().is_empty());
        assert!(backend.list("../").is_err());
    }

    #[test]
    fn test_open_requires_directory() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("file");
        fs::write(&file, b"x").unwrap();

        assert_eq!(
            TreeBackend::open(&file, EntryEncoding::Raw).unwrap_err().kind(),
            ErrorKind::Config
        );
        assert_eq!(
            TreeBackend::open(&dir.path().join("missing"), EntryEncoding::Raw)
                .unwrap_err()
                .kind(),
            ErrorKind::Io
        );
    }

    #[test]
    fn test_encoding_from_str() {
        assert_eq!("raw".parse::<EntryEncoding>().unwrap(), EntryEncoding::Raw);
        assert_eq!("JSON".parse::<EntryEncoding>().unwrap(), EntryEncoding::Json);
        assert!("xml".parse::<EntryEncoding>().is_err());
    }
}
