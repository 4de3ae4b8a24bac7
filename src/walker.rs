//! Background directory walk with a bounded hand-off queue.
//!
//! ```text
//! producer thread                         caller
//! WalkDir (sorted) ──► bounded(10) ──► Walker::next()
//!        ▲
//!        └── stop signal (sender dropped by Walker::stop)
//! ```
//!
//! The producer blocks while the queue is full, so a slow consumer throttles
//! the filesystem scan. Every blocking send also watches the stop signal,
//! which means the producer can always be released by [`Walker::stop`] or by
//! dropping the [`Walker`].

use crate::error::{ConvertError, Result};
use crossbeam_channel::{bounded, select, Receiver, RecvError, Sender, TryRecvError};
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Default depth of the producer/consumer queue
pub const DEFAULT_QUEUE_CAPACITY: usize = 10;

/// A regular file discovered under the walk root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkEntry {
    pub path: PathBuf,
}

/// Stepped, sorted, depth-first walk of the regular files under a root.
///
/// Directories are descended into and every other non-regular file
/// (symlinks, sockets, devices) is skipped silently.
pub struct Walker {
    root: PathBuf,
    results: Receiver<WalkEntry>,
    stop: Option<Sender<()>>,
    producer: Option<JoinHandle<Result<()>>>,
}

impl Walker {
    /// Start a background walk of `root` with the default queue depth
    pub fn new(root: &Path) -> Result<Self> {
        Self::with_capacity(root, DEFAULT_QUEUE_CAPACITY)
    }

    pub fn with_capacity(root: &Path, capacity: usize) -> Result<Self> {
        let walk_root = root.to_path_buf();
        Self::spawn(root, capacity, move || regular_files(&walk_root))
    }

    /// Run `files` on the producer thread and hand its paths out in order.
    /// The first `Err` it yields ends the walk.
    fn spawn<F, I>(root: &Path, capacity: usize, files: F) -> Result<Self>
    where
        F: FnOnce() -> I + Send + 'static,
        I: Iterator<Item = Result<PathBuf>>,
    {
        let (result_tx, results) = bounded(capacity.max(1));
        let (stop, stop_rx) = bounded::<()>(0);

        let producer = thread::Builder::new()
            .name("tree-walker".into())
            .spawn(move || produce(files(), result_tx, stop_rx))?;

        debug!(root = %root.display(), capacity, "started tree walk");

        Ok(Self {
            root: root.to_path_buf(),
            results,
            stop: Some(stop),
            producer: Some(producer),
        })
    }

    /// Next regular file of the walk.
    ///
    /// Returns `Ok(None)` once the walk is exhausted or stopped. If the walk
    /// failed, the error is returned exactly once, after every entry
    /// produced before the failure has been handed out.
    pub fn next(&mut self) -> Result<Option<WalkEntry>> {
        match self.results.recv() {
            Ok(entry) => Ok(Some(entry)),
            Err(RecvError) => self.join_producer().map(|()| None),
        }
    }

    /// Ask the producer to halt. Entries already queued stay readable
    /// through [`Walker::next`]. Calling this more than once has no effect.
    pub fn stop(&mut self) {
        if self.stop.take().is_some() {
            debug!(root = %self.root.display(), "tree walk stop requested");
        }
    }

    fn join_producer(&mut self) -> Result<()> {
        let Some(producer) = self.producer.take() else {
            return Ok(());
        };
        match producer.join() {
            Ok(outcome) => outcome,
            Err(_) => Err(ConvertError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "tree walker thread panicked",
            ))),
        }
    }
}

impl Drop for Walker {
    fn drop(&mut self) {
        self.stop();
        // Unblock a producer waiting on a full queue before joining it.
        while self.results.try_recv().is_ok() {}
        if let Err(e) = self.join_producer() {
            warn!(root = %self.root.display(), "tree walk ended with error: {}", e);
        }
    }
}

fn stop_requested(stop: &Receiver<()>) -> bool {
    matches!(stop.try_recv(), Err(TryRecvError::Disconnected))
}

/// Sorted walk of `root`, keeping regular files only
fn regular_files(root: &Path) -> impl Iterator<Item = Result<PathBuf>> {
    WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) if entry.file_type().is_file() => Some(Ok(entry.into_path())),
            Ok(_) => None,
            Err(e) => Some(Err(e.into())),
        })
}

fn produce<I>(files: I, results: Sender<WalkEntry>, stop: Receiver<()>) -> Result<()>
where
    I: Iterator<Item = Result<PathBuf>>,
{
    for file in files {
        if stop_requested(&stop) {
            return Ok(());
        }

        let item = WalkEntry { path: file? };
        select! {
            send(results, item) -> sent => {
                if sent.is_err() {
                    // Walker dropped
                    return Ok(());
                }
            }
            recv(stop) -> _ => return Ok(()),
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::fs;
    use tempfile::tempdir;

    fn collect(walker: &mut Walker) -> Vec<PathBuf> {
        let mut paths = Vec::new();
        while let Some(entry) = walker.next().unwrap() {
            paths.push(entry.path);
        }
        paths
    }

    #[test]
    fn test_walk_is_sorted_depth_first() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("b")).unwrap();
        fs::create_dir_all(root.join("a/z")).unwrap();
        fs::write(root.join("b/_1"), b"b1").unwrap();
        fs::write(root.join("a/_2"), b"a2").unwrap();
        fs::write(root.join("a/_1"), b"a1").unwrap();
        fs::write(root.join("a/z/_0"), b"az0").unwrap();

        let mut walker = Walker::new(root).unwrap();
        let paths = collect(&mut walker);

        assert_eq!(
            paths,
            vec![
                root.join("a/_1"),
                root.join("a/_2"),
                root.join("a/z/_0"),
                root.join("b/_1"),
            ]
        );
        // exhausted walks stay exhausted
        assert!(walker.next().unwrap().is_none());
    }

    #[test]
    fn test_walk_of_empty_directory() {
        let dir = tempdir().unwrap();
        let mut walker = Walker::new(dir.path()).unwrap();
        assert!(walker.next().unwrap().is_none());
    }

    #[test]
    fn test_missing_root_reports_error_once() {
        let dir = tempdir().unwrap();
        let mut walker = Walker::new(&dir.path().join("missing")).unwrap();

        assert!(walker.next().is_err());
        assert!(walker.next().unwrap().is_none());
    }

    #[test]
    fn test_error_mid_walk_arrives_after_earlier_entries() {
        let files = vec![
            Ok(PathBuf::from("t/_a")),
            Ok(PathBuf::from("t/_b")),
            Err(ConvertError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "t/c",
            ))),
            Ok(PathBuf::from("t/_d")),
        ];
        let mut walker = Walker::spawn(Path::new("t"), 1, move || files.into_iter()).unwrap();

        assert_eq!(walker.next().unwrap().unwrap().path, PathBuf::from("t/_a"));
        assert_eq!(walker.next().unwrap().unwrap().path, PathBuf::from("t/_b"));
        assert_eq!(walker.next().unwrap_err().kind(), ErrorKind::Io);
        assert!(walker.next().unwrap().is_none());
        assert!(walker.next().unwrap().is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_directory_fails_after_earlier_entries() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("_a"), b"a").unwrap();
        fs::write(root.join("_b"), b"b").unwrap();
        let locked = root.join("c");
        fs::create_dir(&locked).unwrap();
        fs::write(locked.join("_x"), b"x").unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        let enforced = fs::read_dir(&locked).is_err();
        let mut seen = Vec::new();
        let mut failure = None;
        if enforced {
            let mut walker = Walker::new(root).unwrap();
            loop {
                match walker.next() {
                    Ok(Some(entry)) => seen.push(entry.path),
                    Ok(None) => break,
                    Err(e) => {
                        failure = Some(e.kind());
                        assert!(walker.next().unwrap().is_none());
                        break;
                    }
                }
            }
        }
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o700)).unwrap();

        // root ignores permission bits
        if !enforced {
            return;
        }
        assert_eq!(seen, vec![root.join("_a"), root.join("_b")]);
        assert_eq!(failure, Some(ErrorKind::Io));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_are_skipped() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("_real"), b"data").unwrap();
        std::os::unix::fs::symlink(root.join("_real"), root.join("_link")).unwrap();

        let mut walker = Walker::new(root).unwrap();
        assert_eq!(collect(&mut walker), vec![root.join("_real")]);
    }

    #[test]
    fn test_stop_releases_blocked_producer() {
        let dir = tempdir().unwrap();
        for i in 0..200 {
            fs::write(dir.path().join(format!("_{:03}", i)), b"x").unwrap();
        }

        let mut walker = Walker::with_capacity(dir.path(), 1).unwrap();
        assert!(walker.next().unwrap().is_some());

        walker.stop();
        walker.stop();

        // At most the queued entries remain, then the walk reports exhaustion.
        let remaining = collect(&mut walker);
        assert!(remaining.len() < 199, "walk kept producing after stop");
    }

    #[test]
    fn test_drop_mid_walk_does_not_hang() {
        let dir = tempdir().unwrap();
        for i in 0..50 {
            fs::write(dir.path().join(format!("_{:02}", i)), b"x").unwrap();
        }

        let mut walker = Walker::with_capacity(dir.path(), 1).unwrap();
        assert!(walker.next().unwrap().is_some());
        drop(walker);
    }
}
