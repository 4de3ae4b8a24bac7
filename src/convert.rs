//! Conversion runs between the tree layout and the JSON array layout.
//!
//! ```text
//! tree_to_array:  Walker ─► read_leaf ─► add_prefix ─► ArrayWriter
//! array_to_tree:  ArrayReader ─► has_prefix? ─► strip_prefix ─► TreeBackend::put
//! ```
//!
//! A run pulls one record at a time from its source and pushes it to its
//! sink. The first failure ends the run; its error is the one reported,
//! even if tearing down the source or sink fails as well.

use crate::array::{ArrayReader, ArrayWriter};
use crate::backend::{open_private_truncate, Backend, EntryEncoding, TreeBackend};
use crate::error::{ConvertError, Result};
use crate::key::{add_prefix, has_prefix, normalize_prefix, strip_prefix};
use crate::walker::Walker;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::{debug, info};

/// Key prefix used for secret store data in Consul when none is configured
pub const DEFAULT_KEY_PREFIX: &str = "vault";

/// Options shared by both conversion directions
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    /// Namespace of the records inside the JSON array
    pub key_prefix: String,
    /// Leaf file layout of the tree
    pub encoding: EntryEncoding,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            encoding: EntryEncoding::default(),
        }
    }
}

/// Outcome of a successful run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConvertSummary {
    /// Records written to the sink
    pub converted: u64,
    /// Records left out because they are outside the key prefix
    pub skipped: u64,
}

/// Mutable state of one run
#[derive(Debug, Default)]
struct Session {
    /// Ordinal of the record currently in flight (1-based)
    count: u64,
    summary: ConvertSummary,
    first_error: Option<ConvertError>,
}

impl Session {
    fn set_error(&mut self, err: ConvertError) {
        if self.first_error.is_none() {
            self.first_error = Some(err);
        } else {
            debug!("discarding error after first failure: {}", err);
        }
    }

    fn fail_entry(&mut self, err: ConvertError) {
        self.set_error(ConvertError::at_entry(self.count, err));
    }

    /// Record the result of releasing a resource
    fn teardown(&mut self, outcome: Result<()>) {
        if let Err(e) = outcome {
            self.set_error(e);
        }
    }

    fn finish(self) -> Result<ConvertSummary> {
        match self.first_error {
            Some(err) => Err(err),
            None => Ok(self.summary),
        }
    }
}

/// Convert the tree rooted at `input` into a JSON array written to `output`.
///
/// Every key gains `options.key_prefix`. The output file is replaced.
pub fn tree_to_array(input: &Path, output: &Path, options: &ConvertOptions) -> Result<ConvertSummary> {
    let prefix = normalize_prefix(&options.key_prefix)?;
    let source = TreeBackend::open(input, options.encoding)?;
    let mut walker = Walker::new(input)?;
    let mut sink = ArrayWriter::open(open_private_truncate(output)?)?;

    let mut session = Session::default();
    loop {
        let entry = match walker.next() {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => {
                session.set_error(e);
                break;
            }
        };
        session.count += 1;

        let outcome = source.read_leaf(&entry.path).and_then(|mut record| {
            record.validate()?;
            record.key = add_prefix(&record.key, &prefix);
            sink.write(&record)?;
            debug!(ordinal = session.count, key = %record.key, "converted");
            Ok(())
        });
        if let Err(e) = outcome {
            session.fail_entry(e);
            break;
        }
        session.summary.converted += 1;
    }

    session.teardown(stop_walker(&mut walker));
    session.teardown(sink.close());

    let summary = session.finish()?;
    info!(
        input = %input.display(),
        output = %output.display(),
        converted = summary.converted,
        "tree to array conversion complete"
    );
    Ok(summary)
}

/// Convert the JSON array in `input` into a tree rooted at `output`.
///
/// Only records under `options.key_prefix` are kept, and the prefix is
/// removed from their keys. Existing leaves are overwritten.
pub fn array_to_tree(input: &Path, output: &Path, options: &ConvertOptions) -> Result<ConvertSummary> {
    let prefix = normalize_prefix(&options.key_prefix)?;
    let mut source = ArrayReader::open(BufReader::new(File::open(input)?))?;
    let mut sink = TreeBackend::create(output, options.encoding)?;

    let mut session = Session::default();
    loop {
        session.count += 1;
        let entry = match source.next_entry() {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => {
                session.fail_entry(e);
                break;
            }
        };

        if !has_prefix(&entry.key, &prefix) {
            debug!(ordinal = session.count, key = %entry.key, "outside key prefix, skipped");
            session.summary.skipped += 1;
            continue;
        }

        let outcome = entry.into_record().and_then(|mut record| {
            record.key = strip_prefix(&record.key, &prefix);
            record.validate()?;
            sink.put(&record)?;
            debug!(ordinal = session.count, key = %record.key, "converted");
            Ok(())
        });
        if let Err(e) = outcome {
            session.fail_entry(e);
            break;
        }
        session.summary.converted += 1;
    }

    let summary = session.finish()?;
    info!(
        input = %input.display(),
        output = %output.display(),
        converted = summary.converted,
        skipped = summary.skipped,
        "array to tree conversion complete"
    );
    Ok(summary)
}

/// Halt the walk and drain what it already queued
fn stop_walker(walker: &mut Walker) -> Result<()> {
    walker.stop();
    while walker.next()?.is_some() {}
    Ok(())
}
