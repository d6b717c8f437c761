//! Mapping Table Loader.
//!
//! Every source directory carries a mapping file that assigns small integer
//! ids to fully-qualified record type names. The file may still be growing
//! when a reader starts, so loading polls until the content has settled.
//!
//! # File Format
//! ```text
//! $1=kieker.common.record.controlflow.OperationExecutionRecord
//! 2=org.oasp.module.monitoring.CustomOperationExecutionRecord
//! ```
//! The leading `$` is optional; values may contain `\n` and `\\` escapes.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::config::{FileNaming, PollIntervals};
use crate::error::{MappingParseError, ReaderError};
use crate::follow::FollowFile;
use crate::state::StreamState;

/// Id to type-name table of one source directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappingTable {
    entries: HashMap<u32, String>,
}

impl MappingTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an entry, returning the value it replaced.
    pub fn insert(&mut self, id: u32, type_name: impl Into<String>) -> Option<String> {
        self.entries.insert(id, type_name.into())
    }

    /// Type name mapped to `id`.
    #[must_use]
    pub fn get(&self, id: u32) -> Option<&str> {
        self.entries.get(&id).map(String::as_str)
    }

    /// Number of mapped ids.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no id is mapped.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(u32, String)> for MappingTable {
    fn from_iter<I: IntoIterator<Item = (u32, String)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Which mapping file was found, and with it, which data-file prefix applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingFormat {
    /// `kieker.map` with `kieker*` data files.
    Modern,
    /// `tpmon.map` with `tpmon*` data files.
    Legacy,
}

impl MappingFormat {
    /// Data-file prefix that goes with this mapping format.
    #[must_use]
    pub fn file_prefix(self, naming: &FileNaming) -> &str {
        match self {
            Self::Modern => &naming.file_prefix,
            Self::Legacy => &naming.legacy_file_prefix,
        }
    }
}

/// A settled mapping table and where it came from.
#[derive(Debug, Clone)]
pub struct LoadedMapping {
    /// The parsed id to type-name entries.
    pub table: MappingTable,
    /// Whether the modern or the legacy file was used.
    pub format: MappingFormat,
    /// Mapping file the table was read from.
    pub path: PathBuf,
}

/// Decodes the escapes written by the mapping-file producer.
///
/// `\n` becomes a newline and `\\` a single backslash; any other escape is
/// kept verbatim.
#[must_use]
pub fn decode_newline(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Parses one mapping-file line.
///
/// Returns `Ok(None)` for blank lines.
///
/// # Errors
///
/// Returns `MappingParseError` if the line has no `=` or the id is not a
/// non-negative integer.
///
/// # Examples
///
/// ```
/// use tailmerge::mapping::parse_mapping_line;
///
/// let (id, name) = parse_mapping_line("$7=com.example.Rec").unwrap().unwrap();
/// assert_eq!(id, 7);
/// assert_eq!(name, "com.example.Rec");
/// assert!(parse_mapping_line("").unwrap().is_none());
/// assert!(parse_mapping_line("no separator").is_err());
/// ```
pub fn parse_mapping_line(line: &str) -> Result<Option<(u32, String)>, MappingParseError> {
    if line.is_empty() {
        return Ok(None);
    }
    let Some((key, value)) = line.split_once('=') else {
        return Err(MappingParseError::MissingSeparator {
            line: line.to_string(),
        });
    };
    let digits = key.strip_prefix('$').unwrap_or(key);
    let id = digits
        .parse::<u32>()
        .map_err(|_| MappingParseError::InvalidId { key: key.to_string() })?;
    Ok(Some((id, decode_newline(value))))
}

/// Parses one mapping line into `table`. Returns true for a valid entry.
fn apply_mapping_line(path: &Path, table: &mut MappingTable, line: &str) -> bool {
    match parse_mapping_line(line) {
        Ok(None) => false,
        Ok(Some((id, value))) => {
            if let Some(prev) = table.insert(id, value.clone()) {
                error!(
                    path = %path.display(),
                    id,
                    old = %prev,
                    new = %value,
                    "Found additional entry for mapping id"
                );
            }
            true
        }
        Err(e) => {
            error!(path = %path.display(), error = %e, "Skipping mapping line");
            false
        }
    }
}

/// Polls a source directory until its mapping file exists and has settled.
pub struct MappingLoader<'a> {
    dir: &'a Path,
    naming: &'a FileNaming,
    poll: &'a PollIntervals,
    state: &'a StreamState,
}

impl<'a> MappingLoader<'a> {
    /// Creates a loader for `dir`; nothing is read until [`MappingLoader::load`].
    #[must_use]
    pub fn new(dir: &'a Path, naming: &'a FileNaming, poll: &'a PollIntervals, state: &'a StreamState) -> Self {
        Self {
            dir,
            naming,
            poll,
            state,
        }
    }

    /// Finds the mapping file, preferring the modern name.
    #[must_use]
    pub fn locate(&self) -> Option<(PathBuf, MappingFormat)> {
        let modern = self.dir.join(&self.naming.map_file);
        if modern.is_file() {
            return Some((modern, MappingFormat::Modern));
        }
        let legacy = self.dir.join(&self.naming.legacy_map_file);
        if legacy.is_file() {
            info!(
                source = %self.dir.display(),
                map_file = %self.naming.map_file,
                legacy_map_file = %self.naming.legacy_map_file,
                "No modern mapping file; switching to legacy mode"
            );
            return Some((legacy, MappingFormat::Legacy));
        }
        None
    }

    /// Waits for the mapping file and reads it until no new valid entry has
    /// appeared for the settle duration.
    ///
    /// Returns `Ok(None)` if the running flag was cleared first.
    ///
    /// # Errors
    ///
    /// Returns `ReaderError` if the directory disappears or the mapping file
    /// cannot be read.
    pub fn load(&self) -> Result<Option<LoadedMapping>, ReaderError> {
        let Some((path, format)) = self.wait_for_file()? else {
            return Ok(None);
        };
        info!(source = %self.dir.display(), path = %path.display(), "Found mapping file");
        let Some(table) = self.read_until_settled(&path)? else {
            return Ok(None);
        };
        Ok(Some(LoadedMapping { table, format, path }))
    }

    fn wait_for_file(&self) -> Result<Option<(PathBuf, MappingFormat)>, ReaderError> {
        let mut announced = false;
        while self.state.is_running() {
            if let Some(found) = self.locate() {
                return Ok(Some(found));
            }
            if !self.dir.is_dir() {
                return Err(ReaderError::DirectoryUnavailable {
                    path: self.dir.to_path_buf(),
                });
            }
            if !announced {
                warn!(
                    source = %self.dir.display(),
                    map_file = %self.naming.map_file,
                    "Waiting for mapping file to be inserted"
                );
                announced = true;
            }
            thread::sleep(self.poll.new_files());
        }
        Ok(None)
    }

    fn read_until_settled(&self, path: &Path) -> Result<Option<MappingTable>, ReaderError> {
        let mut follow = FollowFile::open(path).map_err(|e| ReaderError::mapping_unavailable(path, e))?;
        let mut table = MappingTable::new();
        let mut valid_lines = 0usize;
        let mut quiet = Duration::ZERO;
        let mut warned_empty = false;

        while self.state.is_running() {
            if let Some(line) = follow
                .next_line()
                .map_err(|e| ReaderError::mapping_unavailable(path, e))?
            {
                if apply_mapping_line(path, &mut table, &line) {
                    valid_lines += 1;
                    quiet = Duration::ZERO;
                }
                continue;
            }

            // Quiet long enough: an unterminated last line is complete.
            if quiet >= self.poll.mapping_settle() {
                if let Some(rest) = follow.take_partial() {
                    if apply_mapping_line(path, &mut table, &rest) {
                        valid_lines += 1;
                    }
                }
            }

            if valid_lines == 0 {
                if !warned_empty {
                    warn!(path = %path.display(), "Mapping file has no valid entries yet; waiting for more lines");
                    warned_empty = true;
                }
            } else if quiet >= self.poll.mapping_settle() {
                info!(path = %path.display(), entries = table.len(), "Mapping file accepted");
                return Ok(Some(table));
            }
            debug!(path = %path.display(), "Waiting for more mapping lines");
            thread::sleep(self.poll.new_lines());
            quiet += self.poll.new_lines();
        }
        Ok(None)
    }
}
