//! Configuration surface for a merge run.
//!
//! Loading configuration from files or the environment is the caller's job;
//! this module only defines the shape and its defaults.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{TailError, TailResult};

/// Separator used by the single-string input directory property.
pub const INPUT_DIRS_SEPARATOR: char = '|';

/// Polling cadence of the directory readers, in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollIntervals {
    /// Sleep between attempts to read new lines from the current file.
    pub new_lines_ms: u64,
    /// Sleep between directory scans for new data files or the mapping file.
    pub new_files_ms: u64,
    /// How long the mapping file must stay unchanged before it is accepted.
    pub mapping_settle_ms: u64,
}

impl PollIntervals {
    /// Delay between reads once the current file has no new lines.
    #[must_use]
    pub const fn new_lines(&self) -> Duration {
        Duration::from_millis(self.new_lines_ms)
    }

    /// Delay between directory scans for new data or mapping files.
    #[must_use]
    pub const fn new_files(&self) -> Duration {
        Duration::from_millis(self.new_files_ms)
    }

    /// Quiet period after which a mapping file is considered complete.
    #[must_use]
    pub const fn mapping_settle(&self) -> Duration {
        Duration::from_millis(self.mapping_settle_ms)
    }
}

impl Default for PollIntervals {
    fn default() -> Self {
        Self {
            new_lines_ms: 1000,
            new_files_ms: 3000,
            mapping_settle_ms: 5000,
        }
    }
}

/// File names and prefixes that identify a monitoring log directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileNaming {
    /// Mapping file name, `kieker.map` by default.
    pub map_file: String,
    /// Legacy mapping file name, `tpmon.map` by default.
    pub legacy_map_file: String,
    /// Data-file prefix used with the modern mapping file.
    pub file_prefix: String,
    /// Data-file prefix used with the legacy mapping file.
    pub legacy_file_prefix: String,
    /// Extension of text data files, including the dot.
    pub data_extension: String,
}

impl Default for FileNaming {
    fn default() -> Self {
        Self {
            map_file: "kieker.map".to_string(),
            legacy_map_file: "tpmon.map".to_string(),
            file_prefix: "kieker".to_string(),
            legacy_file_prefix: "tpmon".to_string(),
            data_extension: ".dat".to_string(),
        }
    }
}

/// Top-level configuration of one merge run.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TailMergeConfig {
    /// Directories to tail, one reader each, in tie-break order.
    pub input_dirs: Vec<PathBuf>,
    /// Skip lines of unresolvable record types instead of stopping the source.
    pub ignore_unknown_record_types: bool,
    /// Poll and settle intervals.
    pub poll: PollIntervals,
    /// Mapping and data file names.
    pub naming: FileNaming,
}

impl TailMergeConfig {
    /// Default settings over the given directories.
    #[must_use]
    pub fn new(input_dirs: Vec<PathBuf>) -> Self {
        Self {
            input_dirs,
            ..Self::default()
        }
    }

    /// Builds a configuration from a `|`-separated directory list.
    ///
    /// Blank entries are dropped; surrounding whitespace is kept since paths
    /// may legitimately contain it.
    ///
    /// # Examples
    ///
    /// ```
    /// use tailmerge::TailMergeConfig;
    ///
    /// let cfg = TailMergeConfig::from_input_dirs_property("logs/a|logs/b");
    /// assert_eq!(cfg.input_dirs.len(), 2);
    /// ```
    #[must_use]
    pub fn from_input_dirs_property(value: &str) -> Self {
        let input_dirs = value
            .split(INPUT_DIRS_SEPARATOR)
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
            .collect();
        Self::new(input_dirs)
    }

    /// Parses a JSON configuration document. Missing keys take defaults.
    ///
    /// # Errors
    ///
    /// Returns `TailError::Config` if the document is not valid JSON for this
    /// shape.
    pub fn from_json_str(json: &str) -> TailResult<Self> {
        serde_json::from_str(json).map_err(|e| TailError::config(format!("invalid configuration: {e}")))
    }

    /// Sets permissive (`true`) or strict (`false`) unknown-type handling.
    #[must_use]
    pub fn with_ignore_unknown_record_types(mut self, ignore: bool) -> Self {
        self.ignore_unknown_record_types = ignore;
        self
    }

    /// Replaces the poll intervals.
    #[must_use]
    pub fn with_poll(mut self, poll: PollIntervals) -> Self {
        self.poll = poll;
        self
    }

    /// Replaces the file naming scheme.
    #[must_use]
    pub fn with_naming(mut self, naming: FileNaming) -> Self {
        self.naming = naming;
        self
    }
}
