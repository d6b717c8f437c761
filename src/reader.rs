//! Directory Tail Reader.
//!
//! One reader runs per source directory on its own thread. It waits for the
//! directory's mapping file, then reads data files in lexicographic order,
//! following the newest one as it grows, and posts every decoded record into
//! its rendezvous slot.
//!
//! ```text
//! AwaitingMapping -> AwaitingFile <-> ReadingFile -> Terminated
//! ```

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::config::TailMergeConfig;
use crate::decoder::RecordDecoder;
use crate::error::ReaderError;
use crate::follow::FollowFile;
use crate::mapping::{MappingLoader, MappingTable};
use crate::registry::TypeRegistry;
use crate::rendezvous::SlotSender;
use crate::state::StreamState;

/// A configured source directory and the reader's cursor into it.
#[derive(Debug, Clone)]
pub struct SourceDirectory {
    /// Position in the configured directory list.
    pub index: usize,
    /// The directory being tailed.
    pub path: PathBuf,
    /// Active data-file prefix; switches to the legacy prefix when only a
    /// legacy mapping file exists.
    pub file_prefix: String,
    /// File currently (or most recently) tailed.
    pub current_file: Option<PathBuf>,
    /// Cleared once the reader has terminated.
    pub live: bool,
}

impl SourceDirectory {
    /// A live source with no file opened yet.
    #[must_use]
    pub fn new(index: usize, path: PathBuf, file_prefix: impl Into<String>) -> Self {
        Self {
            index,
            path,
            file_prefix: file_prefix.into(),
            current_file: None,
            live: true,
        }
    }
}

/// Reader state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReaderState {
    /// Waiting for the mapping file to appear and settle.
    AwaitingMapping,
    /// Waiting for a data file after the current one.
    AwaitingFile,
    /// Tailing the given data file.
    ReadingFile(PathBuf),
    /// Stopped; the end-of-stream marker follows.
    Terminated,
}

/// Tails one source directory and feeds its rendezvous slot.
pub struct DirectoryTailReader {
    source: SourceDirectory,
    config: Arc<TailMergeConfig>,
    decoder: RecordDecoder,
    mapping: MappingTable,
    slot: SlotSender,
    state: StreamState,
    unknown_types_observed: HashSet<String>,
}

impl DirectoryTailReader {
    /// Creates a reader for the directory at position `index`.
    #[must_use]
    pub fn new(
        index: usize,
        path: PathBuf,
        config: Arc<TailMergeConfig>,
        registry: Arc<TypeRegistry>,
        slot: SlotSender,
        state: StreamState,
    ) -> Self {
        let source = SourceDirectory::new(index, path, config.naming.file_prefix.clone());
        Self {
            source,
            config,
            decoder: RecordDecoder::new(registry),
            mapping: MappingTable::new(),
            slot,
            state,
            unknown_types_observed: HashSet::new(),
        }
    }

    /// The directory this reader tails and its cursor.
    #[must_use]
    pub fn source(&self) -> &SourceDirectory {
        &self.source
    }

    /// Runs the state machine to completion, then posts the end-of-stream
    /// marker. Errors are fatal to this source only and are logged here.
    pub fn run(mut self) {
        info!(source = %self.source.path.display(), index = self.source.index, "Starting directory reader");
        if let Err(e) = self.drive() {
            error!(source = %self.source.path.display(), error = %e, "Directory reader failed");
        }
        self.source.live = false;
        info!(source = %self.source.path.display(), index = self.source.index, "Ending directory reader");
        self.slot.finish();
    }

    fn drive(&mut self) -> Result<(), ReaderError> {
        let mut state = ReaderState::AwaitingMapping;
        loop {
            state = match state {
                ReaderState::AwaitingMapping => self.await_mapping()?,
                ReaderState::AwaitingFile => self.await_file()?,
                ReaderState::ReadingFile(path) => self.read_file(&path)?,
                ReaderState::Terminated => return Ok(()),
            };
        }
    }

    fn await_mapping(&mut self) -> Result<ReaderState, ReaderError> {
        let loader = MappingLoader::new(&self.source.path, &self.config.naming, &self.config.poll, &self.state);
        let Some(loaded) = loader.load()? else {
            return Ok(ReaderState::Terminated);
        };
        self.source.file_prefix = loaded.format.file_prefix(&self.config.naming).to_string();
        self.mapping = loaded.table;
        Ok(ReaderState::AwaitingFile)
    }

    fn await_file(&mut self) -> Result<ReaderState, ReaderError> {
        while self.state.is_running() {
            let files = self.list_data_files()?;
            let next = match &self.source.current_file {
                None => files.into_iter().next(),
                Some(last) => files.into_iter().find(|f| f.file_name() > last.file_name()),
            };
            if let Some(path) = next {
                return Ok(ReaderState::ReadingFile(path));
            }
            debug!(
                source = %self.source.path.display(),
                wait_ms = self.config.poll.new_files_ms,
                "No input file found; waiting"
            );
            thread::sleep(self.config.poll.new_files());
        }
        Ok(ReaderState::Terminated)
    }

    fn read_file(&mut self, path: &Path) -> Result<ReaderState, ReaderError> {
        info!(source = %self.source.path.display(), file = %path.display(), "Loading file");
        let mut follow = FollowFile::open(path).map_err(|e| ReaderError::io(path, e))?;
        self.source.current_file = Some(path.to_path_buf());

        let mut since_scan = Duration::ZERO;
        loop {
            if let Some(line) = follow.next_line().map_err(|e| ReaderError::io(path, e))? {
                if !self.handle_line(&line)? {
                    return Ok(ReaderState::Terminated);
                }
                continue;
            }

            debug!(file = %path.display(), "No more lines; waiting");
            thread::sleep(self.config.poll.new_lines());
            if !self.state.is_running() {
                return Ok(ReaderState::Terminated);
            }
            since_scan += self.config.poll.new_lines();
            if since_scan < self.config.poll.new_files() {
                continue;
            }
            since_scan = Duration::ZERO;

            let files = self.list_data_files()?;
            if !files.iter().any(|f| f == path) {
                return Err(ReaderError::FileVanished { path: path.to_path_buf() });
            }
            if files.iter().any(|f| f.file_name() > path.file_name()) {
                if !self.drain(&mut follow)? {
                    return Ok(ReaderState::Terminated);
                }
                info!(
                    source = %self.source.path.display(),
                    file = %path.display(),
                    bytes = follow.offset(),
                    "New file found; leaving current file"
                );
                return Ok(ReaderState::AwaitingFile);
            }
        }
    }

    /// Consumes whatever the writer appended before moving to a newer file,
    /// including an unterminated last line.
    fn drain(&mut self, follow: &mut FollowFile) -> Result<bool, ReaderError> {
        while let Some(line) = follow.next_line().map_err(|e| ReaderError::io(follow.path(), e))? {
            if !self.handle_line(&line)? {
                return Ok(false);
            }
        }
        match follow.take_partial() {
            Some(rest) => self.handle_line(&rest),
            None => Ok(true),
        }
    }

    /// Decodes and posts one line. Returns false once the reader must stop.
    fn handle_line(&mut self, raw: &str) -> Result<bool, ReaderError> {
        let line = raw.trim();
        if line.is_empty() {
            return Ok(true);
        }
        match self.decoder.decode(line, &self.mapping) {
            Ok(record) => {
                let keep_running = self.slot.post(record);
                if !keep_running {
                    debug!(source = %self.source.path.display(), "Received stop signal");
                }
                Ok(keep_running)
            }
            Err(e) if e.is_unknown_type() => {
                if !self.config.ignore_unknown_record_types {
                    error!(source = %self.source.path.display(), line, "Error processing line");
                    return Err(ReaderError::Decode(e));
                }
                let type_name = e.unknown_type_name().unwrap_or_default();
                if self.unknown_types_observed.insert(type_name.to_string()) {
                    warn!(source = %self.source.path.display(), type_name, "Failed to load record type; skipping its records");
                }
                Ok(true)
            }
            Err(e) => {
                error!(source = %self.source.path.display(), line, error = %e, "Error processing line");
                Ok(true)
            }
        }
    }

    /// Data files with the active prefix and extension, sorted by name.
    fn list_data_files(&self) -> Result<Vec<PathBuf>, ReaderError> {
        let entries = fs::read_dir(&self.source.path).map_err(|_| ReaderError::DirectoryUnavailable {
            path: self.source.path.clone(),
        })?;
        let naming = &self.config.naming;
        let mut files: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| {
                path.is_file()
                    && path.file_name().and_then(|n| n.to_str()).is_some_and(|name| {
                        name.starts_with(self.source.file_prefix.as_str())
                            && name.ends_with(naming.data_extension.as_str())
                    })
            })
            .collect();
        files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        Ok(files)
    }
}
