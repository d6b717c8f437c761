//! Line-oriented reading of a file that is still being appended to.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

/// Keeps a file open and hands out complete lines as they are written.
///
/// A line counts as complete once its terminating `\n` is on disk; bytes of a
/// partially written line are buffered until the rest arrives. Invalid UTF-8
/// is replaced rather than treated as an I/O failure.
pub(crate) struct FollowFile {
    path: PathBuf,
    reader: BufReader<File>,
    partial: Vec<u8>,
    offset: u64,
}

impl FollowFile {
    pub(crate) fn open(path: &Path) -> io::Result<Self> {
        let file = File::open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            reader: BufReader::new(file),
            partial: Vec::new(),
            offset: 0,
        })
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes consumed so far, including any buffered partial line.
    pub(crate) const fn offset(&self) -> u64 {
        self.offset
    }

    /// Returns the next complete line without its terminator, or `None` if
    /// nothing complete is available yet.
    pub(crate) fn next_line(&mut self) -> io::Result<Option<String>> {
        let n = self.reader.read_until(b'\n', &mut self.partial)?;
        self.offset += n as u64;
        if self.partial.last() != Some(&b'\n') {
            return Ok(None);
        }
        self.partial.pop();
        if self.partial.last() == Some(&b'\r') {
            self.partial.pop();
        }
        let line = String::from_utf8_lossy(&self.partial).into_owned();
        self.partial.clear();
        Ok(Some(line))
    }

    /// Drains an unterminated trailing line. Used once the writer is known to
    /// have moved on to another file.
    pub(crate) fn take_partial(&mut self) -> Option<String> {
        if self.partial.is_empty() {
            return None;
        }
        let line = String::from_utf8_lossy(&self.partial).into_owned();
        self.partial.clear();
        Some(line)
    }
}
