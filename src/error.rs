//! Error types for tailmerge.
//!
//! All errors are strongly typed using thiserror. Each class maps onto one
//! handling policy: mapping and field errors skip a single line, unknown
//! types depend on the strict/permissive mode, and reader errors are fatal
//! to exactly one source. Nothing here is fatal to the whole merge.

use std::path::PathBuf;

use thiserror::Error;

/// A malformed line in a mapping file. The line is logged and skipped.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MappingParseError {
    #[error("Failed to parse line '{line}': each line must contain ID=VALUE pairs")]
    MissingSeparator {
        line: String,
    },

    #[error("Invalid mapping id '{key}': id must be a non-negative integer")]
    InvalidId {
        key: String,
    },
}

/// Errors raised while turning one data line into a record.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Illegal record format: {line}")]
    IllegalFormat {
        line: String,
    },

    #[error("Unknown record type '{type_name}'")]
    UnknownType {
        type_name: String,
    },

    #[error("Field {index} of '{type_name}' is not a valid {expected}: '{value}'")]
    FieldFormat {
        type_name: String,
        index: usize,
        expected: &'static str,
        value: String,
    },

    #[error("Record type '{type_name}' expects {expected} fields, got {actual}")]
    FieldCount {
        type_name: String,
        expected: usize,
        actual: usize,
    },
}

impl DecodeError {
    /// Returns true if the record type could not be resolved.
    ///
    /// Only this class is subject to the strict/permissive mode; every other
    /// decode error just skips the line.
    #[must_use]
    pub const fn is_unknown_type(&self) -> bool {
        matches!(self, Self::UnknownType { .. })
    }

    /// The unresolved type name, if this is an unknown-type error.
    #[must_use]
    pub fn unknown_type_name(&self) -> Option<&str> {
        match self {
            Self::UnknownType { type_name } => Some(type_name),
            _ => None,
        }
    }
}

/// Errors that terminate a single directory reader.
#[derive(Debug, Error)]
pub enum ReaderError {
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Aborting on unknown record type: {0}")]
    Decode(#[from] DecodeError),

    #[error("File '{path}' was removed while processing")]
    FileVanished {
        path: PathBuf,
    },

    #[error("Directory '{path}' does not exist or is not readable")]
    DirectoryUnavailable {
        path: PathBuf,
    },

    #[error("Mapping file '{path}' cannot be read: {source}")]
    MappingUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ReaderError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn mapping_unavailable(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::MappingUnavailable {
            path: path.into(),
            source,
        }
    }
}

/// Top-level error type for tailmerge.
#[derive(Debug, Error)]
pub enum TailError {
    #[error("Mapping error: {0}")]
    Mapping(#[from] MappingParseError),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Reader error: {0}")]
    Reader(#[from] ReaderError),

    #[error("Configuration error: {message}")]
    Config {
        message: String,
    },
}

impl TailError {
    /// Creates a configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Returns true if this is a mapping-file error.
    #[must_use]
    pub const fn is_mapping(&self) -> bool {
        matches!(self, Self::Mapping(_))
    }

    /// Returns true if this is a decode error.
    #[must_use]
    pub const fn is_decode(&self) -> bool {
        matches!(self, Self::Decode(_))
    }

    /// Returns true if this is a reader error.
    #[must_use]
    pub const fn is_reader(&self) -> bool {
        matches!(self, Self::Reader(_))
    }

    /// Returns true if this is a configuration error.
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config { .. })
    }

    /// Returns true if the failure only costs the current line.
    #[must_use]
    pub const fn is_line_local(&self) -> bool {
        match self {
            Self::Mapping(_) => true,
            Self::Decode(e) => !e.is_unknown_type(),
            Self::Reader(_) | Self::Config { .. } => false,
        }
    }
}

/// Result type alias for tailmerge operations.
pub type TailResult<T> = Result<T, TailError>;
