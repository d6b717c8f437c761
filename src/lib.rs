//! # tailmerge - live merge of growing monitoring logs
//!
//! tailmerge follows monitoring-record logs while they are still being
//! written into one or more directories, decodes every text line into a typed
//! record, and hands a single, globally time-ordered stream to a consumer.
//!
//! ## Core Concepts
//!
//! - **Source Directory**: a directory holding a mapping file and data files
//! - **Mapping Table**: per-directory id to record-type-name dictionary
//! - **Record**: a typed value with a logging timestamp and field values
//! - **Frontier Merge**: always emit the smallest pending record across all
//!   live sources
//!
//! ## Usage
//!
//! ```rust,no_run
//! use tailmerge::{MergeCoordinator, Record, TailMergeConfig, TypeRegistry};
//!
//! let config = TailMergeConfig::from_input_dirs_property("logs/node-a|logs/node-b");
//! let coordinator = MergeCoordinator::new(config, TypeRegistry::with_builtin_types());
//!
//! let summary = coordinator.run(&mut |record: Record| {
//!     println!("{record}");
//!     true
//! });
//! println!("delivered {} records", summary.records_delivered);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod decoder;
pub mod error;
pub mod mapping;
pub mod merge;
pub mod reader;
pub mod record;
pub mod registry;
pub mod rendezvous;
pub mod state;
pub mod value;

mod follow;

// Re-export primary types at crate root for convenience
pub use config::{FileNaming, PollIntervals, TailMergeConfig};
pub use decoder::RecordDecoder;
pub use error::{DecodeError, MappingParseError, ReaderError, TailError, TailResult};
pub use mapping::{MappingFormat, MappingLoader, MappingTable};
pub use merge::{MergeCoordinator, MergeSummary, RecordSink};
pub use reader::{DirectoryTailReader, ReaderState, SourceDirectory};
pub use record::{Envelope, Record};
pub use registry::{RecordSchema, TypeRegistry, CUSTOM_OPERATION_EXECUTION_RECORD, OPERATION_EXECUTION_RECORD};
pub use state::StreamState;
pub use value::{FieldType, FieldValue};
