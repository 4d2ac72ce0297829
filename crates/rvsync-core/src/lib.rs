//! rvsync-core: Core library for keeping translated `.rvtext` files in sync
//!
//! This library provides functionality to:
//! - Extract keyed records from blank-line separated text files
//! - Match a translated (target) file against its original (source) file by key
//! - Regenerate the target file in source order, falling back to source text
//! - Isolate translations whose key disappeared from the source
//! - Expose per-entry translation accessors for an interactive editor

pub mod config;
pub mod corpus;
pub mod editing;
pub mod error;
pub mod extract;
pub mod pipeline;
pub mod record;
pub mod registry;
pub mod render;
pub mod sync;

pub use config::ProjectConfig;
pub use corpus::Corpus;
pub use editing::{DomainMap, TranslationEntry};
pub use error::{Error, RecordError, Result};
pub use extract::{extract, parse_file, parse_file_lenient, FileSide, PatternSet};
pub use pipeline::{domain_status, run, update_domain, DomainReport, RunMode, RunReport};
pub use record::{PayloadRole, Record};
pub use registry::{Domain, DomainFiles, MapRegistry};
pub use render::{render, write_outputs, Rendered, WrittenFiles};
pub use sync::{synchronize, MatchedEntry, SyncResult};
