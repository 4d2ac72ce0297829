//! Error types for rvsync-core

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Why a single record span could not be turned into a record
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    /// The key pattern did not match inside the span
    #[error("no key found in record")]
    MissingKey,

    /// The key pattern matched more than once inside the span
    #[error("key pattern matched {0} times in record")]
    AmbiguousKey(usize),

    /// The key pattern matched but captured nothing
    #[error("record has an empty key")]
    EmptyKey,

    /// Non-blank text found before the first record marker
    #[error("text found before the first record")]
    StrayText,
}

/// Errors that can occur in rvsync-core
#[derive(Debug, Error)]
pub enum Error {
    /// Failed to read a file
    #[error("failed to read file '{path}': {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write a file
    #[error("failed to write file '{path}': {source}")]
    FileWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A file bound to a domain does not exist
    #[error("missing file for domain {domain}: '{path}'")]
    MissingFile { domain: String, path: PathBuf },

    /// File content is not valid UTF-8
    #[error("'{path}' is not valid UTF-8 (byte offset {offset})")]
    Encoding { path: PathBuf, offset: usize },

    /// A record could not be parsed
    #[error("{path}:{line}: {source}")]
    Record {
        path: PathBuf,
        line: usize,
        #[source]
        source: RecordError,
    },

    /// Two records share the same key
    #[error("duplicate key '{key}' in {path} (lines {first_line} and {second_line})")]
    DuplicateKey {
        key: String,
        path: PathBuf,
        first_line: usize,
        second_line: usize,
    },

    /// An edited translation would not read back as the same record
    #[error("translation for '{key}' cannot be saved: {reason}")]
    UnsafeTranslation { key: String, reason: String },

    /// Domain name outside the known set
    #[error("unknown domain: {0}")]
    UnknownDomain(String),

    /// Domain has no source/target binding in the configuration
    #[error("domain {0} has no file binding")]
    UnboundDomain(String),

    /// Invalid configuration value
    #[error("invalid configuration '{path}': {message}")]
    Config { path: PathBuf, message: String },

    /// Invalid record pattern
    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
