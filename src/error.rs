use std::path::PathBuf;
use thiserror::Error;

/// Operator typed something we can't use. Always recoverable by asking again.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectionError {
    #[error("expected {expected} index numbers, got {got}")]
    WrongCount { expected: usize, got: usize },
    #[error("'{0}' is not an index number")]
    NotAnIndex(String),
    #[error("index {index} is outside the list (0..{len})")]
    OutOfRange { index: usize, len: usize },
    #[error("index {0} was given more than once")]
    Duplicate(usize),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InputError {
    #[error("please type 'y' or 'change'")]
    UnknownChoice,
    #[error("'{0}' does not look like an email address")]
    InvalidContact(String),
    #[error("a file name is required")]
    EmptyFileName,
}

/// Fatal pipeline failures. None of these are retried.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to fetch catalog page {url}: {reason}")]
    CatalogFetch { url: String, reason: String },

    #[error("failed to download {url}: {reason}")]
    AssetDownload { url: String, reason: String },

    #[error("failed to decompress {}: {reason}", .path.display())]
    Decompress { path: PathBuf, reason: String },

    #[error("failed to parse table {}{}: {reason}", .path.display(), .line.map(|l| format!(" (line {l})")).unwrap_or_default())]
    TableParse {
        path: PathBuf,
        line: Option<usize>,
        reason: String,
    },

    #[error("no identifiers starting with '{prefix}' found in {}", .path.display())]
    NoProfiles { path: PathBuf, prefix: String },

    #[error("failed to fetch profile {identifier}: {reason}")]
    ProfileFetch { identifier: String, reason: String },

    #[error("search output {} is missing; has the job finished?", .path.display())]
    OutputMissing { path: PathBuf },

    #[error("target '{target}' and query '{query}' occur more than once; cannot build the score matrix")]
    ReshapeCollision { target: String, query: String },

    #[error("failed to render chart {}: {reason}", .path.display())]
    Chart { path: PathBuf, reason: String },

    #[error("input closed before a valid answer was given")]
    InputClosed,

    #[error("gave up after {0} invalid attempts")]
    TooManyAttempts(u32),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
