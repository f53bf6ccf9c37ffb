use thiserror::Error;

/// Errors raised while configuring, building or loading an index.
///
/// Searching itself never fails on user text: unmatched terms, empty queries
/// and empty corpora all produce empty results.
#[derive(Debug, Error)]
pub enum Error {
    /// The persisted artifact is malformed or incompatible with this build.
    #[error("invalid index artifact: {0}")]
    Validation(String),

    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("document `{0}` is already indexed")]
    DuplicateDocument(String),

    #[error("document `{0}` is not indexed")]
    UnknownDocument(String),

    #[error("failed to encode index: {0}")]
    Encode(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
