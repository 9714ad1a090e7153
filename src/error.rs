use std::path::PathBuf;

use thiserror::Error;

/// Failure to locate or decode the embedded archetype literal. Always fatal.
#[derive(Debug, Error)]
pub(crate) enum ExtractionError {
    #[error("no array literal bound to `{binding}` was found")]
    BindingNotFound { binding: String },

    #[error("unterminated {what} starting at byte {offset}")]
    Unterminated { what: &'static str, offset: usize },

    #[error("unbalanced `{found}` at byte {offset}")]
    Unbalanced { found: char, offset: usize },

    #[error("literal could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("literal is not an array of objects (element {index} is {kind})")]
    NotRecordArray { index: usize, kind: &'static str },

    #[error("decoded {decoded} records but located {located} in the text")]
    LayoutMismatch { decoded: usize, located: usize },
}

/// A single archetype lookup that failed. Absorbed by the resolver.
#[derive(Debug, Error)]
pub(crate) enum LookupError {
    #[error("remote returned status {code}")]
    Status { code: u16 },

    #[error("request failed: {0}")]
    Transport(String),

    #[error("malformed payload: {0}")]
    Payload(String),
}

/// Errors that abort a run.
#[derive(Debug, Error)]
pub(crate) enum EnrichError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error("could not render records: {0}")]
    Render(#[from] serde_json::Error),
}

impl EnrichError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
