//! Fatal error taxonomy for snapshot construction and release provenance.
//!
//! Anything in here aborts the whole run. Per-node problems during the
//! synchronization pass are reported as [`crate::sync::NodeFailure`] instead.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum OntologyError {
    /// A required metadata field is absent from the snapshot
    #[error("missing required field: {0}")]
    MissingField(String),

    /// The release date did not match `DD:MM:YYYY HH:MM`
    #[error("invalid release date {value:?}: {source}")]
    InvalidDate {
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    /// A node metadata block did not carry exactly one namespace value
    #[error("node {node} has {count} namespace values, expected exactly one")]
    Namespace { node: String, count: usize },

    /// The document has no `graphs[0]` entry
    #[error("document contains no graph")]
    MissingGraph,

    #[error("malformed snapshot: {0}")]
    Json(#[from] serde_json::Error),

    #[error("cannot read snapshot: {0}")]
    Io(#[from] std::io::Error),

    /// The shared release record could not be created or resolved
    #[error("unable to create release {title}: {message}")]
    Release { title: String, message: String },
}

pub type Result<T> = std::result::Result<T, OntologyError>;
