//! Graph artifact error types.

use std::path::PathBuf;

/// Errors that can occur reading, writing, or validating the network graph.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// Reading or writing the artifact failed
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The artifact is not valid graph JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Stop serving-sets and route sequences disagree
    #[error("inconsistent graph: {0}")]
    Inconsistent(String),
}
