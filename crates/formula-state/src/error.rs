//! # Error Types — Form Operation Failures
//!
//! Every fallible form operation returns [`FormError`]. Failures here are
//! caller misuse (a path that does not exist in the current value, an
//! out-of-range sequence edit) or malformed configuration, and they surface
//! immediately. Recoverable conditions, such as an unresolvable server
//! error key, never reach this type; they are logged and reported in a
//! [`ReconcileReport`](crate::server_errors::ReconcileReport).

use formula_core::{PathParseError, TreeError};
use thiserror::Error;

/// Top-level error type for form state operations.
#[derive(Error, Debug)]
pub enum FormError {
    /// The string path is malformed.
    #[error("invalid path: {0}")]
    Path(#[from] PathParseError),

    /// The path is well formed but does not exist in the current value.
    #[error("path '{path}' does not resolve against the current form value")]
    UnresolvedPath {
        /// The path as given by the caller.
        path: String,
    },

    /// A tree operation failed. Indicates the tree and value diverged or a
    /// sequence edit was out of range.
    #[error("tree error: {0}")]
    Tree(#[from] TreeError),

    /// A JSON value or document could not be converted to or from a typed
    /// value. Covers the form value and JSON configuration documents.
    #[error("JSON conversion error: {0}")]
    Conversion(#[from] serde_json::Error),

    /// A YAML configuration document could not be parsed.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A feedback strategy name is not one of the known strategies.
    #[error("unknown feedback strategy: {name:?}")]
    UnknownStrategy {
        /// The name as given.
        name: String,
    },
}
