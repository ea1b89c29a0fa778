//! # Error Types — Path and Tree Failures
//!
//! All errors use `thiserror` for derive-based `Display` and `Error`
//! implementations.
//!
//! ## Design
//!
//! - Parse errors carry the offending path string and the byte position
//!   where parsing stopped.
//! - Tree errors carry the rendered path and the step at which the tree's
//!   shape diverged from the path. A tree error always indicates a caller
//!   bug: the path was resolved against a value that does not match the tree.

use thiserror::Error;

/// A string path could not be parsed into structured steps.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathParseError {
    /// A field name was empty (`a..b`, `.a`, `a.`).
    #[error("empty field name at byte {position} in path '{path}'")]
    EmptyField {
        /// The path being parsed.
        path: String,
        /// Byte offset of the empty segment.
        position: usize,
    },

    /// A character appeared where a separator or the end of input was expected.
    #[error("unexpected character '{found}' at byte {position} in path '{path}'")]
    UnexpectedChar {
        /// The path being parsed.
        path: String,
        /// Byte offset of the character.
        position: usize,
        /// The character found.
        found: char,
    },

    /// The contents of a `[...]` segment are not a non-negative integer.
    #[error("invalid index '{index}' at byte {position} in path '{path}'")]
    InvalidIndex {
        /// The path being parsed.
        path: String,
        /// Byte offset of the opening bracket.
        position: usize,
        /// The bracket contents.
        index: String,
    },

    /// A `[` was never closed.
    #[error("unterminated index at byte {position} in path '{path}'")]
    UnterminatedIndex {
        /// The path being parsed.
        path: String,
        /// Byte offset of the opening bracket.
        position: usize,
    },
}

/// A path-addressed tree operation was given a path that does not fit the
/// tree, or a sequence edit was out of range.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    /// The path does not fit the tree's shape.
    #[error("path '{path}' does not fit the tree shape at step {step}")]
    ShapeMismatch {
        /// Rendered path.
        path: String,
        /// Zero-based index of the first step that failed.
        step: usize,
    },

    /// A sequence edit addressed an index past the end of the sequence.
    #[error("index {index} out of range for sequence of length {len} at '{path}'")]
    IndexOutOfRange {
        /// Rendered path of the sequence node.
        path: String,
        /// The offending index.
        index: usize,
        /// Current sequence length.
        len: usize,
    },

    /// A sequence edit addressed a node that is not a sequence.
    #[error("node at '{path}' is not a sequence")]
    NotASequence {
        /// Rendered path of the node.
        path: String,
    },
}
