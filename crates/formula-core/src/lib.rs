//! # formula-core — Shaped Paths and Trees
//!
//! This crate is the foundation of the formula form engine. It defines the
//! two primitives every other layer is built on: validated paths into a
//! nested value and a persistent tree that mirrors that value's shape.
//! It depends on no other `formula-*` crate.
//!
//! ## Key Design Principles
//!
//! 1. **Paths are proven before use.** A raw [`Path`] is just steps. The
//!    only way to obtain a [`ShapedPath`] is [`shape_path()`], which walks
//!    the steps through a concrete value. Tree operations accept only
//!    `ShapedPath`.
//!
//! 2. **Trees mirror values, not contents.** [`ShapedTree<E>`] has one node
//!    per object, sequence and leaf in the value, each carrying an extras
//!    payload `E`. Leaf contents never live in the tree.
//!
//! 3. **Copy-on-write with structural sharing.** Nodes are `Arc`-shared.
//!    A path-addressed update reallocates only the root→target spine.
//!
//! ## Crate Policy
//!
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests. A path that does not fit a
//!   tree is reported as [`TreeError`], never ignored.

pub mod error;
pub mod path;
pub mod tree;

// Re-export primary types for ergonomic imports.
pub use error::{PathParseError, TreeError};
pub use path::{path_from_path_string, path_to_string, shape_path, Path, PathStep, ShapedPath};
pub use tree::{Node, ShapedTree};
