//! # Path Addressing
//!
//! Converts between the dotted/bracketed string form of a path
//! (`a.b[3].c`) and a structured [`Path`], and validates a structured path
//! against a concrete value.
//!
//! ## Grammar
//!
//! ```text
//! path    := "" | first rest*
//! first   := key | index
//! rest    := "." key | index
//! key     := one or more chars other than '.', '[', ']'
//! index   := "[" digits "]"
//! ```
//!
//! The empty string is the root path. Keys containing `.`, `[` or `]` have
//! no string form; such fields are only reachable through a structured
//! [`Path`].
//!
//! ## Security Invariant
//!
//! [`ShapedPath`] has a private inner field. The only way to construct one
//! is [`shape_path()`], which walks the path through a concrete value. A
//! `ShapedPath` is therefore always safe to traverse on any tree shaped like
//! the value it was resolved against. This is the single gate that keeps
//! tree access in bounds.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::PathParseError;

/// A single step in a path.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathStep {
    /// Object field access.
    Field(String),
    /// Sequence index access.
    Index(usize),
}

impl From<&str> for PathStep {
    fn from(s: &str) -> Self {
        PathStep::Field(s.to_owned())
    }
}

impl From<String> for PathStep {
    fn from(s: String) -> Self {
        PathStep::Field(s)
    }
}

impl From<usize> for PathStep {
    fn from(i: usize) -> Self {
        PathStep::Index(i)
    }
}

/// A structured, unvalidated path.
///
/// Build one with [`path_from_path_string()`] or the builder methods:
///
/// ```
/// use formula_core::Path;
///
/// let path = Path::root().field("b").index(1);
/// assert_eq!(path.to_string(), "b[1]");
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Path(Vec<PathStep>);

impl Path {
    /// The empty path, addressing the root value.
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Create a path from explicit steps.
    pub fn from_steps(steps: Vec<PathStep>) -> Self {
        Self(steps)
    }

    /// Append a field step (builder).
    pub fn field(mut self, name: impl Into<String>) -> Self {
        self.0.push(PathStep::Field(name.into()));
        self
    }

    /// Append an index step (builder).
    pub fn index(mut self, i: usize) -> Self {
        self.0.push(PathStep::Index(i));
        self
    }

    /// The steps of this path, root first.
    pub fn steps(&self) -> &[PathStep] {
        &self.0
    }

    /// Number of steps.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether this is the root path.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The path without its last step, or `None` at the root.
    pub fn parent(&self) -> Option<Path> {
        let (_, init) = self.0.split_last()?;
        Some(Path(init.to_vec()))
    }

    /// A new path with `step` appended.
    pub fn child(&self, step: impl Into<PathStep>) -> Path {
        let mut steps = self.0.clone();
        steps.push(step.into());
        Path(steps)
    }

    /// Whether `self` is a prefix of `other`. A path is a prefix of itself.
    pub fn is_prefix_of(&self, other: &Path) -> bool {
        other.0.starts_with(&self.0)
    }

    /// Whether one of the two paths is a prefix of the other.
    pub fn is_related_to(&self, other: &Path) -> bool {
        self.is_prefix_of(other) || other.is_prefix_of(self)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, step) in self.0.iter().enumerate() {
            match step {
                PathStep::Field(name) if i == 0 => f.write_str(name)?,
                PathStep::Field(name) => write!(f, ".{name}")?,
                PathStep::Index(index) => write!(f, "[{index}]")?,
            }
        }
        Ok(())
    }
}

impl FromStr for Path {
    type Err = PathParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        path_from_path_string(s)
    }
}

/// Parse a dotted/bracketed string path such as `a.b[3].c`.
///
/// # Errors
///
/// Returns a [`PathParseError`] describing the first malformed segment.
pub fn path_from_path_string(s: &str) -> Result<Path, PathParseError> {
    let mut steps = Vec::new();
    let mut chars = s.char_indices().peekable();

    while let Some(&(position, c)) = chars.peek() {
        match c {
            '[' => {
                chars.next();
                let mut digits = String::new();
                let mut closed = false;
                for (_, d) in chars.by_ref() {
                    if d == ']' {
                        closed = true;
                        break;
                    }
                    digits.push(d);
                }
                if !closed {
                    return Err(PathParseError::UnterminatedIndex {
                        path: s.to_owned(),
                        position,
                    });
                }
                let index = digits
                    .parse::<usize>()
                    .ok()
                    .filter(|_| digits.bytes().all(|b| b.is_ascii_digit()))
                    .ok_or_else(|| PathParseError::InvalidIndex {
                        path: s.to_owned(),
                        position,
                        index: digits.clone(),
                    })?;
                steps.push(PathStep::Index(index));
            }
            '.' if steps.is_empty() => {
                return Err(PathParseError::EmptyField {
                    path: s.to_owned(),
                    position,
                });
            }
            '.' => {
                chars.next();
                let key = read_key(s, position + 1, &mut chars)?;
                steps.push(PathStep::Field(key));
            }
            ']' => {
                return Err(PathParseError::UnexpectedChar {
                    path: s.to_owned(),
                    position,
                    found: c,
                });
            }
            _ if steps.is_empty() => {
                let key = read_key(s, position, &mut chars)?;
                steps.push(PathStep::Field(key));
            }
            _ => {
                return Err(PathParseError::UnexpectedChar {
                    path: s.to_owned(),
                    position,
                    found: c,
                });
            }
        }
    }

    Ok(Path(steps))
}

/// Read a field name up to the next `.` or `[` (exclusive).
fn read_key(
    s: &str,
    start: usize,
    chars: &mut std::iter::Peekable<std::str::CharIndices<'_>>,
) -> Result<String, PathParseError> {
    let mut key = String::new();
    while let Some(&(position, c)) = chars.peek() {
        match c {
            '.' | '[' => break,
            ']' => {
                return Err(PathParseError::UnexpectedChar {
                    path: s.to_owned(),
                    position,
                    found: c,
                });
            }
            _ => {
                key.push(c);
                chars.next();
            }
        }
    }
    if key.is_empty() {
        return Err(PathParseError::EmptyField {
            path: s.to_owned(),
            position: start,
        });
    }
    Ok(key)
}

/// Render a structured path in string form. Inverse of
/// [`path_from_path_string()`] for keys free of `.`, `[` and `]`.
pub fn path_to_string(path: &Path) -> String {
    path.to_string()
}

/// A path proven to exist in a concrete value.
///
/// # Invariants
///
/// - The only constructor is [`shape_path()`] (plus [`ShapedPath::root()`],
///   which exists in every value).
/// - Every prefix of a `ShapedPath` is itself valid against the same value.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ShapedPath(Path);

impl ShapedPath {
    /// The root path, valid against any value.
    pub fn root() -> Self {
        Self(Path::root())
    }

    /// The underlying structured path.
    pub fn as_path(&self) -> &Path {
        &self.0
    }

    /// Consume into the underlying structured path.
    pub fn into_path(self) -> Path {
        self.0
    }

    /// The steps of this path, root first.
    pub fn steps(&self) -> &[PathStep] {
        self.0.steps()
    }

    /// Every prefix of this path, from the root to the path itself.
    pub fn prefixes(&self) -> Vec<ShapedPath> {
        (0..=self.0.len())
            .map(|n| ShapedPath(Path(self.0.steps()[..n].to_vec())))
            .collect()
    }

    /// Read the sub-value this path addresses.
    ///
    /// Returns `None` only when `value` is not shaped like the value this
    /// path was resolved against.
    pub fn lookup<'a>(&self, value: &'a Value) -> Option<&'a Value> {
        self.steps().iter().try_fold(value, step_into)
    }

    /// Mutable variant of [`ShapedPath::lookup()`].
    pub fn lookup_mut<'a>(&self, value: &'a mut Value) -> Option<&'a mut Value> {
        let mut current = value;
        for step in self.steps() {
            current = match (step, current) {
                (PathStep::Field(name), Value::Object(map)) => map.get_mut(name)?,
                (PathStep::Index(index), Value::Array(items)) => items.get_mut(*index)?,
                _ => return None,
            };
        }
        Some(current)
    }
}

impl fmt::Display for ShapedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

fn step_into<'a>(value: &'a Value, step: &PathStep) -> Option<&'a Value> {
    match (step, value) {
        (PathStep::Field(name), Value::Object(map)) => map.get(name),
        (PathStep::Index(index), Value::Array(items)) => items.get(*index),
        _ => None,
    }
}

/// Resolve `path` against `value`'s current shape.
///
/// Returns `None` if any step is absent: a missing field, an index at or
/// past the sequence length, a field step into a sequence, an index step
/// into an object, or any step into a primitive.
pub fn shape_path(value: &Value, path: &Path) -> Option<ShapedPath> {
    path.steps().iter().try_fold(value, step_into)?;
    Some(ShapedPath(path.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_dotted_and_bracketed() {
        let path = path_from_path_string("a.b[3].c").unwrap();
        assert_eq!(
            path.steps(),
            &[
                PathStep::Field("a".into()),
                PathStep::Field("b".into()),
                PathStep::Index(3),
                PathStep::Field("c".into()),
            ]
        );
    }

    #[test]
    fn test_parse_empty_is_root() {
        let path = path_from_path_string("").unwrap();
        assert!(path.is_empty());
        assert_eq!(path.to_string(), "");
    }

    #[test]
    fn test_parse_leading_index() {
        let path: Path = "[0].name".parse().unwrap();
        assert_eq!(path, Path::root().index(0).field("name"));
        assert_eq!(path.to_string(), "[0].name");
    }

    #[test]
    fn test_parse_consecutive_indices() {
        let path: Path = "grid[1][2]".parse().unwrap();
        assert_eq!(path, Path::root().field("grid").index(1).index(2));
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(matches!(
            path_from_path_string("a..b"),
            Err(PathParseError::EmptyField { position: 2, .. })
        ));
        assert!(matches!(
            path_from_path_string(".a"),
            Err(PathParseError::EmptyField { position: 0, .. })
        ));
        assert!(matches!(
            path_from_path_string("a."),
            Err(PathParseError::EmptyField { .. })
        ));
        assert!(matches!(
            path_from_path_string("a[x]"),
            Err(PathParseError::InvalidIndex { .. })
        ));
        assert!(matches!(
            path_from_path_string("a[-1]"),
            Err(PathParseError::InvalidIndex { .. })
        ));
        assert!(matches!(
            path_from_path_string("a[]"),
            Err(PathParseError::InvalidIndex { .. })
        ));
        assert!(matches!(
            path_from_path_string("a[1"),
            Err(PathParseError::UnterminatedIndex { position: 1, .. })
        ));
        assert!(matches!(
            path_from_path_string("a]"),
            Err(PathParseError::UnexpectedChar { found: ']', .. })
        ));
        assert!(matches!(
            path_from_path_string("a[0]b"),
            Err(PathParseError::UnexpectedChar { found: 'b', .. })
        ));
        assert!(matches!(
            path_from_path_string("a.[0]"),
            Err(PathParseError::EmptyField { .. })
        ));
    }

    #[test]
    fn test_shape_path_resolves_existing_steps() {
        let value = json!({"a": 1, "b": [2, 3]});
        let path = Path::root().field("b").index(1);
        let shaped = shape_path(&value, &path).expect("b[1] exists");
        assert_eq!(shaped.lookup(&value), Some(&json!(3)));
    }

    #[test]
    fn test_shape_path_rejects_absent_steps() {
        let value = json!({"a": 1, "b": [2, 3]});
        assert!(shape_path(&value, &Path::root().field("c")).is_none());
        assert!(shape_path(&value, &Path::root().field("b").index(2)).is_none());
        assert!(shape_path(&value, &Path::root().field("b").field("0")).is_none());
        assert!(shape_path(&value, &Path::root().index(0)).is_none());
        assert!(shape_path(&value, &Path::root().field("a").field("x")).is_none());
    }

    #[test]
    fn test_shape_path_root_always_resolves() {
        assert!(shape_path(&json!(null), &Path::root()).is_some());
        assert!(shape_path(&json!([]), &Path::root()).is_some());
    }

    #[test]
    fn test_prefixes_run_root_to_target() {
        let value = json!({"a": {"b": [1]}});
        let shaped = shape_path(&value, &Path::root().field("a").field("b").index(0)).unwrap();
        let prefixes: Vec<String> = shaped.prefixes().iter().map(|p| p.to_string()).collect();
        assert_eq!(prefixes, vec!["", "a", "a.b", "a.b[0]"]);
    }

    #[test]
    fn test_lookup_mut_writes_in_place() {
        let mut value = json!({"b": [2, 3]});
        let shaped = shape_path(&value, &Path::root().field("b").index(0)).unwrap();
        *shaped.lookup_mut(&mut value).unwrap() = json!(20);
        assert_eq!(value, json!({"b": [20, 3]}));
    }

    #[test]
    fn test_prefix_relations() {
        let a = Path::root().field("a");
        let ab = a.child("b");
        let c = Path::root().field("c");
        assert!(a.is_prefix_of(&ab));
        assert!(!ab.is_prefix_of(&a));
        assert!(a.is_related_to(&ab));
        assert!(ab.is_related_to(&a));
        assert!(!a.is_related_to(&c));
        assert_eq!(ab.parent(), Some(a));
        assert_eq!(Path::root().parent(), None);
    }

    #[test]
    fn test_path_serde() {
        let path = Path::root().field("users").index(0);
        let json = serde_json::to_string(&path).unwrap();
        assert_eq!(json, r#"["users",0]"#);
        let parsed: Path = serde_json::from_str(&json).unwrap();
        assert_eq!(path, parsed);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use crate::tree::ShapedTree;
    use proptest::prelude::*;

    /// JSON values with keys that have a string form.
    fn json_value() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(|n| serde_json::json!(n)),
            "[a-zA-Z0-9 ]{0,12}".prop_map(Value::String),
        ];
        leaf.prop_recursive(4, 48, 6, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
                prop::collection::btree_map("[a-z_][a-z0-9_]{0,7}", inner, 0..6)
                    .prop_map(|m| Value::Object(m.into_iter().collect())),
            ]
        })
    }

    proptest! {
        /// Every path into a value survives a trip through its string form.
        #[test]
        fn path_string_round_trip(value in json_value()) {
            let tree = ShapedTree::from_value(&value, || ());
            for (path, _) in tree.entries() {
                let rendered = path_to_string(&path);
                let parsed = path_from_path_string(&rendered);
                prop_assert!(
                    parsed.is_ok(),
                    "failed to parse '{}': {:?}",
                    rendered,
                    parsed.as_ref().err()
                );
                let reshaped = shape_path(&value, &parsed.unwrap());
                prop_assert_eq!(reshaped.map(ShapedPath::into_path), Some(path));
            }
        }

        /// The parser never panics on arbitrary input.
        #[test]
        fn parse_never_panics(s in "[a-z.\\[\\]0-9-]{0,16}") {
            let _ = path_from_path_string(&s);
        }
    }
}
