//! # Shaped Tree — Persistent Extras Tree
//!
//! A [`ShapedTree<E>`] mirrors the shape of a `serde_json::Value`: object
//! nodes map field names to children, sequence nodes hold an ordered list
//! of children, and every other value is a leaf. Each node carries an
//! extras payload `E` that is independent of the value's leaf contents.
//!
//! ## Structural Sharing
//!
//! Nodes live behind `Arc`. Path-addressed updates reallocate only the
//! nodes on the root→target path; every sibling subtree is shared with the
//! input tree. Cloning a tree is a reference-count bump.
//!
//! ```text
//!        root'            root
//!       /     \          /    \
//!     a'       b  <--- shared  b
//!      |
//!    a[0]' (updated)
//! ```
//!
//! ## Shape Errors
//!
//! Every path-addressed operation takes a [`ShapedPath`] and returns
//! `Err(TreeError::ShapeMismatch)` when the path does not fit the tree.
//! That can only happen if the path was resolved against a value the tree
//! does not mirror, so it is reported rather than ignored.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;

use crate::error::TreeError;
use crate::path::{Path, PathStep, ShapedPath};

/// One node of a [`ShapedTree`].
#[derive(Debug)]
pub enum Node<E> {
    /// Mirrors a JSON object.
    Object {
        /// Payload for this node.
        extras: E,
        /// One child per object field.
        children: BTreeMap<String, ShapedTree<E>>,
    },
    /// Mirrors a JSON array.
    Sequence {
        /// Payload for this node.
        extras: E,
        /// One child per element, in order.
        children: Vec<ShapedTree<E>>,
    },
    /// Mirrors any primitive (null, bool, number, string).
    Leaf {
        /// Payload for this node.
        extras: E,
    },
}

/// A persistent tree isomorphic to the shape of a value.
#[derive(Debug)]
pub struct ShapedTree<E>(Arc<Node<E>>);

impl<E> Clone for ShapedTree<E> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<E: PartialEq> PartialEq for ShapedTree<E> {
    fn eq(&self, other: &Self) -> bool {
        if Arc::ptr_eq(&self.0, &other.0) {
            return true;
        }
        match (self.node(), other.node()) {
            (
                Node::Object { extras: a, children: ca },
                Node::Object { extras: b, children: cb },
            ) => a == b && ca == cb,
            (
                Node::Sequence { extras: a, children: ca },
                Node::Sequence { extras: b, children: cb },
            ) => a == b && ca == cb,
            (Node::Leaf { extras: a }, Node::Leaf { extras: b }) => a == b,
            _ => false,
        }
    }
}

impl<E> ShapedTree<E> {
    /// Build a tree matching `value`'s shape. Every node gets its own extras
    /// value from `make_extras`; nothing is shared between nodes.
    pub fn from_value(value: &Value, mut make_extras: impl FnMut() -> E) -> Self {
        Self::build(value, &mut make_extras)
    }

    fn build(value: &Value, make_extras: &mut impl FnMut() -> E) -> Self {
        let node = match value {
            Value::Object(map) => {
                let extras = make_extras();
                let children = map
                    .iter()
                    .map(|(k, v)| (k.clone(), Self::build(v, make_extras)))
                    .collect();
                Node::Object { extras, children }
            }
            Value::Array(items) => {
                let extras = make_extras();
                let children = items.iter().map(|v| Self::build(v, make_extras)).collect();
                Node::Sequence { extras, children }
            }
            _ => Node::Leaf {
                extras: make_extras(),
            },
        };
        Self(Arc::new(node))
    }

    /// The node at the root of this tree.
    pub fn node(&self) -> &Node<E> {
        &self.0
    }

    /// The root node's extras.
    pub fn extras(&self) -> &E {
        match self.node() {
            Node::Object { extras, .. } | Node::Sequence { extras, .. } | Node::Leaf { extras } => {
                extras
            }
        }
    }

    /// Whether two trees are the same allocation.
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }

    /// Whether this tree has exactly the shape of `value`.
    pub fn matches_shape(&self, value: &Value) -> bool {
        match (self.node(), value) {
            (Node::Object { children, .. }, Value::Object(map)) => {
                children.len() == map.len()
                    && map
                        .iter()
                        .all(|(k, v)| children.get(k).is_some_and(|c| c.matches_shape(v)))
            }
            (Node::Sequence { children, .. }, Value::Array(items)) => {
                children.len() == items.len()
                    && children.iter().zip(items).all(|(c, v)| c.matches_shape(v))
            }
            (Node::Leaf { .. }, v) => !v.is_object() && !v.is_array(),
            _ => false,
        }
    }

    /// The subtree at `path`.
    pub fn get_at_path(&self, path: &ShapedPath) -> Result<&ShapedTree<E>, TreeError> {
        let mut current = self;
        for (i, step) in path.steps().iter().enumerate() {
            current = current
                .child(step)
                .ok_or_else(|| mismatch(path.as_path(), i))?;
        }
        Ok(current)
    }

    fn child(&self, step: &PathStep) -> Option<&ShapedTree<E>> {
        match (step, self.node()) {
            (PathStep::Field(name), Node::Object { children, .. }) => children.get(name),
            (PathStep::Index(index), Node::Sequence { children, .. }) => children.get(*index),
            _ => None,
        }
    }

    /// Every node's path and extras, depth first, parents before children.
    pub fn entries(&self) -> Vec<(Path, &E)> {
        let mut out = Vec::new();
        self.collect_entries(Path::root(), &mut out);
        out
    }

    fn collect_entries<'a>(&'a self, path: Path, out: &mut Vec<(Path, &'a E)>) {
        out.push((path.clone(), self.extras()));
        match self.node() {
            Node::Object { children, .. } => {
                for (name, child) in children {
                    child.collect_entries(path.child(name.as_str()), out);
                }
            }
            Node::Sequence { children, .. } => {
                for (i, child) in children.iter().enumerate() {
                    child.collect_entries(path.child(i), out);
                }
            }
            Node::Leaf { .. } => {}
        }
    }

    /// Whether `pred` holds for every node's extras.
    pub fn all(&self, pred: &impl Fn(&E) -> bool) -> bool {
        if !pred(self.extras()) {
            return false;
        }
        match self.node() {
            Node::Object { children, .. } => children.values().all(|c| c.all(pred)),
            Node::Sequence { children, .. } => children.iter().all(|c| c.all(pred)),
            Node::Leaf { .. } => true,
        }
    }

    /// A new tree of the same shape with every node's extras replaced by
    /// `f(extras)`.
    pub fn map<F>(&self, mut f: impl FnMut(&E) -> F) -> ShapedTree<F> {
        self.map_with(&mut f)
    }

    fn map_with<F>(&self, f: &mut impl FnMut(&E) -> F) -> ShapedTree<F> {
        let node = match self.node() {
            Node::Object { extras, children } => {
                let extras = f(extras);
                let children = children
                    .iter()
                    .map(|(k, c)| (k.clone(), c.map_with(f)))
                    .collect();
                Node::Object { extras, children }
            }
            Node::Sequence { extras, children } => {
                let extras = f(extras);
                let children = children.iter().map(|c| c.map_with(f)).collect();
                Node::Sequence { extras, children }
            }
            Node::Leaf { extras } => Node::Leaf { extras: f(extras) },
        };
        ShapedTree(Arc::new(node))
    }
}

impl<E: Clone> ShapedTree<E> {
    /// A shallow copy of this node with new extras. Children are shared.
    pub fn with_extras(&self, extras: E) -> Self {
        let node = match self.node() {
            Node::Object { children, .. } => Node::Object {
                extras,
                children: children.clone(),
            },
            Node::Sequence { children, .. } => Node::Sequence {
                extras,
                children: children.clone(),
            },
            Node::Leaf { .. } => Node::Leaf { extras },
        };
        Self(Arc::new(node))
    }

    /// A new tree with only the root's extras replaced by `f(extras)`.
    pub fn map_root(&self, f: impl FnOnce(&E) -> E) -> Self {
        self.with_extras(f(self.extras()))
    }

    /// A new tree identical to this one except the node at `path` has its
    /// extras replaced by `updater(old)`.
    ///
    /// Only the nodes from the root to the target are reallocated. Updates
    /// at distinct paths commute.
    pub fn update_at_path(
        &self,
        path: &ShapedPath,
        updater: impl FnOnce(&E) -> E,
    ) -> Result<Self, TreeError> {
        self.rebuild(path.as_path(), 0, |node| Ok(node.map_root(updater)))
    }

    /// A new tree with the subtree at `path` replaced by `subtree`.
    pub fn replace_at_path(
        &self,
        path: &ShapedPath,
        subtree: ShapedTree<E>,
    ) -> Result<Self, TreeError> {
        self.rebuild(path.as_path(), 0, |_| Ok(subtree))
    }

    /// Insert `child` at `index` in the sequence node at `path`.
    /// `index` may equal the sequence length (append).
    pub fn insert_child(
        &self,
        path: &ShapedPath,
        index: usize,
        child: ShapedTree<E>,
    ) -> Result<Self, TreeError> {
        self.edit_sequence(path, |children| {
            if index > children.len() {
                return Err(index);
            }
            children.insert(index, child);
            Ok(())
        })
    }

    /// Remove the child at `index` from the sequence node at `path`.
    pub fn remove_child(&self, path: &ShapedPath, index: usize) -> Result<Self, TreeError> {
        self.edit_sequence(path, |children| {
            if index >= children.len() {
                return Err(index);
            }
            children.remove(index);
            Ok(())
        })
    }

    /// Move the child at `from` so it ends up at `to` in the sequence node
    /// at `path`. The moved subtree keeps its extras.
    pub fn move_child(&self, path: &ShapedPath, from: usize, to: usize) -> Result<Self, TreeError> {
        self.edit_sequence(path, |children| {
            let len = children.len();
            if from >= len {
                return Err(from);
            }
            if to >= len {
                return Err(to);
            }
            let moved = children.remove(from);
            children.insert(to, moved);
            Ok(())
        })
    }

    fn edit_sequence(
        &self,
        path: &ShapedPath,
        edit: impl FnOnce(&mut Vec<ShapedTree<E>>) -> Result<(), usize>,
    ) -> Result<Self, TreeError> {
        self.rebuild(path.as_path(), 0, |node| match node.node() {
            Node::Sequence { extras, children } => {
                let mut children = children.clone();
                let len = children.len();
                edit(&mut children).map_err(|index| TreeError::IndexOutOfRange {
                    path: path.to_string(),
                    index,
                    len,
                })?;
                Ok(ShapedTree(Arc::new(Node::Sequence {
                    extras: extras.clone(),
                    children,
                })))
            }
            _ => Err(TreeError::NotASequence {
                path: path.to_string(),
            }),
        })
    }

    /// Copy the root→target spine of the tree, replacing the target subtree
    /// with `at_target(old_target)`.
    fn rebuild(
        &self,
        path: &Path,
        depth: usize,
        at_target: impl FnOnce(&ShapedTree<E>) -> Result<ShapedTree<E>, TreeError>,
    ) -> Result<Self, TreeError> {
        let Some(step) = path.steps().get(depth) else {
            return at_target(self);
        };
        let node = match (step, self.node()) {
            (PathStep::Field(name), Node::Object { extras, children }) => {
                let child = children.get(name).ok_or_else(|| mismatch(path, depth))?;
                let mut children = children.clone();
                children.insert(name.clone(), child.rebuild(path, depth + 1, at_target)?);
                Node::Object {
                    extras: extras.clone(),
                    children,
                }
            }
            (PathStep::Index(index), Node::Sequence { extras, children }) => {
                let child = children.get(*index).ok_or_else(|| mismatch(path, depth))?;
                let mut children = children.clone();
                children[*index] = child.rebuild(path, depth + 1, at_target)?;
                Node::Sequence {
                    extras: extras.clone(),
                    children,
                }
            }
            _ => return Err(mismatch(path, depth)),
        };
        Ok(Self(Arc::new(node)))
    }
}

fn mismatch(path: &Path, step: usize) -> TreeError {
    TreeError::ShapeMismatch {
        path: path.to_string(),
        step,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::shape_path;
    use serde_json::json;

    fn shaped(value: &Value, raw: &str) -> ShapedPath {
        let path: Path = raw.parse().unwrap();
        shape_path(value, &path).unwrap()
    }

    #[test]
    fn test_from_value_mirrors_shape() {
        let value = json!({"a": 1, "b": [2, {"c": null}]});
        let tree = ShapedTree::from_value(&value, || 0u32);
        assert!(tree.matches_shape(&value));
        let paths: Vec<String> = tree.entries().iter().map(|(p, _)| p.to_string()).collect();
        assert_eq!(paths, vec!["", "a", "b", "b[0]", "b[1]", "b[1].c"]);
    }

    #[test]
    fn test_from_value_calls_make_extras_per_node() {
        let value = json!({"a": [1, 2], "b": "x"});
        let mut counter = 0;
        let tree = ShapedTree::from_value(&value, || {
            counter += 1;
            counter
        });
        let mut seen: Vec<u32> = tree.entries().iter().map(|(_, e)| **e).collect();
        seen.sort_unstable();
        assert_eq!(seen, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_matches_shape_detects_divergence() {
        let tree = ShapedTree::from_value(&json!({"a": [1, 2]}), || ());
        assert!(tree.matches_shape(&json!({"a": ["x", true]})));
        assert!(!tree.matches_shape(&json!({"a": [1]})));
        assert!(!tree.matches_shape(&json!({"a": [1, 2], "b": 3})));
        assert!(!tree.matches_shape(&json!({"a": {"0": 1, "1": 2}})));
        assert!(!tree.matches_shape(&json!([1, 2])));
    }

    #[test]
    fn test_update_at_path_touches_only_target() {
        let value = json!({"a": {"x": 1}, "b": [2, 3]});
        let tree = ShapedTree::from_value(&value, || 0u32);
        let updated = tree
            .update_at_path(&shaped(&value, "b[1]"), |n| n + 7)
            .unwrap();

        let b1 = updated.get_at_path(&shaped(&value, "b[1]")).unwrap();
        assert_eq!(*b1.extras(), 7);
        let b0 = updated.get_at_path(&shaped(&value, "b[0]")).unwrap();
        assert_eq!(*b0.extras(), 0);
        assert_eq!(*updated.extras(), 0);
        // Original untouched.
        assert_eq!(*tree.get_at_path(&shaped(&value, "b[1]")).unwrap().extras(), 0);
    }

    #[test]
    fn test_update_at_path_shares_siblings() {
        let value = json!({"a": {"x": 1}, "b": [2, 3]});
        let tree = ShapedTree::from_value(&value, || 0u32);
        let updated = tree.update_at_path(&shaped(&value, "b[0]"), |n| n + 1).unwrap();

        let a_before = tree.get_at_path(&shaped(&value, "a")).unwrap();
        let a_after = updated.get_at_path(&shaped(&value, "a")).unwrap();
        assert!(ShapedTree::ptr_eq(a_before, a_after));

        let b1_before = tree.get_at_path(&shaped(&value, "b[1]")).unwrap();
        let b1_after = updated.get_at_path(&shaped(&value, "b[1]")).unwrap();
        assert!(ShapedTree::ptr_eq(b1_before, b1_after));

        assert!(!ShapedTree::ptr_eq(&tree, &updated));
    }

    #[test]
    fn test_update_with_foreign_path_fails_loudly() {
        let tree = ShapedTree::from_value(&json!({"a": 1}), || 0u32);
        let other = json!({"z": [1]});
        let err = tree
            .update_at_path(&shaped(&other, "z[0]"), |n| n + 1)
            .unwrap_err();
        assert_eq!(
            err,
            TreeError::ShapeMismatch {
                path: "z[0]".into(),
                step: 0
            }
        );
    }

    #[test]
    fn test_map_and_map_root() {
        let value = json!({"a": [1, 2]});
        let tree = ShapedTree::from_value(&value, || 1u32);
        let doubled = tree.map(|n| n * 2);
        assert!(doubled.all(&|n| *n == 2));
        assert!(doubled.matches_shape(&value));

        let rooted = tree.map_root(|n| n + 10);
        assert_eq!(*rooted.extras(), 11);
        assert_eq!(*rooted.get_at_path(&shaped(&value, "a")).unwrap().extras(), 1);
    }

    #[test]
    fn test_map_can_change_extras_type() {
        let tree = ShapedTree::from_value(&json!([1, 2]), || 3u32);
        let labels: ShapedTree<String> = tree.map(|n| format!("#{n}"));
        assert_eq!(labels.extras(), "#3");
    }

    #[test]
    fn test_replace_at_path_swaps_subtree() {
        let value = json!({"a": 1});
        let tree = ShapedTree::from_value(&value, || 0u32);
        let replacement = ShapedTree::from_value(&json!([1, 2, 3]), || 9u32);
        let replaced = tree.replace_at_path(&shaped(&value, "a"), replacement).unwrap();
        assert!(replaced.matches_shape(&json!({"a": [0, 0, 0]})));
    }

    #[test]
    fn test_sequence_edits() {
        let value = json!({"items": ["a", "b", "c"]});
        let tree = ShapedTree::from_value(&value, || 0u32);
        let items = shaped(&value, "items");
        let tagged = tree
            .update_at_path(&shaped(&value, "items[0]"), |_| 1)
            .unwrap()
            .update_at_path(&shaped(&value, "items[2]"), |_| 3)
            .unwrap();

        let moved = tagged.move_child(&items, 0, 2).unwrap();
        let order: Vec<u32> = moved.entries().iter().skip(2).map(|(_, e)| **e).collect();
        assert_eq!(order, vec![0, 3, 1]);

        let removed = tagged.remove_child(&items, 1).unwrap();
        assert!(removed.matches_shape(&json!({"items": [1, 2]})));

        let inserted = tagged
            .insert_child(&items, 3, ShapedTree::from_value(&json!("d"), || 4))
            .unwrap();
        assert!(inserted.matches_shape(&json!({"items": [1, 2, 3, 4]})));
    }

    #[test]
    fn test_sequence_edit_errors() {
        let value = json!({"items": [1], "name": "x"});
        let tree = ShapedTree::from_value(&value, || ());
        let items = shaped(&value, "items");
        assert!(matches!(
            tree.remove_child(&items, 1),
            Err(TreeError::IndexOutOfRange { index: 1, len: 1, .. })
        ));
        assert!(matches!(
            tree.insert_child(&items, 2, ShapedTree::from_value(&json!(0), || ())),
            Err(TreeError::IndexOutOfRange { index: 2, .. })
        ));
        assert!(matches!(
            tree.move_child(&items, 0, 1),
            Err(TreeError::IndexOutOfRange { index: 1, .. })
        ));
        assert!(matches!(
            tree.remove_child(&shaped(&value, "name"), 0),
            Err(TreeError::NotASequence { .. })
        ));
    }
}
