//! # Form State — The `(value, tree)` Pair
//!
//! [`FormState`] couples the user's value with a [`ShapedTree`] of
//! [`FieldExtras`]. Both halves are private and every transformation that
//! touches the value rebuilds the tree in the same call, so a `FormState`
//! can never be observed with a tree whose shape differs from its value.
//!
//! ## Update Discipline
//!
//! All tree writes are expressed as `extras -> extras` transforms applied to
//! the current tree. There is no API that writes a precomputed extras
//! record, so an update can never clobber a newer node with a stale
//! snapshot.
//!
//! ## Shape-Changing Edits
//!
//! - `change_at` keeps every subtree's extras when the new value has the
//!   same shape as the old one. Otherwise the subtree under the changed
//!   path is rebuilt with fresh extras; the changed node keeps its own.
//! - `insert_item`, `remove_item` and `move_item` edit a sequence in the
//!   value and the tree together. Moved items keep their extras.
//!
//! In every case the changed node and all of its ancestors are marked
//! `changed`.

use formula_core::{path_from_path_string, shape_path, Path, ShapedPath, ShapedTree, TreeError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::FormError;
use crate::extras::{set_extras_changed, set_extras_touched, FieldExtras};

/// The atomic unit of form state.
#[derive(Debug, Clone, PartialEq)]
pub struct FormState {
    value: Value,
    tree: ShapedTree<FieldExtras>,
}

impl FormState {
    /// Fresh state for `value`: client errors pending, server errors
    /// unchecked, all flags false.
    pub fn new(value: Value) -> Self {
        let tree = ShapedTree::from_value(&value, FieldExtras::default);
        Self { value, tree }
    }

    /// Fresh state for any serializable value.
    pub fn from_serialize<T: Serialize>(value: &T) -> Result<Self, FormError> {
        Ok(Self::new(serde_json::to_value(value)?))
    }

    /// The current value.
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// The current value, deserialized.
    pub fn value_as<T: DeserializeOwned>(&self) -> Result<T, FormError> {
        Ok(T::deserialize(&self.value)?)
    }

    /// The extras tree.
    pub fn tree(&self) -> &ShapedTree<FieldExtras> {
        &self.tree
    }

    /// Parse `raw` and resolve it against the current value.
    pub fn resolve(&self, raw: &str) -> Result<ShapedPath, FormError> {
        let path = path_from_path_string(raw)?;
        self.resolve_path(&path).ok_or_else(|| FormError::UnresolvedPath {
            path: raw.to_owned(),
        })
    }

    /// Resolve a structured path against the current value.
    pub fn resolve_path(&self, path: &Path) -> Option<ShapedPath> {
        shape_path(&self.value, path)
    }

    /// Root extras.
    pub fn root_extras(&self) -> &FieldExtras {
        self.tree.extras()
    }

    /// Extras of the node at `path`.
    pub fn extras_at(&self, path: &ShapedPath) -> Result<&FieldExtras, FormError> {
        Ok(self.tree.get_at_path(path)?.extras())
    }

    /// Client and server messages at the root only.
    pub fn flat_root_errors(&self) -> Vec<String> {
        self.root_extras().errors.flatten()
    }

    /// Whether no node anywhere carries an error.
    pub fn is_valid(&self) -> bool {
        self.tree.all(&|extras: &FieldExtras| extras.errors.is_clean())
    }

    /// Whether no node in the subtree at `path` carries an error.
    pub fn is_valid_at(&self, path: &ShapedPath) -> Result<bool, FormError> {
        Ok(self
            .tree
            .get_at_path(path)?
            .all(&|extras: &FieldExtras| extras.errors.is_clean()))
    }

    /// Apply `f` to the extras at `path`. The value is unchanged.
    pub fn update_extras(
        &self,
        path: &ShapedPath,
        f: impl FnOnce(&FieldExtras) -> FieldExtras,
    ) -> Result<Self, FormError> {
        Ok(self.with_tree(self.tree.update_at_path(path, f)?))
    }

    /// [`FormState::update_extras`] addressed by string path.
    pub fn update_extras_at(
        &self,
        raw: &str,
        f: impl FnOnce(&FieldExtras) -> FieldExtras,
    ) -> Result<Self, FormError> {
        let path = self.resolve(raw)?;
        self.update_extras(&path, f)
    }

    /// Apply `f` to every node's extras. The value is unchanged.
    pub fn map_extras(&self, f: impl FnMut(&FieldExtras) -> FieldExtras) -> Self {
        self.with_tree(self.tree.map(f))
    }

    /// Mark the node at `raw` as touched.
    pub fn touch_at(&self, raw: &str) -> Result<Self, FormError> {
        self.update_extras_at(raw, set_extras_touched)
    }

    /// Replace the sub-value at `raw` with `new_value`.
    pub fn change_at(&self, raw: &str, new_value: Value) -> Result<Self, FormError> {
        let path = self.resolve(raw)?;
        self.change(&path, new_value)
    }

    /// Replace the sub-value at a resolved path with `new_value`.
    pub fn change(&self, path: &ShapedPath, new_value: Value) -> Result<Self, FormError> {
        let mut value = self.value.clone();
        let slot = path.lookup_mut(&mut value).ok_or_else(|| unresolved(path))?;

        let subtree = self.tree.get_at_path(path)?;
        let tree = if subtree.matches_shape(&new_value) {
            self.tree.clone()
        } else {
            let fresh = ShapedTree::from_value(&new_value, FieldExtras::default)
                .with_extras(subtree.extras().clone());
            self.tree.replace_at_path(path, fresh)?
        };
        *slot = new_value;

        let tree = mark_changed(tree, path)?;
        Ok(Self { value, tree })
    }

    /// Insert `item` at `index` in the sequence at `raw`.
    pub fn insert_item(&self, raw: &str, index: usize, item: Value) -> Result<Self, FormError> {
        let path = self.resolve(raw)?;
        let child = ShapedTree::from_value(&item, FieldExtras::default);
        let tree = self.tree.insert_child(&path, index, child)?;
        let mut value = self.value.clone();
        sequence_mut(&mut value, &path)?.insert(index, item);
        Ok(Self {
            value,
            tree: mark_changed(tree, &path)?,
        })
    }

    /// Remove the item at `index` from the sequence at `raw`.
    pub fn remove_item(&self, raw: &str, index: usize) -> Result<Self, FormError> {
        let path = self.resolve(raw)?;
        let tree = self.tree.remove_child(&path, index)?;
        let mut value = self.value.clone();
        sequence_mut(&mut value, &path)?.remove(index);
        Ok(Self {
            value,
            tree: mark_changed(tree, &path)?,
        })
    }

    /// Move the item at `from` to `to` in the sequence at `raw`.
    pub fn move_item(&self, raw: &str, from: usize, to: usize) -> Result<Self, FormError> {
        let path = self.resolve(raw)?;
        let tree = self.tree.move_child(&path, from, to)?;
        let mut value = self.value.clone();
        let items = sequence_mut(&mut value, &path)?;
        let moved = items.remove(from);
        items.insert(to, moved);
        Ok(Self {
            value,
            tree: mark_changed(tree, &path)?,
        })
    }

    /// Same value, new tree. The caller guarantees the tree still mirrors
    /// the value; every call site derives `tree` from `self.tree` by an
    /// extras-only transform.
    pub(crate) fn with_tree(&self, tree: ShapedTree<FieldExtras>) -> Self {
        Self {
            value: self.value.clone(),
            tree,
        }
    }
}

/// Mark the node at `path` and every ancestor as changed.
fn mark_changed(
    tree: ShapedTree<FieldExtras>,
    path: &ShapedPath,
) -> Result<ShapedTree<FieldExtras>, TreeError> {
    path.prefixes()
        .iter()
        .try_fold(tree, |tree, prefix| tree.update_at_path(prefix, set_extras_changed))
}

fn sequence_mut<'a>(
    value: &'a mut Value,
    path: &ShapedPath,
) -> Result<&'a mut Vec<Value>, FormError> {
    match path.lookup_mut(value) {
        Some(Value::Array(items)) => Ok(items),
        Some(_) => Err(TreeError::NotASequence {
            path: path.to_string(),
        }
        .into()),
        None => Err(unresolved(path)),
    }
}

fn unresolved(path: &ShapedPath) -> FormError {
    FormError::UnresolvedPath {
        path: path.to_string(),
    }
}

/// Whether every node of `state` is free of errors.
pub fn is_valid(state: &FormState) -> bool {
    state.is_valid()
}

/// Root extras of `state`.
pub fn get_extras(state: &FormState) -> &FieldExtras {
    state.root_extras()
}

/// Flattened errors at the root of `state`.
pub fn flat_root_errors(state: &FormState) -> Vec<String> {
    state.flat_root_errors()
}
