//! # Validation Registry — Generation-Stamped Field Validations
//!
//! The form owner keeps one [`ValidationRegistry`]. Each field registers a
//! [`ValidationFn`] for its path and receives a [`ValidationHandle`], the
//! only capability it holds over its registry entry.
//!
//! ## Entry Lifecycle
//!
//! ```text
//! register() ──▶ live, generation 0
//!                  │
//!        replace() │ generation += 1, function swapped
//!                  ▼
//!                live, generation n ──unregister()──▶ dead (permanent)
//! ```
//!
//! Registering again on a path that already has a live entry retires the
//! old entry (its handle becomes inert) and installs a new one. Every entry
//! has a registry-unique id, so a later registration on the same path is a
//! distinct entry even though its generation restarts at 0.
//!
//! ## Stale Results
//!
//! A validation run is identified by a [`ValidationStamp`]: path, entry id,
//! generation and epoch at the time the run started. A result is current
//! only if the registry's entry for that path is still live, has the same
//! id, and is still at the same generation and epoch. Anything else is
//! discarded at apply time. No task is ever cancelled.
//!
//! The epoch moves when the node behind an entry's path stops being the
//! node a run validated: a sequence edit or a shape-changing replacement
//! of an ancestor. Item paths are positional, so `items[1]` after removing
//! `items[0]` addresses a different item.
//!
//! ## Concurrency
//!
//! Entries sit behind `Arc<parking_lot::Mutex<_>>` so handles can outlive a
//! borrow of the registry. Locks are never held while a validation function
//! runs, so a function may call back into its own handle.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use formula_core::Path;
use parking_lot::Mutex;
use serde_json::Value;

/// Result of invoking a validation function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validation {
    /// The function finished synchronously with these messages.
    Complete(Vec<String>),
    /// The result will be delivered later with the run's stamp.
    Deferred,
}

/// Identifies one validation run.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ValidationStamp {
    path: Path,
    entry: u64,
    generation: u64,
    epoch: u64,
}

impl ValidationStamp {
    /// Path the run validates.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Registry entry the run belongs to.
    pub fn entry(&self) -> u64 {
        self.entry
    }

    /// Entry generation when the run started.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Entry epoch when the run started.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}

type ValidateFn = dyn Fn(&Value, &ValidationStamp) -> Validation + Send + Sync;

/// A field validation function.
///
/// It receives the sub-value at its path and the stamp of the run. A
/// deferred function keeps the stamp and hands it back with its messages
/// through `Form::on_validation_result`.
#[derive(Clone)]
pub struct ValidationFn(Arc<ValidateFn>);

impl ValidationFn {
    /// Wrap a function that may defer.
    pub fn new(f: impl Fn(&Value, &ValidationStamp) -> Validation + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    /// Wrap a synchronous function.
    pub fn sync(f: impl Fn(&Value) -> Vec<String> + Send + Sync + 'static) -> Self {
        Self::new(move |value, _| Validation::Complete(f(value)))
    }

    /// Invoke the function.
    pub fn call(&self, value: &Value, stamp: &ValidationStamp) -> Validation {
        (self.0)(value, stamp)
    }
}

impl fmt::Debug for ValidationFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ValidationFn(..)")
    }
}

#[derive(Debug)]
struct Entry {
    id: u64,
    path: Path,
    function: ValidationFn,
    generation: u64,
    /// Bumped when the node at `path` is replaced by a structural edit.
    epoch: u64,
    live: bool,
    /// Deferred runs of the current generation that have not reported.
    in_flight: usize,
}

impl Entry {
    fn stamp(&self) -> ValidationStamp {
        ValidationStamp {
            path: self.path.clone(),
            entry: self.id,
            generation: self.generation,
            epoch: self.epoch,
        }
    }

    fn is_current(&self, stamp: &ValidationStamp) -> bool {
        self.live
            && self.id == stamp.entry
            && self.generation == stamp.generation
            && self.epoch == stamp.epoch
    }
}

type SharedEntry = Arc<Mutex<Entry>>;

/// Per-path registry of validation functions.
#[derive(Debug, Default)]
pub struct ValidationRegistry {
    entries: BTreeMap<Path, SharedEntry>,
    next_id: u64,
}

impl ValidationRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `function` for `path` at generation 0.
    ///
    /// A live entry already registered for `path` is retired first; its
    /// handle stops having any effect and its pending results are dropped.
    pub fn register(&mut self, path: Path, function: ValidationFn) -> ValidationHandle {
        self.prune();

        if let Some(previous) = self.entries.get(&path) {
            let mut previous = previous.lock();
            if previous.live {
                tracing::warn!(
                    path = %path,
                    entry = previous.id,
                    "validation already registered for path, replacing the existing entry"
                );
                previous.live = false;
                previous.in_flight = 0;
            }
        }

        let id = self.next_id;
        self.next_id += 1;
        let entry = Arc::new(Mutex::new(Entry {
            id,
            path: path.clone(),
            function,
            generation: 0,
            epoch: 0,
            live: true,
            in_flight: 0,
        }));
        self.entries.insert(path, Arc::clone(&entry));
        ValidationHandle { entry: Some(entry) }
    }

    /// Whether a result stamped `stamp` should still be applied.
    pub fn is_current(&self, stamp: &ValidationStamp) -> bool {
        self.entries
            .get(&stamp.path)
            .is_some_and(|entry| entry.lock().is_current(stamp))
    }

    /// Whether a live entry exists for `path`.
    pub fn is_registered(&self, path: &Path) -> bool {
        self.entries.get(path).is_some_and(|entry| entry.lock().live)
    }

    /// Paths with a live entry, in path order.
    pub fn live_paths(&self) -> Vec<Path> {
        self.entries
            .iter()
            .filter(|(_, entry)| entry.lock().live)
            .map(|(path, _)| path.clone())
            .collect()
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.entries.values().filter(|entry| entry.lock().live).count()
    }

    /// Whether there are no live entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot the function and a fresh stamp for a run at `path`. The
    /// lock is released before the caller invokes the function.
    pub fn prepare_run(&self, path: &Path) -> Option<(ValidationFn, ValidationStamp)> {
        let entry = self.entries.get(path)?.lock();
        if !entry.live {
            return None;
        }
        Some((entry.function.clone(), entry.stamp()))
    }

    /// Record that the run stamped `stamp` deferred its result.
    pub fn mark_in_flight(&self, stamp: &ValidationStamp) {
        if let Some(entry) = self.entries.get(&stamp.path) {
            let mut entry = entry.lock();
            if entry.is_current(stamp) {
                entry.in_flight += 1;
            }
        }
    }

    /// Record that a deferred run reported. Returns whether the result is
    /// current and should be applied.
    pub fn settle(&self, stamp: &ValidationStamp) -> bool {
        let Some(entry) = self.entries.get(&stamp.path) else {
            return false;
        };
        let mut entry = entry.lock();
        if !entry.is_current(stamp) {
            return false;
        }
        entry.in_flight = entry.in_flight.saturating_sub(1);
        true
    }

    /// Whether a deferred run for the live entry at `path` is outstanding.
    pub fn in_flight(&self, path: &Path) -> bool {
        self.entries.get(path).is_some_and(|entry| {
            let entry = entry.lock();
            entry.live && entry.in_flight > 0
        })
    }

    /// Invalidate outstanding runs of every live entry strictly below
    /// `edited`. Called after a structural edit at `edited`, which may put a
    /// different node behind each of those paths. Returns how many entries
    /// were affected.
    pub fn invalidate_below(&self, edited: &Path) -> usize {
        let mut affected = 0;
        for (path, entry) in &self.entries {
            if path == edited || !edited.is_prefix_of(path) {
                continue;
            }
            let mut entry = entry.lock();
            if entry.live {
                entry.epoch += 1;
                entry.in_flight = 0;
                affected += 1;
            }
        }
        affected
    }

    /// Drop entries whose handles have unregistered.
    pub fn prune(&mut self) {
        self.entries.retain(|_, entry| entry.lock().live);
    }
}

/// Capability over a single registry entry.
///
/// Not `Clone`: one registration, one handle.
#[derive(Debug)]
pub struct ValidationHandle {
    entry: Option<SharedEntry>,
}

impl ValidationHandle {
    /// A handle that ignores `replace` and `unregister`. Used as a default
    /// before a field has registered anything.
    pub fn noop() -> Self {
        Self { entry: None }
    }

    /// Swap the function and bump the generation. Results from earlier
    /// generations will be discarded. Has no effect once the entry is dead.
    pub fn replace(&self, function: ValidationFn) {
        let Some(entry) = &self.entry else {
            return;
        };
        let mut entry = entry.lock();
        if !entry.live {
            tracing::debug!(path = %entry.path, "replace on a retired validation entry ignored");
            return;
        }
        entry.generation += 1;
        entry.function = function;
        entry.in_flight = 0;
    }

    /// Mark the entry dead. Pending results for it will be discarded.
    pub fn unregister(&self) {
        if let Some(entry) = &self.entry {
            let mut entry = entry.lock();
            entry.live = false;
            entry.in_flight = 0;
        }
    }

    /// Whether the entry is still live. Always false for a no-op handle.
    pub fn is_live(&self) -> bool {
        self.entry.as_ref().is_some_and(|entry| entry.lock().live)
    }

    /// Current generation of the entry.
    pub fn generation(&self) -> Option<u64> {
        self.entry.as_ref().map(|entry| entry.lock().generation)
    }

    /// Path of the entry.
    pub fn path(&self) -> Option<Path> {
        self.entry.as_ref().map(|entry| entry.lock().path.clone())
    }
}

impl Default for ValidationHandle {
    fn default() -> Self {
        Self::noop()
    }
}

/// A handle whose `replace` and `unregister` do nothing.
pub fn validation_fn_no_ops() -> ValidationHandle {
    ValidationHandle::noop()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn required() -> ValidationFn {
        ValidationFn::sync(|v| {
            if v.is_null() {
                vec!["required".into()]
            } else {
                vec![]
            }
        })
    }

    fn path(raw: &str) -> Path {
        raw.parse().unwrap()
    }

    #[test]
    fn test_register_starts_at_generation_zero() {
        let mut registry = ValidationRegistry::new();
        let handle = registry.register(path("a"), required());
        assert_eq!(handle.generation(), Some(0));
        assert!(handle.is_live());
        assert!(registry.is_registered(&path("a")));
        assert_eq!(registry.len(), 1);
        let (_, stamp) = registry.prepare_run(&path("a")).unwrap();
        assert_eq!(stamp.generation(), 0);
        assert!(registry.is_current(&stamp));
    }

    #[test]
    fn test_replace_invalidates_older_stamps() {
        let mut registry = ValidationRegistry::new();
        let handle = registry.register(path("a"), required());
        let (_, old) = registry.prepare_run(&path("a")).unwrap();

        handle.replace(required());
        assert_eq!(handle.generation(), Some(1));
        assert!(!registry.is_current(&old));
        let (_, new) = registry.prepare_run(&path("a")).unwrap();
        assert!(registry.is_current(&new));
        assert_eq!(new.generation(), 1);
    }

    #[test]
    fn test_unregister_invalidates_and_prunes() {
        let mut registry = ValidationRegistry::new();
        let handle = registry.register(path("a"), required());
        let (_, stamp) = registry.prepare_run(&path("a")).unwrap();

        handle.unregister();
        assert!(!handle.is_live());
        assert!(!registry.is_current(&stamp));
        assert!(registry.prepare_run(&path("a")).is_none());
        assert!(registry.is_empty());

        // Replace after unregister is inert.
        handle.replace(required());
        assert_eq!(handle.generation(), Some(0));

        registry.prune();
        assert!(registry.live_paths().is_empty());
    }

    #[test]
    fn test_reregistration_is_a_distinct_entry() {
        let mut registry = ValidationRegistry::new();
        let first = registry.register(path("a"), required());
        let (_, old) = registry.prepare_run(&path("a")).unwrap();
        first.unregister();

        let second = registry.register(path("a"), required());
        let (_, fresh) = registry.prepare_run(&path("a")).unwrap();
        assert_eq!(fresh.generation(), old.generation());
        assert_ne!(fresh.entry(), old.entry());
        assert!(!registry.is_current(&old));
        assert!(registry.is_current(&fresh));
        assert!(second.is_live());
    }

    #[test]
    fn test_double_registration_retires_previous_handle() {
        let mut registry = ValidationRegistry::new();
        let first = registry.register(path("a"), required());
        let second = registry.register(path("a"), required());

        assert!(!first.is_live());
        assert!(second.is_live());
        assert_eq!(registry.len(), 1);

        // The retired handle cannot disturb the new entry.
        first.unregister();
        first.replace(required());
        assert!(second.is_live());
        assert_eq!(second.generation(), Some(0));
    }

    #[test]
    fn test_in_flight_tracking() {
        let mut registry = ValidationRegistry::new();
        let handle = registry.register(path("a"), required());
        let (_, stamp) = registry.prepare_run(&path("a")).unwrap();

        registry.mark_in_flight(&stamp);
        assert!(registry.in_flight(&path("a")));
        assert!(registry.settle(&stamp));
        assert!(!registry.in_flight(&path("a")));

        registry.mark_in_flight(&stamp);
        handle.replace(required());
        assert!(!registry.in_flight(&path("a")));
        assert!(!registry.settle(&stamp));
    }

    #[test]
    fn test_invalidate_below_skips_the_edited_path_and_unrelated_paths() {
        let mut registry = ValidationRegistry::new();
        let _list = registry.register(path("items"), required());
        let item = registry.register(path("items[1]"), required());
        let _other = registry.register(path("name"), required());
        let stamps: Vec<ValidationStamp> = ["items", "items[1]", "name"]
            .iter()
            .map(|raw| registry.prepare_run(&path(raw)).unwrap().1)
            .collect();
        registry.mark_in_flight(&stamps[1]);

        assert_eq!(registry.invalidate_below(&path("items")), 1);
        assert!(registry.is_current(&stamps[0]));
        assert!(!registry.is_current(&stamps[1]));
        assert!(registry.is_current(&stamps[2]));
        assert!(!registry.in_flight(&path("items[1]")));

        // The generation is untouched; only the epoch moved.
        assert_eq!(item.generation(), Some(0));
        let (_, fresh) = registry.prepare_run(&path("items[1]")).unwrap();
        assert_eq!(fresh.epoch(), stamps[1].epoch() + 1);
        assert!(registry.is_current(&fresh));
    }

    #[test]
    fn test_noop_handle_is_inert() {
        let handle = validation_fn_no_ops();
        handle.replace(required());
        handle.unregister();
        assert!(!handle.is_live());
        assert_eq!(handle.generation(), None);
        assert_eq!(handle.path(), None);
    }

    #[test]
    fn test_sync_wrapper_completes() {
        let f = required();
        let stamp = ValidationStamp {
            path: Path::root(),
            entry: 0,
            generation: 0,
            epoch: 0,
        };
        assert_eq!(
            f.call(&serde_json::Value::Null, &stamp),
            Validation::Complete(vec!["required".into()])
        );
    }
}
