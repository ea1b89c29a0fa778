//! # Server-Error Reconciliation
//!
//! Merges an externally supplied `path -> messages` payload into the server
//! channel of a form's tree.
//!
//! ## Algorithm
//!
//! 1. Reset every node's server channel to `[]`. This is unconditional, so
//!    applying the same payload twice yields the same tree and a new payload
//!    never leaves residue from the previous one.
//! 2. For each key, parse and resolve it against the current value. On
//!    success, overwrite that node's server channel with the messages. On
//!    failure, log a warning, record the key in the report and move on.
//!
//! Reconciliation never fails as a whole and never touches the client
//! channel or the value.

use std::collections::BTreeMap;

use formula_core::{path_from_path_string, shape_path};

use crate::extras::{set_extras_server_errors, FieldExtras};
use crate::form_state::FormState;

/// Server error payload: string path to ordered messages.
pub type ServerErrorMap = BTreeMap<String, Vec<String>>;

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Keys that resolved and were written to the tree.
    pub applied: Vec<String>,
    /// Keys that were malformed or did not resolve against the value.
    pub unresolved: Vec<String>,
}

impl ReconcileReport {
    /// Whether every key in the payload was applied.
    pub fn is_complete(&self) -> bool {
        self.unresolved.is_empty()
    }
}

/// Apply `server_errors` to `state`, returning the new state and a report
/// of which keys were applied. `None` clears every server channel.
pub fn apply_server_errors_to_form_state(
    server_errors: Option<&ServerErrorMap>,
    state: &FormState,
) -> (FormState, ReconcileReport) {
    let mut report = ReconcileReport::default();
    let mut next = state.map_extras(|extras| set_extras_server_errors(extras, Vec::new()));

    let Some(server_errors) = server_errors else {
        return (next, report);
    };

    for (key, messages) in server_errors {
        let resolved = path_from_path_string(key)
            .ok()
            .and_then(|path| shape_path(state.value(), &path));
        let Some(path) = resolved else {
            tracing::warn!(
                key = %key,
                "server error key does not resolve against the form value, skipping"
            );
            report.unresolved.push(key.clone());
            continue;
        };

        let messages = messages.clone();
        match next.update_extras(&path, |extras: &FieldExtras| {
            set_extras_server_errors(extras, messages)
        }) {
            Ok(updated) => {
                next = updated;
                report.applied.push(key.clone());
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "failed to apply server error, skipping");
                report.unresolved.push(key.clone());
            }
        }
    }

    (next, report)
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn payload() -> impl Strategy<Value = Option<ServerErrorMap>> {
        let key = prop_oneof![
            Just("a".to_string()),
            Just("b".to_string()),
            Just("b[0]".to_string()),
            Just("b[1]".to_string()),
            Just("b[5]".to_string()),
            Just("c.d".to_string()),
            Just("".to_string()),
        ];
        prop::option::of(prop::collection::btree_map(
            key,
            prop::collection::vec("[a-z ]{1,10}", 0..3),
            0..5,
        ))
    }

    proptest! {
        /// Reconciling twice with the same payload equals reconciling once.
        #[test]
        fn reconciliation_is_idempotent(errors in payload()) {
            let state = FormState::new(json!({"a": 1, "b": [2, 3]}));
            let (once, _) = apply_server_errors_to_form_state(errors.as_ref(), &state);
            let (twice, _) = apply_server_errors_to_form_state(errors.as_ref(), &once);
            prop_assert_eq!(once, twice);
        }

        /// A later payload fully determines the server channel.
        #[test]
        fn reconciliation_has_no_memory(first in payload(), second in payload()) {
            let state = FormState::new(json!({"a": 1, "b": [2, 3]}));
            let (after_first, _) = apply_server_errors_to_form_state(first.as_ref(), &state);
            let (direct, _) = apply_server_errors_to_form_state(second.as_ref(), &state);
            let (via_first, _) = apply_server_errors_to_form_state(second.as_ref(), &after_first);
            prop_assert_eq!(direct, via_first);
        }
    }
}
