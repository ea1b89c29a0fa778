//! # Form Owner
//!
//! [`Form`] is the single writer of a form's state. It owns the
//! [`FormState`], the [`ValidationRegistry`], the form-level flags and the
//! last server payload, and it is the only entry point through which field
//! collaborators change anything.
//!
//! ## Event Flow
//!
//! ```text
//! on_change(path, v) ──▶ FormState::change ──▶ revalidate related paths
//! on_blur(path)      ──▶ FormState::touch_at
//! on_validation_result(stamp, errors)
//!                    ──▶ registry.settle(stamp)? ──▶ write client channel
//! set_server_errors(payload)
//!                    ──▶ identity changed? ──▶ reconcile server channel
//! ```
//!
//! A changed path is related to a registered path when one is a prefix of
//! the other: object and sequence validations see their children's edits,
//! and a field sees its parent being replaced wholesale.
//!
//! Sequence edits and shape-changing replacements also invalidate every
//! outstanding run registered strictly below the edited path, so a result
//! computed for one item never lands on the item that took its index.

use std::sync::Arc;

use formula_core::{shape_path, Path, ShapedPath};
use serde_json::Value;

use crate::config::FormConfig;
use crate::error::FormError;
use crate::extras::{set_extras_client_errors, set_extras_client_pending};
use crate::feedback::FeedbackContext;
use crate::field::FieldView;
use crate::form_state::FormState;
use crate::server_errors::{apply_server_errors_to_form_state, ReconcileReport, ServerErrorMap};
use crate::validation::{
    Validation, ValidationFn, ValidationHandle, ValidationRegistry, ValidationStamp,
};

/// The owner of one form instance.
#[derive(Debug)]
pub struct Form {
    state: FormState,
    registry: ValidationRegistry,
    config: FormConfig,
    pristine: bool,
    submitted: bool,
    server_errors: Option<Arc<ServerErrorMap>>,
    server_errors_applied: bool,
    last_report: ReconcileReport,
}

impl Form {
    /// A pristine, unsubmitted form over `value`.
    pub fn new(value: Value, config: FormConfig) -> Self {
        Self {
            state: FormState::new(value),
            registry: ValidationRegistry::new(),
            config,
            pristine: true,
            submitted: false,
            server_errors: None,
            server_errors_applied: false,
            last_report: ReconcileReport::default(),
        }
    }

    /// The current state.
    pub fn state(&self) -> &FormState {
        &self.state
    }

    /// The current root value.
    pub fn value(&self) -> &Value {
        self.state.value()
    }

    /// The validation registry.
    pub fn registry(&self) -> &ValidationRegistry {
        &self.registry
    }

    /// The configuration this form was created with.
    pub fn config(&self) -> &FormConfig {
        &self.config
    }

    /// Whether no node anywhere carries an error.
    pub fn is_valid(&self) -> bool {
        self.state.is_valid()
    }

    /// No change has been made since the form was created.
    pub fn is_pristine(&self) -> bool {
        self.pristine
    }

    /// The form has been submitted at least once.
    pub fn is_submitted(&self) -> bool {
        self.submitted
    }

    /// Report from the most recent server error reconciliation.
    pub fn last_reconcile_report(&self) -> &ReconcileReport {
        &self.last_report
    }

    /// The explicit context handed to field views.
    pub fn feedback_context(&self) -> FeedbackContext {
        FeedbackContext {
            strategy: self.config.feedback_strategy,
            pristine: self.pristine,
            submitted: self.submitted,
        }
    }

    /// Register `function` for the field at `raw`. Runs it immediately when
    /// `validate_on_register` is set.
    pub fn register_validation(
        &mut self,
        raw: &str,
        function: ValidationFn,
    ) -> Result<ValidationHandle, FormError> {
        let path = self.state.resolve(raw)?.into_path();
        let handle = self.registry.register(path.clone(), function);
        if self.config.validate_on_register {
            self.run_validation(&path)?;
        }
        Ok(handle)
    }

    /// Swap the function behind `handle` and re-run it. Results from the
    /// previous function are discarded. Returns the stamp if the new run
    /// deferred.
    pub fn replace_validation(
        &mut self,
        handle: &ValidationHandle,
        function: ValidationFn,
    ) -> Result<Option<ValidationStamp>, FormError> {
        handle.replace(function);
        match handle.path() {
            Some(path) if handle.is_live() => self.run_validation(&path),
            _ => Ok(None),
        }
    }

    /// Run every live validation. Returns the stamps of deferred runs.
    pub fn validate_all(&mut self) -> Result<Vec<ValidationStamp>, FormError> {
        let mut deferred = Vec::new();
        for path in self.registry.live_paths() {
            deferred.extend(self.run_validation(&path)?);
        }
        Ok(deferred)
    }

    /// Replace the sub-value at `raw`. Marks the field and its ancestors
    /// changed and re-runs related validations. Returns the stamps of
    /// deferred runs.
    pub fn on_change(
        &mut self,
        raw: &str,
        new_value: Value,
    ) -> Result<Vec<ValidationStamp>, FormError> {
        let path = self.state.resolve(raw)?;
        let reshaped = !self.state.tree().get_at_path(&path)?.matches_shape(&new_value);
        self.state = self.state.change(&path, new_value)?;
        if reshaped {
            self.invalidate_below(path.as_path());
        }
        self.after_change(path.as_path())
    }

    /// Mark the field at `raw` touched.
    pub fn on_blur(&mut self, raw: &str) -> Result<(), FormError> {
        self.state = self.state.touch_at(raw)?;
        Ok(())
    }

    /// Deliver the result of a deferred validation run. Returns whether the
    /// result was applied; stale results are dropped.
    pub fn on_validation_result(
        &mut self,
        stamp: &ValidationStamp,
        errors: Vec<String>,
    ) -> Result<bool, FormError> {
        if !self.registry.settle(stamp) {
            tracing::debug!(
                path = %stamp.path(),
                entry = stamp.entry(),
                generation = stamp.generation(),
                "discarding stale validation result"
            );
            return Ok(false);
        }
        let Some(path) = shape_path(self.state.value(), stamp.path()) else {
            tracing::debug!(
                path = %stamp.path(),
                "validated path no longer exists, dropping result"
            );
            return Ok(false);
        };
        self.state = self
            .state
            .update_extras(&path, |extras| set_extras_client_errors(extras, errors))?;
        Ok(true)
    }

    /// Supply the latest server error payload. Reconciles when the payload
    /// is a different allocation from the last one, or on first call.
    /// `None` clears every server channel.
    pub fn set_server_errors(
        &mut self,
        server_errors: Option<Arc<ServerErrorMap>>,
    ) -> &ReconcileReport {
        let same = match (&self.server_errors, &server_errors) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        };
        if same && self.server_errors_applied {
            return &self.last_report;
        }

        let (state, report) =
            apply_server_errors_to_form_state(server_errors.as_deref(), &self.state);
        if !report.is_complete() {
            tracing::warn!(
                unresolved = report.unresolved.len(),
                "server error payload had keys that did not match the form"
            );
        }
        self.state = state;
        self.server_errors = server_errors;
        self.server_errors_applied = true;
        self.last_report = report;
        &self.last_report
    }

    /// Insert `item` at `index` in the sequence at `raw`.
    pub fn insert_item(
        &mut self,
        raw: &str,
        index: usize,
        item: Value,
    ) -> Result<Vec<ValidationStamp>, FormError> {
        let path = self.state.resolve(raw)?.into_path();
        self.state = self.state.insert_item(raw, index, item)?;
        self.invalidate_below(&path);
        self.after_change(&path)
    }

    /// Remove the item at `index` from the sequence at `raw`.
    pub fn remove_item(
        &mut self,
        raw: &str,
        index: usize,
    ) -> Result<Vec<ValidationStamp>, FormError> {
        let path = self.state.resolve(raw)?.into_path();
        self.state = self.state.remove_item(raw, index)?;
        self.invalidate_below(&path);
        self.after_change(&path)
    }

    /// Move the item at `from` to `to` in the sequence at `raw`.
    pub fn move_item(
        &mut self,
        raw: &str,
        from: usize,
        to: usize,
    ) -> Result<Vec<ValidationStamp>, FormError> {
        let path = self.state.resolve(raw)?.into_path();
        self.state = self.state.move_item(raw, from, to)?;
        self.invalidate_below(&path);
        self.after_change(&path)
    }

    /// Mark the form submitted and hand the current value and `aux` to
    /// `on_submit`. Sending the value anywhere is the callback's job.
    pub fn submit<A, R>(&mut self, aux: A, on_submit: impl FnOnce(&Value, A) -> R) -> R {
        self.submitted = true;
        tracing::debug!(valid = self.state.is_valid(), "form submitted");
        on_submit(self.state.value(), aux)
    }

    /// The read-only view of the field at `raw`.
    pub fn field(&self, raw: &str) -> Result<FieldView, FormError> {
        let path = self.state.resolve(raw)?;
        self.field_at(&path)
    }

    /// The read-only view of the field at a resolved path.
    pub fn field_at(&self, path: &ShapedPath) -> Result<FieldView, FormError> {
        let extras = self.state.extras_at(path)?;
        let value = path.lookup(self.state.value()).cloned().unwrap_or(Value::Null);
        Ok(FieldView {
            path: path.to_string(),
            value,
            touched: extras.meta.touched,
            changed: extras.meta.changed,
            succeeded: extras.meta.succeeded,
            should_show_errors: self.feedback_context().should_show_error(&extras.meta),
            unfiltered_errors: extras.errors.flatten(),
            valid: self.state.is_valid_at(path)?,
            async_validation_in_flight: self.registry.in_flight(path.as_path()),
        })
    }

    /// Drop outstanding runs for fields below a structural edit at `edited`.
    fn invalidate_below(&self, edited: &Path) {
        let affected = self.registry.invalidate_below(edited);
        if affected > 0 {
            tracing::debug!(
                path = %edited,
                affected,
                "structural edit invalidated outstanding validation runs"
            );
        }
    }

    fn after_change(&mut self, changed: &Path) -> Result<Vec<ValidationStamp>, FormError> {
        self.pristine = false;
        let mut deferred = Vec::new();
        for path in self.registry.live_paths() {
            if path.is_related_to(changed) {
                deferred.extend(self.run_validation(&path)?);
            }
        }
        Ok(deferred)
    }

    /// Invoke the validation registered at `path` against the current
    /// value. Returns the stamp if the function deferred.
    fn run_validation(&mut self, path: &Path) -> Result<Option<ValidationStamp>, FormError> {
        let Some((function, stamp)) = self.registry.prepare_run(path) else {
            return Ok(None);
        };
        let Some(shaped) = shape_path(self.state.value(), path) else {
            tracing::debug!(path = %path, "registered path no longer exists, skipping validation");
            return Ok(None);
        };
        let outcome = match shaped.lookup(self.state.value()) {
            Some(value) => function.call(value, &stamp),
            None => return Ok(None),
        };

        match outcome {
            Validation::Complete(errors) => {
                self.state = self
                    .state
                    .update_extras(&shaped, |extras| set_extras_client_errors(extras, errors))?;
                Ok(None)
            }
            Validation::Deferred => {
                self.registry.mark_in_flight(&stamp);
                self.state = self.state.update_extras(&shaped, set_extras_client_pending)?;
                Ok(Some(stamp))
            }
        }
    }
}
