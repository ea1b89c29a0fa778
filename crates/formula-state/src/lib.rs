//! # formula-state — Form State Engine
//!
//! Builds the form-state layer on top of `formula-core`: the
//! `(value, tree)` pair, the per-node error and metadata model, server
//! error reconciliation, the validation registry and the feedback strategy
//! resolver. [`Form`] ties them together as the single writer a rendering
//! layer talks to.
//!
//! ## Modules
//!
//! - **Extras** (`extras.rs`): `MetaField`, dual-channel `Errors` with the
//!   `Pending` / `Unchecked` sentinels, and the pure `extras -> extras`
//!   transforms every write goes through.
//!
//! - **Form state** (`form_state.rs`): `FormState`, whose value and tree are
//!   only ever replaced together.
//!
//! - **Server errors** (`server_errors.rs`): idempotent reconciliation of a
//!   `path -> messages` payload; unresolvable keys are logged and skipped.
//!
//! - **Validation** (`validation.rs`): generation-stamped registry entries
//!   and the `ValidationHandle` capability returned to fields.
//!
//! - **Feedback** (`feedback.rs`): the six feedback strategies and the
//!   explicit `FeedbackContext` passed to field views.
//!
//! - **Form** (`form.rs`): the form owner and its event entry points.
//!
//! ## Design
//!
//! There is no ambient "current form". Field views receive their context
//! from the `Form` that produced them, and fields hold nothing but a
//! `ValidationHandle` scoped to their own registry entry.

pub mod config;
pub mod error;
pub mod extras;
pub mod feedback;
pub mod field;
pub mod form;
pub mod form_state;
pub mod server_errors;
pub mod validation;

// ─── Form re-exports ────────────────────────────────────────────────

pub use config::FormConfig;
pub use error::FormError;
pub use field::FieldView;
pub use form::Form;
pub use form_state::{flat_root_errors, get_extras, is_valid, FormState};

// ─── Model re-exports ───────────────────────────────────────────────

pub use extras::{
    set_extras_touched, ClientErrors, Errors, FieldExtras, MetaField, ServerErrors,
};
pub use feedback::{FeedbackContext, FeedbackStrategy};
pub use server_errors::{apply_server_errors_to_form_state, ReconcileReport, ServerErrorMap};

// ─── Validation re-exports ──────────────────────────────────────────

pub use validation::{
    validation_fn_no_ops, Validation, ValidationFn, ValidationHandle, ValidationRegistry,
    ValidationStamp,
};
