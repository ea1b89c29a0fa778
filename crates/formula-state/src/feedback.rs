//! # Feedback Strategy Resolver
//!
//! Decides whether a field's accumulated errors are shown, as a pure
//! function of the strategy, the field's [`MetaField`] and the form-level
//! `submitted` flag.
//!
//! | Strategy | Shows errors when |
//! |---|---|
//! | `Always` | always |
//! | `OnFirstTouch` | `meta.touched` |
//! | `OnFirstChange` | `meta.changed` |
//! | `OnFirstSuccess` | `meta.succeeded` |
//! | `OnFirstSuccessOrFirstBlur` | `meta.succeeded \|\| meta.touched` |
//! | `OnSubmit` | the form has been submitted |
//!
//! The enum is closed and every variant has a predicate.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::FormError;
use crate::extras::MetaField;

/// Policy controlling when errors become visible.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackStrategy {
    /// Errors are always visible.
    Always,
    /// Visible after the field first loses focus.
    #[default]
    OnFirstTouch,
    /// Visible after the field's value first changes.
    OnFirstChange,
    /// Visible after the field first validates cleanly.
    OnFirstSuccess,
    /// Visible after a clean validation or the first blur, whichever comes first.
    OnFirstSuccessOrFirstBlur,
    /// Visible once the form has been submitted.
    OnSubmit,
}

impl FeedbackStrategy {
    /// All strategies, in declaration order.
    pub fn all() -> [Self; 6] {
        [
            Self::Always,
            Self::OnFirstTouch,
            Self::OnFirstChange,
            Self::OnFirstSuccess,
            Self::OnFirstSuccessOrFirstBlur,
            Self::OnSubmit,
        ]
    }

    /// The canonical snake_case name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Always => "always",
            Self::OnFirstTouch => "on_first_touch",
            Self::OnFirstChange => "on_first_change",
            Self::OnFirstSuccess => "on_first_success",
            Self::OnFirstSuccessOrFirstBlur => "on_first_success_or_first_blur",
            Self::OnSubmit => "on_submit",
        }
    }

    /// Whether errors should be shown for a field with `meta`.
    pub fn resolve(self, meta: &MetaField, submitted: bool) -> bool {
        match self {
            Self::Always => true,
            Self::OnFirstTouch => meta.touched,
            Self::OnFirstChange => meta.changed,
            Self::OnFirstSuccess => meta.succeeded,
            Self::OnFirstSuccessOrFirstBlur => meta.succeeded || meta.touched,
            Self::OnSubmit => submitted,
        }
    }

    /// The strategy as a `MetaField -> bool` predicate for a form whose
    /// submitted flag is `submitted`.
    pub fn predicate(self, submitted: bool) -> impl Fn(&MetaField) -> bool {
        move |meta: &MetaField| self.resolve(meta, submitted)
    }
}

impl fmt::Display for FeedbackStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FeedbackStrategy {
    type Err = FormError;

    /// Parse a strategy from the name produced by [`FeedbackStrategy::name()`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .into_iter()
            .find(|strategy| strategy.name() == s)
            .ok_or_else(|| FormError::UnknownStrategy { name: s.to_owned() })
    }
}

/// Form-level context handed to field views by the form owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedbackContext {
    /// Strategy configured for the form.
    pub strategy: FeedbackStrategy,
    /// No value has changed since the form was created.
    pub pristine: bool,
    /// The form has been submitted at least once.
    pub submitted: bool,
}

impl FeedbackContext {
    /// Whether a field with `meta` should display its errors. Submitting
    /// the form reveals errors under every strategy.
    pub fn should_show_error(&self, meta: &MetaField) -> bool {
        self.submitted || self.strategy.resolve(meta, self.submitted)
    }
}
