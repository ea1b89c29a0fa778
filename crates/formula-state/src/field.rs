//! # Field View
//!
//! The read-only snapshot a rendering layer needs to draw one field.

use serde::Serialize;
use serde_json::Value;

/// Everything a field renderer reads, for one resolved path.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldView {
    /// Rendered path of the field.
    pub path: String,
    /// Current sub-value.
    pub value: Value,
    /// The field has lost focus at least once.
    pub touched: bool,
    /// The field's value has changed at least once.
    pub changed: bool,
    /// A client validation has passed at least once.
    pub succeeded: bool,
    /// Whether the feedback strategy lets errors through right now.
    pub should_show_errors: bool,
    /// Client then server messages for this node, regardless of strategy.
    pub unfiltered_errors: Vec<String>,
    /// No node in this field's subtree carries an error.
    pub valid: bool,
    /// A deferred validation for this field has not reported yet.
    pub async_validation_in_flight: bool,
}

impl FieldView {
    /// Messages to render: `unfiltered_errors` if the strategy allows,
    /// nothing otherwise.
    pub fn visible_errors(&self) -> &[String] {
        if self.should_show_errors {
            &self.unfiltered_errors
        } else {
            &[]
        }
    }
}
