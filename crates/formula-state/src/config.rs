//! # Form Configuration
//!
//! Per-form options, deserializable from YAML or JSON so that form
//! definitions can carry them alongside their initial values.
//!
//! ```yaml
//! feedback_strategy: on_first_success_or_first_blur
//! validate_on_register: true
//! ```
//!
//! Missing keys take their defaults; unknown keys are rejected.

use serde::{Deserialize, Serialize};

use crate::error::FormError;
use crate::feedback::FeedbackStrategy;

/// Options for one form instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FormConfig {
    /// When field errors become visible.
    pub feedback_strategy: FeedbackStrategy,
    /// Run a field's validation as soon as it registers.
    pub validate_on_register: bool,
}

impl Default for FormConfig {
    fn default() -> Self {
        Self {
            feedback_strategy: FeedbackStrategy::OnFirstTouch,
            validate_on_register: true,
        }
    }
}

impl FormConfig {
    /// Parse a YAML document.
    pub fn from_yaml_str(s: &str) -> Result<Self, FormError> {
        Ok(serde_yaml::from_str(s)?)
    }

    /// Parse a JSON document.
    pub fn from_json_str(s: &str) -> Result<Self, FormError> {
        Ok(serde_json::from_str(s)?)
    }

    /// Builder: set the feedback strategy.
    pub fn with_feedback_strategy(mut self, strategy: FeedbackStrategy) -> Self {
        self.feedback_strategy = strategy;
        self
    }
}
