//! # Per-Node Extras — Metadata and Dual-Channel Errors
//!
//! Every node of a form's shaped tree carries a [`FieldExtras`]: lifecycle
//! flags ([`MetaField`]) and errors split into a client channel and a
//! server channel ([`Errors`]).
//!
//! ## Sentinels
//!
//! `ClientErrors::Pending` means no client validation result has arrived.
//! `ServerErrors::Unchecked` means no server payload has ever been applied.
//! Both are distinct from an empty list, which means "checked, no errors",
//! and both count as zero errors when flattened.

use serde::{Deserialize, Serialize};

/// Lifecycle flags for one node.
///
/// All three flags are monotonic: once set they stay set until the tree is
/// rebuilt from a fresh value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MetaField {
    /// The field has lost focus at least once.
    pub touched: bool,
    /// The field's value has changed at least once.
    pub changed: bool,
    /// A client validation has returned zero errors at least once.
    pub succeeded: bool,
}

/// Client-side validation channel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientErrors {
    /// No validation result has arrived yet.
    #[default]
    Pending,
    /// The latest validation result.
    Checked(Vec<String>),
}

impl ClientErrors {
    /// The messages, or an empty slice while pending.
    pub fn messages(&self) -> &[String] {
        match self {
            Self::Pending => &[],
            Self::Checked(messages) => messages,
        }
    }

    /// Whether no result has arrived yet.
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }
}

/// Server-side error channel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerErrors {
    /// No server payload has ever been applied.
    #[default]
    Unchecked,
    /// Messages from the latest server payload.
    Checked(Vec<String>),
}

impl ServerErrors {
    /// The messages, or an empty slice while unchecked.
    pub fn messages(&self) -> &[String] {
        match self {
            Self::Unchecked => &[],
            Self::Checked(messages) => messages,
        }
    }
}

/// Both error channels for one node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Errors {
    /// Client validation results.
    pub client: ClientErrors,
    /// Server-supplied messages.
    pub server: ServerErrors,
}

impl Errors {
    /// Client messages followed by server messages.
    pub fn flatten(&self) -> Vec<String> {
        self.client
            .messages()
            .iter()
            .chain(self.server.messages())
            .cloned()
            .collect()
    }

    /// Whether the flattened list is empty.
    pub fn is_clean(&self) -> bool {
        self.client.messages().is_empty() && self.server.messages().is_empty()
    }
}

/// The extras payload attached to every node of a form tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldExtras {
    /// Error channels.
    pub errors: Errors,
    /// Lifecycle flags.
    pub meta: MetaField,
}

/// Mark a node as touched. Used when a field loses focus.
pub fn set_extras_touched(extras: &FieldExtras) -> FieldExtras {
    FieldExtras {
        meta: MetaField {
            touched: true,
            ..extras.meta
        },
        ..extras.clone()
    }
}

/// Mark a node as changed.
pub fn set_extras_changed(extras: &FieldExtras) -> FieldExtras {
    FieldExtras {
        meta: MetaField {
            changed: true,
            ..extras.meta
        },
        ..extras.clone()
    }
}

/// Record a client validation result. A clean result latches `succeeded`.
pub fn set_extras_client_errors(extras: &FieldExtras, messages: Vec<String>) -> FieldExtras {
    let succeeded = extras.meta.succeeded || messages.is_empty();
    FieldExtras {
        errors: Errors {
            client: ClientErrors::Checked(messages),
            server: extras.errors.server.clone(),
        },
        meta: MetaField {
            succeeded,
            ..extras.meta
        },
    }
}

/// Put the client channel back to `Pending` while a deferred run is out.
pub fn set_extras_client_pending(extras: &FieldExtras) -> FieldExtras {
    FieldExtras {
        errors: Errors {
            client: ClientErrors::Pending,
            server: extras.errors.server.clone(),
        },
        meta: extras.meta,
    }
}

/// Overwrite the server channel.
pub fn set_extras_server_errors(extras: &FieldExtras, messages: Vec<String>) -> FieldExtras {
    FieldExtras {
        errors: Errors {
            client: extras.errors.client.clone(),
            server: ServerErrors::Checked(messages),
        },
        meta: extras.meta,
    }
}
