//! Events the engine publishes for the host UI to render.

use super::mode::ChatMode;
use crate::limits::CounterKind;
use serde::{Deserialize, Serialize};

/// Severity of a short-lived notice. Notices auto-dismiss host-side;
/// the engine only classifies them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeSeverity {
    Info,
    Warning,
    Error,
}

/// High-level events emitted during a conversation.
///
/// The host renders these as chat bubbles, transient notices, and
/// affordance updates (for example disabling submission exactly when a
/// counter reaches its ceiling).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    /// A user-submitted message, echoed back for rendering.
    UserMessage { content: String },
    /// A reply from the remote model.
    BotMessage { content: String },
    /// A short-lived, auto-dismissing notice.
    Notice {
        content: String,
        severity: NoticeSeverity,
    },
    /// The session switched interaction modes.
    ModeChanged { mode: ChatMode },
    /// A session counter advanced. `count == ceiling` means the host
    /// must disable further submissions for that mode.
    CounterUpdated {
        counter: CounterKind,
        count: u32,
        ceiling: u32,
    },
}

impl EngineEvent {
    pub fn user(content: impl Into<String>) -> Self {
        Self::UserMessage {
            content: content.into(),
        }
    }

    pub fn bot(content: impl Into<String>) -> Self {
        Self::BotMessage {
            content: content.into(),
        }
    }

    pub fn notice(severity: NoticeSeverity, content: impl Into<String>) -> Self {
        Self::Notice {
            content: content.into(),
            severity,
        }
    }
}
