//! Interaction mode for a session.

use serde::{Deserialize, Serialize};

/// Whether the session is answering questions or generating images.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatMode {
    /// Question answering over the document, with attachable context.
    #[default]
    Chat,
    /// Image generation for insertion into the document.
    Image,
}
