//! Session domain model.
//!
//! A [`Session`] is the single owner of all mutable conversation state:
//! the attached context, both turn counters, the image conversation ids
//! and the current mode. There are no module-level statics; the
//! orchestrator holds the session and passes it by reference to the
//! components that need it.

use super::image_state::ImageConversationState;
use super::mode::ChatMode;
use crate::context::ContextStore;
use crate::limits::TurnCounter;
use uuid::Uuid;

/// All mutable state of one conversation session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Unique session identifier (UUID format).
    pub id: String,
    /// Timestamp when the session was created (RFC 3339).
    pub created_at: String,
    /// Current interaction mode.
    pub mode: ChatMode,
    /// Attached context fragments.
    pub context: ContextStore,
    /// Chat turns consumed.
    pub messages: TurnCounter,
    /// Image generations consumed.
    pub image_generations: TurnCounter,
    /// Ids carried across image-generation calls.
    pub image_conversation: ImageConversationState,
}

impl Session {
    /// Creates a fresh session with empty context and zeroed counters.
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
            mode: ChatMode::default(),
            context: ContextStore::new(),
            messages: TurnCounter::messages(),
            image_generations: TurnCounter::image_generations(),
            image_conversation: ImageConversationState::new(),
        }
    }

    /// Switches the interaction mode.
    ///
    /// Attached context never survives a mode switch. Entering chat mode
    /// additionally drops the image conversation ids, so a later return
    /// to image mode starts an independent image.
    pub fn switch_mode(&mut self, mode: ChatMode) {
        self.mode = mode;
        self.context.clear();
        if mode == ChatMode::Chat {
            self.image_conversation.clear();
        }
        tracing::debug!(target: "session", session_id = %self.id, ?mode, "mode switched");
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
