//! State carried across successive image-generation calls.

/// Opaque ids returned by the image endpoint, held so a follow-up prompt
/// modifies the previous image instead of starting a new one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageConversationState {
    image_call_id: Option<String>,
    conversation_id: Option<String>,
}

impl ImageConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when an `image_call_id` is already held, i.e. the next call
    /// modifies the previous image rather than generating a fresh one.
    pub fn is_continuation(&self) -> bool {
        self.image_call_id.is_some()
    }

    /// Stores ids returned by the endpoint. `None` values leave the
    /// currently held ids untouched.
    pub fn record(&mut self, image_call_id: Option<String>, conversation_id: Option<String>) {
        if let Some(id) = image_call_id {
            self.image_call_id = Some(id);
        }
        if let Some(id) = conversation_id {
            self.conversation_id = Some(id);
        }
    }

    /// Drops the held ids: the next generation starts an independent
    /// image and consumes a fresh budget slot.
    pub fn clear(&mut self) {
        self.image_call_id = None;
        self.conversation_id = None;
    }

    pub fn image_call_id(&self) -> Option<&str> {
        self.image_call_id.as_deref()
    }

    pub fn conversation_id(&self) -> Option<&str> {
        self.conversation_id.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_state_is_not_a_continuation() {
        assert!(!ImageConversationState::new().is_continuation());
    }

    #[test]
    fn recorded_call_id_makes_it_a_continuation() {
        let mut state = ImageConversationState::new();
        state.record(Some("call-1".to_string()), Some("conv-1".to_string()));
        assert!(state.is_continuation());
        assert_eq!(state.image_call_id(), Some("call-1"));
        assert_eq!(state.conversation_id(), Some("conv-1"));
    }

    #[test]
    fn none_values_do_not_clobber_held_ids() {
        let mut state = ImageConversationState::new();
        state.record(Some("call-1".to_string()), Some("conv-1".to_string()));
        state.record(None, None);
        assert_eq!(state.image_call_id(), Some("call-1"));
        assert_eq!(state.conversation_id(), Some("conv-1"));
    }

    #[test]
    fn clear_drops_both_ids() {
        let mut state = ImageConversationState::new();
        state.record(Some("call-1".to_string()), None);
        state.clear();
        assert!(!state.is_continuation());
        assert_eq!(state.conversation_id(), None);
    }
}
