pub mod conversation_usecase;
pub mod heading_reference;

pub use conversation_usecase::{ConversationUseCase, TurnOutcome};
pub use heading_reference::{HeadingReferenceService, SUGGESTION_LIMIT};
