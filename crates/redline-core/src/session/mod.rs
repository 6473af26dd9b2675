//! Session domain: interaction mode, counters, context, image state.

pub mod event;
pub mod image_state;
pub mod mode;
pub mod model;

pub use event::{EngineEvent, NoticeSeverity};
pub use image_state::ImageConversationState;
pub use mode::ChatMode;
pub use model::Session;
