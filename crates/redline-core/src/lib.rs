pub mod context;
pub mod document;
pub mod error;
pub mod limits;
pub mod replace;
pub mod session;
pub mod similarity;

// Re-export the error taxonomy at the crate root
pub use error::{ContextError, LimitError, ReplacementError};
