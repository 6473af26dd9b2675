//! Per-session turn counters with fixed ceilings.
//!
//! Each counter is a monotone one-way state machine: `Active` while the
//! count is below the ceiling, `Exhausted` once it reaches it. There is
//! no reset; a reset is an external session restart, which constructs a
//! fresh counter.

use crate::error::LimitError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum chat turns per session.
pub const MAX_MESSAGES: u32 = 5;

/// Maximum image generations per session.
pub const MAX_IMAGE_GENERATIONS: u32 = 2;

/// Identifies which session counter an event or error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CounterKind {
    Messages,
    ImageGenerations,
}

impl fmt::Display for CounterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CounterKind::Messages => write!(f, "messages"),
            CounterKind::ImageGenerations => write!(f, "image generations"),
        }
    }
}

/// State of a counter relative to its ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterState {
    Active,
    Exhausted,
}

/// A monotonically non-decreasing counter capped at a fixed ceiling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnCounter {
    kind: CounterKind,
    ceiling: u32,
    count: u32,
}

impl TurnCounter {
    pub fn new(kind: CounterKind, ceiling: u32) -> Self {
        Self {
            kind,
            ceiling,
            count: 0,
        }
    }

    /// Counter for chat turns, capped at [`MAX_MESSAGES`].
    pub fn messages() -> Self {
        Self::new(CounterKind::Messages, MAX_MESSAGES)
    }

    /// Counter for image generations, capped at [`MAX_IMAGE_GENERATIONS`].
    pub fn image_generations() -> Self {
        Self::new(CounterKind::ImageGenerations, MAX_IMAGE_GENERATIONS)
    }

    /// Increments the counter and returns the new count.
    ///
    /// # Errors
    ///
    /// Returns [`LimitError::LimitReached`] if the counter is already at
    /// its ceiling. Callers are expected to check [`Self::is_exhausted`]
    /// before starting a turn so no work is wasted.
    pub fn increment(&mut self) -> Result<u32, LimitError> {
        if self.count >= self.ceiling {
            return Err(LimitError::LimitReached {
                counter: self.kind,
                ceiling: self.ceiling,
            });
        }
        self.count += 1;
        Ok(self.count)
    }

    pub fn kind(&self) -> CounterKind {
        self.kind
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn ceiling(&self) -> u32 {
        self.ceiling
    }

    pub fn remaining(&self) -> u32 {
        self.ceiling - self.count
    }

    pub fn is_exhausted(&self) -> bool {
        self.count >= self.ceiling
    }

    pub fn state(&self) -> CounterState {
        if self.is_exhausted() {
            CounterState::Exhausted
        } else {
            CounterState::Active
        }
    }
}
