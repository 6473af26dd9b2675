//! Bounded store for conversation context fragments.
//!
//! A session can carry up to [`MAX_CONTEXT_FRAGMENTS`] pieces of document
//! text, capped by an aggregate budget of [`MAX_CONTEXT_CHARS`]
//! characters. The store maintains a running total that must equal the
//! sum of the stored per-fragment counts at all times.

use crate::error::ContextError;
use serde::{Deserialize, Serialize};

/// Aggregate character budget across all attached fragments.
pub const MAX_CONTEXT_CHARS: usize = 30_000;

/// Maximum number of fragments attached at once.
pub const MAX_CONTEXT_FRAGMENTS: usize = 2;

/// A bounded piece of document text attached to the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextFragment {
    /// Stable key in `1..=MAX_CONTEXT_FRAGMENTS`, unique within the store.
    pub key: u8,
    /// The attached text.
    pub content: String,
    /// Whether the fragment was extracted from a heading section rather
    /// than a manual selection.
    pub is_header_derived: bool,
    /// Heading text for header-derived fragments, used as display label.
    pub header_label: Option<String>,
    /// Character count recorded at attach time. Removal subtracts this
    /// stored value, never a recomputed length.
    pub char_count: usize,
}

impl ContextFragment {
    /// Display label: heading text for header-derived fragments, a short
    /// content preview otherwise.
    pub fn label(&self) -> String {
        match &self.header_label {
            Some(label) => label.clone(),
            None => {
                let preview: String = self.content.chars().take(40).collect();
                if self.content.chars().count() > 40 {
                    format!("{preview}...")
                } else {
                    preview
                }
            }
        }
    }
}

/// Holds the attached context fragments and enforces the budgets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextStore {
    fragments: Vec<ContextFragment>,
    total_chars: usize,
}

impl ContextStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches a new fragment.
    ///
    /// Checks, in order: fragment count, the per-fragment cap, and the
    /// remaining aggregate budget. On success the fragment gets the
    /// smallest unused key (which is `count + 1` when nothing was
    /// removed) and the running total is updated.
    ///
    /// # Errors
    ///
    /// * [`ContextError::TooManyFragments`] if the store is full
    /// * [`ContextError::FragmentTooLarge`] if the content alone exceeds
    ///   the whole budget
    /// * [`ContextError::BudgetExceeded`] if the content does not fit
    ///   into the remaining budget
    pub fn attach(
        &mut self,
        content: String,
        is_header_derived: bool,
        header_label: Option<String>,
    ) -> Result<ContextFragment, ContextError> {
        if self.fragments.len() >= MAX_CONTEXT_FRAGMENTS {
            return Err(ContextError::TooManyFragments {
                max: MAX_CONTEXT_FRAGMENTS,
            });
        }

        let char_count = content.chars().count();
        if char_count > MAX_CONTEXT_CHARS {
            return Err(ContextError::FragmentTooLarge {
                len: char_count,
                max: MAX_CONTEXT_CHARS,
            });
        }

        let remaining = MAX_CONTEXT_CHARS - self.total_chars;
        if char_count > remaining {
            return Err(ContextError::BudgetExceeded {
                len: char_count,
                remaining,
            });
        }

        let fragment = ContextFragment {
            key: self.next_free_key(),
            content,
            is_header_derived,
            header_label,
            char_count,
        };

        self.total_chars += char_count;
        tracing::debug!(
            target: "context",
            key = fragment.key,
            chars = char_count,
            total = self.total_chars,
            "fragment attached"
        );
        self.fragments.push(fragment.clone());
        Ok(fragment)
    }

    /// Removes the fragment with the given key, subtracting its stored
    /// character count from the running total. No-op for absent keys.
    pub fn remove(&mut self, key: u8) {
        if let Some(pos) = self.fragments.iter().position(|f| f.key == key) {
            let removed = self.fragments.remove(pos);
            self.total_chars -= removed.char_count;
            tracing::debug!(
                target: "context",
                key,
                total = self.total_chars,
                "fragment removed"
            );
        }
    }

    /// Empties the store and resets the running total.
    pub fn clear(&mut self) {
        self.fragments.clear();
        self.total_chars = 0;
    }

    /// The attached fragments in insertion order.
    pub fn fragments(&self) -> &[ContextFragment] {
        &self.fragments
    }

    /// Ordered `(key, content)` pairs for outbound payloads.
    pub fn snapshot(&self) -> Vec<(u8, &str)> {
        self.fragments
            .iter()
            .map(|f| (f.key, f.content.as_str()))
            .collect()
    }

    /// Running total of attached characters.
    pub fn total_chars(&self) -> usize {
        self.total_chars
    }

    /// Characters left in the aggregate budget.
    pub fn remaining_chars(&self) -> usize {
        MAX_CONTEXT_CHARS - self.total_chars
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// Smallest key in `1..=MAX_CONTEXT_FRAGMENTS` not currently in use.
    /// Only called when the store is not full.
    fn next_free_key(&self) -> u8 {
        (1..=MAX_CONTEXT_FRAGMENTS as u8)
            .find(|key| !self.fragments.iter().any(|f| f.key == *key))
            .unwrap_or(MAX_CONTEXT_FRAGMENTS as u8)
    }
}
