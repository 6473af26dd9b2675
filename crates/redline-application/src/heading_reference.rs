//! Heading lookup for the "@" reference feature.
//!
//! The host shows a suggestion list while the user types after an `@`;
//! this service filters the document's headings for it.

use redline_core::document::{DocumentAccessor, Heading};
use std::sync::Arc;

/// Maximum number of headings offered as suggestions at once.
pub const SUGGESTION_LIMIT: usize = 10;

/// Filters document headings for reference suggestions.
pub struct HeadingReferenceService {
    accessor: Arc<dyn DocumentAccessor>,
}

impl HeadingReferenceService {
    pub fn new(accessor: Arc<dyn DocumentAccessor>) -> Self {
        Self { accessor }
    }

    /// All headings of the document, in document order.
    pub async fn headings(&self) -> Vec<Heading> {
        self.accessor.list_headings().await
    }

    /// Headings matching `query` by case-insensitive containment, capped
    /// at [`SUGGESTION_LIMIT`]. An empty query returns the first
    /// headings of the document.
    pub async fn suggestions(&self, query: &str) -> Vec<Heading> {
        let needle = query.trim().to_lowercase();
        self.accessor
            .list_headings()
            .await
            .into_iter()
            .filter(|heading| needle.is_empty() || heading.text.to_lowercase().contains(&needle))
            .take(SUGGESTION_LIMIT)
            .collect()
    }
}
