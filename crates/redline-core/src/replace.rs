//! Reconciles model-proposed text replacements against the live document.
//!
//! Directives arrive grouped by the context key they refer to. Each one
//! is attempted exactly once: multi-line targets with matching line
//! counts become per-line replacements, everything else becomes a single
//! whitespace-collapsed replacement, and an optional fuzzy fallback
//! rescues targets the document no longer contains verbatim.

use crate::document::DocumentAccessor;
use crate::error::ReplacementError;
use crate::similarity::similarity;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Minimum similarity score for the fuzzy fallback to apply a directive.
pub const FUZZY_MATCH_THRESHOLD: f64 = 90.0;

/// A proposed (find, replace) pair returned by the remote model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplacementDirective {
    pub target_text: String,
    pub new_text: String,
}

/// Directives grouped under the opaque context keys of the response.
pub type ReplacementMap = HashMap<String, Vec<ReplacementDirective>>;

/// Outcome counts for one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplacementReport {
    /// Directives whose replacements were all issued.
    pub applied: usize,
    /// Directives discarded for missing target or replacement text.
    pub skipped_invalid: usize,
    /// Directives whose target could not be found in the document.
    pub failed: usize,
}

impl ReplacementReport {
    /// Directives that were actually attempted (valid ones).
    pub fn attempted(&self) -> usize {
        self.applied + self.failed
    }
}

/// How a single directive will be executed.
#[derive(Debug, Clone, PartialEq, Eq)]
enum DirectivePlan {
    /// One trimmed, case-insensitive replacement per line pair.
    Lines(Vec<(String, String)>),
    /// One whitespace-collapsed replacement for the whole target.
    Block { search: String, replace: String },
}

/// Collapses internal whitespace runs to single spaces and trims.
fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Non-blank lines of a multi-line string, trimmed.
fn non_blank_lines(text: &str) -> Vec<&str> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect()
}

fn plan_directive(directive: &ReplacementDirective) -> Result<DirectivePlan, ReplacementError> {
    if directive.target_text.is_empty() || directive.new_text.is_empty() {
        return Err(ReplacementError::InvalidDirective);
    }

    if directive.target_text.contains('\n') {
        let targets = non_blank_lines(&directive.target_text);
        let replacements = non_blank_lines(&directive.new_text);

        if targets.len() == replacements.len() {
            return Ok(DirectivePlan::Lines(
                targets
                    .into_iter()
                    .zip(replacements)
                    .map(|(t, r)| (t.to_string(), r.to_string()))
                    .collect(),
            ));
        }

        // Line counts differ: fall back to one block-level replacement
        // over whitespace-normalized text.
        return Ok(DirectivePlan::Block {
            search: collapse_whitespace(&directive.target_text),
            replace: collapse_whitespace(&directive.new_text),
        });
    }

    Ok(DirectivePlan::Block {
        search: collapse_whitespace(&directive.target_text),
        replace: collapse_whitespace(&directive.new_text),
    })
}

/// Applies replacement directives through a [`DocumentAccessor`].
#[derive(Debug, Clone, Default)]
pub struct ReplacementReconciler {
    fuzzy_fallback: bool,
}

impl ReplacementReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables the paragraph-level fuzzy fallback for targets the
    /// document does not contain verbatim.
    pub fn with_fuzzy_fallback(mut self, enabled: bool) -> Self {
        self.fuzzy_fallback = enabled;
        self
    }

    /// Attempts every directive once and returns the aggregate counts.
    ///
    /// Failures are reported, never raised: a directive whose target is
    /// absent from the document counts as failed and the pass continues.
    pub async fn apply(
        &self,
        doc: &dyn DocumentAccessor,
        directives: &ReplacementMap,
    ) -> ReplacementReport {
        let mut report = ReplacementReport::default();
        let paragraphs = doc.list_paragraphs().await;

        for (context_key, group) in directives {
            tracing::debug!(
                target: "replace",
                context_key = %context_key,
                directives = group.len(),
                "reconciling directive group"
            );

            for directive in group {
                match self.apply_directive(doc, &paragraphs, directive).await {
                    Ok(()) => report.applied += 1,
                    Err(ReplacementError::InvalidDirective) => {
                        tracing::warn!(
                            target: "replace",
                            context_key = %context_key,
                            "skipping directive with missing target or replacement text"
                        );
                        report.skipped_invalid += 1;
                    }
                    Err(ReplacementError::NoMatchFound) => report.failed += 1,
                }
            }
        }

        tracing::debug!(
            target: "replace",
            applied = report.applied,
            failed = report.failed,
            skipped = report.skipped_invalid,
            "reconciliation finished"
        );
        report
    }

    /// Executes one directive according to its plan. A `Lines` plan
    /// counts as applied only when every line pair matched; lines that
    /// do match are still replaced.
    async fn apply_directive(
        &self,
        doc: &dyn DocumentAccessor,
        paragraphs: &[String],
        directive: &ReplacementDirective,
    ) -> Result<(), ReplacementError> {
        match plan_directive(directive)? {
            DirectivePlan::Lines(pairs) => {
                let mut matched = 0;
                for (search, replace) in &pairs {
                    if self.replace_one(doc, paragraphs, search, replace).await {
                        matched += 1;
                    }
                }
                if matched == pairs.len() {
                    Ok(())
                } else {
                    Err(ReplacementError::NoMatchFound)
                }
            }
            DirectivePlan::Block { search, replace } => {
                if self.replace_one(doc, paragraphs, &search, &replace).await {
                    Ok(())
                } else {
                    Err(ReplacementError::NoMatchFound)
                }
            }
        }
    }

    /// Issues one replacement, preferring the exact match. Returns
    /// whether a replacement was issued.
    ///
    /// Exact presence is decided against the live paragraph list, since
    /// the host's replace call reports nothing back. The fuzzy path is
    /// only entered when the exact target is absent.
    async fn replace_one(
        &self,
        doc: &dyn DocumentAccessor,
        paragraphs: &[String],
        search: &str,
        replace: &str,
    ) -> bool {
        if contains_exact(paragraphs, search) {
            doc.search_and_replace(search, replace, false).await;
            return true;
        }

        if !self.fuzzy_fallback {
            return false;
        }

        let best = paragraphs
            .iter()
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .map(|p| (p, similarity(search, p)))
            .filter(|(_, score)| *score >= FUZZY_MATCH_THRESHOLD)
            .max_by(|(_, a), (_, b)| a.total_cmp(b));

        match best {
            Some((paragraph, score)) => {
                tracing::debug!(target: "replace", score, "fuzzy match selected");
                doc.search_and_replace(paragraph, replace, false).await;
                true
            }
            None => false,
        }
    }
}

/// Case-insensitive, whitespace-normalized containment check.
fn contains_exact(paragraphs: &[String], search: &str) -> bool {
    let needle = collapse_whitespace(search).to_lowercase();
    if needle.is_empty() {
        return false;
    }
    paragraphs
        .iter()
        .any(|p| collapse_whitespace(p).to_lowercase().contains(&needle))
}
