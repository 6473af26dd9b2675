//! Capability contracts for the host document editor.
//!
//! The engine never traverses a document model itself. The host provides
//! a [`DocumentAccessor`] implementation and the engine consumes it as a
//! set of narrow capabilities: read the selection, list headings and
//! paragraph blocks, apply a replacement, highlight, insert an image.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Matches the first outline digit in a heading style name ("Heading 2").
static HEADING_DIGIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[1-9]").expect("valid regex"));

/// A heading paragraph in the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Heading {
    /// The heading text, trimmed.
    pub text: String,
    /// The paragraph style name as reported by the editor.
    pub style_name: String,
    /// Position of the heading paragraph in the document.
    pub index: usize,
    /// Zero-based outline level derived from the style name.
    pub outline_level: u8,
}

impl Heading {
    /// Builds a heading, deriving the outline level from the style name.
    pub fn new(text: impl Into<String>, style_name: impl Into<String>, index: usize) -> Self {
        let style_name = style_name.into();
        let outline_level = outline_level_from_style(&style_name);
        Self {
            text: text.into(),
            style_name,
            index,
            outline_level,
        }
    }
}

/// Zero-based outline level for a heading style name.
///
/// "Heading 1" maps to 0, "Heading 3" to 2. Styles without a digit
/// default to level 0.
pub fn outline_level_from_style(style_name: &str) -> u8 {
    HEADING_DIGIT
        .find(style_name)
        .and_then(|m| m.as_str().parse::<u8>().ok())
        .map(|n| n - 1)
        .unwrap_or(0)
}

/// A paragraph-level block of the document: its text plus the style name
/// when the editor reports one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentBlock {
    pub text: String,
    pub style_name: Option<String>,
}

impl DocumentBlock {
    pub fn new(text: impl Into<String>, style_name: Option<&str>) -> Self {
        Self {
            text: text.into(),
            style_name: style_name.map(str::to_string),
        }
    }

    pub fn is_heading(&self) -> bool {
        self.heading_level().is_some()
    }

    /// One-based heading level when the block carries a heading style.
    pub fn heading_level(&self) -> Option<u8> {
        let style = self.style_name.as_deref()?;
        if !style.contains("Heading") {
            return None;
        }
        Some(
            HEADING_DIGIT
                .find(style)
                .and_then(|m| m.as_str().parse::<u8>().ok())
                .unwrap_or(1),
        )
    }
}

/// Collects the text of the section under `heading`.
///
/// The heading is located by case-insensitive containment of its text.
/// The section includes the heading's own text, every following
/// non-blank paragraph, and the content of deeper sub-headings; it stops
/// at the next heading of the same or a higher level. Paragraphs are
/// joined with blank lines.
pub fn collect_section_text(blocks: &[DocumentBlock], heading: &Heading) -> String {
    let needle = heading.text.to_lowercase();
    let target_level = heading.outline_level + 1;

    let mut collected: Vec<&str> = Vec::new();
    let mut collecting = false;

    for block in blocks {
        let text = block.text.trim();
        match block.heading_level() {
            Some(level) => {
                if !collecting && text.to_lowercase().contains(&needle) {
                    collecting = true;
                    collected.push(text);
                } else if collecting {
                    if level <= target_level {
                        break;
                    }
                    collected.push(text);
                }
            }
            None => {
                if collecting && !text.is_empty() {
                    collected.push(text);
                }
            }
        }
    }

    collected.join("\n\n")
}

/// Host-provided access to the live document.
///
/// Implementations wrap the editor's plugin API. The engine only relies
/// on these capabilities, never on how the host realizes them.
#[async_trait]
pub trait DocumentAccessor: Send + Sync {
    /// The document title, as reported by the editor. May be blank.
    async fn document_title(&self) -> String;

    /// The currently selected text. Blank when nothing is selected.
    async fn selected_text(&self) -> String;

    /// All heading paragraphs, in document order.
    async fn list_headings(&self) -> Vec<Heading>;

    /// All paragraph blocks with their style names, in document order.
    async fn list_blocks(&self) -> Vec<DocumentBlock>;

    /// Plain paragraph texts, in document order.
    async fn list_paragraphs(&self) -> Vec<String> {
        self.list_blocks()
            .await
            .into_iter()
            .map(|block| block.text)
            .collect()
    }

    /// Replaces occurrences of `search` with `replace` in the document.
    async fn search_and_replace(&self, search: &str, replace: &str, match_case: bool);

    /// Highlights every occurrence of `search` in the document.
    async fn highlight_text(&self, search: &str);

    /// Highlights the current selection.
    async fn highlight_selection(&self);

    /// Inserts a base64-encoded image at the cursor. Returns whether the
    /// editor accepted it.
    async fn insert_image(&self, base64_data: &str, width: u32, height: u32) -> bool;
}
