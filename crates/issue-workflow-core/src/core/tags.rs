// crates/issue-workflow-core/src/core/tags.rs
// ============================================================================
// Module: Issue Tags
// Description: Tag normalization and format validation.
// Purpose: Turn caller-supplied tag lists into a canonical lowercase set.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! Tags arrive as an unordered list that may contain absent or blank entries.
//! Normalization lowercases every remaining token and collects a set, so
//! order and duplicates never matter. Tokens with embedded whitespace are
//! rejected rather than silently fixed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Tag validation failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TagError {
    /// Token violates the tag format.
    #[error("Tag '{0}' is invalid: tags must not contain whitespace")]
    InvalidFormat(String),
    /// Normalized set exceeds the configured limit.
    #[error("too many tags: {actual} (max {max})")]
    TooMany {
        /// Maximum allowed tags.
        max: usize,
        /// Tags supplied after normalization.
        actual: usize,
    },
}

// ============================================================================
// SECTION: Normalization
// ============================================================================

/// Returns true when `tag` satisfies the tag format.
#[must_use]
pub fn is_valid_tag(tag: &str) -> bool {
    !tag.is_empty() && !tag.chars().any(char::is_whitespace)
}

/// Normalizes a caller-supplied tag list into a lowercase set.
///
/// Absent and blank entries are dropped. The first token with embedded
/// whitespace aborts normalization.
///
/// # Errors
///
/// Returns [`TagError::InvalidFormat`] for malformed tokens and
/// [`TagError::TooMany`] when the set exceeds `max_tags`.
pub fn normalize_tags<I, S>(tags: I, max_tags: usize) -> Result<BTreeSet<String>, TagError>
where
    I: IntoIterator<Item = Option<S>>,
    S: AsRef<str>,
{
    let mut normalized = BTreeSet::new();
    for tag in tags.into_iter().flatten() {
        let tag = tag.as_ref();
        if tag.trim().is_empty() {
            continue;
        }
        let lowered = tag.to_lowercase();
        if !is_valid_tag(&lowered) {
            return Err(TagError::InvalidFormat(tag.to_string()));
        }
        normalized.insert(lowered);
    }
    if normalized.len() > max_tags {
        return Err(TagError::TooMany {
            max: max_tags,
            actual: normalized.len(),
        });
    }
    Ok(normalized)
}
