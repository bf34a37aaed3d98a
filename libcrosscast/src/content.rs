//! Content normalization and budget rules
//!
//! Pure text transforms applied by the orchestrator before any network or
//! storage call: HTML cleanup, hashtag extraction, and the character budget
//! shared across the requested targets.

use std::collections::BTreeSet;

use crate::types::Target;

/// Hard system-wide ceiling on authored content length.
pub const MAX_CONTENT_LENGTH: usize = 1000;

/// Character budget used when no platform-specific target is selected.
pub const DEFAULT_MAX_CHARACTERS: usize = 2000;

/// Fixed placeholder length a link contributes to the budget, irrespective
/// of the actual URL length (platforms wrap links in their own shorteners).
pub const LINK_PLACEHOLDER_LENGTH: usize = 25;

/// Separator between content and link.
pub const LINK_SEPARATOR_LENGTH: usize = 2;

/// Strip HTML tags and unescape the minimal entity set.
pub fn cleanup_html(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    let mut in_tag = false;

    for c in input.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            c if !in_tag => output.push(c),
            _ => {}
        }
    }

    unescape_entities(&output)
}

/// Unescape `&nbsp; &lt; &gt; &amp;` only; everything else passes through.
pub fn unescape_entities(input: &str) -> String {
    input
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

/// Extract `#word` hashtags preceded by start-of-string or whitespace.
///
/// Extraction is informational (feed-document tagging); it never alters the
/// text sent to any platform. Duplicates are dropped, order preserved.
pub fn extract_hashtags(content: &str) -> Vec<String> {
    let mut hashtags = Vec::new();
    let mut seen = BTreeSet::new();
    let mut chars = content.char_indices().peekable();
    let mut prev: Option<char> = None;

    while let Some((_, c)) = chars.next() {
        if c == '#' && prev.map_or(true, |p| p.is_whitespace()) {
            let mut word = String::new();
            while let Some(&(_, next)) = chars.peek() {
                if next.is_alphanumeric() || next == '_' {
                    word.push(next);
                    chars.next();
                } else {
                    break;
                }
            }
            if !word.is_empty() && seen.insert(word.clone()) {
                hashtags.push(word);
            }
            prev = Some('#');
        } else {
            prev = Some(c);
        }
    }

    hashtags
}

/// Characters the post consumes against the budget.
pub fn used_characters(content: &str, link: Option<&str>) -> usize {
    let link_cost = if link.is_some() {
        LINK_SEPARATOR_LENGTH + LINK_PLACEHOLDER_LENGTH
    } else {
        0
    };
    content.chars().count() + link_cost
}

/// Tightest character ceiling among the requested platform targets.
///
/// The local feed has no limit; a feed-only request falls back to the
/// default budget.
pub fn max_characters(targets: &BTreeSet<Target>) -> usize {
    targets
        .iter()
        .filter_map(|t| t.character_limit())
        .min()
        .unwrap_or(DEFAULT_MAX_CHARACTERS)
}
