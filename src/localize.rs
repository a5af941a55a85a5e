//! Language selection for localized service content.
//!
//! The agreement service returns every user-facing string as a list of
//! per-language alternatives. This module reduces such a list to the single
//! string shown to the user.

use serde::{Deserialize, Serialize};

/// One language alternative of a localized string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalizedText {
    /// Language tag (e.g. `en`, `fa`)
    pub language: Option<String>,
    /// Text in that language
    pub content: Option<String>,
}

impl LocalizedText {
    pub fn new(language: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            language: Some(language.into()),
            content: Some(content.into()),
        }
    }
}

/// Select the text for `wanted` from a list of alternatives.
///
/// An exact tag match wins. Without one, the first entry is used. An empty
/// or absent list yields `None`, in which case the caller falls back to its
/// built-in default.
pub fn select_for_language(entries: Option<&[LocalizedText]>, wanted: &str) -> Option<String> {
    let entries = entries?;

    entries
        .iter()
        .find(|entry| entry.language.as_deref() == Some(wanted))
        .or_else(|| entries.first())
        .and_then(|entry| entry.content.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries() -> Vec<LocalizedText> {
        vec![
            LocalizedText::new("fa", "شرایط"),
            LocalizedText::new("en", "Terms"),
            LocalizedText::new("de", "Bedingungen"),
        ]
    }

    #[test]
    fn test_exact_match_wins() {
        let entries = entries();
        assert_eq!(
            select_for_language(Some(&entries), "en"),
            Some("Terms".to_string())
        );
        assert_eq!(
            select_for_language(Some(&entries), "de"),
            Some("Bedingungen".to_string())
        );
    }

    #[test]
    fn test_missing_language_falls_back_to_first() {
        let entries = entries();
        assert_eq!(
            select_for_language(Some(&entries), "fr"),
            Some("شرایط".to_string())
        );
    }

    #[test]
    fn test_empty_or_absent_list() {
        assert_eq!(select_for_language(Some(&[]), "en"), None);
        assert_eq!(select_for_language(None, "en"), None);
    }

    #[test]
    fn test_tag_match_is_exact() {
        let entries = vec![
            LocalizedText::new("en-US", "Color"),
            LocalizedText::new("en", "Colour"),
        ];
        assert_eq!(
            select_for_language(Some(&entries), "en"),
            Some("Colour".to_string())
        );
    }

    #[test]
    fn test_matched_entry_without_content() {
        let entries = vec![
            LocalizedText::new("fa", "متن"),
            LocalizedText {
                language: Some("en".to_string()),
                content: None,
            },
        ];
        assert_eq!(select_for_language(Some(&entries), "en"), None);
    }
}
