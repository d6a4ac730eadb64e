//! Prompt Normalizer Module
//!
//! Turns raw prompt text into the canonical key used for index lookups.

use std::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use unicode_general_category::{get_general_category, GeneralCategory};
use unicode_normalization::UnicodeNormalization;

use crate::error::{CacheError, Result};

bitflags! {
    /// Combinable normalization steps applied to every prompt.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct NormalizationMode: u8 {
        /// Lowercase the prompt.
        const CASE_FOLD = 0b001;
        /// Trim and collapse every whitespace run into a single space.
        const WHITESPACE_COLLAPSE = 0b010;
        /// Apply NFKC and drop invisible format characters.
        const UNICODE_FORM = 0b100;
    }
}

impl Default for NormalizationMode {
    fn default() -> Self {
        Self::all()
    }
}

impl NormalizationMode {
    /// Parses a comma-separated list such as `case_fold,unicode_form`.
    ///
    /// `none` (or an empty list) disables every step, `all` enables them all.
    pub fn parse_list(raw: &str) -> Result<Self> {
        let mut mode = Self::empty();
        for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            match part.to_ascii_lowercase().as_str() {
                "case_fold" => mode |= Self::CASE_FOLD,
                "whitespace_collapse" => mode |= Self::WHITESPACE_COLLAPSE,
                "unicode_form" => mode |= Self::UNICODE_FORM,
                "all" => mode = Self::all(),
                "none" => {}
                other => {
                    return Err(CacheError::InvalidConfig(format!(
                        "unknown normalization step '{}'",
                        other
                    )))
                }
            }
        }
        Ok(mode)
    }
}

// == Canonical Key ==
/// Normalized lookup key.
///
/// Input that is not valid UTF-8 cannot be normalized; it maps to the
/// `Malformed` sentinel carrying the raw bytes, so it never collides with
/// a text key and never fails the request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CanonicalKey {
    Text(String),
    Malformed(Vec<u8>),
}

impl CanonicalKey {
    /// Returns the normalized text, or `None` for the malformed sentinel.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            CanonicalKey::Text(text) => Some(text),
            CanonicalKey::Malformed(_) => None,
        }
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, CanonicalKey::Malformed(_))
    }
}

impl fmt::Display for CanonicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CanonicalKey::Text(text) => f.write_str(text),
            CanonicalKey::Malformed(bytes) => {
                f.write_str("\u{fffd}malformed:")?;
                for byte in bytes {
                    write!(f, "{:02x}", byte)?;
                }
                Ok(())
            }
        }
    }
}

// == Normalizer ==
/// Pure, deterministic prompt normalizer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Normalizer {
    mode: NormalizationMode,
}

impl Normalizer {
    pub fn new(mode: NormalizationMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> NormalizationMode {
        self.mode
    }

    /// Normalizes a prompt into its canonical key.
    ///
    /// Steps run in a fixed order: NFKC, format-character removal, case
    /// folding, whitespace collapsing. Each step only runs when its flag is set.
    pub fn normalize(&self, raw: &str) -> CanonicalKey {
        let mut text = if self.mode.contains(NormalizationMode::UNICODE_FORM) {
            raw.nfkc().filter(|c| !is_format_char(*c)).collect::<String>()
        } else {
            raw.to_string()
        };

        if self.mode.contains(NormalizationMode::CASE_FOLD) {
            text = text.to_lowercase();
        }

        if self.mode.contains(NormalizationMode::WHITESPACE_COLLAPSE) {
            text = text.split_whitespace().collect::<Vec<_>>().join(" ");
        }

        CanonicalKey::Text(text)
    }

    /// Normalizes raw bytes, mapping invalid UTF-8 to the malformed sentinel.
    pub fn normalize_bytes(&self, raw: &[u8]) -> CanonicalKey {
        match std::str::from_utf8(raw) {
            Ok(text) => self.normalize(text),
            Err(_) => CanonicalKey::Malformed(raw.to_vec()),
        }
    }
}

/// Invisible format characters (Unicode category Cf): zero-width joiners,
/// bidi controls, tag characters, interlinear annotation marks and the like.
fn is_format_char(c: char) -> bool {
    get_general_category(c) == GeneralCategory::Format
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    fn key(text: &str) -> CanonicalKey {
        CanonicalKey::Text(text.to_string())
    }

    #[test]
    fn test_default_mode_collapses_case_and_whitespace() {
        let normalizer = Normalizer::default();
        assert_eq!(normalizer.normalize("  Hello   WORLD  "), key("hello world"));
        assert_eq!(
            normalizer.normalize("Hello World"),
            normalizer.normalize("hello\t\n  world")
        );
    }

    #[test]
    fn test_strips_zero_width_characters() {
        let normalizer = Normalizer::default();
        assert_eq!(normalizer.normalize("hel\u{200B}lo"), key("hello"));
        assert_eq!(normalizer.normalize("\u{FEFF}hello"), key("hello"));
    }

    #[test]
    fn test_strips_every_format_character() {
        let normalizer = Normalizer::default();
        let hidden = [
            "hel\u{E0041}lo",
            "\u{E0001}hello",
            "hello\u{E007F}",
            "hel\u{FFF9}lo\u{FFFB}",
            "\u{0600}hello",
            "hel\u{06DD}lo",
            "hel\u{110BD}lo",
            "hel\u{1D173}lo",
        ];
        for prompt in hidden {
            assert_eq!(normalizer.normalize(prompt), key("hello"), "{:?}", prompt);
        }
    }

    #[test]
    fn test_visible_marks_are_kept() {
        let normalizer = Normalizer::default();
        assert_eq!(normalizer.normalize("caf\u{00E9}"), key("caf\u{00E9}"));
        assert_ne!(normalizer.normalize("hello!"), normalizer.normalize("hello"));
    }

    #[test]
    fn test_unicode_form_unifies_compatibility_characters() {
        let normalizer = Normalizer::new(NormalizationMode::UNICODE_FORM);
        // Precomposed vs combining accent
        assert_eq!(
            normalizer.normalize("caf\u{00E9}"),
            normalizer.normalize("cafe\u{0301}")
        );
        // Fullwidth letters
        assert_eq!(normalizer.normalize("\u{FF21}\u{FF22}"), key("AB"));
    }

    #[test]
    fn test_empty_mode_is_identity() {
        let normalizer = Normalizer::new(NormalizationMode::empty());
        assert_eq!(normalizer.normalize(" Hello  World "), key(" Hello  World "));
    }

    #[test]
    fn test_case_fold_only_keeps_whitespace() {
        let normalizer = Normalizer::new(NormalizationMode::CASE_FOLD);
        assert_eq!(normalizer.normalize("Hello   World"), key("hello   world"));
    }

    #[test]
    fn test_non_ascii_case_folding() {
        let normalizer = Normalizer::default();
        assert_eq!(normalizer.normalize("ÄÖÜ Straße"), key("äöü straße"));
    }

    #[test]
    fn test_malformed_bytes_map_to_sentinel() {
        let normalizer = Normalizer::default();
        let bad = [0x66, 0x6f, 0xff, 0x6f];

        let first = normalizer.normalize_bytes(&bad);
        let second = normalizer.normalize_bytes(&bad);

        assert!(first.is_malformed());
        assert_eq!(first, second);
        assert!(first.as_text().is_none());
        assert_eq!(first.to_string(), "\u{fffd}malformed:666fff6f");
    }

    #[test]
    fn test_valid_bytes_normalize_like_text() {
        let normalizer = Normalizer::default();
        assert_eq!(
            normalizer.normalize_bytes("Hello  World".as_bytes()),
            key("hello world")
        );
    }

    #[test]
    fn test_parse_list() {
        assert_eq!(
            NormalizationMode::parse_list("case_fold, unicode_form").unwrap(),
            NormalizationMode::CASE_FOLD | NormalizationMode::UNICODE_FORM
        );
        assert_eq!(
            NormalizationMode::parse_list("none").unwrap(),
            NormalizationMode::empty()
        );
        assert_eq!(
            NormalizationMode::parse_list("ALL").unwrap(),
            NormalizationMode::all()
        );
        assert!(NormalizationMode::parse_list("stemming").is_err());
    }
}
