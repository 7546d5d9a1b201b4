use super::merge::{normalize_fragment_text, CASE_FOLD_PREFIX_CHARS};

/// Maximum vertical gap, in pixels, for two fragments to count as one wrapped message.
pub const DEFAULT_MERGE_GAP_PX: f64 = 15.0;

/// Tunables for turning OCR fragments into questions.
#[derive(Debug, Clone)]
pub struct NormalizeConfig {
    /// Recognized marker prefixes, stored in the same normalized form as fragment text.
    marker_prefixes: Vec<String>,

    /// Vertical continuation threshold (exclusive)
    pub merge_gap_px: f64,
}

impl NormalizeConfig {
    pub fn new<I, S>(marker_prefixes: I, merge_gap_px: f64) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let marker_prefixes = marker_prefixes
            .into_iter()
            .map(|marker| fold_marker(marker.as_ref()))
            .filter(|marker| !marker.is_empty())
            .collect();

        Self {
            marker_prefixes,
            merge_gap_px,
        }
    }

    pub fn marker_prefixes(&self) -> &[String] {
        &self.marker_prefixes
    }

    /// First configured marker that `text` starts with.
    pub fn matching_marker(&self, text: &str) -> Option<&str> {
        self.marker_prefixes
            .iter()
            .find(|marker| text.starts_with(marker.as_str()))
            .map(String::as_str)
    }
}

/// Fold a marker only when every fragment starting with it gets folded too,
/// i.e. the marker covers the whole alphabetic head. Shorter markers are kept
/// as written.
fn fold_marker(marker: &str) -> String {
    let head_is_alphabetic = marker.chars().count() >= CASE_FOLD_PREFIX_CHARS
        && marker
            .chars()
            .take(CASE_FOLD_PREFIX_CHARS)
            .all(char::is_alphabetic);
    if head_is_alphabetic {
        normalize_fragment_text(marker)
    } else {
        marker.to_string()
    }
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self::new(["机器人", "@chatgpt"], DEFAULT_MERGE_GAP_PX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markers_are_normalized_like_fragments() {
        let config = NormalizeConfig::new(["CHATGPT:", "@Bot"], 15.0);
        assert_eq!(config.marker_prefixes(), &["chatgPT:".to_string(), "@Bot".to_string()]);
        assert_eq!(config.matching_marker("chatgPT: hi"), Some("chatgPT:"));
        assert_eq!(config.matching_marker("@Bot hi"), Some("@Bot"));
        assert_eq!(config.matching_marker("hello"), None);
    }

    #[test]
    fn short_markers_are_kept_as_written() {
        let config = NormalizeConfig::new(["Bot", "AI", "Hello"], 15.0);
        assert_eq!(
            config.marker_prefixes(),
            &["Bot".to_string(), "AI".to_string(), "hello".to_string()]
        );
        assert_eq!(config.matching_marker("Bot what time is it"), Some("Bot"));
        assert_eq!(config.matching_marker("AI hi"), Some("AI"));
    }

    #[test]
    fn empty_markers_are_ignored() {
        let config = NormalizeConfig::new(["", "机器人"], 15.0);
        assert_eq!(config.marker_prefixes().len(), 1);
        assert_eq!(config.matching_marker("机器人 你好"), Some("机器人"));
    }
}
