use crate::models::{OcrFragment, Point};
use crate::normalize::cache::SeenCache;
use crate::normalize::config::NormalizeConfig;

const ENABLE_LOGS: bool = true;

use crate::log_debug;

/// Number of leading characters subject to case folding.
pub(crate) const CASE_FOLD_PREFIX_CHARS: usize = 5;

/// One logical message reassembled from one or more OCR lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedMessage {
    pub text: String,
}

/// Accumulator for a single merge pass. Never outlives the pass.
#[derive(Debug, Default)]
struct PendingMerge {
    text: String,
    last_corner: Option<Point>,
}

impl PendingMerge {
    fn is_open(&self) -> bool {
        !self.text.is_empty()
    }

    fn continues_at(&self, top_left: Point, gap_px: f64) -> bool {
        if !self.is_open() {
            return false;
        }
        match self.last_corner {
            Some(corner) => (top_left.y - corner.y).abs() < gap_px,
            None => false,
        }
    }

    fn append(&mut self, text: &str) {
        self.text.push(' ');
        self.text.push_str(text);
    }

    fn flush(&mut self) -> Option<MergedMessage> {
        if !self.is_open() {
            return None;
        }
        Some(MergedMessage {
            text: std::mem::take(&mut self.text),
        })
    }
}

/// Lower-case the leading characters when they are all alphabetic, leaving
/// the rest untouched. OCR tends to flip the case of marker words.
pub fn normalize_fragment_text(text: &str) -> String {
    let head: Vec<char> = text.chars().take(CASE_FOLD_PREFIX_CHARS).collect();
    if head.is_empty() || !head.iter().all(|c| c.is_alphabetic()) {
        return text.to_string();
    }

    let head_len: usize = head.iter().map(|c| c.len_utf8()).sum();
    let mut normalized: String = head.iter().flat_map(|c| c.to_lowercase()).collect();
    normalized.push_str(&text[head_len..]);
    normalized
}

/// Merge vertically adjacent fragments into logical messages.
///
/// Fragments must already be in reading order. A fragment whose raw text was
/// seen in any earlier pass is skipped without touching the pending state.
/// Only marker-prefixed text can open a message; anything else either
/// continues the open message or is dropped.
pub fn merge_fragments(
    fragments: &[OcrFragment],
    seen_lines: &mut SeenCache,
    config: &NormalizeConfig,
) -> Vec<MergedMessage> {
    let mut merged = Vec::new();
    let mut pending = PendingMerge::default();

    for fragment in fragments {
        if !seen_lines.insert(&fragment.text) {
            continue;
        }

        let text = normalize_fragment_text(&fragment.text);
        let top_left = fragment.quad.top_left();

        if pending.continues_at(top_left, config.merge_gap_px) {
            pending.append(&text);
        } else {
            if let Some(message) = pending.flush() {
                merged.push(message);
            }

            if config.matching_marker(&text).is_some() {
                pending.text = text;
            } else {
                log_debug!("dropping unmarked line '{}'", text);
            }
        }

        pending.last_corner = Some(fragment.quad.bottom_left());
    }

    if let Some(message) = pending.flush() {
        merged.push(message);
    }

    merged
}
