use chrono::Utc;

use crate::models::Question;
use crate::normalize::cache::SeenCache;
use crate::normalize::config::NormalizeConfig;
use crate::normalize::merge::MergedMessage;

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info};

/// Strip the marker from each merged message and keep only questions that
/// have never been emitted before. Detection order is preserved.
pub fn filter_new_questions(
    messages: Vec<MergedMessage>,
    seen_questions: &mut SeenCache,
    config: &NormalizeConfig,
) -> Vec<Question> {
    let mut questions = Vec::new();

    for message in messages {
        let Some(marker) = config.matching_marker(&message.text) else {
            log_debug!("merged message without marker skipped: '{}'", message.text);
            continue;
        };

        let normalized_key = message.text[marker.len()..].trim().to_string();

        if !seen_questions.insert(&normalized_key) {
            log_info!("The question '{}' has been asked before. Ignoring it.", normalized_key);
            continue;
        }

        log_info!(
            "New question '{}' found ({} answered questions tracked)",
            normalized_key,
            seen_questions.len()
        );

        questions.push(Question {
            raw_text: message.text,
            normalized_key,
            detected_at: Utc::now(),
        });
    }

    questions
}
