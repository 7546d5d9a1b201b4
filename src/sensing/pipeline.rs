use image::RgbaImage;
use std::sync::Arc;

use crate::conversation::{CompletionClient, ConversationContext};
use crate::error::WatchError;
use crate::models::{OcrFragment, Question};
use crate::normalize::{filter_new_questions, merge_fragments, NormalizeConfig, SeenCache};
use crate::settings::Settings;

use super::change::ChangeDetector;

/// Owns every piece of state that survives between capture cycles: the
/// previous capture, both seen-caches and the conversation history.
pub struct Pipeline {
    normalize: NormalizeConfig,
    change: ChangeDetector,
    seen_lines: SeenCache,
    seen_questions: SeenCache,
    conversation: ConversationContext,
}

impl Pipeline {
    pub fn new(normalize: NormalizeConfig, conversation: ConversationContext) -> Self {
        Self {
            normalize,
            change: ChangeDetector::new(),
            seen_lines: SeenCache::new(),
            seen_questions: SeenCache::new(),
            conversation,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        let conversation = ConversationContext::new(
            settings.persona.clone(),
            settings.model.clone(),
            settings.temperature,
            settings.trim_policy(),
        );
        Self::new(settings.normalize_config(), conversation)
    }

    /// Gate for the rest of the cycle: false means the capture is identical
    /// to the previous one and nothing else should run.
    pub fn observe_capture(&mut self, image: Arc<RgbaImage>) -> bool {
        self.change.observe(image)
    }

    /// Merge, strip and dedup one cycle's fragments into new questions.
    pub fn extract_questions(&mut self, fragments: &[OcrFragment]) -> Vec<Question> {
        let merged = merge_fragments(fragments, &mut self.seen_lines, &self.normalize);
        filter_new_questions(merged, &mut self.seen_questions, &self.normalize)
    }

    pub async fn answer(
        &mut self,
        question: &Question,
        client: &dyn CompletionClient,
    ) -> Result<String, WatchError> {
        let reply = self
            .conversation
            .submit(&question.normalized_key, client)
            .await?;
        Ok(reply)
    }

    pub fn seen_lines(&self) -> &SeenCache {
        &self.seen_lines
    }

    pub fn seen_questions(&self) -> &SeenCache {
        &self.seen_questions
    }

    pub fn conversation(&self) -> &ConversationContext {
        &self.conversation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::TrimPolicy;
    use crate::models::Quad;

    fn pipeline() -> Pipeline {
        Pipeline::new(
            NormalizeConfig::new(["markerA"], 15.0),
            ConversationContext::new("persona", "m", 0.8, TrimPolicy::default()),
        )
    }

    fn fragment(text: &str, top: f64, bottom: f64) -> OcrFragment {
        OcrFragment::new(Quad::from_rect(0.0, top, 100.0, bottom), text, 0.9)
    }

    #[test]
    fn wrapped_question_becomes_one_key() {
        let mut pipeline = pipeline();
        let questions = pipeline.extract_questions(&[
            fragment("markerA hello", 100.0, 108.0),
            fragment("world", 108.0, 116.0),
        ]);

        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].normalized_key, "hello world");
        assert_eq!(questions[0].raw_text, "markerA hello world");
    }

    #[test]
    fn distant_line_leaves_single_line_question() {
        let mut pipeline = pipeline();
        let questions = pipeline.extract_questions(&[
            fragment("markerA hello", 100.0, 108.0),
            fragment("world", 130.0, 138.0),
        ]);

        let keys: Vec<&str> = questions.iter().map(|q| q.normalized_key.as_str()).collect();
        assert_eq!(keys, vec!["hello"]);
        assert_eq!(pipeline.seen_lines().len(), 2);
    }

    #[test]
    fn same_question_on_new_line_is_not_emitted_twice() {
        let mut pipeline = pipeline();
        let first = pipeline.extract_questions(&[fragment("markerA hi", 100.0, 108.0)]);
        // A later message with identical content but different raw text.
        let second = pipeline.extract_questions(&[fragment("markerA  hi ", 300.0, 308.0)]);

        assert_eq!(first.len(), 1);
        assert!(second.is_empty());
        assert_eq!(pipeline.seen_questions().len(), 1);
    }
}
