use std::sync::Arc;

use tracing::debug;

use coco_core::domain::turn::Turn;
use coco_core::prompts;
use coco_core::routing::Intent;

use crate::handlers::messages_with_current;
use crate::llm::{CompletionClient, CompletionRequest, ProviderError};

/// The label is the whole expected output, so the token budget stays tiny.
const CLASSIFIER_MAX_TOKENS: u32 = 8;

/// Labels the latest message with one intent from the closed set, using a
/// short rolling window of prior turns. Sampling is pinned to temperature
/// zero; the reply is substring-matched, defaulting to `other`.
pub struct IntentClassifier {
    llm: Arc<dyn CompletionClient>,
}

impl IntentClassifier {
    pub fn new(llm: Arc<dyn CompletionClient>) -> Self {
        Self { llm }
    }

    pub async fn classify(
        &self,
        session_id: &str,
        recent_turns: &[Turn],
        message: &str,
    ) -> Result<Intent, ProviderError> {
        let request = CompletionRequest {
            system: prompts::classifier_instruction(),
            messages: messages_with_current(recent_turns, message),
            max_tokens: CLASSIFIER_MAX_TOKENS,
            temperature: Some(0.0),
        };

        let raw = self.llm.complete(request).await?;
        let intent = Intent::parse_label(&raw);
        debug!(
            event_name = "agent.classifier.labeled",
            session_id = %session_id,
            intent = intent.label(),
            "message classified"
        );
        Ok(intent)
    }
}
