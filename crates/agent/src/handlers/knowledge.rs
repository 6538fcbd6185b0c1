use std::sync::Arc;

use coco_core::domain::turn::Turn;
use coco_core::prompts;

use crate::handlers::messages_with_current;
use crate::llm::{clean_reply, CompletionClient, CompletionRequest, ProviderError};

const KNOWLEDGE_MAX_TOKENS: u32 = 400;

/// Default capability: answers product and package questions under the sales
/// system prompt. No retry, no quality gate; the text comes back verbatim
/// after house cleanup.
pub struct KnowledgeHandler {
    llm: Arc<dyn CompletionClient>,
}

impl KnowledgeHandler {
    pub fn new(llm: Arc<dyn CompletionClient>) -> Self {
        Self { llm }
    }

    pub async fn handle(
        &self,
        recent_turns: &[Turn],
        message: &str,
    ) -> Result<String, ProviderError> {
        let request = CompletionRequest {
            system: prompts::SYSTEM_PROMPT.to_string(),
            messages: messages_with_current(recent_turns, message),
            max_tokens: KNOWLEDGE_MAX_TOKENS,
            temperature: None,
        };

        let raw = self.llm.complete(request).await?;
        Ok(clean_reply(&raw))
    }
}
