use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, warn};

use coco_core::domain::context::{ConversationContext, Language};
use coco_core::domain::turn::{HistoryWindow, Role};
use coco_core::prompts;

use crate::llm::{ChatMessage, CompletionClient, CompletionRequest};

const EXTRACTOR_MAX_TOKENS: u32 = 300;

#[derive(Debug, Default, Deserialize)]
struct ExtractedProfile {
    name: Option<String>,
    business_link: Option<String>,
    objective: Option<String>,
}

/// Derives the structured customer profile from the history window. Every
/// failure path (provider error, no JSON region, decode error) degrades to
/// the all-null context, which routing treats as "nothing known yet".
pub struct ContextExtractor {
    llm: Arc<dyn CompletionClient>,
}

impl ContextExtractor {
    pub fn new(llm: Arc<dyn CompletionClient>) -> Self {
        Self { llm }
    }

    pub async fn extract(
        &self,
        session_id: &str,
        window: &HistoryWindow,
        language: Language,
    ) -> ConversationContext {
        if window.is_empty() {
            return ConversationContext::empty(language);
        }

        let request = CompletionRequest {
            system: prompts::EXTRACTOR_INSTRUCTION.to_string(),
            messages: window_as_messages(window),
            max_tokens: EXTRACTOR_MAX_TOKENS,
            temperature: None,
        };

        let raw = match self.llm.complete(request).await {
            Ok(raw) => raw,
            Err(error) => {
                warn!(
                    event_name = "agent.extractor.provider_failed",
                    session_id = %session_id,
                    error = %error,
                    "context extraction degraded to all-null"
                );
                return ConversationContext::empty(language);
            }
        };

        let Some(json_region) = find_json_object(&raw) else {
            warn!(
                event_name = "agent.extractor.no_json",
                session_id = %session_id,
                "provider reply contained no JSON object"
            );
            return ConversationContext::empty(language);
        };

        match serde_json::from_str::<ExtractedProfile>(json_region) {
            Ok(profile) => {
                debug!(
                    event_name = "agent.extractor.extracted",
                    session_id = %session_id,
                    has_name = profile.name.is_some(),
                    has_link = profile.business_link.is_some(),
                    has_objective = profile.objective.is_some(),
                    "context extracted"
                );
                ConversationContext {
                    name: non_empty(profile.name),
                    business_link: non_empty(profile.business_link),
                    objective: non_empty(profile.objective),
                    language,
                }
            }
            Err(error) => {
                warn!(
                    event_name = "agent.extractor.decode_failed",
                    session_id = %session_id,
                    error = %error,
                    "context extraction degraded to all-null"
                );
                ConversationContext::empty(language)
            }
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|text| !text.trim().is_empty())
}

pub(crate) fn window_as_messages(window: &HistoryWindow) -> Vec<ChatMessage> {
    window
        .turns()
        .iter()
        .map(|turn| match turn.role {
            Role::User => ChatMessage::user(turn.text.clone()),
            Role::Assistant => ChatMessage::assistant(turn.text.clone()),
        })
        .collect()
}

/// Locates the first balanced `{...}` region in a provider reply. Providers
/// may wrap the JSON in prose, so the whole reply is never assumed to parse.
fn find_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let mut depth = 0usize;

    for (offset, character) in raw[start..].char_indices() {
        match character {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&raw[start..start + offset + character.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}
