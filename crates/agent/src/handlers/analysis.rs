use std::sync::Arc;

use tracing::{info, warn};

use coco_core::domain::context::Language;
use coco_core::domain::turn::HistoryWindow;
use coco_core::errors::check_reply_quality;
use coco_core::pacing::PacingPolicy;
use coco_core::prompts;
use coco_gateway::pacer::Sleeper;

use crate::handlers::HandlerOutcome;
use crate::llm::{clean_reply, CompletionClient, CompletionRequest, ProviderError};
use crate::orchestrator::PipelineStage;
use crate::profile::{ProfileFetcher, ProfileSummary};

const ANALYSIS_MAX_TOKENS: u32 = 400;

/// Analyzes the customer's business profile page. The URL comes from the
/// current message or, failing that, the most recent prior user message that
/// carried one. Everything past URL discovery is best-effort: a bounded
/// fetch retry, then a guarded synthesis call, with the escalation fallback
/// as the floor.
pub struct AnalysisHandler {
    llm: Arc<dyn CompletionClient>,
    fetcher: Arc<dyn ProfileFetcher>,
    sleeper: Arc<dyn Sleeper>,
    policy: PacingPolicy,
    min_reply_chars: usize,
}

impl AnalysisHandler {
    pub fn new(
        llm: Arc<dyn CompletionClient>,
        fetcher: Arc<dyn ProfileFetcher>,
        sleeper: Arc<dyn Sleeper>,
        policy: PacingPolicy,
        min_reply_chars: usize,
    ) -> Self {
        Self { llm, fetcher, sleeper, policy, min_reply_chars }
    }

    pub async fn handle(
        &self,
        session_id: &str,
        window: &HistoryWindow,
        message: &str,
        language: Language,
    ) -> Result<HandlerOutcome, ProviderError> {
        let url = find_url(message).or_else(|| {
            window
                .last_user_turn_where(|turn| find_url(&turn.text).is_some())
                .and_then(|turn| find_url(&turn.text))
        });

        let Some(url) = url else {
            // No link anywhere in scope: ask for one, zero external calls.
            return Ok(HandlerOutcome::Reply(prompts::provide_link_prompt(language).to_string()));
        };

        let Some(summary) = self.fetch_with_retry(session_id, &url).await else {
            return Ok(HandlerOutcome::Escalate {
                reply: prompts::analysis_fallback(language).to_string(),
            });
        };

        let request = CompletionRequest {
            system: prompts::SYSTEM_PROMPT.to_string(),
            messages: vec![crate::llm::ChatMessage::user(prompts::analysis_instruction(
                language,
                &summary.summary,
            ))],
            max_tokens: ANALYSIS_MAX_TOKENS,
            temperature: None,
        };
        let raw = self.llm.complete(request).await?;
        let reply = clean_reply(&raw);

        match check_reply_quality(&reply, self.min_reply_chars, prompts::LOW_CONFIDENCE_MARKERS) {
            Ok(()) => Ok(HandlerOutcome::Reply(reply)),
            Err(failure) => {
                warn!(
                    event_name = "agent.analysis.quality_gate_failed",
                    session_id = %session_id,
                    stage = PipelineStage::QualityChecked.as_str(),
                    url = %url,
                    reason = %failure,
                    "analysis replaced by fallback"
                );
                Ok(HandlerOutcome::Escalate {
                    reply: prompts::analysis_fallback(language).to_string(),
                })
            }
        }
    }

    async fn fetch_with_retry(&self, session_id: &str, url: &str) -> Option<ProfileSummary> {
        for attempt in 1..=self.policy.fetch_max_attempts {
            match self.fetcher.fetch(url).await {
                Ok(Some(summary)) => {
                    info!(
                        event_name = "agent.analysis.fetched",
                        session_id = %session_id,
                        url = %url,
                        attempt,
                        "profile summary fetched"
                    );
                    return Some(summary);
                }
                Ok(None) => {
                    warn!(
                        event_name = "agent.analysis.fetch_empty",
                        session_id = %session_id,
                        url = %url,
                        attempt,
                        "profile fetch returned nothing"
                    );
                }
                Err(error) => {
                    warn!(
                        event_name = "agent.analysis.fetch_failed",
                        session_id = %session_id,
                        url = %url,
                        attempt,
                        error = %error,
                        "profile fetch failed"
                    );
                }
            }

            if attempt < self.policy.fetch_max_attempts {
                self.sleeper.sleep(self.policy.fetch_retry_delay).await;
            }
        }
        None
    }
}

/// First `http(s)://` URL in the text, cut at whitespace.
fn find_url(text: &str) -> Option<String> {
    let start = ["https://", "http://"]
        .iter()
        .filter_map(|scheme| text.find(scheme))
        .min()?;

    let candidate = &text[start..];
    let end = candidate.find(char::is_whitespace).unwrap_or(candidate.len());
    let url = candidate[..end].trim_end_matches(|c: char| matches!(c, '.' | ',' | ')' | '!' | '?'));
    (!url.is_empty()).then(|| url.to_string())
}
