use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use coco_core::config::PipelineConfig;
use coco_core::domain::context::{ConversationContext, Language};
use coco_core::domain::turn::{HistoryWindow, Role};
use coco_core::language;
use coco_core::prompts;
use coco_core::routing::{route, Capability, Intent};
use coco_db::store::HistoryStore;
use coco_gateway::pacer::{ReplyPacer, Sleeper};
use coco_gateway::transport::MessageTransport;

use crate::classifier::IntentClassifier;
use crate::extractor::ContextExtractor;
use crate::handlers::{collect_info, AnalysisHandler, HandlerOutcome, HandoverHandler, KnowledgeHandler};
use crate::llm::{CompletionClient, ProviderError};
use crate::profile::ProfileFetcher;

/// Where in the per-message pipeline a turn currently is. Used only for
/// logging; the stage a failure is observed at is part of the record.
/// `Failed` is terminal for the original reply: the turn continues with
/// the stalling substitute instead.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineStage {
    Received,
    PersistedInbound,
    ContextLoaded,
    IntentClassified,
    Routed,
    Handled,
    QualityChecked,
    PersistedReply,
    Delivered,
    Failed,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::PersistedInbound => "persisted_inbound",
            Self::ContextLoaded => "context_loaded",
            Self::IntentClassified => "intent_classified",
            Self::Routed => "routed",
            Self::Handled => "handled",
            Self::QualityChecked => "quality_checked",
            Self::PersistedReply => "persisted_reply",
            Self::Delivered => "delivered",
            Self::Failed => "failed",
        }
    }
}

/// How a turn concluded, as reported back over the webhook.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TurnStatus {
    /// Replied in-band; the customer stays with the assistant.
    Ok,
    /// A handover notification went out alongside the reply.
    Handover,
}

impl TurnStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Handover => "handover",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrchestrationOutcome {
    pub status: TurnStatus,
    pub intent: Option<Intent>,
    pub delivered_chunks: usize,
}

/// Runs the full per-message pipeline: persist, recall, understand, route,
/// handle, reply. Every inbound message gets some outbound reply; provider
/// failures downstream of persistence degrade to a stalling reply rather
/// than surfacing an error to the webhook caller.
///
/// Sessions are keyed by sender id alone, so two near-simultaneous messages
/// from one sender race on the shared history. The store is append-only and
/// each turn rereads it, so the worst case is a reply built from a slightly
/// stale window.
pub struct SessionOrchestrator {
    store: Arc<dyn HistoryStore>,
    extractor: ContextExtractor,
    classifier: IntentClassifier,
    knowledge: KnowledgeHandler,
    analysis: AnalysisHandler,
    handover: HandoverHandler,
    pacer: ReplyPacer<Arc<dyn MessageTransport>, Arc<dyn Sleeper>>,
    history_window: usize,
    classifier_window: usize,
}

impl SessionOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn HistoryStore>,
        llm: Arc<dyn CompletionClient>,
        fetcher: Arc<dyn ProfileFetcher>,
        transport: Arc<dyn MessageTransport>,
        sleeper: Arc<dyn Sleeper>,
        handover_group_id: String,
        pipeline: &PipelineConfig,
    ) -> Self {
        let policy = pipeline.pacing_policy();
        Self {
            store,
            extractor: ContextExtractor::new(llm.clone()),
            classifier: IntentClassifier::new(llm.clone()),
            knowledge: KnowledgeHandler::new(llm.clone()),
            analysis: AnalysisHandler::new(
                llm,
                fetcher,
                sleeper.clone(),
                policy.clone(),
                pipeline.min_analysis_reply_chars,
            ),
            handover: HandoverHandler::new(transport.clone(), handover_group_id),
            pacer: ReplyPacer::new(transport, sleeper, policy),
            history_window: pipeline.history_window,
            classifier_window: pipeline.classifier_window,
        }
    }

    /// One inbound customer message, end to end. Always comes back with an
    /// outcome; there is no error path the webhook caller has to handle.
    pub async fn handle_message(&self, sender: &str, body: &str) -> OrchestrationOutcome {
        let correlation_id = Uuid::new_v4();
        let language = language::detect(body);
        info!(
            event_name = "agent.orchestrator.received",
            correlation_id = %correlation_id,
            session_id = %sender,
            stage = PipelineStage::Received.as_str(),
            chars = body.chars().count(),
            "inbound message accepted"
        );

        // Inbound durability comes first: the customer's words survive even
        // if everything after this line fails.
        if let Err(error) = self.store.append(sender, Role::User, body).await {
            warn!(
                event_name = "agent.orchestrator.inbound_persist_failed",
                correlation_id = %correlation_id,
                session_id = %sender,
                stage = PipelineStage::PersistedInbound.as_str(),
                error = %error,
                "inbound turn not persisted, continuing"
            );
        }

        let window = match self.store.recent(sender, self.history_window).await {
            Ok(turns) => HistoryWindow::new(turns, self.history_window),
            Err(error) => {
                warn!(
                    event_name = "agent.orchestrator.history_unavailable",
                    correlation_id = %correlation_id,
                    session_id = %sender,
                    stage = PipelineStage::ContextLoaded.as_str(),
                    error = %error,
                    "history window degraded to empty"
                );
                HistoryWindow::default()
            }
        };

        let context = self.extractor.extract(sender, &window, language).await;

        let intent = match self
            .classifier
            .classify(sender, window.tail(self.classifier_window), body)
            .await
        {
            Ok(intent) => intent,
            Err(error) => {
                return self
                    .stall(
                        correlation_id,
                        sender,
                        language,
                        PipelineStage::IntentClassified,
                        &error,
                    )
                    .await;
            }
        };

        let capability = route(intent);
        info!(
            event_name = "agent.orchestrator.routed",
            correlation_id = %correlation_id,
            session_id = %sender,
            stage = PipelineStage::Routed.as_str(),
            intent = intent.label(),
            capability = ?capability,
            "capability selected"
        );

        let (reply, status) = match self
            .dispatch(capability, sender, body, &window, &context, language)
            .await
        {
            Ok(resolution) => resolution,
            Err(error) => {
                let mut outcome = self
                    .stall(correlation_id, sender, language, PipelineStage::Handled, &error)
                    .await;
                outcome.intent = Some(intent);
                return outcome;
            }
        };

        let delivered_chunks =
            self.persist_and_deliver(correlation_id, sender, &reply).await;

        info!(
            event_name = "agent.orchestrator.completed",
            correlation_id = %correlation_id,
            session_id = %sender,
            stage = PipelineStage::Delivered.as_str(),
            intent = intent.label(),
            status = status.as_str(),
            delivered_chunks,
            "turn finished"
        );
        OrchestrationOutcome { status, intent: Some(intent), delivered_chunks }
    }

    /// Resolves the chosen capability to concrete reply text, performing the
    /// handover side effect where the outcome demands one. A completed info
    /// context falls through to handover: there is nothing left to collect,
    /// so a human takes over.
    async fn dispatch(
        &self,
        capability: Capability,
        sender: &str,
        body: &str,
        window: &HistoryWindow,
        context: &ConversationContext,
        language: Language,
    ) -> Result<(String, TurnStatus), ProviderError> {
        match capability {
            Capability::Knowledge => {
                // Knowledge prompts carry the same bounded slice the
                // classifier sees, not the whole history window.
                let reply =
                    self.knowledge.handle(window.tail(self.classifier_window), body).await?;
                Ok((reply, TurnStatus::Ok))
            }
            Capability::Analysis => {
                match self.analysis.handle(sender, window, body, language).await? {
                    HandlerOutcome::Reply(reply) => Ok((reply, TurnStatus::Ok)),
                    HandlerOutcome::Escalate { reply } => {
                        self.handover.notify(sender, body, context).await;
                        Ok((reply, TurnStatus::Handover))
                    }
                    HandlerOutcome::NoReply => {
                        self.handover.notify(sender, body, context).await;
                        Ok((self.handover.acknowledgement(language), TurnStatus::Handover))
                    }
                }
            }
            Capability::InfoValidator => match collect_info(context) {
                HandlerOutcome::Reply(reply) => Ok((reply, TurnStatus::Ok)),
                HandlerOutcome::Escalate { reply } => {
                    self.handover.notify(sender, body, context).await;
                    Ok((reply, TurnStatus::Handover))
                }
                HandlerOutcome::NoReply => {
                    self.handover.notify(sender, body, context).await;
                    Ok((self.handover.acknowledgement(language), TurnStatus::Handover))
                }
            },
            Capability::Handover | Capability::DirectHandover => {
                self.handover.notify(sender, body, context).await;
                Ok((self.handover.acknowledgement(language), TurnStatus::Handover))
            }
        }
    }

    /// Provider-failure floor: the customer still hears back, the failure
    /// stays internal, and the webhook caller sees a normal turn.
    async fn stall(
        &self,
        correlation_id: Uuid,
        sender: &str,
        language: Language,
        failed_at: PipelineStage,
        error: &ProviderError,
    ) -> OrchestrationOutcome {
        warn!(
            event_name = "agent.orchestrator.turn_degraded",
            correlation_id = %correlation_id,
            session_id = %sender,
            stage = PipelineStage::Failed.as_str(),
            failed_at = failed_at.as_str(),
            error = %error,
            "provider failure, stalling reply substituted"
        );

        let reply = prompts::stalling_reply(language);
        let delivered_chunks = self.persist_and_deliver(correlation_id, sender, reply).await;
        OrchestrationOutcome { status: TurnStatus::Ok, intent: None, delivered_chunks }
    }

    async fn persist_and_deliver(
        &self,
        correlation_id: Uuid,
        sender: &str,
        reply: &str,
    ) -> usize {
        if let Err(error) = self.store.append(sender, Role::Assistant, reply).await {
            warn!(
                event_name = "agent.orchestrator.reply_persist_failed",
                correlation_id = %correlation_id,
                session_id = %sender,
                stage = PipelineStage::PersistedReply.as_str(),
                error = %error,
                "assistant turn not persisted, delivering anyway"
            );
        }
        self.pacer.deliver(sender, reply).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use coco_core::config::PipelineConfig;
    use coco_core::domain::turn::Role;
    use coco_core::routing::Intent;
    use coco_db::store::{HistoryStore, InMemoryHistoryStore};
    use coco_gateway::pacer::NoopSleeper;
    use coco_gateway::transport::RecordingTransport;

    use super::{SessionOrchestrator, TurnStatus};
    use crate::llm::ScriptedCompletionClient;
    use crate::profile::ScriptedProfileFetcher;

    const SENDER: &str = "+60123456789";
    const GROUP: &str = "120363012345@g.us";

    fn pipeline() -> PipelineConfig {
        PipelineConfig {
            history_window: 10,
            classifier_window: 5,
            max_chunks: 3,
            inter_chunk_delay_ms: 0,
            fetch_retry_delay_ms: 0,
            fetch_max_attempts: 2,
            min_analysis_reply_chars: 30,
        }
    }

    struct Harness {
        orchestrator: SessionOrchestrator,
        store: Arc<InMemoryHistoryStore>,
        transport: Arc<RecordingTransport>,
        llm: Arc<ScriptedCompletionClient>,
    }

    fn harness(llm: ScriptedCompletionClient) -> Harness {
        let llm = Arc::new(llm);
        let store = Arc::new(InMemoryHistoryStore::default());
        let transport = Arc::new(RecordingTransport::default());
        let orchestrator = SessionOrchestrator::new(
            store.clone(),
            llm.clone(),
            Arc::new(ScriptedProfileFetcher::default()),
            transport.clone(),
            Arc::new(NoopSleeper),
            GROUP.to_string(),
            &pipeline(),
        );
        Harness { orchestrator, store, transport, llm }
    }

    const EMPTY_CONTEXT: &str = r#"{"name": null, "business_link": null, "objective": null}"#;
    const FULL_CONTEXT: &str = r#"{"name": "Mei", "business_link": "https://shop.example", "objective": "more sales"}"#;

    #[tokio::test]
    async fn package_question_gets_a_paced_knowledge_reply() {
        let long_reply = (1..=7)
            .map(|n| format!("Paragraph {n} about our packages."))
            .collect::<Vec<_>>()
            .join("\n\n");
        let harness = harness(ScriptedCompletionClient::with_replies([
            EMPTY_CONTEXT.to_string(),
            "package".to_string(),
            long_reply,
        ]));

        let outcome = harness.orchestrator.handle_message(SENDER, "我想了解套餐").await;

        assert_eq!(outcome.status, TurnStatus::Ok);
        assert_eq!(outcome.intent, Some(Intent::Package));
        assert_eq!(outcome.delivered_chunks, 3);

        let sends = harness.transport.sent_to(SENDER).await;
        assert_eq!(sends.len(), 3);
        assert!(sends[0].contains("Paragraph 1"));
        assert!(sends[2].contains("Paragraph 7"));
        assert!(harness.transport.sent_to(GROUP).await.is_empty());
    }

    #[tokio::test]
    async fn knowledge_prompt_carries_only_the_recent_turns() {
        let harness = harness(ScriptedCompletionClient::with_replies([
            EMPTY_CONTEXT,
            "package",
            "All three packages compared, shortest first.",
        ]));
        for n in 0..9 {
            let (role, text) = if n % 2 == 0 {
                (Role::User, format!("question {n}"))
            } else {
                (Role::Assistant, format!("answer {n}"))
            };
            harness.store.append(SENDER, role, &text).await.expect("seed history");
        }

        harness.orchestrator.handle_message(SENDER, "套餐怎么收费").await;

        let requests = harness.llm.requests.lock().await;
        let knowledge = requests.last().expect("knowledge request");
        // Five recent turns, the current message last, nothing older.
        assert_eq!(knowledge.messages.len(), 5);
        assert_eq!(knowledge.messages.last().map(|m| m.content.as_str()), Some("套餐怎么收费"));
        assert!(knowledge.messages.iter().all(|m| m.content != "question 0"));
    }

    #[test]
    fn pipeline_stage_names_cover_the_full_turn_lifecycle() {
        use super::PipelineStage::*;

        let names: Vec<&str> = [
            Received,
            PersistedInbound,
            ContextLoaded,
            IntentClassified,
            Routed,
            Handled,
            QualityChecked,
            PersistedReply,
            Delivered,
            Failed,
        ]
        .iter()
        .map(|stage| stage.as_str())
        .collect();

        assert_eq!(
            names,
            vec![
                "received",
                "persisted_inbound",
                "context_loaded",
                "intent_classified",
                "routed",
                "handled",
                "quality_checked",
                "persisted_reply",
                "delivered",
                "failed",
            ]
        );
    }

    #[tokio::test]
    async fn booking_request_notifies_the_group_and_acknowledges() {
        let harness = harness(ScriptedCompletionClient::with_replies([
            EMPTY_CONTEXT,
            "booking",
        ]));

        let outcome = harness.orchestrator.handle_message(SENDER, "book an appointment now").await;

        assert_eq!(outcome.status, TurnStatus::Handover);
        assert_eq!(outcome.intent, Some(Intent::Booking));

        let notes = harness.transport.sent_to(GROUP).await;
        assert_eq!(notes.len(), 1);
        assert!(notes[0].contains(SENDER));

        // One short acknowledgement chunk, in the detected locale.
        let acks = harness.transport.sent_to(SENDER).await;
        assert_eq!(acks, vec!["Sure, connecting you now.".to_string()]);
    }

    #[tokio::test]
    async fn incomplete_context_is_prompted_for_instead_of_handed_over() {
        let harness = harness(ScriptedCompletionClient::with_replies([
            EMPTY_CONTEXT,
            "info_collect",
        ]));

        let outcome = harness.orchestrator.handle_message(SENDER, "what do you need").await;

        assert_eq!(outcome.status, TurnStatus::Ok);
        let sends = harness.transport.sent_to(SENDER).await;
        assert_eq!(sends.len(), 1);
        assert_eq!(sends[0].matches("\n- ").count(), 3);
        assert!(harness.transport.sent_to(GROUP).await.is_empty());
    }

    #[tokio::test]
    async fn complete_context_falls_through_to_handover() {
        let harness = harness(ScriptedCompletionClient::with_replies([
            FULL_CONTEXT,
            "info_collect",
        ]));

        let outcome = harness.orchestrator.handle_message(SENDER, "done, anything else?").await;

        assert_eq!(outcome.status, TurnStatus::Handover);
        let notes = harness.transport.sent_to(GROUP).await;
        assert_eq!(notes.len(), 1);
        assert!(notes[0].contains("Mei"));
        assert_eq!(
            harness.transport.sent_to(SENDER).await,
            vec!["Sure, connecting you now.".to_string()]
        );
    }

    #[tokio::test]
    async fn provider_failure_still_persists_inbound_and_stalls_in_locale() {
        let harness = harness(ScriptedCompletionClient::failing());

        let outcome = harness.orchestrator.handle_message(SENDER, "我想了解套餐").await;

        assert_eq!(outcome.status, TurnStatus::Ok);
        assert_eq!(outcome.intent, None);
        assert_eq!(outcome.delivered_chunks, 1);

        let turns = harness.store.recent(SENDER, 10).await.expect("history");
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, Role::User);
        assert_eq!(turns[0].text, "我想了解套餐");
        assert_eq!(turns[1].role, Role::Assistant);
        assert_eq!(turns[1].text, "收到！我整理一下马上回复你~");

        assert_eq!(
            harness.transport.sent_to(SENDER).await,
            vec!["收到！我整理一下马上回复你~".to_string()]
        );
    }

    #[tokio::test]
    async fn analysis_without_any_link_asks_for_one() {
        let harness = harness(ScriptedCompletionClient::with_replies([
            EMPTY_CONTEXT,
            "analyze",
        ]));

        let outcome = harness.orchestrator.handle_message(SENDER, "帮我分析一下").await;

        assert_eq!(outcome.status, TurnStatus::Ok);
        assert_eq!(outcome.intent, Some(Intent::Analyze));
        let sends = harness.transport.sent_to(SENDER).await;
        assert_eq!(sends.len(), 1);
        assert!(sends[0].contains("链接"));
    }

    #[tokio::test]
    async fn failed_analysis_fetch_escalates_with_one_group_note() {
        let store = Arc::new(InMemoryHistoryStore::default());
        let transport = Arc::new(RecordingTransport::default());
        let orchestrator = SessionOrchestrator::new(
            store,
            Arc::new(ScriptedCompletionClient::with_replies([EMPTY_CONTEXT, "analyze"])),
            Arc::new(ScriptedProfileFetcher::always_failing()),
            transport.clone(),
            Arc::new(NoopSleeper),
            GROUP.to_string(),
            &pipeline(),
        );

        let outcome = orchestrator
            .handle_message(SENDER, "analyze https://down.example please")
            .await;

        assert_eq!(outcome.status, TurnStatus::Handover);
        assert_eq!(transport.sent_to(GROUP).await.len(), 1);
        let replies = transport.sent_to(SENDER).await;
        assert_eq!(replies.len(), 1);
        assert!(replies[0].contains("consultant") || replies[0].contains("顾问"));
    }

    #[tokio::test]
    async fn every_message_is_replied_to_and_both_sides_are_in_history() {
        let harness = harness(ScriptedCompletionClient::with_replies([
            EMPTY_CONTEXT,
            "other",
            "Happy to help! Tell me a bit about what you sell.",
        ]));

        harness.orchestrator.handle_message(SENDER, "hi there").await;

        let turns = harness.store.recent(SENDER, 10).await.expect("history");
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, Role::User);
        assert_eq!(turns[1].role, Role::Assistant);
        assert_eq!(harness.transport.sent_to(SENDER).await.len(), 1);
    }
}
