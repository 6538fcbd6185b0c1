use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tracing::{info, warn};

use coco_agent::SessionOrchestrator;
use coco_gateway::events::{parse_inbound, InboundDecision, InboundEnvelope};

#[derive(Clone)]
pub struct WebhookState {
    orchestrator: Arc<SessionOrchestrator>,
}

pub fn router(orchestrator: Arc<SessionOrchestrator>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/webhook", post(webhook))
        .with_state(WebhookState { orchestrator })
}

/// Wassenger pings the bare root to verify the endpoint is alive.
async fn root() -> &'static str {
    "OK"
}

/// Webhook entry point. Always answers 200 with a JSON status: a non-200
/// would make the provider retry the delivery, and a retried message would
/// run the whole pipeline again.
async fn webhook(
    State(state): State<WebhookState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Json<Value> {
    let envelope = match payload {
        Ok(Json(value)) => serde_json::from_value::<InboundEnvelope>(value).unwrap_or_default(),
        Err(rejection) => {
            warn!(
                event_name = "server.webhook.bad_payload",
                error = %rejection,
                "undecodable webhook payload acknowledged"
            );
            return Json(json!({ "status": "ignored" }));
        }
    };

    match parse_inbound(&envelope) {
        InboundDecision::Ignored(reason) => {
            info!(
                event_name = "server.webhook.ignored",
                reason,
                "webhook event filtered out"
            );
            Json(json!({ "status": reason }))
        }
        InboundDecision::Message(message) => {
            let outcome = state.orchestrator.handle_message(&message.sender, &message.body).await;
            Json(json!({
                "status": outcome.status.as_str(),
                "intent": outcome.intent.map(|intent| intent.label()),
                "delivered_chunks": outcome.delivered_chunks,
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use coco_agent::llm::ScriptedCompletionClient;
    use coco_agent::profile::ScriptedProfileFetcher;
    use coco_agent::SessionOrchestrator;
    use coco_core::config::PipelineConfig;
    use coco_db::InMemoryHistoryStore;
    use coco_gateway::pacer::NoopSleeper;
    use coco_gateway::transport::RecordingTransport;

    use super::router;

    const GROUP: &str = "120363012345@g.us";

    fn test_router(llm: ScriptedCompletionClient, transport: Arc<RecordingTransport>) -> axum::Router {
        let pipeline = PipelineConfig {
            history_window: 10,
            classifier_window: 5,
            max_chunks: 3,
            inter_chunk_delay_ms: 0,
            fetch_retry_delay_ms: 0,
            fetch_max_attempts: 2,
            min_analysis_reply_chars: 30,
        };
        let orchestrator = SessionOrchestrator::new(
            Arc::new(InMemoryHistoryStore::default()),
            Arc::new(llm),
            Arc::new(ScriptedProfileFetcher::default()),
            transport,
            Arc::new(NoopSleeper),
            GROUP.to_string(),
            &pipeline,
        );
        router(Arc::new(orchestrator))
    }

    async fn post_json(router: axum::Router, payload: Value) -> (StatusCode, Value) {
        let response = router
            .oneshot(
                Request::post("/webhook")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(payload.to_string()))
                    .expect("request"),
            )
            .await
            .expect("response");

        let status = response.status();
        let bytes = response.into_body().collect().await.expect("body").to_bytes();
        (status, serde_json::from_slice(&bytes).expect("json body"))
    }

    #[tokio::test]
    async fn root_answers_ok() {
        let router = test_router(
            ScriptedCompletionClient::default(),
            Arc::new(RecordingTransport::default()),
        );

        let response = router
            .oneshot(Request::get("/").body(Body::empty()).expect("request"))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.expect("body").to_bytes();
        assert_eq!(&bytes[..], b"OK");
    }

    #[tokio::test]
    async fn group_events_are_acknowledged_without_processing() {
        let transport = Arc::new(RecordingTransport::default());
        let router = test_router(ScriptedCompletionClient::default(), transport.clone());

        let (status, body) = post_json(
            router,
            json!({
                "event": "message:in:new",
                "data": { "from": "12345@g.us", "body": "hi", "meta": { "isGroup": true } }
            }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "group_ignored");
        assert!(transport.sent.lock().await.is_empty());
    }

    #[tokio::test]
    async fn direct_message_runs_the_pipeline_and_reports_its_outcome() {
        let transport = Arc::new(RecordingTransport::default());
        let llm = ScriptedCompletionClient::with_replies([
            r#"{"name": null, "business_link": null, "objective": null}"#,
            "package",
            "We offer three tiers. Happy to walk you through each one.",
        ]);
        let router = test_router(llm, transport.clone());

        let (status, body) = post_json(
            router,
            json!({
                "event": "message:in:new",
                "data": { "fromNumber": "+60123456789", "body": "tell me about packages" }
            }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["intent"], "package");
        assert_eq!(body["delivered_chunks"], 1);
        assert_eq!(transport.sent_to("+60123456789").await.len(), 1);
    }

    #[tokio::test]
    async fn unrelated_event_types_are_acknowledged_as_ignored() {
        let router = test_router(
            ScriptedCompletionClient::default(),
            Arc::new(RecordingTransport::default()),
        );

        let (status, body) =
            post_json(router, json!({ "event": "message:out:ack", "data": {} })).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ignored");
    }

    #[tokio::test]
    async fn undecodable_payload_is_still_a_200() {
        let router = test_router(
            ScriptedCompletionClient::default(),
            Arc::new(RecordingTransport::default()),
        );

        let response = router
            .oneshot(
                Request::post("/webhook")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from("not json at all"))
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.expect("body").to_bytes();
        let body: Value = serde_json::from_slice(&bytes).expect("json body");
        assert_eq!(body["status"], "ignored");
    }
}
