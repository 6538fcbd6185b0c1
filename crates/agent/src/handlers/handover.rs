use std::sync::Arc;

use tracing::{info, warn};

use coco_core::domain::context::{ContextField, ConversationContext, Language};
use coco_core::prompts;
use coco_gateway::transport::MessageTransport;

/// Escalates a session to the human sales team: posts a briefing note to the
/// internal group and acknowledges the customer. The note is best-effort; a
/// failed group send is logged and the customer-facing turn proceeds anyway.
pub struct HandoverHandler {
    transport: Arc<dyn MessageTransport>,
    group_id: String,
}

impl HandoverHandler {
    pub fn new(transport: Arc<dyn MessageTransport>, group_id: String) -> Self {
        Self { transport, group_id }
    }

    /// Posts the briefing note to the sales group. Never fails the turn.
    pub async fn notify(&self, session_id: &str, message: &str, context: &ConversationContext) {
        let note = briefing_note(session_id, message, context);
        match self.transport.send(&self.group_id, &note).await {
            Ok(()) => info!(
                event_name = "agent.handover.notified",
                session_id = %session_id,
                group_id = %self.group_id,
                "sales group notified"
            ),
            Err(error) => warn!(
                event_name = "agent.handover.notify_failed",
                session_id = %session_id,
                group_id = %self.group_id,
                error = %error,
                "sales group notification failed"
            ),
        }
    }

    /// Short acknowledgement the customer sees once escalation is underway.
    pub fn acknowledgement(&self, language: Language) -> String {
        prompts::handover_ack(language).to_string()
    }
}

fn briefing_note(session_id: &str, message: &str, context: &ConversationContext) -> String {
    let mut note = format!("[Handover] {session_id}\nLast message: {message}");
    for field in ContextField::ALL {
        let value = context
            .field(field)
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or(prompts::FIELD_PLACEHOLDER);
        note.push_str(&format!("\n{}: {}", field.key(), value));
    }
    note
}
