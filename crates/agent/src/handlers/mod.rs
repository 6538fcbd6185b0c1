//! Capability handlers. Each implements one conversational behavior and
//! reports through the shared [`HandlerOutcome`] contract; the orchestrator
//! picks one per turn from the routing table.

pub mod analysis;
pub mod handover;
pub mod info;
pub mod knowledge;

pub use analysis::AnalysisHandler;
pub use handover::HandoverHandler;
pub use info::collect_info;
pub use knowledge::KnowledgeHandler;

use coco_core::domain::turn::{Role, Turn};

use crate::llm::{ChatMessage, ChatRole};

/// What a handler produced for the current turn.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerOutcome {
    /// Customer-facing reply text, ready for pacing.
    Reply(String),
    /// Reply text plus a forced handover notification side effect.
    Escalate { reply: String },
    /// Sentinel: nothing to say here, fall through to the handover path.
    NoReply,
}

/// Chat messages for a provider call: the recent turns, guaranteed to end
/// with the current user message exactly once.
pub(crate) fn messages_with_current(turns: &[Turn], message: &str) -> Vec<ChatMessage> {
    let mut messages: Vec<ChatMessage> = turns
        .iter()
        .map(|turn| match turn.role {
            Role::User => ChatMessage::user(turn.text.clone()),
            Role::Assistant => ChatMessage::assistant(turn.text.clone()),
        })
        .collect();

    // An assistant turn echoing the customer's exact words is not the
    // current message; only a trailing user turn counts.
    let already_current = matches!(
        messages.last(),
        Some(last) if last.role == ChatRole::User && last.content == message
    );
    if !already_current {
        messages.push(ChatMessage::user(message));
    }
    messages
}
