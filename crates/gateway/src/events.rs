use serde::Deserialize;

/// Raw webhook envelope as Wassenger posts it. Unknown fields are ignored;
/// authentication of the caller is out of scope here.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct InboundEnvelope {
    #[serde(default)]
    pub event: String,
    #[serde(default)]
    pub data: InboundData,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct InboundData {
    #[serde(rename = "fromNumber")]
    pub from_number: Option<String>,
    pub from: Option<String>,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub meta: InboundMeta,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct InboundMeta {
    #[serde(rename = "isGroup", default)]
    pub is_group: bool,
}

/// A webhook event the pipeline should actually process.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboundMessage {
    /// Sender id, which doubles as the session id.
    pub sender: String,
    pub body: String,
}

/// Outcome of envelope filtering. Ignored events are acknowledged upstream
/// with their status label and never reach the orchestrator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InboundDecision {
    Message(InboundMessage),
    Ignored(&'static str),
}

const NEW_MESSAGE_EVENT: &str = "message:in:new";

/// Filters one envelope: only direct `message:in:new` events with a sender
/// and a non-empty body proceed.
pub fn parse_inbound(envelope: &InboundEnvelope) -> InboundDecision {
    if envelope.event != NEW_MESSAGE_EVENT {
        return InboundDecision::Ignored("ignored");
    }

    if envelope.data.meta.is_group {
        return InboundDecision::Ignored("group_ignored");
    }

    let sender = sender_id(&envelope.data);
    let body = envelope.data.body.trim();
    match sender {
        Some(sender) if !body.is_empty() => {
            InboundDecision::Message(InboundMessage { sender, body: body.to_string() })
        }
        _ => InboundDecision::Ignored("ignored"),
    }
}

/// `fromNumber` when present, else the `from` WID up to its `@` suffix.
fn sender_id(data: &InboundData) -> Option<String> {
    if let Some(number) = data.from_number.as_ref().filter(|value| !value.trim().is_empty()) {
        return Some(number.trim().to_string());
    }

    data.from
        .as_deref()
        .map(|from| from.split('@').next().unwrap_or_default().trim().to_string())
        .filter(|id| !id.is_empty())
}

#[cfg(test)]
mod tests {
    use super::{parse_inbound, InboundDecision, InboundEnvelope, InboundMessage};

    fn envelope(json: serde_json::Value) -> InboundEnvelope {
        serde_json::from_value(json).expect("envelope should deserialize")
    }

    #[test]
    fn new_direct_message_is_accepted() {
        let decision = parse_inbound(&envelope(serde_json::json!({
            "event": "message:in:new",
            "data": {"fromNumber": "+60123", "body": "我想了解套餐", "meta": {"isGroup": false}}
        })));

        assert_eq!(
            decision,
            InboundDecision::Message(InboundMessage {
                sender: "+60123".to_string(),
                body: "我想了解套餐".to_string(),
            })
        );
    }

    #[test]
    fn non_message_events_are_ignored() {
        let decision = parse_inbound(&envelope(serde_json::json!({
            "event": "message:out:ack",
            "data": {"fromNumber": "+60123", "body": "hi"}
        })));

        assert_eq!(decision, InboundDecision::Ignored("ignored"));
    }

    #[test]
    fn group_messages_are_ignored_with_their_own_status() {
        let decision = parse_inbound(&envelope(serde_json::json!({
            "event": "message:in:new",
            "data": {"fromNumber": "+60123", "body": "hi", "meta": {"isGroup": true}}
        })));

        assert_eq!(decision, InboundDecision::Ignored("group_ignored"));
    }

    #[test]
    fn sender_falls_back_to_the_wid_prefix() {
        let decision = parse_inbound(&envelope(serde_json::json!({
            "event": "message:in:new",
            "data": {"from": "60123456789@c.us", "body": "hello"}
        })));

        assert_eq!(
            decision,
            InboundDecision::Message(InboundMessage {
                sender: "60123456789".to_string(),
                body: "hello".to_string(),
            })
        );
    }

    #[test]
    fn missing_sender_or_empty_body_is_ignored() {
        let no_sender = parse_inbound(&envelope(serde_json::json!({
            "event": "message:in:new",
            "data": {"body": "hello"}
        })));
        assert_eq!(no_sender, InboundDecision::Ignored("ignored"));

        let empty_body = parse_inbound(&envelope(serde_json::json!({
            "event": "message:in:new",
            "data": {"fromNumber": "+60123", "body": "   "}
        })));
        assert_eq!(empty_body, InboundDecision::Ignored("ignored"));
    }

    #[test]
    fn envelope_with_missing_sections_deserializes_to_ignored() {
        let decision = parse_inbound(&envelope(serde_json::json!({})));
        assert_eq!(decision, InboundDecision::Ignored("ignored"));
    }
}
