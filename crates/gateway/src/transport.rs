use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::info;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("send to `{recipient}` failed: {reason}")]
    Send { recipient: String, reason: String },
}

/// Outbound send capability. Individual numbers and the internal broadcast
/// group go through the same call; the recipient id shape picks the payload.
#[async_trait]
pub trait MessageTransport: Send + Sync {
    async fn send(&self, recipient: &str, text: &str) -> Result<(), TransportError>;
}

#[async_trait]
impl<T> MessageTransport for std::sync::Arc<T>
where
    T: MessageTransport + ?Sized,
{
    async fn send(&self, recipient: &str, text: &str) -> Result<(), TransportError> {
        (**self).send(recipient, text).await
    }
}

pub struct WassengerTransport {
    http: reqwest::Client,
    base_url: String,
    api_token: SecretString,
}

impl WassengerTransport {
    pub fn new(base_url: String, api_token: SecretString) -> Self {
        Self { http: reqwest::Client::new(), base_url, api_token }
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/messages", self.base_url.trim_end_matches('/'))
    }
}

/// Group WIDs carry an `@` suffix (`...@g.us`); bare phone numbers do not.
fn payload_for(recipient: &str, text: &str) -> Value {
    if recipient.contains('@') {
        json!({ "group": recipient, "message": text })
    } else {
        json!({ "phone": recipient, "message": text })
    }
}

#[async_trait]
impl MessageTransport for WassengerTransport {
    async fn send(&self, recipient: &str, text: &str) -> Result<(), TransportError> {
        let response = self
            .http
            .post(self.endpoint())
            .header("Token", self.api_token.expose_secret())
            .json(&payload_for(recipient, text))
            .send()
            .await
            .map_err(|error| TransportError::Send {
                recipient: recipient.to_string(),
                reason: error.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Send {
                recipient: recipient.to_string(),
                reason: format!("status {status}"),
            });
        }

        info!(
            event_name = "gateway.transport.sent",
            recipient = %recipient,
            chars = text.chars().count(),
            "message accepted by transport"
        );
        Ok(())
    }
}

/// Test double that records every send in order. `fail_sends` makes each
/// call fail after recording, for undelivered-path tests.
#[derive(Default)]
pub struct RecordingTransport {
    pub sent: Mutex<Vec<(String, String)>>,
    pub fail_sends: bool,
}

impl RecordingTransport {
    pub fn failing() -> Self {
        Self { sent: Mutex::new(Vec::new()), fail_sends: true }
    }

    pub async fn sent_to(&self, recipient: &str) -> Vec<String> {
        self.sent
            .lock()
            .await
            .iter()
            .filter(|(to, _)| to == recipient)
            .map(|(_, text)| text.clone())
            .collect()
    }
}

#[async_trait]
impl MessageTransport for RecordingTransport {
    async fn send(&self, recipient: &str, text: &str) -> Result<(), TransportError> {
        self.sent.lock().await.push((recipient.to_string(), text.to_string()));
        if self.fail_sends {
            return Err(TransportError::Send {
                recipient: recipient.to_string(),
                reason: "recording transport configured to fail".to_string(),
            });
        }
        Ok(())
    }
}
