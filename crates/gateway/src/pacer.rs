use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use coco_core::pacing::{split_into_chunks, PacingPolicy};

use crate::transport::MessageTransport;

/// Clock seam. Production sleeps on the tokio timer; tests inject a no-op
/// (or recording) sleeper so pacing contracts run without wall-clock waits.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

#[async_trait]
impl<S> Sleeper for std::sync::Arc<S>
where
    S: Sleeper + ?Sized,
{
    async fn sleep(&self, duration: Duration) {
        (**self).sleep(duration).await;
    }
}

pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Sleeper that returns immediately, recording nothing.
#[derive(Default)]
pub struct NoopSleeper;

#[async_trait]
impl Sleeper for NoopSleeper {
    async fn sleep(&self, _duration: Duration) {}
}

/// Sequences one reply to one recipient: chunk, send, wait, send. A failed
/// chunk is logged as undelivered and never retried; later chunks are still
/// attempted so the surviving text keeps its reading order.
pub struct ReplyPacer<T, S> {
    transport: T,
    sleeper: S,
    policy: PacingPolicy,
}

impl<T, S> ReplyPacer<T, S>
where
    T: MessageTransport,
    S: Sleeper,
{
    pub fn new(transport: T, sleeper: S, policy: PacingPolicy) -> Self {
        Self { transport, sleeper, policy }
    }

    pub fn policy(&self) -> &PacingPolicy {
        &self.policy
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn sleeper(&self) -> &S {
        &self.sleeper
    }

    /// Delivers the reply as at most `max_chunks` ordered messages, waiting
    /// the configured delay between consecutive sends. Returns the number of
    /// chunks the transport accepted.
    pub async fn deliver(&self, recipient: &str, reply: &str) -> usize {
        let chunks = split_into_chunks(reply, self.policy.max_chunks);
        let mut delivered = 0;

        for (index, chunk) in chunks.iter().enumerate() {
            if index > 0 {
                self.sleeper.sleep(self.policy.inter_chunk_delay).await;
            }

            match self.transport.send(recipient, chunk).await {
                Ok(()) => delivered += 1,
                Err(error) => {
                    warn!(
                        event_name = "gateway.pacer.chunk_undelivered",
                        recipient = %recipient,
                        chunk_index = index,
                        error = %error,
                        "chunk send failed, not retried"
                    );
                }
            }
        }

        info!(
            event_name = "gateway.pacer.delivered",
            recipient = %recipient,
            chunks = chunks.len(),
            delivered,
            "reply delivery finished"
        );
        delivered
    }
}
