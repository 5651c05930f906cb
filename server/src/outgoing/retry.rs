//! Retry Scheduler
//!
//! Re-enqueues a trigger event for another dispatch attempt, bounded by
//! a fixed maximum. Retries are an immediate requeue onto the same
//! trigger queue; each attempt is a fresh, independent execution with
//! no shared state beyond the event's own `failed_tries` counter.

use async_trait::async_trait;
use fred::interfaces::ListInterface;
use tracing::{error, warn};

use super::relay::{fail_with_message, MessageSender};
use super::types::TriggerEvent;

/// Maximum dispatch retries per trigger event.
pub const MAX_REQUEST_RETRIES: u32 = 3;

/// Redis key for the trigger event queue (consumed by the worker,
/// produced by trigger detection and by retries).
pub const TRIGGER_QUEUE_KEY: &str = "outgoing_webhooks";

/// External trigger queue collaborator.
#[async_trait]
pub trait TriggerQueue: Send + Sync {
    /// Publish an event back onto the queue for another attempt.
    async fn requeue(&self, event: &TriggerEvent) -> anyhow::Result<()>;
}

/// What the scheduler did with a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDisposition {
    /// The event went back on the queue for another attempt.
    Requeued,
    /// The retry ceiling was hit; a terminal failure was relayed.
    RetriesExhausted,
}

/// Schedule another attempt for a failed dispatch, or give up once the
/// ceiling is exceeded.
///
/// `failed_tries` only ever increases. Requeueing is fire-and-forget:
/// a queue publish failure is logged, not propagated.
pub async fn request_retry(
    queue: &dyn TriggerQueue,
    sender: &dyn MessageSender,
    event: &mut TriggerEvent,
    failure_message: &str,
) -> RetryDisposition {
    event.failed_tries += 1;

    if event.failed_tries > MAX_REQUEST_RETRIES {
        let message = format!("Maximum retries exceeded! {failure_message}");
        fail_with_message(sender, event, Some(message)).await;
        warn!(
            bot = %event.bot_email,
            command = %event.command,
            failed_tries = event.failed_tries,
            "Maximum retries exceeded for trigger"
        );
        RetryDisposition::RetriesExhausted
    } else {
        if let Err(e) = queue.requeue(event).await {
            error!(
                bot = %event.bot_email,
                service = %event.service_name,
                "Failed to requeue trigger event: {}", e
            );
        }
        RetryDisposition::Requeued
    }
}

/// Production queue: the same Redis list the worker consumes.
pub struct RedisTriggerQueue {
    redis: fred::clients::Client,
}

impl RedisTriggerQueue {
    pub const fn new(redis: fred::clients::Client) -> Self {
        Self { redis }
    }
}

#[async_trait]
impl TriggerQueue for RedisTriggerQueue {
    async fn requeue(&self, event: &TriggerEvent) -> anyhow::Result<()> {
        let payload = serde_json::to_string(event)?;
        self.redis
            .lpush::<(), _, _>(TRIGGER_QUEUE_KEY, payload)
            .await?;
        Ok(())
    }
}
