//! Response Relay
//!
//! Turns an adapter's textual result into a chat message back to the
//! triggering conversation. Decides content and destination only;
//! actual message creation is delegated to the [`MessageSender`]
//! collaborator, fire-and-forget.

use async_trait::async_trait;
use fred::interfaces::ListInterface;
use serde_json::json;
use tracing::{debug, error};
use uuid::Uuid;

use super::types::{RecipientType, TriggerEvent};

/// Redis key for the message creation queue consumed by the chat
/// server.
const MESSAGE_QUEUE_KEY: &str = "outgoing_webhooks:responses";

/// External message-creation collaborator.
#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send(
        &self,
        bot_user_id: Uuid,
        recipient_type: RecipientType,
        recipients: &[String],
        subject: &str,
        content: &str,
        realm: &str,
    ) -> anyhow::Result<()>;
}

/// Relay a webhook result to the conversation that triggered it.
///
/// Stream triggers always get a reply on the same stream/topic, sent
/// as the owning bot. Private triggers are answered to all original
/// participants, but only when the bot itself is among them; a bot
/// that was merely mentioned in someone else's private conversation
/// must not start replying into it.
///
/// Returns whether a relay was attempted; `false` means the reply was
/// suppressed by the private-participant rule.
pub async fn send_response_message(
    sender: &dyn MessageSender,
    event: &TriggerEvent,
    content: &str,
) -> bool {
    let message = &event.message;

    let recipients = match message.recipient_type {
        RecipientType::Stream => {
            vec![message.stream_name().unwrap_or_default().to_string()]
        }
        RecipientType::Private => {
            let emails: Vec<String> = message
                .participants()
                .into_iter()
                .map(|p| p.email)
                .collect();
            if !emails.iter().any(|email| email == &event.bot_email) {
                debug!(
                    bot = %event.bot_email,
                    service = %event.service_name,
                    "Bot is not a participant of the private conversation, suppressing reply"
                );
                return false;
            }
            emails
        }
    };

    // Fire-and-forget: a lost response message is not worth failing the
    // dispatch over.
    if let Err(e) = sender
        .send(
            event.bot_user_id,
            message.recipient_type,
            &recipients,
            &message.subject,
            content,
            &message.sender_realm,
        )
        .await
    {
        error!(
            bot = %event.bot_email,
            service = %event.service_name,
            "Failed to relay webhook response: {}", e
        );
    }
    true
}

/// Relay a success result. `None` sends nothing.
///
/// Returns whether a reply was actually relayed.
pub async fn succeed_with_message(
    sender: &dyn MessageSender,
    event: &TriggerEvent,
    success_message: Option<String>,
) -> bool {
    match success_message {
        Some(text) => {
            let content = format!("Success! {text}");
            send_response_message(sender, event, &content).await
        }
        None => false,
    }
}

/// Relay a failure result. `None` sends nothing.
pub async fn fail_with_message(
    sender: &dyn MessageSender,
    event: &TriggerEvent,
    failure_message: Option<String>,
) {
    if let Some(text) = failure_message {
        let content = format!("Failure! {text}");
        send_response_message(sender, event, &content).await;
    }
}

/// Production sender: publishes a message-creation job onto the queue
/// the chat server consumes.
pub struct RedisMessageSender {
    redis: fred::clients::Client,
}

impl RedisMessageSender {
    pub const fn new(redis: fred::clients::Client) -> Self {
        Self { redis }
    }
}

#[async_trait]
impl MessageSender for RedisMessageSender {
    async fn send(
        &self,
        bot_user_id: Uuid,
        recipient_type: RecipientType,
        recipients: &[String],
        subject: &str,
        content: &str,
        realm: &str,
    ) -> anyhow::Result<()> {
        let job = json!({
            "sender_id": bot_user_id,
            "type": recipient_type,
            "to": recipients,
            "subject": subject,
            "content": content,
            "realm": realm,
            "forwarder_id": bot_user_id,
        });
        let payload = serde_json::to_string(&job)?;
        self.redis
            .lpush::<(), _, _>(MESSAGE_QUEUE_KEY, payload)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outgoing::test_fixtures::{private_event, stream_event, RecordingSender};

    #[tokio::test]
    async fn stream_reply_goes_to_same_stream_and_topic() {
        let sender = RecordingSender::default();
        let event = stream_event("ping");
        assert!(succeed_with_message(&sender, &event, Some("pong".into())).await);

        let sent = sender.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].recipient_type, RecipientType::Stream);
        assert_eq!(sent[0].recipients, vec!["Denmark".to_string()]);
        assert_eq!(sent[0].subject, event.message.subject);
        assert_eq!(sent[0].content, "Success! pong");
    }

    #[tokio::test]
    async fn none_sends_nothing() {
        let sender = RecordingSender::default();
        let event = stream_event("ping");
        assert!(!succeed_with_message(&sender, &event, None).await);
        fail_with_message(&sender, &event, None).await;
        assert!(sender.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn failure_gets_failure_prefix() {
        let sender = RecordingSender::default();
        let event = stream_event("ping");
        fail_with_message(&sender, &event, Some("bad token".into())).await;

        let sent = sender.sent.lock().unwrap();
        assert_eq!(sent[0].content, "Failure! bad token");
    }

    #[tokio::test]
    async fn private_reply_goes_to_all_participants_when_bot_included() {
        let sender = RecordingSender::default();
        let event = private_event("bot@example.com", true);
        succeed_with_message(&sender, &event, Some("hi".into())).await;

        let sent = sender.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].recipient_type, RecipientType::Private);
        assert!(sent[0]
            .recipients
            .contains(&"bot@example.com".to_string()));
        assert!(sent[0]
            .recipients
            .contains(&"othello@example.com".to_string()));
    }

    #[tokio::test]
    async fn private_reply_suppressed_when_bot_not_a_participant() {
        let sender = RecordingSender::default();
        let event = private_event("bot@example.com", false);
        assert!(!succeed_with_message(&sender, &event, Some("hi".into())).await);
        fail_with_message(&sender, &event, Some("oops".into())).await;
        assert!(sender.sent.lock().unwrap().is_empty());
    }
}
