//! Shared fixtures for outgoing-webhook unit tests.

use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::json;
use uuid::Uuid;

use super::relay::MessageSender;
use super::retry::TriggerQueue;
use super::types::{MessageSnapshot, RecipientType, TriggerEvent};

/// A trigger event for a stream message on `Denmark` / topic `castle`.
pub fn stream_event(command: &str) -> TriggerEvent {
    TriggerEvent {
        command: command.to_string(),
        message: MessageSnapshot {
            sender_id: Uuid::now_v7(),
            sender_email: "othello@example.com".into(),
            sender_full_name: "Othello".into(),
            recipient_type: RecipientType::Stream,
            display_recipient: json!("Denmark"),
            stream_id: Some(42),
            subject: "castle".into(),
            content: command.to_string(),
            timestamp: 1724900000,
            sender_realm: "wonderland".into(),
        },
        bot_user_id: Uuid::now_v7(),
        bot_email: "bot@example.com".into(),
        service_name: "test".into(),
        trigger_word: Some("@bot".into()),
        failed_tries: 0,
    }
}

/// A trigger event for a private message between Othello and Iago.
/// When `bot_participates` is set, the bot is also a recipient.
pub fn private_event(bot_email: &str, bot_participates: bool) -> TriggerEvent {
    let mut participants = vec![
        json!({"id": Uuid::now_v7(), "email": "othello@example.com", "full_name": "Othello"}),
        json!({"id": Uuid::now_v7(), "email": "iago@example.com", "full_name": "Iago"}),
    ];
    if bot_participates {
        participants.push(json!({
            "id": Uuid::now_v7(),
            "email": bot_email,
            "full_name": "The Bot",
        }));
    }

    TriggerEvent {
        command: "hello".into(),
        message: MessageSnapshot {
            sender_id: Uuid::now_v7(),
            sender_email: "othello@example.com".into(),
            sender_full_name: "Othello".into(),
            recipient_type: RecipientType::Private,
            display_recipient: json!(participants),
            stream_id: None,
            subject: String::new(),
            content: "hello".into(),
            timestamp: 1724900000,
            sender_realm: "wonderland".into(),
        },
        bot_user_id: Uuid::now_v7(),
        bot_email: bot_email.to_string(),
        service_name: "test".into(),
        trigger_word: None,
        failed_tries: 0,
    }
}

/// One message captured by [`RecordingSender`].
#[derive(Debug, Clone)]
pub struct SentMessage {
    pub bot_user_id: Uuid,
    pub recipient_type: RecipientType,
    pub recipients: Vec<String>,
    pub subject: String,
    pub content: String,
    pub realm: String,
}

/// In-memory message sender that records everything it is asked to send.
#[derive(Default)]
pub struct RecordingSender {
    pub sent: Mutex<Vec<SentMessage>>,
}

#[async_trait]
impl MessageSender for RecordingSender {
    async fn send(
        &self,
        bot_user_id: Uuid,
        recipient_type: RecipientType,
        recipients: &[String],
        subject: &str,
        content: &str,
        realm: &str,
    ) -> anyhow::Result<()> {
        self.sent.lock().unwrap().push(SentMessage {
            bot_user_id,
            recipient_type,
            recipients: recipients.to_vec(),
            subject: subject.to_string(),
            content: content.to_string(),
            realm: realm.to_string(),
        });
        Ok(())
    }
}

/// In-memory trigger queue that records requeued events.
#[derive(Default)]
pub struct RecordingQueue {
    pub events: Mutex<Vec<TriggerEvent>>,
}

#[async_trait]
impl TriggerQueue for RecordingQueue {
    async fn requeue(&self, event: &TriggerEvent) -> anyhow::Result<()> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}
