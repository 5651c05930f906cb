//! Slack-Compatible Protocol Adapter
//!
//! Speaks the Slack outgoing-webhook contract: an ordered form-encoded
//! POST, with the reply text pulled from the `text` field of a JSON
//! response. Private messages have no Slack equivalent and are rejected
//! before any HTTP call.

use super::interface::OutgoingWebhookInterface;
use super::types::{
    OutgoingWebhookError, RecipientType, RequestBody, RestOperation, TriggerEvent, WebhookResponse,
};

pub struct SlackInterface {
    base_url: String,
    token: String,
    service_id: Option<i64>,
}

impl SlackInterface {
    pub const fn new(base_url: String, token: String, service_id: Option<i64>) -> Self {
        Self {
            base_url,
            token,
            service_id,
        }
    }
}

/// Domain part of an email address (`user@example.com` -> `example.com`).
fn email_to_domain(email: &str) -> &str {
    email.rsplit_once('@').map_or("", |(_, domain)| domain)
}

impl OutgoingWebhookInterface for SlackInterface {
    fn process_event(
        &self,
        event: &TriggerEvent,
    ) -> Result<(RestOperation, RequestBody), OutgoingWebhookError> {
        if event.message.recipient_type == RecipientType::Private {
            return Err(OutgoingWebhookError::ProtocolUnsupported(
                "Private messaging service not supported.".into(),
            ));
        }

        let service_id = self.service_id.ok_or_else(|| {
            OutgoingWebhookError::Configuration(format!(
                "no service id resolved for slack service `{}`",
                event.service_name
            ))
        })?;

        let operation = RestOperation {
            method: "POST".into(),
            base_url: self.base_url.clone(),
            relative_url_path: String::new(),
            request_kwargs: serde_json::Map::new(),
        };

        let message = &event.message;
        // Order matters: Slack-style consumers read these positionally.
        let pairs = vec![
            ("token".into(), self.token.clone()),
            ("team_id".into(), message.sender_realm.clone()),
            (
                "team_domain".into(),
                email_to_domain(&message.sender_email).to_string(),
            ),
            (
                "channel_id".into(),
                message.stream_id.map(|id| id.to_string()).unwrap_or_default(),
            ),
            (
                "channel_name".into(),
                message.stream_name().unwrap_or_default().to_string(),
            ),
            ("timestamp".into(), message.timestamp.to_string()),
            ("user_id".into(), message.sender_id.to_string()),
            ("user_name".into(), message.sender_full_name.clone()),
            ("text".into(), self.make_readable(&event.command)),
            (
                "trigger_word".into(),
                event.trigger_word.clone().unwrap_or_default(),
            ),
            ("service_id".into(), service_id.to_string()),
        ];

        Ok((operation, RequestBody::Form(pairs)))
    }

    fn process_success(
        &self,
        response: &WebhookResponse,
        _event: &TriggerEvent,
    ) -> Result<Option<String>, OutgoingWebhookError> {
        let parsed: serde_json::Value = serde_json::from_str(&response.body)
            .map_err(|e| OutgoingWebhookError::MalformedResponse(e.to_string()))?;
        let text = parsed
            .get("text")
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default();
        Ok(Some(text.to_string()))
    }

    fn process_failure(
        &self,
        response: &WebhookResponse,
        _event: &TriggerEvent,
    ) -> Result<Option<String>, OutgoingWebhookError> {
        Ok(Some(response.body.clone()))
    }
}
