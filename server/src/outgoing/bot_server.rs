//! Bot-Server Protocol Adapter
//!
//! Forwards the trigger to a local per-bot handler process at
//! `POST <base_url>/bots/<bot-name>`. The bot server answers 200 with
//! `"Success!"`, or a 4xx with an error message when the bot is
//! unconfigured; the dispatch engine classifies either like any other
//! third-party response.

use serde_json::json;

use super::interface::OutgoingWebhookInterface;
use super::types::{
    OutgoingWebhookError, RequestBody, RestOperation, TriggerEvent, WebhookResponse,
};

pub struct BotServerInterface {
    base_url: String,
    bot_name: String,
}

impl BotServerInterface {
    /// Bot name is the local part of the bot's email address.
    pub fn new(base_url: String, bot_email: &str) -> Self {
        let bot_name = bot_email
            .split_once('@')
            .map_or(bot_email, |(local, _)| local)
            .to_string();
        Self { base_url, bot_name }
    }
}

impl OutgoingWebhookInterface for BotServerInterface {
    fn process_event(
        &self,
        event: &TriggerEvent,
    ) -> Result<(RestOperation, RequestBody), OutgoingWebhookError> {
        let operation = RestOperation {
            method: "POST".into(),
            base_url: self.base_url.clone(),
            relative_url_path: format!("bots/{}", self.bot_name),
            request_kwargs: serde_json::Map::new(),
        };
        let body = RequestBody::Json(json!({ "message": event.message }));
        Ok((operation, body))
    }

    fn process_success(
        &self,
        response: &WebhookResponse,
        _event: &TriggerEvent,
    ) -> Result<Option<String>, OutgoingWebhookError> {
        Ok(Some(response.body.clone()))
    }

    fn process_failure(
        &self,
        response: &WebhookResponse,
        _event: &TriggerEvent,
    ) -> Result<Option<String>, OutgoingWebhookError> {
        Ok(Some(response.body.clone()))
    }

    /// Bot-server bots trigger on the raw `@**name**` markup, so the
    /// content must pass through untouched.
    fn make_readable(&self, content: &str) -> String {
        content.to_string()
    }
}
