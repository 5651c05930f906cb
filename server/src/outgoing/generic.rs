//! Generic Protocol Adapter
//!
//! Plain JSON POST: the whole message snapshot, the readable command
//! text, and the service token. Both success and failure hand the raw
//! response body back to the chat.

use serde_json::json;

use super::interface::OutgoingWebhookInterface;
use super::types::{
    OutgoingWebhookError, RequestBody, RestOperation, TriggerEvent, WebhookResponse,
};

pub struct GenericInterface {
    base_url: String,
    token: String,
}

impl GenericInterface {
    pub const fn new(base_url: String, token: String) -> Self {
        Self { base_url, token }
    }
}

impl OutgoingWebhookInterface for GenericInterface {
    fn process_event(
        &self,
        event: &TriggerEvent,
    ) -> Result<(RestOperation, RequestBody), OutgoingWebhookError> {
        let operation = RestOperation {
            method: "POST".into(),
            base_url: self.base_url.clone(),
            relative_url_path: String::new(),
            request_kwargs: serde_json::Map::new(),
        };
        let body = RequestBody::Json(json!({
            "data": self.make_readable(&event.command),
            "message": event.message,
            "token": self.token,
        }));
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
}

#[cfg(test)]
mod tests {
    use reqwest::StatusCode;

    use super::*;
    use crate::outgoing::test_fixtures::stream_event;

    fn adapter() -> GenericInterface {
        GenericInterface::new("http://x".into(), "T".into())
    }

    #[test]
    fn builds_post_with_exact_json_keys() {
        let event = stream_event("ping");
        let (operation, body) = adapter().process_event(&event).unwrap();

        assert_eq!(operation.method, "POST");
        assert_eq!(operation.base_url, "http://x");
        assert!(operation.relative_url_path.is_empty());
        assert!(operation.request_kwargs.is_empty());

        let RequestBody::Json(value) = body else {
            panic!("generic adapter must produce a JSON body");
        };
        let obj = value.as_object().unwrap();
        let mut keys: Vec<_> = obj.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(keys, ["data", "message", "token"]);
        assert_eq!(obj["data"], "ping");
        assert_eq!(obj["token"], "T");
    }

    #[test]
    fn rewrites_mentions_in_command() {
        let event = stream_event("@**Bob Jones** deploy");
        let (_, body) = adapter().process_event(&event).unwrap();
        let RequestBody::Json(value) = body else {
            panic!("expected JSON body");
        };
        assert_eq!(value["data"], "@Bob Jones deploy");
    }

    #[test]
    fn returns_raw_body_on_success_and_failure() {
        let event = stream_event("ping");
        let response = WebhookResponse {
            status: StatusCode::OK,
            body: "pong".into(),
        };
        assert_eq!(
            adapter().process_success(&response, &event).unwrap(),
            Some("pong".into())
        );
        let response = WebhookResponse {
            status: StatusCode::BAD_REQUEST,
            body: "bad token".into(),
        };
        assert_eq!(
            adapter().process_failure(&response, &event).unwrap(),
            Some("bad token".into())
        );
    }
}
