//! Outgoing Webhook Types
//!
//! Data structures for service profiles, trigger events, and the
//! request/response shapes exchanged between adapters and the dispatch
//! engine.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

/// Protocol spoken by a configured webhook integration.
///
/// Selected by exact string match on the service profile's `interface`
/// column; unknown or empty strings fall back to [`Self::Generic`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InterfaceKind {
    /// Plain JSON POST with the full message payload.
    Generic,
    /// Slack outgoing-webhook compatible form POST.
    Slack,
    /// Forward to a local per-bot handler process.
    BotServer,
}

impl InterfaceKind {
    /// Parse from the stored string form (e.g., `"slack"`).
    pub fn parse_str(s: &str) -> Option<Self> {
        match s {
            "generic" => Some(Self::Generic),
            "slack" => Some(Self::Slack),
            "bot-server" => Some(Self::BotServer),
            _ => None,
        }
    }

    /// Convert to the stored string form.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Generic => "generic",
            Self::Slack => "slack",
            Self::BotServer => "bot-server",
        }
    }

    /// Resolve a profile's interface string, falling back to Generic.
    ///
    /// The fallback is deliberate: a profile created by a newer release
    /// with an interface this worker does not know must still dispatch
    /// rather than error.
    pub fn from_profile_str(s: &str) -> Self {
        Self::parse_str(s).unwrap_or(Self::Generic)
    }
}

impl std::fmt::Display for InterfaceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One configured webhook integration, owned by a bot user.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ServiceProfile {
    pub id: i64,
    pub name: String,
    pub base_url: String,
    pub token: String,
    pub bot_user_id: Uuid,
    /// Interface string; resolved via [`InterfaceKind::from_profile_str`].
    pub interface: String,
}

/// Whether a message was sent to a stream or as a private message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecipientType {
    Stream,
    Private,
}

/// One participant of a private message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
}

/// Read-only copy of the triggering message, captured at trigger time.
///
/// Retries observe this snapshot, not the live message, so a later edit
/// or deletion never changes what gets dispatched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageSnapshot {
    pub sender_id: Uuid,
    pub sender_email: String,
    pub sender_full_name: String,
    #[serde(rename = "type")]
    pub recipient_type: RecipientType,
    /// Stream name (string) or private participant list (array).
    pub display_recipient: Value,
    pub stream_id: Option<i64>,
    pub subject: String,
    pub content: String,
    pub timestamp: i64,
    pub sender_realm: String,
}

impl MessageSnapshot {
    /// Stream name, when this is a stream message.
    pub fn stream_name(&self) -> Option<&str> {
        self.display_recipient.as_str()
    }

    /// Private message participants; empty for stream messages.
    pub fn participants(&self) -> Vec<Participant> {
        self.display_recipient
            .as_array()
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|v| serde_json::from_value(v.clone()).ok())
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// One unit of work: "this message should invoke this webhook".
///
/// Round-trips through the trigger queue as JSON. `failed_tries` is the
/// only field ever mutated, and only by the retry scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerEvent {
    pub command: String,
    pub message: MessageSnapshot,
    pub bot_user_id: Uuid,
    pub bot_email: String,
    pub service_name: String,
    pub trigger_word: Option<String>,
    #[serde(default)]
    pub failed_tries: u32,
}

/// HTTP request description produced by an adapter.
///
/// The dispatch engine validates the shape before executing; a bad
/// operation is a configuration error, never a retry.
#[derive(Debug, Clone)]
pub struct RestOperation {
    /// HTTP verb as a string (validated against known methods).
    pub method: String,
    pub base_url: String,
    /// Joined onto `base_url`; may be empty.
    pub relative_url_path: String,
    /// Extra transport options. Currently only `headers` is understood,
    /// as a string-to-string object.
    pub request_kwargs: serde_json::Map<String, Value>,
}

impl RestOperation {
    /// Validate the operation shape, failing closed on anything
    /// missing or malformed.
    pub fn validate(&self) -> Result<(), OutgoingWebhookError> {
        if self.method.is_empty() {
            return Err(OutgoingWebhookError::Configuration(
                "rest operation has no HTTP method".into(),
            ));
        }
        if reqwest::Method::from_bytes(self.method.as_bytes()).is_err() {
            return Err(OutgoingWebhookError::Configuration(format!(
                "rest operation has invalid HTTP method `{}`",
                self.method
            )));
        }
        if self.base_url.is_empty() {
            return Err(OutgoingWebhookError::Configuration(
                "rest operation has no base URL".into(),
            ));
        }
        if reqwest::Url::parse(&self.base_url).is_err() {
            return Err(OutgoingWebhookError::Configuration(format!(
                "rest operation base URL `{}` is not a valid URL",
                self.base_url
            )));
        }
        for (key, value) in &self.request_kwargs {
            match key.as_str() {
                "headers" => {
                    let ok = value
                        .as_object()
                        .is_some_and(|m| m.values().all(Value::is_string));
                    if !ok {
                        return Err(OutgoingWebhookError::Configuration(
                            "rest operation `headers` kwarg must map strings to strings".into(),
                        ));
                    }
                }
                other => {
                    return Err(OutgoingWebhookError::Configuration(format!(
                        "rest operation has unknown kwarg `{other}`"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Body produced by an adapter alongside the rest operation.
#[derive(Debug, Clone)]
pub enum RequestBody {
    Json(Value),
    /// Ordered key/value pairs, form-encoded on the wire.
    Form(Vec<(String, String)>),
}

/// Status and body of a third-party response, captured by the engine
/// so adapters never touch the transport.
#[derive(Debug, Clone)]
pub struct WebhookResponse {
    pub status: reqwest::StatusCode,
    pub body: String,
}

/// Terminal classification of one dispatch attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// 2xx from the third party; the reply text has been relayed.
    Success,
    /// 2xx from the third party, but no reply was relayed: the adapter
    /// produced no text, or the private-participant rule suppressed it.
    NothingToSend,
    /// Terminal failure (bad status, bad config, transport error).
    Failure,
    /// Transient outcome; the event was requeued for another attempt.
    Retried,
    /// Retry ceiling hit; the max-retries failure has been relayed.
    RetriesExhausted,
}

/// Errors surfaced by adapters and rest-operation validation.
///
/// Transport errors never appear here: only the dispatch engine talks
/// to the HTTP client, and it classifies those itself.
#[derive(Error, Debug)]
pub enum OutgoingWebhookError {
    /// Malformed rest operation or profile. Fatal for the event, never
    /// retried.
    #[error("invalid webhook configuration: {0}")]
    Configuration(String),

    /// The selected protocol cannot express this trigger (e.g., Slack
    /// with a private message). Surfaced to the user as a failure.
    #[error("{0}")]
    ProtocolUnsupported(String),

    /// The third party answered 2xx with a body the protocol could not
    /// parse. Treated as a failure, not a crash.
    #[error("malformed third-party response: {0}")]
    MalformedResponse(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn op(method: &str, base_url: &str) -> RestOperation {
        RestOperation {
            method: method.into(),
            base_url: base_url.into(),
            relative_url_path: String::new(),
            request_kwargs: serde_json::Map::new(),
        }
    }

    #[test]
    fn interface_kind_round_trips() {
        for kind in [
            InterfaceKind::Generic,
            InterfaceKind::Slack,
            InterfaceKind::BotServer,
        ] {
            assert_eq!(InterfaceKind::parse_str(kind.as_str()), Some(kind));
        }
    }

    #[test]
    fn unknown_interface_falls_back_to_generic() {
        assert_eq!(
            InterfaceKind::from_profile_str("nonexistent"),
            InterfaceKind::Generic
        );
        assert_eq!(InterfaceKind::from_profile_str(""), InterfaceKind::Generic);
    }

    #[test]
    fn rest_operation_accepts_well_formed() {
        assert!(op("POST", "http://example.com").validate().is_ok());
        assert!(op("GET", "https://example.com/api/").validate().is_ok());
    }

    #[test]
    fn rest_operation_rejects_missing_pieces() {
        assert!(op("", "http://example.com").validate().is_err());
        assert!(op("POST", "").validate().is_err());
        assert!(op("POST", "not a url").validate().is_err());
        assert!(op("P O S T", "http://example.com").validate().is_err());
    }

    #[test]
    fn rest_operation_rejects_unknown_kwargs() {
        let mut operation = op("POST", "http://example.com");
        operation
            .request_kwargs
            .insert("verify".into(), Value::Bool(false));
        assert!(operation.validate().is_err());
    }

    #[test]
    fn rest_operation_rejects_non_string_headers() {
        let mut operation = op("POST", "http://example.com");
        operation
            .request_kwargs
            .insert("headers".into(), serde_json::json!({"X-Retries": 3}));
        assert!(operation.validate().is_err());

        let mut operation = op("POST", "http://example.com");
        operation
            .request_kwargs
            .insert("headers".into(), serde_json::json!({"X-Token": "abc"}));
        assert!(operation.validate().is_ok());
    }

    #[test]
    fn trigger_event_defaults_failed_tries() {
        let raw = serde_json::json!({
            "command": "ping",
            "message": {
                "sender_id": Uuid::now_v7(),
                "sender_email": "othello@example.com",
                "sender_full_name": "Othello",
                "type": "stream",
                "display_recipient": "Denmark",
                "stream_id": 42,
                "subject": "castle",
                "content": "@**bot** ping",
                "timestamp": 1724900000,
                "sender_realm": "wonderland",
            },
            "bot_user_id": Uuid::now_v7(),
            "bot_email": "bot@example.com",
            "service_name": "test",
            "trigger_word": null,
        });

        let event: TriggerEvent = serde_json::from_value(raw).unwrap();
        assert_eq!(event.failed_tries, 0);
        assert_eq!(event.message.stream_name(), Some("Denmark"));
    }
}
