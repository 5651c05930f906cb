//! Dispatch Engine
//!
//! Executes one webhook attempt: adapter translation, the HTTP call,
//! outcome classification, and the success/failure/retry actions.
//!
//! Classification is by status prefix: any 2xx is success, any 5xx is
//! transient and retried, everything else is a terminal failure. A
//! transport timeout retries; any other transport error is terminal,
//! so a misbehaving endpoint cannot provoke a retry storm.

use std::time::Duration;

use tracing::{error, info, warn};

use super::interface::OutgoingWebhookInterface;
use super::relay::{fail_with_message, succeed_with_message, MessageSender};
use super::retry::{request_retry, RetryDisposition, TriggerQueue};
use super::types::{
    DispatchOutcome, OutgoingWebhookError, RequestBody, RestOperation, TriggerEvent,
    WebhookResponse,
};

/// Collaborators and transport settings for one dispatch attempt.
pub struct DispatchContext<'a> {
    pub sender: &'a dyn MessageSender,
    pub queue: &'a dyn TriggerQueue,
    pub http: &'a reqwest::Client,
    /// Hard bound on the outbound call; unbounded waits are disallowed.
    pub timeout: Duration,
}

/// Dispatch one trigger event through the given adapter.
pub async fn dispatch(
    ctx: &DispatchContext<'_>,
    adapter: &dyn OutgoingWebhookInterface,
    event: &mut TriggerEvent,
) -> DispatchOutcome {
    let (operation, body) = match adapter.process_event(event) {
        Ok(pair) => pair,
        Err(e) => return handle_adapter_error(ctx, event, &e).await,
    };

    if let Err(e) = operation.validate() {
        return handle_adapter_error(ctx, event, &e).await;
    }

    let request = match build_request(ctx, &operation, body) {
        Ok(req) => req,
        Err(e) => return handle_adapter_error(ctx, event, &e).await,
    };

    match request.send().await {
        Ok(response) => {
            let status = response.status();
            let body = match response.text().await {
                Ok(body) => body,
                Err(e) if e.is_timeout() => return handle_timeout(ctx, event).await,
                Err(e) => return handle_transport_error(ctx, event, &e).await,
            };
            let response = WebhookResponse { status, body };

            if status.is_success() {
                match adapter.process_success(&response, event) {
                    Ok(message) => {
                        if succeed_with_message(ctx.sender, event, message).await {
                            DispatchOutcome::Success
                        } else {
                            DispatchOutcome::NothingToSend
                        }
                    }
                    Err(e) => {
                        warn!(
                            command = %event.command,
                            service = %event.service_name,
                            "Could not process webhook response: {}", e
                        );
                        fail_with_message(ctx.sender, event, Some(e.to_string())).await;
                        DispatchOutcome::Failure
                    }
                }
            } else if status.is_server_error() {
                retry_outcome(
                    request_retry(
                        ctx.queue,
                        ctx.sender,
                        event,
                        "Internal Server error at third party.",
                    )
                    .await,
                )
            } else {
                match adapter.process_failure(&response, event) {
                    Ok(message) => {
                        fail_with_message(ctx.sender, event, message).await;
                    }
                    Err(e) => {
                        warn!(
                            command = %event.command,
                            service = %event.service_name,
                            "Could not process webhook failure response: {}", e
                        );
                        fail_with_message(ctx.sender, event, Some(e.to_string())).await;
                    }
                }
                DispatchOutcome::Failure
            }
        }
        Err(e) if e.is_timeout() => handle_timeout(ctx, event).await,
        Err(e) => handle_transport_error(ctx, event, &e).await,
    }
}

/// Build the outbound request from a validated rest operation.
fn build_request(
    ctx: &DispatchContext<'_>,
    operation: &RestOperation,
    body: RequestBody,
) -> Result<reqwest::RequestBuilder, OutgoingWebhookError> {
    let method = reqwest::Method::from_bytes(operation.method.as_bytes()).map_err(|_| {
        OutgoingWebhookError::Configuration(format!(
            "invalid HTTP method `{}`",
            operation.method
        ))
    })?;

    let base = reqwest::Url::parse(&operation.base_url).map_err(|e| {
        OutgoingWebhookError::Configuration(format!(
            "base URL `{}` is not valid: {e}",
            operation.base_url
        ))
    })?;
    let url = base.join(&operation.relative_url_path).map_err(|e| {
        OutgoingWebhookError::Configuration(format!(
            "could not join `{}` onto `{}`: {e}",
            operation.relative_url_path, operation.base_url
        ))
    })?;

    let mut request = ctx.http.request(method, url).timeout(ctx.timeout);

    if let Some(headers) = operation.request_kwargs.get("headers") {
        if let Some(map) = headers.as_object() {
            for (name, value) in map {
                if let Some(value) = value.as_str() {
                    request = request.header(name, value);
                }
            }
        }
    }

    request = match body {
        RequestBody::Json(value) => request.json(&value),
        RequestBody::Form(pairs) => request.form(&pairs),
    };

    Ok(request)
}

/// Adapter or validation errors: fatal for this event, never retried.
async fn handle_adapter_error(
    ctx: &DispatchContext<'_>,
    event: &TriggerEvent,
    err: &OutgoingWebhookError,
) -> DispatchOutcome {
    match err {
        OutgoingWebhookError::ProtocolUnsupported(message) => {
            warn!(
                command = %event.command,
                service = %event.service_name,
                "Webhook protocol rejected the trigger: {}", message
            );
            fail_with_message(ctx.sender, event, Some(message.clone())).await;
        }
        other => {
            error!(
                command = %event.command,
                service = %event.service_name,
                "Webhook configuration error: {}", other
            );
            fail_with_message(
                ctx.sender,
                event,
                Some(format!(
                    "Webhook service `{}` is misconfigured! See the logs for more information.",
                    event.service_name
                )),
            )
            .await;
        }
    }
    DispatchOutcome::Failure
}

async fn handle_timeout(ctx: &DispatchContext<'_>, event: &mut TriggerEvent) -> DispatchOutcome {
    info!(
        command = %event.command,
        service = %event.service_name,
        "Trigger event timed out. Retrying"
    );
    retry_outcome(
        request_retry(
            ctx.queue,
            ctx.sender,
            event,
            "Unable to connect with the third party.",
        )
        .await,
    )
}

/// Indeterminate transport failures (DNS, connection reset, malformed
/// response) are not assumed transient and are never retried.
async fn handle_transport_error(
    ctx: &DispatchContext<'_>,
    event: &TriggerEvent,
    err: &reqwest::Error,
) -> DispatchOutcome {
    error!(
        command = %event.command,
        service = %event.service_name,
        "Outgoing webhook request failed: {}", err
    );
    let message = format!(
        "An exception occurred for message `{}`! See the logs for more information.",
        event.command
    );
    fail_with_message(ctx.sender, event, Some(message)).await;
    DispatchOutcome::Failure
}

const fn retry_outcome(disposition: RetryDisposition) -> DispatchOutcome {
    match disposition {
        RetryDisposition::Requeued => DispatchOutcome::Retried,
        RetryDisposition::RetriesExhausted => DispatchOutcome::RetriesExhausted,
    }
}
