//! Trigger Worker
//!
//! Background worker that consumes trigger events from the Redis queue
//! and drives them through the dispatch engine.
//!
//! Architecture:
//! - Trigger detection (and the retry scheduler) LPUSH events onto
//!   `outgoing_webhooks`; this loop BRPOPs them one at a time.
//! - The queue's single-delivery semantics mean no two workers ever
//!   hold the same event; distinct events dispatch fully in parallel
//!   via spawned tasks.

use std::sync::Arc;
use std::time::Duration;

use fred::interfaces::ListInterface;
use fred::prelude::*;
use tracing::{error, info};

use super::dispatch::{dispatch, DispatchContext};
use super::interface::InterfaceRegistry;
use super::queries::ServiceProfileStore;
use super::relay::MessageSender;
use super::retry::{TriggerQueue, TRIGGER_QUEUE_KEY};
use super::types::{InterfaceKind, TriggerEvent};

/// Everything the worker needs to process trigger events.
pub struct WorkerDeps {
    pub store: Arc<dyn ServiceProfileStore>,
    pub sender: Arc<dyn MessageSender>,
    pub queue: Arc<dyn TriggerQueue>,
    pub registry: Arc<InterfaceRegistry>,
    pub http: reqwest::Client,
    /// Per-request timeout for outbound webhook calls.
    pub timeout: Duration,
    /// Fallback base URL for bot-server profiles with an empty base URL.
    pub bot_server_base_url: Option<String>,
}

/// Run the trigger worker loop. Never returns under normal operation.
pub async fn run_trigger_worker(redis: Client, deps: Arc<WorkerDeps>) {
    info!("Outgoing webhook trigger worker started");

    // Track consecutive BRPOP errors for exponential backoff.
    let mut consecutive_errors: u32 = 0;

    loop {
        // BRPOP with a short timeout so shutdown signals are observed
        // promptly.
        let result: Result<Option<(String, String)>, _> =
            redis.brpop(TRIGGER_QUEUE_KEY, 2.0).await;

        let payload_str = match result {
            Ok(Some((_key, value))) => {
                consecutive_errors = 0;
                value
            }
            Ok(None) => {
                consecutive_errors = 0;
                continue; // Timeout, no items
            }
            Err(e) => {
                consecutive_errors += 1;
                let backoff_secs = 1u64 << consecutive_errors.min(6); // 2, 4, 8, ... 64
                if backoff_secs > 30 {
                    error!(
                        consecutive_errors,
                        backoff_secs,
                        "Persistent Redis failure in trigger worker, backing off: {}",
                        e
                    );
                } else {
                    error!("Failed to BRPOP from trigger queue: {}", e);
                }
                tokio::time::sleep(Duration::from_secs(backoff_secs)).await;
                continue;
            }
        };

        // Log a truncated payload on deserialization failure for
        // debugging; the item is dropped, not retried.
        let event: TriggerEvent = match serde_json::from_str(&payload_str) {
            Ok(event) => event,
            Err(e) => {
                let truncated: String = payload_str.chars().take(500).collect();
                error!(
                    error = %e,
                    payload_preview = %truncated,
                    "Failed to deserialize trigger event"
                );
                continue;
            }
        };

        let deps = deps.clone();

        // Spawn the dispatch with a panic-catching wrapper so one bad
        // event never takes down the loop.
        tokio::spawn(async move {
            let bot_email = event.bot_email.clone();
            let service_name = event.service_name.clone();
            let handle = tokio::spawn(async move {
                process_trigger(&deps, event).await;
            });
            if let Err(e) = handle.await {
                error!(
                    bot = %bot_email,
                    service = %service_name,
                    "Trigger dispatch task panicked: {}", e
                );
            }
        });
    }
}

/// Process one trigger event: load its profile, build the adapter, and
/// dispatch.
async fn process_trigger(deps: &WorkerDeps, mut event: TriggerEvent) {
    let mut profile = match deps
        .store
        .get_profile(event.bot_user_id, &event.service_name)
        .await
    {
        Ok(Some(profile)) => profile,
        Ok(None) => {
            error!(
                bot = %event.bot_email,
                service = %event.service_name,
                "No service profile found for trigger event, dropping"
            );
            return;
        }
        Err(e) => {
            error!(
                bot = %event.bot_email,
                service = %event.service_name,
                "Failed to load service profile: {}", e
            );
            return;
        }
    };

    let kind = InterfaceKind::from_profile_str(&profile.interface);

    // Bot-server profiles are usually registered without a URL and rely
    // on the worker-wide bot server address.
    if kind == InterfaceKind::BotServer && profile.base_url.is_empty() {
        if let Some(url) = &deps.bot_server_base_url {
            profile.base_url.clone_from(url);
        }
    }

    // Slack echoes a numeric service id back to the third party;
    // resolve it up front so adapter translation stays I/O-free.
    let service_id = if kind == InterfaceKind::Slack {
        match deps
            .store
            .get_slack_service_id(event.bot_user_id, &event.service_name)
            .await
        {
            Ok(id) => id,
            Err(e) => {
                error!(
                    bot = %event.bot_email,
                    service = %event.service_name,
                    "Failed to resolve slack service id: {}", e
                );
                None
            }
        }
    } else {
        None
    };

    let adapter = deps
        .registry
        .for_profile(&profile, &event.bot_email, service_id);

    let ctx = DispatchContext {
        sender: deps.sender.as_ref(),
        queue: deps.queue.as_ref(),
        http: &deps.http,
        timeout: deps.timeout,
    };

    dispatch(&ctx, adapter.as_ref(), &mut event).await;
}
