//! Webhook Protocol Interface & Registry
//!
//! The trait every protocol adapter implements, plus the injectable
//! registry that selects an adapter for a service profile.

use std::collections::HashMap;

use lazy_static::lazy_static;
use regex::Regex;

use super::bot_server::BotServerInterface;
use super::generic::GenericInterface;
use super::slack::SlackInterface;
use super::types::{
    InterfaceKind, OutgoingWebhookError, RequestBody, RestOperation, ServiceProfile, TriggerEvent,
    WebhookResponse,
};

lazy_static! {
    /// Matches `@**Name**` and `@**Name Surname**` mention markup.
    static ref MENTION_RE: Regex =
        Regex::new(r"@\*\*\w+(\s\w+)?\*\*").expect("mention pattern is valid");
}

/// Rewrite chat mention markup into a plain `@Name` form.
///
/// `@**Bob Jones** hi` becomes `@Bob Jones hi`. Third parties rarely
/// understand the `@**_**` annotation, so adapters run trigger text
/// through this before sending it out.
pub fn rewrite_mentions(content: &str) -> String {
    MENTION_RE
        .replace_all(content, |caps: &regex::Captures<'_>| {
            let mention = &caps[0];
            format!("@{}", &mention[3..mention.len() - 2])
        })
        .into_owned()
}

/// Translation strategy between a chat trigger and one third party's
/// HTTP contract.
///
/// `process_event` is pure translation with no I/O; the dispatch engine
/// owns the transport and hands adapters only the captured
/// [`WebhookResponse`].
pub trait OutgoingWebhookInterface: Send + Sync {
    /// Build the rest operation and request body for a trigger event.
    fn process_event(
        &self,
        event: &TriggerEvent,
    ) -> Result<(RestOperation, RequestBody), OutgoingWebhookError>;

    /// Interpret a 2xx response. `None` suppresses any reply.
    fn process_success(
        &self,
        response: &WebhookResponse,
        event: &TriggerEvent,
    ) -> Result<Option<String>, OutgoingWebhookError>;

    /// Interpret a terminal non-2xx, non-5xx response. `None`
    /// suppresses any reply.
    fn process_failure(
        &self,
        response: &WebhookResponse,
        event: &TriggerEvent,
    ) -> Result<Option<String>, OutgoingWebhookError>;

    /// Rewrite mention markup for third-party consumption. Adapters
    /// whose consumers trigger on the raw markup override this to a
    /// no-op.
    fn make_readable(&self, content: &str) -> String {
        rewrite_mentions(content)
    }
}

/// Everything a factory needs to construct an adapter for one dispatch.
#[derive(Debug, Clone)]
pub struct InterfaceContext {
    pub base_url: String,
    pub token: String,
    pub bot_email: String,
    /// Numeric service id, resolved by the worker for protocols that
    /// echo it back to the third party (Slack).
    pub service_id: Option<i64>,
}

type InterfaceFactory =
    Box<dyn Fn(InterfaceContext) -> Box<dyn OutgoingWebhookInterface> + Send + Sync>;

/// Explicit table from interface kind to adapter constructor.
///
/// Built once at startup and injected into the worker; there is no
/// process-wide mutable registry.
pub struct InterfaceRegistry {
    table: HashMap<InterfaceKind, InterfaceFactory>,
}

impl InterfaceRegistry {
    /// Registry with the three built-in protocols.
    pub fn with_builtin() -> Self {
        let mut registry = Self {
            table: HashMap::new(),
        };
        registry.register(InterfaceKind::Generic, |ctx| {
            Box::new(GenericInterface::new(ctx.base_url, ctx.token))
        });
        registry.register(InterfaceKind::Slack, |ctx| {
            Box::new(SlackInterface::new(ctx.base_url, ctx.token, ctx.service_id))
        });
        registry.register(InterfaceKind::BotServer, |ctx| {
            Box::new(BotServerInterface::new(ctx.base_url, &ctx.bot_email))
        });
        registry
    }

    /// Register (or replace) the factory for one interface kind.
    pub fn register<F>(&mut self, kind: InterfaceKind, factory: F)
    where
        F: Fn(InterfaceContext) -> Box<dyn OutgoingWebhookInterface> + Send + Sync + 'static,
    {
        self.table.insert(kind, Box::new(factory));
    }

    /// Select and construct the adapter for a service profile.
    ///
    /// Unknown interface strings resolve to Generic; this never fails,
    /// so a profile written by a newer release still dispatches.
    pub fn for_profile(
        &self,
        profile: &ServiceProfile,
        bot_email: &str,
        service_id: Option<i64>,
    ) -> Box<dyn OutgoingWebhookInterface> {
        let kind = InterfaceKind::from_profile_str(&profile.interface);
        let ctx = InterfaceContext {
            base_url: profile.base_url.clone(),
            token: profile.token.clone(),
            bot_email: bot_email.to_string(),
            service_id,
        };

        match self
            .table
            .get(&kind)
            .or_else(|| self.table.get(&InterfaceKind::Generic))
        {
            Some(factory) => factory(ctx),
            // A custom registry without Generic still falls back safely.
            None => Box::new(GenericInterface::new(ctx.base_url, ctx.token)),
        }
    }
}

impl Default for InterfaceRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    fn profile(interface: &str) -> ServiceProfile {
        ServiceProfile {
            id: 7,
            name: "test".into(),
            base_url: "http://example.com/hook".into(),
            token: "sekrit".into(),
            bot_user_id: Uuid::now_v7(),
            interface: interface.into(),
        }
    }

    #[test]
    fn rewrites_single_word_mentions() {
        assert_eq!(rewrite_mentions("@**bob** hi"), "@bob hi");
    }

    #[test]
    fn rewrites_two_word_mentions() {
        assert_eq!(rewrite_mentions("@**Bob Jones** hi"), "@Bob Jones hi");
    }

    #[test]
    fn rewrites_multiple_mentions() {
        assert_eq!(
            rewrite_mentions("@**alice** ping @**Bob Jones**"),
            "@alice ping @Bob Jones"
        );
    }

    #[test]
    fn leaves_plain_text_alone() {
        assert_eq!(rewrite_mentions("no mentions here"), "no mentions here");
        assert_eq!(rewrite_mentions("half @**open"), "half @**open");
    }

    #[test]
    fn selects_by_exact_interface_match() {
        let registry = InterfaceRegistry::with_builtin();
        let adapter = registry.for_profile(&profile("slack"), "bot@example.com", Some(7));
        // Slack is the only builtin that rejects private triggers; a
        // cheap way to observe which adapter came back.
        let event = crate::outgoing::test_fixtures::private_event("bot@example.com", true);
        assert!(adapter.process_event(&event).is_err());
    }

    #[test]
    fn unknown_interface_resolves_to_generic() {
        let registry = InterfaceRegistry::with_builtin();
        let adapter = registry.for_profile(&profile("nonexistent"), "bot@example.com", None);
        let event = crate::outgoing::test_fixtures::stream_event("ping");
        let (operation, _body) = adapter.process_event(&event).unwrap();
        assert_eq!(operation.method, "POST");
        assert_eq!(operation.base_url, "http://example.com/hook");
    }
}
