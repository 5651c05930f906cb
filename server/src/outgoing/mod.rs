//! Outgoing Webhook System
//!
//! Dispatches outbound HTTP calls triggered by chat messages and relays
//! the third-party response back into the chat, with per-protocol
//! adapters and bounded retry-by-requeue.

pub mod bot_server;
pub mod dispatch;
pub mod generic;
pub mod interface;
pub mod queries;
pub mod relay;
pub mod retry;
pub mod slack;
pub mod types;
pub mod worker;

#[cfg(test)]
pub(crate) mod test_fixtures;
