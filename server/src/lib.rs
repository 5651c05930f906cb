//! Hookrelay Worker
//!
//! Outgoing webhook dispatch for a chat platform: consumes message
//! triggers from a queue, calls the configured third-party endpoint,
//! and relays the response back into the chat.

pub mod config;
pub mod db;
pub mod outgoing;
