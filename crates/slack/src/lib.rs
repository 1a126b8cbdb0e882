//! Slack integration for NewsBot
//!
//! - **Events** (`events`) - typed Events API payloads and the handler dispatcher
//! - **Slash Commands** (`commands`) - `/popular_news` normalization and routing
//! - **Web API** (`api`) - `chat.postMessage`, `reactions.get` and the OAuth exchange
//! - **Block Kit** (`blocks`) - message builders and the weekly roundup card
//! - **Signatures** (`signature`) - `X-Slack-Signature` verification
//!
//! # Architecture
//!
//! ```text
//! HTTP ingress → SignatureVerifier → EventDispatcher → Handlers → newsroom services
//!                                                                   ↓
//!                                              SlackWebApi ← SlackConnector(tenant token)
//! ```

pub mod api;
pub mod blocks;
pub mod commands;
pub mod events;
pub mod signature;
