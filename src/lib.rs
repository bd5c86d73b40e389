// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Domino - a context-driven pub/sub client.
//!
//! Components register interest in *topic templates* such as
//! `room.[roomId].messages`. The client keeps a key/value context; whenever
//! it changes, every template is re-resolved and the client emits exactly the
//! `unsubscribe`/`subscribe` pairs needed to follow it. Inbound changes are
//! routed to every callback whose resolved topic (with `*` wildcards)
//! matches the channel key, and actions are correlated with their responses.
//!
//! # Quick Start
//!
//! ## In-process transport
//!
//! ```
//! use domino::{Client, Context};
//! use domino::protocol::{ChannelTransport, OutboundMessage};
//!
//! # fn main() -> domino::Result<()> {
//! let (transport, mut outbound) = ChannelTransport::new();
//! let client = Client::new(transport);
//!
//! client.register("user.[userId].notifications.*", |content, key| {
//!     println!("{key} -> {content}");
//! })?;
//!
//! client.set_context(Context::new().with("userId", "u1"));
//! assert_eq!(
//!     outbound.try_recv().ok(),
//!     Some(OutboundMessage::Subscribe("user.u1.notifications.*".to_string()))
//! );
//!
//! client.update_context(Context::new().with("userId", "u2"));
//! assert_eq!(
//!     outbound.try_recv().ok(),
//!     Some(OutboundMessage::Unsubscribe("user.u1.notifications.*".to_string()))
//! );
//! # Ok(())
//! # }
//! ```
//!
//! ## Actions
//!
//! ```no_run
//! use domino::Client;
//! use domino::protocol::ChannelTransport;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> domino::Result<()> {
//!     let (transport, _outbound) = ChannelTransport::new();
//!     let client = Client::new(transport);
//!     let (_inbound, _listener) = client.channel();
//!
//!     // Resolves once a `response` with the same correlation id arrives.
//!     match client.action("markRead", json!({"id": 42}))?.await {
//!         Ok(content) => println!("done: {content}"),
//!         Err(e) => println!("failed: {e}"),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## MQTT transport
//!
//! ```no_run
//! # #[cfg(feature = "mqtt")]
//! # async fn run() -> domino::Result<()> {
//! use domino::{Client, Context};
//! use domino::protocol::MqttTransport;
//!
//! let (transport, inbound) = MqttTransport::builder()
//!     .host("192.168.1.50")
//!     .port(1883)
//!     .build()
//!     .await?;
//!
//! let client = Client::new(transport);
//! client.listen(inbound);
//! client.register("sensors.[room].*", |content, key| println!("{key}: {content}"))?;
//! client.set_context(Context::new().with("room", "kitchen"));
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - `mqtt` (default): [`protocol::MqttTransport`] over `rumqttc`

pub mod action;
mod client;
pub mod context;
pub mod error;
pub mod protocol;
pub mod subscription;
pub mod topic;

pub use action::{CorrelationId, PendingAction};
pub use client::{Client, ClientBuilder, ClientConfig, DEFAULT_LISTENER_BUFFER};
pub use context::Context;
pub use error::{ActionError, ConfigError, Error, Result, TemplateError, TransportError};
pub use topic::MatchMode;
