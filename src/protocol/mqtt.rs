// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! MQTT transport adapter.
//!
//! Maps the client's dotted channel keys onto MQTT topics:
//!
//! ```text
//! subscribe "user.42.*"   →  SUBSCRIBE user/42/+
//! action {type,..,corr}   →  PUBLISH <action_topic> (JSON)
//! PUBLISH user/42/inbox   →  change {key: "user.42.inbox", content}
//! PUBLISH <response_topic>→  response {correlationId, status, content}
//! ```
//!
//! A segment containing `*` becomes the single-level wildcard `+`; the
//! client's own matcher then filters the broader MQTT delivery. Connection
//! handling, keep-alive and framing are left to `rumqttc`.
//!
//! # Architecture
//!
//! ```text
//!  Transport::emit ──► unbounded queue ──► writer task ──► AsyncClient (awaits capacity)
//!                                                              │
//!  Client::listen  ◄── inbound channel ◄── EventPump ◄── EventLoop::poll
//! ```
//!
//! `emit` never waits and never drops: requests are queued in order and the
//! writer task awaits room in the `rumqttc` request channel. Once the event
//! loop is gone, the writer stops and later emits fail with
//! [`TransportError::ChannelClosed`].
//!
//! # Examples
//!
//! ```no_run
//! use domino::{Client, protocol::MqttTransport};
//!
//! # async fn example() -> domino::Result<()> {
//! let (transport, inbound) = MqttTransport::builder()
//!     .host("192.168.1.50")
//!     .credentials("user", "password")
//!     .build()
//!     .await?;
//!
//! let client = Client::new(transport);
//! let _listener = client.listen(inbound);
//! # Ok(())
//! # }
//! ```

use std::ops::ControlFlow;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use rumqttc::{AsyncClient, ConnectionError, Event, EventLoop, MqttOptions, Packet, QoS};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

use crate::error::TransportError;
use crate::protocol::{ChangeMessage, InboundEvent, OutboundMessage, ResponseMessage, Transport};

/// Source of unique client ids within this process.
static CLIENT_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Capacity of the inbound event channel.
const INBOUND_CAPACITY: usize = 64;

/// Capacity of the `rumqttc` request channel drained by the event loop.
const REQUEST_CAPACITY: usize = 32;

/// Configuration for an MQTT transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttTransportConfig {
    /// Broker host.
    pub host: String,
    /// Broker port.
    pub port: u16,
    /// Optional `(username, password)` pair.
    pub credentials: Option<(String, String)>,
    /// Keep-alive interval.
    pub keep_alive: Duration,
    /// Maximum time to wait for the broker's CONNACK.
    pub connection_timeout: Duration,
    /// Topic actions are published on.
    pub action_topic: String,
    /// Topic responses are received on.
    pub response_topic: String,
}

impl Default for MqttTransportConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 1883,
            credentials: None,
            keep_alive: Duration::from_secs(30),
            connection_timeout: Duration::from_secs(10),
            action_topic: "domino/action".to_string(),
            response_topic: "domino/response".to_string(),
        }
    }
}

impl MqttTransportConfig {
    fn mqtt_options(&self) -> MqttOptions {
        let client_id = format!(
            "domino_{}_{}",
            std::process::id(),
            CLIENT_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
        );

        let mut options = MqttOptions::new(client_id, &self.host, self.port);
        options.set_keep_alive(self.keep_alive);
        options.set_clean_session(true);
        if let Some((username, password)) = &self.credentials {
            options.set_credentials(username, password);
        }
        options
    }
}

/// [`Transport`] over an MQTT broker connection.
///
/// Cheaply cloneable; clones share the connection. The connection's
/// background tasks stop once every clone is dropped.
#[derive(Clone)]
pub struct MqttTransport {
    inner: Arc<MqttTransportInner>,
}

struct MqttTransportInner {
    client: AsyncClient,
    config: MqttTransportConfig,
    connected: Arc<AtomicBool>,
    requests: mpsc::UnboundedSender<Request>,
}

/// A broker request prepared by `emit`.
enum Request {
    Subscribe(String),
    Unsubscribe(String),
    Publish { topic: String, payload: Vec<u8> },
}

impl MqttTransport {
    /// Creates a new builder for configuring the transport.
    #[must_use]
    pub fn builder() -> MqttTransportBuilder {
        MqttTransportBuilder::default()
    }

    /// Wraps `client` and spawns the writer task feeding it.
    fn start(client: AsyncClient, config: MqttTransportConfig, connected: Arc<AtomicBool>) -> Self {
        let (requests, queue) = mpsc::unbounded_channel();
        tokio::spawn(write_requests(client.clone(), queue));

        Self {
            inner: Arc::new(MqttTransportInner {
                client,
                config,
                connected,
                requests,
            }),
        }
    }

    /// Returns whether the broker connection is currently up.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::Acquire)
    }

    /// Returns the configuration used for this connection.
    #[must_use]
    pub fn config(&self) -> &MqttTransportConfig {
        &self.inner.config
    }

    /// Sends a DISCONNECT to the broker.
    ///
    /// # Errors
    ///
    /// Returns error if the event loop has already stopped.
    pub async fn disconnect(&self) -> Result<(), TransportError> {
        tracing::info!(host = %self.inner.config.host, "Disconnecting from MQTT broker");
        self.inner.client.disconnect().await?;
        self.inner.connected.store(false, Ordering::Release);
        Ok(())
    }
}

impl Transport for MqttTransport {
    fn emit(&self, message: &OutboundMessage) -> Result<(), TransportError> {
        let request = match message {
            OutboundMessage::Subscribe(topic) => Request::Subscribe(channel_to_mqtt(topic)),
            OutboundMessage::Unsubscribe(topic) => Request::Unsubscribe(channel_to_mqtt(topic)),
            OutboundMessage::Action(action) => Request::Publish {
                topic: self.inner.config.action_topic.clone(),
                payload: serde_json::to_vec(action).map_err(|source| TransportError::Encode {
                    event: message.event_name(),
                    source,
                })?,
            },
        };

        tracing::trace!(event = message.event_name(), "Queueing MQTT request");
        self.inner.requests.send(request).map_err(|_| {
            TransportError::ChannelClosed(format!(
                "MQTT connection closed, {} not sent",
                message.event_name()
            ))
        })
    }
}

impl std::fmt::Debug for MqttTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MqttTransport")
            .field("host", &self.inner.config.host)
            .field("port", &self.inner.config.port)
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

/// Sends queued requests in order, waiting for room in the client's channel.
async fn write_requests(client: AsyncClient, mut queue: mpsc::UnboundedReceiver<Request>) {
    while let Some(request) = queue.recv().await {
        let sent = match request {
            Request::Subscribe(filter) => {
                tracing::debug!(filter = %filter, "MQTT subscribe");
                client.subscribe(filter, QoS::AtLeastOnce).await
            }
            Request::Unsubscribe(filter) => {
                tracing::debug!(filter = %filter, "MQTT unsubscribe");
                client.unsubscribe(filter).await
            }
            Request::Publish { topic, payload } => {
                tracing::debug!(topic = %topic, "MQTT publish");
                client.publish(topic, QoS::AtLeastOnce, false, payload).await
            }
        };

        if let Err(e) = sent {
            tracing::error!(error = %e, "MQTT event loop stopped, closing request queue");
            break;
        }
    }
}

/// Builder for an [`MqttTransport`].
#[derive(Debug, Default)]
pub struct MqttTransportBuilder {
    config: MqttTransportConfig,
}

impl MqttTransportBuilder {
    /// Starts from an existing configuration.
    #[must_use]
    pub fn from_config(config: MqttTransportConfig) -> Self {
        Self { config }
    }

    /// Sets host and port from a `mqtt://host:port` style URL.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::InvalidAddress`] for an unsupported scheme,
    /// an empty host or a port that is not a number.
    pub fn url(mut self, url: &str) -> Result<Self, TransportError> {
        let (host, port) = parse_mqtt_url(url)?;
        self.config.host = host;
        self.config.port = port;
        Ok(self)
    }

    /// Sets the broker host.
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    /// Sets the broker port (default: 1883).
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Sets username and password.
    #[must_use]
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.config.credentials = Some((username.into(), password.into()));
        self
    }

    /// Sets the keep-alive interval (default: 30 seconds).
    #[must_use]
    pub fn keep_alive(mut self, interval: Duration) -> Self {
        self.config.keep_alive = interval;
        self
    }

    /// Sets how long `build` waits for the broker (default: 10 seconds).
    #[must_use]
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.config.connection_timeout = timeout;
        self
    }

    /// Sets the topic actions are published on.
    #[must_use]
    pub fn action_topic(mut self, topic: impl Into<String>) -> Self {
        self.config.action_topic = topic.into();
        self
    }

    /// Sets the topic responses are received on.
    #[must_use]
    pub fn response_topic(mut self, topic: impl Into<String>) -> Self {
        self.config.response_topic = topic.into();
        self
    }

    /// Connects to the broker and subscribes to the response topic.
    ///
    /// Returns the transport and the receiver of inbound events, to be
    /// passed to [`Client::listen`](crate::Client::listen).
    ///
    /// # Errors
    ///
    /// - [`TransportError::InvalidAddress`] if no host is set
    /// - [`TransportError::ConnectionFailed`] if the broker refuses or does
    ///   not answer within the connection timeout
    pub async fn build(
        self,
    ) -> Result<(MqttTransport, mpsc::Receiver<InboundEvent>), TransportError> {
        let config = self.config;
        if config.host.is_empty() {
            return Err(TransportError::InvalidAddress(
                "MQTT broker host is required".to_string(),
            ));
        }

        let (client, event_loop) = AsyncClient::new(config.mqtt_options(), REQUEST_CAPACITY);
        let connected = Arc::new(AtomicBool::new(false));
        let (inbound, inbound_rx) = mpsc::channel(INBOUND_CAPACITY);
        let (connack_tx, connack_rx) = oneshot::channel();

        let pump = EventPump {
            connected: Arc::clone(&connected),
            response_topic: config.response_topic.clone(),
            inbound,
            connack: Some(connack_tx),
        };
        tokio::spawn(pump.run(event_loop));

        match tokio::time::timeout(config.connection_timeout, connack_rx).await {
            Ok(Ok(())) => {}
            Ok(Err(_)) => {
                return Err(TransportError::ConnectionFailed(format!(
                    "{}:{} closed the connection before CONNACK",
                    config.host, config.port
                )));
            }
            Err(_) => {
                return Err(TransportError::ConnectionFailed(format!(
                    "no CONNACK from {}:{} within {:?}",
                    config.host, config.port, config.connection_timeout
                )));
            }
        }
        tracing::info!(host = %config.host, port = config.port, "Connected to MQTT broker");

        client
            .subscribe(config.response_topic.as_str(), QoS::AtLeastOnce)
            .await?;

        Ok((MqttTransport::start(client, config, connected), inbound_rx))
    }
}

/// Drives the `rumqttc` event loop and forwards publishes as inbound events.
struct EventPump {
    connected: Arc<AtomicBool>,
    response_topic: String,
    inbound: mpsc::Sender<InboundEvent>,
    connack: Option<oneshot::Sender<()>>,
}

impl EventPump {
    async fn run(mut self, mut event_loop: EventLoop) {
        loop {
            let flow = match event_loop.poll().await {
                Ok(Event::Incoming(packet)) => self.on_packet(packet).await,
                Ok(Event::Outgoing(_)) => ControlFlow::Continue(()),
                Err(ConnectionError::RequestsDone) => {
                    tracing::debug!("MQTT transport dropped, stopping event loop");
                    ControlFlow::Break(())
                }
                Err(e) => {
                    tracing::error!(error = %e, "MQTT connection lost");
                    ControlFlow::Break(())
                }
            };

            if flow.is_break() {
                break;
            }
        }
        self.connected.store(false, Ordering::Release);
    }

    async fn on_packet(&mut self, packet: Packet) -> ControlFlow<()> {
        match packet {
            Packet::ConnAck(ack) => {
                tracing::debug!(code = ?ack.code, "MQTT connection acknowledged");
                self.connected.store(true, Ordering::Release);
                if let Some(tx) = self.connack.take() {
                    let _ = tx.send(());
                }
            }
            Packet::SubAck(ack) => {
                tracing::trace!(pkid = ack.pkid, "MQTT subscription acknowledged");
            }
            Packet::Publish(publish) => {
                if let Some(event) =
                    classify_publish(&publish.topic, &publish.payload, &self.response_topic)
                    && self.inbound.send(event).await.is_err()
                {
                    tracing::debug!("Inbound receiver dropped, stopping event loop");
                    return ControlFlow::Break(());
                }
            }
            Packet::Disconnect => {
                tracing::info!("MQTT broker closed the session");
                return ControlFlow::Break(());
            }
            _ => {}
        }
        ControlFlow::Continue(())
    }
}

/// Turns an MQTT publish into an inbound event.
///
/// Publishes on the response topic must decode as a response; anything else
/// is a change whose content is the JSON payload, or the raw text when the
/// payload is not JSON.
fn classify_publish(topic: &str, payload: &[u8], response_topic: &str) -> Option<InboundEvent> {
    if topic == response_topic {
        return match serde_json::from_slice::<ResponseMessage>(payload) {
            Ok(response) => Some(InboundEvent::Response(response)),
            Err(e) => {
                tracing::warn!(topic = %topic, error = %e, "Dropping malformed response");
                None
            }
        };
    }

    let content = serde_json::from_slice::<Value>(payload)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(payload).into_owned()));

    tracing::debug!(topic = %topic, "MQTT change received");
    Some(InboundEvent::Change(ChangeMessage {
        key: mqtt_to_channel(topic),
        content,
    }))
}

/// Converts a dotted channel topic into an MQTT topic filter.
fn channel_to_mqtt(topic: &str) -> String {
    topic
        .split('.')
        .map(|segment| if segment.contains('*') { "+" } else { segment })
        .collect::<Vec<_>>()
        .join("/")
}

/// Converts an MQTT topic name back into a dotted channel key.
fn mqtt_to_channel(topic: &str) -> String {
    topic.replace('/', ".")
}

/// Splits `[mqtt|tcp://]host[:port]` into host and port.
fn parse_mqtt_url(url: &str) -> Result<(String, u16), TransportError> {
    let authority = match url.split_once("://") {
        Some(("mqtt" | "tcp", rest)) => rest,
        Some((scheme, _)) => {
            return Err(TransportError::InvalidAddress(format!(
                "unsupported scheme: {scheme}"
            )));
        }
        None => url,
    };
    let authority = authority.trim_end_matches('/');

    let (host, port) = match authority.rsplit_once(':') {
        Some((host, port)) => {
            let port = port.parse::<u16>().map_err(|_| {
                TransportError::InvalidAddress(format!("invalid port in {url}"))
            })?;
            (host, port)
        }
        None => (authority, 1883),
    };

    if host.is_empty() {
        return Err(TransportError::InvalidAddress(format!("missing host in {url}")));
    }
    Ok((host.to_string(), port))
}
