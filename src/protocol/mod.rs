// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Transport contract and wire messages.
//!
//! The client talks to its socket through the [`Transport`] trait, which only
//! needs to *emit* three outbound events:
//!
//! | Event         | Payload                           |
//! |---------------|-----------------------------------|
//! | `subscribe`   | concrete topic string             |
//! | `unsubscribe` | concrete topic string             |
//! | `action`      | `{"type", "payload", "corr"}`     |
//!
//! Inbound traffic arrives as [`InboundEvent`]s (`change` and `response`),
//! handed to [`Client::handle_event`](crate::Client::handle_event) or fed
//! through a channel to [`Client::listen`](crate::Client::listen).
//!
//! # Adapters
//!
//! - [`ChannelTransport`]: forwards outbound messages into a tokio channel
//! - [`MqttTransport`]: maps topics onto an MQTT broker (feature `mqtt`)

mod channel;
#[cfg(feature = "mqtt")]
mod mqtt;

pub use channel::ChannelTransport;
#[cfg(feature = "mqtt")]
pub use mqtt::{MqttTransport, MqttTransportBuilder, MqttTransportConfig};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::action::CorrelationId;
use crate::error::{ProtocolError, TransportError};

/// Outbound event name for subscriptions.
pub const EVENT_SUBSCRIBE: &str = "subscribe";
/// Outbound event name for unsubscriptions.
pub const EVENT_UNSUBSCRIBE: &str = "unsubscribe";
/// Outbound event name for actions.
pub const EVENT_ACTION: &str = "action";
/// Inbound event name for pushed changes.
pub const EVENT_CHANGE: &str = "change";
/// Inbound event name for action responses.
pub const EVENT_RESPONSE: &str = "response";

/// Socket capability consumed by the client.
///
/// `emit` must not block; implementations typically enqueue the message
/// for a background task owning the connection.
pub trait Transport: Send + Sync {
    /// Emits one outbound message.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when the message cannot be handed to the
    /// connection.
    fn emit(&self, message: &OutboundMessage) -> Result<(), TransportError>;
}

/// Payload of an `action` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRequest {
    /// The action name.
    #[serde(rename = "type")]
    pub action_type: String,
    /// Arbitrary action payload.
    pub payload: Value,
    /// Correlation id echoed back in the response.
    pub corr: CorrelationId,
}

/// A message emitted by the client.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundMessage {
    /// Subscribe to a concrete topic.
    Subscribe(String),
    /// Unsubscribe from a concrete topic.
    Unsubscribe(String),
    /// Send a correlated action.
    Action(ActionRequest),
}

impl OutboundMessage {
    /// Returns the event name this message is emitted under.
    #[must_use]
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::Subscribe(_) => EVENT_SUBSCRIBE,
            Self::Unsubscribe(_) => EVENT_UNSUBSCRIBE,
            Self::Action(_) => EVENT_ACTION,
        }
    }

    /// Returns the JSON payload carried by the event.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Encode`] if the action payload cannot be
    /// serialized.
    pub fn payload(&self) -> Result<Value, TransportError> {
        match self {
            Self::Subscribe(topic) | Self::Unsubscribe(topic) => Ok(Value::String(topic.clone())),
            Self::Action(request) => {
                serde_json::to_value(request).map_err(|source| TransportError::Encode {
                    event: EVENT_ACTION,
                    source,
                })
            }
        }
    }
}

/// A change pushed by the server for a concrete channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeMessage {
    /// The concrete channel key.
    pub key: String,
    /// Arbitrary content.
    #[serde(default)]
    pub content: Value,
}

/// A reply to a previously emitted action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMessage {
    /// The correlation id of the originating action.
    pub correlation_id: CorrelationId,
    /// `ok` on success; anything else is a rejection.
    pub status: String,
    /// Response content, or the rejection reason.
    #[serde(default)]
    pub content: Value,
}

/// An event received from the transport.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    /// A `change` event.
    Change(ChangeMessage),
    /// A `response` event.
    Response(ResponseMessage),
}

impl InboundEvent {
    /// Decodes a framed inbound event from its name and JSON payload.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::UnknownEvent`] for names other than `change`
    /// and `response`, or [`ProtocolError::Json`] for malformed payloads.
    ///
    /// # Examples
    ///
    /// ```
    /// use domino::protocol::InboundEvent;
    ///
    /// let event = InboundEvent::decode("change", r#"{"key":"a.b","content":1}"#)?;
    /// assert!(matches!(event, InboundEvent::Change(_)));
    /// # Ok::<(), domino::error::ProtocolError>(())
    /// ```
    pub fn decode(event_name: &str, payload: &str) -> Result<Self, ProtocolError> {
        match event_name {
            EVENT_CHANGE => Ok(Self::Change(serde_json::from_str(payload)?)),
            EVENT_RESPONSE => Ok(Self::Response(serde_json::from_str(payload)?)),
            other => Err(ProtocolError::UnknownEvent(other.to_string())),
        }
    }

    /// Returns the event name.
    #[must_use]
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::Change(_) => EVENT_CHANGE,
            Self::Response(_) => EVENT_RESPONSE,
        }
    }
}

impl From<ChangeMessage> for InboundEvent {
    fn from(message: ChangeMessage) -> Self {
        Self::Change(message)
    }
}

impl From<ResponseMessage> for InboundEvent {
    fn from(message: ResponseMessage) -> Self {
        Self::Response(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn action_payload_uses_wire_names() {
        let message = OutboundMessage::Action(ActionRequest {
            action_type: "ping".to_string(),
            payload: json!({"n": 1}),
            corr: CorrelationId::new("c-1"),
        });

        assert_eq!(message.event_name(), "action");
        assert_eq!(
            message.payload().unwrap(),
            json!({"type": "ping", "payload": {"n": 1}, "corr": "c-1"})
        );
    }

    #[test]
    fn subscription_payload_is_topic_string() {
        let message = OutboundMessage::Unsubscribe("room.5.msg".to_string());
        assert_eq!(message.event_name(), "unsubscribe");
        assert_eq!(message.payload().unwrap(), json!("room.5.msg"));
    }

    #[test]
    fn decode_response_uses_camel_case() {
        let event = InboundEvent::decode(
            "response",
            r#"{"correlationId":"c-9","status":"ok","content":[1,2]}"#,
        )
        .unwrap();

        let InboundEvent::Response(response) = event else {
            panic!("expected a response");
        };
        assert_eq!(response.correlation_id.as_str(), "c-9");
        assert_eq!(response.status, "ok");
        assert_eq!(response.content, json!([1, 2]));
    }

    #[test]
    fn decode_change_without_content() {
        let event = InboundEvent::decode("change", r#"{"key":"a.b"}"#).unwrap();
        assert_eq!(
            event,
            InboundEvent::Change(ChangeMessage {
                key: "a.b".to_string(),
                content: Value::Null,
            })
        );
        assert_eq!(event.event_name(), "change");
    }

    #[test]
    fn decode_rejects_unknown_event() {
        let err = InboundEvent::decode("hello", "{}").unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownEvent(name) if name == "hello"));
    }

    #[test]
    fn decode_rejects_malformed_payload() {
        let err = InboundEvent::decode("change", r#"{"content":1}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::Json(_)));
    }
}
