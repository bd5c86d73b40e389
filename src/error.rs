// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the `domino` library.
//!
//! This module provides the error hierarchy used across the library:
//! client configuration, transport emission, inbound frame decoding,
//! topic pattern compilation, and action settlement.

use serde_json::Value;
use thiserror::Error;

/// The main error type for this library.
#[derive(Debug, Error)]
pub enum Error {
    /// The client was configured incorrectly.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The transport refused or failed to carry a message.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// An inbound frame could not be decoded.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// A topic could not be compiled into a matcher.
    #[error("template error: {0}")]
    Template(#[from] TemplateError),

    /// An action was rejected or abandoned.
    #[error("action error: {0}")]
    Action(#[from] ActionError),
}

/// Errors raised while building a client or one of its adapters.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// No transport was supplied to the builder.
    #[error("a transport is required; refusing to build a client without a socket")]
    MissingTransport,

    /// A configuration value is out of its accepted domain.
    #[error("invalid value for {field}: {message}")]
    InvalidValue {
        /// The offending configuration field.
        field: String,
        /// Why the value was refused.
        message: String,
    },

    /// A configuration document could not be parsed.
    #[error("malformed configuration: {0}")]
    Malformed(String),
}

/// Errors related to the underlying transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// MQTT client request failed.
    #[cfg(feature = "mqtt")]
    #[error("MQTT error: {0}")]
    Mqtt(#[from] rumqttc::ClientError),

    /// Connection to the remote end failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Invalid URL or address.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// The channel towards the socket task was closed.
    #[error("channel closed: {0}")]
    ChannelClosed(String),

    /// An outbound payload could not be serialized.
    #[error("failed to encode {event} payload: {source}")]
    Encode {
        /// The outbound event name.
        event: &'static str,
        /// The serializer error.
        source: serde_json::Error,
    },
}

/// Errors related to decoding inbound frames.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// The frame carried an event name this client does not handle.
    #[error("unknown inbound event: {0}")]
    UnknownEvent(String),
}

/// Errors related to compiling topic patterns.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// The generated pattern was refused by the regex engine.
    #[error("invalid pattern for topic {topic}: {source}")]
    InvalidPattern {
        /// The topic the pattern was generated from.
        topic: String,
        /// The regex engine error.
        source: regex::Error,
    },
}

/// Ways a pending action can fail to produce content.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ActionError {
    /// The remote end answered with a status other than `ok`.
    #[error("action rejected with status {status}")]
    Rejected {
        /// The status string sent by the remote end.
        status: String,
        /// The content attached to the rejection.
        content: Value,
    },

    /// The correlator dropped the handle before any response arrived.
    #[error("action abandoned before a response arrived")]
    Abandoned,
}

impl ActionError {
    /// Returns the rejection content, if any.
    #[must_use]
    pub fn content(&self) -> Option<&Value> {
        match self {
            Self::Rejected { content, .. } => Some(content),
            Self::Abandoned => None,
        }
    }
}

/// A specialized Result type for this library.
pub type Result<T> = std::result::Result<T, Error>;
