// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Client configuration.

use serde::{Deserialize, Serialize};

use crate::context::Context;
use crate::error::ConfigError;
use crate::topic::MatchMode;

/// Default capacity of the inbound channel created by
/// [`Client::channel`](crate::Client::channel).
pub const DEFAULT_LISTENER_BUFFER: usize = 64;

/// Configuration for a [`Client`](crate::Client).
///
/// Every field has a default, so partial documents deserialize.
///
/// # Examples
///
/// ```
/// use domino::ClientConfig;
/// use domino::topic::MatchMode;
///
/// let config = ClientConfig::from_json(
///     r#"{"match_mode": "anchored", "initial_context": {"userId": "u1"}}"#,
/// )?;
/// assert_eq!(config.match_mode, MatchMode::Anchored);
/// assert_eq!(config.listener_buffer, 64);
/// # Ok::<(), domino::error::ConfigError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// How compiled topics are matched against inbound keys.
    pub match_mode: MatchMode,
    /// Context in place before the first `set_context`.
    pub initial_context: Context,
    /// Capacity of the inbound channel created by `Client::channel`.
    pub listener_buffer: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            match_mode: MatchMode::default(),
            initial_context: Context::default(),
            listener_buffer: DEFAULT_LISTENER_BUFFER,
        }
    }
}

impl ClientConfig {
    /// Parses and validates a JSON configuration document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Malformed`] if the document does not parse, or
    /// the error from [`validate`](Self::validate).
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Malformed(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Sets the match mode.
    #[must_use]
    pub fn with_match_mode(mut self, mode: MatchMode) -> Self {
        self.match_mode = mode;
        self
    }

    /// Sets the initial context.
    #[must_use]
    pub fn with_initial_context(mut self, context: Context) -> Self {
        self.initial_context = context;
        self
    }

    /// Sets the inbound channel capacity.
    #[must_use]
    pub fn with_listener_buffer(mut self, capacity: usize) -> Self {
        self.listener_buffer = capacity;
        self
    }

    /// Checks that every value is usable.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] when `listener_buffer` is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.listener_buffer == 0 {
            return Err(ConfigError::InvalidValue {
                field: "listener_buffer".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.match_mode, MatchMode::Partial);
        assert!(config.initial_context.is_empty());
        assert_eq!(config.listener_buffer, DEFAULT_LISTENER_BUFFER);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_document_uses_defaults() {
        assert_eq!(ClientConfig::from_json("{}").unwrap(), ClientConfig::default());
    }

    #[test]
    fn zero_buffer_is_rejected() {
        let err = ClientConfig::from_json(r#"{"listener_buffer": 0}"#).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { field, .. } if field == "listener_buffer"));
    }

    #[test]
    fn malformed_document_is_rejected() {
        let err = ClientConfig::from_json(r#"{"match_mode": "fuzzy"}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Malformed(_)));
    }

    #[test]
    fn with_methods_chain() {
        let config = ClientConfig::default()
            .with_match_mode(MatchMode::Anchored)
            .with_initial_context(Context::new().with("id", "1"))
            .with_listener_buffer(8);

        assert_eq!(config.match_mode, MatchMode::Anchored);
        assert_eq!(config.initial_context.segment("id").as_deref(), Some("1"));
        assert_eq!(config.listener_buffer, 8);
    }
}
