// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Client builder.

use std::sync::Arc;

use crate::action::{IdGenerator, UuidGenerator};
use crate::context::Context;
use crate::error::{ConfigError, Result};
use crate::protocol::Transport;
use crate::topic::MatchMode;

use super::{Client, ClientConfig};

/// Builder for a [`Client`].
///
/// A transport is mandatory: [`build`](Self::build) refuses to proceed
/// without one.
///
/// # Examples
///
/// ```
/// use domino::{Client, Context, protocol::ChannelTransport, topic::MatchMode};
///
/// let (transport, _outbound) = ChannelTransport::new();
/// let client = Client::builder()
///     .transport(transport)
///     .match_mode(MatchMode::Anchored)
///     .initial_context(Context::new().with("userId", "u1"))
///     .build()?;
///
/// assert_eq!(client.context().segment("userId").as_deref(), Some("u1"));
/// # Ok::<(), domino::Error>(())
/// ```
#[derive(Default)]
pub struct ClientBuilder {
    transport: Option<Arc<dyn Transport>>,
    config: ClientConfig,
    ids: Option<Arc<dyn IdGenerator>>,
}

impl ClientBuilder {
    /// Creates a builder with the default configuration and no transport.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the transport.
    #[must_use]
    pub fn transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Sets a transport already shared elsewhere.
    #[must_use]
    pub fn shared_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Replaces the whole configuration.
    #[must_use]
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the match mode.
    #[must_use]
    pub fn match_mode(mut self, mode: MatchMode) -> Self {
        self.config.match_mode = mode;
        self
    }

    /// Sets the initial context.
    #[must_use]
    pub fn initial_context(mut self, context: Context) -> Self {
        self.config.initial_context = context;
        self
    }

    /// Sets the inbound channel capacity used by `Client::channel`.
    #[must_use]
    pub fn listener_buffer(mut self, capacity: usize) -> Self {
        self.config.listener_buffer = capacity;
        self
    }

    /// Sets the correlation id generator (default: UUID v4).
    #[must_use]
    pub fn id_generator(mut self, ids: impl IdGenerator + 'static) -> Self {
        self.ids = Some(Arc::new(ids));
        self
    }

    /// Builds the client.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingTransport`] if no transport was set, or
    /// [`ConfigError::InvalidValue`] if the configuration does not validate.
    pub fn build(self) -> Result<Client> {
        let transport = self.transport.ok_or(ConfigError::MissingTransport)?;
        self.config.validate()?;
        let ids = self.ids.unwrap_or_else(|| Arc::new(UuidGenerator));
        Ok(Client::from_parts(transport, self.config, ids))
    }
}

impl std::fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("has_transport", &self.transport.is_some())
            .field("config", &self.config)
            .field("ids", &self.ids)
            .finish()
    }
}
