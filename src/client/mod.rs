// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The client façade.
//!
//! [`Client`] owns the context, the subscription registry and the action
//! correlator, and wires them to a [`Transport`]:
//!
//! ```text
//!  set_context / update_context ──► registry.refresh ──► outbox ──► transport.emit
//!  register                     ──► registry.register ─┘
//!  action                       ──► correlator.begin ──────────────► transport.emit
//!
//!  inbound change   ──► registry.matching(key) ──► callbacks(content, key)
//!  inbound response ──► correlator.settle       ──► PendingAction resolves
//! ```
//!
//! # Re-entrancy
//!
//! Callbacks never run while the client's state lock is held, and
//! subscription emissions are flushed by one caller at a time. A callback
//! (or a transport) that changes the context while another change is being
//! emitted only queues its emissions; they are sent right after the ones
//! already queued, in order.

mod builder;
mod config;

pub use builder::ClientBuilder;
pub use config::{ClientConfig, DEFAULT_LISTENER_BUFFER};

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::action::{ActionCorrelator, IdGenerator, PendingAction, UuidGenerator};
use crate::context::Context;
use crate::error::Result;
use crate::protocol::{
    ActionRequest, ChangeMessage, InboundEvent, OutboundMessage, ResponseMessage, Transport,
};
use crate::subscription::{SubscriptionChange, SubscriptionRegistry};

/// Pub/sub client over a socket transport.
///
/// Cheaply cloneable; clones share the same state.
///
/// # Examples
///
/// ```
/// use domino::{Client, Context, protocol::{ChannelTransport, OutboundMessage}};
///
/// # fn main() -> domino::Result<()> {
/// let (transport, mut outbound) = ChannelTransport::new();
/// let client = Client::new(transport);
///
/// client.register("room.[roomId].messages", |content, key| {
///     println!("{key}: {content}");
/// })?;
///
/// // Nothing is subscribed until the context resolves the template.
/// assert!(outbound.try_recv().is_err());
///
/// client.set_context(Context::new().with("roomId", "5"));
/// assert_eq!(
///     outbound.try_recv().ok(),
///     Some(OutboundMessage::Subscribe("room.5.messages".to_string()))
/// );
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    transport: Arc<dyn Transport>,
    config: ClientConfig,
    state: Mutex<EngineState>,
    outbox: Mutex<VecDeque<OutboundMessage>>,
    flushing: AtomicBool,
}

struct EngineState {
    context: Context,
    registry: SubscriptionRegistry,
    actions: ActionCorrelator,
}

impl Client {
    /// Creates a client with the default configuration.
    #[must_use]
    pub fn new(transport: impl Transport + 'static) -> Self {
        Self::from_parts(
            Arc::new(transport),
            ClientConfig::default(),
            Arc::new(UuidGenerator),
        )
    }

    /// Creates a builder for a configured client.
    #[must_use]
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    pub(crate) fn from_parts(
        transport: Arc<dyn Transport>,
        config: ClientConfig,
        ids: Arc<dyn IdGenerator>,
    ) -> Self {
        let state = EngineState {
            context: config.initial_context.clone(),
            registry: SubscriptionRegistry::new(config.match_mode),
            actions: ActionCorrelator::new(ids),
        };

        Self {
            inner: Arc::new(ClientInner {
                transport,
                config,
                state: Mutex::new(state),
                outbox: Mutex::new(VecDeque::new()),
                flushing: AtomicBool::new(false),
            }),
        }
    }

    /// Returns the configuration in use.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    // =========================================================================
    // Context
    // =========================================================================

    /// Replaces the whole context and refreshes every endpoint.
    ///
    /// The resulting `subscribe`/`unsubscribe` messages are emitted before
    /// this returns, unless another thread (or an enclosing callback) is
    /// already emitting. In that case they are queued and that caller sends
    /// them, in order, after its own.
    pub fn set_context(&self, context: Context) {
        tracing::debug!(variables = context.len(), "Replacing context");
        self.change_context(|_| context);
    }

    /// Merges `partial` into the context and refreshes every endpoint.
    ///
    /// Keys in `partial` overwrite existing ones; other keys are preserved.
    /// Emission follows the same rules as [`set_context`](Self::set_context).
    pub fn update_context(&self, partial: Context) {
        tracing::debug!(variables = partial.len(), "Updating context");
        self.change_context(|current| current.merged(&partial));
    }

    /// Returns a snapshot of the current context.
    #[must_use]
    pub fn context(&self) -> Context {
        self.inner.state.lock().context.clone()
    }

    fn change_context(&self, next: impl FnOnce(&Context) -> Context) {
        {
            let mut guard = self.inner.state.lock();
            let state = &mut *guard;
            let new = next(&state.context);
            let old = std::mem::replace(&mut state.context, new);
            let changes = state.registry.refresh(&old, &state.context);
            self.inner.enqueue(changes);
        }
        self.inner.flush();
    }

    // =========================================================================
    // Subscriptions
    // =========================================================================

    /// Registers `callback` for every change whose key matches `template`.
    ///
    /// The template is resolved against the current context; if it resolves,
    /// the concrete topic is subscribed immediately. Otherwise the endpoint
    /// stays inactive until a context change resolves it. Registering the
    /// same template again replaces its callback.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Template`](crate::Error::Template) if the resolved
    /// topic cannot be compiled into a matcher.
    pub fn register<F>(&self, template: impl Into<String>, callback: F) -> Result<()>
    where
        F: Fn(&Value, &str) + Send + Sync + 'static,
    {
        let template = template.into();
        tracing::debug!(template = %template, "Registering endpoint");
        {
            let mut guard = self.inner.state.lock();
            let state = &mut *guard;
            let changes = state
                .registry
                .register(template, Arc::new(callback), &state.context)?;
            self.inner.enqueue(changes);
        }
        self.inner.flush();
        Ok(())
    }

    /// Returns the concrete topics currently subscribed, in dispatch order.
    #[must_use]
    pub fn active_topics(&self) -> Vec<String> {
        self.inner.state.lock().registry.active_topics()
    }

    /// Returns the number of registered endpoints.
    #[must_use]
    pub fn endpoint_count(&self) -> usize {
        self.inner.state.lock().registry.endpoint_count()
    }

    // =========================================================================
    // Actions
    // =========================================================================

    /// Sends a correlated action and returns its pending result.
    ///
    /// The call never waits for the response; await the returned
    /// [`PendingAction`] for it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`](crate::Error::Transport) if the transport
    /// refuses the message. No pending entry is kept in that case.
    pub fn action(&self, action_type: impl Into<String>, payload: Value) -> Result<PendingAction> {
        let pending = self.inner.state.lock().actions.begin();
        let id = pending.correlation_id().clone();
        let message = OutboundMessage::Action(ActionRequest {
            action_type: action_type.into(),
            payload,
            corr: id.clone(),
        });

        tracing::debug!(id = %id, "Sending action");
        if let Err(e) = self.inner.transport.emit(&message) {
            tracing::warn!(id = %id, error = %e, "Failed to send action");
            self.inner.state.lock().actions.discard(&id);
            return Err(e.into());
        }

        Ok(pending)
    }

    /// Returns the number of actions waiting for a response.
    #[must_use]
    pub fn pending_action_count(&self) -> usize {
        self.inner.state.lock().actions.pending_count()
    }

    // =========================================================================
    // Inbound events
    // =========================================================================

    /// Routes one inbound event.
    pub fn handle_event(&self, event: InboundEvent) {
        match event {
            InboundEvent::Change(change) => self.handle_change(&change),
            InboundEvent::Response(response) => self.handle_response(&response),
        }
    }

    /// Invokes every callback whose subscription matches the change key.
    ///
    /// Callbacks run in subscription order; a change matching nothing is
    /// dropped.
    pub fn handle_change(&self, change: &ChangeMessage) {
        tracing::debug!(key = %change.key, "Change received");
        let callbacks = self.inner.state.lock().registry.matching(&change.key);

        if callbacks.is_empty() {
            tracing::trace!(key = %change.key, "No subscription matches change");
            return;
        }

        for callback in callbacks {
            callback(&change.content, &change.key);
        }
    }

    /// Settles the pending action matching the response, if any.
    pub fn handle_response(&self, response: &ResponseMessage) {
        self.inner.state.lock().actions.settle(response);
    }

    /// Spawns a task routing every event received on `rx`.
    ///
    /// The task ends when all senders are dropped.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn listen(&self, mut rx: mpsc::Receiver<InboundEvent>) -> JoinHandle<()> {
        let client = self.clone();
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                client.handle_event(event);
            }
            tracing::debug!("Inbound channel closed, listener stopped");
        })
    }

    /// Creates an inbound channel sized by the configuration and spawns a
    /// listener on it.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn channel(&self) -> (mpsc::Sender<InboundEvent>, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(self.inner.config.listener_buffer);
        (tx, self.listen(rx))
    }
}

impl ClientInner {
    /// Queues subscription changes; callers hold the state lock so that
    /// queue order follows state order.
    fn enqueue(&self, changes: Vec<SubscriptionChange>) {
        if changes.is_empty() {
            return;
        }
        let mut outbox = self.outbox.lock();
        outbox.extend(changes.into_iter().map(|change| match change {
            SubscriptionChange::Subscribe(topic) => OutboundMessage::Subscribe(topic),
            SubscriptionChange::Unsubscribe(topic) => OutboundMessage::Unsubscribe(topic),
        }));
    }

    /// Emits queued messages unless another caller is already doing so.
    fn flush(&self) {
        loop {
            if self
                .flushing
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                return;
            }

            loop {
                let next = self.outbox.lock().pop_front();
                let Some(message) = next else {
                    break;
                };
                self.send(&message);
            }

            self.flushing.store(false, Ordering::Release);

            // Another caller may have queued after our last pop but before
            // the flag was cleared.
            if self.outbox.lock().is_empty() {
                return;
            }
        }
    }

    fn send(&self, message: &OutboundMessage) {
        let topic = match message {
            OutboundMessage::Subscribe(topic) | OutboundMessage::Unsubscribe(topic) => topic.as_str(),
            OutboundMessage::Action(_) => "",
        };

        match self.transport.emit(message) {
            Ok(()) => match message {
                OutboundMessage::Subscribe(_) => {
                    tracing::info!(topic = %topic, "Subscribing to channel");
                }
                OutboundMessage::Unsubscribe(_) => {
                    tracing::info!(topic = %topic, "Unsubscribing from channel");
                }
                OutboundMessage::Action(_) => {}
            },
            Err(e) => {
                tracing::warn!(
                    event = message.event_name(),
                    topic = %topic,
                    error = %e,
                    "Transport rejected subscription change"
                );
            }
        }
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Client")
            .field("context", &state.context)
            .field("registry", &state.registry)
            .field("pending_actions", &state.actions.pending_count())
            .finish_non_exhaustive()
    }
}
