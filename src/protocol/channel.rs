// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! In-process transport backed by a tokio channel.

use tokio::sync::mpsc;

use crate::error::TransportError;
use crate::protocol::{OutboundMessage, Transport};

/// Transport that forwards every outbound message into a channel.
///
/// The receiving half is typically owned by a task holding the real socket
/// connection, which writes each message as an `(event_name, payload)`
/// frame.
///
/// # Examples
///
/// ```
/// use domino::protocol::{ChannelTransport, OutboundMessage, Transport};
///
/// let (transport, mut outbound) = ChannelTransport::new();
/// transport.emit(&OutboundMessage::Subscribe("a.b".to_string()))?;
/// assert_eq!(
///     outbound.try_recv().ok(),
///     Some(OutboundMessage::Subscribe("a.b".to_string()))
/// );
/// # Ok::<(), domino::error::TransportError>(())
/// ```
#[derive(Debug, Clone)]
pub struct ChannelTransport {
    tx: mpsc::UnboundedSender<OutboundMessage>,
}

impl ChannelTransport {
    /// Creates a transport and the receiver for its outbound messages.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<OutboundMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Wraps an existing sender.
    #[must_use]
    pub fn from_sender(tx: mpsc::UnboundedSender<OutboundMessage>) -> Self {
        Self { tx }
    }

    /// Returns `true` once the receiving half has been dropped.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl Transport for ChannelTransport {
    fn emit(&self, message: &OutboundMessage) -> Result<(), TransportError> {
        tracing::trace!(event = message.event_name(), "Forwarding outbound message");
        self.tx
            .send(message.clone())
            .map_err(|_| TransportError::ChannelClosed(format!("{} dropped", message.event_name())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emits_in_order() {
        let (transport, mut rx) = ChannelTransport::new();
        transport
            .emit(&OutboundMessage::Subscribe("a".to_string()))
            .unwrap();
        transport
            .emit(&OutboundMessage::Unsubscribe("a".to_string()))
            .unwrap();

        assert_eq!(rx.try_recv().unwrap(), OutboundMessage::Subscribe("a".to_string()));
        assert_eq!(rx.try_recv().unwrap(), OutboundMessage::Unsubscribe("a".to_string()));
    }

    #[test]
    fn closed_receiver_is_an_error() {
        let (transport, rx) = ChannelTransport::new();
        drop(rx);

        assert!(transport.is_closed());
        let err = transport
            .emit(&OutboundMessage::Subscribe("a".to_string()))
            .unwrap_err();
        assert!(matches!(err, TransportError::ChannelClosed(_)));
    }
}
