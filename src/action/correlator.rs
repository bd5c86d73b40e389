// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Pending action bookkeeping.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use serde_json::Value;
use tokio::sync::oneshot;

use crate::error::ActionError;
use crate::protocol::ResponseMessage;

use super::{CorrelationId, IdGenerator, UuidGenerator};

/// Status value marking a successful response.
pub const STATUS_OK: &str = "ok";

type Settlement = Result<Value, ActionError>;

/// Handle to the result of an action sent with
/// [`Client::action`](crate::Client::action).
///
/// Awaiting it yields the response content on `ok`, or
/// [`ActionError::Rejected`] with the content for any other status. There is
/// no built-in timeout; wrap it in [`tokio::time::timeout`] when needed.
#[must_use = "a pending action does nothing unless awaited"]
pub struct PendingAction {
    id: CorrelationId,
    rx: oneshot::Receiver<Settlement>,
}

impl PendingAction {
    /// Returns the correlation id sent with the action.
    pub fn correlation_id(&self) -> &CorrelationId {
        &self.id
    }
}

impl Future for PendingAction {
    type Output = Settlement;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(ActionError::Abandoned)))
    }
}

impl fmt::Debug for PendingAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingAction").field("id", &self.id).finish()
    }
}

/// Maps outstanding correlation ids to their unsettled handles.
pub struct ActionCorrelator {
    ids: Arc<dyn IdGenerator>,
    pending: HashMap<CorrelationId, oneshot::Sender<Settlement>>,
}

impl ActionCorrelator {
    /// Creates a correlator drawing ids from `ids`.
    #[must_use]
    pub fn new(ids: Arc<dyn IdGenerator>) -> Self {
        Self {
            ids,
            pending: HashMap::new(),
        }
    }

    /// Allocates a fresh correlation id and its pending handle.
    ///
    /// An id already pending is never handed out twice; the generator is
    /// asked again until it yields a free one.
    pub fn begin(&mut self) -> PendingAction {
        let mut id = self.ids.next_id();
        while self.pending.contains_key(&id) {
            tracing::warn!(id = %id, "Id generator produced a pending correlation id");
            id = self.ids.next_id();
        }

        let (tx, rx) = oneshot::channel();
        self.pending.insert(id.clone(), tx);
        PendingAction { id, rx }
    }

    /// Settles the handle matching `response`.
    ///
    /// Returns `false` when the correlation id is unknown or already settled;
    /// such responses are ignored.
    pub fn settle(&mut self, response: &ResponseMessage) -> bool {
        let Some(tx) = self.pending.remove(&response.correlation_id) else {
            tracing::debug!(id = %response.correlation_id, "Ignoring response for unknown correlation id");
            return false;
        };

        let settlement = if response.status == STATUS_OK {
            Ok(response.content.clone())
        } else {
            Err(ActionError::Rejected {
                status: response.status.clone(),
                content: response.content.clone(),
            })
        };

        tracing::debug!(
            id = %response.correlation_id,
            status = %response.status,
            "Settling action"
        );
        // The caller may have dropped its handle already.
        let _ = tx.send(settlement);
        true
    }

    /// Forgets a pending id without settling it.
    ///
    /// The dropped sender makes the handle resolve to
    /// [`ActionError::Abandoned`].
    pub fn discard(&mut self, id: &CorrelationId) -> bool {
        self.pending.remove(id).is_some()
    }

    /// Returns the number of actions still waiting for a response.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

impl Default for ActionCorrelator {
    fn default() -> Self {
        Self::new(Arc::new(UuidGenerator))
    }
}

impl fmt::Debug for ActionCorrelator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionCorrelator")
            .field("ids", &self.ids)
            .field("pending_count", &self.pending.len())
            .finish()
    }
}
