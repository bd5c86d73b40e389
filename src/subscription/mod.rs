// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Subscription registry for context-resolved topics.
//!
//! This module keeps track of which topic templates the application is
//! interested in and which concrete channels they currently resolve to.
//!
//! # Overview
//!
//! - [`SubscriptionRegistry`] - endpoints in registration order plus the
//!   active (resolved) subscriptions used for dispatch
//! - [`SubscriptionChange`] - a transport-level subscribe or unsubscribe
//!   produced by registering or by a context refresh
//! - [`ChangeCallback`] - the callback type invoked for inbound changes
//!
//! # Refresh protocol
//!
//! ```text
//! set_context / update_context
//!             ↓
//!   for each endpoint (registration order)
//!     old = resolve(template, old_ctx)
//!     new = resolve(template, new_ctx)
//!     old != new → Unsubscribe(old)?, Subscribe(new)?
//!     new resolved → push active { matcher(new), callback }
//!             ↓
//!   active list replaced wholesale
//! ```

mod registry;

use std::sync::Arc;

use serde_json::Value;

pub use registry::SubscriptionRegistry;

/// Callback invoked with `(content, channel_key)` for each matching change.
pub type ChangeCallback = Arc<dyn Fn(&Value, &str) + Send + Sync>;

/// A transport-level subscription change.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SubscriptionChange {
    /// Start receiving changes for a concrete topic.
    Subscribe(String),
    /// Stop receiving changes for a concrete topic.
    Unsubscribe(String),
}

impl SubscriptionChange {
    /// Returns the concrete topic affected by this change.
    #[must_use]
    pub fn topic(&self) -> &str {
        match self {
            Self::Subscribe(topic) | Self::Unsubscribe(topic) => topic,
        }
    }
}
