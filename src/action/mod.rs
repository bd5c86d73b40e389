// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Request/response actions correlated over the transport.
//!
//! ```text
//! client.action("ping", payload)
//!         ↓
//!   ActionCorrelator.begin() → (corr id, PendingAction)
//!         ↓
//!   emit action {type, payload, corr}
//!         ⋮
//!   inbound response {correlationId, status, content}
//!         ↓
//!   ActionCorrelator.settle() → PendingAction resolves / rejects
//! ```

mod correlation_id;
mod correlator;

pub use correlation_id::{CorrelationId, IdGenerator, UuidGenerator};
pub use correlator::{ActionCorrelator, PendingAction, STATUS_OK};
