// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Correlation identifiers and their generators.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Token pairing an outgoing action with its eventual response.
///
/// # Examples
///
/// ```
/// use domino::action::{CorrelationId, IdGenerator, UuidGenerator};
///
/// let id = UuidGenerator.next_id();
/// assert_eq!(id.as_str().len(), 36);
/// assert_eq!(CorrelationId::from("abc").as_str(), "abc");
/// ```
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Wraps an identifier string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CorrelationId({})", self.0)
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CorrelationId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for CorrelationId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<Uuid> for CorrelationId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid.to_string())
    }
}

/// Source of fresh correlation identifiers.
pub trait IdGenerator: fmt::Debug + Send + Sync {
    /// Produces an identifier not handed out before.
    fn next_id(&self) -> CorrelationId;
}

/// Generates random UUID v4 identifiers.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn next_id(&self) -> CorrelationId {
        Uuid::new_v4().into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn uuid_ids_are_unique() {
        let ids: HashSet<_> = (0..100).map(|_| UuidGenerator.next_id()).collect();
        assert_eq!(ids.len(), 100);
    }

    #[test]
    fn display_and_debug() {
        let id = CorrelationId::new("c-1");
        assert_eq!(id.to_string(), "c-1");
        assert_eq!(format!("{id:?}"), "CorrelationId(c-1)");
    }

    #[test]
    fn serializes_as_plain_string() {
        let id = CorrelationId::new("c-1");
        assert_eq!(serde_json::to_string(&id).unwrap(), r#""c-1""#);
    }
}
