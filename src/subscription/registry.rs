// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Endpoint registry and the context refresh protocol.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::context::Context;
use crate::error::TemplateError;
use crate::topic::{self, MatchMode, TopicMatcher};

use super::{ChangeCallback, SubscriptionChange};

/// A registered topic template and its callback.
#[derive(Clone)]
struct Endpoint {
    template: String,
    callback: ChangeCallback,
}

/// An endpoint whose template is fully resolved by the current context.
#[derive(Clone)]
struct ActiveSubscription {
    template: String,
    topic: String,
    matcher: Arc<dyn TopicMatcher>,
    callback: ChangeCallback,
}

/// Registry of endpoints and their context-resolved subscriptions.
///
/// Endpoints are kept in registration order so that refreshes and dispatch
/// are deterministic; a side index gives lookup by template string. At most
/// one endpoint exists per template.
///
/// The registry itself never talks to a transport: operations that change
/// the set of resolved topics return the [`SubscriptionChange`]s the caller
/// must emit.
pub struct SubscriptionRegistry {
    mode: MatchMode,
    endpoints: Vec<Endpoint>,
    index: HashMap<String, usize>,
    active: Vec<ActiveSubscription>,
}

impl SubscriptionRegistry {
    /// Creates an empty registry compiling matchers with `mode`.
    #[must_use]
    pub fn new(mode: MatchMode) -> Self {
        Self {
            mode,
            endpoints: Vec::new(),
            index: HashMap::new(),
            active: Vec::new(),
        }
    }

    /// Returns the match mode used for compiled matchers.
    #[must_use]
    pub fn mode(&self) -> MatchMode {
        self.mode
    }

    /// Registers `callback` for `template`, resolving it against `context`.
    ///
    /// Registering a template that already exists replaces its callback in
    /// place; its transport subscription is left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError`] if the resolved topic cannot be compiled into
    /// a matcher. The registry is unchanged in that case.
    pub fn register(
        &mut self,
        template: impl Into<String>,
        callback: ChangeCallback,
        context: &Context,
    ) -> Result<Vec<SubscriptionChange>, TemplateError> {
        let template = template.into();

        if let Some(&position) = self.index.get(&template) {
            tracing::debug!(template = %template, "Replacing endpoint callback");
            self.endpoints[position].callback = Arc::clone(&callback);
            for active in self.active.iter_mut().filter(|a| a.template == template) {
                active.callback = Arc::clone(&callback);
            }
            return Ok(Vec::new());
        }

        let resolved = match topic::resolve(&template, context) {
            Some(topic) => Some(self.activate(&template, topic, Arc::clone(&callback))?),
            None => {
                tracing::info!(template = %template, "Endpoint registered but unresolved by current context");
                None
            }
        };

        self.index.insert(template.clone(), self.endpoints.len());
        self.endpoints.push(Endpoint { template, callback });

        Ok(resolved
            .map(|active| {
                let change = SubscriptionChange::Subscribe(active.topic.clone());
                self.active.push(active);
                change
            })
            .into_iter()
            .collect())
    }

    /// Re-resolves every endpoint after a context change.
    ///
    /// For each endpoint whose concrete topic differs between `old` and
    /// `new`, the old topic (if any) is unsubscribed and the new one (if any)
    /// subscribed. The active list is rebuilt from scratch.
    pub fn refresh(&mut self, old: &Context, new: &Context) -> Vec<SubscriptionChange> {
        let mut changes = Vec::new();
        let mut active = Vec::with_capacity(self.endpoints.len());

        for endpoint in &self.endpoints {
            let old_topic = topic::resolve(&endpoint.template, old);
            let new_topic = topic::resolve(&endpoint.template, new);

            if old_topic != new_topic {
                if let Some(topic) = &old_topic {
                    changes.push(SubscriptionChange::Unsubscribe(topic.clone()));
                }
                if let Some(topic) = &new_topic {
                    changes.push(SubscriptionChange::Subscribe(topic.clone()));
                }
            }

            let Some(topic) = new_topic else {
                continue;
            };
            match self.activate(&endpoint.template, topic, Arc::clone(&endpoint.callback)) {
                Ok(subscription) => active.push(subscription),
                Err(e) => {
                    tracing::warn!(template = %endpoint.template, error = %e, "Skipping endpoint with invalid topic");
                }
            }
        }

        self.active = active;
        changes
    }

    /// Returns the callbacks whose matcher accepts `key`, in list order.
    #[must_use]
    pub fn matching(&self, key: &str) -> Vec<ChangeCallback> {
        self.active
            .iter()
            .filter(|active| active.matcher.test(key))
            .map(|active| Arc::clone(&active.callback))
            .collect()
    }

    /// Returns the concrete topics currently resolved, in list order.
    #[must_use]
    pub fn active_topics(&self) -> Vec<String> {
        self.active.iter().map(|a| a.topic.clone()).collect()
    }

    /// Returns the number of registered endpoints.
    #[must_use]
    pub fn endpoint_count(&self) -> usize {
        self.endpoints.len()
    }

    /// Returns `true` if `template` has a registered endpoint.
    #[must_use]
    pub fn contains(&self, template: &str) -> bool {
        self.index.contains_key(template)
    }

    fn activate(
        &self,
        template: &str,
        topic: String,
        callback: ChangeCallback,
    ) -> Result<ActiveSubscription, TemplateError> {
        let matcher = topic::compile_matcher(&topic, self.mode)?;
        Ok(ActiveSubscription {
            template: template.to_string(),
            topic,
            matcher: Arc::new(matcher),
            callback,
        })
    }
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        Self::new(MatchMode::default())
    }
}

impl fmt::Debug for SubscriptionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionRegistry")
            .field("mode", &self.mode)
            .field("endpoint_count", &self.endpoints.len())
            .field("active_topics", &self.active_topics())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    use serde_json::{Value, json};

    fn noop() -> ChangeCallback {
        Arc::new(|_: &Value, _: &str| {})
    }

    fn counting(counter: &Arc<AtomicU32>) -> ChangeCallback {
        let counter = Arc::clone(counter);
        Arc::new(move |_: &Value, _: &str| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    fn subscribe(topic: &str) -> SubscriptionChange {
        SubscriptionChange::Subscribe(topic.to_string())
    }

    fn unsubscribe(topic: &str) -> SubscriptionChange {
        SubscriptionChange::Unsubscribe(topic.to_string())
    }

    #[test]
    fn register_unresolved_is_inactive() {
        let mut registry = SubscriptionRegistry::default();
        let changes = registry
            .register("room.[id].msg", noop(), &Context::new())
            .unwrap();

        assert!(changes.is_empty());
        assert_eq!(registry.endpoint_count(), 1);
        assert!(registry.active_topics().is_empty());
    }

    #[test]
    fn register_resolved_subscribes() {
        let mut registry = SubscriptionRegistry::default();
        let ctx = Context::new().with("id", "5");
        let changes = registry.register("room.[id].msg", noop(), &ctx).unwrap();

        assert_eq!(changes, vec![subscribe("room.5.msg")]);
        assert_eq!(registry.active_topics(), vec!["room.5.msg"]);
    }

    #[test]
    fn refresh_diffs_old_and_new_topics() {
        let mut registry = SubscriptionRegistry::default();
        registry
            .register("room.[id].msg", noop(), &Context::new())
            .unwrap();

        let empty = Context::new();
        let five = Context::new().with("id", "5");
        let seven = Context::new().with("id", "7");

        assert_eq!(registry.refresh(&empty, &five), vec![subscribe("room.5.msg")]);
        assert_eq!(
            registry.refresh(&five, &seven),
            vec![unsubscribe("room.5.msg"), subscribe("room.7.msg")]
        );
        assert!(registry.refresh(&seven, &seven).is_empty());
        assert_eq!(registry.active_topics(), vec!["room.7.msg"]);

        assert_eq!(registry.refresh(&seven, &empty), vec![unsubscribe("room.7.msg")]);
        assert!(registry.active_topics().is_empty());
    }

    #[test]
    fn refresh_keeps_unaffected_endpoints_active() {
        let mut registry = SubscriptionRegistry::default();
        let ctx = Context::new().with("user", "u1");
        registry.register("news.*", noop(), &ctx).unwrap();
        registry.register("user.[user].inbox", noop(), &ctx).unwrap();

        let changes = registry.refresh(&ctx, &ctx.merged(&Context::new().with("room", "r")));
        assert!(changes.is_empty());
        assert_eq!(registry.active_topics(), vec!["news.*", "user.u1.inbox"]);
    }

    #[test]
    fn matching_uses_resolved_topic() {
        let mut registry = SubscriptionRegistry::default();
        let counter = Arc::new(AtomicU32::new(0));
        let ctx = Context::new().with("id", "5");
        registry
            .register("room.[id].*", counting(&counter), &ctx)
            .unwrap();

        for callback in registry.matching("room.5.msg") {
            callback(&json!(null), "room.5.msg");
        }
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(registry.matching("room.6.msg").is_empty());
    }

    #[test]
    fn matching_returns_every_overlapping_subscription() {
        let mut registry = SubscriptionRegistry::default();
        let ctx = Context::new();
        registry.register("a.*.b", noop(), &ctx).unwrap();
        registry.register("a.1.*", noop(), &ctx).unwrap();
        registry.register("z.*", noop(), &ctx).unwrap();

        assert_eq!(registry.matching("a.1.b").len(), 2);
    }

    #[test]
    fn reregister_replaces_callback_without_resubscribing() {
        let mut registry = SubscriptionRegistry::default();
        let first = Arc::new(AtomicU32::new(0));
        let second = Arc::new(AtomicU32::new(0));
        let ctx = Context::new().with("id", "1");

        registry.register("t.[id]", counting(&first), &ctx).unwrap();
        let changes = registry.register("t.[id]", counting(&second), &ctx).unwrap();

        assert!(changes.is_empty());
        assert_eq!(registry.endpoint_count(), 1);
        assert!(registry.contains("t.[id]"));

        for callback in registry.matching("t.1") {
            callback(&json!(1), "t.1");
        }
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);

        // The replacement survives a refresh as well.
        let next = Context::new().with("id", "2");
        registry.refresh(&ctx, &next);
        for callback in registry.matching("t.2") {
            callback(&json!(2), "t.2");
        }
        assert_eq!(second.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn anchored_registry_rejects_embedded_keys() {
        let mut registry = SubscriptionRegistry::new(MatchMode::Anchored);
        registry.register("a.*.b", noop(), &Context::new()).unwrap();

        assert_eq!(registry.matching("a.1.b").len(), 1);
        assert!(registry.matching("xa.1.bfoo").is_empty());
        assert_eq!(registry.mode(), MatchMode::Anchored);
    }

    #[test]
    fn debug_lists_active_topics() {
        let mut registry = SubscriptionRegistry::default();
        registry.register("a.b", noop(), &Context::new()).unwrap();
        let debug = format!("{registry:?}");
        assert!(debug.contains("SubscriptionRegistry"));
        assert!(debug.contains("a.b"));
    }
}
