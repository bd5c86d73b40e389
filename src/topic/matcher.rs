// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Wildcard matchers used to route inbound change keys.
//!
//! A topic such as `news.*.headline` is compiled into a predicate over
//! channel keys. Each `*` stands for one or more characters from
//! `[a-z0-9_]`; every other character matches only itself.
//!
//! # Partial matching
//!
//! By default the compiled pattern is searched for anywhere in the key
//! ([`MatchMode::Partial`]), so `a.*.b` also accepts `xa.1.bfoo`. Servers
//! that emit keys exactly equal to subscribed channels lose nothing by this;
//! when keys can embed one another, select [`MatchMode::Anchored`].

use std::fmt;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::TemplateError;

/// Character class a `*` wildcard expands to.
const WILDCARD_CLASS: &str = "[a-z0-9_]+";

/// How a compiled pattern is applied to a channel key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// The pattern may match any substring of the key.
    #[default]
    Partial,
    /// The pattern must match the whole key.
    Anchored,
}

/// Predicate deciding whether a channel key belongs to a subscription.
///
/// The subscription registry only relies on this trait, so a segment- or
/// trie-based engine can replace [`RegexMatcher`].
pub trait TopicMatcher: fmt::Debug + Send + Sync {
    /// Returns `true` if `key` belongs to this matcher's topic.
    fn test(&self, key: &str) -> bool;
}

/// Regex-backed [`TopicMatcher`].
#[derive(Clone)]
pub struct RegexMatcher {
    topic: String,
    mode: MatchMode,
    regex: Regex,
}

impl RegexMatcher {
    /// Returns the topic this matcher was compiled from.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Returns the match mode.
    #[must_use]
    pub fn mode(&self) -> MatchMode {
        self.mode
    }

    /// Returns the generated regular expression.
    #[must_use]
    pub fn pattern(&self) -> &str {
        self.regex.as_str()
    }
}

impl TopicMatcher for RegexMatcher {
    fn test(&self, key: &str) -> bool {
        self.regex.is_match(key)
    }
}

impl fmt::Debug for RegexMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegexMatcher")
            .field("topic", &self.topic)
            .field("mode", &self.mode)
            .field("pattern", &self.regex.as_str())
            .finish()
    }
}

/// Compiles a topic into a matcher.
///
/// Literal characters (including `.`) are escaped; each `*` becomes a
/// one-or-more `[a-z0-9_]` run.
///
/// # Errors
///
/// Returns [`TemplateError::InvalidPattern`] if the regex engine refuses the
/// generated pattern (for instance when it exceeds the engine's size limit).
///
/// # Examples
///
/// ```
/// use domino::topic::{MatchMode, TopicMatcher, compile_matcher};
///
/// let matcher = compile_matcher("a.*.b", MatchMode::Partial)?;
/// assert!(matcher.test("a.foo_1.b"));
/// assert!(!matcher.test("a.FOO.b"));
/// # Ok::<(), domino::error::TemplateError>(())
/// ```
pub fn compile_matcher(topic: &str, mode: MatchMode) -> Result<RegexMatcher, TemplateError> {
    let body = topic
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(WILDCARD_CLASS);

    let pattern = match mode {
        MatchMode::Partial => body,
        MatchMode::Anchored => format!("^{body}$"),
    };

    let regex = Regex::new(&pattern).map_err(|source| TemplateError::InvalidPattern {
        topic: topic.to_string(),
        source,
    })?;

    Ok(RegexMatcher {
        topic: topic.to_string(),
        mode,
        regex,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn partial(topic: &str) -> RegexMatcher {
        compile_matcher(topic, MatchMode::Partial).unwrap()
    }

    fn anchored(topic: &str) -> RegexMatcher {
        compile_matcher(topic, MatchMode::Anchored).unwrap()
    }

    #[test]
    fn wildcard_accepts_class_characters() {
        let m = partial("a.*.b");
        assert!(m.test("a.123.b"));
        assert!(m.test("a.foo_1.b"));
    }

    #[test]
    fn wildcard_rejects_empty_and_uppercase() {
        let m = partial("a.*.b");
        assert!(!m.test("a..b"));
        assert!(!m.test("a.FOO.b"));
    }

    #[test]
    fn dot_is_literal() {
        let m = partial("a.b");
        assert!(m.test("a.b"));
        assert!(!m.test("axb"));
    }

    #[test]
    fn other_metacharacters_are_literal() {
        let m = partial("price+(usd)?");
        assert!(m.test("price+(usd)?"));
        assert!(!m.test("priceeusd"));
    }

    #[test]
    fn partial_mode_accepts_embedded_keys() {
        let m = partial("a.*.b");
        assert!(m.test("xa.1.bfoo"));
        assert!(partial("room.5.msg").test("room.5.msg.extra"));
    }

    #[test]
    fn anchored_mode_requires_whole_key() {
        let m = anchored("a.*.b");
        assert!(m.test("a.1.b"));
        assert!(!m.test("xa.1.bfoo"));
        assert!(!anchored("room.5.msg").test("room.5.msg.extra"));
    }

    #[test]
    fn wildcard_does_not_cross_dots() {
        let m = anchored("a.*.b");
        assert!(!m.test("a.x.y.b"));
    }

    #[test]
    fn multiple_wildcards() {
        let m = anchored("*.events.*");
        assert!(m.test("user_1.events.login"));
        assert!(!m.test("user_1.events."));
    }

    #[test]
    fn pattern_and_debug_expose_topic() {
        let m = anchored("a.*");
        assert_eq!(m.pattern(), r"^a\.[a-z0-9_]+$");
        assert_eq!(m.topic(), "a.*");
        assert_eq!(m.mode(), MatchMode::Anchored);
        assert!(format!("{m:?}").contains("RegexMatcher"));
    }

    #[test]
    fn match_mode_deserializes_lowercase() {
        let mode: MatchMode = serde_json::from_str(r#""anchored""#).unwrap();
        assert_eq!(mode, MatchMode::Anchored);
        assert_eq!(MatchMode::default(), MatchMode::Partial);
    }
}
