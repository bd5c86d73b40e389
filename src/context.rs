// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Substitution context for topic templates.
//!
//! A [`Context`] maps variable names to JSON values. Topic templates such as
//! `user.[userId].profile` are resolved against it: a variable whose value is
//! missing or "empty" (see [`is_truthy`]) leaves the template unresolved.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Variable values used to resolve topic templates.
///
/// # Examples
///
/// ```
/// use domino::Context;
///
/// let ctx = Context::new().with("userId", "42").with("room", 7);
/// assert_eq!(ctx.segment("userId").as_deref(), Some("42"));
/// assert_eq!(ctx.segment("room").as_deref(), Some("7"));
/// assert_eq!(ctx.segment("missing"), None);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Context {
    values: BTreeMap<String, Value>,
}

impl Context {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the context with `name` set to `value`.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    /// Sets a single variable, returning the previous value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.values.insert(name.into(), value.into())
    }

    /// Returns the raw value of a variable.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Returns the text substituted for `name`, or `None` when the variable
    /// is missing or holds a falsy value.
    #[must_use]
    pub fn segment(&self, name: &str) -> Option<String> {
        self.values
            .get(name)
            .filter(|value| is_truthy(value))
            .map(value_to_segment)
    }

    /// Returns a new context where the entries of `partial` overwrite ours.
    ///
    /// Keys absent from `partial` are kept unchanged.
    #[must_use]
    pub fn merged(&self, partial: &Context) -> Context {
        let mut values = self.values.clone();
        values.extend(
            partial
                .values
                .iter()
                .map(|(name, value)| (name.clone(), value.clone())),
        );
        Context { values }
    }

    /// Returns the number of variables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` when no variable is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterates over the variables in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(name, value)| (name.as_str(), value))
    }
}

impl<K, V> FromIterator<(K, V)> for Context
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        }
    }
}

/// Loose truthiness of a context value.
///
/// `null`, `false`, `0`, NaN and the empty string count as "no value";
/// everything else, including empty arrays and objects, is truthy.
#[must_use]
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Renders a value as the text inserted into a topic.
///
/// Arrays join their rendered items with `,` (a `null` item renders empty)
/// and every object renders as `[object Object]`.
fn value_to_segment(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(value_to_segment)
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => "[object Object]".to_string(),
        // Integral floats render without a fractional part, e.g. 7.0 -> "7".
        #[allow(clippy::cast_possible_truncation)]
        Value::Number(n) => match (n.as_i64(), n.as_u64(), n.as_f64()) {
            (Some(i), _, _) => i.to_string(),
            (None, Some(u), _) => u.to_string(),
            (None, None, Some(f)) if f.fract() == 0.0 && f.abs() < 1e15 => {
                (f as i64).to_string()
            }
            _ => n.to_string(),
        },
        Value::Bool(b) => b.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn falsy_values_are_not_segments() {
        let ctx = Context::new()
            .with("empty", "")
            .with("zero", 0)
            .with("null", Value::Null)
            .with("no", false);

        for name in ["empty", "zero", "null", "no", "absent"] {
            assert_eq!(ctx.segment(name), None, "{name} should be falsy");
        }
    }

    #[test]
    fn truthy_values_render() {
        let ctx = Context::new()
            .with("s", "abc")
            .with("n", 12)
            .with("f", 7.0)
            .with("g", 1.5)
            .with("b", true);

        assert_eq!(ctx.segment("s").as_deref(), Some("abc"));
        assert_eq!(ctx.segment("n").as_deref(), Some("12"));
        assert_eq!(ctx.segment("f").as_deref(), Some("7"));
        assert_eq!(ctx.segment("g").as_deref(), Some("1.5"));
        assert_eq!(ctx.segment("b").as_deref(), Some("true"));
    }

    #[test]
    fn collections_render_like_string_coercion() {
        let ctx = Context::new()
            .with("list", json!([1, "a", [2, 3]]))
            .with("holes", json!([null, 1]))
            .with("empty", json!([]))
            .with("obj", json!({"k": "v"}));

        assert_eq!(ctx.segment("list").as_deref(), Some("1,a,2,3"));
        assert_eq!(ctx.segment("holes").as_deref(), Some(",1"));
        assert_eq!(ctx.segment("empty").as_deref(), Some(""));
        assert_eq!(ctx.segment("obj").as_deref(), Some("[object Object]"));
    }

    #[test]
    fn empty_collections_are_truthy() {
        assert!(is_truthy(&json!([])));
        assert!(is_truthy(&json!({})));
        assert!(!is_truthy(&json!(0.0)));
    }

    #[test]
    fn merged_overwrites_and_preserves() {
        let base = Context::new().with("a", "1").with("b", "2");
        let partial = Context::new().with("b", "3").with("c", "4");

        let merged = base.merged(&partial);
        assert_eq!(merged.segment("a").as_deref(), Some("1"));
        assert_eq!(merged.segment("b").as_deref(), Some("3"));
        assert_eq!(merged.segment("c").as_deref(), Some("4"));
        // The base is left untouched.
        assert_eq!(base.segment("b").as_deref(), Some("2"));
    }

    #[test]
    fn deserializes_from_plain_object() {
        let ctx: Context = serde_json::from_str(r#"{"userId":"u1","room":5}"#).unwrap();
        assert_eq!(ctx.len(), 2);
        assert_eq!(ctx.segment("room").as_deref(), Some("5"));
    }

    #[test]
    fn collects_from_pairs() {
        let ctx: Context = [("id", "5"), ("org", "acme")].into_iter().collect();
        assert_eq!(ctx.get("org"), Some(&json!("acme")));
        assert!(!ctx.is_empty());
    }
}
