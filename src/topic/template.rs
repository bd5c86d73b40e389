// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Variable extraction and substitution for topic templates.

use crate::context::Context;

/// Extracts the bracketed variable names of a template.
///
/// Names are returned in encounter order; duplicates are preserved. A `[`
/// without a closing `]` is literal text.
///
/// # Examples
///
/// ```
/// use domino::topic::extract_variables;
///
/// assert_eq!(
///     extract_variables("org.[org].user.[id].[org]"),
///     vec!["org", "id", "org"]
/// );
/// assert!(extract_variables("plain.topic").is_empty());
/// ```
#[must_use]
pub fn extract_variables(template: &str) -> Vec<&str> {
    let mut names = Vec::new();
    let mut rest = template;

    while let Some(open) = rest.find('[') {
        let after = &rest[open + 1..];
        let Some(close) = after.find(']') else {
            break;
        };
        names.push(&after[..close]);
        rest = &after[close + 1..];
    }

    names
}

/// Substitutes every variable of `template` from `context`.
///
/// Returns `None` when any variable is missing or falsy in the context;
/// otherwise every occurrence of each `[name]` is replaced by its value.
///
/// # Examples
///
/// ```
/// use domino::Context;
/// use domino::topic::resolve;
///
/// let ctx = Context::new().with("id", "5");
/// assert_eq!(resolve("room.[id].msg", &ctx).as_deref(), Some("room.5.msg"));
/// assert_eq!(resolve("room.[other].msg", &ctx), None);
/// ```
#[must_use]
pub fn resolve(template: &str, context: &Context) -> Option<String> {
    let mut topic = String::with_capacity(template.len());
    let mut rest = template;

    // Values are copied verbatim and never rescanned for brackets.
    while let Some(open) = rest.find('[') {
        let after = &rest[open + 1..];
        let Some(close) = after.find(']') else {
            break;
        };
        let name = &after[..close];
        let Some(value) = context.segment(name) else {
            tracing::trace!(template = %template, variable = %name, "Template variable unresolved");
            return None;
        };
        topic.push_str(&rest[..open]);
        topic.push_str(&value);
        rest = &after[close + 1..];
    }
    topic.push_str(rest);

    Some(topic)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_in_encounter_order() {
        assert_eq!(extract_variables("user.[userId].profile"), vec!["userId"]);
        assert_eq!(extract_variables("[a].[b].[a]"), vec!["a", "b", "a"]);
    }

    #[test]
    fn unclosed_bracket_is_literal() {
        assert_eq!(extract_variables("a.[b"), Vec::<&str>::new());
        assert_eq!(extract_variables("[x].[y"), vec!["x"]);
    }

    #[test]
    fn empty_brackets_yield_empty_name() {
        assert_eq!(extract_variables("a.[].b"), vec![""]);
        assert_eq!(resolve("a.[].b", &Context::new().with("x", "1")), None);
    }

    #[test]
    fn substitutes_all_occurrences_identically() {
        let ctx = Context::new().with("a", "1").with("b", "two");
        assert_eq!(
            resolve("[a].x.[b].y.[a]", &ctx).as_deref(),
            Some("1.x.two.y.1")
        );
    }

    #[test]
    fn substituted_values_are_not_rescanned() {
        let ctx = Context::new().with("a", "[b]").with("b", "1");
        assert_eq!(resolve("[a].[b]", &ctx).as_deref(), Some("[b].1"));
        assert_eq!(resolve("x.[b].[a]", &ctx).as_deref(), Some("x.1.[b]"));
    }

    #[test]
    fn unclosed_bracket_is_kept_in_output() {
        let ctx = Context::new().with("a", "1");
        assert_eq!(resolve("[a].[b", &ctx).as_deref(), Some("1.[b"));
    }

    #[test]
    fn unresolved_on_missing_variable() {
        assert_eq!(resolve("a.[x].b", &Context::new()), None);
    }

    #[test]
    fn unresolved_on_falsy_variable() {
        let ctx = Context::new().with("x", "").with("y", 0);
        assert_eq!(resolve("a.[x].b", &ctx), None);
        assert_eq!(resolve("a.[y].b", &ctx), None);
    }

    #[test]
    fn template_without_variables_resolves_to_itself() {
        assert_eq!(
            resolve("news.*.headline", &Context::new()).as_deref(),
            Some("news.*.headline")
        );
    }

    #[test]
    fn one_missing_variable_fails_the_whole_template() {
        let ctx = Context::new().with("org", "acme");
        assert_eq!(resolve("[org].[team].feed", &ctx), None);
    }
}
