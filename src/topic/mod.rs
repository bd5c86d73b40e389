// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Topic templates: variable substitution and wildcard matching.
//!
//! A topic template combines bracketed variables and `*` wildcards:
//!
//! ```text
//! user.[userId].notifications.*
//!      ^^^^^^^^               ^
//!      filled from Context    one or more of [a-z0-9_] at dispatch time
//! ```
//!
//! Everything here is stateless: [`extract_variables`] and [`resolve`] work
//! on strings and a [`Context`](crate::Context), and [`compile_matcher`]
//! turns a resolved topic into a [`TopicMatcher`].

mod matcher;
mod template;

pub use matcher::{MatchMode, RegexMatcher, TopicMatcher, compile_matcher};
pub use template::{extract_variables, resolve};
