//! Tessella: a rule-driven text matching and transformation engine.
//!
//! The core is a scanner that locates structured matches (delimited,
//! nested, alternated, split) described by declarative rule tables, and a
//! renderer that re-emits the input with matched regions rewritten through
//! replacements and callbacks. Three clients ship with the crate, each
//! expressed as a rule table over the same engine:
//!
//! - an arithmetic/logic [`evaluate`]-or,
//! - a JSON-capable [`Document`] store with hash-indexed keys,
//! - an HTML-like template renderer ([`render_template`]).
//!
//! ```
//! let data = tessella::Document::from_json(r#"{"numbers": [1, 2, 3]}"#);
//! let out = tessella::render_template("{v:numbers[2]} = {math: 1 + 2}", &data);
//! assert_eq!(out, "3 = 3");
//! ```
//!
//! Custom rule tables plug in through [`RuleSet`] and [`rewrite`]; see the
//! `engine` module docs for the matching pipeline.

mod api;
mod document;
pub mod engine;
mod eval;
mod template;
pub mod text;

pub use api::{evaluate, evaluate_to_string, render_template, rewrite};
pub use document::Document;
pub use engine::{MatchFn, Node, ParseFn, Rule, RuleFlags, RuleId, RuleSet};
pub use text::Buffer;
