//! Matching and rendering engine.
//!
//! This module is the core of the crate: a rule-driven scanner that locates
//! structured matches in a text window, and a companion pass that re-emits
//! the window with matched regions rewritten.
//!
//! ## How the parts work together
//!
//! ```text
//! rule tables  ──┐
//!               │  RuleSet (arena; connected/nested links)   (rules.rs)
//!               └───────────────┬──────────────
//!                               │
//! text window ── scan ──────────┼─ rotating rule cursor, literal heads
//!               (matcher.rs)    │  or probes, tail search with nested
//!                               │  recursion for balanced delimiters
//!                               v
//!                     Vec<Node> (ordered, non-overlapping)
//!                               │
//!                  separator matches at a level?
//!                               │
//!                               v
//!                     split (splitter.rs)
//!                       - text between separators becomes the matches
//!                       - TRIM / DROP_EMPTY / GROUPED
//!                               │
//!                               v
//!                     render (renderer.rs)
//!                       - pass-through + replacements + callbacks
//!                       - BUBBLE pre-renders children
//!                               │
//!                               v
//!                            Buffer
//! ```
//!
//! The engine never fails: unmatched input passes through the renderer
//! verbatim, an unclosed delimiter is rolled back as if its head never
//! matched, and a callback that has nothing to say returns an empty buffer.
//!
//! ## Building rule graphs
//!
//! Rules live in a [`RuleSet`] arena and reference each other by [`RuleId`],
//! so a bracket rule can nest itself and operator tiers can chain through
//! POP fallbacks; see `eval.rs`, `document.rs`, and `template.rs` for the
//! three rule tables built on top of this module.
//!
//! ## Debugging
//!
//! Set `TESSELLA_DEBUG_RULES=1` to print a scan summary per window.

#[path = "engine/matcher.rs"]
mod matcher;
#[path = "engine/renderer.rs"]
mod renderer;
#[path = "engine/rules.rs"]
mod rules;
#[path = "engine/splitter.rs"]
mod splitter;

pub use matcher::{Node, scan};
pub use renderer::render;
pub use rules::{MatchFn, ParseFn, Rule, RuleFlags, RuleId, RuleSet};
