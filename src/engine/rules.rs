//! Rule graph: the declarative description of what to look for and how to
//! transform it.
//!
//! A `Rule` is passive data: an opening anchor, optional links to other
//! rules, a flag set, and optional callbacks. Rules live in a `RuleSet`
//! arena and refer to each other by `RuleId` index, which keeps
//! self-referential and mutually recursive graphs (a bracket rule nesting
//! itself, operator tiers nesting each other) expressible without shared
//! ownership.
//!
//! A delimited pattern is two rules: the opener carries the head anchor and
//! a `connected` link to the rule carrying the closing anchor. The closing
//! rule's flags, tag, and callbacks govern what happens once the full span
//! is matched. `connected` links chain: every linked anchor must match in
//! sequence for the overall match to be accepted.
//!
//! Rule sets are built once at startup and are read-only during matching.

use std::fmt;
use std::ops::Index;

use super::matcher::Node;
use crate::text::Buffer;

/// Index of a rule inside its `RuleSet`.
pub type RuleId = usize;

/// Custom match detector, called in place of literal head matching.
///
/// Receives the text, the attempt position, and the window end. Returns the
/// number of characters consumed on a hit, or `None` for no match (the
/// scanner then moves on exactly as after a failed literal compare).
pub type MatchFn = fn(text: &[char], at: usize, end: usize) -> Option<usize>;

/// Output transformer invoked when rendering a match of this rule.
///
/// For plain rules `block` is the full text the renderer was called with and
/// the node's span indexes into it. For [`RuleFlags::BUBBLE`] rules `block`
/// is the matched span itself, with nested matches already rendered when the
/// node has children.
pub type ParseFn<C> = fn(rules: &RuleSet<C>, block: &[char], node: &Node, ctx: &C) -> Buffer;

bitflags::bitflags! {
    /// Rule options. Flags compose by set union.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct RuleFlags: u16 {
        /// Render nested matches first; the parse callback receives the
        /// rendered span instead of the raw one.
        const BUBBLE = 1;
        /// Drop a split segment (or a delimited payload) that ends up empty.
        const DROP_EMPTY = 1 << 1;
        /// Wrap split segments as children of one synthetic parent match.
        const GROUPED = 1 << 2;
        /// Trim ASCII whitespace at split segment boundaries.
        const TRIM = 1 << 3;
        /// This rule is a separator inside its level; its matches feed the
        /// splitter instead of standing on their own.
        const SPLIT = 1 << 4;
        /// Stop scanning the window after the first match of this rule.
        const ONCE = 1 << 5;
        /// Match and advance past the span, but keep it out of the results.
        const IGNORE = 1 << 6;
        /// When the level produced nothing, rescan the window with this
        /// rule's nested rules.
        const POP = 1 << 7;
    }
}

/// One pattern description. See the module docs for how rules link up.
pub struct Rule<C> {
    /// Opening anchor. Empty only when a `probe` does the detection.
    pub head: Buffer,
    /// Next anchor that must match after this one, if any.
    pub connected: Option<RuleId>,
    /// Rules allowed to appear between this delimiter's head and its tail.
    pub nested: Vec<RuleId>,
    pub flags: RuleFlags,
    /// Opaque discriminator for callbacks shared between sibling rules.
    pub tag: u16,
    /// Literal emitted for a match when no parse callback is attached.
    pub replacement: Option<Buffer>,
    /// Custom match detector; replaces the literal head compare.
    pub probe: Option<MatchFn>,
    /// Output transformer for matches of this rule.
    pub on_parse: Option<ParseFn<C>>,
}

impl<C> Rule<C> {
    /// Rule matching the literal `head`.
    pub fn new(head: &str) -> Self {
        Rule {
            head: Buffer::from(head),
            connected: None,
            nested: Vec::new(),
            flags: RuleFlags::empty(),
            tag: 0,
            replacement: None,
            probe: None,
            on_parse: None,
        }
    }

    /// Rule matching a literal span of characters.
    pub fn new_span(head: &[char]) -> Self {
        Rule { head: Buffer::from(head), ..Rule::new("") }
    }

    /// Rule whose match detection is a custom probe.
    pub fn probe(probe: MatchFn) -> Self {
        Rule { probe: Some(probe), ..Rule::new("") }
    }

    pub fn flags(mut self, flags: RuleFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn tag(mut self, tag: u16) -> Self {
        self.tag = tag;
        self
    }

    pub fn replace(mut self, replacement: &str) -> Self {
        self.replacement = Some(Buffer::from(replacement));
        self
    }

    pub fn on_parse(mut self, callback: ParseFn<C>) -> Self {
        self.on_parse = Some(callback);
        self
    }
}

impl<C> fmt::Debug for Rule<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("head", &self.head.to_string())
            .field("connected", &self.connected)
            .field("nested", &self.nested)
            .field("flags", &self.flags)
            .field("tag", &self.tag)
            .field("probe", &self.probe.is_some())
            .field("on_parse", &self.on_parse.is_some())
            .finish()
    }
}

/// Arena of rules plus the ordered list of top-level rules to scan with.
///
/// `C` is the context type handed through to parse callbacks.
#[derive(Debug)]
pub struct RuleSet<C> {
    rules: Vec<Rule<C>>,
    roots: Vec<RuleId>,
}

impl<C> RuleSet<C> {
    pub fn new() -> Self {
        RuleSet { rules: Vec::new(), roots: Vec::new() }
    }

    /// Add a rule to the arena, returning its id.
    pub fn push(&mut self, rule: Rule<C>) -> RuleId {
        self.rules.push(rule);
        self.rules.len() - 1
    }

    /// Link `from` to `to`: after `from`'s anchor matches, `to`'s anchor is
    /// searched for next.
    pub fn connect(&mut self, from: RuleId, to: RuleId) {
        self.rules[from].connected = Some(to);
    }

    /// Allow `inner` rules to appear inside `rule`'s span (and serve as the
    /// POP fallback set).
    pub fn nest(&mut self, rule: RuleId, inner: &[RuleId]) {
        self.rules[rule].nested.extend_from_slice(inner);
    }

    /// Set the ordered top-level rule list. Earlier rules win ties.
    pub fn set_roots(&mut self, roots: &[RuleId]) {
        self.roots = roots.to_vec();
    }

    pub fn roots(&self) -> &[RuleId] {
        &self.roots
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl<C> Default for RuleSet<C> {
    fn default() -> Self {
        RuleSet::new()
    }
}

impl<C> Index<RuleId> for RuleSet<C> {
    type Output = Rule<C>;

    fn index(&self, id: RuleId) -> &Rule<C> {
        &self.rules[id]
    }
}
