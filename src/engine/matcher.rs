//! The scanning pass: rules + text window -> ordered match tree.
//!
//! ## How a level scans
//!
//! ```text
//! position i ──► try rule r:  head literal (or probe)
//!     │               │
//!     │ miss          │ hit
//!     ▼               ▼
//!  next rule;    connected link? ──no──► record match, i = match end
//!  after last,        │ yes
//!  i += 1             ▼
//!                search the linked anchor up to the outer bound,
//!                recursing into nested rules as content appears;
//!                a nested match that swallows the candidate anchor
//!                pushes the search past it (balanced delimiters)
//!                     │
//!            found ───┴─── window exhausted
//!              │               │
//!              ▼               ▼
//!        record match     roll back: drop partial state,
//!        with children    continue as a plain miss
//! ```
//!
//! Rules earlier in the list win ties at the same position; when every rule
//! misses, the scanner advances exactly one character, which both gives
//! earlier-starting matches priority and guarantees termination.
//!
//! After the level finishes: an empty result with a POP-flagged first rule
//! rescans the window with that rule's nested set, and a level that recorded
//! separator matches is handed to the splitter (see `splitter.rs`).
//!
//! Setting `TESSELLA_DEBUG_RULES=1` prints a compact summary per scan.

use super::rules::{RuleFlags, RuleId, RuleSet};
use super::splitter::split_nodes;

/// One recognition: a half-open span, the rule that produced it, and the
/// matches found inside it.
///
/// Children are strictly contained in the parent span, ordered by offset,
/// and non-overlapping; the same holds for every sibling list the scanner
/// returns.
#[derive(Debug, Clone)]
pub struct Node {
    /// Start of the span.
    pub offset: usize,
    /// Length of the span.
    pub length: usize,
    /// The rule this match belongs to (for a delimited match, the rule
    /// bearing the closing anchor).
    pub rule: RuleId,
    /// Nested and split matches inside the span.
    pub children: Vec<Node>,
}

impl Node {
    /// End of the span (exclusive).
    pub fn end(&self) -> usize {
        self.offset + self.length
    }
}

pub(crate) fn debug_enabled() -> bool {
    std::env::var_os("TESSELLA_DEBUG_RULES").is_some()
}

/// Scan `text[offset .. offset + limit]` with the set's top-level rules and
/// return the ordered list of matches.
pub fn scan<C>(set: &RuleSet<C>, text: &[char], offset: usize, limit: usize) -> Vec<Node> {
    scan_list(set, set.roots(), text, offset, limit)
}

/// Scan with an explicit rule list (used for nested sets and segments).
pub(crate) fn scan_list<C>(
    set: &RuleSet<C>,
    list: &[RuleId],
    text: &[char],
    offset: usize,
    limit: usize,
) -> Vec<Node> {
    let mut items = Vec::new();
    let mut splits: u16 = 0;
    let end = offset + limit;

    scan_level(&mut items, set, list, text, offset, end, end, &mut splits);

    if splits != 0 {
        split_nodes(&mut items, set, text, offset, end);
    }

    if debug_enabled() {
        eprintln!("[scan] rules={} window={offset}..{end} matches={} splits={splits}", list.len(), items.len());
    }

    items
}

fn head_matches(text: &[char], at: usize, bound: usize, head: &[char]) -> bool {
    !head.is_empty() && at + head.len() <= bound && text[at..at + head.len()] == *head
}

/// One scan level. `end` bounds where matches may start; `max` bounds how
/// far a tail search may look (nested levels keep the outer bound so a
/// nested match can swallow a candidate tail). Returns the last scan
/// position, which callers use to resume past nested content.
fn scan_level<C>(
    items: &mut Vec<Node>,
    set: &RuleSet<C>,
    list: &[RuleId],
    text: &[char],
    start: usize,
    end: usize,
    max: usize,
    splits: &mut u16,
) -> usize {
    if list.is_empty() {
        return 0;
    }

    let mut offset = start;
    let mut rule_idx = 0usize;
    let mut cursor = 0usize;

    while offset < end {
        cursor = offset;
        let mut rid = list[rule_idx];
        let mut rule = &set[rid];

        let head_hit = match rule.probe {
            Some(probe) => match probe(text, cursor, end) {
                Some(consumed) if consumed > 0 => {
                    cursor += consumed;
                    true
                }
                _ => false,
            },
            None => {
                let head = rule.head.as_slice();
                if head_matches(text, cursor, max, head) {
                    cursor += head.len();
                    true
                } else {
                    false
                }
            }
        };

        if !head_hit {
            rule_idx += 1;
            if rule_idx == list.len() {
                rule_idx = 0;
                offset += 1;
            }
            continue;
        }

        let head_len = cursor - offset;
        let mut children: Vec<Node> = Vec::new();
        let mut tail_len = None;
        let mut link = rule.connected;
        let mut link_failed = false;

        while let Some(conn) = link {
            let link_rule = &set[conn];
            let anchor = link_rule.head.as_slice();
            let content_start = cursor;
            let mut sub = cursor;
            let mut nest_splits: u16 = 0;
            let mut k = 0usize;

            while cursor != max && !anchor.is_empty() {
                let c = text[cursor];
                cursor += 1;

                if anchor[k] != c {
                    k = 0;
                    continue;
                }

                k += 1;
                if k == anchor.len() {
                    if !link_rule.nested.is_empty() && sub + k != cursor {
                        sub = scan_level(&mut children, set, &link_rule.nested, text, sub, cursor, max, &mut nest_splits);
                    }

                    if cursor > sub {
                        break;
                    }

                    // Nested content consumed the candidate anchor; keep
                    // looking from where it left off.
                    k = 0;
                    cursor = sub;
                }
            }

            if k != anchor.len() || anchor.is_empty() {
                link_failed = true;
                break;
            }

            if nest_splits != 0 {
                split_nodes(&mut children, set, text, content_start, cursor - anchor.len());
            }

            tail_len = Some(anchor.len());
            rid = conn;
            rule = link_rule;
            link = link_rule.connected;
        }

        if link_failed {
            // The window ended with the match still open: no partial state
            // survives, the attempt reads as a plain miss.
            rule_idx += 1;
            if rule_idx == list.len() {
                rule_idx = 0;
                offset += 1;
            }
            continue;
        }

        if !rule.flags.contains(RuleFlags::IGNORE) {
            let length = cursor - offset;
            let empty_payload = match tail_len {
                Some(tail_len) => length == head_len + tail_len,
                None => false,
            };

            if !(rule.flags.contains(RuleFlags::DROP_EMPTY) && empty_payload) {
                if rule.flags.contains(RuleFlags::SPLIT) {
                    *splits += 1;
                }

                items.push(Node { offset, length, rule: rid, children });

                if rule.flags.contains(RuleFlags::ONCE) {
                    return cursor;
                }
            }
        }

        rule_idx = 0;
        offset = cursor;
    }

    if items.is_empty() {
        let first = &set[list[0]];
        if first.flags.contains(RuleFlags::POP) {
            return scan_level(items, set, &first.nested, text, start, end, end, splits);
        }
    }

    cursor
}

#[cfg(test)]
mod tests {
    use super::super::rules::{Rule, RuleFlags, RuleSet};
    use super::*;

    fn chars(s: &str) -> Vec<char> {
        s.chars().collect()
    }

    fn spans(nodes: &[Node]) -> Vec<(usize, usize)> {
        nodes.iter().map(|n| (n.offset, n.length)).collect()
    }

    fn dash_rules() -> RuleSet<()> {
        let mut set = RuleSet::new();
        let dash = set.push(Rule::new("-"));
        set.set_roots(&[dash]);
        set
    }

    fn bracket_rules() -> RuleSet<()> {
        let mut set = RuleSet::new();
        let open = set.push(Rule::new("<"));
        let close = set.push(Rule::new(">"));
        set.connect(open, close);
        set.nest(close, &[open]);
        set.set_roots(&[open]);
        set
    }

    #[test]
    fn finds_every_plain_occurrence() {
        let text = chars("- a - b -");
        let found = scan(&dash_rules(), &text, 0, text.len());
        assert_eq!(spans(&found), vec![(0, 1), (4, 1), (8, 1)]);
    }

    #[test]
    fn empty_and_tiny_windows() {
        let set = dash_rules();
        let text = chars("-");
        assert!(scan(&set, &text, 0, 0).is_empty());
        assert_eq!(spans(&scan(&set, &text, 0, 1)), vec![(0, 1)]);
    }

    #[test]
    fn window_exactly_covering_one_match() {
        let set = bracket_rules();
        let text = chars("<a>");
        assert_eq!(spans(&scan(&set, &text, 0, text.len())), vec![(0, 3)]);
    }

    #[test]
    fn balanced_nesting_produces_a_tree() {
        let set = bracket_rules();
        let text = chars("<a<b<c>>d>");
        let found = scan(&set, &text, 0, text.len());

        assert_eq!(spans(&found), vec![(0, 10)]);
        assert_eq!(spans(&found[0].children), vec![(2, 6)]);
        assert_eq!(spans(&found[0].children[0].children), vec![(4, 3)]);
    }

    #[test]
    fn sibling_delimiters_stay_flat() {
        let set = bracket_rules();
        let text = chars("<a><b>");
        let found = scan(&set, &text, 0, text.len());

        assert_eq!(spans(&found), vec![(0, 3), (3, 3)]);
        assert!(found[0].children.is_empty());
    }

    #[test]
    fn unbalanced_head_is_rolled_back() {
        let set = bracket_rules();
        let text = chars("a <b c");
        assert!(scan(&set, &text, 0, text.len()).is_empty());

        // A later balanced pair still matches after an earlier orphan head.
        let text = chars("< <b>");
        assert_eq!(spans(&scan(&set, &text, 0, text.len())), vec![(2, 3)]);
    }

    #[test]
    fn orphan_head_keeps_no_partial_children() {
        let set = bracket_rules();
        let text = chars("<a<b>");
        // The outer "<" never closes; the inner pair must surface on its
        // own, not as a child of a half-open match.
        let found = scan(&set, &text, 0, text.len());
        assert_eq!(spans(&found), vec![(2, 3)]);
        assert!(found[0].children.is_empty());
    }

    #[test]
    fn earlier_rules_win_ties() {
        let mut set: RuleSet<()> = RuleSet::new();
        let double = set.push(Rule::new("--").tag(2));
        let single = set.push(Rule::new("-").tag(1));
        set.set_roots(&[double, single]);

        let text = chars("---");
        let found = scan(&set, &text, 0, text.len());
        assert_eq!(spans(&found), vec![(0, 2), (2, 1)]);
        assert_eq!(set[found[0].rule].tag, 2);
        assert_eq!(set[found[1].rule].tag, 1);
    }

    #[test]
    fn once_stops_after_the_first_hit() {
        let mut set: RuleSet<()> = RuleSet::new();
        let dash = set.push(Rule::new("-").flags(RuleFlags::ONCE));
        set.set_roots(&[dash]);

        let text = chars("- - -");
        assert_eq!(spans(&scan(&set, &text, 0, text.len())), vec![(0, 1)]);
    }

    #[test]
    fn ignore_shields_its_span_from_other_rules() {
        let mut set: RuleSet<()> = RuleSet::new();
        let quote_end = set.push(Rule::new("\"").flags(RuleFlags::IGNORE));
        let quote = set.push(Rule::new("\""));
        set.connect(quote, quote_end);
        let dash = set.push(Rule::new("-"));
        set.set_roots(&[quote, dash]);

        let text = chars("\"-\" -");
        let found = scan(&set, &text, 0, text.len());
        // Only the dash outside the ignored quotes is reported.
        assert_eq!(spans(&found), vec![(4, 1)]);
    }

    #[test]
    fn pop_falls_back_to_the_nested_set() {
        let mut set: RuleSet<()> = RuleSet::new();
        let dash = set.push(Rule::new("-"));
        let outer = set.push(Rule::new("=").flags(RuleFlags::POP));
        set.nest(outer, &[dash]);
        set.set_roots(&[outer]);

        let text = chars("a-b");
        assert_eq!(spans(&scan(&set, &text, 0, text.len())), vec![(1, 1)]);

        // With a hit of its own, the outer rule does not fall back.
        let text = chars("a=b-c");
        assert_eq!(spans(&scan(&set, &text, 0, text.len())), vec![(1, 1)]);
    }

    #[test]
    fn probe_matches_variable_width_tokens() {
        fn spaces(text: &[char], at: usize, end: usize) -> Option<usize> {
            let mut cur = at;
            while cur < end && text[cur] == ' ' {
                cur += 1;
            }
            if cur > at { Some(cur - at) } else { None }
        }

        let mut set: RuleSet<()> = RuleSet::new();
        let run = set.push(Rule::probe(spaces));
        set.set_roots(&[run]);

        let text = chars("a   b c");
        assert_eq!(spans(&scan(&set, &text, 0, text.len())), vec![(1, 3), (5, 1)]);
    }

    #[test]
    fn halts_on_self_referential_rules_and_hostile_input() {
        // Self-nested delimiters, a separator, a POP fallback, and input
        // full of half-open heads; the scan must still return.
        let mut set: RuleSet<()> = RuleSet::new();
        let comma = set.push(Rule::new(",").flags(RuleFlags::SPLIT | RuleFlags::TRIM));
        let close = set.push(Rule::new(">"));
        let open = set.push(Rule::new("<").flags(RuleFlags::POP));
        set.connect(open, close);
        set.nest(close, &[open]);
        set.nest(open, &[comma]);
        set.set_roots(&[open]);

        for input in ["<<<<<<<<", ">>>>>>>>", "<>,<,>,<", ",,,,,,,,", "<<a,b><c,"] {
            let text = chars(input);
            let _ = scan(&set, &text, 0, text.len());
        }
    }

    #[test]
    fn matches_stay_ordered_and_disjoint() {
        let set = bracket_rules();
        let text = chars("x<a>y<b<c>>z< <d>");
        let found = scan(&set, &text, 0, text.len());

        let mut last_end = 0;
        for node in &found {
            assert!(node.offset >= last_end, "overlap at {}", node.offset);
            last_end = node.end();
            for child in &node.children {
                assert!(child.offset >= node.offset && child.end() <= node.end());
            }
        }
    }
}
