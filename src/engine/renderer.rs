//! The rendering pass: match tree + callbacks -> output text.
//!
//! Walks matches in order, copying unmatched text verbatim and replacing
//! each matched span according to its rule:
//!
//! - no parse callback: the rule's literal replacement (or nothing),
//! - callback, no BUBBLE: the callback is handed the whole window and the
//!   node, whose span indexes into it,
//! - callback with BUBBLE: the node's children are rendered first over the
//!   node's own window and the callback is handed that rendered span (or
//!   the raw span when there are no children).
//!
//! Pass-through text and replacement literals enter the output builder as
//! borrowed fragments; callback output is owned. Nothing is copied until
//! the builder ejects.

use super::matcher::Node;
use super::rules::{RuleFlags, RuleSet};
use crate::text::{Buffer, Stream};

/// Render `items` over `text[offset .. offset + limit]` into one buffer.
///
/// `ctx` is handed to every parse callback unchanged. Matches that start
/// before `offset` are skipped; text not covered by a match is emitted
/// verbatim, so a window with no matches renders as itself.
pub fn render<'a, C>(
    set: &'a RuleSet<C>,
    items: &[Node],
    text: &'a [char],
    offset: usize,
    limit: usize,
    ctx: &C,
) -> Buffer {
    let mut out = Stream::new();
    let mut offset = offset;
    let mut limit = limit;

    for node in items {
        if node.offset < offset {
            continue;
        }

        if offset < node.offset {
            let gap = node.offset - offset;
            if gap >= limit {
                break;
            }
            limit -= gap;
            out.push_borrowed(&text[offset..node.offset]);
        }

        offset = node.end();
        limit = limit.saturating_sub(node.length);

        let rule = &set[node.rule];
        match rule.on_parse {
            None => {
                if let Some(replacement) = &rule.replacement {
                    out.push_borrowed(replacement.as_slice());
                }
            }
            Some(callback) => {
                if !rule.flags.contains(RuleFlags::BUBBLE) {
                    out.push_owned(callback(set, text, node, ctx));
                } else if !node.children.is_empty() {
                    let inner = render(set, &node.children, text, node.offset, node.length, ctx);
                    out.push_owned(callback(set, inner.as_slice(), node, ctx));
                } else {
                    out.push_owned(callback(set, &text[node.offset..node.end()], node, ctx));
                }
            }
        }
    }

    if limit != 0 {
        let tail_end = (offset + limit).min(text.len());
        if offset < tail_end {
            out.push_borrowed(&text[offset..tail_end]);
        }
    }

    out.eject()
}

#[cfg(test)]
mod tests {
    use super::super::matcher::{Node, scan};
    use super::super::rules::{Rule, RuleFlags, RuleSet};
    use super::*;

    fn chars(s: &str) -> Vec<char> {
        s.chars().collect()
    }

    fn run(set: &RuleSet<()>, input: &str) -> String {
        let text = chars(input);
        let items = scan(set, &text, 0, text.len());
        render(set, &items, &text, 0, text.len(), &()).to_string()
    }

    #[test]
    fn no_matches_echo_the_window() {
        let mut set: RuleSet<()> = RuleSet::new();
        let dash = set.push(Rule::new("-"));
        set.set_roots(&[dash]);

        assert_eq!(run(&set, "nothing to do"), "nothing to do");
        assert_eq!(run(&set, ""), "");
    }

    #[test]
    fn replaces_every_occurrence() {
        let mut set: RuleSet<()> = RuleSet::new();
        let dash = set.push(Rule::new("-").replace("*"));
        set.set_roots(&[dash]);

        assert_eq!(run(&set, "- - - -"), "* * * *");
        assert_eq!(run(&set, "a-b"), "a*b");
    }

    #[test]
    fn a_match_without_replacement_renders_empty() {
        let mut set: RuleSet<()> = RuleSet::new();
        let dash = set.push(Rule::new("-"));
        set.set_roots(&[dash]);

        assert_eq!(run(&set, "a-b-c"), "abc");
    }

    #[test]
    fn plain_callback_sees_the_whole_window() {
        fn upper(_set: &RuleSet<()>, block: &[char], node: &Node, _ctx: &()) -> Buffer {
            let span = &block[node.offset..node.end()];
            let mut out = Buffer::with_capacity(span.len());
            for c in span {
                out.push(c.to_ascii_uppercase());
            }
            out
        }

        let mut set: RuleSet<()> = RuleSet::new();
        let word = set.push(Rule::new("ab").on_parse(upper));
        set.set_roots(&[word]);

        assert_eq!(run(&set, "x ab y ab"), "x AB y AB");
    }

    #[test]
    fn bubble_identity_callback_is_the_identity() {
        fn identity(_set: &RuleSet<()>, block: &[char], _node: &Node, _ctx: &()) -> Buffer {
            Buffer::from(block)
        }

        let mut set: RuleSet<()> = RuleSet::new();
        let open = set.push(Rule::new("<"));
        let close = set.push(Rule::new(">").flags(RuleFlags::BUBBLE).on_parse(identity));
        set.connect(open, close);
        set.nest(close, &[open]);
        set.set_roots(&[open]);

        assert_eq!(run(&set, "<a<b>c>"), "<a<b>c>");
        assert_eq!(run(&set, "pre <x> post"), "pre <x> post");
    }

    #[test]
    fn bubble_callback_sees_rendered_children() {
        fn wrap(_set: &RuleSet<()>, block: &[char], _node: &Node, _ctx: &()) -> Buffer {
            let mut out = Buffer::with_capacity(block.len());
            out.push('(');
            out.push_slice(&block[1..block.len() - 1]);
            out.push(')');
            out
        }

        let mut set: RuleSet<()> = RuleSet::new();
        let open = set.push(Rule::new("<"));
        let close = set.push(Rule::new(">").flags(RuleFlags::BUBBLE).on_parse(wrap));
        set.connect(open, close);
        set.nest(close, &[open]);
        set.set_roots(&[open]);

        assert_eq!(run(&set, "<a>"), "(a)");
        assert_eq!(run(&set, "<a<b>>"), "(a(b))");
    }
}
