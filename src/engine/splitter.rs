//! The split pass: separator matches -> per-segment matches.
//!
//! A level that recorded SPLIT-flagged matches is rewritten so the text
//! *between* the separators becomes the matches:
//!
//! ```text
//! input:    a , b , c          separator rule: ","
//! matches:  [ ,(1) ,(5) ]
//! segments: [ a(0..1) b(4..1) c(8..1) ]     (TRIM applied here)
//! ```
//!
//! Matches of non-separator rules become children of the segment being
//! built. Each segment takes the rule of the separator that closed it; the
//! trailing segment inherits the last separator's rule. A separator rule
//! with nested rules has each segment rescanned over its own window, and a
//! GROUPED separator wraps the segments under one synthetic match spanning
//! the whole window.

use super::matcher::{Node, scan_list};
use super::rules::{RuleFlags, RuleId, RuleSet};
use crate::text::soft_trim;

pub(crate) fn split_nodes<C>(items: &mut Vec<Node>, set: &RuleSet<C>, text: &[char], start: usize, end: usize) {
    let drained = std::mem::take(items);

    let mut segments: Vec<Node> = Vec::with_capacity(drained.len() + 1);
    let mut pending: Vec<Node> = Vec::new();
    let mut segment_rule: Option<RuleId> = None;
    let mut offset = start;

    for node in drained {
        if !set[node.rule].flags.contains(RuleFlags::SPLIT) {
            pending.push(node);
            continue;
        }

        let segment_offset = offset;
        let segment_length = node.offset - offset;
        offset = node.end();
        segment_rule = Some(node.rule);

        push_segment(&mut segments, &mut pending, set, text, segment_offset, segment_length, node.rule);
    }

    let Some(rule_id) = segment_rule else {
        // Nothing actually split at this level; put the matches back.
        *items = pending;
        return;
    };

    push_segment(&mut segments, &mut pending, set, text, offset, end - offset, rule_id);

    if set[rule_id].flags.contains(RuleFlags::GROUPED) {
        items.push(Node { offset: start, length: end - start, rule: rule_id, children: segments });
    } else {
        *items = segments;
    }
}

fn push_segment<C>(
    segments: &mut Vec<Node>,
    pending: &mut Vec<Node>,
    set: &RuleSet<C>,
    text: &[char],
    offset: usize,
    length: usize,
    rule_id: RuleId,
) {
    let rule = &set[rule_id];
    let mut offset = offset;
    let mut length = length;

    if rule.flags.contains(RuleFlags::TRIM) {
        soft_trim(text, &mut offset, &mut length);
    }

    if rule.flags.contains(RuleFlags::DROP_EMPTY) && length == 0 {
        // Pending children stay queued for the next kept segment.
        return;
    }

    let children = if rule.nested.is_empty() {
        std::mem::take(pending)
    } else {
        pending.clear();
        scan_list(set, &rule.nested, text, offset, length)
    };

    segments.push(Node { offset, length, rule: rule_id, children });
}
