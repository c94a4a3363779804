//! HTML-like template rendering over the engine.
//!
//! The template language is one rule table (`{v:}`, `{math:}`, `{iif}`,
//! `<if>`, `<loop>`) plus two small helper tables:
//!
//! - quoted attribute values (`"..."`) for picking apart tag heads,
//! - a generic `<` ... `>` head matcher (ONCE, quotes nested so a `>`
//!   inside an attribute does not close the tag).
//!
//! Attributes are recognized the cheap way the tag grammar allows: by the
//! letter just before the opening quote (`case`/`true`/`false` end in
//! `a`/`r`/`l`, `set`/`value`/`key` in `t`/`e`/`y`), so their order inside
//! the tag does not matter.
//!
//! `<if>` bodies are split by `<else/>` / `<elseif case=".."/>` separators;
//! a "shallow" `<if>`...`</if>` rule shields inner blocks so their
//! branches cannot split the outer block. `<loop>` matches its body once
//! and re-renders it per entry through a per-iteration substitution
//! context.

use once_cell::sync::Lazy;

use crate::document::Document;
use crate::engine::{self, Node, Rule, RuleFlags, RuleSet};
use crate::eval;
use crate::text::{Buffer, Stream, number};

static ALL_TAGS: Lazy<RuleSet<Document>> = Lazy::new(template_tags);
static VAR_TAGS: Lazy<RuleSet<Document>> = Lazy::new(variable_tags);
static QUOTE_TAGS: Lazy<RuleSet<Document>> = Lazy::new(quote_tags);
static HEAD_TAGS: Lazy<RuleSet<Document>> = Lazy::new(head_tags);

fn template_tags() -> RuleSet<Document> {
    let mut set = RuleSet::new();

    // {v:name}
    let var = set.push(Rule::new("{v:"));
    let var_end = set.push(Rule::new("}").on_parse(render_variable));
    set.connect(var, var_end);

    // {math: 1 + 2}
    let math = set.push(Rule::new("{math:"));
    let math_end = set.push(Rule::new("}").flags(RuleFlags::BUBBLE).on_parse(render_math));
    set.connect(math, math_end);
    set.nest(math_end, &[var]);

    // {iif case="..." true="..." false="..."}
    let iif = set.push(Rule::new("{iif"));
    let iif_end = set.push(Rule::new("}").flags(RuleFlags::BUBBLE).on_parse(render_inline_if));
    set.connect(iif, iif_end);
    set.nest(iif_end, &[iif, var]);

    // <else /> and <elseif case="..." /> split an <if> body.
    let branch = set.push(Rule::new("<else"));
    let branch_end = set.push(Rule::new("/>").flags(RuleFlags::SPLIT));
    set.connect(branch, branch_end);

    // Shallow <if>: recognized so inner blocks are skipped whole, never
    // evaluated from the outer level.
    let shallow_if = set.push(Rule::new("<if"));
    let shallow_if_end = set.push(Rule::new("</if>"));
    set.connect(shallow_if, shallow_if_end);
    set.nest(shallow_if_end, &[shallow_if]);

    // <if case="...">...</if>
    let tag_if = set.push(Rule::new("<if"));
    let tag_if_end = set.push(Rule::new("</if>").on_parse(render_if));
    set.connect(tag_if, tag_if_end);
    set.nest(tag_if_end, &[shallow_if, branch]);

    // <loop set="..." value="..." key="...">...</loop>
    let tag_loop = set.push(Rule::new("<loop"));
    let tag_loop_end = set.push(Rule::new("</loop>").on_parse(render_loop));
    set.connect(tag_loop, tag_loop_end);
    set.nest(tag_loop_end, &[tag_loop]);

    set.set_roots(&[var, math, iif, tag_if, tag_loop]);
    set
}

fn variable_tags() -> RuleSet<Document> {
    let mut set = RuleSet::new();
    let var = set.push(Rule::new("{v:"));
    let var_end = set.push(Rule::new("}").on_parse(render_variable));
    set.connect(var, var_end);
    set.set_roots(&[var]);
    set
}

fn quote_tags() -> RuleSet<Document> {
    let mut set = RuleSet::new();
    let quote = set.push(Rule::new("\""));
    let quote_end = set.push(Rule::new("\""));
    set.connect(quote, quote_end);
    set.set_roots(&[quote]);
    set
}

fn head_tags() -> RuleSet<Document> {
    let mut set = RuleSet::new();
    let quote = set.push(Rule::new("\""));
    let quote_end = set.push(Rule::new("\""));
    set.connect(quote, quote_end);

    let head = set.push(Rule::new("<"));
    let head_end = set.push(Rule::new(">").flags(RuleFlags::ONCE));
    set.connect(head, head_end);
    set.nest(head_end, &[quote]);

    set.set_roots(&[head]);
    set
}

/// Render a template against a document.
pub fn render(content: &str, data: &Document) -> String {
    let text: Vec<char> = content.chars().collect();
    render_span(&text, 0, text.len(), data).to_string()
}

pub(crate) fn render_span(text: &[char], offset: usize, limit: usize, data: &Document) -> Buffer {
    let items = engine::scan(&ALL_TAGS, text, offset, limit);
    engine::render(&ALL_TAGS, &items, text, offset, limit, data)
}

// e.g. {v:name}, {v:numbers[3]}, {v:set[inner][0]}
fn render_variable(_rules: &RuleSet<Document>, block: &[char], node: &Node, data: &Document) -> Buffer {
    let offset = node.offset + 3;
    let limit = node.length.saturating_sub(4);

    match data.get_string_span(block, offset, limit) {
        Some(value) => value,
        // Unknown keys keep their text so the reader can see what is missing.
        None => Buffer::part(block, offset, limit),
    }
}

fn render_math(_rules: &RuleSet<Document>, block: &[char], _node: &Node, _data: &Document) -> Buffer {
    number::format_f64(eval::evaluate_span(block, 6, block.len().saturating_sub(7)), 1, 0, 3)
}

// e.g. {iif case="{v:count} == 5" true="five" false="not five"}
fn render_inline_if(_rules: &RuleSet<Document>, block: &[char], _node: &Node, _data: &Document) -> Buffer {
    let attrs = engine::scan(&QUOTE_TAGS, block, 0, block.len());

    let mut case_holds = false;
    let mut on_true: Option<(usize, usize)> = None;
    let mut on_false: Option<(usize, usize)> = None;

    for attr in &attrs {
        if attr.offset <= 5 || attr.length < 2 {
            continue;
        }

        let mut at = attr.offset - 3;
        while at != 0 {
            at -= 1;
            match block[at] {
                'a' => {
                    case_holds = eval::evaluate_span(block, attr.offset + 1, attr.length - 2) > 0.0;
                    break;
                }
                'r' => {
                    on_true = Some((attr.offset + 1, attr.length - 2));
                    break;
                }
                'l' => {
                    on_false = Some((attr.offset + 1, attr.length - 2));
                    break;
                }
                _ => {}
            }
        }
    }

    match if case_holds { on_true } else { on_false } {
        Some((offset, limit)) => Buffer::part(block, offset, limit),
        None => Buffer::new(),
    }
}

/// Evaluate a `case="..."` attribute: variables first, then the evaluator.
fn condition_holds(block: &[char], attr: &Node, data: &Document) -> bool {
    let offset = attr.offset + 1;
    let limit = attr.length.saturating_sub(2);

    let items = engine::scan(&VAR_TAGS, block, offset, limit);
    let content = engine::render(&VAR_TAGS, &items, block, offset, limit, data);

    eval::evaluate_span(content.as_slice(), 0, content.len()) > 0.0
}

// e.g. <if case="{v:a} == 1">yes<elseif case="{v:a} == 2" />maybe<else />no</if>
fn render_if(rules: &RuleSet<Document>, block: &[char], node: &Node, data: &Document) -> Buffer {
    let heads = engine::scan(&HEAD_TAGS, block, node.offset, node.length);
    let Some(head) = heads.first() else {
        return Buffer::new();
    };
    let Some(case_attr) = head.children.first() else {
        return Buffer::new();
    };

    let mut holds = condition_holds(block, case_attr, data);

    // Inner content between the opening tag and </if>.
    let mut offset = head.end();
    let mut limit = node.length.saturating_sub(head.length + 5);

    let split = node.children.first().is_some_and(|child| rules[child.rule].flags.contains(RuleFlags::SPLIT));
    if split {
        let segments = &node.children;
        let first = &segments[0];

        if holds {
            limit = first.end().saturating_sub(offset);
        } else {
            let mut separator_start = first.end();

            for segment in &segments[1..] {
                // The separator tag sits between the previous segment and
                // this one; <elseif .../> carries a condition, <else /> does
                // not.
                let separator = engine::scan(&HEAD_TAGS, block, separator_start, segment.offset - separator_start);
                let passes = match separator.first() {
                    Some(tag) => match tag.children.first() {
                        Some(attr) => condition_holds(block, attr, data),
                        None => true,
                    },
                    None => false,
                };

                offset = segment.offset;
                limit = segment.length;
                separator_start = segment.end();

                if passes {
                    holds = true;
                    break;
                }
            }
        }
    }

    if holds { render_span(block, offset, limit, data) } else { Buffer::new() }
}

/// Per-iteration substitution values for a loop body.
struct LoopCx {
    key: Buffer,
    value: Buffer,
}

fn loop_key(_rules: &RuleSet<LoopCx>, _block: &[char], _node: &Node, ctx: &LoopCx) -> Buffer {
    ctx.key.clone()
}

fn loop_value(_rules: &RuleSet<LoopCx>, _block: &[char], _node: &Node, ctx: &LoopCx) -> Buffer {
    ctx.value.clone()
}

// e.g. <loop set="strings" value="v" key="k">k: v</loop>
fn render_loop(_rules: &RuleSet<Document>, block: &[char], node: &Node, data: &Document) -> Buffer {
    let heads = engine::scan(&HEAD_TAGS, block, node.offset, node.length);
    let Some(head) = heads.first() else {
        return Buffer::new();
    };
    if head.children.is_empty() {
        return Buffer::new();
    }

    let mut storage: Option<&Document> = None;
    let mut value_name: Option<(usize, usize)> = None;
    let mut key_name: Option<(usize, usize)> = None;

    for attr in &head.children {
        if attr.offset <= 5 || attr.length < 2 {
            continue;
        }

        let mut at = attr.offset - 1;
        while at > node.offset {
            at -= 1;
            match block[at] {
                't' => {
                    storage = data.get_document_span(block, attr.offset + 1, attr.length - 2);
                    break;
                }
                'e' => {
                    value_name = Some((attr.offset + 1, attr.length - 2));
                    break;
                }
                'y' => {
                    key_name = Some((attr.offset + 1, attr.length - 2));
                    break;
                }
                _ => {}
            }
        }
    }

    let (Some(storage), Some(value_name)) = (storage, value_name) else {
        return Buffer::new();
    };

    let body_offset = head.end();
    let body_limit = node.length.saturating_sub(head.length + 7);
    let repeated = repeat_body(block, body_offset, body_limit, key_name, value_name, storage);

    render_span(repeated.as_slice(), 0, repeated.len(), data)
}

fn repeat_body(
    block: &[char],
    offset: usize,
    limit: usize,
    key_name: Option<(usize, usize)>,
    value_name: (usize, usize),
    storage: &Document,
) -> Buffer {
    let mut set: RuleSet<LoopCx> = RuleSet::new();
    let mut roots = Vec::with_capacity(2);

    if let Some((key_offset, key_limit)) = key_name {
        let rule = set.push(Rule::new_span(&block[key_offset..key_offset + key_limit]).on_parse(loop_key));
        roots.push(rule);
    }
    let rule = set.push(Rule::new_span(&block[value_name.0..value_name.0 + value_name.1]).on_parse(loop_value));
    roots.push(rule);
    set.set_roots(&roots);

    // One scan of the body serves every iteration; only the context varies.
    let items = engine::scan(&set, block, offset, limit);

    let mut out = Stream::new();
    for index in 0..storage.len() {
        let Some(entry) = storage.entry_at(index) else {
            continue;
        };
        let Some(value) = storage.entry_text(entry) else {
            continue;
        };

        let key = match key_name {
            None => Buffer::new(),
            Some(_) if storage.is_ordered() => number::format_u64(index as u64, 1),
            Some(_) => storage.key_text(entry).cloned().unwrap_or_default(),
        };

        let ctx = LoopCx { key, value };
        out.push_owned(engine::render(&set, &items, block, offset, limit, &ctx));
    }

    out.eject()
}
