//! Arithmetic and logic evaluation over the engine.
//!
//! The evaluator is two rule tables and a handful of callbacks:
//!
//! - a parenthesis table: `(` ... `)`, self-nested, whose BUBBLE callback
//!   evaluates the innermost groups first,
//! - an operator table in four tiers chained through POP fallbacks:
//!
//! ```text
//! && ||  ──POP──►  == = != <= < >= >  ──POP──►  + -  ──POP──►  ^ % / *
//! ```
//!
//! Every operator rule carries SPLIT | GROUPED | TRIM, so a tier turns
//! `3 + 9 - 1` into one grouped match whose children are the operand
//! segments; each segment remembers the operator that closed it, which is
//! how the callbacks walk `operand op operand op ...` left to right.
//!
//! Failures are soft throughout: an operand that does not parse counts as
//! zero, and division by zero, modulo by zero, or a non-positive exponent
//! short-circuit to the literal `"0"` so comparisons downstream keep
//! working.

use once_cell::sync::Lazy;

use crate::engine::{self, Node, Rule, RuleFlags, RuleSet};
use crate::text::{Buffer, number, soft_trim};

const OP_MUL: u16 = 1;
const OP_DIV: u16 = 2;
const OP_POW: u16 = 3;
const OP_REM: u16 = 4;

const OP_ADD: u16 = 1;
const OP_SUB: u16 = 2;

const CMP_EQ2: u16 = 1;
const CMP_EQ: u16 = 2;
const CMP_NE: u16 = 3;
const CMP_LE: u16 = 4;
const CMP_LT: u16 = 5;
const CMP_GE: u16 = 6;
const CMP_GT: u16 = 7;

const LOGIC_AND: u16 = 1;
const LOGIC_OR: u16 = 2;

static OPERATORS: Lazy<RuleSet<()>> = Lazy::new(operator_rules);
static PARENS: Lazy<RuleSet<()>> = Lazy::new(paren_rules);

fn operator_rules() -> RuleSet<()> {
    let flat = RuleFlags::SPLIT | RuleFlags::GROUPED | RuleFlags::TRIM;
    let popping = flat | RuleFlags::POP;

    let mut set = RuleSet::new();

    let mul = set.push(Rule::new("*").tag(OP_MUL).flags(flat).on_parse(multiplication));
    let div = set.push(Rule::new("/").tag(OP_DIV).flags(flat).on_parse(multiplication));
    let pow = set.push(Rule::new("^").tag(OP_POW).flags(flat).on_parse(multiplication));
    let rem = set.push(Rule::new("%").tag(OP_REM).flags(flat).on_parse(multiplication));

    let add = set.push(Rule::new("+").tag(OP_ADD).flags(popping).on_parse(addition));
    let sub = set.push(Rule::new("-").tag(OP_SUB).flags(flat).on_parse(addition));
    set.nest(add, &[pow, rem, div, mul]);
    set.nest(sub, &[pow, rem, div, mul]);

    let eq2 = set.push(Rule::new("==").tag(CMP_EQ2).flags(popping).on_parse(comparison));
    let eq = set.push(Rule::new("=").tag(CMP_EQ).flags(popping).on_parse(comparison));
    let ne = set.push(Rule::new("!=").tag(CMP_NE).flags(flat).on_parse(comparison));
    let le = set.push(Rule::new("<=").tag(CMP_LE).flags(flat).on_parse(comparison));
    let lt = set.push(Rule::new("<").tag(CMP_LT).flags(flat).on_parse(comparison));
    let ge = set.push(Rule::new(">=").tag(CMP_GE).flags(flat).on_parse(comparison));
    let gt = set.push(Rule::new(">").tag(CMP_GT).flags(flat).on_parse(comparison));
    for cmp in [eq2, eq, ne, le, lt, ge, gt] {
        set.nest(cmp, &[add, sub]);
    }

    let and = set.push(Rule::new("&&").tag(LOGIC_AND).flags(popping).on_parse(logic));
    let or = set.push(Rule::new("||").tag(LOGIC_OR).flags(flat).on_parse(logic));
    set.nest(and, &[eq2, eq, ne, le, lt, ge, gt]);
    set.nest(or, &[eq2, eq, ne, le, lt, ge, gt]);

    set.set_roots(&[and, or]);
    set
}

fn paren_rules() -> RuleSet<()> {
    let mut set = RuleSet::new();
    let open = set.push(Rule::new("("));
    let close = set.push(Rule::new(")").flags(RuleFlags::BUBBLE).on_parse(parenthesis));
    set.connect(open, close);
    set.nest(close, &[open]);
    set.set_roots(&[open]);
    set
}

fn zero() -> Buffer {
    Buffer::from("0")
}

/// Innermost groups arrive here with nested groups already evaluated;
/// strip the delimiters and run the operator tiers on what is left.
fn parenthesis(_rules: &RuleSet<()>, block: &[char], _node: &Node, _ctx: &()) -> Buffer {
    let mut offset = 1;
    let mut limit = block.len().saturating_sub(2);
    soft_trim(block, &mut offset, &mut limit);

    let items = engine::scan(&OPERATORS, block, offset, limit);
    engine::render(&OPERATORS, &items, block, offset, limit, &())
}

/// Evaluate a segment that contains a nested (already matched) tier.
fn nested_number(rules: &RuleSet<()>, block: &[char], node: &Node) -> f64 {
    let rendered = engine::render(rules, &node.children, block, node.offset, node.length, &());
    number::parse_f64(rendered.as_slice(), 0, rendered.len()).unwrap_or(0.0)
}

fn segment_number(rules: &RuleSet<()>, block: &[char], node: &Node) -> f64 {
    if node.children.is_empty() {
        number::parse_f64(block, node.offset, node.length).unwrap_or(0.0)
    } else {
        nested_number(rules, block, node)
    }
}

fn multiplication(rules: &RuleSet<()>, block: &[char], node: &Node, _ctx: &()) -> Buffer {
    let segments = &node.children;
    let Some(first) = segments.first() else {
        return zero();
    };

    let mut value = number::parse_f64(block, first.offset, first.length).unwrap_or(0.0);
    let mut op = rules[first.rule].tag;

    for segment in &segments[1..] {
        if segment.length == 0 {
            return zero();
        }

        let operand = number::parse_f64(block, segment.offset, segment.length).unwrap_or(0.0);

        match op {
            OP_MUL => value *= operand,
            OP_DIV => {
                if operand == 0.0 {
                    return zero();
                }
                value /= operand;
            }
            OP_POW => {
                if operand <= 0.0 {
                    return zero();
                }
                value = value.powf(operand);
            }
            OP_REM => {
                if operand as i64 == 0 {
                    return zero();
                }
                value = ((value as i64) % (operand as i64)) as f64;
            }
            _ => value = 0.0,
        }

        op = rules[segment.rule].tag;
    }

    number::format_f64(value, 1, 0, 3)
}

fn addition(rules: &RuleSet<()>, block: &[char], node: &Node, _ctx: &()) -> Buffer {
    let segments = &node.children;
    let Some(first) = segments.first() else {
        return zero();
    };

    let mut value = segment_number(rules, block, first);
    let mut op = rules[first.rule].tag;

    for segment in &segments[1..] {
        if segment.length != 0 {
            let operand = segment_number(rules, block, segment);

            match op {
                OP_ADD => value += operand,
                OP_SUB => value -= operand,
                _ => value = 0.0,
            }

            op = rules[segment.rule].tag;
        } else if op == OP_SUB && rules[segment.rule].tag == OP_SUB {
            // "--" between operands reads as addition.
            op = OP_ADD;
        } else {
            op = rules[segment.rule].tag;
        }
    }

    number::format_f64(value, 1, 0, 3)
}

fn comparison(rules: &RuleSet<()>, block: &[char], node: &Node, _ctx: &()) -> Buffer {
    let segments = &node.children;
    let Some(first) = segments.first() else {
        return zero();
    };

    let mut op = rules[first.rule].tag;
    let mut value = 0.0;

    if !first.children.is_empty() {
        value = nested_number(rules, block, first);
    } else {
        let leading = block.get(first.offset).copied().unwrap_or('\0');
        if leading.is_ascii_digit() || leading == '+' || leading == '-' {
            value = number::parse_f64(block, first.offset, first.length).unwrap_or(0.0);
        } else if segments.len() == 2 {
            // Two non-numeric operands: compare the raw spans.
            let second = &segments[1];
            let left = &block[first.offset..first.end()];
            let right = &block[second.offset..second.end()];
            let equal = left == right;
            let hold = match op {
                CMP_NE => !equal,
                _ => equal,
            };
            return Buffer::from(if hold { "1" } else { "0" });
        }
    }

    for segment in &segments[1..] {
        if segment.length != 0 {
            let operand = segment_number(rules, block, segment);

            let hold = match op {
                CMP_EQ2 | CMP_EQ => value == operand,
                CMP_NE => value != operand,
                CMP_LE => value <= operand,
                CMP_LT => value < operand,
                CMP_GE => value >= operand,
                CMP_GT => value > operand,
                _ => false,
            };
            value = if hold { 1.0 } else { 0.0 };
        }

        op = rules[segment.rule].tag;
    }

    number::format_f64(value, 1, 0, 3)
}

fn logic(rules: &RuleSet<()>, block: &[char], node: &Node, _ctx: &()) -> Buffer {
    let segments = &node.children;
    let Some(first) = segments.first() else {
        return zero();
    };

    let mut value = segment_number(rules, block, first);
    let mut op = rules[first.rule].tag;

    for segment in &segments[1..] {
        if segment.length != 0 {
            let operand = segment_number(rules, block, segment);

            let hold = match op {
                LOGIC_AND => value > 0.0 && operand > 0.0,
                LOGIC_OR => value > 0.0 || operand > 0.0,
                _ => false,
            };
            value = if hold { 1.0 } else { 0.0 };
        }

        op = rules[segment.rule].tag;
    }

    number::format_f64(value, 1, 0, 3)
}

/// Evaluate `text[offset .. offset + limit]`.
///
/// Runs the parenthesis pass, then the operator tiers, then parses the
/// result; anything that fails along the way evaluates to `0.0`.
pub fn evaluate_span(text: &[char], offset: usize, limit: usize) -> f64 {
    let items = engine::scan(&PARENS, text, offset, limit);
    let flattened = engine::render(&PARENS, &items, text, offset, limit, &());

    if flattened.is_empty() || flattened == "0" {
        return 0.0;
    }

    let items = engine::scan(&OPERATORS, flattened.as_slice(), 0, flattened.len());
    let result = engine::render(&OPERATORS, &items, flattened.as_slice(), 0, flattened.len(), &());

    if result.is_empty() {
        return 0.0;
    }

    number::parse_f64(result.as_slice(), 0, result.len()).unwrap_or(0.0)
}

/// Evaluate an expression given as a string slice.
pub fn evaluate(expression: &str) -> f64 {
    let text: Vec<char> = expression.chars().collect();
    evaluate_span(&text, 0, text.len())
}
