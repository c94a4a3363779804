//! String-level convenience API.
//!
//! The engine itself works on `&[char]` windows; these wrappers accept
//! string slices, run the appropriate pipeline, and hand back owned
//! `String`s. Library users with custom rule tables go through
//! [`rewrite`]; the evaluator and template renderer have dedicated entry
//! points.

use crate::document::Document;
use crate::engine::{self, RuleSet};
use crate::eval;
use crate::template;
use crate::text::number;

/// Evaluate an arithmetic/logic expression.
///
/// # Example
/// ```
/// assert_eq!(tessella::evaluate("3 + 4 * 2"), 11.0);
/// ```
pub fn evaluate(expression: &str) -> f64 {
    eval::evaluate(expression)
}

/// Evaluate an expression and format the result with up to three fraction
/// digits, the way the template `{math:}` tag does.
pub fn evaluate_to_string(expression: &str) -> String {
    number::format_f64(eval::evaluate(expression), 1, 0, 3).to_string()
}

/// Render a template against a document.
///
/// # Example
/// ```
/// let data = tessella::Document::from_json(r#"{"name": "world"}"#);
/// assert_eq!(tessella::render_template("hello {v:name}", &data), "hello world");
/// ```
pub fn render_template(content: &str, data: &Document) -> String {
    template::render(content, data)
}

/// Scan `content` with a caller-built rule set and render the result.
///
/// `ctx` is whatever the set's parse callbacks expect; rule sets without
/// callbacks take `&()`.
pub fn rewrite<C>(rules: &RuleSet<C>, content: &str, ctx: &C) -> String {
    let text: Vec<char> = content.chars().collect();
    let items = engine::scan(rules, &text, 0, text.len());
    engine::render(rules, &items, &text, 0, text.len(), ctx).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Node, Rule, RuleFlags};
    use crate::text::Buffer;

    #[test]
    fn literal_replacement_end_to_end() {
        let mut set: RuleSet<()> = RuleSet::new();
        let dash = set.push(Rule::new("-").replace("*"));
        set.set_roots(&[dash]);

        assert_eq!(rewrite(&set, "- - - -", &()), "* * * *");
    }

    #[test]
    fn no_matches_echo_the_input() {
        let mut set: RuleSet<()> = RuleSet::new();
        let dash = set.push(Rule::new("-").replace("*"));
        set.set_roots(&[dash]);

        assert_eq!(rewrite(&set, "untouched", &()), "untouched");
    }

    #[test]
    fn nested_delimiters_end_to_end() {
        fn wrap(_rules: &RuleSet<()>, block: &[char], _node: &Node, _ctx: &()) -> Buffer {
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

        assert_eq!(
            rewrite(&set, "<0><<<1-0-0><1-0-1><1-0-2>><1-1>><2>", &()),
            "(0)(((1-0-0)(1-0-1)(1-0-2))(1-1))(2)"
        );
    }

    #[test]
    fn evaluator_end_to_end() {
        assert_eq!(evaluate("(((2*(1*3))+1-4)+(((10-5)-6+((1+1)+(1+1)))*(8/4+1))-(1)-(-1)+2)"), 14.0);
        assert_eq!(evaluate_to_string("(((2*(1*3))+1-4)+(((10-5)-6+((1+1)+(1+1)))*(8/4+1))-(1)-(-1)+2)"), "14");
        assert_eq!(evaluate_to_string("3+9-1--1+2==14"), "1");
    }

    #[test]
    fn template_end_to_end() {
        let data = Document::from_json(r#"{"strings": ["N1", "N2", "N3"]}"#);
        let rendered = render_template(r#"<loop set="strings" value="v" key="k">k:v;</loop>"#, &data);
        assert_eq!(rendered, "0:N1;1:N2;2:N3;");
    }

    #[test]
    fn documents_build_up_and_render() {
        let mut numbers = Document::from_json("[1,1,2]");
        numbers.merge(&Document::from_json("[3,4]"));
        numbers.set_index_f64(0, 0.0);

        let mut data = Document::new();
        data.set_document("numbers", numbers);
        data.merge(&Document::from_json_with_comments(r#"{"strings": {"a": "A" /* , "z": "Z" */, "b": "B"}}"#));

        assert_eq!(data.to_json(), r#"{"numbers":[0,1,2,3,4],"strings":{"a":"A","b":"B"}}"#);

        let template = concat!(
            r#"<loop set="numbers" value="n">n </loop>| "#,
            r#"<loop set="strings" value="v" key="k">k=v </loop>| "#,
            r#"{iif case="{v:numbers[4]} == 4" true="{v:strings[a]}" false="?"}"#,
        );
        assert_eq!(render_template(template, &data), "0 1 2 3 4 | a=A b=B | A");
    }
}
