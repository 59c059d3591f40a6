//! Human-readable renderings: result dates, and the token / tree debug views.

use chrono::{NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::ast::Expr;
use crate::code::Spanned;
use crate::lexer::Token;

const INDENT: &str = "  ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DateStyle {
    /// `Saturday, December 25, 2021 at 13:05`
    #[default]
    Full,
    /// `12/25/2021, 13:05`
    Short,
}

/// Date and 24-hour time; the time is left out at exactly midnight.
pub fn format_point_in_time(at: NaiveDateTime, style: DateStyle) -> String {
    let has_time = at.time() != NaiveTime::MIN;
    let pattern = match (style, has_time) {
        (DateStyle::Full, false) => "%A, %B %-d, %Y",
        (DateStyle::Full, true) => "%A, %B %-d, %Y at %H:%M",
        (DateStyle::Short, false) => "%-m/%-d/%Y",
        (DateStyle::Short, true) => "%-m/%-d/%Y, %H:%M",
    };
    at.format(pattern).to_string()
}

/// One `- Token(KIND, value)` line per token.
pub fn format_tokens(tokens: &[Spanned<Token>]) -> String {
    tokens
        .iter()
        .map(|t| format!("- {}", t.value))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Multi-line tree, children one indent level below their parent.
pub fn format_tree(expr: &Expr) -> String {
    let mut out = String::new();
    write_node(&mut out, expr, 0);
    out
}

fn write_indent(out: &mut String, depth: usize) {
    out.push_str(&INDENT.repeat(depth));
}

fn write_node(out: &mut String, expr: &Expr, depth: usize) {
    write_indent(out, depth);
    match expr {
        Expr::Date(_) | Expr::Duration(_) => out.push_str(&expr.to_string()),
        Expr::Plus(left, right) => write_binary(out, "PlusNode", left, right, depth),
        Expr::Minus(left, right) => write_binary(out, "MinusNode", left, right, depth),
        Expr::Cast(inner, unit) => {
            out.push_str("CastNode(\n");
            write_node(out, inner, depth + 1);
            out.push_str(",\n");
            write_indent(out, depth + 1);
            out.push_str(&unit.to_string());
            out.push(')');
        }
    }
}

fn write_binary(out: &mut String, name: &str, left: &Expr, right: &Expr, depth: usize) {
    out.push_str(name);
    out.push_str("(\n");
    write_node(out, left, depth + 1);
    out.push_str(",\n");
    write_node(out, right, depth + 1);
    out.push(')');
}
