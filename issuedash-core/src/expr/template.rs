//! Template strings: literal text with `{{ ... }}` placeholders.
//!
//! A string without placeholders passes through untouched, so plain
//! configuration values never pay for parsing. Each placeholder is
//! parsed and evaluated independently, left to right, and its display
//! form is spliced into the output.

use crate::error::Result;
use crate::expr::eval::{self, Scope};
use crate::expr::parser;
use crate::expr::value::Value;

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

/// Resolve a template string against a scope.
pub fn render_template(raw: &str, scope: &mut Scope<'_>) -> Result<String> {
    if !raw.contains(OPEN) {
        return Ok(raw.to_string());
    }

    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;

    while let Some(start) = rest.find(OPEN) {
        out.push_str(&rest[..start]);
        let after_open = &rest[start + OPEN.len()..];
        let Some(end) = after_open.find(CLOSE) else {
            // an unterminated opener is literal text
            out.push_str(&rest[start..]);
            return Ok(out);
        };
        let expr = parser::parse_expression(&after_open[..end])?;
        let value = eval::eval_expr(&expr, scope)?;
        out.push_str(&value.to_display_string());
        rest = &after_open[end + CLOSE.len()..];
    }
    out.push_str(rest);

    Ok(out)
}

/// Run a script body and produce its value.
pub fn run_script(src: &str, scope: &mut Scope<'_>) -> Result<Value> {
    let stmts = parser::parse_script(src)?;
    eval::eval_stmts(&stmts, scope)
}
