//! The template expression language: `{{ ... }}` placeholders in
//! configuration strings, and multi-statement scripts for computed
//! widgets.

mod ast;
mod eval;
mod parser;
mod template;
mod value;

pub use eval::Scope;
pub use template::{render_template, run_script};
pub use value::{coerce_number, Value};
