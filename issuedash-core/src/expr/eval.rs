//! Scope and tree-walking evaluator for template expressions and
//! scripts.
//!
//! A scope is a flat set of bindings plus the helper-function table.
//! Scripts may additionally introduce `let` locals and assign through
//! paths rooted at a local or at the shared `userdata` value, which is
//! how state flows between the widgets of a dashboard.

use std::collections::BTreeMap;

use crate::dateparse;
use crate::error::{Error, Result};
use crate::expr::ast::{BinaryOp, Expr, Stmt, UnaryOp};
use crate::expr::value::Value;

/// A helper callable from expressions, e.g. `date('-7 days')`.
pub type Helper = fn(&[Value]) -> Result<Value>;

fn helper_date(args: &[Value]) -> Result<Value> {
    let arg = args.first().map(Value::to_display_string);
    Ok(Value::Str(dateparse::date(arg.as_deref())?))
}

fn helper_time(args: &[Value]) -> Result<Value> {
    let arg = args.first().map(Value::to_display_string);
    Ok(Value::Str(dateparse::time(arg.as_deref())?))
}

fn helper_datetime(args: &[Value]) -> Result<Value> {
    let arg = args.first().map(Value::to_display_string);
    Ok(Value::Str(dateparse::datetime(arg.as_deref())?))
}

fn default_helpers() -> BTreeMap<&'static str, Helper> {
    let mut helpers: BTreeMap<&'static str, Helper> = BTreeMap::new();
    helpers.insert("date", helper_date);
    helpers.insert("time", helper_time);
    helpers.insert("datetime", helper_datetime);
    helpers
}

/// The bindings visible to one template or script evaluation.
pub struct Scope<'a> {
    helpers: BTreeMap<&'static str, Helper>,
    vars: BTreeMap<String, Value>,
    locals: BTreeMap<String, Value>,
    userdata: &'a mut Value,
}

impl<'a> Scope<'a> {
    pub fn new(userdata: &'a mut Value) -> Self {
        Self {
            helpers: default_helpers(),
            vars: BTreeMap::new(),
            locals: BTreeMap::new(),
            userdata,
        }
    }

    /// Bind a name for the duration of this scope. Helper names are
    /// reserved and cannot be shadowed.
    pub fn bind(&mut self, name: &str, value: Value) -> Result<()> {
        if self.helpers.contains_key(name) {
            return Err(Error::Config(format!(
                "cannot bind '{name}': the name is a built-in function"
            )));
        }
        self.vars.insert(name.to_string(), value);
        Ok(())
    }

    /// Engine-internal reserved bindings, installed without the helper
    /// collision check.
    pub(crate) fn insert_var(&mut self, name: &str, value: Value) {
        self.vars.insert(name.to_string(), value);
    }

    fn lookup(&self, name: &str) -> Result<Value> {
        if let Some(value) = self.locals.get(name) {
            return Ok(value.clone());
        }
        if let Some(value) = self.vars.get(name) {
            return Ok(value.clone());
        }
        if name == "userdata" {
            return Ok(self.userdata.clone());
        }
        Err(Error::Expr(format!("unknown name '{name}'")))
    }
}

/// Evaluate a single expression against a scope.
pub fn eval_expr(expr: &Expr, scope: &mut Scope<'_>) -> Result<Value> {
    match expr {
        Expr::Null => Ok(Value::Null),
        Expr::Bool(b) => Ok(Value::Bool(*b)),
        Expr::Number(n) => Ok(Value::Number(*n)),
        Expr::Str(s) => Ok(Value::Str(s.clone())),
        Expr::Ident(name) => scope.lookup(name),
        Expr::Member(base, field) => {
            let base = eval_expr(base, scope)?;
            member(&base, field)
        }
        Expr::Index(base, index) => {
            let index = eval_expr(index, scope)?;
            let base = eval_expr(base, scope)?;
            indexed(&base, &index)
        }
        Expr::Call(name, args) => {
            let helper = *scope.helpers.get(name.as_str()).ok_or_else(|| {
                Error::Expr(format!("unknown function '{name}'"))
            })?;
            let mut values = Vec::with_capacity(args.len());
            for arg in args {
                values.push(eval_expr(arg, scope)?);
            }
            helper(&values)
        }
        Expr::Unary(op, operand) => {
            let value = eval_expr(operand, scope)?;
            Ok(match op {
                UnaryOp::Neg => Value::Number(-value.as_number()),
                UnaryOp::Not => Value::Bool(!value.is_truthy()),
            })
        }
        Expr::Binary(op, lhs, rhs) => binary(*op, lhs, rhs, scope),
        Expr::Ternary(cond, then, otherwise) => {
            if eval_expr(cond, scope)?.is_truthy() {
                eval_expr(then, scope)
            } else {
                eval_expr(otherwise, scope)
            }
        }
        Expr::Assign(target, value) => {
            let value = eval_expr(value, scope)?;
            assign(target, value.clone(), scope)?;
            Ok(value)
        }
    }
}

/// Run a script body. The value of the first `return` becomes the
/// script's value; a script that never returns yields null.
pub fn eval_stmts(stmts: &[Stmt], scope: &mut Scope<'_>) -> Result<Value> {
    for stmt in stmts {
        match stmt {
            Stmt::Let(name, expr) => {
                let value = eval_expr(expr, scope)?;
                scope.locals.insert(name.clone(), value);
            }
            Stmt::Expr(expr) => {
                eval_expr(expr, scope)?;
            }
            Stmt::Return(expr) => {
                return match expr {
                    Some(expr) => eval_expr(expr, scope),
                    None => Ok(Value::Null),
                };
            }
        }
    }
    Ok(Value::Null)
}

fn member(base: &Value, field: &str) -> Result<Value> {
    match base {
        Value::Object(map) => Ok(map.get(field).cloned().unwrap_or(Value::Null)),
        Value::Null => Ok(Value::Null),
        other => Err(Error::Expr(format!(
            "cannot read property '{field}' of a {}",
            other.kind()
        ))),
    }
}

fn indexed(base: &Value, index: &Value) -> Result<Value> {
    match base {
        Value::Array(items) => {
            let idx = index.as_number();
            if idx.is_nan() || idx < 0.0 {
                return Ok(Value::Null);
            }
            Ok(items.get(idx as usize).cloned().unwrap_or(Value::Null))
        }
        Value::Object(map) => Ok(map
            .get(index.to_display_string().as_str())
            .cloned()
            .unwrap_or(Value::Null)),
        Value::Null => Ok(Value::Null),
        other => Err(Error::Expr(format!("cannot index a {}", other.kind()))),
    }
}

fn binary(op: BinaryOp, lhs: &Expr, rhs: &Expr, scope: &mut Scope<'_>) -> Result<Value> {
    // short-circuit forms yield the deciding operand, not a boolean
    match op {
        BinaryOp::And => {
            let left = eval_expr(lhs, scope)?;
            if !left.is_truthy() {
                return Ok(left);
            }
            return eval_expr(rhs, scope);
        }
        BinaryOp::Or => {
            let left = eval_expr(lhs, scope)?;
            if left.is_truthy() {
                return Ok(left);
            }
            return eval_expr(rhs, scope);
        }
        _ => {}
    }

    let left = eval_expr(lhs, scope)?;
    let right = eval_expr(rhs, scope)?;

    match op {
        BinaryOp::Add => match (&left, &right) {
            (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
            _ => Ok(Value::Str(format!(
                "{}{}",
                left.to_display_string(),
                right.to_display_string()
            ))),
        },
        BinaryOp::Sub => Ok(Value::Number(left.as_number() - right.as_number())),
        BinaryOp::Mul => Ok(Value::Number(left.as_number() * right.as_number())),
        BinaryOp::Div => Ok(Value::Number(left.as_number() / right.as_number())),
        BinaryOp::Rem => Ok(Value::Number(left.as_number() % right.as_number())),
        BinaryOp::Eq => Ok(Value::Bool(left == right)),
        BinaryOp::Ne => Ok(Value::Bool(left != right)),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            compare(op, &left, &right)
        }
        BinaryOp::And | BinaryOp::Or => unreachable!("handled above"),
    }
}

fn compare(op: BinaryOp, left: &Value, right: &Value) -> Result<Value> {
    let result = match (left, right) {
        (Value::Number(a), Value::Number(b)) => match op {
            BinaryOp::Lt => a < b,
            BinaryOp::Le => a <= b,
            BinaryOp::Gt => a > b,
            _ => a >= b,
        },
        (Value::Str(a), Value::Str(b)) => match op {
            BinaryOp::Lt => a < b,
            BinaryOp::Le => a <= b,
            BinaryOp::Gt => a > b,
            _ => a >= b,
        },
        _ => {
            return Err(Error::Expr(format!(
                "cannot compare a {} with a {}",
                left.kind(),
                right.kind()
            )));
        }
    };
    Ok(Value::Bool(result))
}

// ============================================================
// Assignment
// ============================================================

enum Seg {
    Key(String),
    Computed(Value),
}

fn assign(target: &Expr, value: Value, scope: &mut Scope<'_>) -> Result<()> {
    // index expressions are evaluated before the target is navigated so
    // they cannot observe a partially-updated path
    let mut segs = Vec::new();
    let mut cursor = target;
    let root = loop {
        match cursor {
            Expr::Ident(name) => break name.clone(),
            Expr::Member(base, field) => {
                segs.push(Seg::Key(field.clone()));
                cursor = base;
            }
            Expr::Index(base, index) => {
                segs.push(Seg::Computed(eval_expr(index, scope)?));
                cursor = base;
            }
            _ => return Err(Error::Expr("invalid assignment target".to_string())),
        }
    };
    segs.reverse();

    if root == "userdata" {
        return set_path(scope.userdata, &segs, value);
    }
    match scope.locals.get_mut(&root) {
        Some(local) => set_path(local, &segs, value),
        None => Err(Error::Expr(format!("cannot assign to '{root}'"))),
    }
}

fn set_path(root: &mut Value, segs: &[Seg], value: Value) -> Result<()> {
    let Some((last, init)) = segs.split_last() else {
        *root = value;
        return Ok(());
    };

    let mut cursor = root;
    for seg in init {
        cursor = descend(cursor, seg)?;
    }
    set_leaf(cursor, last, value)
}

fn descend<'v>(cursor: &'v mut Value, seg: &Seg) -> Result<&'v mut Value> {
    match (cursor, seg) {
        (Value::Object(map), Seg::Key(key)) => map
            .get_mut(key)
            .ok_or_else(|| Error::Expr(format!("cannot assign through missing property '{key}'"))),
        (Value::Object(map), Seg::Computed(key)) => {
            let key = key.to_display_string();
            map.get_mut(&key).ok_or_else(|| {
                Error::Expr(format!("cannot assign through missing property '{key}'"))
            })
        }
        (Value::Array(items), Seg::Computed(index)) => {
            let idx = index.as_number();
            if idx.is_nan() || idx < 0.0 || idx as usize >= items.len() {
                return Err(Error::Expr(format!(
                    "array index {} out of bounds",
                    index.to_display_string()
                )));
            }
            Ok(&mut items[idx as usize])
        }
        (other, _) => Err(Error::Expr(format!(
            "cannot assign through a {}",
            other.kind()
        ))),
    }
}

fn set_leaf(cursor: &mut Value, seg: &Seg, value: Value) -> Result<()> {
    match (cursor, seg) {
        (Value::Object(map), Seg::Key(key)) => {
            map.insert(key.clone(), value);
            Ok(())
        }
        (Value::Object(map), Seg::Computed(key)) => {
            map.insert(key.to_display_string(), value);
            Ok(())
        }
        (Value::Array(items), Seg::Computed(index)) => {
            let idx = index.as_number();
            if idx.is_nan() || idx < 0.0 {
                return Err(Error::Expr(format!(
                    "array index {} out of bounds",
                    index.to_display_string()
                )));
            }
            let idx = idx as usize;
            if idx < items.len() {
                items[idx] = value;
            } else if idx == items.len() {
                items.push(value);
            } else {
                return Err(Error::Expr(format!("array index {idx} out of bounds")));
            }
            Ok(())
        }
        (other, _) => Err(Error::Expr(format!(
            "cannot assign into a {}",
            other.kind()
        ))),
    }
}
