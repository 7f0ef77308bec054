//! Syntax tree for the template expression language.

/// A parsed expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Null,
    Bool(bool),
    Number(f64),
    Str(String),
    /// A bare name, resolved against the scope's bindings.
    Ident(String),
    /// Property access: `item.title`
    Member(Box<Expr>, String),
    /// Index access: `labels[0]`
    Index(Box<Expr>, Box<Expr>),
    /// Helper call: `date('-7 days')`
    Call(String, Vec<Expr>),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    /// `cond ? then : else`
    Ternary(Box<Expr>, Box<Expr>, Box<Expr>),
    /// Assignment to a path rooted at a mutable binding:
    /// `userdata.count = userdata.count + 1`
    Assign(Box<Expr>, Box<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

/// A statement in a script body.
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// `let name = expr`
    Let(String, Expr),
    /// A bare expression evaluated for its side effects.
    Expr(Expr),
    /// `return expr?` — produces the script's value.
    Return(Option<Expr>),
}
