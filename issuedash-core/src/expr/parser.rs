//! Lexer and recursive-descent parser for the template expression
//! language.
//!
//! The grammar is deliberately small: literals, names, member/index
//! access, helper calls, arithmetic, comparisons, boolean operators, a
//! ternary, and assignment to a path rooted at a mutable binding.
//! Scripts add `let`, `return` and `;`-separated statement sequences.

use crate::error::{Error, Result};
use crate::expr::ast::{BinaryOp, Expr, Stmt, UnaryOp};

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Str(String),
    Ident(String),
    True,
    False,
    Null,
    Let,
    Return,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    AndAnd,
    OrOr,
    Bang,
    Question,
    Colon,
    Assign,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Dot,
    Comma,
    Semi,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Number(n) => format!("number {n}"),
            Token::Str(s) => format!("string '{s}'"),
            Token::Ident(name) => format!("name '{name}'"),
            other => format!("'{}'", other.text()),
        }
    }

    fn text(&self) -> &'static str {
        match self {
            Token::Number(_) | Token::Str(_) | Token::Ident(_) => "",
            Token::True => "true",
            Token::False => "false",
            Token::Null => "null",
            Token::Let => "let",
            Token::Return => "return",
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Star => "*",
            Token::Slash => "/",
            Token::Percent => "%",
            Token::EqEq => "==",
            Token::NotEq => "!=",
            Token::Lt => "<",
            Token::Le => "<=",
            Token::Gt => ">",
            Token::Ge => ">=",
            Token::AndAnd => "&&",
            Token::OrOr => "||",
            Token::Bang => "!",
            Token::Question => "?",
            Token::Colon => ":",
            Token::Assign => "=",
            Token::LParen => "(",
            Token::RParen => ")",
            Token::LBracket => "[",
            Token::RBracket => "]",
            Token::Dot => ".",
            Token::Comma => ",",
            Token::Semi => ";",
        }
    }
}

fn tokenize(src: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let bytes = src.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i] as char;
        match c {
            ' ' | '\t' | '\r' | '\n' => i += 1,
            '0'..='9' => {
                let start = i;
                while i < bytes.len() && bytes[i].is_ascii_digit() {
                    i += 1;
                }
                if i + 1 < bytes.len() && bytes[i] == b'.' && bytes[i + 1].is_ascii_digit() {
                    i += 1;
                    while i < bytes.len() && bytes[i].is_ascii_digit() {
                        i += 1;
                    }
                }
                let number = src[start..i]
                    .parse::<f64>()
                    .map_err(|_| Error::Expr(format!("invalid number '{}'", &src[start..i])))?;
                tokens.push(Token::Number(number));
            }
            '\'' | '"' => {
                let quote = c;
                i += 1;
                let mut text = String::new();
                loop {
                    if i >= bytes.len() {
                        return Err(Error::Expr(format!("unterminated string in '{src}'")));
                    }
                    let ch = src[i..].chars().next().unwrap_or('\0');
                    if ch == quote {
                        i += 1;
                        break;
                    }
                    if ch == '\\' {
                        i += 1;
                        let escaped = src[i..].chars().next().ok_or_else(|| {
                            Error::Expr(format!("unterminated string in '{src}'"))
                        })?;
                        text.push(match escaped {
                            'n' => '\n',
                            't' => '\t',
                            other => other,
                        });
                        i += escaped.len_utf8();
                    } else {
                        text.push(ch);
                        i += ch.len_utf8();
                    }
                }
                tokens.push(Token::Str(text));
            }
            'a'..='z' | 'A'..='Z' | '_' => {
                let start = i;
                while i < bytes.len()
                    && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_')
                {
                    i += 1;
                }
                tokens.push(match &src[start..i] {
                    "true" => Token::True,
                    "false" => Token::False,
                    "null" => Token::Null,
                    "let" => Token::Let,
                    "return" => Token::Return,
                    name => Token::Ident(name.to_string()),
                });
            }
            '+' => {
                tokens.push(Token::Plus);
                i += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            '/' => {
                tokens.push(Token::Slash);
                i += 1;
            }
            '%' => {
                tokens.push(Token::Percent);
                i += 1;
            }
            '=' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    tokens.push(Token::EqEq);
                    i += 2;
                } else {
                    tokens.push(Token::Assign);
                    i += 1;
                }
            }
            '!' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    tokens.push(Token::NotEq);
                    i += 2;
                } else {
                    tokens.push(Token::Bang);
                    i += 1;
                }
            }
            '<' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    tokens.push(Token::Le);
                    i += 2;
                } else {
                    tokens.push(Token::Lt);
                    i += 1;
                }
            }
            '>' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    tokens.push(Token::Ge);
                    i += 2;
                } else {
                    tokens.push(Token::Gt);
                    i += 1;
                }
            }
            '&' => {
                if bytes.get(i + 1) == Some(&b'&') {
                    tokens.push(Token::AndAnd);
                    i += 2;
                } else {
                    return Err(Error::Expr(format!("unexpected '&' in '{src}'")));
                }
            }
            '|' => {
                if bytes.get(i + 1) == Some(&b'|') {
                    tokens.push(Token::OrOr);
                    i += 2;
                } else {
                    return Err(Error::Expr(format!("unexpected '|' in '{src}'")));
                }
            }
            '?' => {
                tokens.push(Token::Question);
                i += 1;
            }
            ':' => {
                tokens.push(Token::Colon);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '[' => {
                tokens.push(Token::LBracket);
                i += 1;
            }
            ']' => {
                tokens.push(Token::RBracket);
                i += 1;
            }
            '.' => {
                tokens.push(Token::Dot);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            ';' => {
                tokens.push(Token::Semi);
                i += 1;
            }
            other => {
                return Err(Error::Expr(format!("unexpected character '{other}' in '{src}'")));
            }
        }
    }

    Ok(tokens)
}

/// Parse a single expression; trailing tokens are an error.
pub fn parse_expression(src: &str) -> Result<Expr> {
    let mut parser = Parser::new(tokenize(src)?);
    let expr = parser.expression()?;
    parser.expect_end()?;
    Ok(expr)
}

/// Parse a `;`-separated script body.
pub fn parse_script(src: &str) -> Result<Vec<Stmt>> {
    let mut parser = Parser::new(tokenize(src)?);
    let mut stmts = Vec::new();

    loop {
        while parser.eat(&Token::Semi) {}
        if parser.at_end() {
            break;
        }
        stmts.push(parser.statement()?);
        if !parser.at_end() && !parser.eat(&Token::Semi) {
            return Err(parser.unexpected("';'"));
        }
    }

    Ok(stmts)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token) -> Result<()> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(self.unexpected(&token.describe()))
        }
    }

    fn expect_end(&self) -> Result<()> {
        match self.peek() {
            None => Ok(()),
            Some(token) => Err(Error::Expr(format!(
                "unexpected {} after expression",
                token.describe()
            ))),
        }
    }

    fn unexpected(&self, wanted: &str) -> Error {
        match self.peek() {
            Some(token) => Error::Expr(format!("expected {wanted}, got {}", token.describe())),
            None => Error::Expr(format!("expected {wanted}, got end of input")),
        }
    }

    fn statement(&mut self) -> Result<Stmt> {
        match self.peek() {
            Some(Token::Let) => {
                self.pos += 1;
                let name = self.ident()?;
                self.expect(&Token::Assign)?;
                Ok(Stmt::Let(name, self.expression()?))
            }
            Some(Token::Return) => {
                self.pos += 1;
                if self.at_end() || self.peek() == Some(&Token::Semi) {
                    Ok(Stmt::Return(None))
                } else {
                    Ok(Stmt::Return(Some(self.expression()?)))
                }
            }
            _ => Ok(Stmt::Expr(self.expression()?)),
        }
    }

    fn ident(&mut self) -> Result<String> {
        match self.advance() {
            Some(Token::Ident(name)) => Ok(name),
            Some(token) => Err(Error::Expr(format!("expected a name, got {}", token.describe()))),
            None => Err(Error::Expr("expected a name, got end of input".to_string())),
        }
    }

    fn expression(&mut self) -> Result<Expr> {
        let lhs = self.ternary()?;
        if self.eat(&Token::Assign) {
            if !is_place(&lhs) {
                return Err(Error::Expr("invalid assignment target".to_string()));
            }
            let rhs = self.expression()?;
            return Ok(Expr::Assign(Box::new(lhs), Box::new(rhs)));
        }
        Ok(lhs)
    }

    fn ternary(&mut self) -> Result<Expr> {
        let cond = self.or()?;
        if self.eat(&Token::Question) {
            let then = self.expression()?;
            self.expect(&Token::Colon)?;
            let otherwise = self.expression()?;
            return Ok(Expr::Ternary(Box::new(cond), Box::new(then), Box::new(otherwise)));
        }
        Ok(cond)
    }

    fn or(&mut self) -> Result<Expr> {
        let mut lhs = self.and()?;
        while self.eat(&Token::OrOr) {
            let rhs = self.and()?;
            lhs = Expr::Binary(BinaryOp::Or, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn and(&mut self) -> Result<Expr> {
        let mut lhs = self.equality()?;
        while self.eat(&Token::AndAnd) {
            let rhs = self.equality()?;
            lhs = Expr::Binary(BinaryOp::And, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn equality(&mut self) -> Result<Expr> {
        let mut lhs = self.comparison()?;
        loop {
            let op = match self.peek() {
                Some(Token::EqEq) => BinaryOp::Eq,
                Some(Token::NotEq) => BinaryOp::Ne,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.comparison()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn comparison(&mut self) -> Result<Expr> {
        let mut lhs = self.additive()?;
        loop {
            let op = match self.peek() {
                Some(Token::Lt) => BinaryOp::Lt,
                Some(Token::Le) => BinaryOp::Le,
                Some(Token::Gt) => BinaryOp::Gt,
                Some(Token::Ge) => BinaryOp::Ge,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.additive()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn additive(&mut self) -> Result<Expr> {
        let mut lhs = self.multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.multiplicative()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn multiplicative(&mut self) -> Result<Expr> {
        let mut lhs = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                Some(Token::Percent) => BinaryOp::Rem,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.unary()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expr> {
        if self.eat(&Token::Minus) {
            return Ok(Expr::Unary(UnaryOp::Neg, Box::new(self.unary()?)));
        }
        if self.eat(&Token::Bang) {
            return Ok(Expr::Unary(UnaryOp::Not, Box::new(self.unary()?)));
        }
        self.postfix()
    }

    fn postfix(&mut self) -> Result<Expr> {
        let mut expr = self.primary()?;

        // helper calls are plain `name(args)`; there are no method calls
        if let Expr::Ident(name) = &expr {
            if self.peek() == Some(&Token::LParen) {
                let name = name.clone();
                self.pos += 1;
                let mut args = Vec::new();
                if !self.eat(&Token::RParen) {
                    loop {
                        args.push(self.expression()?);
                        if self.eat(&Token::RParen) {
                            break;
                        }
                        self.expect(&Token::Comma)?;
                    }
                }
                expr = Expr::Call(name, args);
            }
        }

        loop {
            if self.eat(&Token::Dot) {
                let field = self.ident()?;
                expr = Expr::Member(Box::new(expr), field);
            } else if self.eat(&Token::LBracket) {
                let index = self.expression()?;
                self.expect(&Token::RBracket)?;
                expr = Expr::Index(Box::new(expr), Box::new(index));
            } else {
                break;
            }
        }

        Ok(expr)
    }

    fn primary(&mut self) -> Result<Expr> {
        match self.advance() {
            Some(Token::Number(n)) => Ok(Expr::Number(n)),
            Some(Token::Str(s)) => Ok(Expr::Str(s)),
            Some(Token::True) => Ok(Expr::Bool(true)),
            Some(Token::False) => Ok(Expr::Bool(false)),
            Some(Token::Null) => Ok(Expr::Null),
            Some(Token::Ident(name)) => Ok(Expr::Ident(name)),
            Some(Token::LParen) => {
                let expr = self.expression()?;
                self.expect(&Token::RParen)?;
                Ok(expr)
            }
            Some(token) => Err(Error::Expr(format!(
                "expected an expression, got {}",
                token.describe()
            ))),
            None => Err(Error::Expr("expected an expression, got end of input".to_string())),
        }
    }
}

/// An expression that can appear on the left of `=`: a name, or a
/// member/index path rooted at one.
fn is_place(expr: &Expr) -> bool {
    match expr {
        Expr::Ident(_) => true,
        Expr::Member(base, _) | Expr::Index(base, _) => is_place(base),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arithmetic_precedence() {
        let expr = parse_expression("1 + 2 * 3").expect("parse");
        assert_eq!(
            expr,
            Expr::Binary(
                BinaryOp::Add,
                Box::new(Expr::Number(1.0)),
                Box::new(Expr::Binary(
                    BinaryOp::Mul,
                    Box::new(Expr::Number(2.0)),
                    Box::new(Expr::Number(3.0)),
                )),
            )
        );
    }

    #[test]
    fn test_member_and_index_paths() {
        let expr = parse_expression("item.labels[0].name").expect("parse");
        assert_eq!(
            expr,
            Expr::Member(
                Box::new(Expr::Index(
                    Box::new(Expr::Member(
                        Box::new(Expr::Ident("item".to_string())),
                        "labels".to_string(),
                    )),
                    Box::new(Expr::Number(0.0)),
                )),
                "name".to_string(),
            )
        );
    }

    #[test]
    fn test_call_with_string_argument() {
        let expr = parse_expression("date('-7 days')").expect("parse");
        assert_eq!(
            expr,
            Expr::Call("date".to_string(), vec![Expr::Str("-7 days".to_string())])
        );
    }

    #[test]
    fn test_ternary_and_comparison() {
        let expr = parse_expression("value > 10 ? 'red' : 'green'").expect("parse");
        match expr {
            Expr::Ternary(cond, then, otherwise) => {
                assert!(matches!(*cond, Expr::Binary(BinaryOp::Gt, _, _)));
                assert_eq!(*then, Expr::Str("red".to_string()));
                assert_eq!(*otherwise, Expr::Str("green".to_string()));
            }
            other => panic!("expected ternary, got {other:?}"),
        }
    }

    #[test]
    fn test_assignment_requires_a_place() {
        assert!(parse_expression("userdata.count = 1").is_ok());
        assert!(parse_expression("1 + 1 = 2").is_err());
        assert!(parse_expression("date() = 2").is_err());
    }

    #[test]
    fn test_trailing_tokens_rejected() {
        assert!(parse_expression("1 + 1 extra").is_err());
        assert!(parse_expression("").is_err());
    }

    #[test]
    fn test_script_statements() {
        let stmts = parse_script("let total = 1 + 2; userdata.total = total; return total").expect("parse");
        assert_eq!(stmts.len(), 3);
        assert!(matches!(stmts[0], Stmt::Let(_, _)));
        assert!(matches!(stmts[1], Stmt::Expr(Expr::Assign(_, _))));
        assert!(matches!(stmts[2], Stmt::Return(Some(_))));
    }

    #[test]
    fn test_bare_return() {
        let stmts = parse_script("return").expect("parse");
        assert_eq!(stmts, vec![Stmt::Return(None)]);
        let stmts = parse_script("return;").expect("parse");
        assert_eq!(stmts, vec![Stmt::Return(None)]);
    }

    #[test]
    fn test_string_escapes() {
        let expr = parse_expression(r#"'it\'s' + "a\nb""#).expect("parse");
        assert_eq!(
            expr,
            Expr::Binary(
                BinaryOp::Add,
                Box::new(Expr::Str("it's".to_string())),
                Box::new(Expr::Str("a\nb".to_string())),
            )
        );
    }
}
