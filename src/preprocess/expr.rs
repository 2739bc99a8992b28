//! `#if` / `#elif` expression evaluation
//!
//! Expressions are parsed into a small AST first so that `&&`, `||` and `?:`
//! short-circuit the way a C preprocessor does (`0 && 1/0` is valid).
//!
//! Identifiers evaluate to the value of an object-like macro when its body is
//! itself a valid expression, otherwise to 0. A macro is never expanded inside
//! its own expansion, so `#define errno errno` leaves `errno` at 0.
//! Function-like macro invocations (including `__has_include(...)`) evaluate
//! to 0; their arguments are skipped as raw text, so header names and string
//! literals may appear there.

use std::collections::BTreeMap;

use thiserror::Error;

use super::MacroDef;

/// Macro bodies referencing other macros are followed at most this deep.
const MAX_EXPANSION_DEPTH: usize = 64;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExprError {
    #[error("empty expression")]
    Empty,
    #[error("unexpected token `{0}`")]
    UnexpectedToken(String),
    #[error("unexpected end of expression")]
    UnexpectedEnd,
    #[error("invalid integer literal `{0}`")]
    InvalidNumber(String),
    #[error("`defined` requires a macro name")]
    DefinedWithoutName,
    #[error("division by zero")]
    DivisionByZero,
    #[error("macro expansion nested deeper than {0} levels")]
    TooDeep(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Num(i64),
    Ident(String),
    /// `name(...)` with the argument text already skipped.
    Call(String),
    Punct(&'static str),
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Num(n) => write!(f, "{}", n),
            Token::Ident(s) => write!(f, "{}", s),
            Token::Call(s) => write!(f, "{}(...)", s),
            Token::Punct(p) => write!(f, "{}", p),
        }
    }
}

/// Longest punctuators first so `<<` wins over `<`.
const PUNCTUATORS: &[&str] = &[
    "<<", ">>", "<=", ">=", "==", "!=", "&&", "||", "!", "~", "*", "/", "%", "+", "-", "<", ">",
    "&", "^", "|", "?", ":", "(", ")", ",",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UnaryOp {
    Not,
    Neg,
    Plus,
    BitNot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinaryOp {
    Mul,
    Div,
    Rem,
    Add,
    Sub,
    Shl,
    Shr,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    BitAnd,
    BitXor,
    BitOr,
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Expr {
    Num(i64),
    Defined(String),
    Ident(String),
    Call(String),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Conditional(Box<Expr>, Box<Expr>, Box<Expr>),
}

/// Evaluate a conditional-directive expression against the current macro table.
pub fn evaluate(text: &str, macros: &BTreeMap<String, MacroDef>) -> Result<bool, ExprError> {
    Ok(evaluate_value(text, macros, &mut Vec::new())? != 0)
}

/// `expanding` holds the macros whose bodies are currently being evaluated.
fn evaluate_value(
    text: &str,
    macros: &BTreeMap<String, MacroDef>,
    expanding: &mut Vec<String>,
) -> Result<i64, ExprError> {
    if expanding.len() > MAX_EXPANSION_DEPTH {
        return Err(ExprError::TooDeep(MAX_EXPANSION_DEPTH));
    }
    let tokens = tokenize(text)?;
    if tokens.is_empty() {
        return Err(ExprError::Empty);
    }
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.conditional()?;
    if let Some(extra) = parser.peek() {
        return Err(ExprError::UnexpectedToken(extra.to_string()));
    }
    eval(&expr, macros, expanding)
}

fn tokenize(text: &str) -> Result<Vec<Token>, ExprError> {
    let mut tokens = Vec::new();
    let bytes = text.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i] as char;
        if c.is_ascii_whitespace() {
            i += 1;
        } else if c.is_ascii_digit() {
            let start = i;
            while i < bytes.len() && (bytes[i] as char).is_ascii_alphanumeric() {
                i += 1;
            }
            tokens.push(Token::Num(parse_number(&text[start..i])?));
        } else if c == '_' || c.is_ascii_alphabetic() {
            let start = i;
            while i < bytes.len() && (bytes[i] == b'_' || bytes[i].is_ascii_alphanumeric()) {
                i += 1;
            }
            let name = text[start..i].to_string();
            let after = i + text[i..].len() - text[i..].trim_start().len();
            if name != "defined" && text[after..].starts_with('(') {
                i = after + call_arguments_len(&text[after..])?;
                tokens.push(Token::Call(name));
            } else {
                tokens.push(Token::Ident(name));
            }
        } else if c == '\'' {
            let (value, len) = parse_char_literal(&text[i..])?;
            tokens.push(Token::Num(value));
            i += len;
        } else {
            let rest = &text[i..];
            let punct = PUNCTUATORS
                .iter()
                .find(|p| rest.starts_with(**p))
                .ok_or_else(|| {
                    ExprError::UnexpectedToken(rest.chars().next().unwrap_or(c).to_string())
                })?;
            tokens.push(Token::Punct(*punct));
            i += punct.len();
        }
    }

    Ok(tokens)
}

/// Length of a parenthesised argument list starting at `(`, string and
/// character literals included.
fn call_arguments_len(rest: &str) -> Result<usize, ExprError> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (idx, c) in rest.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(idx + 1);
                }
            }
            _ => {}
        }
    }
    Err(ExprError::UnexpectedEnd)
}

fn parse_number(literal: &str) -> Result<i64, ExprError> {
    let digits = literal.trim_end_matches(['u', 'U', 'l', 'L']);
    let parsed = if let Some(hex) = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        u64::from_str_radix(hex, 16)
    } else if digits.len() > 1 && digits.starts_with('0') {
        u64::from_str_radix(&digits[1..], 8)
    } else {
        digits.parse::<u64>()
    };
    parsed
        .map(|v| v as i64)
        .map_err(|_| ExprError::InvalidNumber(literal.to_string()))
}

fn parse_char_literal(rest: &str) -> Result<(i64, usize), ExprError> {
    let mut chars = rest.char_indices().skip(1);
    let (value, mut end) = match chars.next() {
        Some((_, '\\')) => {
            let (idx, escaped) = chars.next().ok_or(ExprError::UnexpectedEnd)?;
            let value = match escaped {
                'n' => '\n' as i64,
                't' => '\t' as i64,
                'r' => '\r' as i64,
                '0' => 0,
                other => other as i64,
            };
            (value, idx + escaped.len_utf8())
        }
        Some((idx, c)) if c != '\'' => (c as i64, idx + c.len_utf8()),
        _ => return Err(ExprError::UnexpectedToken("'".to_string())),
    };
    if !rest[end..].starts_with('\'') {
        return Err(ExprError::UnexpectedToken(rest.to_string()));
    }
    end += 1;
    Ok((value, end))
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn eat(&mut self, punct: &str) -> bool {
        if matches!(self.peek(), Some(Token::Punct(p)) if *p == punct) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, punct: &str) -> Result<(), ExprError> {
        if self.eat(punct) {
            return Ok(());
        }
        match self.peek() {
            Some(token) => Err(ExprError::UnexpectedToken(token.to_string())),
            None => Err(ExprError::UnexpectedEnd),
        }
    }

    fn conditional(&mut self) -> Result<Expr, ExprError> {
        let cond = self.binary(0)?;
        if self.eat("?") {
            let then = self.conditional()?;
            self.expect(":")?;
            let otherwise = self.conditional()?;
            return Ok(Expr::Conditional(
                Box::new(cond),
                Box::new(then),
                Box::new(otherwise),
            ));
        }
        Ok(cond)
    }

    /// Precedence climbing over the binary operator table, loosest first.
    fn binary(&mut self, level: usize) -> Result<Expr, ExprError> {
        const LEVELS: &[&[(&str, BinaryOp)]] = &[
            &[("||", BinaryOp::Or)],
            &[("&&", BinaryOp::And)],
            &[("|", BinaryOp::BitOr)],
            &[("^", BinaryOp::BitXor)],
            &[("&", BinaryOp::BitAnd)],
            &[("==", BinaryOp::Eq), ("!=", BinaryOp::Ne)],
            &[
                ("<", BinaryOp::Lt),
                ("<=", BinaryOp::Le),
                (">", BinaryOp::Gt),
                (">=", BinaryOp::Ge),
            ],
            &[("<<", BinaryOp::Shl), (">>", BinaryOp::Shr)],
            &[("+", BinaryOp::Add), ("-", BinaryOp::Sub)],
            &[
                ("*", BinaryOp::Mul),
                ("/", BinaryOp::Div),
                ("%", BinaryOp::Rem),
            ],
        ];

        if level == LEVELS.len() {
            return self.unary();
        }

        let mut lhs = self.binary(level + 1)?;
        loop {
            let op = match self.peek() {
                Some(Token::Punct(p)) => LEVELS[level]
                    .iter()
                    .find(|(sym, _)| sym == p)
                    .map(|(_, op)| *op),
                _ => None,
            };
            let Some(op) = op else {
                return Ok(lhs);
            };
            self.pos += 1;
            let rhs = self.binary(level + 1)?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn unary(&mut self) -> Result<Expr, ExprError> {
        let op = match self.peek() {
            Some(Token::Punct("!")) => Some(UnaryOp::Not),
            Some(Token::Punct("-")) => Some(UnaryOp::Neg),
            Some(Token::Punct("+")) => Some(UnaryOp::Plus),
            Some(Token::Punct("~")) => Some(UnaryOp::BitNot),
            _ => None,
        };
        if let Some(op) = op {
            self.pos += 1;
            return Ok(Expr::Unary(op, Box::new(self.unary()?)));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Expr, ExprError> {
        match self.next() {
            Some(Token::Num(n)) => Ok(Expr::Num(n)),
            Some(Token::Ident(name)) if name == "defined" => self.defined(),
            Some(Token::Ident(name)) => Ok(Expr::Ident(name)),
            Some(Token::Call(name)) => Ok(Expr::Call(name)),
            Some(Token::Punct("(")) => {
                let inner = self.conditional()?;
                self.expect(")")?;
                Ok(inner)
            }
            Some(token) => Err(ExprError::UnexpectedToken(token.to_string())),
            None => Err(ExprError::UnexpectedEnd),
        }
    }

    fn defined(&mut self) -> Result<Expr, ExprError> {
        let parenthesised = self.eat("(");
        let name = match self.next() {
            Some(Token::Ident(name)) => name,
            _ => return Err(ExprError::DefinedWithoutName),
        };
        if parenthesised {
            self.expect(")")?;
        }
        Ok(Expr::Defined(name))
    }
}

fn eval(
    expr: &Expr,
    macros: &BTreeMap<String, MacroDef>,
    expanding: &mut Vec<String>,
) -> Result<i64, ExprError> {
    let value = match expr {
        Expr::Num(n) => *n,
        Expr::Defined(name) => i64::from(macros.contains_key(name)),
        Expr::Ident(name) => identifier_value(name, macros, expanding)?,
        Expr::Call(_) => 0,
        Expr::Unary(op, inner) => {
            let v = eval(inner, macros, expanding)?;
            match op {
                UnaryOp::Not => i64::from(v == 0),
                UnaryOp::Neg => v.wrapping_neg(),
                UnaryOp::Plus => v,
                UnaryOp::BitNot => !v,
            }
        }
        Expr::Binary(BinaryOp::And, lhs, rhs) => {
            i64::from(eval(lhs, macros, expanding)? != 0 && eval(rhs, macros, expanding)? != 0)
        }
        Expr::Binary(BinaryOp::Or, lhs, rhs) => {
            i64::from(eval(lhs, macros, expanding)? != 0 || eval(rhs, macros, expanding)? != 0)
        }
        Expr::Binary(op, lhs, rhs) => {
            let l = eval(lhs, macros, expanding)?;
            let r = eval(rhs, macros, expanding)?;
            match op {
                BinaryOp::Mul => l.wrapping_mul(r),
                BinaryOp::Div if r == 0 => return Err(ExprError::DivisionByZero),
                BinaryOp::Div => l.wrapping_div(r),
                BinaryOp::Rem if r == 0 => return Err(ExprError::DivisionByZero),
                BinaryOp::Rem => l.wrapping_rem(r),
                BinaryOp::Add => l.wrapping_add(r),
                BinaryOp::Sub => l.wrapping_sub(r),
                BinaryOp::Shl => l.wrapping_shl(r as u32),
                BinaryOp::Shr => l.wrapping_shr(r as u32),
                BinaryOp::Lt => i64::from(l < r),
                BinaryOp::Le => i64::from(l <= r),
                BinaryOp::Gt => i64::from(l > r),
                BinaryOp::Ge => i64::from(l >= r),
                BinaryOp::Eq => i64::from(l == r),
                BinaryOp::Ne => i64::from(l != r),
                BinaryOp::BitAnd => l & r,
                BinaryOp::BitXor => l ^ r,
                BinaryOp::BitOr => l | r,
                BinaryOp::And | BinaryOp::Or => unreachable!("handled above"),
            }
        }
        Expr::Conditional(cond, then, otherwise) => {
            if eval(cond, macros, expanding)? != 0 {
                eval(then, macros, expanding)?
            } else {
                eval(otherwise, macros, expanding)?
            }
        }
    };
    Ok(value)
}

fn identifier_value(
    name: &str,
    macros: &BTreeMap<String, MacroDef>,
    expanding: &mut Vec<String>,
) -> Result<i64, ExprError> {
    match name {
        "true" => return Ok(1),
        "false" => return Ok(0),
        _ => {}
    }
    let Some(def) = macros.get(name) else {
        return Ok(0);
    };
    if def.params.is_some() || def.body.trim().is_empty() || expanding.iter().any(|n| n == name) {
        return Ok(0);
    }
    expanding.push(name.to_string());
    let result = evaluate_value(&def.body, macros, expanding);
    expanding.pop();
    match result {
        Ok(value) => Ok(value),
        Err(ExprError::TooDeep(limit)) => Err(ExprError::TooDeep(limit)),
        // Bodies that are not arithmetic (types, strings) do not take part in #if.
        Err(_) => Ok(0),
    }
}
