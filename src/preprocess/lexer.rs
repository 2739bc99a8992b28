//! Line-level lexing for the preprocessor
//!
//! Turns raw header text into logical lines (backslash continuations spliced,
//! comments removed) and recognises directive lines.

use std::sync::LazyLock;

use regex::Regex;

/// `#  name  args` with the directive name optional (the null directive).
static DIRECTIVE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*#\s*([A-Za-z_][A-Za-z0-9_]*)?\s*(.*?)\s*$").unwrap());

/// `NAME`, `NAME(params)` or `NAME body` at the start of a `#define`.
static DEFINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*)(\(([^)]*)\))?(?:\s*(.*))?$").unwrap()
});

/// A spliced, comment-free source line, numbered by its first physical line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalLine {
    pub line: usize,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Directive<'a> {
    /// Empty for the null directive (`#` alone).
    pub name: &'a str,
    pub args: &'a str,
}

/// Parsed head of a `#define`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefineHead {
    pub name: String,
    pub params: Option<Vec<String>>,
    pub body: String,
}

pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c == '_' || c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}

pub fn logical_lines(text: &str) -> Vec<LogicalLine> {
    let mut spliced: Vec<LogicalLine> = Vec::new();
    let mut pending: Option<LogicalLine> = None;

    for (idx, raw) in text.split('\n').enumerate() {
        let raw = raw.strip_suffix('\r').unwrap_or(raw);
        let (body, continued) = match raw.strip_suffix('\\') {
            Some(body) => (body, true),
            None => (raw, false),
        };
        let current = pending.get_or_insert_with(|| LogicalLine {
            line: idx + 1,
            text: String::new(),
        });
        current.text.push_str(body);
        if !continued {
            if let Some(done) = pending.take() {
                spliced.push(done);
            }
        }
    }
    if let Some(done) = pending.take() {
        spliced.push(done);
    }

    strip_comments(spliced)
}

fn strip_comments(lines: Vec<LogicalLine>) -> Vec<LogicalLine> {
    let mut in_block = false;
    lines
        .into_iter()
        .map(|line| {
            let mut out = String::with_capacity(line.text.len());
            let mut chars = line.text.chars().peekable();
            while let Some(c) = chars.next() {
                if in_block {
                    if c == '*' && chars.peek() == Some(&'/') {
                        chars.next();
                        in_block = false;
                        out.push(' ');
                    }
                    continue;
                }
                match c {
                    '/' if chars.peek() == Some(&'/') => break,
                    '/' if chars.peek() == Some(&'*') => {
                        chars.next();
                        in_block = true;
                    }
                    '\'' if ends_in_pp_number(&out) => out.push(c),
                    '"' | '\'' => {
                        out.push(c);
                        let mut escaped = false;
                        for inner in chars.by_ref() {
                            out.push(inner);
                            if escaped {
                                escaped = false;
                            } else if inner == '\\' {
                                escaped = true;
                            } else if inner == c {
                                break;
                            }
                        }
                    }
                    _ => out.push(c),
                }
            }
            LogicalLine {
                line: line.line,
                text: out,
            }
        })
        .collect()
}

/// True when `out` ends inside a pp-number, where `'` is a digit separator
/// (`1'000`) rather than the start of a character literal (`L'x'`).
fn ends_in_pp_number(out: &str) -> bool {
    out.chars()
        .rev()
        .take_while(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '\''))
        .last()
        .is_some_and(|c| c.is_ascii_digit() || c == '.')
}

pub fn parse_directive(text: &str) -> Option<Directive<'_>> {
    let caps = DIRECTIVE_RE.captures(text)?;
    Some(Directive {
        name: caps.get(1).map_or("", |m| m.as_str()),
        args: caps.get(2).map_or("", |m| m.as_str()),
    })
}

pub fn parse_define(args: &str) -> Option<DefineHead> {
    let caps = DEFINE_RE.captures(args)?;
    let params = caps.get(3).map(|m| {
        m.as_str()
            .split(',')
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect()
    });
    Some(DefineHead {
        name: caps[1].to_string(),
        params,
        body: caps.get(4).map_or("", |m| m.as_str()).trim().to_string(),
    })
}

/// First whitespace-delimited token of a directive argument list.
pub fn first_token(args: &str) -> &str {
    args.split_whitespace().next().unwrap_or("")
}
