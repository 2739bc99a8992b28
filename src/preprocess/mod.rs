//! Header preprocessing
//!
//! Builds the [`TranslationUnit`] a consumer would see after including every
//! header of the public aggregate, in order, into one compilation unit. Only
//! the parts of the C preprocessor that decide *which macros are visible* are
//! modelled:
//!
//! - `#include "…"` / `#include <…>` resolution against the include path
//! - `#define` / `#undef` / `#pragma once`
//! - `#if` / `#ifdef` / `#ifndef` / `#elif` / `#else` / `#endif`
//! - `#error` (a build failure) and `#warning` (logged)
//!
//! Angle-bracket includes that do not resolve against the include path are
//! treated as system headers and skipped. Unresolved quoted includes are a
//! build failure, as they would be for a real compiler.

pub mod expr;
pub mod lexer;
pub mod source;

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::aggregate::PublicHeaderAggregate;
use crate::error::{ConfigError, ProbeError};
use lexer::{first_token, is_identifier, logical_lines, parse_define, parse_directive, Directive};
pub use source::{normalize, FsSource, HeaderSource, InjectedSource, MemorySource};

pub const DEFAULT_MAX_INCLUDE_DEPTH: usize = 200;

/// File name used for macros seeded from the command line or manifest.
pub const COMMAND_LINE: &str = "<command line>";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceLocation {
    pub file: String,
    pub line: usize,
}

impl SourceLocation {
    pub fn new(file: impl Into<String>, line: usize) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }
}

impl std::fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.line > 0 {
            write!(f, "{}:{}", self.file, self.line)
        } else {
            write!(f, "{}", self.file)
        }
    }
}

/// A visible macro and where it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MacroDef {
    pub name: String,
    /// Parameter list for function-like macros.
    pub params: Option<Vec<String>>,
    pub body: String,
    pub defined_at: SourceLocation,
    /// Headers from the aggregate root down to the defining header.
    pub include_chain: Vec<String>,
}

/// A predefined macro, `NAME` or `NAME=VALUE` (as `-D` on a compiler).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Define {
    pub name: String,
    pub value: String,
}

impl Define {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Parse `NAME` (value `1`) or `NAME=VALUE`.
    pub fn parse(arg: &str) -> Result<Self, ConfigError> {
        let (name, value) = match arg.split_once('=') {
            Some((name, value)) => (name.trim(), value.trim()),
            None => (arg.trim(), "1"),
        };
        if !is_identifier(name) {
            return Err(ConfigError::InvalidDefine(arg.to_string()));
        }
        Ok(Self::new(name, value))
    }
}

impl std::str::FromStr for Define {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreprocessOptions {
    pub defines: Vec<Define>,
    pub max_include_depth: usize,
}

impl Default for PreprocessOptions {
    fn default() -> Self {
        Self {
            defines: Vec::new(),
            max_include_depth: DEFAULT_MAX_INCLUDE_DEPTH,
        }
    }
}

/// The macro table and include graph left after preprocessing the aggregate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranslationUnit {
    macros: BTreeMap<String, MacroDef>,
    headers: Vec<String>,
    system_headers: BTreeSet<String>,
}

impl TranslationUnit {
    pub fn is_defined(&self, name: &str) -> bool {
        self.macros.contains_key(name)
    }

    pub fn definition(&self, name: &str) -> Option<&MacroDef> {
        self.macros.get(name)
    }

    pub fn macros(&self) -> impl Iterator<Item = &MacroDef> {
        self.macros.values()
    }

    /// Every header read, in first-inclusion order.
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Angle-bracket includes that were not found on the include path.
    pub fn system_headers(&self) -> &BTreeSet<String> {
        &self.system_headers
    }
}

/// Resolve a header identifier against the include path only.
pub fn locate_header<S: HeaderSource + ?Sized>(
    source: &S,
    include_dirs: &[PathBuf],
    header: &str,
) -> Option<PathBuf> {
    include_dirs
        .iter()
        .map(|dir| normalize(&dir.join(header)))
        .find(|candidate| source.exists(candidate))
}

/// Preprocess every header of `aggregate`, in order, as one translation unit.
pub fn preprocess<S: HeaderSource + ?Sized>(
    aggregate: &PublicHeaderAggregate,
    source: &S,
    options: &PreprocessOptions,
) -> Result<TranslationUnit, ProbeError> {
    let mut pp = Preprocessor::new(source, aggregate.include_dirs(), options);

    for header in aggregate.headers() {
        let path = locate_header(source, &pp.include_dirs, header).ok_or_else(|| {
            ProbeError::PublicHeaderNotFound {
                header: header.clone(),
            }
        })?;
        debug!("Preprocessing public header {}", header);
        pp.process_file(&path, 0)?;
    }

    debug!(
        "Translation unit built: {} headers, {} macros, {} system headers skipped",
        pp.unit.headers.len(),
        pp.unit.macros.len(),
        pp.unit.system_headers.len()
    );
    Ok(pp.unit)
}

#[derive(Debug)]
struct CondFrame {
    parent_active: bool,
    active: bool,
    /// Some branch of this group has already been selected.
    taken: bool,
    seen_else: bool,
    opened_at: usize,
}

struct Preprocessor<'a, S: ?Sized> {
    source: &'a S,
    include_dirs: Vec<PathBuf>,
    max_depth: usize,
    once: HashSet<PathBuf>,
    chain: Vec<String>,
    unit: TranslationUnit,
}

impl<'a, S: HeaderSource + ?Sized> Preprocessor<'a, S> {
    fn new(source: &'a S, include_dirs: &[PathBuf], options: &PreprocessOptions) -> Self {
        let mut unit = TranslationUnit::default();
        for define in &options.defines {
            unit.macros.insert(
                define.name.clone(),
                MacroDef {
                    name: define.name.clone(),
                    params: None,
                    body: define.value.clone(),
                    defined_at: SourceLocation::new(COMMAND_LINE, 0),
                    include_chain: Vec::new(),
                },
            );
        }
        Self {
            source,
            include_dirs: include_dirs.iter().map(|d| normalize(d)).collect(),
            max_depth: options.max_include_depth,
            once: HashSet::new(),
            chain: Vec::new(),
            unit,
        }
    }

    fn display_name(&self, path: &Path) -> String {
        self.include_dirs
            .iter()
            .find_map(|dir| path.strip_prefix(dir).ok())
            .unwrap_or(path)
            .to_string_lossy()
            .into_owned()
    }

    fn process_file(&mut self, path: &Path, depth: usize) -> Result<(), ProbeError> {
        if self.once.contains(path) {
            trace!("Skipping {} (#pragma once)", path.display());
            return Ok(());
        }

        let file = self.display_name(path);
        let text = self.source.read(path)?;
        if !self.unit.headers.contains(&file) {
            self.unit.headers.push(file.clone());
        }

        self.chain.push(file.clone());
        let result = self.process_text(path, &file, &text, depth);
        self.chain.pop();
        result
    }

    fn process_text(
        &mut self,
        path: &Path,
        file: &str,
        text: &str,
        depth: usize,
    ) -> Result<(), ProbeError> {
        let mut conds: Vec<CondFrame> = Vec::new();

        for logical in logical_lines(text) {
            let Some(directive) = parse_directive(&logical.text) else {
                continue;
            };
            let line = logical.line;
            let active = conds.last().map_or(true, |frame| frame.active);

            match directive.name {
                "if" | "ifdef" | "ifndef" => {
                    let value = if active {
                        self.condition(directive, file, line)?
                    } else {
                        false
                    };
                    conds.push(CondFrame {
                        parent_active: active,
                        active: value,
                        taken: value || !active,
                        seen_else: false,
                        opened_at: line,
                    });
                }
                "elif" => {
                    let frame = conds
                        .last_mut()
                        .ok_or_else(|| unmatched(file, line, "elif"))?;
                    if frame.seen_else {
                        return Err(malformed(file, line, "elif", "#elif after #else"));
                    }
                    if frame.parent_active && !frame.taken {
                        let value = self.condition(directive, file, line)?;
                        frame.active = value;
                        frame.taken = value;
                    } else {
                        frame.active = false;
                    }
                }
                "else" => {
                    let frame = conds
                        .last_mut()
                        .ok_or_else(|| unmatched(file, line, "else"))?;
                    if frame.seen_else {
                        return Err(malformed(file, line, "else", "duplicate #else"));
                    }
                    frame.active = frame.parent_active && !frame.taken;
                    frame.taken = true;
                    frame.seen_else = true;
                }
                "endif" => {
                    conds
                        .pop()
                        .ok_or_else(|| unmatched(file, line, "endif"))?;
                }
                _ if !active => {}
                "include" | "include_next" => {
                    self.include(directive, path, file, line, depth)?;
                }
                "define" => self.define(directive.args, file, line)?,
                "undef" => {
                    let name = first_token(directive.args);
                    if !is_identifier(name) {
                        return Err(malformed(file, line, "undef", "expected macro name"));
                    }
                    if self.unit.macros.remove(name).is_some() {
                        trace!("{}:{}: #undef {}", file, line, name);
                    }
                }
                "pragma" => {
                    if first_token(directive.args) == "once" {
                        self.once.insert(path.to_path_buf());
                    }
                }
                "error" => {
                    return Err(ProbeError::ErrorDirective {
                        file: file.to_string(),
                        line,
                        message: directive.args.to_string(),
                    });
                }
                "warning" => warn!("{}:{}: #warning {}", file, line, directive.args),
                // #line, #ident, the null directive and compiler-specific extensions
                // have no effect on macro visibility.
                _ => {}
            }
        }

        if let Some(frame) = conds.last() {
            return Err(ProbeError::UnterminatedConditional {
                file: file.to_string(),
                line: frame.opened_at,
            });
        }
        Ok(())
    }

    fn condition(
        &self,
        directive: Directive<'_>,
        file: &str,
        line: usize,
    ) -> Result<bool, ProbeError> {
        match directive.name {
            "ifdef" | "ifndef" => {
                let name = first_token(directive.args);
                if !is_identifier(name) {
                    return Err(malformed(
                        file,
                        line,
                        directive.name,
                        "expected macro name",
                    ));
                }
                let defined = self.unit.macros.contains_key(name);
                Ok(if directive.name == "ifdef" {
                    defined
                } else {
                    !defined
                })
            }
            _ => expr::evaluate(directive.args, &self.unit.macros).map_err(|e| {
                ProbeError::InvalidExpression {
                    file: file.to_string(),
                    line,
                    message: e.to_string(),
                }
            }),
        }
    }

    fn include(
        &mut self,
        directive: Directive<'_>,
        path: &Path,
        file: &str,
        line: usize,
        depth: usize,
    ) -> Result<(), ProbeError> {
        let (target, quoted) = self
            .include_target(directive.args)
            .ok_or_else(|| malformed(file, line, directive.name, "expected \"file\" or <file>"))?;

        if depth + 1 > self.max_depth {
            return Err(ProbeError::IncludeDepthExceeded {
                file: file.to_string(),
                line,
                limit: self.max_depth,
            });
        }

        let local = if quoted {
            path.parent()
                .map(|dir| normalize(&dir.join(&target)))
                .filter(|candidate| self.source.exists(candidate))
        } else {
            None
        };
        let resolved = local.or_else(|| locate_header(self.source, &self.include_dirs, &target));

        match resolved {
            Some(next) => {
                trace!("{}:{}: #include {}", file, line, next.display());
                self.process_file(&next, depth + 1)
            }
            None if quoted => Err(ProbeError::HeaderNotFound {
                file: file.to_string(),
                line,
                target,
            }),
            None => {
                debug!("{}:{}: <{}> not on include path, treated as system header", file, line, target);
                self.unit.system_headers.insert(target);
                Ok(())
            }
        }
    }

    /// `"file"`, `<file>`, or a macro expanding to one of those.
    fn include_target(&self, args: &str) -> Option<(String, bool)> {
        if let Some(rest) = args.strip_prefix('"') {
            let end = rest.find('"')?;
            return Some((rest[..end].to_string(), true));
        }
        if let Some(rest) = args.strip_prefix('<') {
            let end = rest.find('>')?;
            return Some((rest[..end].to_string(), false));
        }
        let name = first_token(args);
        let def = self.unit.macros.get(name).filter(|d| d.params.is_none())?;
        let body = def.body.trim();
        if body.starts_with('"') || body.starts_with('<') {
            self.include_target(body)
        } else {
            None
        }
    }

    fn define(&mut self, args: &str, file: &str, line: usize) -> Result<(), ProbeError> {
        let head =
            parse_define(args).ok_or_else(|| malformed(file, line, "define", "expected macro name"))?;
        trace!("{}:{}: #define {}", file, line, head.name);
        self.unit.macros.insert(
            head.name.clone(),
            MacroDef {
                name: head.name,
                params: head.params,
                body: head.body,
                defined_at: SourceLocation::new(file, line),
                include_chain: self.chain.clone(),
            },
        );
        Ok(())
    }
}

fn malformed(file: &str, line: usize, directive: &str, message: &str) -> ProbeError {
    ProbeError::MalformedDirective {
        file: file.to_string(),
        line,
        directive: directive.to_string(),
        message: message.to_string(),
    }
}

fn unmatched(file: &str, line: usize, directive: &str) -> ProbeError {
    ProbeError::UnmatchedConditional {
        file: file.to_string(),
        line,
        directive: directive.to_string(),
    }
}
