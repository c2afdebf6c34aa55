//! C-style preprocessing for WGSL kernel sources.
//!
//! WGSL has no preprocessor, but kernels declare their tunables with
//! `#ifndef NAME / #define NAME default / #endif` blocks and receive overrides
//! as `-D NAME=VALUE` flags. This module resolves those directives into plain
//! WGSL:
//!
//! - `#ifdef`, `#ifndef`, `#else`, `#endif` select regions
//! - `#define NAME value` and `#undef NAME` edit the macro table
//! - `#error text` aborts with `text`
//! - defined names are substituted as whole identifiers, recursively
//! - comments in macro bodies are dropped before the body is stored
//!
//! Directive lines and inactive lines become empty lines, so line numbers in
//! the output match the input and compiler diagnostics stay meaningful.
//! Multiple sources are joined with a newline and share one macro table.

use std::collections::{HashMap, HashSet};
use std::fmt;

/// Preprocessed WGSL plus non-fatal diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct Preprocessed {
    pub source: String,
    pub warnings: Vec<String>,
}

/// Position of a line in the input: source index (0-based), line (1-based).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Location {
    pub source: usize,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PreprocessError {
    pub message: String,
    pub location: Option<Location>,
}

impl PreprocessError {
    fn at(location: Location, message: impl Into<String>) -> Self {
        Self { message: message.into(), location: Some(location) }
    }

    fn global(message: impl Into<String>) -> Self {
        Self { message: message.into(), location: None }
    }
}

impl fmt::Display for PreprocessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.location {
            Some(Location { source, line }) => {
                write!(f, "source {source}, line {line}: {}", self.message)
            }
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for PreprocessError {}

/// Parses a compiler option string of `-D NAME=VALUE` / `-DNAME=VALUE`
/// flags. A flag without `=` defines `NAME` as `1`.
pub fn parse_define_flags(flags: &str) -> Result<Vec<(String, String)>, PreprocessError> {
    let mut defines = Vec::new();
    let mut tokens = flags.split_whitespace();
    while let Some(token) = tokens.next() {
        let define = match token.strip_prefix("-D") {
            Some("") => tokens
                .next()
                .ok_or_else(|| PreprocessError::global("`-D` without a definition"))?,
            Some(inline) => inline,
            None => {
                return Err(PreprocessError::global(format!(
                    "unsupported compiler option `{token}`"
                )))
            }
        };
        let (name, value) = define.split_once('=').unwrap_or((define, "1"));
        if !is_identifier(name) {
            return Err(PreprocessError::global(format!("`{name}` is not a valid macro name")));
        }
        defines.push((name.to_string(), value.to_string()));
    }
    Ok(defines)
}

/// Resolves directives in `sources` with `defines` predefined.
pub fn preprocess<S: AsRef<str>>(
    sources: &[S],
    defines: &[(String, String)],
) -> Result<Preprocessed, PreprocessError> {
    let mut state = State::new(defines);
    let mut out = String::new();

    for (index, source) in sources.iter().enumerate() {
        if index > 0 {
            out.push('\n');
        }
        for (n, line) in source.as_ref().lines().enumerate() {
            if n > 0 {
                out.push('\n');
            }
            let at = Location { source: index, line: n + 1 };
            if let Some(directive) = line.trim_start().strip_prefix('#') {
                state.directive(directive, at)?;
            } else if state.active() {
                out.push_str(&state.expand_line(line));
            }
        }
    }

    if let Some(open) = state.stack.last() {
        return Err(PreprocessError::at(open.opened_at, "unterminated conditional"));
    }

    let mut warnings = state.warnings;
    for (name, _) in defines {
        if !state.used.contains(name) {
            warnings.push(format!("-D {name} is not referenced by the kernel source"));
        }
    }
    Ok(Preprocessed { source: out, warnings })
}

struct Frame {
    parent_active: bool,
    active: bool,
    /// Some branch of this conditional has already been selected.
    taken: bool,
    seen_else: bool,
    opened_at: Location,
}

struct State {
    macros: HashMap<String, String>,
    /// Command-line names that were tested or substituted.
    used: HashSet<String>,
    cli: HashSet<String>,
    stack: Vec<Frame>,
    warnings: Vec<String>,
}

impl State {
    fn new(defines: &[(String, String)]) -> Self {
        Self {
            macros: defines
                .iter()
                .map(|(name, value)| (name.clone(), strip_comments(value)))
                .collect(),
            used: HashSet::new(),
            cli: defines.iter().map(|(name, _)| name.clone()).collect(),
            stack: Vec::new(),
            warnings: Vec::new(),
        }
    }

    fn active(&self) -> bool {
        self.stack.last().is_none_or(|f| f.active)
    }

    fn touch(&mut self, name: &str) {
        if self.cli.contains(name) {
            self.used.insert(name.to_string());
        }
    }

    fn directive(&mut self, text: &str, at: Location) -> Result<(), PreprocessError> {
        let text = text.trim();
        let split = text.find(char::is_whitespace).unwrap_or(text.len());
        let (name, args) = text.split_at(split);
        let args = args.trim();
        let active = self.active();

        match name {
            "ifdef" | "ifndef" => {
                if !active {
                    self.push_inactive(at);
                    return Ok(());
                }
                let ident = single_identifier(args, name, at)?;
                self.touch(ident);
                let defined = self.macros.contains_key(ident);
                let cond = if name == "ifdef" { defined } else { !defined };
                self.stack.push(Frame {
                    parent_active: true,
                    active: cond,
                    taken: cond,
                    seen_else: false,
                    opened_at: at,
                });
            }
            // Unsupported conditionals still have to nest inside skipped regions.
            "if" | "elif" if !active => {
                if name == "if" {
                    self.push_inactive(at);
                }
            }
            "else" => {
                let frame = self
                    .stack
                    .last_mut()
                    .ok_or_else(|| PreprocessError::at(at, "#else without #ifdef/#ifndef"))?;
                if frame.seen_else {
                    return Err(PreprocessError::at(at, "duplicate #else"));
                }
                frame.seen_else = true;
                frame.active = frame.parent_active && !frame.taken;
                frame.taken = true;
            }
            "endif" => {
                self.stack
                    .pop()
                    .ok_or_else(|| PreprocessError::at(at, "#endif without #ifdef/#ifndef"))?;
            }
            _ if !active => {}
            "define" => {
                let split = args
                    .find(|c: char| !is_identifier_char(c))
                    .unwrap_or(args.len());
                let (ident, value) = args.split_at(split);
                if !is_identifier(ident) {
                    return Err(PreprocessError::at(at, "#define needs a macro name"));
                }
                let value = strip_comments(value);
                if let Some(previous) = self.macros.get(ident) {
                    if *previous != value {
                        self.warnings.push(format!(
                            "source {}, line {}: `{ident}` redefined from `{previous}` to \
                             `{value}`",
                            at.source, at.line
                        ));
                    }
                }
                self.touch(ident);
                self.macros.insert(ident.to_string(), value);
            }
            "undef" => {
                let ident = single_identifier(args, name, at)?;
                self.touch(ident);
                self.macros.remove(ident);
            }
            "error" => return Err(PreprocessError::at(at, format!("#error {args}"))),
            other => {
                return Err(PreprocessError::at(at, format!("unknown directive `#{other}`")))
            }
        }
        Ok(())
    }

    fn push_inactive(&mut self, at: Location) {
        self.stack.push(Frame {
            parent_active: false,
            active: false,
            taken: true,
            seen_else: false,
            opened_at: at,
        });
    }

    /// Substitutes macros in the code part of `line`; `//` comments are kept
    /// as written.
    fn expand_line(&mut self, line: &str) -> String {
        let (code, comment) = match line.find("//") {
            Some(i) => line.split_at(i),
            None => (line, ""),
        };
        let mut expanding = Vec::new();
        let mut out = self.expand(code, &mut expanding);
        out.push_str(comment);
        out
    }

    fn expand(&mut self, text: &str, expanding: &mut Vec<String>) -> String {
        let mut out = String::with_capacity(text.len());
        let mut rest = text;
        while let Some(c) = rest.chars().next() {
            if c.is_ascii_digit() {
                // Numeric literals (`0x1Fu`, `1e5f`) are never identifiers.
                let len = rest
                    .find(|c: char| !(is_identifier_char(c) || c == '.'))
                    .unwrap_or(rest.len());
                out.push_str(&rest[..len]);
                rest = &rest[len..];
            } else if is_identifier_char(c) {
                let len = rest.find(|c: char| !is_identifier_char(c)).unwrap_or(rest.len());
                let word = &rest[..len];
                rest = &rest[len..];
                match self.macros.get(word) {
                    Some(value) if !expanding.iter().any(|e| e == word) => {
                        let value = value.clone();
                        self.touch(word);
                        expanding.push(word.to_string());
                        out.push_str(&self.expand(&value, expanding));
                        expanding.pop();
                    }
                    _ => out.push_str(word),
                }
            } else {
                out.push(c);
                rest = &rest[c.len_utf8()..];
            }
        }
        out
    }
}

/// Macro body with `//` and `/* */` comments removed, trimmed. A block
/// comment left open runs to the end of the body.
fn strip_comments(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut rest = body;
    loop {
        let line = rest.find("//");
        let block = rest.find("/*");
        match (line, block) {
            (Some(l), b) if b.is_none_or(|b| l < b) => {
                out.push_str(&rest[..l]);
                break;
            }
            (_, Some(b)) => {
                out.push_str(&rest[..b]);
                out.push(' ');
                match rest[b + 2..].find("*/") {
                    Some(end) => rest = &rest[b + 2 + end + 2..],
                    None => break,
                }
            }
            _ => {
                out.push_str(rest);
                break;
            }
        }
    }
    out.trim().to_string()
}

fn single_identifier<'a>(
    args: &'a str,
    directive: &str,
    at: Location,
) -> Result<&'a str, PreprocessError> {
    if is_identifier(args) {
        Ok(args)
    } else {
        Err(PreprocessError::at(at, format!("#{directive} needs a single macro name")))
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    chars.next().is_some_and(|c| c.is_alphabetic() || c == '_') && chars.all(is_identifier_char)
}

fn is_identifier_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}
