//! Consumer source lexing
//!
//! A small, language-tolerant lexer for the C-family sources generated
//! clients are consumed from. It recognises just enough to apply renames
//! safely: identifiers, quoted literals (single, double, back), comments
//! (skipped) and punctuation, plus top-level declaration extents.
//!
//! A back-quoted literal with `${...}` interpolations is not a literal token:
//! the expressions inside are lexed as ordinary code and the literal text
//! around them is dropped.

use regex::Regex;
use serde::Serialize;
use std::ops::Range;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TokenKind {
    Identifier,
    /// Quoted literal; `quote` is the delimiter used on both ends
    StringLiteral { quote: char },
    Punct,
    /// Numbers and anything else that is neither identifier nor literal
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Token {
    pub kind: TokenKind,
    /// Byte range in the unit's text
    pub span: Range<usize>,
    pub text: String,
}

impl Token {
    /// Contents of a string literal without its quotes
    pub fn unquoted(&self) -> Option<&str> {
        match self.kind {
            TokenKind::StringLiteral { .. } => Some(&self.text[1..self.text.len() - 1]),
            _ => None,
        }
    }

    /// The name this token refers to, if it can refer to one
    pub fn reference_name(&self) -> Option<&str> {
        match self.kind {
            TokenKind::Identifier => Some(&self.text),
            TokenKind::StringLiteral { .. } => self.unquoted(),
            _ => None,
        }
    }

    fn is_punct(&self, c: char) -> bool {
        self.kind == TokenKind::Punct && self.text.starts_with(c)
    }

    fn is_ident_in(&self, set: &[&str]) -> bool {
        self.kind == TokenKind::Identifier && set.contains(&self.text.as_str())
    }
}

/// A top-level declaration found in a unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Declaration {
    pub name: String,
    pub keyword: String,
    pub name_span: Range<usize>,
    /// Full extent, including leading modifiers and the trailing newline
    pub span: Range<usize>,
}

fn token_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(concat!(
            r"(?P<comment>//[^\n]*|/\*(?s:.*?)\*/)",
            r#"|(?P<string>"(?:[^"\\\n]|\\.)*"|'(?:[^'\\\n]|\\.)*'|`(?:[^`\\]|\\(?s:.))*`)"#,
            r"|(?P<ident>[A-Za-z_$][A-Za-z0-9_$]*)",
            r"|(?P<number>[0-9][A-Za-z0-9_.]*)",
            r"|(?P<punct>[^\sA-Za-z0-9_$])",
        ))
        .expect("token pattern is valid")
    })
}

/// Tokenize `text`, dropping whitespace and comments
pub fn tokenize(text: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    scan(text, 0, &mut tokens);
    tokens
}

fn scan(text: &str, offset: usize, out: &mut Vec<Token>) {
    for caps in token_pattern().captures_iter(text) {
        let (kind, m) = if let Some(m) = caps.name("string") {
            let quote = m.as_str().chars().next().unwrap_or('"');
            if quote == '`' {
                let holes = interpolations(m.as_str());
                if !holes.is_empty() {
                    for hole in holes {
                        scan(&m.as_str()[hole.clone()], offset + m.start() + hole.start, out);
                    }
                    continue;
                }
            }
            (TokenKind::StringLiteral { quote }, m)
        } else if let Some(m) = caps.name("ident") {
            (TokenKind::Identifier, m)
        } else if let Some(m) = caps.name("number") {
            (TokenKind::Other, m)
        } else if let Some(m) = caps.name("punct") {
            (TokenKind::Punct, m)
        } else {
            continue;
        };
        out.push(Token {
            kind,
            span: offset + m.start()..offset + m.end(),
            text: m.as_str().to_string(),
        });
    }
}

/// Byte ranges of the expressions inside a back-quoted literal's `${...}`
///
/// Braces nest, and quoted strings inside an expression may hold braces.
fn interpolations(literal: &str) -> Vec<Range<usize>> {
    let bytes = literal.as_bytes();
    let close = bytes.len().saturating_sub(1);
    let mut out = Vec::new();
    let mut i = 1;

    while i + 1 < close {
        match bytes[i] {
            b'\\' => i += 2,
            b'$' if bytes[i + 1] == b'{' => {
                let start = i + 2;
                let mut depth = 1;
                let mut quote = None;
                let mut k = start;
                while k < close {
                    let b = bytes[k];
                    match quote {
                        Some(_) if b == b'\\' => k += 1,
                        Some(q) if b == q => quote = None,
                        Some(_) => {}
                        None => match b {
                            b'"' | b'\'' => quote = Some(b),
                            b'{' => depth += 1,
                            b'}' => {
                                depth -= 1;
                                if depth == 0 {
                                    break;
                                }
                            }
                            _ => {}
                        },
                    }
                    k += 1;
                }
                out.push(start..k.min(close));
                i = k + 1;
            }
            _ => i += 1,
        }
    }
    out
}

const DECLARATION_KEYWORDS: &[&str] = &[
    "interface", "type", "enum", "class", "function", "const", "let", "var", "struct", "fn",
];

const MODIFIERS: &[&str] = &["export", "declare", "default", "abstract", "async", "pub"];

/// Punctuation after a depth-0 closing brace that continues the declaration
const CONTINUATIONS: &[char] = &['|', '&', ',', '.', '=', ')', '{', ':', '[', '?'];

/// Find top-level declarations in `text`
pub fn declarations(text: &str, tokens: &[Token]) -> Vec<Declaration> {
    let mut out = Vec::new();
    let mut depth: i32 = 0;
    let mut i = 0;

    while i < tokens.len() {
        let tok = &tokens[i];

        if depth == 0 && tok.is_ident_in(DECLARATION_KEYWORDS) {
            // `const enum Foo` declares Foo
            let keyword = match tokens.get(i + 1) {
                Some(next) if tok.text == "const" && next.is_ident_in(&["enum"]) => i + 1,
                _ => i,
            };
            if let Some(name) = tokens.get(keyword + 1).filter(|t| t.kind == TokenKind::Identifier) {
                let mut first = i;
                while first > 0 && tokens[first - 1].is_ident_in(MODIFIERS) {
                    first -= 1;
                }
                let (last, end) = declaration_end(text, tokens, keyword + 2);
                out.push(Declaration {
                    name: name.text.clone(),
                    keyword: tokens[keyword].text.clone(),
                    name_span: name.span.clone(),
                    span: tokens[first].span.start..end,
                });
                i = last + 1;
                continue;
            }
        }

        if tok.kind == TokenKind::Punct {
            match tok.text.as_str() {
                "{" | "(" | "[" => depth += 1,
                "}" | ")" | "]" => depth = (depth - 1).max(0),
                _ => {}
            }
        }
        i += 1;
    }

    out
}

/// Index of the last token of a declaration body starting at `from`, and the
/// byte offset where its extent ends
fn declaration_end(text: &str, tokens: &[Token], from: usize) -> (usize, usize) {
    let mut depth: i32 = 0;
    let mut k = from;

    while k < tokens.len() {
        let tok = &tokens[k];

        if depth == 0 && k > from && starts_statement(text, tokens, k) {
            return (k - 1, extend_to_newline(text, tokens[k - 1].span.end));
        }

        if tok.kind == TokenKind::Punct {
            match tok.text.as_str() {
                "{" | "(" | "[" => depth += 1,
                "}" | ")" | "]" => {
                    depth -= 1;
                    if depth <= 0 && tok.is_punct('}') {
                        depth = 0;
                        match tokens.get(k + 1) {
                            Some(next) if next.is_punct(';') => {
                                return (k + 1, extend_to_newline(text, next.span.end));
                            }
                            Some(next)
                                if next.kind == TokenKind::Punct
                                    && CONTINUATIONS.iter().any(|c| next.is_punct(*c)) => {}
                            _ => return (k, extend_to_newline(text, tok.span.end)),
                        }
                    }
                }
                ";" if depth == 0 => return (k, extend_to_newline(text, tok.span.end)),
                _ => {}
            }
        }
        k += 1;
    }

    let last = tokens.len().saturating_sub(1).max(from.saturating_sub(1));
    (last, text.len())
}

/// A new statement begins at `k` without a separating semicolon
fn starts_statement(text: &str, tokens: &[Token], k: usize) -> bool {
    let tok = &tokens[k];
    let newline_before = text[tokens[k - 1].span.end..tok.span.start].contains('\n');
    newline_before && (tok.is_ident_in(DECLARATION_KEYWORDS) || tok.is_ident_in(MODIFIERS) || tok.text == "import")
}

fn extend_to_newline(text: &str, end: usize) -> usize {
    let rest = &text[end..];
    match rest.find(|c: char| !c.is_whitespace() || c == '\n') {
        Some(offset) if rest[offset..].starts_with('\n') => end + offset + 1,
        _ => end,
    }
}
