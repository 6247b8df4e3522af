use serde::{Deserialize, Serialize};

use super::command::CommandKind;
use super::expr::CompareOp;

/// Token classification produced by the lexer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TokenKind {
    // Line-level tokens
    /// `@name:` on its own line.
    SceneDef(String),
    /// `@name` used as a jump or choice target.
    SceneRef(String),
    /// `name:` at the start of a line; empty for `$:` narration.
    Speaker(String),
    /// Dialogue text without placeholders.
    Text(String),
    /// Dialogue text containing at least one `{name}` placeholder.
    FormattedText(String),
    /// Choice option text, escaped parentheses already unescaped.
    OptionText(String),
    /// Inner text of a parenthesized choice condition, re-lexed later.
    Condition(String),

    // Keywords
    Command(CommandKind),
    Choice,
    If,
    Else,

    // Literals
    Ident(String),
    Int(i64),
    Float(f64),
    Str(String),
    FormattedStr(String),
    True,
    False,

    // Operators and punctuation
    Compare(CompareOp),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
    Colon,
    Arrow,

    // Layout
    Newline,
    Indent,
    Dedent,
    Eof,
}

impl TokenKind {
    /// Short description used in syntax errors.
    pub fn describe(&self) -> String {
        match self {
            Self::SceneDef(name) => format!("scene marker `@{name}:`"),
            Self::SceneRef(name) => format!("scene reference `@{name}`"),
            Self::Speaker(name) if name.is_empty() => "narration marker `$:`".to_string(),
            Self::Speaker(name) => format!("speaker `{name}:`"),
            Self::Text(_) | Self::FormattedText(_) => "dialogue text".to_string(),
            Self::OptionText(text) => format!("option `{text}`"),
            Self::Condition(text) => format!("condition `({text})`"),
            Self::Command(kind) => format!("command `{}`", kind.keyword()),
            Self::Choice => "`choice`".to_string(),
            Self::If => "`if`".to_string(),
            Self::Else => "`else`".to_string(),
            Self::Ident(name) => format!("identifier `{name}`"),
            Self::Int(i) => format!("number `{i}`"),
            Self::Float(f) => format!("number `{f}`"),
            Self::Str(s) | Self::FormattedStr(s) => format!("string \"{s}\""),
            Self::True => "`true`".to_string(),
            Self::False => "`false`".to_string(),
            Self::Compare(op) => format!("`{}`", op.symbol()),
            Self::Plus => "`+`".to_string(),
            Self::Minus => "`-`".to_string(),
            Self::Star => "`*`".to_string(),
            Self::Slash => "`/`".to_string(),
            Self::LParen => "`(`".to_string(),
            Self::RParen => "`)`".to_string(),
            Self::Colon => "`:`".to_string(),
            Self::Arrow => "`->`".to_string(),
            Self::Newline => "end of line".to_string(),
            Self::Indent => "indented block".to_string(),
            Self::Dedent => "end of block".to_string(),
            Self::Eof => "end of script".to_string(),
        }
    }
}

/// A lexed token. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
}

impl Token {
    pub fn new(kind: TokenKind, line: usize) -> Self {
        Self { kind, line }
    }
}
