/// Line-oriented lexer for scene scripts.
///
/// Each non-blank line produces its tokens followed by one `Newline`.
/// Indentation is tracked with a stack of widths and reported as
/// `Indent`/`Dedent` tokens before the line's own tokens.

use log::warn;
use thiserror::Error;

use crate::schema::command;
use crate::schema::expr::CompareOp;
use crate::schema::token::{Token, TokenKind};

pub const DEFAULT_TAB_WIDTH: usize = 4;

/// A recoverable lexing problem. The offending input is skipped.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("line {line}: {message}")]
pub struct LexError {
    pub line: usize,
    pub message: String,
}

impl LexError {
    fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

/// Lexer output: the token stream plus every diagnostic recorded on the way.
#[derive(Debug, Clone, Default)]
pub struct Lexed {
    pub tokens: Vec<Token>,
    pub diagnostics: Vec<LexError>,
}

#[derive(Debug, Clone)]
pub struct Lexer {
    tab_width: usize,
}

impl Default for Lexer {
    fn default() -> Self {
        Self {
            tab_width: DEFAULT_TAB_WIDTH,
        }
    }
}

/// Tokenize a whole script with the default tab width.
pub fn tokenize(source: &str) -> Lexed {
    Lexer::default().tokenize(source)
}

/// Tokenize a captured condition (the inside of `( ... )` on a choice
/// option) for re-parsing. No layout tokens are produced.
pub fn tokenize_fragment(text: &str, line: usize) -> Lexed {
    let mut out = Lexed::default();
    LineScanner::new(text, line, &mut out).scan_generic();
    out.tokens.push(Token::new(TokenKind::Eof, line));
    out
}

impl Lexer {
    pub fn new(tab_width: usize) -> Self {
        Self {
            tab_width: tab_width.max(1),
        }
    }

    pub fn tokenize(&self, source: &str) -> Lexed {
        let mut out = Lexed::default();
        let mut indents: Vec<usize> = vec![0];
        // Indentation of the enclosing `choice:` line while inside its block.
        let mut choice_indent: Option<usize> = None;
        let mut last_line = 0;

        for (idx, raw) in source.lines().enumerate() {
            let line = idx + 1;
            last_line = line;
            let raw = raw.trim_end();
            if raw.trim_start().is_empty() {
                continue;
            }

            let width = self.indent_width(raw);
            self.layout(width, line, &mut indents, &mut out);

            let in_choice = matches!(choice_indent, Some(ci) if width > ci);
            if !in_choice {
                choice_indent = None;
            }

            let content = raw.trim_start();
            let first = out.tokens.len();
            {
                let mut scanner = LineScanner::new(content, line, &mut out);
                if in_choice {
                    scanner.scan_option();
                } else {
                    scanner.scan_line();
                }
            }
            if !in_choice && matches!(out.tokens.get(first), Some(t) if t.kind == TokenKind::Choice)
            {
                choice_indent = Some(width);
            }
            out.tokens.push(Token::new(TokenKind::Newline, line));
        }

        let end_line = last_line + 1;
        for _ in 1..indents.len() {
            out.tokens.push(Token::new(TokenKind::Dedent, end_line));
        }
        out.tokens.push(Token::new(TokenKind::Eof, end_line));

        for diag in &out.diagnostics {
            warn!("lexer: {diag}");
        }
        out
    }

    fn indent_width(&self, raw: &str) -> usize {
        raw.chars()
            .take_while(|c| c.is_whitespace())
            .map(|c| if c == '\t' { self.tab_width } else { 1 })
            .sum()
    }

    fn layout(&self, width: usize, line: usize, indents: &mut Vec<usize>, out: &mut Lexed) {
        let top = indents.last().copied().unwrap_or(0);
        if width > top {
            indents.push(width);
            out.tokens.push(Token::new(TokenKind::Indent, line));
            return;
        }
        while indents.len() > 1 && width < indents.last().copied().unwrap_or(0) {
            indents.pop();
            out.tokens.push(Token::new(TokenKind::Dedent, line));
        }
        if indents.last().copied().unwrap_or(0) != width {
            // Treated as the enclosing level.
            out.diagnostics.push(LexError::new(
                line,
                "unindent does not match any outer indentation level",
            ));
        }
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Returns true if `text` must be read as a template. Any brace counts, so
/// malformed placeholders surface as parse errors instead of raw text.
pub fn is_template_text(text: &str) -> bool {
    text.contains(|c| c == '{' || c == '}')
}

fn keyword_or_ident(word: String) -> TokenKind {
    if let Some(spec) = command::lookup(&word) {
        return TokenKind::Command(spec.kind);
    }
    match word.as_str() {
        "choice" => TokenKind::Choice,
        "if" => TokenKind::If,
        "else" => TokenKind::Else,
        "true" => TokenKind::True,
        "false" => TokenKind::False,
        _ => TokenKind::Ident(word),
    }
}

/// Scans the content of one line (indentation already removed).
struct LineScanner<'o> {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    out: &'o mut Lexed,
}

impl<'o> LineScanner<'o> {
    fn new(content: &str, line: usize, out: &'o mut Lexed) -> Self {
        Self {
            chars: content.chars().collect(),
            pos: 0,
            line,
            out,
        }
    }

    fn push(&mut self, kind: TokenKind) {
        self.out.tokens.push(Token::new(kind, self.line));
    }

    fn error(&mut self, message: impl Into<String>) {
        self.out.diagnostics.push(LexError::new(self.line, message));
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_next(&self) -> Option<char> {
        self.chars.get(self.pos + 1).copied()
    }

    fn rest(&self) -> String {
        self.chars[self.pos.min(self.chars.len())..].iter().collect()
    }

    fn read_ident(&mut self) -> String {
        let start = self.pos;
        while self.peek().is_some_and(is_ident_char) {
            self.pos += 1;
        }
        self.chars[start..self.pos].iter().collect()
    }

    // ─── Line classification ─────────────────────────────────────────────

    fn scan_line(&mut self) {
        if self.try_scene_def() || self.try_speaker() {
            return;
        }
        self.scan_generic();
    }

    /// `@name:` alone on a line.
    fn try_scene_def(&mut self) -> bool {
        if self.peek() != Some('@') || !self.peek_next().is_some_and(is_ident_start) {
            return false;
        }
        let save = self.pos;
        self.pos += 1;
        let name = self.read_ident();
        if self.peek() == Some(':') && self.chars[self.pos + 1..].iter().all(|c| c.is_whitespace()) {
            self.pos = self.chars.len();
            self.push(TokenKind::SceneDef(name));
            return true;
        }
        self.pos = save;
        false
    }

    /// `name: text` or `$: text`.
    fn try_speaker(&mut self) -> bool {
        let save = self.pos;
        let speaker = if self.peek() == Some('$') {
            self.pos += 1;
            String::new()
        } else if self.peek().is_some_and(is_ident_start) {
            let name = self.read_ident();
            if command::is_reserved(&name) {
                self.pos = save;
                return false;
            }
            name
        } else {
            return false;
        };

        if self.peek() != Some(':') {
            self.pos = save;
            return false;
        }
        self.pos += 1;

        let text = self.rest().trim().to_string();
        self.pos = self.chars.len();
        self.push(TokenKind::Speaker(speaker));
        if is_template_text(&text) {
            self.push(TokenKind::FormattedText(text));
        } else {
            self.push(TokenKind::Text(text));
        }
        true
    }

    /// A line inside a `choice:` block: `text [(condition)] -> target`.
    fn scan_option(&mut self) {
        let content: String = self.chars.iter().collect();
        let Some(arrow) = find_arrow(&self.chars) else {
            self.push(TokenKind::OptionText(unescape_parens(content.trim())));
            return;
        };

        let head = &self.chars[..arrow];
        let (text_end, condition) = match trailing_condition(head) {
            Some((open, close)) => {
                let inner: String = head[open + 1..close].iter().collect();
                (open, Some(inner.trim().to_string()))
            }
            None => (head.len(), None),
        };
        let text: String = head[..text_end].iter().collect();
        self.push(TokenKind::OptionText(unescape_parens(text.trim())));
        if let Some(condition) = condition {
            if condition.is_empty() {
                self.error("empty choice condition");
            } else {
                self.push(TokenKind::Condition(condition));
            }
        }
        self.push(TokenKind::Arrow);

        self.pos = arrow + 2;
        self.scan_generic();
    }

    // ─── Generic tokens ──────────────────────────────────────────────────

    fn scan_generic(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.pos += 1;
                continue;
            }
            self.scan_token(c);
        }
    }

    fn scan_token(&mut self, c: char) {
        match c {
            '@' => {
                self.pos += 1;
                if self.peek().is_some_and(is_ident_start) {
                    let name = self.read_ident();
                    self.push(TokenKind::SceneRef(name));
                } else {
                    self.error("expected a scene name after `@`");
                }
            }
            '"' => self.read_string(),
            '0'..='9' => self.read_number(),
            c if is_ident_start(c) => {
                let word = self.read_ident();
                let kind = keyword_or_ident(word);
                self.push(kind);
            }
            '>' | '<' | '=' | '!' => self.read_comparison(c),
            '-' => {
                self.pos += 1;
                if self.peek() == Some('>') {
                    self.pos += 1;
                    self.push(TokenKind::Arrow);
                } else {
                    self.push(TokenKind::Minus);
                }
            }
            '+' => self.single(TokenKind::Plus),
            '*' => self.single(TokenKind::Star),
            '/' => self.single(TokenKind::Slash),
            '(' => self.single(TokenKind::LParen),
            ')' => self.single(TokenKind::RParen),
            ':' => self.single(TokenKind::Colon),
            '\\' if matches!(self.peek_next(), Some('(') | Some(')')) => {
                self.pos += 2;
                self.error("escaped parenthesis is only allowed in choice text");
            }
            other => {
                self.pos += 1;
                self.error(format!("unexpected character `{other}`"));
            }
        }
    }

    fn single(&mut self, kind: TokenKind) {
        self.pos += 1;
        self.push(kind);
    }

    fn read_comparison(&mut self, first: char) {
        self.pos += 1;
        if self.peek() == Some('=') {
            self.pos += 1;
            let symbol = format!("{first}=");
            if let Some(op) = CompareOp::from_symbol(&symbol) {
                self.push(TokenKind::Compare(op));
            }
            return;
        }
        match first {
            '>' => self.push(TokenKind::Compare(CompareOp::Gt)),
            '<' => self.push(TokenKind::Compare(CompareOp::Lt)),
            '=' => self.error("expected `==`, bare `=` is not an operator"),
            _ => self.error("expected `!=`, bare `!` is not an operator"),
        }
    }

    fn read_number(&mut self) {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        let is_float = self.peek() == Some('.') && self.peek_next().is_some_and(|c| c.is_ascii_digit());
        if is_float {
            self.pos += 1;
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.pos += 1;
            }
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        if is_float {
            match text.parse::<f64>() {
                Ok(f) => self.push(TokenKind::Float(f)),
                Err(e) => self.error(format!("invalid number `{text}`: {e}")),
            }
        } else {
            match text.parse::<i64>() {
                Ok(i) => self.push(TokenKind::Int(i)),
                Err(e) => self.error(format!("invalid number `{text}`: {e}")),
            }
        }
    }

    fn read_string(&mut self) {
        self.pos += 1; // opening quote
        let start = self.pos;
        while self.peek().is_some_and(|c| c != '"') {
            self.pos += 1;
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        if self.peek().is_none() {
            self.error("unterminated string literal");
            return;
        }
        self.pos += 1; // closing quote
        if is_template_text(&text) {
            self.push(TokenKind::FormattedStr(text));
        } else {
            self.push(TokenKind::Str(text));
        }
    }
}

/// Position of the last `->` outside a string literal.
fn find_arrow(chars: &[char]) -> Option<usize> {
    let mut in_string = false;
    let mut found = None;
    for i in 0..chars.len() {
        match chars[i] {
            '"' => in_string = !in_string,
            '-' if !in_string && chars.get(i + 1) == Some(&'>') => found = Some(i),
            _ => {}
        }
    }
    found
}

fn is_escaped(chars: &[char], i: usize) -> bool {
    i > 0 && chars[i - 1] == '\\'
}

/// Bounds of a trailing unescaped `( ... )` group, ignoring trailing spaces.
fn trailing_condition(head: &[char]) -> Option<(usize, usize)> {
    let close = head.iter().rposition(|c| !c.is_whitespace())?;
    if head[close] != ')' || is_escaped(head, close) {
        return None;
    }
    let mut depth = 0usize;
    for i in (0..=close).rev() {
        match head[i] {
            ')' if !is_escaped(head, i) => depth += 1,
            '(' if !is_escaped(head, i) => {
                depth -= 1;
                if depth == 0 {
                    return Some((i, close));
                }
            }
            _ => {}
        }
    }
    None
}

fn unescape_parens(text: &str) -> String {
    text.replace("\\(", "(").replace("\\)", ")")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::command::CommandKind;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source).tokens.into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn scene_definition_and_reference() {
        assert_eq!(
            kinds("@start:\ngoto @end\n"),
            vec![
                TokenKind::SceneDef("start".to_string()),
                TokenKind::Newline,
                TokenKind::Command(CommandKind::Goto),
                TokenKind::SceneRef("end".to_string()),
                TokenKind::Newline,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn speaker_and_narration() {
        assert_eq!(
            kinds("maria: Hello there.\n$: The wind howls."),
            vec![
                TokenKind::Speaker("maria".to_string()),
                TokenKind::Text("Hello there.".to_string()),
                TokenKind::Newline,
                TokenKind::Speaker(String::new()),
                TokenKind::Text("The wind howls.".to_string()),
                TokenKind::Newline,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn placeholder_text_is_formatted() {
        let k = kinds("john: Your level is {knowledge}.");
        assert_eq!(
            k[1],
            TokenKind::FormattedText("Your level is {knowledge}.".to_string())
        );
    }

    #[test]
    fn any_brace_makes_text_formatted() {
        let k = kinds("$: a {} {b}");
        assert_eq!(k[1], TokenKind::FormattedText("a {} {b}".to_string()));
        let k = kinds("$: a {b} c");
        assert_eq!(k[1], TokenKind::FormattedText("a {b} c".to_string()));
        let k = kinds("$: plain");
        assert_eq!(k[1], TokenKind::Text("plain".to_string()));
        assert!(is_template_text("stray }"));
    }

    #[test]
    fn reserved_word_is_not_a_speaker() {
        let k = kinds("choice:\n    A -> @a");
        assert_eq!(k[0], TokenKind::Choice);
        assert_eq!(k[1], TokenKind::Colon);
    }

    #[test]
    fn keyword_lookup_precedes_identifiers() {
        let k = kinds("stat wisdom 10");
        assert_eq!(
            k[..3],
            [
                TokenKind::Command(CommandKind::Stat),
                TokenKind::Ident("wisdom".to_string()),
                TokenKind::Int(10),
            ]
        );
    }

    #[test]
    fn numbers_and_strings() {
        let k = kinds("var ratio 2.5\nvar name \"Player\"\nvar greet \"Hi {name}\"");
        assert!(k.contains(&TokenKind::Float(2.5)));
        assert!(k.contains(&TokenKind::Str("Player".to_string())));
        assert!(k.contains(&TokenKind::FormattedStr("Hi {name}".to_string())));
    }

    #[test]
    fn comparisons_are_greedy() {
        let k = kinds("if a >= 3:");
        assert_eq!(k[2], TokenKind::Compare(CompareOp::Ge));
        let k = kinds("if a > 3:");
        assert_eq!(k[2], TokenKind::Compare(CompareOp::Gt));
        let k = kinds("if a != b:");
        assert_eq!(k[2], TokenKind::Compare(CompareOp::Ne));
    }

    #[test]
    fn indentation_produces_blocks() {
        let k = kinds("if met:\n    maria: Hi\nend");
        assert_eq!(
            k,
            vec![
                TokenKind::If,
                TokenKind::Ident("met".to_string()),
                TokenKind::Colon,
                TokenKind::Newline,
                TokenKind::Indent,
                TokenKind::Speaker("maria".to_string()),
                TokenKind::Text("Hi".to_string()),
                TokenKind::Newline,
                TokenKind::Dedent,
                TokenKind::Command(CommandKind::End),
                TokenKind::Newline,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn open_blocks_close_at_end_of_input() {
        let k = kinds("if a:\n    if b:\n        end");
        let dedents = k.iter().filter(|t| **t == TokenKind::Dedent).count();
        assert_eq!(dedents, 2);
        assert_eq!(k.last(), Some(&TokenKind::Eof));
    }

    #[test]
    fn choice_options_with_conditions() {
        let k = kinds("choice:\n    Ask about books (knowledge >= 5) -> @library\n    Leave -> @hall");
        assert!(k.contains(&TokenKind::OptionText("Ask about books".to_string())));
        assert!(k.contains(&TokenKind::Condition("knowledge >= 5".to_string())));
        assert!(k.contains(&TokenKind::SceneRef("library".to_string())));
        assert!(k.contains(&TokenKind::OptionText("Leave".to_string())));
    }

    #[test]
    fn escaped_parens_are_literal_option_text() {
        let k = kinds("choice:\n    Smile \\(politely\\) -> @hall");
        assert!(k.contains(&TokenKind::OptionText("Smile (politely)".to_string())));
        assert!(!k.iter().any(|t| matches!(t, TokenKind::Condition(_))));
    }

    #[test]
    fn escaped_parens_before_condition() {
        let k = kinds("choice:\n    Bow \\(deeply\\) (respect > 2) -> @hall");
        assert!(k.contains(&TokenKind::OptionText("Bow (deeply)".to_string())));
        assert!(k.contains(&TokenKind::Condition("respect > 2".to_string())));
    }

    #[test]
    fn option_block_ends_on_dedent() {
        let k = kinds("choice:\n    A -> @a\nmaria: back -> here");
        assert!(k.contains(&TokenKind::Speaker("maria".to_string())));
        assert!(k.contains(&TokenKind::Text("back -> here".to_string())));
    }

    #[test]
    fn unknown_character_is_skipped_and_recorded() {
        let lexed = tokenize("stat luck 1 ~\n");
        assert_eq!(lexed.diagnostics.len(), 1);
        assert_eq!(lexed.diagnostics[0].line, 1);
        assert!(lexed.tokens.iter().any(|t| t.kind == TokenKind::Int(1)));
    }

    #[test]
    fn inconsistent_dedent_is_recorded() {
        let lexed = tokenize("if a:\n        end\n    end\n");
        assert_eq!(lexed.diagnostics.len(), 1);
        assert_eq!(lexed.diagnostics[0].line, 3);
    }

    #[test]
    fn line_numbers_skip_blank_lines() {
        let lexed = tokenize("\n\nend\n");
        assert_eq!(lexed.tokens[0].line, 3);
    }

    #[test]
    fn fragment_has_no_layout() {
        let lexed = tokenize_fragment("knowledge >= 5", 7);
        let k: Vec<_> = lexed.tokens.iter().map(|t| t.kind.clone()).collect();
        assert_eq!(
            k,
            vec![
                TokenKind::Ident("knowledge".to_string()),
                TokenKind::Compare(CompareOp::Ge),
                TokenKind::Int(5),
                TokenKind::Eof,
            ]
        );
        assert!(lexed.tokens.iter().all(|t| t.line == 7));
    }

    #[test]
    fn korean_speaker_names() {
        let k = kinds("유하람: 안녕!");
        assert_eq!(k[0], TokenKind::Speaker("유하람".to_string()));
    }
}
