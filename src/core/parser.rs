/// Recursive-descent parser from tokens to statement trees.
///
/// Grammar (operator precedence low to high): comparison, additive,
/// multiplicative, unary minus, atom. Errors are collected with the line
/// they occurred on; the parser skips to the next line at the same
/// nesting level and keeps going so a single pass reports all of them.

use std::mem::discriminant;
use thiserror::Error;

use crate::core::lexer::tokenize_fragment;
use crate::core::template::Template;
use crate::schema::command::{Arity, CommandKind};
use crate::schema::expr::{BinaryOp, Condition, Expression};
use crate::schema::statement::{ChoiceOption, MediaKind, Statement, StatementKind};
use crate::schema::token::{Token, TokenKind};
use crate::schema::value::Value;

#[derive(Debug, Clone, PartialEq, Error)]
#[error("line {line}: expected {expected}, found {found}")]
pub struct SyntaxError {
    pub line: usize,
    pub found: String,
    pub expected: String,
}

impl SyntaxError {
    pub fn new(line: usize, found: impl Into<String>, expected: impl Into<String>) -> Self {
        Self {
            line,
            found: found.into(),
            expected: expected.into(),
        }
    }
}

/// Parse a full token stream.
pub fn parse(tokens: Vec<Token>) -> Result<Vec<Statement>, Vec<SyntaxError>> {
    Parser::new(tokens).parse()
}

/// Lex and parse a condition captured from a choice option.
pub fn parse_condition_text(text: &str, line: usize) -> Result<Condition, SyntaxError> {
    let lexed = tokenize_fragment(text, line);
    if let Some(diag) = lexed.diagnostics.first() {
        return Err(SyntaxError::new(line, diag.message.clone(), "a valid condition"));
    }
    Parser::new(lexed.tokens).parse_condition_fragment()
}

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    errors: Vec<SyntaxError>,
}

impl Parser {
    pub fn new(mut tokens: Vec<Token>) -> Self {
        if !matches!(tokens.last(), Some(t) if t.kind == TokenKind::Eof) {
            let line = tokens.last().map(|t| t.line).unwrap_or(1);
            tokens.push(Token::new(TokenKind::Eof, line));
        }
        Self {
            tokens,
            pos: 0,
            errors: Vec::new(),
        }
    }

    pub fn parse(mut self) -> Result<Vec<Statement>, Vec<SyntaxError>> {
        let mut statements = Vec::new();
        loop {
            statements.extend(self.parse_statements(true));
            if self.is_at_end() {
                break;
            }
            // Only a stray block terminator can stop the top-level loop early.
            let tok = self.advance();
            self.errors.push(SyntaxError::new(tok.line, tok.kind.describe(), "a statement"));
        }

        if self.errors.is_empty() {
            Ok(statements)
        } else {
            Err(self.errors)
        }
    }

    /// Parse a standalone condition followed by end of input.
    pub fn parse_condition_fragment(mut self) -> Result<Condition, SyntaxError> {
        let condition = self.parse_condition()?;
        if !self.is_at_end() {
            return Err(self.unexpected("end of condition"));
        }
        Ok(condition)
    }

    // ─── Statements ──────────────────────────────────────────────────────

    fn parse_statements(&mut self, top_level: bool) -> Vec<Statement> {
        let mut statements = Vec::new();
        loop {
            while self.matches(&TokenKind::Newline) {}
            if self.is_at_end() || self.check(&TokenKind::Dedent) {
                break;
            }
            if self.check(&TokenKind::Indent) {
                let line = self.peek().line;
                self.errors.push(SyntaxError::new(line, "indented block", "a statement at the enclosing indentation"));
                self.skip_block();
                continue;
            }

            let pos_before = self.pos;
            match self.parse_statement(top_level) {
                Ok(stmt) => statements.push(stmt),
                Err(e) => {
                    self.errors.push(e);
                    self.recover();
                }
            }
            // guarantee progress on unrecognised tokens
            if self.pos == pos_before && !self.check(&TokenKind::Dedent) && !self.is_at_end() {
                self.advance();
            }
        }
        statements
    }

    fn parse_statement(&mut self, top_level: bool) -> Result<Statement, SyntaxError> {
        let line = self.peek().line;
        let kind = match self.peek_kind().clone() {
            TokenKind::SceneDef(name) => {
                if !top_level {
                    return Err(self.unexpected("a statement (scene markers are only allowed at the top level)"));
                }
                self.advance();
                StatementKind::SceneDef { name }
            }
            TokenKind::Speaker(speaker) => {
                self.advance();
                self.parse_dialogue(speaker)?
            }
            TokenKind::Choice => self.parse_choice()?,
            TokenKind::If => self.parse_if()?,
            TokenKind::Command(kind) => {
                self.advance();
                self.parse_command(kind)?
            }
            _ => return Err(self.unexpected("a statement")),
        };

        // Blocks consume their own trailing layout.
        if !matches!(kind, StatementKind::Conditional { .. } | StatementKind::Choice { .. }) {
            self.expect(&TokenKind::Newline, "end of line")?;
        }
        Ok(Statement::new(kind, line))
    }

    fn parse_dialogue(&mut self, speaker: String) -> Result<StatementKind, SyntaxError> {
        let line = self.peek().line;
        let text = match self.peek_kind().clone() {
            TokenKind::Text(text) => text,
            TokenKind::FormattedText(text) => {
                if let Err(e) = Template::parse(&text) {
                    return Err(SyntaxError::new(
                        line,
                        format!("malformed placeholder ({e})"),
                        "`{name}` placeholders",
                    ));
                }
                text
            }
            _ => return Err(self.unexpected("dialogue text")),
        };
        self.advance();
        Ok(StatementKind::Dialogue { speaker, text })
    }

    fn parse_choice(&mut self) -> Result<StatementKind, SyntaxError> {
        let line = self.advance().line; // `choice`
        self.expect(&TokenKind::Colon, "`:` after `choice`")?;
        self.expect(&TokenKind::Newline, "end of line")?;
        self.expect(&TokenKind::Indent, "indented choice options")?;

        let mut options = Vec::new();
        loop {
            while self.matches(&TokenKind::Newline) {}
            if self.check(&TokenKind::Dedent) || self.is_at_end() {
                break;
            }
            match self.parse_option() {
                Ok(option) => options.push(option),
                Err(e) => {
                    self.errors.push(e);
                    self.recover();
                }
            }
        }
        self.expect(&TokenKind::Dedent, "end of choice block")?;

        if options.is_empty() {
            return Err(SyntaxError::new(line, "empty choice block", "at least one option"));
        }
        Ok(StatementKind::Choice { options })
    }

    fn parse_option(&mut self) -> Result<ChoiceOption, SyntaxError> {
        let TokenKind::OptionText(text) = self.peek_kind().clone() else {
            return Err(self.unexpected("a choice option"));
        };
        let line = self.advance().line;

        let condition = match self.peek_kind().clone() {
            TokenKind::Condition(source) => {
                self.advance();
                Some(parse_condition_text(&source, line)?)
            }
            _ => None,
        };

        self.expect(&TokenKind::Arrow, "`->` and a target scene")?;
        let target = self.expect_scene()?;
        self.expect(&TokenKind::Newline, "end of line after the option target")?;
        Ok(ChoiceOption {
            text,
            condition,
            target,
        })
    }

    fn parse_if(&mut self) -> Result<StatementKind, SyntaxError> {
        self.advance(); // `if`
        let condition = self.parse_condition()?;
        self.expect(&TokenKind::Colon, "`:` after the condition")?;
        self.expect(&TokenKind::Newline, "end of line")?;
        let then_branch = self.parse_block()?;

        let else_branch = if self.matches(&TokenKind::Else) {
            self.expect(&TokenKind::Colon, "`:` after `else`")?;
            self.expect(&TokenKind::Newline, "end of line")?;
            Some(self.parse_block()?)
        } else {
            None
        };

        Ok(StatementKind::Conditional {
            condition,
            then_branch,
            else_branch,
        })
    }

    fn parse_block(&mut self) -> Result<Vec<Statement>, SyntaxError> {
        self.expect(&TokenKind::Indent, "an indented block")?;
        let body = self.parse_statements(false);
        self.expect(&TokenKind::Dedent, "end of block")?;
        Ok(body)
    }

    // ─── Commands ────────────────────────────────────────────────────────

    fn parse_command(&mut self, kind: CommandKind) -> Result<StatementKind, SyntaxError> {
        let statement = match kind.arity() {
            Arity::Nullary => StatementKind::End,
            Arity::Path => {
                let argument = self.expect_word(kind)?;
                match MediaKind::from_command(kind) {
                    Some(media) => StatementKind::Media {
                        kind: media,
                        argument,
                    },
                    None => return Err(self.arity_error(kind)),
                }
            }
            Arity::Scene => {
                let target = self.expect_scene()?;
                if kind == CommandKind::Move {
                    StatementKind::Move { location: target }
                } else {
                    StatementKind::Goto { target }
                }
            }
            Arity::Binding => {
                let name = self.expect_ident(kind)?;
                if self.check(&TokenKind::Newline) {
                    return Err(self.arity_error(kind));
                }
                let value = self.parse_expr()?;
                match kind {
                    CommandKind::Stat => StatementKind::Stat { name, value },
                    CommandKind::Set => StatementKind::Set { name, value },
                    _ => StatementKind::Var { name, value },
                }
            }
            Arity::Name => {
                let object = self.expect_ident(kind)?;
                StatementKind::Remove { object }
            }
            Arity::Placement => {
                let object = self.expect_ident(kind)?;
                let image = self.expect_word(kind)?;
                let position = if self.check(&TokenKind::Newline) {
                    None
                } else {
                    let x = self.parse_expr()?;
                    if self.check(&TokenKind::Newline) {
                        return Err(self.arity_error(kind));
                    }
                    let y = self.parse_expr()?;
                    Some((x, y))
                };
                StatementKind::Place {
                    object,
                    image,
                    position,
                }
            }
        };

        if !self.check(&TokenKind::Newline) {
            return Err(self.arity_error(kind));
        }
        Ok(statement)
    }

    fn arity_error(&self, kind: CommandKind) -> SyntaxError {
        let tok = self.peek();
        SyntaxError::new(
            tok.line,
            tok.kind.describe(),
            format!("`{}` with {}", kind.keyword(), kind.arity().describe()),
        )
    }

    /// A path or media name: string literal or bare identifier.
    fn expect_word(&mut self, kind: CommandKind) -> Result<String, SyntaxError> {
        match self.peek_kind().clone() {
            TokenKind::Str(s) | TokenKind::FormattedStr(s) | TokenKind::Ident(s) => {
                self.advance();
                Ok(s)
            }
            _ => Err(self.arity_error(kind)),
        }
    }

    fn expect_ident(&mut self, kind: CommandKind) -> Result<String, SyntaxError> {
        match self.peek_kind().clone() {
            TokenKind::Ident(s) => {
                self.advance();
                Ok(s)
            }
            _ => Err(self.arity_error(kind)),
        }
    }

    fn expect_scene(&mut self) -> Result<String, SyntaxError> {
        match self.peek_kind().clone() {
            TokenKind::SceneRef(s) | TokenKind::Ident(s) | TokenKind::Str(s) => {
                self.advance();
                Ok(s)
            }
            _ => Err(self.unexpected("a scene reference")),
        }
    }

    // ─── Conditions and expressions ──────────────────────────────────────

    fn parse_condition(&mut self) -> Result<Condition, SyntaxError> {
        if self.check(&TokenKind::LParen) {
            let start = self.pos;
            self.advance();
            if let Ok(condition) = self.parse_condition() {
                if self.matches(&TokenKind::RParen) && !self.at_operator() {
                    return Ok(condition);
                }
            }
            // Not a wrapped condition: re-read as `(expr) op expr`.
            self.pos = start;
        }

        let left = self.parse_expr()?;
        if let TokenKind::Compare(op) = *self.peek_kind() {
            self.advance();
            let right = self.parse_expr()?;
            return Ok(Condition::compare(left, op, right));
        }
        match left {
            Expression::Variable(name) => Ok(Condition::BoolCheck(name)),
            _ => Err(self.unexpected("a comparison operator")),
        }
    }

    fn at_operator(&self) -> bool {
        matches!(
            self.peek_kind(),
            TokenKind::Compare(_)
                | TokenKind::Plus
                | TokenKind::Minus
                | TokenKind::Star
                | TokenKind::Slash
        )
    }

    pub fn parse_expr(&mut self) -> Result<Expression, SyntaxError> {
        let mut left = self.parse_term()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_term()?;
            left = Expression::binary(left, op, right);
        }
        Ok(left)
    }

    fn parse_term(&mut self) -> Result<Expression, SyntaxError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            left = Expression::binary(left, op, right);
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expression, SyntaxError> {
        if !self.matches(&TokenKind::Minus) {
            return self.parse_atom();
        }
        match self.peek_kind().clone() {
            TokenKind::Int(i) => {
                self.advance();
                Ok(Expression::Literal(Value::Int(-i)))
            }
            TokenKind::Float(f) => {
                self.advance();
                Ok(Expression::Literal(Value::Float(-f)))
            }
            _ => {
                let operand = self.parse_unary()?;
                Ok(Expression::binary(
                    Expression::Literal(Value::Int(0)),
                    BinaryOp::Sub,
                    operand,
                ))
            }
        }
    }

    fn parse_atom(&mut self) -> Result<Expression, SyntaxError> {
        let expr = match self.peek_kind().clone() {
            TokenKind::Int(i) => Expression::Literal(Value::Int(i)),
            TokenKind::Float(f) => Expression::Literal(Value::Float(f)),
            TokenKind::Str(s) => Expression::Literal(Value::String(s)),
            TokenKind::FormattedStr(s) => {
                if let Err(e) = Template::parse(&s) {
                    return Err(SyntaxError::new(
                        self.peek().line,
                        format!("malformed placeholder ({e})"),
                        "`{name}` placeholders",
                    ));
                }
                Expression::Formatted(s)
            }
            TokenKind::True => Expression::Literal(Value::Bool(true)),
            TokenKind::False => Expression::Literal(Value::Bool(false)),
            TokenKind::Ident(name) => Expression::Variable(name),
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expr()?;
                self.expect(&TokenKind::RParen, "`)`")?;
                return Ok(inner);
            }
            _ => return Err(self.unexpected("an expression")),
        };
        self.advance();
        Ok(expr)
    }

    // ─── Token helpers ───────────────────────────────────────────────────

    fn peek(&self) -> &Token {
        let idx = self.pos.min(self.tokens.len() - 1);
        &self.tokens[idx]
    }

    fn peek_kind(&self) -> &TokenKind {
        &self.peek().kind
    }

    fn advance(&mut self) -> Token {
        let tok = self.peek().clone();
        if !self.is_at_end() {
            self.pos += 1;
        }
        tok
    }

    fn is_at_end(&self) -> bool {
        self.peek_kind() == &TokenKind::Eof
    }

    fn check(&self, kind: &TokenKind) -> bool {
        discriminant(self.peek_kind()) == discriminant(kind)
    }

    fn matches(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind, expected: &str) -> Result<Token, SyntaxError> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn unexpected(&self, expected: &str) -> SyntaxError {
        let tok = self.peek();
        SyntaxError::new(tok.line, tok.kind.describe(), expected)
    }

    /// Skip the rest of the current line, and the block it opens if any.
    fn recover(&mut self) {
        while !self.is_at_end()
            && !self.check(&TokenKind::Newline)
            && !self.check(&TokenKind::Dedent)
        {
            self.advance();
        }
        self.matches(&TokenKind::Newline);
        if self.check(&TokenKind::Indent) {
            self.skip_block();
        }
    }

    /// Skip a balanced `Indent ... Dedent` run starting at an `Indent`.
    fn skip_block(&mut self) {
        let mut depth = 0usize;
        while !self.is_at_end() {
            match self.advance().kind {
                TokenKind::Indent => depth += 1,
                TokenKind::Dedent => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        break;
                    }
                }
                _ => {}
            }
        }
    }
}
