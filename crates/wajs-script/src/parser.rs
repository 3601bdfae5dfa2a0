//! Core parser infrastructure: token cursor, error reporting, entry points.

use std::rc::Rc;

use crate::ast::{FunctionBody, FunctionDef, Program};
use crate::error::{Span, SyntaxError, SyntaxErrors};
use crate::lexer::Lexer;
use crate::token::{Token, TokenKind};

/// Maximum nesting of expressions, blocks and function literals.
const MAX_NESTING: u32 = 96;

/// Recursive-descent parser over a lexed token stream.
///
/// Collects errors and resynchronises at statement boundaries.
pub struct Parser<'src> {
    tokens: Vec<Token>,
    pos: usize,
    text: &'src str,
    errors: SyntaxErrors,
    pub(crate) depth: u32,
}

/// Parse a whole script, such as a library init block.
pub fn parse_program(text: &str, script: &str) -> Result<Program, SyntaxErrors> {
    let lexed = Lexer::new(text, script).lex();
    let mut parser = Parser::new(lexed.tokens, text, lexed.errors);
    let body = parser.parse_statements_until_eof();
    parser.finish(Program { body })
}

/// Parse `body` as the body of a function taking `params`.
pub fn parse_function(
    name: &str,
    params: &[String],
    body: &str,
) -> Result<Rc<FunctionDef>, SyntaxErrors> {
    let lexed = Lexer::new(body, name).lex();
    let mut parser = Parser::new(lexed.tokens, body, lexed.errors);
    for param in params {
        if !is_plain_identifier(param) {
            parser.error_at(format!("'{param}' is not a valid parameter name"), Span::point(1, 1));
        }
    }
    let stmts = parser.parse_statements_until_eof();
    let def = FunctionDef {
        name: Some(name.to_string()),
        params: params.to_vec(),
        body: FunctionBody::Block(stmts),
        span: Span::point(1, 1),
    };
    parser.finish(Rc::new(def))
}

fn is_plain_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
        && TokenKind::from_keyword(text).is_none()
}

impl<'src> Parser<'src> {
    pub fn new(tokens: Vec<Token>, text: &'src str, errors: SyntaxErrors) -> Self {
        Self {
            tokens,
            pos: 0,
            text,
            errors,
            depth: 0,
        }
    }

    fn finish<T>(self, value: T) -> Result<T, SyntaxErrors> {
        if self.errors.is_empty() {
            Ok(value)
        } else {
            Err(self.errors)
        }
    }

    // ── Token Cursor ──────────────────────────────────────────────────────────

    pub(crate) fn peek(&self) -> &Token {
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[self.pos.min(last)]
    }

    pub(crate) fn peek_kind(&self) -> &TokenKind {
        &self.peek().kind
    }

    pub(crate) fn look_ahead(&self, n: usize) -> &TokenKind {
        self.tokens
            .get(self.pos + n)
            .map(|t| &t.kind)
            .unwrap_or(&TokenKind::Eof)
    }

    pub(crate) fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    pub(crate) fn previous_span(&self) -> Span {
        match self.pos.checked_sub(1).and_then(|i| self.tokens.get(i)) {
            Some(token) => token.span,
            None => Span::point(1, 1),
        }
    }

    pub(crate) fn current_span(&self) -> Span {
        self.peek().span
    }

    pub(crate) fn at_end(&self) -> bool {
        matches!(self.peek_kind(), TokenKind::Eof)
    }

    pub(crate) fn check(&self, kind: &TokenKind) -> bool {
        self.peek_kind() == kind
    }

    pub(crate) fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Whether a line break precedes the current token.
    pub(crate) fn newline_before(&self) -> bool {
        self.peek().newline_before
    }

    // ── Expect Helpers ────────────────────────────────────────────────────────

    pub(crate) fn expect(&mut self, expected: &TokenKind) -> Option<Token> {
        if self.check(expected) {
            Some(self.advance())
        } else {
            self.error_at_current(format!("expected {expected}, got {}", self.peek_kind()));
            None
        }
    }

    pub(crate) fn expect_identifier(&mut self) -> Option<String> {
        match self.peek_kind().clone() {
            TokenKind::Ident(name) => {
                self.advance();
                Some(name)
            }
            other => {
                self.error_at_current(format!("expected identifier, got {other}"));
                None
            }
        }
    }

    /// An identifier or a keyword used as a property name.
    pub(crate) fn expect_property_name(&mut self) -> Option<String> {
        let kind = self.peek_kind().clone();
        if let Some(word) = kind.keyword_text() {
            self.advance();
            return Some(word.to_string());
        }
        self.expect_identifier()
    }

    /// End a statement: a `;`, or an implicit end before `}`, end of input or
    /// a line break.
    pub(crate) fn end_statement(&mut self) {
        if self.eat(&TokenKind::Semi) {
            return;
        }
        if self.at_end() || self.check(&TokenKind::RBrace) || self.newline_before() {
            return;
        }
        self.error_at_current(format!("expected ';', got {}", self.peek_kind()));
        self.synchronize();
    }

    // ── Nesting ───────────────────────────────────────────────────────────────

    pub(crate) fn enter(&mut self) -> bool {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            self.error_at_current(format!("nesting deeper than {MAX_NESTING} levels"));
            self.depth -= 1;
            return false;
        }
        true
    }

    pub(crate) fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    // ── Error Reporting ───────────────────────────────────────────────────────

    pub(crate) fn error_at(&mut self, message: impl Into<String>, span: Span) {
        let source_line = self
            .text
            .lines()
            .nth(span.line.saturating_sub(1) as usize)
            .unwrap_or("")
            .to_string();
        self.errors.push(SyntaxError {
            message: message.into(),
            span,
            source_line,
        });
    }

    pub(crate) fn error_at_current(&mut self, message: impl Into<String>) {
        let span = self.current_span();
        self.error_at(message, span);
    }

    pub(crate) fn too_many_errors(&self) -> bool {
        self.errors.is_full()
    }

    /// Skip tokens until a likely statement boundary.
    pub(crate) fn synchronize(&mut self) {
        while !self.at_end() {
            if self.eat(&TokenKind::Semi) {
                return;
            }
            if self.check(&TokenKind::RBrace) {
                return;
            }
            if self.newline_before()
                && matches!(
                    self.peek_kind(),
                    TokenKind::Var
                        | TokenKind::Let
                        | TokenKind::Const
                        | TokenKind::Function
                        | TokenKind::Return
                        | TokenKind::If
                        | TokenKind::While
                        | TokenKind::For
                        | TokenKind::Try
                )
            {
                return;
            }
            self.advance();
        }
    }
}
