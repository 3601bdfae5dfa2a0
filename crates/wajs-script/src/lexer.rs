//! Host-script lexer: source text to token stream.
//!
//! Covers the JavaScript lexical grammar snippets actually use:
//! - identifiers with `$` and `_`, keywords, decimal/hex/binary/octal numbers
//! - single- and double-quoted strings with the usual escapes
//! - line and block comments
//! - every arithmetic, bitwise, logical and assignment operator
//!
//! Template literals and regular expression literals are reported as
//! errors. Newlines are not tokens; each token records whether a line break
//! preceded it so the parser can end statements without semicolons.

use crate::error::{Span, SyntaxError, SyntaxErrors};
use crate::token::{Token, TokenKind};

pub struct Lexer<'src> {
    source: &'src [u8],
    text: &'src str,
    pos: usize,
    line: u32,
    col: u32,
    saw_newline: bool,
    errors: SyntaxErrors,
}

/// Result of lexing: tokens plus any errors collected.
pub struct LexResult {
    /// Always ends with [`TokenKind::Eof`].
    pub tokens: Vec<Token>,
    pub errors: SyntaxErrors,
}

impl<'src> Lexer<'src> {
    pub fn new(text: &'src str, script: &str) -> Self {
        Self {
            source: text.as_bytes(),
            text,
            pos: 0,
            line: 1,
            col: 1,
            saw_newline: false,
            errors: SyntaxErrors::new(script),
        }
    }

    pub fn lex(mut self) -> LexResult {
        let mut tokens = Vec::new();
        loop {
            if self.errors.is_full() {
                break;
            }
            let token = self.scan_token();
            let is_eof = token.kind == TokenKind::Eof;
            tokens.push(token);
            if is_eof {
                break;
            }
        }
        if !matches!(tokens.last(), Some(t) if t.kind == TokenKind::Eof) {
            tokens.push(Token::new(TokenKind::Eof, self.current_span(), true));
        }
        LexResult {
            tokens,
            errors: self.errors,
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Character-level helpers
    // ─────────────────────────────────────────────────────────────

    fn peek(&self) -> Option<u8> {
        self.source.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.source.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<u8> {
        let ch = self.peek()?;
        self.pos += 1;
        if ch == b'\n' {
            self.line += 1;
            self.col = 1;
            self.saw_newline = true;
        } else if ch & 0xC0 != 0x80 {
            // continuation bytes do not start a new column
            self.col += 1;
        }
        Some(ch)
    }

    fn eat(&mut self, expected: u8) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn current_span(&self) -> Span {
        Span::point(self.line, self.col)
    }

    fn span_from(&self, line: u32, col: u32) -> Span {
        Span::new(line, col, self.line, self.col.saturating_sub(1).max(1))
    }

    fn emit_error(&mut self, message: impl Into<String>, span: Span) {
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

    // ─────────────────────────────────────────────────────────────
    // Whitespace & comments
    // ─────────────────────────────────────────────────────────────

    fn skip_trivia(&mut self) {
        loop {
            match (self.peek(), self.peek_at(1)) {
                (Some(b' ' | b'\t' | b'\r' | b'\n' | 0x0B | 0x0C), _) => {
                    self.advance();
                }
                (Some(b'/'), Some(b'/')) => {
                    while let Some(ch) = self.peek() {
                        if ch == b'\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                (Some(b'/'), Some(b'*')) => {
                    let (line, col) = (self.line, self.col);
                    self.advance();
                    self.advance();
                    loop {
                        match self.peek() {
                            None => {
                                let span = self.span_from(line, col);
                                self.emit_error("unterminated block comment", span);
                                return;
                            }
                            Some(b'*') if self.peek_at(1) == Some(b'/') => {
                                self.advance();
                                self.advance();
                                break;
                            }
                            _ => {
                                self.advance();
                            }
                        }
                    }
                }
                _ => return,
            }
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Token scanning
    // ─────────────────────────────────────────────────────────────

    fn scan_token(&mut self) -> Token {
        self.saw_newline = false;
        self.skip_trivia();
        let newline_before = self.saw_newline;
        let (line, col) = (self.line, self.col);

        let Some(ch) = self.advance() else {
            return Token::new(TokenKind::Eof, self.current_span(), true);
        };

        let kind = match ch {
            b'"' | b'\'' => self.scan_string(ch, line, col),
            b'0'..=b'9' => self.scan_number(ch, line, col),
            b'.' if matches!(self.peek(), Some(b'0'..=b'9')) => self.scan_number(ch, line, col),
            b'a'..=b'z' | b'A'..=b'Z' | b'_' | b'$' => self.scan_identifier(),
            b'`' => {
                let span = self.span_from(line, col);
                self.emit_error("template literals are not supported", span);
                while let Some(c) = self.advance() {
                    if c == b'`' {
                        break;
                    }
                }
                return self.scan_token();
            }
            _ => match self.scan_operator(ch) {
                Some(kind) => kind,
                None => {
                    let span = self.span_from(line, col);
                    let shown = self.text[self.pos - 1..].chars().next().unwrap_or('?');
                    self.emit_error(format!("unexpected character '{shown}'"), span);
                    // skip the rest of a multi-byte character
                    while matches!(self.peek(), Some(b) if b & 0xC0 == 0x80) {
                        self.advance();
                    }
                    return self.scan_token();
                }
            },
        };
        Token::new(kind, self.span_from(line, col), newline_before)
    }

    fn scan_operator(&mut self, ch: u8) -> Option<TokenKind> {
        use TokenKind as T;
        Some(match ch {
            b'(' => T::LParen,
            b')' => T::RParen,
            b'{' => T::LBrace,
            b'}' => T::RBrace,
            b'[' => T::LBracket,
            b']' => T::RBracket,
            b';' => T::Semi,
            b',' => T::Comma,
            b'.' => T::Dot,
            b':' => T::Colon,
            b'~' => T::Tilde,
            b'?' => {
                if self.eat(b'?') {
                    T::QuestionQuestion
                } else {
                    T::Question
                }
            }
            b'=' => {
                if self.eat(b'>') {
                    T::Arrow
                } else if self.eat(b'=') {
                    if self.eat(b'=') {
                        T::EqEqEq
                    } else {
                        T::EqEq
                    }
                } else {
                    T::Assign
                }
            }
            b'!' => {
                if self.eat(b'=') {
                    if self.eat(b'=') {
                        T::NotEqEq
                    } else {
                        T::NotEq
                    }
                } else {
                    T::Bang
                }
            }
            b'+' => {
                if self.eat(b'+') {
                    T::PlusPlus
                } else if self.eat(b'=') {
                    T::PlusAssign
                } else {
                    T::Plus
                }
            }
            b'-' => {
                if self.eat(b'-') {
                    T::MinusMinus
                } else if self.eat(b'=') {
                    T::MinusAssign
                } else {
                    T::Minus
                }
            }
            b'*' => {
                if self.eat(b'*') {
                    T::StarStar
                } else if self.eat(b'=') {
                    T::StarAssign
                } else {
                    T::Star
                }
            }
            b'/' => {
                if self.eat(b'=') {
                    T::SlashAssign
                } else {
                    T::Slash
                }
            }
            b'%' => {
                if self.eat(b'=') {
                    T::PercentAssign
                } else {
                    T::Percent
                }
            }
            b'&' => {
                if self.eat(b'&') {
                    T::AmpAmp
                } else if self.eat(b'=') {
                    T::AmpAssign
                } else {
                    T::Amp
                }
            }
            b'|' => {
                if self.eat(b'|') {
                    T::PipePipe
                } else if self.eat(b'=') {
                    T::PipeAssign
                } else {
                    T::Pipe
                }
            }
            b'^' => {
                if self.eat(b'=') {
                    T::CaretAssign
                } else {
                    T::Caret
                }
            }
            b'<' => {
                if self.eat(b'<') {
                    if self.eat(b'=') {
                        T::ShlAssign
                    } else {
                        T::Shl
                    }
                } else if self.eat(b'=') {
                    T::LtEq
                } else {
                    T::Lt
                }
            }
            b'>' => {
                if self.eat(b'>') {
                    if self.eat(b'>') {
                        if self.eat(b'=') {
                            T::UShrAssign
                        } else {
                            T::UShr
                        }
                    } else if self.eat(b'=') {
                        T::ShrAssign
                    } else {
                        T::Shr
                    }
                } else if self.eat(b'=') {
                    T::GtEq
                } else {
                    T::Gt
                }
            }
            _ => return None,
        })
    }

    // ─────────────────────────────────────────────────────────────
    // Number literals
    // ─────────────────────────────────────────────────────────────

    fn scan_number(&mut self, first: u8, line: u32, col: u32) -> TokenKind {
        let start = self.pos - 1;
        if first == b'0' {
            let radix = match self.peek() {
                Some(b'x' | b'X') => Some(16),
                Some(b'b' | b'B') => Some(2),
                Some(b'o' | b'O') => Some(8),
                _ => None,
            };
            if let Some(radix) = radix {
                self.advance();
                let digits_start = self.pos;
                while matches!(self.peek(), Some(c) if (c as char).is_digit(radix)) {
                    self.advance();
                }
                let digits = &self.text[digits_start..self.pos];
                return match u64::from_str_radix(digits, radix) {
                    Ok(v) => TokenKind::Number(v as f64),
                    Err(_) => {
                        let span = self.span_from(line, col);
                        self.emit_error("malformed number literal", span);
                        TokenKind::Number(0.0)
                    }
                };
            }
        }

        while let Some(b'0'..=b'9') = self.peek() {
            self.advance();
        }
        if first != b'.' && self.peek() == Some(b'.') {
            self.advance();
            while let Some(b'0'..=b'9') = self.peek() {
                self.advance();
            }
        }
        if matches!(self.peek(), Some(b'e' | b'E')) {
            let sign = usize::from(matches!(self.peek_at(1), Some(b'+' | b'-')));
            if matches!(self.peek_at(1 + sign), Some(b'0'..=b'9')) {
                self.advance();
                if sign == 1 {
                    self.advance();
                }
                while let Some(b'0'..=b'9') = self.peek() {
                    self.advance();
                }
            }
        }

        let text = &self.text[start..self.pos];
        match text.parse::<f64>() {
            Ok(v) => TokenKind::Number(v),
            Err(_) => {
                let span = self.span_from(line, col);
                self.emit_error(format!("malformed number literal '{text}'"), span);
                TokenKind::Number(0.0)
            }
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Identifiers & keywords
    // ─────────────────────────────────────────────────────────────

    fn scan_identifier(&mut self) -> TokenKind {
        let start = self.pos - 1;
        while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric() || c == b'_' || c == b'$')
        {
            self.advance();
        }
        let word = &self.text[start..self.pos];
        TokenKind::from_keyword(word).unwrap_or_else(|| TokenKind::Ident(word.to_string()))
    }

    // ─────────────────────────────────────────────────────────────
    // String literals
    // ─────────────────────────────────────────────────────────────

    fn scan_string(&mut self, quote: u8, line: u32, col: u32) -> TokenKind {
        let mut bytes = Vec::new();
        loop {
            let Some(ch) = self.advance() else {
                let span = self.span_from(line, col);
                self.emit_error("unterminated string literal", span);
                break;
            };
            match ch {
                c if c == quote => break,
                b'\n' => {
                    let span = self.span_from(line, col);
                    self.emit_error("unterminated string literal", span);
                    break;
                }
                b'\\' => self.scan_escape(&mut bytes),
                c => bytes.push(c),
            }
        }
        TokenKind::Str(String::from_utf8_lossy(&bytes).into_owned())
    }

    fn scan_escape(&mut self, out: &mut Vec<u8>) {
        let (line, col) = (self.line, self.col);
        let Some(ch) = self.advance() else {
            return;
        };
        let code = match ch {
            b'n' => '\n' as u32,
            b't' => '\t' as u32,
            b'r' => '\r' as u32,
            b'b' => 0x08,
            b'f' => 0x0C,
            b'v' => 0x0B,
            b'0' if !matches!(self.peek(), Some(b'0'..=b'9')) => 0,
            b'\n' => return, // line continuation
            b'x' => match self.scan_hex_digits(2) {
                Some(v) => v,
                None => return self.bad_escape(line, col),
            },
            b'u' => {
                let value = if self.eat(b'{') {
                    let start = self.pos;
                    while matches!(self.peek(), Some(c) if c.is_ascii_hexdigit()) {
                        self.advance();
                    }
                    let digits = &self.text[start..self.pos];
                    let value = u32::from_str_radix(digits, 16).ok();
                    if !self.eat(b'}') {
                        return self.bad_escape(line, col);
                    }
                    value
                } else {
                    self.scan_hex_digits(4)
                };
                match value {
                    Some(v) => v,
                    None => return self.bad_escape(line, col),
                }
            }
            other => {
                out.push(other);
                return;
            }
        };
        let c = char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER);
        let mut buf = [0u8; 4];
        out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
    }

    fn scan_hex_digits(&mut self, count: usize) -> Option<u32> {
        let start = self.pos;
        for _ in 0..count {
            match self.peek() {
                Some(c) if c.is_ascii_hexdigit() => {
                    self.advance();
                }
                _ => return None,
            }
        }
        u32::from_str_radix(&self.text[start..self.pos], 16).ok()
    }

    fn bad_escape(&mut self, line: u32, col: u32) {
        let span = self.span_from(line, col);
        self.emit_error("malformed escape sequence", span);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        let result = Lexer::new(src, "test").lex();
        assert!(result.errors.is_empty(), "{}", result.errors);
        result.tokens.into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_longest_operator_wins() {
        assert_eq!(
            kinds("a >>>= b >> c === d"),
            vec![
                TokenKind::Ident("a".into()),
                TokenKind::UShrAssign,
                TokenKind::Ident("b".into()),
                TokenKind::Shr,
                TokenKind::Ident("c".into()),
                TokenKind::EqEqEq,
                TokenKind::Ident("d".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_newline_flag() {
        let result = Lexer::new("a\n  b c", "test").lex();
        let flags: Vec<bool> = result.tokens.iter().map(|t| t.newline_before).collect();
        assert_eq!(flags, vec![false, true, false, true]);
    }
}
