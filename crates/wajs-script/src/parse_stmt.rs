//! Statement parsing.

use std::rc::Rc;

use crate::ast::*;
use crate::parser::Parser;
use crate::token::TokenKind;

impl<'src> Parser<'src> {
    pub(crate) fn parse_statements_until_eof(&mut self) -> Vec<Stmt> {
        let mut body = Vec::new();
        while !self.at_end() && !self.too_many_errors() {
            if self.check(&TokenKind::RBrace) {
                self.error_at_current("unexpected '}'");
                self.advance();
                continue;
            }
            match self.parse_statement() {
                Some(stmt) => body.push(stmt),
                None => self.synchronize(),
            }
        }
        body
    }

    /// `Block = "{" { Statement } "}"`
    pub(crate) fn parse_block(&mut self) -> Option<Vec<Stmt>> {
        self.expect(&TokenKind::LBrace)?;
        if !self.enter() {
            return None;
        }
        let mut body = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.at_end() && !self.too_many_errors() {
            match self.parse_statement() {
                Some(stmt) => body.push(stmt),
                None => self.synchronize(),
            }
        }
        self.leave();
        self.expect(&TokenKind::RBrace)?;
        Some(body)
    }

    pub(crate) fn parse_statement(&mut self) -> Option<Stmt> {
        match self.peek_kind() {
            TokenKind::LBrace => self.parse_block().map(Stmt::Block),
            TokenKind::Semi => {
                self.advance();
                Some(Stmt::Empty)
            }
            TokenKind::Var => self.parse_decl_statement(DeclKind::Var),
            TokenKind::Let => self.parse_decl_statement(DeclKind::Let),
            TokenKind::Const => self.parse_decl_statement(DeclKind::Const),
            TokenKind::Function if matches!(self.look_ahead(1), TokenKind::Ident(_)) => {
                let def = self.parse_function_literal()?;
                Some(Stmt::Function(def))
            }
            TokenKind::Return => self.parse_return(),
            TokenKind::If => self.parse_if(),
            TokenKind::While => self.parse_while(),
            TokenKind::Do => self.parse_do_while(),
            TokenKind::For => self.parse_for(),
            TokenKind::Break => {
                let span = self.advance().span;
                self.end_statement();
                Some(Stmt::Break(span))
            }
            TokenKind::Continue => {
                let span = self.advance().span;
                self.end_statement();
                Some(Stmt::Continue(span))
            }
            TokenKind::Throw => {
                let start = self.advance().span;
                if self.newline_before() {
                    self.error_at_current("line break after 'throw'");
                    return None;
                }
                let value = self.parse_expression()?;
                let span = start.to(value.span);
                self.end_statement();
                Some(Stmt::Throw(value, span))
            }
            TokenKind::Try => self.parse_try(),
            _ => {
                let expr = self.parse_expression()?;
                self.end_statement();
                Some(Stmt::Expr(expr))
            }
        }
    }

    /// `Decl = ("var" | "let" | "const") Binding { "," Binding }`
    fn parse_decl_statement(&mut self, kind: DeclKind) -> Option<Stmt> {
        let stmt = self.parse_decl(kind)?;
        self.end_statement();
        Some(stmt)
    }

    fn parse_decl(&mut self, kind: DeclKind) -> Option<Stmt> {
        let start = self.advance().span;
        let mut decls = Vec::new();
        loop {
            let name = self.expect_identifier()?;
            let init = if self.eat(&TokenKind::Assign) {
                Some(self.parse_assignment()?)
            } else {
                if kind == DeclKind::Const {
                    self.error_at_current(format!("missing initializer in const '{name}'"));
                }
                None
            };
            decls.push((name, init));
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        Some(Stmt::Decl {
            kind,
            decls,
            span: start.to(self.previous_span()),
        })
    }

    fn parse_return(&mut self) -> Option<Stmt> {
        let start = self.advance().span;
        let ends_here = self.check(&TokenKind::Semi)
            || self.check(&TokenKind::RBrace)
            || self.at_end()
            || self.newline_before();
        let value = if ends_here {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.end_statement();
        Some(Stmt::Return(value, start.to(self.previous_span())))
    }

    fn parse_condition(&mut self) -> Option<Expr> {
        self.expect(&TokenKind::LParen)?;
        let cond = self.parse_expression()?;
        self.expect(&TokenKind::RParen)?;
        Some(cond)
    }

    fn parse_body(&mut self) -> Option<Box<Stmt>> {
        if !self.enter() {
            return None;
        }
        let body = self.parse_statement();
        self.leave();
        body.map(Box::new)
    }

    fn parse_if(&mut self) -> Option<Stmt> {
        self.advance();
        let cond = self.parse_condition()?;
        let then = self.parse_body()?;
        let els = if self.eat(&TokenKind::Else) {
            Some(self.parse_body()?)
        } else {
            None
        };
        Some(Stmt::If { cond, then, els })
    }

    fn parse_while(&mut self) -> Option<Stmt> {
        self.advance();
        let cond = self.parse_condition()?;
        let body = self.parse_body()?;
        Some(Stmt::While { cond, body })
    }

    fn parse_do_while(&mut self) -> Option<Stmt> {
        self.advance();
        let body = self.parse_body()?;
        self.expect(&TokenKind::While)?;
        let cond = self.parse_condition()?;
        self.eat(&TokenKind::Semi);
        Some(Stmt::DoWhile { body, cond })
    }

    /// `For = "for" "(" [Init] ";" [Expr] ";" [Expr] ")" Statement`
    fn parse_for(&mut self) -> Option<Stmt> {
        self.advance();
        self.expect(&TokenKind::LParen)?;
        let init = match self.peek_kind() {
            TokenKind::Semi => None,
            TokenKind::Var => Some(Box::new(self.parse_decl(DeclKind::Var)?)),
            TokenKind::Let => Some(Box::new(self.parse_decl(DeclKind::Let)?)),
            TokenKind::Const => Some(Box::new(self.parse_decl(DeclKind::Const)?)),
            _ => Some(Box::new(Stmt::Expr(self.parse_expression()?))),
        };
        if matches!(self.peek_kind(), TokenKind::Ident(word) if word == "of") {
            self.error_at_current("for-of loops are not supported");
            return None;
        }
        self.expect(&TokenKind::Semi)?;
        let test = if self.check(&TokenKind::Semi) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect(&TokenKind::Semi)?;
        let update = if self.check(&TokenKind::RParen) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect(&TokenKind::RParen)?;
        let body = self.parse_body()?;
        Some(Stmt::For {
            init,
            test,
            update,
            body,
        })
    }

    fn parse_try(&mut self) -> Option<Stmt> {
        self.advance();
        let block = self.parse_block()?;
        let mut param = None;
        let mut handler = None;
        if self.eat(&TokenKind::Catch) {
            if self.eat(&TokenKind::LParen) {
                param = Some(self.expect_identifier()?);
                self.expect(&TokenKind::RParen)?;
            }
            handler = Some(self.parse_block()?);
        }
        let finalizer = if self.eat(&TokenKind::Finally) {
            Some(self.parse_block()?)
        } else {
            None
        };
        if handler.is_none() && finalizer.is_none() {
            self.error_at_current("'try' needs a 'catch' or 'finally' block");
            return None;
        }
        Some(Stmt::Try {
            block,
            param,
            handler,
            finalizer,
        })
    }

    /// `Function = "function" [Ident] "(" Params ")" Block`
    pub(crate) fn parse_function_literal(&mut self) -> Option<Rc<FunctionDef>> {
        let start = self.advance().span;
        let name = match self.peek_kind() {
            TokenKind::Ident(_) => self.expect_identifier(),
            _ => None,
        };
        self.expect(&TokenKind::LParen)?;
        let params = self.parse_params()?;
        let body = self.parse_block()?;
        Some(Rc::new(FunctionDef {
            name,
            params,
            body: FunctionBody::Block(body),
            span: start.to(self.previous_span()),
        }))
    }

    /// Parameter names after `(`, consuming the closing `)`.
    pub(crate) fn parse_params(&mut self) -> Option<Vec<String>> {
        let mut params = Vec::new();
        if self.eat(&TokenKind::RParen) {
            return Some(params);
        }
        loop {
            params.push(self.expect_identifier()?);
            if self.eat(&TokenKind::Comma) {
                if self.check(&TokenKind::RParen) {
                    break;
                }
                continue;
            }
            break;
        }
        self.expect(&TokenKind::RParen)?;
        Some(params)
    }
}
