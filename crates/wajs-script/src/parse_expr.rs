//! Expression parsing.
//!
//! Binary operators use precedence climbing. Levels, loosest first:
//!
//! | Level | Operators               |
//! |-------|-------------------------|
//! | 1     | `??`                    |
//! | 2     | `\|\|`                  |
//! | 3     | `&&`                    |
//! | 4     | `\|`                    |
//! | 5     | `^`                     |
//! | 6     | `&`                     |
//! | 7     | `==` `!=` `===` `!==`   |
//! | 8     | `<` `>` `<=` `>=`       |
//! | 9     | `<<` `>>` `>>>`         |
//! | 10    | `+` `-`                 |
//! | 11    | `*` `/` `%`             |
//!
//! `**` binds tighter than every binary level and is right-associative.

use std::rc::Rc;

use crate::ast::*;
use crate::parser::Parser;
use crate::token::TokenKind;

enum Infix {
    Binary(BinaryOp),
    Logical(LogicalOp),
}

fn infix(kind: &TokenKind) -> Option<(u8, Infix)> {
    use TokenKind as T;
    Some(match kind {
        T::QuestionQuestion => (1, Infix::Logical(LogicalOp::Nullish)),
        T::PipePipe => (2, Infix::Logical(LogicalOp::Or)),
        T::AmpAmp => (3, Infix::Logical(LogicalOp::And)),
        T::Pipe => (4, Infix::Binary(BinaryOp::BitOr)),
        T::Caret => (5, Infix::Binary(BinaryOp::BitXor)),
        T::Amp => (6, Infix::Binary(BinaryOp::BitAnd)),
        T::EqEq => (7, Infix::Binary(BinaryOp::Eq)),
        T::NotEq => (7, Infix::Binary(BinaryOp::NotEq)),
        T::EqEqEq => (7, Infix::Binary(BinaryOp::StrictEq)),
        T::NotEqEq => (7, Infix::Binary(BinaryOp::StrictNotEq)),
        T::Lt => (8, Infix::Binary(BinaryOp::Lt)),
        T::Gt => (8, Infix::Binary(BinaryOp::Gt)),
        T::LtEq => (8, Infix::Binary(BinaryOp::LtEq)),
        T::GtEq => (8, Infix::Binary(BinaryOp::GtEq)),
        T::Shl => (9, Infix::Binary(BinaryOp::Shl)),
        T::Shr => (9, Infix::Binary(BinaryOp::Shr)),
        T::UShr => (9, Infix::Binary(BinaryOp::UShr)),
        T::Plus => (10, Infix::Binary(BinaryOp::Add)),
        T::Minus => (10, Infix::Binary(BinaryOp::Sub)),
        T::Star => (11, Infix::Binary(BinaryOp::Mul)),
        T::Slash => (11, Infix::Binary(BinaryOp::Div)),
        T::Percent => (11, Infix::Binary(BinaryOp::Rem)),
        _ => return None,
    })
}

fn compound_assign(kind: &TokenKind) -> Option<Option<BinaryOp>> {
    use TokenKind as T;
    Some(match kind {
        T::Assign => None,
        T::PlusAssign => Some(BinaryOp::Add),
        T::MinusAssign => Some(BinaryOp::Sub),
        T::StarAssign => Some(BinaryOp::Mul),
        T::SlashAssign => Some(BinaryOp::Div),
        T::PercentAssign => Some(BinaryOp::Rem),
        T::AmpAssign => Some(BinaryOp::BitAnd),
        T::PipeAssign => Some(BinaryOp::BitOr),
        T::CaretAssign => Some(BinaryOp::BitXor),
        T::ShlAssign => Some(BinaryOp::Shl),
        T::ShrAssign => Some(BinaryOp::Shr),
        T::UShrAssign => Some(BinaryOp::UShr),
        _ => return None,
    })
}

impl<'src> Parser<'src> {
    /// `Expression = Assignment { "," Assignment }`
    pub(crate) fn parse_expression(&mut self) -> Option<Expr> {
        let first = self.parse_assignment()?;
        if !self.check(&TokenKind::Comma) {
            return Some(first);
        }
        let start = first.span;
        let mut items = vec![first];
        while self.eat(&TokenKind::Comma) {
            items.push(self.parse_assignment()?);
        }
        let span = start.to(self.previous_span());
        Some(Expr::new(ExprKind::Sequence(items), span))
    }

    pub(crate) fn parse_assignment(&mut self) -> Option<Expr> {
        if self.at_arrow() {
            return self.parse_arrow();
        }
        if !self.enter() {
            return None;
        }
        let result = self.parse_assignment_inner();
        self.leave();
        result
    }

    fn parse_assignment_inner(&mut self) -> Option<Expr> {
        let target = self.parse_conditional()?;
        let Some(op) = compound_assign(self.peek_kind()) else {
            return Some(target);
        };
        if !target.is_assignable() {
            self.error_at_current("invalid assignment target");
            return None;
        }
        self.advance();
        let value = self.parse_assignment()?;
        let span = target.span.to(value.span);
        Some(Expr::new(
            ExprKind::Assign {
                op,
                target: Box::new(target),
                value: Box::new(value),
            },
            span,
        ))
    }

    /// `x => ...` or `(a, b) => ...` ahead.
    fn at_arrow(&self) -> bool {
        match self.peek_kind() {
            TokenKind::Ident(_) => matches!(self.look_ahead(1), TokenKind::Arrow),
            TokenKind::LParen => {
                let mut i = 1;
                loop {
                    match self.look_ahead(i) {
                        TokenKind::Ident(_) | TokenKind::Comma => i += 1,
                        TokenKind::RParen => {
                            return matches!(self.look_ahead(i + 1), TokenKind::Arrow)
                        }
                        _ => return false,
                    }
                }
            }
            _ => false,
        }
    }

    fn parse_arrow(&mut self) -> Option<Expr> {
        let start = self.current_span();
        let params = if self.eat(&TokenKind::LParen) {
            self.parse_params()?
        } else {
            vec![self.expect_identifier()?]
        };
        self.expect(&TokenKind::Arrow)?;
        let body = if self.check(&TokenKind::LBrace) {
            FunctionBody::Block(self.parse_block()?)
        } else {
            FunctionBody::Expr(Box::new(self.parse_assignment()?))
        };
        let span = start.to(self.previous_span());
        let def = FunctionDef {
            name: None,
            params,
            body,
            span,
        };
        Some(Expr::new(ExprKind::Function(Rc::new(def)), span))
    }

    fn parse_conditional(&mut self) -> Option<Expr> {
        let test = self.parse_binary(1)?;
        if !self.eat(&TokenKind::Question) {
            return Some(test);
        }
        let then = self.parse_assignment()?;
        self.expect(&TokenKind::Colon)?;
        let els = self.parse_assignment()?;
        let span = test.span.to(els.span);
        Some(Expr::new(
            ExprKind::Conditional {
                test: Box::new(test),
                then: Box::new(then),
                els: Box::new(els),
            },
            span,
        ))
    }

    fn parse_binary(&mut self, min_prec: u8) -> Option<Expr> {
        let mut left = self.parse_unary(true)?;
        while let Some((prec, op)) = infix(self.peek_kind()) {
            if prec < min_prec {
                break;
            }
            self.advance();
            let right = self.parse_binary(prec + 1)?;
            let span = left.span.to(right.span);
            let (left_box, right_box) = (Box::new(left), Box::new(right));
            let kind = match op {
                Infix::Binary(op) => ExprKind::Binary {
                    op,
                    left: left_box,
                    right: right_box,
                },
                Infix::Logical(op) => ExprKind::Logical {
                    op,
                    left: left_box,
                    right: right_box,
                },
            };
            left = Expr::new(kind, span);
        }
        Some(left)
    }

    /// Prefix operators. Their operand may not be an unparenthesized `**`.
    fn parse_unary(&mut self, allow_exponent: bool) -> Option<Expr> {
        let op = match self.peek_kind() {
            TokenKind::Minus => UnaryOp::Neg,
            TokenKind::Plus => UnaryOp::Plus,
            TokenKind::Bang => UnaryOp::Not,
            TokenKind::Tilde => UnaryOp::BitNot,
            TokenKind::Typeof => UnaryOp::Typeof,
            TokenKind::Void => UnaryOp::Void,
            TokenKind::PlusPlus | TokenKind::MinusMinus => return self.parse_prefix_update(),
            _ if allow_exponent => return self.parse_exponent(),
            _ => return self.parse_postfix(),
        };
        let start = self.advance().span;
        if !self.enter() {
            return None;
        }
        let operand = self.parse_unary(false);
        self.leave();
        let operand = operand?;
        if matches!(self.peek_kind(), TokenKind::StarStar) {
            self.error_at_current("unary operand of '**' must be parenthesized");
            return None;
        }
        let span = start.to(operand.span);
        Some(Expr::new(
            ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
            span,
        ))
    }

    fn parse_prefix_update(&mut self) -> Option<Expr> {
        let token = self.advance();
        let increment = token.kind == TokenKind::PlusPlus;
        let target = self.parse_unary(false)?;
        if !target.is_assignable() {
            self.error_at(format!("invalid operand for {}", token.kind), target.span);
            return None;
        }
        let span = token.span.to(target.span);
        Some(Expr::new(
            ExprKind::Update {
                increment,
                prefix: true,
                target: Box::new(target),
            },
            span,
        ))
    }

    /// `Exponent = Postfix [ "**" Unary ]`
    fn parse_exponent(&mut self) -> Option<Expr> {
        let base = self.parse_postfix()?;
        if !self.eat(&TokenKind::StarStar) {
            return Some(base);
        }
        let exponent = self.parse_unary(true)?;
        let span = base.span.to(exponent.span);
        Some(Expr::new(
            ExprKind::Binary {
                op: BinaryOp::Exp,
                left: Box::new(base),
                right: Box::new(exponent),
            },
            span,
        ))
    }

    fn parse_postfix(&mut self) -> Option<Expr> {
        let expr = self.parse_call()?;
        let increment = match self.peek_kind() {
            TokenKind::PlusPlus => true,
            TokenKind::MinusMinus => false,
            _ => return Some(expr),
        };
        if self.newline_before() {
            return Some(expr);
        }
        if !expr.is_assignable() {
            self.error_at_current("invalid operand for postfix update");
            return None;
        }
        self.advance();
        let span = expr.span.to(self.previous_span());
        Some(Expr::new(
            ExprKind::Update {
                increment,
                prefix: false,
                target: Box::new(expr),
            },
            span,
        ))
    }

    /// Member access, indexing and calls, left to right.
    fn parse_call(&mut self) -> Option<Expr> {
        let mut expr = if self.check(&TokenKind::New) {
            self.parse_new()?
        } else {
            self.parse_primary()?
        };
        loop {
            expr = match self.peek_kind() {
                TokenKind::Dot => {
                    self.advance();
                    let property = self.expect_property_name()?;
                    let span = expr.span.to(self.previous_span());
                    Expr::new(
                        ExprKind::Member {
                            object: Box::new(expr),
                            property,
                        },
                        span,
                    )
                }
                TokenKind::LBracket => {
                    self.advance();
                    let index = self.parse_expression()?;
                    self.expect(&TokenKind::RBracket)?;
                    let span = expr.span.to(self.previous_span());
                    Expr::new(
                        ExprKind::Index {
                            object: Box::new(expr),
                            index: Box::new(index),
                        },
                        span,
                    )
                }
                TokenKind::LParen => {
                    self.advance();
                    let args = self.parse_arguments()?;
                    let span = expr.span.to(self.previous_span());
                    Expr::new(
                        ExprKind::Call {
                            callee: Box::new(expr),
                            args,
                        },
                        span,
                    )
                }
                _ => return Some(expr),
            };
        }
    }

    /// `New = "new" MemberPath [ "(" Args ")" ]`
    fn parse_new(&mut self) -> Option<Expr> {
        let start = self.advance().span;
        let mut callee = match self.peek_kind().clone() {
            TokenKind::Ident(name) => {
                let span = self.advance().span;
                Expr::new(ExprKind::Ident(name), span)
            }
            other => {
                self.error_at_current(format!("expected constructor name, got {other}"));
                return None;
            }
        };
        while self.eat(&TokenKind::Dot) {
            let property = self.expect_property_name()?;
            let span = callee.span.to(self.previous_span());
            callee = Expr::new(
                ExprKind::Member {
                    object: Box::new(callee),
                    property,
                },
                span,
            );
        }
        let args = if self.eat(&TokenKind::LParen) {
            self.parse_arguments()?
        } else {
            Vec::new()
        };
        let span = start.to(self.previous_span());
        Some(Expr::new(
            ExprKind::New {
                callee: Box::new(callee),
                args,
            },
            span,
        ))
    }

    /// Arguments after `(`, consuming the closing `)`.
    fn parse_arguments(&mut self) -> Option<Vec<Expr>> {
        let mut args = Vec::new();
        while !self.check(&TokenKind::RParen) {
            args.push(self.parse_assignment()?);
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RParen)?;
        Some(args)
    }

    fn parse_primary(&mut self) -> Option<Expr> {
        let span = self.current_span();
        let kind = match self.peek_kind().clone() {
            TokenKind::Number(n) => ExprKind::Number(n),
            TokenKind::Str(s) => ExprKind::Str(Rc::from(s.as_str())),
            TokenKind::Ident(name) => ExprKind::Ident(name),
            TokenKind::True => ExprKind::Bool(true),
            TokenKind::False => ExprKind::Bool(false),
            TokenKind::Null => ExprKind::Null,
            TokenKind::Undefined => ExprKind::Undefined,
            TokenKind::This => ExprKind::This,
            TokenKind::Function => {
                let def = self.parse_function_literal()?;
                let span = span.to(self.previous_span());
                return Some(Expr::new(ExprKind::Function(def), span));
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expression()?;
                self.expect(&TokenKind::RParen)?;
                return Some(Expr::new(inner.kind, span.to(self.previous_span())));
            }
            TokenKind::LBracket => return self.parse_array_literal(),
            TokenKind::LBrace => return self.parse_object_literal(),
            other => {
                self.error_at_current(format!("unexpected {other}"));
                return None;
            }
        };
        self.advance();
        Some(Expr::new(kind, span))
    }

    fn parse_array_literal(&mut self) -> Option<Expr> {
        let start = self.advance().span;
        let mut items = Vec::new();
        while !self.check(&TokenKind::RBracket) {
            items.push(self.parse_assignment()?);
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RBracket)?;
        Some(Expr::new(
            ExprKind::Array(items),
            start.to(self.previous_span()),
        ))
    }

    /// `Object = "{" [ Prop { "," Prop } [","] ] "}"`, with shorthand and
    /// method properties.
    fn parse_object_literal(&mut self) -> Option<Expr> {
        let start = self.advance().span;
        let mut props = Vec::new();
        while !self.check(&TokenKind::RBrace) {
            let key_span = self.current_span();
            let key = match self.peek_kind().clone() {
                TokenKind::Str(s) => {
                    self.advance();
                    s
                }
                TokenKind::Number(n) => {
                    self.advance();
                    crate::value::number_to_string(n)
                }
                _ => self.expect_property_name()?,
            };
            let value = if self.eat(&TokenKind::Colon) {
                self.parse_assignment()?
            } else if self.eat(&TokenKind::LParen) {
                let params = self.parse_params()?;
                let body = self.parse_block()?;
                let span = key_span.to(self.previous_span());
                let def = FunctionDef {
                    name: Some(key.clone()),
                    params,
                    body: FunctionBody::Block(body),
                    span,
                };
                Expr::new(ExprKind::Function(Rc::new(def)), span)
            } else {
                Expr::new(ExprKind::Ident(key.clone()), key_span)
            };
            props.push((key, value));
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RBrace)?;
        Some(Expr::new(
            ExprKind::Object(props),
            start.to(self.previous_span()),
        ))
    }
}
