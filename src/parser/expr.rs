//! Expression parsing.
//!
//! A small Pratt loop over ordered precedence groups: `or`/`xor`, then
//! `and`, then equality, ordered comparison, bitwise and shifts, additive,
//! multiplicative. Unary operators sit at primary level, postfix
//! (call/index/member) binds tightest.

use crate::ast::{BinaryOp, CastKind, NodeId, NodeKind, UnaryOp};
use crate::token::TokenKind;

use super::Parser;

fn binary_op(kind: TokenKind) -> Option<(u8, BinaryOp)> {
    Some(match kind {
        TokenKind::Or => (1, BinaryOp::LogOr),
        TokenKind::Xor => (1, BinaryOp::LogXor),
        TokenKind::And => (2, BinaryOp::LogAnd),
        TokenKind::EqualEqual => (3, BinaryOp::Eq),
        TokenKind::BangEqual => (3, BinaryOp::Ne),
        TokenKind::Less => (4, BinaryOp::Lt),
        TokenKind::LessEqual => (4, BinaryOp::Le),
        TokenKind::Greater => (4, BinaryOp::Gt),
        TokenKind::GreaterEqual => (4, BinaryOp::Ge),
        TokenKind::Ampersand => (5, BinaryOp::BitAnd),
        TokenKind::Pipe => (5, BinaryOp::BitOr),
        TokenKind::Tilde => (5, BinaryOp::BitXor),
        TokenKind::LessLess => (5, BinaryOp::Shl),
        TokenKind::GreaterGreater => (5, BinaryOp::Shr),
        TokenKind::Plus => (6, BinaryOp::Add),
        TokenKind::Minus => (6, BinaryOp::Sub),
        TokenKind::Star => (7, BinaryOp::Mul),
        TokenKind::Slash => (7, BinaryOp::Div),
        TokenKind::Percent => (7, BinaryOp::Mod),
        _ => return None,
    })
}

impl Parser<'_, '_> {
    pub(crate) fn parse_expr(&mut self) -> Option<NodeId> {
        self.parse_binary(0)
    }

    fn parse_binary(&mut self, min_prec: u8) -> Option<NodeId> {
        let mut lhs = self.parse_unary()?;
        while let Some((prec, op)) = binary_op(self.kind()) {
            if prec < min_prec {
                break;
            }
            self.advance();
            let rhs = self.parse_binary(prec + 1)?;
            let location = self
                .module
                .node(lhs)
                .location
                .combine(self.module.node(rhs).location);
            lhs = self.new_node(NodeKind::Binary { op, lhs, rhs }, location);
        }
        Some(lhs)
    }

    fn parse_unary(&mut self) -> Option<NodeId> {
        let op = match self.kind() {
            TokenKind::Plus => Some(UnaryOp::Pos),
            TokenKind::Minus => Some(UnaryOp::Neg),
            TokenKind::Tilde => Some(UnaryOp::Compl),
            TokenKind::Ampersand => Some(UnaryOp::AddressOf),
            TokenKind::Star => Some(UnaryOp::Deref),
            TokenKind::Not => Some(UnaryOp::Not),
            _ => None,
        };
        if let Some(op) = op {
            let start = self.loc();
            self.advance();
            let operand = self.parse_unary()?;
            let location = start.combine(self.module.node(operand).location);
            return Some(self.new_node(NodeKind::Unary { op, operand }, location));
        }
        let primary = self.parse_primary()?;
        self.parse_postfix(primary)
    }

    fn parse_postfix(&mut self, mut base: NodeId) -> Option<NodeId> {
        loop {
            match self.kind() {
                TokenKind::OpenParen => {
                    self.advance();
                    let mut args = Vec::new();
                    while !self.at(TokenKind::CloseParen) && !self.at_end() {
                        args.push(self.parse_expr()?);
                        if !self.eat(TokenKind::Comma) {
                            break;
                        }
                    }
                    let end = self.loc();
                    self.expect(TokenKind::CloseParen);
                    let location = self.module.node(base).location.combine(end);
                    base = self.new_node(NodeKind::Call { callee: base, args }, location);
                }
                TokenKind::OpenBracket => {
                    self.advance();
                    let mut indices = Vec::new();
                    while !self.at(TokenKind::CloseBracket) && !self.at_end() {
                        indices.push(self.parse_expr()?);
                        if !self.eat(TokenKind::Comma) {
                            break;
                        }
                    }
                    let end = self.loc();
                    self.expect(TokenKind::CloseBracket);
                    let location = self.module.node(base).location.combine(end);
                    base = self.new_node(NodeKind::Index { base, indices }, location);
                }
                TokenKind::Dot => {
                    self.advance();
                    let (name, name_location) = self.expect_ident()?;
                    let location = self.module.node(base).location.combine(name_location);
                    base = self.new_node(
                        NodeKind::Member {
                            base,
                            name,
                            name_location,
                            field_index: None,
                            field_offset: 0,
                        },
                        location,
                    );
                }
                _ => break,
            }
        }
        Some(base)
    }

    fn parse_primary(&mut self) -> Option<NodeId> {
        let start = self.loc();
        match self.kind() {
            TokenKind::LitInt => {
                let value = self.int_value();
                self.advance();
                Some(self.new_node(NodeKind::LitInt { value }, start))
            }
            TokenKind::LitFloat => {
                let value = self.float_value();
                self.advance();
                Some(self.new_node(NodeKind::LitFloat { value }, start))
            }
            TokenKind::LitString => {
                let value = self.text();
                self.advance();
                Some(self.new_node(NodeKind::LitString { value }, start))
            }
            TokenKind::LitRune => {
                let value = self.int_value() as u32;
                self.advance();
                Some(self.new_node(NodeKind::LitRune { value }, start))
            }
            TokenKind::True => {
                self.advance();
                Some(self.new_node(NodeKind::LitBool { value: true }, start))
            }
            TokenKind::False => {
                self.advance();
                Some(self.new_node(NodeKind::LitBool { value: false }, start))
            }
            TokenKind::Nil => {
                self.advance();
                Some(self.new_node(NodeKind::LitNil, start))
            }
            TokenKind::Ident => {
                let mut pieces = vec![(self.text(), self.loc())];
                self.advance();
                let mut location = start;
                while self.at(TokenKind::ColonColon) && self.next_kind() == TokenKind::Ident {
                    self.advance();
                    pieces.push((self.text(), self.loc()));
                    location = location.combine(self.loc());
                    self.advance();
                }
                Some(self.new_node(NodeKind::NameRef { pieces, resolved: None }, location))
            }
            TokenKind::OpenParen => {
                self.advance();
                let inner = self.parse_expr()?;
                self.expect(TokenKind::CloseParen);
                Some(inner)
            }
            TokenKind::OpenBrace => self.parse_compound(),
            TokenKind::If => self.parse_if(true),
            TokenKind::Cast => {
                self.advance();
                self.expect(TokenKind::OpenParen);
                let type_node = match self.parse_type() {
                    Some(ty) => ty,
                    None => {
                        let loc = self.loc();
                        self.error(loc, "expected a type in 'cast'".to_string());
                        return None;
                    }
                };
                self.expect(TokenKind::CloseParen);
                let operand = self.parse_unary()?;
                let location = start.combine(self.module.node(operand).location);
                Some(self.new_node(
                    NodeKind::Cast {
                        cast_kind: CastKind::Hard,
                        type_node: Some(type_node),
                        operand,
                    },
                    location,
                ))
            }
            TokenKind::Sizeof | TokenKind::Alignof | TokenKind::Offsetof => {
                let found = self.kind();
                self.error(start, format!("'{}' is not supported", found.name()));
                self.advance();
                None
            }
            _ => {
                let found = self.kind();
                self.error(start, format!("expected an expression, found '{}'", found.name()));
                None
            }
        }
    }
}
