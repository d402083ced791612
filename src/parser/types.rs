//! Type syntax.
//!
//! Prefix: optional `mut`, then a primitive keyword or a dotted name.
//! Postfix, left to right: `*` pointer, `&` reference, `[*]` buffer, `[]`
//! slice, `[expr, ...]` sized array; each step may be followed by another
//! `mut` applying to the type built so far.

use crate::ast::{NodeKind, TypeNodeRef};
use crate::token::TokenKind;

use super::Parser;

impl Parser<'_, '_> {
    /// Non-allocating probe: walks the token stream over a type and
    /// reports whether one is there. The cursor is left after the type;
    /// callers are expected to reset with a mark.
    pub(crate) fn probe_type(&mut self) -> bool {
        self.eat(TokenKind::Mut);
        match self.kind() {
            TokenKind::Void
            | TokenKind::NoReturn
            | TokenKind::Bool
            | TokenKind::BoolSized
            | TokenKind::Int
            | TokenKind::IntSized
            | TokenKind::Uint
            | TokenKind::UintSized
            | TokenKind::Float
            | TokenKind::FloatSized => self.advance(),
            TokenKind::Ident => {
                self.advance();
                while self.at(TokenKind::ColonColon) && self.next_kind() == TokenKind::Ident {
                    self.advance();
                    self.advance();
                }
            }
            _ => return false,
        }
        loop {
            match self.kind() {
                TokenKind::Star | TokenKind::Ampersand | TokenKind::Mut => self.advance(),
                TokenKind::OpenBracket => {
                    if !self.skip_balanced_brackets() {
                        return false;
                    }
                }
                _ => break,
            }
        }
        true
    }

    fn skip_balanced_brackets(&mut self) -> bool {
        let mut depth = 0usize;
        loop {
            match self.kind() {
                TokenKind::OpenBracket => depth += 1,
                TokenKind::CloseBracket => {
                    depth -= 1;
                    if depth == 0 {
                        self.advance();
                        return true;
                    }
                }
                TokenKind::Eof => return false,
                _ => {}
            }
            self.advance();
        }
    }

    /// Parses a type for real. Callers that are not sure a type is next
    /// should probe first or wrap this in a mark/restore.
    pub(crate) fn parse_type(&mut self) -> Option<TypeNodeRef> {
        let is_modifiable = self.eat(TokenKind::Mut);
        let start = self.loc();

        let node = match self.kind() {
            TokenKind::Void => {
                self.advance();
                self.new_node(NodeKind::TypeVoid, start)
            }
            TokenKind::NoReturn => {
                self.advance();
                self.new_node(NodeKind::TypeNoReturn, start)
            }
            TokenKind::Bool => {
                self.advance();
                self.new_node(NodeKind::TypeBool { bits: None }, start)
            }
            TokenKind::BoolSized => {
                let bits = self.int_value() as u16;
                self.advance();
                self.new_node(NodeKind::TypeBool { bits: Some(bits) }, start)
            }
            TokenKind::Int => {
                self.advance();
                self.new_node(NodeKind::TypeInt { signed: true, bits: None }, start)
            }
            TokenKind::IntSized => {
                let bits = self.int_value() as u16;
                self.advance();
                self.new_node(NodeKind::TypeInt { signed: true, bits: Some(bits) }, start)
            }
            TokenKind::Uint => {
                self.advance();
                self.new_node(NodeKind::TypeInt { signed: false, bits: None }, start)
            }
            TokenKind::UintSized => {
                let bits = self.int_value() as u16;
                self.advance();
                self.new_node(NodeKind::TypeInt { signed: false, bits: Some(bits) }, start)
            }
            TokenKind::Float => {
                self.advance();
                self.new_node(NodeKind::TypeFloat { bits: None }, start)
            }
            TokenKind::FloatSized => {
                let bits = self.int_value() as u16;
                self.advance();
                self.new_node(NodeKind::TypeFloat { bits: Some(bits) }, start)
            }
            TokenKind::Ident => {
                let mut pieces = vec![(self.text(), self.loc())];
                self.advance();
                while self.at(TokenKind::ColonColon) && self.next_kind() == TokenKind::Ident {
                    self.advance();
                    pieces.push((self.text(), self.loc()));
                    self.advance();
                }
                let location = pieces
                    .iter()
                    .fold(start, |acc, (_, loc)| acc.combine(*loc));
                self.new_node(NodeKind::NameRef { pieces, resolved: None }, location)
            }
            _ => return None,
        };

        let mut current = TypeNodeRef { node, is_modifiable };
        loop {
            let postfix_loc = self.loc();
            match self.kind() {
                TokenKind::Star => {
                    self.advance();
                    let node = self.new_node(NodeKind::TypePointer { elem: current }, postfix_loc);
                    current = TypeNodeRef { node, is_modifiable: self.eat(TokenKind::Mut) };
                }
                TokenKind::Ampersand => {
                    self.advance();
                    let node =
                        self.new_node(NodeKind::TypeReference { elem: current }, postfix_loc);
                    current = TypeNodeRef { node, is_modifiable: self.eat(TokenKind::Mut) };
                }
                TokenKind::Mut => {
                    self.advance();
                    current.is_modifiable = true;
                }
                TokenKind::OpenBracket => {
                    self.advance();
                    if self.at(TokenKind::Star) && self.next_kind() == TokenKind::CloseBracket {
                        self.advance();
                        self.advance();
                        let node =
                            self.new_node(NodeKind::TypeBuffer { elem: current }, postfix_loc);
                        current = TypeNodeRef { node, is_modifiable: self.eat(TokenKind::Mut) };
                    } else if self.at(TokenKind::CloseBracket) {
                        self.advance();
                        let node =
                            self.new_node(NodeKind::TypeSlice { elem: current }, postfix_loc);
                        current = TypeNodeRef { node, is_modifiable: self.eat(TokenKind::Mut) };
                    } else {
                        let mut lengths = Vec::new();
                        loop {
                            match self.parse_expr() {
                                Some(length) => lengths.push(length),
                                None => break,
                            }
                            if !self.eat(TokenKind::Comma) {
                                break;
                            }
                        }
                        if !self.expect(TokenKind::CloseBracket) {
                            return None;
                        }
                        let node = self.new_node(
                            NodeKind::TypeArray { elem: current, lengths },
                            postfix_loc,
                        );
                        current = TypeNodeRef { node, is_modifiable: self.eat(TokenKind::Mut) };
                    }
                }
                _ => break,
            }
        }
        Some(current)
    }
}
