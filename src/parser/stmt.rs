//! Statement parsing.
//!
//! A parser-side stack of enclosing loops annotates `break` and `continue`
//! with their target node and records on each loop whether anything breaks
//! out of or continues it; the analyser and IR generator both key off
//! those flags.

use crate::ast::{AssignOp, BinaryOp, NodeId, NodeKind};
use crate::token::TokenKind;

use super::Parser;

fn compound_assign_op(kind: TokenKind) -> Option<BinaryOp> {
    Some(match kind {
        TokenKind::PlusEqual => BinaryOp::Add,
        TokenKind::MinusEqual => BinaryOp::Sub,
        TokenKind::StarEqual => BinaryOp::Mul,
        TokenKind::SlashEqual => BinaryOp::Div,
        TokenKind::PercentEqual => BinaryOp::Mod,
        TokenKind::AmpersandEqual => BinaryOp::BitAnd,
        TokenKind::PipeEqual => BinaryOp::BitOr,
        TokenKind::TildeEqual => BinaryOp::BitXor,
        TokenKind::LessLessEqual => BinaryOp::Shl,
        TokenKind::GreaterGreaterEqual => BinaryOp::Shr,
        _ => return None,
    })
}

impl Parser<'_, '_> {
    /// `{ ... }`, usable both as a statement and as a block expression.
    pub(crate) fn parse_compound(&mut self) -> Option<NodeId> {
        let start = self.loc();
        if !self.expect(TokenKind::OpenBrace) {
            return None;
        }
        let scope = self.push_scope();
        let mut children = Vec::new();
        while !self.at(TokenKind::CloseBrace) && !self.at_end() {
            let before = self.pos;
            if let Some(stmt) = self.parse_stmt() {
                children.push(stmt);
            }
            if self.pos == before {
                self.advance();
            }
        }
        let end = self.loc();
        self.expect(TokenKind::CloseBrace);
        self.pop_scope();
        Some(self.new_node(NodeKind::Compound { children, scope }, start.combine(end)))
    }

    pub(crate) fn parse_stmt(&mut self) -> Option<NodeId> {
        let start = self.loc();
        match self.kind() {
            TokenKind::OpenBrace => self.parse_compound(),
            TokenKind::If => self.parse_if(false),
            TokenKind::For => self.parse_for(),
            TokenKind::While => self.parse_while(),
            TokenKind::Return => {
                self.advance();
                let value = if self.at(TokenKind::Semicolon) {
                    None
                } else {
                    self.parse_expr()
                };
                self.expect(TokenKind::Semicolon);
                Some(self.new_node(NodeKind::Return { value }, start))
            }
            TokenKind::Break => {
                self.advance();
                self.expect(TokenKind::Semicolon);
                let target = self.loop_stack.last().copied();
                match target {
                    Some(target) => self.mark_loop_flag(target, true),
                    None => {
                        self.error(start, "'break' outside of a loop".to_string());
                    }
                }
                Some(self.new_node(NodeKind::Break { target }, start))
            }
            TokenKind::Continue => {
                self.advance();
                self.expect(TokenKind::Semicolon);
                let target = self.loop_stack.last().copied();
                match target {
                    Some(target) => self.mark_loop_flag(target, false),
                    None => {
                        self.error(start, "'continue' outside of a loop".to_string());
                    }
                }
                Some(self.new_node(NodeKind::Continue { target }, start))
            }
            TokenKind::Yield => {
                self.advance();
                let value = self.parse_expr()?;
                self.expect(TokenKind::Semicolon);
                Some(self.new_node(NodeKind::Yield { value }, start))
            }
            TokenKind::Xyzzy => {
                self.advance();
                self.expect(TokenKind::Semicolon);
                Some(self.new_node(NodeKind::Xyzzy, start))
            }
            TokenKind::Assert => {
                self.advance();
                self.expect(TokenKind::OpenParen);
                let condition = self.parse_expr()?;
                let message = if self.eat(TokenKind::Comma) {
                    self.parse_expr()
                } else {
                    None
                };
                self.expect(TokenKind::CloseParen);
                self.expect(TokenKind::Semicolon);
                Some(self.new_node(NodeKind::Assert { condition, message }, start))
            }
            TokenKind::Semicolon => {
                self.advance();
                Some(self.new_generated_node(NodeKind::Xyzzy, start))
            }
            _ => {
                let before = self.pos;
                if let Some(decl) = self.parse_decl(false) {
                    return Some(decl);
                }
                if self.pos != before {
                    // The declaration parser consumed something and
                    // diagnosed; don't parse the remainder as an expression.
                    return None;
                }
                self.parse_expr_stmt()
            }
        }
    }

    /// Expression statement, possibly an assignment. `=` assigns through
    /// an lvalue, `<-` rebinds a reference, and the compound forms
    /// desugar into an assignment of a binary expression.
    fn parse_expr_stmt(&mut self) -> Option<NodeId> {
        let target = self.parse_expr()?;
        let start = self.module.node(target).location;

        if self.at(TokenKind::Equal) || self.at(TokenKind::LessMinus) {
            let op = if self.at(TokenKind::Equal) {
                AssignOp::Value
            } else {
                AssignOp::Reference
            };
            self.advance();
            let value = self.parse_expr()?;
            self.expect(TokenKind::Semicolon);
            return Some(self.new_node(NodeKind::Assign { op, target, value }, start));
        }

        if let Some(bin_op) = compound_assign_op(self.kind()) {
            self.advance();
            let rhs = self.parse_expr()?;
            self.expect(TokenKind::Semicolon);
            let location = start.combine(self.module.node(rhs).location);
            let value = self.new_generated_node(
                NodeKind::Binary { op: bin_op, lhs: target, rhs },
                location,
            );
            return Some(self.new_node(
                NodeKind::Assign { op: AssignOp::Value, target, value },
                start,
            ));
        }

        self.expect(TokenKind::Semicolon);
        Some(target)
    }

    /// `if (c) pass [else if (c) pass]* [else fail]`, as a statement or an
    /// expression. The chain flattens into parallel condition/pass arrays.
    pub(crate) fn parse_if(&mut self, expr_form: bool) -> Option<NodeId> {
        let start = self.loc();
        self.expect(TokenKind::If);

        let mut conditions = Vec::new();
        let mut passes = Vec::new();
        let mut fail = None;

        self.expect(TokenKind::OpenParen);
        conditions.push(self.parse_expr()?);
        self.expect(TokenKind::CloseParen);
        passes.push(self.parse_if_arm(expr_form)?);

        while self.eat(TokenKind::Else) {
            if self.at(TokenKind::If) {
                self.advance();
                self.expect(TokenKind::OpenParen);
                conditions.push(self.parse_expr()?);
                self.expect(TokenKind::CloseParen);
                passes.push(self.parse_if_arm(expr_form)?);
            } else {
                fail = Some(self.parse_if_arm(expr_form)?);
                break;
            }
        }

        Some(self.new_node(NodeKind::If { conditions, passes, fail }, start))
    }

    fn parse_if_arm(&mut self, expr_form: bool) -> Option<NodeId> {
        if expr_form {
            if self.at(TokenKind::OpenBrace) {
                self.parse_compound()
            } else {
                self.parse_expr()
            }
        } else {
            self.parse_stmt()
        }
    }

    /// `for (init; cond; inc) pass [else fail]`. Any slot may be empty;
    /// `xyzzy` is also legal there.
    fn parse_for(&mut self) -> Option<NodeId> {
        let start = self.loc();
        self.expect(TokenKind::For);
        self.expect(TokenKind::OpenParen);

        // The loop node is created up front so break/continue inside the
        // body can point at it.
        let placeholder = self.new_generated_node(NodeKind::Xyzzy, start);
        let loop_node = self.new_node(
            NodeKind::For {
                initializer: None,
                condition: None,
                increment: None,
                pass: placeholder,
                fail: None,
                has_breaks: false,
                has_continues: false,
            },
            start,
        );

        let initializer = if self.eat(TokenKind::Semicolon) {
            None
        } else {
            self.parse_for_slot(true)
        };
        let condition = if self.at(TokenKind::Semicolon) {
            None
        } else {
            self.parse_expr()
        };
        self.expect(TokenKind::Semicolon);
        let increment = if self.at(TokenKind::CloseParen) {
            None
        } else {
            self.parse_for_slot(false)
        };
        self.expect(TokenKind::CloseParen);

        self.loop_stack.push(loop_node);
        let pass = self.parse_stmt();
        self.loop_stack.pop();
        let fail = if self.eat(TokenKind::Else) {
            self.parse_stmt()
        } else {
            None
        };

        let pass = pass.unwrap_or(placeholder);
        if let NodeKind::For {
            initializer: init_slot,
            condition: cond_slot,
            increment: inc_slot,
            pass: pass_slot,
            fail: fail_slot,
            ..
        } = &mut self.module.node_mut(loop_node).kind
        {
            *init_slot = initializer;
            *cond_slot = condition;
            *inc_slot = increment;
            *pass_slot = pass;
            *fail_slot = fail;
        }
        Some(loop_node)
    }

    /// Initializer and increment slots: a binding declaration (initializer
    /// only), an assignment, or a bare expression. The initializer form
    /// consumes its own `;`.
    fn parse_for_slot(&mut self, is_initializer: bool) -> Option<NodeId> {
        if self.at(TokenKind::Xyzzy) {
            let loc = self.loc();
            self.advance();
            if is_initializer {
                self.expect(TokenKind::Semicolon);
            }
            return Some(self.new_node(NodeKind::Xyzzy, loc));
        }

        if is_initializer {
            if let Some(decl) = self.parse_decl(false) {
                return Some(decl);
            }
        }

        let target = self.parse_expr()?;
        let start = self.module.node(target).location;
        let result = if self.at(TokenKind::Equal) || self.at(TokenKind::LessMinus) {
            let op = if self.at(TokenKind::Equal) {
                AssignOp::Value
            } else {
                AssignOp::Reference
            };
            self.advance();
            let value = self.parse_expr()?;
            Some(self.new_node(NodeKind::Assign { op, target, value }, start))
        } else if let Some(bin_op) = compound_assign_op(self.kind()) {
            self.advance();
            let rhs = self.parse_expr()?;
            let location = start.combine(self.module.node(rhs).location);
            let value = self.new_generated_node(
                NodeKind::Binary { op: bin_op, lhs: target, rhs },
                location,
            );
            Some(self.new_node(NodeKind::Assign { op: AssignOp::Value, target, value }, start))
        } else {
            Some(target)
        };
        if is_initializer {
            self.expect(TokenKind::Semicolon);
        }
        result
    }

    /// `while (cond) pass [else fail]`.
    fn parse_while(&mut self) -> Option<NodeId> {
        let start = self.loc();
        self.expect(TokenKind::While);

        let placeholder = self.new_generated_node(NodeKind::Xyzzy, start);
        let loop_node = self.new_node(
            NodeKind::While {
                condition: None,
                pass: placeholder,
                fail: None,
                has_breaks: false,
                has_continues: false,
            },
            start,
        );

        self.expect(TokenKind::OpenParen);
        let condition = self.parse_expr();
        self.expect(TokenKind::CloseParen);

        self.loop_stack.push(loop_node);
        let pass = self.parse_stmt();
        self.loop_stack.pop();
        let fail = if self.eat(TokenKind::Else) {
            self.parse_stmt()
        } else {
            None
        };

        let pass = pass.unwrap_or(placeholder);
        if let NodeKind::While {
            condition: cond_slot,
            pass: pass_slot,
            fail: fail_slot,
            ..
        } = &mut self.module.node_mut(loop_node).kind
        {
            *cond_slot = condition;
            *pass_slot = pass;
            *fail_slot = fail;
        }
        Some(loop_node)
    }

    fn mark_loop_flag(&mut self, target: NodeId, is_break: bool) {
        match &mut self.module.node_mut(target).kind {
            NodeKind::For { has_breaks, has_continues, .. }
            | NodeKind::While { has_breaks, has_continues, .. } => {
                if is_break {
                    *has_breaks = true;
                } else {
                    *has_continues = true;
                }
            }
            _ => {}
        }
    }
}
