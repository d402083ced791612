//! Recursive-descent parser for Laye.
//!
//! The parser holds the current token, one token of lookahead, and a
//! mark/restore primitive used for speculative parsing: a failed probe
//! resets the cursor, discards the diagnostics it produced, and frees the
//! nodes it allocated, leaving the parser bit-identical to its pre-probe
//! state. Declarations and statements share one entry point because the
//! declaration parser decides "type followed by identifier?" with a probe
//! and re-enters as an expression statement when the probe fails.

mod expr;
mod stmt;
mod types;

use crate::ast::{DeclAttrs, DeclFlags, ImportQuery, Mangling, NodeId, NodeKind, TypeNodeRef};
use crate::context::Context;
use crate::diag::Severity;
use crate::intern::Symbol;
use crate::lexer::lex_file;
use crate::module::Module;
use crate::scope::{ScopeId, ScopeTree};
use crate::source::Location;
use crate::token::TokenKind;
use crate::types::{CallConv, TypeRef, VarargsStyle};

/// Lexes and parses one module's source into its node storage and scope
/// tree. Import resolution happens later; see `crate::resolver`.
pub fn parse_module(ctx: &mut Context, module: &mut Module) {
    module.tokens = lex_file(ctx, module.source);
    let mut parser = Parser::new(ctx, module);
    parser.parse_top_level();
}

/// Snapshot for speculative parsing.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ParseMark {
    pos: usize,
    diag_count: usize,
    node_count: usize,
}

pub(crate) struct Parser<'ctx, 'm> {
    pub(crate) ctx: &'ctx mut Context,
    pub(crate) module: &'m mut Module,
    pub(crate) pos: usize,
    /// Enclosing loops, innermost last; targets for `break`/`continue`.
    pub(crate) loop_stack: Vec<NodeId>,
    scope_stack: Vec<ScopeId>,
}

impl<'ctx, 'm> Parser<'ctx, 'm> {
    pub(crate) fn new(ctx: &'ctx mut Context, module: &'m mut Module) -> Self {
        Parser {
            ctx,
            module,
            pos: 0,
            loop_stack: Vec::new(),
            scope_stack: vec![ScopeTree::MODULE],
        }
    }

    // ----- token cursor -------------------------------------------------

    pub(crate) fn kind(&self) -> TokenKind {
        self.module.tokens[self.pos].kind
    }

    pub(crate) fn next_kind(&self) -> TokenKind {
        let next = (self.pos + 1).min(self.module.tokens.len() - 1);
        self.module.tokens[next].kind
    }

    pub(crate) fn loc(&self) -> Location {
        self.module.tokens[self.pos].location
    }

    pub(crate) fn text(&self) -> Symbol {
        self.module.tokens[self.pos].text
    }

    pub(crate) fn int_value(&self) -> u64 {
        self.module.tokens[self.pos].int_value
    }

    pub(crate) fn float_value(&self) -> f64 {
        self.module.tokens[self.pos].float_value
    }

    pub(crate) fn at(&self, kind: TokenKind) -> bool {
        self.kind() == kind
    }

    pub(crate) fn at_end(&self) -> bool {
        self.at(TokenKind::Eof)
    }

    pub(crate) fn advance(&mut self) {
        if self.pos + 1 < self.module.tokens.len() {
            self.pos += 1;
        }
    }

    pub(crate) fn eat(&mut self, kind: TokenKind) -> bool {
        if self.at(kind) {
            self.advance();
            return true;
        }
        false
    }

    pub(crate) fn expect(&mut self, kind: TokenKind) -> bool {
        if self.eat(kind) {
            return true;
        }
        let found = self.kind();
        let loc = self.loc();
        self.error(loc, format!("expected '{}', found '{}'", kind.name(), found.name()));
        false
    }

    pub(crate) fn expect_ident(&mut self) -> Option<(Symbol, Location)> {
        if self.at(TokenKind::Ident) {
            let name = self.text();
            let loc = self.loc();
            self.advance();
            return Some((name, loc));
        }
        let loc = self.loc();
        let found = self.kind();
        self.error(loc, format!("expected an identifier, found '{}'", found.name()));
        None
    }

    pub(crate) fn error(&mut self, location: Location, message: String) {
        self.ctx.diagnose(Severity::Error, location, message);
    }

    // ----- speculative parsing ------------------------------------------

    pub(crate) fn mark(&self) -> ParseMark {
        ParseMark {
            pos: self.pos,
            diag_count: self.ctx.diagnostics().len(),
            node_count: self.module.nodes.len(),
        }
    }

    pub(crate) fn restore(&mut self, mark: ParseMark) {
        self.pos = mark.pos;
        self.ctx.diagnostics_mut().truncate(mark.diag_count);
        self.module.nodes.truncate(mark.node_count);
    }

    // ----- nodes and scopes ---------------------------------------------

    pub(crate) fn new_node(&mut self, kind: NodeKind, location: Location) -> NodeId {
        let unknown = TypeRef::new(self.ctx.types.unknown);
        self.module.new_node(kind, location, unknown)
    }

    pub(crate) fn new_generated_node(&mut self, kind: NodeKind, location: Location) -> NodeId {
        let id = self.new_node(kind, location);
        self.module.node_mut(id).compiler_generated = true;
        id
    }

    pub(crate) fn current_scope(&self) -> ScopeId {
        *self.scope_stack.last().unwrap_or(&ScopeTree::MODULE)
    }

    pub(crate) fn push_scope(&mut self) -> ScopeId {
        let id = self.module.scopes.push(self.current_scope());
        self.scope_stack.push(id);
        id
    }

    pub(crate) fn push_function_scope(&mut self, name: Symbol) -> ScopeId {
        let id = self.module.scopes.push_function(self.current_scope(), name);
        self.scope_stack.push(id);
        id
    }

    pub(crate) fn pop_scope(&mut self) {
        self.scope_stack.pop();
    }

    pub(crate) fn declare(&mut self, name: Symbol, node: NodeId) {
        let scope = self.current_scope();
        if let Err(_existing) = self.module.scopes.declare(scope, name, node) {
            let loc = self.module.node(node).location;
            let name_text = self.ctx.interner.resolve(name).to_string();
            self.error(loc, format!("redeclaration of '{name_text}'"));
        }
    }

    // ----- top level ----------------------------------------------------

    pub(crate) fn parse_top_level(&mut self) {
        while !self.at_end() {
            let before = self.pos;
            if let Some(decl) = self.parse_decl(true) {
                self.module.top_level.push(decl);
            }
            if self.pos == before {
                // Nothing consumed; skip the offending token so parsing
                // always makes progress.
                self.advance();
            }
        }
    }

    /// Parses one declaration, or (when `top_level` is false and no
    /// declaration matches) defers to the statement parser's caller by
    /// returning `None` without consuming anything.
    pub(crate) fn parse_decl(&mut self, top_level: bool) -> Option<NodeId> {
        let start = self.loc();
        let attrs = self.parse_attrs();

        match self.kind() {
            TokenKind::Import => {
                let is_export = attrs.is_exported();
                return self.parse_import(start, is_export);
            }
            TokenKind::Struct => return self.parse_struct(start, attrs),
            TokenKind::Alias => return self.parse_alias(start, attrs),
            TokenKind::Enum
            | TokenKind::Test
            | TokenKind::Operator
            | TokenKind::Global
            | TokenKind::Const
            | TokenKind::Defer
            | TokenKind::Goto
            | TokenKind::Switch
            | TokenKind::Do
            | TokenKind::New
            | TokenKind::Delete
            | TokenKind::Try
            | TokenKind::Catch => {
                let loc = self.loc();
                let found = self.kind();
                self.error(loc, format!("'{}' is not supported", found.name()));
                self.synchronize();
                return None;
            }
            _ => {}
        }

        // A declaration is a type followed by an identifier; probe without
        // allocating, then reset and re-enter as an expression statement
        // when the probe fails.
        let mark = self.mark();
        let probed = self.probe_type() && self.at(TokenKind::Ident);
        self.restore(mark);
        if !probed {
            if top_level {
                let loc = self.loc();
                let found = self.kind();
                self.error(loc, format!("expected a declaration, found '{}'", found.name()));
                self.synchronize();
            }
            return None;
        }

        let type_node = self.parse_type()?;
        let (name, name_location) = self.expect_ident()?;

        if self.at(TokenKind::OpenParen) {
            self.parse_function_rest(start, attrs, type_node, name, name_location)
        } else {
            self.parse_binding_rest(start, attrs, type_node, name, name_location)
        }
    }

    /// Attribute prefix: `export`, `discardable`, `inline`,
    /// `foreign [("none"|"laye")] ["name"]`, `callconv ("cdecl"|"laye")`.
    fn parse_attrs(&mut self) -> DeclAttrs {
        let mut attrs = DeclAttrs::default();
        loop {
            match self.kind() {
                TokenKind::Export => {
                    attrs.flags |= DeclFlags::EXPORT;
                    self.advance();
                }
                TokenKind::Inline => {
                    attrs.flags |= DeclFlags::INLINE;
                    self.advance();
                }
                TokenKind::Discardable => {
                    attrs.flags |= DeclFlags::DISCARDABLE;
                    self.advance();
                }
                TokenKind::Foreign => {
                    self.advance();
                    attrs.flags |= DeclFlags::FOREIGN;
                    attrs.mangling = Mangling::None;
                    if self.eat(TokenKind::OpenParen) {
                        let loc = self.loc();
                        if self.at(TokenKind::LitString) {
                            let scheme = self.ctx.interner.resolve(self.text()).to_string();
                            self.advance();
                            match scheme.as_str() {
                                "none" => attrs.mangling = Mangling::None,
                                "laye" => attrs.mangling = Mangling::Laye,
                                other => {
                                    self.error(
                                        loc,
                                        format!("unknown mangling scheme '{other}'"),
                                    );
                                }
                            }
                        } else {
                            self.error(loc, "expected a mangling scheme string".to_string());
                        }
                        self.expect(TokenKind::CloseParen);
                    }
                    if self.at(TokenKind::LitString) {
                        attrs.foreign_name = Some(self.text());
                        self.advance();
                    }
                }
                TokenKind::Impure | TokenKind::Nodiscard => {
                    let loc = self.loc();
                    let found = self.kind();
                    self.error(loc, format!("'{}' is not supported", found.name()));
                    self.advance();
                }
                TokenKind::Callconv => {
                    self.advance();
                    self.expect(TokenKind::OpenParen);
                    let loc = self.loc();
                    if self.at(TokenKind::LitString) {
                        let cc = self.ctx.interner.resolve(self.text()).to_string();
                        self.advance();
                        match cc.as_str() {
                            "cdecl" => attrs.calling_convention = Some(CallConv::C),
                            "laye" => attrs.calling_convention = Some(CallConv::Laye),
                            other => {
                                self.error(loc, format!("unknown calling convention '{other}'"));
                            }
                        }
                    } else {
                        self.error(loc, "expected a calling convention string".to_string());
                    }
                    self.expect(TokenKind::CloseParen);
                }
                _ => break,
            }
        }
        attrs
    }

    fn parse_function_rest(
        &mut self,
        start: Location,
        mut attrs: DeclAttrs,
        return_type: TypeNodeRef,
        name: Symbol,
        name_location: Location,
    ) -> Option<NodeId> {
        self.expect(TokenKind::OpenParen);

        let scope = self.push_function_scope(name);
        let mut params = Vec::new();
        let mut varargs = VarargsStyle::None;
        while !self.at(TokenKind::CloseParen) && !self.at_end() {
            if self.at(TokenKind::Varargs) {
                self.advance();
                if self.at(TokenKind::CloseParen) {
                    varargs = VarargsStyle::C;
                    break;
                }
                varargs = VarargsStyle::Laye;
                continue;
            }
            let param_start = self.loc();
            let Some(type_node) = self.parse_type() else {
                self.error(param_start, "expected a parameter type".to_string());
                break;
            };
            let Some((param_name, _)) = self.expect_ident() else {
                break;
            };
            let index = params.len();
            let param = self.new_node(
                NodeKind::ParamDecl { name: param_name, type_node, index },
                param_start.combine(self.loc()),
            );
            self.declare(param_name, param);
            params.push(param);
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::CloseParen);

        let body = if self.eat(TokenKind::Semicolon) {
            None
        } else if self.at(TokenKind::OpenBrace) {
            self.parse_compound()
        } else if self.at(TokenKind::EqualGreater) {
            // `=> expr;` lowers to a single-return block.
            self.advance();
            let arrow_loc = self.loc();
            match self.parse_expr() {
                Some(value) => {
                    self.expect(TokenKind::Semicolon);
                    let ret = self
                        .new_generated_node(NodeKind::Return { value: Some(value) }, arrow_loc);
                    let block_scope = self.push_scope();
                    self.pop_scope();
                    Some(self.new_generated_node(
                        NodeKind::Compound { children: vec![ret], scope: block_scope },
                        arrow_loc,
                    ))
                }
                None => {
                    self.synchronize();
                    None
                }
            }
        } else {
            let loc = self.loc();
            self.error(loc, "expected ';', '{' or '=>' after function signature".to_string());
            None
        };
        self.pop_scope();

        // `main` without a foreign name links as an exported, unmangled,
        // C-calling-convention function no matter what was written.
        if self.ctx.interner.resolve(name) == "main" && attrs.foreign_name.is_none() {
            attrs.flags |= DeclFlags::EXPORT;
            attrs.calling_convention = Some(CallConv::C);
            attrs.mangling = Mangling::None;
        }

        let decl = self.new_node(
            NodeKind::FunctionDecl {
                name,
                name_location,
                attrs,
                return_type,
                params,
                varargs,
                body,
                scope,
            },
            start.combine(name_location),
        );
        self.declare(name, decl);
        Some(decl)
    }

    fn parse_binding_rest(
        &mut self,
        start: Location,
        attrs: DeclAttrs,
        type_node: TypeNodeRef,
        name: Symbol,
        name_location: Location,
    ) -> Option<NodeId> {
        let initializer = if self.eat(TokenKind::Equal) {
            self.parse_expr()
        } else {
            None
        };
        self.expect(TokenKind::Semicolon);
        let decl = self.new_node(
            NodeKind::BindingDecl { name, name_location, attrs, type_node, initializer },
            start.combine(name_location),
        );
        self.declare(name, decl);
        Some(decl)
    }

    fn parse_alias(&mut self, start: Location, attrs: DeclAttrs) -> Option<NodeId> {
        self.expect(TokenKind::Alias);
        let (name, name_location) = self.expect_ident()?;
        self.expect(TokenKind::Equal);
        let type_node = match self.parse_type() {
            Some(ty) => ty,
            None => {
                let loc = self.loc();
                self.error(loc, "expected a type after '=' in alias declaration".to_string());
                self.synchronize();
                return None;
            }
        };
        self.expect(TokenKind::Semicolon);
        let decl = self.new_node(
            NodeKind::AliasDecl { name, attrs, type_node },
            start.combine(name_location),
        );
        self.declare(name, decl);
        Some(decl)
    }

    /// `struct <name> { <fields>... <variants>... }`; variants are nested
    /// `variant <name> { ... }` declarations sharing the same grammar.
    fn parse_struct(&mut self, start: Location, attrs: DeclAttrs) -> Option<NodeId> {
        let keyword = if self.at(TokenKind::Variant) {
            TokenKind::Variant
        } else {
            TokenKind::Struct
        };
        self.expect(keyword);
        let (name, name_location) = self.expect_ident()?;
        self.expect(TokenKind::OpenBrace);

        let mut fields = Vec::new();
        let mut variants = Vec::new();
        while !self.at(TokenKind::CloseBrace) && !self.at_end() {
            if self.at(TokenKind::Variant) {
                let variant_start = self.loc();
                if let Some(variant) = self.parse_struct(variant_start, DeclAttrs::default()) {
                    variants.push(variant);
                }
                continue;
            }
            if self.at(TokenKind::Var) {
                let loc = self.loc();
                self.error(loc, "'var' is not valid in a struct body; did you mean 'variant'?".to_string());
                self.advance();
                self.synchronize();
                continue;
            }
            let field_start = self.loc();
            let Some(type_node) = self.parse_type() else {
                let loc = self.loc();
                let found = self.kind();
                self.error(loc, format!("expected a field type, found '{}'", found.name()));
                self.synchronize();
                continue;
            };
            let Some((field_name, _)) = self.expect_ident() else {
                self.synchronize();
                continue;
            };
            let initializer = if self.eat(TokenKind::Equal) {
                self.parse_expr()
            } else {
                None
            };
            self.expect(TokenKind::Semicolon);
            fields.push(self.new_node(
                NodeKind::FieldDecl { name: field_name, type_node, initializer },
                field_start,
            ));
        }
        self.expect(TokenKind::CloseBrace);

        let decl = self.new_node(
            NodeKind::StructDecl { name, attrs, fields, variants },
            start.combine(name_location),
        );
        self.declare(name, decl);
        Some(decl)
    }

    /// `import <query-list> from <module> [as <alias>];` or the short form
    /// `import "file" [as <alias>];`.
    fn parse_import(&mut self, start: Location, is_export: bool) -> Option<NodeId> {
        self.expect(TokenKind::Import);

        // Short form: the whole module as a namespace.
        if self.at(TokenKind::LitString) {
            let module_name = self.text();
            let module_name_location = self.loc();
            self.advance();
            let alias = if self.eat(TokenKind::As) {
                self.expect_ident().map(|(name, _)| name)
            } else {
                None
            };
            self.expect(TokenKind::Semicolon);
            return Some(self.new_node(
                NodeKind::ImportDecl {
                    queries: Vec::new(),
                    module_name,
                    module_name_location,
                    alias,
                    is_export,
                    referenced: None,
                },
                start,
            ));
        }

        let mut queries = Vec::new();
        loop {
            if self.at(TokenKind::Star) {
                let location = self.loc();
                self.advance();
                queries.push(ImportQuery::Wildcard { location });
            } else if self.at(TokenKind::Ident) {
                let mut pieces = vec![(self.text(), self.loc())];
                let mut location = self.loc();
                self.advance();
                while self.eat(TokenKind::ColonColon) {
                    if let Some((piece, piece_loc)) = self.expect_ident() {
                        pieces.push((piece, piece_loc));
                        location = location.combine(piece_loc);
                    } else {
                        break;
                    }
                }
                let alias = if self.eat(TokenKind::As) {
                    self.expect_ident().map(|(name, _)| name)
                } else {
                    None
                };
                queries.push(ImportQuery::Path { pieces, alias, location });
            } else {
                let loc = self.loc();
                let found = self.kind();
                self.error(loc, format!("expected an import query, found '{}'", found.name()));
                break;
            }
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }

        self.expect(TokenKind::From);
        let (module_name, module_name_location) = if self.at(TokenKind::LitString) {
            let result = (self.text(), self.loc());
            self.advance();
            result
        } else if self.at(TokenKind::Ident) {
            let result = (self.text(), self.loc());
            self.advance();
            result
        } else {
            let loc = self.loc();
            self.error(loc, "expected a module name after 'from'".to_string());
            (Symbol::EMPTY, self.loc())
        };
        self.expect(TokenKind::Semicolon);

        Some(self.new_node(
            NodeKind::ImportDecl {
                queries,
                module_name,
                module_name_location,
                alias: None,
                is_export,
                referenced: None,
            },
            start,
        ))
    }

    /// Skips ahead to a plausible declaration/statement boundary.
    pub(crate) fn synchronize(&mut self) {
        while !self.at_end() {
            if self.eat(TokenKind::Semicolon) {
                return;
            }
            if self.at(TokenKind::CloseBrace) || self.at(TokenKind::OpenBrace) {
                return;
            }
            self.advance();
        }
    }
}
