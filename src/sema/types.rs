//! Type resolution and struct layout.

use crate::ast::{ConstValue, NodeId, NodeKind, NodeRef, SemaState, TypeNodeRef};
use crate::intern::Symbol;
use crate::source::Location;
use crate::symbols::SymbolEntry;
use crate::types::{StructField, StructInfo, TypeKind, TypeRef};

use super::Sema;

impl Sema<'_, '_> {
    /// Resolves a syntactic type annotation to its semantic type. Errors
    /// produce poison so downstream analysis neither fails nor cascades.
    pub(crate) fn analyse_type(&mut self, type_node: TypeNodeRef) -> TypeRef {
        let id = self.analyse_type_node(type_node.node);
        TypeRef {
            id,
            is_modifiable: type_node.is_modifiable,
        }
    }

    fn analyse_type_node(&mut self, node: NodeId) -> crate::types::TypeId {
        let kind = self.local_node(node).kind.clone();
        let location = self.local_node(node).location;
        let resolved = match kind {
            NodeKind::TypeVoid => self.ctx.types.void,
            NodeKind::TypeNoReturn => self.ctx.types.noreturn,
            NodeKind::TypeBool { bits } => match bits {
                None => self.ctx.types.bool_,
                Some(bits) => self.ctx.types.intern(TypeKind::Bool { bits, platform: false }),
            },
            NodeKind::TypeInt { signed, bits } => match bits {
                None => {
                    if signed {
                        self.ctx.types.int
                    } else {
                        self.ctx.types.uint
                    }
                }
                Some(bits) => self.ctx.types.int_type(bits, signed),
            },
            NodeKind::TypeFloat { bits } => match bits {
                None => self.ctx.types.float,
                Some(bits) => self.ctx.types.intern(TypeKind::Float { bits, platform: false }),
            },
            NodeKind::TypePointer { elem } => {
                let elem = self.analyse_type(elem);
                self.ctx.types.pointer_to(elem)
            }
            NodeKind::TypeReference { elem } => {
                let elem = self.analyse_type(elem);
                self.ctx.types.reference_to(elem)
            }
            NodeKind::TypeBuffer { elem } => {
                let elem = self.analyse_type(elem);
                self.ctx.types.buffer_of(elem)
            }
            NodeKind::TypeSlice { .. } => {
                self.ctx.error(location, "slice types are not supported yet".to_string());
                self.ctx.types.poison
            }
            NodeKind::TypeArray { elem, lengths } => {
                return self.analyse_array_type(node, elem, lengths);
            }
            NodeKind::NameRef { ref pieces, .. } => {
                return self.analyse_type_nameref(node, pieces.clone());
            }
            _ => {
                self.ctx.error(location, "expected a type".to_string());
                self.ctx.types.poison
            }
        };

        let node_mut = self.local_node_mut(node);
        node_mut.ty = TypeRef::new(resolved);
        node_mut.state = SemaState::Ok;
        resolved
    }

    /// Array lengths must be integer constants evaluable at compile time;
    /// successful evaluation wraps the expression in a constant node.
    fn analyse_array_type(
        &mut self,
        node: NodeId,
        elem: TypeNodeRef,
        lengths: Vec<NodeId>,
    ) -> crate::types::TypeId {
        let elem_ty = self.analyse_type(elem);
        let mut resolved_lengths = Vec::with_capacity(lengths.len());
        let mut new_length_nodes = Vec::with_capacity(lengths.len());
        let mut errored = false;

        for mut length in lengths {
            let int = TypeRef::new(self.ctx.types.int);
            self.analyse_node(self.local_ref(length), Some(int));
            self.convert_or_error(&mut length, int);
            match self.const_eval(length) {
                Some(ConstValue::Int(value)) if value >= 0 => {
                    self.wrap_evaluated_constant(&mut length, ConstValue::Int(value));
                    resolved_lengths.push(value as u64);
                }
                Some(ConstValue::Int(_)) => {
                    let location = self.local_node(length).location;
                    self.ctx.error(location, "array length cannot be negative".to_string());
                    errored = true;
                }
                _ => {
                    let location = self.local_node(length).location;
                    self.ctx.error(
                        location,
                        "array length must be a constant integer expression".to_string(),
                    );
                    errored = true;
                }
            }
            new_length_nodes.push(length);
        }

        let resolved = if errored {
            self.ctx.types.poison
        } else {
            self.ctx.types.intern(TypeKind::Array {
                elem: elem_ty,
                lengths: resolved_lengths,
            })
        };

        let node_mut = self.local_node_mut(node);
        if let NodeKind::TypeArray { lengths, .. } = &mut node_mut.kind {
            *lengths = new_length_nodes;
        }
        node_mut.ty = TypeRef::new(resolved);
        node_mut.state = if errored { SemaState::Errored } else { SemaState::Ok };
        resolved
    }

    /// A dotted name in type position: resolved through the scope chain
    /// and the import namespace, then required to denote a struct or
    /// alias declaration. Alias types unwrap to their target while the
    /// node keeps pointing at the alias declaration.
    fn analyse_type_nameref(
        &mut self,
        node: NodeId,
        pieces: Vec<(Symbol, Location)>,
    ) -> crate::types::TypeId {
        let location = self.local_node(node).location;
        let candidates = match self.resolve_name(&pieces) {
            Ok(candidates) => candidates,
            Err((loc, message)) => {
                self.ctx.error(loc, message);
                let poison = self.ctx.types.poison;
                let node_mut = self.local_node_mut(node);
                node_mut.ty = TypeRef::new(poison);
                node_mut.state = SemaState::Errored;
                return poison;
            }
        };

        let decl = candidates[0];
        let decl_kind_is_type = matches!(
            self.node(decl).kind,
            NodeKind::StructDecl { .. } | NodeKind::AliasDecl { .. }
        );
        if !decl_kind_is_type {
            let text = self.name_text(&pieces);
            self.ctx.error(location, format!("'{text}' does not name a type"));
            let poison = self.ctx.types.poison;
            let node_mut = self.local_node_mut(node);
            node_mut.ty = TypeRef::new(poison);
            node_mut.state = SemaState::Errored;
            return poison;
        }

        // A struct mid-layout already knows its identity; using it through
        // a pointer inside its own body is legal and must not re-enter.
        let resolved_ty = if self.node(decl).state == SemaState::InProgress
            && !matches!(self.ctx.types.kind(self.node(decl).ty.id), TypeKind::Unknown)
        {
            self.node(decl).ty.id
        } else {
            self.analyse_node(decl, None);
            self.node(decl).ty.id
        };

        let node_mut = self.local_node_mut(node);
        if let NodeKind::NameRef { resolved, .. } = &mut node_mut.kind {
            *resolved = Some(decl);
        }
        node_mut.ty = TypeRef::new(resolved_ty);
        node_mut.state = SemaState::Ok;
        resolved_ty
    }

    pub(crate) fn name_text(&self, pieces: &[(Symbol, Location)]) -> String {
        pieces
            .iter()
            .map(|(sym, _)| self.ctx.interner.resolve(*sym))
            .collect::<Vec<_>>()
            .join("::")
    }

    /// Name lookup: single identifiers walk the scope chain first; what
    /// the chain does not know falls through to the module's import
    /// namespace, where dotted paths descend through child namespaces.
    pub(crate) fn resolve_name(
        &self,
        pieces: &[(Symbol, Location)],
    ) -> Result<Vec<NodeRef>, (Location, String)> {
        if pieces.len() == 1 {
            let (name, location) = pieces[0];
            if let Some(node) = self.current_module().scopes.lookup(self.scope, name) {
                return Ok(vec![NodeRef {
                    module: self.current_module_id,
                    node,
                }]);
            }
            return match self.current_module().imports.get(name) {
                Some(SymbolEntry::Entity(decls)) => Ok(decls.clone()),
                Some(SymbolEntry::Namespace(_)) => {
                    let text = self.ctx.interner.resolve(name);
                    Err((location, format!("'{text}' is a namespace, not a value or type")))
                }
                None => {
                    let text = self.ctx.interner.resolve(name);
                    Err((location, format!("unknown name '{text}'")))
                }
            };
        }

        let mut namespace = &self.current_module().imports;
        for (i, (piece, location)) in pieces.iter().enumerate() {
            let is_last = i + 1 == pieces.len();
            match namespace.get(*piece) {
                None => {
                    let text = self.ctx.interner.resolve(*piece);
                    return Err((*location, format!("unknown name '{text}'")));
                }
                Some(SymbolEntry::Namespace(child)) => {
                    if is_last {
                        let text = self.ctx.interner.resolve(*piece);
                        return Err((
                            *location,
                            format!("'{text}' is a namespace, not a value or type"),
                        ));
                    }
                    namespace = child;
                }
                Some(SymbolEntry::Entity(decls)) => {
                    if is_last {
                        return Ok(decls.clone());
                    }
                    let text = self.ctx.interner.resolve(*piece);
                    return Err((*location, format!("'{text}' is not a namespace")));
                }
            }
        }
        unreachable!("resolve_name walked past the final path piece")
    }

    /// Struct analysis: the type identity is created before the fields are
    /// touched (self-referential pointers need it), then fields lay out by
    /// accumulating aligned sizes with synthetic `i8[n]` padding fields,
    /// and size/alignment are cached on the type.
    pub(crate) fn analyse_struct_decl(&mut self, r: NodeRef, id: NodeId) -> bool {
        let (name, fields, variants) = match &self.node(r).kind {
            NodeKind::StructDecl { name, fields, variants, .. } => {
                (*name, fields.clone(), variants.clone())
            }
            _ => return false,
        };

        let struct_ty = self.ctx.types.add_struct(StructInfo {
            name,
            fields: Vec::new(),
            variants: Vec::new(),
            parent: None,
            size: 0,
            align: 1,
            laid_out: false,
        });
        self.local_node_mut(id).ty = TypeRef::new(struct_ty);

        let mut layout_fields: Vec<StructField> = Vec::new();
        let mut current_size: u64 = 0;
        let mut current_align: u64 = 1;
        let mut ok = true;

        for field in fields {
            let (field_name, type_node, initializer) = match &self.local_node(field).kind {
                NodeKind::FieldDecl { name, type_node, initializer } => {
                    (*name, *type_node, *initializer)
                }
                _ => continue,
            };
            let field_ty = self.analyse_type(type_node);
            {
                let field_node = self.local_node_mut(field);
                field_node.ty = field_ty;
                field_node.state = SemaState::Ok;
            }
            if self.ctx.types.is_poison(field_ty.id) {
                ok = false;
                continue;
            }

            if let Some(mut init) = initializer {
                self.analyse_node(self.local_ref(init), Some(field_ty));
                self.convert_or_error(&mut init, field_ty);
                if self.const_eval(init).is_none() {
                    let location = self.local_node(init).location;
                    self.ctx.error(
                        location,
                        "field initializer must be a constant expression".to_string(),
                    );
                }
                if let NodeKind::FieldDecl { initializer, .. } =
                    &mut self.local_node_mut(field).kind
                {
                    *initializer = Some(init);
                }
            }

            let field_size = self.ctx.types.size_in_bytes(field_ty.id);
            let field_align = self.ctx.types.align_in_bytes(field_ty.id).max(1);
            if field_align > current_align {
                current_align = field_align;
            }
            let padding = (current_align - (current_size % current_align)) % current_align;
            if padding > 0 {
                layout_fields.push(self.padding_field(current_size, padding));
                current_size += padding;
            }
            layout_fields.push(StructField {
                name: field_name,
                ty: field_ty,
                offset: current_size,
                is_padding: false,
            });
            current_size += field_size;
        }

        let padding = (current_align - (current_size % current_align)) % current_align;
        if padding > 0 {
            layout_fields.push(self.padding_field(current_size, padding));
            current_size += padding;
        }

        let mut variant_types = Vec::new();
        for variant in variants {
            let variant_ref = self.local_ref(variant);
            if self.analyse_node(variant_ref, None) {
                let variant_ty = self.node(variant_ref).ty.id;
                if let TypeKind::Struct(info) = self.ctx.types.kind_mut(variant_ty) {
                    info.parent = Some(struct_ty);
                }
                variant_types.push(variant_ty);
            } else {
                ok = false;
            }
        }

        if let TypeKind::Struct(info) = self.ctx.types.kind_mut(struct_ty) {
            info.fields = layout_fields;
            info.variants = variant_types;
            info.size = current_size;
            info.align = current_align;
            info.laid_out = true;
        }
        ok
    }

    fn padding_field(&mut self, offset: u64, bytes: u64) -> StructField {
        let i8_ty = TypeRef::new(self.ctx.types.i8);
        let padding_ty = self.ctx.types.intern(TypeKind::Array {
            elem: i8_ty,
            lengths: vec![bytes],
        });
        StructField {
            name: Symbol::EMPTY,
            ty: TypeRef::new(padding_ty),
            offset,
            is_padding: true,
        }
    }
}
