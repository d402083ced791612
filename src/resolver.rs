//! Module and import resolution.
//!
//! Runs in two phases ahead of semantic analysis. Phase 1 walks every
//! module's imports transitively: module names resolve against the
//! importer's directory first and the configured include directories
//! second, newly discovered files are parsed on the spot, and each import
//! edge lands in a dependency graph whose cycle check reports both ends of
//! the offending edge. Phase 2 visits modules in topological order and
//! builds the `exports` then `imports` namespaces of each.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::ast::{ImportQuery, NodeId, NodeKind, NodeRef};
use crate::context::Context;
use crate::depgraph::DependencyGraph;
use crate::intern::Symbol;
use crate::module::{Module, ModuleId};
use crate::parser::parse_module;
use crate::source::Location;
use crate::symbols::{Namespace, SymbolConflict, SymbolEntry};

/// Resolves every import reachable from the already-parsed modules in
/// `modules`, parsing new files as they are discovered. Returns the
/// topological processing order, or `None` after reporting a cycle.
pub fn resolve_imports(ctx: &mut Context, modules: &mut Vec<Module>) -> Option<Vec<ModuleId>> {
    let mut graph: DependencyGraph<ModuleId> = DependencyGraph::new();
    for module in modules.iter() {
        graph.ensure_tracked(module.id);
    }

    // Phase 1: locate and parse imports transitively.
    let mut i = 0;
    while i < modules.len() {
        let importer_id = modules[i].id;
        let imports = modules[i].import_decls();
        for import in imports {
            resolve_one_import(ctx, modules, &mut graph, importer_id, import);
        }
        i += 1;
    }

    let order = match graph.ordered() {
        Ok(order) => order,
        Err((from, to)) => {
            let from_name = module_display_name(ctx, modules, from);
            let to_name = module_display_name(ctx, modules, to);
            let location = first_import_location(modules, from, to);
            ctx.error(
                location,
                format!("cyclic import between '{from_name}' and '{to_name}'"),
            );
            return None;
        }
    };

    // Phase 2: build symbol tables in dependency order.
    for &id in &order {
        build_exports(modules, id);
        build_imports(ctx, modules, id);
    }

    Some(order)
}

fn module_display_name(ctx: &Context, modules: &[Module], id: ModuleId) -> String {
    let module = &modules[id.index()];
    match ctx.source(module.source) {
        Some(file) => file.name.display().to_string(),
        None => module.path.display().to_string(),
    }
}

fn first_import_location(modules: &[Module], from: ModuleId, to: ModuleId) -> Location {
    let module = &modules[from.index()];
    for id in module.import_decls() {
        if let NodeKind::ImportDecl { referenced: Some(target), .. } = &module.node(id).kind {
            if *target == to {
                return module.node(id).location;
            }
        }
    }
    Location::default()
}

fn resolve_one_import(
    ctx: &mut Context,
    modules: &mut Vec<Module>,
    graph: &mut DependencyGraph<ModuleId>,
    importer_id: ModuleId,
    import: NodeId,
) {
    let importer = &modules[importer_id.index()];
    let (name_sym, location) = match &importer.node(import).kind {
        NodeKind::ImportDecl { module_name, module_name_location, .. } => {
            (*module_name, *module_name_location)
        }
        _ => return,
    };
    let name = ctx.interner.resolve(name_sym).to_string();

    let Some(path) = locate_module(ctx, &modules[importer_id.index()].path, &name) else {
        ctx.error(location, format!("could not find module '{name}'"));
        return;
    };

    let source = ctx.load_or_get(&path);
    if !source.is_valid() {
        return;
    }

    // Idempotent per file: a module already parsed under this source id is
    // reused, which is also what terminates import cycles in phase 1.
    let target_id = match modules.iter().find(|m| m.source == source) {
        Some(existing) => existing.id,
        None => {
            let id = ModuleId(modules.len() as u32);
            debug!(module = %path.display(), "parsing imported module");
            let mut module = Module::new(id, source, path.clone());
            parse_module(ctx, &mut module);
            modules.push(module);
            id
        }
    };

    if let NodeKind::ImportDecl { referenced, .. } =
        &mut modules[importer_id.index()].node_mut(import).kind
    {
        *referenced = Some(target_id);
    }
    graph.add_dependency(importer_id, target_id);
}

/// The importer's directory shadows the include path. Sources already
/// registered with the context (in-memory buffers included) resolve
/// without touching the filesystem.
fn locate_module(ctx: &Context, importer_path: &Path, name: &str) -> Option<PathBuf> {
    let mut candidates = Vec::new();
    if let Some(dir) = importer_path.parent() {
        candidates.push(dir.join(name));
    }
    for dir in &ctx.options.include_directories {
        candidates.push(dir.join(name));
    }
    candidates
        .into_iter()
        .find(|c| ctx.is_loaded(c) || c.is_file())
}

/// Publishes every `export`-flagged top-level declaration.
fn build_exports(modules: &mut [Module], id: ModuleId) {
    let module = &modules[id.index()];
    let mut exported: Vec<(Symbol, NodeRef)> = Vec::new();
    for &top in &module.top_level {
        let node = module.node(top);
        let is_export = node.attrs().map(|attrs| attrs.is_exported()).unwrap_or(false);
        if !is_export {
            continue;
        }
        if let Some(name) = node.declared_name() {
            exported.push((name, module.node_ref(top)));
        }
    }
    let module = &mut modules[id.index()];
    for (name, decl) in exported {
        // Exported overloads share one entity; a namespace can never
        // appear here because declarations only produce entities.
        let _ = module.exports.add_entity(name, decl);
    }
}

fn build_imports(ctx: &mut Context, modules: &mut [Module], id: ModuleId) {
    let import_decls = modules[id.index()].import_decls();
    for import in import_decls {
        let (queries, alias, is_export, referenced, location, module_name) =
            match &modules[id.index()].node(import).kind {
                NodeKind::ImportDecl {
                    queries,
                    alias,
                    is_export,
                    referenced,
                    module_name,
                    ..
                } => (
                    queries.clone(),
                    *alias,
                    *is_export,
                    *referenced,
                    modules[id.index()].node(import).location,
                    *module_name,
                ),
                _ => continue,
            };
        let Some(target) = referenced else {
            continue;
        };
        // A shallow copy of the referenced module's exports: entries are
        // cloned, declarations stay owned by their module.
        let target_exports = modules[target.index()].exports.clone();
        let target_path = modules[target.index()].path.clone();

        if queries.is_empty() {
            let namespace_name = match alias {
                Some(alias) => alias,
                None => match namespace_name_from_stem(ctx, &target_path) {
                    Some(name) => name,
                    None => {
                        let text = ctx.interner.resolve(module_name).to_string();
                        ctx.error(
                            location,
                            format!("cannot derive a namespace name from '{text}'; use 'as'"),
                        );
                        continue;
                    }
                },
            };
            import_whole_module(ctx, modules, id, namespace_name, target_exports, is_export, location);
            continue;
        }

        for query in queries {
            match query {
                ImportQuery::Wildcard { location } => {
                    import_wildcard(ctx, modules, id, &target_exports, is_export, location);
                }
                ImportQuery::Path { pieces, alias, location } => {
                    import_query(
                        ctx,
                        modules,
                        id,
                        &target_exports,
                        pieces,
                        alias,
                        is_export,
                        location,
                    );
                }
            }
        }
    }
}

/// First identifier-like run of the file stem: `vec_utils.laye` imports as
/// `vec_utils`, `string-builder.v2.laye` as `string`.
fn namespace_name_from_stem(ctx: &mut Context, path: &Path) -> Option<Symbol> {
    let stem = path.file_stem()?.to_string_lossy();
    let mut name = String::new();
    for (i, c) in stem.chars().enumerate() {
        let valid = if i == 0 {
            c.is_ascii_alphabetic() || c == '_'
        } else {
            c.is_ascii_alphanumeric() || c == '_'
        };
        if !valid {
            break;
        }
        name.push(c);
    }
    if name.is_empty() {
        return None;
    }
    Some(ctx.intern(&name))
}

fn import_whole_module(
    ctx: &mut Context,
    modules: &mut [Module],
    id: ModuleId,
    name: Symbol,
    target_exports: Namespace,
    is_export: bool,
    location: Location,
) {
    let module = &mut modules[id.index()];
    if let Err(conflict) = module
        .imports
        .add_namespace(name, target_exports.clone())
    {
        report_conflict(ctx, location, name, conflict);
        return;
    }
    if is_export {
        if let Err(conflict) = module.exports.add_namespace(name, target_exports) {
            report_conflict(ctx, location, name, conflict);
        }
    }
}

fn import_wildcard(
    ctx: &mut Context,
    modules: &mut [Module],
    id: ModuleId,
    target_exports: &Namespace,
    is_export: bool,
    location: Location,
) {
    let entries: Vec<(Symbol, SymbolEntry)> = target_exports
        .iter()
        .map(|(name, entry)| (name, entry.clone()))
        .collect();
    let module = &mut modules[id.index()];
    for (name, entry) in entries {
        if let Err(conflict) = module.imports.add_entry(name, entry.clone()) {
            report_conflict(ctx, location, name, conflict);
            continue;
        }
        if is_export {
            if let Err(conflict) = module.exports.add_entry(name, entry) {
                report_conflict(ctx, location, name, conflict);
            }
        }
    }
}

fn import_query(
    ctx: &mut Context,
    modules: &mut [Module],
    id: ModuleId,
    target_exports: &Namespace,
    pieces: Vec<(Symbol, Location)>,
    alias: Option<Symbol>,
    is_export: bool,
    location: Location,
) {
    let mut current: &Namespace = target_exports;
    for (i, (piece, piece_location)) in pieces.iter().enumerate() {
        let is_last = i + 1 == pieces.len();
        match current.get(*piece) {
            None => {
                let text = ctx.interner.resolve(*piece).to_string();
                ctx.error(*piece_location, format!("imported module does not export '{text}'"));
                return;
            }
            Some(SymbolEntry::Namespace(ns)) if !is_last => {
                current = ns;
            }
            Some(entry) if is_last => {
                let name = alias.unwrap_or(*piece);
                let entry = entry.clone();
                let module = &mut modules[id.index()];
                if let Err(conflict) = module.imports.add_entry(name, entry.clone()) {
                    report_conflict(ctx, location, name, conflict);
                    return;
                }
                if is_export {
                    if let Err(conflict) = module.exports.add_entry(name, entry) {
                        report_conflict(ctx, location, name, conflict);
                    }
                }
                return;
            }
            Some(SymbolEntry::Entity(_)) => {
                let text = ctx.interner.resolve(*piece).to_string();
                ctx.error(*piece_location, format!("'{text}' is not a namespace"));
                return;
            }
            Some(SymbolEntry::Namespace(_)) => unreachable!(),
        }
    }
}

fn report_conflict(ctx: &mut Context, location: Location, name: Symbol, conflict: SymbolConflict) {
    let text = ctx.interner.resolve(name).to_string();
    let message = match conflict {
        SymbolConflict::KindMismatch => {
            format!("import of '{text}' conflicts with an existing symbol of a different kind")
        }
        SymbolConflict::Duplicate => format!("import of '{text}' conflicts with an existing symbol"),
    };
    ctx.error(location, message);
}
