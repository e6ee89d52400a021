//! Symbol renamer.
//!
//! A single top-down traversal does two jobs at once: it builds scoped,
//! per-namespace symbol tables (resolving typedefs and tags far enough to
//! rewrite member accesses), and it binds every identifier use to a shared
//! [`Symbol`] handle.
//!
//! Naming discipline: inside a function, symbols are assigned immediately
//! from scope-local counters seeded off the global high-water marks, so
//! two functions can reuse the same short names without ever colliding
//! with a later file-scope name. At file scope no allocator is active;
//! top-level symbols keep their original spelling until the whole unit has
//! been visited, then reachability from `main` decides which declarations
//! survive and only those get names from the global counters, in source
//! order. `extern` declarations are never renamed at all.
//!
//! Reachability follows two edge kinds per top-level declaration: the
//! names it looked up that resolved at file scope (recorded by the
//! tables), and the edge from a forward declaration to the item carrying
//! its initializer or body, so referencing a prototype keeps the
//! definition alive.

mod counters;
mod tables;

#[cfg(test)]
mod tests;

use std::collections::{HashMap, HashSet, VecDeque};

use crate::ast::*;
use crate::error::{Error, Result};

pub use counters::encode;
use counters::{Counters, GlobalCounters, Ns};
use tables::{DeclInit, Recorded, Tables, TypedefEntry, NS_DECL_INITS, NS_DECL_TYPES};

/// Rewrite every identifier in the unit and prune declarations that are
/// unreachable from `main`.
pub fn rename(ast: &mut FileAst) -> Result<()> {
    let mut renamer = Renamer::new();
    renamer.scoped(|s| s.run(ast))
}

/// The type carried along expression visitation. `None` means the type is
/// unknown, which is fine anywhere short of a member access.
type TypeFlow = Option<TypeRef>;

#[derive(Clone, Copy)]
enum AggKind {
    Struct,
    Union,
}

impl AggKind {
    fn ns(self) -> Ns {
        match self {
            AggKind::Struct => Ns::Struct,
            AggKind::Union => Ns::Union,
        }
    }

    fn kw(self) -> &'static str {
        match self {
            AggKind::Struct => "struct",
            AggKind::Union => "union",
        }
    }
}

struct Renamer {
    tables: Tables,
    /// Active allocators; absent at file scope.
    counters: Option<Counters>,
    globals: GlobalCounters,
    /// Labels of the function currently being visited.
    labels: HashMap<String, SymbolRef>,
}

impl Renamer {
    fn new() -> Self {
        Renamer {
            tables: Tables::new(),
            counters: None,
            globals: GlobalCounters::new(),
            labels: HashMap::new(),
        }
    }

    /// Run `f` in a child scope: fresh table frames, forked counters.
    /// Frames are popped on every exit path.
    fn scoped<R>(&mut self, f: impl FnOnce(&mut Self) -> Result<R>) -> Result<R> {
        self.tables.push_scope();
        let child = self.counters.as_ref().map(|c| c.child());
        let saved = std::mem::replace(&mut self.counters, child);
        let result = f(self);
        self.counters = saved;
        self.tables.pop_scope();
        result
    }

    /// Run `f` with allocators attached to the global counters, as done on
    /// entry to any function declarator or definition.
    fn with_function_counters<R>(&mut self, f: impl FnOnce(&mut Self) -> Result<R>) -> Result<R> {
        let saved = std::mem::replace(&mut self.counters, Some(Counters::attached(&self.globals)));
        let result = f(self);
        self.counters = saved;
        result
    }

    /// Mint a symbol for `orig`. With an allocator active the symbol gets
    /// its short name now; at file scope it keeps the original spelling
    /// until the final assignment pass.
    fn create_symbol(&mut self, orig: &str, ns: Ns) -> Result<SymbolRef> {
        match self.counters.as_mut() {
            Some(c) => Ok(Symbol::named(orig, c.for_ns(ns).take()?)),
            None => Ok(Symbol::new(orig)),
        }
    }

    // --- the file-scope pass ---

    fn run(&mut self, ast: &mut FileAst) -> Result<()> {
        let mut records = Vec::with_capacity(ast.ext.len());
        for item in ast.ext.iter_mut() {
            self.tables.start_record();
            let result = self.visit_ext(item);
            let record = self.tables.take_record();
            result?;
            records.push(record);
        }

        // Per namespace: name -> index of the item that first declared it.
        let mut declare_map: Vec<HashMap<String, usize>> = (0..9).map(|_| HashMap::new()).collect();
        for (i, record) in records.iter().enumerate() {
            for (ns, rec) in record.all().iter().enumerate() {
                for name in &rec.declared {
                    declare_map[ns].entry(name.clone()).or_insert(i);
                }
            }
        }

        // Forward declaration -> the item carrying the initializer or body.
        let mut init_map: HashMap<usize, usize> = HashMap::new();
        for (name, &decl) in &declare_map[NS_DECL_TYPES] {
            if let Some(&init) = declare_map[NS_DECL_INITS].get(name) {
                init_map.insert(decl, init);
            }
        }

        // Reference edges, translated from names to item indices.
        let mut reference: Vec<Vec<usize>> = Vec::with_capacity(records.len());
        for record in &records {
            let mut edges = Vec::new();
            for (ns, rec) in record.all().iter().enumerate() {
                for name in &rec.referenced {
                    if let Some(&target) = declare_map[ns].get(name) {
                        if !edges.contains(&target) {
                            edges.push(target);
                        }
                    }
                }
            }
            reference.push(edges);
        }

        let main = *declare_map[NS_DECL_TYPES]
            .get("main")
            .ok_or_else(|| Error::UnknownIdentifier("main".to_string()))?;

        let mut visited = HashSet::new();
        visited.insert(main);
        let mut queue = VecDeque::new();
        queue.push_back(main);
        while let Some(n) = queue.pop_front() {
            if let Some(&init) = init_map.get(&n) {
                if init != n && visited.insert(init) {
                    queue.push_back(init);
                }
            }
            for &target in &reference[n] {
                if visited.insert(target) {
                    queue.push_back(target);
                }
            }
        }

        log::debug!(
            "reachability kept {} of {} top-level declarations",
            visited.len(),
            records.len()
        );

        // Prune, preserving source order, and assign the survivors their
        // global names.
        let old = std::mem::take(&mut ast.ext);
        let mut kept = Vec::new();
        for (i, (item, record)) in old.into_iter().zip(records).enumerate() {
            if visited.contains(&i) {
                ast.ext.push(item);
                kept.push(record);
            }
        }
        for record in &kept {
            self.assign_global_names(record)?;
        }
        Ok(())
    }

    fn assign_global_names(&mut self, record: &Recorded) -> Result<()> {
        for name in &record.decl_types.declared {
            if name == "main" {
                continue;
            }
            let ty = match self.tables.decl_types.get(name) {
                Some(ty) => ty,
                None => continue,
            };
            let is_enum = matches!(&*ty.borrow(), Type::Enum(_));
            if is_enum {
                if let Some(DeclInit::Enumerator(sym)) = self.tables.decl_inits.get(name) {
                    sym.rename(self.globals.next(Ns::Decl)?);
                }
            } else if let Some(leaf) = typedecl_of(&ty) {
                if let Some(Name::Sym(sym)) = declname_of(&leaf) {
                    sym.rename(self.globals.next(Ns::Decl)?);
                }
            }
        }
        for name in &record.typedefs.declared {
            if let Some(TypedefEntry::Type(ty)) = self.tables.typedefs.get(name) {
                if let Some(leaf) = typedecl_of(&ty) {
                    if let Some(Name::Sym(sym)) = declname_of(&leaf) {
                        sym.rename(self.globals.next(Ns::Decl)?);
                    }
                }
            }
        }
        for name in &record.struct_names.declared {
            if let Some(sym) = self.tables.struct_names.get(name) {
                sym.rename(self.globals.next(Ns::Struct)?);
            }
        }
        for name in &record.union_names.declared {
            if let Some(sym) = self.tables.union_names.get(name) {
                sym.rename(self.globals.next(Ns::Union)?);
            }
        }
        for name in &record.enum_names.declared {
            if let Some(sym) = self.tables.enum_names.get(name) {
                sym.rename(self.globals.next(Ns::Enum)?);
            }
        }
        Ok(())
    }

    fn visit_ext(&mut self, item: &mut ExtDecl) -> Result<()> {
        match item {
            ExtDecl::Decl(d) => self.visit_decl(d),
            ExtDecl::Typedef(t) => self.visit_typedef(t),
            ExtDecl::FuncDef(f) => self.visit_funcdef(f),
            ExtDecl::StaticAssert(sa) => self.visit_expr(&mut sa.cond).map(|_| ()),
            ExtDecl::Pragma(_) => Ok(()),
        }
    }

    // --- declarations ---

    fn visit_decl(&mut self, decl: &mut Decl) -> Result<()> {
        if let Some(name) = decl.name.clone() {
            let key = name.orig().to_string();
            let leaf = typedecl_of(&decl.ty)
                .ok_or_else(|| Error::mismatch(format!("'{}' has no declarator", key)))?;
            if !self.tables.decl_types.contains_local(&key) {
                self.tables.decl_types.insert(&key, decl.ty.clone());
                if !decl.is_extern() {
                    let sym = self.create_symbol(&key, Ns::Decl)?;
                    stamp_declname(&leaf, Name::Sym(sym));
                }
            } else {
                let prev = self
                    .tables
                    .decl_types
                    .get(&key)
                    .ok_or_else(|| Error::UnknownIdentifier(key.clone()))?;
                if matches!(&*prev.borrow(), Type::Enum(_)) {
                    return Err(Error::Redefinition(key));
                }
                let prev_leaf = typedecl_of(&prev)
                    .ok_or_else(|| Error::mismatch(format!("'{}' has no declarator", key)))?;
                if let Some(prev_name) = declname_of(&prev_leaf) {
                    stamp_declname(&leaf, prev_name);
                }
            }
            if decl.init.is_some() && !self.tables.decl_inits.insert(&key, DeclInit::Value) {
                return Err(Error::Redefinition(key));
            }
        }

        if let Some(align) = decl.align.as_mut() {
            match align {
                Alignment::Expr(e) => {
                    self.visit_expr(e)?;
                }
                Alignment::Type(t) => {
                    let t = t.clone();
                    self.visit_type(&t)?;
                }
            }
        }

        self.visit_type(&decl.ty.clone())?;

        let ty = decl.ty.clone();
        if let Some(init) = decl.init.as_mut() {
            match init {
                Init::List(list) => self.visit_init_list(list, &ty)?,
                Init::Expr(e) => {
                    self.visit_expr(e)?;
                }
            }
        }
        Ok(())
    }

    fn visit_typedef(&mut self, td: &mut Typedef) -> Result<()> {
        if !self
            .tables
            .typedefs
            .insert(&td.name, TypedefEntry::Type(td.ty.clone()))
        {
            return Err(Error::Redefinition(td.name.clone()));
        }
        self.visit_type(&td.ty.clone())?;
        let leaf = typedecl_of(&td.ty)
            .ok_or_else(|| Error::mismatch(format!("typedef '{}' has no declarator", td.name)))?;
        let sym = self.create_symbol(&td.name, Ns::Decl)?;
        stamp_declname(&leaf, Name::Sym(sym));
        Ok(())
    }

    fn visit_funcdef(&mut self, f: &mut FuncDef) -> Result<()> {
        let key = match &f.decl.name {
            Some(name) => name.orig().to_string(),
            None => return Err(Error::unsupported("function definition without a name")),
        };
        let leaf = typedecl_of(&f.decl.ty)
            .ok_or_else(|| Error::mismatch(format!("'{}' has no declarator", key)))?;
        if !self.tables.decl_types.contains_local(&key) {
            self.tables.decl_types.insert(&key, f.decl.ty.clone());
            let orig = declname_of(&leaf)
                .map(|n| n.orig().to_string())
                .unwrap_or_else(|| key.clone());
            let sym = self.create_symbol(&orig, Ns::Decl)?;
            stamp_declname(&leaf, Name::Sym(sym));
        } else {
            let prev = self
                .tables
                .decl_types
                .get(&key)
                .ok_or_else(|| Error::UnknownIdentifier(key.clone()))?;
            let prev_leaf = typedecl_of(&prev)
                .ok_or_else(|| Error::mismatch(format!("'{}' has no declarator", key)))?;
            if let Some(prev_name) = declname_of(&prev_leaf) {
                stamp_declname(&leaf, prev_name);
            }
        }
        if !self.tables.decl_inits.insert(&key, DeclInit::FuncBody) {
            return Err(Error::Redefinition(key));
        }

        let ret = {
            match &*f.decl.ty.borrow() {
                Type::Func(func) => func.ret.clone(),
                _ => {
                    return Err(Error::mismatch(format!(
                        "'{}' is defined like a function but not declared as one",
                        key
                    )))
                }
            }
        };
        self.visit_type(&ret)?;

        let func_ty = f.decl.ty.clone();
        let body = &mut f.body;
        self.with_function_counters(|s| {
            s.scoped(|s| {
                s.visit_func_params(&func_ty)?;
                s.labels = HashMap::new();
                s.visit_stmt(body)
            })
        })
    }

    /// Visit the parameter declarations stored inside a shared function
    /// node. They are taken out for the duration so lookups hitting the
    /// node while a parameter is visited cannot alias it.
    fn visit_func_params(&mut self, func: &TypeRef) -> Result<()> {
        let mut params = match &mut *func.borrow_mut() {
            Type::Func(f) => std::mem::take(&mut f.params),
            _ => Vec::new(),
        };
        let mut result = Ok(());
        for p in params.iter_mut() {
            result = self.visit_decl(p);
            if result.is_err() {
                break;
            }
        }
        if let Type::Func(f) = &mut *func.borrow_mut() {
            f.params = params;
        }
        result
    }

    // --- types ---

    fn visit_type(&mut self, ty: &TypeRef) -> Result<()> {
        enum Step {
            Inner(TypeRef),
            Array(TypeRef),
            Func(TypeRef),
            Ident,
            Agg(AggKind),
            Enum,
        }
        let step = {
            let b = ty.borrow();
            match &*b {
                Type::TypeDecl(td) => Step::Inner(td.ty.clone()),
                Type::Ptr(p) => Step::Inner(p.ty.clone()),
                Type::Array(a) => Step::Array(a.ty.clone()),
                Type::Func(f) => Step::Func(f.ret.clone()),
                Type::Ident(_) => Step::Ident,
                Type::Struct(_) => Step::Agg(AggKind::Struct),
                Type::Union(_) => Step::Agg(AggKind::Union),
                Type::Enum(_) => Step::Enum,
            }
        };
        match step {
            Step::Inner(inner) => self.visit_type(&inner),
            Step::Array(inner) => {
                self.visit_type(&inner)?;
                let size = match &mut *ty.borrow_mut() {
                    Type::Array(a) => std::mem::replace(&mut a.size, ArraySize::Unknown),
                    _ => ArraySize::Unknown,
                };
                let (size, result) = match size {
                    ArraySize::Fixed(mut e) => {
                        let r = self.visit_expr(&mut e).map(|_| ());
                        (ArraySize::Fixed(e), r)
                    }
                    other => (other, Ok(())),
                };
                if let Type::Array(a) = &mut *ty.borrow_mut() {
                    a.size = size;
                }
                result
            }
            Step::Func(ret) => {
                self.visit_type(&ret)?;
                let func = ty.clone();
                self.with_function_counters(|s| s.scoped(|s| s.visit_func_params(&func)))
            }
            Step::Ident => self.visit_identifier_type(ty),
            Step::Agg(kind) => self.visit_aggregate(ty, kind),
            Step::Enum => self.visit_enum(ty),
        }
    }

    /// Resolve a single-name identifier type through the typedef table and
    /// rewrite it to the typedef's symbol. Multi-keyword base types are
    /// left alone, as is a name that is already a symbol (the shared base
    /// node of a multi-declarator declaration is visited once per
    /// declarator).
    fn visit_identifier_type(&mut self, ty: &TypeRef) -> Result<()> {
        let first = {
            let b = ty.borrow();
            match &*b {
                Type::Ident(it) if it.names.len() == 1 => it.names[0].clone(),
                _ => return Ok(()),
            }
        };
        let key = match first {
            Name::Sym(_) => return Ok(()),
            Name::Text(s) => s,
        };
        match self.tables.typedefs.get(&key) {
            None => Err(Error::UnknownIdentifier(key)),
            Some(TypedefEntry::Builtin) => Ok(()),
            Some(TypedefEntry::Type(target)) => {
                let leaf = typedecl_of(&target)
                    .ok_or_else(|| Error::mismatch(format!("typedef '{}' has no declarator", key)))?;
                let name = declname_of(&leaf)
                    .ok_or_else(|| Error::UnknownIdentifier(key))?;
                if let Type::Ident(it) = &mut *ty.borrow_mut() {
                    it.names = vec![name];
                }
                Ok(())
            }
        }
    }

    fn visit_aggregate(&mut self, ty: &TypeRef, kind: AggKind) -> Result<()> {
        // Members first: each gets a positional member-namespace symbol.
        let mut members = match &mut *ty.borrow_mut() {
            Type::Struct(a) | Type::Union(a) => a.members.take(),
            _ => None,
        };
        let has_body = members.is_some();
        let mut result = Ok(());
        if let Some(ms) = members.as_mut() {
            for (i, member) in ms.iter_mut().enumerate() {
                result = self.visit_member_decl(member, i);
                if result.is_err() {
                    break;
                }
            }
        }
        if let Type::Struct(a) | Type::Union(a) = &mut *ty.borrow_mut() {
            a.members = members;
        }
        result?;

        let tag = match &*ty.borrow() {
            Type::Struct(a) | Type::Union(a) => a.tag.clone(),
            _ => None,
        };
        let tag = match tag {
            Some(tag) => tag,
            None => return Ok(()),
        };
        if tag.is_sym() {
            // Already bound: this is the same node seen through another
            // declarator of the same declaration.
            return Ok(());
        }
        let key = tag.orig().to_string();

        // A definition may shadow an outer tag; a bare reference reaches
        // outward.
        let bound = if has_body {
            self.agg_names(kind).contains_local(&key)
        } else {
            self.agg_names(kind).contains(&key)
        };
        let sym = if bound {
            self.agg_names(kind)
                .get(&key)
                .ok_or_else(|| Error::UnknownIdentifier(key.clone()))?
        } else {
            let sym = self.create_symbol(&key, kind.ns())?;
            self.agg_names(kind).insert(&key, sym.clone());
            sym
        };
        set_tag(ty, Name::Sym(sym));

        if has_body {
            if self.agg_decls(kind).contains_local(&key) {
                return Err(Error::Redefinition(format!("{} {}", kind.kw(), key)));
            }
            self.agg_decls(kind).insert(&key, ty.clone());
        }
        Ok(())
    }

    fn visit_member_decl(&mut self, member: &mut Decl, index: usize) -> Result<()> {
        self.visit_type(&member.ty.clone())?;
        if let Some(width) = member.bit_width.as_mut() {
            self.visit_expr(width)?;
        }
        let leaf = typedecl_of(&member.ty)
            .ok_or_else(|| Error::mismatch("member without a declarator".to_string()))?;
        let orig = declname_of(&leaf)
            .map(|n| n.orig().to_string())
            .unwrap_or_default();
        stamp_declname(&leaf, Name::Sym(Symbol::named(orig, encode(index)?)));
        Ok(())
    }

    fn visit_enum(&mut self, ty: &TypeRef) -> Result<()> {
        let (tag, has_body, revisit) = {
            let b = ty.borrow();
            match &*b {
                Type::Enum(e) => {
                    let revisit = e.tag.as_ref().map_or(false, |t| t.is_sym())
                        || e.values
                            .as_ref()
                            .and_then(|vs| vs.first())
                            .map_or(false, |v| v.name.is_sym());
                    (e.tag.clone(), e.values.is_some(), revisit)
                }
                _ => return Ok(()),
            }
        };
        if revisit {
            return Ok(());
        }

        let key = match &tag {
            Some(tag) => {
                let key = tag.orig().to_string();
                let bound = if has_body {
                    self.tables.enum_names.contains_local(&key)
                } else {
                    self.tables.enum_names.contains(&key)
                };
                let sym = if bound {
                    self.tables
                        .enum_names
                        .get(&key)
                        .ok_or_else(|| Error::UnknownIdentifier(key.clone()))?
                } else {
                    let sym = self.create_symbol(&key, Ns::Enum)?;
                    self.tables.enum_names.insert(&key, sym.clone());
                    sym
                };
                set_tag(ty, Name::Sym(sym));
                Some(key)
            }
            None => None,
        };

        if !has_body {
            return Ok(());
        }
        if let Some(key) = &key {
            if self.tables.enum_decls.contains_local(key) {
                return Err(Error::Redefinition(format!("enum {}", key)));
            }
            self.tables.enum_decls.insert(key, ty.clone());
        }

        let mut values = match &mut *ty.borrow_mut() {
            Type::Enum(e) => e.values.take(),
            _ => None,
        };
        let mut result = Ok(());
        if let Some(vs) = values.as_mut() {
            for e in vs.iter_mut() {
                result = self.visit_enumerator(e, ty);
                if result.is_err() {
                    break;
                }
            }
        }
        if let Type::Enum(e) = &mut *ty.borrow_mut() {
            e.values = values;
        }
        result
    }

    fn visit_enumerator(&mut self, e: &mut Enumerator, enum_ty: &TypeRef) -> Result<()> {
        let key = e.name.orig().to_string();
        if self.tables.decl_types.contains_local(&key) {
            return Err(Error::Redefinition(key));
        }
        self.tables.decl_types.insert(&key, enum_ty.clone());
        let sym = self.create_symbol(&key, Ns::Decl)?;
        self.tables
            .decl_inits
            .insert(&key, DeclInit::Enumerator(sym.clone()));
        e.name = Name::Sym(sym);
        if let Some(value) = e.value.as_mut() {
            self.visit_expr(value)?;
        }
        Ok(())
    }

    fn agg_names(&mut self, kind: AggKind) -> &mut tables::ScopedTable<SymbolRef> {
        match kind {
            AggKind::Struct => &mut self.tables.struct_names,
            AggKind::Union => &mut self.tables.union_names,
        }
    }

    fn agg_decls(&mut self, kind: AggKind) -> &mut tables::ScopedTable<TypeRef> {
        match kind {
            AggKind::Struct => &mut self.tables.struct_decls,
            AggKind::Union => &mut self.tables.union_decls,
        }
    }

    // --- type resolution ---

    fn resolve_flow(&mut self, t: TypeFlow) -> Result<TypeFlow> {
        match t {
            None => Ok(None),
            Some(t) => self.resolve(&t).map(Some),
        }
    }

    /// Peel one `TypeDecl` wrapper, then chase tags and typedefs until a
    /// concrete type node is reached. Tag lookups that fall through to an
    /// outer frame are recorded as references, which is what keeps a
    /// struct definition alive when it is only used via member access.
    fn resolve(&mut self, ty: &TypeRef) -> Result<TypeRef> {
        let t = {
            let b = ty.borrow();
            match &*b {
                Type::TypeDecl(td) => td.ty.clone(),
                _ => ty.clone(),
            }
        };
        enum Chase {
            Done,
            Tag(AggKind, String),
            Typedef(String),
        }
        let chase = {
            let b = t.borrow();
            match &*b {
                Type::Struct(a) if a.members.is_none() => match &a.tag {
                    Some(tag) => Chase::Tag(AggKind::Struct, tag.orig().to_string()),
                    None => Chase::Done,
                },
                Type::Union(a) if a.members.is_none() => match &a.tag {
                    Some(tag) => Chase::Tag(AggKind::Union, tag.orig().to_string()),
                    None => Chase::Done,
                },
                Type::Ident(it) if it.names.len() == 1 && it.names[0].is_sym() => {
                    Chase::Typedef(it.names[0].orig().to_string())
                }
                _ => Chase::Done,
            }
        };
        match chase {
            Chase::Done => Ok(t),
            Chase::Tag(kind, key) => {
                let decl = if self.agg_names(kind).contains_local(&key) {
                    self.agg_decls(kind).get_local(&key)
                } else {
                    self.agg_decls(kind).get(&key)
                };
                decl.ok_or_else(|| {
                    Error::mismatch(format!("'{} {}' has no visible definition", kind.kw(), key))
                })
            }
            Chase::Typedef(key) => match self.tables.typedefs.get(&key) {
                Some(TypedefEntry::Type(target)) => self.resolve(&target),
                Some(TypedefEntry::Builtin) => Ok(t),
                None => Err(Error::UnknownIdentifier(key)),
            },
        }
    }

    // --- statements ---

    fn visit_stmt(&mut self, stmt: &mut Stmt) -> Result<()> {
        match stmt {
            Stmt::Compound(items) => self.scoped(|s| {
                for item in items.iter_mut() {
                    match item {
                        BlockItem::Decl(d) => s.visit_decl(d)?,
                        BlockItem::Typedef(t) => s.visit_typedef(t)?,
                        BlockItem::Stmt(st) => s.visit_stmt(st)?,
                        BlockItem::StaticAssert(sa) => {
                            s.visit_expr(&mut sa.cond)?;
                        }
                    }
                }
                Ok(())
            }),
            Stmt::Expr(e) => self.visit_expr(e).map(|_| ()),
            Stmt::Empty => Ok(()),
            Stmt::If {
                cond,
                then_stmt,
                else_stmt,
            } => self.scoped(|s| {
                s.visit_expr(cond)?;
                s.visit_stmt(then_stmt)?;
                if let Some(e) = else_stmt {
                    s.visit_stmt(e)?;
                }
                Ok(())
            }),
            Stmt::Switch { cond, body } => self.scoped(|s| {
                s.visit_expr(cond)?;
                s.visit_stmt(body)
            }),
            Stmt::While { cond, body } => self.scoped(|s| {
                s.visit_expr(cond)?;
                s.visit_stmt(body)
            }),
            Stmt::DoWhile { body, cond } => self.scoped(|s| {
                s.visit_stmt(body)?;
                s.visit_expr(cond).map(|_| ())
            }),
            Stmt::For {
                init,
                cond,
                step,
                body,
            } => self.scoped(|s| {
                match init {
                    ForInit::None => {}
                    ForInit::Expr(e) => {
                        s.visit_expr(e)?;
                    }
                    ForInit::Decls(decls) => {
                        for d in decls.iter_mut() {
                            s.visit_decl(d)?;
                        }
                        // Trailing declarators print by name only; give
                        // them their renamed spelling.
                        for d in decls.iter_mut().skip(1) {
                            if let Some(leaf) = typedecl_of(&d.ty) {
                                if let Some(name) = declname_of(&leaf) {
                                    d.name = Some(name);
                                }
                            }
                        }
                    }
                }
                if let Some(e) = cond {
                    s.visit_expr(e)?;
                }
                if let Some(e) = step {
                    s.visit_expr(e)?;
                }
                s.visit_stmt(body)
            }),
            Stmt::Goto(name) => {
                *name = self.label_name(name)?;
                Ok(())
            }
            Stmt::Label { name, body } => {
                *name = self.label_name(name)?;
                self.visit_stmt(body)
            }
            Stmt::Case { expr, body } => {
                self.visit_expr(expr)?;
                self.visit_stmt(body)
            }
            Stmt::Default(body) => self.visit_stmt(body),
            Stmt::Break | Stmt::Continue => Ok(()),
            Stmt::Return(e) => {
                if let Some(e) = e {
                    self.visit_expr(e)?;
                }
                Ok(())
            }
            Stmt::Pragma(_) => Ok(()),
            Stmt::StaticAssert(sa) => self.visit_expr(&mut sa.cond).map(|_| ()),
        }
    }

    /// Labels live in a per-function namespace; `goto` may forward-reference.
    fn label_name(&mut self, name: &Name) -> Result<Name> {
        let key = name.orig().to_string();
        if let Some(sym) = self.labels.get(&key) {
            return Ok(Name::Sym(sym.clone()));
        }
        let sym = Symbol::named(key.clone(), encode(self.labels.len())?);
        self.labels.insert(key, sym.clone());
        Ok(Name::Sym(sym))
    }

    // --- expressions ---

    fn visit_expr(&mut self, expr: &mut Expr) -> Result<TypeFlow> {
        match expr {
            Expr::Id(id) => self.visit_id(id),
            Expr::Constant(_) | Expr::StringLit(_) => Ok(None),
            Expr::Unary { op, operand } => {
                let t = self.visit_expr(operand)?;
                match op {
                    UnaryOp::Deref => match self.resolve_flow(t)? {
                        None => Ok(None),
                        Some(rt) => {
                            let pointee = match &*rt.borrow() {
                                Type::Ptr(p) => Some(p.ty.clone()),
                                _ => None,
                            };
                            pointee.map(Some).ok_or_else(|| {
                                Error::mismatch("'*' applied to a non-pointer".to_string())
                            })
                        }
                    },
                    UnaryOp::Address => Ok(t.map(|inner| {
                        tyref(Type::Ptr(PtrDecl {
                            quals: Vec::new(),
                            ty: inner,
                        }))
                    })),
                    _ => Ok(None),
                }
            }
            Expr::Binary { lhs, rhs, .. } => {
                self.visit_expr(lhs)?;
                self.visit_expr(rhs)?;
                Ok(None)
            }
            Expr::Conditional {
                cond,
                then_expr,
                else_expr,
            } => {
                self.visit_expr(cond)?;
                self.visit_expr(then_expr)?;
                self.visit_expr(else_expr)?;
                Ok(None)
            }
            Expr::Assign { lhs, rhs, .. } => {
                self.visit_expr(rhs)?;
                self.visit_expr(lhs)?;
                Ok(None)
            }
            Expr::Cast { ty, expr } => {
                let ty = ty.clone();
                self.visit_type(&ty)?;
                self.visit_expr(expr)?;
                Ok(Some(ty))
            }
            Expr::Call { callee, args } => {
                let t = self.visit_expr(callee)?;
                for a in args.iter_mut() {
                    self.visit_expr(a)?;
                }
                let resolved = self.resolve_flow(t)?;
                let resolved = match resolved {
                    None => return Ok(None),
                    Some(rt) => {
                        let pointee = match &*rt.borrow() {
                            Type::Ptr(p) => Some(p.ty.clone()),
                            _ => None,
                        };
                        match pointee {
                            Some(p) => self.resolve(&p)?,
                            None => rt,
                        }
                    }
                };
                let ret = match &*resolved.borrow() {
                    Type::Func(f) => Some(f.ret.clone()),
                    _ => None,
                };
                ret.map(Some)
                    .ok_or_else(|| Error::mismatch("called object is not a function".to_string()))
            }
            Expr::Index { base, index } => {
                let t = self.visit_expr(base)?;
                let resolved = self.resolve_flow(t)?;
                self.visit_expr(index)?;
                match resolved {
                    None => Ok(None),
                    Some(rt) => {
                        let elem = match &*rt.borrow() {
                            Type::Array(a) => Some(a.ty.clone()),
                            Type::Ptr(p) => Some(p.ty.clone()),
                            _ => None,
                        };
                        elem.map(Some).ok_or_else(|| {
                            Error::mismatch(
                                "subscripted value is neither array nor pointer".to_string(),
                            )
                        })
                    }
                }
            }
            Expr::Member { base, arrow, field } => {
                let arrow = *arrow;
                let t = self.visit_expr(base)?;
                self.visit_member_access(t, arrow, field)
            }
            Expr::Comma(exprs) => {
                for e in exprs.iter_mut() {
                    self.visit_expr(e)?;
                }
                Ok(None)
            }
            Expr::SizeOfExpr(e) => {
                self.visit_expr(e)?;
                Ok(None)
            }
            Expr::SizeOfType(ty) | Expr::AlignOfType(ty) => {
                let ty = ty.clone();
                self.visit_type(&ty)?;
                Ok(None)
            }
            Expr::CompoundLiteral { ty, init } => {
                let ty = ty.clone();
                self.visit_type(&ty)?;
                self.visit_init_list(init, &ty)?;
                Ok(Some(ty))
            }
        }
    }

    fn visit_id(&mut self, id: &mut Id) -> Result<TypeFlow> {
        let key = id.name.orig().to_string();
        let ty = self
            .tables
            .decl_types
            .get(&key)
            .ok_or_else(|| Error::UnknownIdentifier(key.clone()))?;
        let is_enum = matches!(&*ty.borrow(), Type::Enum(_));
        if is_enum {
            match self.tables.decl_inits.get(&key) {
                Some(DeclInit::Enumerator(sym)) => id.name = Name::Sym(sym),
                _ => return Err(Error::UnknownIdentifier(key)),
            }
        } else {
            let leaf = typedecl_of(&ty)
                .ok_or_else(|| Error::mismatch(format!("'{}' has no declarator", key)))?;
            if let Some(name) = declname_of(&leaf) {
                id.name = name;
            }
        }
        Ok(Some(ty))
    }

    /// Resolve the aggregate behind a `.` or `->` access, stamp the member
    /// symbol onto the field, and hand back the member's type.
    fn visit_member_access(
        &mut self,
        base_ty: TypeFlow,
        arrow: bool,
        field: &mut Id,
    ) -> Result<TypeFlow> {
        let field_name = field.name.orig().to_string();
        let mut resolved = self.resolve_flow(base_ty)?;
        if arrow {
            let pointee = match &resolved {
                Some(rt) => match &*rt.borrow() {
                    Type::Ptr(p) => Some(p.ty.clone()),
                    _ => None,
                },
                None => None,
            };
            match pointee {
                Some(p) => resolved = Some(self.resolve(&p)?),
                None => {
                    return Err(Error::mismatch(format!(
                        "'->{}' applied to a non-pointer",
                        field_name
                    )))
                }
            }
        }
        let node = resolved.ok_or_else(|| {
            Error::mismatch(format!(
                "cannot resolve the aggregate before '.{}'",
                field_name
            ))
        })?;
        let found = {
            let b = node.borrow();
            let members = match &*b {
                Type::Struct(a) | Type::Union(a) => a.members.as_ref(),
                _ => {
                    return Err(Error::mismatch(format!(
                        "member access '.{}' on a non-aggregate",
                        field_name
                    )))
                }
            };
            let members = members.ok_or_else(|| {
                Error::mismatch(format!("member access '.{}' on an incomplete type", field_name))
            })?;
            find_member(members, &field_name)
        };
        match found {
            Some((_, name, ty)) => {
                field.name = name;
                Ok(Some(ty))
            }
            None => Err(Error::MemberNotFound(field_name)),
        }
    }

    // --- initializers ---

    fn visit_init_list(&mut self, list: &mut InitList, ty: &TypeRef) -> Result<()> {
        let resolved = self.resolve(ty)?;
        enum Shape {
            Array(TypeRef),
            Record(TypeRef),
            Scalar,
        }
        let shape = {
            let b = resolved.borrow();
            match &*b {
                Type::Array(a) => Shape::Array(a.ty.clone()),
                Type::Struct(_) | Type::Union(_) => Shape::Record(resolved.clone()),
                _ => Shape::Scalar,
            }
        };
        match shape {
            Shape::Array(elem) => {
                for item in list.items.iter_mut() {
                    self.visit_array_item(item, &elem)?;
                }
                Ok(())
            }
            Shape::Record(node) => {
                let mut index = 0usize;
                for item in list.items.iter_mut() {
                    index = self.visit_record_item(item, &node, index)? + 1;
                }
                Ok(())
            }
            Shape::Scalar => {
                for item in list.items.iter_mut() {
                    if !item.designators.is_empty() {
                        return Err(Error::mismatch(
                            "designator in a scalar initializer".to_string(),
                        ));
                    }
                    match &mut item.init {
                        Init::Expr(e) => {
                            self.visit_expr(e)?;
                        }
                        Init::List(_) => {
                            return Err(Error::mismatch(
                                "initializer list for a scalar".to_string(),
                            ))
                        }
                    }
                }
                Ok(())
            }
        }
    }

    fn visit_array_item(&mut self, item: &mut InitItem, elem: &TypeRef) -> Result<()> {
        let mut target = elem.clone();
        let mut rest_from = 0;
        if let Some(first) = item.designators.first_mut() {
            rest_from = 1;
            match first {
                Designator::Index(e) => {
                    self.visit_expr(e)?;
                }
                Designator::Member(id) => {
                    // `.f` directly under an array element resolves against
                    // the element's aggregate.
                    let resolved = self.resolve(elem)?;
                    let found = {
                        let b = resolved.borrow();
                        match &*b {
                            Type::Struct(a) | Type::Union(a) => a
                                .members
                                .as_ref()
                                .and_then(|ms| find_member(ms, id.name.orig())),
                            _ => None,
                        }
                    };
                    match found {
                        Some((_, name, ty)) => {
                            id.name = name;
                            target = ty;
                        }
                        None => return Err(Error::MemberNotFound(id.name.orig().to_string())),
                    }
                }
            }
        }
        for d in item.designators.iter_mut().skip(rest_from) {
            if let Designator::Index(e) = d {
                self.visit_expr(e)?;
            }
        }
        match &mut item.init {
            Init::Expr(e) => {
                self.visit_expr(e)?;
            }
            Init::List(l) => self.visit_init_list(l, &target)?,
        }
        Ok(())
    }

    /// One item of a struct/union initializer. Returns the member index it
    /// consumed so the caller can advance the positional cursor.
    fn visit_record_item(
        &mut self,
        item: &mut InitItem,
        node: &TypeRef,
        mut index: usize,
    ) -> Result<usize> {
        let mut target: Option<TypeRef> = None;
        let mut rest_from = 0;
        if let Some(first) = item.designators.first_mut() {
            rest_from = 1;
            match first {
                Designator::Member(id) => {
                    let found = {
                        let b = node.borrow();
                        match &*b {
                            Type::Struct(a) | Type::Union(a) => a
                                .members
                                .as_ref()
                                .and_then(|ms| find_member(ms, id.name.orig())),
                            _ => None,
                        }
                    };
                    match found {
                        Some((i, name, ty)) => {
                            index = i;
                            id.name = name;
                            target = Some(ty);
                        }
                        None => return Err(Error::MemberNotFound(id.name.orig().to_string())),
                    }
                }
                Designator::Index(e) => {
                    self.visit_expr(e)?;
                }
            }
        }
        for d in item.designators.iter_mut().skip(rest_from) {
            if let Designator::Index(e) = d {
                self.visit_expr(e)?;
            }
        }
        match &mut item.init {
            Init::Expr(e) => {
                self.visit_expr(e)?;
            }
            Init::List(l) => {
                let target = match target {
                    Some(t) => t,
                    None => {
                        let at = {
                            let b = node.borrow();
                            match &*b {
                                Type::Struct(a) | Type::Union(a) => a
                                    .members
                                    .as_ref()
                                    .and_then(|ms| ms.get(index).map(|m| m.ty.clone())),
                                _ => None,
                            }
                        };
                        at.ok_or_else(|| {
                            Error::mismatch("excess elements in initializer".to_string())
                        })?
                    }
                };
                self.visit_init_list(l, &target)?;
            }
        }
        Ok(index)
    }
}

/// Find a member by its original name; yields its index, its stamped
/// member symbol, and its type.
fn find_member(members: &[Decl], field: &str) -> Option<(usize, Name, TypeRef)> {
    for (i, m) in members.iter().enumerate() {
        let matches = m.name.as_ref().map_or(false, |n| n.orig() == field);
        if matches {
            let leaf = typedecl_of(&m.ty)?;
            let name = declname_of(&leaf)?;
            return Some((i, name, m.ty.clone()));
        }
    }
    None
}

fn set_tag(ty: &TypeRef, name: Name) {
    match &mut *ty.borrow_mut() {
        Type::Struct(a) | Type::Union(a) => a.tag = Some(name),
        Type::Enum(e) => e.tag = Some(name),
        _ => {}
    }
}
