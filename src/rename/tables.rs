//! Scoped symbol tables.
//!
//! C keeps ordinary identifiers, tags and members in disjoint namespaces,
//! and the renamer additionally tracks tag definitions and initializers
//! separately from the names themselves. Each [`Tables`] frame therefore
//! holds nine independent maps; lookup chains outward, insertion is local
//! to the innermost frame.
//!
//! While a top-level declaration is being visited, the file-scope frame
//! records which names were declared into it and which lookups resolved at
//! it. Those become the declaration's declare/reference sets for the
//! reachability pass. Hits in inner frames (a function's own locals) and
//! in the builtin root frame are not references.

use std::collections::HashMap;

use crate::ast::{SymbolRef, TypeRef};

/// What a typedef name resolves to: a builtin base-type keyword (never
/// renamed, never chased) or the declared type tree.
#[derive(Clone)]
pub enum TypedefEntry {
    Builtin,
    Type(TypeRef),
}

/// What an ordinary identifier's initializer slot holds.
#[derive(Clone)]
pub enum DeclInit {
    /// A declaration with an initializer expression or list.
    Value,
    /// A function definition body.
    FuncBody,
    /// An enum constant; the symbol identifier uses are rewritten to.
    Enumerator(SymbolRef),
}

/// Declare/reference sets recorded for one table during one top-level
/// visit, in insertion order.
#[derive(Default)]
pub struct Recording {
    pub declared: Vec<String>,
    pub referenced: Vec<String>,
}

fn note(list: &mut Vec<String>, name: &str) {
    if !list.iter().any(|n| n == name) {
        list.push(name.to_string());
    }
}

pub struct ScopedTable<V> {
    frames: Vec<HashMap<String, V>>,
    /// Frame index being recorded, with the sets gathered so far.
    record: Option<(usize, Recording)>,
}

impl<V: Clone> ScopedTable<V> {
    fn new(root: HashMap<String, V>) -> Self {
        ScopedTable {
            frames: vec![root],
            record: None,
        }
    }

    fn push(&mut self) {
        self.frames.push(HashMap::new());
    }

    fn pop(&mut self) {
        self.frames.pop();
    }

    fn start_recording(&mut self) {
        self.record = Some((self.frames.len() - 1, Recording::default()));
    }

    fn take_recording(&mut self) -> Recording {
        match self.record.take() {
            Some((_, rec)) => rec,
            None => Recording::default(),
        }
    }

    /// Chained lookup. Records a reference when the hit lands on the
    /// recorded frame.
    pub fn get(&mut self, name: &str) -> Option<V> {
        for i in (0..self.frames.len()).rev() {
            if let Some(v) = self.frames[i].get(name) {
                let v = v.clone();
                if let Some((frame, rec)) = &mut self.record {
                    if i == *frame {
                        note(&mut rec.referenced, name);
                    }
                }
                return Some(v);
            }
        }
        None
    }

    /// Innermost-frame lookup, recorded like [`get`](Self::get) when the
    /// innermost frame is the recorded one.
    pub fn get_local(&mut self, name: &str) -> Option<V> {
        let top = self.frames.len() - 1;
        let v = self.frames[top].get(name)?.clone();
        if let Some((frame, rec)) = &mut self.record {
            if top == *frame {
                note(&mut rec.referenced, name);
            }
        }
        Some(v)
    }

    /// Chained membership test; never records.
    pub fn contains(&self, name: &str) -> bool {
        self.frames.iter().any(|f| f.contains_key(name))
    }

    /// Innermost-frame membership test; never records.
    pub fn contains_local(&self, name: &str) -> bool {
        self.frames
            .last()
            .map_or(false, |f| f.contains_key(name))
    }

    /// Insert into the innermost frame. Returns `false` when the name is
    /// already bound there; the caller turns that into a redefinition
    /// error with the right context.
    pub fn insert(&mut self, name: &str, value: V) -> bool {
        let top = self.frames.len() - 1;
        if self.frames[top].contains_key(name) {
            return false;
        }
        if let Some((frame, rec)) = &mut self.record {
            if top == *frame {
                note(&mut rec.declared, name);
            }
        }
        self.frames[top].insert(name.to_string(), value);
        true
    }
}

/// Base-type keywords seeded into the root typedef frame as identity
/// entries so they resolve without ever being renamed.
const BUILTIN_TYPES: &[&str] = &[
    "void", "char", "short", "int", "long", "float", "double", "signed", "unsigned", "_Bool",
    "_Complex",
];

pub struct Tables {
    pub typedefs: ScopedTable<TypedefEntry>,
    pub struct_names: ScopedTable<SymbolRef>,
    pub struct_decls: ScopedTable<TypeRef>,
    pub union_names: ScopedTable<SymbolRef>,
    pub union_decls: ScopedTable<TypeRef>,
    pub enum_names: ScopedTable<SymbolRef>,
    pub enum_decls: ScopedTable<TypeRef>,
    pub decl_types: ScopedTable<TypeRef>,
    pub decl_inits: ScopedTable<DeclInit>,
}

/// The per-table recordings of one top-level declaration visit.
#[derive(Default)]
pub struct Recorded {
    pub typedefs: Recording,
    pub struct_names: Recording,
    pub struct_decls: Recording,
    pub union_names: Recording,
    pub union_decls: Recording,
    pub enum_names: Recording,
    pub enum_decls: Recording,
    pub decl_types: Recording,
    pub decl_inits: Recording,
}

impl Recorded {
    /// All nine tables in a fixed order, for building the per-namespace
    /// declare maps.
    pub fn all(&self) -> [&Recording; 9] {
        [
            &self.typedefs,
            &self.struct_names,
            &self.struct_decls,
            &self.union_names,
            &self.union_decls,
            &self.enum_names,
            &self.enum_decls,
            &self.decl_types,
            &self.decl_inits,
        ]
    }
}

pub const NS_DECL_TYPES: usize = 7;
pub const NS_DECL_INITS: usize = 8;

impl Tables {
    pub fn new() -> Self {
        let mut root = HashMap::new();
        for kw in BUILTIN_TYPES {
            root.insert(kw.to_string(), TypedefEntry::Builtin);
        }
        Tables {
            typedefs: ScopedTable::new(root),
            struct_names: ScopedTable::new(HashMap::new()),
            struct_decls: ScopedTable::new(HashMap::new()),
            union_names: ScopedTable::new(HashMap::new()),
            union_decls: ScopedTable::new(HashMap::new()),
            enum_names: ScopedTable::new(HashMap::new()),
            enum_decls: ScopedTable::new(HashMap::new()),
            decl_types: ScopedTable::new(HashMap::new()),
            decl_inits: ScopedTable::new(HashMap::new()),
        }
    }

    pub fn push_scope(&mut self) {
        self.typedefs.push();
        self.struct_names.push();
        self.struct_decls.push();
        self.union_names.push();
        self.union_decls.push();
        self.enum_names.push();
        self.enum_decls.push();
        self.decl_types.push();
        self.decl_inits.push();
    }

    pub fn pop_scope(&mut self) {
        self.typedefs.pop();
        self.struct_names.pop();
        self.struct_decls.pop();
        self.union_names.pop();
        self.union_decls.pop();
        self.enum_names.pop();
        self.enum_decls.pop();
        self.decl_types.pop();
        self.decl_inits.pop();
    }

    pub fn start_record(&mut self) {
        self.typedefs.start_recording();
        self.struct_names.start_recording();
        self.struct_decls.start_recording();
        self.union_names.start_recording();
        self.union_decls.start_recording();
        self.enum_names.start_recording();
        self.enum_decls.start_recording();
        self.decl_types.start_recording();
        self.decl_inits.start_recording();
    }

    pub fn take_record(&mut self) -> Recorded {
        Recorded {
            typedefs: self.typedefs.take_recording(),
            struct_names: self.struct_names.take_recording(),
            struct_decls: self.struct_decls.take_recording(),
            union_names: self.union_names.take_recording(),
            union_decls: self.union_decls.take_recording(),
            enum_names: self.enum_names.take_recording(),
            enum_decls: self.enum_decls.take_recording(),
            decl_types: self.decl_types.take_recording(),
            decl_inits: self.decl_inits.take_recording(),
        }
    }
}
