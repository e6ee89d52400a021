//! Struct-declaration rewriter.
//!
//! The adapter gives every declarator of `struct X {int a;} a, b;` its own
//! `Decl`, all sharing one aggregate node. Printed naively that would
//! repeat the body once per declarator, redefining the tag. This pass walks
//! every ordered declaration list and, whenever consecutive declarations
//! share the same aggregate node by pointer identity, leaves the body on
//! the first one and gives the rest a reference-only copy of the type. A
//! shared aggregate without a tag first gets a synthetic `_anonymous_N`
//! tag so the references have something to name.
//!
//! The pass cannot fail and running it twice changes nothing: a reference
//! copy is a fresh node, so no run of shared declarations survives.

use std::rc::Rc;

use crate::ast::*;

pub fn rewrite(ast: &mut FileAst) {
    Rewriter::new().rewrite_unit(ast)
}

struct Rewriter {
    counter: usize,
}

impl Rewriter {
    fn new() -> Self {
        Rewriter { counter: 0 }
    }

    fn rewrite_unit(&mut self, ast: &mut FileAst) {
        let mut last = None;
        for item in ast.ext.iter_mut() {
            match item {
                ExtDecl::Decl(d) => self.step(d, &mut last),
                _ => last = None,
            }
        }
        for item in ast.ext.iter_mut() {
            if let ExtDecl::FuncDef(f) = item {
                self.rewrite_stmt(&mut f.body);
            }
        }
    }

    /// One declaration of a scan. `last` holds the aggregate node of the
    /// previous declaration, if it had one.
    fn step(&mut self, decl: &mut Decl, last: &mut Option<TypeRef>) {
        let agg = match inner_aggregate(&decl.ty) {
            Some(agg) => agg,
            None => {
                *last = None;
                return;
            }
        };
        let shared = last.as_ref().map_or(false, |prev| Rc::ptr_eq(prev, &agg));
        if !shared {
            *last = Some(agg);
            return;
        }
        let tag = self.ensure_tag(&agg);
        let reference = reference_only(&agg, tag);
        if let Type::TypeDecl(td) = &mut *decl.ty.borrow_mut() {
            td.ty = reference;
        }
    }

    fn ensure_tag(&mut self, agg: &TypeRef) -> Name {
        let mut b = agg.borrow_mut();
        let tag = match &mut *b {
            Type::Struct(a) | Type::Union(a) => &mut a.tag,
            Type::Enum(e) => &mut e.tag,
            _ => unreachable!("not an aggregate node"),
        };
        if tag.is_none() {
            *tag = Some(Name::text(format!("_anonymous_{}", self.counter)));
            self.counter += 1;
        }
        tag.clone().expect("tag was just minted")
    }

    fn rewrite_stmt(&mut self, stmt: &mut Stmt) {
        match stmt {
            Stmt::Compound(items) => {
                let mut last = None;
                for item in items.iter_mut() {
                    match item {
                        BlockItem::Decl(d) => self.step(d, &mut last),
                        _ => last = None,
                    }
                }
                for item in items.iter_mut() {
                    if let BlockItem::Stmt(s) = item {
                        self.rewrite_stmt(s);
                    }
                }
            }
            Stmt::If {
                then_stmt,
                else_stmt,
                ..
            } => {
                self.rewrite_stmt(then_stmt);
                if let Some(e) = else_stmt {
                    self.rewrite_stmt(e);
                }
            }
            Stmt::Switch { body, .. }
            | Stmt::While { body, .. }
            | Stmt::DoWhile { body, .. }
            | Stmt::Label { body, .. }
            | Stmt::Case { body, .. }
            | Stmt::Default(body) => self.rewrite_stmt(body),
            Stmt::For { init, body, .. } => {
                if let ForInit::Decls(decls) = init {
                    let mut last = None;
                    for d in decls.iter_mut() {
                        self.step(d, &mut last);
                    }
                }
                self.rewrite_stmt(body);
            }
            _ => {}
        }
    }
}

/// The aggregate directly under the declarator leaf, if the declaration
/// has the `struct/union/enum ... name;` shape the splitter cares about.
fn inner_aggregate(ty: &TypeRef) -> Option<TypeRef> {
    let b = ty.borrow();
    let td = match &*b {
        Type::TypeDecl(td) => td,
        _ => return None,
    };
    let is_agg = matches!(
        &*td.ty.borrow(),
        Type::Struct(_) | Type::Union(_) | Type::Enum(_)
    );
    if is_agg {
        Some(td.ty.clone())
    } else {
        None
    }
}

/// A tag-only copy of an aggregate node: same kind, same tag, no body.
fn reference_only(agg: &TypeRef, tag: Name) -> TypeRef {
    match &*agg.borrow() {
        Type::Struct(_) => tyref(Type::Struct(Aggregate {
            tag: Some(tag),
            members: None,
        })),
        Type::Union(_) => tyref(Type::Union(Aggregate {
            tag: Some(tag),
            members: None,
        })),
        Type::Enum(_) => tyref(Type::Enum(EnumType {
            tag: Some(tag),
            values: None,
        })),
        _ => unreachable!("not an aggregate node"),
    }
}

#[cfg(test)]
mod tests {
    use crate::emit;
    use crate::lower;
    use lang_c::driver::{parse_preprocessed, Config};
    use pretty_assertions::assert_eq;

    fn rewritten(source: &str) -> String {
        let parse = parse_preprocessed(&Config::with_gcc(), source.to_string())
            .expect("source should parse");
        let mut ast = lower::lower_unit(&parse.unit).expect("source should lower");
        super::rewrite(&mut ast);
        emit::to_c(&ast, false)
    }

    #[test]
    fn splits_a_shared_struct_body() {
        assert_eq!(
            rewritten("struct X {int a;} a,b;"),
            "struct X { int a; } a;\nstruct X b;\n"
        );
    }

    #[test]
    fn splits_a_shared_union_and_enum_body() {
        assert_eq!(
            rewritten("union X {int a;} a,b;"),
            "union X { int a; } a;\nunion X b;\n"
        );
        assert_eq!(
            rewritten("enum X {A} a,b;"),
            "enum X { A } a;\nenum X b;\n"
        );
    }

    #[test]
    fn mints_synthetic_tags_for_anonymous_aggregates() {
        assert_eq!(
            rewritten("struct {int a;} a,b;"),
            "struct _anonymous_0 { int a; } a;\nstruct _anonymous_0 b;\n"
        );
    }

    #[test]
    fn leaves_single_declarators_alone() {
        assert_eq!(rewritten("struct {int a;} a;"), "struct { int a; } a;\n");
    }

    #[test]
    fn descends_into_function_bodies() {
        assert_eq!(
            rewritten("void f() { struct X {int a;} a,b; }"),
            "void f() { struct X { int a; } a; struct X b; }\n"
        );
    }

    #[test]
    fn for_init_declarations_are_split_in_place() {
        // The reference copy is invisible here: the printer shows trailing
        // declarators of a for-init list by name only.
        assert_eq!(
            rewritten("void f() { for (struct X {int a;} a,b;;); }"),
            "void f() { for (struct X { int a; } a, b;;) ; }\n"
        );
    }

    #[test]
    fn rewrite_is_idempotent() {
        let source = "struct {int a;} a,b; void f() { struct X {int x;} c,d; }";
        let parse = parse_preprocessed(&Config::with_gcc(), source.to_string())
            .expect("source should parse");
        let mut ast = lower::lower_unit(&parse.unit).expect("source should lower");
        super::rewrite(&mut ast);
        let once = emit::to_c(&ast, false);
        super::rewrite(&mut ast);
        let twice = emit::to_c(&ast, false);
        assert_eq!(once, twice);
    }
}
