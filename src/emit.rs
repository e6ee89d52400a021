//! Pretty printer: a deterministic projection from the AST back to C text.
//!
//! The layout is deliberately simple: one top-level item per line, single
//! spaces inside, compound bodies inline. Declarators are resolved the way
//! they were unrolled, collecting pointer/array/function modifiers on the
//! way down to the `TypeDecl` leaf and folding them around the declared
//! name, parenthesizing a pointer that is followed by an array or function
//! suffix.
//!
//! Expression printing parenthesizes any operand that is not an atom
//! (identifier, constant, subscript, member access, call). With
//! `reduce_parens` enabled, a binary operand is left bare when its
//! precedence makes the grouping redundant: `>=` the parent's on the left
//! of a left-associative operator, `>` on the right.
//!
//! Symbols print as their current renamed spelling, plain identifiers as
//! their literal text.

use crate::ast::*;

pub fn to_c(ast: &FileAst, reduce_parens: bool) -> String {
    let p = Printer { reduce_parens };
    let mut out = String::new();
    for item in &ast.ext {
        out.push_str(&p.ext_string(item));
        out.push('\n');
    }
    out
}

struct Printer {
    reduce_parens: bool,
}

enum Modifier {
    Ptr(Vec<Qualifier>),
    Arr(String),
    Fun(String),
}

impl Printer {
    fn ext_string(&self, item: &ExtDecl) -> String {
        match item {
            ExtDecl::Decl(d) => format!("{};", self.decl_string(d)),
            ExtDecl::Typedef(t) => format!("typedef {};", self.type_string(&t.ty)),
            ExtDecl::FuncDef(f) => {
                format!("{} {}", self.decl_string(&f.decl), self.stmt_string(&f.body))
            }
            ExtDecl::StaticAssert(sa) => format!("{};", self.static_assert_string(sa)),
            ExtDecl::Pragma(text) => format!("#pragma {}", text),
        }
    }

    fn decl_string(&self, d: &Decl) -> String {
        let mut parts: Vec<String> = Vec::new();
        for f in &d.funcspecs {
            parts.push(f.as_str().to_string());
        }
        for s in &d.storage {
            parts.push(s.as_str().to_string());
        }
        if let Some(align) = &d.align {
            parts.push(match align {
                Alignment::Type(t) => format!("_Alignas({})", self.type_string(t)),
                Alignment::Expr(e) => format!("_Alignas({})", self.expr_string(e)),
            });
        }
        let mut s = parts.join(" ");
        if !s.is_empty() {
            s.push(' ');
        }
        s.push_str(&self.type_string(&d.ty));
        if let Some(init) = &d.init {
            s.push_str(" = ");
            s.push_str(&self.init_string(init));
        }
        s
    }

    fn member_string(&self, m: &Decl) -> String {
        let mut s = self.decl_string(m);
        if let Some(width) = &m.bit_width {
            s.push_str(" : ");
            s.push_str(&self.expr_string(width));
        }
        s
    }

    /// Print a type with its declared name folded in. Modifiers are
    /// collected outermost-first on the way to the leaf, then applied to
    /// the name in that order.
    fn type_string(&self, ty: &TypeRef) -> String {
        let mut mods: Vec<Modifier> = Vec::new();
        let mut cur = ty.clone();
        loop {
            let next = {
                let b = cur.borrow();
                match &*b {
                    Type::Ptr(p) => {
                        mods.push(Modifier::Ptr(p.quals.clone()));
                        Some(p.ty.clone())
                    }
                    Type::Array(a) => {
                        mods.push(Modifier::Arr(self.array_size_string(&a.size)));
                        Some(a.ty.clone())
                    }
                    Type::Func(f) => {
                        mods.push(Modifier::Fun(self.params_string(f)));
                        Some(f.ret.clone())
                    }
                    _ => None,
                }
            };
            match next {
                Some(inner) => cur = inner,
                None => break,
            }
        }

        let (quals, declname, base) = {
            let b = cur.borrow();
            match &*b {
                Type::TypeDecl(td) => (
                    td.quals.clone(),
                    td.declname.as_ref().map(|n| n.current()),
                    td.ty.clone(),
                ),
                _ => (Vec::new(), None, cur.clone()),
            }
        };

        let mut s = String::new();
        for q in &quals {
            s.push_str(q.as_str());
            s.push(' ');
        }
        s.push_str(&self.base_type_string(&base));

        let mut nstr = declname.unwrap_or_default();
        for i in 0..mods.len() {
            let after_ptr = i > 0 && matches!(mods[i - 1], Modifier::Ptr(_));
            match &mods[i] {
                Modifier::Arr(dim) => {
                    if after_ptr {
                        nstr = format!("({})", nstr);
                    }
                    nstr.push('[');
                    nstr.push_str(dim);
                    nstr.push(']');
                }
                Modifier::Fun(params) => {
                    if after_ptr {
                        nstr = format!("({})", nstr);
                    }
                    nstr.push('(');
                    nstr.push_str(params);
                    nstr.push(')');
                }
                Modifier::Ptr(quals) => {
                    if quals.is_empty() {
                        nstr = format!("*{}", nstr);
                    } else {
                        let quals: Vec<&str> = quals.iter().map(|q| q.as_str()).collect();
                        if nstr.is_empty() {
                            nstr = format!("* {}", quals.join(" "));
                        } else {
                            nstr = format!("* {} {}", quals.join(" "), nstr);
                        }
                    }
                }
            }
        }
        if !nstr.is_empty() {
            s.push(' ');
            s.push_str(&nstr);
        }
        s
    }

    fn base_type_string(&self, base: &TypeRef) -> String {
        {
            let b = base.borrow();
            match &*b {
                Type::Ident(it) => {
                    return it
                        .names
                        .iter()
                        .map(|n| n.current())
                        .collect::<Vec<_>>()
                        .join(" ")
                }
                Type::Struct(a) => return self.aggregate_string("struct", a),
                Type::Union(a) => return self.aggregate_string("union", a),
                Type::Enum(e) => return self.enum_string(e),
                _ => {}
            }
        }
        self.type_string(base)
    }

    fn aggregate_string(&self, kw: &str, a: &Aggregate) -> String {
        let mut s = kw.to_string();
        if let Some(tag) = &a.tag {
            s.push(' ');
            s.push_str(&tag.current());
        }
        if let Some(members) = &a.members {
            if members.is_empty() {
                s.push_str(" {}");
            } else {
                s.push_str(" { ");
                for (i, m) in members.iter().enumerate() {
                    if i > 0 {
                        s.push(' ');
                    }
                    s.push_str(&self.member_string(m));
                    s.push(';');
                }
                s.push_str(" }");
            }
        }
        s
    }

    fn enum_string(&self, e: &EnumType) -> String {
        let mut s = "enum".to_string();
        if let Some(tag) = &e.tag {
            s.push(' ');
            s.push_str(&tag.current());
        }
        if let Some(values) = &e.values {
            s.push_str(" { ");
            for (i, v) in values.iter().enumerate() {
                if i > 0 {
                    s.push_str(", ");
                }
                s.push_str(&v.name.current());
                if let Some(value) = &v.value {
                    s.push_str(" = ");
                    s.push_str(&self.expr_string(value));
                }
            }
            s.push_str(" }");
        }
        s
    }

    fn array_size_string(&self, size: &ArraySize) -> String {
        match size {
            ArraySize::Unknown => String::new(),
            ArraySize::Star => "*".to_string(),
            ArraySize::Fixed(e) => self.expr_string(e),
        }
    }

    fn params_string(&self, f: &FuncDecl) -> String {
        let mut parts: Vec<String> = f.params.iter().map(|p| self.decl_string(p)).collect();
        if f.variadic {
            parts.push("...".to_string());
        }
        parts.join(", ")
    }

    fn static_assert_string(&self, sa: &StaticAssert) -> String {
        match &sa.message {
            Some(msg) => format!("_Static_assert({}, {})", self.expr_string(&sa.cond), msg),
            None => format!("_Static_assert({})", self.expr_string(&sa.cond)),
        }
    }

    // --- statements ---

    fn stmt_string(&self, stmt: &Stmt) -> String {
        match stmt {
            Stmt::Compound(items) => {
                if items.is_empty() {
                    return "{}".to_string();
                }
                let mut s = "{ ".to_string();
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        s.push(' ');
                    }
                    s.push_str(&self.block_item_string(item));
                }
                s.push_str(" }");
                s
            }
            Stmt::Expr(e) => format!("{};", self.expr_string(e)),
            Stmt::Empty => ";".to_string(),
            Stmt::If {
                cond,
                then_stmt,
                else_stmt,
            } => {
                let mut s = format!(
                    "if ({}) {}",
                    self.expr_string(cond),
                    self.stmt_string(then_stmt)
                );
                if let Some(e) = else_stmt {
                    s.push_str(" else ");
                    s.push_str(&self.stmt_string(e));
                }
                s
            }
            Stmt::Switch { cond, body } => {
                format!("switch ({}) {}", self.expr_string(cond), self.stmt_string(body))
            }
            Stmt::While { cond, body } => {
                format!("while ({}) {}", self.expr_string(cond), self.stmt_string(body))
            }
            Stmt::DoWhile { body, cond } => {
                format!("do {} while ({});", self.stmt_string(body), self.expr_string(cond))
            }
            Stmt::For {
                init,
                cond,
                step,
                body,
            } => {
                let mut s = format!("for ({};", self.for_init_string(init));
                if let Some(e) = cond {
                    s.push(' ');
                    s.push_str(&self.expr_string(e));
                }
                s.push(';');
                if let Some(e) = step {
                    s.push(' ');
                    s.push_str(&self.expr_string(e));
                }
                s.push_str(") ");
                s.push_str(&self.stmt_string(body));
                s
            }
            Stmt::Goto(name) => format!("goto {};", name.current()),
            Stmt::Label { name, body } => format!("{}: {}", name.current(), self.stmt_string(body)),
            Stmt::Case { expr, body } => {
                format!("case {}: {}", self.expr_string(expr), self.stmt_string(body))
            }
            Stmt::Default(body) => format!("default: {}", self.stmt_string(body)),
            Stmt::Break => "break;".to_string(),
            Stmt::Continue => "continue;".to_string(),
            Stmt::Return(None) => "return;".to_string(),
            Stmt::Return(Some(e)) => format!("return {};", self.expr_string(e)),
            Stmt::Pragma(text) => format!("#pragma {}", text),
            Stmt::StaticAssert(sa) => format!("{};", self.static_assert_string(sa)),
        }
    }

    fn block_item_string(&self, item: &BlockItem) -> String {
        match item {
            BlockItem::Decl(d) => format!("{};", self.decl_string(d)),
            BlockItem::Typedef(t) => format!("typedef {};", self.type_string(&t.ty)),
            BlockItem::Stmt(s) => self.stmt_string(s),
            BlockItem::StaticAssert(sa) => format!("{};", self.static_assert_string(sa)),
        }
    }

    /// The first declarator of a `for`-init list prints in full; the rest
    /// print as bare names.
    fn for_init_string(&self, init: &ForInit) -> String {
        match init {
            ForInit::None => String::new(),
            ForInit::Expr(e) => self.expr_string(e),
            ForInit::Decls(decls) => {
                let mut s = String::new();
                for (i, d) in decls.iter().enumerate() {
                    if i == 0 {
                        s.push_str(&self.decl_string(d));
                    } else {
                        s.push_str(", ");
                        if let Some(name) = &d.name {
                            s.push_str(&name.current());
                        }
                        if let Some(init) = &d.init {
                            s.push_str(" = ");
                            s.push_str(&self.init_string(init));
                        }
                    }
                }
                s
            }
        }
    }

    // --- expressions ---

    fn expr_string(&self, e: &Expr) -> String {
        match e {
            Expr::Id(id) => id.name.current(),
            Expr::Constant(s) | Expr::StringLit(s) => s.clone(),
            Expr::Unary { op, operand } => {
                if op.is_postfix() {
                    format!("{}{}", self.operand_string(operand), op.as_str())
                } else {
                    format!("{}{}", op.as_str(), self.operand_string(operand))
                }
            }
            Expr::Binary { op, lhs, rhs } => format!(
                "{} {} {}",
                self.binary_operand(lhs, op.precedence(), true),
                op.as_str(),
                self.binary_operand(rhs, op.precedence(), false)
            ),
            Expr::Conditional {
                cond,
                then_expr,
                else_expr,
            } => format!(
                "{} ? {} : {}",
                self.operand_string(cond),
                self.operand_string(then_expr),
                self.operand_string(else_expr)
            ),
            Expr::Assign { op, lhs, rhs } => {
                let rhs_str = match &**rhs {
                    Expr::Assign { .. } | Expr::Comma(_) => {
                        format!("({})", self.expr_string(rhs))
                    }
                    _ => self.expr_string(rhs),
                };
                format!("{} {} {}", self.expr_string(lhs), op.as_str(), rhs_str)
            }
            Expr::Cast { ty, expr } => {
                format!("({}){}", self.type_string(ty), self.operand_string(expr))
            }
            Expr::Call { callee, args } => {
                let args: Vec<String> = args.iter().map(|a| self.arg_string(a)).collect();
                format!("{}({})", self.operand_string(callee), args.join(", "))
            }
            Expr::Index { base, index } => {
                format!("{}[{}]", self.operand_string(base), self.expr_string(index))
            }
            Expr::Member { base, arrow, field } => format!(
                "{}{}{}",
                self.operand_string(base),
                if *arrow { "->" } else { "." },
                field.name.current()
            ),
            Expr::Comma(exprs) => exprs
                .iter()
                .map(|e| self.expr_string(e))
                .collect::<Vec<_>>()
                .join(", "),
            Expr::SizeOfExpr(e) => format!("sizeof({})", self.expr_string(e)),
            Expr::SizeOfType(ty) => format!("sizeof({})", self.type_string(ty)),
            Expr::AlignOfType(ty) => format!("_Alignof({})", self.type_string(ty)),
            Expr::CompoundLiteral { ty, init } => {
                format!("({}){}", self.type_string(ty), self.init_list_string(init))
            }
        }
    }

    /// An operand that must read as one unit: atoms stay bare, everything
    /// else is parenthesized.
    fn operand_string(&self, e: &Expr) -> String {
        if is_simple(e) {
            self.expr_string(e)
        } else {
            format!("({})", self.expr_string(e))
        }
    }

    fn binary_operand(&self, e: &Expr, parent_prec: u8, is_left: bool) -> String {
        if is_simple(e) {
            return self.expr_string(e);
        }
        if self.reduce_parens {
            if let Expr::Binary { op, .. } = e {
                let prec = op.precedence();
                let redundant = if is_left {
                    prec >= parent_prec
                } else {
                    prec > parent_prec
                };
                if redundant {
                    return self.expr_string(e);
                }
            }
        }
        format!("({})", self.expr_string(e))
    }

    /// A call argument; a comma expression needs its own parentheses to
    /// stay one argument.
    fn arg_string(&self, e: &Expr) -> String {
        match e {
            Expr::Comma(_) => format!("({})", self.expr_string(e)),
            _ => self.expr_string(e),
        }
    }

    // --- initializers ---

    fn init_string(&self, init: &Init) -> String {
        match init {
            Init::Expr(e) => match e {
                Expr::Comma(_) => format!("({})", self.expr_string(e)),
                _ => self.expr_string(e),
            },
            Init::List(l) => self.init_list_string(l),
        }
    }

    fn init_list_string(&self, list: &InitList) -> String {
        let mut parts = Vec::new();
        for item in &list.items {
            let mut s = String::new();
            for d in &item.designators {
                match d {
                    Designator::Member(id) => {
                        s.push('.');
                        s.push_str(&id.name.current());
                    }
                    Designator::Index(e) => {
                        s.push('[');
                        s.push_str(&self.expr_string(e));
                        s.push(']');
                    }
                }
            }
            if !s.is_empty() {
                s.push_str(" = ");
            }
            s.push_str(&self.init_string(&item.init));
            parts.push(s);
        }
        format!("{{{}}}", parts.join(", "))
    }
}

fn is_simple(e: &Expr) -> bool {
    matches!(
        e,
        Expr::Id(_)
            | Expr::Constant(_)
            | Expr::StringLit(_)
            | Expr::Index { .. }
            | Expr::Member { .. }
            | Expr::Call { .. }
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lower;
    use lang_c::driver::{parse_preprocessed, Config};
    use pretty_assertions::assert_eq;

    fn printed(source: &str, reduce_parens: bool) -> String {
        let parse = parse_preprocessed(&Config::with_gcc(), source.to_string())
            .expect("source should parse");
        let ast = lower::lower_unit(&parse.unit).expect("source should lower");
        to_c(&ast, reduce_parens)
    }

    #[test]
    fn declarator_shapes_round_trip() {
        assert_eq!(printed("int *a[3];", false), "int *a[3];\n");
        assert_eq!(printed("int (*a)[3];", false), "int (*a)[3];\n");
        assert_eq!(
            printed("void (*f)(int, char *);", false),
            "void (*f)(int, char *);\n"
        );
        assert_eq!(printed("char *g(void);", false), "char *g(void);\n");
        assert_eq!(
            printed("const unsigned long x;", false),
            "const unsigned long x;\n"
        );
    }

    #[test]
    fn aggregate_bodies_print_inline() {
        assert_eq!(
            printed("struct S { int x; char *p; } s;", false),
            "struct S { int x; char *p; } s;\n"
        );
        assert_eq!(
            printed("enum E { A = 1, B } e;", false),
            "enum E { A = 1, B } e;\n"
        );
    }

    #[test]
    fn default_mode_groups_every_compound_operand() {
        assert_eq!(
            printed("int main() { return (1 + 2) * 3 - 4; }", false),
            "int main() { return ((1 + 2) * 3) - 4; }\n"
        );
    }

    #[test]
    fn reduce_mode_drops_redundant_grouping() {
        assert_eq!(
            printed("int main() { return (1 + 2) * 3 - 4; }", true),
            "int main() { return (1 + 2) * 3 - 4; }\n"
        );
        // Left-associative chains stay flat on the left, grouped on the
        // right.
        assert_eq!(
            printed("int main() { return 1 - 2 - 3; }", true),
            "int main() { return 1 - 2 - 3; }\n"
        );
        assert_eq!(
            printed("int main() { return 1 - (2 - 3); }", true),
            "int main() { return 1 - (2 - 3); }\n"
        );
    }

    #[test]
    fn statements_print_compactly() {
        assert_eq!(
            printed("int main() { if (1) ; else { ; } }", false),
            "int main() { if (1) ; else { ; } }\n"
        );
        assert_eq!(
            printed("int main() { do { break; } while (1); }", false),
            "int main() { do { break; } while (1); }\n"
        );
        assert_eq!(
            printed("int main() { switch (1) { case 1: break; default: break; } }", false),
            "int main() { switch (1) { case 1: break; default: break; } }\n"
        );
    }

    #[test]
    fn initializers_print_with_designators() {
        assert_eq!(
            printed("struct S { int x; } s = {.x = 1};", false),
            "struct S { int x; } s = {.x = 1};\n"
        );
        assert_eq!(
            printed("int a[2] = {[0] = 1, 2};", false),
            "int a[2] = {[0] = 1, 2};\n"
        );
    }
}
