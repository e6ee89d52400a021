//! Adapter from the `lang_c` source AST to the minifier AST.
//!
//! Two shape changes happen here. A declaration with several
//! init-declarators becomes consecutive [`Decl`] items that share one
//! base-type node, which is what the struct-declaration rewriter keys on.
//! And every declarator is unrolled into a decorator chain ending in a
//! `TypeDecl` leaf: pointer prefixes wrap inside-out (the first `*` in the
//! source is the innermost), array and function suffixes wrap outside-in
//! (the suffix closest to the name is the outermost), and a parenthesized
//! declarator recurses with the accumulated chain as its base.

use lang_c::ast as c;
use lang_c::span::Node;

use crate::ast::*;
use crate::error::{Error, Result};

/// A lowered declarator: ordinary declaration or typedef.
pub enum Lowered {
    Decl(Decl),
    Typedef(Typedef),
}

pub fn lower_unit(unit: &c::TranslationUnit) -> Result<FileAst> {
    let mut ext = Vec::new();
    for node in &unit.0 {
        match &node.node {
            c::ExternalDeclaration::Declaration(d) => {
                for item in lower_declaration(&d.node)? {
                    ext.push(match item {
                        Lowered::Decl(d) => ExtDecl::Decl(d),
                        Lowered::Typedef(t) => ExtDecl::Typedef(t),
                    });
                }
            }
            c::ExternalDeclaration::FunctionDefinition(f) => {
                ext.push(ExtDecl::FuncDef(lower_funcdef(&f.node)?));
            }
            c::ExternalDeclaration::StaticAssert(sa) => {
                ext.push(ExtDecl::StaticAssert(lower_static_assert(&sa.node)?));
            }
        }
    }
    Ok(FileAst { ext })
}

// --- declarations ---

struct SpecInfo {
    storage: Vec<Storage>,
    funcspecs: Vec<FuncSpec>,
    quals: Vec<Qualifier>,
    align: Option<Alignment>,
    is_typedef: bool,
    base: TypeRef,
}

pub fn lower_declaration(d: &c::Declaration) -> Result<Vec<Lowered>> {
    let mut spec = lower_decl_specifiers(&d.specifiers)?;
    let mut align = spec.align.take();
    let mut out = Vec::new();

    if d.declarators.is_empty() {
        // `struct S { ... };` and friends: one nameless item carrying the
        // bare base type.
        out.push(Lowered::Decl(Decl {
            name: None,
            storage: spec.storage.clone(),
            funcspecs: spec.funcspecs.clone(),
            align,
            ty: spec.base.clone(),
            init: None,
            bit_width: None,
        }));
        return Ok(out);
    }

    for init_decl in &d.declarators {
        let idecl = &init_decl.node;
        let (name, ty) = chain_declarator(&spec.quals, &spec.base, &idecl.declarator.node)?;
        if spec.is_typedef {
            if idecl.initializer.is_some() {
                return Err(Error::unsupported("initialized typedef"));
            }
            let name = name.ok_or_else(|| Error::unsupported("typedef without a name"))?;
            out.push(Lowered::Typedef(Typedef { name, ty }));
        } else {
            let init = match &idecl.initializer {
                Some(i) => Some(lower_initializer(&i.node)?),
                None => None,
            };
            out.push(Lowered::Decl(Decl {
                name: name.map(Name::text),
                storage: spec.storage.clone(),
                funcspecs: spec.funcspecs.clone(),
                align: align.take(),
                ty,
                init,
                bit_width: None,
            }));
        }
    }
    Ok(out)
}

fn lower_decl_specifiers(specs: &[Node<c::DeclarationSpecifier>]) -> Result<SpecInfo> {
    let mut storage = Vec::new();
    let mut funcspecs = Vec::new();
    let mut quals = Vec::new();
    let mut align = None;
    let mut is_typedef = false;
    let mut base = BaseBuilder::new();

    for s in specs {
        match &s.node {
            c::DeclarationSpecifier::StorageClass(sc) => match &sc.node {
                c::StorageClassSpecifier::Typedef => is_typedef = true,
                c::StorageClassSpecifier::Extern => storage.push(Storage::Extern),
                c::StorageClassSpecifier::Static => storage.push(Storage::Static),
                c::StorageClassSpecifier::Auto => storage.push(Storage::Auto),
                c::StorageClassSpecifier::Register => storage.push(Storage::Register),
                c::StorageClassSpecifier::ThreadLocal => storage.push(Storage::ThreadLocal),
            },
            c::DeclarationSpecifier::TypeSpecifier(ts) => base.add(&ts.node)?,
            c::DeclarationSpecifier::TypeQualifier(q) => quals.push(lower_qualifier(&q.node)?),
            c::DeclarationSpecifier::Function(fs) => funcspecs.push(match &fs.node {
                c::FunctionSpecifier::Inline => FuncSpec::Inline,
                c::FunctionSpecifier::Noreturn => FuncSpec::Noreturn,
            }),
            c::DeclarationSpecifier::Alignment(a) => align = Some(lower_alignment(&a.node)?),
            // Vendor attributes carry no meaning for minification.
            c::DeclarationSpecifier::Extension(_) => {}
        }
    }

    Ok(SpecInfo {
        storage,
        funcspecs,
        quals,
        align,
        is_typedef,
        base: base.finish()?,
    })
}

fn lower_spec_qualifiers(
    specs: &[Node<c::SpecifierQualifier>],
) -> Result<(Vec<Qualifier>, TypeRef)> {
    let mut quals = Vec::new();
    let mut base = BaseBuilder::new();
    for s in specs {
        match &s.node {
            c::SpecifierQualifier::TypeSpecifier(ts) => base.add(&ts.node)?,
            c::SpecifierQualifier::TypeQualifier(q) => quals.push(lower_qualifier(&q.node)?),
            _ => {}
        }
    }
    Ok((quals, base.finish()?))
}

/// Accumulates the base type of one declaration: either a list of
/// base-type keywords, or exactly one struct/union/enum/typedef reference.
struct BaseBuilder {
    keywords: Vec<String>,
    special: Option<TypeRef>,
}

impl BaseBuilder {
    fn new() -> Self {
        BaseBuilder {
            keywords: Vec::new(),
            special: None,
        }
    }

    fn add(&mut self, ts: &c::TypeSpecifier) -> Result<()> {
        let kw = match ts {
            c::TypeSpecifier::Void => "void",
            c::TypeSpecifier::Char => "char",
            c::TypeSpecifier::Short => "short",
            c::TypeSpecifier::Int => "int",
            c::TypeSpecifier::Long => "long",
            c::TypeSpecifier::Float => "float",
            c::TypeSpecifier::Double => "double",
            c::TypeSpecifier::Signed => "signed",
            c::TypeSpecifier::Unsigned => "unsigned",
            c::TypeSpecifier::Bool => "_Bool",
            c::TypeSpecifier::Complex => "_Complex",
            c::TypeSpecifier::TypedefName(id) => {
                return self.set_special(tyref(Type::Ident(IdentifierType {
                    names: vec![Name::text(id.node.name.clone())],
                })));
            }
            c::TypeSpecifier::Struct(st) => return self.set_special(lower_struct(&st.node)?),
            c::TypeSpecifier::Enum(en) => return self.set_special(lower_enum(&en.node)?),
            _ => return Err(Error::unsupported("type specifier")),
        };
        self.keywords.push(kw.to_string());
        Ok(())
    }

    fn set_special(&mut self, ty: TypeRef) -> Result<()> {
        if self.special.is_some() {
            return Err(Error::unsupported("multiple type specifiers"));
        }
        self.special = Some(ty);
        Ok(())
    }

    fn finish(self) -> Result<TypeRef> {
        match self.special {
            Some(ty) => {
                if !self.keywords.is_empty() {
                    return Err(Error::unsupported(
                        "type specifier mixed with base-type keywords",
                    ));
                }
                Ok(ty)
            }
            None => {
                let mut keywords = self.keywords;
                if keywords.is_empty() {
                    // Implicit int, as old compilers allowed.
                    keywords.push("int".to_string());
                }
                Ok(tyref(Type::Ident(IdentifierType {
                    names: keywords.into_iter().map(Name::text).collect(),
                })))
            }
        }
    }
}

fn lower_qualifier(q: &c::TypeQualifier) -> Result<Qualifier> {
    match q {
        c::TypeQualifier::Const => Ok(Qualifier::Const),
        c::TypeQualifier::Restrict => Ok(Qualifier::Restrict),
        c::TypeQualifier::Volatile => Ok(Qualifier::Volatile),
        c::TypeQualifier::Atomic => Ok(Qualifier::Atomic),
        _ => Err(Error::unsupported("type qualifier")),
    }
}

fn lower_alignment(a: &c::AlignmentSpecifier) -> Result<Alignment> {
    match a {
        c::AlignmentSpecifier::Type(tn) => Ok(Alignment::Type(lower_type_name(&tn.node)?)),
        c::AlignmentSpecifier::Constant(e) => Ok(Alignment::Expr(lower_expr(&e.node)?)),
    }
}

fn lower_struct(st: &c::StructType) -> Result<TypeRef> {
    let tag = st
        .identifier
        .as_ref()
        .map(|id| Name::text(id.node.name.clone()));
    let members = match &st.declarations {
        None => None,
        Some(ds) => {
            let mut members = Vec::new();
            for sd in ds {
                match &sd.node {
                    c::StructDeclaration::Field(f) => {
                        members.extend(lower_struct_field(&f.node)?);
                    }
                    // Compile-time only; nothing for the minifier to keep.
                    c::StructDeclaration::StaticAssert(_) => {}
                }
            }
            Some(members)
        }
    };
    let agg = Aggregate { tag, members };
    Ok(match &st.kind.node {
        c::StructKind::Struct => tyref(Type::Struct(agg)),
        c::StructKind::Union => tyref(Type::Union(agg)),
    })
}

fn lower_struct_field(f: &c::StructField) -> Result<Vec<Decl>> {
    let (quals, base) = lower_spec_qualifiers(&f.specifiers)?;
    let mut out = Vec::new();

    if f.declarators.is_empty() {
        // C11 anonymous struct/union member.
        out.push(member_decl(None, base, None));
        return Ok(out);
    }

    for sd in &f.declarators {
        let sd = &sd.node;
        let (name, ty) = match &sd.declarator {
            Some(d) => chain_declarator(&quals, &base, &d.node)?,
            None => (
                None,
                tyref(Type::TypeDecl(TypeDecl {
                    declname: None,
                    quals: quals.clone(),
                    ty: base.clone(),
                })),
            ),
        };
        let bit_width = match &sd.bit_width {
            Some(e) => Some(lower_expr(&e.node)?),
            None => None,
        };
        out.push(member_decl(name, ty, bit_width));
    }
    Ok(out)
}

fn member_decl(name: Option<String>, ty: TypeRef, bit_width: Option<Expr>) -> Decl {
    Decl {
        name: name.map(Name::text),
        storage: Vec::new(),
        funcspecs: Vec::new(),
        align: None,
        ty,
        init: None,
        bit_width,
    }
}

fn lower_enum(en: &c::EnumType) -> Result<TypeRef> {
    let tag = en
        .identifier
        .as_ref()
        .map(|id| Name::text(id.node.name.clone()));
    let values = if en.enumerators.is_empty() {
        None
    } else {
        let mut values = Vec::new();
        for e in &en.enumerators {
            let value = match &e.node.expression {
                Some(expr) => Some(lower_expr(&expr.node)?),
                None => None,
            };
            values.push(Enumerator {
                name: Name::text(e.node.identifier.node.name.clone()),
                value,
            });
        }
        Some(values)
    };
    Ok(tyref(Type::Enum(EnumType { tag, values })))
}

// --- declarators ---

/// Builds a `TypeDecl` leaf over `base`, unrolls the declarator around it,
/// and stamps the declared name (if any) onto the leaf.
fn chain_declarator(
    quals: &[Qualifier],
    base: &TypeRef,
    declarator: &c::Declarator,
) -> Result<(Option<String>, TypeRef)> {
    let leaf = tyref(Type::TypeDecl(TypeDecl {
        declname: None,
        quals: quals.to_vec(),
        ty: base.clone(),
    }));
    let (name, ty) = unroll_declarator(leaf.clone(), declarator)?;
    if let Some(n) = &name {
        stamp_declname(&leaf, Name::text(n.clone()));
    }
    Ok((name, ty))
}

fn unroll_declarator(
    base: TypeRef,
    declarator: &c::Declarator,
) -> Result<(Option<String>, TypeRef)> {
    let mut ty = base;

    // Pointer prefixes, source order: the first `*` binds innermost.
    for der in &declarator.derived {
        if let c::DerivedDeclarator::Pointer(quals) = &der.node {
            let mut lowered = Vec::new();
            for q in quals {
                if let c::PointerQualifier::TypeQualifier(tq) = &q.node {
                    lowered.push(lower_qualifier(&tq.node)?);
                }
            }
            ty = tyref(Type::Ptr(PtrDecl { quals: lowered, ty }));
        }
    }

    // Array/function suffixes bind tighter than the pointers; the one
    // closest to the name ends up outermost in the chain.
    for der in declarator.derived.iter().rev() {
        match &der.node {
            c::DerivedDeclarator::Pointer(_) => {}
            c::DerivedDeclarator::Array(a) => {
                ty = tyref(Type::Array(ArrayDecl {
                    ty,
                    size: lower_array_size(&a.node)?,
                }));
            }
            c::DerivedDeclarator::Function(f) => {
                ty = lower_function(&f.node, ty)?;
            }
            c::DerivedDeclarator::KRFunction(ids) => {
                if !ids.is_empty() {
                    return Err(Error::unsupported("K&R parameter list"));
                }
                ty = tyref(Type::Func(FuncDecl {
                    params: Vec::new(),
                    variadic: false,
                    ret: ty,
                }));
            }
            _ => return Err(Error::unsupported("declarator")),
        }
    }

    match &declarator.kind.node {
        c::DeclaratorKind::Abstract => Ok((None, ty)),
        c::DeclaratorKind::Identifier(id) => Ok((Some(id.node.name.clone()), ty)),
        c::DeclaratorKind::Declarator(inner) => unroll_declarator(ty, &inner.node),
    }
}

fn lower_array_size(a: &c::ArrayDeclarator) -> Result<ArraySize> {
    Ok(match &a.size {
        c::ArraySize::Unknown => ArraySize::Unknown,
        c::ArraySize::VariableUnknown => ArraySize::Star,
        c::ArraySize::VariableExpression(e) => ArraySize::Fixed(lower_expr(&e.node)?),
        c::ArraySize::StaticExpression(e) => ArraySize::Fixed(lower_expr(&e.node)?),
    })
}

fn lower_function(f: &c::FunctionDeclarator, ret: TypeRef) -> Result<TypeRef> {
    let mut params = Vec::new();
    for p in &f.parameters {
        params.push(lower_parameter(&p.node)?);
    }
    Ok(tyref(Type::Func(FuncDecl {
        params,
        variadic: matches!(f.ellipsis, c::Ellipsis::Some),
        ret,
    })))
}

fn lower_parameter(p: &c::ParameterDeclaration) -> Result<Decl> {
    let spec = lower_decl_specifiers(&p.specifiers)?;
    if spec.is_typedef {
        return Err(Error::unsupported("typedef in parameter list"));
    }
    let (name, ty) = match &p.declarator {
        Some(d) => chain_declarator(&spec.quals, &spec.base, &d.node)?,
        None => (
            None,
            tyref(Type::TypeDecl(TypeDecl {
                declname: None,
                quals: spec.quals.clone(),
                ty: spec.base.clone(),
            })),
        ),
    };
    Ok(Decl {
        name: name.map(Name::text),
        storage: spec.storage,
        funcspecs: spec.funcspecs,
        align: None,
        ty,
        init: None,
        bit_width: None,
    })
}

// --- functions and statements ---

fn lower_funcdef(f: &c::FunctionDefinition) -> Result<FuncDef> {
    if !f.declarations.is_empty() {
        return Err(Error::unsupported("K&R function definition"));
    }
    let mut spec = lower_decl_specifiers(&f.specifiers)?;
    if spec.is_typedef {
        return Err(Error::unsupported("typedef on a function definition"));
    }
    let align = spec.align.take();
    let (name, ty) = chain_declarator(&spec.quals, &spec.base, &f.declarator.node)?;
    if !matches!(&*ty.borrow(), Type::Func(_)) {
        return Err(Error::unsupported(
            "function definition without a function declarator",
        ));
    }
    Ok(FuncDef {
        decl: Decl {
            name: name.map(Name::text),
            storage: spec.storage,
            funcspecs: spec.funcspecs,
            align,
            ty,
            init: None,
            bit_width: None,
        },
        body: lower_stmt(&f.statement.node)?,
    })
}

fn lower_stmt(s: &c::Statement) -> Result<Stmt> {
    Ok(match s {
        c::Statement::Compound(items) => {
            let mut out = Vec::new();
            for item in items {
                match &item.node {
                    c::BlockItem::Declaration(d) => {
                        for lowered in lower_declaration(&d.node)? {
                            out.push(match lowered {
                                Lowered::Decl(d) => BlockItem::Decl(d),
                                Lowered::Typedef(t) => BlockItem::Typedef(t),
                            });
                        }
                    }
                    c::BlockItem::StaticAssert(sa) => {
                        out.push(BlockItem::StaticAssert(lower_static_assert(&sa.node)?));
                    }
                    c::BlockItem::Statement(st) => out.push(BlockItem::Stmt(lower_stmt(&st.node)?)),
                }
            }
            Stmt::Compound(out)
        }
        c::Statement::Expression(None) => Stmt::Empty,
        c::Statement::Expression(Some(e)) => Stmt::Expr(lower_expr(&e.node)?),
        c::Statement::Labeled(l) => {
            let body = Box::new(lower_stmt(&l.node.statement.node)?);
            match &l.node.label.node {
                c::Label::Identifier(id) => Stmt::Label {
                    name: Name::text(id.node.name.clone()),
                    body,
                },
                c::Label::Case(e) => Stmt::Case {
                    expr: lower_expr(&e.node)?,
                    body,
                },
                c::Label::Default => Stmt::Default(body),
                _ => return Err(Error::unsupported("case range")),
            }
        }
        c::Statement::If(i) => Stmt::If {
            cond: lower_expr(&i.node.condition.node)?,
            then_stmt: Box::new(lower_stmt(&i.node.then_statement.node)?),
            else_stmt: match &i.node.else_statement {
                Some(e) => Some(Box::new(lower_stmt(&e.node)?)),
                None => None,
            },
        },
        c::Statement::Switch(sw) => Stmt::Switch {
            cond: lower_expr(&sw.node.expression.node)?,
            body: Box::new(lower_stmt(&sw.node.statement.node)?),
        },
        c::Statement::While(w) => Stmt::While {
            cond: lower_expr(&w.node.expression.node)?,
            body: Box::new(lower_stmt(&w.node.statement.node)?),
        },
        c::Statement::DoWhile(w) => Stmt::DoWhile {
            body: Box::new(lower_stmt(&w.node.statement.node)?),
            cond: lower_expr(&w.node.expression.node)?,
        },
        c::Statement::For(f) => {
            let init = match &f.node.initializer.node {
                c::ForInitializer::Empty => ForInit::None,
                c::ForInitializer::Expression(e) => ForInit::Expr(lower_expr(&e.node)?),
                c::ForInitializer::Declaration(d) => {
                    let mut decls = Vec::new();
                    for lowered in lower_declaration(&d.node)? {
                        match lowered {
                            Lowered::Decl(d) => decls.push(d),
                            Lowered::Typedef(_) => {
                                return Err(Error::unsupported("typedef in for initializer"));
                            }
                        }
                    }
                    ForInit::Decls(decls)
                }
                _ => return Err(Error::unsupported("for initializer")),
            };
            Stmt::For {
                init,
                cond: match &f.node.condition {
                    Some(e) => Some(lower_expr(&e.node)?),
                    None => None,
                },
                step: match &f.node.step {
                    Some(e) => Some(lower_expr(&e.node)?),
                    None => None,
                },
                body: Box::new(lower_stmt(&f.node.statement.node)?),
            }
        }
        c::Statement::Goto(id) => Stmt::Goto(Name::text(id.node.name.clone())),
        c::Statement::Continue => Stmt::Continue,
        c::Statement::Break => Stmt::Break,
        c::Statement::Return(e) => Stmt::Return(match e {
            Some(e) => Some(lower_expr(&e.node)?),
            None => None,
        }),
        c::Statement::Asm(_) => return Err(Error::unsupported("asm statement")),
        _ => return Err(Error::unsupported("statement")),
    })
}

fn lower_static_assert(sa: &c::StaticAssert) -> Result<StaticAssert> {
    Ok(StaticAssert {
        cond: lower_expr(&sa.expression.node)?,
        message: Some(sa.message.node.join(" ")),
    })
}

// --- expressions ---

fn lower_expr(e: &c::Expression) -> Result<Expr> {
    Ok(match e {
        c::Expression::Identifier(id) => Expr::Id(Id {
            name: Name::text(id.node.name.clone()),
        }),
        c::Expression::Constant(k) => Expr::Constant(lower_constant(&k.node)),
        c::Expression::StringLiteral(s) => Expr::StringLit(s.node.join(" ")),
        c::Expression::Member(m) => Expr::Member {
            base: Box::new(lower_expr(&m.node.expression.node)?),
            arrow: matches!(m.node.operator.node, c::MemberOperator::Indirect),
            field: Id {
                name: Name::text(m.node.identifier.node.name.clone()),
            },
        },
        c::Expression::Call(call) => {
            let mut args = Vec::new();
            for a in &call.node.arguments {
                args.push(lower_expr(&a.node)?);
            }
            Expr::Call {
                callee: Box::new(lower_expr(&call.node.callee.node)?),
                args,
            }
        }
        c::Expression::CompoundLiteral(cl) => Expr::CompoundLiteral {
            ty: lower_type_name(&cl.node.type_name.node)?,
            init: lower_init_list(&cl.node.initializer_list)?,
        },
        c::Expression::SizeOfTy(so) => Expr::SizeOfType(lower_type_name(&so.node.0.node)?),
        c::Expression::SizeOfVal(so) => Expr::SizeOfExpr(Box::new(lower_expr(&so.node.0.node)?)),
        c::Expression::AlignOf(ao) => Expr::AlignOfType(lower_type_name(&ao.node.0.node)?),
        c::Expression::UnaryOperator(u) => {
            let op = match &u.node.operator.node {
                c::UnaryOperator::PostIncrement => UnaryOp::PostInc,
                c::UnaryOperator::PostDecrement => UnaryOp::PostDec,
                c::UnaryOperator::PreIncrement => UnaryOp::PreInc,
                c::UnaryOperator::PreDecrement => UnaryOp::PreDec,
                c::UnaryOperator::Address => UnaryOp::Address,
                c::UnaryOperator::Indirection => UnaryOp::Deref,
                c::UnaryOperator::Plus => UnaryOp::Plus,
                c::UnaryOperator::Minus => UnaryOp::Minus,
                c::UnaryOperator::Complement => UnaryOp::Complement,
                c::UnaryOperator::Negate => UnaryOp::Not,
                _ => return Err(Error::unsupported("unary operator")),
            };
            Expr::Unary {
                op,
                operand: Box::new(lower_expr(&u.node.operand.node)?),
            }
        }
        c::Expression::Cast(cast) => Expr::Cast {
            ty: lower_type_name(&cast.node.type_name.node)?,
            expr: Box::new(lower_expr(&cast.node.expression.node)?),
        },
        c::Expression::BinaryOperator(b) => {
            let lhs = Box::new(lower_expr(&b.node.lhs.node)?);
            let rhs = Box::new(lower_expr(&b.node.rhs.node)?);
            match binary_op(&b.node.operator.node) {
                LoweredOp::Index => Expr::Index {
                    base: lhs,
                    index: rhs,
                },
                LoweredOp::Binary(op) => Expr::Binary { op, lhs, rhs },
                LoweredOp::Assign(op) => Expr::Assign { op, lhs, rhs },
            }
        }
        c::Expression::Conditional(cond) => Expr::Conditional {
            cond: Box::new(lower_expr(&cond.node.condition.node)?),
            then_expr: Box::new(lower_expr(&cond.node.then_expression.node)?),
            else_expr: Box::new(lower_expr(&cond.node.else_expression.node)?),
        },
        c::Expression::Comma(exprs) => {
            let mut out = Vec::new();
            for e in exprs.iter() {
                out.push(lower_expr(&e.node)?);
            }
            Expr::Comma(out)
        }
        _ => return Err(Error::unsupported("expression")),
    })
}

enum LoweredOp {
    Index,
    Binary(BinaryOp),
    Assign(AssignOp),
}

fn binary_op(op: &c::BinaryOperator) -> LoweredOp {
    use c::BinaryOperator as B;
    match op {
        B::Index => LoweredOp::Index,
        B::Multiply => LoweredOp::Binary(BinaryOp::Mul),
        B::Divide => LoweredOp::Binary(BinaryOp::Div),
        B::Modulo => LoweredOp::Binary(BinaryOp::Mod),
        B::Plus => LoweredOp::Binary(BinaryOp::Add),
        B::Minus => LoweredOp::Binary(BinaryOp::Sub),
        B::ShiftLeft => LoweredOp::Binary(BinaryOp::Shl),
        B::ShiftRight => LoweredOp::Binary(BinaryOp::Shr),
        B::Less => LoweredOp::Binary(BinaryOp::Lt),
        B::Greater => LoweredOp::Binary(BinaryOp::Gt),
        B::LessOrEqual => LoweredOp::Binary(BinaryOp::Le),
        B::GreaterOrEqual => LoweredOp::Binary(BinaryOp::Ge),
        B::Equals => LoweredOp::Binary(BinaryOp::Eq),
        B::NotEquals => LoweredOp::Binary(BinaryOp::Ne),
        B::BitwiseAnd => LoweredOp::Binary(BinaryOp::BitAnd),
        B::BitwiseXor => LoweredOp::Binary(BinaryOp::BitXor),
        B::BitwiseOr => LoweredOp::Binary(BinaryOp::BitOr),
        B::LogicalAnd => LoweredOp::Binary(BinaryOp::LogicalAnd),
        B::LogicalOr => LoweredOp::Binary(BinaryOp::LogicalOr),
        B::Assign => LoweredOp::Assign(AssignOp::Assign),
        B::AssignMultiply => LoweredOp::Assign(AssignOp::Mul),
        B::AssignDivide => LoweredOp::Assign(AssignOp::Div),
        B::AssignModulo => LoweredOp::Assign(AssignOp::Mod),
        B::AssignPlus => LoweredOp::Assign(AssignOp::Add),
        B::AssignMinus => LoweredOp::Assign(AssignOp::Sub),
        B::AssignShiftLeft => LoweredOp::Assign(AssignOp::Shl),
        B::AssignShiftRight => LoweredOp::Assign(AssignOp::Shr),
        B::AssignBitwiseAnd => LoweredOp::Assign(AssignOp::And),
        B::AssignBitwiseXor => LoweredOp::Assign(AssignOp::Xor),
        B::AssignBitwiseOr => LoweredOp::Assign(AssignOp::Or),
    }
}

fn lower_constant(k: &c::Constant) -> String {
    match k {
        c::Constant::Integer(i) => {
            let mut s = String::new();
            match i.base {
                c::IntegerBase::Decimal => {}
                c::IntegerBase::Octal => s.push('0'),
                c::IntegerBase::Hexadecimal => s.push_str("0x"),
                c::IntegerBase::Binary => s.push_str("0b"),
            }
            s.push_str(&i.number);
            if i.suffix.unsigned {
                s.push('u');
            }
            match i.suffix.size {
                c::IntegerSize::Int => {}
                c::IntegerSize::Long => s.push('l'),
                c::IntegerSize::LongLong => s.push_str("ll"),
            }
            if i.suffix.imaginary {
                s.push('i');
            }
            s
        }
        c::Constant::Float(f) => {
            let mut s = String::new();
            match f.base {
                c::FloatBase::Decimal => {}
                c::FloatBase::Hexadecimal => s.push_str("0x"),
            }
            s.push_str(&f.number);
            match f.suffix.format {
                c::FloatFormat::Float => s.push('f'),
                c::FloatFormat::Double => {}
                c::FloatFormat::LongDouble => s.push('l'),
                _ => {}
            }
            if f.suffix.imaginary {
                s.push('i');
            }
            s
        }
        c::Constant::Character(s) => s.clone(),
    }
}

// --- initializers and type names ---

fn lower_initializer(init: &c::Initializer) -> Result<Init> {
    Ok(match init {
        c::Initializer::Expression(e) => Init::Expr(lower_expr(&e.node)?),
        c::Initializer::List(items) => Init::List(lower_init_list(items)?),
    })
}

fn lower_init_list(items: &[Node<c::InitializerListItem>]) -> Result<InitList> {
    let mut out = Vec::new();
    for item in items {
        let mut designators = Vec::new();
        for d in &item.node.designation {
            designators.push(match &d.node {
                c::Designator::Index(e) => Designator::Index(lower_expr(&e.node)?),
                c::Designator::Member(id) => Designator::Member(Id {
                    name: Name::text(id.node.name.clone()),
                }),
                _ => return Err(Error::unsupported("range designator")),
            });
        }
        out.push(InitItem {
            designators,
            init: lower_initializer(&item.node.initializer.node)?,
        });
    }
    Ok(InitList { items: out })
}

pub fn lower_type_name(tn: &c::TypeName) -> Result<TypeRef> {
    let (quals, base) = lower_spec_qualifiers(&tn.specifiers)?;
    match &tn.declarator {
        Some(d) => {
            let (_, ty) = chain_declarator(&quals, &base, &d.node)?;
            Ok(ty)
        }
        None => Ok(tyref(Type::TypeDecl(TypeDecl {
            declname: None,
            quals,
            ty: base,
        }))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lang_c::driver::{parse_preprocessed, Config};

    fn lower(source: &str) -> FileAst {
        let parse = parse_preprocessed(&Config::with_gcc(), source.to_string())
            .expect("source should parse");
        lower_unit(&parse.unit).expect("source should lower")
    }

    #[test]
    fn splits_declarators_around_a_shared_base() {
        let ast = lower("int a, b;");
        assert_eq!(ast.ext.len(), 2);
        let (a, b) = match (&ast.ext[0], &ast.ext[1]) {
            (ExtDecl::Decl(a), ExtDecl::Decl(b)) => (a, b),
            other => panic!("expected two decls, got {:?}", other),
        };
        let base_a = match &*a.ty.borrow() {
            Type::TypeDecl(td) => td.ty.clone(),
            other => panic!("expected a TypeDecl leaf, got {:?}", other),
        };
        let base_b = match &*b.ty.borrow() {
            Type::TypeDecl(td) => td.ty.clone(),
            other => panic!("expected a TypeDecl leaf, got {:?}", other),
        };
        assert!(std::rc::Rc::ptr_eq(&base_a, &base_b));
    }

    #[test]
    fn unrolls_pointer_and_array_declarators() {
        // `int *a[3]` is an array of pointers: Array(Ptr(TypeDecl)).
        let ast = lower("int *a[3];");
        let decl = match &ast.ext[0] {
            ExtDecl::Decl(d) => d,
            other => panic!("expected a decl, got {:?}", other),
        };
        let inner = match &*decl.ty.borrow() {
            Type::Array(a) => a.ty.clone(),
            other => panic!("expected an array, got {:?}", other),
        };
        assert!(matches!(&*inner.borrow(), Type::Ptr(_)));

        // `int (*b)[3]` is a pointer to an array: Ptr(Array(TypeDecl)).
        let ast = lower("int (*b)[3];");
        let decl = match &ast.ext[0] {
            ExtDecl::Decl(d) => d,
            other => panic!("expected a decl, got {:?}", other),
        };
        let inner = match &*decl.ty.borrow() {
            Type::Ptr(p) => p.ty.clone(),
            other => panic!("expected a pointer, got {:?}", other),
        };
        assert!(matches!(&*inner.borrow(), Type::Array(_)));
    }

    #[test]
    fn function_returning_pointer_keeps_function_outermost() {
        let ast = lower("char *f(int x);");
        let decl = match &ast.ext[0] {
            ExtDecl::Decl(d) => d,
            other => panic!("expected a decl, got {:?}", other),
        };
        let ret = match &*decl.ty.borrow() {
            Type::Func(f) => {
                assert_eq!(f.params.len(), 1);
                f.ret.clone()
            }
            other => panic!("expected a function, got {:?}", other),
        };
        assert!(matches!(&*ret.borrow(), Type::Ptr(_)));
    }

    #[test]
    fn reconstructs_integer_constants() {
        let i = c::Integer {
            base: c::IntegerBase::Hexadecimal,
            number: "ff".into(),
            suffix: c::IntegerSuffix {
                size: c::IntegerSize::LongLong,
                unsigned: true,
                imaginary: false,
            },
        };
        assert_eq!(lower_constant(&c::Constant::Integer(i)), "0xffull");
    }

    #[test]
    fn typedef_declarations_become_typedef_items() {
        let ast = lower("typedef int t, *pt;");
        assert_eq!(ast.ext.len(), 2);
        match (&ast.ext[0], &ast.ext[1]) {
            (ExtDecl::Typedef(t), ExtDecl::Typedef(pt)) => {
                assert_eq!(t.name, "t");
                assert_eq!(pt.name, "pt");
            }
            other => panic!("expected two typedefs, got {:?}", other),
        }
    }
}
