//! End-to-end pipeline tests: preprocessed source in, minified C out.

use pretty_assertions::assert_eq;

use crate::driver::minify_preprocessed;
use crate::error::Error;

fn minified(source: &str) -> String {
    minify_preprocessed(source).expect("source should minify")
}

fn minify_err(source: &str) -> Error {
    minify_preprocessed(source).expect_err("source should be rejected")
}

/// Rough C token split so comparisons ignore spacing.
fn tokens(s: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut cur = String::new();
    for ch in s.chars() {
        if ch.is_ascii_alphanumeric() || ch == '_' {
            cur.push(ch);
        } else {
            if !cur.is_empty() {
                out.push(std::mem::take(&mut cur));
            }
            if !ch.is_whitespace() {
                out.push(ch.to_string());
            }
        }
    }
    if !cur.is_empty() {
        out.push(cur);
    }
    out
}

fn assert_minifies(source: &str, expected: &str) {
    assert_eq!(tokens(&minified(source)), tokens(expected), "for {:?}", source);
}

#[test]
fn empty_main_survives_unchanged() {
    assert_eq!(minified("int main() {}"), "int main() {}\n");
}

#[test]
fn labels_rename_per_function() {
    assert_minifies("int main() { a: goto a; }", "int main() { A: goto A; }");
    assert_minifies("int main() { goto a; a: ; }", "int main() { goto A; A: ; }");
}

#[test]
fn label_names_are_local_to_their_function() {
    assert_minifies(
        "void f(){ x: goto x; } int main(){ f(); y: goto y; }",
        "void A() { A: goto A; } int main() { A(); A: goto A; }",
    );
}

#[test]
fn unreachable_functions_are_dropped() {
    assert_minifies("void f(){} int main(){}", "int main() {}");
}

#[test]
fn referenced_globals_are_kept_and_renamed() {
    assert_minifies(
        "int a; int main(){ return a; }",
        "int A; int main() { return A; }",
    );
    assert_minifies(
        "int a[3]; int main(){ return a[0]; }",
        "int A[3]; int main() { return A[0]; }",
    );
}

#[test]
fn forward_declaration_and_definition_share_one_name() {
    // The init edge pulls the trailing definition in even though only the
    // forward declaration is referenced.
    assert_minifies(
        "int a; int main(){ return a; } int a = 1;",
        "int A; int main() { return A; } int A = 1;",
    );
    assert_minifies(
        "void f(); int main(){ f; } void f() {}",
        "void A(); int main() { A; } void A() {}",
    );
}

#[test]
fn shadowed_globals_are_pruned() {
    assert_minifies(
        "int a; int main(){ int a; return a; }",
        "int main() { int A; return A; }",
    );
}

#[test]
fn struct_definitions_rename_tags_and_members() {
    assert_minifies(
        "struct S {int x;}; int main() { struct S s = {.x = 1}; }",
        "struct A { int A; }; int main() { struct A A = {.A = 1}; }",
    );
}

#[test]
fn typedefs_rename_and_shadow() {
    assert_minifies(
        "typedef int t; int main(){ t a; }",
        "typedef int B; int main() { B A; }",
    );
    // The outer typedef is unreachable once the inner one shadows it.
    assert_minifies(
        "typedef int t; int main(){ typedef int t; t a; }",
        "int main() { typedef int A; A B; }",
    );
}

#[test]
fn tags_shadow_like_ordinary_scopes() {
    assert_minifies(
        "struct S; int main(){ struct S *s; }",
        "struct A; int main() { struct A *A; }",
    );
    assert_minifies(
        "struct S; int main(){ struct S {int x;}; struct S *s; }",
        "int main() { struct A { int A; }; struct A *A; }",
    );
    assert_minifies(
        "enum E; int main(){ enum E { A }; enum E *e; }",
        "int main() { enum A { A }; enum A *B; }",
    );
}

#[test]
fn enum_constants_live_in_the_ordinary_namespace() {
    assert_minifies(
        "enum E { X }; int main(){ X; }",
        "enum A { A }; int main() { A; }",
    );
    // A local shadows the constant, so the enum itself is unreachable.
    assert_minifies(
        "enum E { X }; int main(){ int X; X; }",
        "int main() { int A; A; }",
    );
}

#[test]
fn member_access_follows_the_declared_type() {
    assert_minifies(
        "struct S {int x;}; int main() {struct S s; s.x = 1; }",
        "struct A { int A; }; int main() { struct A A; A.A = 1; }",
    );
    assert_minifies(
        "struct S {int x;}; int main() {struct S *s; s->x = 1; }",
        "struct A { int A; }; int main() { struct A *A; A->A = 1; }",
    );
    assert_minifies(
        "int main() {struct {int x;} *s; (*s).x = 1; }",
        "int main() { struct { int A; } *A; (*A).A = 1; }",
    );
    assert_minifies(
        "struct S {int x;}; int main() {struct S s; (&s)->x = 1; }",
        "struct A { int A; }; int main() { struct A A; (&A)->A = 1; }",
    );
    assert_minifies(
        "struct S {int x;}; int main() {struct S s[3]; s[0].x = 1; }",
        "struct A { int A; }; int main() { struct A A[3]; A[0].A = 1; }",
    );
}

#[test]
fn member_access_chases_typedefs() {
    assert_minifies(
        "typedef struct {int x;} S; int main() { S s; s.x = 1; }",
        "typedef struct { int A; } B; int main() { B A; A.A = 1; }",
    );
}

#[test]
fn nested_member_access_resolves_each_level() {
    assert_minifies(
        "struct S {int x;}; struct T {struct S x;}; int main() {struct T t; t.x.x = 1; }",
        "struct A { int A; }; struct B { struct A A; }; int main() { struct B A; A.A.A = 1; }",
    );
}

#[test]
fn member_access_through_calls_and_casts() {
    assert_minifies(
        "struct S {int x;}; struct S f(); int main() { return f().x; }",
        "struct A { int A; }; struct A A(); int main() { return A().A; }",
    );
    assert_minifies(
        "struct S {int x;}; struct S (*f)(); int main() { return f().x; }",
        "struct A { int A; }; struct A (*A)(); int main() { return A().A; }",
    );
    assert_minifies(
        "struct S {int x;}; int main() { int x; ((struct S)x).x = 1; }",
        "struct A { int A; }; int main() { int A; ((struct A)A).A = 1; }",
    );
    assert_minifies(
        "struct S {int x;}; int main() { return (struct S){ .x = 1 }.x; }",
        "struct A { int A; }; int main() { return ((struct A){.A = 1}).A; }",
    );
}

#[test]
fn initializer_lists_track_the_member_cursor() {
    assert_minifies(
        "struct S {int x;}; int main() { struct S s[] = {{.x = 1}}; }",
        "struct A { int A; }; int main() { struct A A[] = {{.A = 1}}; }",
    );
    assert_minifies(
        concat!(
            "struct S {int x;}; struct T {struct S a; int b; struct S c;}; ",
            "int main() { struct T t = {.a = {.x = 1}, 2, {.x = 3} }; }"
        ),
        concat!(
            "struct A { int A; }; struct B { struct A A; int B; struct A C; }; ",
            "int main() { struct B A = {.A = {.A = 1}, 2, {.A = 3}}; }"
        ),
    );
}

#[test]
fn anonymous_aggregates_in_for_init_get_synthetic_then_short_tags() {
    assert_minifies(
        "int main() { for(struct {int x;} a,b;;); }",
        "int main() { for (struct A { int A; } A, B;;) ; }",
    );
}

#[test]
fn extern_declarations_keep_their_spelling() {
    assert_minifies(
        "extern int errno; int main() { return errno; }",
        "extern int errno; int main() { return errno; }",
    );
    assert_minifies(
        "extern void abort(void); int main() { abort(); }",
        "extern void abort(void); int main() { abort(); }",
    );
}

#[test]
fn static_globals_are_renamed() {
    assert_minifies(
        "static int counter; int main() { return counter; }",
        "static int A; int main() { return A; }",
    );
}

#[test]
fn parameters_use_the_function_local_alphabet() {
    assert_minifies(
        "int add(int a, int b) { return a + b; } int main() { return add(1, 2); }",
        "int C(int A, int B) { return A + B; } int main() { return C(1, 2); }",
    );
}

#[test]
fn pruned_functions_still_advance_the_alphabet() {
    // g is dropped from the output, but its parameter consumed "A" before
    // reachability was known; the high-water mark never rolls back.
    assert_minifies(
        "int g(int x) { return x; } int f(int x) { return x; } int main() { return f(0); }",
        "int C(int B) { return B; } int main() { return C(0); }",
    );
}

#[test]
fn sizeof_operands_are_traversed() {
    // sizeof is not an atom, so it is grouped like any compound operand.
    assert_minifies(
        "int a; int main() { return (sizeof(a)) + a; }",
        "int A; int main() { return (sizeof(A)) + A; }",
    );
}

#[test]
fn switch_bodies_rename_case_expressions() {
    assert_minifies(
        "enum E { X, Y }; int main() { switch (X) { case Y: break; default: break; } }",
        "enum A { A, B }; int main() { switch (A) { case B: break; default: break; } }",
    );
}

#[test]
fn while_loops_and_updates_are_traversed() {
    assert_minifies(
        "int main() { int i; for (i = 0; i < 10; i++) { continue; } while (i) i--; do i++; while (i); }",
        "int main() { int A; for (A = 0; A < 10; A++) { continue; } while (A) A--; do A++; while (A); }",
    );
}

#[test]
fn output_is_deterministic_across_runs() {
    let source = concat!(
        "struct point { int x; int y; };\n",
        "typedef struct point point_t;\n",
        "enum dir { NORTH, SOUTH, EAST, WEST };\n",
        "static int scale = 2;\n",
        "int magnitude(point_t p) { return p.x * scale + p.y; }\n",
        "int main() { point_t p = {.x = 1, .y = NORTH}; return magnitude(p); }\n",
    );
    let first = minified(source);
    let second = minified(source);
    assert_eq!(first, second);
}

#[test]
fn missing_main_is_an_error() {
    assert!(matches!(
        minify_err("void f() {}"),
        Error::UnknownIdentifier(name) if name == "main"
    ));
}

#[test]
fn undeclared_identifiers_are_an_error() {
    assert!(matches!(
        minify_err("int main() { return x; }"),
        Error::UnknownIdentifier(name) if name == "x"
    ));
}

#[test]
fn unknown_members_are_an_error() {
    assert!(matches!(
        minify_err("struct S {int x;}; int main() { struct S s; s.y = 1; }"),
        Error::MemberNotFound(name) if name == "y"
    ));
}

#[test]
fn arrow_on_a_non_pointer_is_an_error() {
    assert!(matches!(
        minify_err("struct S {int x;}; int main() { struct S s; s->x = 1; }"),
        Error::TypeMismatch(_)
    ));
}

#[test]
fn redefining_an_enum_constant_as_a_variable_is_an_error() {
    assert!(matches!(
        minify_err("enum E { X }; int X; int main() { return 0; }"),
        Error::Redefinition(name) if name == "X"
    ));
}

#[test]
fn redefining_a_tag_body_is_an_error() {
    assert!(matches!(
        minify_err("struct S { int x; }; struct S { int y; }; int main() { return 0; }"),
        Error::Redefinition(name) if name == "struct S"
    ));
}

#[test]
fn redefining_a_function_body_is_an_error() {
    assert!(matches!(
        minify_err("int main() { return 0; } int main() { return 1; }"),
        Error::Redefinition(name) if name == "main"
    ));
}

#[test]
fn syntax_errors_surface_as_parse_errors() {
    assert!(matches!(minify_err("int main( {"), Error::Parse(_)));
}
