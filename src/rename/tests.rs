use pretty_assertions::assert_eq;

use super::counters::{Counters, GlobalCounters, Ns};
use super::encode;
use super::tables::{Tables, TypedefEntry};
use crate::ast::{tyref, IdentifierType, Name, Type, TypeRef};
use crate::error::Error;

fn dummy_type() -> TypeRef {
    tyref(Type::Ident(IdentifierType {
        names: vec![Name::text("int")],
    }))
}

#[test]
fn encode_single_characters() {
    assert_eq!(encode(0).unwrap(), "A");
    assert_eq!(encode(25).unwrap(), "Z");
    assert_eq!(encode(26).unwrap(), "a");
    assert_eq!(encode(51).unwrap(), "z");
}

#[test]
fn encode_prefixed_characters() {
    assert_eq!(encode(52).unwrap(), "AA");
    assert_eq!(encode(53).unwrap(), "AB");
    assert_eq!(encode(52 + 26).unwrap(), "Aa");
    assert_eq!(encode(103).unwrap(), "Az");
    assert_eq!(encode(104).unwrap(), "BA");
    assert_eq!(encode(1403).unwrap(), "Zz");
}

#[test]
fn encode_runs_out_at_the_alphabet_end() {
    assert!(matches!(encode(1404), Err(Error::AlphabetExhausted)));
    assert!(matches!(encode(10_000), Err(Error::AlphabetExhausted)));
}

#[test]
fn sibling_functions_never_reuse_a_taken_name() {
    let globals = GlobalCounters::new();

    let mut first = Counters::attached(&globals);
    assert_eq!(first.decl.take().unwrap(), "A");
    assert_eq!(first.decl.take().unwrap(), "B");

    // A later function starts past the first one's high-water mark.
    let mut second = Counters::attached(&globals);
    assert_eq!(second.decl.take().unwrap(), "C");

    // And so do the global assignments that follow.
    assert_eq!(globals.next(Ns::Decl).unwrap(), "D");

    // Other namespaces are untouched.
    assert_eq!(globals.next(Ns::Struct).unwrap(), "A");
    assert_eq!(globals.next(Ns::Enum).unwrap(), "A");
}

#[test]
fn sibling_scopes_share_positions_inside_one_function() {
    let globals = GlobalCounters::new();
    let mut function = Counters::attached(&globals);
    assert_eq!(function.decl.take().unwrap(), "A");

    // Two sibling blocks may both use "B"; they are never visible to each
    // other.
    let mut block = function.child();
    assert_eq!(block.decl.take().unwrap(), "B");
    assert_eq!(block.decl.take().unwrap(), "C");
    let mut sibling = function.child();
    assert_eq!(sibling.decl.take().unwrap(), "B");

    // The deepest advance still reaches the global mark.
    assert_eq!(globals.next(Ns::Decl).unwrap(), "D");
}

#[test]
fn recording_captures_only_hits_on_the_recorded_frame() {
    let mut tables = Tables::new();
    tables.push_scope(); // file scope
    assert!(tables.decl_types.insert("a", dummy_type()));

    tables.start_record();
    tables.push_scope(); // function scope

    // A local declaration and a local hit: neither is a file-scope event.
    assert!(tables.decl_types.insert("x", dummy_type()));
    assert!(tables.decl_types.get("x").is_some());

    // A lookup that resolves at the file frame is a reference.
    assert!(tables.decl_types.get("a").is_some());

    // A builtin hit resolves at the root frame and is not a reference.
    assert!(matches!(
        tables.typedefs.get("int"),
        Some(TypedefEntry::Builtin)
    ));

    tables.pop_scope();
    let record = tables.take_record();
    assert_eq!(record.decl_types.referenced, vec!["a".to_string()]);
    assert!(record.decl_types.declared.is_empty());
    assert!(record.typedefs.referenced.is_empty());
}

#[test]
fn recording_captures_file_scope_declarations() {
    let mut tables = Tables::new();
    tables.push_scope();
    tables.start_record();
    assert!(tables.decl_types.insert("a", dummy_type()));
    assert!(tables.decl_types.insert("b", dummy_type()));
    let record = tables.take_record();
    assert_eq!(
        record.decl_types.declared,
        vec!["a".to_string(), "b".to_string()]
    );
}

#[test]
fn duplicate_insertion_is_rejected_per_frame() {
    let mut tables = Tables::new();
    tables.push_scope();
    assert!(tables.decl_types.insert("a", dummy_type()));
    assert!(!tables.decl_types.insert("a", dummy_type()));

    // Shadowing in a child frame is fine.
    tables.push_scope();
    assert!(tables.decl_types.insert("a", dummy_type()));
    tables.pop_scope();
    tables.pop_scope();
}
