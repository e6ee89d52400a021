//! `cmin` shrinks a C translation unit while preserving its behaviour:
//! the preprocessed program is parsed, compound type declarations are
//! normalized so each declarator introduces at most one aggregate body,
//! every top-level declaration unreachable from `main` is dropped, and
//! all remaining user identifiers are renamed to the shortest symbols a
//! base-52 alphabet offers, per namespace and per scope.
//!
//! The pipeline, in order:
//!
//! 1. [`lower`] — parse through `lang_c` and adapt its AST.
//! 2. [`rewrite`] — split shared struct/union/enum bodies.
//! 3. [`rename`] — scoped symbol tables, reachability, renaming.
//! 4. [`emit`] — print compact C, with redundant parentheses reduced.
//!
//! [`driver`] glues the stages together behind the CLI.

pub mod ast;
pub mod driver;
pub mod emit;
pub mod error;
pub mod lower;
pub mod rename;
pub mod rewrite;

pub use error::{Error, Result};

#[cfg(test)]
mod tests;
