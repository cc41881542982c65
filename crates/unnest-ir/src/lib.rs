//! Low-level intermediate representation consumed by the unnest pass
//!
//! The IR is an imperative, C-like tree of modules, definitions and
//! statements, in which functions may still be nested inside other
//! functions. It round-trips through JSON.

pub mod ir;
pub mod pretty;
pub mod visit;

pub use ir::*;
pub use visit::{count_nested_functions, stmt_contains_defn, stmt_contains_var};
