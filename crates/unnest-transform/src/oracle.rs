//! Decides whether a local or argument must move into the environment record

use unnest_ir::visit::{defn_contains_var, initializer_contains_var, stmt_contains_defn};
use unnest_ir::{Defn, DefnBody, GcStatement, Stmt};
use unnest_types::QualifiedName;

/// Hoist mode: the variable is mentioned by a later nested function, or by the
/// initializer of a later static constant, anywhere in the rest of its scope.
///
/// Declarations precede uses, so only the definitions and statements after
/// the variable's own declaration are searched.
pub fn referenced_by_hoisted_defn(
    var: &QualifiedName,
    following_defns: &[Defn],
    following_stmts: &[Stmt],
) -> bool {
    following_defns
        .iter()
        .any(|defn| hoisted_defn_mentions(defn, var))
        || following_stmts
            .iter()
            .any(|stmt| stmt_contains_defn(stmt, &mut |defn| hoisted_defn_mentions(defn, var)))
}

fn hoisted_defn_mentions(defn: &Defn, var: &QualifiedName) -> bool {
    match &defn.body {
        DefnBody::Function(_) => defn_contains_var(defn, var),
        DefnBody::Data(data) if defn.is_static_const() => initializer_contains_var(&data.init, var),
        DefnBody::Data(_) | DefnBody::Class(_) => false,
    }
}

/// GC mode: the front end attached tracing code to the variable
pub fn has_trace_obligation(gc: &GcStatement) -> bool {
    !gc.is_none()
}
