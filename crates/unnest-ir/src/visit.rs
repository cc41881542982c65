//! Syntactic searches over the IR
//!
//! These answer "does this subtree mention X" questions. They descend into
//! nested definitions (function bodies, initializers and attached GC code),
//! so a search over a block also covers everything defined inside it.

use crate::ir::*;
use unnest_types::QualifiedName;

/// Check if any statement in `stmts` references the variable `var`
pub fn stmts_contain_var(stmts: &[Stmt], var: &QualifiedName) -> bool {
    stmts.iter().any(|s| stmt_contains_var(s, var))
}

/// Check if any definition in `defns` references the variable `var`
pub fn defns_contain_var(defns: &[Defn], var: &QualifiedName) -> bool {
    defns.iter().any(|d| defn_contains_var(d, var))
}

/// Check if a definition references the variable `var`
pub fn defn_contains_var(defn: &Defn, var: &QualifiedName) -> bool {
    match &defn.body {
        DefnBody::Function(func) => func
            .body
            .as_ref()
            .map_or(false, |body| stmt_contains_var(body, var)),
        DefnBody::Data(data) => {
            initializer_contains_var(&data.init, var) || gc_contains_var(&data.gc, var)
        }
        DefnBody::Class(class) => defns_contain_var(&class.members, var),
    }
}

fn gc_contains_var(gc: &GcStatement, var: &QualifiedName) -> bool {
    gc.stmt().map_or(false, |s| stmt_contains_var(s, var))
}

/// Check if an initializer references the variable `var`
pub fn initializer_contains_var(init: &Initializer, var: &QualifiedName) -> bool {
    match init {
        Initializer::None => false,
        Initializer::Single(rval) => rval_contains_var(rval, var),
        Initializer::Struct(_, inits) | Initializer::Array(inits) => {
            inits.iter().any(|i| initializer_contains_var(i, var))
        }
    }
}

/// Check if a statement references the variable `var`
pub fn stmt_contains_var(stmt: &Stmt, var: &QualifiedName) -> bool {
    match stmt {
        Stmt::Block { defns, stmts, .. } => {
            defns_contain_var(defns, var) || stmts_contain_var(stmts, var)
        }
        Stmt::While { cond, body, .. } => {
            rval_contains_var(cond, var) || stmt_contains_var(body, var)
        }
        Stmt::If {
            cond,
            then_branch,
            else_branch,
        } => {
            rval_contains_var(cond, var)
                || stmt_contains_var(then_branch, var)
                || else_branch
                    .as_ref()
                    .map_or(false, |e| stmt_contains_var(e, var))
        }
        Stmt::Switch {
            scrutinee,
            cases,
            default,
            ..
        } => {
            rval_contains_var(scrutinee, var)
                || cases.iter().any(|case| {
                    case.conds.iter().any(|cond| match cond {
                        CaseCond::Match(rval) => rval_contains_var(rval, var),
                        CaseCond::Range(lo, hi) => {
                            rval_contains_var(lo, var) || rval_contains_var(hi, var)
                        }
                    }) || stmt_contains_var(&case.body, var)
                })
                || match default {
                    SwitchDefault::Case(stmt) => stmt_contains_var(stmt, var),
                    SwitchDefault::Unreachable | SwitchDefault::DoNothing => false,
                }
        }
        Stmt::Call(call) => {
            rval_contains_var(&call.callee, var)
                || call
                    .object
                    .as_ref()
                    .map_or(false, |o| rval_contains_var(o, var))
                || call.args.iter().any(|a| rval_contains_var(a, var))
                || call.results.iter().any(|r| lval_contains_var(r, var))
        }
        Stmt::Return(rvals) => rvals.iter().any(|r| rval_contains_var(r, var)),
        Stmt::DoCommit(rval) => rval_contains_var(rval, var),
        Stmt::TryCommit {
            reference,
            protected,
            handler,
        } => {
            lval_contains_var(reference, var)
                || stmt_contains_var(protected, var)
                || stmt_contains_var(handler, var)
        }
        Stmt::Atomic(atomic) => atomic_contains_var(atomic, var),
    }
}

fn atomic_contains_var(atomic: &AtomicStmt, var: &QualifiedName) -> bool {
    match atomic {
        AtomicStmt::Comment(_) | AtomicStmt::GcCheck => false,
        AtomicStmt::Assign(lval, rval) => lval_contains_var(lval, var) || rval_contains_var(rval, var),
        AtomicStmt::NewObject { target, args, .. } => {
            lval_contains_var(target, var) || args.iter().any(|a| rval_contains_var(a, var))
        }
        AtomicStmt::Deconstruct {
            source, bindings, ..
        } => {
            rval_contains_var(source, var) || bindings.iter().any(|b| lval_contains_var(b, var))
        }
        AtomicStmt::MarkHp(lval) => lval_contains_var(lval, var),
        AtomicStmt::RestoreHp(rval) => rval_contains_var(rval, var),
    }
}

/// Check if an rval references the variable `var`
pub fn rval_contains_var(rval: &Rval, var: &QualifiedName) -> bool {
    match rval {
        Rval::Lval(lval) | Rval::MemAddr(lval) => lval_contains_var(lval, var),
        Rval::Const(_) => false,
        Rval::Unop(_, operand) | Rval::Cast(_, operand) => rval_contains_var(operand, var),
        Rval::Binop(_, left, right) => rval_contains_var(left, var) || rval_contains_var(right, var),
    }
}

/// Check if an lval references the variable `var`
pub fn lval_contains_var(lval: &Lval, var: &QualifiedName) -> bool {
    match lval {
        Lval::Var { name, .. } => name == var,
        Lval::Field { address, field, .. } => {
            rval_contains_var(address, var)
                || match field {
                    FieldId::Offset(offset) => rval_contains_var(offset, var),
                    FieldId::Named { .. } => false,
                }
        }
        Lval::Mem { address, .. } => rval_contains_var(address, var),
    }
}

/// Check if `stmt` contains, at any depth, a definition satisfying `pred`
///
/// Definitions nested inside matching or non-matching function bodies are
/// visited too.
pub fn stmt_contains_defn(stmt: &Stmt, pred: &mut dyn FnMut(&Defn) -> bool) -> bool {
    match stmt {
        Stmt::Block { defns, stmts, .. } => {
            defns.iter().any(|d| defn_or_nested(d, pred))
                || stmts.iter().any(|s| stmt_contains_defn(s, pred))
        }
        Stmt::While { body, .. } => stmt_contains_defn(body, pred),
        Stmt::If {
            then_branch,
            else_branch,
            ..
        } => {
            stmt_contains_defn(then_branch, pred)
                || else_branch
                    .as_ref()
                    .map_or(false, |e| stmt_contains_defn(e, pred))
        }
        Stmt::Switch { cases, default, .. } => {
            cases.iter().any(|c| stmt_contains_defn(&c.body, pred))
                || match default {
                    SwitchDefault::Case(stmt) => stmt_contains_defn(stmt, pred),
                    SwitchDefault::Unreachable | SwitchDefault::DoNothing => false,
                }
        }
        Stmt::TryCommit {
            protected, handler, ..
        } => stmt_contains_defn(protected, pred) || stmt_contains_defn(handler, pred),
        Stmt::Call(_) | Stmt::Return(_) | Stmt::DoCommit(_) | Stmt::Atomic(_) => false,
    }
}

fn defn_or_nested(defn: &Defn, pred: &mut dyn FnMut(&Defn) -> bool) -> bool {
    if pred(defn) {
        return true;
    }
    match &defn.body {
        DefnBody::Function(func) => func
            .body
            .as_ref()
            .map_or(false, |body| stmt_contains_defn(body, pred)),
        DefnBody::Data(_) | DefnBody::Class(_) => false,
    }
}

/// Count the function definitions nested (at any depth) in a statement
pub fn count_nested_functions(stmt: &Stmt) -> usize {
    let mut count = 0;
    stmt_contains_defn(stmt, &mut |defn| {
        if matches!(defn.body, DefnBody::Function(_)) {
            count += 1;
        }
        false
    });
    count
}
