//! Checks of the output contract
//!
//! After hoisting no function may be nested in another. After chaining,
//! every function that links a frame links it exactly once and unlinks it
//! before each return, tail call and call that never returns, and at its
//! end if it returns nothing.

use crate::action::PREV_FIELD;
use std::fmt;
use unnest_ir::visit::count_nested_functions;
use unnest_ir::*;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViolationKind {
    /// Function definitions remain inside the body
    NestedFunctions { count: usize },
    /// The frame is linked more than once
    LinkCount { links: usize },
    /// An exit is not preceded by an unlink in the same statement list
    MissingUnlink { exit: &'static str },
    /// A function with no return values does not end with an unlink
    MissingFinalUnlink,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub function: String,
    pub context: Context,
    pub kind: ViolationKind,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ViolationKind::NestedFunctions { count } => {
                write!(f, "function `{}` still contains {} nested function(s)", self.function, count)
            }
            ViolationKind::LinkCount { links } => {
                write!(f, "function `{}` links its frame {} times", self.function, links)
            }
            ViolationKind::MissingUnlink { exit } => {
                write!(f, "function `{}` has a {} without a preceding unlink", self.function, exit)
            }
            ViolationKind::MissingFinalUnlink => {
                write!(f, "function `{}` can fall off its end without unlinking", self.function)
            }
        }
    }
}

/// Functions of `module` that still contain nested functions
pub fn check_no_nested_functions(module: &Module) -> Vec<Violation> {
    functions_with_bodies(module)
        .filter_map(|(defn, _, body)| {
            let count = count_nested_functions(body);
            (count > 0).then(|| Violation {
                function: defn.name.to_string(),
                context: defn.context.clone(),
                kind: ViolationKind::NestedFunctions { count },
            })
        })
        .collect()
}

/// Chaining violations in the functions of `module` that link a frame
pub fn check_chain_balance(module: &Module) -> Vec<Violation> {
    let mut violations = Vec::new();
    for (defn, func, body) in functions_with_bodies(module) {
        let mut links = 0;
        count_links(body, &mut links);
        if links == 0 {
            continue;
        }
        let mut report = |kind: ViolationKind| {
            violations.push(Violation {
                function: defn.name.to_string(),
                context: defn.context.clone(),
                kind,
            })
        };
        if links > 1 {
            report(ViolationKind::LinkCount { links });
        }
        check_exits(body, &mut report);
        if func.params.returns.is_empty() && !ends_with_unlink(body) {
            report(ViolationKind::MissingFinalUnlink);
        }
    }
    violations
}

/// Every check at once
pub fn check_module(module: &Module) -> Vec<Violation> {
    let mut violations = check_no_nested_functions(module);
    violations.extend(check_chain_balance(module));
    violations
}

fn functions_with_bodies(module: &Module) -> impl Iterator<Item = (&Defn, &FunctionDefn, &Stmt)> {
    module.defns.iter().filter_map(|defn| {
        let func = defn.as_function()?;
        let body = func.body.as_ref()?;
        Some((defn, func, body))
    })
}

fn assigns_stack_chain(stmt: &Stmt) -> Option<&Rval> {
    match stmt {
        Stmt::Atomic(AtomicStmt::Assign(lval, rval)) if *lval == stack_chain_var() => Some(rval),
        _ => None,
    }
}

/// `stack_chain = (void *) ptr`
fn is_link(stmt: &Stmt) -> bool {
    matches!(assigns_stack_chain(stmt), Some(Rval::Cast(..)))
}

/// `stack_chain = ptr->prev`
fn is_unlink(stmt: &Stmt) -> bool {
    match assigns_stack_chain(stmt) {
        Some(Rval::Lval(lval)) => matches!(
            lval.as_ref(),
            Lval::Field { field: FieldId::Named { name, .. }, .. } if name.name == PREV_FIELD
        ),
        _ => false,
    }
}

fn count_links(stmt: &Stmt, links: &mut usize) {
    if is_link(stmt) {
        *links += 1;
    }
    for child in child_stmts(stmt) {
        count_links(child, links);
    }
}

fn child_stmts(stmt: &Stmt) -> Vec<&Stmt> {
    match stmt {
        Stmt::Block { stmts, .. } => stmts.iter().collect(),
        Stmt::While { body, .. } => vec![&**body],
        Stmt::If {
            then_branch,
            else_branch,
            ..
        } => {
            let mut children: Vec<&Stmt> = vec![&**then_branch];
            children.extend(else_branch.as_deref());
            children
        }
        Stmt::Switch { cases, default, .. } => {
            let mut children: Vec<&Stmt> = cases.iter().map(|c| &c.body).collect();
            if let SwitchDefault::Case(stmt) = default {
                children.push(stmt);
            }
            children
        }
        Stmt::TryCommit {
            protected, handler, ..
        } => vec![&**protected, &**handler],
        Stmt::Call(_) | Stmt::Return(_) | Stmt::DoCommit(_) | Stmt::Atomic(_) => Vec::new(),
    }
}

fn exit_kind(stmt: &Stmt) -> Option<&'static str> {
    match stmt {
        Stmt::Return(_) => Some("return"),
        Stmt::Call(call) => match call.kind {
            CallKind::Ordinary => None,
            CallKind::Tail => Some("tail call"),
            CallKind::NoReturn => Some("call that never returns"),
        },
        _ => None,
    }
}

/// Walk every statement list; an exit is fine once an unlink has been seen
/// earlier in the same list
fn check_exits(stmt: &Stmt, report: &mut dyn FnMut(ViolationKind)) {
    match stmt {
        Stmt::Block { stmts, .. } => {
            let mut unlinked = false;
            for stmt in stmts {
                if is_unlink(stmt) {
                    unlinked = true;
                } else if let Some(exit) = exit_kind(stmt) {
                    if !unlinked {
                        report(ViolationKind::MissingUnlink { exit });
                    }
                } else {
                    check_exits(stmt, report);
                }
            }
        }
        other => {
            if let Some(exit) = exit_kind(other) {
                report(ViolationKind::MissingUnlink { exit });
                return;
            }
            for child in child_stmts(other) {
                check_exits(child, report);
            }
        }
    }
}

fn ends_with_unlink(body: &Stmt) -> bool {
    match body {
        Stmt::Block { stmts, .. } => stmts.last().map_or(false, |last| is_unlink(last) || ends_with_unlink(last)),
        _ => false,
    }
}
