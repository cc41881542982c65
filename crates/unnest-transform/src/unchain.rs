//! Unlinking a frame on every exit path

use crate::action::PREV_FIELD;
use crate::state::PassState;
use unnest_ir::*;
use unnest_types::Type;

/// `stack_chain = ptr->prev`
pub fn unchain_stmt(state: &PassState) -> Stmt {
    Stmt::assign(
        stack_chain_var(),
        Rval::lval(state.record_field(PREV_FIELD, &Type::GenericEnvPtr)),
    )
}

/// Insert an unlink before every exit of `body`
///
/// Ordinary returns and calls that never return are preceded by one. A tail
/// call is preceded by one and followed by an explicit return of its results,
/// since the frame must be gone before the callee runs. A function with no
/// return values may fall off its end, so one is also appended.
pub fn add_unchain(body: Stmt, returns_nothing: bool, state: &PassState) -> Stmt {
    let unchain = unchain_stmt(state);
    let body = unchain_exits(body, &unchain);
    if !returns_nothing {
        return body;
    }
    match body {
        Stmt::Block {
            defns,
            mut stmts,
            context,
        } => {
            stmts.push(unchain);
            Stmt::Block {
                defns,
                stmts,
                context,
            }
        }
        other => Stmt::block(vec![other, unchain], Context::default()),
    }
}

fn unchain_exits(stmt: Stmt, unchain: &Stmt) -> Stmt {
    match stmt {
        Stmt::Block {
            defns,
            stmts,
            context,
        } => Stmt::Block {
            defns,
            stmts: stmts.into_iter().map(|s| unchain_exits(s, unchain)).collect(),
            context,
        },
        Stmt::While { kind, cond, body } => Stmt::While {
            kind,
            cond,
            body: Box::new(unchain_exits(*body, unchain)),
        },
        Stmt::If {
            cond,
            then_branch,
            else_branch,
        } => Stmt::If {
            cond,
            then_branch: Box::new(unchain_exits(*then_branch, unchain)),
            else_branch: else_branch.map(|e| Box::new(unchain_exits(*e, unchain))),
        },
        Stmt::Switch {
            ty,
            scrutinee,
            cases,
            default,
        } => Stmt::Switch {
            ty,
            scrutinee,
            cases: cases
                .into_iter()
                .map(|case| SwitchCase {
                    conds: case.conds,
                    body: unchain_exits(case.body, unchain),
                })
                .collect(),
            default: match default {
                SwitchDefault::Case(stmt) => SwitchDefault::Case(Box::new(unchain_exits(*stmt, unchain))),
                other => other,
            },
        },
        Stmt::TryCommit {
            reference,
            protected,
            handler,
        } => Stmt::TryCommit {
            reference,
            protected: Box::new(unchain_exits(*protected, unchain)),
            handler: Box::new(unchain_exits(*handler, unchain)),
        },
        ret @ Stmt::Return(_) => Stmt::block(vec![unchain.clone(), ret], Context::default()),
        Stmt::Call(call) => match call.kind {
            CallKind::Ordinary => Stmt::Call(call),
            CallKind::NoReturn => Stmt::block(vec![unchain.clone(), Stmt::Call(call)], Context::default()),
            CallKind::Tail => {
                let results = call.results.iter().cloned().map(Rval::lval).collect();
                Stmt::block(
                    vec![unchain.clone(), Stmt::Call(call), Stmt::Return(results)],
                    Context::default(),
                )
            }
        },
        other @ (Stmt::DoCommit(_) | Stmt::Atomic(_)) => other,
    }
}
