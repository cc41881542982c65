//! Traversal that strips nested definitions out of a function body
//!
//! Nested functions are flattened recursively against the same state and
//! collected there; static constants move to module scope; locals that must
//! live in the record are stripped, and their initializers turn into
//! assignments at the point of declaration.

use crate::error::{ElimError, Result};
use crate::state::PassState;
use std::collections::VecDeque;
use unnest_ir::visit::initializer_contains_var;
use unnest_ir::*;
use unnest_types::{QualifiedName, Type};

/// Flatten one statement, rewriting every reference to a captured variable
pub fn flatten_stmt(stmt: Stmt, state: &mut PassState) -> Result<Stmt> {
    match stmt {
        Stmt::Block {
            defns,
            stmts,
            context,
        } => flatten_block(defns, stmts, context, state),

        Stmt::While {
            kind,
            mut cond,
            body,
        } => {
            state.rewriter().rval(&mut cond);
            let body = flatten_stmt(*body, state)?;
            Ok(Stmt::While {
                kind,
                cond,
                body: Box::new(body),
            })
        }

        Stmt::If {
            mut cond,
            then_branch,
            else_branch,
        } => {
            state.rewriter().rval(&mut cond);
            let then_branch = flatten_stmt(*then_branch, state)?;
            let else_branch = match else_branch {
                Some(stmt) => Some(Box::new(flatten_stmt(*stmt, state)?)),
                None => None,
            };
            Ok(Stmt::If {
                cond,
                then_branch: Box::new(then_branch),
                else_branch,
            })
        }

        Stmt::Switch {
            ty,
            mut scrutinee,
            cases,
            default,
        } => {
            state.rewriter().rval(&mut scrutinee);
            let mut flat_cases = Vec::with_capacity(cases.len());
            for SwitchCase { mut conds, body } in cases {
                state.rewriter().case_conds(&mut conds);
                let body = flatten_stmt(body, state)?;
                flat_cases.push(SwitchCase { conds, body });
            }
            let default = match default {
                SwitchDefault::Case(stmt) => SwitchDefault::Case(Box::new(flatten_stmt(*stmt, state)?)),
                other => other,
            };
            Ok(Stmt::Switch {
                ty,
                scrutinee,
                cases: flat_cases,
                default,
            })
        }

        Stmt::TryCommit {
            mut reference,
            protected,
            handler,
        } => {
            state.rewriter().lval(&mut reference);
            if state.strategy.links_frames() {
                flatten_try_commit_with_saved_chain(reference, *protected, *handler, state)
            } else {
                let protected = flatten_stmt(*protected, state)?;
                let handler = flatten_stmt(*handler, state)?;
                Ok(Stmt::TryCommit {
                    reference,
                    protected: Box::new(protected),
                    handler: Box::new(handler),
                })
            }
        }

        mut stmt @ (Stmt::Call(_) | Stmt::Return(_) | Stmt::DoCommit(_) | Stmt::Atomic(_)) => {
            state.rewriter().stmt(&mut stmt);
            Ok(stmt)
        }
    }
}

/// A commit unwinds past frames linked inside the protected region without
/// running their unlinks, so the chain is saved before it and restored at
/// the start of the handler.
///
/// The saved value is a record field: locals are not guaranteed to survive
/// the non-local jump.
fn flatten_try_commit_with_saved_chain(
    reference: Lval,
    protected: Stmt,
    handler: Stmt,
    state: &mut PassState,
) -> Result<Stmt> {
    let saved = state.next_saved_chain();
    state.capture(Defn::data(
        saved.clone(),
        DeclFlags::local_var(),
        DataDefn {
            ty: Type::GenericEnvPtr,
            init: Initializer::None,
            gc: GcStatement::None,
        },
        Context::default(),
    ))?;

    let saved_var = Lval::var(state.qualify(&saved), Type::GenericEnvPtr);
    let mut save = Stmt::assign(saved_var.clone(), Rval::lval(stack_chain_var()));
    let mut restore = Stmt::assign(stack_chain_var(), Rval::lval(saved_var));
    {
        let rewriter = state.rewriter();
        rewriter.stmt(&mut save);
        rewriter.stmt(&mut restore);
    }

    let protected = flatten_stmt(protected, state)?;
    let handler = flatten_stmt(handler, state)?;
    Ok(Stmt::TryCommit {
        reference,
        protected: Box::new(Stmt::block(vec![save, protected], Context::default())),
        handler: Box::new(Stmt::block(vec![restore, handler], Context::default())),
    })
}

fn flatten_block(
    defns: Vec<Defn>,
    stmts: Vec<Stmt>,
    block_context: Context,
    state: &mut PassState,
) -> Result<Stmt> {
    let mut scope = BlockScope::default();

    let mut pending: VecDeque<Defn> = defns.into();
    while let Some(Defn {
        name,
        context,
        flags,
        body,
    }) = pending.pop_front()
    {
        let following: &[Defn] = pending.make_contiguous();
        match body {
            DefnBody::Function(func) => {
                let func = flatten_nested_function(name, context, flags, func, state)?;
                state.nested_funcs.push(func);
            }
            DefnBody::Class(_) => {
                return Err(ElimError::NestedClass {
                    function: state.function.to_string(),
                    class: name.to_string(),
                    context,
                });
            }
            DefnBody::Data(data) if flags.storage == Storage::OneCopy && flags.constness == Constness::Const => {
                let flags = DeclFlags {
                    access: Access::Private,
                    storage: Storage::OneCopy,
                    constness: Constness::Const,
                };
                state.hoisted_statics.push(Defn {
                    name,
                    context,
                    flags,
                    body: DefnBody::Data(data),
                });
            }
            DefnBody::Data(data) => {
                let local = Defn {
                    name,
                    context,
                    flags,
                    body: DefnBody::Data(data),
                };
                scope.add_local(local, following, &stmts, state)?;
            }
        }
    }

    let BlockScope {
        defns,
        stmts: mut init_stmts,
        ..
    } = scope;
    state.rewriter().stmts(&mut init_stmts);
    for stmt in stmts {
        init_stmts.push(flatten_stmt(stmt, state)?);
    }

    Ok(Stmt::Block {
        defns,
        stmts: init_stmts,
        context: block_context,
    })
}

/// What remains of a block's definitions, plus the statements that now
/// perform the initializations that could not stay on their declarations
#[derive(Default)]
struct BlockScope {
    defns: Vec<Defn>,
    stmts: Vec<Stmt>,
    /// Locals whose initialization became a statement
    deferred: Vec<QualifiedName>,
}

impl BlockScope {
    fn add_local(&mut self, defn: Defn, following: &[Defn], block_stmts: &[Stmt], state: &mut PassState) -> Result<()> {
        let var = match defn.data_name() {
            Some(name) => state.qualify(name),
            None => return Err(state.malformed(&defn)),
        };
        let Defn {
            name,
            context,
            flags,
            body,
        } = defn;
        let DataDefn { ty, init, gc } = match body {
            DefnBody::Data(data) => data,
            DefnBody::Function(_) | DefnBody::Class(_) => return Ok(()),
        };

        if state.strategy.needs_capture(&var, &gc, following, block_stmts) {
            match init {
                Initializer::None => {}
                Initializer::Single(rval) => self.defer(var, ty.clone(), rval),
                Initializer::Struct(..) | Initializer::Array(_) => {
                    return Err(ElimError::UnsupportedCapturedInitializer {
                        function: state.function.to_string(),
                        name: var.name,
                        context,
                    });
                }
            }
            let captured = DataDefn {
                ty,
                init: Initializer::None,
                gc,
            };
            return state.capture(Defn {
                name,
                context,
                flags,
                body: DefnBody::Data(captured),
            });
        }

        // An initializer reading a variable that is now assigned by a
        // statement has to run after that statement.
        let deferred_read = self
            .deferred
            .iter()
            .find(|deferred| initializer_contains_var(&init, deferred))
            .cloned();
        let init = match (init, deferred_read) {
            (init, None) => init,
            (Initializer::Single(rval), Some(_)) => {
                self.defer(var, ty.clone(), rval);
                Initializer::None
            }
            (Initializer::Struct(..) | Initializer::Array(_), Some(read)) => {
                return Err(ElimError::CompoundInitializerReadsCaptured {
                    function: state.function.to_string(),
                    name: var.name,
                    reads: read.name,
                    context,
                });
            }
            (Initializer::None, Some(_)) => Initializer::None,
        };

        let mut defn = Defn {
            name,
            context,
            flags,
            body: DefnBody::Data(DataDefn { ty, init, gc }),
        };
        state.rewriter().defn(&mut defn);
        self.defns.push(defn);
        Ok(())
    }

    fn defer(&mut self, var: QualifiedName, ty: Type, rval: Rval) {
        self.stmts.push(Stmt::assign(Lval::var(var.clone(), ty), rval));
        self.deferred.push(var);
    }
}

/// Flatten a nested function's body against the enclosing function's state
fn flatten_nested_function(
    name: EntityName,
    context: Context,
    flags: DeclFlags,
    func: FunctionDefn,
    state: &mut PassState,
) -> Result<Defn> {
    let FunctionDefn { params, body } = func;
    let Some(body) = body else {
        return Err(ElimError::NestedFunctionWithoutBody {
            function: state.function.to_string(),
            name: name.to_string(),
            context,
        });
    };

    let arg_copies = capture_args(&params, &body, &context, state)?;
    let mut body = flatten_stmt(body, state)?;
    if !arg_copies.is_empty() {
        let mut stmts = arg_copies;
        stmts.push(body);
        body = Stmt::block(stmts, context.clone());
    }

    Ok(Defn {
        name,
        context,
        flags,
        body: DefnBody::Function(FunctionDefn {
            params,
            body: Some(body),
        }),
    })
}

/// Capture the arguments that need it, returning the statements that copy
/// them into the record
///
/// Arguments stay parameters; the copies read the raw parameter values.
pub fn capture_args(params: &Params, body: &Stmt, context: &Context, state: &mut PassState) -> Result<Vec<Stmt>> {
    let mut copies = Vec::new();
    for arg in &params.args {
        let var = state.qualify(&arg.name);
        if !state
            .strategy
            .needs_capture(&var, &arg.gc, &[], std::slice::from_ref(body))
        {
            continue;
        }
        state.capture(Defn::data(
            arg.name.clone(),
            DeclFlags::local_var(),
            DataDefn {
                ty: arg.ty.clone(),
                init: Initializer::None,
                gc: arg.gc.clone(),
            },
            context.clone(),
        ))?;
        copies.push(Stmt::assign(
            state.record_field(&arg.name, &arg.ty),
            Rval::var(var, arg.ty.clone()),
        ));
    }
    Ok(copies)
}
