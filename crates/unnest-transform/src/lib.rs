//! Nested-function elimination for the unnest IR
//!
//! One traversal, two actions:
//! - `HoistNestedFuncs` moves nested functions to module scope. Locals they
//!   use move into an environment record that the hoisted functions reach
//!   through their `env_ptr_arg` parameter.
//! - `ChainGcStackFrames` moves every local the collector must trace into a
//!   frame record, links that frame onto the runtime's stack chain on entry
//!   and unlinks it on every exit.

pub mod action;
pub mod config;
pub mod env;
pub mod error;
pub mod flatten;
pub mod hoist;
pub mod oracle;
pub mod rewrite;
pub mod state;
pub mod unchain;
pub mod verify;

#[cfg(test)]
mod pass_tests;

pub use action::{Action, Strategy};
pub use config::{ConfigOverrides, Target, TargetConfig};
pub use error::{ElimError, Result};
pub use verify::{check_module, Violation, ViolationKind};

use rewrite::Rewriter;
use state::PassState;
use unnest_ir::visit::stmt_contains_defn;
use unnest_ir::{is_gc_trace_primitive, Defn, DefnBody, EntityName, FunctionDefn, Module, Stmt, ENV_PTR};
use unnest_types::ModuleName;

/// Run `action` over every function of `module`
///
/// The first invariant violation aborts the whole module.
pub fn transform(action: Action, config: &TargetConfig, module: Module) -> Result<Module> {
    let Module { name, imports, defns } = module;
    let strategy = action.strategy();

    let mut out = Vec::with_capacity(defns.len());
    for defn in defns {
        out.extend(transform_defn(strategy, config, &name, defn)?);
    }
    log::debug!("{}: {} -> {} definitions", name, action, out.len());

    Ok(Module {
        name,
        imports,
        defns: out,
    })
}

fn transform_defn(
    strategy: &'static dyn Strategy,
    config: &TargetConfig,
    module: &ModuleName,
    defn: Defn,
) -> Result<Vec<Defn>> {
    let Defn {
        name,
        context,
        flags,
        body,
    } = defn;
    let (fname, func) = match (name, body) {
        (EntityName::Function(fname), DefnBody::Function(func)) => (fname, func),
        (name, body) => {
            return Ok(vec![Defn {
                name,
                context,
                flags,
                body,
            }])
        }
    };

    // The runtime's tracer walks the chain itself
    if strategy.links_frames() && is_gc_trace_primitive(module, &fname) {
        return Ok(vec![Defn::function(fname, flags, func, context)]);
    }

    let FunctionDefn { params, body } = func;
    let Some(body) = body else {
        return Ok(vec![Defn::function(fname, flags, FunctionDefn { params, body: None }, context)]);
    };

    let mut state = PassState::new(module, config, strategy, &fname);

    // Phase 1: capture arguments and flatten the body
    let arg_copies = flatten::capture_args(&params, &body, &context, &mut state)?;
    let body = flatten::flatten_stmt(body, &mut state)?;
    log::debug!(
        "{}: {} captured, {} nested, {} statics",
        fname,
        state.captured.len(),
        state.nested_funcs.len(),
        state.hoisted_statics.len()
    );

    // Phase 2: nothing captured, so no record
    if state.captured.is_empty() {
        let body = erase_undeclared_env_ptr(body, module, strategy);
        let mut out = std::mem::take(&mut state.hoisted_statics);
        for nested in std::mem::take(&mut state.nested_funcs) {
            let nested = erase_in_function(nested, module, strategy);
            out.push(hoist::hoist_nested_function(nested, &state)?);
        }
        out.push(Defn::function(fname, flags, FunctionDefn { params, body: Some(body) }, context));
        return Ok(out);
    }

    // Phase 3: build the record and wrap the body
    let frame = env::build_frame(&state, arg_copies, &context);
    let mut stmts = frame.init;
    stmts.push(body);
    let mut body = Stmt::Block {
        defns: frame.decls,
        stmts,
        context: context.clone(),
    };
    if strategy.links_frames() {
        body = unchain::add_unchain(body, params.returns.is_empty(), &state);
        log::debug!("{}: linked frame {}", fname, state.record_name);
    }

    // Phase 4: assemble record, statics, trace function, hoisted functions, outer function
    let mut out = vec![frame.record];
    out.append(&mut state.hoisted_statics);
    out.extend(frame.trace_fn);
    for nested in std::mem::take(&mut state.nested_funcs) {
        out.push(hoist::hoist_nested_function(nested, &state)?);
    }
    out.push(Defn::function(fname, flags, FunctionDefn { params, body: Some(body) }, context));
    Ok(out)
}

/// Without a record, reads of `env_ptr` that nothing declares pass null
fn erase_undeclared_env_ptr(mut body: Stmt, module: &ModuleName, strategy: &dyn Strategy) -> Stmt {
    if strategy.ptr_var() != ENV_PTR || declares_env_ptr(&body) {
        return body;
    }
    Rewriter::erase_env_ptr(module).stmt(&mut body);
    body
}

fn erase_in_function(mut defn: Defn, module: &ModuleName, strategy: &dyn Strategy) -> Defn {
    if let DefnBody::Function(func) = &mut defn.body {
        if let Some(body) = func.body.take() {
            func.body = Some(erase_undeclared_env_ptr(body, module, strategy));
        }
    }
    defn
}

fn declares_env_ptr(body: &Stmt) -> bool {
    stmt_contains_defn(body, &mut |defn| {
        matches!(defn.body, DefnBody::Data(_)) && defn.data_name() == Some(ENV_PTR)
    })
}
