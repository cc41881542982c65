//! Moving flattened nested functions to module scope

use crate::error::{ElimError, Result};
use crate::state::PassState;
use unnest_ir::visit::stmt_contains_var;
use unnest_ir::*;
use unnest_types::Type;

/// Turn a flattened nested function into a private module-level function
///
/// If its body uses the record pointer, a prologue declares that pointer and
/// initializes it from the generic `env_ptr_arg` parameter.
pub fn hoist_nested_function(mut defn: Defn, state: &PassState) -> Result<Defn> {
    defn.flags.access = Access::Private;
    defn.flags.storage = Storage::OneCopy;

    let ptr_name = state.qualify(state.ptr_var());
    let DefnBody::Function(func) = &mut defn.body else {
        return Ok(defn);
    };
    let Some(body) = func.body.take() else {
        return Ok(defn);
    };
    if !stmt_contains_var(&body, &ptr_name) {
        func.body = Some(body);
        return Ok(defn);
    }

    let Some(env_arg) = func.params.args.iter().find(|arg| arg.name == ENV_PTR_ARG) else {
        return Err(ElimError::MissingEnvPtrArg {
            name: defn.name.to_string(),
            context: defn.context.clone(),
        });
    };
    let env_arg = Rval::var(state.qualify(&env_arg.name), Type::GenericEnvPtr);

    let ptr_decl = Defn::data(
        state.ptr_var(),
        DeclFlags::local_var(),
        DataDefn {
            ty: state.ptr_ty.clone(),
            init: Initializer::None,
            gc: GcStatement::None,
        },
        defn.context.clone(),
    );
    let set_ptr = Stmt::assign(
        Lval::var(ptr_name, state.ptr_ty.clone()),
        Rval::cast(state.ptr_ty.clone(), env_arg),
    );
    func.body = Some(Stmt::Block {
        defns: vec![ptr_decl],
        stmts: vec![set_ptr, body],
        context: defn.context.clone(),
    });
    Ok(defn)
}
