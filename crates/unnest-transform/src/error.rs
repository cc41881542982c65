//! Errors raised by the pass
//!
//! Every variant is an internal invariant violation: the input IR was built
//! wrongly by an earlier pass. The first one aborts the whole module.

use thiserror::Error;
use unnest_ir::Context;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ElimError {
    #[error("class `{class}` is defined inside function `{function}`")]
    NestedClass {
        function: String,
        class: String,
        context: Context,
    },

    #[error("nested function `{name}` in `{function}` has no body")]
    NestedFunctionWithoutBody {
        function: String,
        name: String,
        context: Context,
    },

    #[error("variable `{name}` is captured twice in `{function}`")]
    DuplicateCapture {
        function: String,
        name: String,
        context: Context,
    },

    #[error("function `{name}` uses its environment but has no `env_ptr_arg` parameter")]
    MissingEnvPtrArg { name: String, context: Context },

    #[error("captured variable `{name}` in `{function}` has a compound initializer")]
    UnsupportedCapturedInitializer {
        function: String,
        name: String,
        context: Context,
    },

    #[error(
        "compound initializer of `{name}` in `{function}` reads `{reads}`, which is only assigned after the declaration"
    )]
    CompoundInitializerReadsCaptured {
        function: String,
        name: String,
        reads: String,
        context: Context,
    },

    #[error("definition `{name}` in `{function}` has a name that does not match its body")]
    MalformedDefn {
        function: String,
        name: String,
        context: Context,
    },
}

impl ElimError {
    /// Location of the offending definition
    pub fn context(&self) -> &Context {
        match self {
            ElimError::NestedClass { context, .. }
            | ElimError::NestedFunctionWithoutBody { context, .. }
            | ElimError::DuplicateCapture { context, .. }
            | ElimError::MissingEnvPtrArg { context, .. }
            | ElimError::UnsupportedCapturedInitializer { context, .. }
            | ElimError::CompoundInitializerReadsCaptured { context, .. }
            | ElimError::MalformedDefn { context, .. } => context,
        }
    }
}

pub type Result<T> = std::result::Result<T, ElimError>;
