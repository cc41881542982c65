//! Mutable state of one top-level elimination

use crate::action::Strategy;
use crate::config::TargetConfig;
use crate::error::{ElimError, Result};
use crate::rewrite::{self, Rewriter};
use std::collections::HashSet;
use unnest_ir::{Defn, FunctionName, Lval};
use unnest_types::{ClassKind, ClassRef, ModuleName, QualifiedName, Type};

/// Prefix of the record fields holding the stack chain saved by a try-commit
pub const SAVED_STACK_CHAIN: &str = "saved_stack_chain";

/// Everything collected while flattening one top-level function
///
/// Nested functions are flattened against the same state, so their captured
/// variables and their own nested functions end up here too.
pub struct PassState<'a> {
    pub module: &'a ModuleName,
    pub config: &'a TargetConfig,
    pub strategy: &'static dyn Strategy,
    /// The top-level function being flattened
    pub function: FunctionName,
    /// Name of the record type
    pub record_name: QualifiedName,
    pub record_ty: Type,
    /// Type of the pointer to the record
    pub ptr_ty: Type,
    /// Name of the generated trace function
    pub trace_fn: FunctionName,
    /// Nested functions, flattened, in the order they were finished
    pub nested_funcs: Vec<Defn>,
    /// Variables moved into the record, in capture order
    pub captured: Vec<Defn>,
    captured_names: HashSet<String>,
    /// Static constants moved to module scope
    pub hoisted_statics: Vec<Defn>,
    commit_counter: u32,
}

impl<'a> PassState<'a> {
    pub fn new(
        module: &'a ModuleName,
        config: &'a TargetConfig,
        strategy: &'static dyn Strategy,
        function: &FunctionName,
    ) -> Self {
        let record_name = QualifiedName::new(
            module,
            format!("{}_{}", function.mangled(), strategy.record_suffix()),
        );
        let kind = if config.on_heap {
            ClassKind::Class
        } else {
            ClassKind::Struct
        };
        let record_ty = Type::Class(ClassRef {
            name: record_name.clone(),
            kind,
        });
        let ptr_ty = if config.pointer_is_reference {
            record_ty.clone()
        } else {
            record_ty.clone().ptr_to()
        };
        let trace_fn = FunctionName {
            label: format!("{}_gc_trace", function.label),
            mode: function.mode,
            seq: function.seq,
        };

        Self {
            module,
            config,
            strategy,
            function: function.clone(),
            record_name,
            record_ty,
            ptr_ty,
            trace_fn,
            nested_funcs: Vec::new(),
            captured: Vec::new(),
            captured_names: HashSet::new(),
            hoisted_statics: Vec::new(),
            commit_counter: 0,
        }
    }

    pub fn qualify(&self, name: &str) -> QualifiedName {
        QualifiedName::new(self.module, name)
    }

    /// Name of the local pointing at the record
    pub fn ptr_var(&self) -> &'static str {
        self.strategy.ptr_var()
    }

    /// Rewriter routing captured variables through the record pointer
    pub fn rewriter(&self) -> Rewriter<'_> {
        Rewriter::capture(self.module, &self.captured_names, self.ptr_var(), &self.ptr_ty)
    }

    /// `ptr->field`, for a field of the record
    pub fn record_field(&self, field: &str, field_ty: &Type) -> Lval {
        rewrite::record_field(self.module, self.ptr_var(), &self.ptr_ty, field, field_ty)
    }

    pub fn captured_names(&self) -> &HashSet<String> {
        &self.captured_names
    }

    /// Move a variable definition into the record
    pub fn capture(&mut self, defn: Defn) -> Result<()> {
        let name = match defn.data_name() {
            Some(name) => name.to_string(),
            None => {
                return Err(ElimError::MalformedDefn {
                    function: self.function.to_string(),
                    name: defn.name.to_string(),
                    context: defn.context.clone(),
                })
            }
        };
        if !self.captured_names.insert(name.clone()) {
            return Err(ElimError::DuplicateCapture {
                function: self.function.to_string(),
                name,
                context: defn.context.clone(),
            });
        }
        log::trace!("{}: capturing `{}`", self.function, name);
        self.captured.push(defn);
        Ok(())
    }

    /// A fresh name for the saved stack chain of one try-commit
    pub fn next_saved_chain(&mut self) -> String {
        let name = format!("{}_{}", SAVED_STACK_CHAIN, self.commit_counter);
        self.commit_counter += 1;
        name
    }

    pub fn malformed(&self, defn: &Defn) -> ElimError {
        ElimError::MalformedDefn {
            function: self.function.to_string(),
            name: defn.name.to_string(),
            context: defn.context.clone(),
        }
    }
}
