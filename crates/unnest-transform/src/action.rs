//! The two actions of the pass and the per-action strategy
//!
//! Both actions share one traversal. What differs is which variables get
//! captured, what the record is called and whether it carries a GC header.

use crate::oracle;
use std::fmt;
use unnest_ir::{
    Const, Context, DataDefn, DeclFlags, Defn, FunctionName, GcStatement, Initializer, Rval, Stmt, ENV_PTR,
    FRAME_PTR,
};
use unnest_types::{ModuleName, QualifiedName, Signature, Type};

/// Name of the header field linking a frame to the previous one
pub const PREV_FIELD: &str = "prev";

/// Name of the header field holding the frame's trace function
pub const TRACE_FIELD: &str = "trace";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Move nested functions to module scope, capturing the locals they use
    HoistNestedFuncs,
    /// Link a frame record holding every traced local onto the stack chain
    ChainGcStackFrames,
}

impl Action {
    pub fn strategy(self) -> &'static dyn Strategy {
        match self {
            Action::HoistNestedFuncs => &HoistStrategy,
            Action::ChainGcStackFrames => &ChainStrategy,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::HoistNestedFuncs => f.write_str("hoist_nested_funcs"),
            Action::ChainGcStackFrames => f.write_str("chain_gc_stack_frames"),
        }
    }
}

/// A header field of the record with the value it starts out with
pub struct HeaderField {
    pub defn: Defn,
    pub init: Rval,
}

pub trait Strategy: Sync {
    fn action(&self) -> Action;

    /// Whether the variable `var` must live in the record
    fn needs_capture(
        &self,
        var: &QualifiedName,
        gc: &GcStatement,
        following_defns: &[Defn],
        following_stmts: &[Stmt],
    ) -> bool;

    /// Suffix of the record type name, also the name of a stack-allocated record
    fn record_suffix(&self) -> &'static str;

    /// Name of the local pointing at the record
    fn ptr_var(&self) -> &'static str;

    /// Leading fields of the record, fixed by the runtime
    fn header(&self, module: &ModuleName, trace_fn: &FunctionName) -> Vec<HeaderField>;

    /// Whether the record is linked onto the stack chain
    fn links_frames(&self) -> bool;
}

pub struct HoistStrategy;

impl Strategy for HoistStrategy {
    fn action(&self) -> Action {
        Action::HoistNestedFuncs
    }

    fn needs_capture(
        &self,
        var: &QualifiedName,
        _gc: &GcStatement,
        following_defns: &[Defn],
        following_stmts: &[Stmt],
    ) -> bool {
        oracle::referenced_by_hoisted_defn(var, following_defns, following_stmts)
    }

    fn record_suffix(&self) -> &'static str {
        "env"
    }

    fn ptr_var(&self) -> &'static str {
        ENV_PTR
    }

    fn header(&self, _module: &ModuleName, _trace_fn: &FunctionName) -> Vec<HeaderField> {
        Vec::new()
    }

    fn links_frames(&self) -> bool {
        false
    }
}

pub struct ChainStrategy;

impl Strategy for ChainStrategy {
    fn action(&self) -> Action {
        Action::ChainGcStackFrames
    }

    fn needs_capture(
        &self,
        _var: &QualifiedName,
        gc: &GcStatement,
        _following_defns: &[Defn],
        _following_stmts: &[Stmt],
    ) -> bool {
        oracle::has_trace_obligation(gc)
    }

    fn record_suffix(&self) -> &'static str {
        "frame"
    }

    fn ptr_var(&self) -> &'static str {
        FRAME_PTR
    }

    fn header(&self, module: &ModuleName, trace_fn: &FunctionName) -> Vec<HeaderField> {
        let trace_sig = trace_signature();
        vec![
            HeaderField {
                defn: header_field(PREV_FIELD, Type::GenericEnvPtr),
                init: Rval::lval(unnest_ir::stack_chain_var()),
            },
            HeaderField {
                defn: header_field(TRACE_FIELD, Type::Func(Box::new(trace_sig.clone()))),
                init: Rval::Const(Const::CodeAddr {
                    module: module.clone(),
                    name: trace_fn.clone(),
                    signature: trace_sig,
                }),
            },
        ]
    }

    fn links_frames(&self) -> bool {
        true
    }
}

/// Signature shared by every generated trace function
pub fn trace_signature() -> Signature {
    Signature::new(vec![Type::GenericEnvPtr], vec![])
}

fn header_field(name: &str, ty: Type) -> Defn {
    Defn::data(
        name,
        DeclFlags::public_field(),
        DataDefn {
            ty,
            init: Initializer::None,
            gc: GcStatement::None,
        },
        Context::default(),
    )
}
