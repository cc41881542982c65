//! Environment and frame record synthesis
//!
//! Given the variables captured from one function, builds the record type,
//! the locals holding the record and the pointer to it, the statements that
//! set both up, and in GC mode the function that traces the frame.

use crate::action::trace_signature;
use crate::rewrite::Rewriter;
use crate::state::PassState;
use unnest_ir::*;
use unnest_types::Type;

/// Everything the outer function needs to own a record
pub struct Frame {
    /// The record type definition
    pub record: Defn,
    /// Locals to declare at the top of the function body
    pub decls: Vec<Defn>,
    /// Statements to run before the original body
    pub init: Vec<Stmt>,
    /// Trace function for the frame, in GC mode
    pub trace_fn: Option<Defn>,
}

/// Build the record for the variables captured in `state`
///
/// `arg_copies` store the captured arguments; they run once the pointer is
/// set up and, in GC mode, before the frame is linked.
pub fn build_frame(state: &PassState, arg_copies: Vec<Stmt>, context: &Context) -> Frame {
    let header = state.strategy.header(state.module, &state.trace_fn);
    let links = state.strategy.links_frames();

    // Phase 1: record type, header first
    let mut members: Vec<Defn> = header.iter().map(|h| h.defn.clone()).collect();
    members.extend(state.captured.iter().map(record_member));
    let kind = match &state.record_ty {
        Type::Class(class) => class.kind,
        _ => unnest_types::ClassKind::Struct,
    };
    let record = Defn {
        name: EntityName::Type {
            name: state.record_name.name.clone(),
            arity: 0,
        },
        context: context.clone(),
        flags: DeclFlags::private_one_copy(),
        body: DefnBody::Class(ClassDefn { kind, members }),
    };

    // Phase 2: allocation and pointer
    let ptr_var = Lval::var(state.qualify(state.ptr_var()), state.ptr_ty.clone());
    let ptr_decl = Defn::data(
        state.ptr_var(),
        DeclFlags::local_var(),
        DataDefn {
            ty: state.ptr_ty.clone(),
            init: Initializer::None,
            gc: record_gc(state, context),
        },
        context.clone(),
    );

    let mut decls = Vec::new();
    let mut init = Vec::new();
    let header_in_initializer = !state.config.on_heap && state.config.implicit_zero_init;
    if state.config.on_heap {
        init.push(Stmt::Atomic(AtomicStmt::NewObject {
            target: ptr_var.clone(),
            ty: state.record_ty.clone(),
            args: Vec::new(),
            arg_types: Vec::new(),
        }));
    } else {
        let holder = state.strategy.record_suffix();
        let holder_init = if header_in_initializer && !header.is_empty() {
            Initializer::Struct(
                state.record_ty.clone(),
                header.iter().map(|h| Initializer::Single(h.init.clone())).collect(),
            )
        } else {
            Initializer::None
        };
        decls.push(Defn::data(
            holder,
            DeclFlags::local_var(),
            DataDefn {
                ty: state.record_ty.clone(),
                init: holder_init,
                gc: GcStatement::None,
            },
            context.clone(),
        ));
        init.push(Stmt::assign(
            ptr_var.clone(),
            Rval::mem_addr(Lval::var(state.qualify(holder), state.record_ty.clone())),
        ));
    }
    decls.push(ptr_decl);

    // Phase 3: header fields and zeroing the initializer did not cover
    if !header_in_initializer {
        for field in &header {
            if let (Some(name), Some(data)) = (field.defn.data_name(), field.defn.as_data()) {
                init.push(Stmt::assign(state.record_field(name, &data.ty), field.init.clone()));
            }
        }
    }
    if links && !state.config.implicit_zero_init {
        for captured in &state.captured {
            if let (Some(name), Some(data)) = (captured.data_name(), captured.as_data()) {
                init.push(Stmt::assign(
                    state.record_field(name, &data.ty),
                    Rval::Const(Const::Zero(data.ty.clone())),
                ));
            }
        }
    }

    // Phase 4: captured arguments, then link
    init.extend(arg_copies);
    if links {
        init.push(Stmt::assign(
            stack_chain_var(),
            Rval::cast(Type::GenericEnvPtr, Rval::lval(ptr_var)),
        ));
    }

    let trace_fn = links.then(|| build_trace_fn(state, context));

    Frame {
        record,
        decls,
        init,
        trace_fn,
    }
}

/// A captured variable as a field of the record
fn record_member(captured: &Defn) -> Defn {
    let mut field = captured.clone();
    field.flags = DeclFlags::public_field();
    if let DefnBody::Data(data) = &mut field.body {
        data.init = Initializer::None;
        data.gc = GcStatement::None;
    }
    field
}

/// Split the GC code of the captured variables into initialisers and trace
/// statements, dropping trace statements for fields that cannot point into
/// the heap
fn captured_gc_code(state: &PassState) -> Vec<Stmt> {
    let mut initialisers = Vec::new();
    let mut traces = Vec::new();
    for captured in &state.captured {
        let Some(data) = captured.as_data() else {
            continue;
        };
        match &data.gc {
            GcStatement::None => {}
            GcStatement::Initialiser(stmt) => initialisers.push(stmt.clone()),
            GcStatement::Trace(stmt) => {
                if data.ty.may_hold_heap_refs() {
                    traces.push(stmt.clone());
                }
            }
        }
    }
    initialisers.extend(traces);
    initialisers
}

/// In hoist mode the captured variables' GC obligations move with them: the
/// record pointer is traced field by field, so a later chaining run still
/// sees them. The pointer is null until the record is set up.
fn record_gc(state: &PassState, context: &Context) -> GcStatement {
    if state.strategy.links_frames() {
        return GcStatement::None;
    }
    let mut stmts = captured_gc_code(state);
    if stmts.is_empty() {
        return GcStatement::None;
    }
    state.rewriter().stmts(&mut stmts);
    let ptr = Rval::var(state.qualify(state.ptr_var()), state.ptr_ty.clone());
    let is_set = Rval::Binop(
        Binop::Ne,
        Box::new(ptr),
        Box::new(Rval::Const(Const::Null(state.ptr_ty.clone()))),
    );
    GcStatement::Trace(Stmt::If {
        cond: is_set,
        then_branch: Box::new(Stmt::block(stmts, context.clone())),
        else_branch: None,
    })
}

/// The function the stack walker calls to trace one frame
///
/// It receives the frame as a generic pointer, casts it back, runs every
/// initialiser and then every trace statement against the frame's fields.
fn build_trace_fn(state: &PassState, context: &Context) -> Defn {
    let frame_ptr = Lval::var(state.qualify(FRAME_PTR), state.ptr_ty.clone());
    let this_frame = Rval::var(state.qualify(THIS_FRAME), Type::GenericEnvPtr);

    let mut stmts = vec![Stmt::assign(frame_ptr, Rval::cast(state.ptr_ty.clone(), this_frame))];
    let mut gc_code = captured_gc_code(state);
    Rewriter::capture(state.module, state.captured_names(), FRAME_PTR, &state.ptr_ty).stmts(&mut gc_code);
    stmts.extend(gc_code);

    let frame_ptr_decl = Defn::data(
        FRAME_PTR,
        DeclFlags::local_var(),
        DataDefn {
            ty: state.ptr_ty.clone(),
            init: Initializer::None,
            gc: GcStatement::None,
        },
        context.clone(),
    );
    let params = Params {
        args: vec![Argument {
            name: THIS_FRAME.to_string(),
            ty: Type::GenericEnvPtr,
            gc: GcStatement::None,
        }],
        returns: trace_signature().returns,
    };

    Defn::function(
        state.trace_fn.clone(),
        DeclFlags::private_one_copy(),
        FunctionDefn {
            params,
            body: Some(Stmt::Block {
                defns: vec![frame_ptr_decl],
                stmts,
                context: context.clone(),
            }),
        },
        context.clone(),
    )
}
