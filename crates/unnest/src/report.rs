//! Turning pass errors and contract violations into diagnostics

use std::path::Path;
use unnest_diagnostics::{
    Diagnostic, DiagnosticCode, DiagnosticEmitter, Diagnostics, JsonEmitter, Location, TerminalEmitter,
};
use unnest_ir::Context;
use unnest_transform::{ElimError, Violation, ViolationKind};

use crate::OutputFormat;

/// The IR context if it has one, otherwise the input file
fn location(context: &Context, input: &Path) -> Location {
    if context.is_unknown() {
        Location::file(input.display().to_string())
    } else {
        Location::new(context.file.clone(), context.line)
    }
}

pub fn elim_error(err: &ElimError, input: &Path) -> Diagnostic {
    let (code, help) = match err {
        ElimError::NestedClass { .. } => (
            DiagnosticCode::NestedClass,
            "classes must be defined at module scope before the pass runs",
        ),
        ElimError::NestedFunctionWithoutBody { .. } => (
            DiagnosticCode::NestedFunctionWithoutBody,
            "only top-level functions may be external",
        ),
        ElimError::DuplicateCapture { .. } => (
            DiagnosticCode::DuplicateCapture,
            "variable names must be unique within each top-level function",
        ),
        ElimError::MissingEnvPtrArg { .. } => (
            DiagnosticCode::MissingEnvPtrArg,
            "nested functions that read enclosing variables take an `env_ptr_arg` parameter",
        ),
        ElimError::UnsupportedCapturedInitializer { .. } => (
            DiagnosticCode::UnsupportedCapturedInitializer,
            "initialize the variable with assignments instead",
        ),
        ElimError::CompoundInitializerReadsCaptured { .. } => (
            DiagnosticCode::CompoundInitializerReadsCaptured,
            "initialize the later variable with assignments instead",
        ),
        ElimError::MalformedDefn { .. } => (
            DiagnosticCode::MalformedDefinition,
            "a data definition must have a data name",
        ),
    };
    Diagnostic::new(code, err.to_string())
        .with_location(location(err.context(), input))
        .with_help(help)
        .build()
}

pub fn violation(violation: &Violation, input: &Path) -> Diagnostic {
    let code = match violation.kind {
        ViolationKind::NestedFunctions { .. } => DiagnosticCode::RemainingNestedFunction,
        ViolationKind::LinkCount { .. }
        | ViolationKind::MissingUnlink { .. }
        | ViolationKind::MissingFinalUnlink => DiagnosticCode::UnbalancedStackChain,
    };
    Diagnostic::new(code, violation.to_string())
        .with_location(location(&violation.context, input))
        .with_note(Some(Location::file(input.display().to_string())), "in this module")
        .build()
}

/// Emit diagnostics to stderr (text) or stdout (JSON lines)
pub fn emit(diagnostics: &Diagnostics, format: OutputFormat, use_color: bool) -> std::io::Result<()> {
    match format {
        OutputFormat::Text => {
            let stderr = std::io::stderr();
            let mut emitter = TerminalEmitter::new(stderr.lock(), use_color);
            emitter.emit_all(diagnostics)?;
            emitter.emit_summary(diagnostics)
        }
        OutputFormat::Json => {
            let stdout = std::io::stdout();
            let mut emitter = JsonEmitter::new(stdout.lock());
            emitter.emit_all(diagnostics)
        }
    }
}
