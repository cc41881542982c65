//! Diagnostic infrastructure for the unnest tools.
//!
//! This crate provides structured error reporting with:
//! - Locations taken from the contexts recorded in the IR (file, line)
//! - Diagnostic codes for load errors, pass invariant violations and
//!   output-contract violations
//! - Terminal and JSON output
//!
//! # Example
//!
//! ```
//! use unnest_diagnostics::{Diagnostic, DiagnosticCode, DiagnosticEmitter, Location, TerminalEmitter};
//!
//! let diag = Diagnostic::new(DiagnosticCode::NestedClass, "class `point/0` defined inside `f_0`")
//!     .with_location(Location::new("shapes.m", 12))
//!     .with_help("Move the class to module scope before running the pass")
//!     .build();
//!
//! let stderr = std::io::stderr();
//! let mut emitter = TerminalEmitter::new(stderr.lock(), true);
//! emitter.emit(&diag).unwrap();
//! ```

pub mod diagnostic;
pub mod emitter;
pub mod location;

pub use diagnostic::{Diagnostic, DiagnosticBuilder, DiagnosticCode, Diagnostics, Severity};
pub use emitter::{DiagnosticEmitter, JsonEmitter, TerminalEmitter};
pub use location::{Label, Location};
