//! Diagnostic types for pass errors and output-contract violations.

use crate::location::{Label, Location};
use serde::{Deserialize, Serialize};

/// Severity level of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    /// Warning (output produced but may be wrong)
    Warning,
    /// Error (no output produced)
    Error,
}

impl Severity {
    /// Get the string representation for display.
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Diagnostic codes organized by category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiagnosticCode {
    // Input errors (P001-P099)
    /// The IR file could not be read or deserialized
    InvalidIr,

    // Internal invariant violations (I001-I099)
    /// A class or struct is defined inside a function body
    NestedClass,
    /// A nested function has no body
    NestedFunctionWithoutBody,
    /// The same variable was captured twice in one function
    DuplicateCapture,
    /// A hoisted function uses the record but has no environment parameter
    MissingEnvPtrArg,
    /// A captured local has a struct or array initializer
    UnsupportedCapturedInitializer,
    /// A definition does not have the shape its position requires
    MalformedDefinition,
    /// A struct or array initializer reads a captured local before it is assigned
    CompoundInitializerReadsCaptured,

    // Output-contract violations (V001-V099)
    /// A function still contains nested functions
    RemainingNestedFunction,
    /// A linked frame is not unlinked on some exit, or is linked twice
    UnbalancedStackChain,
}

impl DiagnosticCode {
    /// Every code, in numbering order.
    pub const ALL: &'static [DiagnosticCode] = &[
        Self::InvalidIr,
        Self::NestedClass,
        Self::NestedFunctionWithoutBody,
        Self::DuplicateCapture,
        Self::MissingEnvPtrArg,
        Self::UnsupportedCapturedInitializer,
        Self::MalformedDefinition,
        Self::CompoundInitializerReadsCaptured,
        Self::RemainingNestedFunction,
        Self::UnbalancedStackChain,
    ];

    /// Get the code string (e.g., "I003").
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidIr => "P001",

            Self::NestedClass => "I001",
            Self::NestedFunctionWithoutBody => "I002",
            Self::DuplicateCapture => "I003",
            Self::MissingEnvPtrArg => "I004",
            Self::UnsupportedCapturedInitializer => "I005",
            Self::MalformedDefinition => "I006",
            Self::CompoundInitializerReadsCaptured => "I007",

            Self::RemainingNestedFunction => "V001",
            Self::UnbalancedStackChain => "V002",
        }
    }

    /// Look a code up by its string, ignoring case.
    pub fn parse(code: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.as_str().eq_ignore_ascii_case(code))
    }

    /// Get the default severity for this code.
    pub fn default_severity(&self) -> Severity {
        match self {
            Self::InvalidIr
            | Self::NestedClass
            | Self::NestedFunctionWithoutBody
            | Self::DuplicateCapture
            | Self::MissingEnvPtrArg
            | Self::UnsupportedCapturedInitializer
            | Self::MalformedDefinition
            | Self::CompoundInitializerReadsCaptured
            | Self::RemainingNestedFunction
            | Self::UnbalancedStackChain => Severity::Error,
        }
    }
}

impl std::fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A diagnostic with its location and notes.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    /// Unique code
    pub code: DiagnosticCode,
    /// Severity level
    pub severity: Severity,
    /// Short message (single line)
    pub message: String,
    /// Help text (optional)
    pub explanation: Option<String>,
    /// Primary location, if known
    pub location: Option<Location>,
    /// Additional notes
    pub labels: Vec<Label>,
}

impl Diagnostic {
    /// Create a diagnostic with the code's default severity.
    pub fn new(code: DiagnosticCode, message: impl Into<String>) -> DiagnosticBuilder {
        DiagnosticBuilder::new(code, code.default_severity(), message)
    }

    /// Check if this is an error.
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Check if this is a warning.
    pub fn is_warning(&self) -> bool {
        self.severity == Severity::Warning
    }
}

/// Builder for constructing diagnostics fluently.
pub struct DiagnosticBuilder {
    inner: Diagnostic,
}

impl DiagnosticBuilder {
    /// Create a new diagnostic builder.
    pub fn new(code: DiagnosticCode, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            inner: Diagnostic {
                code,
                severity,
                message: message.into(),
                explanation: None,
                location: None,
                labels: Vec::new(),
            },
        }
    }

    /// Set the primary location.
    pub fn with_location(mut self, location: Location) -> Self {
        self.inner.location = Some(location);
        self
    }

    /// Add a note.
    pub fn with_note(mut self, location: Option<Location>, message: impl Into<String>) -> Self {
        self.inner.labels.push(Label::new(location, message));
        self
    }

    /// Add help text.
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.inner.explanation = Some(help.into());
        self
    }

    /// Build the diagnostic.
    pub fn build(self) -> Diagnostic {
        self.inner
    }
}

/// Collection of diagnostics with summary statistics.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    /// All diagnostics
    pub items: Vec<Diagnostic>,
}

impl Diagnostics {
    /// Create a new empty collection.
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Add a diagnostic.
    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.items.push(diagnostic);
    }

    /// Extend with multiple diagnostics.
    pub fn extend(&mut self, diagnostics: impl IntoIterator<Item = Diagnostic>) {
        self.items.extend(diagnostics);
    }

    /// Check if there are any errors.
    pub fn has_errors(&self) -> bool {
        self.items.iter().any(|d| d.is_error())
    }

    /// Count errors.
    pub fn error_count(&self) -> usize {
        self.items.iter().filter(|d| d.is_error()).count()
    }

    /// Count warnings.
    pub fn warning_count(&self) -> usize {
        self.items.iter().filter(|d| d.is_warning()).count()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Get the number of diagnostics.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Iterate over diagnostics.
    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_unique_and_parse_back() {
        let mut seen = std::collections::HashSet::new();
        for code in DiagnosticCode::ALL {
            assert!(seen.insert(code.as_str()), "duplicate code {}", code);
            assert_eq!(DiagnosticCode::parse(&code.as_str().to_lowercase()), Some(*code));
        }
        assert_eq!(DiagnosticCode::parse("X999"), None);
    }

    #[test]
    fn test_counts() {
        let mut diags = Diagnostics::new();
        diags.push(Diagnostic::new(DiagnosticCode::NestedClass, "nested class").build());
        diags.push(
            DiagnosticBuilder::new(DiagnosticCode::UnbalancedStackChain, Severity::Warning, "odd")
                .with_location(Location::new("a.m", 3))
                .build(),
        );
        assert!(diags.has_errors());
        assert_eq!(diags.error_count(), 1);
        assert_eq!(diags.warning_count(), 1);
        assert_eq!(diags.len(), 2);
    }
}
