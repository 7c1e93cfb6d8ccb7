//! Advisory warnings collected during a generation run.
//!
//! Nothing in here aborts a run. Every diagnostic is logged through the `log`
//! facade as it is recorded and kept in a [`Diagnostics`] list that is handed
//! back to the caller next to the model.

use log::warn;
use std::fmt;

/// What went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
    /// An endpoint declares more than one request body; the first one is kept.
    MultipleBodies,
    /// An array-shaped parameter outside the body; it is kept in the model.
    ArrayInNonBodyLocation,
    /// A generic parameter has no binding at the use site.
    UnresolvedGeneric,
    /// A type name is neither a known primitive nor declared in the sources.
    UnknownType,
    /// A simple type name declared in several modules, none of them in
    /// scope at the use site.
    AmbiguousType,
    /// A route element without any usable HTTP method; it is skipped.
    MissingHttpMethod,
    /// The same path and method are declared twice; the first one is kept.
    DuplicateOperation,
    /// Nested type resolution went too deep; the shape is left unknown.
    RecursionLimit,
}

impl DiagnosticKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticKind::MultipleBodies => "multiple-bodies",
            DiagnosticKind::ArrayInNonBodyLocation => "array-in-non-body-location",
            DiagnosticKind::UnresolvedGeneric => "unresolved-generic",
            DiagnosticKind::UnknownType => "unknown-type",
            DiagnosticKind::AmbiguousType => "ambiguous-type",
            DiagnosticKind::MissingHttpMethod => "missing-http-method",
            DiagnosticKind::DuplicateOperation => "duplicate-operation",
            DiagnosticKind::RecursionLimit => "recursion-limit",
        }
    }
}

/// A single warning, naming the offending element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    /// Route, parameter, field or type the warning is about.
    pub element: String,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.kind.as_str(), self.element, self.message)
    }
}

#[derive(Debug, Default, Clone)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a warning. Exact repeats (same kind, element and message) are
    /// only kept once.
    pub fn warn(
        &mut self,
        kind: DiagnosticKind,
        element: impl Into<String>,
        message: impl Into<String>,
    ) {
        let diagnostic = Diagnostic {
            kind,
            element: element.into(),
            message: message.into(),
        };
        if self.entries.contains(&diagnostic) {
            return;
        }
        warn!("{}", diagnostic);
        self.entries.push(diagnostic);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    pub fn of_kind(&self, kind: DiagnosticKind) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter().filter(move |d| d.kind == kind)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeated_warning_is_recorded_once() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.warn(DiagnosticKind::UnknownType, "Account.owner", "type `User` not found");
        diagnostics.warn(DiagnosticKind::UnknownType, "Account.owner", "type `User` not found");
        diagnostics.warn(DiagnosticKind::UnknownType, "Order.owner", "type `User` not found");

        assert_eq!(diagnostics.len(), 2);
        assert_eq!(diagnostics.of_kind(DiagnosticKind::UnknownType).count(), 2);
        assert_eq!(diagnostics.of_kind(DiagnosticKind::MultipleBodies).count(), 0);
    }

    #[test]
    fn test_display_names_kind_and_element() {
        let diagnostic = Diagnostic {
            kind: DiagnosticKind::MultipleBodies,
            element: "POST /accounts".to_string(),
            message: "only the first body is kept".to_string(),
        };
        assert_eq!(
            diagnostic.to_string(),
            "[multiple-bodies] POST /accounts: only the first body is kept"
        );
    }
}
