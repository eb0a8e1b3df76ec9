pub mod ansi;
pub mod json;
pub mod registry;

use crate::loader::LoadError;
use crate::vm::{ExecError, VmError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Severity {
    Error,
    #[allow(dead_code)] // forward infrastructure for non-fatal diagnostics
    Warning,
}

/// Where in the program a runtime diagnostic was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub instruction: usize,
    /// Source line, 0 when unknown.
    pub line: u32,
}

#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: Option<&'static str>,
    pub message: String,
    pub location: Option<Location>,
    pub notes: Vec<String>,
    pub suggestion: Option<String>,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>) -> Self {
        Diagnostic {
            severity: Severity::Error,
            code: None,
            message: message.into(),
            location: None,
            notes: Vec::new(),
            suggestion: None,
        }
    }

    #[allow(dead_code)] // forward infrastructure for non-fatal diagnostics
    pub fn warning(message: impl Into<String>) -> Self {
        Diagnostic { severity: Severity::Warning, ..Diagnostic::error(message) }
    }

    pub fn with_code(mut self, code: &'static str) -> Self {
        self.code = Some(code);
        self
    }

    pub fn at(mut self, instruction: usize, line: u32) -> Self {
        self.location = Some(Location { instruction, line });
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

// ---- From impls for error types ----

impl From<&LoadError> for Diagnostic {
    fn from(e: &LoadError) -> Self {
        let d = Diagnostic::error(e.to_string()).with_code(e.code());
        match e {
            LoadError::BadMagic { .. } => d.with_note("the file was not produced by a compatible compiler"),
            LoadError::UnknownOpcode { .. } | LoadError::UnknownOperandKind { .. } => {
                d.with_note("the program may have been compiled for a different VM version")
            }
            _ => d,
        }
    }
}

impl From<&VmError> for Diagnostic {
    fn from(e: &VmError) -> Self {
        let d = Diagnostic::error(e.to_string()).with_code(e.code());
        match e {
            VmError::UnknownLibraryFunction { suggestion: Some(name), .. } => {
                d.with_suggestion(format!("did you mean '{name}'?"))
            }
            VmError::KeyNotFound { .. } => {
                d.with_suggestion("run with --lenient-keys to read missing keys as nil")
            }
            VmError::StackOverflow => d.with_note("the program may recurse without bound"),
            _ => d,
        }
    }
}

impl From<&ExecError> for Diagnostic {
    fn from(e: &ExecError) -> Self {
        Diagnostic::from(&e.error).at(e.pc, e.line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostic_error_builder() {
        let d = Diagnostic::error("something went wrong");
        assert_eq!(d.severity, Severity::Error);
        assert_eq!(d.message, "something went wrong");
        assert!(d.code.is_none());
        assert!(d.location.is_none());
        assert!(d.notes.is_empty());
        assert!(d.suggestion.is_none());
    }

    #[test]
    fn diagnostic_warning_builder() {
        let d = Diagnostic::warning("assigning from undefined content");
        assert_eq!(d.severity, Severity::Warning);
        assert_eq!(d.message, "assigning from undefined content");
    }

    #[test]
    fn diagnostic_with_note_and_suggestion() {
        let d = Diagnostic::error("type mismatch")
            .with_note("compared a string with a number")
            .with_suggestion("convert with strtonum");
        assert_eq!(d.notes, vec!["compared a string with a number"]);
        assert_eq!(d.suggestion.as_deref(), Some("convert with strtonum"));
    }

    #[test]
    fn from_load_error() {
        let e = LoadError::BadMagic { found: "42".to_string() };
        let d = Diagnostic::from(&e);
        assert_eq!(d.code, Some("AVM-L002"));
        assert!(d.message.contains("42"));
        assert_eq!(d.notes.len(), 1);
        assert!(d.location.is_none());
    }

    #[test]
    fn from_exec_error_carries_location() {
        let e = ExecError { pc: 7, line: 0, error: VmError::TypeMismatch { left: "string", right: "number" } };
        let d = Diagnostic::from(&e);
        assert_eq!(d.code, Some("AVM-R003"));
        assert_eq!(d.location, Some(Location { instruction: 7, line: 0 }));
        assert!(d.message.contains("string vs number"));
    }

    #[test]
    fn from_unknown_library_function_suggests() {
        let e = VmError::UnknownLibraryFunction { name: "prnt".into(), suggestion: Some("print".into()) };
        let d = Diagnostic::from(&e);
        assert_eq!(d.suggestion.as_deref(), Some("did you mean 'print'?"));

        let e = VmError::UnknownLibraryFunction { name: "zzz".into(), suggestion: None };
        assert!(Diagnostic::from(&e).suggestion.is_none());
    }

    #[test]
    fn every_code_is_registered() {
        let errors = [
            VmError::NotANumber { op: crate::bytecode::Opcode::Add, type_name: "nil" }.code(),
            VmError::StackOverflow.code(),
            VmError::Output(std::io::Error::other("x")).code(),
            LoadError::Truncated { what: "opcode" }.code(),
            LoadError::UnknownOperandKind { code: 40, index: 0 }.code(),
        ];
        for code in errors {
            assert!(registry::lookup(code).is_some(), "{code} missing from registry");
        }
    }
}
