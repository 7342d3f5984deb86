//! Diagnostic collection shared by every compiler pass.
//!
//! Errors and warnings are counted, logged and kept so the caller can
//! inspect them after the run. Each ceiling in [`Limits`] escalates to a
//! fatal [`Error`] on its own.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::config::Limits;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Note,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Note => "Note",
            Severity::Warning => "Warning",
            Severity::Error => "Error",
        })
    }
}

/// A file and line in the help source, attributed to the included file that
/// was actually being read.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceLocation {
    pub file: Arc<Path>,
    pub line: usize,
}

impl SourceLocation {
    pub fn new(file: Arc<Path>, line: usize) -> Self {
        Self { file, line }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.file.display(), self.line)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub location: Option<SourceLocation>,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some(loc) => write!(f, "{} {}: {}", self.severity, loc, self.message),
            None => write!(f, "{}: {}", self.severity, self.message),
        }
    }
}

/// Per-run diagnostic state.
#[derive(Debug)]
pub struct CompileContext {
    max_errors: usize,
    max_warnings: usize,
    errors: usize,
    warnings: usize,
    diagnostics: Vec<Diagnostic>,
}

impl CompileContext {
    pub fn new(limits: &Limits) -> Self {
        Self {
            max_errors: limits.max_errors,
            max_warnings: limits.max_warnings,
            errors: 0,
            warnings: 0,
            diagnostics: Vec::new(),
        }
    }

    pub fn error(&mut self, message: impl Into<String>) -> Result<()> {
        self.error_at(None, message)
    }

    /// Records an error. Reaching the error ceiling is fatal.
    pub fn error_at(
        &mut self,
        location: Option<&SourceLocation>,
        message: impl Into<String>,
    ) -> Result<()> {
        self.push(Severity::Error, location, message.into());
        self.errors += 1;
        if self.max_errors > 0 && self.errors >= self.max_errors {
            return Err(Error::TooManyErrors(self.errors));
        }
        Ok(())
    }

    pub fn warn(&mut self, message: impl Into<String>) -> Result<()> {
        self.warn_at(None, message)
    }

    /// Records a warning. Reaching the warning ceiling is fatal.
    pub fn warn_at(
        &mut self,
        location: Option<&SourceLocation>,
        message: impl Into<String>,
    ) -> Result<()> {
        self.push(Severity::Warning, location, message.into());
        self.warnings += 1;
        if self.max_warnings > 0 && self.warnings >= self.max_warnings {
            return Err(Error::TooManyWarnings(self.warnings));
        }
        Ok(())
    }

    pub fn note(&mut self, message: impl Into<String>) {
        self.push(Severity::Note, None, message.into());
    }

    fn push(&mut self, severity: Severity, location: Option<&SourceLocation>, message: String) {
        let diagnostic = Diagnostic {
            severity,
            location: location.cloned(),
            message,
        };
        match severity {
            Severity::Error => log::error!("{diagnostic}"),
            Severity::Warning => log::warn!("{diagnostic}"),
            Severity::Note => log::info!("{diagnostic}"),
        }
        self.diagnostics.push(diagnostic);
    }

    pub fn errors(&self) -> usize {
        self.errors
    }

    pub fn warnings(&self) -> usize {
        self.warnings
    }

    pub fn has_errors(&self) -> bool {
        self.errors > 0
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    /// Messages of every diagnostic with the given severity.
    pub fn messages(&self, severity: Severity) -> impl Iterator<Item = &str> {
        self.diagnostics
            .iter()
            .filter(move |d| d.severity == severity)
            .map(|d| d.message.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits(max_errors: usize, max_warnings: usize) -> Limits {
        Limits {
            max_errors,
            max_warnings,
            ..Limits::default()
        }
    }

    #[test]
    fn test_error_ceiling_is_fatal() {
        let mut ctx = CompileContext::new(&limits(3, 0));
        assert!(ctx.error("one").is_ok());
        assert!(ctx.error("two").is_ok());
        assert!(matches!(ctx.error("three"), Err(Error::TooManyErrors(3))));
        assert_eq!(ctx.errors(), 3);
    }

    #[test]
    fn test_zero_ceiling_never_stops() {
        let mut ctx = CompileContext::new(&limits(0, 0));
        for _ in 0..100 {
            ctx.warn("noisy").unwrap();
        }
        assert_eq!(ctx.warnings(), 100);
        assert!(!ctx.has_errors());
    }

    #[test]
    fn test_display_carries_location() {
        let mut ctx = CompileContext::new(&limits(0, 0));
        let loc = SourceLocation::new(Arc::from(Path::new("help2.src")), 17);
        ctx.error_at(Some(&loc), "Label \"x\" already exists").unwrap();
        assert_eq!(
            ctx.diagnostics()[0].to_string(),
            "Error help2.src 17: Label \"x\" already exists"
        );
    }

    #[test]
    fn test_notes_are_not_counted() {
        let mut ctx = CompileContext::new(&limits(1, 1));
        ctx.note("header changed");
        assert_eq!(ctx.errors(), 0);
        assert_eq!(ctx.warnings(), 0);
        assert_eq!(ctx.messages(Severity::Note).count(), 1);
    }
}
