use thiserror::Error;

/// Where in the source a compile diagnostic points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorLocation {
    /// The offending token is end of input.
    AtEnd,
    /// The offending token's lexeme.
    AtLexeme(String),
    /// Lexical errors: the token text is the message itself.
    Unlocated,
}

impl std::fmt::Display for ErrorLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorLocation::AtEnd => write!(f, " at end"),
            ErrorLocation::AtLexeme(lexeme) => write!(f, " at '{}'", lexeme),
            ErrorLocation::Unlocated => Ok(()),
        }
    }
}

/// One reported compile error.
///
/// Formats as `[line L] Error at 'x': message`, the line-oriented form
/// external tools expect.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("[line {line}] Error{location}: {message}")]
pub struct Diagnostic {
    pub line: usize,
    pub location: ErrorLocation,
    pub message: String,
}

impl Diagnostic {
    pub fn new(line: usize, location: ErrorLocation, message: impl Into<String>) -> Self {
        Diagnostic {
            line,
            location,
            message: message.into(),
        }
    }
}

/// Failed compilation.
///
/// Carries every diagnostic reported during the pass. No chunk is produced
/// when this is returned, even if bytecode was partially emitted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", render(.diagnostics))]
pub struct CompileError {
    pub diagnostics: Vec<Diagnostic>,
}

impl CompileError {
    pub fn new(diagnostics: Vec<Diagnostic>) -> Self {
        CompileError { diagnostics }
    }
}

fn render(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .map(Diagnostic::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}
