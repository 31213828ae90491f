use std::error;
use std::fmt;

/// Position of a token in the script source, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLocation {
    pub line: u32,
    pub column: u32,
}

impl SourceLocation {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// What went wrong during tokenizing, parsing, or evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptErrorKind {
    Syntax,
    TypeMismatch,
    UndefinedSymbol,
    ConstViolation,
    Redefinition,
    SignatureMismatch,
    Range,
}

impl fmt::Display for ScriptErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Syntax => "SyntaxError",
            Self::TypeMismatch => "TypeMismatch",
            Self::UndefinedSymbol => "UndefinedSymbol",
            Self::ConstViolation => "ConstViolation",
            Self::Redefinition => "Redefinition",
            Self::SignatureMismatch => "SignatureMismatch",
            Self::Range => "RangeError",
        };
        write!(f, "{name}")
    }
}

/// A script error with an optional source location.
///
/// Errors raised inside value operations carry no location; the interpreter
/// attaches the offending token's position on the way out.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptError {
    pub kind: ScriptErrorKind,
    pub message: String,
    pub location: Option<SourceLocation>,
}

impl ScriptError {
    pub fn new(kind: ScriptErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            location: None,
        }
    }

    pub fn at(kind: ScriptErrorKind, message: impl Into<String>, location: SourceLocation) -> Self {
        Self {
            kind,
            message: message.into(),
            location: Some(location),
        }
    }

    /// Attach a location if the error does not already carry one.
    pub fn with_location(mut self, location: SourceLocation) -> Self {
        if self.location.is_none() {
            self.location = Some(location);
        }
        self
    }
}

impl fmt::Display for ScriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.location {
            Some(loc) => write!(f, "{} at {}: {}", self.kind, loc, self.message),
            None => write!(f, "{}: {}", self.kind, self.message),
        }
    }
}

impl error::Error for ScriptError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_with_location() {
        let err = ScriptError::at(
            ScriptErrorKind::UndefinedSymbol,
            "undefined identifier foo",
            SourceLocation::new(3, 14),
        );
        assert_eq!(
            err.to_string(),
            "UndefinedSymbol at 3:14: undefined identifier foo"
        );
    }

    #[test]
    fn test_with_location_keeps_existing() {
        let err = ScriptError::at(ScriptErrorKind::Syntax, "bad", SourceLocation::new(1, 1));
        let err = err.with_location(SourceLocation::new(9, 9));
        assert_eq!(err.location, Some(SourceLocation::new(1, 1)));
    }
}
