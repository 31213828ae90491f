use germline_script::ScriptError;
use std::error;
use std::fmt;

/// Errors raised by the engine and its readers.
#[derive(Debug)]
pub enum SimError {
    /// A parameter-file row failed its grammar; carries the offending line
    /// and, when known, the section's canonical syntax block.
    InvalidInput {
        message: String,
        usage: Option<&'static str>,
    },
    /// A configuration that parses but is semantically inconsistent.
    Config(String),
    /// An integer out of range for a generation, position, id, or size.
    Range { what: &'static str, value: i64 },
    /// A modify-child callback rejected every retry for one offspring.
    CallbackLimit { callback: &'static str },
    /// A script error, attributed to the named context when raised inside a
    /// callback.
    Script {
        context: &'static str,
        source: ScriptError,
    },
    Io(std::io::Error),
}

impl SimError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
            usage: None,
        }
    }

    pub fn invalid_input_with_usage(message: impl Into<String>, usage: &'static str) -> Self {
        Self::InvalidInput {
            message: message.into(),
            usage: Some(usage),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn script(context: &'static str, source: ScriptError) -> Self {
        Self::Script { context, source }
    }
}

impl fmt::Display for SimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidInput { message, .. } => {
                write!(f, "InvalidInput (parameter file): {message}")
            }
            Self::Config(message) => write!(f, "ConfigError: {message}"),
            Self::Range { what, value } => {
                write!(f, "RangeError: value {value} for {what} is out of range")
            }
            Self::CallbackLimit { callback } => write!(
                f,
                "CallbackLimit: {callback}() callback rejected every candidate child"
            ),
            Self::Script { context, source } => write!(f, "error in {context}: {source}"),
            Self::Io(e) => write!(f, "IO error: {e}"),
        }
    }
}

impl error::Error for SimError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Self::Script { source, .. } => Some(source),
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for SimError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = SimError::config("sum of immigration fractions into p1 is 1.2");
        assert!(err.to_string().starts_with("ConfigError:"));

        let err = SimError::Range {
            what: "a subpopulation size",
            value: -3,
        };
        assert!(err.to_string().contains("-3"));

        let err = SimError::CallbackLimit {
            callback: "modifyChild",
        };
        assert!(err.to_string().contains("modifyChild"));
    }
}
