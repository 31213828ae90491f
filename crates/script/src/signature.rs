//! Call signatures for builtins and user-defined functions.
//!
//! A signature declares, for each parameter, the set of value kinds it
//! accepts plus optional/singleton modifiers, and the mask of kinds the call
//! may return. Dispatch checks the signature before the body runs and fails
//! with `SignatureMismatch` naming the function.

use crate::error::{ScriptError, ScriptErrorKind};
use crate::value::{Value, ValueKind};
use std::fmt;

/// A bitmask over value kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeMask(u8);

impl TypeMask {
    pub const NULL: TypeMask = TypeMask(1);
    pub const LOGICAL: TypeMask = TypeMask(2);
    pub const INTEGER: TypeMask = TypeMask(4);
    pub const FLOAT: TypeMask = TypeMask(8);
    pub const STRING: TypeMask = TypeMask(16);
    pub const OBJECT: TypeMask = TypeMask(32);

    pub const NUMERIC: TypeMask = TypeMask(4 | 8);
    pub const ANY_BUT_NULL: TypeMask = TypeMask(2 | 4 | 8 | 16 | 32);
    pub const ANY: TypeMask = TypeMask(63);

    pub const fn union(self, other: TypeMask) -> TypeMask {
        TypeMask(self.0 | other.0)
    }

    pub fn admits(self, kind: ValueKind) -> bool {
        let bit = match kind {
            ValueKind::Null => Self::NULL.0,
            ValueKind::Logical => Self::LOGICAL.0,
            ValueKind::Integer => Self::INTEGER.0,
            ValueKind::Float => Self::FLOAT.0,
            ValueKind::Str => Self::STRING.0,
            ValueKind::Object => Self::OBJECT.0,
        };
        self.0 & bit != 0
    }
}

impl fmt::Display for TypeMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (mask, name) in [
            (Self::NULL, "NULL"),
            (Self::LOGICAL, "logical"),
            (Self::INTEGER, "integer"),
            (Self::FLOAT, "float"),
            (Self::STRING, "string"),
            (Self::OBJECT, "object"),
        ] {
            if self.0 & mask.0 != 0 {
                if !first {
                    write!(f, "|")?;
                }
                write!(f, "{name}")?;
                first = false;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ArgSpec {
    pub name: String,
    pub mask: TypeMask,
    pub optional: bool,
    pub singleton: bool,
}

impl ArgSpec {
    pub fn required(name: impl Into<String>, mask: TypeMask) -> Self {
        Self {
            name: name.into(),
            mask,
            optional: false,
            singleton: false,
        }
    }

    pub fn optional(name: impl Into<String>, mask: TypeMask) -> Self {
        Self {
            name: name.into(),
            mask,
            optional: true,
            singleton: false,
        }
    }

    pub fn singleton(mut self) -> Self {
        self.singleton = true;
        self
    }
}

#[derive(Debug, Clone)]
pub struct FunctionSignature {
    pub name: String,
    pub args: Vec<ArgSpec>,
    pub returns: TypeMask,
    /// Trailing parameter repeats without bound (the `c(...)` shape).
    pub variadic: bool,
}

impl FunctionSignature {
    pub fn new(name: impl Into<String>, args: Vec<ArgSpec>, returns: TypeMask) -> Self {
        Self {
            name: name.into(),
            args,
            returns,
            variadic: false,
        }
    }

    pub fn variadic(mut self) -> Self {
        self.variadic = true;
        self
    }

    fn required_count(&self) -> usize {
        self.args.iter().filter(|a| !a.optional).count()
    }

    /// Check arity and per-argument kind/length constraints.
    pub fn check(&self, args: &[Value]) -> Result<(), ScriptError> {
        let required = self.required_count();
        if args.len() < required || (!self.variadic && args.len() > self.args.len()) {
            return Err(ScriptError::new(
                ScriptErrorKind::SignatureMismatch,
                format!(
                    "{}() requires {}{} argument(s), got {}",
                    self.name,
                    required,
                    if self.variadic {
                        " or more".to_string()
                    } else if self.args.len() > required {
                        format!(" to {}", self.args.len())
                    } else {
                        String::new()
                    },
                    args.len()
                ),
            ));
        }
        for (index, value) in args.iter().enumerate() {
            let spec = if index < self.args.len() {
                &self.args[index]
            } else {
                self.args.last().expect("variadic signature has a spec")
            };
            if !spec.mask.admits(value.kind()) {
                return Err(ScriptError::new(
                    ScriptErrorKind::SignatureMismatch,
                    format!(
                        "{}(): argument '{}' must be {}, got {}",
                        self.name,
                        spec.name,
                        spec.mask,
                        value.kind()
                    ),
                ));
            }
            if spec.singleton && value.len() != 1 {
                return Err(ScriptError::new(
                    ScriptErrorKind::SignatureMismatch,
                    format!(
                        "{}(): argument '{}' must be a singleton, got length {}",
                        self.name,
                        spec.name,
                        value.len()
                    ),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sig() -> FunctionSignature {
        FunctionSignature::new(
            "seq",
            vec![
                ArgSpec::required("from", TypeMask::NUMERIC).singleton(),
                ArgSpec::required("to", TypeMask::NUMERIC).singleton(),
                ArgSpec::optional("by", TypeMask::NUMERIC).singleton(),
            ],
            TypeMask::NUMERIC,
        )
    }

    #[test]
    fn test_arity() {
        let s = sig();
        assert!(s.check(&[Value::integer(1), Value::integer(5)]).is_ok());
        assert!(s
            .check(&[Value::integer(1), Value::integer(5), Value::integer(2)])
            .is_ok());
        assert!(s.check(&[Value::integer(1)]).is_err());
        assert!(s
            .check(&[
                Value::integer(1),
                Value::integer(2),
                Value::integer(3),
                Value::integer(4)
            ])
            .is_err());
    }

    #[test]
    fn test_kind_mask() {
        let s = sig();
        let err = s.check(&[Value::string("foo"), Value::integer(5)]).unwrap_err();
        assert_eq!(err.kind, ScriptErrorKind::SignatureMismatch);
        assert!(err.message.contains("seq"));
        assert!(err.message.contains("from"));
    }

    #[test]
    fn test_singleton() {
        let s = sig();
        let err = s
            .check(&[Value::Integer(vec![1, 2]), Value::integer(5)])
            .unwrap_err();
        assert_eq!(err.kind, ScriptErrorKind::SignatureMismatch);
    }

    #[test]
    fn test_variadic() {
        let s = FunctionSignature::new(
            "c",
            vec![ArgSpec::optional("values", TypeMask::ANY)],
            TypeMask::ANY,
        )
        .variadic();
        assert!(s.check(&[]).is_ok());
        assert!(s
            .check(&[Value::integer(1), Value::string("x"), Value::Null])
            .is_ok());
    }
}
