//! The polymorphic vector value model.
//!
//! Every value is a length-carrying vector tagged with one of six kinds.
//! Binary operators work elementwise: both operands must be length-1 or of
//! equal length, and a length-1 operand broadcasts. `NULL` propagates through
//! arithmetic and comparison (see DESIGN.md for the rationale).

use crate::error::{ScriptError, ScriptErrorKind};
use std::fmt;
use std::rc::Rc;

/// An engine-side object exposed to scripts.
///
/// Implementations are snapshot proxies: property reads observe the state the
/// engine captured when it built the proxy, and mutating methods enqueue
/// actions the engine applies when evaluation returns.
pub trait ScriptObject {
    fn type_name(&self) -> &'static str;
    fn get_property(&self, name: &str) -> Result<Value, ScriptError>;
    fn call_method(&self, name: &str, args: &[Value]) -> Result<Value, ScriptError>;
}

/// The kind tag of a [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ValueKind {
    Null,
    Logical,
    Integer,
    Float,
    Str,
    Object,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Null => "NULL",
            ValueKind::Logical => "logical",
            ValueKind::Integer => "integer",
            ValueKind::Float => "float",
            ValueKind::Str => "string",
            ValueKind::Object => "object",
        };
        write!(f, "{name}")
    }
}

#[derive(Clone)]
pub enum Value {
    Null,
    Logical(Vec<bool>),
    Integer(Vec<i64>),
    Float(Vec<f64>),
    Str(Vec<String>),
    Object(Vec<Rc<dyn ScriptObject>>),
}

impl Value {
    pub fn logical(v: bool) -> Self {
        Value::Logical(vec![v])
    }

    pub fn integer(v: i64) -> Self {
        Value::Integer(vec![v])
    }

    pub fn float(v: f64) -> Self {
        Value::Float(vec![v])
    }

    pub fn string(v: impl Into<String>) -> Self {
        Value::Str(vec![v.into()])
    }

    pub fn object(v: Rc<dyn ScriptObject>) -> Self {
        Value::Object(vec![v])
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Null => ValueKind::Null,
            Value::Logical(_) => ValueKind::Logical,
            Value::Integer(_) => ValueKind::Integer,
            Value::Float(_) => ValueKind::Float,
            Value::Str(_) => ValueKind::Str,
            Value::Object(_) => ValueKind::Object,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Value::Null => 0,
            Value::Logical(v) => v.len(),
            Value::Integer(v) => v.len(),
            Value::Float(v) => v.len(),
            Value::Str(v) => v.len(),
            Value::Object(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Integer(_) | Value::Float(_))
    }

    /// Element as f64, coercing logical and integer upward.
    pub fn element_as_float(&self, index: usize) -> Result<f64, ScriptError> {
        match self {
            Value::Logical(v) => Ok(if v[index] { 1.0 } else { 0.0 }),
            Value::Integer(v) => Ok(v[index] as f64),
            Value::Float(v) => Ok(v[index]),
            other => Err(type_mismatch(format!(
                "cannot use a value of type {} as a number",
                other.kind()
            ))),
        }
    }

    /// Element as i64, coercing logical upward; floats are not truncated.
    pub fn element_as_integer(&self, index: usize) -> Result<i64, ScriptError> {
        match self {
            Value::Logical(v) => Ok(if v[index] { 1 } else { 0 }),
            Value::Integer(v) => Ok(v[index]),
            other => Err(type_mismatch(format!(
                "cannot use a value of type {} as an integer",
                other.kind()
            ))),
        }
    }

    /// Element as bool, coercing numerics (non-zero is true).
    pub fn element_as_logical(&self, index: usize) -> Result<bool, ScriptError> {
        match self {
            Value::Logical(v) => Ok(v[index]),
            Value::Integer(v) => Ok(v[index] != 0),
            Value::Float(v) => Ok(v[index] != 0.0),
            other => Err(type_mismatch(format!(
                "cannot use a value of type {} as a logical",
                other.kind()
            ))),
        }
    }

    /// The printed form of one element: logicals render as `T`/`F`.
    pub fn element_display(&self, index: usize) -> String {
        match self {
            Value::Null => "NULL".to_string(),
            Value::Logical(v) => (if v[index] { "T" } else { "F" }).to_string(),
            Value::Integer(v) => v[index].to_string(),
            Value::Float(v) => format!("{}", v[index]),
            Value::Str(v) => v[index].clone(),
            Value::Object(v) => format!("<{}>", v[index].type_name()),
        }
    }

    /// One-element slice of this vector as a fresh singleton value.
    pub fn element(&self, index: usize) -> Value {
        match self {
            Value::Null => Value::Null,
            Value::Logical(v) => Value::logical(v[index]),
            Value::Integer(v) => Value::integer(v[index]),
            Value::Float(v) => Value::float(v[index]),
            Value::Str(v) => Value::string(v[index].clone()),
            Value::Object(v) => Value::object(Rc::clone(&v[index])),
        }
    }

    /// The single logical a condition must evaluate to.
    pub fn condition(&self) -> Result<bool, ScriptError> {
        if self.len() != 1 {
            return Err(type_mismatch(format!(
                "condition must be a singleton, not length {}",
                self.len()
            )));
        }
        self.element_as_logical(0)
    }

    /// Subscript with an integer index vector (0-based) or a logical mask.
    pub fn subscript(&self, index: &Value) -> Result<Value, ScriptError> {
        match index {
            Value::Logical(mask) => {
                if mask.len() != self.len() {
                    return Err(type_mismatch(format!(
                        "logical subscript of length {} applied to a vector of length {}",
                        mask.len(),
                        self.len()
                    )));
                }
                let keep: Vec<usize> = mask
                    .iter()
                    .enumerate()
                    .filter_map(|(i, &m)| m.then_some(i))
                    .collect();
                self.gather(&keep)
            }
            Value::Integer(indices) => {
                let mut keep = Vec::with_capacity(indices.len());
                for &i in indices {
                    if i < 0 || i as usize >= self.len() {
                        return Err(ScriptError::new(
                            ScriptErrorKind::Range,
                            format!("subscript {i} out of range for a vector of length {}", self.len()),
                        ));
                    }
                    keep.push(i as usize);
                }
                self.gather(&keep)
            }
            other => Err(type_mismatch(format!(
                "subscript must be integer or logical, not {}",
                other.kind()
            ))),
        }
    }

    fn gather(&self, indices: &[usize]) -> Result<Value, ScriptError> {
        Ok(match self {
            Value::Null => Value::Null,
            Value::Logical(v) => Value::Logical(indices.iter().map(|&i| v[i]).collect()),
            Value::Integer(v) => Value::Integer(indices.iter().map(|&i| v[i]).collect()),
            Value::Float(v) => Value::Float(indices.iter().map(|&i| v[i]).collect()),
            Value::Str(v) => Value::Str(indices.iter().map(|&i| v[i].clone()).collect()),
            Value::Object(v) => Value::Object(indices.iter().map(|&i| Rc::clone(&v[i])).collect()),
        })
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}) {self}", self.kind())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            return write!(f, "NULL");
        }
        for i in 0..self.len() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{}", self.element_display(i))?;
        }
        Ok(())
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Logical(a), Value::Logical(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .zip(b.iter())
                        .all(|(x, y)| Rc::ptr_eq(x, y))
            }
            _ => false,
        }
    }
}

fn type_mismatch(message: impl Into<String>) -> ScriptError {
    ScriptError::new(ScriptErrorKind::TypeMismatch, message)
}

/// Resolve the broadcast length of two operands.
fn broadcast_len(op: &str, a: usize, b: usize) -> Result<usize, ScriptError> {
    if a == b {
        Ok(a)
    } else if a == 1 {
        Ok(b)
    } else if b == 1 {
        Ok(a)
    } else {
        Err(type_mismatch(format!(
            "operator {op} applied to vectors of unequal lengths ({a} and {b})"
        )))
    }
}

#[inline]
fn pick(i: usize, len: usize) -> usize {
    if len == 1 {
        0
    } else {
        i
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Mod => "%",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::And => "&",
            Self::Or => "|",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Plus,
    Minus,
    Not,
}

pub fn binary_op(op: BinaryOp, lhs: &Value, rhs: &Value) -> Result<Value, ScriptError> {
    // NULL propagates through every binary operator
    if lhs.is_null() || rhs.is_null() {
        return Ok(Value::Null);
    }
    match op {
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => {
            arithmetic(op, lhs, rhs)
        }
        BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            comparison(op, lhs, rhs)
        }
        BinaryOp::And | BinaryOp::Or => logical_op(op, lhs, rhs),
    }
}

fn arithmetic(op: BinaryOp, lhs: &Value, rhs: &Value) -> Result<Value, ScriptError> {
    let symbol = op.symbol();

    // string operands: only `+`, as component-wise concatenation
    if lhs.kind() == ValueKind::Str || rhs.kind() == ValueKind::Str {
        if op != BinaryOp::Add {
            return Err(type_mismatch(format!(
                "operator {symbol} is not defined for string operands"
            )));
        }
        let len = broadcast_len(symbol, lhs.len(), rhs.len())?;
        let mut out = Vec::with_capacity(len);
        for i in 0..len {
            let mut s = lhs.element_display(pick(i, lhs.len()));
            s.push_str(&rhs.element_display(pick(i, rhs.len())));
            out.push(s);
        }
        return Ok(Value::Str(out));
    }

    if lhs.kind() == ValueKind::Object || rhs.kind() == ValueKind::Object {
        return Err(type_mismatch(format!(
            "operator {symbol} is not defined for object operands"
        )));
    }

    // arithmetic on pure logicals is an error; a logical coerces to 0/1 only
    // when paired with a numeric operand
    if lhs.kind() == ValueKind::Logical && rhs.kind() == ValueKind::Logical {
        return Err(type_mismatch(format!(
            "operator {symbol} requires at least one numeric operand"
        )));
    }

    let len = broadcast_len(symbol, lhs.len(), rhs.len())?;
    let integer_result = matches!(op, BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul)
        && lhs.kind() != ValueKind::Float
        && rhs.kind() != ValueKind::Float;

    if integer_result {
        let mut out = Vec::with_capacity(len);
        for i in 0..len {
            let a = lhs.element_as_integer(pick(i, lhs.len()))?;
            let b = rhs.element_as_integer(pick(i, rhs.len()))?;
            let r = match op {
                BinaryOp::Add => a.checked_add(b),
                BinaryOp::Sub => a.checked_sub(b),
                BinaryOp::Mul => a.checked_mul(b),
                _ => unreachable!(),
            }
            .ok_or_else(|| {
                ScriptError::new(
                    ScriptErrorKind::Range,
                    format!("integer overflow in {a} {symbol} {b}"),
                )
            })?;
            out.push(r);
        }
        Ok(Value::Integer(out))
    } else {
        let mut out = Vec::with_capacity(len);
        for i in 0..len {
            let a = lhs.element_as_float(pick(i, lhs.len()))?;
            let b = rhs.element_as_float(pick(i, rhs.len()))?;
            out.push(match op {
                BinaryOp::Add => a + b,
                BinaryOp::Sub => a - b,
                BinaryOp::Mul => a * b,
                BinaryOp::Div => a / b,
                BinaryOp::Mod => a % b,
                _ => unreachable!(),
            });
        }
        Ok(Value::Float(out))
    }
}

fn comparison(op: BinaryOp, lhs: &Value, rhs: &Value) -> Result<Value, ScriptError> {
    let symbol = op.symbol();
    let len = broadcast_len(symbol, lhs.len(), rhs.len())?;

    if lhs.kind() == ValueKind::Object || rhs.kind() == ValueKind::Object {
        // objects compare by identity, and only for equality
        let (Value::Object(a), Value::Object(b)) = (lhs, rhs) else {
            return Err(type_mismatch(format!(
                "operator {symbol} cannot compare object and non-object operands"
            )));
        };
        if !matches!(op, BinaryOp::Eq | BinaryOp::Ne) {
            return Err(type_mismatch(format!(
                "operator {symbol} is not defined for object operands"
            )));
        }
        let mut out = Vec::with_capacity(len);
        for i in 0..len {
            let same = Rc::ptr_eq(&a[pick(i, a.len())], &b[pick(i, b.len())]);
            out.push(if op == BinaryOp::Eq { same } else { !same });
        }
        return Ok(Value::Logical(out));
    }

    // promote to the wider of the two kinds and compare there
    let string_compare = lhs.kind() == ValueKind::Str || rhs.kind() == ValueKind::Str;
    let float_compare = lhs.kind() == ValueKind::Float || rhs.kind() == ValueKind::Float;

    let mut out = Vec::with_capacity(len);
    for i in 0..len {
        let li = pick(i, lhs.len());
        let ri = pick(i, rhs.len());
        let ordering = if string_compare {
            lhs.element_display(li).cmp(&rhs.element_display(ri))
        } else if float_compare {
            let a = lhs.element_as_float(li)?;
            let b = rhs.element_as_float(ri)?;
            a.partial_cmp(&b).ok_or_else(|| {
                type_mismatch(format!("operator {symbol} applied to NAN has no ordering"))
            })?
        } else {
            lhs.element_as_integer(li)?.cmp(&rhs.element_as_integer(ri)?)
        };
        out.push(match op {
            BinaryOp::Eq => ordering.is_eq(),
            BinaryOp::Ne => !ordering.is_eq(),
            BinaryOp::Lt => ordering.is_lt(),
            BinaryOp::Le => ordering.is_le(),
            BinaryOp::Gt => ordering.is_gt(),
            BinaryOp::Ge => ordering.is_ge(),
            _ => unreachable!(),
        });
    }
    Ok(Value::Logical(out))
}

fn logical_op(op: BinaryOp, lhs: &Value, rhs: &Value) -> Result<Value, ScriptError> {
    let len = broadcast_len(op.symbol(), lhs.len(), rhs.len())?;
    let mut out = Vec::with_capacity(len);
    for i in 0..len {
        let a = lhs.element_as_logical(pick(i, lhs.len()))?;
        let b = rhs.element_as_logical(pick(i, rhs.len()))?;
        out.push(match op {
            BinaryOp::And => a && b,
            BinaryOp::Or => a || b,
            _ => unreachable!(),
        });
    }
    Ok(Value::Logical(out))
}

pub fn unary_op(op: UnaryOp, operand: &Value) -> Result<Value, ScriptError> {
    if operand.is_null() {
        return Ok(Value::Null);
    }
    match op {
        UnaryOp::Plus => match operand {
            Value::Integer(_) | Value::Float(_) => Ok(operand.clone()),
            other => Err(type_mismatch(format!(
                "unary + requires a numeric operand, not {}",
                other.kind()
            ))),
        },
        UnaryOp::Minus => match operand {
            Value::Integer(v) => {
                let mut out = Vec::with_capacity(v.len());
                for &x in v {
                    out.push(x.checked_neg().ok_or_else(|| {
                        ScriptError::new(
                            ScriptErrorKind::Range,
                            format!("integer overflow negating {x}"),
                        )
                    })?);
                }
                Ok(Value::Integer(out))
            }
            Value::Float(v) => Ok(Value::Float(v.iter().map(|x| -x).collect())),
            other => Err(type_mismatch(format!(
                "unary - requires a numeric operand, not {}",
                other.kind()
            ))),
        },
        UnaryOp::Not => {
            let mut out = Vec::with_capacity(operand.len());
            for i in 0..operand.len() {
                out.push(!operand.element_as_logical(i)?);
            }
            Ok(Value::Logical(out))
        }
    }
}

/// The `:` range operator: singleton endpoints, unit step, inclusive, and
/// counting down when `from > to`. Integer endpoints give an integer vector.
pub fn range(lhs: &Value, rhs: &Value) -> Result<Value, ScriptError> {
    if lhs.is_null() || rhs.is_null() {
        return Ok(Value::Null);
    }
    if lhs.len() != 1 || rhs.len() != 1 {
        return Err(type_mismatch(
            "operator : requires singleton operands".to_string(),
        ));
    }
    if !lhs.is_numeric() || !rhs.is_numeric() {
        return Err(type_mismatch(format!(
            "operator : requires numeric operands, not {} and {}",
            lhs.kind(),
            rhs.kind()
        )));
    }

    const MAX_RANGE: i64 = 100_000_000;
    if lhs.kind() == ValueKind::Integer && rhs.kind() == ValueKind::Integer {
        let from = lhs.element_as_integer(0)?;
        let to = rhs.element_as_integer(0)?;
        if (from - to).abs() >= MAX_RANGE {
            return Err(ScriptError::new(
                ScriptErrorKind::Range,
                format!("range {from}:{to} is too large"),
            ));
        }
        let out: Vec<i64> = if from <= to {
            (from..=to).collect()
        } else {
            (to..=from).rev().collect()
        };
        Ok(Value::Integer(out))
    } else {
        let from = lhs.element_as_float(0)?;
        let to = rhs.element_as_float(0)?;
        if !from.is_finite() || !to.is_finite() || (from - to).abs() >= MAX_RANGE as f64 {
            return Err(ScriptError::new(
                ScriptErrorKind::Range,
                format!("range {from}:{to} is not representable"),
            ));
        }
        let mut out = Vec::new();
        let mut x = from;
        if from <= to {
            while x <= to {
                out.push(x);
                x += 1.0;
            }
        } else {
            while x >= to {
                out.push(x);
                x -= 1.0;
            }
        }
        Ok(Value::Float(out))
    }
}

/// Concatenate values under the binary-operator promotion rules.
///
/// `NULL` arguments vanish; an all-`NULL` (or empty) call yields `NULL`.
pub fn concatenate(parts: &[Value]) -> Result<Value, ScriptError> {
    let live: Vec<&Value> = parts.iter().filter(|v| !v.is_null()).collect();
    if live.is_empty() {
        return Ok(Value::Null);
    }

    if live.iter().any(|v| v.kind() == ValueKind::Object) {
        let first_type = match live[0] {
            Value::Object(v) if !v.is_empty() => v[0].type_name(),
            _ => {
                return Err(type_mismatch(
                    "cannot mix object and non-object values in c()".to_string(),
                ))
            }
        };
        let mut out: Vec<Rc<dyn ScriptObject>> = Vec::new();
        for part in &live {
            let Value::Object(v) = part else {
                return Err(type_mismatch(
                    "cannot mix object and non-object values in c()".to_string(),
                ));
            };
            for obj in v {
                if obj.type_name() != first_type {
                    return Err(type_mismatch(format!(
                        "cannot mix object types {} and {} in c()",
                        first_type,
                        obj.type_name()
                    )));
                }
                out.push(Rc::clone(obj));
            }
        }
        return Ok(Value::Object(out));
    }

    let target = live.iter().map(|v| v.kind()).max().expect("non-empty");
    match target {
        ValueKind::Str => {
            let mut out = Vec::new();
            for part in &live {
                for i in 0..part.len() {
                    out.push(part.element_display(i));
                }
            }
            Ok(Value::Str(out))
        }
        ValueKind::Float => {
            let mut out = Vec::new();
            for part in &live {
                for i in 0..part.len() {
                    out.push(part.element_as_float(i)?);
                }
            }
            Ok(Value::Float(out))
        }
        ValueKind::Integer => {
            let mut out = Vec::new();
            for part in &live {
                for i in 0..part.len() {
                    out.push(part.element_as_integer(i)?);
                }
            }
            Ok(Value::Integer(out))
        }
        ValueKind::Logical => {
            let mut out = Vec::new();
            for part in &live {
                for i in 0..part.len() {
                    out.push(part.element_as_logical(i)?);
                }
            }
            Ok(Value::Logical(out))
        }
        ValueKind::Null | ValueKind::Object => unreachable!("filtered above"),
    }
}
