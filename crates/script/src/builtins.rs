//! Built-in functions of the language core.

use crate::error::{ScriptError, ScriptErrorKind};
use crate::signature::{ArgSpec, FunctionSignature, TypeMask};
use crate::value::{self, Value, ValueKind};
use std::collections::HashMap;

pub type BuiltinFn = fn(&[Value]) -> Result<Value, ScriptError>;

pub struct Builtin {
    pub signature: FunctionSignature,
    pub func: BuiltinFn,
}

/// The builtin registry, keyed by function name.
pub fn registry() -> HashMap<&'static str, Builtin> {
    let mut map: HashMap<&'static str, Builtin> = HashMap::new();
    let mut add = |name: &'static str, signature: FunctionSignature, func: BuiltinFn| {
        map.insert(name, Builtin { signature, func });
    };

    add(
        "seq",
        FunctionSignature::new(
            "seq",
            vec![
                ArgSpec::required("from", TypeMask::NUMERIC).singleton(),
                ArgSpec::required("to", TypeMask::NUMERIC).singleton(),
                ArgSpec::optional("by", TypeMask::NUMERIC).singleton(),
            ],
            TypeMask::NUMERIC,
        ),
        builtin_seq,
    );
    add(
        "rep",
        FunctionSignature::new(
            "rep",
            vec![
                ArgSpec::required("x", TypeMask::ANY),
                ArgSpec::required("count", TypeMask::INTEGER).singleton(),
            ],
            TypeMask::ANY,
        ),
        builtin_rep,
    );
    add(
        "rev",
        FunctionSignature::new(
            "rev",
            vec![ArgSpec::required("x", TypeMask::ANY)],
            TypeMask::ANY,
        ),
        builtin_rev,
    );
    add(
        "c",
        FunctionSignature::new(
            "c",
            vec![ArgSpec::optional("values", TypeMask::ANY)],
            TypeMask::ANY,
        )
        .variadic(),
        builtin_c,
    );
    add(
        "size",
        FunctionSignature::new(
            "size",
            vec![ArgSpec::required("x", TypeMask::ANY)],
            TypeMask::INTEGER,
        ),
        builtin_size,
    );
    add(
        "sum",
        FunctionSignature::new(
            "sum",
            vec![ArgSpec::required("x", TypeMask::NUMERIC.union(TypeMask::LOGICAL))],
            TypeMask::NUMERIC,
        ),
        builtin_sum,
    );
    add(
        "mean",
        FunctionSignature::new(
            "mean",
            vec![ArgSpec::required("x", TypeMask::NUMERIC.union(TypeMask::LOGICAL))],
            TypeMask::FLOAT.union(TypeMask::NULL),
        ),
        builtin_mean,
    );
    add(
        "sd",
        FunctionSignature::new(
            "sd",
            vec![ArgSpec::required("x", TypeMask::NUMERIC)],
            TypeMask::FLOAT.union(TypeMask::NULL),
        ),
        builtin_sd,
    );
    add(
        "min",
        FunctionSignature::new(
            "min",
            vec![ArgSpec::required(
                "x",
                TypeMask::NUMERIC.union(TypeMask::LOGICAL).union(TypeMask::STRING),
            )],
            TypeMask::ANY_BUT_NULL,
        ),
        builtin_min,
    );
    add(
        "max",
        FunctionSignature::new(
            "max",
            vec![ArgSpec::required(
                "x",
                TypeMask::NUMERIC.union(TypeMask::LOGICAL).union(TypeMask::STRING),
            )],
            TypeMask::ANY_BUT_NULL,
        ),
        builtin_max,
    );

    map
}

fn builtin_seq(args: &[Value]) -> Result<Value, ScriptError> {
    let from = &args[0];
    let to = &args[1];
    let by = args.get(2);

    let all_integer = from.kind() == ValueKind::Integer
        && to.kind() == ValueKind::Integer
        && by.map_or(true, |b| b.kind() == ValueKind::Integer);

    if all_integer {
        let from = from.element_as_integer(0)?;
        let to = to.element_as_integer(0)?;
        let by = match by {
            Some(v) => v.element_as_integer(0)?,
            None => {
                if to >= from {
                    1
                } else {
                    -1
                }
            }
        };
        check_step(from as f64, to as f64, by as f64)?;
        let mut out = Vec::new();
        let mut x = from;
        loop {
            let past_end = if by > 0 { x > to } else { x < to };
            if past_end {
                break;
            }
            out.push(x);
            match x.checked_add(by) {
                Some(next) => x = next,
                None => break,
            }
        }
        Ok(Value::Integer(out))
    } else {
        let from = from.element_as_float(0)?;
        let to = to.element_as_float(0)?;
        let by = match by {
            Some(v) => v.element_as_float(0)?,
            None => {
                if to >= from {
                    1.0
                } else {
                    -1.0
                }
            }
        };
        check_step(from, to, by)?;
        // the small fuzz keeps endpoints like seq(2, 1, -0.2) inclusive
        // despite binary rounding of the step
        let count = ((to - from) / by + 1e-10).floor() as i64;
        let mut out = Vec::with_capacity((count.max(0) + 1) as usize);
        for i in 0..=count.max(0) {
            out.push(from + by * i as f64);
        }
        Ok(Value::Float(out))
    }
}

fn check_step(from: f64, to: f64, by: f64) -> Result<(), ScriptError> {
    if by == 0.0 {
        return Err(ScriptError::new(
            ScriptErrorKind::Range,
            "seq(): by must not be 0",
        ));
    }
    // seq(a, a, by) is [a] for any by; otherwise the step must run toward to
    if from != to && (to - from).signum() != by.signum() {
        return Err(ScriptError::new(
            ScriptErrorKind::Range,
            format!("seq(): by ({by}) has the wrong sign for the range {from} to {to}"),
        ));
    }
    Ok(())
}

fn builtin_rep(args: &[Value]) -> Result<Value, ScriptError> {
    let x = &args[0];
    let count = args[1].element_as_integer(0)?;
    if count < 0 {
        return Err(ScriptError::new(
            ScriptErrorKind::Range,
            format!("rep(): count must be non-negative, got {count}"),
        ));
    }
    let parts: Vec<Value> = (0..count).map(|_| x.clone()).collect();
    value::concatenate(&parts)
}

fn builtin_rev(args: &[Value]) -> Result<Value, ScriptError> {
    Ok(match &args[0] {
        Value::Null => Value::Null,
        Value::Logical(v) => Value::Logical(v.iter().rev().copied().collect()),
        Value::Integer(v) => Value::Integer(v.iter().rev().copied().collect()),
        Value::Float(v) => Value::Float(v.iter().rev().copied().collect()),
        Value::Str(v) => Value::Str(v.iter().rev().cloned().collect()),
        Value::Object(v) => Value::Object(v.iter().rev().cloned().collect()),
    })
}

fn builtin_c(args: &[Value]) -> Result<Value, ScriptError> {
    value::concatenate(args)
}

fn builtin_size(args: &[Value]) -> Result<Value, ScriptError> {
    Ok(Value::integer(args[0].len() as i64))
}

fn builtin_sum(args: &[Value]) -> Result<Value, ScriptError> {
    match &args[0] {
        Value::Logical(v) => Ok(Value::integer(v.iter().filter(|&&b| b).count() as i64)),
        Value::Integer(v) => {
            let mut total: i64 = 0;
            for &x in v {
                total = total.checked_add(x).ok_or_else(|| {
                    ScriptError::new(ScriptErrorKind::Range, "sum(): integer overflow")
                })?;
            }
            Ok(Value::integer(total))
        }
        Value::Float(v) => Ok(Value::float(v.iter().sum())),
        _ => unreachable!("signature admits logical and numeric only"),
    }
}

fn builtin_mean(args: &[Value]) -> Result<Value, ScriptError> {
    let x = &args[0];
    if x.is_empty() {
        return Ok(Value::Null);
    }
    let mut total = 0.0;
    for i in 0..x.len() {
        total += x.element_as_float(i)?;
    }
    Ok(Value::float(total / x.len() as f64))
}

fn builtin_sd(args: &[Value]) -> Result<Value, ScriptError> {
    let x = &args[0];
    if x.len() < 2 {
        return Ok(Value::Null);
    }
    let n = x.len() as f64;
    let mut total = 0.0;
    for i in 0..x.len() {
        total += x.element_as_float(i)?;
    }
    let mean = total / n;
    let mut ss = 0.0;
    for i in 0..x.len() {
        let d = x.element_as_float(i)? - mean;
        ss += d * d;
    }
    Ok(Value::float((ss / (n - 1.0)).sqrt()))
}

fn builtin_min(args: &[Value]) -> Result<Value, ScriptError> {
    extremum(&args[0], "min", |ord| ord.is_lt())
}

fn builtin_max(args: &[Value]) -> Result<Value, ScriptError> {
    extremum(&args[0], "max", |ord| ord.is_gt())
}

fn extremum(
    x: &Value,
    name: &str,
    wins: fn(std::cmp::Ordering) -> bool,
) -> Result<Value, ScriptError> {
    if x.is_empty() {
        return Err(ScriptError::new(
            ScriptErrorKind::TypeMismatch,
            format!("{name}() requires a non-empty vector"),
        ));
    }
    Ok(match x {
        Value::Logical(v) => {
            let mut best = v[0];
            for &b in &v[1..] {
                if wins(b.cmp(&best)) {
                    best = b;
                }
            }
            Value::logical(best)
        }
        Value::Integer(v) => {
            let mut best = v[0];
            for &i in &v[1..] {
                if wins(i.cmp(&best)) {
                    best = i;
                }
            }
            Value::integer(best)
        }
        Value::Float(v) => {
            let mut best = v[0];
            for &f in &v[1..] {
                if f.partial_cmp(&best).is_some_and(wins) {
                    best = f;
                }
            }
            Value::float(best)
        }
        Value::Str(v) => {
            let mut best = &v[0];
            for s in &v[1..] {
                if wins(s.cmp(best)) {
                    best = s;
                }
            }
            Value::string(best.clone())
        }
        _ => unreachable!("signature admits logical, numeric, and string only"),
    })
}
