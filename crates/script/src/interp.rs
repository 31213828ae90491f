//! Tree-walking interpreter.
//!
//! Evaluation is bottom-up over the symbol table. Function calls dispatch
//! through their signatures before the body runs; failures name the function.
//! Callback declarations register against the interpreter and capture the
//! symbol table as it stood at registration.

use crate::ast::{CallbackDecl, CallbackKind, Expr, ExprKind, Stmt, StmtKind};
use crate::builtins::{self, Builtin};
use crate::error::{ScriptError, ScriptErrorKind, SourceLocation};
use crate::lexer;
use crate::parser::Parser;
use crate::signature::{ArgSpec, FunctionSignature, TypeMask};
use crate::symbols::{SymbolTable, UsageScan};
use crate::value::{self, Value};
use std::collections::HashMap;
use std::rc::Rc;

/// A tokenized and parsed interpreter block, ready to evaluate.
pub struct Script {
    pub statements: Vec<Stmt>,
    pub usage: UsageScan,
}

impl Script {
    pub fn parse(source: &str) -> Result<Script, ScriptError> {
        let tokens = lexer::tokenize(source)?;
        let usage = UsageScan::of_tokens(&tokens);
        let statements = Parser::new(tokens).parse_interpreter_block()?;
        Ok(Script { statements, usage })
    }
}

/// A registered callback: its declaration plus the symbol table captured at
/// registration time.
#[derive(Clone)]
pub struct CompiledCallback {
    pub kind: CallbackKind,
    pub filter: Option<String>,
    body: Rc<Vec<Stmt>>,
    snapshot: SymbolTable,
}

struct UserFunction {
    signature: FunctionSignature,
    params: Vec<String>,
    body: Rc<Vec<Stmt>>,
}

pub struct Interpreter {
    symbols: SymbolTable,
    builtins: HashMap<&'static str, Builtin>,
    functions: HashMap<String, UserFunction>,
    callbacks: Vec<CompiledCallback>,
}

impl Interpreter {
    pub fn new(usage: &UsageScan) -> Self {
        Self {
            symbols: SymbolTable::with_reserved(usage),
            builtins: builtins::registry(),
            functions: HashMap::new(),
            callbacks: Vec::new(),
        }
    }

    /// Inject an engine-provided constant (e.g. the `sim` object).
    pub fn define_constant(&mut self, name: &str, value: Value) -> Result<(), ScriptError> {
        self.symbols.define_constant(name, Rc::new(value))
    }

    pub fn set_variable(&mut self, name: &str, value: Value) -> Result<(), ScriptError> {
        self.symbols.set(name, Rc::new(value))
    }

    pub fn callbacks(&self) -> &[CompiledCallback] {
        &self.callbacks
    }

    /// Evaluate a whole script: callback declarations register, everything
    /// else runs in order. Returns the value of the last expression
    /// statement.
    pub fn run(&mut self, script: &Script) -> Result<Value, ScriptError> {
        self.evaluate_block(&script.statements)
    }

    /// Invoke a registered callback with the engine's bindings injected over
    /// a copy of the registration-time symbol table.
    pub fn call_callback(
        &mut self,
        callback: &CompiledCallback,
        bindings: &[(&str, Value)],
    ) -> Result<Value, ScriptError> {
        let mut table = callback.snapshot.clone();
        for (name, value) in bindings {
            table.set(name, Rc::new(value.clone()))?;
        }
        let saved = std::mem::replace(&mut self.symbols, table);
        let body = Rc::clone(&callback.body);
        let result = self.evaluate_block(&body);
        self.symbols = saved;
        result
    }

    fn evaluate_block(&mut self, statements: &[Stmt]) -> Result<Value, ScriptError> {
        let mut last = Value::Null;
        for statement in statements {
            last = self.evaluate_statement(statement)?;
        }
        Ok(last)
    }

    fn evaluate_statement(&mut self, statement: &Stmt) -> Result<Value, ScriptError> {
        match &statement.kind {
            StmtKind::Expr(expr) => self.evaluate_expr(expr),
            StmtKind::Assign { name, value } => {
                let value = self.evaluate_expr(value)?;
                self.symbols
                    .set(name, Rc::new(value))
                    .map_err(|e| e.with_location(statement.location))?;
                Ok(Value::Null)
            }
            StmtKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                let condition = self
                    .evaluate_expr(condition)?
                    .condition()
                    .map_err(|e| e.with_location(statement.location))?;
                if condition {
                    self.evaluate_block(then_branch)?;
                } else if let Some(else_branch) = else_branch {
                    self.evaluate_block(else_branch)?;
                }
                Ok(Value::Null)
            }
            StmtKind::While { condition, body } => {
                loop {
                    let keep_going = self
                        .evaluate_expr(condition)?
                        .condition()
                        .map_err(|e| e.with_location(statement.location))?;
                    if !keep_going {
                        break;
                    }
                    self.evaluate_block(body)?;
                }
                Ok(Value::Null)
            }
            StmtKind::For {
                variable,
                sequence,
                body,
            } => {
                let sequence = self.evaluate_expr(sequence)?;
                for index in 0..sequence.len() {
                    self.symbols
                        .set(variable, Rc::new(sequence.element(index)))
                        .map_err(|e| e.with_location(statement.location))?;
                    self.evaluate_block(body)?;
                }
                Ok(Value::Null)
            }
            StmtKind::Block(body) => {
                self.evaluate_block(body)?;
                Ok(Value::Null)
            }
            StmtKind::FunctionDecl { name, params, body } => {
                if self.builtins.contains_key(name.as_str()) {
                    return Err(ScriptError::at(
                        ScriptErrorKind::Redefinition,
                        format!("cannot redefine builtin function {name}()"),
                        statement.location,
                    ));
                }
                let signature = FunctionSignature::new(
                    name.clone(),
                    params
                        .iter()
                        .map(|p| ArgSpec::required(p.clone(), TypeMask::ANY))
                        .collect(),
                    TypeMask::ANY,
                );
                self.functions.insert(
                    name.clone(),
                    UserFunction {
                        signature,
                        params: params.clone(),
                        body: Rc::new(body.clone()),
                    },
                );
                Ok(Value::Null)
            }
            StmtKind::CallbackDecl(decl) => {
                self.register_callback(decl);
                Ok(Value::Null)
            }
        }
    }

    fn register_callback(&mut self, decl: &CallbackDecl) {
        self.callbacks.push(CompiledCallback {
            kind: decl.kind,
            filter: decl.filter.clone(),
            body: Rc::new(decl.body.clone()),
            snapshot: self.symbols.clone(),
        });
    }

    fn evaluate_expr(&mut self, expr: &Expr) -> Result<Value, ScriptError> {
        let loc = expr.location;
        match &expr.kind {
            ExprKind::IntegerLiteral(v) => Ok(Value::integer(*v)),
            ExprKind::FloatLiteral(v) => Ok(Value::float(*v)),
            ExprKind::StringLiteral(v) => Ok(Value::string(v.clone())),
            ExprKind::Identifier(name) => self
                .symbols
                .get(name)
                .map(|rc| (*rc).clone())
                .map_err(|e| e.with_location(loc)),
            ExprKind::Unary { op, operand } => {
                let operand = self.evaluate_expr(operand)?;
                value::unary_op(*op, &operand).map_err(|e| e.with_location(loc))
            }
            ExprKind::Binary { op, lhs, rhs } => {
                let lhs = self.evaluate_expr(lhs)?;
                let rhs = self.evaluate_expr(rhs)?;
                value::binary_op(*op, &lhs, &rhs).map_err(|e| e.with_location(loc))
            }
            ExprKind::Range { from, to } => {
                let from = self.evaluate_expr(from)?;
                let to = self.evaluate_expr(to)?;
                value::range(&from, &to).map_err(|e| e.with_location(loc))
            }
            ExprKind::Call { function, args } => self.evaluate_call(function, args, loc),
            ExprKind::MethodCall {
                receiver,
                method,
                args,
            } => {
                let receiver = self.evaluate_expr(receiver)?;
                let mut evaluated = Vec::with_capacity(args.len());
                for arg in args {
                    evaluated.push(self.evaluate_expr(arg)?);
                }
                self.dispatch_on_objects(&receiver, loc, |obj| obj.call_method(method, &evaluated))
            }
            ExprKind::Property { receiver, name } => {
                let receiver = self.evaluate_expr(receiver)?;
                self.dispatch_on_objects(&receiver, loc, |obj| obj.get_property(name))
            }
            ExprKind::Index { receiver, index } => {
                let receiver = self.evaluate_expr(receiver)?;
                let index = self.evaluate_expr(index)?;
                receiver.subscript(&index).map_err(|e| e.with_location(loc))
            }
        }
    }

    /// Apply an accessor to every element of an object vector and
    /// concatenate the results; singleton receivers pass results through.
    fn dispatch_on_objects(
        &self,
        receiver: &Value,
        loc: SourceLocation,
        accessor: impl Fn(&dyn crate::value::ScriptObject) -> Result<Value, ScriptError>,
    ) -> Result<Value, ScriptError> {
        let Value::Object(objects) = receiver else {
            return Err(ScriptError::at(
                ScriptErrorKind::TypeMismatch,
                format!(
                    "member access requires an object receiver, not {}",
                    receiver.kind()
                ),
                loc,
            ));
        };
        if objects.len() == 1 {
            return accessor(objects[0].as_ref()).map_err(|e| e.with_location(loc));
        }
        let mut parts = Vec::with_capacity(objects.len());
        for object in objects {
            parts.push(accessor(object.as_ref()).map_err(|e| e.with_location(loc))?);
        }
        value::concatenate(&parts).map_err(|e| e.with_location(loc))
    }

    fn evaluate_call(
        &mut self,
        function: &str,
        args: &[Expr],
        loc: SourceLocation,
    ) -> Result<Value, ScriptError> {
        let mut evaluated = Vec::with_capacity(args.len());
        for arg in args {
            evaluated.push(self.evaluate_expr(arg)?);
        }

        if let Some(builtin) = self.builtins.get(function) {
            builtin
                .signature
                .check(&evaluated)
                .map_err(|e| e.with_location(loc))?;
            return (builtin.func)(&evaluated).map_err(|e| e.with_location(loc));
        }

        if let Some(user) = self.functions.get(function) {
            user.signature
                .check(&evaluated)
                .map_err(|e| e.with_location(loc))?;
            let params = user.params.clone();
            let body = Rc::clone(&user.body);
            let mut frame = SymbolTable::new();
            for (param, value) in params.iter().zip(evaluated) {
                frame
                    .set(param, Rc::new(value))
                    .map_err(|e| e.with_location(loc))?;
            }
            let saved = std::mem::replace(&mut self.symbols, frame);
            let result = self.evaluate_block(&body);
            self.symbols = saved;
            return result;
        }

        Err(ScriptError::at(
            ScriptErrorKind::UndefinedSymbol,
            format!("undefined function {function}()"),
            loc,
        ))
    }
}

/// Parse and evaluate one source string in a fresh interpreter.
pub fn evaluate(source: &str) -> Result<Value, ScriptError> {
    let script = Script::parse(source)?;
    let mut interpreter = Interpreter::new(&script.usage);
    interpreter.run(&script)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(source: &str) -> Value {
        evaluate(source).unwrap_or_else(|e| panic!("{source} raised: {e}"))
    }

    fn raises(source: &str) -> ScriptError {
        match evaluate(source) {
            Ok(v) => panic!("{source} evaluated to {v:?} instead of raising"),
            Err(e) => e,
        }
    }

    #[test]
    fn test_literals() {
        assert_eq!(ok("3;"), Value::integer(3));
        assert_eq!(ok("3e2;"), Value::integer(300));
        assert_eq!(ok("3.1;"), Value::float(3.1));
        assert_eq!(ok("3.1e2;"), Value::float(3.1e2));
        assert_eq!(ok("3.1e-2;"), Value::float(3.1e-2));
        assert_eq!(ok("\"foo\";"), Value::string("foo"));
        assert_eq!(ok("\"foo\\tbar\";"), Value::string("foo\tbar"));
        assert_eq!(ok("T;"), Value::logical(true));
        assert_eq!(ok("F;"), Value::logical(false));
    }

    #[test]
    fn test_vector_to_singleton_comparisons() {
        assert_eq!(
            ok("rep(1:3, 2) == 2;"),
            Value::Logical(vec![false, true, false, false, true, false])
        );
        assert_eq!(
            ok("rep(1:3, 2) != 2;"),
            Value::Logical(vec![true, false, true, true, false, true])
        );
        assert_eq!(
            ok("rep(1:3, 2) < 2;"),
            Value::Logical(vec![true, false, false, true, false, false])
        );
        assert_eq!(
            ok("rep(1:3, 2) >= 2;"),
            Value::Logical(vec![false, true, true, false, true, true])
        );
        assert_eq!(
            ok("2 > rep(1:3, 2);"),
            Value::Logical(vec![true, false, false, true, false, false])
        );
    }

    #[test]
    fn test_plus_operator() {
        assert_eq!(ok("1+1;"), Value::integer(2));
        assert_eq!(ok("1+-1;"), Value::integer(0));
        assert_eq!(ok("(0:2)+10;"), Value::Integer(vec![10, 11, 12]));
        assert_eq!(ok("10+(0:2);"), Value::Integer(vec![10, 11, 12]));
        assert_eq!(ok("(15:13)+(0:2);"), Value::Integer(vec![15, 15, 15]));
        assert_eq!(ok("1+1.0;"), Value::float(2.0));
        assert_eq!(ok("3+4+5;"), Value::integer(12));
        assert_eq!(ok("\"foo\"+5;"), Value::string("foo5"));
        assert_eq!(ok("5.1+\"foo\";"), Value::string("5.1foo"));
        assert_eq!(
            ok("\"foo\"+1:3;"),
            Value::Str(vec!["foo1".into(), "foo2".into(), "foo3".into()])
        );
        assert_eq!(
            ok("c(\"bar\", \"baz\")+T;"),
            Value::Str(vec!["barT".into(), "bazT".into()])
        );
        assert_eq!(ok("NULL+(0:2);"), Value::Null);
        assert_eq!(ok("NULL+\"foo\";"), Value::Null);
        raises("(15:12)+(0:2);");
        raises("T+F;");
        raises("+\"foo\";");
        raises("+T;");
    }

    #[test]
    fn test_minus_operator() {
        assert_eq!(ok("1-1;"), Value::integer(0));
        assert_eq!(ok("1--1;"), Value::integer(2));
        assert_eq!(ok("(0:2)-10;"), Value::Integer(vec![-10, -9, -8]));
        assert_eq!(ok("(15:13)-(0:2);"), Value::Integer(vec![15, 13, 11]));
        assert_eq!(ok("-5;"), Value::integer(-5));
        assert_eq!(ok("-5.0;"), Value::float(-5.0));
        assert_eq!(ok("3-4-5;"), Value::integer(-6));
        assert_eq!(ok("NULL-(0:2);"), Value::Null);
        raises("\"foo\"-1;");
        raises("T-T;");
        raises("-\"foo\";");
        raises("-T;");
    }

    #[test]
    fn test_seq_and_rev() {
        assert_eq!(ok("seq(1, 5);"), Value::Integer(vec![1, 2, 3, 4, 5]));
        assert_eq!(ok("seq(5, 1);"), Value::Integer(vec![5, 4, 3, 2, 1]));
        assert_eq!(ok("seq(1, 10, 2);"), Value::Integer(vec![1, 3, 5, 7, 9]));
        raises("seq(1, 10, -2);");
        raises("seq(\"foo\", 2, 1);");
        raises("seq(T, 2, 1);");
        assert_eq!(ok("rev(6:10);"), Value::Integer(vec![10, 9, 8, 7, 6]));
        assert_eq!(
            ok("rev(-(6:10));"),
            Value::Integer(vec![-10, -9, -8, -7, -6])
        );
        assert_eq!(
            ok("rev(c(\"foo\",\"bar\",\"baz\"));"),
            Value::Str(vec!["baz".into(), "bar".into(), "foo".into()])
        );
        assert_eq!(
            ok("(seq(1, 2, 0.2) - c(1, 1.2, 1.4, 1.6, 1.8, 2.0)) < 0.000000001;"),
            Value::Logical(vec![true; 6])
        );
        assert_eq!(
            ok("(seq(2, 1, -0.2) - c(2.0, 1.8, 1.6, 1.4, 1.2, 1)) < 0.000000001;"),
            Value::Logical(vec![true; 6])
        );
    }

    #[test]
    fn test_rev_involution() {
        assert_eq!(ok("rev(rev(3:7)) == 3:7;"), Value::Logical(vec![true; 5]));
    }

    #[test]
    fn test_sum_of_seq() {
        assert_eq!(ok("sum(seq(1, 10));"), Value::integer(55));
    }

    #[test]
    fn test_variables_and_control_flow() {
        assert_eq!(
            ok("total = 0; for (i in 1:10) total = total + i; total;"),
            Value::integer(55)
        );
        assert_eq!(
            ok("x = 0; while (x < 5) x = x + 1; x;"),
            Value::integer(5)
        );
        assert_eq!(
            ok("if (1 < 2) y = 10; else y = 20; y;"),
            Value::integer(10)
        );
    }

    #[test]
    fn test_undefined_identifier() {
        let err = raises("undefined_thing;");
        assert_eq!(err.kind, ScriptErrorKind::UndefinedSymbol);
        assert!(err.location.is_some());
    }

    #[test]
    fn test_constants_are_protected() {
        let err = raises("T = F;");
        assert_eq!(err.kind, ScriptErrorKind::ConstViolation);
    }

    #[test]
    fn test_signature_mismatch_names_function() {
        let err = raises("seq(1);");
        assert_eq!(err.kind, ScriptErrorKind::SignatureMismatch);
        assert!(err.message.contains("seq"));
    }

    #[test]
    fn test_user_function() {
        assert_eq!(
            ok("function double(x) { x * 2; } double(21);"),
            Value::integer(42)
        );
        let err = raises("function double(x) { x * 2; } double(1, 2);");
        assert_eq!(err.kind, ScriptErrorKind::SignatureMismatch);
    }

    #[test]
    fn test_builtin_cannot_be_redefined() {
        let err = raises("function seq(x) { x; }");
        assert_eq!(err.kind, ScriptErrorKind::Redefinition);
    }

    #[test]
    fn test_callback_registration_and_invocation() {
        let script = Script::parse("base = 2.0; fitness(m1) { relFitness * base; }").unwrap();
        let mut interpreter = Interpreter::new(&script.usage);
        interpreter.run(&script).unwrap();
        assert_eq!(interpreter.callbacks().len(), 1);

        let callback = interpreter.callbacks()[0].clone();
        assert_eq!(callback.kind, CallbackKind::Fitness);
        assert_eq!(callback.filter.as_deref(), Some("m1"));

        let result = interpreter
            .call_callback(&callback, &[("relFitness", Value::float(1.5))])
            .unwrap();
        assert_eq!(result, Value::float(3.0));
    }

    #[test]
    fn test_callback_snapshot_is_registration_time() {
        // the callback sees `base` as it was when declared, not as later
        // reassigned
        let script =
            Script::parse("base = 2.0; modifyChild() { base; } base = 99.0;").unwrap();
        let mut interpreter = Interpreter::new(&script.usage);
        interpreter.run(&script).unwrap();
        let callback = interpreter.callbacks()[0].clone();
        let result = interpreter.call_callback(&callback, &[]).unwrap();
        assert_eq!(result, Value::float(2.0));
    }

    #[test]
    fn test_broadcast_commutes() {
        assert_eq!(ok("(1:5) + 3 == 3 + (1:5);"), Value::Logical(vec![true; 5]));
    }

    #[test]
    fn test_indexing() {
        assert_eq!(ok("x = 10:20; x[0];"), Value::integer(10));
        assert_eq!(ok("x = 10:12; x[c(2, 0)];"), Value::Integer(vec![12, 10]));
        let err = raises("x = 1:3; x[5];");
        assert_eq!(err.kind, ScriptErrorKind::Range);
    }
}
