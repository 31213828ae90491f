//! # germline-script
//!
//! The embedded scripting language used to configure and drive germline
//! simulations. The crate is self-contained: it knows nothing about the
//! engine beyond the [`value::ScriptObject`] trait through which the engine
//! exposes its object types.
//!
//! Pipeline: [`lexer`] tokenizes, [`parser`] builds the AST, and
//! [`interp::Interpreter`] evaluates over a two-tier [`symbols::SymbolTable`]
//! with signature-checked builtins and user functions.

pub mod ast;
pub mod builtins;
pub mod error;
pub mod interp;
pub mod lexer;
pub mod names;
pub mod parser;
pub mod signature;
pub mod symbols;
pub mod token;
pub mod value;

pub use ast::CallbackKind;
pub use error::{ScriptError, ScriptErrorKind, SourceLocation};
pub use interp::{evaluate, CompiledCallback, Interpreter, Script};
pub use signature::{ArgSpec, FunctionSignature, TypeMask};
pub use symbols::{SymbolTable, UsageScan};
pub use value::{ScriptObject, Value, ValueKind};
