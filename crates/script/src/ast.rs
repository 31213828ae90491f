//! Abstract syntax tree for an interpreter block.

use crate::error::SourceLocation;
use crate::value::{BinaryOp, UnaryOp};

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub location: SourceLocation,
}

impl Expr {
    pub fn new(kind: ExprKind, location: SourceLocation) -> Self {
        Self { kind, location }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    IntegerLiteral(i64),
    FloatLiteral(f64),
    StringLiteral(String),
    Identifier(String),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Range {
        from: Box<Expr>,
        to: Box<Expr>,
    },
    Call {
        function: String,
        args: Vec<Expr>,
    },
    MethodCall {
        receiver: Box<Expr>,
        method: String,
        args: Vec<Expr>,
    },
    Property {
        receiver: Box<Expr>,
        name: String,
    },
    Index {
        receiver: Box<Expr>,
        index: Box<Expr>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub location: SourceLocation,
}

impl Stmt {
    pub fn new(kind: StmtKind, location: SourceLocation) -> Self {
        Self { kind, location }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    Expr(Expr),
    Assign {
        name: String,
        value: Expr,
    },
    If {
        condition: Expr,
        then_branch: Vec<Stmt>,
        else_branch: Option<Vec<Stmt>>,
    },
    For {
        variable: String,
        sequence: Expr,
        body: Vec<Stmt>,
    },
    While {
        condition: Expr,
        body: Vec<Stmt>,
    },
    Block(Vec<Stmt>),
    FunctionDecl {
        name: String,
        params: Vec<String>,
        body: Vec<Stmt>,
    },
    CallbackDecl(CallbackDecl),
}

/// Which engine phase a declared callback attaches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackKind {
    Fitness,
    MateChoice,
    ModifyChild,
}

impl CallbackKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Fitness => "fitness",
            Self::MateChoice => "mateChoice",
            Self::ModifyChild => "modifyChild",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "fitness" => Some(Self::Fitness),
            "mateChoice" => Some(Self::MateChoice),
            "modifyChild" => Some(Self::ModifyChild),
            _ => None,
        }
    }
}

/// A `fitness(m1) { ... }`-style declaration.
///
/// The optional filter is the bare identifier between the parentheses: a
/// mutation-type id (`m1`) for fitness callbacks, a subpopulation id (`p2`)
/// for mate-choice callbacks.
#[derive(Debug, Clone, PartialEq)]
pub struct CallbackDecl {
    pub kind: CallbackKind,
    pub filter: Option<String>,
    pub body: Vec<Stmt>,
    pub location: SourceLocation,
}
