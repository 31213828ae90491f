//! Recursive-descent parser producing an interpreter block.

use crate::ast::{CallbackDecl, CallbackKind, Expr, ExprKind, Stmt, StmtKind};
use crate::error::{ScriptError, ScriptErrorKind, SourceLocation};
use crate::token::{SpannedToken, Token};
use crate::value::{BinaryOp, UnaryOp};

pub struct Parser {
    tokens: Vec<SpannedToken>,
    pos: usize,
}

impl Parser {
    pub fn new(tokens: Vec<SpannedToken>) -> Self {
        Self { tokens, pos: 0 }
    }

    pub fn parse_interpreter_block(mut self) -> Result<Vec<Stmt>, ScriptError> {
        let mut statements = Vec::new();
        while !matches!(self.current().token, Token::Eof) {
            statements.push(self.parse_statement()?);
        }
        Ok(statements)
    }

    fn current(&self) -> &SpannedToken {
        &self.tokens[self.pos]
    }

    fn peek(&self, offset: usize) -> &Token {
        self.tokens
            .get(self.pos + offset)
            .map(|t| &t.token)
            .unwrap_or(&Token::Eof)
    }

    fn location(&self) -> SourceLocation {
        self.current().location
    }

    fn advance(&mut self) -> SpannedToken {
        let token = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, expected: &Token) -> Result<SpannedToken, ScriptError> {
        if &self.current().token == expected {
            Ok(self.advance())
        } else {
            Err(self.error(format!(
                "expected '{}', found '{}'",
                expected,
                self.current().token
            )))
        }
    }

    fn error(&self, message: String) -> ScriptError {
        ScriptError::at(ScriptErrorKind::Syntax, message, self.location())
    }

    fn parse_statement(&mut self) -> Result<Stmt, ScriptError> {
        let loc = self.location();
        match &self.current().token {
            Token::Semicolon => {
                self.advance();
                Ok(Stmt::new(StmtKind::Block(Vec::new()), loc))
            }
            Token::BraceOpen => {
                let body = self.parse_brace_block()?;
                Ok(Stmt::new(StmtKind::Block(body), loc))
            }
            Token::If => self.parse_if(),
            Token::While => self.parse_while(),
            Token::For => self.parse_for(),
            Token::Function => self.parse_function_decl(),
            Token::Identifier(name) if self.is_callback_decl(name) => self.parse_callback_decl(),
            _ => self.parse_simple_statement(),
        }
    }

    /// A callback declaration is an identifier naming a callback phase,
    /// followed by a parenthesized (possibly empty) filter and a brace block.
    /// The brace distinguishes it from an ordinary call statement.
    fn is_callback_decl(&self, name: &str) -> bool {
        if CallbackKind::from_name(name).is_none() {
            return false;
        }
        match (self.peek(1), self.peek(2), self.peek(3), self.peek(4)) {
            (Token::ParenOpen, Token::ParenClose, Token::BraceOpen, _) => true,
            (Token::ParenOpen, Token::Identifier(_), Token::ParenClose, Token::BraceOpen) => true,
            _ => false,
        }
    }

    fn parse_callback_decl(&mut self) -> Result<Stmt, ScriptError> {
        let loc = self.location();
        let Token::Identifier(name) = self.advance().token else {
            unreachable!("checked by caller");
        };
        let kind = CallbackKind::from_name(&name).expect("checked by caller");
        self.expect(&Token::ParenOpen)?;
        let filter = match &self.current().token {
            Token::Identifier(filter) => {
                let filter = filter.clone();
                self.advance();
                Some(filter)
            }
            _ => None,
        };
        self.expect(&Token::ParenClose)?;
        let body = self.parse_brace_block()?;
        Ok(Stmt::new(
            StmtKind::CallbackDecl(CallbackDecl {
                kind,
                filter,
                body,
                location: loc,
            }),
            loc,
        ))
    }

    fn parse_function_decl(&mut self) -> Result<Stmt, ScriptError> {
        let loc = self.location();
        self.expect(&Token::Function)?;
        let name = self.expect_identifier()?;
        self.expect(&Token::ParenOpen)?;
        let mut params = Vec::new();
        if self.current().token != Token::ParenClose {
            loop {
                params.push(self.expect_identifier()?);
                if self.current().token == Token::Comma {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        self.expect(&Token::ParenClose)?;
        let body = self.parse_brace_block()?;
        Ok(Stmt::new(StmtKind::FunctionDecl { name, params, body }, loc))
    }

    fn parse_if(&mut self) -> Result<Stmt, ScriptError> {
        let loc = self.location();
        self.expect(&Token::If)?;
        self.expect(&Token::ParenOpen)?;
        let condition = self.parse_expr()?;
        self.expect(&Token::ParenClose)?;
        let then_branch = self.parse_branch()?;
        let else_branch = if self.current().token == Token::Else {
            self.advance();
            Some(self.parse_branch()?)
        } else {
            None
        };
        Ok(Stmt::new(
            StmtKind::If {
                condition,
                then_branch,
                else_branch,
            },
            loc,
        ))
    }

    fn parse_while(&mut self) -> Result<Stmt, ScriptError> {
        let loc = self.location();
        self.expect(&Token::While)?;
        self.expect(&Token::ParenOpen)?;
        let condition = self.parse_expr()?;
        self.expect(&Token::ParenClose)?;
        let body = self.parse_branch()?;
        Ok(Stmt::new(StmtKind::While { condition, body }, loc))
    }

    fn parse_for(&mut self) -> Result<Stmt, ScriptError> {
        let loc = self.location();
        self.expect(&Token::For)?;
        self.expect(&Token::ParenOpen)?;
        let variable = self.expect_identifier()?;
        self.expect(&Token::In)?;
        let sequence = self.parse_expr()?;
        self.expect(&Token::ParenClose)?;
        let body = self.parse_branch()?;
        Ok(Stmt::new(
            StmtKind::For {
                variable,
                sequence,
                body,
            },
            loc,
        ))
    }

    /// A branch is a single statement or a brace block, either way a list.
    fn parse_branch(&mut self) -> Result<Vec<Stmt>, ScriptError> {
        if self.current().token == Token::BraceOpen {
            self.parse_brace_block()
        } else {
            Ok(vec![self.parse_statement()?])
        }
    }

    fn parse_brace_block(&mut self) -> Result<Vec<Stmt>, ScriptError> {
        self.expect(&Token::BraceOpen)?;
        let mut body = Vec::new();
        while self.current().token != Token::BraceClose {
            if self.current().token == Token::Eof {
                return Err(self.error("unterminated block".into()));
            }
            body.push(self.parse_statement()?);
        }
        self.expect(&Token::BraceClose)?;
        Ok(body)
    }

    fn parse_simple_statement(&mut self) -> Result<Stmt, ScriptError> {
        let loc = self.location();
        let expr = self.parse_expr()?;
        if self.current().token == Token::Assign {
            let ExprKind::Identifier(name) = expr.kind else {
                return Err(self.error("left side of assignment must be an identifier".into()));
            };
            self.advance();
            let value = self.parse_expr()?;
            self.expect(&Token::Semicolon)?;
            return Ok(Stmt::new(StmtKind::Assign { name, value }, loc));
        }
        self.expect(&Token::Semicolon)?;
        Ok(Stmt::new(StmtKind::Expr(expr), loc))
    }

    fn expect_identifier(&mut self) -> Result<String, ScriptError> {
        match &self.current().token {
            Token::Identifier(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            other => Err(self.error(format!("expected an identifier, found '{other}'"))),
        }
    }

    // expression grammar, loosest binding first

    fn parse_expr(&mut self) -> Result<Expr, ScriptError> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr, ScriptError> {
        let mut lhs = self.parse_and()?;
        while self.current().token == Token::Or {
            let loc = self.location();
            self.advance();
            let rhs = self.parse_and()?;
            lhs = binary(BinaryOp::Or, lhs, rhs, loc);
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, ScriptError> {
        let mut lhs = self.parse_equality()?;
        while self.current().token == Token::And {
            let loc = self.location();
            self.advance();
            let rhs = self.parse_equality()?;
            lhs = binary(BinaryOp::And, lhs, rhs, loc);
        }
        Ok(lhs)
    }

    fn parse_equality(&mut self) -> Result<Expr, ScriptError> {
        let mut lhs = self.parse_relational()?;
        loop {
            let op = match self.current().token {
                Token::EqEq => BinaryOp::Eq,
                Token::NotEq => BinaryOp::Ne,
                _ => return Ok(lhs),
            };
            let loc = self.location();
            self.advance();
            let rhs = self.parse_relational()?;
            lhs = binary(op, lhs, rhs, loc);
        }
    }

    fn parse_relational(&mut self) -> Result<Expr, ScriptError> {
        let mut lhs = self.parse_additive()?;
        loop {
            let op = match self.current().token {
                Token::Less => BinaryOp::Lt,
                Token::LessEq => BinaryOp::Le,
                Token::Greater => BinaryOp::Gt,
                Token::GreaterEq => BinaryOp::Ge,
                _ => return Ok(lhs),
            };
            let loc = self.location();
            self.advance();
            let rhs = self.parse_additive()?;
            lhs = binary(op, lhs, rhs, loc);
        }
    }

    fn parse_additive(&mut self) -> Result<Expr, ScriptError> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.current().token {
                Token::Plus => BinaryOp::Add,
                Token::Minus => BinaryOp::Sub,
                _ => return Ok(lhs),
            };
            let loc = self.location();
            self.advance();
            let rhs = self.parse_multiplicative()?;
            lhs = binary(op, lhs, rhs, loc);
        }
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ScriptError> {
        let mut lhs = self.parse_range()?;
        loop {
            let op = match self.current().token {
                Token::Star => BinaryOp::Mul,
                Token::Slash => BinaryOp::Div,
                Token::Percent => BinaryOp::Mod,
                _ => return Ok(lhs),
            };
            let loc = self.location();
            self.advance();
            let rhs = self.parse_range()?;
            lhs = binary(op, lhs, rhs, loc);
        }
    }

    fn parse_range(&mut self) -> Result<Expr, ScriptError> {
        let lhs = self.parse_unary()?;
        if self.current().token == Token::Colon {
            let loc = self.location();
            self.advance();
            let rhs = self.parse_unary()?;
            return Ok(Expr::new(
                ExprKind::Range {
                    from: Box::new(lhs),
                    to: Box::new(rhs),
                },
                loc,
            ));
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, ScriptError> {
        let loc = self.location();
        let op = match self.current().token {
            Token::Plus => Some(UnaryOp::Plus),
            Token::Minus => Some(UnaryOp::Minus),
            Token::Not => Some(UnaryOp::Not),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let operand = self.parse_unary()?;
            return Ok(Expr::new(
                ExprKind::Unary {
                    op,
                    operand: Box::new(operand),
                },
                loc,
            ));
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expr, ScriptError> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.current().token {
                Token::Dot => {
                    let loc = self.location();
                    self.advance();
                    let name = self.expect_identifier()?;
                    if self.current().token == Token::ParenOpen {
                        let args = self.parse_call_args()?;
                        expr = Expr::new(
                            ExprKind::MethodCall {
                                receiver: Box::new(expr),
                                method: name,
                                args,
                            },
                            loc,
                        );
                    } else {
                        expr = Expr::new(
                            ExprKind::Property {
                                receiver: Box::new(expr),
                                name,
                            },
                            loc,
                        );
                    }
                }
                Token::BracketOpen => {
                    let loc = self.location();
                    self.advance();
                    let index = self.parse_expr()?;
                    self.expect(&Token::BracketClose)?;
                    expr = Expr::new(
                        ExprKind::Index {
                            receiver: Box::new(expr),
                            index: Box::new(index),
                        },
                        loc,
                    );
                }
                _ => return Ok(expr),
            }
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, ScriptError> {
        let loc = self.location();
        match self.current().token.clone() {
            Token::Integer(value) => {
                self.advance();
                Ok(Expr::new(ExprKind::IntegerLiteral(value), loc))
            }
            Token::Float(value) => {
                self.advance();
                Ok(Expr::new(ExprKind::FloatLiteral(value), loc))
            }
            Token::Str(value) => {
                self.advance();
                Ok(Expr::new(ExprKind::StringLiteral(value), loc))
            }
            Token::Identifier(name) => {
                self.advance();
                if self.current().token == Token::ParenOpen {
                    let args = self.parse_call_args()?;
                    Ok(Expr::new(ExprKind::Call { function: name, args }, loc))
                } else {
                    Ok(Expr::new(ExprKind::Identifier(name), loc))
                }
            }
            Token::ParenOpen => {
                self.advance();
                let expr = self.parse_expr()?;
                self.expect(&Token::ParenClose)?;
                Ok(expr)
            }
            other => Err(self.error(format!("unexpected token '{other}'"))),
        }
    }

    fn parse_call_args(&mut self) -> Result<Vec<Expr>, ScriptError> {
        self.expect(&Token::ParenOpen)?;
        let mut args = Vec::new();
        if self.current().token != Token::ParenClose {
            loop {
                args.push(self.parse_expr()?);
                if self.current().token == Token::Comma {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        self.expect(&Token::ParenClose)?;
        Ok(args)
    }
}

fn binary(op: BinaryOp, lhs: Expr, rhs: Expr, loc: SourceLocation) -> Expr {
    Expr::new(
        ExprKind::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        },
        loc,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;

    fn parse(source: &str) -> Vec<Stmt> {
        Parser::new(tokenize(source).unwrap())
            .parse_interpreter_block()
            .unwrap()
    }

    #[test]
    fn test_expression_statement() {
        let stmts = parse("3;");
        assert!(matches!(
            stmts[0].kind,
            StmtKind::Expr(Expr {
                kind: ExprKind::IntegerLiteral(3),
                ..
            })
        ));
    }

    #[test]
    fn test_range_binds_tighter_than_add() {
        // "foo" + 1:3 must parse as "foo" + (1:3)
        let stmts = parse("\"foo\" + 1:3;");
        let StmtKind::Expr(expr) = &stmts[0].kind else {
            panic!("expected expression");
        };
        let ExprKind::Binary { op, rhs, .. } = &expr.kind else {
            panic!("expected binary");
        };
        assert_eq!(*op, BinaryOp::Add);
        assert!(matches!(rhs.kind, ExprKind::Range { .. }));
    }

    #[test]
    fn test_assignment() {
        let stmts = parse("x = 1 + 2;");
        assert!(matches!(&stmts[0].kind, StmtKind::Assign { name, .. } if name == "x"));
    }

    #[test]
    fn test_assignment_requires_identifier() {
        let tokens = tokenize("1 = 2;").unwrap();
        let err = Parser::new(tokens).parse_interpreter_block().unwrap_err();
        assert_eq!(err.kind, ScriptErrorKind::Syntax);
    }

    #[test]
    fn test_if_else() {
        let stmts = parse("if (x > 1) y = 1; else { y = 2; }");
        let StmtKind::If {
            then_branch,
            else_branch,
            ..
        } = &stmts[0].kind
        else {
            panic!("expected if");
        };
        assert_eq!(then_branch.len(), 1);
        assert_eq!(else_branch.as_ref().unwrap().len(), 1);
    }

    #[test]
    fn test_for_in() {
        let stmts = parse("for (i in 1:10) x = i;");
        assert!(matches!(&stmts[0].kind, StmtKind::For { variable, .. } if variable == "i"));
    }

    #[test]
    fn test_method_and_property() {
        let stmts = parse("sim.addSubpop(1, 100); m.position;");
        assert!(matches!(
            &stmts[0].kind,
            StmtKind::Expr(Expr {
                kind: ExprKind::MethodCall { method, .. },
                ..
            }) if method == "addSubpop"
        ));
        assert!(matches!(
            &stmts[1].kind,
            StmtKind::Expr(Expr {
                kind: ExprKind::Property { name, .. },
                ..
            }) if name == "position"
        ));
    }

    #[test]
    fn test_callback_decl() {
        let stmts = parse("fitness(m1) { relFitness * 1.5; }");
        let StmtKind::CallbackDecl(decl) = &stmts[0].kind else {
            panic!("expected callback declaration");
        };
        assert_eq!(decl.kind, CallbackKind::Fitness);
        assert_eq!(decl.filter.as_deref(), Some("m1"));
        assert_eq!(decl.body.len(), 1);
    }

    #[test]
    fn test_callback_call_is_not_a_decl() {
        // without a brace block this is an ordinary call statement
        let stmts = parse("fitness(m1);");
        assert!(matches!(
            &stmts[0].kind,
            StmtKind::Expr(Expr {
                kind: ExprKind::Call { function, .. },
                ..
            }) if function == "fitness"
        ));
    }

    #[test]
    fn test_function_decl() {
        let stmts = parse("function double(x) { x * 2; }");
        let StmtKind::FunctionDecl { name, params, body } = &stmts[0].kind else {
            panic!("expected function declaration");
        };
        assert_eq!(name, "double");
        assert_eq!(params, &["x".to_string()]);
        assert_eq!(body.len(), 1);
    }

    #[test]
    fn test_index() {
        let stmts = parse("x[0];");
        assert!(matches!(
            &stmts[0].kind,
            StmtKind::Expr(Expr {
                kind: ExprKind::Index { .. },
                ..
            })
        ));
    }

    #[test]
    fn test_missing_semicolon() {
        let tokens = tokenize("x = 1").unwrap();
        assert!(Parser::new(tokens).parse_interpreter_block().is_err());
    }
}
