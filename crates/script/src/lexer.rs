//! Hand-written tokenizer.
//!
//! Numeric literal classification follows the language's exponent rule: a
//! literal without a decimal point and with a non-negative exponent stays an
//! integer (`3e2` is the integer 300), while a decimal point or a negative
//! exponent produces a float (`3.1`, `3e-2`).

use crate::error::{ScriptError, ScriptErrorKind, SourceLocation};
use crate::token::{SpannedToken, Token};

pub struct Lexer<'src> {
    chars: Vec<char>,
    pos: usize,
    line: u32,
    column: u32,
    _source: std::marker::PhantomData<&'src str>,
}

impl<'src> Lexer<'src> {
    pub fn new(source: &'src str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
            _source: std::marker::PhantomData,
        }
    }

    pub fn tokenize(mut self) -> Result<Vec<SpannedToken>, ScriptError> {
        let mut tokens = Vec::new();
        loop {
            self.skip_whitespace_and_comments();
            let loc = self.location();
            let Some(c) = self.peek() else {
                tokens.push(SpannedToken::new(Token::Eof, loc));
                return Ok(tokens);
            };

            let token = if c.is_ascii_digit() {
                self.lex_number(loc)?
            } else if c == '"' {
                self.lex_string(loc)?
            } else if c.is_ascii_alphabetic() || c == '_' {
                self.lex_identifier()
            } else {
                self.lex_operator(loc)?
            };
            tokens.push(SpannedToken::new(token, loc));
        }
    }

    fn location(&self) -> SourceLocation {
        SourceLocation::new(self.line, self.column)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.advance();
                }
                Some('/') if self.peek_at(1) == Some('/') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                _ => return,
            }
        }
    }

    fn lex_number(&mut self, loc: SourceLocation) -> Result<Token, ScriptError> {
        let mut digits = String::new();
        let mut is_float = false;

        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                digits.push(c);
                self.advance();
            } else {
                break;
            }
        }

        if self.peek() == Some('.') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
            is_float = true;
            digits.push('.');
            self.advance();
            while let Some(c) = self.peek() {
                if c.is_ascii_digit() {
                    digits.push(c);
                    self.advance();
                } else {
                    break;
                }
            }
        }

        let mut exponent: Option<(bool, String)> = None;
        if self.peek() == Some('e') || self.peek() == Some('E') {
            let after = self.peek_at(1);
            let (negative, digit_offset) = match after {
                Some('-') => (true, 2),
                Some('+') => (false, 2),
                _ => (false, 1),
            };
            if self.peek_at(digit_offset).is_some_and(|c| c.is_ascii_digit()) {
                self.advance(); // e
                if digit_offset == 2 {
                    self.advance(); // sign
                }
                let mut exp_digits = String::new();
                while let Some(c) = self.peek() {
                    if c.is_ascii_digit() {
                        exp_digits.push(c);
                        self.advance();
                    } else {
                        break;
                    }
                }
                exponent = Some((negative, exp_digits));
            }
        }

        // a negative exponent forces a float even without a decimal point
        if matches!(&exponent, Some((true, _))) {
            is_float = true;
        }

        if is_float {
            let mut literal = digits;
            if let Some((negative, exp)) = exponent {
                literal.push('e');
                if negative {
                    literal.push('-');
                }
                literal.push_str(&exp);
            }
            let value: f64 = literal.parse().map_err(|_| {
                ScriptError::at(
                    ScriptErrorKind::Syntax,
                    format!("malformed float literal '{literal}'"),
                    loc,
                )
            })?;
            Ok(Token::Float(value))
        } else {
            let base: i64 = digits.parse().map_err(|_| {
                ScriptError::at(
                    ScriptErrorKind::Syntax,
                    format!("integer literal '{digits}' out of range"),
                    loc,
                )
            })?;
            let value = match exponent {
                None => base,
                Some((_, exp)) => {
                    let exp: u32 = exp.parse().map_err(|_| {
                        ScriptError::at(
                            ScriptErrorKind::Syntax,
                            format!("integer exponent '{exp}' out of range"),
                            loc,
                        )
                    })?;
                    10i64
                        .checked_pow(exp)
                        .and_then(|scale| base.checked_mul(scale))
                        .ok_or_else(|| {
                            ScriptError::at(
                                ScriptErrorKind::Range,
                                format!("integer literal {base}e{exp} overflows"),
                                loc,
                            )
                        })?
                }
            };
            Ok(Token::Integer(value))
        }
    }

    fn lex_string(&mut self, loc: SourceLocation) -> Result<Token, ScriptError> {
        self.advance(); // opening quote
        let mut value = String::new();
        loop {
            match self.advance() {
                None => {
                    return Err(ScriptError::at(
                        ScriptErrorKind::Syntax,
                        "unterminated string literal",
                        loc,
                    ))
                }
                Some('"') => return Ok(Token::Str(value)),
                Some('\\') => match self.advance() {
                    Some('t') => value.push('\t'),
                    Some('n') => value.push('\n'),
                    Some('"') => value.push('"'),
                    Some('\\') => value.push('\\'),
                    Some(other) => {
                        return Err(ScriptError::at(
                            ScriptErrorKind::Syntax,
                            format!("unknown escape sequence '\\{other}'"),
                            loc,
                        ))
                    }
                    None => {
                        return Err(ScriptError::at(
                            ScriptErrorKind::Syntax,
                            "unterminated string literal",
                            loc,
                        ))
                    }
                },
                Some(c) => value.push(c),
            }
        }
    }

    fn lex_identifier(&mut self) -> Token {
        let mut name = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                name.push(c);
                self.advance();
            } else {
                break;
            }
        }
        match name.as_str() {
            "if" => Token::If,
            "else" => Token::Else,
            "for" => Token::For,
            "in" => Token::In,
            "while" => Token::While,
            "function" => Token::Function,
            _ => Token::Identifier(name),
        }
    }

    fn lex_operator(&mut self, loc: SourceLocation) -> Result<Token, ScriptError> {
        let c = self.advance().expect("caller checked non-empty");
        let token = match c {
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' => Token::Star,
            '/' => Token::Slash,
            '%' => Token::Percent,
            ':' => Token::Colon,
            '.' => Token::Dot,
            ';' => Token::Semicolon,
            ',' => Token::Comma,
            '(' => Token::ParenOpen,
            ')' => Token::ParenClose,
            '{' => Token::BraceOpen,
            '}' => Token::BraceClose,
            '[' => Token::BracketOpen,
            ']' => Token::BracketClose,
            '&' => Token::And,
            '|' => Token::Or,
            '=' => {
                if self.peek() == Some('=') {
                    self.advance();
                    Token::EqEq
                } else {
                    Token::Assign
                }
            }
            '!' => {
                if self.peek() == Some('=') {
                    self.advance();
                    Token::NotEq
                } else {
                    Token::Not
                }
            }
            '<' => {
                if self.peek() == Some('=') {
                    self.advance();
                    Token::LessEq
                } else {
                    Token::Less
                }
            }
            '>' => {
                if self.peek() == Some('=') {
                    self.advance();
                    Token::GreaterEq
                } else {
                    Token::Greater
                }
            }
            other => {
                return Err(ScriptError::at(
                    ScriptErrorKind::Syntax,
                    format!("unexpected character '{other}'"),
                    loc,
                ))
            }
        };
        Ok(token)
    }
}

/// Tokenize a complete source string.
pub fn tokenize(source: &str) -> Result<Vec<SpannedToken>, ScriptError> {
    Lexer::new(source).tokenize()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Token> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|t| t.token)
            .collect()
    }

    #[test]
    fn test_integer_literals() {
        assert_eq!(kinds("3;"), vec![Token::Integer(3), Token::Semicolon, Token::Eof]);
        assert_eq!(
            kinds("3e2;"),
            vec![Token::Integer(300), Token::Semicolon, Token::Eof]
        );
    }

    #[test]
    fn test_float_literals() {
        assert_eq!(
            kinds("3.1;"),
            vec![Token::Float(3.1), Token::Semicolon, Token::Eof]
        );
        assert_eq!(
            kinds("3.1e2;"),
            vec![Token::Float(3.1e2), Token::Semicolon, Token::Eof]
        );
        // negative exponent demotes to float even without a decimal point
        assert_eq!(
            kinds("3e-2;"),
            vec![Token::Float(3e-2), Token::Semicolon, Token::Eof]
        );
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(
            kinds("\"foo\\tbar\";"),
            vec![
                Token::Str("foo\tbar".into()),
                Token::Semicolon,
                Token::Eof
            ]
        );
        assert_eq!(kinds("\"a\\\"b\";")[0], Token::Str("a\"b".into()));
    }

    #[test]
    fn test_unterminated_string() {
        let err = tokenize("\"oops").unwrap_err();
        assert_eq!(err.kind, ScriptErrorKind::Syntax);
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            kinds("a == b != c <= d >= e"),
            vec![
                Token::Identifier("a".into()),
                Token::EqEq,
                Token::Identifier("b".into()),
                Token::NotEq,
                Token::Identifier("c".into()),
                Token::LessEq,
                Token::Identifier("d".into()),
                Token::GreaterEq,
                Token::Identifier("e".into()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_comments_and_locations() {
        let tokens = tokenize("x; // trailing\ny;").unwrap();
        assert_eq!(tokens[2].token, Token::Identifier("y".into()));
        assert_eq!(tokens[2].location.line, 2);
        assert_eq!(tokens[2].location.column, 1);
    }

    #[test]
    fn test_unexpected_character() {
        let err = tokenize("$foo;").unwrap_err();
        assert_eq!(err.kind, ScriptErrorKind::Syntax);
        assert!(err.message.contains('$'));
    }

    #[test]
    fn test_integer_overflow() {
        let err = tokenize("9e30;").unwrap_err();
        assert_eq!(err.kind, ScriptErrorKind::Range);
    }
}
