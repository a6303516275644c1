//! Formula parser
//!
//! A recursive descent parser for formula source text with operator
//! precedence. Calls to `if`, `where`, `list` and `object` become
//! [`Expr::Macro`] nodes; every other call is an [`Expr::Invoke`].

use crate::ast::{Argument, BinaryOperator, Expr, Literal, UnaryOperator};
use crate::error::{FormulaError, FormulaResult};
use calcflow_core::{parse_number, Decimal};

/// Names parsed as macros when followed by `(`
pub const MACROS: [&str; 4] = ["if", "where", "list", "object"];

/// Parse formula text into an AST
///
/// A single leading `=` is accepted and ignored.
///
/// # Example
/// ```rust
/// use calcflow_formula::parse_formula;
///
/// let ast = parse_formula("1 + 2").unwrap();
/// let ast = parse_formula("=round(Price * 1.2, 2)").unwrap();
/// let ast = parse_formula("if(Qty > 10, then: \"bulk\", else: \"retail\")").unwrap();
/// ```
pub fn parse_formula(formula: &str) -> FormulaResult<Expr> {
    let formula = formula.trim();
    let formula = formula.strip_prefix('=').unwrap_or(formula);

    let mut parser = FormulaParser::new(formula)?;
    let expr = parser.parse_expression()?;

    if !matches!(parser.current_token(), Token::Eof) {
        return Err(FormulaError::Parse(format!(
            "Unexpected {:?} after expression",
            parser.current_token()
        )));
    }

    Ok(expr)
}

/// Token types
#[derive(Debug, Clone, PartialEq)]
enum Token {
    // Literals
    Number(Decimal),
    String(String),
    Boolean(bool),

    Identifier(String),

    // Keywords
    And,
    Or,
    Not,

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    Percent,
    Ampersand,
    Equal,
    NotEqual,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,
    Colon,
    Comma,
    Dot,

    // Delimiters
    LeftParen,
    RightParen,

    Eof,
}

/// Formula parser
struct FormulaParser<'a> {
    input: &'a str,
    pos: usize,
    current_token: Token,
}

impl<'a> FormulaParser<'a> {
    fn new(input: &'a str) -> FormulaResult<Self> {
        let mut parser = Self {
            input,
            pos: 0,
            current_token: Token::Eof,
        };
        parser.advance_token()?;
        Ok(parser)
    }

    // === Token scanning ===

    fn advance_token(&mut self) -> FormulaResult<()> {
        self.current_token = self.scan_token()?;
        Ok(())
    }

    fn scan_token(&mut self) -> FormulaResult<Token> {
        self.skip_whitespace();

        let Some(c) = self.peek_char() else {
            return Ok(Token::Eof);
        };

        let single = match c {
            '+' => Some(Token::Plus),
            '-' => Some(Token::Minus),
            '*' => Some(Token::Star),
            '/' => Some(Token::Slash),
            '^' => Some(Token::Caret),
            '%' => Some(Token::Percent),
            '&' => Some(Token::Ampersand),
            ':' => Some(Token::Colon),
            ',' => Some(Token::Comma),
            '(' => Some(Token::LeftParen),
            ')' => Some(Token::RightParen),
            '=' => Some(Token::Equal),
            '.' if !self.peek_char_at(1).map_or(false, |c| c.is_ascii_digit()) => {
                Some(Token::Dot)
            }
            _ => None,
        };
        if let Some(token) = single {
            self.advance();
            return Ok(token);
        }

        // Two-character operators
        if c == '<' {
            self.advance();
            return Ok(match self.peek_char() {
                Some('=') => {
                    self.advance();
                    Token::LessEqual
                }
                Some('>') => {
                    self.advance();
                    Token::NotEqual
                }
                _ => Token::LessThan,
            });
        }

        if c == '>' {
            self.advance();
            if self.peek_char() == Some('=') {
                self.advance();
                return Ok(Token::GreaterEqual);
            }
            return Ok(Token::GreaterThan);
        }

        if c == '!' && self.peek_char_at(1) == Some('=') {
            self.advance();
            self.advance();
            return Ok(Token::NotEqual);
        }

        if c == '"' {
            return self.scan_string();
        }

        if c.is_ascii_digit() || c == '.' {
            return self.scan_number();
        }

        if c.is_alphabetic() || c == '_' {
            return Ok(self.scan_identifier());
        }

        Err(FormulaError::Parse(format!(
            "Unexpected character '{}' at offset {}",
            c, self.pos
        )))
    }

    fn scan_string(&mut self) -> FormulaResult<Token> {
        let start = self.pos;
        self.advance(); // Skip opening quote

        let mut s = String::new();
        loop {
            match self.peek_char() {
                Some('"') if self.peek_char_at(1) == Some('"') => {
                    // Escaped quote ("")
                    s.push('"');
                    self.advance();
                    self.advance();
                }
                Some('"') => {
                    self.advance();
                    return Ok(Token::String(s));
                }
                Some(c) => {
                    s.push(c);
                    self.advance();
                }
                None => {
                    return Err(FormulaError::Parse(format!(
                        "Unterminated string starting at offset {}",
                        start
                    )))
                }
            }
        }
    }

    fn scan_number(&mut self) -> FormulaResult<Token> {
        let start = self.pos;

        // Integer part
        while self.peek_char().map_or(false, |c| c.is_ascii_digit()) {
            self.advance();
        }

        // Decimal part
        if self.peek_char() == Some('.') {
            self.advance();
            while self.peek_char().map_or(false, |c| c.is_ascii_digit()) {
                self.advance();
            }
        }

        // Exponent part, only when digits follow
        if self.peek_char().map_or(false, |c| c == 'e' || c == 'E') {
            let sign = self.peek_char_at(1).map_or(false, |c| c == '+' || c == '-');
            let digit_at = if sign { 2 } else { 1 };
            if self.peek_char_at(digit_at).map_or(false, |c| c.is_ascii_digit()) {
                for _ in 0..digit_at {
                    self.advance();
                }
                while self.peek_char().map_or(false, |c| c.is_ascii_digit()) {
                    self.advance();
                }
            }
        }

        let text = &self.input[start..self.pos];
        parse_number(text)
            .map(Token::Number)
            .ok_or_else(|| FormulaError::Parse(format!("Invalid number: {}", text)))
    }

    fn scan_identifier(&mut self) -> Token {
        let start = self.pos;

        while self
            .peek_char()
            .map_or(false, |c| c.is_alphanumeric() || c == '_')
        {
            self.advance();
        }

        let text = &self.input[start..self.pos];

        match text.to_ascii_lowercase().as_str() {
            "true" => Token::Boolean(true),
            "false" => Token::Boolean(false),
            "and" => Token::And,
            "or" => Token::Or,
            "not" => Token::Not,
            _ => Token::Identifier(text.to_string()),
        }
    }

    // === Helper methods ===

    fn peek_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn peek_char_at(&self, offset: usize) -> Option<char> {
        self.input[self.pos..].chars().nth(offset)
    }

    /// Next non-whitespace character after the current token
    fn peek_past_whitespace(&self) -> Option<char> {
        self.input[self.pos..].chars().find(|c| !c.is_whitespace())
    }

    fn advance(&mut self) {
        if let Some(c) = self.peek_char() {
            self.pos += c.len_utf8();
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek_char().map_or(false, |c| c.is_whitespace()) {
            self.advance();
        }
    }

    fn current_token(&self) -> &Token {
        &self.current_token
    }

    fn consume(&mut self) -> FormulaResult<Token> {
        let token = std::mem::replace(&mut self.current_token, Token::Eof);
        self.advance_token()?;
        Ok(token)
    }

    fn expect(&mut self, expected: &Token) -> FormulaResult<()> {
        if self.current_token() == expected {
            self.consume()?;
            Ok(())
        } else {
            Err(FormulaError::Parse(format!(
                "Expected {:?}, got {:?}",
                expected,
                self.current_token()
            )))
        }
    }

    // === Expression parsing with precedence ===
    // Precedence (lowest to highest):
    // 1. or
    // 2. and
    // 3. Comparison: =, <>, !=, <, <=, >, >=
    // 4. Concatenation: &
    // 5. Addition/Subtraction: +, -
    // 6. Multiplication/Division/Modulo: *, /, %
    // 7. Exponentiation: ^ (right associative)
    // 8. Unary: -, +, not
    // 9. Postfix: .member, (args)
    // 10. Primary: literals, identifiers, macros, parentheses

    fn parse_expression(&mut self) -> FormulaResult<Expr> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> FormulaResult<Expr> {
        let mut left = self.parse_and()?;

        while matches!(self.current_token(), Token::Or) {
            self.consume()?;
            let right = self.parse_and()?;
            left = Expr::binary(BinaryOperator::Or, left, right);
        }

        Ok(left)
    }

    fn parse_and(&mut self) -> FormulaResult<Expr> {
        let mut left = self.parse_comparison()?;

        while matches!(self.current_token(), Token::And) {
            self.consume()?;
            let right = self.parse_comparison()?;
            left = Expr::binary(BinaryOperator::And, left, right);
        }

        Ok(left)
    }

    fn parse_comparison(&mut self) -> FormulaResult<Expr> {
        let mut left = self.parse_concatenation()?;

        loop {
            let op = match self.current_token() {
                Token::Equal => BinaryOperator::Equal,
                Token::NotEqual => BinaryOperator::NotEqual,
                Token::LessThan => BinaryOperator::LessThan,
                Token::LessEqual => BinaryOperator::LessEqual,
                Token::GreaterThan => BinaryOperator::GreaterThan,
                Token::GreaterEqual => BinaryOperator::GreaterEqual,
                _ => break,
            };

            self.consume()?;
            let right = self.parse_concatenation()?;
            left = Expr::binary(op, left, right);
        }

        Ok(left)
    }

    fn parse_concatenation(&mut self) -> FormulaResult<Expr> {
        let mut left = self.parse_additive()?;

        while matches!(self.current_token(), Token::Ampersand) {
            self.consume()?;
            let right = self.parse_additive()?;
            left = Expr::binary(BinaryOperator::Concat, left, right);
        }

        Ok(left)
    }

    fn parse_additive(&mut self) -> FormulaResult<Expr> {
        let mut left = self.parse_multiplicative()?;

        loop {
            let op = match self.current_token() {
                Token::Plus => BinaryOperator::Add,
                Token::Minus => BinaryOperator::Subtract,
                _ => break,
            };

            self.consume()?;
            let right = self.parse_multiplicative()?;
            left = Expr::binary(op, left, right);
        }

        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> FormulaResult<Expr> {
        let mut left = self.parse_exponent()?;

        loop {
            let op = match self.current_token() {
                Token::Star => BinaryOperator::Multiply,
                Token::Slash => BinaryOperator::Divide,
                Token::Percent => BinaryOperator::Modulo,
                _ => break,
            };

            self.consume()?;
            let right = self.parse_exponent()?;
            left = Expr::binary(op, left, right);
        }

        Ok(left)
    }

    fn parse_exponent(&mut self) -> FormulaResult<Expr> {
        let base = self.parse_unary()?;

        if matches!(self.current_token(), Token::Caret) {
            self.consume()?;
            let exponent = self.parse_exponent()?;
            return Ok(Expr::binary(BinaryOperator::Power, base, exponent));
        }

        Ok(base)
    }

    fn parse_unary(&mut self) -> FormulaResult<Expr> {
        match self.current_token() {
            Token::Minus => {
                self.consume()?;
                let operand = self.parse_unary()?;
                Ok(Expr::unary(UnaryOperator::Negate, operand))
            }
            Token::Plus => {
                self.consume()?;
                self.parse_unary()
            }
            Token::Not => {
                self.consume()?;
                let operand = self.parse_unary()?;
                Ok(Expr::unary(UnaryOperator::Not, operand))
            }
            _ => self.parse_postfix(),
        }
    }

    fn parse_postfix(&mut self) -> FormulaResult<Expr> {
        let mut expr = self.parse_primary()?;

        loop {
            match self.current_token() {
                Token::Dot => {
                    self.consume()?;
                    match self.consume()? {
                        Token::Identifier(member) => {
                            expr = Expr::Access {
                                value: Box::new(expr),
                                member,
                            };
                        }
                        other => {
                            return Err(FormulaError::Parse(format!(
                                "Expected member name after '.', got {:?}",
                                other
                            )))
                        }
                    }
                }
                Token::LeftParen => {
                    let args = self.parse_arguments("call")?;
                    let mut positional = Vec::with_capacity(args.len());
                    for arg in args {
                        if let Some(name) = arg.name {
                            return Err(FormulaError::Parse(format!(
                                "Named argument '{}' is only allowed in macros",
                                name
                            )));
                        }
                        positional.push(arg.value);
                    }
                    expr = Expr::call(expr, positional);
                }
                _ => break,
            }
        }

        Ok(expr)
    }

    fn parse_primary(&mut self) -> FormulaResult<Expr> {
        match self.consume()? {
            Token::Number(n) => Ok(Expr::Literal(Literal::Number(n))),
            Token::String(s) => Ok(Expr::Literal(Literal::String(s))),
            Token::Boolean(b) => Ok(Expr::Literal(Literal::Boolean(b))),

            Token::Identifier(name) => {
                let is_macro = MACROS.iter().any(|m| m.eq_ignore_ascii_case(&name));
                if is_macro && matches!(self.current_token(), Token::LeftParen) {
                    let args = self.parse_arguments(&name)?;
                    Ok(Expr::macro_call(name.to_ascii_lowercase(), args))
                } else {
                    Ok(Expr::Identifier(name))
                }
            }

            Token::LeftParen => {
                let inner = self.parse_expression()?;
                self.expect(&Token::RightParen)?;
                Ok(Expr::Block(Box::new(inner)))
            }

            token => Err(FormulaError::Parse(format!(
                "Unexpected token: {:?}",
                token
            ))),
        }
    }

    /// Parse `( [name:] expr, ... )`, consuming both parentheses
    fn parse_arguments(&mut self, context: &str) -> FormulaResult<Vec<Argument>> {
        self.expect(&Token::LeftParen)?;

        let mut args = Vec::new();

        if matches!(self.current_token(), Token::RightParen) {
            self.consume()?;
            return Ok(args);
        }

        loop {
            args.push(self.parse_argument()?);

            match self.current_token() {
                Token::Comma => {
                    self.consume()?;
                }
                Token::RightParen => {
                    self.consume()?;
                    break;
                }
                other => {
                    return Err(FormulaError::Parse(format!(
                        "Expected ',' or ')' in {} arguments, got {:?}",
                        context, other
                    )))
                }
            }
        }

        Ok(args)
    }

    fn parse_argument(&mut self) -> FormulaResult<Argument> {
        if let Token::Identifier(name) = self.current_token() {
            if self.peek_past_whitespace() == Some(':') {
                let name = name.clone();
                self.consume()?; // name
                self.consume()?; // ':'
                let value = self.parse_expression()?;
                return Ok(Argument::named(name, value));
            }
        }

        Ok(Argument::positional(self.parse_expression()?))
    }
}
