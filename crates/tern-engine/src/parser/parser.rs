//! The main parser implementation.

use crate::Error;
use crate::ast::*;
use crate::lexer::{Scanner, Span, Token, TokenKind};

/// A recursive descent parser for tern.
pub struct Parser<'a> {
    scanner: Scanner<'a>,
    current: Token,
}

impl<'a> Parser<'a> {
    /// Creates a new parser for the given source code.
    pub fn new(source: &'a str) -> Self {
        let mut scanner = Scanner::new(source);
        let current = scanner.next_token();
        Self { scanner, current }
    }

    /// Parses the source code into a Program AST node.
    pub fn parse_program(&mut self) -> Result<Program, Error> {
        let mut body = Vec::new();

        while !self.is_at_end() {
            body.push(self.parse_statement()?);
        }

        Ok(Program { body })
    }

    /// Parses a single statement.
    pub fn parse_statement(&mut self) -> Result<Statement, Error> {
        match &self.current.kind {
            TokenKind::Var | TokenKind::Let | TokenKind::Const => self.parse_declaration(),
            TokenKind::Function => self.parse_function_declaration(),
            TokenKind::If => self.parse_if_statement(),
            TokenKind::While => self.parse_while_statement(),
            TokenKind::For => self.parse_for_statement(),
            TokenKind::Return => self.parse_return_statement(),
            TokenKind::Break => self.parse_break_statement(),
            TokenKind::LeftBrace => self.parse_block_statement(),
            TokenKind::Semicolon => {
                self.advance();
                Ok(Statement::Empty)
            }
            _ => self.parse_expression_statement(),
        }
    }

    /// Parses a source that must hold exactly one expression, as found
    /// inside a template interpolation.
    pub fn parse_standalone_expression(&mut self) -> Result<Expression, Error> {
        let expression = self.parse_expression()?;
        if !self.is_at_end() {
            return Err(self.unexpected("end of expression"));
        }
        Ok(expression)
    }

    fn parse_break_statement(&mut self) -> Result<Statement, Error> {
        self.advance(); // consume 'break'

        let level = match self.current.kind {
            TokenKind::Int(level) if level > 0 => {
                self.advance();
                level as u32
            }
            TokenKind::Int(_) => return Err(self.error("break level must be positive")),
            _ => 1,
        };

        self.expect(&TokenKind::Semicolon)?;
        Ok(Statement::Break(Break { level }))
    }

    fn parse_declaration(&mut self) -> Result<Statement, Error> {
        let is_constant = self.check(&TokenKind::Const);
        self.advance();

        let name = self.expect_identifier()?;
        let declared_type = self.parse_type_annotation()?;

        let initializer = if self.check(&TokenKind::Equal) {
            self.advance();
            Some(self.parse_expression()?)
        } else if is_constant {
            return Err(self.error(&format!("constant '{}' needs an initializer", name)));
        } else {
            None
        };

        self.expect(&TokenKind::Semicolon)?;

        Ok(Statement::Declaration(Declaration {
            name,
            initializer,
            is_constant,
            declared_type,
        }))
    }

    /// `: type`, or `any` when absent.
    fn parse_type_annotation(&mut self) -> Result<String, Error> {
        if !self.check(&TokenKind::Colon) {
            return Ok("any".to_string());
        }
        self.advance();
        match &self.current.kind {
            TokenKind::Identifier(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            TokenKind::Null => {
                self.advance();
                Ok("null".to_string())
            }
            _ => Err(self.unexpected("type name")),
        }
    }

    fn parse_function_declaration(&mut self) -> Result<Statement, Error> {
        self.advance(); // consume 'function'

        let name = self.expect_identifier()?;
        self.expect(&TokenKind::LeftParen)?;

        let params = self.parse_parameters()?;

        self.expect(&TokenKind::RightParen)?;
        let return_type = self.parse_type_annotation()?;
        self.expect(&TokenKind::LeftBrace)?;

        let body = self.parse_block_body()?;

        Ok(Statement::FunctionDeclaration(FunctionDeclaration {
            name,
            params,
            return_type,
            body,
        }))
    }

    fn parse_parameters(&mut self) -> Result<Vec<Parameter>, Error> {
        let mut params = Vec::new();

        if !self.check(&TokenKind::RightParen) {
            loop {
                let name = self.expect_identifier()?;
                let declared_type = self.parse_type_annotation()?;
                params.push(Parameter {
                    name,
                    declared_type,
                });
                if !self.check(&TokenKind::Comma) {
                    break;
                }
                self.advance();
            }
        }

        Ok(params)
    }

    /// Statements up to and including the closing brace.
    fn parse_block_body(&mut self) -> Result<Vec<Statement>, Error> {
        let mut body = Vec::new();

        while !self.check(&TokenKind::RightBrace) && !self.is_at_end() {
            body.push(self.parse_statement()?);
        }

        self.expect(&TokenKind::RightBrace)?;
        Ok(body)
    }

    fn parse_if_statement(&mut self) -> Result<Statement, Error> {
        self.advance(); // consume 'if'
        self.expect(&TokenKind::LeftParen)?;
        let test = self.parse_expression()?;
        self.expect(&TokenKind::RightParen)?;

        let body = Box::new(self.parse_statement()?);
        let else_body = if self.check(&TokenKind::Else) {
            self.advance();
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };

        Ok(Statement::Condition(Condition {
            test,
            body,
            else_body,
        }))
    }

    fn parse_while_statement(&mut self) -> Result<Statement, Error> {
        self.advance(); // consume 'while'
        self.expect(&TokenKind::LeftParen)?;
        let test = self.parse_expression()?;
        self.expect(&TokenKind::RightParen)?;
        let body = self.parse_statement()?;

        Ok(Statement::Loop(Loop {
            initializer: None,
            test: Some(test),
            increment: None,
            body: Some(Box::new(body)),
        }))
    }

    fn parse_for_statement(&mut self) -> Result<Statement, Error> {
        self.advance(); // consume 'for'
        self.expect(&TokenKind::LeftParen)?;

        // Both initializer forms consume their own ';'
        let initializer = match self.current.kind {
            TokenKind::Semicolon => {
                self.advance();
                None
            }
            TokenKind::Let | TokenKind::Var | TokenKind::Const => {
                Some(Box::new(self.parse_declaration()?))
            }
            _ => Some(Box::new(self.parse_expression_statement()?)),
        };

        let test = if self.check(&TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect(&TokenKind::Semicolon)?;

        let increment = if self.check(&TokenKind::RightParen) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect(&TokenKind::RightParen)?;

        let body = self.parse_statement()?;

        Ok(Statement::Loop(Loop {
            initializer,
            test,
            increment,
            body: Some(Box::new(body)),
        }))
    }

    fn parse_return_statement(&mut self) -> Result<Statement, Error> {
        self.advance(); // consume 'return'

        let value = if self.check(&TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_expression()?)
        };

        self.expect(&TokenKind::Semicolon)?;
        Ok(Statement::Return(Return { value }))
    }

    fn parse_block_statement(&mut self) -> Result<Statement, Error> {
        self.advance(); // consume '{'
        let body = self.parse_block_body()?;
        Ok(Statement::Block(Block { body }))
    }

    fn parse_expression_statement(&mut self) -> Result<Statement, Error> {
        let expression = self.parse_expression()?;
        self.expect(&TokenKind::Semicolon)?;
        Ok(Statement::Expression(expression))
    }

    /// Parses an expression.
    pub fn parse_expression(&mut self) -> Result<Expression, Error> {
        self.parse_assignment()
    }

    fn parse_assignment(&mut self) -> Result<Expression, Error> {
        let target = self.parse_conditional()?;

        let operator = match self.current.kind {
            TokenKind::Equal => AssignmentOperator::Assign,
            TokenKind::PlusEqual => AssignmentOperator::AddAssign,
            TokenKind::MinusEqual => AssignmentOperator::SubAssign,
            TokenKind::StarEqual => AssignmentOperator::MulAssign,
            TokenKind::SlashEqual => AssignmentOperator::DivAssign,
            TokenKind::PercentEqual => AssignmentOperator::ModAssign,
            TokenKind::StarStarEqual => AssignmentOperator::PowAssign,
            _ => return Ok(target),
        };
        self.advance();

        let value = self.parse_assignment()?;
        Ok(Expression::Assignment(AssignmentExpression {
            operator,
            target: Box::new(target),
            value: Box::new(value),
        }))
    }

    /// Parse conditional (ternary) expression: test ? consequent : alternate
    fn parse_conditional(&mut self) -> Result<Expression, Error> {
        let test = self.parse_logical_or()?;

        if self.check(&TokenKind::Question) {
            self.advance(); // consume '?'
            let consequent = self.parse_assignment()?;
            self.expect(&TokenKind::Colon)?;
            let alternate = self.parse_assignment()?;

            return Ok(Expression::Ternary(TernaryExpression {
                test: Box::new(test),
                consequent: Box::new(consequent),
                alternate: Box::new(alternate),
            }));
        }

        Ok(test)
    }

    fn parse_logical_or(&mut self) -> Result<Expression, Error> {
        let mut left = self.parse_logical_and()?;

        while self.check(&TokenKind::PipePipe) {
            self.advance();
            let right = self.parse_logical_and()?;
            left = binary(BinaryOperator::Or, left, right);
        }

        Ok(left)
    }

    fn parse_logical_and(&mut self) -> Result<Expression, Error> {
        let mut left = self.parse_equality()?;

        while self.check(&TokenKind::AmpersandAmpersand) {
            self.advance();
            let right = self.parse_equality()?;
            left = binary(BinaryOperator::And, left, right);
        }

        Ok(left)
    }

    fn parse_equality(&mut self) -> Result<Expression, Error> {
        let mut left = self.parse_comparison()?;

        loop {
            let operator = match self.current.kind {
                TokenKind::EqualEqual => BinaryOperator::Equal,
                TokenKind::NotEqual => BinaryOperator::NotEqual,
                _ => break,
            };
            self.advance();
            let right = self.parse_comparison()?;
            left = binary(operator, left, right);
        }

        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<Expression, Error> {
        let mut left = self.parse_additive()?;

        loop {
            let operator = match self.current.kind {
                TokenKind::LessThan => BinaryOperator::Less,
                TokenKind::LessThanEqual => BinaryOperator::LessEqual,
                TokenKind::GreaterThan => BinaryOperator::Greater,
                TokenKind::GreaterThanEqual => BinaryOperator::GreaterEqual,
                _ => break,
            };
            self.advance();
            let right = self.parse_additive()?;
            left = binary(operator, left, right);
        }

        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expression, Error> {
        let mut left = self.parse_multiplicative()?;

        loop {
            let operator = match self.current.kind {
                TokenKind::Plus => BinaryOperator::Add,
                TokenKind::Minus => BinaryOperator::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = binary(operator, left, right);
        }

        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expression, Error> {
        let mut left = self.parse_unary()?;

        loop {
            let operator = match self.current.kind {
                TokenKind::Star => BinaryOperator::Mul,
                TokenKind::Slash => BinaryOperator::Div,
                TokenKind::Percent => BinaryOperator::Mod,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            left = binary(operator, left, right);
        }

        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expression, Error> {
        let operator = match self.current.kind {
            TokenKind::Minus => UnaryOperator::Minus,
            TokenKind::Bang => UnaryOperator::Not,
            TokenKind::PlusPlus => UnaryOperator::Increment,
            TokenKind::MinusMinus => UnaryOperator::Decrement,
            _ => return self.parse_exponent(),
        };
        self.advance();

        let operand = self.parse_unary()?;
        Ok(Expression::Unary(UnaryExpression {
            operator,
            operand: Box::new(operand),
            postfix: false,
        }))
    }

    /// `a ** b`, right-associative. `-2 ** 2` is `-(2 ** 2)` while the
    /// right operand may itself be negated: `2 ** -1`.
    fn parse_exponent(&mut self) -> Result<Expression, Error> {
        let base = self.parse_postfix()?;

        if self.check(&TokenKind::StarStar) {
            self.advance();
            let exponent = self.parse_unary()?;
            return Ok(binary(BinaryOperator::Pow, base, exponent));
        }

        Ok(base)
    }

    fn parse_postfix(&mut self) -> Result<Expression, Error> {
        let expr = self.parse_call()?;

        let operator = match self.current.kind {
            TokenKind::PlusPlus => UnaryOperator::Increment,
            TokenKind::MinusMinus => UnaryOperator::Decrement,
            _ => return Ok(expr),
        };
        self.advance();

        Ok(Expression::Unary(UnaryExpression {
            operator,
            operand: Box::new(expr),
            postfix: true,
        }))
    }

    fn parse_call(&mut self) -> Result<Expression, Error> {
        let mut expr = self.parse_primary()?;

        loop {
            if self.check(&TokenKind::LeftParen) {
                self.advance();
                let arguments = self.parse_list(&TokenKind::RightParen)?;
                expr = Expression::Call(CallExpression {
                    callee: Box::new(expr),
                    arguments,
                });
            } else if self.check(&TokenKind::Dot) {
                self.advance();
                let member = self.expect_identifier()?;
                expr = Expression::Member(MemberExpression {
                    object: Box::new(expr),
                    member,
                });
            } else if self.check(&TokenKind::LeftBracket) {
                self.advance();
                let indices = self.parse_list(&TokenKind::RightBracket)?;
                if indices.is_empty() {
                    return Err(self.error("index expression needs at least one index"));
                }
                expr = Expression::Index(IndexExpression {
                    object: Box::new(expr),
                    indices,
                });
            } else {
                break;
            }
        }

        Ok(expr)
    }

    /// Comma-separated expressions up to and including `close`. A trailing
    /// comma is accepted.
    fn parse_list(&mut self, close: &TokenKind) -> Result<Vec<Expression>, Error> {
        let mut items = Vec::new();

        while !self.check(close) && !self.is_at_end() {
            items.push(self.parse_expression()?);
            if !self.check(close) {
                self.expect(&TokenKind::Comma)?;
            }
        }

        self.expect(close)?;
        Ok(items)
    }

    fn parse_primary(&mut self) -> Result<Expression, Error> {
        let literal = match &self.current.kind {
            TokenKind::Int(n) => Literal::Int(*n),
            TokenKind::Float(n) => Literal::Float(*n),
            TokenKind::String(s) => Literal::String(s.clone()),
            TokenKind::True => Literal::Boolean(true),
            TokenKind::False => Literal::Boolean(false),
            TokenKind::Null => Literal::Null,
            TokenKind::Identifier(name) => {
                let id = Identifier::new(name.clone());
                self.advance();
                return Ok(Expression::Identifier(id));
            }
            TokenKind::Template {
                chunks,
                expressions,
            } => {
                let chunks = chunks.clone();
                let sources = expressions.clone();
                let span = self.current.span;
                self.advance();
                return self.parse_template(chunks, &sources, span);
            }
            TokenKind::LeftParen => {
                self.advance();
                let expr = self.parse_expression()?;
                self.expect(&TokenKind::RightParen)?;
                return Ok(expr);
            }
            TokenKind::LeftBracket => {
                self.advance();
                return Ok(Expression::Array(self.parse_list(&TokenKind::RightBracket)?));
            }
            TokenKind::HashBrace => {
                self.advance();
                return Ok(Expression::Set(self.parse_list(&TokenKind::RightBrace)?));
            }
            TokenKind::LeftBrace => return self.parse_object_literal(),
            _ => return Err(self.unexpected("expression")),
        };
        self.advance();
        Ok(Expression::Literal(literal))
    }

    fn parse_template(
        &mut self,
        chunks: Vec<String>,
        sources: &[String],
        span: Span,
    ) -> Result<Expression, Error> {
        let mut expressions = Vec::with_capacity(sources.len());
        for source in sources {
            let expression = Parser::new(source)
                .parse_standalone_expression()
                .map_err(|err| match err {
                    Error::Syntax { message, .. } => {
                        let (line, column) = span.line_column(self.scanner.source());
                        Error::Syntax {
                            message: format!("in template interpolation: {}", message),
                            line,
                            column,
                        }
                    }
                    other => other,
                })?;
            expressions.push(expression);
        }

        Ok(Expression::Template(Template {
            chunks,
            expressions,
        }))
    }

    fn parse_object_literal(&mut self) -> Result<Expression, Error> {
        self.advance(); // consume '{'
        let mut properties = Vec::new();

        while !self.check(&TokenKind::RightBrace) && !self.is_at_end() {
            let key = match &self.current.kind {
                TokenKind::Identifier(name) | TokenKind::String(name) => name.clone(),
                _ => return Err(self.unexpected("property name")),
            };
            self.advance();
            self.expect(&TokenKind::Colon)?;
            let value = self.parse_expression()?;

            properties.push(Property { key, value });

            if !self.check(&TokenKind::RightBrace) {
                self.expect(&TokenKind::Comma)?;
            }
        }

        self.expect(&TokenKind::RightBrace)?;

        Ok(Expression::Object(properties))
    }

    // Helper methods

    fn advance(&mut self) {
        self.current = self.scanner.next_token();
    }

    fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(&self.current.kind) == std::mem::discriminant(kind)
    }

    fn expect(&mut self, kind: &TokenKind) -> Result<(), Error> {
        if self.check(kind) {
            self.advance();
            Ok(())
        } else {
            Err(self.unexpected(&kind.to_string()))
        }
    }

    fn expect_identifier(&mut self) -> Result<String, Error> {
        if let TokenKind::Identifier(name) = &self.current.kind {
            let name = name.clone();
            self.advance();
            Ok(name)
        } else {
            Err(self.unexpected("identifier"))
        }
    }

    fn is_at_end(&self) -> bool {
        matches!(self.current.kind, TokenKind::Eof)
    }

    /// A syntax error at the current token.
    fn error(&self, message: &str) -> Error {
        let (line, column) = self.current.span.line_column(self.scanner.source());
        Error::Syntax {
            message: message.to_string(),
            line,
            column,
        }
    }

    fn unexpected(&self, expected: &str) -> Error {
        match &self.current.kind {
            TokenKind::Invalid(reason) => self.error(reason),
            found => self.error(&format!("Expected {}, found {}", expected, found)),
        }
    }
}

fn binary(operator: BinaryOperator, left: Expression, right: Expression) -> Expression {
    Expression::Binary(BinaryExpression {
        operator,
        left: Box::new(left),
        right: Box::new(right),
    })
}
