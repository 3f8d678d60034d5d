use crate::syntax::{precedence::Precedence, statement::Statement, token_type::TokenType};

use super::Parser;

impl Parser {
    pub(super) fn parse_statement(&mut self) -> Option<Statement> {
        match self.current_token.token_type {
            TokenType::Let => self.parse_let_statement(),
            TokenType::Return => self.parse_return_statement(),
            TokenType::Fn if self.is_peek_token(TokenType::Ident) => {
                self.parse_function_statement()
            }
            TokenType::For => self.parse_for_statement(),
            TokenType::Ident if self.is_peek_token(TokenType::Assign) => {
                self.parse_assignment_statement()
            }
            TokenType::Semicolon => None,
            _ => self.parse_expression_statement(),
        }
    }

    fn parse_let_statement(&mut self) -> Option<Statement> {
        let start = self.current_token.position;

        if !self.expect_peek(TokenType::Ident) {
            return None;
        }
        let name = self.current_token.literal.clone();

        if !self.expect_peek(TokenType::Assign) {
            return None;
        }
        self.next_token();

        let value = self.parse_expression(Precedence::Lowest)?;
        self.skip_optional_semicolon();

        Some(Statement::Let {
            name,
            value,
            span: self.span_from(start),
        })
    }

    fn parse_assignment_statement(&mut self) -> Option<Statement> {
        let start = self.current_token.position;
        let name = self.current_token.literal.clone();
        self.next_token(); // consume the name, now on `=`
        self.next_token();

        let value = self.parse_expression(Precedence::Lowest)?;
        self.skip_optional_semicolon();

        Some(Statement::Assign {
            name,
            value,
            span: self.span_from(start),
        })
    }

    fn parse_return_statement(&mut self) -> Option<Statement> {
        let start = self.current_token.position;

        let value = if self.is_peek_token(TokenType::Semicolon)
            || self.is_peek_token(TokenType::RBrace)
            || self.is_peek_token(TokenType::Eof)
        {
            None
        } else {
            self.next_token();
            Some(self.parse_expression(Precedence::Lowest)?)
        };
        self.skip_optional_semicolon();

        Some(Statement::Return {
            value,
            span: self.span_from(start),
        })
    }

    fn parse_expression_statement(&mut self) -> Option<Statement> {
        let start = self.current_token.position;
        let expression = self.parse_expression(Precedence::Lowest)?;
        self.skip_optional_semicolon();

        Some(Statement::Expression {
            expression,
            span: self.span_from(start),
        })
    }

    fn parse_function_statement(&mut self) -> Option<Statement> {
        let start = self.current_token.position;

        if !self.expect_peek(TokenType::Ident) {
            return None;
        }
        let name = self.current_token.literal.clone();

        if !self.expect_peek(TokenType::LParen) {
            return None;
        }
        let parameters = self.parse_function_parameters()?;

        if !self.expect_peek(TokenType::LBrace) {
            return None;
        }
        let body = self.parse_block();

        Some(Statement::Function {
            name,
            parameters,
            body,
            span: self.span_from(start),
        })
    }

    fn parse_for_statement(&mut self) -> Option<Statement> {
        let start = self.current_token.position;

        if !self.expect_peek(TokenType::Ident) {
            return None;
        }
        let variable = self.current_token.literal.clone();

        if !self.expect_peek(TokenType::In) {
            return None;
        }
        self.next_token();
        let iterable = self.parse_expression(Precedence::Lowest)?;

        if !self.expect_peek(TokenType::LBrace) {
            return None;
        }
        let body = self.parse_block();

        Some(Statement::For {
            variable,
            iterable,
            body,
            span: self.span_from(start),
        })
    }
}
