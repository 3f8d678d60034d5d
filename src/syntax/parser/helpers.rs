use crate::syntax::{
    Identifier,
    block::Block,
    expression::Expression,
    position::{Position, Span},
    precedence::{Precedence, token_precedence},
    token_type::TokenType,
};

use super::{ParseError, Parser};

impl Parser {
    // Token navigation
    pub(super) fn next_token(&mut self) {
        self.current_token = std::mem::replace(&mut self.peek_token, self.lexer.next_token());
    }

    pub(super) fn is_current_token(&self, token_type: TokenType) -> bool {
        self.current_token.token_type == token_type
    }

    pub(super) fn is_peek_token(&self, token_type: TokenType) -> bool {
        self.peek_token.token_type == token_type
    }

    pub(super) fn expect_peek(&mut self, token_type: TokenType) -> bool {
        if self.is_peek_token(token_type) {
            self.next_token();
            true
        } else {
            self.peek_error(token_type);
            false
        }
    }

    pub(super) fn skip_optional_semicolon(&mut self) {
        if self.is_peek_token(TokenType::Semicolon) {
            self.next_token();
        }
    }

    pub(super) fn span_from(&self, start: Position) -> Span {
        Span::new(start, self.current_token.end_position)
    }

    pub(super) fn current_precedence(&self) -> Precedence {
        token_precedence(&self.current_token.token_type)
    }

    pub(super) fn peek_precedence(&self) -> Precedence {
        token_precedence(&self.peek_token.token_type)
    }

    pub(super) fn parse_function_parameters(&mut self) -> Option<Vec<Identifier>> {
        let mut identifiers = Vec::new();

        if self.is_peek_token(TokenType::RParen) {
            self.next_token();
            return Some(identifiers);
        }

        if !self.expect_peek(TokenType::Ident) {
            return None;
        }
        identifiers.push(self.current_token.literal.clone());

        while self.is_peek_token(TokenType::Comma) {
            self.next_token();
            if !self.expect_peek(TokenType::Ident) {
                return None;
            }
            identifiers.push(self.current_token.literal.clone());
        }

        if !self.expect_peek(TokenType::RParen) {
            return None;
        }

        Some(identifiers)
    }

    /// Parses `{ ... }` with the current token on the opening brace and
    /// leaves the current token on the closing brace.
    pub(super) fn parse_block(&mut self) -> Block {
        let start = self.current_token.position;
        let mut statements = Vec::new();
        self.next_token();

        while !self.is_current_token(TokenType::RBrace) && !self.is_current_token(TokenType::Eof) {
            if let Some(statement) = self.parse_statement() {
                statements.push(statement);
            }
            self.next_token();
        }

        if self.is_current_token(TokenType::Eof) {
            self.error_at(start, "block is missing its closing `}`");
        }

        Block {
            statements,
            span: self.span_from(start),
        }
    }

    pub(super) fn parse_expression_list(&mut self, end: TokenType) -> Option<Vec<Expression>> {
        let mut list = Vec::new();

        if self.is_peek_token(end) {
            self.next_token();
            return Some(list);
        }

        self.next_token();
        list.push(self.parse_expression(Precedence::Lowest)?);

        while self.is_peek_token(TokenType::Comma) {
            self.next_token();
            self.next_token();
            list.push(self.parse_expression(Precedence::Lowest)?);
        }

        if !self.expect_peek(end) {
            return None;
        }

        Some(list)
    }

    // Error handling
    pub(super) fn error_at(&mut self, position: Position, message: impl Into<String>) {
        self.errors.push(ParseError {
            message: message.into(),
            position,
        });
    }

    pub(super) fn peek_error(&mut self, expected: TokenType) {
        let message = format!(
            "expected `{}`, found `{}`",
            expected, self.peek_token.token_type
        );
        self.error_at(self.peek_token.position, message);
    }

    pub(super) fn no_prefix_parse_error(&mut self) {
        let message = format!(
            "expected an expression, found `{}`",
            self.current_token.token_type
        );
        self.error_at(self.current_token.position, message);
    }
}
