use crate::syntax::{
    block::Block,
    expression::Expression,
    position::Span,
    precedence::Precedence,
    statement::Statement,
    token_type::TokenType,
};

use super::Parser;

impl Parser {
    pub(super) fn parse_expression(&mut self, precedence: Precedence) -> Option<Expression> {
        let mut left = self.parse_prefix()?;

        while !self.is_peek_token(TokenType::Semicolon) && precedence < self.peek_precedence() {
            self.next_token();
            left = self.parse_infix(left)?;
        }

        Some(left)
    }

    fn parse_prefix(&mut self) -> Option<Expression> {
        match &self.current_token.token_type {
            TokenType::Ident => Some(Expression::Identifier {
                name: self.current_token.literal.clone(),
                span: self.current_token.span(),
            }),
            TokenType::Int => self.parse_integer(),
            TokenType::String => Some(Expression::String {
                value: self.current_token.literal.clone(),
                span: self.current_token.span(),
            }),
            TokenType::UnterminatedString => {
                self.error_at(self.current_token.position, "unterminated string literal");
                None
            }
            TokenType::True | TokenType::False => Some(Expression::Boolean {
                value: self.is_current_token(TokenType::True),
                span: self.current_token.span(),
            }),
            TokenType::Bang | TokenType::Minus => self.parse_prefix_expression(),
            TokenType::LParen => self.parse_grouped_expression(),
            TokenType::LBracket => self.parse_list(),
            TokenType::If => self.parse_if_expression(),
            TokenType::Fn => self.parse_function_literal(),
            TokenType::Dollar => self.parse_shell_out(),
            TokenType::Illegal => {
                let message = format!("illegal character `{}`", self.current_token.literal);
                self.error_at(self.current_token.position, message);
                None
            }
            _ => {
                self.no_prefix_parse_error();
                None
            }
        }
    }

    fn parse_infix(&mut self, left: Expression) -> Option<Expression> {
        match self.current_token.token_type {
            TokenType::Plus
            | TokenType::Minus
            | TokenType::Asterisk
            | TokenType::Slash
            | TokenType::Percent
            | TokenType::Lt
            | TokenType::Gt
            | TokenType::Lte
            | TokenType::Gte
            | TokenType::Eq
            | TokenType::NotEq
            | TokenType::And
            | TokenType::Or => self.parse_infix_expression(left),
            TokenType::LParen => self.parse_call_expression(left),
            TokenType::LBracket => self.parse_index_expression(left),
            _ => Some(left),
        }
    }

    fn parse_integer(&mut self) -> Option<Expression> {
        match self.current_token.literal.parse::<i64>() {
            Ok(value) => Some(Expression::Integer {
                value,
                span: self.current_token.span(),
            }),
            Err(_) => {
                let message = format!(
                    "integer literal `{}` does not fit in 64 bits",
                    self.current_token.literal
                );
                self.error_at(self.current_token.position, message);
                None
            }
        }
    }

    fn parse_infix_expression(&mut self, left: Expression) -> Option<Expression> {
        let operator = self.current_token.literal.clone();
        let precedence = self.current_precedence();
        let start = left.span().start;
        self.next_token();
        let right = self.parse_expression(precedence)?;
        let end = right.span().end;
        Some(Expression::Infix {
            left: Box::new(left),
            operator,
            right: Box::new(right),
            span: Span::new(start, end),
        })
    }

    fn parse_call_expression(&mut self, function: Expression) -> Option<Expression> {
        let start = function.span().start;
        let arguments = self.parse_expression_list(TokenType::RParen)?;
        Some(Expression::Call {
            function: Box::new(function),
            arguments,
            span: self.span_from(start),
        })
    }

    fn parse_index_expression(&mut self, left: Expression) -> Option<Expression> {
        let start = left.span().start;
        self.next_token();
        let index = self.parse_expression(Precedence::Lowest)?;

        if !self.expect_peek(TokenType::RBracket) {
            return None;
        }

        Some(Expression::Index {
            left: Box::new(left),
            index: Box::new(index),
            span: self.span_from(start),
        })
    }

    fn parse_prefix_expression(&mut self) -> Option<Expression> {
        let start = self.current_token.position;
        let operator = self.current_token.literal.clone();
        self.next_token();
        let right = self.parse_expression(Precedence::Prefix)?;
        let end = right.span().end;
        Some(Expression::Prefix {
            operator,
            right: Box::new(right),
            span: Span::new(start, end),
        })
    }

    fn parse_grouped_expression(&mut self) -> Option<Expression> {
        self.next_token();
        let expression = self.parse_expression(Precedence::Lowest)?;
        if !self.expect_peek(TokenType::RParen) {
            return None;
        }
        Some(expression)
    }

    fn parse_list(&mut self) -> Option<Expression> {
        let start = self.current_token.position;
        let elements = self.parse_expression_list(TokenType::RBracket)?;
        Some(Expression::List {
            elements,
            span: self.span_from(start),
        })
    }

    fn parse_if_expression(&mut self) -> Option<Expression> {
        let start = self.current_token.position;
        self.next_token();
        let condition = self.parse_expression(Precedence::Lowest)?;

        if !self.expect_peek(TokenType::LBrace) {
            return None;
        }
        let consequence = self.parse_block();

        let alternative = if self.is_peek_token(TokenType::Else) {
            self.next_token();
            if self.is_peek_token(TokenType::If) {
                // `else if` chains nest as a single-expression else block.
                self.next_token();
                let nested = self.parse_if_expression()?;
                let span = nested.span();
                Some(Block {
                    statements: vec![Statement::Expression {
                        expression: nested,
                        span,
                    }],
                    span,
                })
            } else {
                if !self.expect_peek(TokenType::LBrace) {
                    return None;
                }
                Some(self.parse_block())
            }
        } else {
            None
        };

        Some(Expression::If {
            condition: Box::new(condition),
            consequence,
            alternative,
            span: self.span_from(start),
        })
    }

    fn parse_function_literal(&mut self) -> Option<Expression> {
        let start = self.current_token.position;

        if !self.expect_peek(TokenType::LParen) {
            return None;
        }
        let parameters = self.parse_function_parameters()?;

        if !self.expect_peek(TokenType::LBrace) {
            return None;
        }
        let body = self.parse_block();

        Some(Expression::Function {
            parameters,
            body,
            span: self.span_from(start),
        })
    }

    fn parse_shell_out(&mut self) -> Option<Expression> {
        let start = self.current_token.position;

        if !self.expect_peek(TokenType::LParen) {
            return None;
        }
        let arguments = self.parse_expression_list(TokenType::RParen)?;

        if arguments.is_empty() {
            self.error_at(start, "shell-out needs at least a program name");
            return None;
        }

        Some(Expression::ShellOut {
            arguments,
            span: self.span_from(start),
        })
    }
}
