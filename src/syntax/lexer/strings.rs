use crate::syntax::position::Position;
use crate::syntax::token::Token;
use crate::syntax::token_type::TokenType;

use super::Lexer;

impl Lexer {
    /// Reads a double-quoted string starting at the opening quote.
    ///
    /// The token literal holds the unescaped contents. Reaching end of input
    /// before the closing quote yields `UnterminatedString`.
    pub(super) fn read_string(&mut self) -> Token {
        let line = self.line;
        let col = self.column;
        let mut value = String::new();
        self.read_char(); // opening quote

        loop {
            match self.current_char {
                None => {
                    return Token::new(TokenType::UnterminatedString, value, line, col)
                        .with_end(Position::new(self.line, self.column));
                }
                Some('"') => {
                    self.read_char();
                    return Token::new(TokenType::String, value, line, col)
                        .with_end(Position::new(self.line, self.column));
                }
                Some('\\') => {
                    self.read_char();
                    match self.current_char {
                        Some('n') => value.push('\n'),
                        Some('t') => value.push('\t'),
                        Some('r') => value.push('\r'),
                        Some('"') => value.push('"'),
                        Some('\\') => value.push('\\'),
                        Some(other) => {
                            value.push('\\');
                            value.push(other);
                        }
                        None => continue,
                    }
                    self.read_char();
                }
                Some(ch) => {
                    value.push(ch);
                    self.read_char();
                }
            }
        }
    }
}
