pub mod block;
pub mod expression;
pub mod free_vars;
pub mod lexer;
pub mod parser;
pub mod position;
pub mod precedence;
pub mod program;
pub mod statement;
pub mod token;
pub mod token_type;
pub mod visit;

pub type Identifier = String;

pub use parser::{ParseError, parse};
