use crate::syntax::token_type::TokenType;

use super::Lexer;

fn token_types(input: &str) -> Vec<TokenType> {
    Lexer::new(input)
        .tokenize()
        .into_iter()
        .map(|token| token.token_type)
        .collect()
}

#[test]
fn lexes_shell_out_call() {
    assert_eq!(
        token_types(r#"let code = $("cc", "-c", src);"#),
        vec![
            TokenType::Let,
            TokenType::Ident,
            TokenType::Assign,
            TokenType::Dollar,
            TokenType::LParen,
            TokenType::String,
            TokenType::Comma,
            TokenType::String,
            TokenType::Comma,
            TokenType::Ident,
            TokenType::RParen,
            TokenType::Semicolon,
            TokenType::Eof,
        ]
    );
}

#[test]
fn lexes_two_character_operators() {
    assert_eq!(
        token_types("a <= b && c != d || !e"),
        vec![
            TokenType::Ident,
            TokenType::Lte,
            TokenType::Ident,
            TokenType::And,
            TokenType::Ident,
            TokenType::NotEq,
            TokenType::Ident,
            TokenType::Or,
            TokenType::Bang,
            TokenType::Ident,
            TokenType::Eof,
        ]
    );
}

#[test]
fn skips_line_comments() {
    assert_eq!(
        token_types("// header\nfor x in xs { } // trailing"),
        vec![
            TokenType::For,
            TokenType::Ident,
            TokenType::In,
            TokenType::Ident,
            TokenType::LBrace,
            TokenType::RBrace,
            TokenType::Eof,
        ]
    );
}

#[test]
fn unescapes_string_literals() {
    let tokens = Lexer::new(r#""a\tb\n\"q\"""#).tokenize();
    assert_eq!(tokens[0].token_type, TokenType::String);
    assert_eq!(tokens[0].literal, "a\tb\n\"q\"");
}

#[test]
fn reports_unterminated_string() {
    let tokens = Lexer::new("\"never closed").tokenize();
    assert_eq!(tokens[0].token_type, TokenType::UnterminatedString);
    assert_eq!(tokens[1].token_type, TokenType::Eof);
}

#[test]
fn tracks_line_and_column() {
    let tokens = Lexer::new("let a = 1;\n  fail(a)").tokenize();
    let fail = tokens
        .iter()
        .find(|token| token.literal == "fail")
        .expect("fail token");
    assert_eq!(fail.position.line, 2);
    assert_eq!(fail.position.column, 2);
}

#[test]
fn flags_illegal_characters() {
    assert_eq!(
        token_types("a @ b"),
        vec![
            TokenType::Ident,
            TokenType::Illegal,
            TokenType::Ident,
            TokenType::Eof
        ]
    );
}
