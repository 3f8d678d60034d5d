use kiln::syntax::{
    expression::Expression, lexer::Lexer, parse, statement::Statement, token_type::TokenType,
};

fn token_types(source: &str) -> Vec<TokenType> {
    Lexer::new(source)
        .tokenize()
        .into_iter()
        .map(|token| token.token_type)
        .collect()
}

#[test]
fn lexes_shell_out_and_comments() {
    assert_eq!(
        token_types("// build it\n$(\"cc\", x) <= 10"),
        vec![
            TokenType::Dollar,
            TokenType::LParen,
            TokenType::String,
            TokenType::Comma,
            TokenType::Ident,
            TokenType::RParen,
            TokenType::Lte,
            TokenType::Int,
            TokenType::Eof,
        ]
    );
}

#[test]
fn string_escapes_are_decoded() {
    let program = parse(r#"let s = "a\n\t\"b\"\\";"#).unwrap();
    match &program.statements[0] {
        Statement::Let {
            value: Expression::String { value, .. },
            ..
        } => assert_eq!(value, "a\n\t\"b\"\\"),
        other => panic!("expected string let, got {:?}", other),
    }
}

#[test]
fn canonical_text_ignores_layout() {
    let compact = parse("fn f(a,b){let c=a+b;if c>1{c}else{0}}").unwrap();
    let spread = parse(
        r#"
        // same function, different layout
        fn f(a, b) {
            let c = a + b;
            if c > 1 {
                c
            } else {
                0
            }
        }
        "#,
    )
    .unwrap();
    assert_eq!(compact.to_string(), spread.to_string());
    insta::assert_snapshot!(
        spread.to_string(),
        @"fn f(a, b) { let c = (a + b); if (c > 1) { c; } else { 0; }; }"
    );
}

#[test]
fn collects_every_error_with_its_line() {
    let errors = parse("let = 1;\nlet ok = 2;\nlet y = ;\n").unwrap_err();
    assert!(errors.len() >= 2, "errors: {:?}", errors);
    let lines: Vec<usize> = errors.iter().map(|error| error.position.line).collect();
    assert!(lines.contains(&1), "lines: {:?}", lines);
    assert!(lines.contains(&3), "lines: {:?}", lines);
}

#[test]
fn for_loops_and_indexing_round_trip() {
    let program = parse("for f in files { build(f[0], [f, \"x\"]) }").unwrap();
    insta::assert_snapshot!(
        program.to_string(),
        @r#"for f in files { build((f[0]), [f, "x"]); }"#
    );
}
