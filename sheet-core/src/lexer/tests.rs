use std::str::FromStr;

use rust_decimal::Decimal;

use super::prelude::{Lexer, LexicalErrorType, Token};

fn lex(input: &str) -> Vec<Token> {
    let mut lexer = Lexer::new(input.char_indices().map(|(i, c)| (i as u32, c)));
    let mut tokens = vec![];

    loop {
        match lexer.next_token() {
            Ok((_, Token::Eof, _)) => break,
            Ok((_, token, _)) => tokens.push(token),
            Err(err) => panic!("unexpected lexical error: {err:?}"),
        }
    }

    tokens
}

fn decimal(text: &str) -> Token {
    Token::Decimal(Decimal::from_str(text).expect("test decimal"))
}

#[test]
fn test_identifier_classes() {
    let tokens = lex("count _cells TOTALS Average B12");

    assert_eq!(
        tokens,
        vec![
            Token::Ident("count".to_string()),
            Token::RangeIdent("_cells".to_string()),
            Token::SheetIdent("TOTALS".to_string()),
            Token::FuncIdent("Average".to_string()),
            Token::Coordinate("B12".to_string()),
        ]
    );
}

#[test]
fn test_keywords_take_precedence() {
    let tokens = lex("scalar scalars while whiles");

    assert_eq!(
        tokens,
        vec![
            Token::Scalar,
            Token::Ident("scalars".to_string()),
            Token::While,
            Token::Ident("whiles".to_string()),
        ]
    );
}

#[test]
fn test_uppercase_disambiguation() {
    // One or two letters directly followed by digits are coordinates;
    // three letters cannot be, and a capitalized word is a callable.
    let tokens = lex("A1 AB12 ABC12 Sum AB");

    assert_eq!(
        tokens,
        vec![
            Token::Coordinate("A1".to_string()),
            Token::Coordinate("AB12".to_string()),
            Token::SheetIdent("ABC".to_string()),
            Token::Int(12),
            Token::FuncIdent("Sum".to_string()),
            Token::SheetIdent("AB".to_string()),
        ]
    );
}

#[test]
fn test_signed_numbers() {
    // The sign belongs to the literal only when a digit follows it
    // directly.
    let tokens = lex("3 - 5 3-5 2.5 -2.5");

    assert_eq!(
        tokens,
        vec![
            Token::Int(3),
            Token::Minus,
            Token::Int(5),
            Token::Int(3),
            Token::Int(-5),
            decimal("2.5"),
            decimal("-2.5"),
        ]
    );
}

#[test]
fn test_decimal_fractions_are_exact() {
    let tokens = lex("1.27 0.1");

    assert_eq!(tokens, vec![decimal("1.27"), decimal("0.1")]);
}

#[test]
fn test_dotdot_and_comment() {
    let tokens = lex("A1..B3 ... skipped\ntext ... 7");

    assert_eq!(
        tokens,
        vec![
            Token::Coordinate("A1".to_string()),
            Token::DotDot,
            Token::Coordinate("B3".to_string()),
            Token::Comment,
            Token::Int(7),
        ]
    );
}

#[test]
fn test_detached_comma_separates_rows() {
    let tokens = lex("1,2 , 3");

    assert_eq!(
        tokens,
        vec![
            Token::Int(1),
            Token::Comma,
            Token::Int(2),
            Token::RowSep,
            Token::Int(3),
        ]
    );
}

#[test]
fn test_info_string_vs_inequality() {
    let tokens = lex("a != b !note! c");

    assert_eq!(
        tokens,
        vec![
            Token::Ident("a".to_string()),
            Token::NotEqual,
            Token::Ident("b".to_string()),
            Token::InfoString("note".to_string()),
            Token::Ident("c".to_string()),
        ]
    );
}

#[test]
fn test_info_string_strips_comment_blocks() {
    let tokens = lex("!keep...drop...ed!");

    assert_eq!(tokens, vec![Token::InfoString("keeped".to_string())]);
}

#[test]
fn test_assign_vs_colon() {
    let tokens = lex("x := y : z");

    assert_eq!(
        tokens,
        vec![
            Token::Ident("x".to_string()),
            Token::Assign,
            Token::Ident("y".to_string()),
            Token::Colon,
            Token::Ident("z".to_string()),
        ]
    );
}

#[test]
fn test_unrecognized_character() {
    let mut lexer = Lexer::new("@".char_indices().map(|(i, c)| (i as u32, c)));

    let err = lexer.next_token().expect_err("`@` matches no rule");

    assert_eq!(err.error, LexicalErrorType::UnrecognizedToken { tok: '@' });
}

#[test]
fn test_unterminated_comment() {
    let mut lexer = Lexer::new("... no end".char_indices().map(|(i, c)| (i as u32, c)));

    let err = lexer.next_token().expect_err("comment never closes");

    assert_eq!(err.error, LexicalErrorType::UnterminatedComment);
}

#[test]
fn test_unterminated_info_string() {
    let mut lexer = Lexer::new("!stops here\n!".char_indices().map(|(i, c)| (i as u32, c)));

    let err = lexer.next_token().expect_err("info strings stay on one line");

    assert_eq!(err.error, LexicalErrorType::UnterminatedInfoString);
}

#[test]
fn test_single_dot_is_an_error() {
    let mut lexer = Lexer::new(". ".char_indices().map(|(i, c)| (i as u32, c)));

    let err = lexer.next_token().expect_err("a lone dot matches no rule");

    assert_eq!(err.error, LexicalErrorType::UnrecognizedToken { tok: '.' });
}
