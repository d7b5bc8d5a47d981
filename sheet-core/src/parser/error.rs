use crate::{lexer::prelude::{LexicalError, Token}, utils::prelude::SrcSpan};

#[derive(Debug, Clone, PartialEq)]
pub enum ParseErrorType {
    ExpectedIdent,
    ExpectedRangeIdent,
    ExpectedSheetIdent,
    ExpectedFuncIdent,
    ExpectedCoordinate,
    ExpectedInt,
    ExpectedStatement,
    InvalidCoordinate { text: String },
    UnexpectedToken {
        token: Token,
        expected: Vec<String>,
    },
    UnexpectedEof,
    LexError { error: LexicalError },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub error: ParseErrorType,
    pub span: SrcSpan,
}

impl ParseError {
    pub fn details(&self) -> (&'static str, Vec<String>) {
        match &self.error {
            ParseErrorType::ExpectedIdent => ("Expected a scalar name", vec![]),
            ParseErrorType::ExpectedRangeIdent => ("Expected a range name", vec![]),
            ParseErrorType::ExpectedSheetIdent => ("Expected a sheet name", vec![]),
            ParseErrorType::ExpectedFuncIdent => ("Expected a function or subroutine name", vec![]),
            ParseErrorType::ExpectedCoordinate => ("Expected a cell coordinate", vec![]),
            ParseErrorType::ExpectedInt => ("Expected an integer literal", vec![]),
            ParseErrorType::ExpectedStatement => ("Expected at least one statement", vec![]),
            ParseErrorType::InvalidCoordinate { .. } => {
                ("This coordinate does not address a cell; rows start at 1", vec![])
            },
            ParseErrorType::UnexpectedToken { token, expected } => {
                let found = match token {
                    Token::Int(_) => "an integer".to_string(),
                    Token::Decimal(_) => "a decimal".to_string(),
                    Token::Ident(_) => "a scalar name".to_string(),
                    Token::RangeIdent(_) => "a range name".to_string(),
                    Token::SheetIdent(_) => "a sheet name".to_string(),
                    Token::FuncIdent(_) => "a function name".to_string(),
                    Token::Coordinate(_) => "a coordinate".to_string(),
                    _ if token.is_reserved_word() => {
                        format!("the keyword `{}`", token.as_literal())
                    },
                    _ => format!("`{}`", token.as_literal())
                };

                let messages = std::iter::once(format!("Found {found}, expected one of: "))
                    .chain(expected.iter().map(|s| format!("- {s}")))
                    .collect();

                ("Not expected this", messages)
            },
            ParseErrorType::UnexpectedEof => ("Unexpected end of file", vec![]),
            ParseErrorType::LexError { error } => error.details(),
        }
    }
}
