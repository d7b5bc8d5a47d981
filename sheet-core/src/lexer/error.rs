use crate::utils::prelude::SrcSpan;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexicalErrorType {
    UnrecognizedToken { tok: char },
    UnterminatedComment,
    UnterminatedInfoString,
    NumberTooLarge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LexicalError {
    pub error: LexicalErrorType,
    pub location: SrcSpan,
}

impl LexicalError {
    pub fn details(&self) -> (&'static str, Vec<String>) {
        match self.error {
            LexicalErrorType::UnrecognizedToken { .. } => {
                ("This character matches no lexical rule", vec![])
            },
            LexicalErrorType::UnterminatedComment => {
                ("This comment is missing its closing `...`", vec![])
            },
            LexicalErrorType::UnterminatedInfoString => {
                ("This info string is missing its closing `!` on the same line", vec![])
            },
            LexicalErrorType::NumberTooLarge => {
                ("This number does not fit the numeric representation", vec![])
            },
        }
    }
}
