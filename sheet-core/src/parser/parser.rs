use crate::{lexer::prelude::{LexResult, Lexer, LexicalError, Spanned, Token}, utils::prelude::SrcSpan};
use super::ast::{Module, Parsed, Program};
use super::error::{ParseError, ParseErrorType};

pub trait Parse<T: Iterator<Item = LexResult>>
    where Self: Sized,
{
    fn parse(parser: &mut Parser<T>) -> Result<Self, ParseError>;
}

pub struct Parser<T: Iterator<Item = LexResult>> {
    pub current_token: Option<Spanned>,
    pub next_token: Option<Spanned>,
    pub comments: Vec<SrcSpan>,
    pub lex_errors: Vec<LexicalError>,

    tokens: T,
}

impl<T: Iterator<Item = LexResult>> Parser<T> {
    pub fn new(input: T) -> Self {
        let mut parser = Self {
            current_token: None,
            next_token: None,
            comments: vec![],
            lex_errors: vec![],

            tokens: input,
        };

        parser.step();
        parser.step();

        parser
    }

    pub fn step(&mut self) {
        let _ = self.next_token();
    }

    pub fn next_token(&mut self) -> Option<Spanned> {
        let t = self.current_token.take();
        let mut next = None;

        loop {
            match self.tokens.next() {
                Some(Ok((start, Token::Comment, end))) => {
                    self.comments.push(SrcSpan { start, end })
                },
                Some(Err(err)) => {
                    self.lex_errors.push(err);

                    break;
                },
                Some(Ok(tok)) => {
                    next = Some(tok);

                    break;
                },
                None => {
                    break;
                }
            }
        }

        self.current_token = self.next_token.take();
        self.next_token = next.take();

        t
    }

    pub fn parse(&mut self) -> Result<Parsed, ParseError> {
        let program = Program::parse(self);

        // A lexical failure truncates the token stream, so it is the
        // error worth reporting regardless of how the grammar fared.
        if !self.lex_errors.is_empty() {
            let error = self.lex_errors[0];

            return parse_error(
                ParseErrorType::LexError { error },
                error.location,
            );
        }

        let module = Module {
            name: "".into(),
            program: program?,
        };

        Ok(Parsed {
            module,
            comments: std::mem::take(&mut self.comments),
        })
    }

    pub fn current_span(&self) -> SrcSpan {
        match &self.current_token {
            Some((start, _, end)) => SrcSpan { start: *start, end: *end },
            None => SrcSpan::default(),
        }
    }

    pub fn expect_one(&mut self, token: Token) -> Result<(u32, u32), ParseError> {
        match self.current_token.take() {
            Some((start, tok, end)) if tok == token => {
                self.step();
                Ok((start, end))
            },
            Some(t) => {
                let (start, tok, end) = t.clone();
                self.current_token = Some(t);

                if tok == Token::Eof {
                    return parse_error(
                        ParseErrorType::UnexpectedEof,
                        SrcSpan { start, end },
                    );
                }

                parse_error(
                    ParseErrorType::UnexpectedToken {
                        token: tok,
                        expected: vec![format!("`{}`", token.as_literal())],
                    },
                    SrcSpan { start, end },
                )
            },
            None => parse_error(
                ParseErrorType::UnexpectedEof,
                SrcSpan::default(),
            ),
        }
    }

    /// Both comma spellings are accepted outside of sheet literals.
    pub fn expect_comma(&mut self) -> Result<(u32, u32), ParseError> {
        match self.current_token.take() {
            Some((start, tok, end)) if tok.is_comma() => {
                self.step();
                Ok((start, end))
            },
            Some(t) => {
                let (start, tok, end) = t.clone();
                self.current_token = Some(t);

                parse_error(
                    ParseErrorType::UnexpectedToken {
                        token: tok,
                        expected: vec!["`,`".to_string()],
                    },
                    SrcSpan { start, end },
                )
            },
            None => parse_error(
                ParseErrorType::UnexpectedEof,
                SrcSpan::default(),
            ),
        }
    }

    pub fn eat(&mut self, token: &Token) -> Option<(u32, u32)> {
        match &self.current_token {
            Some((_, tok, _)) if tok == token => {
                let (start, _, end) = self.next_token()?;
                Some((start, end))
            },
            _ => None,
        }
    }

    pub fn eat_comma(&mut self) -> bool {
        match &self.current_token {
            Some((_, tok, _)) if tok.is_comma() => {
                self.step();
                true
            },
            _ => false,
        }
    }

    pub fn expect_ident(&mut self) -> Result<(u32, String, u32), ParseError> {
        match self.current_token.take() {
            Some((start, Token::Ident(value), end)) => {
                self.step();
                Ok((start, value, end))
            },
            t => self.expected_name(t, ParseErrorType::ExpectedIdent),
        }
    }

    pub fn expect_range_ident(&mut self) -> Result<(u32, String, u32), ParseError> {
        match self.current_token.take() {
            Some((start, Token::RangeIdent(value), end)) => {
                self.step();
                Ok((start, value, end))
            },
            t => self.expected_name(t, ParseErrorType::ExpectedRangeIdent),
        }
    }

    pub fn expect_sheet_ident(&mut self) -> Result<(u32, String, u32), ParseError> {
        match self.current_token.take() {
            Some((start, Token::SheetIdent(value), end)) => {
                self.step();
                Ok((start, value, end))
            },
            t => self.expected_name(t, ParseErrorType::ExpectedSheetIdent),
        }
    }

    pub fn expect_func_ident(&mut self) -> Result<(u32, String, u32), ParseError> {
        match self.current_token.take() {
            Some((start, Token::FuncIdent(value), end)) => {
                self.step();
                Ok((start, value, end))
            },
            t => self.expected_name(t, ParseErrorType::ExpectedFuncIdent),
        }
    }

    pub fn expect_coordinate(&mut self) -> Result<(u32, String, u32), ParseError> {
        match self.current_token.take() {
            Some((start, Token::Coordinate(value), end)) => {
                self.step();
                Ok((start, value, end))
            },
            t => self.expected_name(t, ParseErrorType::ExpectedCoordinate),
        }
    }

    pub fn expect_int(&mut self) -> Result<(u32, i64, u32), ParseError> {
        match self.current_token.take() {
            Some((start, Token::Int(value), end)) => {
                self.step();
                Ok((start, value, end))
            },
            t => self.expected_name(t, ParseErrorType::ExpectedInt),
        }
    }

    fn expected_name<V>(
        &mut self,
        taken: Option<Spanned>,
        error: ParseErrorType,
    ) -> Result<V, ParseError> {
        match taken {
            Some(t) => {
                let (start, tok, end) = t.clone();
                self.current_token = Some(t);

                if tok == Token::Eof {
                    return parse_error(
                        ParseErrorType::UnexpectedEof,
                        SrcSpan { start, end },
                    );
                }

                parse_error(error, SrcSpan { start, end })
            },
            None => parse_error(
                ParseErrorType::UnexpectedEof,
                SrcSpan::default(),
            ),
        }
    }
}

pub fn parse_module(src: &str) -> Result<Parsed, ParseError> {
    let lexer = Lexer::new(src.char_indices().map(|(i, c)| (i as u32, c)));
    let mut parser = Parser::new(lexer);
    let parsed = parser.parse()?;

    Ok(parsed)
}

pub fn parse_module_from_stream(stream: impl Iterator<Item = char>) -> Result<Parsed, ParseError> {
    let lexer = Lexer::new(stream
        .scan(0, |pos, c| {
            *pos += c.len_utf8() as u32;
            Some((*pos - c.len_utf8() as u32, c))
        })
    );
    let mut parser = Parser::new(lexer);
    let parsed = parser.parse()?;

    Ok(parsed)
}

pub fn parse_error<T>(error: ParseErrorType, span: SrcSpan) -> Result<T, ParseError> {
    Err(ParseError { error, span })
}
