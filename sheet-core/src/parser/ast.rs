use std::fmt::Display;

use rust_decimal::Decimal;

use crate::{
    lexer::prelude::{LexResult, Token},
    parser::prelude::{parse_error, Parse, ParseError, ParseErrorType, Parser},
    utils::prelude::SrcSpan,
};

#[derive(Debug)]
pub struct Parsed {
    pub module: Module,
    pub comments: Vec<SrcSpan>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    pub name: String,
    pub program: Program,
}

// program -> {definition} statement {statement}
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub definitions: Vec<Definition>,
    pub statements: Vec<Statement>,
    pub location: SrcSpan,
}

impl<T: Iterator<Item = LexResult>> Parse<T> for Program {
    fn parse(parser: &mut Parser<T>) -> Result<Self, ParseError> {
        let mut definitions = vec![];

        loop {
            match &parser.current_token {
                Some((
                    _,
                    Token::Scalar | Token::Range | Token::Sheet
                    | Token::Function | Token::Subroutine,
                    _,
                )) => definitions.push(Definition::parse(parser)?),
                _ => break,
            }
        }

        let mut statements = vec![];

        loop {
            match &parser.current_token {
                Some((_, Token::Eof, _)) | None => break,
                _ => statements.push(Statement::parse(parser)?),
            }
        }

        if statements.is_empty() {
            return parse_error(ParseErrorType::ExpectedStatement, parser.current_span());
        }

        let start = definitions.first()
            .map(Definition::location)
            .unwrap_or_else(|| statements[0].location())
            .start;
        let end = statements.last()
            .map(|statement| statement.location().end)
            .unwrap_or(start);

        Ok(Self {
            definitions,
            statements,
            location: SrcSpan { start, end },
        })
    }
}

impl Display for Program {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut parts = self.definitions.iter()
            .map(|definition| definition.to_string())
            .collect::<Vec<String>>();

        parts.extend(self.statements.iter().map(|statement| statement.to_string()));

        write!(f, "{}", parts.join("\n"))
    }
}

// definition -> scalar_def | range_def | sheet_def | function_def | subroutine_def
#[derive(Debug, Clone, PartialEq)]
pub enum Definition {
    Scalar(ScalarDefinition),
    Range(RangeDefinition),
    Sheet(SheetDefinition),
    Function(FunctionDefinition),
    Subroutine(SubroutineDefinition),
}

impl<T: Iterator<Item = LexResult>> Parse<T> for Definition {
    fn parse(parser: &mut Parser<T>) -> Result<Self, ParseError> {
        let res = match &parser.current_token {
            Some((_, Token::Scalar, _)) => Self::Scalar(ScalarDefinition::parse(parser)?),
            Some((_, Token::Range, _)) => Self::Range(RangeDefinition::parse(parser)?),
            Some((_, Token::Sheet, _)) => Self::Sheet(SheetDefinition::parse(parser)?),
            Some((_, Token::Function, _)) => Self::Function(FunctionDefinition::parse(parser)?),
            Some((_, Token::Subroutine, _)) => {
                Self::Subroutine(SubroutineDefinition::parse(parser)?)
            },
            Some((start, token, end)) => return parse_error(
                ParseErrorType::UnexpectedToken {
                    token: token.clone(),
                    expected: vec!["a definition".to_string()],
                },
                SrcSpan { start: *start, end: *end },
            ),
            None => return parse_error(ParseErrorType::UnexpectedEof, SrcSpan::default()),
        };

        Ok(res)
    }
}

impl Display for Definition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Scalar(definition) => write!(f, "{definition}"),
            Self::Range(definition) => write!(f, "{definition}"),
            Self::Sheet(definition) => write!(f, "{definition}"),
            Self::Function(definition) => write!(f, "{definition}"),
            Self::Subroutine(definition) => write!(f, "{definition}"),
        }
    }
}

impl Definition {
    pub fn name(&self) -> &Identifier {
        match self {
            Self::Scalar(definition) => &definition.name,
            Self::Range(definition) => &definition.name,
            Self::Sheet(definition) => &definition.name,
            Self::Function(definition) => &definition.name,
            Self::Subroutine(definition) => &definition.name,
        }
    }

    pub fn location(&self) -> SrcSpan {
        match self {
            Self::Scalar(definition) => definition.location,
            Self::Range(definition) => definition.location,
            Self::Sheet(definition) => definition.location,
            Self::Function(definition) => definition.location,
            Self::Subroutine(definition) => definition.location,
        }
    }
}

/// Definitions allowed inside function and subroutine bodies.
pub(crate) fn parse_variable_definitions<T: Iterator<Item = LexResult>>(
    parser: &mut Parser<T>,
) -> Result<Vec<Definition>, ParseError> {
    let mut definitions = vec![];

    loop {
        match &parser.current_token {
            Some((_, Token::Scalar | Token::Range | Token::Sheet, _)) => {
                definitions.push(Definition::parse(parser)?)
            },
            _ => break,
        }
    }

    Ok(definitions)
}

// scalar_def -> scalar IDENT [= scalar_expr]
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarDefinition {
    pub name: Identifier,
    pub init: Option<ScalarExpr>,
    pub location: SrcSpan,
}

impl<T: Iterator<Item = LexResult>> Parse<T> for ScalarDefinition {
    fn parse(parser: &mut Parser<T>) -> Result<Self, ParseError> {
        let (start, _) = parser.expect_one(Token::Scalar)?;
        let name = Identifier::from(parser.expect_ident()?);

        let (init, end) = match parser.eat(&Token::Equal) {
            Some(_) => {
                let init = ScalarExpr::parse(parser)?;
                let end = init.location.end;

                (Some(init), end)
            },
            None => (None, name.location.end),
        };

        Ok(Self {
            name,
            init,
            location: SrcSpan { start, end },
        })
    }
}

impl Display for ScalarDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.init {
            Some(init) => write!(f, "scalar {} = {}", self.name, init),
            None => write!(f, "scalar {}", self.name),
        }
    }
}

// range_def -> range RANGE_IDENT [= range_expr]
#[derive(Debug, Clone, PartialEq)]
pub struct RangeDefinition {
    pub name: Identifier,
    pub init: Option<RangeExpr>,
    pub location: SrcSpan,
}

impl<T: Iterator<Item = LexResult>> Parse<T> for RangeDefinition {
    fn parse(parser: &mut Parser<T>) -> Result<Self, ParseError> {
        let (start, _) = parser.expect_one(Token::Range)?;
        let name = Identifier::from(parser.expect_range_ident()?);

        let (init, end) = match parser.eat(&Token::Equal) {
            Some(_) => {
                let init = RangeExpr::parse(parser)?;
                let end = init.location().end;

                (Some(init), end)
            },
            None => (None, name.location.end),
        };

        Ok(Self {
            name,
            init,
            location: SrcSpan { start, end },
        })
    }
}

impl Display for RangeDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.init {
            Some(init) => write!(f, "range {} = {}", self.name, init),
            None => write!(f, "range {}", self.name),
        }
    }
}

// sheet_def -> sheet SHEET_IDENT [sheet_init]
#[derive(Debug, Clone, PartialEq)]
pub struct SheetDefinition {
    pub name: Identifier,
    pub init: Option<SheetInit>,
    pub location: SrcSpan,
}

impl<T: Iterator<Item = LexResult>> Parse<T> for SheetDefinition {
    fn parse(parser: &mut Parser<T>) -> Result<Self, ParseError> {
        let (start, _) = parser.expect_one(Token::Sheet)?;
        let name = Identifier::from(parser.expect_sheet_ident()?);

        let (init, end) = match parser.eat(&Token::Equal) {
            Some(_) => {
                let init = SheetInit::parse(parser)?;
                let end = init.location().end;

                (Some(init), end)
            },
            None => (None, name.location.end),
        };

        Ok(Self {
            name,
            init,
            location: SrcSpan { start, end },
        })
    }
}

impl Display for SheetDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.init {
            Some(init) => write!(f, "sheet {} = {}", self.name, init),
            None => write!(f, "sheet {}", self.name),
        }
    }
}

// sheet_init -> { sheet_row+ } | INT * INT
#[derive(Debug, Clone, PartialEq)]
pub enum SheetInit {
    Literal {
        rows: Vec<SheetRow>,
        location: SrcSpan,
    },
    Size {
        rows: i64,
        columns: i64,
        location: SrcSpan,
    },
}

impl<T: Iterator<Item = LexResult>> Parse<T> for SheetInit {
    fn parse(parser: &mut Parser<T>) -> Result<Self, ParseError> {
        match &parser.current_token {
            Some((_, Token::LCurly, _)) => {
                let (start, _) = parser.expect_one(Token::LCurly)?;

                let mut rows = vec![SheetRow::parse(parser)?];

                let end = loop {
                    match &parser.current_token {
                        Some((_, Token::RCurly, _)) => {
                            break parser.expect_one(Token::RCurly)?.1;
                        },
                        // A detached comma separates rows; so does plain
                        // juxtaposition.
                        Some((_, Token::RowSep, _)) => parser.step(),
                        _ => {},
                    }

                    rows.push(SheetRow::parse(parser)?);
                };

                Ok(Self::Literal {
                    rows,
                    location: SrcSpan { start, end },
                })
            },
            _ => {
                let (start, rows, _) = parser.expect_int()?;
                parser.expect_one(Token::Mult)?;
                let (_, columns, end) = parser.expect_int()?;

                Ok(Self::Size {
                    rows,
                    columns,
                    location: SrcSpan { start, end },
                })
            }
        }
    }
}

impl Display for SheetInit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Literal { rows, .. } => {
                let rows = rows.iter()
                    .map(|row| row.to_string())
                    .collect::<Vec<String>>();

                write!(f, "{{ {} }}", rows.join(" , "))
            },
            Self::Size { rows, columns, .. } => write!(f, "{rows} * {columns}"),
        }
    }
}

impl SheetInit {
    pub fn location(&self) -> SrcSpan {
        match self {
            Self::Literal { location, .. } | Self::Size { location, .. } => *location,
        }
    }
}

// sheet_row -> simple_expr {, simple_expr}
#[derive(Debug, Clone, PartialEq)]
pub struct SheetRow {
    pub values: Vec<SimpleExpr>,
    pub location: SrcSpan,
}

impl<T: Iterator<Item = LexResult>> Parse<T> for SheetRow {
    fn parse(parser: &mut Parser<T>) -> Result<Self, ParseError> {
        let mut values = vec![SimpleExpr::parse(parser)?];

        // Only the attached comma continues the row.
        while let Some((_, Token::Comma, _)) = parser.current_token {
            parser.step();
            values.push(SimpleExpr::parse(parser)?);
        }

        let location = SrcSpan {
            start: values[0].location.start,
            end: values[values.len() - 1].location.end,
        };

        Ok(Self { values, location })
    }
}

impl Display for SheetRow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let values = self.values.iter()
            .map(|value| value.to_string())
            .collect::<Vec<String>>();

        write!(f, "{}", values.join(","))
    }
}

// function_def -> function FUNC_IDENT [ formals? ] return (scalar | range) is
//                 variable_def* statement+ end
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDefinition {
    pub name: Identifier,
    pub formals: Vec<Formal>,
    pub returns: ReturnKind,
    pub locals: Vec<Definition>,
    pub body: Vec<Statement>,
    pub location: SrcSpan,
}

impl<T: Iterator<Item = LexResult>> Parse<T> for FunctionDefinition {
    fn parse(parser: &mut Parser<T>) -> Result<Self, ParseError> {
        let (start, _) = parser.expect_one(Token::Function)?;
        let name = Identifier::from(parser.expect_func_ident()?);

        let formals = parse_formals(parser)?;

        parser.expect_one(Token::Return)?;

        let returns = match parser.current_token.take() {
            Some((_, Token::Scalar, _)) => {
                parser.step();
                ReturnKind::Scalar
            },
            Some((_, Token::Range, _)) => {
                parser.step();
                ReturnKind::Range
            },
            Some((start, token, end)) => return parse_error(
                ParseErrorType::UnexpectedToken {
                    token,
                    expected: vec!["`scalar`".to_string(), "`range`".to_string()],
                },
                SrcSpan { start, end },
            ),
            None => return parse_error(ParseErrorType::UnexpectedEof, SrcSpan::default()),
        };

        parser.expect_one(Token::Is)?;

        let locals = parse_variable_definitions(parser)?;
        let body = parse_statements(parser, |token| matches!(token, Token::End))?;
        let (_, end) = parser.expect_one(Token::End)?;

        Ok(Self {
            name,
            formals,
            returns,
            locals,
            body,
            location: SrcSpan { start, end },
        })
    }
}

impl Display for FunctionDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let formals = self.formals.iter()
            .map(|formal| formal.to_string())
            .collect::<Vec<String>>();

        let mut lines = vec![format!(
            "function {} [{}] return {} is",
            self.name,
            formals.join(", "),
            self.returns
        )];

        lines.extend(self.locals.iter().map(|local| local.to_string()));
        lines.extend(self.body.iter().map(|statement| statement.to_string()));
        lines.push("end".to_string());

        write!(f, "{}", lines.join("\n"))
    }
}

// subroutine_def -> subroutine FUNC_IDENT [ formals? ] is
//                   variable_def* statement+ end
#[derive(Debug, Clone, PartialEq)]
pub struct SubroutineDefinition {
    pub name: Identifier,
    pub formals: Vec<Formal>,
    pub locals: Vec<Definition>,
    pub body: Vec<Statement>,
    pub location: SrcSpan,
}

impl<T: Iterator<Item = LexResult>> Parse<T> for SubroutineDefinition {
    fn parse(parser: &mut Parser<T>) -> Result<Self, ParseError> {
        let (start, _) = parser.expect_one(Token::Subroutine)?;
        let name = Identifier::from(parser.expect_func_ident()?);

        let formals = parse_formals(parser)?;

        parser.expect_one(Token::Is)?;

        let locals = parse_variable_definitions(parser)?;
        let body = parse_statements(parser, |token| matches!(token, Token::End))?;
        let (_, end) = parser.expect_one(Token::End)?;

        Ok(Self {
            name,
            formals,
            locals,
            body,
            location: SrcSpan { start, end },
        })
    }
}

impl Display for SubroutineDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let formals = self.formals.iter()
            .map(|formal| formal.to_string())
            .collect::<Vec<String>>();

        let mut lines = vec![format!("subroutine {} [{}] is", self.name, formals.join(", "))];

        lines.extend(self.locals.iter().map(|local| local.to_string()));
        lines.extend(self.body.iter().map(|statement| statement.to_string()));
        lines.push("end".to_string());

        write!(f, "{}", lines.join("\n"))
    }
}

fn parse_formals<T: Iterator<Item = LexResult>>(
    parser: &mut Parser<T>,
) -> Result<Vec<Formal>, ParseError> {
    parser.expect_one(Token::LSquare)?;

    let mut formals = vec![];

    if !matches!(parser.current_token, Some((_, Token::RSquare, _))) {
        formals.push(Formal::parse(parser)?);

        while parser.eat_comma() {
            formals.push(Formal::parse(parser)?);
        }
    }

    parser.expect_one(Token::RSquare)?;

    Ok(formals)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnKind {
    Scalar,
    Range,
}

impl Display for ReturnKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Scalar => write!(f, "scalar"),
            Self::Range => write!(f, "range"),
        }
    }
}

// formal -> IDENT : scalar | RANGE_IDENT : range | SHEET_IDENT : sheet
//
// The name class and the annotated kind must agree.
#[derive(Debug, Clone, PartialEq)]
pub struct Formal {
    pub name: Identifier,
    pub kind: FormalKind,
    pub location: SrcSpan,
}

impl<T: Iterator<Item = LexResult>> Parse<T> for Formal {
    fn parse(parser: &mut Parser<T>) -> Result<Self, ParseError> {
        let (name, kind_token) = match parser.current_token.take() {
            Some((start, Token::Ident(value), end)) => {
                parser.step();
                (Identifier::from((start, value, end)), Token::Scalar)
            },
            Some((start, Token::RangeIdent(value), end)) => {
                parser.step();
                (Identifier::from((start, value, end)), Token::Range)
            },
            Some((start, Token::SheetIdent(value), end)) => {
                parser.step();
                (Identifier::from((start, value, end)), Token::Sheet)
            },
            Some((start, token, end)) => return parse_error(
                ParseErrorType::UnexpectedToken {
                    token,
                    expected: vec!["a formal argument name".to_string()],
                },
                SrcSpan { start, end },
            ),
            None => return parse_error(ParseErrorType::UnexpectedEof, SrcSpan::default()),
        };

        parser.expect_one(Token::Colon)?;

        let kind = match &kind_token {
            Token::Scalar => FormalKind::Scalar,
            Token::Range => FormalKind::Range,
            _ => FormalKind::Sheet,
        };
        let (_, end) = parser.expect_one(kind_token)?;

        Ok(Self {
            location: SrcSpan { start: name.location.start, end },
            name,
            kind,
        })
    }
}

impl Display for Formal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} : {}", self.name, self.kind)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormalKind {
    Scalar,
    Range,
    Sheet,
}

impl Display for FormalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Scalar => write!(f, "scalar"),
            Self::Range => write!(f, "range"),
            Self::Sheet => write!(f, "sheet"),
        }
    }
}

// statement -> print_sheet | print_range | print_scalar | if | while | for
//            | subroutine_call | return | assignment
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    PrintSheet(PrintSheet),
    PrintRange(PrintRange),
    PrintScalar(PrintScalar),
    If(If),
    While(While),
    For(For),
    Call(Call),
    Return(Return),
    Assignment(Assignment),
}

impl<T: Iterator<Item = LexResult>> Parse<T> for Statement {
    fn parse(parser: &mut Parser<T>) -> Result<Self, ParseError> {
        let res = match &parser.current_token {
            Some((start, token, end)) => match token {
                Token::PrintSheet => Self::PrintSheet(PrintSheet::parse(parser)?),
                Token::PrintRange => Self::PrintRange(PrintRange::parse(parser)?),
                Token::PrintScalar => Self::PrintScalar(PrintScalar::parse(parser)?),
                Token::If => Self::If(If::parse(parser)?),
                Token::While => Self::While(While::parse(parser)?),
                Token::For => Self::For(For::parse(parser)?),
                Token::FuncIdent(_) => Self::Call(Call::parse(parser)?),
                Token::Return => Self::Return(Return::parse(parser)?),
                Token::Ident(_)
                | Token::RangeIdent(_)
                | Token::SheetIdent(_)
                | Token::Dollar => Self::Assignment(Assignment::parse(parser)?),
                Token::Eof => return parse_error(
                    ParseErrorType::UnexpectedEof,
                    SrcSpan { start: *start, end: *end },
                ),
                _ => return parse_error(
                    ParseErrorType::UnexpectedToken {
                        token: token.clone(),
                        expected: vec!["a statement".to_string()],
                    },
                    SrcSpan { start: *start, end: *end },
                ),
            },
            None => return parse_error(ParseErrorType::UnexpectedEof, SrcSpan::default()),
        };

        Ok(res)
    }
}

impl Display for Statement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PrintSheet(statement) => write!(f, "{statement}"),
            Self::PrintRange(statement) => write!(f, "{statement}"),
            Self::PrintScalar(statement) => write!(f, "{statement}"),
            Self::If(statement) => write!(f, "{statement}"),
            Self::While(statement) => write!(f, "{statement}"),
            Self::For(statement) => write!(f, "{statement}"),
            Self::Call(statement) => write!(f, "{statement}"),
            Self::Return(statement) => write!(f, "{statement}"),
            Self::Assignment(statement) => write!(f, "{statement}"),
        }
    }
}

impl Statement {
    pub fn location(&self) -> SrcSpan {
        match self {
            Self::PrintSheet(statement) => statement.location,
            Self::PrintRange(statement) => statement.location,
            Self::PrintScalar(statement) => statement.location,
            Self::If(statement) => statement.location,
            Self::While(statement) => statement.location,
            Self::For(statement) => statement.location,
            Self::Call(statement) => statement.location,
            Self::Return(statement) => statement.location,
            Self::Assignment(statement) => statement.location(),
        }
    }
}

/// Statements up to (not including) a terminator keyword. Every block
/// requires at least one statement.
fn parse_statements<T: Iterator<Item = LexResult>>(
    parser: &mut Parser<T>,
    is_terminator: fn(&Token) -> bool,
) -> Result<Vec<Statement>, ParseError> {
    let mut statements = vec![];

    loop {
        match &parser.current_token {
            Some((_, token, _)) if is_terminator(token) => break,
            Some((_, Token::Eof, _)) | None => break,
            _ => statements.push(Statement::parse(parser)?),
        }
    }

    if statements.is_empty() {
        return parse_error(ParseErrorType::ExpectedStatement, parser.current_span());
    }

    Ok(statements)
}

fn parse_info_string<T: Iterator<Item = LexResult>>(parser: &mut Parser<T>) -> Option<InfoString> {
    match parser.current_token.take() {
        Some((start, Token::InfoString(text), end)) => {
            parser.step();

            Some(InfoString {
                text,
                location: SrcSpan { start, end },
            })
        },
        other => {
            parser.current_token = other;
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InfoString {
    pub text: String,
    pub location: SrcSpan,
}

impl Display for InfoString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "!{}!", self.text)
    }
}

// print_sheet -> print_sheet [info_string] SHEET_IDENT
#[derive(Debug, Clone, PartialEq)]
pub struct PrintSheet {
    pub info: Option<InfoString>,
    pub sheet: Identifier,
    pub location: SrcSpan,
}

impl<T: Iterator<Item = LexResult>> Parse<T> for PrintSheet {
    fn parse(parser: &mut Parser<T>) -> Result<Self, ParseError> {
        let (start, _) = parser.expect_one(Token::PrintSheet)?;
        let info = parse_info_string(parser);
        let sheet = Identifier::from(parser.expect_sheet_ident()?);

        Ok(Self {
            location: SrcSpan { start, end: sheet.location.end },
            info,
            sheet,
        })
    }
}

impl Display for PrintSheet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.info {
            Some(info) => write!(f, "print_sheet {} {}", info, self.sheet),
            None => write!(f, "print_sheet {}", self.sheet),
        }
    }
}

// print_range -> print_range [info_string] range_expr
#[derive(Debug, Clone, PartialEq)]
pub struct PrintRange {
    pub info: Option<InfoString>,
    pub range: RangeExpr,
    pub location: SrcSpan,
}

impl<T: Iterator<Item = LexResult>> Parse<T> for PrintRange {
    fn parse(parser: &mut Parser<T>) -> Result<Self, ParseError> {
        let (start, _) = parser.expect_one(Token::PrintRange)?;
        let info = parse_info_string(parser);
        let range = RangeExpr::parse(parser)?;

        Ok(Self {
            location: SrcSpan { start, end: range.location().end },
            info,
            range,
        })
    }
}

impl Display for PrintRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.info {
            Some(info) => write!(f, "print_range {} {}", info, self.range),
            None => write!(f, "print_range {}", self.range),
        }
    }
}

// print_scalar -> print_scalar [info_string] scalar_expr
#[derive(Debug, Clone, PartialEq)]
pub struct PrintScalar {
    pub info: Option<InfoString>,
    pub value: ScalarExpr,
    pub location: SrcSpan,
}

impl<T: Iterator<Item = LexResult>> Parse<T> for PrintScalar {
    fn parse(parser: &mut Parser<T>) -> Result<Self, ParseError> {
        let (start, _) = parser.expect_one(Token::PrintScalar)?;
        let info = parse_info_string(parser);
        let value = ScalarExpr::parse(parser)?;

        Ok(Self {
            location: SrcSpan { start, end: value.location.end },
            info,
            value,
        })
    }
}

impl Display for PrintScalar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.info {
            Some(info) => write!(f, "print_scalar {} {}", info, self.value),
            None => write!(f, "print_scalar {}", self.value),
        }
    }
}

// if -> if scalar_expr then statement+ [else statement+] endif
#[derive(Debug, Clone, PartialEq)]
pub struct If {
    pub condition: ScalarExpr,
    pub consequence: Vec<Statement>,
    pub alternative: Option<Vec<Statement>>,
    pub location: SrcSpan,
}

impl<T: Iterator<Item = LexResult>> Parse<T> for If {
    fn parse(parser: &mut Parser<T>) -> Result<Self, ParseError> {
        let (start, _) = parser.expect_one(Token::If)?;

        let condition = ScalarExpr::parse(parser)?;

        parser.expect_one(Token::Then)?;

        let consequence = parse_statements(
            parser,
            |token| matches!(token, Token::Else | Token::EndIf),
        )?;

        let alternative = match parser.eat(&Token::Else) {
            Some(_) => Some(parse_statements(parser, |token| matches!(token, Token::EndIf))?),
            None => None,
        };

        let (_, end) = parser.expect_one(Token::EndIf)?;

        Ok(Self {
            condition,
            consequence,
            alternative,
            location: SrcSpan { start, end },
        })
    }
}

impl Display for If {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let consequence = self.consequence.iter()
            .map(|statement| statement.to_string())
            .collect::<Vec<String>>();

        match &self.alternative {
            Some(alternative) => {
                let alternative = alternative.iter()
                    .map(|statement| statement.to_string())
                    .collect::<Vec<String>>();

                write!(
                    f,
                    "if {} then\n{}\nelse\n{}\nendif",
                    self.condition,
                    consequence.join("\n"),
                    alternative.join("\n")
                )
            },
            None => write!(
                f,
                "if {} then\n{}\nendif",
                self.condition,
                consequence.join("\n")
            ),
        }
    }
}

// while -> while scalar_expr do statement+ done
#[derive(Debug, Clone, PartialEq)]
pub struct While {
    pub condition: ScalarExpr,
    pub body: Vec<Statement>,
    pub location: SrcSpan,
}

impl<T: Iterator<Item = LexResult>> Parse<T> for While {
    fn parse(parser: &mut Parser<T>) -> Result<Self, ParseError> {
        let (start, _) = parser.expect_one(Token::While)?;

        let condition = ScalarExpr::parse(parser)?;

        parser.expect_one(Token::Do)?;

        let body = parse_statements(parser, |token| matches!(token, Token::Done))?;

        let (_, end) = parser.expect_one(Token::Done)?;

        Ok(Self {
            condition,
            body,
            location: SrcSpan { start, end },
        })
    }
}

impl Display for While {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let body = self.body.iter()
            .map(|statement| statement.to_string())
            .collect::<Vec<String>>();

        write!(f, "while {} do\n{}\ndone", self.condition, body.join("\n"))
    }
}

// for -> for range_expr {, range_expr} do statement+ done
#[derive(Debug, Clone, PartialEq)]
pub struct For {
    pub ranges: Vec<RangeExpr>,
    pub body: Vec<Statement>,
    pub location: SrcSpan,
}

impl<T: Iterator<Item = LexResult>> Parse<T> for For {
    fn parse(parser: &mut Parser<T>) -> Result<Self, ParseError> {
        let (start, _) = parser.expect_one(Token::For)?;

        let mut ranges = vec![RangeExpr::parse(parser)?];

        while parser.eat_comma() {
            ranges.push(RangeExpr::parse(parser)?);
        }

        parser.expect_one(Token::Do)?;

        let body = parse_statements(parser, |token| matches!(token, Token::Done))?;

        let (_, end) = parser.expect_one(Token::Done)?;

        Ok(Self {
            ranges,
            body,
            location: SrcSpan { start, end },
        })
    }
}

impl Display for For {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ranges = self.ranges.iter()
            .map(|range| range.to_string())
            .collect::<Vec<String>>();

        let body = self.body.iter()
            .map(|statement| statement.to_string())
            .collect::<Vec<String>>();

        write!(f, "for {} do\n{}\ndone", ranges.join(", "), body.join("\n"))
    }
}

// return -> return (scalar_expr | range_expr)
#[derive(Debug, Clone, PartialEq)]
pub struct Return {
    pub value: ReturnValue,
    pub location: SrcSpan,
}

impl<T: Iterator<Item = LexResult>> Parse<T> for Return {
    fn parse(parser: &mut Parser<T>) -> Result<Self, ParseError> {
        let (start, _) = parser.expect_one(Token::Return)?;

        let value = match &parser.current_token {
            Some((_, Token::RangeIdent(_) | Token::Range | Token::LSquare, _)) => {
                ReturnValue::Range(RangeExpr::parse(parser)?)
            },
            _ => ReturnValue::Scalar(ScalarExpr::parse(parser)?),
        };

        Ok(Self {
            location: SrcSpan { start, end: value.location().end },
            value,
        })
    }
}

impl Display for Return {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "return {}", self.value)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReturnValue {
    Scalar(ScalarExpr),
    Range(RangeExpr),
}

impl Display for ReturnValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Scalar(value) => write!(f, "{value}"),
            Self::Range(value) => write!(f, "{value}"),
        }
    }
}

impl ReturnValue {
    pub fn location(&self) -> SrcSpan {
        match self {
            Self::Scalar(value) => value.location,
            Self::Range(value) => value.location(),
        }
    }
}

// assignment -> IDENT := scalar_expr
//             | cell_ref := scalar_expr
//             | RANGE_IDENT := range_expr
//             | SHEET_IDENT := SHEET_IDENT
#[derive(Debug, Clone, PartialEq)]
pub enum Assignment {
    Scalar {
        target: Identifier,
        value: ScalarExpr,
        location: SrcSpan,
    },
    Cell {
        target: CellRef,
        value: ScalarExpr,
        location: SrcSpan,
    },
    Range {
        target: Identifier,
        value: RangeExpr,
        location: SrcSpan,
    },
    Sheet {
        target: Identifier,
        source: Identifier,
        location: SrcSpan,
    },
}

impl<T: Iterator<Item = LexResult>> Parse<T> for Assignment {
    fn parse(parser: &mut Parser<T>) -> Result<Self, ParseError> {
        let res = match &parser.current_token {
            Some((_, Token::Ident(_), _)) => {
                let target = Identifier::from(parser.expect_ident()?);
                parser.expect_one(Token::Assign)?;
                let value = ScalarExpr::parse(parser)?;

                Self::Scalar {
                    location: SrcSpan {
                        start: target.location.start,
                        end: value.location.end,
                    },
                    target,
                    value,
                }
            },
            Some((_, Token::RangeIdent(_), _)) => {
                let target = Identifier::from(parser.expect_range_ident()?);
                parser.expect_one(Token::Assign)?;
                let value = RangeExpr::parse(parser)?;

                Self::Range {
                    location: SrcSpan {
                        start: target.location.start,
                        end: value.location().end,
                    },
                    target,
                    value,
                }
            },
            Some((_, Token::Dollar, _)) => {
                let target = CellRef::parse(parser)?;
                parser.expect_one(Token::Assign)?;
                let value = ScalarExpr::parse(parser)?;

                Self::Cell {
                    location: SrcSpan {
                        start: target.location().start,
                        end: value.location.end,
                    },
                    target,
                    value,
                }
            },
            Some((_, Token::SheetIdent(_), _)) => {
                if matches!(parser.next_token, Some((_, Token::SQuote, _))) {
                    let target = CellRef::parse(parser)?;
                    parser.expect_one(Token::Assign)?;
                    let value = ScalarExpr::parse(parser)?;

                    Self::Cell {
                        location: SrcSpan {
                            start: target.location().start,
                            end: value.location.end,
                        },
                        target,
                        value,
                    }
                } else {
                    let target = Identifier::from(parser.expect_sheet_ident()?);
                    parser.expect_one(Token::Assign)?;
                    let source = Identifier::from(parser.expect_sheet_ident()?);

                    Self::Sheet {
                        location: SrcSpan {
                            start: target.location.start,
                            end: source.location.end,
                        },
                        target,
                        source,
                    }
                }
            },
            Some((start, token, end)) => return parse_error(
                ParseErrorType::UnexpectedToken {
                    token: token.clone(),
                    expected: vec!["an assignment target".to_string()],
                },
                SrcSpan { start: *start, end: *end },
            ),
            None => return parse_error(ParseErrorType::UnexpectedEof, SrcSpan::default()),
        };

        Ok(res)
    }
}

impl Display for Assignment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Scalar { target, value, .. } => write!(f, "{target} := {value}"),
            Self::Cell { target, value, .. } => write!(f, "{target} := {value}"),
            Self::Range { target, value, .. } => write!(f, "{target} := {value}"),
            Self::Sheet { target, source, .. } => write!(f, "{target} := {source}"),
        }
    }
}

impl Assignment {
    pub fn location(&self) -> SrcSpan {
        match self {
            Self::Scalar { location, .. }
            | Self::Cell { location, .. }
            | Self::Range { location, .. }
            | Self::Sheet { location, .. } => *location,
        }
    }
}

// scalar_expr -> simple_expr {compare simple_expr}
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarExpr {
    pub first: SimpleExpr,
    pub comparisons: Vec<(CompareOp, SimpleExpr)>,
    pub location: SrcSpan,
}

impl<T: Iterator<Item = LexResult>> Parse<T> for ScalarExpr {
    fn parse(parser: &mut Parser<T>) -> Result<Self, ParseError> {
        let first = SimpleExpr::parse(parser)?;
        let mut comparisons = vec![];

        loop {
            let op = match &parser.current_token {
                Some((_, token, _)) if token.is_compare_operator() => CompareOp::from(token),
                _ => break,
            };

            parser.step();
            comparisons.push((op, SimpleExpr::parse(parser)?));
        }

        let location = match comparisons.last() {
            Some((_, last)) => SrcSpan {
                start: first.location.start,
                end: last.location.end,
            },
            None => first.location,
        };

        Ok(Self {
            first,
            comparisons,
            location,
        })
    }
}

impl Display for ScalarExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.first)?;

        for (op, operand) in &self.comparisons {
            write!(f, " {op} {operand}")?;
        }

        Ok(())
    }
}

impl ScalarExpr {
    /// The literal value of a constant expression, used to flag
    /// conditions that never change.
    pub fn as_constant(&self) -> Option<Decimal> {
        if !self.comparisons.is_empty() {
            return None;
        }

        self.first.as_constant()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
}

impl From<&Token> for CompareOp {
    fn from(token: &Token) -> Self {
        match token {
            Token::Equal => Self::Equal,
            Token::NotEqual => Self::NotEqual,
            Token::LessThan => Self::LessThan,
            Token::LessThanOrEqual => Self::LessThanOrEqual,
            Token::GreaterThan => Self::GreaterThan,
            Token::GreaterThanOrEqual => Self::GreaterThanOrEqual,
            _ => unreachable!("not a comparison operator"),
        }
    }
}

impl Display for CompareOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let op = match self {
            Self::Equal => "=",
            Self::NotEqual => "!=",
            Self::LessThan => "<",
            Self::LessThanOrEqual => "<=",
            Self::GreaterThan => ">",
            Self::GreaterThanOrEqual => ">=",
        };

        write!(f, "{op}")
    }
}

// simple_expr -> term {(+ | -) term}
#[derive(Debug, Clone, PartialEq)]
pub struct SimpleExpr {
    pub first: Term,
    pub rest: Vec<(SumOp, Term)>,
    pub location: SrcSpan,
}

impl<T: Iterator<Item = LexResult>> Parse<T> for SimpleExpr {
    fn parse(parser: &mut Parser<T>) -> Result<Self, ParseError> {
        let first = Term::parse(parser)?;
        let mut rest = vec![];

        loop {
            let op = match &parser.current_token {
                Some((_, Token::Plus, _)) => SumOp::Plus,
                Some((_, Token::Minus, _)) => SumOp::Minus,
                _ => break,
            };

            parser.step();
            rest.push((op, Term::parse(parser)?));
        }

        let location = match rest.last() {
            Some((_, last)) => SrcSpan {
                start: first.location.start,
                end: last.location.end,
            },
            None => first.location,
        };

        Ok(Self {
            first,
            rest,
            location,
        })
    }
}

impl Display for SimpleExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.first)?;

        for (op, operand) in &self.rest {
            write!(f, " {op} {operand}")?;
        }

        Ok(())
    }
}

impl SimpleExpr {
    pub fn as_constant(&self) -> Option<Decimal> {
        if !self.rest.is_empty() {
            return None;
        }

        self.first.as_constant()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SumOp {
    Plus,
    Minus,
}

impl Display for SumOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Plus => write!(f, "+"),
            Self::Minus => write!(f, "-"),
        }
    }
}

// term -> factor {(* | /) factor}
#[derive(Debug, Clone, PartialEq)]
pub struct Term {
    pub first: Factor,
    pub rest: Vec<(MulOp, Factor)>,
    pub location: SrcSpan,
}

impl<T: Iterator<Item = LexResult>> Parse<T> for Term {
    fn parse(parser: &mut Parser<T>) -> Result<Self, ParseError> {
        let first = Factor::parse(parser)?;
        let mut rest = vec![];

        loop {
            let op = match &parser.current_token {
                Some((_, Token::Mult, _)) => MulOp::Mult,
                Some((_, Token::Div, _)) => MulOp::Div,
                _ => break,
            };

            parser.step();
            rest.push((op, Factor::parse(parser)?));
        }

        let location = match rest.last() {
            Some((_, last)) => SrcSpan {
                start: first.location.start,
                end: last.location.end,
            },
            None => first.location,
        };

        Ok(Self {
            first,
            rest,
            location,
        })
    }
}

impl Display for Term {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.first)?;

        for (op, operand) in &self.rest {
            write!(f, " {op} {operand}")?;
        }

        Ok(())
    }
}

impl Term {
    pub fn as_constant(&self) -> Option<Decimal> {
        if !self.rest.is_empty() {
            return None;
        }

        self.first.as_constant()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MulOp {
    Mult,
    Div,
}

impl Display for MulOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mult => write!(f, "*"),
            Self::Div => write!(f, "/"),
        }
    }
}

// factor -> [-] atom
//
// The sign folds into the factor rather than becoming a negation node.
#[derive(Debug, Clone, PartialEq)]
pub struct Factor {
    pub negated: bool,
    pub atom: Atom,
    pub location: SrcSpan,
}

impl<T: Iterator<Item = LexResult>> Parse<T> for Factor {
    fn parse(parser: &mut Parser<T>) -> Result<Self, ParseError> {
        let minus = parser.eat(&Token::Minus);
        let atom = Atom::parse(parser)?;

        let location = match minus {
            Some((start, _)) => SrcSpan { start, end: atom.location().end },
            None => atom.location(),
        };

        Ok(Self {
            negated: minus.is_some(),
            atom,
            location,
        })
    }
}

impl Display for Factor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.negated {
            write!(f, "-{}", self.atom)
        } else {
            write!(f, "{}", self.atom)
        }
    }
}

impl Factor {
    pub fn as_constant(&self) -> Option<Decimal> {
        let value = match &self.atom {
            Atom::Number { value, .. } => *value,
            _ => return None,
        };

        Some(if self.negated { -value } else { value })
    }
}

// atom -> IDENT | NUMBER | function_call | cell_ref | # range_expr
//       | ( scalar_expr )
#[derive(Debug, Clone, PartialEq)]
pub enum Atom {
    Number {
        value: Decimal,
        location: SrcSpan,
    },
    Identifier(Identifier),
    Call(Call),
    CellRef(CellRef),
    RangeLength {
        range: Box<RangeExpr>,
        location: SrcSpan,
    },
    Parenthesized {
        expression: Box<ScalarExpr>,
        location: SrcSpan,
    },
}

impl<T: Iterator<Item = LexResult>> Parse<T> for Atom {
    fn parse(parser: &mut Parser<T>) -> Result<Self, ParseError> {
        match &parser.current_token {
            Some((_, Token::Ident(_), _)) => {
                Ok(Self::Identifier(Identifier::from(parser.expect_ident()?)))
            },
            Some((_, Token::Int(_) | Token::Decimal(_), _)) => match parser.next_token() {
                Some((start, Token::Int(value), end)) => Ok(Self::Number {
                    value: Decimal::from(value),
                    location: SrcSpan { start, end },
                }),
                Some((start, Token::Decimal(value), end)) => Ok(Self::Number {
                    value,
                    location: SrcSpan { start, end },
                }),
                _ => unreachable!("number token checked above"),
            },
            Some((_, Token::FuncIdent(_), _)) => Ok(Self::Call(Call::parse(parser)?)),
            Some((_, Token::SheetIdent(_) | Token::Dollar, _)) => {
                Ok(Self::CellRef(CellRef::parse(parser)?))
            },
            Some((_, Token::NumberSign, _)) => {
                let (start, _) = parser.expect_one(Token::NumberSign)?;
                let range = RangeExpr::parse(parser)?;

                Ok(Self::RangeLength {
                    location: SrcSpan { start, end: range.location().end },
                    range: Box::new(range),
                })
            },
            Some((_, Token::LParen, _)) => {
                let (start, _) = parser.expect_one(Token::LParen)?;
                let expression = Box::new(ScalarExpr::parse(parser)?);
                let (_, end) = parser.expect_one(Token::RParen)?;

                Ok(Self::Parenthesized {
                    expression,
                    location: SrcSpan { start, end },
                })
            },
            Some((start, Token::Eof, end)) => parse_error(
                ParseErrorType::UnexpectedEof,
                SrcSpan { start: *start, end: *end },
            ),
            Some((start, token, end)) => parse_error(
                ParseErrorType::UnexpectedToken {
                    token: token.clone(),
                    expected: vec!["an expression".to_string()],
                },
                SrcSpan { start: *start, end: *end },
            ),
            None => parse_error(ParseErrorType::UnexpectedEof, SrcSpan::default()),
        }
    }
}

impl Display for Atom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number { value, .. } => write!(f, "{value}"),
            Self::Identifier(identifier) => write!(f, "{identifier}"),
            Self::Call(call) => write!(f, "{call}"),
            Self::CellRef(cell_ref) => write!(f, "{cell_ref}"),
            Self::RangeLength { range, .. } => write!(f, "#{range}"),
            Self::Parenthesized { expression, .. } => write!(f, "({expression})"),
        }
    }
}

impl Atom {
    pub fn location(&self) -> SrcSpan {
        match self {
            Self::Number { location, .. }
            | Self::RangeLength { location, .. }
            | Self::Parenthesized { location, .. } => *location,
            Self::Identifier(identifier) => identifier.location,
            Self::Call(call) => call.location,
            Self::CellRef(cell_ref) => cell_ref.location(),
        }
    }
}

// function_call / subroutine_call -> FUNC_IDENT [ arguments? ]
//
// Which of the two it is depends on where the call appears; the
// analyzer checks the resolved definition agrees.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub name: Identifier,
    pub arguments: Vec<Argument>,
    pub location: SrcSpan,
}

impl<T: Iterator<Item = LexResult>> Parse<T> for Call {
    fn parse(parser: &mut Parser<T>) -> Result<Self, ParseError> {
        let (start, name, name_end) = parser.expect_func_ident()?;

        parser.expect_one(Token::LSquare)?;

        let mut arguments = vec![];

        if !matches!(parser.current_token, Some((_, Token::RSquare, _))) {
            arguments.push(Argument::parse(parser)?);

            while parser.eat_comma() {
                arguments.push(Argument::parse(parser)?);
            }
        }

        let (_, end) = parser.expect_one(Token::RSquare)?;

        Ok(Self {
            name: Identifier::from((start, name, name_end)),
            arguments,
            location: SrcSpan { start, end },
        })
    }
}

impl Display for Call {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let arguments = self.arguments.iter()
            .map(|argument| argument.to_string())
            .collect::<Vec<String>>();

        write!(f, "{}[{}]", self.name, arguments.join(", "))
    }
}

// arg_expr -> scalar_expr | range_expr | SHEET_IDENT
#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
    Scalar(ScalarExpr),
    Range(RangeExpr),
    Sheet(Identifier),
}

impl<T: Iterator<Item = LexResult>> Parse<T> for Argument {
    fn parse(parser: &mut Parser<T>) -> Result<Self, ParseError> {
        match (&parser.current_token, &parser.next_token) {
            // A bare sheet name is a sheet argument; with a quote it
            // starts a cell reference instead.
            (Some((_, Token::SheetIdent(_), _)), next)
                if !matches!(next, Some((_, Token::SQuote, _))) =>
            {
                Ok(Self::Sheet(Identifier::from(parser.expect_sheet_ident()?)))
            },
            (Some((_, Token::RangeIdent(_) | Token::Range | Token::LSquare, _)), _) => {
                Ok(Self::Range(RangeExpr::parse(parser)?))
            },
            _ => Ok(Self::Scalar(ScalarExpr::parse(parser)?)),
        }
    }
}

impl Display for Argument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Scalar(expression) => write!(f, "{expression}"),
            Self::Range(range) => write!(f, "{range}"),
            Self::Sheet(sheet) => write!(f, "{sheet}"),
        }
    }
}

impl Argument {
    pub fn location(&self) -> SrcSpan {
        match self {
            Self::Scalar(expression) => expression.location,
            Self::Range(range) => range.location(),
            Self::Sheet(sheet) => sheet.location,
        }
    }
}

// range_expr -> RANGE_IDENT
//             | range cell_ref .. cell_ref
//             | [ function_call ]
//             | range_expr [ INT , INT ]
#[derive(Debug, Clone, PartialEq)]
pub enum RangeExpr {
    Named(Identifier),
    Cells {
        from: CellRef,
        to: CellRef,
        location: SrcSpan,
    },
    FunctionCall {
        call: Call,
        location: SrcSpan,
    },
    Slice {
        base: Box<RangeExpr>,
        from: i64,
        to: i64,
        location: SrcSpan,
    },
}

impl<T: Iterator<Item = LexResult>> Parse<T> for RangeExpr {
    fn parse(parser: &mut Parser<T>) -> Result<Self, ParseError> {
        let mut range = match &parser.current_token {
            Some((_, Token::RangeIdent(_), _)) => {
                Self::Named(Identifier::from(parser.expect_range_ident()?))
            },
            Some((_, Token::Range, _)) => {
                let (start, _) = parser.expect_one(Token::Range)?;
                let from = CellRef::parse(parser)?;
                parser.expect_one(Token::DotDot)?;
                let to = CellRef::parse(parser)?;

                Self::Cells {
                    location: SrcSpan { start, end: to.location().end },
                    from,
                    to,
                }
            },
            Some((_, Token::LSquare, _)) => {
                let (start, _) = parser.expect_one(Token::LSquare)?;
                let call = Call::parse(parser)?;
                let (_, end) = parser.expect_one(Token::RSquare)?;

                Self::FunctionCall {
                    call,
                    location: SrcSpan { start, end },
                }
            },
            Some((start, Token::Eof, end)) => return parse_error(
                ParseErrorType::UnexpectedEof,
                SrcSpan { start: *start, end: *end },
            ),
            Some((start, token, end)) => return parse_error(
                ParseErrorType::UnexpectedToken {
                    token: token.clone(),
                    expected: vec!["a range expression".to_string()],
                },
                SrcSpan { start: *start, end: *end },
            ),
            None => return parse_error(ParseErrorType::UnexpectedEof, SrcSpan::default()),
        };

        // Postfix `[from, to]` re-maps the range to a view of itself.
        while matches!(
            (&parser.current_token, &parser.next_token),
            (Some((_, Token::LSquare, _)), Some((_, Token::Int(_), _)))
        ) {
            parser.expect_one(Token::LSquare)?;
            let (_, from, _) = parser.expect_int()?;
            parser.expect_comma()?;
            let (_, to, _) = parser.expect_int()?;
            let (_, end) = parser.expect_one(Token::RSquare)?;

            let start = range.location().start;

            range = Self::Slice {
                base: Box::new(range),
                from,
                to,
                location: SrcSpan { start, end },
            };
        }

        Ok(range)
    }
}

impl Display for RangeExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Named(name) => write!(f, "{name}"),
            Self::Cells { from, to, .. } => write!(f, "range {from} .. {to}"),
            Self::FunctionCall { call, .. } => write!(f, "[{call}]"),
            Self::Slice { base, from, to, .. } => write!(f, "{base}[{from}, {to}]"),
        }
    }
}

impl RangeExpr {
    pub fn location(&self) -> SrcSpan {
        match self {
            Self::Named(name) => name.location,
            Self::Cells { location, .. }
            | Self::FunctionCall { location, .. }
            | Self::Slice { location, .. } => *location,
        }
    }
}

// cell_ref -> SHEET_IDENT ' COORDINATE | $ | $ : RANGE_IDENT
#[derive(Debug, Clone, PartialEq)]
pub enum CellRef {
    Cell {
        sheet: Identifier,
        coord: CellCoord,
        location: SrcSpan,
    },
    /// `$`, the cell a `for` loop is currently visiting.
    CurrentCell {
        location: SrcSpan,
    },
    /// `$:_r`, the cell of `_r` at the current loop index.
    RangeOffset {
        range: Identifier,
        location: SrcSpan,
    },
}

impl<T: Iterator<Item = LexResult>> Parse<T> for CellRef {
    fn parse(parser: &mut Parser<T>) -> Result<Self, ParseError> {
        match &parser.current_token {
            Some((_, Token::SheetIdent(_), _)) => {
                let (start, sheet, sheet_end) = parser.expect_sheet_ident()?;
                parser.expect_one(Token::SQuote)?;
                let (coord_start, text, end) = parser.expect_coordinate()?;

                let coord = match CellCoord::from_text(&text) {
                    Some(coord) => coord,
                    None => return parse_error(
                        ParseErrorType::InvalidCoordinate { text },
                        SrcSpan { start: coord_start, end },
                    ),
                };

                Ok(Self::Cell {
                    sheet: Identifier::from((start, sheet, sheet_end)),
                    coord,
                    location: SrcSpan { start, end },
                })
            },
            Some((_, Token::Dollar, _)) => {
                let (start, dollar_end) = parser.expect_one(Token::Dollar)?;

                match parser.eat(&Token::Colon) {
                    Some(_) => {
                        let (_, name, end) = parser.expect_range_ident()?;

                        Ok(Self::RangeOffset {
                            range: Identifier::from((start, name, end)),
                            location: SrcSpan { start, end },
                        })
                    },
                    None => Ok(Self::CurrentCell {
                        location: SrcSpan { start, end: dollar_end },
                    }),
                }
            },
            Some((start, token, end)) => parse_error(
                ParseErrorType::UnexpectedToken {
                    token: token.clone(),
                    expected: vec!["a cell reference".to_string()],
                },
                SrcSpan { start: *start, end: *end },
            ),
            None => parse_error(ParseErrorType::UnexpectedEof, SrcSpan::default()),
        }
    }
}

impl Display for CellRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cell { sheet, coord, .. } => write!(f, "{sheet}'{coord}"),
            Self::CurrentCell { .. } => write!(f, "$"),
            Self::RangeOffset { range, .. } => write!(f, "$:{range}"),
        }
    }
}

impl CellRef {
    pub fn location(&self) -> SrcSpan {
        match self {
            Self::Cell { location, .. }
            | Self::CurrentCell { location }
            | Self::RangeOffset { location, .. } => *location,
        }
    }
}

/// A spreadsheet address resolved to zero-based column and row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellCoord {
    pub column: usize,
    pub row: usize,
    pub text: String,
}

impl CellCoord {
    /// `A`..`Z` map to columns 0..25; a two-letter prefix counts on
    /// from there in base 26. The row number is one-based in source.
    pub fn from_text(text: &str) -> Option<Self> {
        let letters = text.chars()
            .take_while(|c| c.is_ascii_uppercase())
            .count();

        let column = match &text.as_bytes()[..letters] {
            [c] => (c - b'A') as usize,
            [c1, c2] => ((c1 - b'A') as usize + 1) * 26 + (c2 - b'A') as usize,
            _ => return None,
        };

        let row = text[letters..].parse::<usize>().ok()?;
        if row == 0 {
            return None;
        }

        Some(Self {
            column,
            row: row - 1,
            text: text.to_string(),
        })
    }
}

impl Display for CellCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.text)
    }
}

// identifier leaf, shared by every name class
#[derive(Debug, Clone, PartialEq)]
pub struct Identifier {
    pub value: String,
    pub location: SrcSpan,
}

impl Display for Identifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.value)
    }
}

impl From<(u32, String, u32)> for Identifier {
    fn from(value: (u32, String, u32)) -> Self {
        Identifier {
            value: value.1,
            location: SrcSpan { start: value.0, end: value.2 },
        }
    }
}
