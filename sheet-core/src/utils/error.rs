use std::path::PathBuf;

use termcolor::Buffer;
use thiserror::Error;

use crate::{
    analyzer::prelude::AnalyzeError,
    eval::error::RuntimeError,
    parser::prelude::{ParseError, ParseErrorType},
    utils::prelude::SrcSpan,
};
use super::diagnostic::{Diagnostic, Label, Level, Location};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    #[error("failed to parse source code")]
    Parse {
        path: PathBuf,
        src: String,
        error: ParseError,
    },
    #[error("semantic analysis failed")]
    Analysis {
        path: PathBuf,
        src: String,
        errors: Vec<AnalyzeError>,
    },
    #[error("program execution failed")]
    Runtime {
        path: PathBuf,
        src: String,
        error: RuntimeError,
    },
    #[error("IO operation failed")]
    StdIo {
        err: std::io::ErrorKind,
    },
}

impl Error {
    pub fn pretty_string(&self) -> String {
        let mut nocolor = Buffer::no_color();
        self.pretty(&mut nocolor);
        String::from_utf8(nocolor.into_inner()).expect("error printing produced invalid utf8")
    }

    pub fn pretty(&self, buf: &mut Buffer) {
        use std::io::Write;

        for diagnostic in self.to_diagnostics() {
            diagnostic.write(buf);
            writeln!(buf).expect("write new line diagnostic");
        }
    }

    pub fn to_diagnostics(&self) -> Vec<Diagnostic> {
        match self {
            Error::Parse { path, src, error } => {
                let (label, extra) = error.details();
                let text = extra.join("\n");

                // EOF errors have no span of their own and point past the source.
                let adjusted_location = if matches!(error.error, ParseErrorType::UnexpectedEof) {
                    SrcSpan {
                        start: src.len() as u32,
                        end: src.len() as u32,
                    }
                } else {
                    error.span
                };

                vec![Diagnostic {
                    title: "Syntax error".into(),
                    text,
                    level: Level::Error,
                    location: Some(Location {
                        src,
                        path: path.clone(),
                        label: Label {
                            text: Some(label.to_string()),
                            span: adjusted_location,
                        },
                        extra_labels: vec![],
                    }),
                }]
            },
            Error::Analysis { path, src, errors } => errors
                .iter()
                .map(|error| analyze_error_to_diagnostic(error, path, src))
                .collect(),
            Error::Runtime { path, src, error } => {
                vec![runtime_error_to_diagnostic(error, path, src)]
            },
            Error::StdIo { err } => {
                vec![Diagnostic {
                    title: "Standard IO error".into(),
                    text: format!("{err}"),
                    level: Level::Error,
                    location: None,
                }]
            },
        }
    }
}

fn spanned<'a>(
    title: &str,
    text: String,
    label: Option<String>,
    span: SrcSpan,
    path: &PathBuf,
    src: &'a str,
) -> Diagnostic<'a> {
    Diagnostic {
        title: title.into(),
        text,
        level: Level::Error,
        location: Some(Location {
            src,
            path: path.clone(),
            label: Label { text: label, span },
            extra_labels: vec![],
        }),
    }
}

fn analyze_error_to_diagnostic<'a>(
    error: &AnalyzeError,
    path: &PathBuf,
    src: &'a str,
) -> Diagnostic<'a> {
    match error {
        AnalyzeError::Redefinition { location, previous, kind, name } => Diagnostic {
            title: "Multiple definitions".into(),
            text: format!("The {kind} `{name}` is defined more than once."),
            level: Level::Error,
            location: Some(Location {
                src,
                path: path.clone(),
                label: Label {
                    text: Some("Defined again here".into()),
                    span: *location,
                },
                extra_labels: vec![Label {
                    text: Some("First defined here".into()),
                    span: *previous,
                }],
            }),
        },
        AnalyzeError::UndefinedSymbol { location, kind, name } => spanned(
            "Unknown name",
            format!("No {kind} named `{name}` is defined."),
            None,
            *location,
            path,
            src,
        ),
        AnalyzeError::IncompatibleRange { location, left_sheet, right_sheet } => spanned(
            "Incompatible range",
            format!(
                "The endpoints of this range live on different sheets: `{left_sheet}` and `{right_sheet}`."
            ),
            Some("A range must stay on one sheet".into()),
            *location,
            path,
            src,
        ),
        AnalyzeError::InvalidRange { location, from, to } => spanned(
            "Invalid range",
            format!("Cells `{from}` and `{to}` share neither a row nor a column."),
            Some("A range must be a single row or column".into()),
            *location,
            path,
            src,
        ),
        AnalyzeError::RaggedRow { location, row, expected, found } => spanned(
            "Ragged sheet row",
            format!("Row {row} has {found} values, but row 0 has {expected}."),
            Some(format!("Expected {expected} values in this row")),
            *location,
            path,
            src,
        ),
        AnalyzeError::CallKindMismatch { location, name, defined, called_as } => spanned(
            "Wrong call kind",
            format!("`{name}` is a {defined}, but it is called as a {called_as}."),
            None,
            *location,
            path,
            src,
        ),
        AnalyzeError::Arity { location, name, defined, found } => spanned(
            "Wrong number of arguments",
            format!("`{name}` defined {defined} but found {found}."),
            Some(format!("Expected {defined} arguments")),
            *location,
            path,
            src,
        ),
        AnalyzeError::MisplacedReturn { location } => spanned(
            "Misplaced return",
            "A subroutine cannot contain a `return` statement.".into(),
            Some("Only functions may return".into()),
            *location,
            path,
            src,
        ),
    }
}

fn runtime_error_to_diagnostic<'a>(
    error: &RuntimeError,
    path: &PathBuf,
    src: &'a str,
) -> Diagnostic<'a> {
    match error {
        RuntimeError::DivisionByZero { location } => spanned(
            "Division by zero",
            "The divisor evaluated to zero.".into(),
            None,
            *location,
            path,
            src,
        ),
        RuntimeError::CellOutOfBounds { location, sheet, column, row } => spanned(
            "Cell out of bounds",
            format!("Sheet `{sheet}` has no cell at column {column}, row {row}."),
            None,
            *location,
            path,
            src,
        ),
        RuntimeError::RangeIndexOutOfBounds { location, index, length } => spanned(
            "Range index out of bounds",
            format!("Index {index} is outside the range of {length} cells."),
            None,
            *location,
            path,
            src,
        ),
        RuntimeError::SliceOutOfBounds { location, from, to, length } => spanned(
            "Slice out of bounds",
            format!("Offsets [{from}, {to}] do not fit a range of {length} cells."),
            None,
            *location,
            path,
            src,
        ),
        RuntimeError::RangeSheetMismatch { location } => spanned(
            "Incompatible range",
            "The endpoints of this range resolved to different sheets.".into(),
            None,
            *location,
            path,
            src,
        ),
        RuntimeError::RangeNotAligned { location } => spanned(
            "Invalid range",
            "The endpoints of this range share neither a row nor a column.".into(),
            None,
            *location,
            path,
            src,
        ),
        RuntimeError::NoCurrentCell { location } => spanned(
            "No current cell",
            "`$` is only meaningful inside a `for` loop.".into(),
            None,
            *location,
            path,
            src,
        ),
        RuntimeError::MissingReturn { location, name } => spanned(
            "Missing return",
            format!("Function `{name}` finished without executing a `return` statement."),
            None,
            *location,
            path,
            src,
        ),
        RuntimeError::ValueKindMismatch { location, expected, found } => spanned(
            "Value kind mismatch",
            format!("Expected a {expected} value here, but found a {found}."),
            None,
            *location,
            path,
            src,
        ),
        RuntimeError::UnboundName { location, name } => spanned(
            "Unbound name",
            format!("`{name}` has no binding at this point of execution."),
            None,
            *location,
            path,
            src,
        ),
        RuntimeError::InvalidSheetSize { location, rows, columns } => spanned(
            "Invalid sheet size",
            format!("A sheet cannot have {rows} rows and {columns} columns."),
            None,
            *location,
            path,
            src,
        ),
        RuntimeError::Io { err } => Diagnostic {
            title: "Output error".into(),
            text: format!("{err}"),
            level: Level::Error,
            location: None,
        },
    }
}
