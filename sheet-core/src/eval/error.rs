use crate::utils::prelude::SrcSpan;

/// Failures the analyzer does not pre-validate: they surface at the
/// point of execution and abort the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    DivisionByZero {
        location: SrcSpan,
    },
    CellOutOfBounds {
        location: SrcSpan,
        sheet: String,
        column: usize,
        row: usize,
    },
    RangeIndexOutOfBounds {
        location: SrcSpan,
        index: usize,
        length: usize,
    },
    SliceOutOfBounds {
        location: SrcSpan,
        from: i64,
        to: i64,
        length: usize,
    },
    RangeSheetMismatch {
        location: SrcSpan,
    },
    RangeNotAligned {
        location: SrcSpan,
    },
    /// `$` or `$:_r` outside a `for` iteration.
    NoCurrentCell {
        location: SrcSpan,
    },
    /// A function body that reached `end` without executing `return`.
    MissingReturn {
        location: SrcSpan,
        name: String,
    },
    /// A call produced a value of the wrong kind for its position,
    /// e.g. a range-returning function used as a scalar atom.
    ValueKindMismatch {
        location: SrcSpan,
        expected: &'static str,
        found: &'static str,
    },
    /// A name with no live binding. Reachable when re-entrant calls
    /// sharing the global table clean up an aliased binding.
    UnboundName {
        location: SrcSpan,
        name: String,
    },
    InvalidSheetSize {
        location: SrcSpan,
        rows: i64,
        columns: i64,
    },
    Io {
        err: std::io::ErrorKind,
    },
}
