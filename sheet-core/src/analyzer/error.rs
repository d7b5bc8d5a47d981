use crate::{environment::prelude::SymbolKind, utils::prelude::SrcSpan};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Problems {
    errors: Vec<AnalyzeError>,
    warnings: Vec<Warning>,
}

impl Problems {
    pub fn error(&mut self, error: AnalyzeError) {
        self.errors.push(error)
    }

    pub fn take_errors(&mut self) -> Vec<AnalyzeError> {
        std::mem::take(&mut self.errors)
    }

    pub fn warning(&mut self, warning: Warning) {
        self.warnings.push(warning)
    }

    pub fn take_warnings(&mut self) -> Vec<Warning> {
        std::mem::take(&mut self.warnings)
    }

    pub fn sort(&mut self) {
        self.errors.sort_by_key(|e| e.location().start);
        self.warnings.sort_by_key(|w| w.location().start);
    }
}

#[derive(Debug, PartialEq, Clone)]
pub enum AnalyzeError {
    /// A name bound twice, in the global or the temporary table.
    ///
    /// ```text
    /// scalar a
    /// scalar a    <- the scalar `a` is defined more than once
    /// ```
    Redefinition {
        location: SrcSpan,
        previous: SrcSpan,
        kind: SymbolKind,
        name: String,
    },
    /// A use with no reachable definition.
    ///
    /// ```text
    /// print_scalar b    <- no scalar named `b` is defined
    /// ```
    UndefinedSymbol {
        location: SrcSpan,
        kind: &'static str,
        name: String,
    },
    /// A two-cell range whose endpoints name different sheets.
    ///
    /// ```text
    /// range _r = range A'B1 .. C'B3    <- sheets `A` and `C`
    /// ```
    IncompatibleRange {
        location: SrcSpan,
        left_sheet: String,
        right_sheet: String,
    },
    /// A two-cell range that is neither a row nor a column.
    InvalidRange {
        location: SrcSpan,
        from: String,
        to: String,
    },
    /// A literal sheet row whose width differs from row 0.
    ///
    /// ```text
    /// sheet S = {1,2,3 , 4,5}    <- row 1 has 2 values, row 0 has 3
    /// ```
    RaggedRow {
        location: SrcSpan,
        row: usize,
        expected: usize,
        found: usize,
    },
    /// A statement call resolving to a function, or an expression call
    /// resolving to a subroutine.
    CallKindMismatch {
        location: SrcSpan,
        name: String,
        defined: SymbolKind,
        called_as: SymbolKind,
    },
    /// An actual-argument count different from the formal count.
    Arity {
        location: SrcSpan,
        name: String,
        defined: usize,
        found: usize,
    },
    /// A `return` inside a subroutine body.
    MisplacedReturn {
        location: SrcSpan,
    },
}

impl AnalyzeError {
    pub fn location(&self) -> SrcSpan {
        match self {
            AnalyzeError::Redefinition { location, .. }
            | AnalyzeError::UndefinedSymbol { location, .. }
            | AnalyzeError::IncompatibleRange { location, .. }
            | AnalyzeError::InvalidRange { location, .. }
            | AnalyzeError::RaggedRow { location, .. }
            | AnalyzeError::CallKindMismatch { location, .. }
            | AnalyzeError::Arity { location, .. }
            | AnalyzeError::MisplacedReturn { location } => *location,
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Warning {
    UnusedDefinition {
        location: SrcSpan,
        name: String,
    },
    InfiniteLoop {
        location: SrcSpan,
    },
    UnreachableLoopBody {
        location: SrcSpan,
    },
    UnreachableIfBranch {
        location: SrcSpan,
    },
    UnreachableElseBranch {
        location: SrcSpan,
    },
}

impl Warning {
    pub fn location(&self) -> SrcSpan {
        match self {
            Warning::UnusedDefinition { location, .. }
            | Warning::InfiniteLoop { location }
            | Warning::UnreachableLoopBody { location }
            | Warning::UnreachableIfBranch { location }
            | Warning::UnreachableElseBranch { location } => *location,
        }
    }
}
