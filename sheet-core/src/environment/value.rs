use std::fmt::Display;

use rust_decimal::Decimal;

/// Storage rounding: every scalar is quantized to one fractional digit
/// at the moment it is stored or printed, never mid-expression.
pub fn round_stored(value: Decimal) -> Decimal {
    value.round_dp(1)
}

/// Renders a scalar with exactly one fractional digit.
pub fn format_scalar(value: Decimal) -> String {
    let mut rounded = round_stored(value);
    rounded.rescale(1);
    rounded.to_string()
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Scalar(Decimal),
    Range(RangeValue),
    Sheet(SheetValue),
}

impl Value {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Scalar(_) => "scalar",
            Self::Range(_) => "range",
            Self::Sheet(_) => "sheet",
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Scalar(value) => write!(f, "{}", format_scalar(*value)),
            Self::Range(value) => write!(f, "{value}"),
            Self::Sheet(value) => write!(f, "{value}"),
        }
    }
}

/// A range is a view: the sheet it reads through plus the cells it
/// covers, in order. Values are fetched from the sheet at use time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RangeValue {
    pub sheet: String,
    pub cells: Vec<(usize, usize)>,
}

impl RangeValue {
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl Display for RangeValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let cells = self.cells.iter()
            .map(|(column, row)| format!("({column}, {row})"))
            .collect::<Vec<String>>();

        write!(f, "{}!{}", self.sheet, cells.join(" "))
    }
}

/// A rectangular grid of scalars, addressed `rows[row][column]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SheetValue {
    pub rows: Vec<Vec<Decimal>>,
}

impl SheetValue {
    pub fn zeroed(rows: usize, columns: usize) -> Self {
        Self {
            rows: vec![vec![Decimal::ZERO; columns]; rows],
        }
    }

    pub fn get(&self, column: usize, row: usize) -> Option<Decimal> {
        self.rows.get(row)?.get(column).copied()
    }

    pub fn set(&mut self, column: usize, row: usize, value: Decimal) -> bool {
        match self.rows.get_mut(row).and_then(|row| row.get_mut(column)) {
            Some(cell) => {
                *cell = value;
                true
            },
            None => false,
        }
    }
}

impl Display for SheetValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for row in &self.rows {
            for value in row {
                write!(f, "{} ", format_scalar(*value))?;
            }
            write!(f, "/ ")?;
        }

        Ok(())
    }
}
