#[cfg(test)]
mod tests;

pub mod error;

use std::io::Write;
use std::path::PathBuf;
use std::rc::Rc;

use rust_decimal::Decimal;

use crate::{
    environment::prelude::{
        format_scalar, round_stored, Environment, RangeValue, SheetValue, SymbolData,
        SymbolKind, Value,
    },
    parser::prelude::{
        Argument, Assignment, Atom, Call, CellRef, CompareOp, Definition, Factor, For,
        Formal, Module, MulOp, Program, RangeExpr, ReturnValue, ScalarExpr, SheetInit,
        SimpleExpr, Statement, SumOp, Term,
    },
    utils::prelude::{Error, SrcSpan, WarningEmitterIO},
};

use error::RuntimeError;

/// The whole pipeline for one source file: read, parse, analyze,
/// evaluate. Program output goes to stdout.
pub fn run(path: PathBuf, warnings: Rc<dyn WarningEmitterIO>) -> Result<(), Error> {
    let src = std::fs::read_to_string(&path)
        .map_err(|err| Error::StdIo { err: err.kind() })?;

    let module = crate::analyzer::analyze_source(&src, path.clone(), warnings)?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    eval(&module, &mut out).map_err(|error| Error::Runtime { path, src, error })
}

/// Executes an analyzed module, writing program output to `out`.
pub fn eval<W: Write>(module: &Module, out: &mut W) -> Result<(), RuntimeError> {
    Evaluator::new(out).eval_program(&module.program)
}

/// One `for` iteration: the range being walked and the position in it.
/// `$` and `$:_r` resolve against the innermost context.
struct LoopContext {
    range: RangeValue,
    index: usize,
}

enum Executed {
    Completed,
    Returned(Value),
}

/// Tree walker over the validated program. All bindings live in the one
/// global table; call bindings are tracked in the temporary table and
/// deleted again on return, so recursion aliases rather than stacks.
pub struct Evaluator<'p, 'o, W: Write> {
    env: Environment<'p>,
    loops: Vec<LoopContext>,
    out: &'o mut W,
}

impl<'p, 'o, W: Write> Evaluator<'p, 'o, W> {
    pub fn new(out: &'o mut W) -> Self {
        Self {
            env: Environment::new(),
            loops: vec![],
            out,
        }
    }

    pub fn eval_program(&mut self, program: &'p Program) -> Result<(), RuntimeError> {
        for definition in &program.definitions {
            self.bind_definition(definition, false)?;
        }

        for statement in &program.statements {
            // A top-level return ends the program.
            if let Executed::Returned(_) = self.execute(statement)? {
                break;
            }
        }

        Ok(())
    }

    fn bind_definition(
        &mut self,
        definition: &'p Definition,
        in_call: bool,
    ) -> Result<(), RuntimeError> {
        let name = definition.name().value.clone();
        let location = definition.name().location;

        let data = match definition {
            Definition::Scalar(def) => {
                let value = match &def.init {
                    Some(init) => round_stored(self.eval_scalar(init)?),
                    None => Decimal::ZERO,
                };

                SymbolData::new(SymbolKind::Scalar, location)
                    .with_definition(definition)
                    .with_value(Value::Scalar(value))
            },
            Definition::Range(def) => {
                let value = match &def.init {
                    Some(init) => self.eval_range(init)?,
                    None => RangeValue::default(),
                };

                SymbolData::new(SymbolKind::Range, location)
                    .with_definition(definition)
                    .with_value(Value::Range(value))
            },
            Definition::Sheet(def) => {
                let value = match &def.init {
                    Some(init) => self.eval_sheet_init(init)?,
                    None => SheetValue::default(),
                };

                SymbolData::new(SymbolKind::Sheet, location)
                    .with_definition(definition)
                    .with_value(Value::Sheet(value))
            },
            Definition::Function(_) => {
                SymbolData::new(SymbolKind::Function, location).with_definition(definition)
            },
            Definition::Subroutine(_) => {
                SymbolData::new(SymbolKind::Subroutine, location).with_definition(definition)
            },
        };

        let kind = data.kind;
        self.env.declare(name.clone(), data);

        if in_call {
            self.env.track_temp(name, kind, location);
        }

        Ok(())
    }

    fn eval_sheet_init(&mut self, init: &'p SheetInit) -> Result<SheetValue, RuntimeError> {
        match init {
            SheetInit::Literal { rows, .. } => {
                let mut grid = Vec::with_capacity(rows.len());

                for row in rows {
                    let mut values = Vec::with_capacity(row.values.len());

                    for value in &row.values {
                        values.push(round_stored(self.eval_simple(value)?));
                    }

                    grid.push(values);
                }

                Ok(SheetValue { rows: grid })
            },
            SheetInit::Size { rows, columns, location } => {
                if *rows < 0 || *columns < 0 {
                    return Err(RuntimeError::InvalidSheetSize {
                        location: *location,
                        rows: *rows,
                        columns: *columns,
                    });
                }

                Ok(SheetValue::zeroed(*rows as usize, *columns as usize))
            }
        }
    }

    fn execute(&mut self, statement: &'p Statement) -> Result<Executed, RuntimeError> {
        match statement {
            Statement::PrintScalar(print) => {
                let value = self.eval_scalar(&print.value)?;
                let info = info_text(&print.info);

                writeln!(self.out, "{}{}", info, format_scalar(value)).map_err(io_error)?;

                Ok(Executed::Completed)
            },
            Statement::PrintRange(print) => {
                let range = self.eval_range(&print.range)?;
                let location = print.range.location();

                write!(self.out, "{}", info_text(&print.info)).map_err(io_error)?;

                for (column, row) in &range.cells {
                    let value = self.read_sheet_cell(&range.sheet, *column, *row, location)?;
                    write!(self.out, "{} ", format_scalar(value)).map_err(io_error)?;
                }

                writeln!(self.out).map_err(io_error)?;

                Ok(Executed::Completed)
            },
            Statement::PrintSheet(print) => {
                let sheet = self.sheet_value(&print.sheet.value, print.sheet.location)?.clone();

                writeln!(self.out, "{}{}", info_text(&print.info), sheet).map_err(io_error)?;

                Ok(Executed::Completed)
            },
            Statement::If(conditional) => {
                let condition = self.eval_scalar(&conditional.condition)?;

                let branch = if condition != Decimal::ZERO {
                    Some(&conditional.consequence)
                } else {
                    conditional.alternative.as_ref()
                };

                if let Some(branch) = branch {
                    for statement in branch {
                        if let Executed::Returned(value) = self.execute(statement)? {
                            return Ok(Executed::Returned(value));
                        }
                    }
                }

                Ok(Executed::Completed)
            },
            Statement::While(loop_) => {
                // The condition is re-tested before every iteration,
                // including the first.
                while self.eval_scalar(&loop_.condition)? != Decimal::ZERO {
                    for statement in &loop_.body {
                        if let Executed::Returned(value) = self.execute(statement)? {
                            return Ok(Executed::Returned(value));
                        }
                    }
                }

                Ok(Executed::Completed)
            },
            Statement::For(loop_) => self.execute_for(loop_),
            Statement::Call(call) => {
                self.call(call)?;

                Ok(Executed::Completed)
            },
            Statement::Return(ret) => {
                let value = match &ret.value {
                    ReturnValue::Scalar(expression) => {
                        Value::Scalar(self.eval_scalar(expression)?)
                    },
                    ReturnValue::Range(range) => Value::Range(self.eval_range(range)?),
                };

                Ok(Executed::Returned(value))
            },
            Statement::Assignment(assignment) => {
                self.execute_assignment(assignment)?;

                Ok(Executed::Completed)
            },
        }
    }

    fn execute_for(&mut self, loop_: &'p For) -> Result<Executed, RuntimeError> {
        for range_expr in &loop_.ranges {
            let range = self.eval_range(range_expr)?;
            let cells = range.len();

            self.loops.push(LoopContext { range, index: 0 });

            for index in 0..cells {
                if let Some(context) = self.loops.last_mut() {
                    context.index = index;
                }

                for statement in &loop_.body {
                    match self.execute(statement) {
                        Ok(Executed::Completed) => {},
                        Ok(Executed::Returned(value)) => {
                            self.loops.pop();
                            return Ok(Executed::Returned(value));
                        },
                        Err(err) => {
                            self.loops.pop();
                            return Err(err);
                        }
                    }
                }
            }

            self.loops.pop();
        }

        Ok(Executed::Completed)
    }

    fn execute_assignment(&mut self, assignment: &'p Assignment) -> Result<(), RuntimeError> {
        match assignment {
            Assignment::Scalar { target, value, .. } => {
                let value = round_stored(self.eval_scalar(value)?);

                self.assign(&target.value, Value::Scalar(value), target.location)
            },
            Assignment::Cell { target, value, .. } => {
                let value = round_stored(self.eval_scalar(value)?);
                let (sheet, column, row) = self.resolve_cell(target)?;

                self.write_sheet_cell(&sheet, column, row, value, target.location())
            },
            Assignment::Range { target, value, .. } => {
                let value = self.eval_range(value)?;

                self.assign(&target.value, Value::Range(value), target.location)
            },
            Assignment::Sheet { target, source, .. } => {
                let grid = self.sheet_value(&source.value, source.location)?.clone();

                self.assign(&target.value, Value::Sheet(grid), target.location)
            },
        }
    }

    // The call protocol over the single global table: evaluate actuals,
    // clear the temporary table, bind formals and locals as globals
    // while recording them, run the body, delete what was recorded.
    fn call(&mut self, call: &'p Call) -> Result<Option<Value>, RuntimeError> {
        let data = self.env.get(&call.name.value).ok_or_else(|| RuntimeError::UnboundName {
            location: call.name.location,
            name: call.name.value.clone(),
        })?;

        let definition = data.definition.ok_or(RuntimeError::ValueKindMismatch {
            location: call.location,
            expected: "function",
            found: "value",
        })?;

        match definition {
            Definition::Function(def) => {
                let result = self.call_body(&def.formals, &def.locals, &def.body, call)?;

                match result {
                    Some(value) => Ok(Some(value)),
                    None => Err(RuntimeError::MissingReturn {
                        location: call.location,
                        name: call.name.value.clone(),
                    }),
                }
            },
            Definition::Subroutine(def) => {
                self.call_body(&def.formals, &def.locals, &def.body, call)?;

                Ok(None)
            },
            _ => Err(RuntimeError::ValueKindMismatch {
                location: call.location,
                expected: "function",
                found: "variable",
            }),
        }
    }

    fn call_body(
        &mut self,
        formals: &'p [Formal],
        locals: &'p [Definition],
        body: &'p [Statement],
        call: &'p Call,
    ) -> Result<Option<Value>, RuntimeError> {
        // Actuals evaluate eagerly, left to right, before any binding.
        let mut actuals = Vec::with_capacity(call.arguments.len());

        for argument in &call.arguments {
            let value = match argument {
                Argument::Scalar(expression) => {
                    Value::Scalar(round_stored(self.eval_scalar(expression)?))
                },
                Argument::Range(range) => Value::Range(self.eval_range(range)?),
                Argument::Sheet(sheet) => {
                    Value::Sheet(self.sheet_value(&sheet.value, sheet.location)?.clone())
                },
            };

            actuals.push(value);
        }

        self.env.clear_temp();

        for (formal, value) in formals.iter().zip(actuals) {
            let kind = SymbolKind::from(formal.kind);

            self.env.declare(
                formal.name.value.clone(),
                SymbolData::new(kind, formal.name.location).with_value(value),
            );
            self.env.track_temp(formal.name.value.clone(), kind, formal.name.location);
        }

        for local in locals {
            self.bind_definition(local, true)?;
        }

        let mut result = None;

        for statement in body {
            if let Executed::Returned(value) = self.execute(statement)? {
                result = Some(value);
                break;
            }
        }

        self.env.release_temp();

        Ok(result)
    }

    fn eval_scalar(&mut self, expr: &'p ScalarExpr) -> Result<Decimal, RuntimeError> {
        let mut value = self.eval_simple(&expr.first)?;

        if expr.comparisons.is_empty() {
            return Ok(value);
        }

        // The chain yields 1.0 only if every pairwise comparison holds,
        // 0.0 at the first failure.
        for (op, operand) in &expr.comparisons {
            let right = self.eval_simple(operand)?;

            if !compare(*op, value, right) {
                return Ok(Decimal::ZERO);
            }

            value = right;
        }

        Ok(Decimal::ONE)
    }

    fn eval_simple(&mut self, expr: &'p SimpleExpr) -> Result<Decimal, RuntimeError> {
        let mut value = self.eval_term(&expr.first)?;

        for (op, operand) in &expr.rest {
            let right = self.eval_term(operand)?;

            value = match op {
                SumOp::Plus => value + right,
                SumOp::Minus => value - right,
            };
        }

        Ok(value)
    }

    fn eval_term(&mut self, term: &'p Term) -> Result<Decimal, RuntimeError> {
        let mut value = self.eval_factor(&term.first)?;

        for (op, operand) in &term.rest {
            let right = self.eval_factor(operand)?;

            value = match op {
                MulOp::Mult => value * right,
                MulOp::Div => value.checked_div(right).ok_or(RuntimeError::DivisionByZero {
                    location: operand.location,
                })?,
            };
        }

        Ok(value)
    }

    fn eval_factor(&mut self, factor: &'p Factor) -> Result<Decimal, RuntimeError> {
        let value = self.eval_atom(&factor.atom)?;

        Ok(if factor.negated { -value } else { value })
    }

    fn eval_atom(&mut self, atom: &'p Atom) -> Result<Decimal, RuntimeError> {
        match atom {
            Atom::Number { value, .. } => Ok(*value),
            Atom::Identifier(identifier) => {
                self.scalar_value(&identifier.value, identifier.location)
            },
            Atom::Call(call) => match self.call(call)? {
                Some(Value::Scalar(value)) => Ok(value),
                Some(value) => Err(RuntimeError::ValueKindMismatch {
                    location: call.location,
                    expected: "scalar",
                    found: value.kind_name(),
                }),
                None => Err(RuntimeError::ValueKindMismatch {
                    location: call.location,
                    expected: "scalar",
                    found: "nothing",
                }),
            },
            Atom::CellRef(cell_ref) => {
                let (sheet, column, row) = self.resolve_cell(cell_ref)?;

                self.read_sheet_cell(&sheet, column, row, cell_ref.location())
            },
            Atom::RangeLength { range, .. } => {
                let value = self.eval_range(range)?;

                Ok(Decimal::from(value.len() as u64))
            },
            Atom::Parenthesized { expression, .. } => self.eval_scalar(expression),
        }
    }

    fn eval_range(&mut self, range: &'p RangeExpr) -> Result<RangeValue, RuntimeError> {
        match range {
            RangeExpr::Named(name) => self.range_value(&name.value, name.location),
            RangeExpr::Cells { from, to, location } => {
                let (from_sheet, from_column, from_row) = self.resolve_cell(from)?;
                let (to_sheet, to_column, to_row) = self.resolve_cell(to)?;

                if from_sheet != to_sheet {
                    return Err(RuntimeError::RangeSheetMismatch { location: *location });
                }

                let cells: Vec<(usize, usize)> = if from_row == to_row {
                    steps(from_column, to_column)
                        .map(|column| (column, from_row))
                        .collect()
                } else if from_column == to_column {
                    steps(from_row, to_row)
                        .map(|row| (from_column, row))
                        .collect()
                } else {
                    return Err(RuntimeError::RangeNotAligned { location: *location });
                };

                Ok(RangeValue {
                    sheet: from_sheet,
                    cells,
                })
            },
            RangeExpr::FunctionCall { call, location } => match self.call(call)? {
                Some(Value::Range(value)) => Ok(value),
                Some(value) => Err(RuntimeError::ValueKindMismatch {
                    location: *location,
                    expected: "range",
                    found: value.kind_name(),
                }),
                None => Err(RuntimeError::ValueKindMismatch {
                    location: *location,
                    expected: "range",
                    found: "nothing",
                }),
            },
            RangeExpr::Slice { base, from, to, location } => {
                let value = self.eval_range(base)?;
                let length = value.len();

                if *from < 0 || *to < *from || *to as usize >= length {
                    return Err(RuntimeError::SliceOutOfBounds {
                        location: *location,
                        from: *from,
                        to: *to,
                        length,
                    });
                }

                let cells = value.cells[*from as usize..=*to as usize].to_vec();

                Ok(RangeValue {
                    sheet: value.sheet,
                    cells,
                })
            },
        }
    }

    fn resolve_cell(&self, cell_ref: &CellRef) -> Result<(String, usize, usize), RuntimeError> {
        match cell_ref {
            CellRef::Cell { sheet, coord, .. } => {
                Ok((sheet.value.clone(), coord.column, coord.row))
            },
            CellRef::CurrentCell { location } => {
                let context = self.loops.last().ok_or(RuntimeError::NoCurrentCell {
                    location: *location,
                })?;

                let (column, row) = context.range.cells.get(context.index).copied().ok_or(
                    RuntimeError::RangeIndexOutOfBounds {
                        location: *location,
                        index: context.index,
                        length: context.range.len(),
                    },
                )?;

                Ok((context.range.sheet.clone(), column, row))
            },
            CellRef::RangeOffset { range, location } => {
                let context = self.loops.last().ok_or(RuntimeError::NoCurrentCell {
                    location: *location,
                })?;
                let index = context.index;

                let value = self.range_value(&range.value, range.location)?;

                let (column, row) = value.cells.get(index).copied().ok_or(
                    RuntimeError::RangeIndexOutOfBounds {
                        location: *location,
                        index,
                        length: value.len(),
                    },
                )?;

                Ok((value.sheet, column, row))
            },
        }
    }

    fn scalar_value(&self, name: &str, location: SrcSpan) -> Result<Decimal, RuntimeError> {
        match self.env.get(name) {
            Some(SymbolData { value: Some(Value::Scalar(value)), .. }) => Ok(*value),
            Some(SymbolData { value: Some(value), .. }) => {
                Err(RuntimeError::ValueKindMismatch {
                    location,
                    expected: "scalar",
                    found: value.kind_name(),
                })
            },
            Some(_) | None => Err(RuntimeError::UnboundName {
                location,
                name: name.to_string(),
            }),
        }
    }

    fn range_value(&self, name: &str, location: SrcSpan) -> Result<RangeValue, RuntimeError> {
        match self.env.get(name) {
            Some(SymbolData { value: Some(Value::Range(value)), .. }) => Ok(value.clone()),
            Some(SymbolData { value: Some(value), .. }) => {
                Err(RuntimeError::ValueKindMismatch {
                    location,
                    expected: "range",
                    found: value.kind_name(),
                })
            },
            Some(_) | None => Err(RuntimeError::UnboundName {
                location,
                name: name.to_string(),
            }),
        }
    }

    fn sheet_value(&self, name: &str, location: SrcSpan) -> Result<&SheetValue, RuntimeError> {
        match self.env.get(name) {
            Some(SymbolData { value: Some(Value::Sheet(value)), .. }) => Ok(value),
            Some(SymbolData { value: Some(value), .. }) => {
                Err(RuntimeError::ValueKindMismatch {
                    location,
                    expected: "sheet",
                    found: value.kind_name(),
                })
            },
            Some(_) | None => Err(RuntimeError::UnboundName {
                location,
                name: name.to_string(),
            }),
        }
    }

    fn read_sheet_cell(
        &self,
        sheet: &str,
        column: usize,
        row: usize,
        location: SrcSpan,
    ) -> Result<Decimal, RuntimeError> {
        let grid = self.sheet_value(sheet, location)?;

        grid.get(column, row).ok_or(RuntimeError::CellOutOfBounds {
            location,
            sheet: sheet.to_string(),
            column,
            row,
        })
    }

    fn write_sheet_cell(
        &mut self,
        sheet: &str,
        column: usize,
        row: usize,
        value: Decimal,
        location: SrcSpan,
    ) -> Result<(), RuntimeError> {
        match self.env.get_mut(sheet) {
            Some(SymbolData { value: Some(Value::Sheet(grid)), .. }) => {
                if grid.set(column, row, value) {
                    Ok(())
                } else {
                    Err(RuntimeError::CellOutOfBounds {
                        location,
                        sheet: sheet.to_string(),
                        column,
                        row,
                    })
                }
            },
            Some(SymbolData { value: Some(value), .. }) => {
                Err(RuntimeError::ValueKindMismatch {
                    location,
                    expected: "sheet",
                    found: value.kind_name(),
                })
            },
            Some(_) | None => Err(RuntimeError::UnboundName {
                location,
                name: sheet.to_string(),
            }),
        }
    }

    fn assign(&mut self, name: &str, value: Value, location: SrcSpan) -> Result<(), RuntimeError> {
        match self.env.get_mut(name) {
            Some(data) => {
                data.value = Some(value);

                Ok(())
            },
            None => Err(RuntimeError::UnboundName {
                location,
                name: name.to_string(),
            }),
        }
    }
}

fn compare(op: CompareOp, left: Decimal, right: Decimal) -> bool {
    match op {
        CompareOp::Equal => left == right,
        CompareOp::NotEqual => left != right,
        CompareOp::LessThan => left < right,
        CompareOp::LessThanOrEqual => left <= right,
        CompareOp::GreaterThan => left > right,
        CompareOp::GreaterThanOrEqual => left >= right,
    }
}

/// Inclusive walk from one index to another, in either direction.
fn steps(from: usize, to: usize) -> Box<dyn Iterator<Item = usize>> {
    if from <= to {
        Box::new(from..=to)
    } else {
        Box::new((to..=from).rev())
    }
}

fn info_text(info: &Option<crate::parser::prelude::InfoString>) -> &str {
    info.as_ref().map(|info| info.text.as_str()).unwrap_or("")
}

fn io_error(err: std::io::Error) -> RuntimeError {
    RuntimeError::Io { err: err.kind() }
}
