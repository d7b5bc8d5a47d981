use std::collections::HashMap;

use rust_decimal::Decimal;

use crate::{
    analyzer::prelude::{AnalyzeError, Problems, Warning},
    environment::prelude::{Environment, SymbolData, SymbolKind},
    parser::prelude::{
        Argument, Assignment, Atom, Call, CellRef, Definition, Formal, Identifier, If,
        Module, Program, RangeExpr, ReturnValue, ScalarExpr, SheetInit, SimpleExpr,
        Statement, While,
    },
    utils::prelude::{SrcSpan, TypeWarningEmitter},
};

pub enum Outcome<T, E> {
    Ok(T),
    PartialFailure(T, E),
}

/// Where a call appears decides what it claims to be: a statement call
/// is a subroutine call, an expression call is a function call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallSite {
    Statement,
    Expression,
}

/// Runs the semantic passes over a parsed module. Each pass is an
/// independent traversal; diagnostics accumulate and never abort a
/// pass, but any error suppresses evaluation.
#[derive(Debug)]
pub struct ModuleAnalyzer {
    problems: Problems,
}

impl ModuleAnalyzer {
    pub fn analyze(
        module: Module,
        warnings: &TypeWarningEmitter,
    ) -> Outcome<Module, Vec<AnalyzeError>> {
        let mut analyzer = ModuleAnalyzer {
            problems: Default::default(),
        };

        {
            let program = &module.program;

            analyzer.check_symbols(program);
            analyzer.check_ranges(program);
            analyzer.check_sheet_shapes(program);
            analyzer.check_call_kinds(program);
            analyzer.check_arity(program);
            analyzer.check_return_placement(program);
        }

        analyzer.problems.sort();

        for warning in analyzer.problems.take_warnings() {
            warnings.emit(warning);
        }

        let errors = analyzer.problems.take_errors();

        if errors.is_empty() {
            Outcome::Ok(module)
        } else {
            Outcome::PartialFailure(module, errors)
        }
    }

    // Pass 1: definitions and uses.
    //
    // Formals shadow through the temporary table while a callable's
    // body is walked; body locals land in the global table and leave it
    // again when the walk leaves the definition.
    fn check_symbols<'p>(&mut self, program: &'p Program) {
        let mut env: Environment<'p> = Environment::new();

        for definition in &program.definitions {
            self.declare_definition(definition, &mut env);
        }

        for statement in &program.statements {
            self.check_statement_symbols(statement, &mut env);
        }

        for (name, data) in &env.store {
            if !data.used {
                self.problems.warning(Warning::UnusedDefinition {
                    location: data.location,
                    name: name.clone(),
                });
            }
        }
    }

    fn declare_definition<'p>(&mut self, definition: &'p Definition, env: &mut Environment<'p>) {
        let name = definition.name();
        let kind = definition_kind(definition);

        match env.get(&name.value) {
            Some(existing) => {
                self.problems.error(AnalyzeError::Redefinition {
                    location: name.location,
                    previous: existing.location,
                    kind: existing.kind,
                    name: name.value.clone(),
                });
            },
            None => {
                env.declare(
                    name.value.clone(),
                    SymbolData::new(kind, name.location).with_definition(definition),
                );
            }
        }

        match definition {
            Definition::Scalar(def) => {
                if let Some(init) = &def.init {
                    self.check_scalar_symbols(init, env);
                }
            },
            Definition::Range(def) => {
                if let Some(init) = &def.init {
                    self.check_range_symbols(init, env);
                }
            },
            Definition::Sheet(def) => {
                if let Some(SheetInit::Literal { rows, .. }) = &def.init {
                    for row in rows {
                        for value in &row.values {
                            self.check_simple_symbols(value, env);
                        }
                    }
                }
            },
            Definition::Function(def) => {
                self.check_callable_body(&def.formals, &def.locals, &def.body, env);
            },
            Definition::Subroutine(def) => {
                self.check_callable_body(&def.formals, &def.locals, &def.body, env);
            },
        }
    }

    fn check_callable_body<'p>(
        &mut self,
        formals: &'p [Formal],
        locals: &'p [Definition],
        body: &'p [Statement],
        env: &mut Environment<'p>,
    ) {
        for formal in formals {
            env.declare_temp(
                formal.name.value.clone(),
                SymbolData::new(SymbolKind::from(formal.kind), formal.name.location),
            );
        }

        for local in locals {
            self.declare_definition(local, env);
        }

        for statement in body {
            self.check_statement_symbols(statement, env);
        }

        for local in locals {
            env.remove(&local.name().value);
        }

        env.clear_temp();
    }

    fn check_statement_symbols<'p>(
        &mut self,
        statement: &'p Statement,
        env: &mut Environment<'p>,
    ) {
        match statement {
            Statement::PrintSheet(print) => self.use_symbol(&print.sheet, "sheet", env),
            Statement::PrintRange(print) => self.check_range_symbols(&print.range, env),
            Statement::PrintScalar(print) => self.check_scalar_symbols(&print.value, env),
            Statement::If(conditional) => {
                self.check_scalar_symbols(&conditional.condition, env);
                self.flag_constant_if(conditional);

                for statement in &conditional.consequence {
                    self.check_statement_symbols(statement, env);
                }

                if let Some(alternative) = &conditional.alternative {
                    for statement in alternative {
                        self.check_statement_symbols(statement, env);
                    }
                }
            },
            Statement::While(loop_) => {
                self.check_scalar_symbols(&loop_.condition, env);
                self.flag_constant_while(loop_);

                for statement in &loop_.body {
                    self.check_statement_symbols(statement, env);
                }
            },
            Statement::For(loop_) => {
                for range in &loop_.ranges {
                    self.check_range_symbols(range, env);
                }

                for statement in &loop_.body {
                    self.check_statement_symbols(statement, env);
                }
            },
            Statement::Call(call) => self.check_call_symbols(call, "subroutine", env),
            Statement::Return(ret) => match &ret.value {
                ReturnValue::Scalar(value) => self.check_scalar_symbols(value, env),
                ReturnValue::Range(value) => self.check_range_symbols(value, env),
            },
            Statement::Assignment(assignment) => match assignment {
                Assignment::Scalar { target, value, .. } => {
                    self.use_symbol(target, "scalar", env);
                    self.check_scalar_symbols(value, env);
                },
                Assignment::Cell { target, value, .. } => {
                    self.check_cell_symbols(target, env);
                    self.check_scalar_symbols(value, env);
                },
                Assignment::Range { target, value, .. } => {
                    self.use_symbol(target, "range", env);
                    self.check_range_symbols(value, env);
                },
                Assignment::Sheet { target, source, .. } => {
                    self.use_symbol(target, "sheet", env);
                    self.use_symbol(source, "sheet", env);
                },
            },
        }
    }

    fn check_scalar_symbols<'p>(&mut self, expr: &'p ScalarExpr, env: &mut Environment<'p>) {
        self.check_simple_symbols(&expr.first, env);

        for (_, operand) in &expr.comparisons {
            self.check_simple_symbols(operand, env);
        }
    }

    fn check_simple_symbols<'p>(&mut self, expr: &'p SimpleExpr, env: &mut Environment<'p>) {
        let factors = std::iter::once(&expr.first.first)
            .chain(expr.first.rest.iter().map(|(_, factor)| factor))
            .chain(expr.rest.iter().flat_map(|(_, term)| {
                std::iter::once(&term.first).chain(term.rest.iter().map(|(_, factor)| factor))
            }));

        for factor in factors {
            self.check_atom_symbols(&factor.atom, env);
        }
    }

    fn check_atom_symbols<'p>(&mut self, atom: &'p Atom, env: &mut Environment<'p>) {
        match atom {
            Atom::Number { .. } => {},
            Atom::Identifier(identifier) => self.use_symbol(identifier, "scalar", env),
            Atom::Call(call) => self.check_call_symbols(call, "function", env),
            Atom::CellRef(cell_ref) => self.check_cell_symbols(cell_ref, env),
            Atom::RangeLength { range, .. } => self.check_range_symbols(range, env),
            Atom::Parenthesized { expression, .. } => self.check_scalar_symbols(expression, env),
        }
    }

    fn check_call_symbols<'p>(
        &mut self,
        call: &'p Call,
        kind: &'static str,
        env: &mut Environment<'p>,
    ) {
        self.use_symbol(&call.name, kind, env);

        for argument in &call.arguments {
            match argument {
                Argument::Scalar(expression) => self.check_scalar_symbols(expression, env),
                Argument::Range(range) => self.check_range_symbols(range, env),
                Argument::Sheet(sheet) => self.use_symbol(sheet, "sheet", env),
            }
        }
    }

    fn check_cell_symbols<'p>(&mut self, cell_ref: &'p CellRef, env: &mut Environment<'p>) {
        match cell_ref {
            CellRef::Cell { sheet, .. } => self.use_symbol(sheet, "sheet", env),
            CellRef::CurrentCell { .. } => {},
            CellRef::RangeOffset { range, .. } => self.use_symbol(range, "range", env),
        }
    }

    fn check_range_symbols<'p>(&mut self, range: &'p RangeExpr, env: &mut Environment<'p>) {
        match range {
            RangeExpr::Named(name) => self.use_symbol(name, "range", env),
            RangeExpr::Cells { from, to, .. } => {
                self.check_cell_symbols(from, env);
                self.check_cell_symbols(to, env);
            },
            RangeExpr::FunctionCall { call, .. } => {
                self.check_call_symbols(call, "function", env)
            },
            RangeExpr::Slice { base, .. } => self.check_range_symbols(base, env),
        }
    }

    fn use_symbol(&mut self, identifier: &Identifier, kind: &'static str, env: &mut Environment) {
        match env.get(&identifier.value) {
            Some(_) => env.mark_used(&identifier.value),
            None => self.problems.error(AnalyzeError::UndefinedSymbol {
                location: identifier.location,
                kind,
                name: identifier.value.clone(),
            }),
        }
    }

    fn flag_constant_if(&mut self, conditional: &If) {
        let Some(value) = conditional.condition.as_constant() else {
            return;
        };

        if value == Decimal::ZERO {
            self.problems.warning(Warning::UnreachableIfBranch {
                location: statements_span(&conditional.consequence),
            });
        } else if let Some(alternative) = &conditional.alternative {
            self.problems.warning(Warning::UnreachableElseBranch {
                location: statements_span(alternative),
            });
        }
    }

    fn flag_constant_while(&mut self, loop_: &While) {
        let Some(value) = loop_.condition.as_constant() else {
            return;
        };

        if value == Decimal::ZERO {
            self.problems.warning(Warning::UnreachableLoopBody {
                location: statements_span(&loop_.body),
            });
        } else {
            self.problems.warning(Warning::InfiniteLoop {
                location: loop_.condition.location,
            });
        }
    }

    // Pass 2: a two-cell range must stay on one sheet and follow one
    // axis. `$`-relative endpoints are only resolvable at run time.
    fn check_ranges(&mut self, program: &Program) {
        struct RangePass<'a> {
            problems: &'a mut Problems,
        }

        impl Visitor for RangePass<'_> {
            fn visit_range_expr(&mut self, range: &RangeExpr) {
                let RangeExpr::Cells { from, to, location } = range else {
                    return;
                };

                let (
                    CellRef::Cell { sheet: from_sheet, coord: from_coord, .. },
                    CellRef::Cell { sheet: to_sheet, coord: to_coord, .. },
                ) = (from, to) else {
                    return;
                };

                if from_sheet.value != to_sheet.value {
                    self.problems.error(AnalyzeError::IncompatibleRange {
                        location: *location,
                        left_sheet: from_sheet.value.clone(),
                        right_sheet: to_sheet.value.clone(),
                    });
                } else if from_coord.row != to_coord.row
                    && from_coord.column != to_coord.column
                {
                    self.problems.error(AnalyzeError::InvalidRange {
                        location: *location,
                        from: from_coord.text.clone(),
                        to: to_coord.text.clone(),
                    });
                }
            }
        }

        walk_program(program, &mut RangePass { problems: &mut self.problems });
    }

    // Pass 3: literal sheet grids must be rectangular.
    fn check_sheet_shapes(&mut self, program: &Program) {
        struct ShapePass<'a> {
            problems: &'a mut Problems,
        }

        impl Visitor for ShapePass<'_> {
            fn visit_definition(&mut self, definition: &Definition) {
                let Definition::Sheet(def) = definition else {
                    return;
                };
                let Some(SheetInit::Literal { rows, .. }) = &def.init else {
                    return;
                };

                let expected = rows[0].values.len();

                for (index, row) in rows.iter().enumerate().skip(1) {
                    if row.values.len() != expected {
                        self.problems.error(AnalyzeError::RaggedRow {
                            location: row.location,
                            row: index,
                            expected,
                            found: row.values.len(),
                        });
                    }
                }
            }
        }

        walk_program(program, &mut ShapePass { problems: &mut self.problems });
    }

    // Pass 4: statement calls must resolve to subroutines, expression
    // calls to functions.
    fn check_call_kinds(&mut self, program: &Program) {
        struct CallKindPass<'a> {
            problems: &'a mut Problems,
            signatures: &'a HashMap<String, (SymbolKind, usize)>,
        }

        impl Visitor for CallKindPass<'_> {
            fn visit_call(&mut self, call: &Call, site: CallSite) {
                let Some((kind, _)) = self.signatures.get(&call.name.value) else {
                    return;
                };

                let called_as = match site {
                    CallSite::Statement => SymbolKind::Subroutine,
                    CallSite::Expression => SymbolKind::Function,
                };

                if *kind != called_as {
                    self.problems.error(AnalyzeError::CallKindMismatch {
                        location: call.location,
                        name: call.name.value.clone(),
                        defined: *kind,
                        called_as,
                    });
                }
            }
        }

        let signatures = callable_signatures(program);

        walk_program(program, &mut CallKindPass {
            problems: &mut self.problems,
            signatures: &signatures,
        });
    }

    // Pass 5: actual count must equal formal count.
    fn check_arity(&mut self, program: &Program) {
        struct ArityPass<'a> {
            problems: &'a mut Problems,
            signatures: &'a HashMap<String, (SymbolKind, usize)>,
        }

        impl Visitor for ArityPass<'_> {
            fn visit_call(&mut self, call: &Call, _site: CallSite) {
                let Some((_, arity)) = self.signatures.get(&call.name.value) else {
                    return;
                };

                if call.arguments.len() != *arity {
                    self.problems.error(AnalyzeError::Arity {
                        location: call.location,
                        name: call.name.value.clone(),
                        defined: *arity,
                        found: call.arguments.len(),
                    });
                }
            }
        }

        let signatures = callable_signatures(program);

        walk_program(program, &mut ArityPass {
            problems: &mut self.problems,
            signatures: &signatures,
        });
    }

    // Pass 6: `return` may not appear anywhere in a subroutine body.
    fn check_return_placement(&mut self, program: &Program) {
        struct ReturnPass<'a> {
            problems: &'a mut Problems,
        }

        impl Visitor for ReturnPass<'_> {
            fn visit_statement(&mut self, statement: &Statement) {
                if let Statement::Return(ret) = statement {
                    self.problems.error(AnalyzeError::MisplacedReturn {
                        location: ret.location,
                    });
                }
            }
        }

        for definition in &program.definitions {
            if let Definition::Subroutine(def) = definition {
                let mut pass = ReturnPass { problems: &mut self.problems };
                walk_statements(&def.body, &mut pass);
            }
        }
    }
}

fn definition_kind(definition: &Definition) -> SymbolKind {
    match definition {
        Definition::Scalar(_) => SymbolKind::Scalar,
        Definition::Range(_) => SymbolKind::Range,
        Definition::Sheet(_) => SymbolKind::Sheet,
        Definition::Function(_) => SymbolKind::Function,
        Definition::Subroutine(_) => SymbolKind::Subroutine,
    }
}

fn callable_signatures(program: &Program) -> HashMap<String, (SymbolKind, usize)> {
    let mut signatures = HashMap::new();

    for definition in &program.definitions {
        match definition {
            Definition::Function(def) => {
                signatures.insert(
                    def.name.value.clone(),
                    (SymbolKind::Function, def.formals.len()),
                );
            },
            Definition::Subroutine(def) => {
                signatures.insert(
                    def.name.value.clone(),
                    (SymbolKind::Subroutine, def.formals.len()),
                );
            },
            _ => {},
        }
    }

    signatures
}

fn statements_span(statements: &[Statement]) -> SrcSpan {
    let first = statements.first()
        .map(|statement| statement.location())
        .unwrap_or_default();
    let last = statements.last()
        .map(|statement| statement.location())
        .unwrap_or_default();

    first.merge(last)
}

/// Pre-order hooks for the pass traversals. Every walk visits the whole
/// tree; a pass overrides only the hooks it cares about.
trait Visitor {
    fn visit_definition(&mut self, _definition: &Definition) {}
    fn visit_statement(&mut self, _statement: &Statement) {}
    fn visit_range_expr(&mut self, _range: &RangeExpr) {}
    fn visit_call(&mut self, _call: &Call, _site: CallSite) {}
}

fn walk_program(program: &Program, visitor: &mut impl Visitor) {
    for definition in &program.definitions {
        walk_definition(definition, visitor);
    }

    walk_statements(&program.statements, visitor);
}

fn walk_definition(definition: &Definition, visitor: &mut impl Visitor) {
    visitor.visit_definition(definition);

    match definition {
        Definition::Scalar(def) => {
            if let Some(init) = &def.init {
                walk_scalar_expr(init, visitor);
            }
        },
        Definition::Range(def) => {
            if let Some(init) = &def.init {
                walk_range_expr(init, visitor);
            }
        },
        Definition::Sheet(def) => {
            if let Some(SheetInit::Literal { rows, .. }) = &def.init {
                for row in rows {
                    for value in &row.values {
                        walk_simple_expr(value, visitor);
                    }
                }
            }
        },
        Definition::Function(def) => {
            for local in &def.locals {
                walk_definition(local, visitor);
            }

            walk_statements(&def.body, visitor);
        },
        Definition::Subroutine(def) => {
            for local in &def.locals {
                walk_definition(local, visitor);
            }

            walk_statements(&def.body, visitor);
        },
    }
}

fn walk_statements(statements: &[Statement], visitor: &mut impl Visitor) {
    for statement in statements {
        walk_statement(statement, visitor);
    }
}

fn walk_statement(statement: &Statement, visitor: &mut impl Visitor) {
    visitor.visit_statement(statement);

    match statement {
        Statement::PrintSheet(_) => {},
        Statement::PrintRange(print) => walk_range_expr(&print.range, visitor),
        Statement::PrintScalar(print) => walk_scalar_expr(&print.value, visitor),
        Statement::If(conditional) => {
            walk_scalar_expr(&conditional.condition, visitor);
            walk_statements(&conditional.consequence, visitor);

            if let Some(alternative) = &conditional.alternative {
                walk_statements(alternative, visitor);
            }
        },
        Statement::While(loop_) => {
            walk_scalar_expr(&loop_.condition, visitor);
            walk_statements(&loop_.body, visitor);
        },
        Statement::For(loop_) => {
            for range in &loop_.ranges {
                walk_range_expr(range, visitor);
            }

            walk_statements(&loop_.body, visitor);
        },
        Statement::Call(call) => walk_call(call, CallSite::Statement, visitor),
        Statement::Return(ret) => match &ret.value {
            ReturnValue::Scalar(value) => walk_scalar_expr(value, visitor),
            ReturnValue::Range(value) => walk_range_expr(value, visitor),
        },
        Statement::Assignment(assignment) => match assignment {
            Assignment::Scalar { value, .. } => walk_scalar_expr(value, visitor),
            Assignment::Cell { value, .. } => walk_scalar_expr(value, visitor),
            Assignment::Range { value, .. } => walk_range_expr(value, visitor),
            Assignment::Sheet { .. } => {},
        },
    }
}

fn walk_scalar_expr(expr: &ScalarExpr, visitor: &mut impl Visitor) {
    walk_simple_expr(&expr.first, visitor);

    for (_, operand) in &expr.comparisons {
        walk_simple_expr(operand, visitor);
    }
}

fn walk_simple_expr(expr: &SimpleExpr, visitor: &mut impl Visitor) {
    let factors = std::iter::once(&expr.first.first)
        .chain(expr.first.rest.iter().map(|(_, factor)| factor))
        .chain(expr.rest.iter().flat_map(|(_, term)| {
            std::iter::once(&term.first).chain(term.rest.iter().map(|(_, factor)| factor))
        }));

    for factor in factors {
        walk_atom(&factor.atom, visitor);
    }
}

fn walk_atom(atom: &Atom, visitor: &mut impl Visitor) {
    match atom {
        Atom::Number { .. } | Atom::Identifier(_) => {},
        Atom::Call(call) => walk_call(call, CallSite::Expression, visitor),
        Atom::CellRef(_) => {},
        Atom::RangeLength { range, .. } => walk_range_expr(range, visitor),
        Atom::Parenthesized { expression, .. } => walk_scalar_expr(expression, visitor),
    }
}

fn walk_range_expr(range: &RangeExpr, visitor: &mut impl Visitor) {
    visitor.visit_range_expr(range);

    match range {
        RangeExpr::Named(_) | RangeExpr::Cells { .. } => {},
        RangeExpr::FunctionCall { call, .. } => walk_call(call, CallSite::Expression, visitor),
        RangeExpr::Slice { base, .. } => walk_range_expr(base, visitor),
    }
}

fn walk_call(call: &Call, site: CallSite, visitor: &mut impl Visitor) {
    visitor.visit_call(call, site);

    for argument in &call.arguments {
        match argument {
            Argument::Scalar(expression) => walk_scalar_expr(expression, visitor),
            Argument::Range(range) => walk_range_expr(range, visitor),
            Argument::Sheet(_) => {},
        }
    }
}
