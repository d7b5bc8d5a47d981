use crate::parser::prelude::{
    parse_module, Assignment, Atom, Definition, ParseError, ParseErrorType, RangeExpr,
    SheetInit, Statement,
};

#[test]
fn test_program_shape() -> Result<(), ParseError> {
    let input = r#"
        scalar total = 0.0
        range _row
        sheet GRID = 2 * 3

        function Sum [_cells : range] return scalar is
        scalar acc = 0
        for _cells do
        acc := acc + $
        done
        return acc
        end

        subroutine Reset [S : sheet] is
        S'A1 := 0
        end

        total := Sum[range GRID'A1 .. GRID'C1]
        print_scalar !total: ! total
    "#;

    let parsed = parse_module(input)?;
    let program = parsed.module.program;

    assert_eq!(program.definitions.len(), 5);
    assert_eq!(program.statements.len(), 2);

    let Definition::Function(function) = &program.definitions[3] else {
        panic!("expected a function definition");
    };

    assert_eq!(function.name.value, "Sum");
    assert_eq!(function.formals.len(), 1);
    assert_eq!(function.locals.len(), 1);
    assert_eq!(function.body.len(), 2);

    Ok(())
}

#[test]
fn test_sheet_literal_rows() -> Result<(), ParseError> {
    // Rows split at a detached comma or at plain juxtaposition.
    let detached = parse_module("sheet S = {1,2,3 , 4,5,6}\nprint_sheet S")?;
    let juxtaposed = parse_module("sheet S = {1,2,3 4,5,6}\nprint_sheet S")?;

    for parsed in [detached, juxtaposed] {
        let Definition::Sheet(sheet) = &parsed.module.program.definitions[0] else {
            panic!("expected a sheet definition");
        };
        let Some(SheetInit::Literal { rows, .. }) = &sheet.init else {
            panic!("expected a literal initializer");
        };

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].values.len(), 3);
        assert_eq!(rows[1].values.len(), 3);
    }

    Ok(())
}

#[test]
fn test_attached_commas_make_one_row() -> Result<(), ParseError> {
    let parsed = parse_module("sheet S = {1,2,3,4}\nprint_sheet S")?;

    let Definition::Sheet(sheet) = &parsed.module.program.definitions[0] else {
        panic!("expected a sheet definition");
    };
    let Some(SheetInit::Literal { rows, .. }) = &sheet.init else {
        panic!("expected a literal initializer");
    };

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].values.len(), 4);

    Ok(())
}

#[test]
fn test_operator_precedence_shape() -> Result<(), ParseError> {
    let parsed = parse_module("print_scalar 1 + 2 * 3")?;

    let Statement::PrintScalar(print) = &parsed.module.program.statements[0] else {
        panic!("expected print_scalar");
    };

    // `2 * 3` folds into one term under the addition.
    assert!(print.value.comparisons.is_empty());
    assert_eq!(print.value.first.rest.len(), 1);
    assert_eq!(print.value.first.rest[0].1.rest.len(), 1);

    Ok(())
}

#[test]
fn test_comparison_chain_shape() -> Result<(), ParseError> {
    let parsed = parse_module("print_scalar 3 < 5 < 2")?;

    let Statement::PrintScalar(print) = &parsed.module.program.statements[0] else {
        panic!("expected print_scalar");
    };

    assert_eq!(print.value.comparisons.len(), 2);

    Ok(())
}

#[test]
fn test_coordinate_conversion() -> Result<(), ParseError> {
    let parsed = parse_module("sheet A\nprint_scalar A'B12 + A'AA1")?;

    let Statement::PrintScalar(print) = &parsed.module.program.statements[0] else {
        panic!("expected print_scalar");
    };

    let mut factors = std::iter::once(&print.value.first.first.first)
        .chain(print.value.first.rest.iter().map(|(_, term)| &term.first));

    let Some(Atom::CellRef(crate::parser::prelude::CellRef::Cell { coord, .. })) =
        factors.next().map(|factor| &factor.atom)
    else {
        panic!("expected a cell reference");
    };
    assert_eq!((coord.column, coord.row), (1, 11));

    let Some(Atom::CellRef(crate::parser::prelude::CellRef::Cell { coord, .. })) =
        factors.next().map(|factor| &factor.atom)
    else {
        panic!("expected a cell reference");
    };
    assert_eq!((coord.column, coord.row), (26, 0));

    Ok(())
}

#[test]
fn test_coordinate_row_zero_is_rejected() {
    let err = parse_module("sheet A\nprint_scalar A'A0")
        .expect_err("rows start at 1");

    assert!(matches!(err.error, ParseErrorType::InvalidCoordinate { .. }));
}

#[test]
fn test_range_slices_nest() -> Result<(), ParseError> {
    let parsed = parse_module("range _r\nprint_range _r[0, 3][1, 1]")?;

    let Statement::PrintRange(print) = &parsed.module.program.statements[0] else {
        panic!("expected print_range");
    };

    let RangeExpr::Slice { base, from: 1, to: 1, .. } = &print.range else {
        panic!("expected the outer slice");
    };
    let RangeExpr::Slice { from: 0, to: 3, .. } = base.as_ref() else {
        panic!("expected the inner slice");
    };

    Ok(())
}

#[test]
fn test_cell_assignment_targets() -> Result<(), ParseError> {
    let parsed = parse_module("sheet A\nA'B2 := 1\n$ := 2\n$:_r := 3\nA := A")?;

    let statements = &parsed.module.program.statements;

    assert!(matches!(
        statements[0],
        Statement::Assignment(Assignment::Cell { .. })
    ));
    assert!(matches!(
        statements[1],
        Statement::Assignment(Assignment::Cell { .. })
    ));
    assert!(matches!(
        statements[2],
        Statement::Assignment(Assignment::Cell { .. })
    ));
    assert!(matches!(
        statements[3],
        Statement::Assignment(Assignment::Sheet { .. })
    ));

    Ok(())
}

#[test]
fn test_reprint_is_stable() -> Result<(), ParseError> {
    let input = r#"
        scalar limit = 10.5
        sheet DATA = {1,2 , 3,4}
        range _top = range DATA'A1 .. DATA'B1

        function Twice [x : scalar] return scalar is
        return x * 2
        end

        if limit > 5 then
        print_scalar !big ! Twice[limit]
        else
        print_range _top[0, 1]
        endif
        while limit > 0 do
        limit := limit - 1
        done
        for _top do
        $ := $ + 1
        done
    "#;

    let first = parse_module(input)?.module.program.to_string();
    let second = parse_module(&first)?.module.program.to_string();

    assert_eq!(first, second);

    Ok(())
}

#[test]
fn test_missing_endif() {
    let err = parse_module("if 1 > 0 then\nprint_scalar 1")
        .expect_err("the conditional never closes");

    assert_eq!(err.error, ParseErrorType::UnexpectedEof);
}

#[test]
fn test_program_needs_a_statement() {
    let err = parse_module("scalar a = 1").expect_err("definitions alone are not a program");

    assert_eq!(err.error, ParseErrorType::ExpectedStatement);
}

#[test]
fn test_lex_error_is_surfaced() {
    let err = parse_module("print_scalar @").expect_err("`@` is not lexable");

    assert!(matches!(err.error, ParseErrorType::LexError { .. }));
}
