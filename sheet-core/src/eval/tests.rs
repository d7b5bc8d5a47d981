use crate::{
    analyzer::prelude::{ModuleAnalyzer, Outcome},
    eval::error::RuntimeError,
    parser::prelude::parse_module,
    utils::prelude::TypeWarningEmitter,
};

use super::eval;

fn run_program(src: &str) -> String {
    let parsed = parse_module(src).expect("test program should parse");

    let module = match ModuleAnalyzer::analyze(parsed.module, &TypeWarningEmitter::null()) {
        Outcome::Ok(module) => module,
        Outcome::PartialFailure(_, errors) => panic!("analysis failed: {errors:?}"),
    };

    let mut out = Vec::new();
    eval(&module, &mut out).expect("test program should run");

    String::from_utf8(out).expect("program output should be utf8")
}

fn run_program_err(src: &str) -> RuntimeError {
    let parsed = parse_module(src).expect("test program should parse");

    let module = match ModuleAnalyzer::analyze(parsed.module, &TypeWarningEmitter::null()) {
        Outcome::Ok(module) => module,
        Outcome::PartialFailure(_, errors) => panic!("analysis failed: {errors:?}"),
    };

    let mut out = Vec::new();
    eval(&module, &mut out).expect_err("test program should fail at run time")
}

#[test]
fn test_storage_rounds_to_one_digit() {
    let output = run_program("scalar x = 1.27 + 1.24\nprint_scalar x");

    assert_eq!(output, "2.5\n");
}

#[test]
fn test_intermediate_precision_is_kept() {
    // 0.25 * 2 = 0.5; rounding the intermediate would give 0.6.
    let output = run_program("scalar x = 0.25 * 2\nprint_scalar x");

    assert_eq!(output, "0.5\n");
}

#[test]
fn test_comparison_chains() {
    assert_eq!(run_program("print_scalar 3 < 5"), "1.0\n");
    assert_eq!(run_program("print_scalar 3 < 5 < 2"), "0.0\n");
    assert_eq!(run_program("print_scalar 1 < 2 < 3"), "1.0\n");
}

#[test]
fn test_division_in_source_order() {
    assert_eq!(run_program("print_scalar 8 / 2 * 4"), "16.0\n");
}

#[test]
fn test_unary_minus_folds_into_the_factor() {
    assert_eq!(run_program("scalar x = 3\nprint_scalar -x + 1"), "-2.0\n");
}

#[test]
fn test_if_else_picks_one_branch() {
    let output = run_program(
        "scalar x = 2\nif x > 1 then\nprint_scalar 1\nelse\nprint_scalar 2\nendif",
    );

    assert_eq!(output, "1.0\n");
}

#[test]
fn test_while_with_false_condition_never_runs() {
    let output = run_program(
        "scalar x = 0\nwhile x > 0 do\nx := x - 1\ndone\nprint_scalar x",
    );

    assert_eq!(output, "0.0\n");
}

#[test]
fn test_while_counts_down() {
    let output = run_program(
        r#"
            scalar x = 3
            scalar total = 0

            while x > 0 do
            total := total + x
            x := x - 1
            done
            print_scalar total
        "#,
    );

    assert_eq!(output, "6.0\n");
}

#[test]
fn test_print_scalar_with_info_string() {
    assert_eq!(run_program("print_scalar !x=! 4"), "x=4.0\n");
}

#[test]
fn test_print_sheet_format() {
    let output = run_program("sheet A = {1,2 , 3,4}\nprint_sheet !grid ! A");

    assert_eq!(output, "grid 1.0 2.0 / 3.0 4.0 / \n");
}

#[test]
fn test_print_range_format() {
    let output = run_program(
        "sheet A = {1,2 , 3,4}\nrange _top = range A'A1 .. A'B1\nprint_range !row ! _top",
    );

    assert_eq!(output, "row 1.0 2.0 \n");
}

#[test]
fn test_sheet_size_init_is_zero_filled() {
    let output = run_program("sheet A = 2 * 3\nprint_sheet A");

    assert_eq!(output, "0.0 0.0 0.0 / 0.0 0.0 0.0 / \n");
}

#[test]
fn test_for_visits_each_cell_once() {
    let output = run_program(
        r#"
            sheet A = {1,2 , 3,4}

            for range A'A1 .. A'B1 do
            $ := $ + 10
            done
            print_sheet A
        "#,
    );

    assert_eq!(output, "11.0 12.0 / 3.0 4.0 / \n");
}

#[test]
fn test_for_walks_the_range_list_in_source_order() {
    let output = run_program(
        r#"
            sheet A = 1 * 2
            scalar n = 0

            for range A'A1 .. A'A1, range A'B1 .. A'B1 do
            n := n + 1
            $ := n
            done
            print_sheet A
        "#,
    );

    assert_eq!(output, "1.0 2.0 / \n");
}

#[test]
fn test_range_offset_reads_the_parallel_range() {
    let output = run_program(
        r#"
            sheet A = {1,2 , 0,0}
            range _src = range A'A1 .. A'B1
            range _dst = range A'A2 .. A'B2

            for _dst do
            $ := $:_src + 1
            done
            print_sheet A
        "#,
    );

    assert_eq!(output, "1.0 2.0 / 2.0 3.0 / \n");
}

#[test]
fn test_range_length_and_slicing() {
    let output = run_program(
        r#"
            sheet A = {1,2,3 , 4,5,6}
            range _row = range A'A1 .. A'C1

            print_scalar #_row
            print_range _row[1, 2]
        "#,
    );

    assert_eq!(output, "3.0\n2.0 3.0 \n");
}

#[test]
fn test_function_call_with_range_argument() {
    let output = run_program(
        r#"
            sheet A = {1,2,3 , 4,5,6}

            function Width [_cells : range] return scalar is
            return #_cells
            end

            scalar w = Width[range A'A1 .. A'C1]
            print_scalar w
        "#,
    );

    assert_eq!(output, "3.0\n");
}

#[test]
fn test_range_returning_function() {
    let output = run_program(
        r#"
            sheet A = {1,2,3 , 4,5,6}

            function Top [] return range is
            return range A'A1 .. A'C1
            end

            range _mid = [Top[]][1, 2]
            print_range _mid
        "#,
    );

    assert_eq!(output, "2.0 3.0 \n");
}

#[test]
fn test_subroutine_writes_through_a_global_sheet() {
    let output = run_program(
        r#"
            sheet A = 2 * 2

            subroutine Fill [x : scalar] is
            A'A1 := x
            end

            Fill[7]
            print_sheet A
        "#,
    );

    assert_eq!(output, "7.0 0.0 / 0.0 0.0 / \n");
}

#[test]
fn test_call_bindings_are_deleted_after_the_call() {
    let output = run_program(
        r#"
            scalar a = 1

            function Get [b : scalar] return scalar is
            return b + a
            end

            scalar c = Get[2]
            print_scalar c
            print_scalar a
        "#,
    );

    assert_eq!(output, "3.0\n1.0\n");
}

#[test]
fn test_sheet_assignment_copies_the_grid() {
    let output = run_program(
        r#"
            sheet A = {1,2 , 3,4}
            sheet B = 2 * 2

            B := A
            B'A1 := 9
            print_sheet A
            print_sheet B
        "#,
    );

    assert_eq!(output, "1.0 2.0 / 3.0 4.0 / \n9.0 2.0 / 3.0 4.0 / \n");
}

#[test]
fn test_reprinted_program_runs_identically() {
    let src = r#"
        sheet DATA = {1,2 , 3,4}
        range _top = range DATA'A1 .. DATA'B1
        scalar total = 0

        function Sum [_cells : range] return scalar is
        scalar acc = 0
        for _cells do
        acc := acc + $
        done
        return acc
        end

        total := Sum[_top]
        print_scalar total
        print_sheet DATA
    "#;

    let reprinted = parse_module(src)
        .expect("test program should parse")
        .module
        .program
        .to_string();

    assert_eq!(run_program(src), run_program(&reprinted));
}

#[test]
fn test_division_by_zero_is_fatal() {
    let err = run_program_err("scalar x = 1 / 0\nprint_scalar x");

    assert!(matches!(err, RuntimeError::DivisionByZero { .. }));
}

#[test]
fn test_cell_out_of_bounds_is_fatal() {
    let err = run_program_err("sheet A = 1 * 1\nprint_scalar A'B2");

    assert!(matches!(err, RuntimeError::CellOutOfBounds { .. }));
}

#[test]
fn test_current_cell_outside_a_loop_is_fatal() {
    let err = run_program_err("sheet A = 1 * 1\n$ := 1");

    assert!(matches!(err, RuntimeError::NoCurrentCell { .. }));
}

#[test]
fn test_function_without_return_is_fatal() {
    let err = run_program_err(
        "scalar x = 1\nfunction Nope [] return scalar is\nx := 2\nend\nprint_scalar Nope[]",
    );

    assert!(matches!(err, RuntimeError::MissingReturn { .. }));
}

#[test]
fn test_slice_out_of_bounds_is_fatal() {
    let err = run_program_err(
        "sheet A = 1 * 2\nrange _r = range A'A1 .. A'B1\nprint_range _r[0, 5]",
    );

    assert!(matches!(err, RuntimeError::SliceOutOfBounds { .. }));
}
