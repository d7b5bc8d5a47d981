use std::{path::PathBuf, rc::Rc};

use crate::{
    analyzer::prelude::{AnalyzeError, ModuleAnalyzer, Outcome, Warning},
    environment::prelude::SymbolKind,
    parser::prelude::parse_module,
    utils::prelude::{
        TypeWarningEmitter, VectorWarningEmitterIO, WarningEmitter,
        Warning as EmittedWarning,
    },
};

fn analyze_errors(src: &str) -> Vec<AnalyzeError> {
    let parsed = parse_module(src).expect("test program should parse");

    match ModuleAnalyzer::analyze(parsed.module, &TypeWarningEmitter::null()) {
        Outcome::Ok(_) => vec![],
        Outcome::PartialFailure(_, errors) => errors,
    }
}

#[test]
fn test_clean_program() {
    let errors = analyze_errors(
        r#"
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
        "#,
    );

    assert_eq!(errors, vec![]);
}

#[test]
fn test_redefinition() {
    let errors = analyze_errors("scalar a\nscalar a\nprint_scalar a");

    assert_eq!(errors.len(), 1);
    assert!(matches!(
        &errors[0],
        AnalyzeError::Redefinition { name, kind: SymbolKind::Scalar, .. } if name == "a"
    ));
}

#[test]
fn test_undefined_symbol() {
    let errors = analyze_errors("print_scalar b");

    assert_eq!(errors.len(), 1);
    assert!(matches!(
        &errors[0],
        AnalyzeError::UndefinedSymbol { kind: "scalar", name, .. } if name == "b"
    ));
}

#[test]
fn test_definitions_are_order_sensitive() {
    // `early` refers to `late` before its definition is walked.
    let errors = analyze_errors("scalar early = late\nscalar late = 1\nprint_scalar early");

    assert_eq!(errors.len(), 1);
    assert!(matches!(
        &errors[0],
        AnalyzeError::UndefinedSymbol { name, .. } if name == "late"
    ));
}

#[test]
fn test_incompatible_range() {
    let errors = analyze_errors(
        "sheet A = 2 * 2\nsheet C = 2 * 2\nrange _r = range A'B1 .. C'B2\nprint_range _r",
    );

    assert_eq!(errors.len(), 1);
    assert!(matches!(
        &errors[0],
        AnalyzeError::IncompatibleRange { left_sheet, right_sheet, .. }
            if left_sheet == "A" && right_sheet == "C"
    ));
}

#[test]
fn test_range_must_be_axis_aligned() {
    let errors =
        analyze_errors("sheet A = 2 * 2\nrange _r = range A'A1 .. A'B2\nprint_range _r");

    assert_eq!(errors.len(), 1);
    assert!(matches!(&errors[0], AnalyzeError::InvalidRange { .. }));
}

#[test]
fn test_ragged_sheet_row() {
    let errors = analyze_errors("sheet S = {1,2,3 , 4,5}\nprint_sheet S");

    assert_eq!(errors.len(), 1);
    assert!(matches!(
        &errors[0],
        AnalyzeError::RaggedRow { row: 1, expected: 3, found: 2, .. }
    ));
}

#[test]
fn test_function_called_as_subroutine() {
    let errors = analyze_errors(
        "function One [] return scalar is\nreturn 1\nend\nOne[]\nprint_scalar 1",
    );

    assert_eq!(errors.len(), 1);
    assert!(matches!(
        &errors[0],
        AnalyzeError::CallKindMismatch {
            name,
            defined: SymbolKind::Function,
            called_as: SymbolKind::Subroutine,
            ..
        } if name == "One"
    ));
}

#[test]
fn test_subroutine_called_as_function() {
    let errors = analyze_errors(
        "subroutine Noop [] is\nprint_scalar 0\nend\nscalar x = 1\nx := Noop[]\nprint_scalar x",
    );

    assert_eq!(errors.len(), 1);
    assert!(matches!(
        &errors[0],
        AnalyzeError::CallKindMismatch {
            name,
            defined: SymbolKind::Subroutine,
            called_as: SymbolKind::Function,
            ..
        } if name == "Noop"
    ));
}

#[test]
fn test_arity_mismatch() {
    let errors = analyze_errors(
        r#"
            scalar x = 1

            function Add [a : scalar, b : scalar] return scalar is
            return a + b
            end

            x := Add[1]
            print_scalar x
        "#,
    );

    assert_eq!(errors.len(), 1);
    assert!(matches!(
        &errors[0],
        AnalyzeError::Arity { name, defined: 2, found: 1, .. } if name == "Add"
    ));
}

#[test]
fn test_misplaced_return() {
    let errors = analyze_errors(
        "subroutine Bad [] is\nif 1 > 0 then\nreturn 1\nendif\nend\nBad[]",
    );

    assert_eq!(errors.len(), 1);
    assert!(matches!(&errors[0], AnalyzeError::MisplacedReturn { .. }));
}

#[test]
fn test_body_locals_leave_the_global_table() {
    let errors = analyze_errors(
        r#"
            function Make [] return scalar is
            scalar hidden = 2
            return hidden
            end

            scalar x = Make[]
            print_scalar hidden
        "#,
    );

    assert_eq!(errors.len(), 1);
    assert!(matches!(
        &errors[0],
        AnalyzeError::UndefinedSymbol { name, .. } if name == "hidden"
    ));
}

#[test]
fn test_formals_are_visible_only_in_the_body() {
    let errors = analyze_errors(
        r#"
            function Twice [x : scalar] return scalar is
            return x * 2
            end

            scalar y = Twice[3]
            print_scalar x
        "#,
    );

    assert_eq!(errors.len(), 1);
    assert!(matches!(
        &errors[0],
        AnalyzeError::UndefinedSymbol { name, .. } if name == "x"
    ));
}

#[test]
fn test_local_reusing_a_global_name_is_a_redefinition() {
    let errors = analyze_errors(
        r#"
            scalar a = 1

            subroutine Clobber [] is
            scalar a = 2
            print_scalar a
            end

            Clobber[]
        "#,
    );

    assert_eq!(errors.len(), 1);
    assert!(matches!(
        &errors[0],
        AnalyzeError::Redefinition { name, .. } if name == "a"
    ));
}

#[test]
fn test_constant_conditions_warn() {
    let src = "scalar a = 1\nwhile 0.0 do\na := 2\ndone\nprint_scalar a";
    let parsed = parse_module(src).expect("test program should parse");

    let warnings = Rc::new(VectorWarningEmitterIO::new());
    let emitter = TypeWarningEmitter::new(
        PathBuf::new(),
        src.to_string(),
        WarningEmitter::new(warnings.clone()),
    );

    let outcome = ModuleAnalyzer::analyze(parsed.module, &emitter);
    assert!(matches!(outcome, Outcome::Ok(_)));

    let warnings = warnings.take();
    assert!(warnings.iter().any(|warning| matches!(
        warning,
        EmittedWarning::Analysis { warning: Warning::UnreachableLoopBody { .. }, .. }
    )));
}

#[test]
fn test_unused_definition_warns() {
    let src = "scalar never = 1\nprint_scalar 0";
    let parsed = parse_module(src).expect("test program should parse");

    let warnings = Rc::new(VectorWarningEmitterIO::new());
    let emitter = TypeWarningEmitter::new(
        PathBuf::new(),
        src.to_string(),
        WarningEmitter::new(warnings.clone()),
    );

    let _ = ModuleAnalyzer::analyze(parsed.module, &emitter);

    let warnings = warnings.take();
    assert!(warnings.iter().any(|warning| matches!(
        warning,
        EmittedWarning::Analysis { warning: Warning::UnusedDefinition { name, .. }, .. }
            if name == "never"
    )));
}
