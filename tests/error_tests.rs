use mathjit::{EvalError, Evaluator};

#[test]
fn empty_and_blank_expressions_are_rejected() {
    let mut eval = Evaluator::new();
    assert_eq!(eval.assign_expression(""), Err(EvalError::EmptyExpression));
    assert_eq!(
        eval.assign_expression("   \t "),
        Err(EvalError::EmptyExpression)
    );
    // The initial trivial callable is still installed.
    assert_eq!(eval.evaluate(), 0.0);
}

#[test]
fn unexpected_end_reports_input_length() {
    let mut eval = Evaluator::new();
    let a = 1.0f64;
    unsafe { eval.bind(&a, "a") }.unwrap();
    let err = eval.assign_expression("a+").unwrap_err();
    assert_eq!(err, EvalError::UnexpectedEnd { position: 2 });
}

#[test]
fn stray_character_reports_offset() {
    let mut eval = Evaluator::new();
    let err = eval.assign_expression("1 + $2").unwrap_err();
    assert_eq!(err, EvalError::UnexpectedChar { position: 4 });
    assert_eq!(err.position(), Some(4));
}

#[test]
fn adjacent_primaries_are_rejected() {
    let mut eval = Evaluator::new();
    let err = eval.assign_expression("2x").unwrap_err();
    assert!(matches!(err, EvalError::UnexpectedChar { position: 1 }));
}

#[test]
fn lone_dot_is_rejected() {
    let mut eval = Evaluator::new();
    let err = eval.assign_expression(".").unwrap_err();
    assert!(matches!(err, EvalError::UnexpectedChar { position: 0 }));
}

#[test]
fn unbalanced_parentheses() {
    let mut eval = Evaluator::new();
    assert_eq!(
        eval.assign_expression("(1+2"),
        Err(EvalError::UnbalancedParen { position: 4 })
    );
    assert_eq!(
        eval.assign_expression("1+2)"),
        Err(EvalError::UnbalancedParen { position: 3 })
    );
    assert_eq!(
        eval.assign_expression(")"),
        Err(EvalError::UnbalancedParen { position: 0 })
    );
}

#[test]
fn comma_outside_argument_list() {
    let mut eval = Evaluator::new();
    let err = eval.assign_expression("1,2").unwrap_err();
    assert!(matches!(err, EvalError::UnexpectedChar { position: 1 }));
}

#[test]
fn too_many_arguments() {
    let mut eval = Evaluator::new();
    let err = eval.assign_expression("sin(1, 2)").unwrap_err();
    assert_eq!(
        err,
        EvalError::ArityMismatch {
            name: "sin".to_string(),
            expected: 1,
            got: 2,
            position: 5,
        }
    );
}

#[test]
fn too_few_arguments() {
    let mut eval = Evaluator::new();
    let err = eval.assign_expression("pow(1)").unwrap_err();
    assert_eq!(
        err,
        EvalError::ArityMismatch {
            name: "pow".to_string(),
            expected: 2,
            got: 1,
            position: 5,
        }
    );

    let err = eval.assign_expression("max()").unwrap_err();
    assert_eq!(
        err,
        EvalError::ArityMismatch {
            name: "max".to_string(),
            expected: 2,
            got: 0,
            position: 4,
        }
    );
}

#[test]
fn unknown_function_name() {
    let mut eval = Evaluator::new();
    let err = eval.assign_expression("frob(1)").unwrap_err();
    assert_eq!(
        err,
        EvalError::UnknownName {
            name: "frob".to_string(),
            position: 0
        }
    );
}

#[test]
fn function_name_without_call_is_unknown() {
    // A function name in value position does not resolve.
    let mut eval = Evaluator::new();
    let err = eval.assign_expression("sin + 1").unwrap_err();
    assert!(matches!(err, EvalError::UnknownName { .. }));
}

#[test]
fn function_name_must_be_followed_by_paren() {
    let mut eval = Evaluator::new();
    // "sin sin(1)" puts a function name where a primary was consumed.
    let err = eval.assign_expression("sin 1").unwrap_err();
    assert!(matches!(err, EvalError::UnknownName { .. }));
}

#[test]
fn failed_compilation_preserves_previous_callable() {
    let mut eval = Evaluator::new();
    let mut x = 41.0f64;
    unsafe { eval.bind(&x, "x") }.unwrap();
    eval.assign_expression("x+1").unwrap();
    assert_eq!(eval.evaluate(), 42.0);

    for bad in ["x+", "x)+1", "pow(x)", "ghost", "1 + #", ""] {
        assert!(eval.assign_expression(bad).is_err(), "{bad} should fail");
        assert_eq!(eval.evaluate(), 42.0, "after failing {bad:?}");
        assert_eq!(eval.expression(), "x+1");
    }

    // Variable bindings survive failed compiles too.
    x = 10.0;
    assert_eq!(eval.evaluate(), 11.0);
}

#[test]
fn referenced_flag_survives_failed_compilation() {
    // The failed assign must not clear the live expression's referenced
    // flags: unbinding afterwards still has to reset the expression.
    let mut eval = Evaluator::new();
    let x = 3.0f64;
    unsafe { eval.bind(&x, "x") }.unwrap();
    eval.assign_expression("x*x").unwrap();
    assert!(eval.assign_expression("x+").is_err());

    eval.unbind("x").unwrap();
    assert_eq!(eval.evaluate(), 0.0);
}

#[test]
fn error_positions_are_exposed() {
    let mut eval = Evaluator::new();
    let err = eval.assign_expression("(((").unwrap_err();
    assert!(err.position().is_some());
    assert_eq!(EvalError::EmptyExpression.position(), None);
    assert_eq!(EvalError::StackOverflow.position(), None);
}

#[test]
fn errors_format_with_context() {
    let err = EvalError::ArityMismatch {
        name: "pow".to_string(),
        expected: 2,
        got: 1,
        position: 5,
    };
    let text = err.to_string();
    assert!(text.contains("pow"));
    assert!(text.contains('2'));
}
