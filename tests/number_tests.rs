use mathjit::{EvalError, Evaluator};

fn eval_of(expr: &str) -> f64 {
    let mut eval = Evaluator::new();
    eval.assign_expression(expr).unwrap();
    eval.evaluate()
}

#[test]
fn integer_and_decimal_literals() {
    assert_eq!(eval_of("42"), 42.0);
    assert_eq!(eval_of("3.25"), 3.25);
    assert_eq!(eval_of("0.125"), 0.125);
}

#[test]
fn leading_and_trailing_dot_forms() {
    assert_eq!(eval_of(".5"), 0.5);
    assert_eq!(eval_of("5."), 5.0);
    assert_eq!(eval_of(".5 + 5."), 5.5);
}

#[test]
fn scientific_notation() {
    assert_eq!(eval_of("1e3"), 1000.0);
    assert_eq!(eval_of("1E3"), 1000.0);
    assert_eq!(eval_of("2.5e-4"), 2.5e-4);
    assert_eq!(eval_of("2.5E+2"), 250.0);
    assert_eq!(eval_of("1.2e+1"), 12.0);
}

#[test]
fn scientific_notation_composes_with_operators() {
    assert_eq!(eval_of("1e-3+1"), 1.001);
    assert_eq!(eval_of("1e2*2"), 200.0);
    assert_eq!(eval_of("-1e2"), -100.0);
}

#[test]
fn exponent_marker_without_digits_is_not_an_exponent() {
    // "1e" lexes as the literal 1 followed by the identifier e, which is a
    // grammar error in value juxtaposition...
    let mut eval = Evaluator::new();
    assert!(matches!(
        eval.assign_expression("1e"),
        Err(EvalError::UnexpectedChar { position: 1 })
    ));
    // ...and so is an explicit juxtaposition with the constant.
    assert!(eval.assign_expression("2 e").is_err());
    // The constant itself still works in operator position.
    assert_eq!(eval_of("2*e"), 2.0 * std::f64::consts::E);
}

#[test]
fn literal_overflow_saturates_to_infinity() {
    assert_eq!(eval_of("1e999"), f64::INFINITY);
}

#[test]
fn huge_and_tiny_literals_roundtrip() {
    assert_eq!(eval_of("1.7976931348623157e308"), f64::MAX);
    assert_eq!(eval_of("5e-324"), 5e-324);
}

#[test]
fn repeated_spellings_evaluate_consistently() {
    // The same literal spelled twice and two spellings of one value.
    assert_eq!(eval_of("0.5 + 0.5"), 1.0);
    assert_eq!(eval_of("0.5 + .5"), 1.0);
    assert_eq!(eval_of("1e2 + 100"), 200.0);
}
