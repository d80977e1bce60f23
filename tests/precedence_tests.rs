use mathjit::Evaluator;

fn eval_of(expr: &str) -> f64 {
    let mut eval = Evaluator::new();
    eval.assign_expression(expr).unwrap();
    eval.evaluate()
}

#[test]
fn multiplication_binds_tighter_than_addition() {
    assert_eq!(eval_of("1+2*3"), 7.0);
    assert_eq!(eval_of("2*3+1"), 7.0);
    assert_eq!(eval_of("(1+2)*3"), 9.0);
}

#[test]
fn power_binds_tighter_than_multiplication() {
    assert_eq!(eval_of("2^3*2"), 16.0);
    assert_eq!(eval_of("2*2^3"), 16.0);
}

#[test]
fn power_is_right_associative() {
    // 2^(3^2) = 512, not (2^3)^2 = 64
    assert_eq!(eval_of("2^3^2"), 512.0);
}

#[test]
fn less_than_is_loosest() {
    assert_eq!(eval_of("1 < 2 + 3"), 1.0);
    assert_eq!(eval_of("2 + 3 < 1"), 0.0);
    assert_eq!(eval_of("1+1 < 1*3"), 1.0);
}

#[test]
fn less_than_is_strict() {
    assert_eq!(eval_of("2 < 2"), 0.0);
    assert_eq!(eval_of("1 < 2"), 1.0);
    assert_eq!(eval_of("2 < 1"), 0.0);
}

#[test]
fn unary_minus_with_power() {
    // The sign applies to the whole power: -(2^2)
    assert_eq!(eval_of("-2^2"), -4.0);
    assert_eq!(eval_of("(-2)^2"), 4.0);
    // ... while a sign in exponent position binds to the exponent alone.
    assert_eq!(eval_of("2^-3"), 0.125);
}

#[test]
fn negated_power_with_negative_exponent() {
    let mut eval = Evaluator::new();
    let a = 2.0f64;
    let b = 3.0f64;
    unsafe { eval.bind(&a, "a") }.unwrap();
    unsafe { eval.bind(&b, "b") }.unwrap();
    eval.assign_expression("-a^(-b)").unwrap();
    assert_eq!(eval.evaluate(), -0.125);
}

#[test]
fn unary_minus_distributes_over_sums_only_locally() {
    // -a + b parses as (-a) + b
    assert_eq!(eval_of("-3 + 5"), 2.0);
    // -(a*b) and (-a)*b coincide numerically; both must parse.
    assert_eq!(eval_of("-3 * 5"), -15.0);
}

#[test]
fn chained_same_rank_operators_are_left_associative() {
    assert_eq!(eval_of("10-4-3"), 3.0);
    assert_eq!(eval_of("24/4/2"), 3.0);
}
