//! End-to-end parse and evaluate tests for the formula language

use proptest::prelude::*;
use ready_formula::{parse_expression, parse_program, EvalContext, Evaluator};
use rstest::rstest;
use std::collections::HashMap;

struct Cell {
    a: f64,
    b: f64,
}

impl EvalContext for Cell {
    fn variable(&self, name: &str) -> Option<f64> {
        match name {
            "a" => Some(self.a),
            "b" => Some(self.b),
            _ => None,
        }
    }
}

fn eval(source: &str) -> f64 {
    let expr = parse_expression(source).unwrap();
    let ctx: HashMap<String, f64> = HashMap::new();
    Evaluator::new(&ctx).evaluate(&expr).unwrap()
}

#[rstest]
#[case("1 + 2 * 3", 7.0)]
#[case("(1 + 2) * 3", 9.0)]
#[case("8 / 4 / 2", 1.0)]
#[case("10 - 4 - 3", 3.0)]
#[case("-2 * -3", 6.0)]
#[case("2.5e1f", 25.0)]
#[case("sqrt(16) + abs(-1)", 5.0)]
#[case("fmin(3, 2) * fmax(1, 4)", 8.0)]
fn arithmetic(#[case] source: &str, #[case] expected: f64) {
    assert!((eval(source) - expected).abs() < 1e-12, "{}", source);
}

#[test]
fn custom_context() {
    let program = parse_program(
        "/* Brusselator-style */\n\
         float ab = a * b;\n\
         delta_a = 1.0 - ab;\n\
         delta_b = ab - b; // loss",
    )
    .unwrap();
    let locals = Evaluator::new(&Cell { a: 2.0, b: 3.0 }).run(&program).unwrap();
    assert_eq!(locals["delta_a"], -5.0);
    assert_eq!(locals["delta_b"], 3.0);
}

proptest! {
    #[test]
    fn linear_combination_matches(x in -1e3f64..1e3, y in -1e3f64..1e3) {
        let ctx: HashMap<String, f64> = [("x".to_string(), x), ("y".to_string(), y)]
            .into_iter()
            .collect();
        let expr = parse_expression("2*x - y/4 + 1").unwrap();
        let got = Evaluator::new(&ctx).evaluate(&expr).unwrap();
        prop_assert!((got - (2.0 * x - y / 4.0 + 1.0)).abs() < 1e-9);
    }
}
