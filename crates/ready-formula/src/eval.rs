//! Formula evaluation
//!
//! Runs a [`Program`] against one cell's values. Names are resolved first
//! against variables the program has assigned, then against the context.

use crate::ast::*;
use std::collections::HashMap;
use thiserror::Error;

/// Evaluation errors
#[derive(Debug, Error, PartialEq)]
pub enum EvalError {
    #[error("Unknown variable: {0}")]
    UnknownVariable(String),

    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),
}

/// Result type for evaluation
pub type EvalResult<T> = Result<T, EvalError>;

/// Context for evaluation - provides the values a cell can read
pub trait EvalContext {
    /// Value of a chemical, Laplacian, parameter or coordinate
    fn variable(&self, name: &str) -> Option<f64>;
}

impl EvalContext for HashMap<String, f64> {
    fn variable(&self, name: &str) -> Option<f64> {
        self.get(name).copied()
    }
}

/// Names of the built-in functions
pub const FUNCTIONS: &[&str] = &[
    "sin", "cos", "tan", "asin", "acos", "atan", "atan2", "exp", "log", "log10", "sqrt", "pow",
    "fabs", "abs", "floor", "ceil", "min", "max", "fmin", "fmax", "clamp",
];

/// Evaluator for formula programs
pub struct Evaluator<'a, C: EvalContext + ?Sized> {
    context: &'a C,
    locals: HashMap<String, f64>,
}

impl<'a, C: EvalContext + ?Sized> Evaluator<'a, C> {
    /// Create a new evaluator
    pub fn new(context: &'a C) -> Self {
        Self {
            context,
            locals: HashMap::new(),
        }
    }

    /// Run every statement and return the variables the program assigned
    pub fn run(mut self, program: &Program) -> EvalResult<HashMap<String, f64>> {
        for statement in &program.statements {
            self.execute(statement)?;
        }
        Ok(self.locals)
    }

    /// Execute one statement
    pub fn execute(&mut self, statement: &Statement) -> EvalResult<()> {
        let value = self.evaluate(&statement.value)?;
        let result = match statement.op {
            AssignOp::Assign => value,
            op => {
                let previous = self.lookup(&statement.target)?;
                op.combine(previous, value)
            }
        };
        self.locals.insert(statement.target.clone(), result);
        Ok(())
    }

    /// Evaluate an expression
    pub fn evaluate(&self, expr: &Expr) -> EvalResult<f64> {
        match expr {
            Expr::Number(n) => Ok(*n),
            Expr::Variable(name) => self.lookup(name),
            Expr::Neg(inner) => Ok(-self.evaluate(inner)?),
            Expr::Binary { op, lhs, rhs } => {
                Ok(op.apply(self.evaluate(lhs)?, self.evaluate(rhs)?))
            }
            Expr::Call(call) => self.evaluate_call(call),
        }
    }

    fn lookup(&self, name: &str) -> EvalResult<f64> {
        self.locals
            .get(name)
            .copied()
            .or_else(|| self.context.variable(name))
            .ok_or_else(|| EvalError::UnknownVariable(name.to_string()))
    }

    fn evaluate_call(&self, call: &FunctionCall) -> EvalResult<f64> {
        let args = call
            .args
            .iter()
            .map(|arg| self.evaluate(arg))
            .collect::<EvalResult<Vec<f64>>>()?;
        apply_function(&call.name, &args)
    }
}

/// Apply a built-in function
pub fn apply_function(name: &str, args: &[f64]) -> EvalResult<f64> {
    let expect = |n: usize| -> EvalResult<()> {
        if args.len() == n {
            Ok(())
        } else {
            Err(EvalError::InvalidArguments(format!(
                "{}() takes {} argument(s), got {}",
                name,
                n,
                args.len()
            )))
        }
    };

    let unary = |f: fn(f64) -> f64| -> EvalResult<f64> {
        expect(1)?;
        Ok(f(args[0]))
    };

    match name {
        "sin" => unary(f64::sin),
        "cos" => unary(f64::cos),
        "tan" => unary(f64::tan),
        "asin" => unary(f64::asin),
        "acos" => unary(f64::acos),
        "atan" => unary(f64::atan),
        "exp" => unary(f64::exp),
        "log" => unary(f64::ln),
        "log10" => unary(f64::log10),
        "sqrt" => unary(f64::sqrt),
        "fabs" | "abs" => unary(f64::abs),
        "floor" => unary(f64::floor),
        "ceil" => unary(f64::ceil),
        "atan2" => {
            expect(2)?;
            Ok(args[0].atan2(args[1]))
        }
        "pow" => {
            expect(2)?;
            Ok(args[0].powf(args[1]))
        }
        "min" | "fmin" => {
            expect(2)?;
            Ok(args[0].min(args[1]))
        }
        "max" | "fmax" => {
            expect(2)?;
            Ok(args[0].max(args[1]))
        }
        "clamp" => {
            expect(3)?;
            if args[1] > args[2] {
                return Err(EvalError::InvalidArguments(
                    "clamp() lower bound exceeds upper bound".to_string(),
                ));
            }
            Ok(args[0].clamp(args[1], args[2]))
        }
        other => Err(EvalError::UnknownFunction(other.to_string())),
    }
}

/// Check that every function a program calls exists
pub fn check_functions(program: &Program) -> EvalResult<()> {
    fn visit(expr: &Expr) -> EvalResult<()> {
        match expr {
            Expr::Number(_) | Expr::Variable(_) => Ok(()),
            Expr::Neg(inner) => visit(inner),
            Expr::Binary { lhs, rhs, .. } => {
                visit(lhs)?;
                visit(rhs)
            }
            Expr::Call(call) => {
                if !FUNCTIONS.contains(&call.name.as_str()) {
                    return Err(EvalError::UnknownFunction(call.name.clone()));
                }
                call.args.iter().try_for_each(visit)
            }
        }
    }
    program
        .statements
        .iter()
        .try_for_each(|statement| visit(&statement.value))
}
