//! Abstract syntax tree for formula programs

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A numeric expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    /// Literal number
    Number(f64),

    /// Chemical, parameter, coordinate or local variable
    Variable(String),

    /// Unary minus
    Neg(Box<Expr>),

    /// Binary arithmetic
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },

    /// Call to a built-in math function
    Call(FunctionCall),
}

impl Expr {
    pub fn variable(name: impl Into<String>) -> Self {
        Expr::Variable(name.into())
    }

    pub fn neg(expr: Expr) -> Self {
        Expr::Neg(Box::new(expr))
    }

    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Self {
        Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    /// Collect the names this expression reads
    pub fn collect_variables(&self, out: &mut BTreeSet<String>) {
        match self {
            Expr::Number(_) => {}
            Expr::Variable(name) => {
                out.insert(name.clone());
            }
            Expr::Neg(inner) => inner.collect_variables(out),
            Expr::Binary { lhs, rhs, .. } => {
                lhs.collect_variables(out);
                rhs.collect_variables(out);
            }
            Expr::Call(call) => {
                for arg in &call.args {
                    arg.collect_variables(out);
                }
            }
        }
    }
}

/// Arithmetic operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl BinaryOp {
    pub fn apply(&self, lhs: f64, rhs: f64) -> f64 {
        match self {
            BinaryOp::Add => lhs + rhs,
            BinaryOp::Sub => lhs - rhs,
            BinaryOp::Mul => lhs * rhs,
            BinaryOp::Div => lhs / rhs,
        }
    }
}

/// A function call with arguments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    pub args: Vec<Expr>,
}

impl FunctionCall {
    pub fn new(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }
}

/// Assignment operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssignOp {
    Assign,
    Add,
    Sub,
    Mul,
    Div,
}

impl AssignOp {
    /// Combine the previous value with the new one
    pub fn combine(&self, previous: f64, value: f64) -> f64 {
        match self {
            AssignOp::Assign => value,
            AssignOp::Add => previous + value,
            AssignOp::Sub => previous - value,
            AssignOp::Mul => previous * value,
            AssignOp::Div => previous / value,
        }
    }
}

/// One statement: `[float] target op value;`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statement {
    pub target: String,
    pub op: AssignOp,
    pub value: Expr,
    /// Whether a type keyword introduced the statement
    pub declared: bool,
}

/// A parsed formula
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Program {
    pub statements: Vec<Statement>,
}

impl Program {
    pub fn new(statements: Vec<Statement>) -> Self {
        Self { statements }
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// Names assigned anywhere in the program, in first-assignment order
    pub fn assigned_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for statement in &self.statements {
            if !names.contains(&statement.target.as_str()) {
                names.push(&statement.target);
            }
        }
        names
    }

    /// Names read by the program that it never assigns first
    pub fn free_variables(&self) -> BTreeSet<String> {
        let mut assigned = BTreeSet::new();
        let mut free = BTreeSet::new();
        for statement in &self.statements {
            let mut reads = BTreeSet::new();
            statement.value.collect_variables(&mut reads);
            if statement.op != AssignOp::Assign {
                reads.insert(statement.target.clone());
            }
            for name in reads {
                if !assigned.contains(&name) {
                    free.insert(name);
                }
            }
            assigned.insert(statement.target.clone());
        }
        free
    }
}
