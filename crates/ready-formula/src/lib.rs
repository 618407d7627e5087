//! ready-formula - Per-cell formula language for reaction-diffusion rules
//!
//! A formula rule is a short list of C-like statements evaluated once per
//! cell. It reads the cell's chemical values, their Laplacians and the
//! rule's parameters, and writes `delta_<chemical>` for each chemical:
//!
//! ```text
//! // Gray-Scott
//! delta_a = D_a * laplacian_a - a*b*b + F*(1.0-a);
//! delta_b = D_b * laplacian_b + a*b*b - (F+k)*b;
//! ```
//!
//! # Examples
//!
//! ```ignore
//! use ready_formula::{parse_program, Evaluator};
//!
//! let program = parse_program("delta_a = 0.5 * laplacian_a;")?;
//! let locals = Evaluator::new(&context).run(&program)?;
//! ```

pub mod ast;
pub mod eval;
pub mod parser;

pub use ast::*;
pub use eval::*;
pub use parser::*;
