#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # ice-expression
//!
//! A restricted, total expression evaluator for `condition`, `monitor`, and
//! `recursive` nodes. Accepts constants, dotted-path variable lookups,
//! unary `not`/`+`/`-`, binary arithmetic, comparisons, and `and`/`or`.
//! Rejects everything else (calls, indexing, attribute access, imports) at
//! parse time.

pub mod ast;
pub mod error;
pub mod eval;
pub mod lexer;
pub mod parser;

pub use ast::{BinaryOp, Expr, Literal, UnaryOp};
pub use error::ExpressionError;
pub use eval::{eval, eval_bool, EvalValue};
pub use parser::parse;
