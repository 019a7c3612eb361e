//! Expression errors.
//!
//! Mirrors the per-crate `thiserror::Error` convention used throughout this
//! workspace rather than a shared error façade.

use thiserror::Error;

/// Errors raised while parsing or evaluating an expression.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ExpressionError {
    /// The expression used syntax or a construct outside the accepted
    /// grammar (a call, an index, an attribute access, an import, ...).
    #[error("invalid expression: {0}")]
    InvalidExpression(String),

    /// A dotted-path identifier was not found in the supplied variable map.
    #[error("unknown variable: {0}")]
    UnknownVariable(String),

    /// A binary/unary operator was applied to operand types it does not
    /// support (e.g. string + bool).
    #[error("type error: {0}")]
    TypeError(String),

    /// Division or modulo by zero.
    #[error("division by zero")]
    DivisionByZero,
}
