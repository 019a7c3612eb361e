//! Evaluator for the restricted expression grammar.
//!
//! Evaluation is total and side-effect free: every accepted expression
//! either produces a value or a typed [`ExpressionError`]; there is no
//! I/O, no recursion into user code, no unbounded loop.

use serde_json::Value as Json;

use crate::ast::{BinaryOp, Expr, Literal, UnaryOp};
use crate::error::ExpressionError;

/// The result of evaluating an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum EvalValue {
    /// Integer.
    Int(i64),
    /// Floating point.
    Float(f64),
    /// Boolean.
    Bool(bool),
    /// String.
    Str(String),
}

impl EvalValue {
    /// Coerce to `bool` for use as a condition result. Numbers are
    /// truthy if non-zero, strings if non-empty, matching the boolean
    /// subset's expected semantics for `condition`/`monitor` nodes.
    #[must_use]
    pub fn as_bool(&self) -> bool {
        match self {
            EvalValue::Bool(b) => *b,
            EvalValue::Int(i) => *i != 0,
            EvalValue::Float(f) => *f != 0.0,
            EvalValue::Str(s) => !s.is_empty(),
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            EvalValue::Int(i) => Some(*i as f64),
            EvalValue::Float(f) => Some(*f),
            _ => None,
        }
    }
}

/// Evaluate an already-parsed expression against a variable map.
pub fn eval(expr: &Expr, vars: &Json) -> Result<EvalValue, ExpressionError> {
    match expr {
        Expr::Literal(Literal::Int(v)) => Ok(EvalValue::Int(*v)),
        Expr::Literal(Literal::Float(v)) => Ok(EvalValue::Float(*v)),
        Expr::Literal(Literal::Bool(v)) => Ok(EvalValue::Bool(*v)),
        Expr::Literal(Literal::Str(v)) => Ok(EvalValue::Str(v.clone())),
        Expr::Var(path) => resolve_var(path, vars),
        Expr::Unary(op, operand) => eval_unary(*op, eval(operand, vars)?),
        Expr::Binary(lhs, BinaryOp::And, rhs) => {
            let l = eval(lhs, vars)?;
            if !l.as_bool() {
                return Ok(EvalValue::Bool(false));
            }
            Ok(EvalValue::Bool(eval(rhs, vars)?.as_bool()))
        }
        Expr::Binary(lhs, BinaryOp::Or, rhs) => {
            let l = eval(lhs, vars)?;
            if l.as_bool() {
                return Ok(EvalValue::Bool(true));
            }
            Ok(EvalValue::Bool(eval(rhs, vars)?.as_bool()))
        }
        Expr::Binary(lhs, op, rhs) => eval_binary(*op, eval(lhs, vars)?, eval(rhs, vars)?),
    }
}

/// Convenience entry point for `condition`/`monitor` nodes: parse and
/// evaluate in one step, coercing the result to `bool`.
pub fn eval_bool(src: &str, vars: &Json) -> Result<bool, ExpressionError> {
    let expr = crate::parser::parse(src)?;
    Ok(eval(&expr, vars)?.as_bool())
}

fn resolve_var(path: &[String], vars: &Json) -> Result<EvalValue, ExpressionError> {
    let mut cur = vars;
    for part in path {
        cur = cur
            .get(part)
            .ok_or_else(|| ExpressionError::UnknownVariable(path.join(".")))?;
    }
    json_to_eval(cur).ok_or_else(|| ExpressionError::TypeError(format!("unsupported value at {}", path.join("."))))
}

fn json_to_eval(value: &Json) -> Option<EvalValue> {
    match value {
        Json::Bool(b) => Some(EvalValue::Bool(*b)),
        Json::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(EvalValue::Int(i))
            } else {
                n.as_f64().map(EvalValue::Float)
            }
        }
        Json::String(s) => Some(EvalValue::Str(s.clone())),
        _ => None,
    }
}

fn eval_unary(op: UnaryOp, operand: EvalValue) -> Result<EvalValue, ExpressionError> {
    match op {
        UnaryOp::Not => Ok(EvalValue::Bool(!operand.as_bool())),
        UnaryOp::Pos => match operand {
            EvalValue::Int(_) | EvalValue::Float(_) => Ok(operand),
            other => Err(ExpressionError::TypeError(format!(
                "unary + not supported for {other:?}"
            ))),
        },
        UnaryOp::Neg => match operand {
            EvalValue::Int(i) => Ok(EvalValue::Int(-i)),
            EvalValue::Float(f) => Ok(EvalValue::Float(-f)),
            other => Err(ExpressionError::TypeError(format!(
                "unary - not supported for {other:?}"
            ))),
        },
    }
}

fn eval_binary(op: BinaryOp, l: EvalValue, r: EvalValue) -> Result<EvalValue, ExpressionError> {
    use BinaryOp::{Add, Div, Eq, Ge, Gt, Le, Lt, Mod, Mul, Ne, Sub};

    if matches!(op, Eq | Ne) {
        let equal = values_equal(&l, &r);
        return Ok(EvalValue::Bool(if matches!(op, Eq) { equal } else { !equal }));
    }

    if let (EvalValue::Str(a), EvalValue::Str(b)) = (&l, &r) {
        return match op {
            Add => Ok(EvalValue::Str(format!("{a}{b}"))),
            Lt => Ok(EvalValue::Bool(a < b)),
            Le => Ok(EvalValue::Bool(a <= b)),
            Gt => Ok(EvalValue::Bool(a > b)),
            Ge => Ok(EvalValue::Bool(a >= b)),
            _ => Err(ExpressionError::TypeError(format!(
                "operator {op:?} not supported between strings"
            ))),
        };
    }

    let (Some(a), Some(b)) = (l.as_f64(), r.as_f64()) else {
        return Err(ExpressionError::TypeError(format!(
            "operator {op:?} requires numeric operands, got {l:?} and {r:?}"
        )));
    };

    match op {
        Add => Ok(numeric_result(&l, &r, a + b)),
        Sub => Ok(numeric_result(&l, &r, a - b)),
        Mul => Ok(numeric_result(&l, &r, a * b)),
        Div => {
            if b == 0.0 {
                Err(ExpressionError::DivisionByZero)
            } else {
                Ok(numeric_result(&l, &r, a / b))
            }
        }
        Mod => {
            if b == 0.0 {
                Err(ExpressionError::DivisionByZero)
            } else {
                Ok(numeric_result(&l, &r, a % b))
            }
        }
        Lt => Ok(EvalValue::Bool(a < b)),
        Le => Ok(EvalValue::Bool(a <= b)),
        Gt => Ok(EvalValue::Bool(a > b)),
        Ge => Ok(EvalValue::Bool(a >= b)),
        Eq | Ne => unreachable!("handled above"),
        BinaryOp::And | BinaryOp::Or => unreachable!("handled by caller with short-circuit"),
    }
}

fn numeric_result(l: &EvalValue, r: &EvalValue, v: f64) -> EvalValue {
    if matches!(l, EvalValue::Int(_)) && matches!(r, EvalValue::Int(_)) && v.fract() == 0.0 {
        EvalValue::Int(v as i64)
    } else {
        EvalValue::Float(v)
    }
}

fn values_equal(l: &EvalValue, r: &EvalValue) -> bool {
    match (l, r) {
        (EvalValue::Str(a), EvalValue::Str(b)) => a == b,
        (EvalValue::Bool(a), EvalValue::Bool(b)) => a == b,
        _ => match (l.as_f64(), r.as_f64()) {
            (Some(a), Some(b)) => (a - b).abs() < f64::EPSILON,
            _ => false,
        },
    }
}
