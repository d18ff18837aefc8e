//! Evaluation of compiled selectors under SQL three-valued logic.
//!
//! Evaluation is total: type mismatches, unbound identifiers, integer overflow
//! and integer division by zero all produce `Value::Null` (UNKNOWN) instead of
//! an error, so a badly formed message can never stop the filtering path.

use std::cmp::Ordering;

use crate::expr::{BinaryOp, Expr, UnaryOp};
use crate::value::Value;

/// Evaluates `expr`, looking up identifiers through `bind`. An identifier that
/// `bind` does not know evaluates to `Null`.
pub fn evaluate(expr: &Expr, bind: &dyn Fn(&str) -> Option<Value>) -> Value {
    match expr {
        Expr::Literal(value) => value.clone(),
        Expr::Identifier(name) => bind(name.as_ref()).unwrap_or(Value::Null),
        Expr::Unary { op, operand } => unary(*op, evaluate(operand, bind)),
        Expr::Binary { op, left, right } => binary(*op, left, right, bind),
        Expr::Between { operand, low, high, negated } => {
            let value = evaluate(operand, bind);
            let above = ordering(&value, &evaluate(low, bind), |o| o != Ordering::Less);
            let below = ordering(&value, &evaluate(high, bind), |o| o != Ordering::Greater);
            Value::from_truth(negate(and(above, below), *negated))
        }
        Expr::In { operand, list, negated } => match evaluate(operand, bind) {
            Value::Null => Value::Null,
            value => {
                // items of another type simply do not match
                let found = list.iter().any(|item| value.sql_eq(item) == Some(true));
                Value::Bool(found != *negated)
            }
        },
        Expr::Like { operand, pattern, negated } => match evaluate(operand, bind) {
            Value::Str(s) => Value::Bool(pattern.is_match(&s) != *negated),
            _ => Value::Null,
        },
    }
}

/// Kleene conjunction: FALSE dominates, otherwise UNKNOWN dominates.
pub fn and(left: Option<bool>, right: Option<bool>) -> Option<bool> {
    match (left, right) {
        (Some(false), _) | (_, Some(false)) => Some(false),
        (Some(true), Some(true)) => Some(true),
        _ => None,
    }
}

/// Kleene disjunction: TRUE dominates, otherwise UNKNOWN dominates.
pub fn or(left: Option<bool>, right: Option<bool>) -> Option<bool> {
    match (left, right) {
        (Some(true), _) | (_, Some(true)) => Some(true),
        (Some(false), Some(false)) => Some(false),
        _ => None,
    }
}

fn negate(truth: Option<bool>, negated: bool) -> Option<bool> {
    truth.map(|b| b != negated)
}

fn unary(op: UnaryOp, value: Value) -> Value {
    match (op, value) {
        (UnaryOp::IsNull, value) => Value::Bool(value.is_null()),
        (UnaryOp::IsNotNull, value) => Value::Bool(!value.is_null()),
        (UnaryOp::Not, value) => Value::from_truth(value.truth().map(|b| !b)),
        (UnaryOp::Neg, Value::Long(n)) => n.checked_neg().map_or(Value::Null, Value::Long),
        (UnaryOp::Neg, Value::Double(x)) => Value::Double(-x),
        (UnaryOp::Plus, value @ (Value::Long(_) | Value::Double(_))) => value,
        (UnaryOp::Neg | UnaryOp::Plus, _) => Value::Null,
    }
}

/// AND and OR skip the right operand once the left one decides the result.
fn binary(op: BinaryOp, left: &Expr, right: &Expr, bind: &dyn Fn(&str) -> Option<Value>) -> Value {
    let value = |expr: &Expr| evaluate(expr, bind);
    match op {
        BinaryOp::And => match value(left).truth() {
            Some(false) => Value::Bool(false),
            truth => Value::from_truth(and(truth, value(right).truth())),
        },
        BinaryOp::Or => match value(left).truth() {
            Some(true) => Value::Bool(true),
            truth => Value::from_truth(or(truth, value(right).truth())),
        },
        BinaryOp::Add => arithmetic(&value(left), &value(right), i64::checked_add, |a, b| a + b),
        BinaryOp::Sub => arithmetic(&value(left), &value(right), i64::checked_sub, |a, b| a - b),
        BinaryOp::Mul => arithmetic(&value(left), &value(right), i64::checked_mul, |a, b| a * b),
        // checked_div is None for a zero divisor
        BinaryOp::Div => arithmetic(&value(left), &value(right), i64::checked_div, |a, b| a / b),
        BinaryOp::Eq => Value::from_truth(value(left).sql_eq(&value(right))),
        BinaryOp::Neq => Value::from_truth(value(left).sql_eq(&value(right)).map(|eq| !eq)),
        BinaryOp::Lt => Value::from_truth(ordering(&value(left), &value(right), |o| o == Ordering::Less)),
        BinaryOp::Le => Value::from_truth(ordering(&value(left), &value(right), |o| o != Ordering::Greater)),
        BinaryOp::Gt => Value::from_truth(ordering(&value(left), &value(right), |o| o == Ordering::Greater)),
        BinaryOp::Ge => Value::from_truth(ordering(&value(left), &value(right), |o| o != Ordering::Less)),
    }
}

/// Long op Long stays Long (checked, truncating division); a Double on either
/// side promotes both.
fn arithmetic(
    left: &Value,
    right: &Value,
    long: fn(i64, i64) -> Option<i64>,
    double: fn(f64, f64) -> f64,
) -> Value {
    match (left, right) {
        (Value::Long(a), Value::Long(b)) => long(*a, *b).map_or(Value::Null, Value::Long),
        (Value::Long(_) | Value::Double(_), Value::Long(_) | Value::Double(_)) => {
            Value::Double(double(to_f64(left), to_f64(right)))
        }
        _ => Value::Null,
    }
}

fn to_f64(value: &Value) -> f64 {
    match value {
        Value::Long(n) => *n as f64,
        Value::Double(x) => *x,
        _ => f64::NAN,
    }
}

fn ordering(left: &Value, right: &Value, accept: fn(Ordering) -> bool) -> Option<bool> {
    left.sql_cmp(right).map(accept)
}
