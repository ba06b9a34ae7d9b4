//! In-memory evaluation of bound expressions against JSON records.
//!
//! Used by the policy engine (match predicates, template placeholders) and
//! the watch engine (server-side filtering). Field paths walk the JSON
//! environment by dotted segments; an absent segment yields null.

use crate::ast::{BinaryOp, Literal, StrFunction, TypedExpr};
use crate::error::EvalError;
use crate::schema::FieldType;
use chrono::{DateTime, Utc};
use serde_json::Value;

/// Scalar value produced by evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum EvalValue {
    Null,
    Str(String),
    Int(i64),
    Bool(bool),
    Timestamp(DateTime<Utc>),
}

impl EvalValue {
    /// Render for template interpolation.
    pub fn display(&self) -> String {
        match self {
            EvalValue::Null => String::new(),
            EvalValue::Str(s) => s.clone(),
            EvalValue::Int(n) => n.to_string(),
            EvalValue::Bool(b) => b.to_string(),
            EvalValue::Timestamp(t) => t.to_rfc3339(),
        }
    }
}

/// Evaluate an expression to a scalar.
pub fn eval(expr: &TypedExpr, env: &Value) -> Result<EvalValue, EvalError> {
    match expr {
        TypedExpr::Literal(lit) => Ok(match lit {
            Literal::Str(s) => EvalValue::Str(s.clone()),
            Literal::Int(n) => EvalValue::Int(*n),
            Literal::Bool(b) => EvalValue::Bool(*b),
            Literal::Timestamp(t) => EvalValue::Timestamp(*t),
        }),

        TypedExpr::Field { path, ty, .. } => lookup(env, path, *ty),

        TypedExpr::Not(inner) => {
            let value = eval_bool(inner, env)?;
            Ok(EvalValue::Bool(!value))
        }

        TypedExpr::And(l, r) => {
            // Short-circuit.
            if !eval_bool(l, env)? {
                return Ok(EvalValue::Bool(false));
            }
            Ok(EvalValue::Bool(eval_bool(r, env)?))
        }

        TypedExpr::Or(l, r) => {
            if eval_bool(l, env)? {
                return Ok(EvalValue::Bool(true));
            }
            Ok(EvalValue::Bool(eval_bool(r, env)?))
        }

        TypedExpr::Compare { op, left, right } => {
            let l = eval(left, env)?;
            let r = eval(right, env)?;
            compare(*op, &l, &r, left)
        }

        TypedExpr::StrCall { function, target, pattern } => {
            let t = eval(target, env)?;
            let p = eval(pattern, env)?;
            let (EvalValue::Str(t), EvalValue::Str(p)) = (&t, &p) else {
                return Err(null_at(target));
            };
            let result = match function {
                StrFunction::StartsWith => t.starts_with(p.as_str()),
                StrFunction::EndsWith => t.ends_with(p.as_str()),
                StrFunction::Contains => t.contains(p.as_str()),
            };
            Ok(EvalValue::Bool(result))
        }

        TypedExpr::In { needle, items } => {
            let n = eval(needle, env)?;
            for item in items {
                if eval(item, env)? == n {
                    return Ok(EvalValue::Bool(true));
                }
            }
            Ok(EvalValue::Bool(false))
        }
    }
}

/// Evaluate a boolean expression, as match predicates and watch filters do.
pub fn eval_bool(expr: &TypedExpr, env: &Value) -> Result<bool, EvalError> {
    match eval(expr, env)? {
        EvalValue::Bool(b) => Ok(b),
        // Bind guarantees a boolean tree; a null here means a field the
        // record simply does not carry.
        _ => Ok(false),
    }
}

fn lookup(env: &Value, path: &str, ty: FieldType) -> Result<EvalValue, EvalError> {
    let mut current = env;
    for segment in path.split('.') {
        match current.get(segment) {
            Some(next) => current = next,
            None => return Ok(EvalValue::Null),
        }
    }
    coerce(current, path, ty)
}

fn coerce(value: &Value, path: &str, ty: FieldType) -> Result<EvalValue, EvalError> {
    match (ty, value) {
        (_, Value::Null) => Ok(EvalValue::Null),
        (FieldType::String, Value::String(s)) => Ok(EvalValue::Str(s.clone())),
        (FieldType::Int, Value::Number(n)) => n.as_i64().map(EvalValue::Int).ok_or_else(|| {
            EvalError::BadValue {
                path: path.to_string(),
                message: format!("{} is not an integer", n),
            }
        }),
        (FieldType::Bool, Value::Bool(b)) => Ok(EvalValue::Bool(*b)),
        (FieldType::Timestamp, Value::String(s)) => DateTime::parse_from_rfc3339(s)
            .map(|t| EvalValue::Timestamp(t.with_timezone(&Utc)))
            .map_err(|_| EvalError::BadValue {
                path: path.to_string(),
                message: format!("{:?} is not an RFC3339 timestamp", s),
            }),
        (want, got) => Err(EvalError::BadValue {
            path: path.to_string(),
            message: format!("expected {}, got {}", want, json_kind(got)),
        }),
    }
}

fn compare(
    op: BinaryOp,
    left: &EvalValue,
    right: &EvalValue,
    left_expr: &TypedExpr,
) -> Result<EvalValue, EvalError> {
    use EvalValue::*;
    match op {
        BinaryOp::Eq => Ok(Bool(left == right)),
        BinaryOp::Ne => Ok(Bool(left != right)),
        _ => {
            let ordering = match (left, right) {
                (Int(a), Int(b)) => a.cmp(b),
                (Timestamp(a), Timestamp(b)) => a.cmp(b),
                // Ordering against a missing field is a runtime rule error.
                _ => return Err(null_at(left_expr)),
            };
            let result = match op {
                BinaryOp::Lt => ordering.is_lt(),
                BinaryOp::Le => ordering.is_le(),
                BinaryOp::Gt => ordering.is_gt(),
                _ => ordering.is_ge(),
            };
            Ok(Bool(result))
        }
    }
}

fn null_at(expr: &TypedExpr) -> EvalError {
    let path = match expr {
        TypedExpr::Field { path, .. } => path.clone(),
        _ => "<expression>".to_string(),
    };
    EvalError::NullField { path }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
