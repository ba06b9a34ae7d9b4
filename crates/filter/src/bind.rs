//! Schema binding and type checking.

use crate::ast::{BinaryOp, Expr, Literal, StrFunction, TypedExpr, UnaryOp};
use crate::error::FilterError;
use crate::schema::{FieldType, Schema};
use chrono::{DateTime, Utc};

/// Bind an expression against a schema, producing a typed tree. The result
/// may be any scalar type; use [`bind_boolean`] for filter positions.
pub fn bind(expr: &Expr, schema: &Schema) -> Result<TypedExpr, FilterError> {
    match expr {
        Expr::Literal(lit) => Ok(TypedExpr::Literal(lit.clone())),

        Expr::Path(path) => {
            let def = schema
                .field(path)
                .ok_or_else(|| FilterError::UnknownField { path: path.clone() })?;
            Ok(TypedExpr::Field {
                path: path.clone(),
                column: def.column.to_string(),
                ty: def.ty,
            })
        }

        Expr::Unary { op: UnaryOp::Not, operand } => {
            let operand = bind(operand, schema)?;
            require(&operand, FieldType::Bool, "!")?;
            Ok(TypedExpr::Not(Box::new(operand)))
        }

        Expr::Binary { op, left, right } => bind_binary(*op, left, right, schema),

        Expr::Call { function, args } => bind_call(function, args, schema),

        Expr::List(_) => Err(FilterError::TypeMismatch {
            path: expr.to_string(),
            expected: "scalar expression".to_string(),
            got: "list".to_string(),
        }),
    }
}

/// Bind and additionally require a boolean result, as every filter and
/// match position does.
pub fn bind_boolean(expr: &Expr, schema: &Schema) -> Result<TypedExpr, FilterError> {
    let typed = bind(expr, schema)?;
    if typed.field_type() != FieldType::Bool {
        return Err(FilterError::NonBooleanResult);
    }
    Ok(typed)
}

fn bind_binary(
    op: BinaryOp,
    left: &Expr,
    right: &Expr,
    schema: &Schema,
) -> Result<TypedExpr, FilterError> {
    match op {
        BinaryOp::And | BinaryOp::Or => {
            let l = bind(left, schema)?;
            let r = bind(right, schema)?;
            require(&l, FieldType::Bool, op.symbol())?;
            require(&r, FieldType::Bool, op.symbol())?;
            Ok(match op {
                BinaryOp::And => TypedExpr::And(Box::new(l), Box::new(r)),
                _ => TypedExpr::Or(Box::new(l), Box::new(r)),
            })
        }

        BinaryOp::In => {
            let needle = bind(left, schema)?;
            let Expr::List(items) = right else {
                return Err(FilterError::TypeMismatch {
                    path: right.to_string(),
                    expected: "list".to_string(),
                    got: "scalar expression".to_string(),
                });
            };
            let want = needle.field_type();
            let mut bound = Vec::with_capacity(items.len());
            for item in items {
                let typed = bind(item, schema)?;
                if typed.field_type() != want {
                    return Err(FilterError::TypeMismatch {
                        path: item.to_string(),
                        expected: want.to_string(),
                        got: typed.field_type().to_string(),
                    });
                }
                bound.push(typed);
            }
            Ok(TypedExpr::In {
                needle: Box::new(needle),
                items: bound,
            })
        }

        BinaryOp::Eq | BinaryOp::Ne => {
            let l = bind(left, schema)?;
            let r = bind(right, schema)?;
            if l.field_type() != r.field_type() {
                return Err(FilterError::TypeMismatch {
                    path: right.to_string(),
                    expected: l.field_type().to_string(),
                    got: r.field_type().to_string(),
                });
            }
            Ok(TypedExpr::Compare {
                op,
                left: Box::new(l),
                right: Box::new(r),
            })
        }

        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let l = bind(left, schema)?;
            let r = bind(right, schema)?;
            let lt = l.field_type();
            let rt = r.field_type();
            if lt != rt {
                return Err(FilterError::TypeMismatch {
                    path: right.to_string(),
                    expected: lt.to_string(),
                    got: rt.to_string(),
                });
            }
            if !matches!(lt, FieldType::Int | FieldType::Timestamp) {
                return Err(FilterError::TypeMismatch {
                    path: left.to_string(),
                    expected: "int or timestamp".to_string(),
                    got: lt.to_string(),
                });
            }
            Ok(TypedExpr::Compare {
                op,
                left: Box::new(l),
                right: Box::new(r),
            })
        }
    }
}

fn bind_call(function: &str, args: &[Expr], schema: &Schema) -> Result<TypedExpr, FilterError> {
    match function {
        "startsWith" | "endsWith" | "contains" => {
            if args.len() != 2 {
                return Err(FilterError::TypeMismatch {
                    path: function.to_string(),
                    expected: "2 arguments".to_string(),
                    got: format!("{} arguments", args.len()),
                });
            }
            let target = bind(&args[0], schema)?;
            let pattern = bind(&args[1], schema)?;
            require(&target, FieldType::String, function)?;
            require(&pattern, FieldType::String, function)?;
            let function = match function {
                "startsWith" => StrFunction::StartsWith,
                "endsWith" => StrFunction::EndsWith,
                _ => StrFunction::Contains,
            };
            Ok(TypedExpr::StrCall {
                function,
                target: Box::new(target),
                pattern: Box::new(pattern),
            })
        }

        // Timestamp constructor folds to a literal at bind time.
        "timestamp" => {
            let [Expr::Literal(Literal::Str(text))] = args else {
                return Err(FilterError::TypeMismatch {
                    path: "timestamp".to_string(),
                    expected: "one string literal argument".to_string(),
                    got: format!("{} arguments", args.len()),
                });
            };
            let parsed: DateTime<Utc> = DateTime::parse_from_rfc3339(text)
                .map_err(|_| FilterError::TypeMismatch {
                    path: "timestamp".to_string(),
                    expected: "RFC3339 timestamp".to_string(),
                    got: format!("{:?}", text),
                })?
                .with_timezone(&Utc);
            Ok(TypedExpr::Literal(Literal::Timestamp(parsed)))
        }

        other => Err(FilterError::UnknownFunction {
            name: other.to_string(),
        }),
    }
}

fn require(typed: &TypedExpr, want: FieldType, at: &str) -> Result<(), FilterError> {
    let got = typed.field_type();
    if got != want {
        return Err(FilterError::TypeMismatch {
            path: at.to_string(),
            expected: want.to_string(),
            got: got.to_string(),
        });
    }
    Ok(())
}
