//! SQL WHERE emission for bound expressions.
//!
//! Emits a WHERE fragment with `$n` placeholders and the ordered parameter
//! list. User-supplied scalars never appear in the SQL text itself.

use crate::ast::{BinaryOp, Literal, StrFunction, TypedExpr};
use chrono::{DateTime, Utc};

/// One bound parameter, in emission order.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Str(String),
    Int(i64),
    Bool(bool),
    Timestamp(DateTime<Utc>),
}

/// A WHERE fragment plus its parameters. `params[0]` binds the lowest
/// placeholder index in the fragment.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlFragment {
    pub where_clause: String,
    pub params: Vec<SqlParam>,
}

/// Emit starting at placeholder `$1`.
pub fn emit(expr: &TypedExpr) -> SqlFragment {
    emit_with_offset(expr, 1)
}

/// Emit with the first placeholder at `$first_index`; the query engine
/// composes scope and time predicates ahead of the filter.
pub fn emit_with_offset(expr: &TypedExpr, first_index: usize) -> SqlFragment {
    let mut emitter = Emitter {
        sql: String::new(),
        params: Vec::new(),
        next_index: first_index,
    };
    emitter.emit(expr);
    SqlFragment {
        where_clause: emitter.sql,
        params: emitter.params,
    }
}

struct Emitter {
    sql: String,
    params: Vec<SqlParam>,
    next_index: usize,
}

impl Emitter {
    fn push_param(&mut self, param: SqlParam) {
        self.sql.push_str(&format!("${}", self.next_index));
        self.next_index += 1;
        self.params.push(param);
    }

    fn push_literal(&mut self, lit: &Literal) {
        let param = match lit {
            Literal::Str(s) => SqlParam::Str(s.clone()),
            Literal::Int(n) => SqlParam::Int(*n),
            Literal::Bool(b) => SqlParam::Bool(*b),
            Literal::Timestamp(t) => SqlParam::Timestamp(*t),
        };
        self.push_param(param);
    }

    fn emit(&mut self, expr: &TypedExpr) {
        match expr {
            TypedExpr::Literal(lit) => self.push_literal(lit),

            TypedExpr::Field { column, .. } => self.sql.push_str(column),

            TypedExpr::Not(inner) => {
                self.sql.push_str("NOT (");
                self.emit(inner);
                self.sql.push(')');
            }

            TypedExpr::And(l, r) => {
                self.sql.push('(');
                self.emit(l);
                self.sql.push_str(" AND ");
                self.emit(r);
                self.sql.push(')');
            }

            TypedExpr::Or(l, r) => {
                self.sql.push('(');
                self.emit(l);
                self.sql.push_str(" OR ");
                self.emit(r);
                self.sql.push(')');
            }

            TypedExpr::Compare { op, left, right } => {
                self.emit(left);
                let symbol = match op {
                    BinaryOp::Eq => " = ",
                    BinaryOp::Ne => " <> ",
                    BinaryOp::Lt => " < ",
                    BinaryOp::Le => " <= ",
                    BinaryOp::Gt => " > ",
                    BinaryOp::Ge => " >= ",
                    // Bind never produces And/Or/In under Compare.
                    _ => " = ",
                };
                self.sql.push_str(symbol);
                self.emit(right);
            }

            TypedExpr::StrCall { function, target, pattern } => {
                self.emit(target);
                self.sql.push_str(" LIKE ");
                match pattern.as_ref() {
                    TypedExpr::Literal(Literal::Str(text)) => {
                        let escaped = escape_like(text);
                        let shaped = match function {
                            StrFunction::StartsWith => format!("{}%", escaped),
                            StrFunction::EndsWith => format!("%{}", escaped),
                            StrFunction::Contains => format!("%{}%", escaped),
                        };
                        self.push_param(SqlParam::Str(shaped));
                    }
                    // Pattern from a column: concatenate wildcards in SQL.
                    other => {
                        match function {
                            StrFunction::StartsWith => {
                                self.sql.push('(');
                                self.emit(other);
                                self.sql.push_str(" || '%')");
                            }
                            StrFunction::EndsWith => {
                                self.sql.push_str("('%' || ");
                                self.emit(other);
                                self.sql.push(')');
                            }
                            StrFunction::Contains => {
                                self.sql.push_str("('%' || ");
                                self.emit(other);
                                self.sql.push_str(" || '%')");
                            }
                        }
                    }
                }
            }

            TypedExpr::In { needle, items } => {
                if items.is_empty() {
                    self.sql.push_str("FALSE");
                    return;
                }
                self.emit(needle);
                self.sql.push_str(" IN (");
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        self.sql.push_str(", ");
                    }
                    self.emit(item);
                }
                self.sql.push(')');
            }
        }
    }
}

/// Escape LIKE wildcards in user input; Postgres treats backslash as the
/// default escape character.
fn escape_like(text: &str) -> String {
    text.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bind::bind_boolean;
    use crate::parser::parse;
    use crate::schema;

    fn emit_audit(text: &str) -> SqlFragment {
        let typed = bind_boolean(&parse(text).unwrap(), schema::audit()).unwrap();
        emit(&typed)
    }

    #[test]
    fn scalars_become_bound_parameters() {
        let fragment = emit_audit("verb == 'create' && responseStatus.code >= 200");
        assert_eq!(fragment.where_clause, "(verb = $1 AND response_code >= $2)");
        assert_eq!(
            fragment.params,
            vec![SqlParam::Str("create".into()), SqlParam::Int(200)]
        );
        // Structural injection safety: no user scalar appears in the SQL.
        assert!(!fragment.where_clause.contains("create"));
        assert!(!fragment.where_clause.contains("200"));
    }

    #[test]
    fn in_lists_expand_to_placeholders() {
        let fragment = emit_audit("verb in ['create', 'update', 'delete']");
        assert_eq!(fragment.where_clause, "verb IN ($1, $2, $3)");
        assert_eq!(fragment.params.len(), 3);
    }

    #[test]
    fn empty_in_list_is_false() {
        let fragment = emit_audit("verb in []");
        assert_eq!(fragment.where_clause, "FALSE");
        assert!(fragment.params.is_empty());
    }

    #[test]
    fn starts_with_escapes_wildcards() {
        let fragment = emit_audit("startsWith(user.username, '50%_off')");
        assert_eq!(fragment.where_clause, "user_username LIKE $1");
        assert_eq!(fragment.params, vec![SqlParam::Str("50\\%\\_off%".into())]);
    }

    #[test]
    fn offset_continues_placeholder_numbering() {
        let typed = bind_boolean(&parse("verb == 'get'").unwrap(), schema::audit()).unwrap();
        let fragment = emit_with_offset(&typed, 4);
        assert_eq!(fragment.where_clause, "verb = $4");
    }

    #[test]
    fn attempted_injection_stays_parameterised() {
        let fragment = emit_audit("objectRef.name == 'x\\'; DROP TABLE audit_records; --'");
        assert_eq!(fragment.where_clause, "object_name = $1");
        assert_eq!(
            fragment.params,
            vec![SqlParam::Str("x'; DROP TABLE audit_records; --".into())]
        );
    }
}
