//! Untyped and typed expression trees.

use crate::schema::FieldType;
use chrono::{DateTime, Utc};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Literal {
    Str(String),
    Int(i64),
    Bool(bool),
    Timestamp(DateTime<Utc>),
}

impl Literal {
    pub fn field_type(&self) -> FieldType {
        match self {
            Literal::Str(_) => FieldType::String,
            Literal::Int(_) => FieldType::Int,
            Literal::Bool(_) => FieldType::Bool,
            Literal::Timestamp(_) => FieldType::Timestamp,
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Str(s) => {
                write!(f, "'{}'", s.replace('\\', "\\\\").replace('\'', "\\'"))
            }
            Literal::Int(n) => write!(f, "{}", n),
            Literal::Bool(b) => write!(f, "{}", b),
            Literal::Timestamp(t) => write!(f, "timestamp('{}')", t.to_rfc3339()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    In,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::In => "in",
        }
    }

    /// Binding power for display parenthesization; mirrors the parser.
    fn precedence(&self) -> u8 {
        match self {
            BinaryOp::Or => 1,
            BinaryOp::And => 2,
            _ => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
}

/// Parse output, prior to schema binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Literal(Literal),
    Path(String),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Call {
        function: String,
        args: Vec<Expr>,
    },
    List(Vec<Expr>),
}

impl Expr {
    fn precedence(&self) -> u8 {
        match self {
            Expr::Binary { op, .. } => op.precedence(),
            Expr::Unary { .. } => 4,
            _ => 5,
        }
    }

    fn fmt_child(&self, f: &mut fmt::Formatter<'_>, parent: u8) -> fmt::Result {
        if self.precedence() < parent {
            write!(f, "({})", self)
        } else {
            write!(f, "{}", self)
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Literal(lit) => write!(f, "{}", lit),
            Expr::Path(path) => write!(f, "{}", path),
            Expr::Unary { op: UnaryOp::Not, operand } => {
                write!(f, "!")?;
                operand.fmt_child(f, 4)
            }
            Expr::Binary { op, left, right } => {
                left.fmt_child(f, op.precedence())?;
                write!(f, " {} ", op.symbol())?;
                // Right child at equal precedence needs parens to keep the
                // parse left-associative on re-read.
                if right.precedence() <= op.precedence() {
                    write!(f, "({})", right)
                } else {
                    write!(f, "{}", right)
                }
            }
            Expr::Call { function, args } => {
                write!(f, "{}(", function)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
            Expr::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
        }
    }
}

/// String predicate functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrFunction {
    StartsWith,
    EndsWith,
    Contains,
}

impl StrFunction {
    pub fn name(&self) -> &'static str {
        match self {
            StrFunction::StartsWith => "startsWith",
            StrFunction::EndsWith => "endsWith",
            StrFunction::Contains => "contains",
        }
    }
}

/// Schema-bound expression tree. Field nodes carry their column mapping and
/// type; every construction site has already passed type checking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypedExpr {
    Literal(Literal),
    Field {
        path: String,
        column: String,
        ty: FieldType,
    },
    Not(Box<TypedExpr>),
    And(Box<TypedExpr>, Box<TypedExpr>),
    Or(Box<TypedExpr>, Box<TypedExpr>),
    Compare {
        op: BinaryOp,
        left: Box<TypedExpr>,
        right: Box<TypedExpr>,
    },
    StrCall {
        function: StrFunction,
        target: Box<TypedExpr>,
        pattern: Box<TypedExpr>,
    },
    In {
        needle: Box<TypedExpr>,
        items: Vec<TypedExpr>,
    },
}

impl TypedExpr {
    pub fn field_type(&self) -> FieldType {
        match self {
            TypedExpr::Literal(lit) => lit.field_type(),
            TypedExpr::Field { ty, .. } => *ty,
            TypedExpr::Not(_)
            | TypedExpr::And(..)
            | TypedExpr::Or(..)
            | TypedExpr::Compare { .. }
            | TypedExpr::StrCall { .. }
            | TypedExpr::In { .. } => FieldType::Bool,
        }
    }
}
