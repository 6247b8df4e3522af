use serde::{Deserialize, Serialize};

use super::value::Value;

/// Arithmetic operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
        }
    }

    /// Binding strength: multiplicative binds tighter than additive.
    pub fn precedence(&self) -> u8 {
        match self {
            Self::Add | Self::Sub => 1,
            Self::Mul | Self::Div => 2,
        }
    }
}

/// Comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompareOp {
    Ge,
    Le,
    Eq,
    Ne,
    Gt,
    Lt,
}

impl CompareOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Ge => ">=",
            Self::Le => "<=",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Gt => ">",
            Self::Lt => "<",
        }
    }

    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            ">=" => Some(Self::Ge),
            "<=" => Some(Self::Le),
            "==" => Some(Self::Eq),
            "!=" => Some(Self::Ne),
            ">" => Some(Self::Gt),
            "<" => Some(Self::Lt),
            _ => None,
        }
    }
}

/// A value-producing expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expression {
    Literal(Value),
    /// String literal with `{name}` placeholders, interpolated when evaluated.
    Formatted(String),
    /// Reference to a variable or stat.
    Variable(String),
    Binary {
        left: Box<Expression>,
        op: BinaryOp,
        right: Box<Expression>,
    },
}

impl Expression {
    pub fn binary(left: Expression, op: BinaryOp, right: Expression) -> Self {
        Self::Binary {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    /// Collect every variable name this expression reads.
    pub fn variables<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Self::Variable(name) => out.push(name),
            Self::Binary { left, right, .. } => {
                left.variables(out);
                right.variables(out);
            }
            Self::Literal(_) | Self::Formatted(_) => {}
        }
    }
}

/// A boolean-producing test gating choices and conditional blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Condition {
    /// Truthy check against the variable store.
    BoolCheck(String),
    Comparison {
        left: Expression,
        op: CompareOp,
        right: Expression,
    },
}

impl Condition {
    pub fn compare(left: Expression, op: CompareOp, right: Expression) -> Self {
        Self::Comparison { left, op, right }
    }
}
