//! Comparison expressions driving branch and loop actions.
//!
//! An expression is exactly `<left> <operator> <right>`. The form of `<left>`
//! picks the comparison type, tried in order: integer, float, boolean, string.
//! `<right>` must parse as that same type.

use std::cmp::Ordering;

use crate::{ActchainError, Result};

#[derive(Debug, Clone, PartialEq)]
enum Operand {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
}

impl Operator {
    fn parse(op: &str) -> Result<Self> {
        Ok(match op {
            "==" => Operator::Eq,
            "!=" => Operator::Ne,
            ">" => Operator::Gt,
            "<" => Operator::Lt,
            ">=" => Operator::Ge,
            "<=" => Operator::Le,
            _ => return Err(ActchainError::Evaluation(format!("unsupported operator '{}'", op))),
        })
    }

    fn is_ordering(self) -> bool {
        !matches!(self, Operator::Eq | Operator::Ne)
    }
}

// 1 and 0 on the left infer as integers first
fn parse_bool(token: &str) -> Option<bool> {
    match token {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}

impl Operand {
    fn infer(token: &str) -> Self {
        if let Ok(i) = token.parse::<i64>() {
            Operand::Int(i)
        } else if let Ok(f) = token.parse::<f64>() {
            Operand::Float(f)
        } else if let Some(b) = parse_bool(token) {
            Operand::Bool(b)
        } else {
            Operand::Str(token.to_string())
        }
    }

    /// Parses `token` as the same type as `self`.
    fn parse_like(
        &self,
        token: &str,
    ) -> Result<Self> {
        let mismatch = |ty: &str| ActchainError::Evaluation(format!("cannot compare {} with '{}'", ty, token));
        Ok(match self {
            Operand::Int(_) => Operand::Int(token.parse().map_err(|_| mismatch("integer"))?),
            Operand::Float(_) => Operand::Float(token.parse().map_err(|_| mismatch("float"))?),
            Operand::Bool(_) => Operand::Bool(parse_bool(token).ok_or_else(|| mismatch("boolean"))?),
            Operand::Str(_) => Operand::Str(token.to_string()),
        })
    }

    fn compare(
        &self,
        other: &Operand,
    ) -> Option<Ordering> {
        match (self, other) {
            (Operand::Int(a), Operand::Int(b)) => Some(a.cmp(b)),
            (Operand::Float(a), Operand::Float(b)) => a.partial_cmp(b),
            (Operand::Str(a), Operand::Str(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

/// Evaluates a fully resolved condition.
///
/// Every failure (wrong token count, unknown operator, type mismatch, ordering
/// on booleans) is an [`ActchainError::Evaluation`].
pub fn evaluate(expr: &str) -> Result<bool> {
    let tokens: Vec<&str> = expr.split_whitespace().collect();
    let [left, op, right] = tokens.as_slice() else {
        return Err(ActchainError::Evaluation(format!("invalid condition '{}': expected '<left> <operator> <right>'", expr.trim())));
    };

    let op = Operator::parse(op)?;
    let left = Operand::infer(left);
    let right = left.parse_like(right)?;

    if op.is_ordering() && matches!(left, Operand::Bool(_)) {
        return Err(ActchainError::Evaluation(format!("operator {:?} is not supported for booleans", op)));
    }

    Ok(match op {
        Operator::Eq => left == right,
        Operator::Ne => left != right,
        _ => {
            let ordering = left.compare(&right).ok_or_else(|| ActchainError::Evaluation(format!("cannot order '{}'", expr.trim())))?;
            match op {
                Operator::Gt => ordering == Ordering::Greater,
                Operator::Lt => ordering == Ordering::Less,
                Operator::Ge => ordering != Ordering::Less,
                _ => ordering != Ordering::Greater,
            }
        }
    })
}
