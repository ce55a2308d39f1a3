//! WHERE-clause flattening.

use sqlparser::ast::{BinaryOperator, Expr};

/// Shape of one predicate node.
#[derive(Debug, Clone, Copy)]
pub enum Predicate<'a> {
    /// `left AND right` / `left OR right`, or a parenthesized group.
    Composite { left: &'a Expr, right: Option<&'a Expr> },
    /// A column compared against one operand.
    Leaf(Comparison<'a>),
    /// Anything else: function calls, IN lists, BETWEEN, IS NULL, subqueries.
    Unsupported(&'a Expr),
}

/// The atomic unit of a flattened WHERE tree.
#[derive(Debug, Clone, Copy)]
pub struct Comparison<'a> {
    pub column: &'a Expr,
    pub operand: &'a Expr,
}

impl<'a> Predicate<'a> {
    pub fn classify(expr: &'a Expr) -> Self {
        match expr {
            Expr::BinaryOp {
                left,
                op: BinaryOperator::And | BinaryOperator::Or,
                right,
            } => Predicate::Composite {
                left: left.as_ref(),
                right: Some(right.as_ref()),
            },
            Expr::Nested(inner) => Predicate::Composite {
                left: inner.as_ref(),
                right: None,
            },
            Expr::BinaryOp { left, right, .. } if is_column(left) => {
                Predicate::Leaf(Comparison {
                    column: left.as_ref(),
                    operand: right.as_ref(),
                })
            }
            Expr::Like { expr, pattern, .. } | Expr::ILike { expr, pattern, .. }
                if is_column(expr) =>
            {
                Predicate::Leaf(Comparison {
                    column: expr.as_ref(),
                    operand: pattern.as_ref(),
                })
            }
            other => Predicate::Unsupported(other),
        }
    }
}

fn is_column(expr: &Expr) -> bool {
    matches!(expr, Expr::Identifier(_) | Expr::CompoundIdentifier(_))
}

/// Flatten a predicate tree into its leaf comparisons, in source order.
pub fn flatten(expr: &Expr) -> Vec<Comparison<'_>> {
    let mut leaves = Vec::new();
    collect(expr, &mut leaves);
    leaves
}

fn collect<'a>(expr: &'a Expr, leaves: &mut Vec<Comparison<'a>>) {
    match Predicate::classify(expr) {
        Predicate::Composite { left, right } => {
            collect(left, leaves);
            if let Some(right) = right {
                collect(right, leaves);
            }
        }
        Predicate::Leaf(comparison) => leaves.push(comparison),
        Predicate::Unsupported(expr) => {
            tracing::debug!(predicate = %expr, "Unsupported predicate shape left as plaintext");
        }
    }
}
