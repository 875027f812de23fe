// Formula evaluator - evaluates an expression tree against a cell lookup

use crate::position::Position;
use crate::value::FormulaError;

use super::parser::{Expr, Op, UnaryOp};

/// Numeric view of the cells a formula reads.
///
/// Implementors decide how a referenced cell becomes a number; the evaluator
/// only guarantees that out-of-grid positions never reach `lookup`.
pub trait CellLookup {
    fn lookup(&self, pos: Position) -> Result<f64, FormulaError>;
}

impl<F> CellLookup for F
where
    F: Fn(Position) -> Result<f64, FormulaError>,
{
    fn lookup(&self, pos: Position) -> Result<f64, FormulaError> {
        self(pos)
    }
}

pub fn evaluate<L: CellLookup + ?Sized>(expr: &Expr, lookup: &L) -> Result<f64, FormulaError> {
    match expr {
        Expr::Number(n) => Ok(*n),
        Expr::CellRef(pos) => {
            if !pos.is_valid() {
                return Err(FormulaError::Ref);
            }
            lookup.lookup(*pos)
        }
        Expr::Unary { op, operand } => {
            let value = evaluate(operand, lookup)?;
            Ok(match op {
                UnaryOp::Plus => value,
                UnaryOp::Minus => -value,
            })
        }
        Expr::BinaryOp { op, left, right } => {
            let left_val = evaluate(left, lookup)?;
            let right_val = evaluate(right, lookup)?;

            let result = match op {
                Op::Add => left_val + right_val,
                Op::Sub => left_val - right_val,
                Op::Mul => left_val * right_val,
                Op::Div => {
                    if right_val == 0.0 {
                        return Err(FormulaError::Div0);
                    }
                    left_val / right_val
                }
            };
            // Overflow to inf/NaN is reported the same way as x/0
            if !result.is_finite() {
                return Err(FormulaError::Div0);
            }
            Ok(result)
        }
    }
}
