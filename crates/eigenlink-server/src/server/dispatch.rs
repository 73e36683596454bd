//! Operation validation and dispatch over reassembled arrays.
//!
//! Validation runs to completion before any arithmetic: every error here is
//! deterministic for a given call, and the backend is only reached with
//! operands it cannot reject. The square-only restriction on matrix
//! multiplication is inherited from the protocol contract rather than the
//! mathematics; general multiplication only needs the inner dimensions to
//! match.

use crate::server::backend::NumericBackend;
use eigenlink_core::{
    ArrayKind, Error, LogicalArray, Operation, Result, Shape, ShapeError,
};

/// Validates the operands for `op` and hands them to the backend.
///
/// Consumes the call's reassembled arrays, in call order, and yields the
/// result array(s) to stream back.
pub fn dispatch(
    op: Operation,
    kind: ArrayKind,
    arrays: Vec<LogicalArray>,
    backend: &dyn NumericBackend,
) -> Result<Vec<LogicalArray>> {
    match op {
        Operation::Add => add(kind, arrays, backend),
        Operation::Multiply => match kind {
            ArrayKind::Vectors => multiply_vectors(arrays, backend),
            ArrayKind::Matrices => multiply_matrices(arrays, backend),
        },
        Operation::Flip => flip(kind, arrays, backend),
    }
}

/// Elementwise sum of one or more operands of identical shape.
fn add(
    kind: ArrayKind,
    arrays: Vec<LogicalArray>,
    backend: &dyn NumericBackend,
) -> Result<Vec<LogicalArray>> {
    let mut operands = arrays.into_iter();
    let Some(first) = operands.next() else {
        return Err(Error::OperandCount {
            op: Operation::Add,
            kind,
            expected: 1,
            found: 0,
        });
    };

    let mut sum = first;
    for operand in operands {
        if operand.shape() != sum.shape() {
            return Err(ShapeError::Operands {
                op: Operation::Add,
                kind,
                left: sum.shape(),
                right: operand.shape(),
            }
            .into());
        }
        sum = backend.add(&sum, &operand)?;
    }
    Ok(vec![sum])
}

/// Dot product of exactly two equal-length vectors.
fn multiply_vectors(
    arrays: Vec<LogicalArray>,
    backend: &dyn NumericBackend,
) -> Result<Vec<LogicalArray>> {
    let [a, b] = exactly_two(Operation::Multiply, ArrayKind::Vectors, arrays)?;
    if a.shape() != b.shape() {
        return Err(ShapeError::Operands {
            op: Operation::Multiply,
            kind: ArrayKind::Vectors,
            left: a.shape(),
            right: b.shape(),
        }
        .into());
    }
    Ok(vec![backend.dot(&a, &b)?])
}

/// Product of exactly two square matrices of identical shape.
fn multiply_matrices(
    arrays: Vec<LogicalArray>,
    backend: &dyn NumericBackend,
) -> Result<Vec<LogicalArray>> {
    let [a, b] = exactly_two(Operation::Multiply, ArrayKind::Matrices, arrays)?;

    if a.shape() != b.shape() {
        return Err(ShapeError::Operands {
            op: Operation::Multiply,
            kind: ArrayKind::Matrices,
            left: a.shape(),
            right: b.shape(),
        }
        .into());
    }
    if let Shape::Matrix { rows, cols } = a.shape() {
        if rows != cols {
            return Err(ShapeError::NotSquare { rows, cols }.into());
        }
    }

    Ok(vec![backend.matmul(&a, &b)?])
}

/// Reversal of exactly one vector.
fn flip(
    kind: ArrayKind,
    arrays: Vec<LogicalArray>,
    backend: &dyn NumericBackend,
) -> Result<Vec<LogicalArray>> {
    let found = arrays.len();
    let [a]: [LogicalArray; 1] = arrays.try_into().map_err(|_| Error::OperandCount {
        op: Operation::Flip,
        kind,
        expected: 1,
        found,
    })?;
    Ok(vec![backend.flip(&a)?])
}

fn exactly_two(
    op: Operation,
    kind: ArrayKind,
    arrays: Vec<LogicalArray>,
) -> Result<[LogicalArray; 2]> {
    let found = arrays.len();
    arrays.try_into().map_err(|_| Error::OperandCount {
        op,
        kind,
        expected: 2,
        found,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::backend::DenseBackend;

    fn vector(values: &[f64]) -> LogicalArray {
        LogicalArray::from_f64(Shape::Vector(values.len()), values).unwrap()
    }

    fn matrix2(values: &[f64; 4]) -> LogicalArray {
        LogicalArray::from_f64(Shape::Matrix { rows: 2, cols: 2 }, values).unwrap()
    }

    #[test]
    fn vector_add_scenario() {
        let results = dispatch(
            Operation::Add,
            ArrayKind::Vectors,
            vec![vector(&[1.0, 2.0, 3.0, 4.0]), vector(&[5.0, 4.0, 2.0, 0.0])],
            &DenseBackend,
        )
        .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].to_f64().unwrap(), [6.0, 6.0, 5.0, 4.0]);
    }

    #[test]
    fn vector_dot_scenario() {
        let results = dispatch(
            Operation::Multiply,
            ArrayKind::Vectors,
            vec![vector(&[1.0, 2.0, 3.0, 4.0]), vector(&[5.0, 4.0, 2.0, 0.0])],
            &DenseBackend,
        )
        .unwrap();
        assert_eq!(results[0].to_f64().unwrap(), [19.0]);
    }

    #[test]
    fn matrix_add_scenario() {
        let results = dispatch(
            Operation::Add,
            ArrayKind::Matrices,
            vec![
                matrix2(&[1.0, 2.0, 3.0, 4.0]),
                matrix2(&[5.0, 4.0, 2.0, 0.0]),
            ],
            &DenseBackend,
        )
        .unwrap();
        assert_eq!(results[0].to_f64().unwrap(), [6.0, 6.0, 5.0, 4.0]);
    }

    #[test]
    fn matrix_multiply_scenario() {
        let results = dispatch(
            Operation::Multiply,
            ArrayKind::Matrices,
            vec![
                matrix2(&[1.0, 2.0, 3.0, 4.0]),
                matrix2(&[5.0, 4.0, 2.0, 0.0]),
            ],
            &DenseBackend,
        )
        .unwrap();
        assert_eq!(results[0].to_f64().unwrap(), [9.0, 4.0, 23.0, 12.0]);
    }

    #[test]
    fn add_folds_more_than_two_operands() {
        let results = dispatch(
            Operation::Add,
            ArrayKind::Vectors,
            vec![vector(&[1.0]), vector(&[2.0]), vector(&[3.0])],
            &DenseBackend,
        )
        .unwrap();
        assert_eq!(results[0].to_f64().unwrap(), [6.0]);
    }

    #[test]
    fn add_requires_at_least_one_operand() {
        let err = dispatch(Operation::Add, ArrayKind::Vectors, vec![], &DenseBackend).unwrap_err();
        assert_eq!(
            err,
            Error::OperandCount {
                op: Operation::Add,
                kind: ArrayKind::Vectors,
                expected: 1,
                found: 0,
            }
        );
    }

    #[test]
    fn add_rejects_mismatched_shapes() {
        let err = dispatch(
            Operation::Add,
            ArrayKind::Vectors,
            vec![vector(&[1.0, 2.0]), vector(&[1.0])],
            &DenseBackend,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Shape(ShapeError::Operands { .. })));
    }

    #[test]
    fn multiply_requires_exactly_two_operands() {
        let err = dispatch(
            Operation::Multiply,
            ArrayKind::Vectors,
            vec![vector(&[1.0]), vector(&[2.0]), vector(&[3.0])],
            &DenseBackend,
        )
        .unwrap_err();
        assert_eq!(
            err,
            Error::OperandCount {
                op: Operation::Multiply,
                kind: ArrayKind::Vectors,
                expected: 2,
                found: 3,
            }
        );
    }

    #[test]
    fn multiply_rejects_unequal_vector_lengths() {
        let err = dispatch(
            Operation::Multiply,
            ArrayKind::Vectors,
            vec![vector(&[1.0, 2.0]), vector(&[1.0, 2.0, 3.0])],
            &DenseBackend,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Shape(ShapeError::Operands { .. })));
    }

    #[test]
    fn multiply_rejects_non_square_matrices() {
        let rect = LogicalArray::from_f64(
            Shape::Matrix { rows: 2, cols: 3 },
            &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
        )
        .unwrap();
        let err = dispatch(
            Operation::Multiply,
            ArrayKind::Matrices,
            vec![rect.clone(), rect],
            &DenseBackend,
        )
        .unwrap_err();
        assert_eq!(
            err,
            Error::Shape(ShapeError::NotSquare { rows: 2, cols: 3 })
        );
    }

    #[test]
    fn flip_requires_exactly_one_operand() {
        let err = dispatch(
            Operation::Flip,
            ArrayKind::Vectors,
            vec![vector(&[1.0]), vector(&[2.0])],
            &DenseBackend,
        )
        .unwrap_err();
        assert!(matches!(err, Error::OperandCount { .. }));
    }
}
