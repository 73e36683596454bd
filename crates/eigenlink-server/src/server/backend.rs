//! Numeric backend for reassembled arrays.
//!
//! The dispatcher validates operand counts and shapes before anything here
//! runs, so the backend treats its inputs as well-formed and exposes pure
//! functions over typed, shaped buffers. Shape guards remain as a last line
//! of defense and surface as [`Error::Computation`], the generic backend
//! failure of the protocol.
//!
//! [`DenseBackend`] is the default implementation, delegating the arithmetic
//! to [`ndarray`].

use eigenlink_core::{DType, Error, LogicalArray, Result, Shape};
use ndarray::{Array1, Array2, LinalgScalar};

/// Pure arithmetic over typed, shaped element buffers.
pub trait NumericBackend: Send + Sync {
    /// Elementwise sum of two arrays of identical shape.
    fn add(&self, a: &LogicalArray, b: &LogicalArray) -> Result<LogicalArray>;

    /// Dot product of two equal-length vectors, as a 1-element vector.
    fn dot(&self, a: &LogicalArray, b: &LogicalArray) -> Result<LogicalArray>;

    /// Product of two matrices with matching inner dimensions.
    fn matmul(&self, a: &LogicalArray, b: &LogicalArray) -> Result<LogicalArray>;

    /// A vector with the element order reversed.
    fn flip(&self, a: &LogicalArray) -> Result<LogicalArray>;
}

/// `ndarray`-backed dense arithmetic.
#[derive(Debug, Clone, Copy, Default)]
pub struct DenseBackend;

impl NumericBackend for DenseBackend {
    fn add(&self, a: &LogicalArray, b: &LogicalArray) -> Result<LogicalArray> {
        match a.dtype() {
            DType::Float64 => add_t::<f64>(a, b),
            DType::Int32 => add_t::<i32>(a, b),
        }
    }

    fn dot(&self, a: &LogicalArray, b: &LogicalArray) -> Result<LogicalArray> {
        match a.dtype() {
            DType::Float64 => dot_t::<f64>(a, b),
            DType::Int32 => dot_t::<i32>(a, b),
        }
    }

    fn matmul(&self, a: &LogicalArray, b: &LogicalArray) -> Result<LogicalArray> {
        match a.dtype() {
            DType::Float64 => matmul_t::<f64>(a, b),
            DType::Int32 => matmul_t::<i32>(a, b),
        }
    }

    fn flip(&self, a: &LogicalArray) -> Result<LogicalArray> {
        match a.dtype() {
            DType::Float64 => flip_t::<f64>(a),
            DType::Int32 => flip_t::<i32>(a),
        }
    }
}

/// Fixed-width element codec tying a Rust scalar to its wire type.
trait Element: LinalgScalar {
    const DTYPE: DType;
    fn from_le_slice(bytes: &[u8]) -> Self;
    fn push_le(self, out: &mut Vec<u8>);
}

impl Element for f64 {
    const DTYPE: DType = DType::Float64;

    fn from_le_slice(bytes: &[u8]) -> Self {
        let mut buf = [0u8; size_of::<f64>()];
        buf.copy_from_slice(bytes);
        Self::from_le_bytes(buf)
    }

    fn push_le(self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_le_bytes());
    }
}

impl Element for i32 {
    const DTYPE: DType = DType::Int32;

    fn from_le_slice(bytes: &[u8]) -> Self {
        let mut buf = [0u8; size_of::<i32>()];
        buf.copy_from_slice(bytes);
        Self::from_le_bytes(buf)
    }

    fn push_le(self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_le_bytes());
    }
}

fn decode<T: Element>(array: &LogicalArray) -> Result<Vec<T>> {
    if array.dtype() != T::DTYPE {
        return Err(Error::Computation {
            detail: format!(
                "backend asked to decode {} buffer as {}",
                array.dtype(),
                T::DTYPE
            ),
        });
    }
    Ok(array
        .data()
        .chunks_exact(T::DTYPE.width())
        .map(T::from_le_slice)
        .collect())
}

fn encode<T: Element>(shape: Shape, values: impl IntoIterator<Item = T>) -> Result<LogicalArray> {
    let mut data = Vec::with_capacity(shape.element_count() * T::DTYPE.width());
    for value in values {
        value.push_le(&mut data);
    }
    LogicalArray::new(T::DTYPE, shape, data.into())
}

fn add_t<T: Element>(a: &LogicalArray, b: &LogicalArray) -> Result<LogicalArray> {
    if a.shape() != b.shape() || a.dtype() != b.dtype() {
        return Err(incompatible("add", a, b));
    }
    let x = Array1::from_vec(decode::<T>(a)?);
    let y = Array1::from_vec(decode::<T>(b)?);
    // Elementwise, so the flattened buffers can be summed whatever the
    // shape.
    let sum = &x + &y;
    encode(a.shape(), sum.iter().copied())
}

fn dot_t<T: Element>(a: &LogicalArray, b: &LogicalArray) -> Result<LogicalArray> {
    match (a.shape(), b.shape()) {
        (Shape::Vector(n), Shape::Vector(m)) if n == m => {}
        _ => return Err(incompatible("dot", a, b)),
    }
    let x = Array1::from_vec(decode::<T>(a)?);
    let y = Array1::from_vec(decode::<T>(b)?);
    encode(Shape::Vector(1), [x.dot(&y)])
}

fn matmul_t<T: Element>(a: &LogicalArray, b: &LogicalArray) -> Result<LogicalArray> {
    let ((rows_a, cols_a), (rows_b, cols_b)) = match (a.shape(), b.shape()) {
        (
            Shape::Matrix {
                rows: rows_a,
                cols: cols_a,
            },
            Shape::Matrix {
                rows: rows_b,
                cols: cols_b,
            },
        ) if cols_a == rows_b => ((rows_a, cols_a), (rows_b, cols_b)),
        _ => return Err(incompatible("matmul", a, b)),
    };

    let x = Array2::from_shape_vec((rows_a, cols_a), decode::<T>(a)?)
        .map_err(|e| shape_fault("matmul", e))?;
    let y = Array2::from_shape_vec((rows_b, cols_b), decode::<T>(b)?)
        .map_err(|e| shape_fault("matmul", e))?;
    let product = x.dot(&y);
    encode(
        Shape::Matrix {
            rows: rows_a,
            cols: cols_b,
        },
        product.iter().copied(),
    )
}

fn flip_t<T: Element>(a: &LogicalArray) -> Result<LogicalArray> {
    let mut values = decode::<T>(a)?;
    values.reverse();
    encode(a.shape(), values)
}

fn incompatible(op: &str, a: &LogicalArray, b: &LogicalArray) -> Error {
    Error::Computation {
        detail: format!(
            "backend {op} over unvalidated operands {} {} and {} {}",
            a.dtype(),
            a.shape(),
            b.dtype(),
            b.shape()
        ),
    }
}

fn shape_fault(op: &str, err: ndarray::ShapeError) -> Error {
    Error::Computation {
        detail: format!("backend {op} buffer layout: {err}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vector(values: &[f64]) -> LogicalArray {
        LogicalArray::from_f64(Shape::Vector(values.len()), values).unwrap()
    }

    fn matrix2(values: &[f64; 4]) -> LogicalArray {
        LogicalArray::from_f64(Shape::Matrix { rows: 2, cols: 2 }, values).unwrap()
    }

    #[test]
    fn adds_vectors_elementwise() {
        let result = DenseBackend
            .add(&vector(&[1.0, 2.0, 3.0, 4.0]), &vector(&[5.0, 4.0, 2.0, 0.0]))
            .unwrap();
        assert_eq!(result.to_f64().unwrap(), [6.0, 6.0, 5.0, 4.0]);
    }

    #[test]
    fn dot_product_yields_one_element_vector() {
        let result = DenseBackend
            .dot(&vector(&[1.0, 2.0, 3.0, 4.0]), &vector(&[5.0, 4.0, 2.0, 0.0]))
            .unwrap();
        assert_eq!(result.shape(), Shape::Vector(1));
        assert_eq!(result.to_f64().unwrap(), [19.0]);
    }

    #[test]
    fn adds_matrices_elementwise() {
        let result = DenseBackend
            .add(
                &matrix2(&[1.0, 2.0, 3.0, 4.0]),
                &matrix2(&[5.0, 4.0, 2.0, 0.0]),
            )
            .unwrap();
        assert_eq!(result.to_f64().unwrap(), [6.0, 6.0, 5.0, 4.0]);
    }

    #[test]
    fn multiplies_matrices_row_major() {
        let result = DenseBackend
            .matmul(
                &matrix2(&[1.0, 2.0, 3.0, 4.0]),
                &matrix2(&[5.0, 4.0, 2.0, 0.0]),
            )
            .unwrap();
        assert_eq!(result.shape(), Shape::Matrix { rows: 2, cols: 2 });
        assert_eq!(result.to_f64().unwrap(), [9.0, 4.0, 23.0, 12.0]);
    }

    #[test]
    fn integer_arithmetic_matches() {
        let a = LogicalArray::from_i32(Shape::Vector(3), &[1, 2, 3]).unwrap();
        let b = LogicalArray::from_i32(Shape::Vector(3), &[10, 20, 30]).unwrap();
        assert_eq!(
            DenseBackend.add(&a, &b).unwrap().to_i32().unwrap(),
            [11, 22, 33]
        );
        assert_eq!(DenseBackend.dot(&a, &b).unwrap().to_i32().unwrap(), [140]);
    }

    #[test]
    fn flips_a_vector() {
        let result = DenseBackend.flip(&vector(&[1.0, 2.0, 3.0])).unwrap();
        assert_eq!(result.to_f64().unwrap(), [3.0, 2.0, 1.0]);
    }

    #[test]
    fn mismatched_operands_surface_as_computation_failures() {
        let err = DenseBackend
            .add(&vector(&[1.0]), &vector(&[1.0, 2.0]))
            .unwrap_err();
        assert!(matches!(err, Error::Computation { .. }));
    }
}
