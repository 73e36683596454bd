//! Array data model shared by both sides of the wire.
//!
//! A call transmits one or more [`LogicalArray`]s: dense vectors or matrices
//! with a fixed element type and a contiguous, row-major element buffer. The
//! wire carries each array as a sequence of chunk messages (`proto::Vector`
//! or `proto::Matrix`), unified here behind the [`ChunkMessage`] trait so
//! planning and reassembly are written once for both kinds.
//!
//! Element buffers are packed little-endian. The original wire peers all ran
//! on little-endian hosts and serialized in native order; pinning the layout
//! keeps the contract portable.

use crate::common::error::{Error, Result, ShapeError};
use crate::common::proto;
use bytes::Bytes;
use core::fmt;

/// Element representation shared by every array in one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DType {
    /// 32-bit signed integer.
    Int32,
    /// 64-bit IEEE-754 float.
    Float64,
}

impl DType {
    /// Width of one element in bytes.
    pub const fn width(self) -> usize {
        match self {
            Self::Int32 => core::mem::size_of::<i32>(),
            Self::Float64 => core::mem::size_of::<f64>(),
        }
    }

    /// The widest element this protocol can carry. Used to validate chunk
    /// byte budgets at startup.
    pub const MAX_WIDTH: usize = core::mem::size_of::<f64>();

    /// Decodes the wire enum tag carried by every chunk message.
    pub fn from_tag(tag: i32) -> Result<Self> {
        match proto::DataType::try_from(tag) {
            Ok(proto::DataType::Integer) => Ok(Self::Int32),
            Ok(proto::DataType::Double) => Ok(Self::Float64),
            Err(_) => Err(Error::Protocol {
                detail: format!("unknown element type tag {tag}"),
            }),
        }
    }

    /// The wire enum tag for this element type.
    pub fn tag(self) -> i32 {
        match self {
            Self::Int32 => proto::DataType::Integer as i32,
            Self::Float64 => proto::DataType::Double as i32,
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int32 => f.write_str("int32"),
            Self::Float64 => f.write_str("float64"),
        }
    }
}

/// Declared dimensions of one logical array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// A flat vector of `len` elements.
    Vector(usize),
    /// A `rows` x `cols` matrix, stored row-major.
    Matrix { rows: usize, cols: usize },
}

impl Shape {
    /// Total number of elements the shape describes.
    pub const fn element_count(&self) -> usize {
        match self {
            Self::Vector(len) => *len,
            Self::Matrix { rows, cols } => *rows * *cols,
        }
    }

    /// Which message kind carries arrays of this shape.
    pub const fn kind(&self) -> ArrayKind {
        match self {
            Self::Vector(_) => ArrayKind::Vectors,
            Self::Matrix { .. } => ArrayKind::Matrices,
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Vector(len) => write!(f, "vector[{len}]"),
            Self::Matrix { rows, cols } => write!(f, "matrix[{rows}x{cols}]"),
        }
    }
}

/// The two families of logical arrays a call can carry.
///
/// Carries the header key spelling for the metadata map: the array count
/// lives under `full-vectors`/`full-matrices`, and the per-array chunk
/// counts under `vecN-messages`/`matN-messages` (1-based `N`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayKind {
    Vectors,
    Matrices,
}

impl ArrayKind {
    /// Header key declaring the number of logical arrays in the call.
    pub const fn full_key(self) -> &'static str {
        match self {
            Self::Vectors => "full-vectors",
            Self::Matrices => "full-matrices",
        }
    }

    /// Prefix of the per-array chunk count keys.
    pub const fn abbrev(self) -> &'static str {
        match self {
            Self::Vectors => "vec",
            Self::Matrices => "mat",
        }
    }

    /// Header key declaring the chunk count of the `index`-th (0-based)
    /// array.
    pub fn messages_key(self, index: usize) -> String {
        format!("{}{}-messages", self.abbrev(), index + 1)
    }
}

impl fmt::Display for ArrayKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Vectors => f.write_str("vectors"),
            Self::Matrices => f.write_str("matrices"),
        }
    }
}

/// The operation a call requests over its reassembled arrays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Elementwise sum of all operands.
    Add,
    /// Dot product (vectors) or matrix product (matrices).
    Multiply,
    /// Reversal of a single vector.
    Flip,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Add => f.write_str("add"),
            Self::Multiply => f.write_str("multiply"),
            Self::Flip => f.write_str("flip"),
        }
    }
}

/// One fully materialized vector or matrix.
///
/// The element buffer is contiguous, row-major, and packed little-endian.
/// Construction enforces that the buffer length matches the shape's element
/// count times the element width.
#[derive(Debug, Clone, PartialEq)]
pub struct LogicalArray {
    dtype: DType,
    shape: Shape,
    data: Bytes,
}

impl LogicalArray {
    pub fn new(dtype: DType, shape: Shape, data: Bytes) -> Result<Self> {
        if data.len() != shape.element_count() * dtype.width() {
            return Err(ShapeError::Buffer {
                declared: shape,
                observed_elements: data.len() / dtype.width(),
            }
            .into());
        }
        Ok(Self { dtype, shape, data })
    }

    /// Packs an `f64` slice into a new array of the given shape.
    pub fn from_f64(shape: Shape, values: &[f64]) -> Result<Self> {
        let mut data = Vec::with_capacity(values.len() * DType::Float64.width());
        for v in values {
            data.extend_from_slice(&v.to_le_bytes());
        }
        Self::new(DType::Float64, shape, data.into())
    }

    /// Packs an `i32` slice into a new array of the given shape.
    pub fn from_i32(shape: Shape, values: &[i32]) -> Result<Self> {
        let mut data = Vec::with_capacity(values.len() * DType::Int32.width());
        for v in values {
            data.extend_from_slice(&v.to_le_bytes());
        }
        Self::new(DType::Int32, shape, data.into())
    }

    pub const fn dtype(&self) -> DType {
        self.dtype
    }

    pub const fn shape(&self) -> Shape {
        self.shape
    }

    pub const fn data(&self) -> &Bytes {
        &self.data
    }

    pub const fn element_count(&self) -> usize {
        self.shape.element_count()
    }

    /// Decodes the buffer as `f64` elements. `None` if the array holds a
    /// different element type.
    pub fn to_f64(&self) -> Option<Vec<f64>> {
        if self.dtype != DType::Float64 {
            return None;
        }
        Some(
            self.data
                .chunks_exact(DType::Float64.width())
                .map(|b| f64::from_le_bytes(b.try_into().expect("chunk width")))
                .collect(),
        )
    }

    /// Decodes the buffer as `i32` elements. `None` if the array holds a
    /// different element type.
    pub fn to_i32(&self) -> Option<Vec<i32>> {
        if self.dtype != DType::Int32 {
            return None;
        }
        Some(
            self.data
                .chunks_exact(DType::Int32.width())
                .map(|b| i32::from_le_bytes(b.try_into().expect("chunk width")))
                .collect(),
        )
    }
}

/// Uniform view over the two chunk message kinds.
///
/// `proto::Vector` and `proto::Matrix` differ only in how they spell their
/// shape fields; planning, reassembly, and response streaming are written
/// once against this trait.
pub trait ChunkMessage: Send + 'static {
    /// The array family this message kind carries.
    const KIND: ArrayKind;

    /// The element type tag carried by every chunk.
    fn dtype(&self) -> Result<DType>;

    /// The declared shape of the full array. Only trusted on an array's
    /// first chunk.
    fn declared_shape(&self) -> Shape;

    /// The raw payload bytes of this chunk.
    fn into_payload(self) -> Bytes;

    /// Builds an outbound chunk carrying `payload`, tagged with the array's
    /// element type and full declared shape.
    fn from_parts(dtype: DType, shape: Shape, payload: Bytes) -> Self;
}

impl ChunkMessage for proto::Vector {
    const KIND: ArrayKind = ArrayKind::Vectors;

    fn dtype(&self) -> Result<DType> {
        DType::from_tag(self.data_type)
    }

    fn declared_shape(&self) -> Shape {
        Shape::Vector(self.vector_size as usize)
    }

    fn into_payload(self) -> Bytes {
        self.vector_as_chunk
    }

    fn from_parts(dtype: DType, shape: Shape, payload: Bytes) -> Self {
        Self {
            data_type: dtype.tag(),
            vector_size: shape.element_count() as u32,
            vector_as_chunk: payload,
        }
    }
}

impl ChunkMessage for proto::Matrix {
    const KIND: ArrayKind = ArrayKind::Matrices;

    fn dtype(&self) -> Result<DType> {
        DType::from_tag(self.data_type)
    }

    fn declared_shape(&self) -> Shape {
        Shape::Matrix {
            rows: self.matrix_rows as usize,
            cols: self.matrix_cols as usize,
        }
    }

    fn into_payload(self) -> Bytes {
        self.matrix_as_chunk
    }

    fn from_parts(dtype: DType, shape: Shape, payload: Bytes) -> Self {
        let (rows, cols) = match shape {
            Shape::Matrix { rows, cols } => (rows, cols),
            // A vector rendered as a matrix chunk is a single row.
            Shape::Vector(len) => (1, len),
        };
        Self {
            data_type: dtype.tag(),
            matrix_rows: rows as u32,
            matrix_cols: cols as u32,
            matrix_as_chunk: payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_length_must_match_shape() {
        let err = LogicalArray::from_f64(Shape::Vector(3), &[1.0, 2.0]).unwrap_err();
        assert_eq!(
            err,
            Error::Shape(ShapeError::Buffer {
                declared: Shape::Vector(3),
                observed_elements: 2,
            })
        );
    }

    #[test]
    fn f64_round_trips_through_buffer() {
        let values = [1.5, -2.0, 3.25];
        let array = LogicalArray::from_f64(Shape::Vector(3), &values).unwrap();
        assert_eq!(array.to_f64().unwrap(), values);
        assert_eq!(array.to_i32(), None);
    }

    #[test]
    fn i32_round_trips_through_buffer() {
        let values = [1, -2, i32::MAX, i32::MIN];
        let array = LogicalArray::from_i32(Shape::Matrix { rows: 2, cols: 2 }, &values).unwrap();
        assert_eq!(array.to_i32().unwrap(), values);
        assert_eq!(array.element_count(), 4);
    }

    #[test]
    fn unknown_dtype_tag_is_a_protocol_violation() {
        assert!(matches!(
            DType::from_tag(7),
            Err(Error::Protocol { .. })
        ));
        assert_eq!(DType::from_tag(0).unwrap(), DType::Int32);
        assert_eq!(DType::from_tag(1).unwrap(), DType::Float64);
    }

    #[test]
    fn header_keys_are_one_based() {
        assert_eq!(ArrayKind::Vectors.messages_key(0), "vec1-messages");
        assert_eq!(ArrayKind::Matrices.messages_key(2), "mat3-messages");
    }
}
