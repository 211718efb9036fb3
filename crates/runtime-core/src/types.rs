//! Core type definitions for the segment and checkpoint manager

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

/// Logical iteration counter value
pub type Iteration = u64;

/// Per-segment resize generation
pub type Generation = u64;

/// Checkpoint durability level, a hint interpreted by the storage backend
pub type Level = u8;

/// Lowest checkpoint level accepted by the coordinator
pub const MIN_LEVEL: Level = 1;

/// Highest checkpoint level accepted by the coordinator
pub const MAX_LEVEL: Level = 4;

/// Format version of the serialized checkpoint bundle
pub const BUNDLE_FORMAT_VERSION: u32 = 1;

/// Element type of a segment or parameter
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ValueType {
    /// 4 byte signed integer
    Int32,

    /// 8 byte signed integer
    Int64,

    /// 4 byte floating point
    Float32,

    /// 8 byte floating point
    Float64,
}

impl ValueType {
    /// Byte size of a single element
    pub fn size_of(self) -> usize {
        match self {
            ValueType::Int32 | ValueType::Float32 => 4,
            ValueType::Int64 | ValueType::Float64 => 8,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueType::Int32 => "int32",
            ValueType::Int64 => "int64",
            ValueType::Float32 => "float32",
            ValueType::Float64 => "float64",
        };
        f.write_str(name)
    }
}

/// Shape class of a segment
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ShapeKind {
    /// Single value, no dimensions
    Scalar,

    /// 1 dimensional array
    Vector,

    /// 2 dimensional matrix
    Matrix,

    /// N dimensional tensor, rank >= 1
    Tensor,
}

impl ShapeKind {
    /// Whether a dimension list of the given rank is valid for this shape
    pub fn accepts_rank(self, rank: usize) -> bool {
        match self {
            ShapeKind::Scalar => rank == 0,
            ShapeKind::Vector => rank == 1,
            ShapeKind::Matrix => rank == 2,
            ShapeKind::Tensor => rank >= 1,
        }
    }

    /// Human-readable description of the expected rank
    pub fn expected_rank(self) -> &'static str {
        match self {
            ShapeKind::Scalar => "no dimensions",
            ShapeKind::Vector => "exactly 1 dimension",
            ShapeKind::Matrix => "exactly 2 dimensions",
            ShapeKind::Tensor => "at least 1 dimension",
        }
    }
}

impl fmt::Display for ShapeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ShapeKind::Scalar => "scalar",
            ShapeKind::Vector => "vector",
            ShapeKind::Matrix => "matrix",
            ShapeKind::Tensor => "tensor",
        };
        f.write_str(name)
    }
}

/// Metadata describing one registered segment
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SegmentMeta {
    /// Unique segment name, process-wide
    pub name: String,

    /// Element type
    pub value_type: ValueType,

    /// Shape class
    pub shape_kind: ShapeKind,

    /// Size of each dimension; empty for scalars
    pub dims: Vec<usize>,

    /// Incremented on every resize/retype
    pub generation: Generation,
}

impl SegmentMeta {
    /// Validate and build metadata at generation 0
    pub fn new(
        name: &str,
        value_type: ValueType,
        shape_kind: ShapeKind,
        dims: &[usize],
    ) -> Result<Self> {
        if !shape_kind.accepts_rank(dims.len()) {
            return Err(Error::InvalidShape {
                segment: name.to_string(),
                message: format!(
                    "{} expects {}, got {}",
                    shape_kind,
                    shape_kind.expected_rank(),
                    dims.len()
                ),
            });
        }

        if dims.iter().any(|&d| d == 0) {
            return Err(Error::InvalidShape {
                segment: name.to_string(),
                message: "dimensions must be positive".to_string(),
            });
        }

        let meta = Self {
            name: name.to_string(),
            value_type,
            shape_kind,
            dims: dims.to_vec(),
            generation: 0,
        };

        // reject element counts that overflow a byte length
        if meta.checked_byte_len().is_none() {
            return Err(Error::InvalidShape {
                segment: name.to_string(),
                message: "dimensions overflow addressable size".to_string(),
            });
        }

        Ok(meta)
    }

    /// Number of elements; 1 for scalars
    pub fn element_count(&self) -> usize {
        self.dims.iter().product()
    }

    /// Total byte size of the segment buffer
    pub fn byte_len(&self) -> usize {
        self.element_count() * self.value_type.size_of()
    }

    fn checked_byte_len(&self) -> Option<usize> {
        self.dims
            .iter()
            .try_fold(1usize, |acc, &d| acc.checked_mul(d))
            .and_then(|count| count.checked_mul(self.value_type.size_of()))
    }

    /// Row-major byte stride for each dimension
    pub fn strides(&self) -> Vec<usize> {
        let esize = self.value_type.size_of();
        (0..self.dims.len())
            .map(|i| self.dims[i + 1..].iter().product::<usize>() * esize)
            .collect()
    }
}

/// One segment as captured in a checkpoint: metadata plus raw bytes
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SegmentRecord {
    /// Segment name
    pub name: String,

    /// Element type at checkpoint time
    pub value_type: ValueType,

    /// Shape class at checkpoint time
    pub shape_kind: ShapeKind,

    /// Dimensions at checkpoint time
    pub dims: Vec<usize>,

    /// Resize generation at checkpoint time
    pub generation: Generation,

    /// Little-endian element bytes
    pub bytes: Vec<u8>,
}

impl SegmentRecord {
    /// Rebuild the segment metadata this record describes
    pub fn meta(&self) -> Result<SegmentMeta> {
        let mut meta =
            SegmentMeta::new(&self.name, self.value_type, self.shape_kind, &self.dims)?;
        meta.generation = self.generation;
        Ok(meta)
    }

    /// Check that the payload agrees with the record's own metadata
    pub fn validate(&self) -> Result<()> {
        let meta = self.meta()?;
        if self.bytes.len() != meta.byte_len() {
            return Err(Error::ShapeMismatch {
                segment: self.name.clone(),
                message: format!(
                    "record describes {} bytes but carries {}",
                    meta.byte_len(),
                    self.bytes.len()
                ),
            });
        }
        Ok(())
    }
}

/// Scalar parameter value
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum ParamValue {
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
}

impl ParamValue {
    /// Element type tag of this value
    pub fn value_type(&self) -> ValueType {
        match self {
            ParamValue::Int32(_) => ValueType::Int32,
            ParamValue::Int64(_) => ValueType::Int64,
            ParamValue::Float32(_) => ValueType::Float32,
            ParamValue::Float64(_) => ValueType::Float64,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            ParamValue::Int32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ParamValue::Int64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match self {
            ParamValue::Float32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Float64(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<i32> for ParamValue {
    fn from(v: i32) -> Self {
        ParamValue::Int32(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int64(v)
    }
}

impl From<f32> for ParamValue {
    fn from(v: f32) -> Self {
        ParamValue::Float32(v)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float64(v)
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Int32(v) => write!(f, "{}", v),
            ParamValue::Int64(v) => write!(f, "{}", v),
            ParamValue::Float32(v) => write!(f, "{}", v),
            ParamValue::Float64(v) => write!(f, "{}", v),
        }
    }
}

/// A complete checkpoint snapshot; immutable once written
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointBundle {
    /// Serialized format version
    pub format_version: u32,

    /// Iteration counter value at snapshot time
    pub iteration: Iteration,

    /// Durability level requested for this checkpoint
    pub level: Level,

    /// Rank that produced this bundle
    pub rank: usize,

    /// Timestamp when the bundle was assembled
    pub created_at: DateTime<Utc>,

    /// Every registered segment, metadata plus bytes
    pub segments: Vec<SegmentRecord>,

    /// Every registered parameter
    pub params: Vec<(String, ParamValue)>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_kind_ranks() {
        assert!(ShapeKind::Scalar.accepts_rank(0));
        assert!(!ShapeKind::Scalar.accepts_rank(1));
        assert!(ShapeKind::Vector.accepts_rank(1));
        assert!(ShapeKind::Matrix.accepts_rank(2));
        assert!(!ShapeKind::Matrix.accepts_rank(3));
        assert!(ShapeKind::Tensor.accepts_rank(1));
        assert!(ShapeKind::Tensor.accepts_rank(5));
        assert!(!ShapeKind::Tensor.accepts_rank(0));
    }

    #[test]
    fn test_meta_validation() {
        let meta = SegmentMeta::new("m", ValueType::Float64, ShapeKind::Matrix, &[3, 4]).unwrap();
        assert_eq!(meta.element_count(), 12);
        assert_eq!(meta.byte_len(), 96);

        let err = SegmentMeta::new("m", ValueType::Float64, ShapeKind::Matrix, &[3]).unwrap_err();
        assert!(matches!(err, Error::InvalidShape { .. }));

        let err = SegmentMeta::new("m", ValueType::Int32, ShapeKind::Vector, &[0]).unwrap_err();
        assert!(matches!(err, Error::InvalidShape { .. }));
    }

    #[test]
    fn test_scalar_meta() {
        let meta = SegmentMeta::new("s", ValueType::Int64, ShapeKind::Scalar, &[]).unwrap();
        assert_eq!(meta.element_count(), 1);
        assert_eq!(meta.byte_len(), 8);
        assert!(meta.strides().is_empty());
    }

    #[test]
    fn test_strides_row_major() {
        let meta =
            SegmentMeta::new("t", ValueType::Float32, ShapeKind::Tensor, &[2, 3, 4]).unwrap();
        assert_eq!(meta.strides(), vec![48, 16, 4]);
    }

    #[test]
    fn test_record_validation() {
        let record = SegmentRecord {
            name: "v".to_string(),
            value_type: ValueType::Int32,
            shape_kind: ShapeKind::Vector,
            dims: vec![4],
            generation: 0,
            bytes: vec![0; 16],
        };
        record.validate().unwrap();

        let short = SegmentRecord {
            bytes: vec![0; 8],
            ..record
        };
        assert!(matches!(
            short.validate(),
            Err(Error::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_param_value_conversions() {
        let p: ParamValue = 100i32.into();
        assert_eq!(p.as_i32(), Some(100));
        assert_eq!(p.as_f64(), None);
        assert_eq!(p.value_type(), ValueType::Int32);

        let p: ParamValue = 0.5f64.into();
        assert_eq!(p.as_f64(), Some(0.5));
    }
}
