//! Typed storage for segment buffers
//!
//! A segment's bytes live in a [`TypedBuffer`], a tagged union over the
//! four supported element types. The [`Element`] trait is the typed seam:
//! it binds each Rust scalar to its `ValueType` tag and gives slice access
//! into the matching buffer variant, so callers work with `&[T]` / `&mut [T]`
//! while serialization sites match exhaustively on the tag.

use runtime_core::{Error, Result, ValueType};

mod sealed {
    pub trait Sealed {}
    impl Sealed for i32 {}
    impl Sealed for i64 {}
    impl Sealed for f32 {}
    impl Sealed for f64 {}
}

/// Scalar types a segment can hold
///
/// Implemented by exactly `i32`, `i64`, `f32` and `f64`; the trait is
/// sealed so the set of element types stays closed.
pub trait Element:
    sealed::Sealed + Copy + Default + PartialEq + Send + Sync + 'static
{
    /// Tag corresponding to this element type
    const VALUE_TYPE: ValueType;

    /// Borrow the buffer as a typed slice, if the variant matches
    fn slice(buffer: &TypedBuffer) -> Option<&[Self]>;

    /// Borrow the buffer as a mutable typed slice, if the variant matches
    fn slice_mut(buffer: &mut TypedBuffer) -> Option<&mut [Self]>;
}

macro_rules! impl_element {
    ($ty:ty, $tag:ident) => {
        impl Element for $ty {
            const VALUE_TYPE: ValueType = ValueType::$tag;

            fn slice(buffer: &TypedBuffer) -> Option<&[Self]> {
                match buffer {
                    TypedBuffer::$tag(v) => Some(v),
                    _ => None,
                }
            }

            fn slice_mut(buffer: &mut TypedBuffer) -> Option<&mut [Self]> {
                match buffer {
                    TypedBuffer::$tag(v) => Some(v),
                    _ => None,
                }
            }
        }
    };
}

impl_element!(i32, Int32);
impl_element!(i64, Int64);
impl_element!(f32, Float32);
impl_element!(f64, Float64);

/// Contiguous element storage for one segment
#[derive(Debug, Clone, PartialEq)]
pub enum TypedBuffer {
    Int32(Vec<i32>),
    Int64(Vec<i64>),
    Float32(Vec<f32>),
    Float64(Vec<f64>),
}

impl TypedBuffer {
    /// Allocate a zero-initialized buffer of `len` elements
    pub fn zeroed(value_type: ValueType, len: usize) -> Self {
        match value_type {
            ValueType::Int32 => TypedBuffer::Int32(vec![0; len]),
            ValueType::Int64 => TypedBuffer::Int64(vec![0; len]),
            ValueType::Float32 => TypedBuffer::Float32(vec![0.0; len]),
            ValueType::Float64 => TypedBuffer::Float64(vec![0.0; len]),
        }
    }

    /// Tag of the stored element type
    pub fn value_type(&self) -> ValueType {
        match self {
            TypedBuffer::Int32(_) => ValueType::Int32,
            TypedBuffer::Int64(_) => ValueType::Int64,
            TypedBuffer::Float32(_) => ValueType::Float32,
            TypedBuffer::Float64(_) => ValueType::Float64,
        }
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        match self {
            TypedBuffer::Int32(v) => v.len(),
            TypedBuffer::Int64(v) => v.len(),
            TypedBuffer::Float32(v) => v.len(),
            TypedBuffer::Float64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total byte size
    pub fn byte_len(&self) -> usize {
        self.len() * self.value_type().size_of()
    }

    /// Serialize every element to little-endian bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        fn encode<T: Copy, const N: usize>(values: &[T], f: impl Fn(T) -> [u8; N]) -> Vec<u8> {
            let mut out = Vec::with_capacity(values.len() * N);
            for &v in values {
                out.extend_from_slice(&f(v));
            }
            out
        }

        match self {
            TypedBuffer::Int32(v) => encode(v, i32::to_le_bytes),
            TypedBuffer::Int64(v) => encode(v, i64::to_le_bytes),
            TypedBuffer::Float32(v) => encode(v, f32::to_le_bytes),
            TypedBuffer::Float64(v) => encode(v, f64::to_le_bytes),
        }
    }

    /// Overwrite the buffer contents from little-endian bytes
    ///
    /// The byte length must match the buffer exactly; the buffer is not
    /// resized here.
    pub fn copy_from_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        if bytes.len() != self.byte_len() {
            return Err(Error::Serialization(format!(
                "buffer holds {} bytes, payload has {}",
                self.byte_len(),
                bytes.len()
            )));
        }

        fn decode<T, const N: usize>(dst: &mut [T], bytes: &[u8], f: impl Fn([u8; N]) -> T) {
            for (slot, chunk) in dst.iter_mut().zip(bytes.chunks_exact(N)) {
                let mut raw = [0u8; N];
                raw.copy_from_slice(chunk);
                *slot = f(raw);
            }
        }

        match self {
            TypedBuffer::Int32(v) => decode(v, bytes, i32::from_le_bytes),
            TypedBuffer::Int64(v) => decode(v, bytes, i64::from_le_bytes),
            TypedBuffer::Float32(v) => decode(v, bytes, f32::from_le_bytes),
            TypedBuffer::Float64(v) => decode(v, bytes, f64::from_le_bytes),
        }
        Ok(())
    }

    /// Build a buffer of `len` elements from little-endian bytes
    pub fn from_bytes(value_type: ValueType, len: usize, bytes: &[u8]) -> Result<Self> {
        let mut buffer = Self::zeroed(value_type, len);
        buffer.copy_from_bytes(bytes)?;
        Ok(buffer)
    }
}
