//! Element-wise typed reduction over little-endian byte buffers.
//!
//! Buffers never get reinterpreted as typed slices. A [`TypedBuf`] pairs the
//! bytes with their [`DataType`], and [`reduce_into`] dispatches on that tag
//! to a fold that decodes, combines and re-encodes one element at a time.

use crate::error::{FedError, Result};
use crate::types::{DataType, ReduceOp};

mod private {
    pub trait Sealed {}
}

/// A Rust scalar with a wire [`DataType`].
///
/// Sealed: the set of element kinds is fixed by the wire protocol.
pub trait Element: Copy + Send + Sync + 'static + private::Sealed {
    /// Wire type used when this element is sent through allreduce.
    const DATA_TYPE: DataType;

    fn read_le(bytes: &[u8]) -> Self;
    fn write_le(self, bytes: &mut [u8]);
    fn combine(a: Self, b: Self, op: ReduceOp) -> Self;
}

macro_rules! impl_element {
    (int: $($ty:ty => $dt:expr),*) => {
        $(
            impl private::Sealed for $ty {}
            impl Element for $ty {
                const DATA_TYPE: DataType = $dt;

                #[inline]
                fn read_le(bytes: &[u8]) -> Self {
                    Self::from_le_bytes(
                        bytes.try_into().expect("slice length matches type size"),
                    )
                }
                #[inline]
                fn write_le(self, bytes: &mut [u8]) {
                    bytes.copy_from_slice(&self.to_le_bytes());
                }
                #[inline]
                fn combine(a: Self, b: Self, op: ReduceOp) -> Self {
                    match op {
                        ReduceOp::Max => a.max(b),
                        ReduceOp::Min => a.min(b),
                        ReduceOp::Sum => a.wrapping_add(b),
                    }
                }
            }
        )*
    };
    (float: $($ty:ty => $dt:expr),*) => {
        $(
            impl private::Sealed for $ty {}
            impl Element for $ty {
                const DATA_TYPE: DataType = $dt;

                #[inline]
                fn read_le(bytes: &[u8]) -> Self {
                    Self::from_le_bytes(
                        bytes.try_into().expect("slice length matches type size"),
                    )
                }
                #[inline]
                fn write_le(self, bytes: &mut [u8]) {
                    bytes.copy_from_slice(&self.to_le_bytes());
                }
                #[inline]
                fn combine(a: Self, b: Self, op: ReduceOp) -> Self {
                    match op {
                        ReduceOp::Max => a.max(b),
                        ReduceOp::Min => a.min(b),
                        ReduceOp::Sum => a + b,
                    }
                }
            }
        )*
    };
}

impl_element!(int:
    i8 => DataType::Char,
    u8 => DataType::UChar,
    i32 => DataType::Int,
    u32 => DataType::UInt,
    i64 => DataType::Long,
    u64 => DataType::ULong
);
impl_element!(float: f32 => DataType::Float, f64 => DataType::Double);

/// A byte buffer tagged with the element type it holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypedBuf<'a> {
    dtype: DataType,
    bytes: &'a [u8],
}

impl<'a> TypedBuf<'a> {
    /// Tag `bytes` as a sequence of `dtype` elements.
    ///
    /// Fails if the length is not a whole number of elements.
    pub fn new(dtype: DataType, bytes: &'a [u8]) -> Result<Self> {
        let width = dtype.size_in_bytes();
        if bytes.len() % width != 0 {
            return Err(FedError::invalid_argument(format!(
                "buffer of {} bytes is not a whole number of {dtype} elements ({width} bytes each)",
                bytes.len()
            )));
        }
        Ok(Self { dtype, bytes })
    }

    pub fn dtype(&self) -> DataType {
        self.dtype
    }

    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.bytes.len() / self.dtype.size_in_bytes()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Fold `src` into `dst` element-wise, in place.
///
/// `dst` must hold exactly as many bytes as `src`; it is left untouched on
/// error.
pub fn reduce_into(dst: &mut [u8], src: TypedBuf<'_>, op: ReduceOp) -> Result<()> {
    if dst.len() != src.bytes.len() {
        return Err(FedError::BufferSizeMismatch {
            expected: dst.len(),
            actual: src.bytes.len(),
        });
    }
    match src.dtype {
        DataType::Char => reduce_typed::<i8>(dst, src.bytes, op),
        DataType::UChar => reduce_typed::<u8>(dst, src.bytes, op),
        DataType::Int => reduce_typed::<i32>(dst, src.bytes, op),
        DataType::UInt => reduce_typed::<u32>(dst, src.bytes, op),
        DataType::Long | DataType::LongLong => reduce_typed::<i64>(dst, src.bytes, op),
        DataType::ULong | DataType::ULongLong => reduce_typed::<u64>(dst, src.bytes, op),
        DataType::Float => reduce_typed::<f32>(dst, src.bytes, op),
        DataType::Double => reduce_typed::<f64>(dst, src.bytes, op),
    }
    Ok(())
}

/// Tag-level entry point: parse the wire tags, then reduce.
///
/// Unknown tags fail with `InvalidArgument` before `dst` is touched.
pub fn reduce_tagged(dst: &mut [u8], src: &[u8], dtype_tag: u8, op_tag: u8) -> Result<()> {
    let dtype = DataType::from_tag(dtype_tag)?;
    let op = ReduceOp::from_tag(op_tag)?;
    reduce_into(dst, TypedBuf::new(dtype, src)?, op)
}

fn reduce_typed<T: Element>(dst: &mut [u8], src: &[u8], op: ReduceOp) {
    let width = std::mem::size_of::<T>();
    for (d, s) in dst.chunks_exact_mut(width).zip(src.chunks_exact(width)) {
        let r = T::combine(T::read_le(d), T::read_le(s), op);
        r.write_le(d);
    }
}

/// Encode a typed slice into little-endian wire bytes.
pub fn encode_elements<T: Element>(values: &[T]) -> Vec<u8> {
    let width = std::mem::size_of::<T>();
    let mut buf = vec![0u8; values.len() * width];
    for (v, chunk) in values.iter().zip(buf.chunks_exact_mut(width)) {
        v.write_le(chunk);
    }
    buf
}

/// Decode little-endian wire bytes into a typed vector.
pub fn decode_elements<T: Element>(bytes: &[u8]) -> Result<Vec<T>> {
    let buf = TypedBuf::new(T::DATA_TYPE, bytes)?;
    Ok(buf
        .bytes()
        .chunks_exact(std::mem::size_of::<T>())
        .map(T::read_le)
        .collect())
}
