use crate::error::{FedError, Result};

/// Rank of a participant among the `world_size` callers (0-indexed).
pub type Rank = u32;

/// Element types understood by the reduction engine.
///
/// Discriminants are the wire tags. The "long" and "long long" variants
/// are distinct tags that collapse onto the same 64-bit element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DataType {
    Char = 0,
    UChar = 1,
    Int = 2,
    UInt = 3,
    Long = 4,
    ULong = 5,
    Float = 6,
    Double = 7,
    LongLong = 8,
    ULongLong = 9,
}

impl DataType {
    pub const ALL: [DataType; 10] = [
        DataType::Char,
        DataType::UChar,
        DataType::Int,
        DataType::UInt,
        DataType::Long,
        DataType::ULong,
        DataType::Float,
        DataType::Double,
        DataType::LongLong,
        DataType::ULongLong,
    ];

    /// Parse a wire tag.
    pub fn from_tag(tag: u8) -> Result<Self> {
        Self::ALL
            .get(tag as usize)
            .copied()
            .ok_or_else(|| FedError::invalid_argument(format!("invalid data type tag {tag}")))
    }

    /// The wire tag for this type.
    pub const fn tag(self) -> u8 {
        self as u8
    }

    /// Size of one element in bytes.
    pub const fn size_in_bytes(self) -> usize {
        match self {
            DataType::Char | DataType::UChar => 1,
            DataType::Int | DataType::UInt | DataType::Float => 4,
            DataType::Long
            | DataType::ULong
            | DataType::Double
            | DataType::LongLong
            | DataType::ULongLong => 8,
        }
    }

    /// Human-readable name.
    pub const fn name(self) -> &'static str {
        match self {
            DataType::Char => "char",
            DataType::UChar => "uchar",
            DataType::Int => "int",
            DataType::UInt => "uint",
            DataType::Long => "long",
            DataType::ULong => "ulong",
            DataType::Float => "float",
            DataType::Double => "double",
            DataType::LongLong => "longlong",
            DataType::ULongLong => "ulonglong",
        }
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<u8> for DataType {
    type Error = FedError;

    fn try_from(tag: u8) -> Result<Self> {
        Self::from_tag(tag)
    }
}

/// Reduction operations for allreduce.
///
/// Every variant must stay commutative and associative: the coordinator
/// folds contributions in arrival order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ReduceOp {
    /// Element-wise maximum across ranks.
    Max = 0,
    /// Element-wise minimum across ranks.
    Min = 1,
    /// Element-wise sum across ranks.
    Sum = 2,
}

impl ReduceOp {
    /// Parse a wire tag.
    pub fn from_tag(tag: u8) -> Result<Self> {
        match tag {
            0 => Ok(ReduceOp::Max),
            1 => Ok(ReduceOp::Min),
            2 => Ok(ReduceOp::Sum),
            _ => Err(FedError::invalid_argument(format!(
                "invalid reduce operation tag {tag}"
            ))),
        }
    }

    pub const fn tag(self) -> u8 {
        self as u8
    }
}

impl std::fmt::Display for ReduceOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReduceOp::Max => f.write_str("max"),
            ReduceOp::Min => f.write_str("min"),
            ReduceOp::Sum => f.write_str("sum"),
        }
    }
}

impl TryFrom<u8> for ReduceOp {
    type Error = FedError;

    fn try_from(tag: u8) -> Result<Self> {
        Self::from_tag(tag)
    }
}

/// Outcome class carried by a `Status` reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum StatusCode {
    InvalidArgument = 1,
    FailedPrecondition = 2,
    DeadlineExceeded = 3,
    Internal = 4,
}

impl StatusCode {
    /// Unknown codes decode as `Internal`.
    pub fn from_u8(v: u8) -> Self {
        match v {
            1 => StatusCode::InvalidArgument,
            2 => StatusCode::FailedPrecondition,
            3 => StatusCode::DeadlineExceeded,
            _ => StatusCode::Internal,
        }
    }
}

impl std::fmt::Display for StatusCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StatusCode::InvalidArgument => f.write_str("INVALID_ARGUMENT"),
            StatusCode::FailedPrecondition => f.write_str("FAILED_PRECONDITION"),
            StatusCode::DeadlineExceeded => f.write_str("DEADLINE_EXCEEDED"),
            StatusCode::Internal => f.write_str("INTERNAL"),
        }
    }
}

/// Current protocol version.
pub const PROTOCOL_VERSION: u16 = 1;

/// ALPN identifier negotiated on every connection.
pub const ALPN: &[u8] = b"fedcoll/1";
