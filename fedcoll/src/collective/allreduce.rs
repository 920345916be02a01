use crate::collective::{Collective, CollectiveRequest, RoundBuffer};
use crate::error::Result;
use crate::protocol::AllreduceRequest;
use crate::reduce::{TypedBuf, reduce_into};
use crate::types::{DataType, ReduceOp};

/// Folds each rank's buffer into an accumulator.
///
/// The first arrival seeds the accumulator; later arrivals are reduced into
/// it with the request's declared element type and operation.
#[derive(Debug, Clone, Copy, Default)]
pub struct Allreduce;

impl Allreduce {
    fn parse(request: &AllreduceRequest) -> Result<(TypedBuf<'_>, ReduceOp)> {
        let dtype = DataType::from_tag(request.data_type)?;
        let op = ReduceOp::from_tag(request.reduce_operation)?;
        Ok((TypedBuf::new(dtype, request.send_buffer())?, op))
    }
}

impl Collective for Allreduce {
    type Request = AllreduceRequest;

    fn name(&self) -> &'static str {
        "Allreduce"
    }

    fn validate(&self, request: &AllreduceRequest) -> Result<()> {
        Self::parse(request).map(|_| ())
    }

    fn apply(&self, request: &AllreduceRequest, buffer: &mut RoundBuffer) -> Result<()> {
        let (src, op) = Self::parse(request)?;
        if buffer.check_slot(src.bytes().len())? {
            buffer.fix_slot(src.bytes().len());
            buffer.bytes_mut().extend_from_slice(src.bytes());
            return Ok(());
        }
        reduce_into(buffer.bytes_mut(), src, op)
    }
}
