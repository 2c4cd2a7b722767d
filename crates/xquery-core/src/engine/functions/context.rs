use super::atomic;
use crate::engine::runtime::{CallCtx, Error, ErrorCode};
use crate::model::XdmNode;
use crate::xdm::{XdmAtomicValue, XdmSequenceStream};

pub(super) fn position_fn<N: XdmNode + 'static>(
    ctx: &CallCtx<N>,
    _args: Vec<XdmSequenceStream<N>>,
) -> Result<XdmSequenceStream<N>, Error> {
    let position = ctx.dyn_ctx.context_position()?;
    let position = i64::try_from(position)
        .map_err(|_| Error::from_code(ErrorCode::FOAR0002, "context position overflow"))?;
    Ok(XdmSequenceStream::singleton(atomic(XdmAtomicValue::Integer(
        position,
    ))))
}

/// The context size may require reading the rest of the context sequence,
/// which can suspend; the result is therefore a stream.
pub(super) fn last_fn<N: XdmNode + 'static>(
    ctx: &CallCtx<N>,
    _args: Vec<XdmSequenceStream<N>>,
) -> Result<XdmSequenceStream<N>, Error> {
    Ok(ctx.dyn_ctx.context_size())
}
