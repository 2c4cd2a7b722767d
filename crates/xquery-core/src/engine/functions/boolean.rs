use super::{atomic, take_args};
use crate::engine::runtime::{CallCtx, Error};
use crate::model::XdmNode;
use crate::xdm::{XdmAtomicValue, XdmItem, XdmSequenceStream};

pub(super) fn fn_true<N: XdmNode + 'static>(
    _ctx: &CallCtx<N>,
    _args: Vec<XdmSequenceStream<N>>,
) -> Result<XdmSequenceStream<N>, Error> {
    Ok(XdmSequenceStream::singleton(atomic(XdmAtomicValue::Boolean(true))))
}

pub(super) fn fn_false<N: XdmNode + 'static>(
    _ctx: &CallCtx<N>,
    _args: Vec<XdmSequenceStream<N>>,
) -> Result<XdmSequenceStream<N>, Error> {
    Ok(XdmSequenceStream::singleton(atomic(XdmAtomicValue::Boolean(false))))
}

pub(super) fn fn_not<N: XdmNode + 'static>(
    _ctx: &CallCtx<N>,
    args: Vec<XdmSequenceStream<N>>,
) -> Result<XdmSequenceStream<N>, Error> {
    let [arg] = take_args(args)?;
    Ok(arg.effective_boolean_value().map(|item| match item {
        XdmItem::Atomic(XdmAtomicValue::Boolean(b)) => Ok(atomic(XdmAtomicValue::Boolean(!b))),
        other => Err(Error::type_error(format!(
            "effective boolean value produced {other:?}"
        ))),
    }))
}

pub(super) fn fn_boolean<N: XdmNode + 'static>(
    _ctx: &CallCtx<N>,
    args: Vec<XdmSequenceStream<N>>,
) -> Result<XdmSequenceStream<N>, Error> {
    let [arg] = take_args(args)?;
    Ok(arg.effective_boolean_value())
}
