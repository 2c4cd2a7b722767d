//! `xs:*` constructor functions, one per instantiable atomic type.

use super::{atomic, take_args};
use crate::engine::casting::cast_atomic;
use crate::engine::runtime::{CallCtx, Error};
use crate::model::XdmNode;
use crate::xdm::{XdmItem, XdmSequenceStream, XdmType};

pub(super) fn construct<N: XdmNode + 'static>(
    _ctx: &CallCtx<N>,
    args: Vec<XdmSequenceStream<N>>,
    target: XdmType,
) -> Result<XdmSequenceStream<N>, Error> {
    let [arg] = take_args(args)?;
    Ok(arg.map(move |item| match item {
        XdmItem::Atomic(value) => Ok(atomic(cast_atomic(&value, target)?)),
        other => Err(Error::type_error(format!(
            "constructor {target} expects an atomic value, got {}",
            crate::engine::call::item_kind_name(&other)
        ))),
    }))
}
