use super::{atomic, take_args};
use crate::engine::runtime::{CallCtx, Error, ErrorCode};
use crate::model::XdmNode;
use crate::xdm::{XdmAtomicValue, XdmItem, XdmSequenceStream};

/// String value of an item as `fn:string` defines it.
pub(crate) fn string_value<N: XdmNode>(item: &XdmItem<N>) -> Result<String, Error> {
    match item {
        XdmItem::Node(n) => Ok(n.string_value()),
        XdmItem::Atomic(a) => Ok(a.lexical()),
        XdmItem::Map(_) | XdmItem::Array(_) | XdmItem::Function(_) => Err(Error::from_code(
            ErrorCode::FOTY0014,
            "fn:string is not defined for maps, arrays or functions",
        )),
    }
}

fn focus_or_arg<N: XdmNode + 'static>(
    ctx: &CallCtx<N>,
    args: Vec<XdmSequenceStream<N>>,
) -> Result<XdmSequenceStream<N>, Error> {
    match args.into_iter().next() {
        Some(arg) => Ok(arg),
        None => Ok(XdmSequenceStream::singleton(ctx.dyn_ctx.context_item()?.clone())),
    }
}

pub(super) fn string_fn<N: XdmNode + 'static>(
    ctx: &CallCtx<N>,
    args: Vec<XdmSequenceStream<N>>,
) -> Result<XdmSequenceStream<N>, Error> {
    let arg = focus_or_arg(ctx, args)?;
    Ok(arg.map_all(|items| {
        let s = match items.first() {
            Some(item) => string_value(item)?,
            None => String::new(),
        };
        Ok(vec![atomic(XdmAtomicValue::String(s))])
    }))
}

pub(super) fn string_length_fn<N: XdmNode + 'static>(
    ctx: &CallCtx<N>,
    args: Vec<XdmSequenceStream<N>>,
) -> Result<XdmSequenceStream<N>, Error> {
    let arg = if args.is_empty() {
        // the zero-argument form uses the string value of the context item
        let item = ctx.dyn_ctx.context_item()?;
        XdmSequenceStream::singleton(atomic(XdmAtomicValue::String(string_value(item)?)))
    } else {
        let [arg] = take_args(args)?;
        arg
    };
    Ok(arg.map_all(|items| {
        let len = match items.first() {
            Some(XdmItem::Atomic(a)) => a.as_str().map_or(0, |s| s.chars().count()),
            _ => 0,
        };
        let len = i64::try_from(len)
            .map_err(|_| Error::from_code(ErrorCode::FOAR0002, "string length overflow"))?;
        Ok(vec![atomic(XdmAtomicValue::Integer(len))])
    }))
}

pub(super) fn concat_fn<N: XdmNode + 'static>(
    _ctx: &CallCtx<N>,
    args: Vec<XdmSequenceStream<N>>,
) -> Result<XdmSequenceStream<N>, Error> {
    Ok(XdmSequenceStream::zip_optional(args, |values| {
        let joined: String = values
            .iter()
            .flatten()
            .map(|item| match item {
                XdmItem::Atomic(a) => a.lexical(),
                _ => String::new(),
            })
            .collect();
        Ok(XdmSequenceStream::singleton(atomic(XdmAtomicValue::String(
            joined,
        ))))
    }))
}
