use super::{atomic, take_args};
use crate::engine::runtime::{CallCtx, Error, ErrorCode};
use crate::model::XdmNode;
use crate::xdm::{Advance, Cardinality, Progress, XdmAtomicValue, XdmSequenceStream};

/// Emits one boolean computed from the cardinality of `arg`, pulling at
/// most two items.
fn cardinality_test<N: XdmNode + 'static>(
    mut arg: XdmSequenceStream<N>,
    test: fn(Cardinality) -> bool,
) -> XdmSequenceStream<N> {
    let mut done = false;
    XdmSequenceStream::from_fn(move || {
        if done {
            return Ok(Advance::Done);
        }
        match arg.cardinality()? {
            Progress::Suspended(signal) => Ok(Advance::Suspended(signal)),
            Progress::Ready(c) => {
                done = true;
                Ok(Advance::Item(atomic(XdmAtomicValue::Boolean(test(c)))))
            }
        }
    })
}

pub(super) fn empty_fn<N: XdmNode + 'static>(
    _ctx: &CallCtx<N>,
    args: Vec<XdmSequenceStream<N>>,
) -> Result<XdmSequenceStream<N>, Error> {
    let [arg] = take_args(args)?;
    Ok(cardinality_test(arg, |c| c == Cardinality::Empty))
}

pub(super) fn exists_fn<N: XdmNode + 'static>(
    _ctx: &CallCtx<N>,
    args: Vec<XdmSequenceStream<N>>,
) -> Result<XdmSequenceStream<N>, Error> {
    let [arg] = take_args(args)?;
    Ok(cardinality_test(arg, |c| c != Cardinality::Empty))
}

pub(super) fn count_fn<N: XdmNode + 'static>(
    _ctx: &CallCtx<N>,
    args: Vec<XdmSequenceStream<N>>,
) -> Result<XdmSequenceStream<N>, Error> {
    let [mut arg] = take_args(args)?;
    let to_item = |n: usize| {
        i64::try_from(n)
            .map(|n| atomic(XdmAtomicValue::Integer(n)))
            .map_err(|_| Error::from_code(ErrorCode::FOAR0002, "count overflow"))
    };
    // exact length known up front (ranges, materialized vectors)
    if let (lo, Some(hi)) = arg.size_hint()
        && lo == hi
    {
        return Ok(XdmSequenceStream::singleton(to_item(lo)?));
    }
    let mut seen = 0usize;
    let mut done = false;
    Ok(XdmSequenceStream::from_fn(move || {
        if done {
            return Ok(Advance::Done);
        }
        loop {
            match arg.advance()? {
                Advance::Item(_) => seen += 1,
                Advance::Suspended(signal) => return Ok(Advance::Suspended(signal)),
                Advance::Done => {
                    done = true;
                    return Ok(Advance::Item(to_item(seen)?));
                }
            }
        }
    }))
}

pub(super) fn head_fn<N: XdmNode + 'static>(
    _ctx: &CallCtx<N>,
    args: Vec<XdmSequenceStream<N>>,
) -> Result<XdmSequenceStream<N>, Error> {
    let [arg] = take_args(args)?;
    Ok(arg.take(1))
}

pub(super) fn tail_fn<N: XdmNode + 'static>(
    _ctx: &CallCtx<N>,
    args: Vec<XdmSequenceStream<N>>,
) -> Result<XdmSequenceStream<N>, Error> {
    let [arg] = take_args(args)?;
    let mut skipped = false;
    Ok(arg.filter(move |_| Ok(std::mem::replace(&mut skipped, true))))
}

pub(super) fn data_fn<N: XdmNode + 'static>(
    ctx: &CallCtx<N>,
    args: Vec<XdmSequenceStream<N>>,
) -> Result<XdmSequenceStream<N>, Error> {
    let arg = match args.into_iter().next() {
        Some(arg) => arg,
        None => XdmSequenceStream::singleton(ctx.dyn_ctx.context_item()?.clone()),
    };
    Ok(arg.atomize())
}
