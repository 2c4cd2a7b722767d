//! Clock functions. All of them read the instant captured when the dynamic
//! context was built, so repeated calls in one evaluation agree.

use rust_decimal::Decimal;

use super::atomic;
use crate::engine::runtime::{CallCtx, Error};
use crate::model::XdmNode;
use crate::xdm::{XdmAtomicValue, XdmSequenceStream};

pub(super) fn current_date_time_fn<N: XdmNode + 'static>(
    ctx: &CallCtx<N>,
    _args: Vec<XdmSequenceStream<N>>,
) -> Result<XdmSequenceStream<N>, Error> {
    let now = ctx.dyn_ctx.current_date_time();
    Ok(XdmSequenceStream::singleton(atomic(XdmAtomicValue::DateTime {
        value: now.naive_local(),
        tz: Some(*now.offset()),
    })))
}

pub(super) fn current_date_fn<N: XdmNode + 'static>(
    ctx: &CallCtx<N>,
    _args: Vec<XdmSequenceStream<N>>,
) -> Result<XdmSequenceStream<N>, Error> {
    let now = ctx.dyn_ctx.current_date_time();
    Ok(XdmSequenceStream::singleton(atomic(XdmAtomicValue::Date {
        date: now.date_naive(),
        tz: Some(*now.offset()),
    })))
}

pub(super) fn current_time_fn<N: XdmNode + 'static>(
    ctx: &CallCtx<N>,
    _args: Vec<XdmSequenceStream<N>>,
) -> Result<XdmSequenceStream<N>, Error> {
    let now = ctx.dyn_ctx.current_date_time();
    Ok(XdmSequenceStream::singleton(atomic(XdmAtomicValue::Time {
        time: now.time(),
        tz: Some(*now.offset()),
    })))
}

pub(super) fn implicit_timezone_fn<N: XdmNode + 'static>(
    ctx: &CallCtx<N>,
    _args: Vec<XdmSequenceStream<N>>,
) -> Result<XdmSequenceStream<N>, Error> {
    let seconds = ctx.dyn_ctx.implicit_timezone().local_minus_utc();
    Ok(XdmSequenceStream::singleton(atomic(
        XdmAtomicValue::DayTimeDuration(Decimal::from(seconds)),
    )))
}
