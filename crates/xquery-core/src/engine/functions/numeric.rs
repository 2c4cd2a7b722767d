use super::{atomic, take_args};
use crate::engine::runtime::{CallCtx, Error, ErrorCode};
use crate::model::XdmNode;
use crate::xdm::{XdmAtomicValue, XdmItem, XdmSequenceStream};

/// Absolute value; derived integer types come back as `xs:integer`.
pub(super) fn abs_fn<N: XdmNode + 'static>(
    _ctx: &CallCtx<N>,
    args: Vec<XdmSequenceStream<N>>,
) -> Result<XdmSequenceStream<N>, Error> {
    let [arg] = take_args(args)?;
    Ok(arg.map(|item| {
        let XdmItem::Atomic(value) = item else {
            return Err(Error::type_error("fn:abs expects a numeric value"));
        };
        let abs = match value {
            XdmAtomicValue::Decimal(d) => XdmAtomicValue::Decimal(d.abs()),
            XdmAtomicValue::Double(d) => XdmAtomicValue::Double(d.abs()),
            XdmAtomicValue::Float(f) => XdmAtomicValue::Float(f.abs()),
            other => {
                let i = other.integer_value().ok_or_else(|| {
                    Error::type_error(format!("fn:abs expects a numeric value, got {}", other.type_of()))
                })?;
                let abs = i64::try_from(i.abs())
                    .map_err(|_| Error::from_code(ErrorCode::FOAR0002, "integer overflow"))?;
                XdmAtomicValue::Integer(abs)
            }
        };
        Ok(atomic(abs))
    }))
}
