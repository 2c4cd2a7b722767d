//! Core function catalog.
//!
//! Every function here goes through the same public registration contract
//! an embedder uses ([`FunctionRegistry::register_function`]); the catalog
//! is deliberately small.

use crate::consts::{FNS, XS};
use crate::engine::call::{Occurrence, ParamTypeSpec};
use crate::engine::registry::FunctionRegistry;
use crate::engine::runtime::Error;
use crate::model::XdmNode;
use crate::xdm::{ExpandedName, XdmAtomicValue, XdmItem, XdmSequenceStream, XdmType};

pub mod boolean;
pub mod constructors;
pub mod context;
pub mod datetime;
pub mod numeric;
pub mod sequences;
pub mod strings;

use Occurrence::{One, ZeroOrMore, ZeroOrOne};

/// Split an argument vector whose length the registry already checked.
pub(crate) fn take_args<N, const K: usize>(
    args: Vec<XdmSequenceStream<N>>,
) -> Result<[XdmSequenceStream<N>; K], Error> {
    <[XdmSequenceStream<N>; K]>::try_from(args)
        .map_err(|v| Error::type_error(format!("expected {K} arguments, got {}", v.len())))
}

pub(crate) fn atomic<N>(v: XdmAtomicValue) -> XdmItem<N> {
    XdmItem::Atomic(v)
}

pub fn default_function_registry<N: XdmNode + 'static>() -> FunctionRegistry<N> {
    let mut reg = FunctionRegistry::new();
    macro_rules! reg_fn {
        ($local:expr, [$($param:expr),* $(,)?], $returns:expr, $func:expr $(,)?) => {
            reg.register_function(
                ExpandedName::new(Some(FNS.to_string()), $local),
                vec![$($param),*],
                $returns,
                $func,
            )
        };
    }

    // ===== booleans =====
    reg_fn!("true", [], ParamTypeSpec::boolean(One), boolean::fn_true::<N>);
    reg_fn!("false", [], ParamTypeSpec::boolean(One), boolean::fn_false::<N>);
    reg_fn!(
        "not",
        [ParamTypeSpec::any_item(ZeroOrMore)],
        ParamTypeSpec::boolean(One),
        boolean::fn_not::<N>
    );
    reg_fn!(
        "boolean",
        [ParamTypeSpec::any_item(ZeroOrMore)],
        ParamTypeSpec::boolean(One),
        boolean::fn_boolean::<N>
    );

    // ===== sequences =====
    reg_fn!(
        "empty",
        [ParamTypeSpec::any_item(ZeroOrMore)],
        ParamTypeSpec::boolean(One),
        sequences::empty_fn::<N>
    );
    reg_fn!(
        "exists",
        [ParamTypeSpec::any_item(ZeroOrMore)],
        ParamTypeSpec::boolean(One),
        sequences::exists_fn::<N>
    );
    reg_fn!(
        "count",
        [ParamTypeSpec::any_item(ZeroOrMore)],
        ParamTypeSpec::integer(One),
        sequences::count_fn::<N>
    );
    reg_fn!(
        "head",
        [ParamTypeSpec::any_item(ZeroOrMore)],
        ParamTypeSpec::any_item(ZeroOrOne),
        sequences::head_fn::<N>
    );
    reg_fn!(
        "tail",
        [ParamTypeSpec::any_item(ZeroOrMore)],
        ParamTypeSpec::any_item(ZeroOrMore),
        sequences::tail_fn::<N>
    );
    reg_fn!("data", [], ParamTypeSpec::any_atomic(ZeroOrMore), sequences::data_fn::<N>);
    reg_fn!(
        "data",
        [ParamTypeSpec::any_item(ZeroOrMore)],
        ParamTypeSpec::any_atomic(ZeroOrMore),
        sequences::data_fn::<N>
    );

    // ===== strings =====
    reg_fn!("string", [], ParamTypeSpec::string(One), strings::string_fn::<N>);
    reg_fn!(
        "string",
        [ParamTypeSpec::any_item(ZeroOrOne)],
        ParamTypeSpec::string(One),
        strings::string_fn::<N>
    );
    reg_fn!(
        "string-length",
        [],
        ParamTypeSpec::integer(One),
        strings::string_length_fn::<N>
    );
    reg_fn!(
        "string-length",
        [ParamTypeSpec::string(ZeroOrOne)],
        ParamTypeSpec::integer(One),
        strings::string_length_fn::<N>
    );
    reg.register_variadic(
        ExpandedName::new(Some(FNS.to_string()), "concat"),
        vec![
            ParamTypeSpec::any_atomic(ZeroOrOne),
            ParamTypeSpec::any_atomic(ZeroOrOne),
        ],
        ParamTypeSpec::any_atomic(ZeroOrOne),
        ParamTypeSpec::string(One),
        strings::concat_fn::<N>,
    );

    // ===== numeric =====
    reg_fn!(
        "abs",
        [ParamTypeSpec::numeric(ZeroOrOne)],
        ParamTypeSpec::numeric(ZeroOrOne),
        numeric::abs_fn::<N>
    );

    // ===== clock =====
    reg_fn!(
        "current-dateTime",
        [],
        ParamTypeSpec::new(XdmType::DateTime, One),
        datetime::current_date_time_fn::<N>
    );
    reg_fn!(
        "current-date",
        [],
        ParamTypeSpec::new(XdmType::Date, One),
        datetime::current_date_fn::<N>
    );
    reg_fn!(
        "current-time",
        [],
        ParamTypeSpec::new(XdmType::Time, One),
        datetime::current_time_fn::<N>
    );
    reg_fn!(
        "implicit-timezone",
        [],
        ParamTypeSpec::new(XdmType::DayTimeDuration, One),
        datetime::implicit_timezone_fn::<N>
    );

    // ===== focus =====
    reg_fn!("position", [], ParamTypeSpec::integer(One), context::position_fn::<N>);
    reg_fn!("last", [], ParamTypeSpec::integer(One), context::last_fn::<N>);

    // ===== xs:* constructors =====
    for &target in XdmType::ALL {
        if target.is_atomic() && target.is_instantiable() {
            let local = target.name().trim_start_matches("xs:");
            reg.register_function(
                ExpandedName::new(Some(XS.to_string()), local),
                vec![ParamTypeSpec::any_atomic(ZeroOrOne)],
                ParamTypeSpec::new(target, ZeroOrOne),
                move |ctx, args| constructors::construct::<N>(ctx, args, target),
            );
        }
    }

    reg
}
