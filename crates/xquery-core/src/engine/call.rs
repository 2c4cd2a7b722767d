//! Function items and the call protocol.
//!
//! Arguments are converted against the declared parameter types before a
//! callable sees them: nodes are atomized, `xs:untypedAtomic` values are
//! cast to the declared type, numeric values are promoted and the
//! occurrence indicator is enforced. When a name has several overloads for
//! the same arity the arguments are buffered and each overload is tried in
//! turn; exactly one must accept them.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use crate::engine::casting::cast_atomic;
use crate::engine::cursors::atomize_item;
use crate::engine::operators::NumericKind;
use crate::engine::runtime::{CallCtx, DynamicContext, Error, ErrorCode};
use crate::model::XdmNode;
use crate::xdm::stream::drain_into;
use crate::xdm::{
    Advance, ExpandedName, ReplayableSequence, SequenceCursor, XdmAtomicValue, XdmItem,
    XdmSequence, XdmSequenceStream, XdmType,
};

pub type Arity = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Occurrence {
    One,
    ZeroOrOne,
    ZeroOrMore,
    OneOrMore,
}

impl Occurrence {
    pub fn suffix(self) -> &'static str {
        match self {
            Occurrence::One => "",
            Occurrence::ZeroOrOne => "?",
            Occurrence::ZeroOrMore => "*",
            Occurrence::OneOrMore => "+",
        }
    }

    fn at_most_one(self) -> bool {
        matches!(self, Occurrence::One | Occurrence::ZeroOrOne)
    }

    fn at_least_one(self) -> bool {
        matches!(self, Occurrence::One | Occurrence::OneOrMore)
    }
}

/// Declared type of a parameter or result: an item type plus an
/// occurrence indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamTypeSpec {
    pub item: XdmType,
    pub occurrence: Occurrence,
}

impl ParamTypeSpec {
    pub const fn new(item: XdmType, occurrence: Occurrence) -> Self {
        Self { item, occurrence }
    }

    pub const fn any_item(occurrence: Occurrence) -> Self {
        Self::new(XdmType::Item, occurrence)
    }

    pub const fn any_atomic(occurrence: Occurrence) -> Self {
        Self::new(XdmType::AnyAtomicType, occurrence)
    }

    pub const fn string(occurrence: Occurrence) -> Self {
        Self::new(XdmType::String, occurrence)
    }

    pub const fn integer(occurrence: Occurrence) -> Self {
        Self::new(XdmType::Integer, occurrence)
    }

    pub const fn numeric(occurrence: Occurrence) -> Self {
        Self::new(XdmType::Numeric, occurrence)
    }

    pub const fn boolean(occurrence: Occurrence) -> Self {
        Self::new(XdmType::Boolean, occurrence)
    }

    fn is_unconstrained(self) -> bool {
        self.item == XdmType::Item && self.occurrence == Occurrence::ZeroOrMore
    }
}

impl fmt::Display for ParamTypeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.item, self.occurrence.suffix())
    }
}

/// Parameter list of one overload. A `rest` descriptor makes the function
/// variadic: it applies to every argument past `params`.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionSignature {
    pub params: Vec<ParamTypeSpec>,
    pub rest: Option<ParamTypeSpec>,
    pub returns: ParamTypeSpec,
}

impl FunctionSignature {
    pub fn new(params: Vec<ParamTypeSpec>, returns: ParamTypeSpec) -> Self {
        Self {
            params,
            rest: None,
            returns,
        }
    }

    pub fn variadic(params: Vec<ParamTypeSpec>, rest: ParamTypeSpec, returns: ParamTypeSpec) -> Self {
        Self {
            params,
            rest: Some(rest),
            returns,
        }
    }

    pub fn accepts_arity(&self, arity: Arity) -> bool {
        match self.rest {
            Some(_) => arity >= self.params.len(),
            None => arity == self.params.len(),
        }
    }

    pub fn param(&self, index: usize) -> Option<ParamTypeSpec> {
        self.params.get(index).copied().or(self.rest)
    }

    pub fn is_variadic(&self) -> bool {
        self.rest.is_some()
    }
}

pub type FunctionImpl<N> = Arc<
    dyn Fn(&CallCtx<N>, Vec<XdmSequenceStream<N>>) -> Result<XdmSequenceStream<N>, Error>
        + Send
        + Sync,
>;

/// A callable value: a registered function overload, a named function
/// reference, or the result of partial application.
pub struct FunctionItem<N> {
    pub name: Option<ExpandedName>,
    pub signature: FunctionSignature,
    callable: FunctionImpl<N>,
}

impl<N> fmt::Debug for FunctionItem<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionItem")
            .field("name", &self.name)
            .field("signature", &self.signature)
            .finish_non_exhaustive()
    }
}

impl<N> FunctionItem<N> {
    pub fn new(name: Option<ExpandedName>, signature: FunctionSignature, callable: FunctionImpl<N>) -> Self {
        Self {
            name,
            signature,
            callable,
        }
    }

    pub fn from_fn<F>(name: Option<ExpandedName>, signature: FunctionSignature, f: F) -> Self
    where
        F: Fn(&CallCtx<N>, Vec<XdmSequenceStream<N>>) -> Result<XdmSequenceStream<N>, Error>
            + Send
            + Sync
            + 'static,
    {
        Self::new(name, signature, Arc::new(f))
    }

    /// Number of declared parameters; the minimum arity of a variadic function.
    pub fn arity(&self) -> Arity {
        self.signature.params.len()
    }

    pub fn name_for_display(&self) -> String {
        match &self.name {
            Some(name) => format!("{name}#{}", self.arity()),
            None => format!("(anonymous)#{}", self.arity()),
        }
    }

    /// Fix the arity of a variadic function by expanding its rest descriptor.
    pub fn with_arity(&self, arity: Arity) -> Result<Self, Error> {
        if !self.signature.accepts_arity(arity) {
            return Err(Error::from_code(
                ErrorCode::XPST0017,
                format!("{} cannot be called with {arity} arguments", self.name_for_display()),
            ));
        }
        let params = (0..arity).filter_map(|i| self.signature.param(i)).collect();
        Ok(Self {
            name: self.name.clone(),
            signature: FunctionSignature::new(params, self.signature.returns),
            callable: Arc::clone(&self.callable),
        })
    }
}

impl<N: XdmNode + 'static> FunctionItem<N> {
    /// Call with raw arguments; each argument is converted to its declared
    /// parameter type first.
    pub fn invoke(
        &self,
        ctx: &DynamicContext<N>,
        args: Vec<XdmSequenceStream<N>>,
    ) -> Result<XdmSequenceStream<N>, Error> {
        if !self.signature.accepts_arity(args.len()) {
            return Err(Error::type_error(format!(
                "{} called with {} arguments",
                self.name_for_display(),
                args.len()
            )));
        }
        let args = args
            .into_iter()
            .enumerate()
            .map(|(i, arg)| match self.signature.param(i) {
                Some(spec) => transform_argument(arg, spec),
                None => arg,
            })
            .collect();
        self.call_converted(ctx, args)
    }

    fn call_converted(
        &self,
        ctx: &DynamicContext<N>,
        args: Vec<XdmSequenceStream<N>>,
    ) -> Result<XdmSequenceStream<N>, Error> {
        let anonymous = ExpandedName::local("anonymous");
        let call = CallCtx {
            dyn_ctx: ctx,
            name: self.name.as_ref().unwrap_or(&anonymous),
        };
        let result = (self.callable)(&call, args)?;
        Ok(transform_argument(result, self.signature.returns))
    }
}

fn cardinality_error(spec: ParamTypeSpec, detail: &str) -> Error {
    Error::type_error(format!("expected {spec}, got {detail}"))
}

/// Convert one atomic value to `target` by untypedAtomic casting or
/// numeric/URI promotion.
pub(crate) fn coerce_atomic(value: XdmAtomicValue, target: XdmType) -> Result<XdmAtomicValue, Error> {
    let source = value.type_of();
    if source.is_subtype_of(target) {
        return Ok(value);
    }
    // dateTimeStamp values are carried as dateTime with a required timezone
    if target == XdmType::DateTimeStamp
        && let XdmAtomicValue::DateTime { tz: Some(_), .. } = value
    {
        return Ok(value);
    }
    if source == XdmType::UntypedAtomic {
        return match target {
            XdmType::Numeric => cast_atomic(&value, XdmType::Double),
            t if t.is_instantiable() => cast_atomic(&value, t),
            _ => Ok(value),
        };
    }
    if matches!(target, XdmType::Float | XdmType::Double)
        && let (Some(from), Some(to)) = (NumericKind::of_type(source), NumericKind::of_type(target))
        && from < to
    {
        return cast_atomic(&value, target);
    }
    if source == XdmType::AnyUri && target == XdmType::String {
        return cast_atomic(&value, target);
    }
    Err(Error::type_error(format!(
        "cannot convert {source} value '{}' to {target}",
        value.lexical()
    )))
}

/// Convert one item to `spec.item`, appending the result(s) to `out`.
/// Atomization can turn one item into several.
fn convert_item<N: XdmNode>(
    item: XdmItem<N>,
    spec: ParamTypeSpec,
    out: &mut VecDeque<XdmItem<N>>,
) -> Result<(), Error> {
    let target = spec.item;
    if target == XdmType::Item || item.type_of().is_subtype_of(target) {
        out.push_back(item);
        return Ok(());
    }
    if !target.is_atomic() {
        return Err(cardinality_error(spec, &item_kind_name(&item)));
    }
    let mut atoms = VecDeque::new();
    atomize_item(item, &mut atoms)?;
    for atom in atoms {
        out.push_back(XdmItem::Atomic(coerce_atomic(atom, target)?));
    }
    Ok(())
}

/// Eagerly convert a complete argument.
pub(crate) fn transform_items<N: XdmNode>(
    items: XdmSequence<N>,
    spec: ParamTypeSpec,
) -> Result<XdmSequence<N>, Error> {
    let mut out = VecDeque::with_capacity(items.len());
    for item in items {
        convert_item(item, spec, &mut out)?;
    }
    match out.len() {
        0 if spec.occurrence.at_least_one() => Err(cardinality_error(spec, "empty sequence")),
        n if n > 1 && spec.occurrence.at_most_one() => {
            Err(cardinality_error(spec, &format!("{n} items")))
        }
        _ => Ok(out.into()),
    }
}

/// Lazily convert an argument stream. Single-valued parameters pull their
/// whole (at most two item) input before yielding so a second item is
/// reported even if the callee only reads the first.
pub fn transform_argument<N: XdmNode + 'static>(
    arg: XdmSequenceStream<N>,
    spec: ParamTypeSpec,
) -> XdmSequenceStream<N> {
    if spec.is_unconstrained() {
        return arg;
    }
    XdmSequenceStream::from_cursor(ArgumentCursor {
        inner: arg,
        spec,
        pending: VecDeque::new(),
        emitted: 0,
        checked: false,
    })
}

struct ArgumentCursor<N> {
    inner: XdmSequenceStream<N>,
    spec: ParamTypeSpec,
    pending: VecDeque<XdmItem<N>>,
    emitted: usize,
    // single-valued inputs: the whole input has been pulled and checked
    checked: bool,
}

impl<N: XdmNode + 'static> SequenceCursor<N> for ArgumentCursor<N> {
    fn advance(&mut self) -> Result<Advance<N>, Error> {
        if self.spec.occurrence.at_most_one() {
            if !self.checked {
                loop {
                    match self.inner.advance()? {
                        Advance::Item(item) => {
                            convert_item(item, self.spec, &mut self.pending)?;
                            if self.pending.len() > 1 {
                                return Err(cardinality_error(self.spec, "more than one item"));
                            }
                        }
                        Advance::Suspended(signal) => return Ok(Advance::Suspended(signal)),
                        Advance::Done => break,
                    }
                }
                self.checked = true;
                if self.pending.is_empty() && self.spec.occurrence.at_least_one() {
                    return Err(cardinality_error(self.spec, "empty sequence"));
                }
            }
            return Ok(self.pending.pop_front().map_or(Advance::Done, Advance::Item));
        }
        loop {
            if let Some(item) = self.pending.pop_front() {
                self.emitted += 1;
                return Ok(Advance::Item(item));
            }
            match self.inner.advance()? {
                Advance::Item(item) => convert_item(item, self.spec, &mut self.pending)?,
                Advance::Suspended(signal) => return Ok(Advance::Suspended(signal)),
                Advance::Done => {
                    if self.emitted == 0 && self.spec.occurrence.at_least_one() {
                        return Err(cardinality_error(self.spec, "empty sequence"));
                    }
                    return Ok(Advance::Done);
                }
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        // atomization may expand items
        if self.spec.item != XdmType::Item {
            return (0, None);
        }
        let (_, hi) = self.inner.size_hint();
        (0, hi.map(|h| h + self.pending.len()))
    }
}

/// Invoke `name` given every overload registered for the call's arity.
///
/// With a single candidate the arguments stay lazy. With several, all
/// arguments are buffered (forwarding suspensions) and each candidate's
/// conversion is attempted; exactly one must succeed.
pub fn invoke_overloads<N: XdmNode + 'static>(
    ctx: &DynamicContext<N>,
    name: &ExpandedName,
    mut candidates: Vec<Arc<FunctionItem<N>>>,
    args: Vec<XdmSequenceStream<N>>,
) -> Result<XdmSequenceStream<N>, Error> {
    match candidates.len() {
        0 => Err(Error::from_code(
            ErrorCode::XPST0017,
            format!("no overload of {name} accepts {} arguments", args.len()),
        )),
        1 => {
            let only = candidates.remove(0);
            only.invoke(ctx, args)
        }
        _ => {
            let buffers = args.iter().map(|_| VecDeque::new()).collect();
            Ok(XdmSequenceStream::from_cursor(OverloadCursor {
                state: OverloadState::Collecting {
                    args,
                    buffers,
                    candidates,
                    ctx: ctx.clone(),
                    name: name.clone(),
                },
            }))
        }
    }
}

enum OverloadState<N> {
    Collecting {
        args: Vec<XdmSequenceStream<N>>,
        buffers: Vec<VecDeque<XdmItem<N>>>,
        candidates: Vec<Arc<FunctionItem<N>>>,
        ctx: DynamicContext<N>,
        name: ExpandedName,
    },
    Forwarding(XdmSequenceStream<N>),
}

struct OverloadCursor<N> {
    state: OverloadState<N>,
}

fn select_overload<N: XdmNode + 'static>(
    name: &ExpandedName,
    candidates: &[Arc<FunctionItem<N>>],
    buffers: Vec<VecDeque<XdmItem<N>>>,
) -> Result<(Arc<FunctionItem<N>>, Vec<XdmSequenceStream<N>>), Error> {
    let mut matches = candidates.iter().filter_map(|candidate| {
        let converted: Result<Vec<XdmSequence<N>>, Error> = buffers
            .iter()
            .enumerate()
            .map(|(i, items)| {
                let spec = candidate
                    .signature
                    .param(i)
                    .unwrap_or(ParamTypeSpec::any_item(Occurrence::ZeroOrMore));
                transform_items(items.iter().cloned().collect(), spec)
            })
            .collect();
        converted.ok().map(|args| (candidate, args))
    });
    let Some((chosen, args)) = matches.next() else {
        tracing::debug!(%name, "no overload accepts the arguments");
        return Err(Error::type_error(format!("no overload of {name} accepts the supplied arguments")));
    };
    if matches.next().is_some() {
        tracing::debug!(%name, "ambiguous overload resolution");
        return Err(Error::type_error(format!(
            "more than one overload of {name} accepts the supplied arguments"
        )));
    }
    let streams = args.into_iter().map(XdmSequenceStream::from_vec).collect();
    Ok((Arc::clone(chosen), streams))
}

impl<N: XdmNode + 'static> SequenceCursor<N> for OverloadCursor<N> {
    fn advance(&mut self) -> Result<Advance<N>, Error> {
        if let OverloadState::Collecting {
            args,
            buffers,
            candidates,
            ctx,
            name,
        } = &mut self.state
        {
            for (arg, buffer) in args.iter_mut().zip(buffers.iter_mut()) {
                if let Some(signal) = drain_into(arg, buffer)? {
                    return Ok(Advance::Suspended(signal));
                }
            }
            let (chosen, converted) = select_overload(name, candidates, std::mem::take(buffers))?;
            let result = chosen.call_converted(ctx, converted)?;
            self.state = OverloadState::Forwarding(result);
        }
        match &mut self.state {
            OverloadState::Forwarding(inner) => inner.advance(),
            OverloadState::Collecting { .. } => Ok(Advance::Done),
        }
    }
}

/// An argument in a call that may contain placeholders (`?`).
pub enum Argument<N> {
    Value(XdmSequenceStream<N>),
    Placeholder,
}

impl<N> fmt::Debug for Argument<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Argument::Value(_) => f.write_str("Value(..)"),
            Argument::Placeholder => f.write_str("Placeholder"),
        }
    }
}

/// Bind the non-placeholder arguments of `func`, producing a function whose
/// parameters are the placeholder positions in their original order.
pub fn partially_apply<N: XdmNode + 'static>(
    func: &Arc<FunctionItem<N>>,
    args: Vec<Argument<N>>,
) -> Result<FunctionItem<N>, Error> {
    let target = if func.signature.is_variadic() {
        Arc::new(func.with_arity(args.len())?)
    } else if func.arity() == args.len() {
        Arc::clone(func)
    } else {
        return Err(Error::type_error(format!(
            "{} called with {} arguments",
            func.name_for_display(),
            args.len()
        )));
    };
    let mut params = Vec::new();
    let bound: Vec<Option<ReplayableSequence<N>>> = args
        .into_iter()
        .zip(target.signature.params.iter())
        .map(|(arg, spec)| match arg {
            Argument::Value(stream) => Some(ReplayableSequence::buffered(stream)),
            Argument::Placeholder => {
                params.push(*spec);
                None
            }
        })
        .collect();
    let signature = FunctionSignature::new(params, target.signature.returns);
    Ok(FunctionItem::from_fn(None, signature, move |call, supplied| {
        let mut supplied = supplied.into_iter();
        let full = bound
            .iter()
            .map(|slot| match slot {
                Some(value) => value.replay(),
                None => supplied.next().unwrap_or_else(XdmSequenceStream::empty),
            })
            .collect();
        target.invoke(call.dyn_ctx, full)
    }))
}

/// Dynamic function call on any callable item: function items, arrays
/// (positional lookup) and maps (key lookup).
pub fn call_item<N: XdmNode + 'static>(
    ctx: &DynamicContext<N>,
    item: &XdmItem<N>,
    mut args: Vec<XdmSequenceStream<N>>,
) -> Result<XdmSequenceStream<N>, Error> {
    match item {
        XdmItem::Function(f) => f.invoke(ctx, args),
        XdmItem::Array(array) if args.len() == 1 => {
            let array = array.clone();
            let index = transform_argument(args.remove(0), ParamTypeSpec::integer(Occurrence::One));
            Ok(index.map_all(move |items| {
                let position = items
                    .first()
                    .and_then(|i| match i {
                        XdmItem::Atomic(a) => a.integer_value(),
                        _ => None,
                    })
                    .and_then(|i| i64::try_from(i).ok())
                    .unwrap_or(0);
                array.get(position).cloned().ok_or_else(|| {
                    Error::from_code(
                        ErrorCode::FOAY0001,
                        format!("array index {position} out of bounds (size {})", array.len()),
                    )
                })
            }))
        }
        XdmItem::Map(map) if args.len() == 1 => {
            let map = map.clone();
            let key = transform_argument(args.remove(0), ParamTypeSpec::any_atomic(Occurrence::One));
            Ok(key.map_all(move |items| {
                Ok(match items.first() {
                    Some(XdmItem::Atomic(k)) => map.get(k).cloned().unwrap_or_default(),
                    _ => Vec::new(),
                })
            }))
        }
        XdmItem::Map(_) | XdmItem::Array(_) => Err(Error::type_error(format!(
            "{} expects one argument, got {}",
            item_kind_name(item),
            args.len()
        ))),
        other => Err(Error::type_error(format!(
            "{} is not a function",
            item_kind_name(other)
        ))),
    }
}

/// Short description of an item's kind for diagnostics.
pub(crate) fn item_kind_name<N: XdmNode>(item: &XdmItem<N>) -> String {
    match item {
        XdmItem::Function(f) => format!("function {}", f.name_for_display()),
        other => other.type_of().name().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simple_node::{SimpleNode, elem, text};

    type S = XdmSequenceStream<SimpleNode>;

    fn int(i: i64) -> XdmItem<SimpleNode> {
        XdmItem::Atomic(XdmAtomicValue::Integer(i))
    }

    fn untyped(s: &str) -> XdmItem<SimpleNode> {
        XdmItem::Atomic(XdmAtomicValue::UntypedAtomic(s.into()))
    }

    fn convert(items: Vec<XdmItem<SimpleNode>>, spec: ParamTypeSpec) -> Result<Vec<XdmItem<SimpleNode>>, Error> {
        transform_argument(S::from_vec(items), spec).materialize()
    }

    #[test]
    fn optional_integer_parameter() {
        let spec = ParamTypeSpec::integer(Occurrence::ZeroOrOne);
        assert!(convert(vec![], spec).unwrap().is_empty());
        assert_eq!(convert(vec![untyped("42")], spec).unwrap(), vec![int(42)]);
        let err = convert(vec![int(1), int(2)], spec).unwrap_err();
        assert_eq!(err.code_enum(), ErrorCode::XPTY0004);
        let err = convert(
            vec![XdmItem::Atomic(XdmAtomicValue::String("abc".into()))],
            spec,
        )
        .unwrap_err();
        assert_eq!(err.code_enum(), ErrorCode::XPTY0004);
        let err = convert(vec![untyped("abc")], spec).unwrap_err();
        assert_eq!(err.code_enum(), ErrorCode::FORG0001);
    }

    #[test]
    fn nodes_are_atomized_and_cast() {
        let node = elem("n").child(text("7")).build();
        let out = convert(vec![XdmItem::Node(node)], ParamTypeSpec::integer(Occurrence::One)).unwrap();
        assert_eq!(out, vec![int(7)]);
    }

    #[test]
    fn numeric_promotion_and_required_items() {
        let out = convert(vec![int(2)], ParamTypeSpec::new(XdmType::Double, Occurrence::One)).unwrap();
        assert_eq!(out, vec![XdmItem::Atomic(XdmAtomicValue::Double(2.0))]);
        let err = convert(vec![], ParamTypeSpec::integer(Occurrence::OneOrMore)).unwrap_err();
        assert_eq!(err.code_enum(), ErrorCode::XPTY0004);
        let err = convert(
            vec![XdmItem::Atomic(XdmAtomicValue::Double(1.0))],
            ParamTypeSpec::new(XdmType::Decimal, Occurrence::One),
        )
        .unwrap_err();
        assert_eq!(err.code_enum(), ErrorCode::XPTY0004);
    }

    #[test]
    fn date_time_stamp_parameter_accepts_its_own_cast() {
        let spec = ParamTypeSpec::new(XdmType::DateTimeStamp, Occurrence::One);
        let stamp = cast_atomic(
            &XdmAtomicValue::String("2024-05-01T10:00:00Z".into()),
            XdmType::DateTimeStamp,
        )
        .unwrap();
        let out = convert(vec![XdmItem::Atomic(stamp.clone())], spec).unwrap();
        assert_eq!(out, vec![XdmItem::Atomic(stamp)]);
        assert_eq!(convert(vec![untyped("2024-05-01T10:00:00+02:00")], spec).unwrap().len(), 1);

        let local = cast_atomic(
            &XdmAtomicValue::String("2024-05-01T10:00:00".into()),
            XdmType::DateTime,
        )
        .unwrap();
        let err = convert(vec![XdmItem::Atomic(local)], spec).unwrap_err();
        assert_eq!(err.code_enum(), ErrorCode::XPTY0004);
        let err = convert(vec![untyped("2024-05-01T10:00:00")], spec).unwrap_err();
        assert_eq!(err.code_enum(), ErrorCode::FORG0001);
    }

    #[test]
    fn unbounded_parameters_stay_lazy() {
        let arg = transform_argument(S::range(1, i64::MAX), ParamTypeSpec::integer(Occurrence::ZeroOrMore));
        let first = arg.take(2).materialize().unwrap();
        assert_eq!(first, vec![int(1), int(2)]);
    }

    #[test]
    fn variadic_arity_expansion() {
        let sig = FunctionSignature::variadic(
            vec![ParamTypeSpec::any_atomic(Occurrence::ZeroOrOne)],
            ParamTypeSpec::any_atomic(Occurrence::ZeroOrOne),
            ParamTypeSpec::string(Occurrence::One),
        );
        let f: FunctionItem<SimpleNode> = FunctionItem::from_fn(None, sig, |_, _| Ok(S::empty()));
        assert!(f.signature.accepts_arity(3));
        let fixed = f.with_arity(3).unwrap();
        assert_eq!(fixed.arity(), 3);
        assert!(!fixed.signature.accepts_arity(4));
    }
}
