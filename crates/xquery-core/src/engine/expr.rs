//! Expression tree evaluated against a [`DynamicContext`].
//!
//! Evaluating a node builds a lazy stream and computes nothing; work happens
//! as the stream is pulled. Failures found while building the stream (an
//! unknown function, an absent context item) are reported through the stream
//! itself, so [`Expr::evaluate`] always returns a stream.
//!
//! Children are held in [`Arc`]s so that streams can keep a handle on the
//! sub-expressions they still have to evaluate.

use core::cmp::Ordering;
use core::fmt;
use std::sync::Arc;

use crate::engine::call::{
    Argument, Arity, FunctionItem, Occurrence, ParamTypeSpec, call_item, item_kind_name,
    partially_apply, transform_argument,
};
use crate::engine::operators::{ArithmeticOp, ComparisonOp, OperatorCache, UnaryOp};
use crate::engine::runtime::{DynamicContext, Error, ErrorCode, Focus};
use crate::model::{NodeKind, XdmNode};
use crate::xdm::{
    Deferred, ExpandedName, ReplayableSequence, XdmAtomicValue, XdmItem, XdmSequence,
    XdmSequenceStream,
};

/// Host callback producing the value of a [`Expr::Host`] node.
pub type HostFn<N> =
    Arc<dyn Fn(&DynamicContext<N>) -> Result<XdmSequenceStream<N>, Error> + Send + Sync>;

/// Expression whose value is supplied by the embedding host, typically an
/// asynchronous lookup surfaced as a [`Deferred`].
pub struct HostExpr<N>(HostFn<N>);

impl<N> Clone for HostExpr<N> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<N> fmt::Debug for HostExpr<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("HostExpr(..)")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    Child,
    Attribute,
    SelfAxis,
    Parent,
    Descendant,
    DescendantOrSelf,
}

impl Axis {
    fn principal_kind(self) -> NodeKind {
        match self {
            Axis::Attribute => NodeKind::Attribute,
            _ => NodeKind::Element,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeTest {
    /// `node()`
    AnyKind,
    /// `text()`, `comment()`, `element()`, ...
    Kind(NodeKind),
    /// `*`
    Wildcard,
    /// `*:local`
    LocalWildcard(String),
    Name {
        ns_uri: Option<String>,
        local: String,
    },
}

impl NodeTest {
    /// Name test for a name in no namespace.
    pub fn name(local: impl Into<String>) -> Self {
        NodeTest::Name {
            ns_uri: None,
            local: local.into(),
        }
    }

    pub fn qualified(ns_uri: impl Into<String>, local: impl Into<String>) -> Self {
        NodeTest::Name {
            ns_uri: Some(ns_uri.into()),
            local: local.into(),
        }
    }

    fn matches<N: XdmNode>(&self, node: &N, principal: &NodeKind) -> bool {
        match self {
            NodeTest::AnyKind => true,
            NodeTest::Kind(kind) => node.kind() == *kind,
            NodeTest::Wildcard => node.kind() == *principal,
            NodeTest::LocalWildcard(local) => {
                node.kind() == *principal && node.name().is_some_and(|q| q.local == *local)
            }
            NodeTest::Name { ns_uri, local } => {
                node.kind() == *principal
                    && node
                        .name()
                        .is_some_and(|q| q.local == *local && q.ns_uri == *ns_uri)
            }
        }
    }
}

/// An argument position in a static or dynamic call.
#[derive(Debug, Clone)]
pub enum CallArg<N> {
    Value(Arc<Expr<N>>),
    /// `?`: the call becomes a partial application.
    Placeholder,
}

impl<N: XdmNode + 'static> CallArg<N> {
    fn value(&self) -> Option<&Arc<Expr<N>>> {
        match self {
            CallArg::Value(expr) => Some(expr),
            CallArg::Placeholder => None,
        }
    }

    fn bind(&self, ctx: &DynamicContext<N>) -> Argument<N> {
        match self {
            CallArg::Value(expr) => Argument::Value(expr.evaluate(ctx)),
            CallArg::Placeholder => Argument::Placeholder,
        }
    }
}

impl<N> From<Expr<N>> for CallArg<N> {
    fn from(expr: Expr<N>) -> Self {
        CallArg::Value(Arc::new(expr))
    }
}

#[derive(Debug, Clone)]
pub enum Expr<N> {
    Literal(XdmAtomicValue),
    /// `(a, b, ...)`; `()` is the empty sequence.
    Sequence(Vec<Arc<Expr<N>>>),
    /// `a to b`
    Range(Arc<Expr<N>>, Arc<Expr<N>>),
    ContextItem,
    VarRef(ExpandedName),
    Arithmetic {
        op: ArithmeticOp,
        left: Arc<Expr<N>>,
        right: Arc<Expr<N>>,
    },
    Unary {
        op: UnaryOp,
        operand: Arc<Expr<N>>,
    },
    ValueComparison {
        op: ComparisonOp,
        left: Arc<Expr<N>>,
        right: Arc<Expr<N>>,
    },
    And(Arc<Expr<N>>, Arc<Expr<N>>),
    Or(Arc<Expr<N>>, Arc<Expr<N>>),
    If {
        condition: Arc<Expr<N>>,
        then_branch: Arc<Expr<N>>,
        else_branch: Arc<Expr<N>>,
    },
    Let {
        name: ExpandedName,
        value: Arc<Expr<N>>,
        body: Arc<Expr<N>>,
    },
    For {
        name: ExpandedName,
        source: Arc<Expr<N>>,
        body: Arc<Expr<N>>,
    },
    /// `left ! right`
    SimpleMap {
        left: Arc<Expr<N>>,
        right: Arc<Expr<N>>,
    },
    /// `base[predicate]`
    Filter {
        base: Arc<Expr<N>>,
        predicate: Arc<Expr<N>>,
    },
    /// `base / step`: node results come back in document order without
    /// duplicates.
    Path {
        base: Arc<Expr<N>>,
        step: Arc<Expr<N>>,
    },
    Step {
        axis: Axis,
        test: NodeTest,
    },
    FunctionCall {
        name: ExpandedName,
        args: Vec<CallArg<N>>,
    },
    /// `name#arity`
    NamedFunctionRef {
        name: ExpandedName,
        arity: Arity,
    },
    /// `target(args)` on a function, map or array.
    DynamicCall {
        target: Arc<Expr<N>>,
        args: Vec<CallArg<N>>,
    },
    Host(HostExpr<N>),
}

impl<N: XdmNode + 'static> Expr<N> {
    pub fn literal(value: impl Into<XdmAtomicValue>) -> Self {
        Expr::Literal(value.into())
    }

    pub fn empty() -> Self {
        Expr::Sequence(Vec::new())
    }

    pub fn sequence(items: impl IntoIterator<Item = Expr<N>>) -> Self {
        Expr::Sequence(items.into_iter().map(Arc::new).collect())
    }

    pub fn range(start: Expr<N>, end: Expr<N>) -> Self {
        Expr::Range(Arc::new(start), Arc::new(end))
    }

    pub fn var(local: impl Into<String>) -> Self {
        Expr::VarRef(ExpandedName::local(local))
    }

    pub fn arithmetic(op: ArithmeticOp, left: Expr<N>, right: Expr<N>) -> Self {
        Expr::Arithmetic {
            op,
            left: Arc::new(left),
            right: Arc::new(right),
        }
    }

    pub fn unary(op: UnaryOp, operand: Expr<N>) -> Self {
        Expr::Unary {
            op,
            operand: Arc::new(operand),
        }
    }

    pub fn compare(op: ComparisonOp, left: Expr<N>, right: Expr<N>) -> Self {
        Expr::ValueComparison {
            op,
            left: Arc::new(left),
            right: Arc::new(right),
        }
    }

    pub fn and(left: Expr<N>, right: Expr<N>) -> Self {
        Expr::And(Arc::new(left), Arc::new(right))
    }

    pub fn or(left: Expr<N>, right: Expr<N>) -> Self {
        Expr::Or(Arc::new(left), Arc::new(right))
    }

    pub fn if_then_else(condition: Expr<N>, then_branch: Expr<N>, else_branch: Expr<N>) -> Self {
        Expr::If {
            condition: Arc::new(condition),
            then_branch: Arc::new(then_branch),
            else_branch: Arc::new(else_branch),
        }
    }

    pub fn let_in(name: impl Into<String>, value: Expr<N>, body: Expr<N>) -> Self {
        Expr::Let {
            name: ExpandedName::local(name),
            value: Arc::new(value),
            body: Arc::new(body),
        }
    }

    pub fn for_in(name: impl Into<String>, source: Expr<N>, body: Expr<N>) -> Self {
        Expr::For {
            name: ExpandedName::local(name),
            source: Arc::new(source),
            body: Arc::new(body),
        }
    }

    pub fn simple_map(left: Expr<N>, right: Expr<N>) -> Self {
        Expr::SimpleMap {
            left: Arc::new(left),
            right: Arc::new(right),
        }
    }

    pub fn filter(base: Expr<N>, predicate: Expr<N>) -> Self {
        Expr::Filter {
            base: Arc::new(base),
            predicate: Arc::new(predicate),
        }
    }

    pub fn path(base: Expr<N>, step: Expr<N>) -> Self {
        Expr::Path {
            base: Arc::new(base),
            step: Arc::new(step),
        }
    }

    pub fn step(axis: Axis, test: NodeTest) -> Self {
        Expr::Step { axis, test }
    }

    /// Static call of a function in the default function namespace.
    pub fn call(local: impl Into<String>, args: impl IntoIterator<Item = CallArg<N>>) -> Self {
        Expr::FunctionCall {
            name: ExpandedName::local(local),
            args: args.into_iter().collect(),
        }
    }

    pub fn function_ref(local: impl Into<String>, arity: Arity) -> Self {
        Expr::NamedFunctionRef {
            name: ExpandedName::local(local),
            arity,
        }
    }

    pub fn dynamic_call(target: Expr<N>, args: impl IntoIterator<Item = CallArg<N>>) -> Self {
        Expr::DynamicCall {
            target: Arc::new(target),
            args: args.into_iter().collect(),
        }
    }

    pub fn host<F>(f: F) -> Self
    where
        F: Fn(&DynamicContext<N>) -> Result<XdmSequenceStream<N>, Error> + Send + Sync + 'static,
    {
        Expr::Host(HostExpr(Arc::new(f)))
    }

    /// Host value that may not be available yet; evaluation suspends until
    /// it resolves.
    pub fn deferred(value: Deferred<N>) -> Self {
        Self::host(move |_| Ok(XdmSequenceStream::deferred(value.clone())))
    }

    pub fn evaluate(&self, ctx: &DynamicContext<N>) -> XdmSequenceStream<N> {
        self.try_evaluate(ctx).unwrap_or_else(XdmSequenceStream::failed)
    }

    fn try_evaluate(&self, ctx: &DynamicContext<N>) -> Result<XdmSequenceStream<N>, Error> {
        match self {
            Expr::Literal(value) => Ok(XdmSequenceStream::singleton(XdmItem::Atomic(
                value.clone(),
            ))),
            Expr::Sequence(items) => Ok(XdmSequenceStream::concat_all(
                items.iter().map(|e| e.evaluate(ctx)).collect(),
            )),
            Expr::Range(start, end) => Ok(range(ctx, start, end)),
            Expr::ContextItem => Ok(XdmSequenceStream::singleton(ctx.context_item()?.clone())),
            Expr::VarRef(name) => ctx.variable(name),
            Expr::Arithmetic { op, left, right } => {
                let op = *op;
                Ok(binary_atomic(ctx, left, right, move |ops, a, b| {
                    ops.arithmetic(op, a, b)
                }))
            }
            Expr::Unary { op, operand } => {
                let op = *op;
                let ops = Arc::clone(ctx.operators());
                Ok(XdmSequenceStream::zip_singleton(
                    vec![operand.evaluate(ctx).atomize()],
                    move |items| {
                        let [XdmItem::Atomic(a)] = items.as_slice() else {
                            return Err(Error::type_error("unary operand is not atomic"));
                        };
                        Ok(atomic_singleton(ops.unary(op, a)?))
                    },
                ))
            }
            Expr::ValueComparison { op, left, right } => {
                let op = *op;
                Ok(binary_atomic(ctx, left, right, move |ops, a, b| {
                    ops.compare(op, a, b).map(XdmAtomicValue::Boolean)
                }))
            }
            Expr::And(left, right) => Ok(logical(ctx, left, right, false)),
            Expr::Or(left, right) => Ok(logical(ctx, left, right, true)),
            Expr::If {
                condition,
                then_branch,
                else_branch,
            } => {
                let then_branch = Arc::clone(then_branch);
                let else_branch = Arc::clone(else_branch);
                let ctx = ctx.clone();
                Ok(condition
                    .evaluate(&ctx)
                    .effective_boolean_value()
                    .flat_map(move |truth| {
                        let branch = if is_true(&truth) {
                            &then_branch
                        } else {
                            &else_branch
                        };
                        Ok(branch.evaluate(&ctx))
                    }))
            }
            Expr::Let { name, value, body } => {
                let scope = ctx.bind_sequence(name.clone(), value.evaluate(ctx));
                Ok(body.evaluate(&scope))
            }
            Expr::For { name, source, body } => {
                let name = name.clone();
                let body = Arc::clone(body);
                let ctx = ctx.clone();
                Ok(source.evaluate(&ctx).flat_map(move |item| {
                    let scope =
                        ctx.bind_sequence(name.clone(), XdmSequenceStream::singleton(item));
                    Ok(body.evaluate(&scope))
                }))
            }
            Expr::SimpleMap { left, right } => {
                let right = Arc::clone(right);
                Ok(for_each_focus(ctx, left, move |inner, _item, _position| {
                    Ok(right.evaluate(inner))
                }))
            }
            Expr::Filter { base, predicate } => Ok(filter(ctx, base, predicate)),
            Expr::Path { base, step } => {
                let step = Arc::clone(step);
                Ok(for_each_focus(ctx, base, move |inner, item, _position| {
                    if !matches!(item, XdmItem::Node(_)) {
                        return Err(Error::from_code(
                            ErrorCode::XPTY0019,
                            format!("path step applied to {}", item_kind_name(&item)),
                        ));
                    }
                    Ok(step.evaluate(inner))
                })
                .map_all(into_document_order))
            }
            Expr::Step { axis, test } => axis_step(ctx, *axis, test),
            Expr::FunctionCall { name, args } => {
                let registry = ctx.functions();
                if args.iter().any(|a| matches!(a, CallArg::Placeholder)) {
                    let func =
                        registry.function_ref(name, args.len(), ctx.default_function_namespace())?;
                    let bound = args.iter().map(|a| a.bind(ctx)).collect();
                    return Ok(function_singleton(partially_apply(&func, bound)?));
                }
                let values = args
                    .iter()
                    .filter_map(CallArg::value)
                    .map(|e| e.evaluate(ctx))
                    .collect();
                registry.call(ctx, name, values)
            }
            Expr::NamedFunctionRef { name, arity } => {
                let func =
                    ctx.functions()
                        .function_ref(name, *arity, ctx.default_function_namespace())?;
                Ok(XdmSequenceStream::singleton(XdmItem::Function(func)))
            }
            Expr::DynamicCall { target, args } => {
                let target = transform_argument(
                    target.evaluate(ctx),
                    ParamTypeSpec::any_item(Occurrence::One),
                );
                let args = args.clone();
                let ctx = ctx.clone();
                Ok(XdmSequenceStream::zip_singleton(vec![target], move |mut items| {
                    let item = items
                        .pop()
                        .ok_or_else(|| Error::type_error("dynamic call target is empty"))?;
                    if args.iter().any(|a| matches!(a, CallArg::Placeholder)) {
                        let XdmItem::Function(func) = &item else {
                            return Err(Error::type_error(format!(
                                "cannot partially apply {}",
                                item_kind_name(&item)
                            )));
                        };
                        let bound = args.iter().map(|a| a.bind(&ctx)).collect();
                        return Ok(function_singleton(partially_apply(func, bound)?));
                    }
                    let values = args
                        .iter()
                        .filter_map(CallArg::value)
                        .map(|e| e.evaluate(&ctx))
                        .collect();
                    call_item(&ctx, &item, values)
                }))
            }
            Expr::Host(HostExpr(f)) => f(ctx),
        }
    }
}

fn is_true<N>(item: &XdmItem<N>) -> bool {
    matches!(item, XdmItem::Atomic(XdmAtomicValue::Boolean(true)))
}

fn atomic_singleton<N: XdmNode + 'static>(value: XdmAtomicValue) -> XdmSequenceStream<N> {
    XdmSequenceStream::singleton(XdmItem::Atomic(value))
}

fn function_singleton<N: XdmNode + 'static>(func: FunctionItem<N>) -> XdmSequenceStream<N> {
    XdmSequenceStream::singleton(XdmItem::Function(Arc::new(func)))
}

fn range<N: XdmNode + 'static>(
    ctx: &DynamicContext<N>,
    start: &Expr<N>,
    end: &Expr<N>,
) -> XdmSequenceStream<N> {
    let bound = |e: &Expr<N>| {
        transform_argument(
            e.evaluate(ctx),
            ParamTypeSpec::integer(Occurrence::ZeroOrOne),
        )
    };
    XdmSequenceStream::zip_singleton(vec![bound(start), bound(end)], |items| {
        let ends = items
            .iter()
            .map(|item| match item {
                XdmItem::Atomic(a) => a.integer_value().and_then(|i| i64::try_from(i).ok()),
                _ => None,
            })
            .collect::<Option<Vec<i64>>>();
        match ends.as_deref() {
            Some(&[lo, hi]) if lo <= hi => Ok(XdmSequenceStream::range(lo, hi)),
            Some(&[_, _]) => Ok(XdmSequenceStream::empty()),
            _ => Err(Error::from_code(
                ErrorCode::FOAR0002,
                "range bound outside the supported integer range",
            )),
        }
    })
}

/// Applies `apply` to the atomized operands; an empty operand gives an
/// empty result.
fn binary_atomic<N, F>(
    ctx: &DynamicContext<N>,
    left: &Expr<N>,
    right: &Expr<N>,
    apply: F,
) -> XdmSequenceStream<N>
where
    N: XdmNode + 'static,
    F: FnOnce(&OperatorCache, &XdmAtomicValue, &XdmAtomicValue) -> Result<XdmAtomicValue, Error>
        + Send
        + 'static,
{
    let ops = Arc::clone(ctx.operators());
    XdmSequenceStream::zip_singleton(
        vec![left.evaluate(ctx).atomize(), right.evaluate(ctx).atomize()],
        move |items| {
            let [XdmItem::Atomic(a), XdmItem::Atomic(b)] = items.as_slice() else {
                return Err(Error::type_error("operands must be atomic"));
            };
            Ok(atomic_singleton(apply(&ops, a, b)?))
        },
    )
}

/// `and` when `short_circuit_on` is false, `or` when it is true. The right
/// operand is only evaluated when the left one does not decide the result.
fn logical<N: XdmNode + 'static>(
    ctx: &DynamicContext<N>,
    left: &Expr<N>,
    right: &Arc<Expr<N>>,
    short_circuit_on: bool,
) -> XdmSequenceStream<N> {
    let right = Arc::clone(right);
    let ctx = ctx.clone();
    left.evaluate(&ctx)
        .effective_boolean_value()
        .flat_map(move |lhs| {
            if is_true(&lhs) == short_circuit_on {
                Ok(XdmSequenceStream::singleton(lhs))
            } else {
                Ok(right.evaluate(&ctx).effective_boolean_value())
            }
        })
}

/// Evaluates `body` once per item of `base` with that item as the focus.
///
/// The size is taken from the base stream when it is exact. Otherwise
/// `fn:last` re-evaluates `base` to count it, so nothing is buffered.
fn for_each_focus<N, F>(
    ctx: &DynamicContext<N>,
    base: &Arc<Expr<N>>,
    mut body: F,
) -> XdmSequenceStream<N>
where
    N: XdmNode + 'static,
    F: FnMut(&DynamicContext<N>, XdmItem<N>, usize) -> Result<XdmSequenceStream<N>, Error>
        + Send
        + 'static,
{
    let input = base.evaluate(ctx);
    let size = match input.size_hint() {
        (lo, Some(hi)) if lo == hi => Some(lo),
        _ => None,
    };
    let sequence = size.is_none().then(|| {
        let base = Arc::clone(base);
        let ctx = ctx.clone();
        ReplayableSequence::regenerate(move || base.evaluate(&ctx))
    });
    let ctx = ctx.clone();
    let mut position = 0;
    input.flat_map(move |item| {
        position += 1;
        let focus = Focus {
            item: item.clone(),
            position,
            size,
            sequence: sequence.clone(),
        };
        body(&ctx.with_focus(focus), item, position)
    })
}

fn filter<N: XdmNode + 'static>(
    ctx: &DynamicContext<N>,
    base: &Arc<Expr<N>>,
    predicate: &Arc<Expr<N>>,
) -> XdmSequenceStream<N> {
    // a constant position selects without looking past the chosen item
    if let Expr::Literal(XdmAtomicValue::Integer(k)) = predicate.as_ref() {
        let Ok(k) = usize::try_from(*k) else {
            return XdmSequenceStream::empty();
        };
        if k == 0 {
            return XdmSequenceStream::empty();
        }
        let mut seen = 0;
        return base.evaluate(ctx).take(k).filter(move |_| {
            seen += 1;
            Ok(seen == k)
        });
    }
    let predicate = Arc::clone(predicate);
    for_each_focus(ctx, base, move |inner, item, position| {
        Ok(predicate
            .evaluate(inner)
            .predicate_truth(position)
            .flat_map(move |truth| {
                Ok(if is_true(&truth) {
                    XdmSequenceStream::singleton(item.clone())
                } else {
                    XdmSequenceStream::empty()
                })
            }))
    })
}

/// Pre-order walk below a node.
struct Descendants<N> {
    stack: Vec<N>,
}

impl<N: XdmNode> Descendants<N> {
    fn of(node: &N) -> Self {
        let mut stack = node.children();
        stack.reverse();
        Self { stack }
    }

    fn and_self(node: &N) -> Self {
        Self {
            stack: vec![node.clone()],
        }
    }
}

impl<N: XdmNode> Iterator for Descendants<N> {
    type Item = N;

    fn next(&mut self) -> Option<N> {
        let node = self.stack.pop()?;
        let mut children = node.children();
        children.reverse();
        self.stack.extend(children);
        Some(node)
    }
}

fn axis_step<N: XdmNode + 'static>(
    ctx: &DynamicContext<N>,
    axis: Axis,
    test: &NodeTest,
) -> Result<XdmSequenceStream<N>, Error> {
    let node = match ctx.context_item()? {
        XdmItem::Node(n) => n.clone(),
        other => {
            return Err(Error::from_code(
                ErrorCode::XPTY0020,
                format!("axis step on {}", item_kind_name(other)),
            ));
        }
    };
    let principal = axis.principal_kind();
    let test = test.clone();
    let keep = move |n: &N| test.matches(n, &principal);
    let stream = match axis {
        Axis::Child => XdmSequenceStream::from_iterator(
            node.children().into_iter().filter(keep).map(XdmItem::Node),
        ),
        Axis::Attribute => XdmSequenceStream::from_iterator(
            node.attributes().into_iter().filter(keep).map(XdmItem::Node),
        ),
        Axis::SelfAxis => XdmSequenceStream::from_iterator(
            Some(node).into_iter().filter(keep).map(XdmItem::Node),
        ),
        Axis::Parent => XdmSequenceStream::from_iterator(
            node.parent().into_iter().filter(keep).map(XdmItem::Node),
        ),
        Axis::Descendant => XdmSequenceStream::from_iterator(
            Descendants::of(&node).filter(keep).map(XdmItem::Node),
        ),
        Axis::DescendantOrSelf => XdmSequenceStream::from_iterator(
            Descendants::and_self(&node).filter(keep).map(XdmItem::Node),
        ),
    };
    Ok(stream)
}

/// Sorts an all-node result into document order and drops duplicates.
/// Atomic results keep their order; a mix is an error.
fn into_document_order<N: XdmNode>(mut items: XdmSequence<N>) -> Result<XdmSequence<N>, Error> {
    let nodes = items
        .iter()
        .filter(|i| matches!(i, XdmItem::Node(_)))
        .count();
    if nodes == 0 {
        return Ok(items);
    }
    if nodes != items.len() {
        return Err(Error::from_code(
            ErrorCode::XPTY0018,
            "path result mixes nodes and non-node items",
        ));
    }
    let mut failure = None;
    items.sort_by(|a, b| match (a, b) {
        (XdmItem::Node(x), XdmItem::Node(y)) => x.compare_document_order(y).unwrap_or_else(|e| {
            failure.get_or_insert(e);
            Ordering::Equal
        }),
        _ => Ordering::Equal,
    });
    if let Some(e) = failure {
        return Err(e);
    }
    items.dedup_by(|a, b| matches!((a, b), (XdmItem::Node(x), XdmItem::Node(y)) if x == y));
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::functions::default_function_registry;
    use crate::simple_node::{SimpleNode, attr, doc, elem, text};
    use rstest::rstest;

    type E = Expr<SimpleNode>;

    fn ctx() -> DynamicContext<SimpleNode> {
        DynamicContext::builder()
            .with_functions(Arc::new(default_function_registry()))
            .build()
    }

    fn eval(expr: &E, ctx: &DynamicContext<SimpleNode>) -> Result<Vec<XdmAtomicValue>, Error> {
        expr.evaluate(ctx)
            .materialize()?
            .into_iter()
            .map(|item| match item {
                XdmItem::Atomic(a) => Ok(a),
                other => Err(Error::type_error(item_kind_name(&other))),
            })
            .collect()
    }

    fn int(i: i64) -> E {
        Expr::literal(i)
    }

    #[test]
    fn arithmetic_and_comparison() {
        let c = ctx();
        let sum = Expr::arithmetic(ArithmeticOp::Add, int(1), Expr::literal(2.5));
        assert_eq!(eval(&sum, &c).unwrap(), vec![XdmAtomicValue::Double(3.5)]);
        let cmp = Expr::compare(ComparisonOp::Lt, int(1), int(2));
        assert_eq!(eval(&cmp, &c).unwrap(), vec![XdmAtomicValue::Boolean(true)]);
        let with_empty = Expr::arithmetic(ArithmeticOp::Add, int(1), Expr::empty());
        assert!(eval(&with_empty, &c).unwrap().is_empty());
    }

    #[test]
    fn right_operand_of_and_is_not_evaluated_when_left_is_false() {
        let c = ctx();
        let failing = Expr::arithmetic(ArithmeticOp::IDiv, int(1), int(0));
        let expr = Expr::and(Expr::call("false", []), failing.clone());
        assert_eq!(eval(&expr, &c).unwrap(), vec![XdmAtomicValue::Boolean(false)]);
        let expr = Expr::or(Expr::call("true", []), failing);
        assert_eq!(eval(&expr, &c).unwrap(), vec![XdmAtomicValue::Boolean(true)]);
    }

    #[test]
    fn for_let_and_if() {
        let c = ctx();
        // for $x in 1 to 3 return if ($x eq 2) then () else $x * 10
        let body = Expr::if_then_else(
            Expr::compare(ComparisonOp::Eq, Expr::var("x"), int(2)),
            Expr::empty(),
            Expr::arithmetic(ArithmeticOp::Mul, Expr::var("x"), int(10)),
        );
        let expr = Expr::for_in("x", Expr::range(int(1), int(3)), body);
        assert_eq!(
            eval(&expr, &c).unwrap(),
            vec![XdmAtomicValue::Integer(10), XdmAtomicValue::Integer(30)]
        );
        let doubled = Expr::arithmetic(ArithmeticOp::Add, Expr::var("v"), Expr::var("v"));
        let expr = Expr::let_in("v", int(4), doubled);
        assert_eq!(eval(&expr, &c).unwrap(), vec![XdmAtomicValue::Integer(8)]);
    }

    #[test]
    fn unbound_variable_is_reported_through_the_stream() {
        let err = eval(&Expr::var("missing"), &ctx()).unwrap_err();
        assert_eq!(err.code_enum(), ErrorCode::XPST0008);
    }

    #[rstest]
    #[case(int(2), vec![20])]
    #[case(Expr::call("last", []), vec![30])]
    #[case(Expr::compare(ComparisonOp::Gt, Expr::ContextItem, int(15)), vec![20, 30])]
    fn filter_predicates(#[case] predicate: E, #[case] expected: Vec<i64>) {
        let base = Expr::sequence([int(10), int(20), int(30)]);
        let expr = Expr::filter(base, predicate);
        let expected: Vec<XdmAtomicValue> = expected.into_iter().map(Into::into).collect();
        assert_eq!(eval(&expr, &ctx()).unwrap(), expected);
    }

    #[test]
    fn position_filter_on_huge_range_is_lazy() {
        let expr = Expr::filter(Expr::range(int(1), int(i64::MAX)), int(3));
        assert_eq!(eval(&expr, &ctx()).unwrap(), vec![XdmAtomicValue::Integer(3)]);
    }

    #[test]
    fn last_counts_an_unsized_base() {
        // (1 to 5)[. mod 2 eq 1] ! last()
        let odd = Expr::filter(
            Expr::range(int(1), int(5)),
            Expr::compare(
                ComparisonOp::Eq,
                Expr::arithmetic(ArithmeticOp::Mod, Expr::ContextItem, int(2)),
                int(1),
            ),
        );
        let expr = Expr::simple_map(odd, Expr::call("last", []));
        assert_eq!(eval(&expr, &ctx()).unwrap(), vec![XdmAtomicValue::Integer(3); 3]);
    }

    #[test]
    fn placeholders_build_a_partial_application() {
        let c = ctx();
        // concat("a", ?, "c")("b")
        let partial = Expr::call(
            "concat",
            [Expr::literal("a").into(), CallArg::Placeholder, Expr::literal("c").into()],
        );
        let expr = Expr::dynamic_call(partial, [Expr::literal("b").into()]);
        assert_eq!(eval(&expr, &c).unwrap(), vec![XdmAtomicValue::String("abc".into())]);
    }

    #[test]
    fn named_reference_is_callable() {
        let expr = Expr::dynamic_call(Expr::function_ref("abs", 1), [int(-4).into()]);
        assert_eq!(eval(&expr, &ctx()).unwrap(), vec![XdmAtomicValue::Integer(4)]);
        let err = eval(&Expr::function_ref("abs", 3), &ctx()).unwrap_err();
        assert_eq!(err.code_enum(), ErrorCode::XPST0017);
    }

    fn tree() -> SimpleNode {
        doc()
            .child(
                elem("root")
                    .attr(attr("id", "r"))
                    .child(elem("a").child(text("one")))
                    .child(elem("b").child(elem("a").child(text("two")))),
            )
            .build()
    }

    fn strings(items: XdmSequence<SimpleNode>) -> Vec<String> {
        items
            .into_iter()
            .map(|i| match i {
                XdmItem::Node(n) => n.string_value(),
                XdmItem::Atomic(a) => a.lexical(),
                other => item_kind_name(&other),
            })
            .collect()
    }

    #[test]
    fn axis_steps_and_paths() {
        let c = DynamicContext::builder()
            .with_context_item(XdmItem::Node(tree()))
            .build();
        // //a
        let all_a = Expr::path(
            Expr::step(Axis::DescendantOrSelf, NodeTest::AnyKind),
            Expr::step(Axis::Child, NodeTest::name("a")),
        );
        assert_eq!(strings(all_a.evaluate(&c).materialize().unwrap()), vec!["one", "two"]);
        // root/@id
        let id = Expr::path(
            Expr::step(Axis::Child, NodeTest::Wildcard),
            Expr::step(Axis::Attribute, NodeTest::name("id")),
        );
        assert_eq!(strings(id.evaluate(&c).materialize().unwrap()), vec!["r"]);
        // //a/.. yields each parent once
        let parents = Expr::path(all_a, Expr::step(Axis::Parent, NodeTest::AnyKind));
        assert_eq!(parents.evaluate(&c).materialize().unwrap().len(), 2);
    }

    #[test]
    fn text_kind_test_on_descendants() {
        let c = DynamicContext::builder()
            .with_context_item(XdmItem::Node(tree()))
            .build();
        let texts = Expr::step(Axis::Descendant, NodeTest::Kind(NodeKind::Text));
        assert_eq!(strings(texts.evaluate(&c).materialize().unwrap()), vec!["one", "two"]);
    }

    #[test]
    fn step_on_atomic_context_fails() {
        let c = DynamicContext::<SimpleNode>::builder()
            .with_context_item(XdmAtomicValue::Integer(1))
            .build();
        let err = Expr::step(Axis::Child, NodeTest::AnyKind)
            .evaluate(&c)
            .materialize()
            .unwrap_err();
        assert_eq!(err.code_enum(), ErrorCode::XPTY0020);
    }

    #[test]
    fn mixed_path_result_is_rejected() {
        let c = DynamicContext::builder()
            .with_context_item(XdmItem::Node(tree()))
            .build();
        let mixed = Expr::path(
            Expr::step(Axis::Child, NodeTest::AnyKind),
            Expr::sequence([Expr::ContextItem, int(1)]),
        );
        let err = mixed.evaluate(&c).materialize().unwrap_err();
        assert_eq!(err.code_enum(), ErrorCode::XPTY0018);
    }
}
