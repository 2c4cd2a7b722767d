//! Runtime core of an XPath/XQuery 3.1 evaluator.
//!
//! The crate covers what sits between a compiled expression and a result:
//! the XDM type lattice, lazy sequences that can suspend on host-supplied
//! values, operator dispatch with a per-type-pair cache, and the function
//! call protocol with argument conversion and partial application.
//! Parsing and static analysis live elsewhere; expressions are built
//! directly as [`Expr`] trees.

pub mod consts;
pub mod engine;
pub mod model;
pub mod simple_node;
pub mod xdm;

pub use engine::call::{
    Argument, FunctionItem, FunctionSignature, Occurrence, ParamTypeSpec, call_item,
    partially_apply,
};
pub use engine::casting::cast_atomic;
pub use engine::expr::{Axis, CallArg, Expr, NodeTest};
pub use engine::functions::default_function_registry;
pub use engine::operators::{ArithmeticOp, ComparisonOp, OperatorCache, UnaryOp};
pub use engine::registry::{FunctionRegistry, ResolveError};
pub use engine::runtime::{
    CallCtx, DynamicContext, DynamicContextBuilder, Error, ErrorCode, Focus,
};
pub use model::{NodeKind, QName, XdmNode};
pub use simple_node::{SimpleNode, SimpleNodeBuilder, attr, comment, doc, elem, ns, text};
pub use xdm::{
    Advance, Cardinality, Deferred, ExpandedName, Progress, ReplayableSequence, ResumeSignal,
    XdmArray, XdmAtomicValue, XdmItem, XdmMap, XdmSequence, XdmSequenceStream, XdmType, deferred,
};
