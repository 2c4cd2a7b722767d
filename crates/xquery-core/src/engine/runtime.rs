use core::fmt;
use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Offset};

use crate::engine::operators::OperatorCache;
use crate::engine::registry::FunctionRegistry;
use crate::model::XdmNode;
use crate::xdm::{ExpandedName, ReplayableSequence, XdmItem, XdmSequence, XdmSequenceStream};

pub use crate::consts::ERR_NS;

/// Error codes raised by the evaluation core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    FOAR0001, // division by zero
    FOAR0002, // numeric overflow/underflow, idiv of NaN or INF
    FOAY0001, // array index out of bounds
    FOCA0002, // invalid lexical value (numeric range)
    FOCA0003, // input value too large for integer
    FOCA0005, // NaN supplied as float/double value to duration arithmetic
    FODT0001, // overflow/underflow in date/time operation
    FODT0002, // overflow/underflow in duration operation
    FOER0000, // unidentified error
    FORG0001, // invalid value for cast/constructor
    FORG0006, // invalid argument type (effective boolean value)
    FOTY0013, // atomization of a function item
    FOTY0014, // string value of a function item
    XPDY0002, // context item absent
    XPST0008, // undefined variable
    XPST0017, // unknown function or wrong arity
    XPST0080, // cast to NOTATION or an abstract type
    XPST0081, // unbound namespace prefix
    XPTY0004, // type mismatch
    XPTY0018, // path result mixes nodes and atomic values
    XPTY0019, // path step input is not a node
    XPTY0020, // axis step context item is not a node
    Unknown,
}

impl ErrorCode {
    const ALL: &'static [ErrorCode] = &[
        ErrorCode::FOAR0001,
        ErrorCode::FOAR0002,
        ErrorCode::FOAY0001,
        ErrorCode::FOCA0002,
        ErrorCode::FOCA0003,
        ErrorCode::FOCA0005,
        ErrorCode::FODT0001,
        ErrorCode::FODT0002,
        ErrorCode::FOER0000,
        ErrorCode::FORG0001,
        ErrorCode::FORG0006,
        ErrorCode::FOTY0013,
        ErrorCode::FOTY0014,
        ErrorCode::XPDY0002,
        ErrorCode::XPST0008,
        ErrorCode::XPST0017,
        ErrorCode::XPST0080,
        ErrorCode::XPST0081,
        ErrorCode::XPTY0004,
        ErrorCode::XPTY0018,
        ErrorCode::XPTY0019,
        ErrorCode::XPTY0020,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::FOAR0001 => "FOAR0001",
            ErrorCode::FOAR0002 => "FOAR0002",
            ErrorCode::FOAY0001 => "FOAY0001",
            ErrorCode::FOCA0002 => "FOCA0002",
            ErrorCode::FOCA0003 => "FOCA0003",
            ErrorCode::FOCA0005 => "FOCA0005",
            ErrorCode::FODT0001 => "FODT0001",
            ErrorCode::FODT0002 => "FODT0002",
            ErrorCode::FOER0000 => "FOER0000",
            ErrorCode::FORG0001 => "FORG0001",
            ErrorCode::FORG0006 => "FORG0006",
            ErrorCode::FOTY0013 => "FOTY0013",
            ErrorCode::FOTY0014 => "FOTY0014",
            ErrorCode::XPDY0002 => "XPDY0002",
            ErrorCode::XPST0008 => "XPST0008",
            ErrorCode::XPST0017 => "XPST0017",
            ErrorCode::XPST0080 => "XPST0080",
            ErrorCode::XPST0081 => "XPST0081",
            ErrorCode::XPTY0004 => "XPTY0004",
            ErrorCode::XPTY0018 => "XPTY0018",
            ErrorCode::XPTY0019 => "XPTY0019",
            ErrorCode::XPTY0020 => "XPTY0020",
            ErrorCode::Unknown => "UNKNOWN",
        }
    }

    /// The code as a name in the `err` namespace.
    pub fn qname(self) -> ExpandedName {
        ExpandedName::new(Some(ERR_NS.to_string()), self.as_str())
    }

    /// Parse `err:LOCAL` (or a bare `LOCAL`).
    pub fn from_code(s: &str) -> Self {
        let local = s.strip_prefix("err:").unwrap_or(s);
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == local)
            .unwrap_or(ErrorCode::Unknown)
    }
}

/// A structured evaluation failure. Cheap to clone so a failed sequence can
/// hand out the same error on every pull.
#[derive(Debug, Clone, thiserror::Error)]
pub struct Error {
    pub code: ExpandedName,
    pub message: String,
    #[source]
    pub source: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

impl Error {
    pub fn new_qname(code: ExpandedName, msg: impl Into<String>) -> Self {
        Self {
            code,
            message: msg.into(),
            source: None,
        }
    }

    pub fn from_code(code: ErrorCode, msg: impl Into<String>) -> Self {
        Self::new_qname(code.qname(), msg)
    }

    pub fn with_source(
        mut self,
        source: impl Into<Option<Arc<dyn std::error::Error + Send + Sync>>>,
    ) -> Self {
        self.source = source.into();
        self
    }

    pub fn code_enum(&self) -> ErrorCode {
        if self.code.ns_uri.as_deref() == Some(ERR_NS) {
            ErrorCode::from_code(&self.code.local)
        } else {
            ErrorCode::Unknown
        }
    }

    /// `err:LOCAL` for W3C codes, `Q{ns}local` otherwise.
    pub fn format_code(&self) -> String {
        match self.code.ns_uri.as_deref() {
            Some(ERR_NS) => format!("err:{}", self.code.local),
            Some(ns) => format!("Q{{{}}}{}", ns, self.code.local),
            None => self.code.local.clone(),
        }
    }

    pub(crate) fn type_error(msg: impl Into<String>) -> Self {
        Self::from_code(ErrorCode::XPTY0004, msg)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "error: {} ({})", self.message, self.format_code())
    }
}

impl From<rust_decimal::Error> for Error {
    fn from(e: rust_decimal::Error) -> Self {
        Error::from_code(ErrorCode::FOAR0002, "decimal overflow")
            .with_source(Some(Arc::new(e) as Arc<dyn std::error::Error + Send + Sync>))
    }
}

/// Prefix to namespace URI lookup used when resolving lexical QNames.
pub trait NamespaceResolver: Send + Sync {
    fn resolve(&self, prefix: &str) -> Option<String>;
}

#[derive(Debug, Clone)]
pub struct NamespaceBindings {
    pub by_prefix: HashMap<String, String>,
}

impl Default for NamespaceBindings {
    fn default() -> Self {
        let mut by_prefix = HashMap::new();
        by_prefix.insert("xml".to_string(), crate::consts::XML_URI.to_string());
        by_prefix.insert("xs".to_string(), crate::consts::XS.to_string());
        by_prefix.insert("fn".to_string(), crate::consts::FNS.to_string());
        by_prefix.insert("err".to_string(), ERR_NS.to_string());
        Self { by_prefix }
    }
}

impl NamespaceResolver for NamespaceBindings {
    fn resolve(&self, prefix: &str) -> Option<String> {
        self.by_prefix.get(prefix).cloned()
    }
}

/// Zero-argument producer of a variable's value. Called once per reference;
/// every call yields a fresh reader over the same items.
pub type VariableProducer<N> = Arc<dyn Fn() -> XdmSequenceStream<N> + Send + Sync>;

/// Context item, position and size. `sequence` is set when the focus ranges
/// over a sequence whose length is not known up front; `fn:last` counts it.
pub struct Focus<N> {
    pub item: XdmItem<N>,
    pub position: usize,
    pub size: Option<usize>,
    pub sequence: Option<ReplayableSequence<N>>,
}

impl<N: Clone> Clone for Focus<N> {
    fn clone(&self) -> Self {
        Self {
            item: self.item.clone(),
            position: self.position,
            size: self.size,
            sequence: self.sequence.clone(),
        }
    }
}

impl<N> Focus<N> {
    pub fn singleton(item: XdmItem<N>) -> Self {
        Self {
            item,
            position: 1,
            size: Some(1),
            sequence: None,
        }
    }
}

enum Scope<N> {
    Root,
    Focus {
        parent: Arc<Scope<N>>,
        focus: Focus<N>,
    },
    Variable {
        parent: Arc<Scope<N>>,
        name: ExpandedName,
        producer: VariableProducer<N>,
    },
}

struct SharedContext<N> {
    functions: Arc<FunctionRegistry<N>>,
    operators: Arc<OperatorCache>,
    now: DateTime<FixedOffset>,
    timezone: FixedOffset,
    namespaces: Arc<dyn NamespaceResolver>,
    default_function_namespace: Option<String>,
}

/// Per-evaluation dynamic context.
///
/// Immutable: scoping constructs derive child contexts with
/// [`with_focus`](Self::with_focus) and [`bind_variable`](Self::bind_variable),
/// which share their parent by reference. Closures that captured a context
/// keep seeing exactly the bindings in effect when they were created.
pub struct DynamicContext<N> {
    scope: Arc<Scope<N>>,
    shared: Arc<SharedContext<N>>,
}

impl<N> Clone for DynamicContext<N> {
    fn clone(&self) -> Self {
        Self {
            scope: Arc::clone(&self.scope),
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<N: XdmNode + 'static> DynamicContext<N> {
    pub fn builder() -> DynamicContextBuilder<N> {
        DynamicContextBuilder::new()
    }

    pub fn with_focus(&self, focus: Focus<N>) -> Self {
        Self {
            scope: Arc::new(Scope::Focus {
                parent: Arc::clone(&self.scope),
                focus,
            }),
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn bind_variable(&self, name: ExpandedName, producer: VariableProducer<N>) -> Self {
        Self {
            scope: Arc::new(Scope::Variable {
                parent: Arc::clone(&self.scope),
                name,
                producer,
            }),
            shared: Arc::clone(&self.shared),
        }
    }

    /// Bind a single-pass sequence; it is buffered on first read so every
    /// reference sees the same items.
    pub fn bind_sequence(&self, name: ExpandedName, value: XdmSequenceStream<N>) -> Self {
        let replay = ReplayableSequence::buffered(value);
        self.bind_variable(name, Arc::new(move || replay.replay()))
    }

    pub fn variable(&self, name: &ExpandedName) -> Result<XdmSequenceStream<N>, Error> {
        let mut cur = &self.scope;
        loop {
            match cur.as_ref() {
                Scope::Root => {
                    return Err(Error::from_code(
                        ErrorCode::XPST0008,
                        format!("variable ${name} is not bound"),
                    ));
                }
                Scope::Focus { parent, .. } => cur = parent,
                Scope::Variable {
                    parent,
                    name: bound,
                    producer,
                } => {
                    if bound == name {
                        return Ok(producer());
                    }
                    cur = parent;
                }
            }
        }
    }

    pub fn focus(&self) -> Option<&Focus<N>> {
        let mut cur = &self.scope;
        loop {
            match cur.as_ref() {
                Scope::Root => return None,
                Scope::Focus { focus, .. } => return Some(focus),
                Scope::Variable { parent, .. } => cur = parent,
            }
        }
    }

    pub fn context_item(&self) -> Result<&XdmItem<N>, Error> {
        self.focus()
            .map(|f| &f.item)
            .ok_or_else(|| Error::from_code(ErrorCode::XPDY0002, "context item is absent"))
    }

    pub fn context_position(&self) -> Result<usize, Error> {
        self.focus()
            .map(|f| f.position)
            .ok_or_else(|| Error::from_code(ErrorCode::XPDY0002, "context position is absent"))
    }

    /// Context size as a sequence holding one integer. Counting may suspend
    /// when the focus ranges over a lazily produced sequence.
    pub fn context_size(&self) -> XdmSequenceStream<N> {
        let Some(focus) = self.focus() else {
            return XdmSequenceStream::failed(Error::from_code(
                ErrorCode::XPDY0002,
                "context size is absent",
            ));
        };
        let to_item = |n: usize| -> Result<XdmItem<N>, Error> {
            i64::try_from(n)
                .map(|v| XdmItem::Atomic(v.into()))
                .map_err(|_| Error::from_code(ErrorCode::FOAR0002, "context size overflow"))
        };
        match (focus.size, &focus.sequence) {
            (Some(n), _) => match to_item(n) {
                Ok(item) => XdmSequenceStream::singleton(item),
                Err(e) => XdmSequenceStream::failed(e),
            },
            (None, Some(seq)) => seq
                .replay()
                .map_all(move |items: XdmSequence<N>| Ok(vec![to_item(items.len())?])),
            (None, None) => XdmSequenceStream::failed(Error::from_code(
                ErrorCode::XPDY0002,
                "context size is unknown",
            )),
        }
    }

    pub fn functions(&self) -> &Arc<FunctionRegistry<N>> {
        &self.shared.functions
    }

    pub fn operators(&self) -> &Arc<OperatorCache> {
        &self.shared.operators
    }

    /// Fixed for the whole evaluation.
    pub fn current_date_time(&self) -> DateTime<FixedOffset> {
        self.shared.now
    }

    pub fn implicit_timezone(&self) -> FixedOffset {
        self.shared.timezone
    }

    pub fn resolve_prefix(&self, prefix: &str) -> Option<String> {
        self.shared.namespaces.resolve(prefix)
    }

    pub fn default_function_namespace(&self) -> Option<&str> {
        self.shared.default_function_namespace.as_deref()
    }
}

/// Call-site information passed to function implementations.
pub struct CallCtx<'a, N> {
    pub dyn_ctx: &'a DynamicContext<N>,
    pub name: &'a ExpandedName,
}

pub struct DynamicContextBuilder<N> {
    focus: Option<Focus<N>>,
    variables: Vec<(ExpandedName, VariableProducer<N>)>,
    functions: Option<Arc<FunctionRegistry<N>>>,
    operators: Option<Arc<OperatorCache>>,
    now: Option<DateTime<FixedOffset>>,
    timezone: Option<FixedOffset>,
    namespaces: NamespaceBindings,
    resolver: Option<Arc<dyn NamespaceResolver>>,
    default_function_namespace: Option<String>,
}

impl<N: XdmNode + 'static> Default for DynamicContextBuilder<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N: XdmNode + 'static> DynamicContextBuilder<N> {
    pub fn new() -> Self {
        Self {
            focus: None,
            variables: Vec::new(),
            functions: None,
            operators: None,
            now: None,
            timezone: None,
            namespaces: NamespaceBindings::default(),
            resolver: None,
            default_function_namespace: Some(crate::consts::FNS.to_string()),
        }
    }

    pub fn with_context_item(mut self, item: impl Into<XdmItem<N>>) -> Self {
        self.focus = Some(Focus::singleton(item.into()));
        self
    }

    /// Focus on the first item of `items`, with the size of the whole
    /// sequence. An empty sequence leaves the focus absent.
    pub fn with_context_sequence(mut self, items: XdmSequence<N>) -> Self {
        self.focus = items.first().cloned().map(|item| Focus {
            item,
            position: 1,
            size: Some(items.len()),
            sequence: Some(ReplayableSequence::from_items(items)),
        });
        self
    }

    pub fn with_variable(mut self, name: ExpandedName, value: impl Into<XdmSequence<N>>) -> Self {
        let replay = ReplayableSequence::from_items(value.into());
        self.variables.push((name, Arc::new(move || replay.replay())));
        self
    }

    pub fn with_variable_producer(
        mut self,
        name: ExpandedName,
        producer: VariableProducer<N>,
    ) -> Self {
        self.variables.push((name, producer));
        self
    }

    pub fn with_functions(mut self, reg: Arc<FunctionRegistry<N>>) -> Self {
        self.functions = Some(reg);
        self
    }

    /// Share an operator cache between evaluations.
    pub fn with_operators(mut self, cache: Arc<OperatorCache>) -> Self {
        self.operators = Some(cache);
        self
    }

    pub fn with_now(mut self, now: DateTime<FixedOffset>) -> Self {
        self.now = Some(now);
        self
    }

    /// Implicit timezone as an offset from UTC in minutes. Out-of-range
    /// offsets are ignored.
    pub fn with_timezone(mut self, offset_minutes: i32) -> Self {
        if let Some(tz) = offset_minutes.checked_mul(60).and_then(FixedOffset::east_opt) {
            self.timezone = Some(tz);
        }
        self
    }

    /// Bind a prefix. The reserved `xml` prefix cannot be rebound.
    pub fn with_namespace(mut self, prefix: impl Into<String>, uri: impl Into<String>) -> Self {
        let p = prefix.into();
        if p != "xml" {
            self.namespaces.by_prefix.insert(p, uri.into());
        }
        self
    }

    /// Replace prefix resolution entirely.
    pub fn with_namespace_resolver(mut self, resolver: Arc<dyn NamespaceResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn with_default_function_namespace(mut self, uri: Option<String>) -> Self {
        self.default_function_namespace = uri;
        self
    }

    pub fn build(self) -> DynamicContext<N> {
        let timezone = self.timezone.unwrap_or_else(|| chrono::Utc.fix());
        let now = self
            .now
            .unwrap_or_else(|| chrono::Utc::now().with_timezone(&timezone));
        let functions = self
            .functions
            .unwrap_or_else(|| Arc::new(crate::engine::functions::default_function_registry()));
        let namespaces = self
            .resolver
            .unwrap_or_else(|| Arc::new(self.namespaces) as Arc<dyn NamespaceResolver>);
        let shared = Arc::new(SharedContext {
            functions,
            operators: self.operators.unwrap_or_default(),
            now,
            timezone,
            namespaces,
            default_function_namespace: self.default_function_namespace,
        });
        let mut scope = Arc::new(Scope::Root);
        for (name, producer) in self.variables {
            scope = Arc::new(Scope::Variable {
                parent: scope,
                name,
                producer,
            });
        }
        if let Some(focus) = self.focus {
            scope = Arc::new(Scope::Focus {
                parent: scope,
                focus,
            });
        }
        DynamicContext { scope, shared }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simple_node::SimpleNode;
    use crate::xdm::XdmAtomicValue;

    type Ctx = DynamicContext<SimpleNode>;

    fn ints(seq: XdmSequenceStream<SimpleNode>) -> Vec<i64> {
        seq.materialize()
            .unwrap()
            .into_iter()
            .map(|i| match i {
                XdmItem::Atomic(XdmAtomicValue::Integer(v)) => v,
                other => panic!("unexpected item: {other:?}"),
            })
            .collect()
    }

    #[test]
    fn out_of_range_timezones_are_ignored() {
        for minutes in [i32::MAX, i32::MIN, 24 * 60] {
            let ctx = Ctx::builder().with_timezone(minutes).build();
            assert_eq!(ctx.implicit_timezone().local_minus_utc(), 0);
        }
        let ctx = Ctx::builder().with_timezone(-300).build();
        assert_eq!(ctx.implicit_timezone().local_minus_utc(), -300 * 60);
    }

    #[test]
    fn error_code_formats_in_err_namespace() {
        let e = Error::from_code(ErrorCode::FOAR0001, "boom");
        assert_eq!(e.format_code(), "err:FOAR0001");
        assert_eq!(e.code_enum(), ErrorCode::FOAR0001);
        assert_eq!(e.to_string(), "error: boom (err:FOAR0001)");
        assert_eq!(ErrorCode::from_code("err:XPTY0004"), ErrorCode::XPTY0004);
        assert_eq!(ErrorCode::from_code("nope"), ErrorCode::Unknown);
    }

    #[test]
    fn child_scopes_do_not_affect_parent() {
        let x = ExpandedName::local("x");
        let root: Ctx = DynamicContextBuilder::new()
            .with_variable(x.clone(), vec![XdmItem::Atomic(1i64.into())])
            .build();
        let child = root.bind_sequence(x.clone(), XdmSequenceStream::from_vec(vec![XdmItem::Atomic(2i64.into())]));
        assert_eq!(ints(child.variable(&x).unwrap()), vec![2]);
        assert_eq!(ints(root.variable(&x).unwrap()), vec![1]);
        // every reference reads the full value
        assert_eq!(ints(child.variable(&x).unwrap()), vec![2]);
    }

    #[test]
    fn unbound_variable_and_absent_focus_fail() {
        let ctx: Ctx = DynamicContextBuilder::new().build();
        let err = ctx.variable(&ExpandedName::local("nope")).err().unwrap();
        assert_eq!(err.code_enum(), ErrorCode::XPST0008);
        assert_eq!(ctx.context_item().unwrap_err().code_enum(), ErrorCode::XPDY0002);
    }

    #[test]
    fn context_sequence_sets_size() {
        let items: Vec<XdmItem<SimpleNode>> = (1..=3).map(|i| XdmItem::Atomic(XdmAtomicValue::Integer(i))).collect();
        let ctx: Ctx = DynamicContextBuilder::new().with_context_sequence(items).build();
        assert_eq!(ctx.context_position().unwrap(), 1);
        assert_eq!(ints(ctx.context_size()), vec![3]);
    }

    #[test]
    fn clock_and_timezone_are_fixed() {
        let now = chrono::DateTime::parse_from_rfc3339("2024-05-06T07:08:09+02:00").unwrap();
        let ctx: Ctx = DynamicContextBuilder::new().with_now(now).with_timezone(120).build();
        assert_eq!(ctx.current_date_time(), now);
        assert_eq!(ctx.implicit_timezone().local_minus_utc(), 7200);
        assert_eq!(ctx.resolve_prefix("xml").as_deref(), Some(crate::consts::XML_URI));
    }
}
