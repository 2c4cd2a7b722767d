//! Named function lookup.
//!
//! Each name maps to one or more overloads. A call first filters overloads
//! by arity; argument conversion then decides between the remaining ones
//! (see [`invoke_overloads`]).

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use itertools::Itertools;

use crate::engine::call::{
    Arity, FunctionItem, FunctionSignature, Occurrence, ParamTypeSpec, invoke_overloads,
};
use crate::engine::runtime::{CallCtx, DynamicContext, Error, ErrorCode};
use crate::model::XdmNode;
use crate::xdm::{ExpandedName, XdmSequenceStream};

const MAX_SUGGESTIONS: usize = 3;

/// Why a name/arity pair could not be resolved.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolveError {
    /// No function has this name. Carries close names, best first.
    Unknown {
        name: ExpandedName,
        suggestions: Vec<ExpandedName>,
    },
    /// The name exists with other arities.
    WrongArity {
        name: ExpandedName,
        available: Vec<Arity>,
        variadic_from: Option<Arity>,
    },
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolveError::Unknown { name, suggestions } if suggestions.is_empty() => {
                write!(f, "unknown function {name}")
            }
            ResolveError::Unknown { name, suggestions } => write!(
                f,
                "unknown function {name}; did you mean {}?",
                suggestions.iter().join(", ")
            ),
            ResolveError::WrongArity {
                name,
                available,
                variadic_from,
            } => {
                write!(f, "function {name} has no overload with this arity; available: ")?;
                let mut parts = available.iter().map(ToString::to_string).collect::<Vec<_>>();
                if let Some(min) = variadic_from {
                    parts.push(format!("{min} or more"));
                }
                f.write_str(&parts.join(", "))
            }
        }
    }
}

impl From<ResolveError> for Error {
    fn from(err: ResolveError) -> Self {
        Error::from_code(ErrorCode::XPST0017, err.to_string())
    }
}

pub struct FunctionRegistry<N> {
    fns: HashMap<ExpandedName, Vec<Arc<FunctionItem<N>>>>,
}

impl<N> Default for FunctionRegistry<N> {
    fn default() -> Self {
        Self { fns: HashMap::new() }
    }
}

impl<N> fmt::Debug for FunctionRegistry<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("names", &self.fns.len())
            .finish()
    }
}

/// Classic Levenshtein distance over chars.
fn edit_distance(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut row: Vec<usize> = (0..=b.len()).collect();
    for (i, ca) in a.chars().enumerate() {
        let mut diag = row[0];
        row[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let above = row[j + 1];
            row[j + 1] = if ca == *cb {
                diag
            } else {
                1 + diag.min(above).min(row[j])
            };
            diag = above;
        }
    }
    row[b.len()]
}

impl<N> FunctionRegistry<N> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct names.
    pub fn len(&self) -> usize {
        self.fns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fns.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &ExpandedName> {
        self.fns.keys()
    }

    /// Add an overload. An existing overload with an identical parameter
    /// list is replaced.
    pub fn register(&mut self, name: ExpandedName, item: FunctionItem<N>) {
        let overloads = self.fns.entry(name).or_default();
        overloads.retain(|o| {
            o.signature.params != item.signature.params || o.signature.rest != item.signature.rest
        });
        overloads.push(Arc::new(item));
    }

    /// Register a fixed-arity function.
    pub fn register_function<F>(
        &mut self,
        name: ExpandedName,
        params: Vec<ParamTypeSpec>,
        returns: ParamTypeSpec,
        f: F,
    ) where
        F: Fn(&CallCtx<N>, Vec<XdmSequenceStream<N>>) -> Result<XdmSequenceStream<N>, Error>
            + Send
            + Sync
            + 'static,
    {
        let item = FunctionItem::from_fn(Some(name.clone()), FunctionSignature::new(params, returns), f);
        self.register(name, item);
    }

    /// Register a function accepting any number of trailing `rest` arguments.
    pub fn register_variadic<F>(
        &mut self,
        name: ExpandedName,
        params: Vec<ParamTypeSpec>,
        rest: ParamTypeSpec,
        returns: ParamTypeSpec,
        f: F,
    ) where
        F: Fn(&CallCtx<N>, Vec<XdmSequenceStream<N>>) -> Result<XdmSequenceStream<N>, Error>
            + Send
            + Sync
            + 'static,
    {
        let signature = FunctionSignature::variadic(params, rest, returns);
        let item = FunctionItem::from_fn(Some(name.clone()), signature, f);
        self.register(name, item);
    }

    fn effective_name(name: &ExpandedName, default_ns: Option<&str>) -> ExpandedName {
        match (&name.ns_uri, default_ns) {
            (None, Some(ns)) => ExpandedName::new(Some(ns.to_string()), name.local.clone()),
            _ => name.clone(),
        }
    }

    fn suggestions(&self, name: &ExpandedName) -> Vec<ExpandedName> {
        let threshold = (name.local.chars().count() / 3).max(2);
        self.fns
            .keys()
            .map(|candidate| (edit_distance(&name.local, &candidate.local), candidate))
            .filter(|(d, _)| *d <= threshold)
            .sorted_by(|(d1, n1), (d2, n2)| d1.cmp(d2).then_with(|| n1.local.cmp(&n2.local)))
            .take(MAX_SUGGESTIONS)
            .map(|(_, n)| n.clone())
            .collect()
    }

    /// All overloads of `name` that accept `arity` arguments. An unprefixed
    /// name is looked up as written first, then in `default_ns`.
    pub fn resolve(
        &self,
        name: &ExpandedName,
        arity: Arity,
        default_ns: Option<&str>,
    ) -> Result<Vec<Arc<FunctionItem<N>>>, ResolveError> {
        let effective = Self::effective_name(name, default_ns);
        let found = self
            .fns
            .get_key_value(name)
            .filter(|(_, overloads)| overloads.iter().any(|o| o.signature.accepts_arity(arity)))
            .or_else(|| self.fns.get_key_value(&effective));
        let Some((found_name, overloads)) = found else {
            let suggestions = self.suggestions(&effective);
            tracing::debug!(name = %effective, ?suggestions, "unknown function");
            return Err(ResolveError::Unknown {
                name: effective,
                suggestions,
            });
        };
        let matching: Vec<_> = overloads
            .iter()
            .filter(|o| o.signature.accepts_arity(arity))
            .cloned()
            .collect();
        if matching.is_empty() {
            let available = overloads
                .iter()
                .filter(|o| !o.signature.is_variadic())
                .map(|o| o.arity())
                .sorted_unstable()
                .dedup()
                .collect();
            let variadic_from = overloads
                .iter()
                .filter(|o| o.signature.is_variadic())
                .map(|o| o.arity())
                .min();
            tracing::debug!(name = %found_name, arity, "function arity mismatch");
            return Err(ResolveError::WrongArity {
                name: found_name.clone(),
                available,
                variadic_from,
            });
        }
        Ok(matching)
    }
}

impl<N: XdmNode + 'static> FunctionRegistry<N> {
    /// Resolve and invoke a static function call.
    pub fn call(
        &self,
        ctx: &DynamicContext<N>,
        name: &ExpandedName,
        args: Vec<XdmSequenceStream<N>>,
    ) -> Result<XdmSequenceStream<N>, Error> {
        let candidates = self.resolve(name, args.len(), ctx.default_function_namespace())?;
        invoke_overloads(ctx, name, candidates, args)
    }

    /// Named function reference (`name#arity`) as a function item.
    pub fn function_ref(
        &self,
        name: &ExpandedName,
        arity: Arity,
        default_ns: Option<&str>,
    ) -> Result<Arc<FunctionItem<N>>, Error> {
        let mut candidates = self.resolve(name, arity, default_ns)?;
        if candidates.len() == 1 {
            let only = candidates.remove(0);
            return if only.signature.is_variadic() {
                Ok(Arc::new(only.with_arity(arity)?))
            } else {
                Ok(only)
            };
        }
        // several overloads share the arity: defer the choice to call time
        let display = Self::effective_name(name, default_ns);
        let signature = FunctionSignature::new(
            vec![ParamTypeSpec::any_item(Occurrence::ZeroOrMore); arity],
            ParamTypeSpec::any_item(Occurrence::ZeroOrMore),
        );
        let target = display.clone();
        Ok(Arc::new(FunctionItem::from_fn(
            Some(display),
            signature,
            move |call, args| invoke_overloads(call.dyn_ctx, &target, candidates.clone(), args),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simple_node::SimpleNode;
    use rstest::rstest;

    fn registry() -> FunctionRegistry<SimpleNode> {
        let mut reg = FunctionRegistry::new();
        for local in ["count", "concat", "contains", "string-length"] {
            reg.register_function(
                ExpandedName::fn_name(local),
                vec![ParamTypeSpec::any_item(Occurrence::ZeroOrMore)],
                ParamTypeSpec::any_item(Occurrence::ZeroOrMore),
                |_, _| Ok(XdmSequenceStream::empty()),
            );
        }
        reg
    }

    #[rstest]
    #[case("kitten", "sitting", 3)]
    #[case("count", "count", 0)]
    #[case("", "abc", 3)]
    fn levenshtein(#[case] a: &str, #[case] b: &str, #[case] d: usize) {
        assert_eq!(edit_distance(a, b), d);
    }

    #[test]
    fn unknown_names_get_ranked_suggestions() {
        let reg = registry();
        let err = reg
            .resolve(&ExpandedName::local("cont"), 1, Some(crate::consts::FNS))
            .unwrap_err();
        let ResolveError::Unknown { suggestions, .. } = &err else {
            panic!("expected unknown, got {err:?}");
        };
        assert_eq!(suggestions.first().map(|n| n.local.as_str()), Some("count"));
        assert!(suggestions.len() <= MAX_SUGGESTIONS);
        assert_eq!(Error::from(err).code_enum(), ErrorCode::XPST0017);
    }

    #[test]
    fn wrong_arity_lists_available() {
        let reg = registry();
        let err = reg
            .resolve(&ExpandedName::fn_name("count"), 2, None)
            .unwrap_err();
        assert_eq!(
            err,
            ResolveError::WrongArity {
                name: ExpandedName::fn_name("count"),
                available: vec![1],
                variadic_from: None,
            }
        );
        assert!(err.to_string().contains("available: 1"));
    }

    #[test]
    fn identical_registration_replaces() {
        let mut reg = registry();
        reg.register_function(
            ExpandedName::fn_name("count"),
            vec![ParamTypeSpec::any_item(Occurrence::ZeroOrMore)],
            ParamTypeSpec::integer(Occurrence::One),
            |_, _| Ok(XdmSequenceStream::empty()),
        );
        let found = reg.resolve(&ExpandedName::fn_name("count"), 1, None).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].signature.returns, ParamTypeSpec::integer(Occurrence::One));
    }
}
