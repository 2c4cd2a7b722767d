use std::sync::Arc;

use rstest::rstest;
use xquery_core::{
    Argument, CallArg, DynamicContext, ErrorCode, ExpandedName, Expr, FunctionRegistry,
    Occurrence, ParamTypeSpec, ResolveError, SimpleNode, XdmAtomicValue as A, XdmItem,
    XdmSequenceStream, XdmType, call_item, default_function_registry, partially_apply,
};

type S = XdmSequenceStream<SimpleNode>;

const LOCAL: &str = "urn:test:local";

fn local(name: &str) -> ExpandedName {
    ExpandedName::new(Some(LOCAL.to_string()), name)
}

fn atom(v: impl Into<A>) -> XdmItem<SimpleNode> {
    XdmItem::Atomic(v.into())
}

fn values(stream: S) -> Result<Vec<A>, xquery_core::Error> {
    stream
        .materialize()?
        .into_iter()
        .map(|item| match item {
            XdmItem::Atomic(a) => Ok(a),
            other => panic!("expected atomic item, got {other:?}"),
        })
        .collect()
}

/// Registry with the core catalog plus a few test functions.
fn registry() -> FunctionRegistry<SimpleNode> {
    let mut reg = default_function_registry();
    // local:describe($v as xs:integer?) as xs:string
    reg.register_function(
        local("describe"),
        vec![ParamTypeSpec::integer(Occurrence::ZeroOrOne)],
        ParamTypeSpec::string(Occurrence::One),
        |_ctx, mut args| {
            Ok(args.remove(0).map_all(|items| {
                let text = match items.first() {
                    None => "none".to_string(),
                    Some(XdmItem::Atomic(a)) => format!("{} {}", a.type_of(), a.lexical()),
                    Some(other) => format!("{other:?}"),
                };
                Ok(vec![XdmItem::Atomic(A::String(text))])
            }))
        },
    );
    // local:join($a, $b, $c) joins its string arguments with '-'
    reg.register_function(
        local("join"),
        vec![ParamTypeSpec::string(Occurrence::One); 3],
        ParamTypeSpec::string(Occurrence::One),
        |_ctx, args| {
            Ok(S::zip_singleton(args, |items| {
                let parts: Vec<String> = items
                    .iter()
                    .map(|i| match i {
                        XdmItem::Atomic(a) => a.lexical(),
                        _ => String::new(),
                    })
                    .collect();
                Ok(S::singleton(XdmItem::Atomic(A::String(parts.join("-")))))
            }))
        },
    );
    for (ty, label) in [(XdmType::Integer, "integer"), (XdmType::String, "string")] {
        reg.register_function(
            local("kind"),
            vec![ParamTypeSpec::new(ty, Occurrence::One)],
            ParamTypeSpec::string(Occurrence::One),
            move |_ctx, _args| Ok(S::singleton(XdmItem::Atomic(A::String(label.to_string())))),
        );
    }
    reg
}

fn ctx() -> DynamicContext<SimpleNode> {
    DynamicContext::builder()
        .with_functions(Arc::new(registry()))
        .build()
}

fn call(name: ExpandedName, args: Vec<S>) -> Result<Vec<A>, xquery_core::Error> {
    let ctx = ctx();
    values(ctx.functions().call(&ctx, &name, args)?)
}

#[rstest]
#[case(S::empty(), "none")]
#[case(S::singleton(atom(A::UntypedAtomic("42".into()))), "xs:integer 42")]
#[case(S::singleton(atom(A::Byte(7))), "xs:byte 7")]
fn optional_integer_accepts(#[case] arg: S, #[case] expected: &str) {
    assert_eq!(
        call(local("describe"), vec![arg]).unwrap(),
        vec![A::String(expected.into())]
    );
}

#[rstest]
#[case(S::from_vec(vec![atom(1_i64), atom(2_i64)]), ErrorCode::XPTY0004)]
#[case(S::singleton(atom("forty-two")), ErrorCode::XPTY0004)]
#[case(S::singleton(atom(A::UntypedAtomic("forty-two".into()))), ErrorCode::FORG0001)]
#[case(S::singleton(atom(1.5)), ErrorCode::XPTY0004)]
fn optional_integer_rejects(#[case] arg: S, #[case] code: ErrorCode) {
    let err = call(local("describe"), vec![arg]).unwrap_err();
    assert_eq!(err.code_enum(), code);
}

fn join_args(a: &str, b: &str, c: &str) -> Vec<S> {
    [a, b, c].into_iter().map(|s| S::singleton(atom(s))).collect()
}

#[rstest]
#[case(0)]
#[case(1)]
#[case(2)]
fn binding_one_parameter_keeps_the_remaining_order(#[case] bound_at: usize) {
    let ctx = ctx();
    let join = ctx
        .functions()
        .function_ref(&local("join"), 3, None)
        .unwrap();
    let full = ["a", "b", "c"];
    let args = (0..3)
        .map(|i| {
            if i == bound_at {
                Argument::Value(S::singleton(atom(full[i])))
            } else {
                Argument::Placeholder
            }
        })
        .collect();
    let partial = partially_apply(&join, args).unwrap();
    assert_eq!(partial.arity(), 2);
    assert!(partial.name.is_none());
    let rest: Vec<S> = full
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != bound_at)
        .map(|(_, s)| S::singleton(atom(*s)))
        .collect();
    let via_partial = values(partial.invoke(&ctx, rest).unwrap()).unwrap();
    let direct = call(local("join"), join_args("a", "b", "c")).unwrap();
    assert_eq!(via_partial, direct);
    assert_eq!(direct, vec![A::String("a-b-c".into())]);
}

#[rstest]
fn overloads_are_selected_by_argument_type() {
    assert_eq!(
        call(local("kind"), vec![S::singleton(atom(5_i64))]).unwrap(),
        vec![A::String("integer".into())]
    );
    assert_eq!(
        call(local("kind"), vec![S::singleton(atom("x"))]).unwrap(),
        vec![A::String("string".into())]
    );
    // untyped input converts to both parameter types
    let err = call(
        local("kind"),
        vec![S::singleton(atom(A::UntypedAtomic("5".into())))],
    )
    .unwrap_err();
    assert_eq!(err.code_enum(), ErrorCode::XPTY0004);
}

#[rstest]
fn unknown_names_suggest_close_matches() {
    let reg = registry();
    let err = reg
        .resolve(&ExpandedName::local("conact"), 2, Some(xquery_core::consts::FNS))
        .err()
        .expect("conact is not registered");
    let ResolveError::Unknown { suggestions, .. } = &err else {
        panic!("expected an unknown-name error, got {err:?}");
    };
    assert_eq!(suggestions.first().map(|n| n.local.as_str()), Some("concat"));
    let err: xquery_core::Error = err.into();
    assert_eq!(err.code_enum(), ErrorCode::XPST0017);
    assert!(err.message.contains("did you mean"));
}

#[rstest]
fn wrong_arity_lists_available_arities() {
    let reg = registry();
    let err = reg
        .resolve(&ExpandedName::local("string"), 3, Some(xquery_core::consts::FNS))
        .err()
        .expect("fn:string has no arity 3");
    assert!(matches!(
        &err,
        ResolveError::WrongArity { available, variadic_from: None, .. } if available == &vec![0, 1]
    ));
}

#[rstest]
fn variadic_concat_accepts_any_arity_from_two() {
    let ctx = ctx();
    let expr = Expr::call(
        "concat",
        ["a", "b", "c", "d"].map(|s| CallArg::from(Expr::literal(s))),
    );
    assert_eq!(
        values(expr.evaluate(&ctx)).unwrap(),
        vec![A::String("abcd".into())]
    );
    let err = values(Expr::call("concat", [Expr::literal("a").into()]).evaluate(&ctx)).unwrap_err();
    assert_eq!(err.code_enum(), ErrorCode::XPST0017);
}

#[rstest]
fn maps_and_arrays_are_callable() {
    let ctx = ctx();
    let array = XdmItem::Array(xquery_core::XdmArray::new(vec![vec![atom("x")], vec![atom("y")]]));
    let picked = call_item(&ctx, &array, vec![S::singleton(atom(2_i64))]).unwrap();
    assert_eq!(values(picked).unwrap(), vec![A::String("y".into())]);
    let out_of_bounds = call_item(&ctx, &array, vec![S::singleton(atom(3_i64))]).unwrap();
    assert_eq!(values(out_of_bounds).unwrap_err().code_enum(), ErrorCode::FOAY0001);

    let map = XdmItem::Map(xquery_core::XdmMap::new([(A::String("k".into()), vec![atom(1_i64)])]));
    let found = call_item(&ctx, &map, vec![S::singleton(atom("k"))]).unwrap();
    assert_eq!(values(found).unwrap(), vec![A::Integer(1)]);
    let missing = call_item(&ctx, &map, vec![S::singleton(atom("z"))]).unwrap();
    assert!(values(missing).unwrap().is_empty());
}

#[rstest]
fn constructor_functions_cast_their_argument() {
    let ctx = ctx();
    let expr = Expr::FunctionCall {
        name: ExpandedName::new(Some(xquery_core::consts::XS.to_string()), "date"),
        args: vec![Expr::literal("2024-02-29").into()],
    };
    let result = values(expr.evaluate(&ctx)).unwrap();
    assert_eq!(result.len(), 1);
    assert_eq!(result[0].type_of(), XdmType::Date);
    assert_eq!(result[0].lexical(), "2024-02-29");
}

fn missing_variable() -> Expr<SimpleNode> {
    Expr::var("missing")
}

fn missing_function() -> Expr<SimpleNode> {
    Expr::call("no-such-function", [])
}

#[rstest]
#[case("empty", missing_variable(), ErrorCode::XPST0008)]
#[case("exists", missing_variable(), ErrorCode::XPST0008)]
#[case("count", missing_variable(), ErrorCode::XPST0008)]
#[case("exists", missing_function(), ErrorCode::XPST0017)]
#[case("empty", missing_function(), ErrorCode::XPST0017)]
#[case("count", Expr::sequence([Expr::literal(1_i64), missing_variable()]), ErrorCode::XPST0008)]
#[case("exists", Expr::sequence([missing_variable(), Expr::literal(1_i64)]), ErrorCode::XPST0008)]
fn cardinality_functions_report_argument_errors(
    #[case] function: &str,
    #[case] argument: Expr<SimpleNode>,
    #[case] code: ErrorCode,
) {
    let ctx = ctx();
    let expr = Expr::call(function, [argument.into()]);
    let err = values(expr.evaluate(&ctx)).unwrap_err();
    assert_eq!(err.code_enum(), code);
}

#[rstest]
fn last_reports_an_erroneous_base() {
    let ctx = ctx();
    // (1, $missing) ! last()
    let expr = Expr::simple_map(
        Expr::sequence([Expr::literal(1_i64), missing_variable()]),
        Expr::call("last", []),
    );
    let err = values(expr.evaluate(&ctx)).unwrap_err();
    assert_eq!(err.code_enum(), ErrorCode::XPST0008);
}
