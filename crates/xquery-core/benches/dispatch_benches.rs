use std::hint::black_box;
use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use xquery_core::{
    ArithmeticOp, Axis, ComparisonOp, DynamicContext, ExpandedName, Expr, NodeTest, OperatorCache,
    SimpleNode, XdmAtomicValue, XdmItem, XdmSequenceStream, XdmType, attr, doc, elem, text,
};

fn benchmark_operator_cache(c: &mut Criterion) {
    let cache = OperatorCache::new();
    let pairs = [
        (XdmType::Integer, XdmType::Integer),
        (XdmType::Integer, XdmType::Decimal),
        (XdmType::Double, XdmType::UntypedAtomic),
        (XdmType::Date, XdmType::YearMonthDuration),
    ];
    c.bench_function("operators/resolve_cached", |b| {
        b.iter(|| {
            for (l, r) in &pairs {
                let op = cache
                    .resolve_arithmetic(ArithmeticOp::Add, *l, *r)
                    .expect("resolvable");
                black_box(op);
            }
        })
    });
    c.bench_function("operators/resolve_cold", |b| {
        b.iter(|| {
            let cold = OperatorCache::new();
            for (l, r) in &pairs {
                black_box(cold.resolve_arithmetic(ArithmeticOp::Add, *l, *r).expect("resolvable"));
            }
        })
    });
}

fn int(i: i64) -> Expr<SimpleNode> {
    Expr::literal(i)
}

fn benchmark_flwor(c: &mut Criterion) {
    let ctx = DynamicContext::<SimpleNode>::builder().build();
    let mut group = c.benchmark_group("evaluate/for_square");
    for n in [100_i64, 10_000] {
        // for $n in 1 to N return $n * $n
        let expr = Expr::for_in(
            "n",
            Expr::range(int(1), int(n)),
            Expr::arithmetic(ArithmeticOp::Mul, Expr::var("n"), Expr::var("n")),
        );
        group.bench_with_input(BenchmarkId::from_parameter(n), &expr, |b, expr| {
            b.iter(|| black_box(expr.evaluate(&ctx).materialize().expect("eval")));
        });
    }
    group.finish();

    // (1 to 1000)[. mod 7 eq 0] ! last()
    let filtered = Expr::filter(
        Expr::range(int(1), int(1000)),
        Expr::compare(
            ComparisonOp::Eq,
            Expr::arithmetic(ArithmeticOp::Mod, Expr::ContextItem, int(7)),
            int(0),
        ),
    );
    let expr = Expr::simple_map(filtered, Expr::call("last", []));
    c.bench_function("evaluate/filter_last", |b| {
        b.iter(|| black_box(expr.evaluate(&ctx).materialize().expect("eval")));
    });
}

fn build_sample_document() -> SimpleNode {
    let mut section = elem("section").attr(attr("name", "alpha"));
    for i in 0..200 {
        section = section.child(
            elem("item")
                .attr(attr("id", &format!("i{i}")))
                .child(text(&format!("value {i}"))),
        );
    }
    doc().child(elem("root").child(section)).build()
}

fn benchmark_paths(c: &mut Criterion) {
    let root = build_sample_document();
    let ctx = DynamicContext::builder()
        .with_context_item(XdmItem::Node(root))
        .build();
    // //item/@id
    let expr = Expr::path(
        Expr::path(
            Expr::step(Axis::DescendantOrSelf, NodeTest::AnyKind),
            Expr::step(Axis::Child, NodeTest::name("item")),
        ),
        Expr::step(Axis::Attribute, NodeTest::name("id")),
    );
    c.bench_function("evaluate/descendant_attributes", |b| {
        b.iter(|| black_box(expr.evaluate(&ctx).materialize().expect("eval")));
    });

    let functions = Arc::clone(ctx.functions());
    let args = || vec![XdmSequenceStream::singleton(XdmItem::Atomic(XdmAtomicValue::Integer(-3)))];
    let abs = ExpandedName::local("abs");
    c.bench_function("functions/static_call", |b| {
        b.iter(|| {
            let out = functions.call(&ctx, &abs, args()).expect("resolvable");
            black_box(out.materialize().expect("eval"))
        });
    });
}

criterion_group!(benches, benchmark_operator_cache, benchmark_flwor, benchmark_paths);
criterion_main!(benches);
