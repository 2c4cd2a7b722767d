use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use futures::StreamExt;
use rstest::rstest;
use xquery_core::{
    Advance, ArithmeticOp, Cardinality, DynamicContext, ErrorCode, Expr, Progress, SimpleNode,
    XdmAtomicValue as A, XdmItem, XdmSequenceStream, deferred,
};

type S = XdmSequenceStream<SimpleNode>;
type I = XdmItem<SimpleNode>;

fn int(i: i64) -> I {
    XdmItem::Atomic(A::Integer(i))
}

fn ints(items: Vec<I>) -> Vec<i64> {
    items
        .into_iter()
        .map(|item| match item {
            XdmItem::Atomic(A::Integer(i)) => i,
            other => panic!("expected integer, got {other:?}"),
        })
        .collect()
}

#[rstest]
fn zip_singleton_with_an_empty_input_skips_the_combiner() {
    let called = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&called);
    let zipped = S::zip_singleton(vec![S::empty(), S::singleton(int(1))], move |_| {
        flag.store(true, Ordering::SeqCst);
        Ok(S::singleton(int(0)))
    });
    assert!(zipped.materialize().unwrap().is_empty());
    assert!(!called.load(Ordering::SeqCst));
}

#[rstest]
fn zip_singleton_rejects_multiple_items() {
    let zipped = S::zip_singleton(
        vec![S::from_vec(vec![int(1), int(2)]), S::singleton(int(3))],
        |_| Ok(S::empty()),
    );
    let err = zipped.materialize().unwrap_err();
    assert_eq!(err.code_enum(), ErrorCode::XPTY0004);
}

#[rstest]
fn asynchronous_middle_item_suspends_in_order() {
    let (resolver, value) = deferred::<SimpleNode>();
    let mut seq = S::concat_all(vec![
        S::singleton(int(1)),
        S::deferred(value),
        S::singleton(int(3)),
    ]);

    assert!(matches!(seq.advance().unwrap(), Advance::Item(XdmItem::Atomic(A::Integer(1)))));
    let Advance::Suspended(signal) = seq.advance().unwrap() else {
        panic!("second item is not available yet");
    };
    // pulling again before the signal fires changes nothing
    assert!(matches!(seq.advance().unwrap(), Advance::Suspended(_)));

    assert!(resolver.resolve(Ok(vec![int(2)])).is_ok());
    futures::executor::block_on(signal);

    assert!(matches!(seq.advance().unwrap(), Advance::Item(XdmItem::Atomic(A::Integer(2)))));
    assert!(matches!(seq.advance().unwrap(), Advance::Item(XdmItem::Atomic(A::Integer(3)))));
    assert!(matches!(seq.advance().unwrap(), Advance::Done));
    assert!(matches!(seq.advance().unwrap(), Advance::Done));
}

#[rstest]
fn rejected_host_value_fails_the_sequence() {
    let (resolver, value) = deferred::<SimpleNode>();
    let seq = S::singleton(int(1)).concat(S::deferred(value));
    let failure = xquery_core::Error::from_code(ErrorCode::FOER0000, "fetch failed");
    assert!(resolver.resolve(Err(failure)).is_ok());
    let err = seq.materialize().unwrap_err();
    assert_eq!(err.message, "fetch failed");
}

#[rstest]
fn async_consumers_await_suspensions() {
    let (resolver, value) = deferred::<SimpleNode>();
    let seq = S::deferred(value).map(|item| match item {
        XdmItem::Atomic(A::Integer(i)) => Ok(int(i * 10)),
        other => Ok(other),
    });
    let worker = thread::spawn(move || {
        thread::sleep(Duration::from_millis(10));
        assert!(resolver.resolve(Ok(vec![int(1), int(2)])).is_ok());
    });
    let collected: Vec<_> = futures::executor::block_on(seq.collect());
    worker.join().unwrap();
    let items = collected.into_iter().collect::<Result<Vec<_>, _>>().unwrap();
    assert_eq!(ints(items), vec![10, 20]);
}

#[rstest]
fn cardinality_reads_at_most_two_items() {
    let pulled = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&pulled);
    // filtering hides the exact length, so the items must be pulled
    let mut seq = S::range(1, 1_000_000).filter(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(true)
    });
    assert!(matches!(seq.cardinality().unwrap(), Progress::Ready(Cardinality::Many)));
    assert_eq!(pulled.load(Ordering::SeqCst), 2);
    assert_eq!(ints(seq.take(3).materialize().unwrap()), vec![1, 2, 3]);
}

#[rstest]
fn huge_ranges_are_produced_on_demand() {
    let seq = S::range(i64::MAX - 2, i64::MAX);
    assert_eq!(seq.size_hint(), (3, Some(3)));
    assert_eq!(
        ints(seq.materialize().unwrap()),
        vec![i64::MAX - 2, i64::MAX - 1, i64::MAX]
    );
    let first = S::range(1, i64::MAX).take(2);
    assert_eq!(ints(first.materialize().unwrap()), vec![1, 2]);
}

#[rstest]
fn host_expression_suspends_expression_evaluation() {
    let (resolver, value) = deferred::<SimpleNode>();
    let ctx = DynamicContext::<SimpleNode>::builder().build();
    let expr = Expr::arithmetic(ArithmeticOp::Add, Expr::deferred(value), Expr::literal(1_i64));
    let mut result = expr.evaluate(&ctx);
    let Advance::Suspended(signal) = result.advance().unwrap() else {
        panic!("host value is pending");
    };
    assert!(resolver.resolve(Ok(vec![int(41)])).is_ok());
    futures::executor::block_on(signal);
    assert!(matches!(result.advance().unwrap(), Advance::Item(XdmItem::Atomic(A::Integer(42)))));
    assert!(matches!(result.advance().unwrap(), Advance::Done));
}
