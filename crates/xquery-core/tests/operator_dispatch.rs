use std::sync::Arc;

use chrono::NaiveDate;
use rstest::rstest;
use rust_decimal::Decimal;
use xquery_core::{
    ArithmeticOp, ComparisonOp, ErrorCode, OperatorCache, UnaryOp, XdmAtomicValue as A, XdmType,
    cast_atomic,
};

fn typed(lexical: &str, target: XdmType) -> A {
    cast_atomic(&A::String(lexical.to_string()), target).expect("valid lexical form")
}

fn date(y: i32, m: u32, d: u32) -> A {
    A::Date {
        date: NaiveDate::from_ymd_opt(y, m, d).expect("valid date"),
        tz: None,
    }
}

#[rstest]
#[case(ArithmeticOp::Add, XdmType::Integer, XdmType::Decimal)]
#[case(ArithmeticOp::Div, XdmType::Integer, XdmType::Integer)]
#[case(ArithmeticOp::Mul, XdmType::UntypedAtomic, XdmType::Double)]
#[case(ArithmeticOp::Add, XdmType::Date, XdmType::YearMonthDuration)]
#[case(ArithmeticOp::Sub, XdmType::DateTime, XdmType::DateTime)]
#[case(ArithmeticOp::Mul, XdmType::Decimal, XdmType::DayTimeDuration)]
fn repeated_resolution_hits_the_cache(
    #[case] op: ArithmeticOp,
    #[case] left: XdmType,
    #[case] right: XdmType,
) {
    let cache = OperatorCache::new();
    let first = cache.resolve_arithmetic(op, left, right).unwrap();
    let second = cache.resolve_arithmetic(op, left, right).unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(cache.len(), 1);
}

#[rstest]
fn comparison_and_unary_entries_are_cached_separately() {
    let cache = OperatorCache::new();
    let eq = cache
        .resolve_comparison(ComparisonOp::Eq, XdmType::String, XdmType::UntypedAtomic)
        .unwrap();
    let again = cache
        .resolve_comparison(ComparisonOp::Eq, XdmType::String, XdmType::UntypedAtomic)
        .unwrap();
    assert!(Arc::ptr_eq(&eq, &again));
    let neg = cache.resolve_unary(UnaryOp::Minus, XdmType::Integer).unwrap();
    assert!(Arc::ptr_eq(
        &neg,
        &cache.resolve_unary(UnaryOp::Minus, XdmType::Integer).unwrap()
    ));
    assert_eq!(cache.len(), 2);
}

#[rstest]
fn integer_plus_decimal_is_decimal() {
    let cache = OperatorCache::new();
    let sum = cache
        .arithmetic(ArithmeticOp::Add, &A::Integer(1), &A::Decimal(Decimal::new(10, 1)))
        .unwrap();
    assert_eq!(sum, A::Decimal(Decimal::from(2)));
}

#[rstest]
fn integer_division_edges() {
    let cache = OperatorCache::new();
    let err = cache
        .arithmetic(ArithmeticOp::IDiv, &A::Integer(1), &A::Integer(0))
        .unwrap_err();
    assert_eq!(err.code_enum(), ErrorCode::FOAR0001);
    let inf = typed("INF", XdmType::Double);
    assert_eq!(
        cache.arithmetic(ArithmeticOp::IDiv, &A::Integer(1), &inf).unwrap(),
        A::Integer(0)
    );
    let err = cache
        .arithmetic(ArithmeticOp::IDiv, &inf, &A::Integer(2))
        .unwrap_err();
    assert_eq!(err.code_enum(), ErrorCode::FOAR0002);
}

#[rstest]
fn duration_arithmetic() {
    let cache = OperatorCache::new();
    let sum = cache
        .arithmetic(
            ArithmeticOp::Add,
            &typed("P1Y", XdmType::YearMonthDuration),
            &typed("P1M", XdmType::YearMonthDuration),
        )
        .unwrap();
    assert_eq!(sum.lexical(), "P1Y1M");
    let day = typed("P1D", XdmType::DayTimeDuration);
    let ratio = cache.arithmetic(ArithmeticOp::Div, &day, &day).unwrap();
    assert_eq!(ratio, A::Decimal(Decimal::ONE));
}

#[rstest]
#[case(date(2020, 1, 31), date(2020, 2, 29))]
#[case(date(2021, 1, 31), date(2021, 2, 28))]
#[case(date(2021, 3, 15), date(2021, 4, 15))]
fn month_addition_clamps_in_either_order(#[case] start: A, #[case] expected: A) {
    let cache = OperatorCache::new();
    let month = typed("P1M", XdmType::YearMonthDuration);
    assert_eq!(
        cache.arithmetic(ArithmeticOp::Add, &start, &month).unwrap(),
        expected
    );
    assert_eq!(
        cache.arithmetic(ArithmeticOp::Add, &month, &start).unwrap(),
        expected
    );
}

#[rstest]
fn untyped_operands_are_cast_at_call_time() {
    let cache = OperatorCache::new();
    let product = cache
        .arithmetic(ArithmeticOp::Mul, &A::UntypedAtomic("3".into()), &A::Integer(4))
        .unwrap();
    assert_eq!(product, A::Double(12.0));
    let err = cache
        .arithmetic(ArithmeticOp::Mul, &A::UntypedAtomic("three".into()), &A::Integer(4))
        .unwrap_err();
    assert_eq!(err.code_enum(), ErrorCode::FORG0001);
}

#[rstest]
fn unmatched_operand_types_are_type_errors() {
    let cache = OperatorCache::new();
    let err = cache
        .resolve_arithmetic(ArithmeticOp::Add, XdmType::String, XdmType::Integer)
        .err()
        .expect("no rule for string + integer");
    assert_eq!(err.code_enum(), ErrorCode::XPTY0004);
    assert!(err.message.contains("xs:string"));
    let err = cache
        .resolve_arithmetic(ArithmeticOp::Add, XdmType::Date, XdmType::Date)
        .err()
        .expect("dates only subtract");
    assert_eq!(err.code_enum(), ErrorCode::XPTY0004);
}

#[rstest]
fn value_comparisons() {
    let cache = OperatorCache::new();
    assert!(
        cache
            .compare(ComparisonOp::Eq, &A::UntypedAtomic("10".into()), &A::String("10".into()))
            .unwrap()
    );
    assert!(
        cache
            .compare(ComparisonOp::Lt, &A::Integer(2), &A::Double(2.5))
            .unwrap()
    );
    assert!(
        cache
            .compare(ComparisonOp::Gt, &date(2021, 1, 2), &date(2021, 1, 1))
            .unwrap()
    );
    let err = cache
        .compare(ComparisonOp::Eq, &A::Integer(1), &A::String("1".into()))
        .unwrap_err();
    assert_eq!(err.code_enum(), ErrorCode::XPTY0004);
}
