//! Operator resolution and caching.
//!
//! Binary arithmetic, unary sign and value comparison operators are resolved
//! once per (operator, left type, right type) and the resulting closure is
//! kept in an [`OperatorCache`]. Resolution only looks at types; the
//! closures inspect the actual values when called, so an `xs:untypedAtomic`
//! operand is cast when the closure runs, never during resolution.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};

use crate::engine::casting::cast_atomic;
use crate::engine::runtime::{Error, ErrorCode};
use crate::engine::temporal;
use crate::xdm::{XdmAtomicValue, XdmType};

type V = XdmAtomicValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArithmeticOp {
    Add,
    Sub,
    Mul,
    Div,
    IDiv,
    Mod,
}

impl ArithmeticOp {
    pub fn symbol(self) -> &'static str {
        match self {
            ArithmeticOp::Add => "+",
            ArithmeticOp::Sub => "-",
            ArithmeticOp::Mul => "*",
            ArithmeticOp::Div => "div",
            ArithmeticOp::IDiv => "idiv",
            ArithmeticOp::Mod => "mod",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Plus,
    Minus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComparisonOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl ComparisonOp {
    pub fn symbol(self) -> &'static str {
        match self {
            ComparisonOp::Eq => "eq",
            ComparisonOp::Ne => "ne",
            ComparisonOp::Lt => "lt",
            ComparisonOp::Le => "le",
            ComparisonOp::Gt => "gt",
            ComparisonOp::Ge => "ge",
        }
    }

    /// Apply the operator to a partial ordering. Unordered operands (NaN)
    /// are unequal to everything.
    pub fn holds(self, ord: Option<Ordering>) -> bool {
        match self {
            ComparisonOp::Eq => ord == Some(Ordering::Equal),
            ComparisonOp::Ne => ord != Some(Ordering::Equal),
            ComparisonOp::Lt => ord == Some(Ordering::Less),
            ComparisonOp::Le => matches!(ord, Some(Ordering::Less | Ordering::Equal)),
            ComparisonOp::Gt => ord == Some(Ordering::Greater),
            ComparisonOp::Ge => matches!(ord, Some(Ordering::Greater | Ordering::Equal)),
        }
    }

    fn is_equality(self) -> bool {
        matches!(self, ComparisonOp::Eq | ComparisonOp::Ne)
    }
}

impl fmt::Display for ArithmeticOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl fmt::Display for ComparisonOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

pub type BinaryOperator =
    Arc<dyn Fn(&XdmAtomicValue, &XdmAtomicValue) -> Result<XdmAtomicValue, Error> + Send + Sync>;
pub type UnaryOperator =
    Arc<dyn Fn(&XdmAtomicValue) -> Result<XdmAtomicValue, Error> + Send + Sync>;
pub type ComparisonOperator =
    Arc<dyn Fn(&XdmAtomicValue, &XdmAtomicValue) -> Result<bool, Error> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum OperatorKey {
    Arithmetic(ArithmeticOp, XdmType, XdmType),
    Unary(UnaryOp, XdmType),
    Comparison(ComparisonOp, XdmType, XdmType),
}

#[derive(Clone)]
enum CachedOperator {
    Binary(BinaryOperator),
    Unary(UnaryOperator),
    Comparison(ComparisonOperator),
}

/// Memo of resolved operators. Entries are never evicted; the key space is
/// bounded by the number of operator/type combinations.
///
/// One cache is owned by each [`DynamicContext`](crate::engine::runtime::DynamicContext)
/// builder unless one is injected with `with_operators`, so several
/// evaluations can share it.
#[derive(Default)]
pub struct OperatorCache {
    entries: Mutex<HashMap<OperatorKey, CachedOperator>>,
}

impl fmt::Debug for OperatorCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperatorCache").field("len", &self.len()).finish()
    }
}

impl OperatorCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lookup_or_insert(
        &self,
        key: OperatorKey,
        build: impl FnOnce() -> Result<CachedOperator, Error>,
    ) -> Result<CachedOperator, Error> {
        if let Some(hit) = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return Ok(hit.clone());
        }
        tracing::trace!(?key, "operator cache miss");
        let built = build()?;
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        // another caller may have raced us; keep the first entry
        Ok(entries.entry(key).or_insert(built).clone())
    }

    /// Resolve a binary arithmetic operator for the given operand types.
    pub fn resolve_arithmetic(
        &self,
        op: ArithmeticOp,
        left: XdmType,
        right: XdmType,
    ) -> Result<BinaryOperator, Error> {
        let key = OperatorKey::Arithmetic(op, left, right);
        match self.lookup_or_insert(key, || {
            build_arithmetic(op, left, right).map(CachedOperator::Binary)
        })? {
            CachedOperator::Binary(f) => Ok(f),
            _ => Err(Error::from_code(ErrorCode::Unknown, "operator cache entry mismatch")),
        }
    }

    pub fn resolve_unary(&self, op: UnaryOp, operand: XdmType) -> Result<UnaryOperator, Error> {
        let key = OperatorKey::Unary(op, operand);
        match self.lookup_or_insert(key, || Ok(CachedOperator::Unary(build_unary(op, operand))))? {
            CachedOperator::Unary(f) => Ok(f),
            _ => Err(Error::from_code(ErrorCode::Unknown, "operator cache entry mismatch")),
        }
    }

    /// Resolve a value comparison (`eq`, `lt`, ...) for the given operand types.
    pub fn resolve_comparison(
        &self,
        op: ComparisonOp,
        left: XdmType,
        right: XdmType,
    ) -> Result<ComparisonOperator, Error> {
        let key = OperatorKey::Comparison(op, left, right);
        match self.lookup_or_insert(key, || {
            build_comparison(op, left, right).map(CachedOperator::Comparison)
        })? {
            CachedOperator::Comparison(f) => Ok(f),
            _ => Err(Error::from_code(ErrorCode::Unknown, "operator cache entry mismatch")),
        }
    }

    /// Resolve and apply in one step.
    pub fn arithmetic(
        &self,
        op: ArithmeticOp,
        a: &XdmAtomicValue,
        b: &XdmAtomicValue,
    ) -> Result<XdmAtomicValue, Error> {
        self.resolve_arithmetic(op, a.type_of(), b.type_of())?(a, b)
    }

    pub fn unary(&self, op: UnaryOp, a: &XdmAtomicValue) -> Result<XdmAtomicValue, Error> {
        self.resolve_unary(op, a.type_of())?(a)
    }

    pub fn compare(
        &self,
        op: ComparisonOp,
        a: &XdmAtomicValue,
        b: &XdmAtomicValue,
    ) -> Result<bool, Error> {
        self.resolve_comparison(op, a.type_of(), b.type_of())?(a, b)
    }
}

// ---------------------------------------------------------------------------
// numeric promotion
// ---------------------------------------------------------------------------

/// Promotion ladder for numeric operands; `Ord` follows widening order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum NumericKind {
    Integer,
    Decimal,
    Float,
    Double,
}

impl NumericKind {
    pub(crate) fn of_type(t: XdmType) -> Option<NumericKind> {
        if t.is_subtype_of(XdmType::Integer) {
            Some(NumericKind::Integer)
        } else if t.is_subtype_of(XdmType::Decimal) {
            Some(NumericKind::Decimal)
        } else if t.is_subtype_of(XdmType::Float) {
            Some(NumericKind::Float)
        } else if t.is_subtype_of(XdmType::Double) {
            Some(NumericKind::Double)
        } else {
            None
        }
    }
}

/// A numeric value already converted to its promotion target.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Num {
    Int(i64),
    Dec(Decimal),
    Float(f32),
    Double(f64),
}

impl Num {
    pub(crate) fn into_value(self) -> XdmAtomicValue {
        match self {
            Num::Int(i) => V::Integer(i),
            Num::Dec(d) => V::Decimal(d),
            Num::Float(f) => V::Float(f),
            Num::Double(d) => V::Double(d),
        }
    }

    fn to_f64(self) -> f64 {
        match self {
            Num::Int(i) => i as f64,
            Num::Dec(d) => d.to_f64().unwrap_or(f64::NAN),
            Num::Float(f) => f64::from(f),
            Num::Double(d) => d,
        }
    }

    fn partial_cmp(self, other: Num) -> Option<Ordering> {
        match (self, other) {
            (Num::Int(a), Num::Int(b)) => Some(a.cmp(&b)),
            (Num::Dec(a), Num::Dec(b)) => Some(a.cmp(&b)),
            (Num::Float(a), Num::Float(b)) => a.partial_cmp(&b),
            (a, b) => a.to_f64().partial_cmp(&b.to_f64()),
        }
    }
}

fn overflow() -> Error {
    Error::from_code(ErrorCode::FOAR0002, "numeric overflow")
}

fn division_by_zero() -> Error {
    Error::from_code(ErrorCode::FOAR0001, "division by zero")
}

/// Convert `v` (any numeric value) to `kind`.
pub(crate) fn promote(v: &XdmAtomicValue, kind: NumericKind) -> Result<Num, Error> {
    let not_numeric = || Error::type_error(format!("{} is not numeric", v.type_of()));
    Ok(match kind {
        NumericKind::Integer => {
            let i = v.integer_value().ok_or_else(not_numeric)?;
            Num::Int(i64::try_from(i).map_err(|_| overflow())?)
        }
        NumericKind::Decimal => Num::Dec(match v {
            V::Decimal(d) => *d,
            other => {
                let i = other.integer_value().ok_or_else(not_numeric)?;
                Decimal::from_i128(i).ok_or_else(overflow)?
            }
        }),
        NumericKind::Float => Num::Float(match v {
            V::Float(f) => *f,
            V::Decimal(d) => d.to_f32().unwrap_or(f32::NAN),
            other => other.integer_value().ok_or_else(not_numeric)? as f32,
        }),
        NumericKind::Double => Num::Double(match v {
            V::Double(d) => *d,
            V::Float(f) => f64::from(*f),
            V::Decimal(d) => d.to_f64().unwrap_or(f64::NAN),
            other => other.integer_value().ok_or_else(not_numeric)? as f64,
        }),
    })
}

fn untyped_to_double(v: &XdmAtomicValue) -> Result<std::borrow::Cow<'_, XdmAtomicValue>, Error> {
    match v {
        V::UntypedAtomic(_) => Ok(std::borrow::Cow::Owned(cast_atomic(v, XdmType::Double)?)),
        other => Ok(std::borrow::Cow::Borrowed(other)),
    }
}

fn float_to_integer(q: f64) -> Result<i64, Error> {
    let t = q.trunc();
    if t.abs() >= 9.223_372_036_854_775e18 {
        return Err(overflow());
    }
    Ok(t as i64)
}

fn numeric_arith(op: ArithmeticOp, a: Num, b: Num) -> Result<XdmAtomicValue, Error> {
    use ArithmeticOp::*;
    Ok(match (a, b) {
        (Num::Int(x), Num::Int(y)) => V::Integer(match op {
            Add => x.checked_add(y).ok_or_else(overflow)?,
            Sub => x.checked_sub(y).ok_or_else(overflow)?,
            Mul => x.checked_mul(y).ok_or_else(overflow)?,
            IDiv => {
                if y == 0 {
                    return Err(division_by_zero());
                }
                x.checked_div(y).ok_or_else(overflow)?
            }
            Mod => {
                if y == 0 {
                    return Err(division_by_zero());
                }
                x.checked_rem(y).ok_or_else(overflow)?
            }
            // integer division widens before reaching here
            Div => return numeric_arith(op, Num::Dec(x.into()), Num::Dec(y.into())),
        }),
        (Num::Dec(x), Num::Dec(y)) => match op {
            Add => V::Decimal(x.checked_add(y).ok_or_else(overflow)?),
            Sub => V::Decimal(x.checked_sub(y).ok_or_else(overflow)?),
            Mul => V::Decimal(x.checked_mul(y).ok_or_else(overflow)?),
            Div | IDiv | Mod if y.is_zero() => return Err(division_by_zero()),
            Div => V::Decimal(x.checked_div(y).ok_or_else(overflow)?),
            Mod => V::Decimal(x.checked_rem(y).ok_or_else(overflow)?),
            IDiv => {
                let q = x.checked_div(y).ok_or_else(overflow)?.trunc();
                V::Integer(q.to_i64().ok_or_else(overflow)?)
            }
        },
        (Num::Float(x), Num::Float(y)) => match op {
            IDiv => V::Integer(float_idiv(f64::from(x), f64::from(y))?),
            _ => V::Float(float_arith(op, f64::from(x), f64::from(y)) as f32),
        },
        (x, y) => {
            let (x, y) = (x.to_f64(), y.to_f64());
            match op {
                IDiv => V::Integer(float_idiv(x, y)?),
                _ => V::Double(float_arith(op, x, y)),
            }
        }
    })
}

fn float_arith(op: ArithmeticOp, x: f64, y: f64) -> f64 {
    match op {
        ArithmeticOp::Add => x + y,
        ArithmeticOp::Sub => x - y,
        ArithmeticOp::Mul => x * y,
        ArithmeticOp::Div => x / y,
        // Rust's % truncates like xs:double mod
        ArithmeticOp::Mod | ArithmeticOp::IDiv => x % y,
    }
}

fn float_idiv(x: f64, y: f64) -> Result<i64, Error> {
    if y == 0.0 {
        return Err(division_by_zero());
    }
    if x.is_nan() || y.is_nan() || x.is_infinite() {
        return Err(Error::from_code(
            ErrorCode::FOAR0002,
            "idiv operand is NaN or infinite",
        ));
    }
    if y.is_infinite() {
        return Ok(0);
    }
    float_to_integer(x / y)
}

// ---------------------------------------------------------------------------
// temporal helpers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TemporalKind {
    DateTime,
    Date,
    Time,
}

fn temporal_kind(t: XdmType) -> Option<TemporalKind> {
    if t.is_subtype_of(XdmType::DateTime) {
        Some(TemporalKind::DateTime)
    } else if t == XdmType::Date {
        Some(TemporalKind::Date)
    } else if t == XdmType::Time {
        Some(TemporalKind::Time)
    } else {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DurationKind {
    YearMonth,
    DayTime,
}

fn duration_kind(t: XdmType) -> Option<DurationKind> {
    match t {
        XdmType::YearMonthDuration => Some(DurationKind::YearMonth),
        XdmType::DayTimeDuration => Some(DurationKind::DayTime),
        _ => None,
    }
}

fn reference_date() -> NaiveDate {
    // xs:time values are compared as times on 1972-12-31
    NaiveDate::from_ymd_opt(1972, 12, 31).unwrap_or_default()
}

fn temporal_error() -> Error {
    Error::from_code(ErrorCode::FODT0001, "date/time arithmetic out of range")
}

fn duration_overflow() -> Error {
    Error::from_code(ErrorCode::FODT0002, "duration out of range")
}

fn mismatch(v: &XdmAtomicValue) -> Error {
    Error::type_error(format!("unexpected operand of type {}", v.type_of()))
}

/// Instant of a date/time value on the UTC timeline.
fn instant(v: &XdmAtomicValue) -> Result<NaiveDateTime, Error> {
    let (local, tz) = match v {
        V::DateTime { value, tz } => (*value, *tz),
        V::Date { date, tz } => (date.and_time(NaiveTime::MIN), *tz),
        V::Time { time, tz } => (reference_date().and_time(*time), *tz),
        other => return Err(mismatch(other)),
    };
    temporal::to_utc(local, tz).ok_or_else(temporal_error)
}

fn months_of(v: &XdmAtomicValue) -> Result<i32, Error> {
    match v {
        V::YearMonthDuration(m) => Ok(*m),
        other => Err(mismatch(other)),
    }
}

fn seconds_of(v: &XdmAtomicValue) -> Result<Decimal, Error> {
    match v {
        V::DayTimeDuration(s) => Ok(*s),
        other => Err(mismatch(other)),
    }
}

fn shift_temporal(
    v: &XdmAtomicValue,
    d: &XdmAtomicValue,
    negate: bool,
) -> Result<XdmAtomicValue, Error> {
    match d {
        V::YearMonthDuration(m) => {
            let m = if negate { m.checked_neg().ok_or_else(duration_overflow)? } else { *m };
            match v {
                V::DateTime { value, tz } => Ok(V::DateTime {
                    value: temporal::add_months_clamped_dt(*value, m).ok_or_else(temporal_error)?,
                    tz: *tz,
                }),
                V::Date { date, tz } => Ok(V::Date {
                    date: temporal::add_months_clamped(*date, m).ok_or_else(temporal_error)?,
                    tz: *tz,
                }),
                other => Err(mismatch(other)),
            }
        }
        V::DayTimeDuration(s) => {
            let s = if negate { -*s } else { *s };
            let delta = temporal::seconds_to_delta(s).ok_or_else(temporal_error)?;
            match v {
                V::DateTime { value, tz } => Ok(V::DateTime {
                    value: value.checked_add_signed(delta).ok_or_else(temporal_error)?,
                    tz: *tz,
                }),
                V::Date { date, tz } => {
                    let shifted = date
                        .and_time(NaiveTime::MIN)
                        .checked_add_signed(delta)
                        .ok_or_else(temporal_error)?;
                    Ok(V::Date {
                        date: shifted.date(),
                        tz: *tz,
                    })
                }
                V::Time { time, tz } => Ok(V::Time {
                    time: time.overflowing_add_signed(delta).0,
                    tz: *tz,
                }),
                other => Err(mismatch(other)),
            }
        }
        other => Err(mismatch(other)),
    }
}

fn numeric_factor(v: &XdmAtomicValue) -> Result<f64, Error> {
    let v = untyped_to_double(v)?;
    let n = promote(&v, NumericKind::Double)?.to_f64();
    if n.is_nan() {
        return Err(Error::from_code(
            ErrorCode::FOCA0005,
            "NaN supplied as a duration factor",
        ));
    }
    Ok(n)
}

fn scale_duration(
    kind: DurationKind,
    d: &XdmAtomicValue,
    n: &XdmAtomicValue,
    divide: bool,
) -> Result<XdmAtomicValue, Error> {
    let factor = numeric_factor(n)?;
    if divide && factor == 0.0 {
        return Err(duration_overflow());
    }
    match kind {
        DurationKind::YearMonth => {
            let m = f64::from(months_of(d)?);
            let scaled = if divide { m / factor } else { m * factor };
            // round half toward positive infinity
            let rounded = (scaled + 0.5).floor();
            if !rounded.is_finite() || rounded.abs() > f64::from(i32::MAX) {
                return Err(duration_overflow());
            }
            Ok(V::YearMonthDuration(rounded as i32))
        }
        DurationKind::DayTime => {
            let s = seconds_of(d)?;
            if factor.is_infinite() {
                if divide {
                    return Ok(V::DayTimeDuration(Decimal::ZERO));
                }
                return Err(duration_overflow());
            }
            let f = Decimal::from_f64(factor).ok_or_else(duration_overflow)?;
            let scaled = if divide { s.checked_div(f) } else { s.checked_mul(f) };
            Ok(V::DayTimeDuration(scaled.ok_or_else(duration_overflow)?))
        }
    }
}

// ---------------------------------------------------------------------------
// resolution
// ---------------------------------------------------------------------------

fn no_operator(op: impl fmt::Display, left: XdmType, right: XdmType) -> Error {
    Error::type_error(format!("operator '{op}' is not defined for {left} and {right}"))
}

fn binary(
    f: impl Fn(&XdmAtomicValue, &XdmAtomicValue) -> Result<XdmAtomicValue, Error>
        + Send
        + Sync
        + 'static,
) -> BinaryOperator {
    Arc::new(f)
}

fn unary(
    f: impl Fn(&XdmAtomicValue) -> Result<XdmAtomicValue, Error> + Send + Sync + 'static,
) -> UnaryOperator {
    Arc::new(f)
}

fn comparison(
    f: impl Fn(&XdmAtomicValue, &XdmAtomicValue) -> Result<bool, Error> + Send + Sync + 'static,
) -> ComparisonOperator {
    Arc::new(f)
}

fn build_arithmetic(
    op: ArithmeticOp,
    left: XdmType,
    right: XdmType,
) -> Result<BinaryOperator, Error> {
    use ArithmeticOp::*;
    // untypedAtomic matches as xs:double; the value is cast when the closure runs
    let as_rule = |t: XdmType| if t == XdmType::UntypedAtomic { XdmType::Double } else { t };
    let (l, r) = (as_rule(left), as_rule(right));

    if let (Some(lk), Some(rk)) = (NumericKind::of_type(l), NumericKind::of_type(r)) {
        let mut kind = lk.max(rk);
        if op == Div && kind == NumericKind::Integer {
            kind = NumericKind::Decimal;
        }
        return Ok(binary(move |a, b| {
            let (a, b) = (untyped_to_double(a)?, untyped_to_double(b)?);
            numeric_arith(op, promote(&a, kind)?, promote(&b, kind)?)
        }));
    }

    match (duration_kind(l), duration_kind(r)) {
        (Some(DurationKind::YearMonth), Some(DurationKind::YearMonth)) => {
            return match op {
                Add | Sub => Ok(binary(move |a, b| {
                    let (x, y) = (months_of(a)?, months_of(b)?);
                    let m = if op == Add { x.checked_add(y) } else { x.checked_sub(y) };
                    m.map(V::YearMonthDuration).ok_or_else(duration_overflow)
                })),
                Div => Ok(binary(|a, b| {
                    let y = months_of(b)?;
                    if y == 0 {
                        return Err(division_by_zero());
                    }
                    let q = Decimal::from(months_of(a)?)
                        .checked_div(Decimal::from(y))
                        .ok_or_else(overflow)?;
                    Ok(V::Decimal(q))
                })),
                _ => Err(no_operator(op, left, right)),
            };
        }
        (Some(DurationKind::DayTime), Some(DurationKind::DayTime)) => {
            return match op {
                Add | Sub => Ok(binary(move |a, b| {
                    let (x, y) = (seconds_of(a)?, seconds_of(b)?);
                    let s = if op == Add { x.checked_add(y) } else { x.checked_sub(y) };
                    s.map(V::DayTimeDuration).ok_or_else(duration_overflow)
                })),
                Div => Ok(binary(|a, b| {
                    let y = seconds_of(b)?;
                    if y.is_zero() {
                        return Err(division_by_zero());
                    }
                    Ok(V::Decimal(seconds_of(a)?.checked_div(y).ok_or_else(overflow)?))
                })),
                _ => Err(no_operator(op, left, right)),
            };
        }
        (Some(kind), None) if NumericKind::of_type(r).is_some() && matches!(op, Mul | Div) => {
            return Ok(binary(move |a, b| scale_duration(kind, a, b, op == Div)));
        }
        // only multiplication commutes; `numeric div duration` has no meaning
        (None, Some(kind)) if NumericKind::of_type(l).is_some() && op == Mul => {
            return Ok(binary(move |a, b| scale_duration(kind, b, a, false)));
        }
        _ => {}
    }

    match (temporal_kind(l), temporal_kind(r)) {
        (Some(lk), Some(rk)) if lk == rk => {
            if op != Sub {
                return Err(no_operator(op, left, right));
            }
            return Ok(binary(|a, b| {
                let delta = instant(a)? - instant(b)?;
                Ok(V::DayTimeDuration(temporal::delta_to_seconds(delta)))
            }));
        }
        (Some(tk), None) => {
            if let Some(dk) = duration_kind(r)
                && matches!(op, Add | Sub)
                && !(tk == TemporalKind::Time && dk == DurationKind::YearMonth)
            {
                return Ok(binary(move |a, b| shift_temporal(a, b, op == Sub)));
            }
        }
        (None, Some(tk)) => {
            if let Some(dk) = duration_kind(l)
                && op == Add
                && !(tk == TemporalKind::Time && dk == DurationKind::YearMonth)
            {
                return Ok(binary(|a, b| shift_temporal(b, a, false)));
            }
        }
        _ => {}
    }

    Err(no_operator(op, left, right))
}

fn build_unary(op: UnaryOp, operand: XdmType) -> UnaryOperator {
    let t = if operand == XdmType::UntypedAtomic { XdmType::Double } else { operand };
    let Some(kind) = NumericKind::of_type(t) else {
        return unary(|_| Ok(V::Double(f64::NAN)));
    };
    match op {
        UnaryOp::Plus => unary(|a| Ok(untyped_to_double(a)?.into_owned())),
        UnaryOp::Minus => unary(move |a| {
            let a = untyped_to_double(a)?;
            Ok(match promote(&a, kind)? {
                Num::Int(i) => V::Integer(i.checked_neg().ok_or_else(overflow)?),
                Num::Dec(d) => V::Decimal(-d),
                Num::Float(f) => V::Float(-f),
                Num::Double(d) => V::Double(-d),
            })
        }),
    }
}

fn build_comparison(
    op: ComparisonOp,
    left: XdmType,
    right: XdmType,
) -> Result<ComparisonOperator, Error> {
    // untypedAtomic compares as xs:string; anyURI promotes to xs:string
    let as_rule = |t: XdmType| match t {
        XdmType::UntypedAtomic | XdmType::AnyUri => XdmType::String,
        other => other,
    };
    let (l, r) = (as_rule(left), as_rule(right));

    if let (Some(lk), Some(rk)) = (NumericKind::of_type(l), NumericKind::of_type(r)) {
        let kind = lk.max(rk);
        return Ok(comparison(move |a, b| {
            let ord = promote(a, kind)?.partial_cmp(promote(b, kind)?);
            Ok(op.holds(ord))
        }));
    }
    if l.is_string_like() && r.is_string_like() {
        return Ok(comparison(move |a, b| {
            let (x, y) = (a.as_str().unwrap_or_default(), b.as_str().unwrap_or_default());
            Ok(op.holds(Some(x.cmp(y))))
        }));
    }
    if l == XdmType::Boolean && r == XdmType::Boolean {
        return Ok(comparison(move |a, b| match (a, b) {
            (V::Boolean(x), V::Boolean(y)) => Ok(op.holds(Some(x.cmp(y)))),
            _ => Err(mismatch(a)),
        }));
    }
    if let (Some(lk), Some(rk)) = (temporal_kind(l), temporal_kind(r))
        && lk == rk
    {
        return Ok(comparison(move |a, b| Ok(op.holds(Some(instant(a)?.cmp(&instant(b)?))))));
    }
    match (duration_kind(l), duration_kind(r)) {
        (Some(DurationKind::YearMonth), Some(DurationKind::YearMonth)) => {
            return Ok(comparison(move |a, b| {
                Ok(op.holds(Some(months_of(a)?.cmp(&months_of(b)?))))
            }));
        }
        (Some(DurationKind::DayTime), Some(DurationKind::DayTime)) => {
            return Ok(comparison(move |a, b| {
                Ok(op.holds(Some(seconds_of(a)?.cmp(&seconds_of(b)?))))
            }));
        }
        (Some(_), Some(_)) if op.is_equality() => {
            // a year-month and a day-time duration are equal only when both are zero
            return Ok(comparison(move |a, b| {
                let zero = |v: &XdmAtomicValue| match v {
                    V::YearMonthDuration(m) => *m == 0,
                    V::DayTimeDuration(s) => s.is_zero(),
                    _ => false,
                };
                let ord = (zero(a) && zero(b)).then_some(Ordering::Equal);
                Ok(op.holds(ord))
            }));
        }
        _ => {}
    }
    if l == r && op.is_equality() {
        match l {
            XdmType::QName => {
                return Ok(comparison(move |a, b| match (a, b) {
                    (
                        V::QName { ns_uri: n1, local: l1, .. },
                        V::QName { ns_uri: n2, local: l2, .. },
                    ) => Ok(op.holds((n1 == n2 && l1 == l2).then_some(Ordering::Equal))),
                    _ => Err(mismatch(a)),
                }));
            }
            XdmType::GYear
            | XdmType::GYearMonth
            | XdmType::GMonth
            | XdmType::GMonthDay
            | XdmType::GDay
            | XdmType::HexBinary
            | XdmType::Base64Binary => {
                return Ok(comparison(move |a, b| {
                    Ok(op.holds((a == b).then_some(Ordering::Equal)))
                }));
            }
            _ => {}
        }
    }
    Err(Error::type_error(format!(
        "values of type {left} and {right} cannot be compared with '{op}'"
    )))
}
