//! XDM values: atomic values, items and their type projection.

use chrono::{FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use core::fmt;
use rust_decimal::Decimal;
use std::sync::Arc;

use crate::engine::call::FunctionItem;
use crate::model::XdmNode;

pub mod stream;
pub mod types;

pub use stream::{
    Advance, Cardinality, Deferred, Progress, ReplayableSequence, ResumeSignal, SequenceCursor,
    XdmItemResult, XdmSequenceStream, deferred,
};
pub use types::XdmType;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExpandedName {
    pub ns_uri: Option<String>,
    pub local: String,
}

impl ExpandedName {
    pub fn new(ns_uri: Option<String>, local: impl Into<String>) -> Self {
        Self {
            ns_uri,
            local: local.into(),
        }
    }

    /// Name without a namespace.
    pub fn local(local: impl Into<String>) -> Self {
        Self::new(None, local)
    }

    /// Name in the default function namespace.
    pub fn fn_name(local: impl Into<String>) -> Self {
        Self::new(Some(crate::consts::FNS.to_string()), local)
    }
}

impl fmt::Display for ExpandedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.ns_uri {
            Some(ns) if ns == crate::consts::FNS => write!(f, "fn:{}", self.local),
            Some(ns) => write!(f, "Q{{{}}}{}", ns, self.local),
            None => f.write_str(&self.local),
        }
    }
}

/// An atomic value. The variant is the value's dynamic type; the payload is
/// stored in the narrowest representation that is lossless for that type.
///
/// Notes on representation:
/// - `xs:decimal` is a 96-bit fixed precision decimal (28 significant digits).
/// - `xs:yearMonthDuration` stores total months, `xs:dayTimeDuration` total
///   seconds as a decimal so fractional seconds survive arithmetic.
/// - Date/time values keep their optional timezone separately from the
///   local wall-clock value.
#[derive(Debug, Clone, PartialEq)]
pub enum XdmAtomicValue {
    Boolean(bool),
    String(String),
    UntypedAtomic(String),
    AnyUri(String),
    Integer(i64),
    Decimal(Decimal),
    Double(f64),
    Float(f32),
    Long(i64),
    Int(i32),
    Short(i16),
    Byte(i8),
    UnsignedLong(u64),
    UnsignedInt(u32),
    UnsignedShort(u16),
    UnsignedByte(u8),
    NonPositiveInteger(i64),
    NegativeInteger(i64),
    NonNegativeInteger(u64),
    PositiveInteger(u64),
    QName {
        ns_uri: Option<String>,
        prefix: Option<String>,
        local: String,
    },
    DateTime {
        value: NaiveDateTime,
        tz: Option<FixedOffset>,
    },
    Date {
        date: NaiveDate,
        tz: Option<FixedOffset>,
    },
    Time {
        time: NaiveTime,
        tz: Option<FixedOffset>,
    },
    YearMonthDuration(i32),
    DayTimeDuration(Decimal),
    GYear {
        year: i32,
        tz: Option<FixedOffset>,
    },
    GYearMonth {
        year: i32,
        month: u8,
        tz: Option<FixedOffset>,
    },
    GMonth {
        month: u8,
        tz: Option<FixedOffset>,
    },
    GMonthDay {
        month: u8,
        day: u8,
        tz: Option<FixedOffset>,
    },
    GDay {
        day: u8,
        tz: Option<FixedOffset>,
    },
    // Binary types keep their lexical form; validated on construction by casting
    Base64Binary(String),
    HexBinary(String),
    NormalizedString(String),
    Token(String),
    Language(String),
    Name(String),
    NcName(String),
    NmToken(String),
    Id(String),
    IdRef(String),
    Entity(String),
}

impl XdmAtomicValue {
    pub fn type_of(&self) -> XdmType {
        use XdmAtomicValue as V;
        match self {
            V::Boolean(_) => XdmType::Boolean,
            V::String(_) => XdmType::String,
            V::UntypedAtomic(_) => XdmType::UntypedAtomic,
            V::AnyUri(_) => XdmType::AnyUri,
            V::Integer(_) => XdmType::Integer,
            V::Decimal(_) => XdmType::Decimal,
            V::Double(_) => XdmType::Double,
            V::Float(_) => XdmType::Float,
            V::Long(_) => XdmType::Long,
            V::Int(_) => XdmType::Int,
            V::Short(_) => XdmType::Short,
            V::Byte(_) => XdmType::Byte,
            V::UnsignedLong(_) => XdmType::UnsignedLong,
            V::UnsignedInt(_) => XdmType::UnsignedInt,
            V::UnsignedShort(_) => XdmType::UnsignedShort,
            V::UnsignedByte(_) => XdmType::UnsignedByte,
            V::NonPositiveInteger(_) => XdmType::NonPositiveInteger,
            V::NegativeInteger(_) => XdmType::NegativeInteger,
            V::NonNegativeInteger(_) => XdmType::NonNegativeInteger,
            V::PositiveInteger(_) => XdmType::PositiveInteger,
            V::QName { .. } => XdmType::QName,
            V::DateTime { .. } => XdmType::DateTime,
            V::Date { .. } => XdmType::Date,
            V::Time { .. } => XdmType::Time,
            V::YearMonthDuration(_) => XdmType::YearMonthDuration,
            V::DayTimeDuration(_) => XdmType::DayTimeDuration,
            V::GYear { .. } => XdmType::GYear,
            V::GYearMonth { .. } => XdmType::GYearMonth,
            V::GMonth { .. } => XdmType::GMonth,
            V::GMonthDay { .. } => XdmType::GMonthDay,
            V::GDay { .. } => XdmType::GDay,
            V::Base64Binary(_) => XdmType::Base64Binary,
            V::HexBinary(_) => XdmType::HexBinary,
            V::NormalizedString(_) => XdmType::NormalizedString,
            V::Token(_) => XdmType::Token,
            V::Language(_) => XdmType::Language,
            V::Name(_) => XdmType::Name,
            V::NcName(_) => XdmType::NcName,
            V::NmToken(_) => XdmType::NmToken,
            V::Id(_) => XdmType::Id,
            V::IdRef(_) => XdmType::IdRef,
            V::Entity(_) => XdmType::Entity,
        }
    }

    /// Value of any member of the `xs:integer` family, widened to `i128`.
    pub fn integer_value(&self) -> Option<i128> {
        use XdmAtomicValue as V;
        Some(match self {
            V::Integer(i) | V::Long(i) | V::NonPositiveInteger(i) | V::NegativeInteger(i) => {
                i128::from(*i)
            }
            V::Int(i) => i128::from(*i),
            V::Short(i) => i128::from(*i),
            V::Byte(i) => i128::from(*i),
            V::UnsignedLong(i) | V::NonNegativeInteger(i) | V::PositiveInteger(i) => {
                i128::from(*i)
            }
            V::UnsignedInt(i) => i128::from(*i),
            V::UnsignedShort(i) => i128::from(*i),
            V::UnsignedByte(i) => i128::from(*i),
            _ => return None,
        })
    }

    /// Borrow the payload of string-like values (including untypedAtomic and anyURI).
    pub fn as_str(&self) -> Option<&str> {
        use XdmAtomicValue as V;
        match self {
            V::String(s)
            | V::UntypedAtomic(s)
            | V::AnyUri(s)
            | V::NormalizedString(s)
            | V::Token(s)
            | V::Language(s)
            | V::Name(s)
            | V::NcName(s)
            | V::NmToken(s)
            | V::Id(s)
            | V::IdRef(s)
            | V::Entity(s) => Some(s),
            _ => None,
        }
    }

    /// Canonical lexical representation (the value of `fn:string`).
    pub fn lexical(&self) -> String {
        crate::engine::casting::canonical_lexical(self)
    }
}

impl fmt::Display for XdmAtomicValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.lexical())
    }
}

impl From<bool> for XdmAtomicValue {
    fn from(b: bool) -> Self {
        XdmAtomicValue::Boolean(b)
    }
}

impl From<i64> for XdmAtomicValue {
    fn from(i: i64) -> Self {
        XdmAtomicValue::Integer(i)
    }
}

impl From<f64> for XdmAtomicValue {
    fn from(d: f64) -> Self {
        XdmAtomicValue::Double(d)
    }
}

impl From<Decimal> for XdmAtomicValue {
    fn from(d: Decimal) -> Self {
        XdmAtomicValue::Decimal(d)
    }
}

impl From<&str> for XdmAtomicValue {
    fn from(s: &str) -> Self {
        XdmAtomicValue::String(s.to_string())
    }
}

impl From<String> for XdmAtomicValue {
    fn from(s: String) -> Self {
        XdmAtomicValue::String(s)
    }
}

/// Materialized sequence, used for arguments that had to be inspected as a
/// whole and for array members.
pub type XdmSequence<N> = Vec<XdmItem<N>>;

/// Immutable array; members are materialized sequences.
#[derive(Debug)]
pub struct XdmArray<N> {
    members: Arc<Vec<XdmSequence<N>>>,
}

impl<N> Clone for XdmArray<N> {
    fn clone(&self) -> Self {
        Self {
            members: Arc::clone(&self.members),
        }
    }
}

impl<N> XdmArray<N> {
    pub fn new(members: Vec<XdmSequence<N>>) -> Self {
        Self {
            members: Arc::new(members),
        }
    }

    pub fn members(&self) -> &[XdmSequence<N>] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// 1-based member access.
    pub fn get(&self, position: i64) -> Option<&XdmSequence<N>> {
        let idx = usize::try_from(position).ok()?.checked_sub(1)?;
        self.members.get(idx)
    }
}

/// Immutable map keyed by atomic values compared with `op:same-key` semantics.
#[derive(Debug)]
pub struct XdmMap<N> {
    entries: Arc<Vec<(XdmAtomicValue, XdmSequence<N>)>>,
}

impl<N> Clone for XdmMap<N> {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
        }
    }
}

impl<N> XdmMap<N> {
    /// Build a map; later entries replace earlier ones with the same key.
    pub fn new(entries: impl IntoIterator<Item = (XdmAtomicValue, XdmSequence<N>)>) -> Self {
        let mut out: Vec<(XdmAtomicValue, XdmSequence<N>)> = Vec::new();
        for (k, v) in entries {
            if let Some(slot) = out.iter_mut().find(|(existing, _)| same_key(existing, &k)) {
                slot.1 = v;
            } else {
                out.push((k, v));
            }
        }
        Self {
            entries: Arc::new(out),
        }
    }

    pub fn get(&self, key: &XdmAtomicValue) -> Option<&XdmSequence<N>> {
        self.entries
            .iter()
            .find(|(k, _)| same_key(k, key))
            .map(|(_, v)| v)
    }

    pub fn keys(&self) -> impl Iterator<Item = &XdmAtomicValue> {
        self.entries.iter().map(|(k, _)| k)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// `op:same-key`: numerics compare by mathematical value, strings by
/// codepoints (untypedAtomic and anyURI count as strings), everything else
/// by type family and value.
pub fn same_key(a: &XdmAtomicValue, b: &XdmAtomicValue) -> bool {
    use rust_decimal::prelude::FromPrimitive;
    let (ta, tb) = (a.type_of(), b.type_of());
    if ta.is_numeric() && tb.is_numeric() {
        let to_dec = |v: &XdmAtomicValue| -> Option<Decimal> {
            match v {
                XdmAtomicValue::Decimal(d) => Some(*d),
                XdmAtomicValue::Double(d) => Decimal::from_f64(*d),
                XdmAtomicValue::Float(f) => Decimal::from_f32(*f),
                other => other.integer_value().and_then(Decimal::from_i128),
            }
        };
        return match (to_dec(a), to_dec(b)) {
            (Some(x), Some(y)) => x == y,
            // NaN is the same key as NaN
            _ => matches!(
                (a, b),
                (XdmAtomicValue::Double(x), XdmAtomicValue::Double(y)) if x.is_nan() && y.is_nan()
            ) || matches!(
                (a, b),
                (XdmAtomicValue::Float(x), XdmAtomicValue::Float(y)) if x.is_nan() && y.is_nan()
            ),
        };
    }
    if let (Some(x), Some(y)) = (a.as_str(), b.as_str()) {
        return x == y;
    }
    ta.primitive() == tb.primitive() && a == b
}

/// One item of a sequence.
pub enum XdmItem<N> {
    Node(N),
    Atomic(XdmAtomicValue),
    Map(XdmMap<N>),
    Array(XdmArray<N>),
    Function(Arc<FunctionItem<N>>),
}

impl<N: Clone> Clone for XdmItem<N> {
    fn clone(&self) -> Self {
        match self {
            XdmItem::Node(n) => XdmItem::Node(n.clone()),
            XdmItem::Atomic(a) => XdmItem::Atomic(a.clone()),
            XdmItem::Map(m) => XdmItem::Map(m.clone()),
            XdmItem::Array(a) => XdmItem::Array(a.clone()),
            XdmItem::Function(f) => XdmItem::Function(Arc::clone(f)),
        }
    }
}

impl<N: PartialEq> PartialEq for XdmItem<N> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (XdmItem::Node(a), XdmItem::Node(b)) => a == b,
            (XdmItem::Atomic(a), XdmItem::Atomic(b)) => a == b,
            (XdmItem::Map(a), XdmItem::Map(b)) => Arc::ptr_eq(&a.entries, &b.entries),
            (XdmItem::Array(a), XdmItem::Array(b)) => {
                a.members().len() == b.members().len()
                    && a.members().iter().zip(b.members()).all(|(x, y)| x == y)
            }
            (XdmItem::Function(a), XdmItem::Function(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl<N: fmt::Debug> fmt::Debug for XdmItem<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            XdmItem::Node(n) => f.debug_tuple("Node").field(n).finish(),
            XdmItem::Atomic(a) => f.debug_tuple("Atomic").field(a).finish(),
            XdmItem::Map(m) => write!(f, "Map(size={})", m.len()),
            XdmItem::Array(a) => write!(f, "Array(size={})", a.len()),
            XdmItem::Function(func) => write!(f, "Function({func:?})"),
        }
    }
}

impl<N: XdmNode> XdmItem<N> {
    /// Dynamic type of the item, used for sequence type matching.
    pub fn type_of(&self) -> XdmType {
        match self {
            XdmItem::Node(n) => XdmType::of_node_kind(&n.kind()),
            XdmItem::Atomic(a) => a.type_of(),
            XdmItem::Map(_) => XdmType::Map,
            XdmItem::Array(_) => XdmType::Array,
            XdmItem::Function(_) => XdmType::Function,
        }
    }
}

impl<N> From<XdmAtomicValue> for XdmItem<N> {
    fn from(a: XdmAtomicValue) -> Self {
        XdmItem::Atomic(a)
    }
}

impl<N> fmt::Display for XdmItem<N>
where
    N: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            XdmItem::Node(_) => write!(f, "<node>"),
            XdmItem::Atomic(a) => write!(f, "{a}"),
            XdmItem::Map(m) => write!(f, "map{{{} entries}}", m.len()),
            XdmItem::Array(a) => write!(f, "array{{{} members}}", a.len()),
            XdmItem::Function(func) => write!(f, "{func:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simple_node::SimpleNode;

    #[test]
    fn integer_family_widens() {
        assert_eq!(XdmAtomicValue::UnsignedLong(u64::MAX).integer_value(), Some(i128::from(u64::MAX)));
        assert_eq!(XdmAtomicValue::Byte(-3).integer_value(), Some(-3));
        assert_eq!(XdmAtomicValue::Double(1.0).integer_value(), None);
    }

    #[test]
    fn map_keys_compare_numerically() {
        let m: XdmMap<SimpleNode> = XdmMap::new([
            (XdmAtomicValue::Integer(1), vec![XdmItem::Atomic("one".into())]),
            (XdmAtomicValue::Decimal(Decimal::ONE), vec![XdmItem::Atomic("uno".into())]),
        ]);
        assert_eq!(m.len(), 1);
        let hit = m.get(&XdmAtomicValue::Double(1.0)).expect("numeric key");
        assert_eq!(hit, &vec![XdmItem::Atomic(XdmAtomicValue::from("uno"))]);
    }

    #[test]
    fn string_keys_ignore_untyped_distinction() {
        assert!(same_key(
            &XdmAtomicValue::UntypedAtomic("a".into()),
            &XdmAtomicValue::String("a".into())
        ));
        assert!(!same_key(&XdmAtomicValue::String("1".into()), &XdmAtomicValue::Integer(1)));
    }

    #[test]
    fn array_positions_are_one_based() {
        let a: XdmArray<SimpleNode> = XdmArray::new(vec![vec![], vec![XdmItem::Atomic(2i64.into())]]);
        assert!(a.get(0).is_none());
        assert_eq!(a.get(2).map(Vec::len), Some(1));
        assert!(a.get(3).is_none());
    }
}
