//! Cursor state machines behind the sequence combinators.
//!
//! Each cursor owns its inputs and records how far it got, so a pull that
//! hits a suspension returns immediately and the next pull resumes at the
//! same point. No cursor blocks; suspensions of inner inputs are forwarded
//! outward unchanged.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use rust_decimal::Decimal;

use crate::engine::runtime::{Error, ErrorCode};
use crate::model::XdmNode;
use crate::xdm::stream::{ReplayBuffer, drain_into};
use crate::xdm::{
    Advance, Deferred, ResumeSignal, SequenceCursor, XdmAtomicValue, XdmItem, XdmSequence,
    XdmSequenceStream,
};

pub(crate) enum VecCursor<N> {
    Owned(std::vec::IntoIter<XdmItem<N>>),
    // reads a shared vector without taking ownership of its items
    Shared { items: Arc<Vec<XdmItem<N>>>, pos: usize },
}

impl<N> VecCursor<N> {
    pub(crate) fn new(items: XdmSequence<N>) -> Self {
        VecCursor::Owned(items.into_iter())
    }

    pub(crate) fn shared(items: Arc<Vec<XdmItem<N>>>) -> Self {
        VecCursor::Shared { items, pos: 0 }
    }
}

impl<N: XdmNode> SequenceCursor<N> for VecCursor<N> {
    fn advance(&mut self) -> Result<Advance<N>, Error> {
        let next = match self {
            VecCursor::Owned(it) => it.next(),
            VecCursor::Shared { items, pos } => {
                let next = items.get(*pos).cloned();
                *pos += usize::from(next.is_some());
                next
            }
        };
        Ok(next.map_or(Advance::Done, Advance::Item))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = match self {
            VecCursor::Owned(it) => it.len(),
            VecCursor::Shared { items, pos } => items.len().saturating_sub(*pos),
        };
        (n, Some(n))
    }
}

pub(crate) struct IterCursor<I> {
    iter: I,
}

impl<I> IterCursor<I> {
    pub(crate) fn new(iter: I) -> Self {
        Self { iter }
    }
}

impl<N, I> SequenceCursor<N> for IterCursor<I>
where
    I: Iterator<Item = XdmItem<N>> + Send,
{
    fn advance(&mut self) -> Result<Advance<N>, Error> {
        Ok(self.iter.next().map_or(Advance::Done, Advance::Item))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.iter.size_hint()
    }
}

pub(crate) struct FnCursor<F> {
    step: F,
    done: bool,
}

impl<F> FnCursor<F> {
    pub(crate) fn new(step: F) -> Self {
        Self { step, done: false }
    }
}

impl<N, F> SequenceCursor<N> for FnCursor<F>
where
    F: FnMut() -> Result<Advance<N>, Error> + Send,
{
    fn advance(&mut self) -> Result<Advance<N>, Error> {
        if self.done {
            return Ok(Advance::Done);
        }
        let step = (self.step)()?;
        if matches!(step, Advance::Done) {
            self.done = true;
        }
        Ok(step)
    }
}

pub(crate) struct LenHintCursor<C> {
    inner: C,
    remaining: usize,
}

impl<C> LenHintCursor<C> {
    pub(crate) fn new(inner: C, len: usize) -> Self {
        Self {
            inner,
            remaining: len,
        }
    }
}

impl<N, C: SequenceCursor<N>> SequenceCursor<N> for LenHintCursor<C> {
    fn advance(&mut self) -> Result<Advance<N>, Error> {
        let step = self.inner.advance()?;
        if matches!(step, Advance::Item(_)) {
            self.remaining = self.remaining.saturating_sub(1);
        }
        Ok(step)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

pub(crate) struct DeferredCursor<N> {
    value: Deferred<N>,
    items: Option<std::vec::IntoIter<XdmItem<N>>>,
}

impl<N> DeferredCursor<N> {
    pub(crate) fn new(value: Deferred<N>) -> Self {
        Self { value, items: None }
    }
}

impl<N: XdmNode + 'static> SequenceCursor<N> for DeferredCursor<N> {
    fn advance(&mut self) -> Result<Advance<N>, Error> {
        if self.items.is_none() {
            match self.value.peek() {
                None => return Ok(Advance::Suspended(self.value.signal())),
                Some(result) => self.items = Some(result?.into_iter()),
            }
        }
        Ok(self
            .items
            .as_mut()
            .and_then(Iterator::next)
            .map_or(Advance::Done, Advance::Item))
    }
}

pub(crate) struct RangeCursor {
    next: i64,
    end: i64,
    exhausted: bool,
}

impl RangeCursor {
    pub(crate) fn new(start: i64, end: i64) -> Self {
        Self {
            next: start,
            end,
            exhausted: start > end,
        }
    }
}

impl<N> SequenceCursor<N> for RangeCursor {
    fn advance(&mut self) -> Result<Advance<N>, Error> {
        if self.exhausted {
            return Ok(Advance::Done);
        }
        let current = self.next;
        match current.checked_add(1) {
            Some(n) if current < self.end => self.next = n,
            // reached `end` (possibly i64::MAX)
            _ => self.exhausted = true,
        }
        Ok(Advance::Item(XdmItem::Atomic(XdmAtomicValue::Integer(current))))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.exhausted {
            return (0, Some(0));
        }
        let span = i128::from(self.end) - i128::from(self.next) + 1;
        match usize::try_from(span) {
            Ok(n) => (n, Some(n)),
            Err(_) => (usize::MAX, None),
        }
    }
}

pub(crate) struct ReplayCursor<N> {
    buffer: Arc<Mutex<ReplayBuffer<N>>>,
    pos: usize,
}

impl<N> ReplayCursor<N> {
    pub(crate) fn new(buffer: Arc<Mutex<ReplayBuffer<N>>>) -> Self {
        Self { buffer, pos: 0 }
    }
}

impl<N: XdmNode + 'static> SequenceCursor<N> for ReplayCursor<N> {
    fn advance(&mut self) -> Result<Advance<N>, Error> {
        let mut buf = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(item) = buf.items.get(self.pos) {
            self.pos += 1;
            return Ok(Advance::Item(item.clone()));
        }
        if let Some(e) = &buf.error {
            return Err(e.clone());
        }
        let Some(source) = buf.source.as_mut() else {
            return Ok(Advance::Done);
        };
        match source.advance() {
            Ok(Advance::Item(item)) => {
                buf.items.push(item.clone());
                self.pos += 1;
                Ok(Advance::Item(item))
            }
            Ok(Advance::Done) => {
                buf.source = None;
                Ok(Advance::Done)
            }
            Ok(Advance::Suspended(sig)) => Ok(Advance::Suspended(sig)),
            Err(e) => {
                buf.source = None;
                buf.error = Some(e.clone());
                Err(e)
            }
        }
    }
}

pub(crate) struct MapCursor<N, F> {
    inner: XdmSequenceStream<N>,
    f: F,
}

impl<N, F> MapCursor<N, F> {
    pub(crate) fn new(inner: XdmSequenceStream<N>, f: F) -> Self {
        Self { inner, f }
    }
}

impl<N, F> SequenceCursor<N> for MapCursor<N, F>
where
    N: XdmNode + 'static,
    F: FnMut(XdmItem<N>) -> Result<XdmItem<N>, Error> + Send,
{
    fn advance(&mut self) -> Result<Advance<N>, Error> {
        Ok(match self.inner.advance()? {
            Advance::Item(item) => Advance::Item((self.f)(item)?),
            other => other,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

enum MapAllState<N, F> {
    Collecting {
        inner: XdmSequenceStream<N>,
        buffer: VecDeque<XdmItem<N>>,
        f: F,
    },
    Emitting(std::vec::IntoIter<XdmItem<N>>),
    // transient while switching states
    Empty,
}

pub(crate) struct MapAllCursor<N, F> {
    state: MapAllState<N, F>,
}

impl<N, F> MapAllCursor<N, F> {
    pub(crate) fn new(inner: XdmSequenceStream<N>, f: F) -> Self {
        Self {
            state: MapAllState::Collecting {
                inner,
                buffer: VecDeque::new(),
                f,
            },
        }
    }
}

impl<N, F> SequenceCursor<N> for MapAllCursor<N, F>
where
    N: XdmNode + 'static,
    F: FnOnce(XdmSequence<N>) -> Result<XdmSequence<N>, Error> + Send,
{
    fn advance(&mut self) -> Result<Advance<N>, Error> {
        if let MapAllState::Collecting { inner, buffer, .. } = &mut self.state
            && let Some(sig) = drain_into(inner, buffer)?
        {
            return Ok(Advance::Suspended(sig));
        }
        match std::mem::replace(&mut self.state, MapAllState::Empty) {
            MapAllState::Collecting { buffer, f, .. } => {
                self.state = MapAllState::Emitting(f(buffer.into())?.into_iter());
            }
            other => self.state = other,
        }
        match &mut self.state {
            MapAllState::Emitting(items) => Ok(items.next().map_or(Advance::Done, Advance::Item)),
            _ => Ok(Advance::Done),
        }
    }
}

pub(crate) struct FilterCursor<N, F> {
    inner: XdmSequenceStream<N>,
    pred: F,
}

impl<N, F> FilterCursor<N, F> {
    pub(crate) fn new(inner: XdmSequenceStream<N>, pred: F) -> Self {
        Self { inner, pred }
    }
}

impl<N, F> SequenceCursor<N> for FilterCursor<N, F>
where
    N: XdmNode + 'static,
    F: FnMut(&XdmItem<N>) -> Result<bool, Error> + Send,
{
    fn advance(&mut self) -> Result<Advance<N>, Error> {
        loop {
            match self.inner.advance()? {
                Advance::Item(item) => {
                    if (self.pred)(&item)? {
                        return Ok(Advance::Item(item));
                    }
                }
                other => return Ok(other),
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, self.inner.size_hint().1)
    }
}

pub(crate) struct FlatMapCursor<N, F> {
    outer: XdmSequenceStream<N>,
    current: Option<XdmSequenceStream<N>>,
    f: F,
}

impl<N, F> FlatMapCursor<N, F> {
    pub(crate) fn new(outer: XdmSequenceStream<N>, f: F) -> Self {
        Self {
            outer,
            current: None,
            f,
        }
    }
}

impl<N, F> SequenceCursor<N> for FlatMapCursor<N, F>
where
    N: XdmNode + 'static,
    F: FnMut(XdmItem<N>) -> Result<XdmSequenceStream<N>, Error> + Send,
{
    fn advance(&mut self) -> Result<Advance<N>, Error> {
        loop {
            if let Some(cur) = self.current.as_mut() {
                match cur.advance()? {
                    Advance::Done => self.current = None,
                    other => return Ok(other),
                }
            }
            match self.outer.advance()? {
                Advance::Item(item) => self.current = Some((self.f)(item)?),
                other => return Ok(other),
            }
        }
    }
}

pub(crate) struct ConcatCursor<N> {
    parts: VecDeque<XdmSequenceStream<N>>,
}

impl<N> ConcatCursor<N> {
    pub(crate) fn new(parts: Vec<XdmSequenceStream<N>>) -> Self {
        Self {
            parts: parts.into(),
        }
    }
}

impl<N: XdmNode + 'static> SequenceCursor<N> for ConcatCursor<N> {
    fn advance(&mut self) -> Result<Advance<N>, Error> {
        while let Some(front) = self.parts.front_mut() {
            match front.advance()? {
                Advance::Done => {
                    self.parts.pop_front();
                }
                other => return Ok(other),
            }
        }
        Ok(Advance::Done)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.parts.iter().fold((0, Some(0)), |(lo, hi), p| {
            let (plo, phi) = p.size_hint();
            (
                lo.saturating_add(plo),
                hi.zip(phi).and_then(|(a, b)| a.checked_add(b)),
            )
        })
    }
}

pub(crate) struct TakeCursor<N> {
    inner: XdmSequenceStream<N>,
    remaining: usize,
}

impl<N> TakeCursor<N> {
    pub(crate) fn new(inner: XdmSequenceStream<N>, n: usize) -> Self {
        Self {
            inner,
            remaining: n,
        }
    }
}

impl<N: XdmNode + 'static> SequenceCursor<N> for TakeCursor<N> {
    fn advance(&mut self) -> Result<Advance<N>, Error> {
        if self.remaining == 0 {
            return Ok(Advance::Done);
        }
        let step = self.inner.advance()?;
        if matches!(step, Advance::Item(_)) {
            self.remaining -= 1;
        }
        Ok(step)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let (lo, hi) = self.inner.size_hint();
        (
            lo.min(self.remaining),
            Some(hi.map_or(self.remaining, |h| h.min(self.remaining))),
        )
    }
}

/// Appends the atomized value of `item` to `out`.
pub(crate) fn atomize_item<N: XdmNode>(
    item: XdmItem<N>,
    out: &mut VecDeque<XdmAtomicValue>,
) -> Result<(), Error> {
    match item {
        XdmItem::Atomic(a) => out.push_back(a),
        XdmItem::Node(n) => out.extend(n.typed_value()),
        XdmItem::Array(arr) => {
            for member in arr.members() {
                for inner in member {
                    atomize_item(inner.clone(), out)?;
                }
            }
        }
        XdmItem::Map(_) => {
            return Err(Error::from_code(ErrorCode::FOTY0013, "a map cannot be atomized"));
        }
        XdmItem::Function(f) => {
            return Err(Error::from_code(
                ErrorCode::FOTY0013,
                format!("function {} cannot be atomized", f.name_for_display()),
            ));
        }
    }
    Ok(())
}

pub(crate) struct AtomizeCursor<N> {
    inner: XdmSequenceStream<N>,
    pending: VecDeque<XdmAtomicValue>,
}

impl<N> AtomizeCursor<N> {
    pub(crate) fn new(inner: XdmSequenceStream<N>) -> Self {
        Self {
            inner,
            pending: VecDeque::new(),
        }
    }
}

impl<N: XdmNode + 'static> SequenceCursor<N> for AtomizeCursor<N> {
    fn advance(&mut self) -> Result<Advance<N>, Error> {
        loop {
            if let Some(a) = self.pending.pop_front() {
                return Ok(Advance::Item(XdmItem::Atomic(a)));
            }
            match self.inner.advance()? {
                Advance::Item(XdmItem::Atomic(a)) => return Ok(Advance::Item(XdmItem::Atomic(a))),
                Advance::Item(other) => atomize_item(other, &mut self.pending)?,
                other => return Ok(other),
            }
        }
    }
}

struct ZipSlot<N> {
    input: XdmSequenceStream<N>,
    item: Option<XdmItem<N>>,
    done: bool,
}

pub(crate) struct ZipCursor<N, F> {
    slots: Vec<ZipSlot<N>>,
    combine: Option<F>,
    output: Option<XdmSequenceStream<N>>,
}

impl<N, F> ZipCursor<N, F> {
    pub(crate) fn new(inputs: Vec<XdmSequenceStream<N>>, combine: F) -> Self {
        Self {
            slots: inputs
                .into_iter()
                .map(|input| ZipSlot {
                    input,
                    item: None,
                    done: false,
                })
                .collect(),
            combine: Some(combine),
            output: None,
        }
    }
}

impl<N, F> SequenceCursor<N> for ZipCursor<N, F>
where
    N: XdmNode + 'static,
    F: FnOnce(Vec<Option<XdmItem<N>>>) -> Result<XdmSequenceStream<N>, Error> + Send,
{
    fn advance(&mut self) -> Result<Advance<N>, Error> {
        if let Some(out) = self.output.as_mut() {
            return out.advance();
        }
        // Every input advances on its own; the first suspension is reported
        // once all inputs have been given a chance to progress.
        let mut suspended: Option<ResumeSignal> = None;
        for (idx, slot) in self.slots.iter_mut().enumerate() {
            while !slot.done {
                match slot.input.advance()? {
                    Advance::Item(item) => {
                        if slot.item.is_some() {
                            return Err(Error::type_error(format!(
                                "operand {} must be a single item, found a sequence of more than one",
                                idx + 1
                            )));
                        }
                        slot.item = Some(item);
                    }
                    Advance::Done => slot.done = true,
                    Advance::Suspended(sig) => {
                        suspended.get_or_insert(sig);
                        break;
                    }
                }
            }
        }
        if let Some(sig) = suspended {
            return Ok(Advance::Suspended(sig));
        }
        let Some(combine) = self.combine.take() else {
            return Ok(Advance::Done);
        };
        let singles = self.slots.iter_mut().map(|s| s.item.take()).collect();
        let out = self.output.insert(combine(singles)?);
        out.advance()
    }
}

#[derive(Clone, Copy)]
enum EbvState {
    First,
    // first item was atomic; its value is final unless a second item follows
    Single(bool),
    Finished,
}

/// Effective boolean value, or predicate truth when `position` is set.
pub(crate) struct EbvCursor<N> {
    inner: XdmSequenceStream<N>,
    position: Option<usize>,
    state: EbvState,
}

impl<N> EbvCursor<N> {
    pub(crate) fn new(inner: XdmSequenceStream<N>, position: Option<usize>) -> Self {
        Self {
            inner,
            position,
            state: EbvState::First,
        }
    }
}

fn ebv_error(msg: &str) -> Error {
    Error::from_code(ErrorCode::FORG0006, msg)
}

/// EBV of a single atomic value.
pub(crate) fn atomic_ebv(a: &XdmAtomicValue) -> Result<bool, Error> {
    use XdmAtomicValue as V;
    Ok(match a {
        V::Boolean(b) => *b,
        V::Double(d) => !(d.is_nan() || *d == 0.0),
        V::Float(f) => !(f.is_nan() || *f == 0.0),
        V::Decimal(d) => !d.is_zero(),
        other => {
            if let Some(i) = other.integer_value() {
                i != 0
            } else if let Some(s) = other.as_str() {
                !s.is_empty()
            } else {
                return Err(ebv_error(&format!(
                    "effective boolean value is not defined for {}",
                    other.type_of()
                )));
            }
        }
    })
}

fn numeric_position_match(a: &XdmAtomicValue, position: usize) -> Option<bool> {
    use rust_decimal::prelude::FromPrimitive;
    let pos = Decimal::from_usize(position)?;
    match a {
        XdmAtomicValue::Double(d) => Some(Decimal::from_f64(*d) == Some(pos)),
        XdmAtomicValue::Float(f) => Some(Decimal::from_f32(*f) == Some(pos)),
        XdmAtomicValue::Decimal(d) => Some(*d == pos),
        other => other
            .integer_value()
            .map(|i| usize::try_from(i).is_ok_and(|p| p == position)),
    }
}

impl<N: XdmNode + 'static> SequenceCursor<N> for EbvCursor<N> {
    fn advance(&mut self) -> Result<Advance<N>, Error> {
        loop {
            let value = match self.state {
                EbvState::Finished => return Ok(Advance::Done),
                EbvState::First => match self.inner.advance()? {
                    Advance::Suspended(sig) => return Ok(Advance::Suspended(sig)),
                    Advance::Done => false,
                    Advance::Item(XdmItem::Node(_)) => true,
                    Advance::Item(XdmItem::Atomic(a)) => {
                        let single = match self.position.and_then(|p| numeric_position_match(&a, p)) {
                            Some(hit) => hit,
                            None => atomic_ebv(&a)?,
                        };
                        self.state = EbvState::Single(single);
                        continue;
                    }
                    Advance::Item(other) => {
                        return Err(ebv_error(&format!(
                            "effective boolean value is not defined for {}",
                            crate::engine::call::item_kind_name(&other)
                        )));
                    }
                },
                EbvState::Single(v) => match self.inner.advance()? {
                    Advance::Suspended(sig) => return Ok(Advance::Suspended(sig)),
                    Advance::Done => v,
                    Advance::Item(_) => {
                        return Err(ebv_error(
                            "effective boolean value is not defined for a sequence of two or more items starting with an atomic value",
                        ));
                    }
                },
            };
            self.state = EbvState::Finished;
            return Ok(Advance::Item(XdmItem::Atomic(XdmAtomicValue::Boolean(value))));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simple_node::{SimpleNode, elem};
    use crate::xdm::{XdmArray, XdmMap, deferred};
    use rstest::rstest;

    type S = XdmSequenceStream<SimpleNode>;
    type Item = XdmItem<SimpleNode>;

    fn int(i: i64) -> Item {
        XdmItem::Atomic(XdmAtomicValue::Integer(i))
    }

    fn ebv(items: Vec<Item>) -> Result<bool, Error> {
        match S::from_vec(items).effective_boolean_value().materialize()?.as_slice() {
            [XdmItem::Atomic(XdmAtomicValue::Boolean(b))] => Ok(*b),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[rstest]
    #[case(vec![], false)]
    #[case(vec![int(0)], false)]
    #[case(vec![int(3)], true)]
    #[case(vec![XdmItem::Atomic(XdmAtomicValue::Double(f64::NAN))], false)]
    #[case(vec![XdmItem::Atomic("".into())], false)]
    #[case(vec![XdmItem::Atomic(XdmAtomicValue::UntypedAtomic("x".into()))], true)]
    #[case(vec![XdmItem::Atomic(XdmAtomicValue::Boolean(false))], false)]
    fn ebv_of_singletons(#[case] items: Vec<Item>, #[case] expected: bool) {
        assert_eq!(ebv(items).unwrap(), expected);
    }

    #[test]
    fn ebv_node_first_short_circuits() {
        let node = XdmItem::Node(elem("a").build());
        // the failing tail is never pulled
        let s = S::singleton(node).concat(S::failed(Error::from_code(ErrorCode::FOER0000, "tail")));
        let out = s.effective_boolean_value().materialize().unwrap();
        assert_eq!(out, vec![XdmItem::Atomic(XdmAtomicValue::Boolean(true))]);
    }

    #[test]
    fn ebv_of_two_atomics_is_an_error() {
        let err = ebv(vec![int(1), int(2)]).unwrap_err();
        assert_eq!(err.code.local, "FORG0006");
    }

    #[test]
    fn ebv_of_date_is_an_error() {
        let d = chrono::NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let err = ebv(vec![XdmItem::Atomic(XdmAtomicValue::Date { date: d, tz: None })]).unwrap_err();
        assert_eq!(err.code.local, "FORG0006");
    }

    #[test]
    fn predicate_truth_uses_position_for_numbers() {
        let truth = |v: Item, pos: usize| {
            S::singleton(v).predicate_truth(pos).materialize().unwrap()
                == vec![XdmItem::Atomic(XdmAtomicValue::Boolean(true))]
        };
        assert!(truth(int(2), 2));
        assert!(!truth(int(2), 1));
        assert!(truth(XdmItem::Atomic(XdmAtomicValue::Double(1.0)), 1));
        assert!(!truth(XdmItem::Atomic(XdmAtomicValue::Double(1.5)), 1));
        assert!(truth(XdmItem::Atomic("yes".into()), 7));
    }

    #[test]
    fn atomize_flattens_arrays_and_rejects_maps() {
        let arr = XdmItem::Array(XdmArray::new(vec![vec![int(1)], vec![int(2), int(3)]]));
        let out = S::from_vec(vec![arr, XdmItem::Node(elem("e").build())]).atomize().materialize().unwrap();
        assert_eq!(out.len(), 4);
        assert_eq!(out[3], XdmItem::Atomic(XdmAtomicValue::UntypedAtomic(String::new())));

        let map = XdmItem::Map(XdmMap::new(Vec::new()));
        let err = S::singleton(map).atomize().materialize().unwrap_err();
        assert_eq!(err.code.local, "FOTY0013");
    }

    #[test]
    fn range_handles_extremes() {
        let out = S::range(i64::MAX - 1, i64::MAX).materialize().unwrap();
        assert_eq!(out, vec![int(i64::MAX - 1), int(i64::MAX)]);
        assert!(S::range(5, 4).materialize().unwrap().is_empty());
        let huge = S::range(1, i64::MAX).take(3).materialize().unwrap();
        assert_eq!(huge, vec![int(1), int(2), int(3)]);
    }

    #[test]
    fn map_all_waits_for_suspended_input() {
        let (resolver, value) = deferred::<SimpleNode>();
        let mut s = S::singleton(int(1))
            .concat(S::deferred(value))
            .map_all(|items| Ok(vec![int(i64::try_from(items.len()).unwrap())]));
        let Ok(Advance::Suspended(sig)) = s.advance() else {
            panic!("expected suspension");
        };
        resolver.resolve(Ok(vec![int(2), int(3)])).unwrap();
        futures::executor::block_on(sig);
        assert!(matches!(s.advance(), Ok(Advance::Item(XdmItem::Atomic(XdmAtomicValue::Integer(3))))));
        assert!(matches!(s.advance(), Ok(Advance::Done)));
    }

    #[test]
    fn flat_map_and_filter_compose() {
        let out = S::range(1, 3)
            .flat_map(|i| Ok(S::from_vec(vec![i.clone(), i])))
            .filter(|i| Ok(matches!(i, XdmItem::Atomic(XdmAtomicValue::Integer(n)) if n % 2 == 1)))
            .materialize()
            .unwrap();
        assert_eq!(out, vec![int(1), int(1), int(3), int(3)]);
    }
}
