//! Lazy, suspension-capable sequences.
//!
//! An [`XdmSequenceStream`] is pulled one step at a time with
//! [`advance`](XdmSequenceStream::advance), which reports one of
//!
//! - [`Advance::Item`]: the next item in sequence order,
//! - [`Advance::Suspended`]: the next item depends on work that has not
//!   completed; await the [`ResumeSignal`] before pulling again,
//! - [`Advance::Done`]: the sequence is exhausted.
//!
//! Pulling again while suspended is harmless and reports the suspension
//! again. `Done` is sticky, and so is failure: once a pull returned an
//! error every later pull returns the same error.
//!
//! Every combinator returns a new stream whose cursor holds explicit
//! resumable state (see `engine::cursors`), so a whole tree of nested
//! combinators is driven by a single external pull loop.

use core::fmt;
use core::pin::Pin;
use core::task::{Context, Poll};
use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use futures::FutureExt;
use futures::channel::oneshot;
use futures::future::{BoxFuture, Shared};
use smallvec::SmallVec;

use crate::engine::cursors::{
    AtomizeCursor, ConcatCursor, DeferredCursor, EbvCursor, FilterCursor, FlatMapCursor,
    FnCursor, IterCursor, LenHintCursor, MapAllCursor, MapCursor, RangeCursor, ReplayCursor,
    TakeCursor, VecCursor, ZipCursor,
};
use crate::engine::runtime::{Error, ErrorCode};
use crate::model::XdmNode;
use crate::xdm::{XdmItem, XdmSequence};

pub type XdmItemResult<N> = Result<XdmItem<N>, Error>;

/// Outcome of one pull.
pub enum Advance<N> {
    Done,
    Item(XdmItem<N>),
    Suspended(ResumeSignal),
}

impl<N: fmt::Debug> fmt::Debug for Advance<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Advance::Done => f.write_str("Done"),
            Advance::Item(i) => f.debug_tuple("Item").field(i).finish(),
            Advance::Suspended(_) => f.write_str("Suspended"),
        }
    }
}

/// Result of an inspection that may have to wait.
#[derive(Debug)]
pub enum Progress<T> {
    Ready(T),
    Suspended(ResumeSignal),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    Empty,
    One,
    Many,
}

/// Future completing when a suspended sequence may make progress.
/// Cloning shares the underlying wait.
#[derive(Clone)]
pub struct ResumeSignal(Shared<BoxFuture<'static, ()>>);

impl ResumeSignal {
    pub fn new(fut: impl Future<Output = ()> + Send + 'static) -> Self {
        ResumeSignal(fut.boxed().shared())
    }

    /// An already completed signal.
    pub fn ready() -> Self {
        Self::new(futures::future::ready(()))
    }

    pub fn is_ready(&self) -> bool {
        self.0.peek().is_some()
    }
}

impl fmt::Debug for ResumeSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResumeSignal")
            .field("ready", &self.is_ready())
            .finish()
    }
}

impl Future for ResumeSignal {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        Pin::new(&mut self.0).poll(cx)
    }
}

/// The pull interface implemented by every sequence source and combinator.
///
/// Implementations must tolerate being pulled again after returning
/// `Suspended` and must keep returning `Done` once exhausted.
pub trait SequenceCursor<N>: Send {
    fn advance(&mut self) -> Result<Advance<N>, Error>;

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, None)
    }
}

type HostResult<N> = Result<XdmSequence<N>, Error>;

/// A value computed outside the evaluator, possibly not yet available.
pub struct Deferred<N> {
    value: Shared<BoxFuture<'static, HostResult<N>>>,
    signal: ResumeSignal,
}

impl<N> Clone for Deferred<N> {
    fn clone(&self) -> Self {
        Self {
            value: self.value.clone(),
            signal: self.signal.clone(),
        }
    }
}

impl<N: XdmNode + 'static> Deferred<N> {
    pub fn from_future(fut: impl Future<Output = HostResult<N>> + Send + 'static) -> Self {
        let value = fut.boxed().shared();
        let signal = ResumeSignal::new(value.clone().map(|_| ()));
        Self { value, signal }
    }

    /// The value if it is available now. Never blocks.
    pub fn peek(&self) -> Option<HostResult<N>> {
        if let Some(v) = self.value.peek() {
            return Some(v.clone());
        }
        self.value.clone().now_or_never()
    }

    pub fn signal(&self) -> ResumeSignal {
        self.signal.clone()
    }
}

/// Completes the paired [`Deferred`].
pub struct Resolver<N> {
    tx: oneshot::Sender<HostResult<N>>,
}

impl<N> Resolver<N> {
    /// Deliver the value. Returns the value back if the deferred was dropped.
    pub fn resolve(self, value: HostResult<N>) -> Result<(), HostResult<N>> {
        self.tx.send(value)
    }
}

/// A (resolver, deferred) pair. Dropping the resolver without resolving
/// fails the deferred with `err:FOER0000`.
pub fn deferred<N: XdmNode + 'static>() -> (Resolver<N>, Deferred<N>) {
    let (tx, rx) = oneshot::channel();
    let fut = rx.map(|r| {
        r.unwrap_or_else(|_| {
            Err(Error::from_code(
                ErrorCode::FOER0000,
                "host value was dropped before it was resolved",
            ))
        })
    });
    (Resolver { tx }, Deferred::from_future(fut))
}

enum StreamState<N> {
    Open(Box<dyn SequenceCursor<N>>),
    Done,
    Failed(Error),
}

/// A lazily produced sequence. Single pass; see [`ReplayableSequence`] for
/// values that are read more than once.
pub struct XdmSequenceStream<N> {
    state: StreamState<N>,
    // items pulled ahead by cardinality inspection
    lookahead: SmallVec<[XdmItem<N>; 2]>,
    pending: Option<ResumeSignal>,
    error_reported: bool,
}

impl<N> fmt::Debug for XdmSequenceStream<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &self.state {
            StreamState::Open(_) => "open",
            StreamState::Done => "done",
            StreamState::Failed(_) => "failed",
        };
        f.debug_struct("XdmSequenceStream")
            .field("state", &state)
            .field("lookahead", &self.lookahead.len())
            .finish()
    }
}

impl<N: XdmNode + 'static> XdmSequenceStream<N> {
    fn with_state(state: StreamState<N>) -> Self {
        Self {
            state,
            lookahead: SmallVec::new(),
            pending: None,
            error_reported: false,
        }
    }

    pub fn empty() -> Self {
        Self::with_state(StreamState::Done)
    }

    pub fn singleton(item: XdmItem<N>) -> Self {
        let mut s = Self::empty();
        s.lookahead.push(item);
        s
    }

    pub fn from_vec(items: XdmSequence<N>) -> Self {
        Self::from_cursor(VecCursor::new(items))
    }

    pub fn from_iterator<I>(items: I) -> Self
    where
        I: IntoIterator<Item = XdmItem<N>>,
        I::IntoIter: Send + 'static,
    {
        Self::from_cursor(IterCursor::new(items.into_iter()))
    }

    pub fn from_cursor(cursor: impl SequenceCursor<N> + 'static) -> Self {
        Self::with_state(StreamState::Open(Box::new(cursor)))
    }

    /// Custom cursor with a known length.
    pub fn from_cursor_with_len(cursor: impl SequenceCursor<N> + 'static, len: usize) -> Self {
        Self::from_cursor(LenHintCursor::new(cursor, len))
    }

    /// Cursor from a step function.
    pub fn from_fn<F>(step: F) -> Self
    where
        F: FnMut() -> Result<Advance<N>, Error> + Send + 'static,
    {
        Self::from_cursor(FnCursor::new(step))
    }

    pub fn failed(err: Error) -> Self {
        Self::with_state(StreamState::Failed(err))
    }

    /// Items delivered by a host value once it resolves.
    pub fn deferred(value: Deferred<N>) -> Self {
        Self::from_cursor(DeferredCursor::new(value))
    }

    /// Integers `start..=end`, produced on demand.
    pub fn range(start: i64, end: i64) -> Self {
        Self::from_cursor(RangeCursor::new(start, end))
    }

    pub fn advance(&mut self) -> Result<Advance<N>, Error> {
        if !self.lookahead.is_empty() {
            return Ok(Advance::Item(self.lookahead.remove(0)));
        }
        let step = match &mut self.state {
            StreamState::Done => return Ok(Advance::Done),
            StreamState::Failed(e) => return Err(e.clone()),
            StreamState::Open(cursor) => cursor.advance(),
        };
        match step {
            Ok(Advance::Done) => {
                self.state = StreamState::Done;
                Ok(Advance::Done)
            }
            Ok(Advance::Suspended(signal)) => {
                tracing::trace!("sequence suspended");
                Ok(Advance::Suspended(signal))
            }
            Ok(item) => Ok(item),
            Err(e) => {
                self.state = StreamState::Failed(e.clone());
                Err(e)
            }
        }
    }

    pub fn size_hint(&self) -> (usize, Option<usize>) {
        let extra = self.lookahead.len();
        match &self.state {
            StreamState::Open(c) => {
                let (lo, hi) = c.size_hint();
                (
                    lo.saturating_add(extra),
                    hi.and_then(|h| h.checked_add(extra)),
                )
            }
            StreamState::Done => (extra, Some(extra)),
            // never exact: the stored error must still be pulled
            StreamState::Failed(_) => (extra, None),
        }
    }

    /// Empty, exactly one, or more than one item, pulling at most two items
    /// ahead. Pulled items are kept and delivered by later `advance` calls.
    pub fn cardinality(&mut self) -> Result<Progress<Cardinality>, Error> {
        if let (lo, Some(hi)) = self.size_hint()
            && lo == hi
        {
            return Ok(Progress::Ready(match lo {
                0 => Cardinality::Empty,
                1 => Cardinality::One,
                _ => Cardinality::Many,
            }));
        }
        while self.lookahead.len() < 2 {
            let step = match &mut self.state {
                StreamState::Open(cursor) => cursor.advance(),
                StreamState::Done => break,
                StreamState::Failed(e) => return Err(e.clone()),
            };
            match step {
                Ok(Advance::Item(item)) => self.lookahead.push(item),
                Ok(Advance::Done) => self.state = StreamState::Done,
                Ok(Advance::Suspended(sig)) => return Ok(Progress::Suspended(sig)),
                Err(e) => {
                    self.state = StreamState::Failed(e.clone());
                    return Err(e);
                }
            }
        }
        Ok(Progress::Ready(match self.lookahead.len() {
            0 => Cardinality::Empty,
            1 => Cardinality::One,
            _ => Cardinality::Many,
        }))
    }

    pub fn map<F>(self, f: F) -> Self
    where
        F: FnMut(XdmItem<N>) -> Result<XdmItem<N>, Error> + Send + 'static,
    {
        Self::from_cursor(MapCursor::new(self, f))
    }

    /// Calls `f` once with every item, in order, after the whole input has
    /// been produced.
    pub fn map_all<F>(self, f: F) -> Self
    where
        F: FnOnce(XdmSequence<N>) -> Result<XdmSequence<N>, Error> + Send + 'static,
    {
        Self::from_cursor(MapAllCursor::new(self, f))
    }

    pub fn filter<F>(self, pred: F) -> Self
    where
        F: FnMut(&XdmItem<N>) -> Result<bool, Error> + Send + 'static,
    {
        Self::from_cursor(FilterCursor::new(self, pred))
    }

    pub fn flat_map<F>(self, f: F) -> Self
    where
        F: FnMut(XdmItem<N>) -> Result<XdmSequenceStream<N>, Error> + Send + 'static,
    {
        Self::from_cursor(FlatMapCursor::new(self, f))
    }

    pub fn take(self, n: usize) -> Self {
        Self::from_cursor(TakeCursor::new(self, n))
    }

    pub fn concat(self, other: Self) -> Self {
        Self::concat_all(vec![self, other])
    }

    pub fn concat_all(parts: Vec<Self>) -> Self {
        Self::from_cursor(ConcatCursor::new(parts))
    }

    /// Atomic items pass through, nodes become their typed value and arrays
    /// are flattened. Maps and functions fail with `err:FOTY0013`.
    pub fn atomize(self) -> Self {
        Self::from_cursor(AtomizeCursor::new(self))
    }

    /// Joins inputs that each hold at most one item. More than one item on
    /// any input fails with `err:XPTY0004`. When an input is empty the
    /// result is empty and `combine` is not called.
    pub fn zip_singleton<F>(inputs: Vec<Self>, combine: F) -> Self
    where
        F: FnOnce(Vec<XdmItem<N>>) -> Result<XdmSequenceStream<N>, Error> + Send + 'static,
    {
        Self::from_cursor(ZipCursor::new(inputs, move |slots: Vec<Option<XdmItem<N>>>| {
            match slots.into_iter().collect::<Option<Vec<_>>>() {
                Some(items) => combine(items),
                None => Ok(XdmSequenceStream::empty()),
            }
        }))
    }

    /// Like [`zip_singleton`](Self::zip_singleton), but empty inputs are
    /// passed to `combine` as `None`.
    pub fn zip_optional<F>(inputs: Vec<Self>, combine: F) -> Self
    where
        F: FnOnce(Vec<Option<XdmItem<N>>>) -> Result<XdmSequenceStream<N>, Error> + Send + 'static,
    {
        Self::from_cursor(ZipCursor::new(inputs, combine))
    }

    /// One `xs:boolean`: the effective boolean value of this sequence.
    pub fn effective_boolean_value(self) -> Self {
        Self::from_cursor(EbvCursor::new(self, None))
    }

    /// One `xs:boolean`: the truth value of a predicate evaluated at
    /// `position`. A single numeric item selects by position, anything else
    /// is reduced to its effective boolean value.
    pub fn predicate_truth(self, position: usize) -> Self {
        Self::from_cursor(EbvCursor::new(self, Some(position)))
    }

    /// Drive to completion, blocking the current thread on suspensions.
    pub fn materialize(mut self) -> Result<XdmSequence<N>, Error> {
        let mut out = Vec::with_capacity(self.size_hint().0);
        loop {
            match self.advance()? {
                Advance::Item(item) => out.push(item),
                Advance::Done => return Ok(out),
                Advance::Suspended(signal) => futures::executor::block_on(signal),
            }
        }
    }

    /// Drive to completion, awaiting suspensions.
    pub async fn materialize_async(mut self) -> Result<XdmSequence<N>, Error> {
        let mut out = Vec::with_capacity(self.size_hint().0);
        loop {
            match self.advance()? {
                Advance::Item(item) => out.push(item),
                Advance::Done => return Ok(out),
                Advance::Suspended(signal) => signal.await,
            }
        }
    }
}

impl<N: XdmNode + 'static> From<XdmSequence<N>> for XdmSequenceStream<N> {
    fn from(items: XdmSequence<N>) -> Self {
        Self::from_vec(items)
    }
}

impl<N: XdmNode + 'static> From<XdmItem<N>> for XdmSequenceStream<N> {
    fn from(item: XdmItem<N>) -> Self {
        Self::singleton(item)
    }
}

/// Async consumption: yields items in order, an error at most once, then
/// ends.
impl<N: XdmNode + Unpin + 'static> futures::Stream for XdmSequenceStream<N> {
    type Item = XdmItemResult<N>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            if let Some(signal) = this.pending.as_mut() {
                match Pin::new(signal).poll(cx) {
                    Poll::Pending => return Poll::Pending,
                    Poll::Ready(()) => this.pending = None,
                }
            }
            match this.advance() {
                Ok(Advance::Item(item)) => return Poll::Ready(Some(Ok(item))),
                Ok(Advance::Done) => return Poll::Ready(None),
                Ok(Advance::Suspended(signal)) => this.pending = Some(signal),
                Err(_) if this.error_reported => return Poll::Ready(None),
                Err(e) => {
                    this.error_reported = true;
                    return Poll::Ready(Some(Err(e)));
                }
            }
        }
    }
}

/// Blocking iterator over a stream; stops after the first error.
pub struct BlockingIter<N> {
    stream: Option<XdmSequenceStream<N>>,
}

impl<N: XdmNode + 'static> Iterator for BlockingIter<N> {
    type Item = XdmItemResult<N>;

    fn next(&mut self) -> Option<Self::Item> {
        let stream = self.stream.as_mut()?;
        loop {
            match stream.advance() {
                Ok(Advance::Item(item)) => return Some(Ok(item)),
                Ok(Advance::Done) => {
                    self.stream = None;
                    return None;
                }
                Ok(Advance::Suspended(signal)) => futures::executor::block_on(signal),
                Err(e) => {
                    self.stream = None;
                    return Some(Err(e));
                }
            }
        }
    }
}

impl<N: XdmNode + 'static> IntoIterator for XdmSequenceStream<N> {
    type Item = XdmItemResult<N>;
    type IntoIter = BlockingIter<N>;

    fn into_iter(self) -> Self::IntoIter {
        BlockingIter { stream: Some(self) }
    }
}

pub(crate) struct ReplayBuffer<N> {
    pub(crate) items: Vec<XdmItem<N>>,
    pub(crate) source: Option<XdmSequenceStream<N>>,
    pub(crate) error: Option<Error>,
}

enum ReplaySource<N> {
    Items(Arc<Vec<XdmItem<N>>>),
    Buffered(Arc<Mutex<ReplayBuffer<N>>>),
    Regenerate(Arc<dyn Fn() -> XdmSequenceStream<N> + Send + Sync>),
}

/// A sequence that can be read any number of times.
///
/// `buffered` pulls the source once and shares the items across all
/// readers, including readers that run concurrently with the first pass.
/// `regenerate` rebuilds the source for every reader.
pub struct ReplayableSequence<N> {
    source: ReplaySource<N>,
}

impl<N> Clone for ReplayableSequence<N> {
    fn clone(&self) -> Self {
        let source = match &self.source {
            ReplaySource::Items(v) => ReplaySource::Items(Arc::clone(v)),
            ReplaySource::Buffered(b) => ReplaySource::Buffered(Arc::clone(b)),
            ReplaySource::Regenerate(f) => ReplaySource::Regenerate(Arc::clone(f)),
        };
        Self { source }
    }
}

impl<N: XdmNode + 'static> ReplayableSequence<N> {
    pub fn from_items(items: XdmSequence<N>) -> Self {
        Self {
            source: ReplaySource::Items(Arc::new(items)),
        }
    }

    pub fn buffered(source: XdmSequenceStream<N>) -> Self {
        Self {
            source: ReplaySource::Buffered(Arc::new(Mutex::new(ReplayBuffer {
                items: Vec::new(),
                source: Some(source),
                error: None,
            }))),
        }
    }

    pub fn regenerate<F>(f: F) -> Self
    where
        F: Fn() -> XdmSequenceStream<N> + Send + Sync + 'static,
    {
        Self {
            source: ReplaySource::Regenerate(Arc::new(f)),
        }
    }

    /// A fresh reader positioned at the first item.
    pub fn replay(&self) -> XdmSequenceStream<N> {
        match &self.source {
            ReplaySource::Items(items) => {
                XdmSequenceStream::from_cursor(VecCursor::shared(Arc::clone(items)))
            }
            ReplaySource::Buffered(buf) => {
                XdmSequenceStream::from_cursor(ReplayCursor::new(Arc::clone(buf)))
            }
            ReplaySource::Regenerate(f) => f(),
        }
    }

    /// Items already known without pulling the source.
    pub fn known_len(&self) -> Option<usize> {
        match &self.source {
            ReplaySource::Items(items) => Some(items.len()),
            ReplaySource::Buffered(buf) => {
                let guard = buf.lock().unwrap_or_else(PoisonError::into_inner);
                guard.source.is_none().then_some(guard.items.len())
            }
            ReplaySource::Regenerate(_) => None,
        }
    }
}

/// Drains a stream into a queue without blocking; used by cursors that
/// buffer a whole input. Returns `Some(signal)` when the input suspended.
pub(crate) fn drain_into<N: XdmNode + 'static>(
    stream: &mut XdmSequenceStream<N>,
    out: &mut VecDeque<XdmItem<N>>,
) -> Result<Option<ResumeSignal>, Error> {
    loop {
        match stream.advance()? {
            Advance::Item(item) => out.push_back(item),
            Advance::Done => return Ok(None),
            Advance::Suspended(sig) => return Ok(Some(sig)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simple_node::SimpleNode;
    use crate::xdm::XdmAtomicValue;

    type S = XdmSequenceStream<SimpleNode>;

    fn int(i: i64) -> XdmItem<SimpleNode> {
        XdmItem::Atomic(XdmAtomicValue::Integer(i))
    }

    #[test]
    fn done_is_sticky() {
        let mut s = S::singleton(int(1));
        assert!(matches!(s.advance(), Ok(Advance::Item(_))));
        assert!(matches!(s.advance(), Ok(Advance::Done)));
        assert!(matches!(s.advance(), Ok(Advance::Done)));
    }

    #[test]
    fn failure_is_sticky() {
        let mut calls = 0;
        let mut s = S::from_fn(move || {
            calls += 1;
            if calls == 1 {
                Ok(Advance::Item(int(1)))
            } else {
                Err(Error::from_code(ErrorCode::FOER0000, "broken source"))
            }
        });
        assert!(matches!(s.advance(), Ok(Advance::Item(_))));
        let first = s.advance().unwrap_err();
        let second = s.advance().unwrap_err();
        assert_eq!(first.code, second.code);
        assert_eq!(first.message, second.message);
    }

    #[test]
    fn cardinality_keeps_pulled_items() {
        let mut s = S::from_iterator((1..=3).map(int));
        assert!(matches!(s.cardinality(), Ok(Progress::Ready(Cardinality::Many))));
        assert_eq!(s.materialize().unwrap(), vec![int(1), int(2), int(3)]);
    }

    #[test]
    fn cardinality_of_known_length_does_not_pull() {
        let mut s = S::from_vec(vec![int(7)]);
        assert!(matches!(s.cardinality(), Ok(Progress::Ready(Cardinality::One))));
        assert!(s.lookahead.is_empty());
        let mut e = S::empty();
        assert!(matches!(e.cardinality(), Ok(Progress::Ready(Cardinality::Empty))));
    }

    #[test]
    fn cardinality_surfaces_stored_failure() {
        let unbound = || Error::from_code(ErrorCode::XPST0008, "unbound variable $x");
        let mut failed = S::failed(unbound());
        assert_eq!(failed.size_hint(), (0, None));
        assert_eq!(failed.cardinality().unwrap_err().code_enum(), ErrorCode::XPST0008);

        let mut joined = S::singleton(int(1)).concat(S::failed(unbound()));
        assert_eq!(joined.size_hint().1, None);
        assert_eq!(joined.cardinality().unwrap_err().code_enum(), ErrorCode::XPST0008);
    }

    #[test]
    fn deferred_suspends_until_resolved() {
        let (resolver, value) = deferred::<SimpleNode>();
        let mut s = S::deferred(value);
        let Ok(Advance::Suspended(sig)) = s.advance() else {
            panic!("expected suspension");
        };
        // re-polling before the signal fires is idempotent
        assert!(matches!(s.advance(), Ok(Advance::Suspended(_))));
        resolver.resolve(Ok(vec![int(5)])).unwrap();
        futures::executor::block_on(sig);
        assert!(matches!(s.advance(), Ok(Advance::Item(XdmItem::Atomic(XdmAtomicValue::Integer(5))))));
        assert!(matches!(s.advance(), Ok(Advance::Done)));
    }

    #[test]
    fn dropped_resolver_fails_sequence() {
        let (resolver, value) = deferred::<SimpleNode>();
        drop(resolver);
        let err = S::deferred(value).materialize().unwrap_err();
        assert_eq!(err.code.local, "FOER0000");
    }

    #[test]
    fn buffered_replay_shares_one_pass() {
        let mut pulls = 0;
        let src = S::from_fn(move || {
            pulls += 1;
            Ok(if pulls <= 2 { Advance::Item(int(pulls)) } else { Advance::Done })
        });
        let rep = ReplayableSequence::buffered(src);
        let mut a = rep.replay();
        let b = rep.replay();
        assert!(matches!(a.advance(), Ok(Advance::Item(_))));
        assert_eq!(b.materialize().unwrap(), vec![int(1), int(2)]);
        assert_eq!(a.materialize().unwrap(), vec![int(2)]);
        assert_eq!(rep.known_len(), Some(2));
    }

    #[test]
    fn stream_reports_error_once() {
        use futures::StreamExt;
        let failing = S::failed(Error::from_code(ErrorCode::FOER0000, "x"));
        let s = S::from_vec(vec![int(1)]).concat(failing);
        let items: Vec<_> = futures::executor::block_on(StreamExt::collect::<Vec<_>>(s));
        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert!(items[1].is_err());
    }
}
