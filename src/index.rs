//! Interval index: overlap and containment queries over mutable time spans.
//!
//! Spans are indexed twice, under their start instant and under their end
//! instant, in two independently sorted maps. An overlap query then reduces
//! to intersecting two range-restricted views, `{end >= query.start}` with
//! `{start < query.end}`, in `O(log n + k)` instead of scanning every span.
//! Multiple events may share a start or end instant, so each map key holds a
//! set of event ids.
//!
//! Inclusive and exclusive query boundaries are encoded by nudging the bound
//! to the adjacent representable instant (see [`TimeStamp::succ`]), which
//! keeps boundary semantics exact on the discrete time domain.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use crate::event::EventId;
use crate::time::{TimeSpan, TimeStamp};

/// Dual sorted-map index over the time spans of a set of events.
#[derive(Debug, Clone, Default)]
pub struct IntervalIndex {
    by_start: BTreeMap<TimeStamp, BTreeSet<EventId>>,
    by_end: BTreeMap<TimeStamp, BTreeSet<EventId>>,
    spans: HashMap<EventId, TimeSpan>,
}

impl IntervalIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Index an event under its span. Re-inserting an id replaces its span.
    pub fn insert(&mut self, id: EventId, span: TimeSpan) {
        if let Some(old) = self.spans.insert(id, span) {
            self.unlink(id, old);
        }
        self.by_start.entry(span.start).or_default().insert(id);
        self.by_end.entry(span.end).or_default().insert(id);
    }

    /// Remove an event from the index, returning the span it was keyed under.
    pub fn remove(&mut self, id: EventId) -> Option<TimeSpan> {
        let span = self.spans.remove(&id)?;
        self.unlink(id, span);
        Some(span)
    }

    fn unlink(&mut self, id: EventId, span: TimeSpan) {
        if let Some(set) = self.by_start.get_mut(&span.start) {
            set.remove(&id);
            if set.is_empty() {
                self.by_start.remove(&span.start);
            }
        }
        if let Some(set) = self.by_end.get_mut(&span.end) {
            set.remove(&id);
            if set.is_empty() {
                self.by_end.remove(&span.end);
            }
        }
    }

    /// The span an event is currently keyed under.
    pub fn span_of(&self, id: EventId) -> Option<TimeSpan> {
        self.spans.get(&id).copied()
    }

    /// Check whether the index holds no events.
    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// Number of indexed events.
    pub fn len(&self) -> usize {
        self.spans.len()
    }

    /// Iterate over all indexed events and their spans.
    pub fn iter(&self) -> impl Iterator<Item = (EventId, TimeSpan)> + '_ {
        self.spans.iter().map(|(id, span)| (*id, *span))
    }

    /// Events whose span overlaps `[start, end]` under the requested boundary
    /// inclusivity.
    pub fn overlapping(
        &self,
        start: TimeStamp,
        start_inclusive: bool,
        end: TimeStamp,
        end_inclusive: bool,
    ) -> HashSet<EventId> {
        let start = if start_inclusive { start } else { start.succ() };
        let end = if end_inclusive { end.succ() } else { end };

        // intersect {end >= start} with {start < end}
        let tail: HashSet<EventId> = collect_ids(self.by_end.range(start..));
        collect_ids(self.by_start.range(..end))
            .into_iter()
            .filter(|id| tail.contains(id))
            .collect()
    }

    /// Events overlapping another event's span, with both boundaries
    /// exclusive: spans that merely touch at an instant do not overlap. This
    /// is the query row packing uses.
    pub fn overlapping_span(&self, span: &TimeSpan) -> HashSet<EventId> {
        self.overlapping(span.start, false, span.end, false)
    }

    /// Events whose span is strictly contained within `[start, end]` under
    /// the requested boundary inclusivity. Used for "events fully inside the
    /// visible viewport".
    pub fn interior(
        &self,
        start: TimeStamp,
        start_inclusive: bool,
        end: TimeStamp,
        end_inclusive: bool,
    ) -> HashSet<EventId> {
        let start = if start_inclusive { start } else { start.succ() };
        let end = if end_inclusive { end.succ() } else { end };

        // intersect {end <= query.end} with {start >= query.start}
        let tail: HashSet<EventId> = collect_ids(self.by_end.range(..end));
        collect_ids(self.by_start.range(start..))
            .into_iter()
            .filter(|id| tail.contains(id))
            .collect()
    }

    /// Events whose span contains the instant, both boundaries inclusive.
    pub fn containing(&self, time: TimeStamp) -> HashSet<EventId> {
        self.overlapping(time, true, time, true)
    }
}

fn collect_ids<'a>(
    range: impl Iterator<Item = (&'a TimeStamp, &'a BTreeSet<EventId>)>,
) -> HashSet<EventId> {
    range.flat_map(|(_, ids)| ids.iter().copied()).collect()
}
