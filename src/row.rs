//! Rows: non-overlapping horizontal bands of events.

use std::collections::HashSet;

use crate::config::TimelineConfig;
use crate::event::{Event, EventId};
use crate::index::IntervalIndex;
use crate::time::{TimeSpan, TimeStamp};

// Visible-window expansion applied before aggregation, so aggregate groups do
// not pop in and out as their members scroll past the view edge.
const AGGREGATE_WINDOW_MULTIPLIER: f64 = 2.0;

/// One band of the timeline, holding events that do not overlap in time.
///
/// Rows are owned exclusively by an
/// [`EventManager`](crate::manager::EventManager); only read access is
/// public.
#[derive(Debug, Clone)]
pub struct Row {
    index: usize,
    events: IntervalIndex,
    visible: Vec<EventId>,
    visible_aggregates: IntervalIndex,
}

impl Row {
    pub(crate) fn new(index: usize) -> Self {
        Self {
            index,
            events: IntervalIndex::new(),
            visible: Vec::new(),
            visible_aggregates: IntervalIndex::new(),
        }
    }

    /// Position of this row in the manager's row list.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Check whether the row holds no events.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Number of events in the row.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Events visible in the last computed window, sorted by start time.
    /// When aggregation is enabled this may contain synthetic aggregate ids.
    pub fn visible_events(&self) -> &[EventId] {
        &self.visible
    }

    /// The span an event is keyed under in this row.
    pub fn span_of(&self, id: EventId) -> Option<TimeSpan> {
        self.events.span_of(id)
    }

    /// Events overlapping the span, boundaries exclusive: spans that merely
    /// touch do not overlap. This is the packing query.
    pub fn overlapping_span(&self, span: &TimeSpan) -> HashSet<EventId> {
        self.events.overlapping_span(span)
    }

    pub(crate) fn insert(&mut self, id: EventId, span: TimeSpan) {
        self.events.insert(id, span);
    }

    pub(crate) fn remove(&mut self, id: EventId) -> Option<TimeSpan> {
        self.events.remove(id)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (EventId, TimeSpan)> + '_ {
        self.events.iter()
    }

    /// Candidates for hit-testing within the pick window.
    pub(crate) fn nearest_visible(
        &self,
        start: TimeStamp,
        end: TimeStamp,
        aggregated: bool,
    ) -> HashSet<EventId> {
        if aggregated {
            self.visible_aggregates.overlapping(start, true, end, false)
        } else {
            self.events.overlapping(start, true, end, false)
        }
    }

    pub(crate) fn calculate_visible_normal(&mut self, min: TimeStamp, max: TimeStamp) {
        self.visible = sorted_by_start(self.events.overlapping(min, true, max, true), &self.events);
        self.visible_aggregates = IntervalIndex::new();
    }

    /// Visible-set computation with aggregation: runs of small, tightly
    /// packed events merge into synthetic read-only aggregates. Returns the
    /// aggregates created so the manager can resolve their ids.
    pub(crate) fn calculate_visible_aggregated(
        &mut self,
        min: TimeStamp,
        max: TimeStamp,
        millis_per_pixel: f64,
        config: &TimelineConfig,
    ) -> Vec<Event> {
        let max_duration = config.max_aggregate_px as f64 * millis_per_pixel;
        let max_gap = config.max_aggregate_gap_px as f64 * millis_per_pixel;
        let window = TimeSpan::new(min, max);

        let expansion = (max_duration * AGGREGATE_WINDOW_MULTIPLIER) as i64;
        let expanded_min = min.sub_millis(expansion);
        let expanded_max = max.add_millis(expansion);

        let candidates = self.events.overlapping(expanded_min, true, expanded_max, true);
        let mut ordered: Vec<(EventId, TimeSpan)> = candidates
            .into_iter()
            .filter_map(|id| self.events.span_of(id).map(|span| (id, span)))
            .collect();
        ordered.sort_by_key(|(id, span)| (span.start, *id));

        let mut result = IntervalIndex::new();
        let mut aggregates = Vec::new();
        let mut group: Vec<(EventId, TimeSpan)> = Vec::new();
        let mut group_hull: Option<TimeSpan> = None;

        for (id, span) in ordered {
            let is_small = (span.duration_millis() as f64) < max_duration;
            let gap = group_hull
                .map(|hull| span.start.millis_since(hull.end) as f64)
                .unwrap_or(0.0);

            if gap >= max_gap {
                flush_group(&mut group, &mut group_hull, &window, &mut result, &mut aggregates);
            }

            if is_small {
                group_hull = Some(match group_hull {
                    None => span,
                    Some(hull) => hull.union(&span),
                });
                group.push((id, span));
            } else if window_overlaps(&window, &span) {
                result.insert(id, span);
            }
        }
        flush_group(&mut group, &mut group_hull, &window, &mut result, &mut aggregates);

        self.visible = sorted_by_start(result.iter().map(|(id, _)| id).collect(), &result);
        self.visible_aggregates = result;
        aggregates
    }
}

fn sorted_by_start(ids: HashSet<EventId>, index: &IntervalIndex) -> Vec<EventId> {
    let mut ordered: Vec<(EventId, TimeSpan)> = ids
        .into_iter()
        .filter_map(|id| index.span_of(id).map(|span| (id, span)))
        .collect();
    ordered.sort_by_key(|(id, span)| (span.start, *id));
    ordered.into_iter().map(|(id, _)| id).collect()
}

// Closed overlap test: a span merely touching the window edge is visible.
fn window_overlaps(window: &TimeSpan, span: &TimeSpan) -> bool {
    !(span.end < window.start || span.start > window.end)
}

fn flush_group(
    group: &mut Vec<(EventId, TimeSpan)>,
    group_hull: &mut Option<TimeSpan>,
    window: &TimeSpan,
    result: &mut IntervalIndex,
    aggregates: &mut Vec<Event>,
) {
    if group.len() <= 1 {
        for (id, span) in group.drain(..) {
            if window_overlaps(window, &span) {
                result.insert(id, span);
            }
        }
    } else if let Some(hull) = *group_hull {
        if window_overlaps(window, &hull) {
            let children: Vec<EventId> = group.iter().map(|(id, _)| *id).collect();
            let aggregate = Event::aggregate_of(children, hull);
            result.insert(aggregate.id(), hull);
            aggregates.push(aggregate);
        }
        group.clear();
    }
    *group_hull = None;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(millis: i64) -> TimeStamp {
        TimeStamp::from_millis(millis)
    }

    fn span(start: i64, end: i64) -> TimeSpan {
        TimeSpan::new(ts(start), ts(end))
    }

    fn event(start: i64, end: i64) -> Event {
        Event::new("", ts(start), ts(end))
    }

    #[test]
    fn visible_events_are_sorted_by_start() {
        let mut row = Row::new(0);
        let late = event(50, 60);
        let early = event(0, 10);
        row.insert(late.id(), late.span());
        row.insert(early.id(), early.span());

        row.calculate_visible_normal(ts(0), ts(100));
        assert_eq!(row.visible_events(), &[early.id(), late.id()]);
    }

    #[test]
    fn visible_excludes_events_outside_window() {
        let mut row = Row::new(0);
        let inside = event(0, 10);
        let outside = event(200, 210);
        row.insert(inside.id(), inside.span());
        row.insert(outside.id(), outside.span());

        row.calculate_visible_normal(ts(0), ts(100));
        assert_eq!(row.visible_events(), &[inside.id()]);
    }

    #[test]
    fn aggregation_merges_small_tight_runs() {
        let mut row = Row::new(0);
        // three instantaneous markers 10ms apart, then one far-away long event
        let a = event(0, 0);
        let b = event(10, 10);
        let c = event(20, 20);
        let big = event(5_000, 9_000);
        for e in [&a, &b, &c, &big] {
            row.insert(e.id(), e.span());
        }

        // 1 ms per pixel: max aggregate duration 30ms, max gap 5px = 5ms, so
        // the 10ms gaps split the markers apart
        let config = TimelineConfig::default();
        let aggregates = row.calculate_visible_aggregated(ts(0), ts(10_000), 1.0, &config);
        assert!(aggregates.is_empty());
        assert_eq!(row.visible_events().len(), 4);

        // 10 ms per pixel: gaps of 10ms < 50ms merge all three markers
        let aggregates = row.calculate_visible_aggregated(ts(0), ts(10_000), 10.0, &config);
        assert_eq!(aggregates.len(), 1);
        let aggregate = &aggregates[0];
        assert_eq!(aggregate.children(), &[a.id(), b.id(), c.id()]);
        assert_eq!(aggregate.span(), span(0, 20));
        // the big event is left as-is alongside the aggregate
        assert_eq!(row.visible_events().len(), 2);
        assert_eq!(row.visible_events()[0], aggregate.id());
    }

    #[test]
    fn lone_small_event_is_not_aggregated() {
        let mut row = Row::new(0);
        let only = event(100, 105);
        row.insert(only.id(), only.span());

        let config = TimelineConfig::default();
        let aggregates = row.calculate_visible_aggregated(ts(0), ts(1_000), 10.0, &config);
        assert!(aggregates.is_empty());
        assert_eq!(row.visible_events(), &[only.id()]);
    }
}
