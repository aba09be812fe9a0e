//! Timeline events: intervals plus display and editability metadata.
//!
//! An [`Event`]'s identity is its [`EventId`]; equality and hashing ignore
//! the time range entirely, so an event stays the same logical entry in sets
//! and maps while its interval changes. Any external index keyed by the
//! interval itself (such as [`IntervalIndex`](crate::index::IntervalIndex))
//! must be re-keyed when the times change. The manager owns that
//! bookkeeping, which is why time mutation of an attached event must go
//! through [`EventManager`](crate::manager::EventManager).

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::manager::ManagerId;
use crate::style::Color;
use crate::time::{TimeSpan, TimeStamp};

static EVENT_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventId(u64);

impl EventId {
    fn next() -> Self {
        Self(EVENT_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// How an event's row is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Row chosen by the packing heuristic.
    AutoStack,
    /// Explicitly requested row; the heuristic never moves this event.
    FixedRow(usize),
}

/// Errors from mutating an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditError {
    /// The event is a read-only aggregate.
    ReadOnly,
    /// The event is owned by a manager; mutate it through
    /// [`EventManager::move_event`](crate::manager::EventManager::move_event)
    /// so the row indexes stay correctly keyed.
    Attached,
}

/// A caller-supplied constraint on proposed time-range changes.
///
/// Constraints run in order after the built-in editability constraint. Each
/// may clamp or replace the proposed span; none may reject outright, so a
/// constraint always produces some valid span.
pub trait EventConstraint: Send + Sync {
    /// Clamp a proposed span for the given event.
    fn apply(&self, event: &Event, proposed: TimeSpan) -> TimeSpan;
}

impl<F> EventConstraint for F
where
    F: Fn(&Event, TimeSpan) -> TimeSpan + Send + Sync,
{
    fn apply(&self, event: &Event, proposed: TimeSpan) -> TimeSpan {
        self(event, proposed)
    }
}

/// A time-interval domain object with display and editability metadata.
#[derive(Clone)]
pub struct Event {
    id: EventId,
    label: String,
    icon: Option<String>,
    span: TimeSpan,

    background_color: Option<Color>,
    border_color: Option<Color>,
    text_color: Option<Color>,
    border_thickness: f32,
    show_label: bool,
    show_icon: bool,
    show_border: bool,
    selectable: bool,

    placement: Placement,
    editable: bool,
    start_time_moveable: bool,
    end_time_moveable: bool,
    resizeable: bool,
    min_time_span: i64,
    max_time_span: i64,
    constraints: Vec<Arc<dyn EventConstraint>>,

    children: Vec<EventId>,
    owner: Option<ManagerId>,
}

impl Event {
    /// Create an auto-stacked event over `[start, end]`.
    pub fn new(label: impl Into<String>, start: TimeStamp, end: TimeStamp) -> Self {
        Self {
            id: EventId::next(),
            label: label.into(),
            icon: None,
            span: TimeSpan::new(start, end),
            background_color: None,
            border_color: None,
            text_color: None,
            border_thickness: 1.8,
            show_label: true,
            show_icon: true,
            show_border: true,
            selectable: true,
            placement: Placement::AutoStack,
            editable: true,
            start_time_moveable: true,
            end_time_moveable: true,
            resizeable: true,
            min_time_span: 0,
            max_time_span: i64::MAX,
            constraints: Vec::new(),
            children: Vec::new(),
            owner: None,
        }
    }

    /// Create an instantaneous marker event.
    pub fn instant(label: impl Into<String>, time: TimeStamp) -> Self {
        Self::new(label, time, time)
    }

    /// Create a read-only aggregate covering the given children.
    pub(crate) fn aggregate_of(children: Vec<EventId>, span: TimeSpan) -> Self {
        let mut event = Self::new(format!("{} events", children.len()), span.start, span.end);
        event.editable = false;
        event.selectable = true;
        event.children = children;
        event
    }

    /// Access the event identifier.
    pub fn id(&self) -> EventId {
        self.id
    }

    /// Access the label text.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Access the icon name, if any.
    pub fn icon(&self) -> Option<&str> {
        self.icon.as_deref()
    }

    /// Access the time span.
    pub fn span(&self) -> TimeSpan {
        self.span
    }

    /// The start instant.
    pub fn start_time(&self) -> TimeStamp {
        self.span.start
    }

    /// The end instant.
    pub fn end_time(&self) -> TimeStamp {
        self.span.end
    }

    /// Duration in milliseconds.
    pub fn duration_millis(&self) -> i64 {
        self.span.duration_millis()
    }

    /// Check whether the event contains an instant (start inclusive, end
    /// exclusive).
    pub fn contains(&self, time: TimeStamp) -> bool {
        self.span.contains(time)
    }

    /// Overlap duration with another event in milliseconds.
    pub fn overlap_millis(&self, other: &Event) -> i64 {
        self.span.overlap_millis(&other.span)
    }

    /// Access the background color override.
    pub fn background_color(&self) -> Option<Color> {
        self.background_color
    }

    /// Access the border color override.
    pub fn border_color(&self) -> Option<Color> {
        self.border_color
    }

    /// Access the text color override.
    pub fn text_color(&self) -> Option<Color> {
        self.text_color
    }

    /// Border thickness in pixels.
    pub fn border_thickness(&self) -> f32 {
        self.border_thickness
    }

    /// Check whether the label should be drawn.
    pub fn shows_label(&self) -> bool {
        self.show_label
    }

    /// Check whether the icon should be drawn.
    pub fn shows_icon(&self) -> bool {
        self.show_icon
    }

    /// Check whether the border should be drawn.
    pub fn shows_border(&self) -> bool {
        self.show_border
    }

    /// Check whether mouse clicks may select this event.
    pub fn is_selectable(&self) -> bool {
        self.selectable
    }

    /// Access the placement mode.
    pub fn placement(&self) -> Placement {
        self.placement
    }

    /// Check whether the event requested an explicit row.
    pub fn is_fixed_row(&self) -> bool {
        matches!(self.placement, Placement::FixedRow(_))
    }

    /// Check whether any time mutation is allowed.
    pub fn is_editable(&self) -> bool {
        self.editable && !self.is_aggregate()
    }

    /// Check whether the start instant may move.
    pub fn is_start_time_moveable(&self) -> bool {
        self.start_time_moveable
    }

    /// Check whether the end instant may move.
    pub fn is_end_time_moveable(&self) -> bool {
        self.end_time_moveable
    }

    /// Check whether the duration may change.
    pub fn is_resizeable(&self) -> bool {
        self.resizeable
    }

    /// Minimum allowed duration in milliseconds.
    pub fn min_time_span(&self) -> i64 {
        self.min_time_span
    }

    /// Maximum allowed duration in milliseconds.
    pub fn max_time_span(&self) -> i64 {
        self.max_time_span
    }

    /// Check whether this is a read-only aggregate of other events.
    pub fn is_aggregate(&self) -> bool {
        !self.children.is_empty()
    }

    /// Ids of the child events merged into this aggregate.
    pub fn children(&self) -> &[EventId] {
        &self.children
    }

    /// The manager currently owning this event, if any.
    pub fn manager(&self) -> Option<ManagerId> {
        self.owner
    }

    /// Check whether the event is owned by a manager.
    pub fn is_attached(&self) -> bool {
        self.owner.is_some()
    }

    /// Set the icon name.
    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    /// Set the background color.
    pub fn with_background_color(mut self, color: Color) -> Self {
        self.background_color = Some(color);
        self
    }

    /// Set the border color.
    pub fn with_border_color(mut self, color: Color) -> Self {
        self.border_color = Some(color);
        self
    }

    /// Set the text color.
    pub fn with_text_color(mut self, color: Color) -> Self {
        self.text_color = Some(color);
        self
    }

    /// Set the border thickness in pixels.
    pub fn with_border_thickness(mut self, thickness: f32) -> Self {
        self.border_thickness = thickness;
        self
    }

    /// Request an explicit row instead of heuristic stacking.
    pub fn with_fixed_row(mut self, row: usize) -> Self {
        self.placement = Placement::FixedRow(row);
        self
    }

    /// Allow or forbid all time mutation.
    pub fn with_editable(mut self, editable: bool) -> Self {
        self.editable = editable;
        self
    }

    /// Allow or forbid moving the start instant.
    pub fn with_start_time_moveable(mut self, moveable: bool) -> Self {
        self.start_time_moveable = moveable;
        self
    }

    /// Allow or forbid moving the end instant.
    pub fn with_end_time_moveable(mut self, moveable: bool) -> Self {
        self.end_time_moveable = moveable;
        self
    }

    /// Allow or forbid changing the duration.
    pub fn with_resizeable(mut self, resizeable: bool) -> Self {
        self.resizeable = resizeable;
        self
    }

    /// Set the minimum allowed duration in milliseconds.
    pub fn with_min_time_span(mut self, millis: i64) -> Self {
        self.min_time_span = millis;
        self
    }

    /// Set the maximum allowed duration in milliseconds.
    pub fn with_max_time_span(mut self, millis: i64) -> Self {
        self.max_time_span = millis;
        self
    }

    /// Allow or forbid mouse selection.
    pub fn with_selectable(mut self, selectable: bool) -> Self {
        self.selectable = selectable;
        self
    }

    /// Show or hide the label.
    pub fn with_show_label(mut self, show: bool) -> Self {
        self.show_label = show;
        self
    }

    /// Show or hide the icon.
    pub fn with_show_icon(mut self, show: bool) -> Self {
        self.show_icon = show;
        self
    }

    /// Show or hide the border.
    pub fn with_show_border(mut self, show: bool) -> Self {
        self.show_border = show;
        self
    }

    /// Append a constraint to the chain. The built-in editability constraint
    /// always runs first.
    pub fn add_constraint(&mut self, constraint: Arc<dyn EventConstraint>) {
        self.constraints.push(constraint);
    }

    /// Replace the label text.
    pub fn set_label(&mut self, label: impl Into<String>) -> Result<(), EditError> {
        self.check_writable()?;
        self.label = label.into();
        Ok(())
    }

    /// Allow or forbid mouse selection.
    pub fn set_selectable(&mut self, selectable: bool) -> Result<(), EditError> {
        self.check_writable()?;
        self.selectable = selectable;
        Ok(())
    }

    /// Allow or forbid all time mutation.
    pub fn set_editable(&mut self, editable: bool) -> Result<(), EditError> {
        if self.is_aggregate() {
            return Err(EditError::ReadOnly);
        }
        self.editable = editable;
        Ok(())
    }

    /// Request an explicit row. Only valid on a detached event; once
    /// attached, use
    /// [`EventManager::set_event_row`](crate::manager::EventManager::set_event_row)
    /// so the rows are updated along with the placement.
    pub fn set_fixed_row(&mut self, row: usize) -> Result<(), EditError> {
        self.check_detached_writable()?;
        self.placement = Placement::FixedRow(row);
        Ok(())
    }

    /// Return to heuristic stacking. Only valid on a detached event; once
    /// attached, use
    /// [`EventManager::set_event_floating`](crate::manager::EventManager::set_event_floating).
    pub fn set_floating(&mut self) -> Result<(), EditError> {
        self.check_detached_writable()?;
        self.placement = Placement::AutoStack;
        Ok(())
    }

    /// Run a proposed span through the constraint chain and return the
    /// accepted span without installing it.
    pub fn propose_times(&self, proposed: TimeSpan) -> TimeSpan {
        let mut span = self.apply_builtin(proposed);
        for constraint in &self.constraints {
            span = constraint.apply(self, span);
        }
        span
    }

    /// Set the start and end instants, subject to the constraint chain.
    ///
    /// Returns the accepted span, which may differ from the proposal. Fails
    /// on aggregates and on attached events (attached events are moved
    /// through their manager so its row indexes stay keyed correctly).
    pub fn set_times(&mut self, start: TimeStamp, end: TimeStamp) -> Result<TimeSpan, EditError> {
        self.check_detached_writable()?;
        let accepted = self.propose_times(TimeSpan::new(start, end));
        self.span = accepted;
        Ok(accepted)
    }

    /// Set the start and end instants, bypassing the constraint chain.
    pub fn set_times_forced(
        &mut self,
        start: TimeStamp,
        end: TimeStamp,
    ) -> Result<TimeSpan, EditError> {
        self.check_detached_writable()?;
        let accepted = TimeSpan::new(start, end);
        self.span = accepted;
        Ok(accepted)
    }

    /// Move the start instant, keeping the end.
    pub fn set_start_time(&mut self, start: TimeStamp) -> Result<TimeSpan, EditError> {
        let end = self.span.end;
        self.set_times(start, end)
    }

    /// Move the end instant, keeping the start.
    pub fn set_end_time(&mut self, end: TimeStamp) -> Result<TimeSpan, EditError> {
        let start = self.span.start;
        self.set_times(start, end)
    }

    fn check_writable(&self) -> Result<(), EditError> {
        if self.is_aggregate() {
            return Err(EditError::ReadOnly);
        }
        Ok(())
    }

    fn check_detached_writable(&self) -> Result<(), EditError> {
        self.check_writable()?;
        if self.is_attached() {
            return Err(EditError::Attached);
        }
        Ok(())
    }

    // The built-in constraint: pin immoveable endpoints, revert forbidden
    // resizes, then clamp the duration into [min, max] by adjusting whichever
    // endpoint did not stay fixed relative to the old range.
    fn apply_builtin(&self, proposed: TimeSpan) -> TimeSpan {
        if !self.editable {
            return self.span;
        }

        let old_start = self.span.start;
        let old_end = self.span.end;

        let mut new_start = proposed.start;
        let mut new_end = proposed.end;

        if !self.end_time_moveable {
            new_end = old_end;
        }
        if !self.start_time_moveable {
            new_start = old_start;
        }

        let new_diff = new_end.millis_since(new_start);
        let old_diff = old_end.millis_since(old_start);

        if !self.resizeable && new_diff != old_diff {
            new_end = old_end;
            new_start = old_start;
        }

        if new_diff < self.min_time_span {
            if old_end == new_end {
                new_start = new_end.sub_millis(self.min_time_span);
            } else {
                new_end = new_start.add_millis(self.min_time_span);
            }
        }

        if new_diff > self.max_time_span {
            if old_end == new_end {
                new_start = new_end.sub_millis(self.max_time_span);
            } else {
                new_end = new_start.add_millis(self.max_time_span);
            }
        }

        TimeSpan::new(new_start, new_end)
    }

    pub(crate) fn install_times(&mut self, span: TimeSpan) {
        self.span = span;
    }

    pub(crate) fn set_placement(&mut self, placement: Placement) {
        self.placement = placement;
    }

    pub(crate) fn set_owner(&mut self, owner: Option<ManagerId>) {
        self.owner = owner;
    }
}

impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Event {}

impl std::hash::Hash for Event {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl std::fmt::Debug for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Event")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("span", &self.span)
            .field("placement", &self.placement)
            .field("editable", &self.editable)
            .field("constraints", &self.constraints.len())
            .field("children", &self.children.len())
            .field("owner", &self.owner)
            .finish()
    }
}

/// Pixel-derived extents of an event's label and icon, in time units.
///
/// Written by the painter after each paint pass and read back by
/// hit-testing; the values may lag one frame behind the on-screen state.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EventBounds {
    /// Whether the label was drawn in the last paint pass.
    pub label_visible: bool,
    /// Whether the icon was drawn in the last paint pass.
    pub icon_visible: bool,
    /// Time extent covered by the label, if drawn.
    pub label_span: Option<TimeSpan>,
    /// Time extent covered by the icon, if drawn.
    pub icon_span: Option<TimeSpan>,
}

impl EventBounds {
    /// Check whether the instant falls inside the drawn label.
    pub fn contains_label(&self, time: TimeStamp) -> bool {
        self.label_visible && self.label_span.is_some_and(|span| span.contains_closed(time))
    }

    /// Check whether the instant falls inside the drawn icon.
    pub fn contains_icon(&self, time: TimeStamp) -> bool {
        self.icon_visible && self.icon_span.is_some_and(|span| span.contains_closed(time))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn ts(millis: i64) -> TimeStamp {
        TimeStamp::from_millis(millis)
    }

    #[test]
    fn equality_ignores_time_range() {
        let mut event = Event::new("a", ts(0), ts(10));
        let mut set = HashSet::new();
        set.insert(event.clone());

        event.set_times(ts(100), ts(200)).unwrap();
        assert!(set.contains(&event));
        assert_eq!(event.span(), TimeSpan::new(ts(100), ts(200)));
    }

    #[test]
    fn distinct_events_never_compare_equal() {
        let a = Event::new("same", ts(0), ts(10));
        let b = Event::new("same", ts(0), ts(10));
        assert_ne!(a, b);
    }

    #[test]
    fn non_resizeable_event_rejects_resize() {
        let mut event = Event::new("a", ts(0), ts(10)).with_resizeable(false);
        let accepted = event.set_times(ts(2), ts(20)).unwrap();
        assert_eq!(accepted, TimeSpan::new(ts(0), ts(10)));
    }

    #[test]
    fn non_resizeable_event_allows_translation() {
        let mut event = Event::new("a", ts(0), ts(10)).with_resizeable(false);
        let accepted = event.set_times(ts(5), ts(15)).unwrap();
        assert_eq!(accepted, TimeSpan::new(ts(5), ts(15)));
    }

    #[test]
    fn min_span_anchors_unmoved_endpoint() {
        // end moved, start stays anchored
        let mut event = Event::new("a", ts(0), ts(10)).with_min_time_span(5);
        let accepted = event.set_times(ts(0), ts(2)).unwrap();
        assert_eq!(accepted, TimeSpan::new(ts(0), ts(5)));

        // start moved, end stays anchored
        let mut event = Event::new("b", ts(0), ts(10)).with_min_time_span(5);
        let accepted = event.set_times(ts(8), ts(10)).unwrap();
        assert_eq!(accepted, TimeSpan::new(ts(5), ts(10)));
    }

    #[test]
    fn max_span_clamps_moved_endpoint() {
        let mut event = Event::new("a", ts(0), ts(10)).with_max_time_span(15);
        let accepted = event.set_times(ts(0), ts(100)).unwrap();
        assert_eq!(accepted, TimeSpan::new(ts(0), ts(15)));
    }

    #[test]
    fn immoveable_endpoints_are_pinned() {
        let mut event = Event::new("a", ts(0), ts(10)).with_start_time_moveable(false);
        let accepted = event.set_times(ts(5), ts(20)).unwrap();
        assert_eq!(accepted, TimeSpan::new(ts(0), ts(20)));
    }

    #[test]
    fn non_editable_event_keeps_old_span() {
        let mut event = Event::new("a", ts(0), ts(10)).with_editable(false);
        let accepted = event.set_times(ts(50), ts(60)).unwrap();
        assert_eq!(accepted, TimeSpan::new(ts(0), ts(10)));
    }

    #[test]
    fn caller_constraints_run_after_builtin() {
        let mut event = Event::new("a", ts(0), ts(10));
        event.add_constraint(Arc::new(|_: &Event, proposed: TimeSpan| {
            // snap the start down to a 10ms grid
            let snapped = (proposed.start.as_millis() / 10) * 10;
            TimeSpan::new(TimeStamp::from_millis(snapped), proposed.end)
        }));
        let accepted = event.set_times(ts(17), ts(40)).unwrap();
        assert_eq!(accepted, TimeSpan::new(ts(10), ts(40)));
    }

    #[test]
    fn aggregate_rejects_all_mutation() {
        let a = Event::new("a", ts(0), ts(5));
        let b = Event::new("b", ts(6), ts(9));
        let mut aggregate =
            Event::aggregate_of(vec![a.id(), b.id()], TimeSpan::new(ts(0), ts(9)));

        assert!(aggregate.is_aggregate());
        assert!(!aggregate.is_editable());
        assert_eq!(aggregate.children().len(), 2);
        assert_eq!(aggregate.set_times(ts(0), ts(1)), Err(EditError::ReadOnly));
        assert_eq!(aggregate.set_label("x"), Err(EditError::ReadOnly));
        assert_eq!(aggregate.set_fixed_row(1), Err(EditError::ReadOnly));
    }

    #[test]
    fn bounds_respect_visibility_flags() {
        let bounds = EventBounds {
            label_visible: false,
            icon_visible: true,
            label_span: Some(TimeSpan::new(ts(0), ts(10))),
            icon_span: Some(TimeSpan::new(ts(10), ts(20))),
        };
        assert!(!bounds.contains_label(ts(5)));
        assert!(bounds.contains_icon(ts(15)));
        assert!(bounds.contains_icon(ts(10)));
        assert!(!bounds.contains_icon(ts(25)));
    }
}
