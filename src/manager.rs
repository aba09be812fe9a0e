//! Event management: row assignment, visible-set caching, and hit-testing.
//!
//! [`EventManager`] owns the ordered list of [`Row`]s and is the only
//! mutation path for placed events. Every event in the manager appears in
//! exactly one row's interval index, and `row_of` mirrors that assignment.
//!
//! All manager state lives behind a single exclusive lock. Public methods,
//! mutators and readers alike, acquire the lock once for their full
//! duration; internal [`ManagerState`] helpers require the lock to already be
//! held and never re-acquire it, so recursive operations (a move triggering a
//! shift triggering further placement) stay on one acquisition. Readers copy
//! out whatever they need while holding the lock, so the render thread always
//! observes a consistent snapshot.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use bitflags::bitflags;
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::axis::TimeAxis;
use crate::config::TimelineConfig;
use crate::event::{Event, EventBounds, EventId, Placement};
use crate::input::MouseEvent;
use crate::row::Row;
use crate::time::{TimeSpan, TimeStamp};

// Any overlap costs at least 1/20th of either event's duration, so
// near-zero-duration events still register a nonzero packing cost.
const OVERLAP_COST_DIVISOR: f64 = 20.0;

static MANAGER_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Handle identifying an [`EventManager`].
///
/// Events record the handle of the manager that owns them; it carries no
/// access to the manager itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ManagerId(u64);

impl ManagerId {
    fn next() -> Self {
        Self(MANAGER_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

bitflags! {
    /// Regions of an event glyph a pick can land on.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct LocationSet: u8 {
        /// The event body.
        const CENTER = 1 << 0;
        /// The start edge.
        const START = 1 << 1;
        /// The end edge.
        const END = 1 << 2;
        /// The drawn label.
        const LABEL = 1 << 3;
        /// The drawn icon.
        const ICON = 1 << 4;
    }
}

/// A hit-test result: an event plus the glyph regions under the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventSelection {
    /// The picked event. May be an aggregate id when aggregation is enabled;
    /// resolve it with
    /// [`EventManager::get_visible_event`].
    pub event: EventId,
    /// Glyph regions under the cursor.
    pub locations: LocationSet,
}

impl EventSelection {
    /// Check whether any of the given locations were hit.
    pub fn is_location(&self, locations: LocationSet) -> bool {
        self.locations.intersects(locations)
    }

    /// Check whether the event body was hit.
    pub fn is_center(&self) -> bool {
        self.locations.contains(LocationSet::CENTER)
    }

    /// Check whether the start edge was hit.
    pub fn is_start(&self) -> bool {
        self.locations.contains(LocationSet::START)
    }

    /// Check whether the end edge was hit.
    pub fn is_end(&self) -> bool {
        self.locations.contains(LocationSet::END)
    }
}

/// Snapshot of one row's visible contents, copied out under the lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowView {
    /// Row position; row 0 is drawn as the bottom band.
    pub index: usize,
    /// Visible events sorted by start time.
    pub events: Vec<EventId>,
}

/// Owner of the rows and the only mutation path for placed events.
#[derive(Debug)]
pub struct EventManager {
    id: ManagerId,
    state: Mutex<ManagerState>,
}

#[derive(Debug)]
struct ManagerState {
    config: TimelineConfig,
    events: HashMap<EventId, Event>,
    bounds: HashMap<EventId, EventBounds>,
    row_of: HashMap<EventId, usize>,
    rows: Vec<Row>,
    aggregates: HashMap<EventId, Event>,
    visible_dirty: bool,
    prev_window: Option<TimeSpan>,
}

impl EventManager {
    /// Create an empty manager with the given configuration.
    pub fn new(config: TimelineConfig) -> Self {
        Self {
            id: ManagerId::next(),
            state: Mutex::new(ManagerState {
                config,
                events: HashMap::new(),
                bounds: HashMap::new(),
                row_of: HashMap::new(),
                rows: Vec::new(),
                aggregates: HashMap::new(),
                visible_dirty: true,
                prev_window: None,
            }),
        }
    }

    /// The manager's identity handle.
    pub fn id(&self) -> ManagerId {
        self.id
    }

    /// A copy of the current configuration.
    pub fn config(&self) -> TimelineConfig {
        self.state.lock().config.clone()
    }

    /// Check whether overlapping events are automatically stacked into rows.
    pub fn is_stacking(&self) -> bool {
        self.state.lock().config.stack_overlapping
    }

    /// Enable or disable automatic stacking. All events are re-placed.
    pub fn set_stacking(&self, stack: bool) {
        let mut state = self.state.lock();
        state.config.stack_overlapping = stack;
        state.rebuild_rows();
    }

    /// Enable or disable aggregation of small nearby visible events.
    pub fn set_aggregate_nearby(&self, aggregate: bool) {
        let mut state = self.state.lock();
        state.config.aggregate_nearby = aggregate;
        state.rebuild_rows();
    }

    /// Add an event, choosing its row. Takes ownership; re-adding an id
    /// already present replaces the previous entry.
    pub fn add(&self, mut event: Event) -> EventId {
        let mut state = self.state.lock();
        let id = event.id();
        if state.events.contains_key(&id) {
            state.remove_full(id);
        }
        event.set_owner(Some(self.id));
        debug!(event = ?id, "add event");
        state.events.insert(id, event);
        state.place(id);
        state.clear_empty_trailing_rows();
        state.visible_dirty = true;
        id
    }

    /// Remove an event, returning it detached.
    pub fn remove(&self, id: EventId) -> Option<Event> {
        let mut state = self.state.lock();
        let mut event = state.remove_full(id)?;
        event.set_owner(None);
        debug!(event = ?id, "remove event");
        state.visible_dirty = true;
        Some(event)
    }

    /// Remove every event.
    pub fn remove_all(&self) {
        let mut state = self.state.lock();
        state.events.clear();
        state.bounds.clear();
        state.row_of.clear();
        state.rows.clear();
        state.aggregates.clear();
        state.visible_dirty = true;
    }

    /// Move an event to a new time range, subject to its constraint chain.
    ///
    /// Returns the installed span, which may differ from the proposal. The
    /// event may land in a different row; vacated space is compacted.
    pub fn move_event(
        &self,
        id: EventId,
        start: TimeStamp,
        end: TimeStamp,
    ) -> Option<TimeSpan> {
        let mut state = self.state.lock();
        let accepted = state.events.get(&id)?.propose_times(TimeSpan::new(start, end));
        state.move_structural(id, accepted);
        Some(accepted)
    }

    /// Move an event to a new time range, bypassing its constraint chain.
    pub fn move_event_forced(
        &self,
        id: EventId,
        start: TimeStamp,
        end: TimeStamp,
    ) -> Option<TimeSpan> {
        let mut state = self.state.lock();
        if !state.events.contains_key(&id) {
            return None;
        }
        let span = TimeSpan::new(start, end);
        state.move_structural(id, span);
        Some(span)
    }

    /// Pin an event to an explicit row. The placement is trusted as-is: no
    /// displacement runs beyond the insert, and the heuristic will never move
    /// the event afterward.
    pub fn set_event_row(&self, id: EventId, row_index: usize) {
        let mut state = self.state.lock();
        let Some(event) = state.events.get_mut(&id) else {
            return;
        };
        event.set_placement(Placement::FixedRow(row_index));
        if let Some(old_index) = state.row_of.get(&id).copied() {
            state.rows[old_index].remove(id);
        }
        state.ensure_rows(row_index);
        state.row_add(row_index, id);
        state.clear_empty_trailing_rows();
        state.visible_dirty = true;
    }

    /// Return an event to heuristic stacking. Takes effect on its next move
    /// or on a stacking rebuild.
    pub fn set_event_floating(&self, id: EventId) {
        let mut state = self.state.lock();
        if let Some(event) = state.events.get_mut(&id) {
            event.set_placement(Placement::AutoStack);
        }
    }

    /// A copy of an owned event.
    pub fn get_event(&self, id: EventId) -> Option<Event> {
        self.state.lock().events.get(&id).cloned()
    }

    /// Mutate an owned event's display attributes in place.
    ///
    /// Structural mutation stays guarded: the event itself refuses time and
    /// placement changes while attached, directing callers to
    /// [`move_event`](Self::move_event) and
    /// [`set_event_row`](Self::set_event_row).
    pub fn with_event_mut<R>(&self, id: EventId, f: impl FnOnce(&mut Event) -> R) -> Option<R> {
        let mut state = self.state.lock();
        let event = state.events.get_mut(&id)?;
        Some(f(event))
    }

    /// A copy of an owned event or of a currently visible aggregate.
    pub fn get_visible_event(&self, id: EventId) -> Option<Event> {
        let state = self.state.lock();
        state
            .events
            .get(&id)
            .or_else(|| state.aggregates.get(&id))
            .cloned()
    }

    /// Ids of all owned events.
    pub fn event_ids(&self) -> Vec<EventId> {
        self.state.lock().events.keys().copied().collect()
    }

    /// Number of owned events.
    pub fn len(&self) -> usize {
        self.state.lock().events.len()
    }

    /// Check whether the manager owns no events.
    pub fn is_empty(&self) -> bool {
        self.state.lock().events.is_empty()
    }

    /// Check whether an event id is owned by this manager.
    pub fn contains(&self, id: EventId) -> bool {
        self.state.lock().events.contains_key(&id)
    }

    /// The row currently holding an event.
    pub fn row_of(&self, id: EventId) -> Option<usize> {
        self.state.lock().row_of.get(&id).copied()
    }

    /// Number of rows for sizing purposes; an empty manager still reports 1.
    pub fn row_count(&self) -> usize {
        self.state.lock().rows.len().max(1)
    }

    /// Pixel height needed to draw all rows with their buffers.
    pub fn preferred_height_px(&self) -> f32 {
        let state = self.state.lock();
        let rows = state.rows.len().max(1) as f32;
        rows * state.config.row_height_px + (rows + 1.0) * state.config.row_buffer_px
    }

    /// Snapshot of each row's visible events, as of the last
    /// [`calculate_visible`](Self::calculate_visible) call.
    pub fn visible_rows(&self) -> Vec<RowView> {
        let state = self.state.lock();
        state
            .rows
            .iter()
            .map(|row| RowView {
                index: row.index(),
                events: row.visible_events().to_vec(),
            })
            .collect()
    }

    /// Recompute each row's visible set for the axis window.
    ///
    /// Cheap when nothing changed: the work is skipped unless a structural
    /// mutation was made or the axis bounds moved since the last call.
    pub fn calculate_visible(&self, axis: &TimeAxis) {
        self.state.lock().calculate_visible(axis);
    }

    /// Record painter-computed label/icon extents for an event.
    pub fn set_event_bounds(&self, id: EventId, bounds: EventBounds) {
        self.state.lock().bounds.insert(id, bounds);
    }

    /// The last painter-computed label/icon extents for an event.
    pub fn get_event_bounds(&self, id: EventId) -> Option<EventBounds> {
        self.state.lock().bounds.get(&id).copied()
    }

    /// All events near the cursor in its row, classified by hit location.
    ///
    /// Results are sorted by event id. Returns an empty list when the cursor
    /// is outside every row band or the axis cannot map pixels to time.
    pub fn nearest_events(&self, mouse: &MouseEvent, axis: &TimeAxis) -> Vec<EventSelection> {
        self.state.lock().nearest_events(mouse, axis)
    }

    /// The single best pick near the cursor.
    ///
    /// An event containing the cursor instant wins outright; otherwise the
    /// candidate minimizing `min(|t - start|, |t - end|)` is chosen, which
    /// keeps instantaneous events pickable without requiring the cursor to be
    /// inside them.
    pub fn nearest_event(&self, mouse: &MouseEvent, axis: &TimeAxis) -> Option<EventSelection> {
        let state = self.state.lock();
        let selections = state.nearest_events(mouse, axis);
        let time = axis.time_at_pixel(mouse.x)?;

        let mut best: Option<(EventSelection, i64)> = None;
        for selection in selections {
            let Some(span) = state.visible_span(selection.event) else {
                continue;
            };
            if span.contains(time) {
                return Some(selection);
            }
            let distance = time
                .millis_since(span.start)
                .abs()
                .min(time.millis_since(span.end).abs());
            if best.is_none_or(|(_, best_distance)| distance < best_distance) {
                best = Some((selection, distance));
            }
        }
        best.map(|(selection, _)| selection)
    }
}

impl Default for EventManager {
    fn default() -> Self {
        Self::new(TimelineConfig::default())
    }
}

// All ManagerState methods require the manager lock to be held.
impl ManagerState {
    fn remove_full(&mut self, id: EventId) -> Option<Event> {
        let event = self.events.remove(&id)?;
        self.bounds.remove(&id);
        if let Some(row_index) = self.row_of.remove(&id) {
            self.rows[row_index].remove(id);
            self.shift_events(&event.span(), row_index);
            self.clear_empty_trailing_rows();
        }
        Some(event)
    }

    fn move_structural(&mut self, id: EventId, new_span: TimeSpan) {
        let Some(row_index) = self.row_of.get(&id).copied() else {
            return;
        };
        let (old_span, fixed) = match self.events.get_mut(&id) {
            Some(event) => {
                let old_span = event.span();
                let fixed = event.is_fixed_row();
                event.install_times(new_span);
                (old_span, fixed)
            }
            None => {
                debug_assert!(false, "placed event missing from the event map");
                return;
            }
        };

        if fixed {
            // the row stays the same; remove and re-insert so the interval
            // index is keyed under the new times
            self.rows[row_index].remove(id);
            self.rows[row_index].insert(id, new_span);
            if self.config.stack_overlapping {
                self.displace_overlapping(row_index, &new_span);
            }
        } else {
            self.row_remove(row_index, id);
            self.place(id);
        }

        debug!(event = ?id, "move event");
        self.shift_events(&old_span, row_index);
        self.clear_empty_trailing_rows();
        self.visible_dirty = true;
    }

    /// Choose and fill a row for an unplaced event.
    fn place(&mut self, id: EventId) {
        let Some(event) = self.events.get(&id) else {
            debug_assert!(false, "placed event not owned");
            return;
        };
        let span = event.span();
        let placement = event.placement();

        if self.config.stack_overlapping && placement == Placement::AutoStack {
            let row_index = self.least_overlap_row(&span);
            self.row_add(row_index, id);
        } else {
            let requested = match placement {
                Placement::FixedRow(index) => index,
                Placement::AutoStack => 0,
            };
            let max_rows = self.config.max_row_count.max(1);
            let requested = requested.min(max_rows - 1);
            self.ensure_rows(requested);
            self.row_add(requested, id);

            // the requested spot may overlap auto-stacked events; move them
            // out of the way
            if self.config.stack_overlapping {
                self.displace_overlapping(requested, &span);
            }
        }
    }

    /// The row where the span causes the least visual overlap. If every
    /// candidate has nonzero cost and the row cap permits, a fresh row
    /// (cost zero) is opened instead. At the cap the least-bad row is
    /// accepted and overlap is tolerated.
    fn least_overlap_row(&mut self, span: &TimeSpan) -> usize {
        let max_rows = self.config.max_row_count.max(1);

        let mut least_cost = f64::INFINITY;
        let mut least_index = None;
        for (index, row) in self.rows.iter().enumerate() {
            let cost = overlap_cost(row, span);
            if cost < least_cost {
                least_cost = cost;
                least_index = Some(index);
            }
        }

        if least_cost != 0.0 && self.rows.len() < max_rows {
            let index = self.rows.len();
            trace!(row = index, "open new row");
            self.rows.push(Row::new(index));
            return index;
        }

        least_index.expect("at least one row exists at the cap")
    }

    /// Re-place every non-fixed event now overlapping the span in this row.
    /// Displacement cascades: a displaced event is re-run through placement
    /// and may in turn free or claim space elsewhere.
    fn displace_overlapping(&mut self, row_index: usize, span: &TimeSpan) {
        let overlapping: Vec<EventId> = self.rows[row_index]
            .overlapping_span(span)
            .into_iter()
            .collect();
        for id in overlapping {
            self.displace(id);
        }
    }

    fn displace(&mut self, id: EventId) {
        let Some(event) = self.events.get(&id) else {
            return;
        };
        // an event that requested its row stays put even when overlapped
        if event.is_fixed_row() {
            return;
        }
        let span = event.span();
        let Some(row_index) = self.row_of.get(&id).copied() else {
            return;
        };
        trace!(event = ?id, from = row_index, "displace event");
        self.row_remove(row_index, id);
        self.place(id);
        self.shift_events(&span, row_index);
    }

    /// After space frees up in `target_row`, pull overlapping events down
    /// from higher rows so the packing stays compact. Each successful shift
    /// recurses on the row it vacated.
    fn shift_events(&mut self, reference: &TimeSpan, target_row: usize) {
        for from_row in ((target_row + 1)..self.rows.len()).rev() {
            let candidates: Vec<EventId> = self.rows[from_row]
                .overlapping_span(reference)
                .into_iter()
                .collect();
            for id in candidates {
                self.move_if_room(id, from_row, target_row);
            }
        }
    }

    fn move_if_room(&mut self, id: EventId, from_row: usize, target_row: usize) {
        if self.row_of.get(&id) != Some(&from_row) {
            return;
        }
        let Some(event) = self.events.get(&id) else {
            return;
        };
        if event.is_fixed_row() {
            return;
        }
        let span = event.span();
        if self.rows[target_row].overlapping_span(&span).is_empty() {
            trace!(event = ?id, from = from_row, to = target_row, "shift event down");
            self.row_remove(from_row, id);
            self.row_add(target_row, id);
            self.shift_events(&span, from_row);
        }
    }

    fn row_add(&mut self, row_index: usize, id: EventId) {
        let Some(span) = self.events.get(&id).map(Event::span) else {
            debug_assert!(false, "added event not owned");
            return;
        };
        self.rows[row_index].insert(id, span);
        self.row_of.insert(id, row_index);
    }

    fn row_remove(&mut self, row_index: usize, id: EventId) {
        self.rows[row_index].remove(id);
        self.row_of.remove(&id);
    }

    fn ensure_rows(&mut self, index: usize) {
        while self.rows.len() <= index {
            let next = self.rows.len();
            self.rows.push(Row::new(next));
        }
    }

    fn clear_empty_trailing_rows(&mut self) {
        while self.rows.last().is_some_and(Row::is_empty) {
            self.rows.pop();
        }
    }

    fn rebuild_rows(&mut self) {
        self.rows.clear();
        self.row_of.clear();
        let ids: Vec<EventId> = self.events.keys().copied().collect();
        for id in ids {
            self.place(id);
        }
        self.clear_empty_trailing_rows();
        self.visible_dirty = true;
    }

    fn calculate_visible(&mut self, axis: &TimeAxis) {
        let window = axis.span();
        if !self.visible_dirty && self.prev_window == Some(window) {
            return;
        }

        let config = self.config.clone();
        let millis_per_pixel = axis.millis_per_pixel();
        self.aggregates.clear();
        for row in &mut self.rows {
            match millis_per_pixel {
                Some(mpp) if config.aggregate_nearby => {
                    for aggregate in
                        row.calculate_visible_aggregated(window.start, window.end, mpp, &config)
                    {
                        self.aggregates.insert(aggregate.id(), aggregate);
                    }
                }
                _ => row.calculate_visible_normal(window.start, window.end),
            }
        }

        self.prev_window = Some(window);
        self.visible_dirty = false;
    }

    fn visible_span(&self, id: EventId) -> Option<TimeSpan> {
        self.events
            .get(&id)
            .map(Event::span)
            .or_else(|| self.aggregates.get(&id).map(Event::span))
    }

    fn nearest_events(&self, mouse: &MouseEvent, axis: &TimeAxis) -> Vec<EventSelection> {
        let Some(row_index) = self.nearest_row_index(mouse.y) else {
            return Vec::new();
        };
        let Some(millis_per_pixel) = axis.millis_per_pixel() else {
            return Vec::new();
        };
        let Some(time) = axis.time_at_pixel(mouse.x) else {
            return Vec::new();
        };

        let buffer = (self.config.pick_buffer_px as f64 * millis_per_pixel).round() as i64;
        let window_start = time.sub_millis(buffer);
        let window_end = time.add_millis(buffer);

        let candidates = self.rows[row_index].nearest_visible(
            window_start,
            window_end,
            self.config.aggregate_nearby,
        );

        let mut selections: Vec<EventSelection> = candidates
            .into_iter()
            .filter_map(|id| {
                let span = self.visible_span(id)?;
                Some(EventSelection {
                    event: id,
                    locations: self.classify(id, &span, time, window_start, window_end),
                })
            })
            .collect();
        selections.sort_by_key(|selection| selection.event);
        selections
    }

    fn classify(
        &self,
        id: EventId,
        span: &TimeSpan,
        time: TimeStamp,
        window_start: TimeStamp,
        window_end: TimeStamp,
    ) -> LocationSet {
        let mut locations = LocationSet::empty();

        if let Some(bounds) = self.bounds.get(&id) {
            if bounds.contains_label(time) {
                locations |= LocationSet::LABEL;
            }
            if bounds.contains_icon(time) {
                locations |= LocationSet::ICON;
            }
        }

        let start_hit = window_end >= span.start && window_start <= span.start;
        let end_hit = window_end >= span.end && window_start <= span.end;
        if start_hit {
            locations |= LocationSet::START;
        }
        if end_hit {
            locations |= LocationSet::END;
        }
        if start_hit == end_hit {
            locations |= LocationSet::CENTER;
        }

        locations
    }

    /// Resolve a row-band pixel coordinate to a row. Row 0 is the bottom
    /// band, so the pixel row is flipped against the row count.
    fn nearest_row_index(&self, y: f32) -> Option<usize> {
        let band = self.config.row_height_px + self.config.row_buffer_px;
        if band <= 0.0 || y < 0.0 {
            return None;
        }
        let pixel_row = (y / band).floor() as usize;
        let row_count = self.rows.len().max(1);
        let row_index = row_count.checked_sub(1)?.checked_sub(pixel_row)?;
        (row_index < self.rows.len()).then_some(row_index)
    }
}

fn overlap_cost(row: &Row, span: &TimeSpan) -> f64 {
    let own_floor = span.duration_millis() as f64 / OVERLAP_COST_DIVISOR;

    let mut total = 0.0;
    for id in row.overlapping_span(span) {
        let Some(other) = row.span_of(id) else {
            continue;
        };
        let floor = own_floor.max(other.duration_millis() as f64 / OVERLAP_COST_DIVISOR);
        let overlap = span.overlap_millis(&other) as f64;
        total += floor.max(overlap);
    }
    total
}
