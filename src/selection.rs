//! Selection tracking for timeline events.
//!
//! The handler keeps a non-owning, insertion-ordered set of event ids;
//! events stay owned by their [`EventManager`](crate::manager::EventManager).
//! Listeners are told exactly what changed: events whose membership did not
//! change are never re-announced.

use parking_lot::Mutex;
use std::sync::Arc;

use crate::event::{Event, EventId};
use crate::style::Color;

/// Callback invoked with (newly selected, newly deselected) ids.
pub type SelectionListener = Arc<dyn Fn(&[EventId], &[EventId]) + Send + Sync>;

/// Tracks the set of currently selected events and notifies listeners of
/// changes.
pub struct SelectionHandler {
    state: Mutex<SelectionState>,
}

struct SelectionState {
    selected: Vec<EventId>,
    listeners: Vec<SelectionListener>,

    border_color: Option<Color>,
    background_color: Option<Color>,
    border_thickness: f32,
    highlight_selected: bool,
    clear_selection_on_click: bool,
    allow_multiple_selection: bool,
    allow_mouse_selection: bool,
}

impl SelectionHandler {
    /// Create a handler with nothing selected.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SelectionState {
                selected: Vec::new(),
                listeners: Vec::new(),
                border_color: None,
                background_color: None,
                border_thickness: 1.8,
                highlight_selected: false,
                clear_selection_on_click: false,
                allow_multiple_selection: true,
                allow_mouse_selection: true,
            }),
        }
    }

    /// Register a listener for selection changes.
    pub fn add_listener(&self, listener: SelectionListener) {
        self.state.lock().listeners.push(listener);
    }

    /// The selected ids in insertion order.
    pub fn selected(&self) -> Vec<EventId> {
        self.state.lock().selected.clone()
    }

    /// Check whether an event is selected.
    pub fn is_selected(&self, id: EventId) -> bool {
        self.state.lock().selected.contains(&id)
    }

    /// Replace the selection. Listeners are notified with the symmetric
    /// difference; an unchanged selection notifies nobody.
    pub fn set_selected(&self, new_selection: Vec<EventId>) {
        let (listeners, newly_selected, deselected) = {
            let mut state = self.state.lock();

            let deselected: Vec<EventId> = state
                .selected
                .iter()
                .copied()
                .filter(|id| !new_selection.contains(id))
                .collect();
            let newly_selected: Vec<EventId> = new_selection
                .iter()
                .copied()
                .filter(|id| !state.selected.contains(id))
                .collect();
            if deselected.is_empty() && newly_selected.is_empty() {
                return;
            }

            // keep already-selected ids in their original order, then append
            // the new ones
            state.selected.retain(|id| new_selection.contains(id));
            for id in &newly_selected {
                state.selected.push(*id);
            }

            (state.listeners.clone(), newly_selected, deselected)
        };
        notify(&listeners, &newly_selected, &deselected);
    }

    /// Deselect everything.
    pub fn clear(&self) {
        let (listeners, deselected) = {
            let mut state = self.state.lock();
            if state.selected.is_empty() {
                return;
            }
            let deselected = std::mem::take(&mut state.selected);
            (state.listeners.clone(), deselected)
        };
        notify(&listeners, &[], &deselected);
    }

    /// Add one event to the selection.
    pub fn add_selected(&self, id: EventId) {
        let listeners = {
            let mut state = self.state.lock();
            if state.selected.contains(&id) {
                return;
            }
            state.selected.push(id);
            state.listeners.clone()
        };
        notify(&listeners, &[id], &[]);
    }

    /// Remove one event from the selection.
    pub fn remove_selected(&self, id: EventId) {
        let listeners = {
            let mut state = self.state.lock();
            let before = state.selected.len();
            state.selected.retain(|selected| *selected != id);
            if state.selected.len() == before {
                return;
            }
            state.listeners.clone()
        };
        notify(&listeners, &[], &[id]);
    }

    /// Apply click semantics to a pick result.
    ///
    /// A plain click replaces the selection with the clicked event; a click
    /// with the toggle modifier held toggles just that event (when multiple
    /// selection is allowed); a click on empty space clears the selection
    /// when [`set_clear_selection_on_click`](Self::set_clear_selection_on_click)
    /// is enabled, and is ignored otherwise.
    pub fn handle_click(&self, clicked: Option<&Event>, toggle_modifier: bool) {
        let (allow_mouse, allow_multiple, clear_on_click) = {
            let state = self.state.lock();
            (
                state.allow_mouse_selection,
                state.allow_multiple_selection,
                state.clear_selection_on_click,
            )
        };
        if !allow_mouse {
            return;
        }

        match clicked {
            None => {
                if clear_on_click {
                    self.clear();
                }
            }
            Some(event) => {
                if !event.is_selectable() {
                    return;
                }
                let id = event.id();
                if toggle_modifier && allow_multiple {
                    if self.is_selected(id) {
                        self.remove_selected(id);
                    } else {
                        self.add_selected(id);
                    }
                } else {
                    self.set_selected(vec![id]);
                }
            }
        }
    }

    /// Border color drawn around selected events.
    pub fn selected_border_color(&self) -> Option<Color> {
        self.state.lock().border_color
    }

    /// Set the border color drawn around selected events.
    pub fn set_selected_border_color(&self, color: Color) {
        let mut state = self.state.lock();
        state.border_color = Some(color);
        state.highlight_selected = true;
    }

    /// Fill color drawn behind selected events.
    pub fn selected_background_color(&self) -> Option<Color> {
        self.state.lock().background_color
    }

    /// Set the fill color drawn behind selected events.
    pub fn set_selected_background_color(&self, color: Color) {
        let mut state = self.state.lock();
        state.background_color = Some(color);
        state.highlight_selected = true;
    }

    /// Border thickness drawn around selected events.
    pub fn selected_border_thickness(&self) -> f32 {
        self.state.lock().border_thickness
    }

    /// Set the border thickness drawn around selected events.
    pub fn set_selected_border_thickness(&self, thickness: f32) {
        let mut state = self.state.lock();
        state.border_thickness = thickness;
        state.highlight_selected = true;
    }

    /// Check whether selected events are drawn highlighted.
    pub fn is_highlight_selected(&self) -> bool {
        self.state.lock().highlight_selected
    }

    /// Draw selected events highlighted.
    pub fn set_highlight_selected(&self, highlight: bool) {
        self.state.lock().highlight_selected = highlight;
    }

    /// Check whether clicking empty space clears the selection.
    pub fn is_clear_selection_on_click(&self) -> bool {
        self.state.lock().clear_selection_on_click
    }

    /// Clear the selection when empty space is clicked.
    pub fn set_clear_selection_on_click(&self, clear: bool) {
        self.state.lock().clear_selection_on_click = clear;
    }

    /// Check whether modifier-clicks may select multiple events.
    pub fn is_allow_multiple_selection(&self) -> bool {
        self.state.lock().allow_multiple_selection
    }

    /// Allow modifier-clicks to select multiple events. Does not restrict
    /// programmatic selection.
    pub fn set_allow_multiple_selection(&self, allow: bool) {
        self.state.lock().allow_multiple_selection = allow;
    }

    /// Check whether mouse clicks may change the selection at all.
    pub fn is_allow_mouse_selection(&self) -> bool {
        self.state.lock().allow_mouse_selection
    }

    /// Allow mouse clicks to change the selection. Disable this to drive
    /// selection purely from custom click handling.
    pub fn set_allow_mouse_selection(&self, allow: bool) {
        self.state.lock().allow_mouse_selection = allow;
    }
}

impl Default for SelectionHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SelectionHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("SelectionHandler")
            .field("selected", &state.selected)
            .field("listeners", &state.listeners.len())
            .finish()
    }
}

fn notify(listeners: &[SelectionListener], newly_selected: &[EventId], deselected: &[EventId]) {
    for listener in listeners {
        listener(newly_selected, deselected);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Event;
    use crate::time::TimeStamp;
    use std::sync::Mutex as StdMutex;

    fn event() -> Event {
        Event::new("", TimeStamp::from_millis(0), TimeStamp::from_millis(10))
    }

    type Recorded = Arc<StdMutex<Vec<(Vec<EventId>, Vec<EventId>)>>>;

    fn recording_handler() -> (SelectionHandler, Recorded) {
        let handler = SelectionHandler::new();
        let recorded: Recorded = Arc::new(StdMutex::new(Vec::new()));
        let sink = Arc::clone(&recorded);
        handler.add_listener(Arc::new(move |selected, deselected| {
            sink.lock()
                .unwrap()
                .push((selected.to_vec(), deselected.to_vec()));
        }));
        (handler, recorded)
    }

    #[test]
    fn replacing_selection_fires_exact_delta() {
        let (handler, recorded) = recording_handler();
        let (a, b, c) = (event().id(), event().id(), event().id());

        handler.set_selected(vec![a, b]);
        handler.set_selected(vec![b, c]);

        let calls = recorded.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0], (vec![a, b], vec![]));
        assert_eq!(calls[1], (vec![c], vec![a]));
    }

    #[test]
    fn unchanged_selection_fires_nothing() {
        let (handler, recorded) = recording_handler();
        let (a, b) = (event().id(), event().id());

        handler.set_selected(vec![a, b]);
        handler.set_selected(vec![b, a]);

        assert_eq!(recorded.lock().unwrap().len(), 1);
    }

    #[test]
    fn selection_preserves_insertion_order() {
        let handler = SelectionHandler::new();
        let (a, b, c) = (event().id(), event().id(), event().id());

        handler.set_selected(vec![a, b]);
        handler.set_selected(vec![c, b]);
        assert_eq!(handler.selected(), vec![b, c]);
    }

    #[test]
    fn clear_reports_everything_deselected() {
        let (handler, recorded) = recording_handler();
        let (a, b) = (event().id(), event().id());

        handler.set_selected(vec![a, b]);
        handler.clear();
        handler.clear();

        let calls = recorded.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1], (vec![], vec![a, b]));
    }

    #[test]
    fn plain_click_replaces_selection() {
        let handler = SelectionHandler::new();
        let first = event();
        let second = event();

        handler.handle_click(Some(&first), false);
        handler.handle_click(Some(&second), false);
        assert_eq!(handler.selected(), vec![second.id()]);
    }

    #[test]
    fn modifier_click_toggles_membership() {
        let handler = SelectionHandler::new();
        let first = event();
        let second = event();

        handler.handle_click(Some(&first), false);
        handler.handle_click(Some(&second), true);
        assert_eq!(handler.selected(), vec![first.id(), second.id()]);

        handler.handle_click(Some(&first), true);
        assert_eq!(handler.selected(), vec![second.id()]);
    }

    #[test]
    fn empty_click_clears_only_when_configured() {
        let handler = SelectionHandler::new();
        let target = event();

        handler.handle_click(Some(&target), false);
        handler.handle_click(None, false);
        assert_eq!(handler.selected(), vec![target.id()]);

        handler.set_clear_selection_on_click(true);
        handler.handle_click(None, false);
        assert!(handler.selected().is_empty());
    }

    #[test]
    fn unselectable_event_is_ignored() {
        let handler = SelectionHandler::new();
        let locked = event().with_selectable(false);

        handler.handle_click(Some(&locked), false);
        assert!(handler.selected().is_empty());
    }

    #[test]
    fn mouse_selection_can_be_disabled() {
        let handler = SelectionHandler::new();
        let target = event();

        handler.set_allow_mouse_selection(false);
        handler.handle_click(Some(&target), false);
        assert!(handler.selected().is_empty());

        // programmatic selection still works
        handler.set_selected(vec![target.id()]);
        assert_eq!(handler.selected(), vec![target.id()]);
    }

    #[test]
    fn styling_setters_enable_highlighting() {
        let handler = SelectionHandler::new();
        assert!(!handler.is_highlight_selected());
        handler.set_selected_border_color(Color::BLACK);
        assert!(handler.is_highlight_selected());
    }
}
