//! Mouse-driven dragging of events to adjust their start and end times.

use crate::event::EventId;
use crate::input::{MouseButton, MouseEvent};
use crate::manager::{EventManager, EventSelection, LocationSet};
use crate::time::{TimeSpan, TimeStamp};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DragMode {
    Center,
    Start,
    End,
}

#[derive(Debug, Clone, Copy)]
struct DragState {
    event: EventId,
    mode: DragMode,
    anchor: TimeStamp,
    original: TimeSpan,
}

/// Drives event time changes from mouse gestures.
///
/// On press over a draggable region the controller records an anchor time and
/// the event's original span; each subsequent move proposes new times through
/// [`EventManager::move_event`], so the event's constraint chain still
/// applies. Center drags translate the whole span; edge drags move a single
/// endpoint.
#[derive(Debug)]
pub struct DragController {
    enabled: bool,
    drag: Option<DragState>,
}

impl Default for DragController {
    fn default() -> Self {
        Self::new()
    }
}

impl DragController {
    /// Create an enabled controller with no drag in progress.
    pub fn new() -> Self {
        Self {
            enabled: true,
            drag: None,
        }
    }

    /// Check whether the controller reacts to input.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Enable or disable the controller. Disabling resets any drag in
    /// progress.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        self.reset();
    }

    /// Check whether a drag is in progress.
    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    /// Forget any drag in progress.
    pub fn reset(&mut self) {
        self.drag = None;
    }

    /// Begin a drag if the press landed on a draggable region of an editable
    /// event. Returns true when the press was consumed.
    pub fn on_press(
        &mut self,
        mouse: &MouseEvent,
        selections: &[EventSelection],
        time: TimeStamp,
        manager: &EventManager,
    ) -> bool {
        if !self.enabled || self.drag.is_some() {
            return false;
        }
        if mouse.button != Some(MouseButton::Left) {
            return false;
        }

        for selection in selections {
            if !selection.is_location(LocationSet::CENTER | LocationSet::START | LocationSet::END)
            {
                continue;
            }
            let Some(event) = manager.get_visible_event(selection.event) else {
                continue;
            };
            if !event.is_editable() {
                continue;
            }

            let mode = if selection.is_center() {
                DragMode::Center
            } else if selection.is_start() {
                DragMode::Start
            } else {
                DragMode::End
            };

            self.drag = Some(DragState {
                event: event.id(),
                mode,
                anchor: time,
                original: event.span(),
            });
            return true;
        }
        false
    }

    /// Continue a drag. Returns true when the move was consumed.
    pub fn on_move(&mut self, time: TimeStamp, manager: &EventManager) -> bool {
        if !self.enabled || self.drag.is_none() {
            return false;
        }
        self.apply_drag(time, manager);
        true
    }

    /// Finish a drag. Returns true when the release was consumed.
    pub fn on_release(&mut self, time: TimeStamp, manager: &EventManager) -> bool {
        if !self.enabled || self.drag.is_none() {
            return false;
        }
        self.apply_drag(time, manager);
        self.reset();
        true
    }

    fn apply_drag(&self, time: TimeStamp, manager: &EventManager) {
        let Some(drag) = self.drag else {
            return;
        };
        match drag.mode {
            DragMode::Center => {
                let delta = time.millis_since(drag.anchor);
                let moved = drag.original.translate(delta);
                manager.move_event(drag.event, moved.start, moved.end);
            }
            // edge drags that would cross the opposite endpoint are ignored
            DragMode::End => {
                if drag.original.start.is_before(time) {
                    manager.move_event(drag.event, drag.original.start, time);
                }
            }
            DragMode::Start => {
                if drag.original.end.is_after(time) {
                    manager.move_event(drag.event, time, drag.original.end);
                }
            }
        }
    }
}
