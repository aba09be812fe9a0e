//! timeplot is an incremental timeline event-layout engine for
//! high-performance plotting applications. Overlapping time-interval events
//! are packed into rows with stable, low-churn placement as they are added,
//! removed, resized, and dragged at interactive frame rates.

#![forbid(unsafe_code)]

pub mod axis;
pub mod config;
pub mod drag;
pub mod event;
pub mod index;
pub mod input;
pub mod manager;
pub mod row;
pub mod selection;
pub mod style;
pub mod time;

pub use axis::TimeAxis;
pub use config::TimelineConfig;
pub use drag::DragController;
pub use event::{EditError, Event, EventBounds, EventConstraint, EventId, Placement};
pub use index::IntervalIndex;
pub use input::{Modifiers, MouseButton, MouseEvent};
pub use manager::{EventManager, EventSelection, LocationSet, ManagerId, RowView};
pub use row::Row;
pub use selection::{SelectionHandler, SelectionListener};
pub use style::{Color, Theme};
pub use time::{TimeSpan, TimeStamp};
