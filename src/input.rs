//! Mouse event model consumed by the drag and selection glue.

use bitflags::bitflags;

/// Mouse buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    /// Primary button.
    Left,
    /// Middle button or wheel press.
    Middle,
    /// Secondary button.
    Right,
}

bitflags! {
    /// Keyboard modifiers held during a mouse event.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Modifiers: u8 {
        /// Shift key.
        const SHIFT = 1 << 0;
        /// Control key.
        const CONTROL = 1 << 1;
        /// Alt/Option key.
        const ALT = 1 << 2;
        /// Meta/Command key.
        const META = 1 << 3;
    }
}

/// A mouse event in timeline coordinates.
///
/// `x` is measured in pixels along the time axis (0 at the axis minimum);
/// `y` is measured in pixels from the top of the event band.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MouseEvent {
    /// Pixel position along the time axis.
    pub x: f32,
    /// Pixel position from the top of the event band.
    pub y: f32,
    /// Button involved, if any.
    pub button: Option<MouseButton>,
    /// Modifiers held.
    pub modifiers: Modifiers,
}

impl MouseEvent {
    /// Create a mouse event with no button or modifiers.
    pub fn at(x: f32, y: f32) -> Self {
        Self {
            x,
            y,
            button: None,
            modifiers: Modifiers::empty(),
        }
    }

    /// Set the button.
    pub fn with_button(mut self, button: MouseButton) -> Self {
        self.button = Some(button);
        self
    }

    /// Set the modifiers.
    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }
}
