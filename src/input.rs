//! User input events.

use bitflags::bitflags;
use glam::UVec2;

bitflags! {
    /// Actions a mouse event can describe. Several flags may be set at once,
    /// e.g. a move performed while a button is held.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MouseAction: u16 {
        const MOTION = 1;
        const PRESSED = 1 << 1;
        const RELEASED = 1 << 2;
        const DOUBLE_CLICK = 1 << 3;
        const ENTER = 1 << 4;
        const EXIT = 1 << 5;
        const WHEEL = 1 << 6;
    }
}

bitflags! {
    /// Keyboard modifiers held while an event was generated.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Modifiers: u8 {
        const SHIFT = 1;
        const CONTROL = 1 << 1;
        const ALT = 1 << 2;
    }
}

/// Mouse buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    None,
    Left,
    Middle,
    Right,
}

/// A pointer event carrying absolute coordinates within a viewport.
///
/// Coordinates are measured in pixels from the top-left corner of the
/// viewport the event was delivered to. Events start out accepted; a handler
/// that wants downstream recipients to see the event calls [`ignore`], and a
/// recipient that consumed it calls [`accept`].
///
/// [`ignore`]: MouseEvent::ignore
/// [`accept`]: MouseEvent::accept
#[derive(Debug, Clone)]
pub struct MouseEvent {
    x: i32,
    y: i32,
    action: MouseAction,
    button: MouseButton,
    modifiers: Modifiers,
    viewport: UVec2,
    accepted: bool,
}

impl MouseEvent {
    /// Creates a new mouse event with the given position, action, button,
    /// modifiers and viewport extent.
    pub fn new(
        x: i32,
        y: i32,
        action: MouseAction,
        button: MouseButton,
        modifiers: Modifiers,
        viewport: UVec2,
    ) -> Self {
        Self {
            x,
            y,
            action,
            button,
            modifiers,
            viewport,
            accepted: true,
        }
    }

    pub fn x(&self) -> i32 {
        self.x
    }

    pub fn y(&self) -> i32 {
        self.y
    }

    pub fn action(&self) -> MouseAction {
        self.action
    }

    pub fn button(&self) -> MouseButton {
        self.button
    }

    pub fn modifiers(&self) -> Modifiers {
        self.modifiers
    }

    pub fn viewport(&self) -> UVec2 {
        self.viewport
    }

    /// Marks the event as consumed.
    pub fn accept(&mut self) {
        self.accepted = true;
    }

    /// Marks the event as not (yet) consumed.
    pub fn ignore(&mut self) {
        self.accepted = false;
    }

    pub fn is_accepted(&self) -> bool {
        self.accepted
    }

    /// Returns a copy of the event re-projected into a child viewport: the
    /// given offset is subtracted from the position and the viewport extent
    /// is replaced. The copy starts out not accepted.
    pub fn relative_to(&self, offset_x: i32, offset_y: i32, viewport: UVec2) -> Self {
        let mut event = Self {
            x: self.x - offset_x,
            y: self.y - offset_y,
            viewport,
            ..self.clone()
        };
        event.ignore();
        event
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reprojection_shifts_position_and_clears_acceptance() {
        let event = MouseEvent::new(
            300,
            80,
            MouseAction::MOTION,
            MouseButton::None,
            Modifiers::empty(),
            UVec2::new(512, 512),
        );
        assert!(event.is_accepted());

        let child = event.relative_to(256, 0, UVec2::new(256, 256));
        assert_eq!((child.x(), child.y()), (44, 80));
        assert_eq!(child.viewport(), UVec2::new(256, 256));
        assert_eq!(child.action(), MouseAction::MOTION);
        assert!(!child.is_accepted());
    }
}
