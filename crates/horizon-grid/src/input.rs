//! Input events delivered to a grid item and its cells.
//!
//! Positions are in item-local coordinates (the header band starts at y = 0).

use horizon_grid_core::Point;

/// Keyboard modifier state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct KeyboardModifiers {
    /// The Shift key is held.
    pub shift: bool,
    /// The Control key is held (Cmd on macOS).
    pub control: bool,
    /// The Alt key is held (Option on macOS).
    pub alt: bool,
}

impl KeyboardModifiers {
    /// No modifiers pressed.
    pub const NONE: Self = Self {
        shift: false,
        control: false,
        alt: false,
    };

    /// Shift modifier only.
    pub const SHIFT: Self = Self {
        shift: true,
        control: false,
        alt: false,
    };

    /// Control modifier only.
    pub const CTRL: Self = Self {
        shift: false,
        control: true,
        alt: false,
    };

    /// Check if any modifier is pressed.
    pub fn any(&self) -> bool {
        self.shift || self.control || self.alt
    }
}

/// Mouse buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    /// Primary button (usually left).
    Left,
    /// Secondary button (usually right).
    Right,
    /// Middle button.
    Middle,
}

/// Keys the grid reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    PageUp,
    PageDown,
    Tab,
    Enter,
    Escape,
    Space,
    Backspace,
    Delete,
    F2,
    /// A printable character.
    Char(char),
}

impl Key {
    /// The character this key types, if any.
    pub fn text(&self) -> Option<char> {
        match self {
            Key::Char(c) => Some(*c),
            Key::Space => Some(' '),
            _ => None,
        }
    }
}

/// A pointer or keyboard event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ItemEvent {
    /// A mouse button was pressed.
    Press {
        pos: Point,
        button: MouseButton,
        modifiers: KeyboardModifiers,
    },
    /// A mouse button was released.
    Release {
        pos: Point,
        button: MouseButton,
        modifiers: KeyboardModifiers,
    },
    /// The pointer moved.
    Motion {
        pos: Point,
        modifiers: KeyboardModifiers,
    },
    /// A mouse button was double-clicked.
    DoubleClick {
        pos: Point,
        button: MouseButton,
        modifiers: KeyboardModifiers,
    },
    /// A key was pressed.
    KeyPress {
        key: Key,
        modifiers: KeyboardModifiers,
    },
}

impl ItemEvent {
    /// Left-button press without modifiers.
    pub fn press(x: f32, y: f32) -> Self {
        ItemEvent::Press {
            pos: Point::new(x, y),
            button: MouseButton::Left,
            modifiers: KeyboardModifiers::NONE,
        }
    }

    /// Left-button release without modifiers.
    pub fn release(x: f32, y: f32) -> Self {
        ItemEvent::Release {
            pos: Point::new(x, y),
            button: MouseButton::Left,
            modifiers: KeyboardModifiers::NONE,
        }
    }

    /// Pointer motion without modifiers.
    pub fn motion(x: f32, y: f32) -> Self {
        ItemEvent::Motion {
            pos: Point::new(x, y),
            modifiers: KeyboardModifiers::NONE,
        }
    }

    /// Left-button double click without modifiers.
    pub fn double_click(x: f32, y: f32) -> Self {
        ItemEvent::DoubleClick {
            pos: Point::new(x, y),
            button: MouseButton::Left,
            modifiers: KeyboardModifiers::NONE,
        }
    }

    /// Key press without modifiers.
    pub fn key(key: Key) -> Self {
        ItemEvent::KeyPress {
            key,
            modifiers: KeyboardModifiers::NONE,
        }
    }

    /// Pointer position, for pointer events.
    pub fn pos(&self) -> Option<Point> {
        match self {
            ItemEvent::Press { pos, .. }
            | ItemEvent::Release { pos, .. }
            | ItemEvent::Motion { pos, .. }
            | ItemEvent::DoubleClick { pos, .. } => Some(*pos),
            ItemEvent::KeyPress { .. } => None,
        }
    }

    /// Modifier state at the time of the event.
    pub fn modifiers(&self) -> KeyboardModifiers {
        match self {
            ItemEvent::Press { modifiers, .. }
            | ItemEvent::Release { modifiers, .. }
            | ItemEvent::Motion { modifiers, .. }
            | ItemEvent::DoubleClick { modifiers, .. }
            | ItemEvent::KeyPress { modifiers, .. } => *modifiers,
        }
    }

    /// The same event with its position shifted by `(-dx, -dy)`.
    pub fn translated(&self, dx: f32, dy: f32) -> Self {
        let mut event = *self;
        match &mut event {
            ItemEvent::Press { pos, .. }
            | ItemEvent::Release { pos, .. }
            | ItemEvent::Motion { pos, .. }
            | ItemEvent::DoubleClick { pos, .. } => *pos = pos.offset(-dx, -dy),
            ItemEvent::KeyPress { .. } => {}
        }
        event
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_translated() {
        let event = ItemEvent::press(50.0, 30.0).translated(48.0, 24.0);
        assert_eq!(event.pos(), Some(Point::new(2.0, 6.0)));
        let key = ItemEvent::key(Key::Space).translated(10.0, 10.0);
        assert_eq!(key.pos(), None);
    }

    #[test]
    fn test_key_text() {
        assert_eq!(Key::Char('x').text(), Some('x'));
        assert_eq!(Key::Space.text(), Some(' '));
        assert_eq!(Key::Enter.text(), None);
        assert!(KeyboardModifiers::SHIFT.any());
        assert!(!KeyboardModifiers::NONE.any());
    }
}
