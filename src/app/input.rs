use glam::Vec2;
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointerPhase {
    Down,
    Move,
    Up,
    /// Pointer capture lost, window blur, touch interrupted.
    Cancel,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointerButton {
    #[default]
    Primary,
    Secondary,
    Middle,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointerType {
    #[default]
    Mouse,
    Touch,
    Pen,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub meta: bool,
}

impl Modifiers {
    pub const NONE: Self = Self {
        shift: false,
        ctrl: false,
        meta: false,
    };

    /// Held modifier that turns a click into a multi-select toggle.
    pub fn multi_select(&self) -> bool {
        self.shift || self.ctrl || self.meta
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct PointerEvent {
    pub phase: PointerPhase,
    #[serde(default)]
    pub button: PointerButton,
    /// Pixels, origin at the top-left of the viewport.
    pub position: Vec2,
    #[serde(default)]
    pub modifiers: Modifiers,
    #[serde(default)]
    pub pointer_type: PointerType,
    /// Active touch points; zero for mouse and pen.
    #[serde(default)]
    pub touch_count: u32,
}

impl PointerEvent {
    pub fn new(phase: PointerPhase, position: Vec2) -> Self {
        Self {
            phase,
            button: PointerButton::Primary,
            position,
            modifiers: Modifiers::NONE,
            pointer_type: PointerType::Mouse,
            touch_count: 0,
        }
    }

    pub fn with_button(mut self, button: PointerButton) -> Self {
        self.button = button;
        self
    }

    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    pub fn touch(phase: PointerPhase, position: Vec2, touch_count: u32) -> Self {
        Self {
            pointer_type: PointerType::Touch,
            touch_count,
            ..Self::new(phase, position)
        }
    }

    /// Pinch and multi-finger gestures belong to camera navigation.
    pub fn is_navigation_gesture(&self) -> bool {
        self.pointer_type == PointerType::Touch && self.touch_count >= 2
    }
}
