//! Arrow-key state tracked from keyboard events.

use corelib::camera::CameraInput;
use winit::event::ElementState;
use winit::keyboard::KeyCode;

/// Raw key-down state of the four arrow keys.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ArrowKeys {
    up: bool,
    down: bool,
    left: bool,
    right: bool,
}

impl ArrowKeys {
    /// Update from a key event. Returns `false` for keys the viewer ignores.
    pub fn handle(&mut self, code: KeyCode, state: ElementState) -> bool {
        let pressed = state.is_pressed();
        let slot = match code {
            KeyCode::ArrowUp => &mut self.up,
            KeyCode::ArrowDown => &mut self.down,
            KeyCode::ArrowLeft => &mut self.left,
            KeyCode::ArrowRight => &mut self.right,
            _ => return false,
        };
        *slot = pressed;
        true
    }

    /// Focus loss: treat every key as released.
    pub fn release_all(&mut self) {
        *self = Self::default();
    }

    pub fn input(&self) -> CameraInput {
        CameraInput {
            forward: self.up,
            backward: self.down,
            turn_left: self.left,
            turn_right: self.right,
        }
    }
}
