//! Polled keyboard input
//!
//! Window events update a [`KeyboardState`]; the frame loop only ever asks
//! whether a logical key is currently held, through [`InputSource`].

use std::collections::HashSet;

use winit::{
    event::{ElementState, KeyEvent},
    keyboard::{KeyCode, PhysicalKey},
};

use crate::config::{KeyBindings, LogicalKey};

/// What the frame loop reads from the windowing layer each iteration.
pub trait InputSource {
    fn is_pressed(&self, key: LogicalKey) -> bool;

    /// Current drawable size in pixels.
    fn viewport_size(&self) -> (u32, u32);

    /// +1 when only `positive` is held, -1 when only `negative` is, and 0
    /// when neither or both are.
    fn axis(&self, negative: LogicalKey, positive: LogicalKey) -> f32 {
        match (self.is_pressed(negative), self.is_pressed(positive)) {
            (false, true) => 1.0,
            (true, false) => -1.0,
            _ => 0.0,
        }
    }
}

pub struct KeyboardState {
    bindings: KeyBindings,
    held: HashSet<KeyCode>,
    viewport: (u32, u32),
}

impl KeyboardState {
    pub fn new(bindings: KeyBindings, viewport: (u32, u32)) -> Self {
        Self {
            bindings,
            held: HashSet::new(),
            viewport,
        }
    }

    pub fn process_key_event(&mut self, event: &KeyEvent) {
        if let PhysicalKey::Code(code) = event.physical_key {
            self.set_key(code, event.state == ElementState::Pressed);
        }
    }

    pub fn set_key(&mut self, code: KeyCode, pressed: bool) {
        if pressed {
            self.held.insert(code);
        } else {
            self.held.remove(&code);
        }
    }

    /// Forgets held keys, e.g. when the window loses focus and release
    /// events would never arrive.
    pub fn release_all(&mut self) {
        self.held.clear();
    }

    pub fn set_viewport(&mut self, width: u32, height: u32) {
        self.viewport = (width, height);
    }
}

impl InputSource for KeyboardState {
    fn is_pressed(&self, key: LogicalKey) -> bool {
        self.bindings
            .keys(key)
            .iter()
            .any(|code| self.held.contains(code))
    }

    fn viewport_size(&self) -> (u32, u32) {
        self.viewport
    }
}
