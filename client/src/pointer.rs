//! Pointer capture
//!
//! Gameplay locks and hides the cursor; menus and despawned local players give it back.
//! The core flips [`PointerCapture`], and [`apply_pointer_capture`] mirrors it onto the
//! primary window.

use bevy::prelude::*;
use bevy::window::{CursorGrabMode, CursorOptions, PrimaryWindow};

#[derive(Resource, Debug, Default)]
pub struct PointerCapture {
    captured: bool,
}

impl PointerCapture {
    /// Hidden cursor, relative motion
    pub fn capture(&mut self) {
        if !self.captured {
            debug!("Pointer captured");
        }
        self.captured = true;
    }

    /// Normal visible cursor
    pub fn release(&mut self) {
        if self.captured {
            debug!("Pointer released");
        }
        self.captured = false;
    }

    pub fn is_captured(&self) -> bool {
        self.captured
    }
}

/// Push the capture state onto the primary window's cursor
pub fn apply_pointer_capture(
    pointer: Res<PointerCapture>,
    windows: Query<Entity, With<PrimaryWindow>>,
    mut cursor_opts: Query<&mut CursorOptions>,
) {
    if !pointer.is_changed() {
        return;
    }

    let Ok(window_entity) = windows.single() else {
        return;
    };

    if let Ok(mut cursor) = cursor_opts.get_mut(window_entity) {
        if pointer.is_captured() {
            cursor.grab_mode = CursorGrabMode::Locked;
            cursor.visible = false;
        } else {
            cursor.grab_mode = CursorGrabMode::None;
            cursor.visible = true;
        }
    }
}
