//! Shared UI styles

use bevy::prelude::*;

/// Dark background for menus
pub const MENU_BACKGROUND: Color = Color::srgb(0.06, 0.05, 0.04);

pub const BUTTON_NORMAL: Color = Color::srgb(0.12, 0.10, 0.08);
pub const BUTTON_HOVERED: Color = Color::srgb(0.22, 0.16, 0.10);
pub const BUTTON_PRESSED: Color = Color::srgb(0.45, 0.28, 0.12);
pub const BUTTON_BORDER: Color = Color::srgb(0.35, 0.25, 0.15);

/// Hover/focus highlight
pub const ACCENT_COLOR: Color = Color::srgb(0.77, 0.47, 0.20);

/// Banners for faults and failed connections
pub const WARNING_COLOR: Color = Color::srgb(0.90, 0.35, 0.20);

pub const TEXT_COLOR: Color = Color::srgb(0.92, 0.88, 0.82);
pub const TEXT_MUTED: Color = Color::srgb(0.50, 0.45, 0.40);

/// Standard menu button node
pub fn button_style() -> Node {
    Node {
        width: Val::Px(280.0),
        height: Val::Px(55.0),
        justify_content: JustifyContent::Center,
        align_items: AlignItems::Center,
        margin: UiRect::all(Val::Px(8.0)),
        border: UiRect::all(Val::Px(2.0)),
        ..default()
    }
}

pub fn button_text_style() -> TextFont {
    TextFont {
        font_size: 22.0,
        ..default()
    }
}

pub fn title_text_style() -> TextFont {
    TextFont {
        font_size: 64.0,
        ..default()
    }
}

/// Small HUD text
pub fn hud_text_style() -> TextFont {
    TextFont {
        font_size: 16.0,
        ..default()
    }
}

/// Button colors for an interaction state
pub fn button_colors(interaction: Interaction) -> (BackgroundColor, BorderColor) {
    match interaction {
        Interaction::Pressed => (BackgroundColor(BUTTON_PRESSED), BorderColor::from(ACCENT_COLOR)),
        Interaction::Hovered => (BackgroundColor(BUTTON_HOVERED), BorderColor::from(ACCENT_COLOR)),
        Interaction::None => (BackgroundColor(BUTTON_NORMAL), BorderColor::from(BUTTON_BORDER)),
    }
}
