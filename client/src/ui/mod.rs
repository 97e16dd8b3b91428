//! UI module

pub mod main_menu;
pub mod status_hud;
pub mod styles;

pub use main_menu::MainMenuPlugin;
pub use status_hud::StatusHudPlugin;
