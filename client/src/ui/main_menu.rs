//! Main menu UI
//!
//! Picks the game mode and, for multiplayer, the role and endpoint. The choice is
//! written to the preferences store before the game scene loads.

use bevy::app::AppExit;
use bevy::input::keyboard::{Key, KeyboardInput};
use bevy::input::ButtonState;
use bevy::prelude::*;
use std::net::Ipv6Addr;

use super::styles::*;
use crate::mode::ModeState;
use crate::session::{prefs_path, Preferences, SessionConfig, SessionRole};
use crate::states::GameState;

/// Longest endpoint the text field accepts
const MAX_ENDPOINT_LEN: usize = 64;

pub struct MainMenuPlugin;

impl Plugin for MainMenuPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(OnEnter(GameState::MainMenu), spawn_main_menu);
        app.add_systems(OnExit(GameState::MainMenu), despawn_main_menu);
        app.add_systems(
            Update,
            (
                button_interactions,
                handle_endpoint_focus,
                handle_endpoint_keyboard_input,
                update_endpoint_display,
                handle_menu_actions,
            )
                .chain()
                .run_if(in_state(GameState::MainMenu)),
        );
    }
}

/// The "address:port" being edited
#[derive(Resource, Debug, Clone)]
struct EndpointInput {
    text: String,
}

#[derive(Component)]
struct MainMenuRoot;

#[derive(Component)]
struct EndpointField {
    focused: bool,
}

#[derive(Component)]
struct EndpointText;

#[derive(Component, Clone, Copy, Debug)]
enum MenuButton {
    SinglePlayer,
    Host,
    Join,
    Exit,
}

/// Split "address:port" or "[ipv6]:port"; a missing port means `default_port`.
///
/// A bare address containing ':' is rejected; IPv6 needs the brackets.
fn parse_endpoint(text: &str, default_port: u16) -> Option<(String, u16)> {
    let text = text.trim();
    let (address, port) = match text.strip_prefix('[') {
        Some(rest) => {
            let (address, tail) = rest.split_once(']')?;
            address.parse::<Ipv6Addr>().ok()?;
            let port = match tail {
                "" => default_port,
                _ => tail.strip_prefix(':')?.parse::<u16>().ok()?,
            };
            (address, port)
        }
        None => match text.split_once(':') {
            Some((address, port)) => (address, port.parse::<u16>().ok()?),
            None => (text, default_port),
        },
    };
    if address.is_empty() || port == 0 {
        return None;
    }
    Some((address.to_string(), port))
}

/// Inverse of [`parse_endpoint`]
fn format_endpoint(address: &str, port: u16) -> String {
    if address.contains(':') {
        format!("[{}]:{}", address, port)
    } else {
        format!("{}:{}", address, port)
    }
}

fn is_endpoint_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || matches!(ch, '.' | '-' | ':' | '[' | ']')
}

fn spawn_main_menu(mut commands: Commands, config: Option<Res<SessionConfig>>) {
    let config = config.map(|c| c.clone()).unwrap_or_default();
    let endpoint = format_endpoint(&config.server_address, config.port);
    commands.insert_resource(EndpointInput {
        text: endpoint.clone(),
    });

    commands
        .spawn((
            MainMenuRoot,
            Node {
                width: Val::Percent(100.0),
                height: Val::Percent(100.0),
                flex_direction: FlexDirection::Column,
                justify_content: JustifyContent::Center,
                align_items: AlignItems::Center,
                ..default()
            },
            BackgroundColor(MENU_BACKGROUND),
        ))
        .with_children(|parent| {
            parent.spawn((
                Text::new("MODE SWITCH"),
                title_text_style(),
                TextColor(ACCENT_COLOR),
                Node {
                    margin: UiRect::bottom(Val::Px(40.0)),
                    ..default()
                },
            ));

            spawn_button(parent, "SINGLE PLAYER", MenuButton::SinglePlayer);

            // Endpoint input section
            parent
                .spawn(Node {
                    flex_direction: FlexDirection::Column,
                    align_items: AlignItems::Center,
                    margin: UiRect::vertical(Val::Px(20.0)),
                    ..default()
                })
                .with_children(|section| {
                    section.spawn((
                        Text::new("SERVER ADDRESS"),
                        TextFont {
                            font_size: 14.0,
                            ..default()
                        },
                        TextColor(TEXT_MUTED),
                        Node {
                            margin: UiRect::bottom(Val::Px(8.0)),
                            ..default()
                        },
                    ));

                    section
                        .spawn((
                            EndpointField { focused: false },
                            Button,
                            Node {
                                width: Val::Px(280.0),
                                height: Val::Px(45.0),
                                justify_content: JustifyContent::Center,
                                align_items: AlignItems::Center,
                                border: UiRect::all(Val::Px(2.0)),
                                padding: UiRect::horizontal(Val::Px(12.0)),
                                ..default()
                            },
                            BackgroundColor(Color::srgb(0.08, 0.07, 0.06)),
                            BorderColor::from(BUTTON_BORDER),
                            BorderRadius::all(Val::Px(4.0)),
                        ))
                        .with_children(|input_box| {
                            input_box.spawn((
                                EndpointText,
                                Text::new(endpoint),
                                TextFont {
                                    font_size: 20.0,
                                    ..default()
                                },
                                TextColor(TEXT_COLOR),
                            ));
                        });

                    section.spawn((
                        Text::new("Host listens on the port, Join dials address:port"),
                        TextFont {
                            font_size: 12.0,
                            ..default()
                        },
                        TextColor(TEXT_MUTED),
                        Node {
                            margin: UiRect::top(Val::Px(6.0)),
                            ..default()
                        },
                    ));
                });

            spawn_button(parent, "HOST", MenuButton::Host);
            spawn_button(parent, "JOIN", MenuButton::Join);
            spawn_button(parent, "EXIT", MenuButton::Exit);
        });
}

fn spawn_button(
    parent: &mut bevy::ecs::hierarchy::ChildSpawnerCommands<'_>,
    text: &str,
    action: MenuButton,
) {
    let (background, border) = button_colors(Interaction::None);
    parent
        .spawn((
            Button,
            action,
            button_style(),
            background,
            border,
            BorderRadius::all(Val::Px(6.0)),
        ))
        .with_children(|btn| {
            btn.spawn((Text::new(text), button_text_style(), TextColor(TEXT_COLOR)));
        });
}

fn despawn_main_menu(mut commands: Commands, query: Query<Entity, With<MainMenuRoot>>) {
    for entity in query.iter() {
        commands.entity(entity).despawn();
    }
    commands.remove_resource::<EndpointInput>();
}

fn button_interactions(
    mut buttons: Query<
        (&Interaction, &mut BackgroundColor, &mut BorderColor),
        (Changed<Interaction>, With<MenuButton>),
    >,
) {
    for (interaction, mut bg_color, mut border_color) in buttons.iter_mut() {
        let (background, border) = button_colors(*interaction);
        *bg_color = background;
        *border_color = border;
    }
}

fn handle_endpoint_focus(
    mut fields: Query<(&Interaction, &mut EndpointField, &mut BorderColor)>,
    mouse_button: Res<ButtonInput<MouseButton>>,
) {
    let mut any_clicked = false;

    for (interaction, mut field, mut border) in fields.iter_mut() {
        if *interaction == Interaction::Pressed {
            field.focused = true;
            any_clicked = true;
            *border = BorderColor::from(ACCENT_COLOR);
        }
    }

    // Clicking anywhere else unfocuses
    if mouse_button.just_pressed(MouseButton::Left) && !any_clicked {
        for (_, mut field, mut border) in fields.iter_mut() {
            if field.focused {
                field.focused = false;
                *border = BorderColor::from(BUTTON_BORDER);
            }
        }
    }
}

fn handle_endpoint_keyboard_input(
    mut fields: Query<&mut EndpointField>,
    mut input: ResMut<EndpointInput>,
    mut keyboard_events: MessageReader<KeyboardInput>,
) {
    let Some(mut field) = fields.iter_mut().find(|f| f.focused) else {
        keyboard_events.clear();
        return;
    };

    for event in keyboard_events.read() {
        if event.state != ButtonState::Pressed {
            continue;
        }

        match &event.logical_key {
            Key::Backspace => {
                input.text.pop();
            }
            Key::Escape | Key::Enter => {
                field.focused = false;
            }
            Key::Character(c) => {
                let mut chars = c.chars();
                if let (Some(ch), None) = (chars.next(), chars.next()) {
                    if is_endpoint_char(ch) && input.text.len() < MAX_ENDPOINT_LEN {
                        input.text.push(ch);
                    }
                }
            }
            _ => {}
        }
    }
}

fn update_endpoint_display(
    input: Res<EndpointInput>,
    fields: Query<&EndpointField>,
    mut text_query: Query<&mut Text, With<EndpointText>>,
    time: Res<Time>,
    mut cursor_timer: Local<f32>,
) {
    let is_focused = fields.iter().any(|f| f.focused);

    *cursor_timer += time.delta_secs();
    let show_cursor = is_focused && (*cursor_timer % 1.0) < 0.5;

    for mut text in text_query.iter_mut() {
        let display = if input.text.is_empty() { "_" } else { input.text.as_str() };
        let cursor = if show_cursor { "|" } else { "" };
        **text = format!("{}{}", display, cursor);
    }
}

/// Persist the session choice, then flip the mode. A rejected mode change stays in the menu.
fn handle_menu_actions(
    buttons: Query<(&Interaction, &MenuButton), Changed<Interaction>>,
    input: Res<EndpointInput>,
    mut mode: ResMut<ModeState>,
    mut prefs: ResMut<Preferences>,
    mut config: ResMut<SessionConfig>,
    mut next_state: ResMut<NextState<GameState>>,
    mut exit_writer: MessageWriter<AppExit>,
) {
    for (interaction, action) in buttons.iter() {
        if *interaction != Interaction::Pressed {
            continue;
        }

        let selected = match action {
            MenuButton::Exit => {
                info!("Exit pressed - quitting");
                exit_writer.write(AppExit::Success);
                return;
            }
            MenuButton::SinglePlayer => mode.set_single_player(),
            MenuButton::Host | MenuButton::Join => {
                let Some((address, port)) = parse_endpoint(&input.text, config.port) else {
                    warn!("Invalid server address '{}'", input.text);
                    continue;
                };
                let role = match action {
                    MenuButton::Host => SessionRole::Host,
                    _ => SessionRole::Client,
                };
                *config = SessionConfig {
                    role,
                    server_address: address,
                    port,
                };
                config.write(&mut prefs);
                if let Err(err) = prefs.save(&prefs_path()) {
                    warn!("Could not save preferences: {}", err);
                }
                mode.set_multiplayer()
            }
        };

        match selected {
            Ok(()) => {
                info!("{:?} selected - loading game scene", action);
                next_state.set(GameState::InGame);
            }
            Err(err) => warn!("{}", err),
        }
        return;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_endpoint() {
        assert_eq!(
            parse_endpoint("192.168.1.20:7000", 7777),
            Some(("192.168.1.20".to_string(), 7000))
        );
        assert_eq!(
            parse_endpoint(" localhost ", 7777),
            Some(("localhost".to_string(), 7777))
        );
        assert_eq!(parse_endpoint("10.0.0.1:", 7777), None);
        assert_eq!(parse_endpoint(":7000", 7777), None);
        assert_eq!(parse_endpoint("10.0.0.1:0", 7777), None);
        assert_eq!(parse_endpoint("10.0.0.1:99999", 7777), None);
    }

    #[test]
    fn test_ipv6_needs_brackets() {
        assert_eq!(parse_endpoint("::1", 7777), None);
        assert_eq!(parse_endpoint("fe80::1:7000", 7777), None);
        assert_eq!(
            parse_endpoint("[::1]:7000", 7777),
            Some(("::1".to_string(), 7000))
        );
        assert_eq!(parse_endpoint("[::1]", 7777), Some(("::1".to_string(), 7777)));
        assert_eq!(parse_endpoint("[::1]7000", 7777), None);
        assert_eq!(parse_endpoint("[not-an-ip]:7000", 7777), None);
    }

    #[test]
    fn test_formatted_endpoint_parses_back() {
        for (address, port) in [("::1", 7000), ("192.168.1.20", 7777), ("localhost", 9100)] {
            let text = format_endpoint(address, port);
            assert_eq!(parse_endpoint(&text, 1), Some((address.to_string(), port)));
        }
    }

    #[test]
    fn test_endpoint_chars() {
        assert!(is_endpoint_char('a'));
        assert!(is_endpoint_char(':'));
        assert!(!is_endpoint_char(' '));
        assert!(!is_endpoint_char('/'));
    }
}
