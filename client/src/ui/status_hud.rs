//! In-game status overlay: mode, session and any fault banner.

use bevy::prelude::*;

use super::styles::*;
use crate::mode::ModeState;
use crate::scene::{ConnectionFailure, SceneFault};
use crate::session::{NetworkSession, SessionRole};
use crate::states::GameState;

pub struct StatusHudPlugin;

impl Plugin for StatusHudPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(OnEnter(GameState::InGame), spawn_status_hud);
        app.add_systems(OnExit(GameState::InGame), despawn_status_hud);
        app.add_systems(
            Update,
            (update_status_text, update_banner).run_if(in_state(GameState::InGame)),
        );
    }
}

#[derive(Component)]
struct StatusHudRoot;

#[derive(Component)]
struct StatusText;

#[derive(Component)]
struct BannerText;

/// One line per fact, top-left
fn status_lines(mode: &ModeState, session: &NetworkSession) -> String {
    let mut lines = vec![format!("Mode: {}", mode.current().label())];

    match session.role() {
        Some(role) => {
            let role = match role {
                SessionRole::Host => "host",
                SessionRole::Client => "client",
            };
            lines.push(format!(
                "Session: {} @ {}",
                role,
                session.endpoint().unwrap_or("-")
            ));
            if let Some(id) = session.local_client_id() {
                lines.push(format!("Local id: {}", id));
            }
            lines.push(format!("Connected: {}", session.connected_count()));
        }
        None => lines.push("Session: offline".to_string()),
    }

    lines.push("F5 single player | F6 multiplayer | Esc menu".to_string());
    lines.join("\n")
}

fn banner_line(fault: Option<&SceneFault>, failure: Option<&ConnectionFailure>) -> String {
    match (fault, failure) {
        (Some(fault), _) => format!("Scene setup failed: {} (Esc for menu)", fault.0),
        (None, Some(failure)) => format!("Connection failed: {} (R to retry, Esc for menu)", failure.0),
        (None, None) => String::new(),
    }
}

fn spawn_status_hud(mut commands: Commands) {
    commands
        .spawn((
            StatusHudRoot,
            Node {
                position_type: PositionType::Absolute,
                left: Val::Px(12.0),
                top: Val::Px(12.0),
                flex_direction: FlexDirection::Column,
                row_gap: Val::Px(8.0),
                ..default()
            },
        ))
        .with_children(|hud| {
            hud.spawn((StatusText, Text::new(""), hud_text_style(), TextColor(TEXT_COLOR)));
            hud.spawn((BannerText, Text::new(""), hud_text_style(), TextColor(WARNING_COLOR)));
        });
}

fn despawn_status_hud(mut commands: Commands, roots: Query<Entity, With<StatusHudRoot>>) {
    for entity in roots.iter() {
        commands.entity(entity).despawn();
    }
}

fn update_status_text(
    mode: Res<ModeState>,
    session: Res<NetworkSession>,
    mut texts: Query<&mut Text, With<StatusText>>,
) {
    if !mode.is_changed() && !session.is_changed() {
        return;
    }
    let status = status_lines(&mode, &session);
    for mut text in texts.iter_mut() {
        **text = status.clone();
    }
}

fn update_banner(
    fault: Option<Res<SceneFault>>,
    failure: Option<Res<ConnectionFailure>>,
    mut texts: Query<&mut Text, With<BannerText>>,
) {
    let banner = banner_line(fault.as_deref(), failure.as_deref());
    for mut text in texts.iter_mut() {
        if **text != banner {
            **text = banner.clone();
        }
    }
}
