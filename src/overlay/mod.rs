//! Overlay domain plugin: which panel covers the map, plus the load-failure
//! banner. Panel contents belong to the host application; only the header
//! is drawn here.

use bevy::prelude::*;

use crate::map::asset_server_path;
use crate::shared::*;

pub struct OverlayPlugin;

impl Plugin for OverlayPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<OverlayState>()
            .add_event::<OpenChatEvent>()
            .add_event::<OpenMailboxEvent>()
            .add_event::<CloseOverlayEvent>()
            .add_systems(
                Update,
                (apply_overlay_requests, sync_overlay_panel.run_if(resource_changed::<OverlayState>))
                    .chain(),
            )
            .add_systems(OnEnter(ViewState::Failed), spawn_failure_banner)
            .add_systems(OnEnter(ViewState::Unmounted), tear_down_overlay);
    }
}

// ═══════════════════════════════════════════════════════════════════════
// COMPONENTS
// ═══════════════════════════════════════════════════════════════════════

#[derive(Component)]
pub struct OverlayPanel;

#[derive(Component)]
pub struct FailureBanner;

/// One change to the overlay, in arrival order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayRequest {
    Chat(Character),
    Mailbox,
    Close,
}

/// Apply a request. Opening one panel replaces the other.
pub fn apply_request(state: &mut OverlayState, request: OverlayRequest) {
    match request {
        OverlayRequest::Chat(character) => {
            state.chat = Some(character);
            state.mailbox_open = false;
        }
        OverlayRequest::Mailbox => {
            state.chat = None;
            state.mailbox_open = true;
        }
        OverlayRequest::Close => *state = OverlayState::default(),
    }
}

// ═══════════════════════════════════════════════════════════════════════
// SYSTEMS
// ═══════════════════════════════════════════════════════════════════════

fn apply_overlay_requests(
    mut chat_events: EventReader<OpenChatEvent>,
    mut mailbox_events: EventReader<OpenMailboxEvent>,
    mut close_events: EventReader<CloseOverlayEvent>,
    keys: Option<Res<ButtonInput<KeyCode>>>,
    mut overlay: ResMut<OverlayState>,
) {
    let mut requests: Vec<OverlayRequest> = chat_events
        .read()
        .map(|e| OverlayRequest::Chat(e.character))
        .collect();
    requests.extend(mailbox_events.read().map(|_| OverlayRequest::Mailbox));

    let escape = keys.is_some_and(|k| k.just_pressed(KeyCode::Escape));
    if close_events.read().count() > 0 || (escape && overlay.is_open()) {
        requests.push(OverlayRequest::Close);
    }
    if requests.is_empty() {
        return;
    }

    let mut next = overlay.clone();
    for request in requests {
        apply_request(&mut next, request);
    }
    if next != *overlay {
        match (&next.chat, next.mailbox_open) {
            (Some(character), _) => info!("[Overlay] chat with {}", character.id()),
            (None, true) => info!("[Overlay] mailbox"),
            (None, false) => info!("[Overlay] closed"),
        }
        *overlay = next;
    }
}

fn sync_overlay_panel(
    mut commands: Commands,
    overlay: Res<OverlayState>,
    asset_server: Res<AssetServer>,
    panels: Query<Entity, With<OverlayPanel>>,
) {
    for entity in &panels {
        commands.entity(entity).despawn_recursive();
    }
    if !overlay.is_open() {
        return;
    }

    let (title, portrait) = match overlay.chat {
        Some(character) => (
            character.display_name().to_string(),
            Some(asset_server.load(asset_server_path(character.portrait_path()))),
        ),
        None => ("信箱".to_string(), None),
    };

    commands
        .spawn((
            OverlayPanel,
            Node {
                position_type: PositionType::Absolute,
                bottom: Val::Px(24.0),
                left: Val::Px(24.0),
                right: Val::Px(24.0),
                height: Val::Px(120.0),
                padding: UiRect::all(Val::Px(12.0)),
                column_gap: Val::Px(12.0),
                align_items: AlignItems::Center,
                border: UiRect::all(Val::Px(2.0)),
                ..default()
            },
            BackgroundColor(Color::srgba(0.08, 0.06, 0.04, 0.85)),
            BorderColor(Color::srgb(0.6, 0.5, 0.3)),
        ))
        .with_children(|parent| {
            if let Some(image) = portrait {
                parent.spawn((
                    ImageNode::new(image),
                    Node {
                        width: Val::Px(96.0),
                        height: Val::Px(96.0),
                        ..default()
                    },
                ));
            }
            parent.spawn((
                Text::new(title),
                TextFont {
                    font_size: 22.0,
                    ..default()
                },
                TextColor(Color::srgb(1.0, 0.95, 0.8)),
            ));
        });
}

fn spawn_failure_banner(mut commands: Commands) {
    commands
        .spawn((
            FailureBanner,
            Node {
                position_type: PositionType::Absolute,
                top: Val::Px(60.0),
                left: Val::Percent(50.0),
                width: Val::Px(320.0),
                margin: UiRect {
                    left: Val::Px(-160.0),
                    ..default()
                },
                padding: UiRect::axes(Val::Px(12.0), Val::Px(5.0)),
                justify_content: JustifyContent::Center,
                ..default()
            },
            BackgroundColor(Color::srgba(0.0, 0.0, 0.0, 0.75)),
        ))
        .with_children(|parent| {
            parent.spawn((
                Text::new("Failed to load the farm map"),
                TextFont {
                    font_size: 14.0,
                    ..default()
                },
                TextColor(Color::srgb(1.0, 0.6, 0.6)),
            ));
        });
}

fn tear_down_overlay(
    mut commands: Commands,
    mut overlay: ResMut<OverlayState>,
    nodes: Query<Entity, Or<(With<OverlayPanel>, With<FailureBanner>)>>,
) {
    for entity in &nodes {
        commands.entity(entity).despawn_recursive();
    }
    *overlay = OverlayState::default();
}
