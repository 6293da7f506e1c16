use bevy::prelude::*;
use bevy::window::{PresentMode, WindowResolution};

use moodfarm::shared::*;
use moodfarm::{config, garden, input, interaction, map, overlay, scene, viewport};

fn main() {
    App::new()
        .add_plugins(
            DefaultPlugins
                .set(WindowPlugin {
                    primary_window: Some(Window {
                        title: "Mood Valley".into(),
                        resolution: WindowResolution::new(SCREEN_WIDTH, SCREEN_HEIGHT),
                        present_mode: PresentMode::AutoVsync,
                        resizable: true,
                        ..default()
                    }),
                    ..default()
                })
                .set(ImagePlugin::default_nearest()),
        )
        // Config before the domain plugins: they read it while building.
        .add_plugins(config::ConfigPlugin::default())
        // View state
        .init_state::<ViewState>()
        // Shared resources
        .init_resource::<PointerInput>()
        .init_resource::<InteractionClaimed>()
        .init_resource::<OverlayState>()
        // Events
        .add_event::<OpenChatEvent>()
        .add_event::<OpenMailboxEvent>()
        .add_event::<CloseOverlayEvent>()
        .add_event::<UnmountViewEvent>()
        .add_event::<SceneBuiltEvent>()
        // Domain plugins
        .add_plugins(input::InputPlugin)
        .add_plugins(map::MapPlugin)
        .add_plugins(scene::ScenePlugin)
        .add_plugins(viewport::ViewportPlugin)
        .add_plugins(interaction::InteractionPlugin)
        .add_plugins(garden::GardenPlugin)
        .add_plugins(overlay::OverlayPlugin)
        // Camera
        .add_systems(Startup, setup_camera)
        .run();
}

fn setup_camera(mut commands: Commands) {
    commands.spawn(Camera2d);
}
