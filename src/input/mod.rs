use bevy::input::touch::Touch;
use bevy::prelude::*;
use bevy::window::PrimaryWindow;

use crate::shared::*;

pub struct InputPlugin;

impl Plugin for InputPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<InputContext>()
            .init_resource::<PointerInput>()
            .init_resource::<InteractionClaimed>()
            .add_systems(
                PreUpdate,
                (manage_input_context, reset_and_read_pointer).chain(),
            );
    }
}

/// Who the pointer currently belongs to.
#[derive(Resource, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputContext {
    /// Loading, failed, torn down, or a panel is covering the map.
    #[default]
    Disabled,
    Map,
}

/// Derives InputContext from the view state and the overlay. ONE system,
/// so no map system needs its own "is a panel open" guard.
fn manage_input_context(
    view_state: Res<State<ViewState>>,
    overlay: Res<OverlayState>,
    mut context: ResMut<InputContext>,
) {
    *context = match view_state.get() {
        ViewState::Ready if !overlay.is_open() => InputContext::Map,
        _ => InputContext::Disabled,
    };
}

/// The single point where mouse and touch hardware become a pointer snapshot.
fn reset_and_read_pointer(
    mouse: Res<ButtonInput<MouseButton>>,
    touches: Res<Touches>,
    windows: Query<&Window, With<PrimaryWindow>>,
    context: Res<InputContext>,
    mut pointer: ResMut<PointerInput>,
    mut interaction_claimed: ResMut<InteractionClaimed>,
) {
    *pointer = PointerInput::default();
    interaction_claimed.0 = false;

    if *context == InputContext::Disabled {
        return;
    }

    // A finger on the screen wins over the mouse.
    if let Some(touch) = primary_touch(&touches) {
        *pointer = PointerInput {
            position: Some(touch.position()),
            just_pressed: touches.just_pressed(touch.id()),
            just_released: touches.just_released(touch.id()),
            held: touches.get_pressed(touch.id()).is_some(),
        };
        return;
    }

    *pointer = PointerInput {
        position: windows.get_single().ok().and_then(Window::cursor_position),
        just_pressed: mouse.just_pressed(MouseButton::Left),
        just_released: mouse.just_released(MouseButton::Left),
        held: mouse.pressed(MouseButton::Left),
    };
}

fn primary_touch(touches: &Touches) -> Option<&Touch> {
    touches
        .iter_just_pressed()
        .next()
        .or_else(|| touches.iter().next())
        .or_else(|| touches.iter_just_released().next())
}
