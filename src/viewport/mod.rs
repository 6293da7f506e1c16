//! Viewport controller: fixed scale and a pan clamped to the map while dragging or resizing.
//!
//! Pan is the top-left offset of the map root in viewport pixels. The map
//! never shows an out-of-bounds gap: on an axis where the scaled map is larger
//! than the viewport the pan stays in `[viewport - map, 0]`; where it is not,
//! the only valid pan centers it.

use bevy::prelude::*;
use bevy::window::{PrimaryWindow, WindowResized};

use crate::config::FarmViewConfig;
use crate::interaction::DispatchSet;
use crate::map::LoadedMap;
use crate::shared::*;

// ═══════════════════════════════════════════════════════════════════════
// STATE
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum DragState {
    #[default]
    Idle,
    Dragging {
        /// Pointer position at the previous move, viewport pixels.
        last: Vec2,
    },
}

#[derive(Resource, Debug, Clone, PartialEq)]
pub struct ViewportState {
    pub scale: f32,
    pub pan: Vec2,
    /// Container size in viewport pixels.
    pub size: Vec2,
    /// Unscaled map size in map pixels.
    pub map_size: Vec2,
    pub drag: DragState,
}

impl Default for ViewportState {
    fn default() -> Self {
        Self {
            scale: DEFAULT_SCALE,
            pan: Vec2::ZERO,
            size: Vec2::new(SCREEN_WIDTH, SCREEN_HEIGHT),
            map_size: Vec2::ZERO,
            drag: DragState::Idle,
        }
    }
}

fn clamp_axis(value: f32, viewport: f32, map: f32) -> f32 {
    if map <= viewport {
        return (viewport - map) / 2.0;
    }
    let value = if value.is_finite() { value } else { 0.0 };
    value.clamp(viewport - map, 0.0)
}

/// Clamp a pan offset so the scaled map covers the viewport, or is centered
/// on any axis where it is smaller. Each axis is independent.
pub fn clamp_pan(pan: Vec2, viewport: Vec2, scaled_map: Vec2) -> Vec2 {
    Vec2::new(
        clamp_axis(pan.x, viewport.x, scaled_map.x),
        clamp_axis(pan.y, viewport.y, scaled_map.y),
    )
}

impl ViewportState {
    pub fn new(scale: f32, map_size: Vec2, size: Vec2) -> Self {
        Self {
            scale,
            map_size,
            size,
            ..default()
        }
    }

    pub fn scaled_map_size(&self) -> Vec2 {
        self.map_size * self.scale
    }

    pub fn clamp(&self, pan: Vec2) -> Vec2 {
        clamp_pan(pan, self.size, self.scaled_map_size())
    }

    /// Adopt a new container size. `recenter` centers the map on both axes;
    /// otherwise the existing pan is re-clamped for the new size.
    pub fn fit(&mut self, size: Vec2, recenter: bool) {
        self.size = size.max(Vec2::ZERO);
        let target = if recenter {
            (self.size - self.scaled_map_size()) / 2.0
        } else {
            self.pan
        };
        self.pan = self.clamp(target);
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.drag, DragState::Dragging { .. })
    }

    pub fn begin_drag(&mut self, pointer: Vec2) {
        self.drag = DragState::Dragging { last: pointer };
    }

    /// Move by the delta since the last pointer position. Returns whether the
    /// pan changed.
    pub fn drag_to(&mut self, pointer: Vec2) -> bool {
        let DragState::Dragging { last } = self.drag else {
            return false;
        };
        let before = self.pan;
        self.pan = self.clamp(self.pan + (pointer - last));
        self.drag = DragState::Dragging { last: pointer };
        self.pan != before
    }

    pub fn end_drag(&mut self) {
        self.drag = DragState::Idle;
    }

    /// Viewport pixels → map pixels.
    pub fn screen_to_map(&self, point: Vec2) -> Vec2 {
        (point - self.pan) / self.scale
    }

    /// Map pixels → viewport pixels.
    pub fn map_to_screen(&self, point: Vec2) -> Vec2 {
        point * self.scale + self.pan
    }

    /// Transform for the map root under a centered 2D camera: viewport pixel
    /// `(px, py)` sits at world `(px - w/2, h/2 - py)`.
    pub fn root_transform(&self) -> Transform {
        Transform::from_xyz(
            self.pan.x - self.size.x / 2.0,
            self.size.y / 2.0 - self.pan.y,
            0.0,
        )
        .with_scale(Vec3::new(self.scale, self.scale, 1.0))
    }
}

// ═══════════════════════════════════════════════════════════════════════
// PLUGIN
// ═══════════════════════════════════════════════════════════════════════

pub struct ViewportPlugin;

impl Plugin for ViewportPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<ViewportState>()
            .add_systems(
                OnEnter(ViewState::Ready),
                fit_on_mount.in_set(MountSet::FitViewport),
            )
            .add_systems(
                Update,
                (
                    fit_on_resize.run_if(resource_exists::<MapRootEntity>),
                    drive_viewport_drag.after(DispatchSet),
                    apply_viewport_transform,
                )
                    .chain()
                    .run_if(in_state(ViewState::Ready)),
            )
            .add_systems(OnEnter(ViewState::Unmounted), reset_drag);
    }
}

/// Current container size; keeps `fallback` when there is no window.
fn container_size(windows: &Query<&Window, With<PrimaryWindow>>, fallback: Vec2) -> Vec2 {
    windows
        .get_single()
        .map(|w| Vec2::new(w.width(), w.height()))
        .unwrap_or(fallback)
}

// ═══════════════════════════════════════════════════════════════════════
// SYSTEMS
// ═══════════════════════════════════════════════════════════════════════

/// Once the scene is built: adopt the map size and center it.
pub fn fit_on_mount(
    config: Res<FarmViewConfig>,
    map: Option<Res<LoadedMap>>,
    windows: Query<&Window, With<PrimaryWindow>>,
    mut viewport: ResMut<ViewportState>,
) {
    let Some(map) = map else {
        return;
    };
    viewport.scale = config.scale;
    viewport.map_size = map.pixel_size();
    viewport.drag = DragState::Idle;
    let size = container_size(&windows, viewport.size);
    viewport.fit(size, true);
    info!(
        "[Viewport] fitted {}x{} map into {}x{} at scale {}; pan {:?}",
        viewport.map_size.x, viewport.map_size.y, size.x, size.y, viewport.scale, viewport.pan
    );
}

/// Window resizes re-clamp the current pan rather than recentering.
pub fn fit_on_resize(
    mut resized: EventReader<WindowResized>,
    windows: Query<&Window, With<PrimaryWindow>>,
    mut viewport: ResMut<ViewportState>,
) {
    let Some(last) = resized.read().last() else {
        return;
    };
    let fallback = Vec2::new(last.width, last.height);
    let size = container_size(&windows, fallback);
    viewport.fit(size, false);
    debug!("[Viewport] resized to {}x{}; pan {:?}", size.x, size.y, viewport.pan);
}

/// Idle → Dragging on an unclaimed press, accumulate moves, back to Idle on
/// release wherever it happens.
pub fn drive_viewport_drag(
    pointer: Res<PointerInput>,
    claimed: Res<InteractionClaimed>,
    mut viewport: ResMut<ViewportState>,
) {
    if pointer.just_pressed {
        if claimed.0 {
            viewport.end_drag();
        } else if let Some(position) = pointer.position {
            viewport.begin_drag(position);
        }
    } else if viewport.is_dragging() {
        if let Some(position) = pointer.position {
            viewport.drag_to(position);
        }
    }

    if viewport.is_dragging() && (pointer.just_released || !pointer.held) {
        viewport.end_drag();
    }
}

pub fn apply_viewport_transform(
    viewport: Res<ViewportState>,
    mut roots: Query<&mut Transform, With<MapRoot>>,
) {
    let target = viewport.root_transform();
    for mut transform in roots.iter_mut() {
        if *transform != target {
            *transform = target;
        }
    }
}

fn reset_drag(mut viewport: ResMut<ViewportState>) {
    viewport.end_drag();
}
