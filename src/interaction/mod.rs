//! Interaction Dispatcher: taps on tagged regions become application events.
//!
//! Which layers produce regions is data: [`InteractionTable`] maps Tiled layer
//! names to behaviors, so a new interactive layer is a table entry rather than
//! new code. At dispatch time the topmost region under the pointer claims the
//! press before the viewport gets to see it, and the tap fires on release if
//! the pointer is still inside the same region.

use bevy::prelude::*;
use std::collections::HashMap;

use crate::shared::*;
use crate::viewport::ViewportState;

// ═══════════════════════════════════════════════════════════════════════
// DISPATCH TABLE
// ═══════════════════════════════════════════════════════════════════════

/// What a named object layer contributes besides plain sprites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LayerBehavior {
    /// Objects without a GID become invisible hit areas with this tag.
    pub hit_area: Option<RegionTag>,
    /// Tile objects get a region over their drawn bounds with this tag.
    pub sprite: Option<RegionTag>,
}

/// Layer name → behavior.
#[derive(Resource, Debug, Clone)]
pub struct InteractionTable {
    layers: HashMap<String, LayerBehavior>,
}

impl Default for InteractionTable {
    fn default() -> Self {
        Self {
            layers: HashMap::new(),
        }
        .with_sprite_region("scarecrow", RegionTag::Scarecrow)
        .with_sprite_region("speaker", RegionTag::Scarecrow)
        .with_hit_area("cat", RegionTag::Cat)
        .with_hit_area("dog", RegionTag::Dog)
        .with_hit_area("mailbox-area", RegionTag::Mailbox)
        .with_sprite_region("mailbox-area", RegionTag::Mailbox)
    }
}

impl InteractionTable {
    pub fn empty() -> Self {
        Self {
            layers: HashMap::new(),
        }
    }

    pub fn with_hit_area(mut self, layer: impl Into<String>, tag: RegionTag) -> Self {
        self.layers.entry(layer.into()).or_default().hit_area = Some(tag);
        self
    }

    pub fn with_sprite_region(mut self, layer: impl Into<String>, tag: RegionTag) -> Self {
        self.layers.entry(layer.into()).or_default().sprite = Some(tag);
        self
    }

    /// Unlisted layers have no interactive behavior.
    pub fn behavior(&self, layer: &str) -> LayerBehavior {
        self.layers.get(layer).copied().unwrap_or_default()
    }
}

/// What a tap on a region asks the surrounding application to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TapAction {
    OpenChat(Character),
    OpenMailbox,
}

pub fn route_tap(tag: RegionTag) -> TapAction {
    match tag {
        RegionTag::Scarecrow => TapAction::OpenChat(Character::Scarecrow),
        RegionTag::Cat => TapAction::OpenChat(Character::Cat),
        RegionTag::Dog => TapAction::OpenChat(Character::Dog),
        RegionTag::Mailbox => TapAction::OpenMailbox,
    }
}

/// Topmost region containing `map_point`: greatest depth, later entity on ties.
pub fn topmost_region<'a>(
    regions: impl IntoIterator<Item = (Entity, &'a InteractiveRegion)>,
    map_point: Vec2,
) -> Option<(Entity, &'a InteractiveRegion)> {
    let mut best: Option<(Entity, &InteractiveRegion)> = None;
    for (entity, region) in regions {
        if !region.contains(map_point) {
            continue;
        }
        match best {
            Some((_, current)) if current.depth > region.depth => {}
            _ => best = Some((entity, region)),
        }
    }
    best
}

// ═══════════════════════════════════════════════════════════════════════
// RESOURCES
// ═══════════════════════════════════════════════════════════════════════

/// The region that claimed the current press, until release.
#[derive(Resource, Debug, Clone, Default)]
pub struct PressedRegion(pub Option<Entity>);

// ═══════════════════════════════════════════════════════════════════════
// PLUGIN
// ═══════════════════════════════════════════════════════════════════════

#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub struct DispatchSet;

pub struct InteractionPlugin;

impl Plugin for InteractionPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<InteractionTable>()
            .init_resource::<PressedRegion>()
            .add_event::<OpenChatEvent>()
            .add_event::<OpenMailboxEvent>()
            .add_systems(
                Update,
                dispatch_region_taps
                    .in_set(DispatchSet)
                    .run_if(in_state(ViewState::Ready)),
            )
            .add_systems(OnExit(ViewState::Ready), clear_pressed_region);
    }
}

// ═══════════════════════════════════════════════════════════════════════
// SYSTEMS
// ═══════════════════════════════════════════════════════════════════════

/// Claims presses that land on a region and fires the tap on release.
pub fn dispatch_region_taps(
    pointer: Res<PointerInput>,
    viewport: Res<ViewportState>,
    regions: Query<(Entity, &InteractiveRegion)>,
    mut pressed: ResMut<PressedRegion>,
    mut claimed: ResMut<InteractionClaimed>,
    mut chat_events: EventWriter<OpenChatEvent>,
    mut mailbox_events: EventWriter<OpenMailboxEvent>,
) {
    let map_point = pointer.position.map(|p| viewport.screen_to_map(p));

    if pointer.just_pressed {
        pressed.0 = None;
        if let Some(point) = map_point {
            if let Some((entity, region)) = topmost_region(regions.iter(), point) {
                debug!("[Interaction] press claimed by {:?} region", region.tag);
                pressed.0 = Some(entity);
                claimed.0 = true;
            }
        }
    } else if pressed.0.is_some() {
        // Still our press; keep the viewport off it until release.
        claimed.0 = true;
    }

    if !pointer.just_released && pointer.held {
        return;
    }
    let Some(entity) = pressed.0.take() else {
        return;
    };
    if !pointer.just_released {
        // Press vanished without a release event (focus loss); no tap.
        return;
    }
    let Ok((_, region)) = regions.get(entity) else {
        return;
    };
    let still_inside = map_point.is_some_and(|p| region.contains(p));
    if !still_inside {
        return;
    }

    match route_tap(region.tag) {
        TapAction::OpenChat(character) => {
            info!("[Interaction] open chat with {}", character.id());
            chat_events.send(OpenChatEvent { character });
        }
        TapAction::OpenMailbox => {
            info!("[Interaction] open mailbox");
            mailbox_events.send(OpenMailboxEvent);
        }
    }
}

fn clear_pressed_region(mut pressed: ResMut<PressedRegion>) {
    pressed.0 = None;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(tag: RegionTag, min: Vec2, size: Vec2, depth: f32) -> InteractiveRegion {
        InteractiveRegion {
            tag,
            bounds: Rect::from_corners(min, min + size),
            depth,
        }
    }

    #[test]
    fn test_default_table_layers() {
        let table = InteractionTable::default();
        assert_eq!(table.behavior("cat").hit_area, Some(RegionTag::Cat));
        assert_eq!(table.behavior("dog").hit_area, Some(RegionTag::Dog));
        assert_eq!(table.behavior("mailbox-area").hit_area, Some(RegionTag::Mailbox));
        assert_eq!(table.behavior("mailbox-area").sprite, Some(RegionTag::Mailbox));
        assert_eq!(table.behavior("scarecrow").sprite, Some(RegionTag::Scarecrow));
        assert_eq!(table.behavior("speaker").sprite, Some(RegionTag::Scarecrow));
        assert_eq!(table.behavior("scarecrow").hit_area, None);
        assert_eq!(table.behavior("trees"), LayerBehavior::default());
    }

    #[test]
    fn test_table_opt_in_layer() {
        let table = InteractionTable::empty().with_hit_area("well", RegionTag::Mailbox);
        assert_eq!(table.behavior("well").hit_area, Some(RegionTag::Mailbox));
        assert_eq!(table.behavior("cat"), LayerBehavior::default());
    }

    #[test]
    fn test_route_tap() {
        assert_eq!(route_tap(RegionTag::Scarecrow), TapAction::OpenChat(Character::Scarecrow));
        assert_eq!(route_tap(RegionTag::Cat), TapAction::OpenChat(Character::Cat));
        assert_eq!(route_tap(RegionTag::Dog), TapAction::OpenChat(Character::Dog));
        assert_eq!(route_tap(RegionTag::Mailbox), TapAction::OpenMailbox);
    }

    #[test]
    fn test_topmost_region_prefers_depth() {
        let low = region(RegionTag::Cat, Vec2::ZERO, Vec2::splat(100.0), 99.0);
        let high = region(RegionTag::Dog, Vec2::splat(50.0), Vec2::splat(100.0), 149.0);
        let a = Entity::from_raw(1);
        let b = Entity::from_raw(2);

        let hit = topmost_region([(a, &low), (b, &high)], Vec2::splat(75.0)).unwrap();
        assert_eq!(hit.1.tag, RegionTag::Dog);
        let hit = topmost_region([(b, &high), (a, &low)], Vec2::splat(75.0)).unwrap();
        assert_eq!(hit.1.tag, RegionTag::Dog);
        let hit = topmost_region([(a, &low), (b, &high)], Vec2::splat(10.0)).unwrap();
        assert_eq!(hit.0, a);
        assert!(topmost_region([(a, &low)], Vec2::splat(500.0)).is_none());
    }
}
