//! Scene domain plugin: spawns the built scene graph under one map root.

use bevy::prelude::*;
use bevy::sprite::Anchor;

use crate::interaction::InteractionTable;
use crate::map::{LoadedMap, TileAtlas};
use crate::shared::*;

pub mod builder;

pub use builder::{
    build_scene, hit_area_node, object_sprite_node, NodeAnchor, NodeKind, SceneGraph, SceneNode,
};

pub struct ScenePlugin;

impl Plugin for ScenePlugin {
    fn build(&self, app: &mut App) {
        app.add_event::<SceneBuiltEvent>()
            .configure_sets(
                OnEnter(ViewState::Ready),
                (
                    MountSet::BuildScene,
                    MountSet::FitViewport,
                    MountSet::RequestGarden,
                )
                    .chain(),
            )
            .add_systems(
                OnEnter(ViewState::Ready),
                spawn_map_scene.in_set(MountSet::BuildScene),
            )
            .add_systems(OnEnter(ViewState::Unmounted), despawn_map_scene);
    }
}

// ═══════════════════════════════════════════════════════════════════════
// COMPONENTS
// ═══════════════════════════════════════════════════════════════════════

/// Every entity spawned from a scene node.
#[derive(Component, Debug, Clone, Copy)]
pub struct MapNode {
    pub kind: NodeKind,
    pub depth: f32,
}

/// z between two objects of equal depth, in spawn order. Small enough that
/// [`MAX_TIE_RANK`] steps stay under one pixel of depth.
pub const TIE_Z_STEP: f32 = 1.0e-4;
pub const MAX_TIE_RANK: u32 = 50;

/// z for a node: tiles stack by layer in the background band, everything else
/// by depth key above it. `tie_rank` counts earlier objects with the same depth.
pub fn node_z(node: &SceneNode, tie_rank: u32) -> f32 {
    match node.kind {
        NodeKind::Tile => TILE_Z_BASE + node.layer as f32 * TILE_LAYER_Z_STEP,
        _ => depth_to_z(node.depth) + tie_rank.min(MAX_TIE_RANK) as f32 * TIE_Z_STEP,
    }
}

/// Per-node tie ranks for nodes already in draw order: 0 for the first object
/// at a depth, 1 for the next, and so on. Tiles are always 0.
pub fn tie_ranks(ordered: &[&SceneNode]) -> Vec<u32> {
    let mut ranks = Vec::with_capacity(ordered.len());
    let mut previous: Option<f32> = None;
    let mut rank = 0;
    for node in ordered {
        if node.kind == NodeKind::Tile {
            ranks.push(0);
            continue;
        }
        rank = match previous {
            Some(depth) if depth == node.depth => rank + 1,
            _ => 0,
        };
        previous = Some(node.depth);
        ranks.push(rank);
    }
    ranks
}

/// Depth key → z inside the object band. Clamped so extreme keys stay
/// inside the camera's clip range and above the tiles.
pub fn depth_to_z(depth: f32) -> f32 {
    (OBJECT_Z_BASE + depth * DEPTH_Z_SCALE).clamp(OBJECT_Z_BASE / 2.0, 990.0)
}

/// Spawn one node as a child of the map root. Nodes without a texture
/// (hit areas) get a transform only.
pub fn spawn_node(parent: &mut ChildBuilder, node: &SceneNode, tie_rank: u32) -> Entity {
    let translation = Vec3::new(node.position.x, -node.position.y, node_z(node, tie_rank));
    let transform = Transform::from_translation(translation)
        .with_scale(Vec3::new(node.scale.x, node.scale.y, 1.0));
    let marker = MapNode {
        kind: node.kind,
        depth: node.depth,
    };

    let mut entity = match node.texture.as_ref() {
        Some(texture) => parent.spawn((
            Sprite {
                image: texture.image.clone(),
                rect: texture.rect,
                flip_x: node.flip_x,
                flip_y: node.flip_y,
                anchor: match node.anchor {
                    NodeAnchor::TopLeft => Anchor::TopLeft,
                    NodeAnchor::BottomCenter => Anchor::BottomCenter,
                },
                ..default()
            },
            transform,
            marker,
        )),
        None => parent.spawn((transform, Visibility::Hidden, marker)),
    };
    if let Some(region) = node.region.clone() {
        entity.insert(region);
    }
    entity.id()
}

// ═══════════════════════════════════════════════════════════════════════
// SYSTEMS
// ═══════════════════════════════════════════════════════════════════════

/// Build the scene graph and spawn it, tiles first, objects in depth order.
pub fn spawn_map_scene(
    mut commands: Commands,
    map: Option<Res<LoadedMap>>,
    atlas: Option<Res<TileAtlas>>,
    table: Res<InteractionTable>,
    mut built: EventWriter<SceneBuiltEvent>,
) {
    let (Some(map), Some(atlas)) = (map, atlas) else {
        warn!("[Scene] ready without a loaded map; nothing to build");
        return;
    };

    let graph = build_scene(&map, &atlas, &table);
    let ordered = graph.draw_order();
    let ranks = tie_ranks(&ordered);
    let root = commands
        .spawn((MapRoot, Transform::default(), Visibility::default()))
        .with_children(|parent| {
            for (node, rank) in ordered.iter().zip(ranks) {
                spawn_node(parent, node, rank);
            }
        })
        .id();

    let region_count = graph.regions().count();
    info!(
        "[Scene] spawned {} tiles, {} objects ({} interactive)",
        graph.tiles.len(),
        graph.objects.len(),
        region_count
    );
    commands.insert_resource(MapRootEntity(root));
    built.send(SceneBuiltEvent {
        root,
        node_count: graph.len(),
    });
}

fn despawn_map_scene(mut commands: Commands, root: Option<Res<MapRootEntity>>) {
    if let Some(root) = root {
        commands.entity(root.0).despawn_recursive();
        commands.remove_resource::<MapRootEntity>();
        info!("[Scene] map scene torn down");
    }
}
