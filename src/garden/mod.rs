//! Garden domain plugin.
//!
//! Responsible for:
//! - Reading the flower slots and the flower tile GIDs from the loaded map
//! - Asking the garden-state collaborator which slots are planted (off-thread)
//! - Spawning one flower per planted slot under the map root
//!
//! Every failure here is non-fatal: the map stays usable without flowers.

use bevy::prelude::*;
use bevy::tasks::{block_on, futures_lite::future, IoTaskPool, Task};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;

use crate::config::FarmViewConfig;
use crate::map::{LoadedMap, TileAtlas};
use crate::scene::{spawn_node, MapNode, NodeKind};
use crate::shared::*;

pub mod client;
pub mod slots;

pub use client::{
    parse_garden_state, GardenStateError, GardenStateRequest, GardenStateResponse,
    GardenStateSource, HttpGardenState,
};
pub use slots::{flower_gids, flower_slots, plan_flowers, FlowerSlot};

pub struct GardenPlugin;

impl Plugin for GardenPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<GardenStateClient>()
            .init_resource::<FlowerRng>()
            .add_systems(
                OnEnter(ViewState::Ready),
                request_garden_state.in_set(MountSet::RequestGarden),
            )
            .add_systems(
                Update,
                poll_garden_state.run_if(in_state(ViewState::Ready)),
            )
            .add_systems(OnEnter(ViewState::Unmounted), drop_pending_garden_state);
    }
}

// ═══════════════════════════════════════════════════════════════════════
// RESOURCES
// ═══════════════════════════════════════════════════════════════════════

/// The collaborator garden state is fetched from. Defaults to HTTP against
/// the configured API base; tests insert their own before adding the plugin.
#[derive(Resource, Clone)]
pub struct GardenStateClient(pub Arc<dyn GardenStateSource>);

impl GardenStateClient {
    pub fn new(source: impl GardenStateSource) -> Self {
        Self(Arc::new(source))
    }
}

impl FromWorld for GardenStateClient {
    fn from_world(world: &mut World) -> Self {
        let url = world
            .get_resource::<FarmViewConfig>()
            .cloned()
            .unwrap_or_default()
            .garden_state_url();
        Self::new(HttpGardenState::new(url))
    }
}

/// Random source for flower choice and size jitter.
#[derive(Resource)]
pub struct FlowerRng(pub StdRng);

impl Default for FlowerRng {
    fn default() -> Self {
        Self(StdRng::from_entropy())
    }
}

/// The in-flight request plus what it needs once it answers. Dropping it
/// cancels the task.
#[derive(Resource)]
pub struct PendingGardenState {
    task: Task<Result<Vec<i64>, GardenStateError>>,
    slots: Vec<FlowerSlot>,
    gids: Vec<u32>,
}

// ═══════════════════════════════════════════════════════════════════════
// SYSTEMS
// ═══════════════════════════════════════════════════════════════════════

pub fn request_garden_state(
    mut commands: Commands,
    map: Option<Res<LoadedMap>>,
    atlas: Option<Res<TileAtlas>>,
    client: Res<GardenStateClient>,
) {
    let (Some(map), Some(atlas)) = (map, atlas) else {
        return;
    };
    let slots = flower_slots(&map);
    if slots.is_empty() {
        debug!("[Garden] no {} layer; skipping garden", FLOWER_SLOT_LAYER);
        return;
    }
    let gids = flower_gids(&map, &atlas);
    if gids.is_empty() {
        debug!("[Garden] no resolved {} tiles; skipping garden", FLOWER_TILESET);
        return;
    }

    let source = client.0.clone();
    let slot_count = slots.len();
    let task = IoTaskPool::get().spawn(async move { source.fetch(slot_count) });
    info!("[Garden] requesting state for {} slots", slot_count);
    commands.insert_resource(PendingGardenState { task, slots, gids });
}

pub fn poll_garden_state(
    mut commands: Commands,
    pending: Option<ResMut<PendingGardenState>>,
    root: Option<Res<MapRootEntity>>,
    atlas: Option<Res<TileAtlas>>,
    config: Res<FarmViewConfig>,
    mut rng: ResMut<FlowerRng>,
    placed: Query<&MapNode>,
) {
    let Some(mut pending) = pending else {
        return;
    };
    let Some(result) = block_on(future::poll_once(&mut pending.task)) else {
        return;
    };
    commands.remove_resource::<PendingGardenState>();

    let occupied = match result {
        Ok(occupied) => occupied,
        Err(e) => {
            warn!("[Garden] {}; showing no flowers", e);
            return;
        }
    };
    let (Some(root), Some(atlas)) = (root, atlas) else {
        return;
    };

    let flowers = plan_flowers(
        &pending.slots,
        &occupied,
        &pending.gids,
        &atlas,
        &config,
        &mut rng.0,
    );
    // Flowers go above anything already drawn at the same depth.
    let mut taken: Vec<f32> = placed
        .iter()
        .filter(|n| n.kind != NodeKind::Tile)
        .map(|n| n.depth)
        .collect();
    commands.entity(root.0).with_children(|parent| {
        for flower in &flowers {
            let rank = taken.iter().filter(|&&depth| depth == flower.depth).count() as u32;
            taken.push(flower.depth);
            spawn_node(parent, flower, rank);
        }
    });
    info!(
        "[Garden] planted {} of {} slots",
        flowers.len(),
        pending.slots.len()
    );
}

fn drop_pending_garden_state(mut commands: Commands) {
    commands.remove_resource::<PendingGardenState>();
}
