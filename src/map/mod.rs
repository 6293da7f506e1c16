//! Map domain plugin.
//!
//! Responsible for:
//! - Loading the Tiled map document through the asset server
//! - Resolving every tileset into a GID → texture region atlas
//! - Waiting for tileset images and dropping the ones that failed
//! - Moving the view to `Ready` (or `Failed`) and releasing map data on unmount

use bevy::asset::LoadState;
use bevy::prelude::*;
use std::ops::Deref;

use crate::config::FarmViewConfig;
use crate::shared::*;

pub mod atlas;
pub mod document;

pub use atlas::{asset_server_path, normalize_asset_path, TextureRegion, TileAtlas};
pub use document::{
    parse_map_document, Gid, Layer, LoadError, MapDocument, MapDocumentLoader, MapObject,
    ObjectLayer, Property, SliceLayout, TileEntry, TileLayer, Tileset, MAX_SLICED_TILES,
};

// ═══════════════════════════════════════════════════════════════════════
// PLUGIN
// ═══════════════════════════════════════════════════════════════════════

pub struct MapPlugin;

impl Plugin for MapPlugin {
    fn build(&self, app: &mut App) {
        app.init_asset::<MapDocument>()
            .init_asset_loader::<MapDocumentLoader>()
            .add_event::<UnmountViewEvent>()
            .add_systems(Startup, request_map_document)
            .add_systems(
                Update,
                poll_map_document.run_if(in_state(ViewState::LoadingDocument)),
            )
            .add_systems(
                Update,
                poll_tileset_images.run_if(in_state(ViewState::LoadingImages)),
            )
            // Unmount can arrive in any state, including mid-load.
            .add_systems(Update, handle_unmount_request)
            .add_systems(OnEnter(ViewState::Unmounted), release_map_data);
    }
}

// ═══════════════════════════════════════════════════════════════════════
// RESOURCES
// ═══════════════════════════════════════════════════════════════════════

/// Handle to the document while it is loading.
#[derive(Resource, Debug, Clone)]
pub struct MapSource {
    pub handle: Handle<MapDocument>,
}

/// The parsed document, immutable for the rest of the session.
#[derive(Resource, Debug, Clone)]
pub struct LoadedMap(pub MapDocument);

impl Deref for LoadedMap {
    type Target = MapDocument;

    fn deref(&self) -> &MapDocument {
        &self.0
    }
}

// ═══════════════════════════════════════════════════════════════════════
// SYSTEMS
// ═══════════════════════════════════════════════════════════════════════

fn request_map_document(
    mut commands: Commands,
    asset_server: Res<AssetServer>,
    config: Res<FarmViewConfig>,
) {
    info!("[Map] loading {}", config.map_path);
    let handle: Handle<MapDocument> = asset_server.load(config.map_path.clone());
    commands.insert_resource(MapSource { handle });
}

/// Wait for the document; on success resolve the atlas and start image loads.
pub fn poll_map_document(
    mut commands: Commands,
    source: Option<Res<MapSource>>,
    asset_server: Res<AssetServer>,
    documents: Res<Assets<MapDocument>>,
    mut next_state: ResMut<NextState<ViewState>>,
) {
    let Some(source) = source else {
        return;
    };
    match asset_server.get_load_state(source.handle.id()) {
        Some(LoadState::Loaded) => {}
        Some(LoadState::Failed(err)) => {
            error!("[Map] map document failed to load: {}", err);
            next_state.set(ViewState::Failed);
            return;
        }
        _ => return,
    }
    let Some(doc) = documents.get(&source.handle) else {
        return;
    };

    let atlas = TileAtlas::resolve(doc, |path| asset_server.load(asset_server_path(path)));
    info!(
        "[Map] document ready: {}x{} tiles of {}x{}, {} layers, {} tilesets, {} images to load",
        doc.width,
        doc.height,
        doc.tile_width,
        doc.tile_height,
        doc.layers.len(),
        doc.tilesets.len(),
        atlas.images().len()
    );
    commands.insert_resource(LoadedMap(doc.clone()));
    commands.insert_resource(atlas);
    commands.remove_resource::<MapSource>();
    next_state.set(ViewState::LoadingImages);
}

/// Once every tileset image has settled, drop the failed ones and go `Ready`.
pub fn poll_tileset_images(
    asset_server: Res<AssetServer>,
    images: Res<Assets<Image>>,
    atlas: Option<ResMut<TileAtlas>>,
    mut next_state: ResMut<NextState<ViewState>>,
) {
    let Some(mut atlas) = atlas else {
        return;
    };

    let mut failed = Vec::new();
    for (path, handle) in atlas.images() {
        match asset_server.get_load_state(handle.id()) {
            Some(LoadState::Loaded) => {}
            Some(LoadState::Failed(err)) => {
                warn!("[Atlas] image {} failed to load: {}", path, err);
                failed.push(handle.clone());
            }
            None => {
                warn!("[Atlas] image {} is not tracked by the asset server", path);
                failed.push(handle.clone());
            }
            Some(_) => return,
        }
    }

    for handle in &failed {
        let dropped = atlas.forget_image(handle);
        debug!("[Atlas] {} GIDs left unresolved", dropped);
    }
    atlas.fill_sizes(|handle| images.get(handle).map(|image| image.size().as_vec2()));

    info!("[Atlas] {} tile regions resolved", atlas.len());
    next_state.set(ViewState::Ready);
}

fn handle_unmount_request(
    mut events: EventReader<UnmountViewEvent>,
    state: Res<State<ViewState>>,
    mut next_state: ResMut<NextState<ViewState>>,
) {
    if events.read().last().is_none() {
        return;
    }
    if *state.get() != ViewState::Unmounted {
        info!("[Map] unmount requested in {:?}", state.get());
        next_state.set(ViewState::Unmounted);
    }
}

fn release_map_data(mut commands: Commands) {
    commands.remove_resource::<MapSource>();
    commands.remove_resource::<LoadedMap>();
    commands.remove_resource::<TileAtlas>();
}
