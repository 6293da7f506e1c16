//! GID → texture region lookup across every tileset of a map.
//!
//! The atlas only computes paths and registers regions. Actual image loading
//! (and deduplication by path) belongs to whatever `load` callback it is
//! handed, which in the running app is the asset server.

use bevy::prelude::*;
use std::collections::HashMap;

use super::document::{MapDocument, Tileset};

/// Where to find one tile's pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureRegion {
    pub image: Handle<Image>,
    /// Sub-rectangle of `image`; `None` means the whole image.
    pub rect: Option<Rect>,
    /// Natural size in pixels, when known.
    pub size: Option<Vec2>,
}

/// Resolved tile regions, written once while loading and read-only after.
#[derive(Resource, Debug, Clone, Default)]
pub struct TileAtlas {
    regions: HashMap<u32, TextureRegion>,
    /// Every distinct image the atlas asked for, in request order.
    images: Vec<(String, Handle<Image>)>,
}

/// Normalise a tileset image path as stored by Tiled.
///
/// Back-slashes become forward slashes, leading `../` and `./` segments are
/// dropped and the result is rooted at `/`.
pub fn normalize_asset_path(raw: &str) -> String {
    let fixed = raw.trim().replace('\\', "/");
    let mut rest = fixed.as_str();
    loop {
        if let Some(stripped) = rest.strip_prefix("../") {
            rest = stripped;
        } else if let Some(stripped) = rest.strip_prefix("./") {
            rest = stripped;
        } else if let Some(stripped) = rest.strip_prefix('/') {
            rest = stripped;
        } else {
            break;
        }
    }
    if rest.is_empty() {
        return String::new();
    }
    format!("/{rest}")
}

/// Asset-server path for a normalised path (asset paths are relative to the
/// asset root, so the leading slash goes).
pub fn asset_server_path(normalized: &str) -> String {
    normalized.trim_start_matches('/').to_string()
}

impl TileAtlas {
    /// Register every tile of every tileset in document order.
    ///
    /// `load` is called at most once per distinct normalised path.
    pub fn resolve(doc: &MapDocument, mut load: impl FnMut(&str) -> Handle<Image>) -> Self {
        let mut atlas = TileAtlas::default();
        let mut requested: HashMap<String, Handle<Image>> = HashMap::new();
        let mut fetch = |raw: &str, atlas: &mut TileAtlas| -> Option<Handle<Image>> {
            let path = normalize_asset_path(raw);
            if path.is_empty() {
                return None;
            }
            if let Some(handle) = requested.get(&path) {
                return Some(handle.clone());
            }
            let handle = load(&path);
            requested.insert(path.clone(), handle.clone());
            atlas.images.push((path, handle.clone()));
            Some(handle)
        };

        for tileset in &doc.tilesets {
            if let Some(image) = tileset.image.as_deref() {
                if let Some(handle) = fetch(image, &mut atlas) {
                    atlas.register_sliced(doc, tileset, handle);
                }
            }
            for tile in &tileset.tiles {
                let Some(image) = tile.image.as_deref() else {
                    continue;
                };
                let Some(handle) = fetch(image, &mut atlas) else {
                    continue;
                };
                let Some(gid) = tileset.first_gid.checked_add(tile.id) else {
                    warn!("[Atlas] tile {} of '{}' overflows the GID range", tile.id, tileset.name);
                    continue;
                };
                let size = match (tile.image_width, tile.image_height) {
                    (Some(w), Some(h)) if w > 0 && h > 0 => Some(Vec2::new(w as f32, h as f32)),
                    _ => None,
                };
                atlas.regions.insert(
                    gid,
                    TextureRegion {
                        image: handle,
                        rect: None,
                        size,
                    },
                );
            }
        }

        debug!(
            "[Atlas] {} regions from {} images",
            atlas.regions.len(),
            atlas.images.len()
        );
        atlas
    }

    fn register_sliced(&mut self, doc: &MapDocument, tileset: &Tileset, image: Handle<Image>) {
        let layout = tileset.slice_layout(doc.tile_width, doc.tile_height);
        let size = Vec2::new(layout.tile_width as f32, layout.tile_height as f32);

        for local_id in 0..layout.tile_count {
            let Some(gid) = tileset.first_gid.checked_add(local_id) else {
                warn!("[Atlas] '{}' runs past the GID range at tile {}", tileset.name, local_id);
                break;
            };
            let column = (local_id % layout.columns) as f32;
            let row = (local_id / layout.columns) as f32;
            let min = Vec2::new(column, row) * size;
            self.regions.insert(
                gid,
                TextureRegion {
                    image: image.clone(),
                    rect: Some(Rect::from_corners(min, min + size)),
                    size: Some(size),
                },
            );
        }
    }

    pub fn get(&self, gid: u32) -> Option<&TextureRegion> {
        if gid == 0 {
            return None;
        }
        self.regions.get(&gid)
    }

    pub fn contains(&self, gid: u32) -> bool {
        self.get(gid).is_some()
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Distinct images requested while resolving, with their normalised paths.
    pub fn images(&self) -> &[(String, Handle<Image>)] {
        &self.images
    }

    /// Drop every region backed by `image`; returns how many GIDs went.
    pub fn forget_image(&mut self, image: &Handle<Image>) -> usize {
        let before = self.regions.len();
        self.regions.retain(|_, region| region.image.id() != image.id());
        self.images.retain(|(_, handle)| handle.id() != image.id());
        before - self.regions.len()
    }

    /// Fill natural sizes the document left out, once images are available.
    pub fn fill_sizes(&mut self, mut size_of: impl FnMut(&Handle<Image>) -> Option<Vec2>) {
        for region in self.regions.values_mut() {
            if region.size.is_none() {
                region.size = size_of(&region.image);
            }
        }
    }

    /// GIDs contributed by one tileset that actually resolved, ascending.
    ///
    /// Collection tiles come from the listed entries; sliced sets from the
    /// same layout [`TileAtlas::resolve`] cut them with.
    pub fn resolved_gids(&self, doc: &MapDocument, tileset: &Tileset) -> Vec<u32> {
        let mut gids: Vec<u32> = if tileset.is_collection() {
            tileset
                .tiles
                .iter()
                .filter_map(|t| tileset.first_gid.checked_add(t.id))
                .filter(|gid| self.contains(*gid))
                .collect()
        } else {
            let count = tileset.slice_layout(doc.tile_width, doc.tile_height).tile_count;
            let end = tileset.first_gid.saturating_add(count);
            (tileset.first_gid..end)
                .filter(|gid| self.contains(*gid))
                .collect()
        };
        gids.sort_unstable();
        gids.dedup();
        gids
    }
}
