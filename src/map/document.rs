//! Tiled JSON map documents (`.tmj`).
//!
//! Only the subset the farm view needs is modelled. Unknown layer types are
//! kept as [`Layer::Other`] and ignored by every consumer.

use bevy::asset::io::Reader;
use bevy::asset::{AssetLoader, LoadContext};
use bevy::prelude::*;
use serde::Deserialize;
use serde_json::Value;

/// Tiled stores flip/rotation flags in the top bits of every GID.
const FLIP_HORIZONTAL: u32 = 0x8000_0000;
const FLIP_VERTICAL: u32 = 0x4000_0000;
const FLIP_DIAGONAL: u32 = 0x2000_0000;
const FLAG_MASK: u32 = FLIP_HORIZONTAL | FLIP_VERTICAL | FLIP_DIAGONAL;

const REQUIRED_FIELDS: [&str; 6] = ["tilewidth", "tileheight", "width", "height", "layers", "tilesets"];

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("could not read map document: {0}")]
    Io(#[from] std::io::Error),
    #[error("map document is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("map document is missing `{0}`")]
    MissingField(&'static str),
    #[error("map document has invalid dimensions: {0}")]
    InvalidDimensions(String),
}

// ═══════════════════════════════════════════════════════════════════════
// DOCUMENT
// ═══════════════════════════════════════════════════════════════════════

#[derive(Asset, TypePath, Debug, Clone, Deserialize)]
pub struct MapDocument {
    #[serde(rename = "tilewidth")]
    pub tile_width: u32,
    #[serde(rename = "tileheight")]
    pub tile_height: u32,
    /// Map width in tiles.
    pub width: u32,
    /// Map height in tiles.
    pub height: u32,
    pub tilesets: Vec<Tileset>,
    pub layers: Vec<Layer>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Tileset {
    #[serde(rename = "firstgid")]
    pub first_gid: u32,
    #[serde(default)]
    pub name: String,
    /// Single sliced image, for grid tilesets.
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default, rename = "imagewidth")]
    pub image_width: Option<u32>,
    #[serde(default, rename = "imageheight")]
    pub image_height: Option<u32>,
    #[serde(default, rename = "tilewidth")]
    pub tile_width: Option<u32>,
    #[serde(default, rename = "tileheight")]
    pub tile_height: Option<u32>,
    #[serde(default)]
    pub columns: Option<u32>,
    #[serde(default, rename = "tilecount")]
    pub tile_count: Option<u32>,
    /// Per-tile entries; for collection tilesets each one carries its own image.
    #[serde(default)]
    pub tiles: Vec<TileEntry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TileEntry {
    #[serde(default)]
    pub id: u32,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default, rename = "imagewidth")]
    pub image_width: Option<u32>,
    #[serde(default, rename = "imageheight")]
    pub image_height: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum Layer {
    #[serde(rename = "tilelayer")]
    Tiles(TileLayer),
    #[serde(rename = "objectgroup")]
    Objects(ObjectLayer),
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TileLayer {
    #[serde(default)]
    pub name: String,
    /// Row-major raw GIDs, flip flags included.
    #[serde(default)]
    pub data: Vec<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ObjectLayer {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub objects: Vec<MapObject>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MapObject {
    #[serde(default)]
    pub x: f32,
    #[serde(default)]
    pub y: f32,
    #[serde(default)]
    pub width: Option<f32>,
    #[serde(default)]
    pub height: Option<f32>,
    #[serde(default)]
    pub gid: Option<u32>,
    #[serde(default)]
    pub properties: Vec<Property>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Property {
    pub name: String,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub value: Value,
}

/// A GID with Tiled's flip flags split off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Gid {
    pub id: u32,
    pub flip_x: bool,
    pub flip_y: bool,
}

impl Gid {
    pub fn from_raw(raw: u32) -> Self {
        Self {
            id: raw & !FLAG_MASK,
            flip_x: raw & FLIP_HORIZONTAL != 0,
            flip_y: raw & FLIP_VERTICAL != 0,
        }
    }

    /// GID 0 is always "no tile".
    pub fn is_empty(self) -> bool {
        self.id == 0
    }
}

impl MapDocument {
    pub fn pixel_size(&self) -> Vec2 {
        Vec2::new(
            self.width as f32 * self.tile_width as f32,
            self.height as f32 * self.tile_height as f32,
        )
    }

    pub fn tile_layers(&self) -> impl Iterator<Item = &TileLayer> {
        self.layers.iter().filter_map(|layer| match layer {
            Layer::Tiles(tiles) => Some(tiles),
            _ => None,
        })
    }

    pub fn object_layers(&self) -> impl Iterator<Item = &ObjectLayer> {
        self.layers.iter().filter_map(|layer| match layer {
            Layer::Objects(objects) => Some(objects),
            _ => None,
        })
    }

    pub fn object_layer(&self, name: &str) -> Option<&ObjectLayer> {
        self.object_layers().find(|layer| layer.name == name)
    }

    pub fn tileset(&self, name: &str) -> Option<&Tileset> {
        self.tilesets.iter().find(|ts| ts.name == name)
    }

    /// The tileset owning `gid`: greatest `first_gid` not above it.
    ///
    /// Returns `None` for GID 0, for GIDs below every tileset, and for local
    /// ids past a tileset's declared tile count.
    pub fn owning_tileset(&self, gid: u32) -> Option<&Tileset> {
        if gid == 0 {
            return None;
        }
        let tileset = self
            .tilesets
            .iter()
            .filter(|ts| ts.first_gid <= gid)
            .max_by_key(|ts| ts.first_gid)?;
        let local = gid - tileset.first_gid;
        match tileset.declared_tile_count() {
            Some(count) if local >= count => None,
            _ => Some(tileset),
        }
    }
}

impl Tileset {
    pub fn is_collection(&self) -> bool {
        self.image.is_none() && self.tiles.iter().any(|t| t.image.is_some())
    }

    fn declared_tile_count(&self) -> Option<u32> {
        if self.is_collection() {
            // Collection ids are sparse; any listed id belongs to this set.
            return self.tiles.iter().map(|t| t.id.saturating_add(1)).max();
        }
        self.tile_count
    }

    /// How a sliced tileset image is cut. Tile size falls back to the map's,
    /// an absent tile count is derived from the image height, and the count
    /// never exceeds what the image (or [`MAX_SLICED_TILES`]) can hold.
    pub fn slice_layout(&self, map_tile_width: u32, map_tile_height: u32) -> SliceLayout {
        let tile_width = self.tile_width.unwrap_or(map_tile_width).max(1);
        let tile_height = self.tile_height.unwrap_or(map_tile_height).max(1);
        let columns = self.columns.filter(|&c| c > 0).unwrap_or(1);
        let rows = self.image_height.map(|h| h / tile_height);

        let declared = self
            .tile_count
            .filter(|&n| n > 0)
            .or_else(|| rows.map(|rows| columns.saturating_mul(rows)))
            .unwrap_or(0);
        let capacity = match (self.image_width, rows) {
            (Some(width), Some(rows)) => (width / tile_width).saturating_mul(rows),
            (None, Some(rows)) => columns.saturating_mul(rows),
            _ => MAX_SLICED_TILES,
        };

        SliceLayout {
            tile_width,
            tile_height,
            columns,
            tile_count: declared.min(capacity).min(MAX_SLICED_TILES),
        }
    }
}

/// Upper bound on tiles cut from one sliced image.
pub const MAX_SLICED_TILES: u32 = 1 << 16;

/// Grid geometry of a sliced tileset, see [`Tileset::slice_layout`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SliceLayout {
    pub tile_width: u32,
    pub tile_height: u32,
    pub columns: u32,
    pub tile_count: u32,
}

impl MapObject {
    /// The declared box, only when both sides are present and non-zero.
    pub fn size(&self) -> Option<Vec2> {
        match (self.width, self.height) {
            (Some(w), Some(h)) if w > 0.0 && h > 0.0 => Some(Vec2::new(w, h)),
            _ => None,
        }
    }

    pub fn gid(&self) -> Option<Gid> {
        self.gid.map(Gid::from_raw).filter(|gid| !gid.is_empty())
    }

    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties
            .iter()
            .find(|p| p.name == name)
            .map(|p| &p.value)
    }

    /// Numeric custom property; strings and other types are ignored.
    pub fn property_f32(&self, name: &str) -> Option<f32> {
        self.property(name)
            .and_then(Value::as_f64)
            .map(|v| v as f32)
    }
}

// ═══════════════════════════════════════════════════════════════════════
// PARSING
// ═══════════════════════════════════════════════════════════════════════

/// Parse and validate a Tiled JSON document.
pub fn parse_map_document(bytes: &[u8]) -> Result<MapDocument, LoadError> {
    let value: Value = serde_json::from_slice(bytes)?;
    for field in REQUIRED_FIELDS {
        if value.get(field).map_or(true, Value::is_null) {
            return Err(LoadError::MissingField(field));
        }
    }
    let doc: MapDocument = serde_json::from_value(value)?;

    if doc.tile_width == 0 || doc.tile_height == 0 {
        return Err(LoadError::InvalidDimensions(format!(
            "tile size {}x{}",
            doc.tile_width, doc.tile_height
        )));
    }
    if doc.width == 0 || doc.height == 0 {
        return Err(LoadError::InvalidDimensions(format!(
            "map size {}x{} tiles",
            doc.width, doc.height
        )));
    }
    let cells = doc.width.checked_mul(doc.height);
    let pixels = (
        doc.width.checked_mul(doc.tile_width),
        doc.height.checked_mul(doc.tile_height),
    );
    if cells.is_none() || pixels.0.is_none() || pixels.1.is_none() {
        return Err(LoadError::InvalidDimensions(format!(
            "map of {}x{} tiles at {}x{} px overflows",
            doc.width, doc.height, doc.tile_width, doc.tile_height
        )));
    }
    Ok(doc)
}

/// Bevy asset loader for `.tmj` map documents.
#[derive(Default)]
pub struct MapDocumentLoader;

impl AssetLoader for MapDocumentLoader {
    type Asset = MapDocument;
    type Settings = ();
    type Error = LoadError;

    async fn load(
        &self,
        reader: &mut dyn Reader,
        _settings: &(),
        _load_context: &mut LoadContext<'_>,
    ) -> Result<Self::Asset, Self::Error> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes).await?;
        parse_map_document(&bytes)
    }

    fn extensions(&self) -> &[&str] {
        &["tmj"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SMALL_MAP: &str = r#"{
        "width": 2, "height": 2, "tilewidth": 32, "tileheight": 32,
        "tilesets": [
            {"firstgid": 1, "name": "ground", "image": "..\\images\\ground.png",
             "columns": 2, "tilecount": 2},
            {"firstgid": 3, "name": "flowers", "tiles": [
                {"id": 0, "image": "../images/flowers/rose.png", "imagewidth": 40, "imageheight": 60},
                {"id": 4, "image": "../images/flowers/tulip.png"}
            ]}
        ],
        "layers": [
            {"type": "tilelayer", "name": "ground", "data": [1, 0, 0, 2]},
            {"type": "imagelayer", "name": "sky"},
            {"type": "objectgroup", "name": "flower-slot", "objects": [
                {"x": 10, "y": 20, "width": 16, "height": 16,
                 "properties": [{"name": "scale", "type": "float", "value": 1.5}]},
                {"x": 40, "y": 20,
                 "properties": [{"name": "scale", "type": "string", "value": "big"}]}
            ]}
        ]
    }"#;

    #[test]
    fn test_parse_small_map() {
        let doc = parse_map_document(SMALL_MAP.as_bytes()).unwrap();
        assert_eq!(doc.tile_width, 32);
        assert_eq!(doc.pixel_size(), Vec2::new(64.0, 64.0));
        assert_eq!(doc.tilesets.len(), 2);
        assert_eq!(doc.layers.len(), 3);
        assert!(matches!(doc.layers[1], Layer::Other));
        assert_eq!(doc.tile_layers().count(), 1);
        assert_eq!(doc.object_layer("flower-slot").unwrap().objects.len(), 2);
    }

    #[test]
    fn test_missing_required_field_is_load_error() {
        let err = parse_map_document(br#"{"tileheight": 32, "width": 1, "height": 1, "layers": [], "tilesets": []}"#)
            .unwrap_err();
        assert!(matches!(err, LoadError::MissingField("tilewidth")));

        let err = parse_map_document(br#"{"tilewidth": 32, "tileheight": 32, "width": 1, "height": 1, "tilesets": []}"#)
            .unwrap_err();
        assert!(matches!(err, LoadError::MissingField("layers")));
    }

    #[test]
    fn test_malformed_json_is_load_error() {
        let err = parse_map_document(b"{ not json").unwrap_err();
        assert!(matches!(err, LoadError::Json(_)));
    }

    #[test]
    fn test_zero_tile_size_rejected() {
        let err = parse_map_document(
            br#"{"tilewidth": 0, "tileheight": 32, "width": 1, "height": 1, "layers": [], "tilesets": []}"#,
        )
        .unwrap_err();
        assert!(matches!(err, LoadError::InvalidDimensions(_)));
    }

    #[test]
    fn test_overflowing_dimensions_rejected() {
        let err = parse_map_document(
            br#"{"tilewidth": 4294967295, "tileheight": 32, "width": 2, "height": 1, "layers": [], "tilesets": []}"#,
        )
        .unwrap_err();
        assert!(matches!(err, LoadError::InvalidDimensions(_)));
    }

    #[test]
    fn test_slice_layout_capped_by_image() {
        let tileset = Tileset {
            image: Some("huge.png".into()),
            image_width: Some(64),
            image_height: Some(32),
            columns: Some(2),
            tile_count: Some(4_000_000_000),
            ..default()
        };
        let layout = tileset.slice_layout(32, 32);
        assert_eq!(layout.tile_count, 2);

        // Nothing to cap against but the hard limit.
        let unsized_set = Tileset {
            image_width: None,
            image_height: None,
            tile_count: Some(u32::MAX),
            ..tileset
        };
        assert_eq!(unsized_set.slice_layout(32, 32).tile_count, MAX_SLICED_TILES);
    }

    #[test]
    fn test_slice_layout_derives_count_from_height() {
        let tileset = Tileset {
            image: Some("flowers.png".into()),
            image_height: Some(16),
            tile_width: Some(16),
            tile_height: Some(16),
            columns: Some(4),
            ..default()
        };
        let layout = tileset.slice_layout(32, 32);
        assert_eq!((layout.tile_width, layout.columns, layout.tile_count), (16, 4, 4));
    }

    #[test]
    fn test_owning_tileset_greatest_first_gid() {
        let doc = parse_map_document(SMALL_MAP.as_bytes()).unwrap();
        assert_eq!(doc.owning_tileset(1).unwrap().name, "ground");
        assert_eq!(doc.owning_tileset(2).unwrap().name, "ground");
        assert_eq!(doc.owning_tileset(3).unwrap().name, "flowers");
        assert_eq!(doc.owning_tileset(7).unwrap().name, "flowers");
        // Past the last collection id.
        assert!(doc.owning_tileset(8).is_none());
        assert!(doc.owning_tileset(0).is_none());
    }

    #[test]
    fn test_owning_tileset_below_every_first_gid() {
        let mut doc = parse_map_document(SMALL_MAP.as_bytes()).unwrap();
        for ts in &mut doc.tilesets {
            ts.first_gid += 10;
        }
        assert!(doc.owning_tileset(5).is_none());
        assert_eq!(doc.owning_tileset(11).unwrap().name, "ground");
    }

    #[test]
    fn test_gid_flip_flags_split_off() {
        let gid = Gid::from_raw(0x8000_0005);
        assert_eq!(gid.id, 5);
        assert!(gid.flip_x);
        assert!(!gid.flip_y);
        assert!(Gid::from_raw(0).is_empty());
    }

    #[test]
    fn test_numeric_property_only() {
        let doc = parse_map_document(SMALL_MAP.as_bytes()).unwrap();
        let slots = &doc.object_layer("flower-slot").unwrap().objects;
        assert_eq!(slots[0].property_f32("scale"), Some(1.5));
        assert_eq!(slots[1].property_f32("scale"), None);
        assert_eq!(slots[0].size(), Some(Vec2::new(16.0, 16.0)));
        assert_eq!(slots[1].size(), None);
    }
}
