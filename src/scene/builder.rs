//! Turns a map document plus its atlas into an ordered scene graph.
//!
//! Pure data in, pure data out: nothing here touches the ECS, so the draw
//! order rules can be tested directly.

use bevy::prelude::*;
use std::cmp::Ordering;

use crate::interaction::InteractionTable;
use crate::map::{Gid, MapDocument, MapObject, TextureRegion, TileAtlas};
use crate::shared::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Tile,
    Sprite,
    HitArea,
    Flower,
}

/// Which point of the node sits on `position`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeAnchor {
    TopLeft,
    BottomCenter,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SceneNode {
    pub kind: NodeKind,
    /// Map pixels, y down.
    pub position: Vec2,
    pub anchor: NodeAnchor,
    pub scale: Vec2,
    pub depth: f32,
    pub texture: Option<TextureRegion>,
    pub flip_x: bool,
    pub flip_y: bool,
    pub region: Option<InteractiveRegion>,
    /// Index of the owning tile layer; only meaningful for tiles.
    pub layer: usize,
}

impl SceneNode {
    pub(crate) fn new(kind: NodeKind, position: Vec2, anchor: NodeAnchor, depth: f32) -> Self {
        Self {
            kind,
            position,
            anchor,
            scale: Vec2::ONE,
            depth,
            texture: None,
            flip_x: false,
            flip_y: false,
            region: None,
            layer: 0,
        }
    }

    /// Rendered size: natural texture size times scale.
    pub fn drawn_size(&self) -> Option<Vec2> {
        self.texture
            .as_ref()
            .and_then(|t| t.size)
            .map(|size| size * self.scale)
    }

    /// Rendered bounds in map pixels, when the size is known.
    pub fn drawn_bounds(&self) -> Option<Rect> {
        let size = self.drawn_size()?;
        let min = match self.anchor {
            NodeAnchor::TopLeft => self.position,
            NodeAnchor::BottomCenter => self.position - Vec2::new(size.x / 2.0, size.y),
        };
        Some(Rect::from_corners(min, min + size))
    }
}

/// Background tiles plus depth-keyed object nodes.
#[derive(Debug, Clone, Default)]
pub struct SceneGraph {
    pub tiles: Vec<SceneNode>,
    pub objects: Vec<SceneNode>,
}

impl SceneGraph {
    pub fn len(&self) -> usize {
        self.tiles.len() + self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Painter order: every tile first (insertion order), then objects by
    /// ascending depth. The sort is stable, so equal depths keep insertion order.
    pub fn draw_order(&self) -> Vec<&SceneNode> {
        let mut objects: Vec<&SceneNode> = self.objects.iter().collect();
        objects.sort_by(|a, b| a.depth.partial_cmp(&b.depth).unwrap_or(Ordering::Equal));
        self.tiles.iter().chain(objects).collect()
    }

    pub fn regions(&self) -> impl Iterator<Item = &InteractiveRegion> {
        self.objects.iter().filter_map(|n| n.region.as_ref())
    }
}

// ═══════════════════════════════════════════════════════════════════════
// BUILD
// ═══════════════════════════════════════════════════════════════════════

pub fn build_scene(doc: &MapDocument, atlas: &TileAtlas, table: &InteractionTable) -> SceneGraph {
    let mut graph = SceneGraph::default();
    let tile_size = Vec2::new(doc.tile_width as f32, doc.tile_height as f32);
    let columns = (doc.width as usize).max(1);
    let rows = doc.height as usize;

    for (layer_index, layer) in doc.tile_layers().enumerate() {
        // Walk the data, not the grid, so a huge declared size costs nothing.
        for (index, &raw) in layer.data.iter().enumerate().take(columns * rows) {
            let gid = Gid::from_raw(raw);
            if gid.is_empty() {
                continue;
            }
            let Some(texture) = atlas.get(gid.id) else {
                continue;
            };
            let (row, col) = (index / columns, index % columns);
            let position = Vec2::new(col as f32, row as f32) * tile_size;
            let mut node = SceneNode::new(NodeKind::Tile, position, NodeAnchor::TopLeft, position.y);
            node.texture = Some(texture.clone());
            node.flip_x = gid.flip_x;
            node.flip_y = gid.flip_y;
            node.layer = layer_index;
            graph.tiles.push(node);
        }
    }

    for layer in doc.object_layers() {
        let behavior = table.behavior(&layer.name);
        for object in &layer.objects {
            let Some(gid) = object.gid() else {
                if let Some(tag) = behavior.hit_area {
                    graph.objects.push(hit_area_node(object, tag));
                }
                continue;
            };
            let Some(texture) = atlas.get(gid.id) else {
                continue;
            };
            let mut node = object_sprite_node(object, gid, texture);
            if let Some(tag) = behavior.sprite {
                let bounds = node
                    .drawn_bounds()
                    .or_else(|| object.size().map(|size| declared_bounds(object, size)))
                    .unwrap_or_else(|| Rect::from_corners(node.position, node.position));
                node.region = Some(InteractiveRegion {
                    tag,
                    bounds,
                    depth: node.depth,
                });
            }
            graph.objects.push(node);
        }
    }

    debug!(
        "[Scene] built {} tile nodes and {} object nodes",
        graph.tiles.len(),
        graph.objects.len()
    );
    graph
}

/// Invisible tappable box over an object's rectangle.
pub fn hit_area_node(object: &MapObject, tag: RegionTag) -> SceneNode {
    let width = object.width.unwrap_or(0.0);
    let height = object.height.unwrap_or(0.0);
    let depth = object.y + height - 1.0;
    let min = Vec2::new(object.x, object.y);
    let mut node = SceneNode::new(NodeKind::HitArea, min, NodeAnchor::TopLeft, depth);
    node.region = Some(InteractiveRegion {
        tag,
        bounds: Rect::from_corners(min, min + Vec2::new(width, height)),
        depth,
    });
    node
}

/// Tile objects: bottom-center anchored, stretched to the declared box when
/// both the box and the natural texture size are known.
pub fn object_sprite_node(object: &MapObject, gid: Gid, texture: &TextureRegion) -> SceneNode {
    let declared = object.size();
    let x = match declared {
        Some(size) => object.x + size.x / 2.0,
        None => object.x,
    };
    let position = Vec2::new(x, object.y);
    let mut node = SceneNode::new(NodeKind::Sprite, position, NodeAnchor::BottomCenter, object.y - 1.0);
    if let (Some(size), Some(natural)) = (declared, texture.size) {
        if natural.x > 0.0 && natural.y > 0.0 {
            node.scale = size / natural;
        }
    }
    node.texture = Some(texture.clone());
    node.flip_x = gid.flip_x;
    node.flip_y = gid.flip_y;
    node
}

/// Tiled anchors tile objects at their bottom-left corner.
fn declared_bounds(object: &MapObject, size: Vec2) -> Rect {
    let min = Vec2::new(object.x, object.y - size.y);
    Rect::from_corners(min, min + size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::parse_map_document;

    fn atlas_for(doc: &MapDocument) -> TileAtlas {
        TileAtlas::resolve(doc, |_| Handle::default())
    }

    #[test]
    fn test_two_by_two_tile_scenario() {
        let doc = parse_map_document(
            br#"{"width": 2, "height": 2, "tilewidth": 32, "tileheight": 32,
                "tilesets": [{"firstgid": 1, "image": "t.png", "columns": 2, "tilecount": 2}],
                "layers": [{"type": "tilelayer", "name": "ground", "data": [1, 0, 0, 2]}]}"#,
        )
        .unwrap();
        let atlas = atlas_for(&doc);
        let graph = build_scene(&doc, &atlas, &InteractionTable::default());

        assert_eq!(graph.tiles.len(), 2);
        assert!(graph.objects.is_empty());
        assert_eq!(graph.tiles[0].position, Vec2::new(0.0, 0.0));
        assert_eq!(graph.tiles[0].texture, atlas.get(1).cloned());
        assert_eq!(graph.tiles[1].position, Vec2::new(32.0, 32.0));
        assert_eq!(graph.tiles[1].texture, atlas.get(2).cloned());
        assert_eq!(graph.tiles[1].depth, 32.0);
    }

    #[test]
    fn test_cat_hit_area_scenario() {
        let doc = parse_map_document(
            br#"{"width": 10, "height": 10, "tilewidth": 32, "tileheight": 32, "tilesets": [],
                "layers": [{"type": "objectgroup", "name": "cat",
                    "objects": [{"x": 100, "y": 200, "width": 50, "height": 50}]}]}"#,
        )
        .unwrap();
        let graph = build_scene(&doc, &atlas_for(&doc), &InteractionTable::default());
        assert_eq!(graph.objects.len(), 1);
        let node = &graph.objects[0];
        assert_eq!(node.kind, NodeKind::HitArea);
        assert_eq!(node.depth, 249.0);
        let region = node.region.as_ref().unwrap();
        assert_eq!(region.tag, RegionTag::Cat);
        assert!(region.contains(Vec2::new(125.0, 225.0)));
        assert!(!region.contains(Vec2::new(151.0, 225.0)));
    }

    #[test]
    fn test_gidless_objects_on_plain_layers_skipped() {
        let doc = parse_map_document(
            br#"{"width": 4, "height": 4, "tilewidth": 16, "tileheight": 16, "tilesets": [],
                "layers": [{"type": "objectgroup", "name": "markers",
                    "objects": [{"x": 1, "y": 2, "width": 3, "height": 4}]}]}"#,
        )
        .unwrap();
        let graph = build_scene(&doc, &atlas_for(&doc), &InteractionTable::default());
        assert!(graph.is_empty());
    }

    #[test]
    fn test_scarecrow_sprite_anchor_scale_and_region() {
        let doc = parse_map_document(
            br#"{"width": 10, "height": 10, "tilewidth": 32, "tileheight": 32,
                "tilesets": [{"firstgid": 1, "tiles": [
                    {"id": 0, "image": "scarecrow.png", "imagewidth": 32, "imageheight": 64}]}],
                "layers": [{"type": "objectgroup", "name": "speaker",
                    "objects": [{"x": 100, "y": 300, "width": 64, "height": 96, "gid": 1}]}]}"#,
        )
        .unwrap();
        let graph = build_scene(&doc, &atlas_for(&doc), &InteractionTable::default());
        let node = &graph.objects[0];
        assert_eq!(node.kind, NodeKind::Sprite);
        assert_eq!(node.anchor, NodeAnchor::BottomCenter);
        assert_eq!(node.position, Vec2::new(132.0, 300.0));
        assert_eq!(node.scale, Vec2::new(2.0, 1.5));
        assert_eq!(node.depth, 299.0);
        let region = node.region.as_ref().unwrap();
        assert_eq!(region.tag, RegionTag::Scarecrow);
        assert_eq!(region.bounds.min, Vec2::new(100.0, 204.0));
        assert_eq!(region.bounds.max, Vec2::new(164.0, 300.0));
    }

    #[test]
    fn test_unsized_object_keeps_x_and_natural_scale() {
        let doc = parse_map_document(
            br#"{"width": 10, "height": 10, "tilewidth": 32, "tileheight": 32,
                "tilesets": [{"firstgid": 1, "tiles": [{"id": 0, "image": "rock.png"}]}],
                "layers": [{"type": "objectgroup", "name": "decor",
                    "objects": [{"x": 50, "y": 80, "gid": 1}]}]}"#,
        )
        .unwrap();
        let graph = build_scene(&doc, &atlas_for(&doc), &InteractionTable::default());
        let node = &graph.objects[0];
        assert_eq!(node.position, Vec2::new(50.0, 80.0));
        assert_eq!(node.scale, Vec2::ONE);
        assert!(node.region.is_none());
    }

    #[test]
    fn test_unresolved_gid_skipped_rest_of_layer_kept() {
        let doc = parse_map_document(
            br#"{"width": 3, "height": 1, "tilewidth": 16, "tileheight": 16,
                "tilesets": [{"firstgid": 1, "image": "t.png", "columns": 1, "tilecount": 1}],
                "layers": [{"type": "tilelayer", "data": [1, 9, 1]}]}"#,
        )
        .unwrap();
        let graph = build_scene(&doc, &atlas_for(&doc), &InteractionTable::default());
        assert_eq!(graph.tiles.len(), 2);
        assert_eq!(graph.tiles[1].position, Vec2::new(32.0, 0.0));
    }

    #[test]
    fn test_draw_order_tiles_first_then_depth() {
        let doc = parse_map_document(
            br#"{"width": 1, "height": 1, "tilewidth": 16, "tileheight": 16,
                "tilesets": [{"firstgid": 1, "image": "t.png", "columns": 1, "tilecount": 1}],
                "layers": [
                    {"type": "objectgroup", "name": "decor", "objects": [
                        {"x": 0, "y": 500, "gid": 1},
                        {"x": 0, "y": 100, "gid": 1}
                    ]},
                    {"type": "objectgroup", "name": "dog", "objects": [
                        {"x": 0, "y": 200, "width": 10, "height": 10}
                    ]},
                    {"type": "tilelayer", "data": [1]}
                ]}"#,
        )
        .unwrap();
        let graph = build_scene(&doc, &atlas_for(&doc), &InteractionTable::default());
        let order: Vec<(NodeKind, f32)> = graph.draw_order().iter().map(|n| (n.kind, n.depth)).collect();
        assert_eq!(
            order,
            vec![
                (NodeKind::Tile, 0.0),
                (NodeKind::Sprite, 99.0),
                (NodeKind::HitArea, 209.0),
                (NodeKind::Sprite, 499.0),
            ]
        );
    }

    #[test]
    fn test_mailbox_tile_object_is_tappable() {
        let doc = parse_map_document(
            br#"{"width": 10, "height": 10, "tilewidth": 32, "tileheight": 32,
                "tilesets": [{"firstgid": 1, "image": "t.png", "columns": 1, "tilecount": 1}],
                "layers": [{"type": "objectgroup", "name": "mailbox-area",
                    "objects": [{"x": 100, "y": 200, "width": 32, "height": 32, "gid": 1}]}]}"#,
        )
        .unwrap();
        let graph = build_scene(&doc, &atlas_for(&doc), &InteractionTable::default());
        let node = &graph.objects[0];
        assert_eq!(node.kind, NodeKind::Sprite);
        let region = node.region.as_ref().unwrap();
        assert_eq!(region.tag, RegionTag::Mailbox);
        assert!(region.contains(Vec2::new(116.0, 184.0)));
        assert!(!region.contains(Vec2::new(116.0, 210.0)));
    }

    #[test]
    fn test_huge_declared_grid_only_walks_layer_data() {
        let doc = parse_map_document(
            br#"{"width": 65536, "height": 65535, "tilewidth": 1, "tileheight": 1,
                "tilesets": [{"firstgid": 1, "image": "t.png", "columns": 1, "tilecount": 1}],
                "layers": [{"type": "tilelayer", "data": [0, 1]}]}"#,
        )
        .unwrap();
        let graph = build_scene(&doc, &atlas_for(&doc), &InteractionTable::default());
        assert_eq!(graph.tiles.len(), 1);
        assert_eq!(graph.tiles[0].position, Vec2::new(1.0, 0.0));
    }
}
