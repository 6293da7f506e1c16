//! Flower slots from the map and the flower nodes planted in them.

use bevy::prelude::*;
use rand::seq::SliceRandom;
use rand::Rng;

use crate::config::FarmViewConfig;
use crate::map::{MapDocument, TileAtlas};
use crate::scene::{NodeAnchor, NodeKind, SceneNode};
use crate::shared::*;

/// One planting spot, in the order the `flower-slot` layer lists it.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowerSlot {
    pub index: usize,
    /// Where the flower's bottom-center lands, in map pixels.
    pub anchor: Vec2,
    /// The slot's numeric `scale` property, 1 when absent.
    pub slot_scale: f32,
}

/// Slots of the `flower-slot` layer; empty when the layer is missing.
pub fn flower_slots(doc: &MapDocument) -> Vec<FlowerSlot> {
    let Some(layer) = doc.object_layer(FLOWER_SLOT_LAYER) else {
        return Vec::new();
    };
    layer
        .objects
        .iter()
        .enumerate()
        .map(|(index, object)| {
            let anchor = match object.size() {
                Some(size) => Vec2::new(object.x + size.x / 2.0, object.y + size.y),
                None => Vec2::new(object.x, object.y),
            };
            FlowerSlot {
                index,
                anchor,
                slot_scale: object.property_f32("scale").unwrap_or(1.0),
            }
        })
        .collect()
}

/// Resolved GIDs of the `flowers` tileset.
pub fn flower_gids(doc: &MapDocument, atlas: &TileAtlas) -> Vec<u32> {
    doc.tileset(FLOWER_TILESET)
        .map(|tileset| atlas.resolved_gids(doc, tileset))
        .unwrap_or_default()
}

/// One flower node per occupied slot. Indices outside the slot list are dropped.
pub fn plan_flowers(
    slots: &[FlowerSlot],
    occupied: &[i64],
    gids: &[u32],
    atlas: &TileAtlas,
    config: &FarmViewConfig,
    rng: &mut impl Rng,
) -> Vec<SceneNode> {
    let mut nodes = Vec::new();
    for &index in occupied {
        let Some(slot) = usize::try_from(index).ok().and_then(|i| slots.get(i)) else {
            debug!("[Garden] slot index {} out of range (0..{})", index, slots.len());
            continue;
        };
        let Some(texture) = gids.choose(rng).and_then(|gid| atlas.get(*gid)) else {
            continue;
        };
        let jitter = rng.gen_range(config.flower_jitter_min..config.flower_jitter_max);
        let scale = config.flower_base_scale * slot.slot_scale * jitter;

        let mut node = SceneNode::new(NodeKind::Flower, slot.anchor, NodeAnchor::BottomCenter, slot.anchor.y);
        node.scale = Vec2::splat(scale);
        node.texture = Some(texture.clone());
        nodes.push(node);
    }
    nodes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::parse_map_document;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn garden_doc() -> MapDocument {
        parse_map_document(
            br#"{"width": 20, "height": 20, "tilewidth": 32, "tileheight": 32,
                "tilesets": [
                    {"firstgid": 1, "name": "ground", "image": "g.png", "columns": 1, "tilecount": 1},
                    {"firstgid": 10, "name": "flowers", "tiles": [
                        {"id": 0, "image": "flowers/rose.png", "imagewidth": 16, "imageheight": 24},
                        {"id": 3, "image": "flowers/tulip.png", "imagewidth": 16, "imageheight": 24}
                    ]}
                ],
                "layers": [{"type": "objectgroup", "name": "flower-slot", "objects": [
                    {"x": 100, "y": 200, "width": 40, "height": 20},
                    {"x": 300, "y": 120, "properties": [{"name": "scale", "type": "float", "value": 2.0}]},
                    {"x": 50, "y": 60, "width": 10, "height": 10,
                        "properties": [{"name": "scale", "type": "string", "value": "big"}]}
                ]}]}"#,
        )
        .unwrap()
    }

    fn atlas_for(doc: &MapDocument) -> TileAtlas {
        TileAtlas::resolve(doc, |_| Handle::default())
    }

    #[test]
    fn test_slots_anchor_and_scale_property() {
        let slots = flower_slots(&garden_doc());
        assert_eq!(slots.len(), 3);
        assert_eq!(slots[0].anchor, Vec2::new(120.0, 220.0));
        assert_eq!(slots[0].slot_scale, 1.0);
        assert_eq!(slots[1].anchor, Vec2::new(300.0, 120.0));
        assert_eq!(slots[1].slot_scale, 2.0);
        // Non-numeric scale is ignored.
        assert_eq!(slots[2].slot_scale, 1.0);
        assert_eq!(slots[2].index, 2);
    }

    #[test]
    fn test_flower_gids_from_collection() {
        let doc = garden_doc();
        assert_eq!(flower_gids(&doc, &atlas_for(&doc)), vec![10, 13]);
    }

    #[test]
    fn test_out_of_range_index_dropped() {
        let doc = garden_doc();
        let atlas = atlas_for(&doc);
        let gids = flower_gids(&doc, &atlas);
        let mut rng = StdRng::seed_from_u64(7);
        let nodes = plan_flowers(
            &flower_slots(&doc),
            &[0, 5, -1],
            &gids,
            &atlas,
            &FarmViewConfig::default(),
            &mut rng,
        );
        assert_eq!(nodes.len(), 1);
        let flower = &nodes[0];
        assert_eq!(flower.kind, NodeKind::Flower);
        assert_eq!(flower.anchor, NodeAnchor::BottomCenter);
        assert_eq!(flower.position, Vec2::new(120.0, 220.0));
        assert_eq!(flower.depth, 220.0);
        assert!(flower.region.is_none());
    }

    #[test]
    fn test_scale_within_jitter_band() {
        let doc = garden_doc();
        let atlas = atlas_for(&doc);
        let gids = flower_gids(&doc, &atlas);
        let slots = flower_slots(&doc);
        let config = FarmViewConfig::default();
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..50 {
            let nodes = plan_flowers(&slots, &[0, 1], &gids, &atlas, &config, &mut rng);
            let plain = nodes[0].scale.x;
            let doubled = nodes[1].scale.x;
            assert!((0.45 * 0.9..0.45 * 1.1).contains(&plain));
            assert!((0.9 * 0.9..0.9 * 1.1).contains(&doubled));
            assert_eq!(nodes[0].scale.x, nodes[0].scale.y);
            let texture = nodes[0].texture.as_ref().unwrap();
            assert!(atlas.get(10) == Some(texture) || atlas.get(13) == Some(texture));
        }
    }

    #[test]
    fn test_same_seed_same_garden() {
        let doc = garden_doc();
        let atlas = atlas_for(&doc);
        let gids = flower_gids(&doc, &atlas);
        let slots = flower_slots(&doc);
        let config = FarmViewConfig::default();
        let a = plan_flowers(&slots, &[0, 1, 2], &gids, &atlas, &config, &mut StdRng::seed_from_u64(3));
        let b = plan_flowers(&slots, &[0, 1, 2], &gids, &atlas, &config, &mut StdRng::seed_from_u64(3));
        assert_eq!(a, b);
    }

    #[test]
    fn test_no_flower_layer_no_slots() {
        let doc = parse_map_document(
            br#"{"width": 1, "height": 1, "tilewidth": 8, "tileheight": 8, "tilesets": [], "layers": []}"#,
        )
        .unwrap();
        assert!(flower_slots(&doc).is_empty());
        assert!(flower_gids(&doc, &atlas_for(&doc)).is_empty());
    }
}
