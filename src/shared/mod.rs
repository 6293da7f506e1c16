//! Shared states, resources, events and constants for the farm view.
//!
//! This is the type contract. Every domain plugin imports from here; the
//! few direct cross-domain imports go through a domain's public re-exports.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

// ═══════════════════════════════════════════════════════════════════════
// VIEW STATE — top-level state machine
// ═══════════════════════════════════════════════════════════════════════

/// Lifecycle of the mounted farm view.
///
/// Polling systems run only in their own state, so anything that resolves
/// after the view has moved on (failed, unmounted) is never applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, States, Default)]
pub enum ViewState {
    #[default]
    LoadingDocument,
    LoadingImages,
    Ready,
    Failed,
    Unmounted,
}

// ═══════════════════════════════════════════════════════════════════════
// CHARACTERS & REGION TAGS
// ═══════════════════════════════════════════════════════════════════════

/// Speakers the chat panel can be opened for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Character {
    Scarecrow,
    Cat,
    Dog,
}

impl Character {
    pub fn id(self) -> &'static str {
        match self {
            Character::Scarecrow => "scarecrow",
            Character::Cat => "cat",
            Character::Dog => "dog",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Character::Scarecrow => "稻草人",
            Character::Cat => "小吨",
            Character::Dog => "妖妖灵",
        }
    }

    pub fn portrait_path(self) -> &'static str {
        match self {
            Character::Scarecrow => "/images/Decorations/grassman.png",
            Character::Cat => "/images/FarmSpeakers/小吨.png",
            Character::Dog => "/images/FarmSpeakers/妖妖灵.png",
        }
    }
}

/// Semantic tag carried by every interactive region in the scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegionTag {
    Scarecrow,
    Cat,
    Dog,
    Mailbox,
}

/// Marker for the single entity every map node hangs off. Its transform is
/// the viewport's pan and scale.
#[derive(Component, Debug, Default)]
pub struct MapRoot;

/// The spawned map root, present from scene build until teardown.
#[derive(Resource, Debug, Clone, Copy)]
pub struct MapRootEntity(pub Entity);

/// Ordering of the one-shot work done when the view becomes ready.
#[derive(SystemSet, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MountSet {
    BuildScene,
    FitViewport,
    RequestGarden,
}

/// A tappable area of the scene, in map pixels (top-left origin, y down).
#[derive(Component, Debug, Clone, PartialEq)]
pub struct InteractiveRegion {
    pub tag: RegionTag,
    pub bounds: Rect,
    /// Depth key of the node the region belongs to; the deepest region wins
    /// when several overlap.
    pub depth: f32,
}

impl InteractiveRegion {
    pub fn contains(&self, map_point: Vec2) -> bool {
        self.bounds.width() > 0.0 && self.bounds.height() > 0.0 && self.bounds.contains(map_point)
    }
}

// ═══════════════════════════════════════════════════════════════════════
// POINTER INPUT
// ═══════════════════════════════════════════════════════════════════════

/// Per-frame pointer snapshot in viewport pixels (top-left origin, y down).
///
/// Rebuilt from scratch every frame by the input plugin; nothing else writes it.
#[derive(Resource, Debug, Clone, Default, PartialEq)]
pub struct PointerInput {
    pub position: Option<Vec2>,
    pub just_pressed: bool,
    pub just_released: bool,
    /// Primary button or a touch is currently down.
    pub held: bool,
}

/// Set when an interaction region has claimed this frame's press.
/// The viewport must not start a drag from a claimed press.
#[derive(Resource, Debug, Clone, Default)]
pub struct InteractionClaimed(pub bool);

// ═══════════════════════════════════════════════════════════════════════
// OVERLAY
// ═══════════════════════════════════════════════════════════════════════

/// Which panel, if any, is drawn over the map. At most one at a time.
#[derive(Resource, Debug, Clone, Default, PartialEq, Eq)]
pub struct OverlayState {
    pub chat: Option<Character>,
    pub mailbox_open: bool,
}

impl OverlayState {
    pub fn is_open(&self) -> bool {
        self.chat.is_some() || self.mailbox_open
    }
}

// ═══════════════════════════════════════════════════════════════════════
// EVENTS — cross-domain communication
// ═══════════════════════════════════════════════════════════════════════

/// A speaker region was tapped.
#[derive(Event, Debug, Clone, PartialEq, Eq)]
pub struct OpenChatEvent {
    pub character: Character,
}

/// The mailbox area was tapped.
#[derive(Event, Debug, Clone, PartialEq, Eq)]
pub struct OpenMailboxEvent;

/// Close whichever panel the overlay is showing.
#[derive(Event, Debug, Clone)]
pub struct CloseOverlayEvent;

/// The host is tearing the farm view down.
#[derive(Event, Debug, Clone)]
pub struct UnmountViewEvent;

/// Sent once the scene root and all map nodes have been spawned.
#[derive(Event, Debug, Clone)]
pub struct SceneBuiltEvent {
    pub root: Entity,
    pub node_count: usize,
}

// ═══════════════════════════════════════════════════════════════════════
// CONSTANTS
// ═══════════════════════════════════════════════════════════════════════

pub const DEFAULT_MAP_PATH: &str = "maps/mood-valley-flower.tmj";
pub const DEFAULT_API_BASE: &str = "http://localhost:8000/api";
pub const DEFAULT_SCALE: f32 = 0.88;

pub const BASE_FLOWER_SCALE: f32 = 0.45;
pub const FLOWER_JITTER_MIN: f32 = 0.9;
pub const FLOWER_JITTER_MAX: f32 = 1.1;

pub const FLOWER_SLOT_LAYER: &str = "flower-slot";
pub const FLOWER_TILESET: &str = "flowers";

/// Window size used until the primary window reports its own.
pub const SCREEN_WIDTH: f32 = 960.0;
pub const SCREEN_HEIGHT: f32 = 540.0;

/// z band for tile layers; each layer sits `TILE_LAYER_Z_STEP` above the last.
pub const TILE_Z_BASE: f32 = 0.0;
pub const TILE_LAYER_Z_STEP: f32 = 0.001;
/// Object nodes start here, well above any tile layer.
pub const OBJECT_Z_BASE: f32 = 100.0;
/// z per map pixel of depth key.
pub const DEPTH_Z_SCALE: f32 = 0.01;
