use std::collections::{HashMap, HashSet};
use std::fmt::Display;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crawl_engine::{
    write_text_atomic, ActorTemplate, AiController, ConsumableTemplate, EntityId, GridPos,
    InputAction, InputSnapshot, Scene, SceneCommand, SceneWorld, TemplateKind, Tilemap, Vec2,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, warn};

const SAVE_VERSION: u32 = 1;
const FIRST_FLOOR: u32 = 1;
const PLAYER_INVENTORY_CAPACITY: usize = 26;
const MESSAGE_LOG_LIMIT: usize = 128;
const MELEE_RANGE: f32 = 1.5;
const CAMERA_SPEED_UNITS_PER_SECOND: f32 = 5.0;

const TILE_FLOOR: u16 = 0;
const TILE_WALL: u16 = 1;
const TILE_STAIRS: u16 = 2;

const PLAYER_NAME: &str = "Player";
const WORLD_PARENT: &str = "World";
const REMAINS_PREFIX: &str = "Remains of ";
const EQUIPPED_SUFFIX: &str = " (E)";

const COLOR_DEFAULT: &str = "#FFFFFF";
const COLOR_IMPOSSIBLE: &str = "#808080";
const COLOR_PLAYER_ATTACK: &str = "#E0E0E0";
const COLOR_ENEMY_ATTACK: &str = "#FFC0C0";
const COLOR_PLAYER_DIE: &str = "#FF3030";
const COLOR_ENEMY_DIE: &str = "#FFA030";
const COLOR_HEALTH_RECOVERED: &str = "#00FF00";
const COLOR_FIREBALL: &str = "#FF0000";
const COLOR_DESCEND: &str = "#9F3FFF";

include!("types.rs");
include!("turns.rs");
include!("session.rs");
include!("scene_state.rs");
include!("actions.rs");
include!("systems.rs");
include!("nav.rs");
include!("player.rs");
include!("util.rs");
include!("scene_impl.rs");

pub(crate) fn build_gameplay_scene(config: GameplayConfig) -> Box<dyn Scene> {
    Box::new(GameplayScene::new(config))
}

#[cfg(test)]
mod tests {
    include!("tests.rs");
}
