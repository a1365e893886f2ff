mod input;
mod loop_runner;
mod scene;

pub use input::{ButtonPhase, InputAction};
pub use loop_runner::{run_app, AppError, InputSource, LoopConfig};
pub use scene::{
    Camera2D, Entity, EntityId, EntityIdAllocator, GridPos, InputSnapshot, Scene, SceneCommand,
    SceneHost, SceneWorld, Tilemap, TilemapError, Vec2, CAMERA_ZOOM_DEFAULT, CAMERA_ZOOM_MAX,
    CAMERA_ZOOM_MIN,
};
