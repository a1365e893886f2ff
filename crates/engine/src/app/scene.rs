use super::input::{phase_between, ActionStates, ButtonPhase, InputAction};
use crate::content::TemplateDatabase;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneCommand {
    None,
    Quit,
}

/// Action state for one tick, together with the state of the tick before it.
#[derive(Debug, Clone, Copy, Default)]
pub struct InputSnapshot {
    quit_requested: bool,
    current: ActionStates,
    previous: ActionStates,
}

impl InputSnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Starts the next tick: current state becomes the previous one and nothing is held.
    pub fn next_frame(&self) -> Self {
        Self {
            quit_requested: false,
            current: ActionStates::default(),
            previous: self.current,
        }
    }

    /// Starts the next tick keeping every held action down.
    pub fn next_frame_held(&self) -> Self {
        Self {
            quit_requested: false,
            current: self.current,
            previous: self.current,
        }
    }

    pub fn with_action_down(mut self, action: InputAction, is_down: bool) -> Self {
        self.current.set(action, is_down);
        self
    }

    pub fn with_quit_requested(mut self, quit_requested: bool) -> Self {
        self.quit_requested = quit_requested;
        self
    }

    pub fn quit_requested(&self) -> bool {
        self.quit_requested
    }

    pub fn is_down(&self, action: InputAction) -> bool {
        self.current.is_down(action)
    }

    pub fn was_down(&self, action: InputAction) -> bool {
        self.previous.is_down(action)
    }

    pub fn phase(&self, action: InputAction) -> ButtonPhase {
        phase_between(self.was_down(action), self.is_down(action))
    }

    pub fn started(&self, action: InputAction) -> bool {
        self.phase(action) == ButtonPhase::Started
    }

    pub fn released(&self, action: InputAction) -> bool {
        self.phase(action) == ButtonPhase::Released
    }

    pub fn is_idle(&self) -> bool {
        !self.quit_requested && !self.current.any_down() && !self.previous.any_down()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub u64);

/// Integer cell coordinate on the floor grid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GridPos {
    pub x: i32,
    pub y: i32,
}

impl GridPos {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }

    /// Euclidean distance in grid units; diagonal neighbours are ~1.414 apart.
    pub fn distance(self, other: GridPos) -> f32 {
        let dx = (self.x - other.x) as f32;
        let dy = (self.y - other.y) as f32;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn chebyshev(self, other: GridPos) -> i32 {
        (self.x - other.x).abs().max((self.y - other.y).abs())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl From<GridPos> for Vec2 {
    fn from(value: GridPos) -> Self {
        Self {
            x: value.x as f32,
            y: value.y as f32,
        }
    }
}

pub const CAMERA_ZOOM_DEFAULT: f32 = 1.0;
pub const CAMERA_ZOOM_MIN: f32 = 0.5;
pub const CAMERA_ZOOM_MAX: f32 = 2.0;

#[derive(Debug, Clone, Copy)]
pub struct Camera2D {
    pub position: Vec2,
    pub zoom: f32,
    follow: Option<EntityId>,
    attach_count: u32,
}

impl Default for Camera2D {
    fn default() -> Self {
        Self {
            position: Vec2::default(),
            zoom: CAMERA_ZOOM_DEFAULT,
            follow: None,
            attach_count: 0,
        }
    }
}

impl Camera2D {
    pub fn effective_zoom(&self) -> f32 {
        clamp_camera_zoom(self.zoom)
    }

    pub fn set_zoom_clamped(&mut self, zoom: f32) {
        self.zoom = clamp_camera_zoom(zoom);
    }

    pub fn attach_to(&mut self, target: EntityId, zoom: f32) {
        self.follow = Some(target);
        self.set_zoom_clamped(zoom);
        self.attach_count = self.attach_count.saturating_add(1);
    }

    pub fn detach(&mut self) {
        self.follow = None;
    }

    pub fn follow_target(&self) -> Option<EntityId> {
        self.follow
    }

    /// Number of `attach_to` calls since the camera was created or cleared.
    pub fn attach_count(&self) -> u32 {
        self.attach_count
    }

    pub fn pan(&mut self, delta: Vec2) {
        self.position.x += delta.x;
        self.position.y += delta.y;
    }
}

fn clamp_camera_zoom(zoom: f32) -> f32 {
    if !zoom.is_finite() {
        return CAMERA_ZOOM_DEFAULT;
    }
    zoom.clamp(CAMERA_ZOOM_MIN, CAMERA_ZOOM_MAX)
}

/// Row-major tile grid; cell (0,0) is the bottom-left corner and `y` grows upward.
#[derive(Debug, Clone, PartialEq)]
pub struct Tilemap {
    width: u32,
    height: u32,
    tiles: Vec<u16>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TilemapError {
    #[error("tile count mismatch: expected {expected}, got {actual}")]
    TileCountMismatch { expected: usize, actual: usize },
}

impl Tilemap {
    pub fn new(width: u32, height: u32, tiles: Vec<u16>) -> Result<Self, TilemapError> {
        let expected = width as usize * height as usize;
        let actual = tiles.len();
        if expected != actual {
            return Err(TilemapError::TileCountMismatch { expected, actual });
        }
        Ok(Self {
            width,
            height,
            tiles,
        })
    }

    pub fn filled(width: u32, height: u32, tile: u16) -> Self {
        Self {
            width,
            height,
            tiles: vec![tile; width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn contains(&self, pos: GridPos) -> bool {
        self.index_of(pos).is_some()
    }

    pub fn index_of(&self, pos: GridPos) -> Option<usize> {
        if pos.x < 0 || pos.y < 0 {
            return None;
        }
        let (x, y) = (pos.x as u32, pos.y as u32);
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(y as usize * self.width as usize + x as usize)
    }

    pub fn tile_at(&self, pos: GridPos) -> Option<u16> {
        self.index_of(pos)
            .and_then(|index| self.tiles.get(index).copied())
    }

    pub fn set_tile(&mut self, pos: GridPos, tile: u16) -> bool {
        match self.index_of(pos) {
            Some(index) => {
                self.tiles[index] = tile;
                true
            }
            None => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Entity {
    pub id: EntityId,
    pub name: String,
    pub position: GridPos,
    pub active: bool,
    pub blocks_movement: bool,
}

#[derive(Debug, Default)]
pub struct EntityIdAllocator {
    next: u64,
}

impl EntityIdAllocator {
    pub fn allocate(&mut self) -> EntityId {
        let id = EntityId(self.next);
        self.next = self.next.saturating_add(1);
        id
    }
}

/// Engine-side object store. Spawns land immediately; `destroy` only queues the
/// object, which stays visible until `apply_pending` runs at the end of the tick.
#[derive(Debug, Default)]
pub struct SceneWorld {
    allocator: EntityIdAllocator,
    entities: Vec<Entity>,
    pending_destroys: Vec<EntityId>,
    camera: Camera2D,
    tilemap: Option<Tilemap>,
    templates: Option<TemplateDatabase>,
}

impl SceneWorld {
    pub fn spawn(
        &mut self,
        name: impl Into<String>,
        position: GridPos,
        blocks_movement: bool,
    ) -> EntityId {
        let id = self.allocator.allocate();
        self.entities.push(Entity {
            id,
            name: name.into(),
            position,
            active: true,
            blocks_movement,
        });
        id
    }

    pub fn destroy(&mut self, id: EntityId) -> bool {
        if !self.contains(id) {
            return false;
        }
        self.pending_destroys.push(id);
        true
    }

    pub fn is_pending_destroy(&self, id: EntityId) -> bool {
        self.pending_destroys.contains(&id)
    }

    pub fn apply_pending(&mut self) {
        if self.pending_destroys.is_empty() {
            return;
        }
        self.pending_destroys.sort();
        self.pending_destroys.dedup();
        let pending = &self.pending_destroys;
        self.entities
            .retain(|entity| pending.binary_search(&entity.id).is_err());
        if let Some(follow) = self.camera.follow {
            if self.pending_destroys.binary_search(&follow).is_ok() {
                self.camera.detach();
            }
        }
        self.pending_destroys.clear();
    }

    pub fn clear(&mut self) {
        self.entities.clear();
        self.pending_destroys.clear();
        self.camera = Camera2D::default();
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.iter().any(|entity| entity.id == id)
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn find_entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.iter().find(|entity| entity.id == id)
    }

    pub fn find_entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.iter_mut().find(|entity| entity.id == id)
    }

    pub fn set_active(&mut self, id: EntityId, active: bool) -> bool {
        match self.find_entity_mut(id) {
            Some(entity) => {
                entity.active = active;
                true
            }
            None => false,
        }
    }

    pub fn camera(&self) -> &Camera2D {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera2D {
        &mut self.camera
    }

    /// Moves the camera onto its follow target, if it has one that still exists.
    pub fn sync_camera(&mut self) {
        let Some(target) = self.camera.follow else {
            return;
        };
        if let Some(position) = self.find_entity(target).map(|entity| entity.position) {
            self.camera.position = position.into();
        }
    }

    pub fn set_tilemap(&mut self, tilemap: Tilemap) {
        self.tilemap = Some(tilemap);
    }

    pub fn tilemap(&self) -> Option<&Tilemap> {
        self.tilemap.as_ref()
    }

    pub fn set_template_database(&mut self, templates: TemplateDatabase) {
        self.templates = Some(templates);
    }

    pub fn template_database(&self) -> Option<&TemplateDatabase> {
        self.templates.as_ref()
    }
}

pub trait Scene {
    fn load(&mut self, world: &mut SceneWorld);
    fn update(
        &mut self,
        fixed_dt_seconds: f32,
        input: &InputSnapshot,
        world: &mut SceneWorld,
    ) -> SceneCommand;
    fn render(&mut self, world: &SceneWorld);
    fn unload(&mut self, world: &mut SceneWorld);
    fn debug_title(&self, _world: &SceneWorld) -> Option<String> {
        None
    }
}

/// Owns one scene and its world, and drives the load/tick/unload lifecycle.
pub struct SceneHost {
    scene: Box<dyn Scene>,
    world: SceneWorld,
    is_loaded: bool,
}

impl SceneHost {
    pub fn new(scene: Box<dyn Scene>, world: SceneWorld) -> Self {
        Self {
            scene,
            world,
            is_loaded: false,
        }
    }

    pub fn load(&mut self) {
        if self.is_loaded {
            return;
        }
        self.scene.load(&mut self.world);
        self.world.apply_pending();
        self.is_loaded = true;
    }

    /// Runs one fixed tick, then applies destruction queued during it.
    pub fn step(&mut self, fixed_dt_seconds: f32, input: &InputSnapshot) -> SceneCommand {
        if !self.is_loaded {
            return SceneCommand::None;
        }
        let command = self.scene.update(fixed_dt_seconds, input, &mut self.world);
        self.world.apply_pending();
        command
    }

    pub fn render(&mut self) {
        if self.is_loaded {
            self.scene.render(&self.world);
        }
    }

    pub fn shutdown(&mut self) {
        if !self.is_loaded {
            return;
        }
        self.scene.unload(&mut self.world);
        self.world.clear();
        self.is_loaded = false;
    }

    pub fn is_loaded(&self) -> bool {
        self.is_loaded
    }

    pub fn debug_title(&self) -> Option<String> {
        self.scene.debug_title(&self.world)
    }

    pub fn world(&self) -> &SceneWorld {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut SceneWorld {
        &mut self.world
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SpawnScene {
        spawn_count: usize,
    }

    impl Scene for SpawnScene {
        fn load(&mut self, world: &mut SceneWorld) {
            for index in 0..self.spawn_count {
                world.spawn("crate", GridPos::new(index as i32, 0), false);
            }
        }

        fn update(
            &mut self,
            _fixed_dt_seconds: f32,
            input: &InputSnapshot,
            world: &mut SceneWorld,
        ) -> SceneCommand {
            if input.quit_requested() {
                return SceneCommand::Quit;
            }
            if let Some(first) = world.entities().first().map(|entity| entity.id) {
                world.destroy(first);
            }
            SceneCommand::None
        }

        fn render(&mut self, _world: &SceneWorld) {}

        fn unload(&mut self, _world: &mut SceneWorld) {}
    }

    #[test]
    fn allocator_never_reuses_ids() {
        let mut allocator = EntityIdAllocator::default();
        let first = allocator.allocate();
        let second = allocator.allocate();
        let third = allocator.allocate();

        assert_eq!(first.0, 0);
        assert_eq!(second.0, 1);
        assert_eq!(third.0, 2);
    }

    #[test]
    fn spawn_is_immediate_and_destroy_is_deferred() {
        let mut world = SceneWorld::default();
        let id = world.spawn("Goblin", GridPos::new(2, 3), true);
        assert_eq!(world.entity_count(), 1);
        assert!(world.find_entity(id).is_some_and(|entity| entity.active));

        assert!(world.destroy(id));
        assert!(world.contains(id));
        assert!(world.is_pending_destroy(id));

        world.apply_pending();
        assert!(!world.contains(id));
        assert!(!world.destroy(id));
    }

    #[test]
    fn duplicate_destroys_are_safe_and_idempotent() {
        let mut world = SceneWorld::default();
        let doomed = world.spawn("doomed", GridPos::new(0, 0), false);
        let survivor = world.spawn("survivor", GridPos::new(3, 1), false);

        assert!(world.destroy(doomed));
        assert!(world.destroy(doomed));
        world.apply_pending();

        assert_eq!(world.entity_count(), 1);
        assert!(world.find_entity(doomed).is_none());
        assert!(world.find_entity(survivor).is_some());
    }

    #[test]
    fn set_active_reports_missing_entities() {
        let mut world = SceneWorld::default();
        let id = world.spawn("Potion", GridPos::new(1, 1), false);
        assert!(world.set_active(id, false));
        assert!(world.find_entity(id).is_some_and(|entity| !entity.active));
        assert!(!world.set_active(EntityId(99), true));
    }

    #[test]
    fn camera_follows_target_and_detaches_when_it_is_destroyed() {
        let mut world = SceneWorld::default();
        let player = world.spawn("Player", GridPos::new(4, 5), true);
        world.camera_mut().attach_to(player, 1.5);
        world.sync_camera();

        assert_eq!(world.camera().position, Vec2 { x: 4.0, y: 5.0 });
        assert_eq!(world.camera().attach_count(), 1);
        assert!((world.camera().zoom - 1.5).abs() < 0.0001);

        world.destroy(player);
        world.apply_pending();
        assert!(world.camera().follow_target().is_none());
    }

    #[test]
    fn camera_zoom_is_clamped_on_attach() {
        let mut camera = Camera2D::default();
        camera.attach_to(EntityId(1), 50.0);
        assert!((camera.zoom - CAMERA_ZOOM_MAX).abs() < 0.0001);
        camera.set_zoom_clamped(f32::NAN);
        assert!((camera.zoom - CAMERA_ZOOM_DEFAULT).abs() < 0.0001);
        camera.set_zoom_clamped(0.01);
        assert!((camera.effective_zoom() - CAMERA_ZOOM_MIN).abs() < 0.0001);
    }

    #[test]
    fn clear_keeps_tilemap_and_templates() {
        let mut world = SceneWorld::default();
        world.set_tilemap(Tilemap::filled(3, 2, 7));
        world.set_template_database(TemplateDatabase::default());
        world.spawn("Player", GridPos::new(0, 0), true);
        world.clear();

        assert_eq!(world.entity_count(), 0);
        assert!(world.template_database().is_some());
        assert_eq!(world.tilemap().and_then(|map| map.tile_at(GridPos::new(2, 1))), Some(7));
    }

    #[test]
    fn tilemap_new_rejects_invalid_tile_count() {
        let err = Tilemap::new(2, 2, vec![0, 1, 2]).expect_err("err");
        assert_eq!(
            err,
            TilemapError::TileCountMismatch {
                expected: 4,
                actual: 3
            }
        );
    }

    #[test]
    fn tilemap_indexing_and_bounds() {
        let mut tilemap = Tilemap::new(2, 2, vec![10, 11, 12, 13]).expect("tilemap");
        assert_eq!(tilemap.index_of(GridPos::new(1, 1)), Some(3));
        assert_eq!(tilemap.tile_at(GridPos::new(1, 0)), Some(11));
        assert_eq!(tilemap.tile_at(GridPos::new(-1, 0)), None);
        assert_eq!(tilemap.tile_at(GridPos::new(0, 2)), None);
        assert!(tilemap.set_tile(GridPos::new(0, 1), 5));
        assert_eq!(tilemap.tile_at(GridPos::new(0, 1)), Some(5));
        assert!(!tilemap.set_tile(GridPos::new(9, 9), 5));
    }

    #[test]
    fn grid_distance_matches_euclidean_and_chebyshev() {
        let origin = GridPos::new(0, 0);
        assert!((origin.distance(GridPos::new(1, 1)) - 2f32.sqrt()).abs() < 0.0001);
        assert!((origin.distance(GridPos::new(3, 0)) - 3.0).abs() < 0.0001);
        assert_eq!(origin.chebyshev(GridPos::new(2, -3)), 3);
        assert_eq!(origin.offset(1, -1), GridPos::new(1, -1));
    }

    #[test]
    fn snapshot_edges_follow_frames() {
        let pressed = InputSnapshot::empty().with_action_down(InputAction::MoveUp, true);
        assert!(pressed.started(InputAction::MoveUp));

        let held = pressed.next_frame_held();
        assert!(held.is_down(InputAction::MoveUp));
        assert!(!held.started(InputAction::MoveUp));

        let released = held.next_frame();
        assert!(released.released(InputAction::MoveUp));
        assert!(!released.started(InputAction::MoveUp));
        assert!(released.next_frame().is_idle());
    }

    #[test]
    fn host_step_applies_destruction_after_update() {
        let mut host = SceneHost::new(
            Box::new(SpawnScene { spawn_count: 2 }),
            SceneWorld::default(),
        );
        assert_eq!(host.step(0.1, &InputSnapshot::empty()), SceneCommand::None);
        assert_eq!(host.world().entity_count(), 0);

        host.load();
        host.load();
        assert_eq!(host.world().entity_count(), 2);

        host.step(0.1, &InputSnapshot::empty());
        assert_eq!(host.world().entity_count(), 1);

        let quit = InputSnapshot::empty().with_quit_requested(true);
        assert_eq!(host.step(0.1, &quit), SceneCommand::Quit);

        host.shutdown();
        assert!(!host.is_loaded());
        assert_eq!(host.world().entity_count(), 0);
    }
}
