/// Runtime settings for the gameplay scene, filled in by bootstrap.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct GameplayConfig {
    pub(crate) base_turn_time: Duration,
    pub(crate) player_zoom: f32,
    pub(crate) autosave_on_first_move: bool,
    pub(crate) save_path: PathBuf,
}

struct GameplayScene {
    config: GameplayConfig,
    session: GameSession,
    player: PlayerController,
    saves: SaveManager,
    last_render: String,
    failed: bool,
}

impl GameplayScene {
    fn new(config: GameplayConfig) -> Self {
        Self {
            session: GameSession::new(config.base_turn_time, config.player_zoom),
            player: PlayerController::new(config.autosave_on_first_move),
            saves: SaveManager::new(config.save_path.clone()),
            config,
            last_render: String::new(),
            failed: false,
        }
    }

    fn start_fresh_floor(&mut self, world: &mut SceneWorld, floor: u32, place_player: bool) {
        let layout = starter_floor_layout(floor);
        match self.session.populate_floor(world, &layout, place_player) {
            Ok(()) => self.session.start_turn(world),
            Err(error) => {
                error!(error = %error, floor, "floor_populate_failed");
                self.failed = true;
            }
        }
    }

    fn autosave(&mut self, world: &mut SceneWorld) {
        if let Err(error) = self.saves.save_game(&mut self.session, world) {
            warn!(error = %error, "autosave_failed");
        }
    }

    /// Stores the current floor, then restores or builds the next one around the kept player.
    fn descend(&mut self, world: &mut SceneWorld) {
        let floor = self.saves.current_floor();
        let state = self.session.save_state(world);
        self.saves.store_scene(floor, state);

        let next = floor.saturating_add(1);
        self.saves.set_current_floor(next);
        self.player = PlayerController {
            game_saved: self.player.game_saved,
            ..PlayerController::new(self.config.autosave_on_first_move)
        };
        match self.saves.scene_state(next).cloned() {
            Some(state) => {
                world.set_tilemap(starter_floor_layout(next).tilemap);
                self.session.load_state(world, state, false);
            }
            None => {
                self.session.reset(world, false);
                self.start_fresh_floor(world, next, false);
            }
        }
        info!(from = floor, to = next, "floor_changed");
        if let Err(error) = self.saves.write_to_disk() {
            warn!(error = %error, "save_after_descend_failed");
        }
    }

    fn pump_load(&mut self, world: &mut SceneWorld) -> SceneCommand {
        match self.session.pump_load(world) {
            Ok(LoadProgress::Finished { .. }) => {
                if let Some(player) = self.session.player_id() {
                    world.camera_mut().attach_to(player, self.config.player_zoom);
                    world.sync_camera();
                }
                SceneCommand::None
            }
            Ok(_) => SceneCommand::None,
            Err(error) => {
                error!(error = %error, floor = self.saves.current_floor(), "scene_load_aborted");
                self.failed = true;
                SceneCommand::Quit
            }
        }
    }

    fn update_camera(&self, fixed_dt_seconds: f32, input: &InputSnapshot, world: &mut SceneWorld) {
        if world.camera().follow_target().is_some() {
            world.sync_camera();
            return;
        }
        let (dx, dy) = InputAction::ALL
            .into_iter()
            .filter(|action| input.is_down(*action))
            .filter_map(InputAction::direction)
            .fold((0, 0), |(x, y), (dx, dy)| (x + dx, y + dy));
        if dx == 0 && dy == 0 {
            return;
        }
        let step = CAMERA_SPEED_UNITS_PER_SECOND * fixed_dt_seconds;
        world.camera_mut().pan(Vec2 {
            x: dx.signum() as f32 * step,
            y: dy.signum() as f32 * step,
        });
    }

    fn status_line(&self) -> String {
        let hp = self
            .session
            .player()
            .map(|player| format!("{}/{}", player.fighter.hp, player.fighter.max_hp))
            .unwrap_or_else(|| "-".to_string());
        let message = self
            .session
            .ui
            .last_message()
            .map(|message| message.text.as_str())
            .unwrap_or("");
        format!("Floor {}  HP {hp}  {message}", self.saves.current_floor())
    }
}

impl Scene for GameplayScene {
    fn load(&mut self, world: &mut SceneWorld) {
        self.session = GameSession::new(self.config.base_turn_time, self.config.player_zoom);
        self.player = PlayerController::new(self.config.autosave_on_first_move);
        self.saves = SaveManager::open(self.config.save_path.clone());
        self.failed = false;

        let floor = self.saves.current_floor();
        match self.saves.scene_state(floor).cloned() {
            Some(state) => {
                world.set_tilemap(starter_floor_layout(floor).tilemap);
                self.session.load_state(world, state, true);
            }
            None => self.start_fresh_floor(world, floor, true),
        }
        info!(
            floor,
            loading = self.session.is_loading(),
            entity_count = world.entity_count(),
            "scene_loaded"
        );
    }

    fn update(
        &mut self,
        fixed_dt_seconds: f32,
        input: &InputSnapshot,
        world: &mut SceneWorld,
    ) -> SceneCommand {
        if self.failed {
            return SceneCommand::Quit;
        }
        if self.session.is_loading() {
            return self.pump_load(world);
        }

        let dt = Duration::try_from_secs_f32(fixed_dt_seconds).unwrap_or(Duration::ZERO);
        self.session.tick_turns(world, dt);

        let requests = self.player.update(&mut self.session, world, input);
        if requests.autosave {
            self.autosave(world);
        }
        self.player.perform_armed_move(&mut self.session, world);
        if requests.take_stairs {
            self.descend(world);
        }
        self.update_camera(fixed_dt_seconds, input, world);
        SceneCommand::None
    }

    fn render(&mut self, world: &SceneWorld) {
        if self.session.is_loading() {
            return;
        }
        let frame = format!("{}{}", self.session.render_ascii(world), self.status_line());
        if frame != self.last_render {
            println!("{frame}\n");
            self.last_render = frame;
        }
    }

    fn unload(&mut self, world: &mut SceneWorld) {
        if !self.failed && !self.session.is_loading() && self.session.player_id().is_some() {
            self.autosave(world);
        }
        self.session.reset(world, true);
        info!(floor = self.saves.current_floor(), "scene_unloaded");
    }

    fn debug_title(&self, world: &SceneWorld) -> Option<String> {
        let turn = if self.session.turns.is_player_turn {
            "player"
        } else {
            "enemies"
        };
        Some(format!(
            "crawl | floor {} | turn {turn} | actors {} | entities {} | zoom {:.1}",
            self.saves.current_floor(),
            self.session.actors.len(),
            self.session.entities.len(),
            world.camera().effective_zoom()
        ))
    }
}
