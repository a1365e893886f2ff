/// Rebuilds a `GameState` one record per `pump_load` call, in save order.
#[derive(Debug, Clone)]
struct EntityStateLoader {
    records: Vec<EntityState>,
    next: usize,
    can_place_player: bool,
}

impl EntityStateLoader {
    fn new(records: Vec<EntityState>, can_place_player: bool) -> Self {
        Self {
            records,
            next: 0,
            can_place_player,
        }
    }

    fn is_finished(&self) -> bool {
        self.next >= self.records.len()
    }
}

fn spawn_name_for_actor(saved_name: &str) -> &str {
    saved_name
        .strip_prefix(REMAINS_PREFIX)
        .unwrap_or(saved_name)
}

fn spawn_name_for_item(saved_name: &str) -> &str {
    saved_name
        .strip_suffix(EQUIPPED_SUFFIX)
        .unwrap_or(saved_name)
}

impl GameSession {
    /// Snapshots every registered entity plus the player's carried items.
    /// The registry is left exactly as it was found.
    fn save_state(&mut self, world: &mut SceneWorld) -> GameState {
        let carried = self
            .player()
            .map(|player| player.inventory.items.clone())
            .unwrap_or_default();
        for item in &carried {
            self.add_entity(world, *item);
        }

        let entities = self
            .entities
            .iter()
            .filter_map(|id| self.entity_state(world, *id))
            .collect::<Vec<_>>();

        for item in &carried {
            self.remove_entity(world, *item);
        }
        debug!(record_count = entities.len(), carried = carried.len(), "state_saved");
        GameState { entities }
    }

    fn entity_state(&self, world: &SceneWorld, id: EntityId) -> Option<EntityState> {
        let entity = world.find_entity(id)?;
        if let Some(actor) = self.actor_data.get(&id) {
            return Some(EntityState::Actor(ActorState {
                name: entity.name.clone(),
                position: SavedGridPos::from_grid(entity.position),
                blocks_movement: entity.blocks_movement,
                is_alive: actor.is_alive,
                fighter: FighterState {
                    max_hp: actor.fighter.max_hp,
                    hp: actor.fighter.hp,
                    power: actor.fighter.power,
                    defense: actor.fighter.defense,
                },
                ai: actor.ai.map(|behavior| match behavior {
                    AiBehavior::Hostile(hostile) => AiState {
                        kind: AiKind::HostileEnemy,
                        is_fighting: hostile.is_fighting,
                    },
                }),
            }));
        }
        let item = self.item_data.get(&id)?;
        let parent = match item.owner {
            Some(owner) => self.entity_name(world, owner).to_string(),
            None => WORLD_PARENT.to_string(),
        };
        Some(EntityState::Item(ItemState {
            name: entity.name.clone(),
            position: SavedGridPos::from_grid(entity.position),
            parent,
        }))
    }

    /// Clears the registries and queues `state` for step-wise reconstruction.
    /// With `can_remove_player == false` the current player is kept and only
    /// repositioned by its record.
    fn load_state(&mut self, world: &mut SceneWorld, state: GameState, can_remove_player: bool) {
        self.turns.is_player_turn = false;
        self.reset(world, can_remove_player);
        if self.pending_load.is_some() {
            warn!("pending_load_replaced");
        }
        info!(
            record_count = state.entities.len(),
            can_remove_player, "load_started"
        );
        self.pending_load = Some(EntityStateLoader::new(state.entities, can_remove_player));
    }

    fn is_loading(&self) -> bool {
        self.pending_load.is_some()
    }

    /// Processes at most one pending record. A failure drops the rest of the load.
    fn pump_load(&mut self, world: &mut SceneWorld) -> Result<LoadProgress, LoadError> {
        let Some(mut loader) = self.pending_load.take() else {
            return Ok(LoadProgress::Idle);
        };

        if let Some(record) = loader.records.get(loader.next).cloned() {
            if let Err(error) = self.load_record(world, &record, loader.can_place_player) {
                self.turns.is_player_turn = false;
                let position = record.position();
                error!(
                    error = %error,
                    index = loader.next,
                    name = record.name(),
                    x = position.x,
                    y = position.y,
                    "load_failed"
                );
                return Err(error);
            }
            loader.next += 1;
        }

        let total = loader.records.len();
        if loader.is_finished() {
            self.turns.is_player_turn = true;
            info!(
                entity_count = self.entities.len(),
                actor_count = self.actors.len(),
                "load_finished"
            );
            return Ok(LoadProgress::Finished { total });
        }

        let loaded = loader.next;
        self.pending_load = Some(loader);
        Ok(LoadProgress::InProgress { loaded, total })
    }

    fn load_record(
        &mut self,
        world: &mut SceneWorld,
        record: &EntityState,
        can_place_player: bool,
    ) -> Result<(), LoadError> {
        match record {
            EntityState::Actor(state) => {
                let name = spawn_name_for_actor(&state.name);
                if name == PLAYER_NAME && !can_place_player {
                    if let Some(player) = self.player_id() {
                        if let Some(entity) = world.find_entity_mut(player) {
                            entity.position = state.position.to_grid();
                        }
                        self.refresh_player(world);
                        return Ok(());
                    }
                    warn!("player_missing_during_keep_load; spawning from record");
                }
                let id = self.create_entity(world, name, state.position.to_grid())?;
                self.apply_actor_state(world, id, state)
            }
            EntityState::Item(state) => {
                if state.parent == PLAYER_NAME && !can_place_player {
                    return Ok(());
                }
                let name = spawn_name_for_item(&state.name);
                let id = self.create_entity(world, name, state.position.to_grid())?;
                self.apply_item_state(world, id, state)
            }
        }
    }

    fn apply_actor_state(
        &mut self,
        world: &mut SceneWorld,
        id: EntityId,
        state: &ActorState,
    ) -> Result<(), LoadError> {
        if !self.actor_data.contains_key(&id) {
            return Err(LoadError::KindMismatch {
                name: state.name.clone(),
                expected: "an actor",
                actual: "an item",
            });
        }
        if let Some(entity) = world.find_entity_mut(id) {
            entity.name = state.name.clone();
            entity.blocks_movement = state.blocks_movement;
        }
        let is_alive = state.is_alive;
        let is_player = match self.actor_data.get_mut(&id) {
            Some(actor) => {
                actor.is_alive = is_alive;
                actor.fighter.max_hp = state.fighter.max_hp;
                actor.fighter.hp = state.fighter.hp;
                actor.fighter.power = state.fighter.power;
                actor.fighter.defense = state.fighter.defense;
                if let (Some(AiBehavior::Hostile(hostile)), Some(saved)) = (&mut actor.ai, state.ai)
                {
                    hostile.is_fighting = saved.is_fighting;
                    hostile.phase = if saved.is_fighting {
                        HostilePhase::Pursuing
                    } else {
                        HostilePhase::Idle
                    };
                }
                actor.is_player
            }
            None => false,
        };
        if !is_alive && !is_player {
            self.remove_actor(id);
        }
        Ok(())
    }

    fn apply_item_state(
        &mut self,
        world: &mut SceneWorld,
        id: EntityId,
        state: &ItemState,
    ) -> Result<(), LoadError> {
        if !self.item_data.contains_key(&id) {
            return Err(LoadError::KindMismatch {
                name: state.name.clone(),
                expected: "an item",
                actual: "an actor",
            });
        }
        if let Some(entity) = world.find_entity_mut(id) {
            entity.name = state.name.clone();
        }
        if state.parent == WORLD_PARENT {
            return Ok(());
        }

        let owner = self.actors.iter().copied().find(|actor| {
            world
                .find_entity(*actor)
                .is_some_and(|entity| entity.name == state.parent)
        });
        let Some(owner) = owner else {
            warn!(
                item = state.name.as_str(),
                parent = state.parent.as_str(),
                "item_owner_missing; leaving item on the floor"
            );
            return Ok(());
        };
        if let Some(actor) = self.actor_data.get_mut(&owner) {
            actor.inventory.items.push(id);
        }
        if let Some(item) = self.item_data.get_mut(&id) {
            item.owner = Some(owner);
        }
        self.remove_entity(world, id);
        Ok(())
    }
}

/// Keeps the on-disk save: one `GameState` per visited floor plus the current floor.
#[derive(Debug)]
struct SaveManager {
    path: PathBuf,
    save: SaveFile,
}

impl SaveManager {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            save: SaveFile::default(),
        }
    }

    /// Loads the save at `path`; a missing file starts a new save. An unreadable one is
    /// moved aside to `<path>.bad` and a new save starts.
    fn open(path: PathBuf) -> Self {
        if !path.exists() {
            info!(path = %path.display(), "save_not_found; starting new game");
            return Self::new(path);
        }
        match Self::read_from_disk(&path) {
            Ok(save) => {
                info!(
                    path = %path.display(),
                    current_floor = save.current_floor,
                    floors = save.scenes.len(),
                    "save_loaded"
                );
                Self { path, save }
            }
            Err(error) => {
                warn!(path = %path.display(), error = %error, "save_unusable; starting new game");
                let kept = unusable_save_path(&path);
                match fs::rename(&path, &kept) {
                    Ok(()) => info!(kept = %kept.display(), "unusable_save_moved"),
                    Err(error) => warn!(
                        path = %path.display(),
                        error = %error,
                        "unusable_save_move_failed"
                    ),
                }
                Self::new(path)
            }
        }
    }

    fn current_floor(&self) -> u32 {
        self.save.current_floor
    }

    fn set_current_floor(&mut self, floor: u32) {
        self.save.current_floor = floor;
    }

    fn scene_state(&self, floor: u32) -> Option<&GameState> {
        self.save
            .scenes
            .iter()
            .find(|scene| scene.floor_number == floor)
            .map(|scene| &scene.game_state)
    }

    fn store_scene(&mut self, floor: u32, game_state: GameState) {
        match self
            .save
            .scenes
            .iter_mut()
            .find(|scene| scene.floor_number == floor)
        {
            Some(scene) => scene.game_state = game_state,
            None => self.save.scenes.push(SceneState {
                floor_number: floor,
                game_state,
            }),
        }
    }

    /// Snapshots the current floor into the save and writes it out.
    fn save_game(&mut self, session: &mut GameSession, world: &mut SceneWorld) -> Result<(), SaveError> {
        let state = session.save_state(world);
        self.store_scene(self.current_floor(), state);
        self.write_to_disk()
    }

    fn write_to_disk(&self) -> Result<(), SaveError> {
        let json = serde_json::to_string_pretty(&self.save).map_err(SaveError::Encode)?;
        write_text_atomic(&self.path, &json).map_err(|source| SaveError::Write {
            path: self.path.clone(),
            source,
        })?;
        info!(
            path = %self.path.display(),
            current_floor = self.save.current_floor,
            "save_written"
        );
        Ok(())
    }

    fn read_from_disk(path: &Path) -> Result<SaveFile, SaveError> {
        let raw = fs::read_to_string(path).map_err(|source| SaveError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let save = parse_save_file(&raw)?;
        validate_save_file(&save)?;
        Ok(save)
    }
}

fn unusable_save_path(path: &Path) -> PathBuf {
    let mut kept = path.as_os_str().to_owned();
    kept.push(".bad");
    PathBuf::from(kept)
}

fn parse_save_file(raw: &str) -> Result<SaveFile, SaveError> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    serde_path_to_error::deserialize::<_, SaveFile>(&mut deserializer).map_err(|error| {
        let path = error.path().to_string();
        let location = if path.is_empty() || path == "." {
            String::new()
        } else {
            format!(" at {path}")
        };
        SaveError::Parse {
            location,
            source: error.into_inner(),
        }
    })
}

fn validate_save_file(save: &SaveFile) -> Result<(), SaveError> {
    if save.save_version != SAVE_VERSION {
        return Err(SaveError::expected_actual(
            "save_version",
            SAVE_VERSION,
            save.save_version,
        ));
    }
    if save.current_floor < FIRST_FLOOR {
        return Err(SaveError::expected_actual(
            "current_floor",
            format!(">= {FIRST_FLOOR}"),
            save.current_floor,
        ));
    }
    let mut seen_floors = HashSet::with_capacity(save.scenes.len());
    for (index, scene) in save.scenes.iter().enumerate() {
        if !seen_floors.insert(scene.floor_number) {
            return Err(SaveError::expected_actual(
                format!("scenes[{index}].floor_number"),
                "a floor number not used by an earlier scene",
                scene.floor_number,
            ));
        }
    }
    Ok(())
}
