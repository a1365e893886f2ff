/// Owns the entity registry, the actor turn queue and everything attached to them.
/// Created once per scene load and passed explicitly alongside the `SceneWorld`.
struct GameSession {
    entities: Vec<EntityId>,
    actors: Vec<EntityId>,
    actor_data: HashMap<EntityId, Actor>,
    item_data: HashMap<EntityId, Item>,
    turns: TurnScheduler,
    ui: UiState,
    pending_load: Option<EntityStateLoader>,
    player_zoom: f32,
}

impl GameSession {
    fn new(base_turn_time: Duration, player_zoom: f32) -> Self {
        Self {
            entities: Vec::new(),
            actors: Vec::new(),
            actor_data: HashMap::new(),
            item_data: HashMap::new(),
            turns: TurnScheduler::new(base_turn_time),
            ui: UiState::default(),
            pending_load: None,
            player_zoom,
        }
    }

    fn add_entity(&mut self, world: &mut SceneWorld, entity: EntityId) {
        activate_if_inactive(world, entity);
        self.entities.push(entity);
    }

    fn insert_entity(&mut self, world: &mut SceneWorld, entity: EntityId, index: usize) {
        activate_if_inactive(world, entity);
        let index = index.min(self.entities.len());
        self.entities.insert(index, entity);
    }

    /// Deactivates and unregisters `entity`. Does nothing if its world object is already gone.
    fn remove_entity(&mut self, world: &mut SceneWorld, entity: EntityId) -> bool {
        if !world.contains(entity) {
            debug!(entity = entity.0, "remove_entity_skipped_missing_object");
            return false;
        }
        world.set_active(entity, false);
        if let Some(index) = self.entities.iter().position(|id| *id == entity) {
            self.entities.remove(index);
        }
        true
    }

    fn add_actor(&mut self, actor: EntityId) {
        self.actors.push(actor);
        self.turns.recompute_delay(self.actors.len());
    }

    fn insert_actor(&mut self, actor: EntityId, index: usize) {
        let index = index.min(self.actors.len());
        self.actors.insert(index, actor);
        if index <= self.turns.current && self.actors.len() > 1 {
            self.turns.current += 1;
        }
        self.turns.recompute_delay(self.actors.len());
    }

    fn remove_actor(&mut self, actor: EntityId) {
        if let Some(index) = self.actors.iter().position(|id| *id == actor) {
            self.actors.remove(index);
            if index < self.turns.current {
                self.turns.current -= 1;
            }
        }
        self.turns.recompute_delay(self.actors.len());
    }

    fn get_actor_at_location(&self, world: &SceneWorld, position: GridPos) -> Option<EntityId> {
        self.actors.iter().copied().find(|id| {
            world
                .find_entity(*id)
                .is_some_and(|entity| entity.blocks_movement && entity.position == position)
        })
    }

    fn player_id(&self) -> Option<EntityId> {
        self.actors
            .first()
            .copied()
            .filter(|id| self.actor_data.get(id).is_some_and(|actor| actor.is_player))
    }

    fn player(&self) -> Option<&Actor> {
        self.player_id().and_then(|id| self.actor_data.get(&id))
    }

    fn is_player(&self, id: EntityId) -> bool {
        self.actor_data.get(&id).is_some_and(|actor| actor.is_player)
    }

    /// Destroys every registered entity. With `can_remove_player == false` the
    /// player at index 0 (and what it carries) survives; otherwise both
    /// collections end up empty.
    fn reset(&mut self, world: &mut SceneWorld, can_remove_player: bool) {
        let keep = if can_remove_player {
            None
        } else {
            self.player_id()
        };

        for index in (0..self.entities.len()).rev() {
            let entity = self.entities[index];
            if Some(entity) == keep {
                continue;
            }
            self.destroy_with_inventory(world, entity);
        }

        match keep {
            Some(player) => {
                self.entities.clear();
                self.entities.push(player);
                self.actors.clear();
                self.actors.push(player);
            }
            None => {
                self.entities.clear();
                self.actors.clear();
            }
        }
        self.turns.current = 0;
        self.turns.recompute_delay(self.actors.len());
        debug!(
            can_remove_player,
            entity_count = self.entities.len(),
            actor_count = self.actors.len(),
            "registry_reset"
        );
    }

    fn destroy_with_inventory(&mut self, world: &mut SceneWorld, entity: EntityId) {
        if let Some(actor) = self.actor_data.remove(&entity) {
            for item in actor.inventory.items {
                self.item_data.remove(&item);
                world.destroy(item);
            }
        }
        self.item_data.remove(&entity);
        world.destroy(entity);
    }

    /// Spawn collaborator: instantiates the template `name` at `position` and
    /// registers it. The player goes to index 0 of both collections.
    fn create_entity(
        &mut self,
        world: &mut SceneWorld,
        name: &str,
        position: GridPos,
    ) -> Result<EntityId, LoadError> {
        let template = world
            .template_database()
            .ok_or(LoadError::MissingTemplates)?
            .template_by_name(name)
            .cloned()
            .ok_or_else(|| LoadError::UnknownEntity {
                name: name.to_string(),
            })?;

        let id = world.spawn(template.def_name.clone(), position, template.blocks_movement);
        match &template.kind {
            TemplateKind::Actor(actor_template) => {
                let actor = Actor::from_template(actor_template);
                let is_player = actor.is_player;
                self.actor_data.insert(id, actor);
                if is_player {
                    self.insert_entity(world, id, 0);
                    self.insert_actor(id, 0);
                    // A freshly placed player always takes the next turn.
                    self.turns.current = 0;
                } else {
                    self.add_entity(world, id);
                    self.add_actor(id);
                }
                self.update_field_of_view(world, id);
            }
            TemplateKind::Item(item_template) => {
                self.item_data.insert(
                    id,
                    Item {
                        owner: None,
                        consumable: item_template.consumable,
                    },
                );
                self.add_entity(world, id);
            }
        }
        debug!(entity = id.0, name, x = position.x, y = position.y, "entity_created");
        Ok(id)
    }

    fn refresh_player(&mut self, world: &SceneWorld) {
        if let Some(player) = self.player_id() {
            self.update_field_of_view(world, player);
        }
    }

    fn update_field_of_view(&mut self, world: &SceneWorld, id: EntityId) {
        let Some(position) = world.find_entity(id).map(|entity| entity.position) else {
            return;
        };
        let Some(actor) = self.actor_data.get_mut(&id) else {
            return;
        };
        actor.field_of_view = match world.tilemap() {
            Some(tilemap) => compute_field_of_view(tilemap, position, actor.fov_radius),
            None => HashSet::from([position]),
        };
    }

    fn entity_name<'w>(&self, world: &'w SceneWorld, id: EntityId) -> &'w str {
        world
            .find_entity(id)
            .map(|entity| entity.name.as_str())
            .unwrap_or("something")
    }
}

fn activate_if_inactive(world: &mut SceneWorld, entity: EntityId) {
    if world.find_entity(entity).is_some_and(|object| !object.active) {
        world.set_active(entity, true);
    }
}
