const FLOOR_WIDTH: u32 = 24;
const FLOOR_HEIGHT: u32 = 14;

/// Fixed starter layout for a floor: one walled room split by a pillar, stairs in the far corner.
#[derive(Debug, Clone)]
struct FloorLayout {
    tilemap: Tilemap,
    player_start: GridPos,
    spawns: Vec<(&'static str, GridPos)>,
}

fn starter_floor_layout(floor: u32) -> FloorLayout {
    let mut tilemap = Tilemap::filled(FLOOR_WIDTH, FLOOR_HEIGHT, TILE_FLOOR);
    let right = FLOOR_WIDTH as i32 - 1;
    let top = FLOOR_HEIGHT as i32 - 1;
    for x in 0..=right {
        tilemap.set_tile(GridPos::new(x, 0), TILE_WALL);
        tilemap.set_tile(GridPos::new(x, top), TILE_WALL);
    }
    for y in 0..=top {
        tilemap.set_tile(GridPos::new(0, y), TILE_WALL);
        tilemap.set_tile(GridPos::new(right, y), TILE_WALL);
    }
    for y in 3..=top - 4 {
        tilemap.set_tile(GridPos::new(right / 2, y), TILE_WALL);
    }
    tilemap.set_tile(GridPos::new(right - 2, top - 2), TILE_STAIRS);

    let mut spawns = vec![
        ("Goblin", GridPos::new(14, 5)),
        ("Potion", GridPos::new(4, 10)),
        ("Lightning Scroll", GridPos::new(8, 3)),
    ];
    if floor >= 2 {
        spawns.push(("Orc", GridPos::new(18, 8)));
        spawns.push(("Fireball Scroll", GridPos::new(6, 7)));
    }
    // One extra goblin per floor below the first, stepping along the bottom row.
    let extra = floor.saturating_sub(FIRST_FLOOR).min(4) as i32;
    for index in 0..extra {
        spawns.push(("Goblin", GridPos::new(14 + 2 * index, 2)));
    }

    FloorLayout {
        tilemap,
        player_start: GridPos::new(2, 2),
        spawns,
    }
}

impl GameSession {
    /// Populates the current registry from `layout`. With `place_player` the player is
    /// spawned at the start cell, otherwise the existing player is moved there.
    fn populate_floor(
        &mut self,
        world: &mut SceneWorld,
        layout: &FloorLayout,
        place_player: bool,
    ) -> Result<(), LoadError> {
        world.set_tilemap(layout.tilemap.clone());
        match self.player_id().filter(|_| !place_player) {
            Some(player) => {
                if let Some(entity) = world.find_entity_mut(player) {
                    entity.position = layout.player_start;
                }
            }
            None => {
                self.create_entity(world, PLAYER_NAME, layout.player_start)?;
            }
        }
        for (name, position) in &layout.spawns {
            self.create_entity(world, name, *position)?;
        }
        self.refresh_player(world);
        info!(
            entity_count = self.entities.len(),
            actor_count = self.actors.len(),
            "floor_populated"
        );
        Ok(())
    }

    /// Top-down text view of the floor; later rows have lower `y`.
    fn render_ascii(&self, world: &SceneWorld) -> String {
        let Some(tilemap) = world.tilemap() else {
            return String::new();
        };
        let width = tilemap.width() as i32;
        let height = tilemap.height() as i32;
        let mut glyphs = HashMap::new();
        for id in &self.entities {
            let Some(entity) = world.find_entity(*id) else {
                continue;
            };
            if !entity.active {
                continue;
            }
            let glyph = match self.actor_data.get(id) {
                Some(actor) if actor.is_player => '@',
                Some(actor) if !actor.is_alive => '%',
                Some(_) => entity.name.chars().next().unwrap_or('?'),
                None => '!',
            };
            // Living actors draw over items and corpses.
            let priority = u8::from(self.actor_data.get(id).is_some_and(|actor| actor.is_alive));
            glyphs
                .entry(entity.position)
                .and_modify(|current: &mut (u8, char)| {
                    if priority >= current.0 {
                        *current = (priority, glyph);
                    }
                })
                .or_insert((priority, glyph));
        }

        let mut out = String::with_capacity(((width + 1) * height) as usize);
        for y in (0..height).rev() {
            for x in 0..width {
                let cell = GridPos::new(x, y);
                let glyph = match glyphs.get(&cell) {
                    Some((_, glyph)) => *glyph,
                    None => match tilemap.tile_at(cell) {
                        Some(TILE_WALL) => '#',
                        Some(TILE_STAIRS) => '>',
                        _ => '.',
                    },
                };
                out.push(glyph);
            }
            out.push('\n');
        }
        out
    }
}
