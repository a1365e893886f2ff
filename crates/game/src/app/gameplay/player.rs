/// Side effects the scene performs after a player update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct PlayerRequests {
    autosave: bool,
    take_stairs: bool,
}

/// Turns discrete input edges into player actions. One turn-ending action per press.
#[derive(Debug, Clone)]
struct PlayerController {
    armed_move: Option<(i32, i32)>,
    target_mode: bool,
    is_single_target: bool,
    target_radius: i32,
    target_cursor: GridPos,
    game_saved: bool,
    autosave_on_first_move: bool,
}

impl PlayerController {
    fn new(autosave_on_first_move: bool) -> Self {
        Self {
            armed_move: None,
            target_mode: false,
            is_single_target: true,
            target_radius: 1,
            target_cursor: GridPos::default(),
            game_saved: false,
            autosave_on_first_move,
        }
    }

    fn can_act(&self, session: &GameSession) -> bool {
        !self.target_mode
            && !session.ui.is_menu_open()
            && session.player().is_some_and(|player| player.is_alive)
    }

    fn update(
        &mut self,
        session: &mut GameSession,
        world: &mut SceneWorld,
        input: &InputSnapshot,
    ) -> PlayerRequests {
        let mut requests = PlayerRequests::default();
        if input.is_idle() {
            return requests;
        }
        let Some(player) = session.player_id() else {
            return requests;
        };
        let is_alive = session.player().is_some_and(|data| data.is_alive);

        for action in InputAction::ALL {
            let Some(direction) = action.direction() else {
                continue;
            };
            if input.started(action) {
                if is_alive {
                    if self.autosave_on_first_move && !self.game_saved {
                        requests.autosave = true;
                        self.game_saved = true;
                    }
                    self.on_direction_pressed(session, world, action, direction);
                }
                self.open_escape_menu_if_dead(session);
            } else if input.released(action) && self.armed_move == Some(direction) {
                self.armed_move = None;
            }
        }

        if input.started(InputAction::Exit) {
            self.on_exit(session);
        }
        if input.started(InputAction::View)
            && (!session.ui.is_menu_open() || session.ui.message_history_open)
        {
            session.ui.message_history_open = !session.ui.message_history_open;
        }
        if input.started(InputAction::Pickup)
            && self.can_act(session)
            && session.turns.is_player_turn
        {
            pickup_action(session, world, player);
        }
        if input.started(InputAction::Inventory)
            && (self.can_act(session) || session.ui.inventory_open)
        {
            toggle_item_menu(session, player, ItemMenu::Inventory);
        }
        if input.started(InputAction::Drop) && (self.can_act(session) || session.ui.drop_menu_open)
        {
            toggle_item_menu(session, player, ItemMenu::Drop);
        }
        if input.started(InputAction::Confirm) {
            if self.on_confirm(session, world, player) {
                requests.take_stairs = true;
            }
            self.open_escape_menu_if_dead(session);
        }
        if input.started(InputAction::Info)
            && (self.can_act(session) || session.ui.character_info_open)
        {
            let open = !session.ui.character_info_open;
            session.ui.close_menus();
            session.ui.character_info_open = open;
        }
        requests
    }

    /// Spends the armed move as a bump once the player may act. Runs after `update`
    /// so a requested autosave captures the position before the move.
    fn perform_armed_move(&mut self, session: &mut GameSession, world: &mut SceneWorld) -> bool {
        let Some(player) = session.player_id() else {
            return false;
        };
        let is_alive = session.player().is_some_and(|data| data.is_alive);
        if session.ui.is_menu_open() || self.target_mode || !session.turns.is_player_turn || !is_alive
        {
            return false;
        }
        match self.armed_move.take() {
            Some(direction) => bump_action(session, world, player, direction),
            None => false,
        }
    }

    fn on_direction_pressed(
        &mut self,
        session: &mut GameSession,
        world: &SceneWorld,
        action: InputAction,
        direction: (i32, i32),
    ) {
        if self.target_mode {
            self.move_target_cursor(session, world, direction);
        } else if session.ui.inventory_open || session.ui.drop_menu_open {
            let item_count = session
                .player()
                .map_or(0, |player| player.inventory.items.len());
            match action {
                InputAction::MoveUp => {
                    session.ui.menu_cursor = session.ui.menu_cursor.saturating_sub(1);
                }
                InputAction::MoveDown => {
                    session.ui.menu_cursor =
                        (session.ui.menu_cursor + 1).min(item_count.saturating_sub(1));
                }
                _ => {}
            }
        } else if !session.ui.is_menu_open() {
            self.armed_move = Some(direction);
        }
    }

    fn move_target_cursor(&mut self, session: &GameSession, world: &SceneWorld, direction: (i32, i32)) {
        let next = self.target_cursor.offset(direction.0, direction.1);
        let in_view = session
            .player()
            .is_some_and(|player| player.field_of_view.contains(&next));
        if is_valid_position(world, next) && in_view {
            self.target_cursor = next;
        }
    }

    fn on_exit(&mut self, session: &mut GameSession) {
        if self.target_mode {
            self.exit_target_mode(session);
        } else if !session.ui.is_menu_open() {
            session.ui.escape_menu_open = true;
        } else {
            session.ui.close_menus();
        }
    }

    /// Returns true when the player stands on stairs and wants to descend.
    fn on_confirm(&mut self, session: &mut GameSession, world: &mut SceneWorld, player: EntityId) -> bool {
        if !session.turns.is_player_turn {
            return false;
        }
        if self.target_mode {
            self.confirm_target(session, world, player);
            return false;
        }
        if session.ui.inventory_open || session.ui.drop_menu_open {
            let dropping = session.ui.drop_menu_open;
            let cursor = session.ui.menu_cursor;
            session.ui.close_menus();
            let Some(item) = session
                .player()
                .and_then(|data| data.inventory.items.get(cursor).copied())
            else {
                return false;
            };
            if dropping {
                drop_action(session, world, player, item);
            } else if let UseOutcome::TargetRequested { area_radius } =
                use_action(session, world, player, item)
            {
                self.enter_target_mode(world, player, area_radius);
            }
            return false;
        }
        self.can_act(session) && take_stairs_action(session, world, player)
    }

    fn enter_target_mode(&mut self, world: &SceneWorld, player: EntityId, area_radius: Option<i32>) {
        self.target_mode = true;
        self.armed_move = None;
        self.is_single_target = area_radius.is_none();
        self.target_radius = area_radius.unwrap_or(1);
        if let Some(entity) = world.find_entity(player) {
            self.target_cursor = entity.position;
        }
        debug!(single = self.is_single_target, radius = self.target_radius, "target_mode_entered");
    }

    fn exit_target_mode(&mut self, session: &mut GameSession) {
        self.target_mode = false;
        if let Some(player) = session.player_id() {
            if let Some(data) = session.actor_data.get_mut(&player) {
                data.inventory.selected_consumable = None;
            }
        }
    }

    fn confirm_target(&mut self, session: &mut GameSession, world: &mut SceneWorld, player: EntityId) {
        let Some(item) = session
            .player()
            .and_then(|data| data.inventory.selected_consumable)
        else {
            self.exit_target_mode(session);
            return;
        };
        let targets = if self.is_single_target {
            self.single_target_checks(session, world, player)
                .map(|target| vec![target])
        } else {
            self.area_target_checks(session, world)
        };
        let Some(targets) = targets else {
            return;
        };
        if cast_action(session, world, player, &targets, item) {
            self.exit_target_mode(session);
        }
    }

    fn single_target_checks(
        &self,
        session: &mut GameSession,
        world: &SceneWorld,
        player: EntityId,
    ) -> Option<EntityId> {
        let Some(target) = session.get_actor_at_location(world, self.target_cursor) else {
            session
                .ui
                .add_message("You must select an enemy to target.", COLOR_DEFAULT);
            return None;
        };
        if target == player {
            session
                .ui
                .add_message("You can't target yourself!", COLOR_DEFAULT);
            return None;
        }
        Some(target)
    }

    fn area_target_checks(&self, session: &mut GameSession, world: &SceneWorld) -> Option<Vec<EntityId>> {
        let targets = session
            .actors
            .iter()
            .copied()
            .filter(|id| {
                world
                    .find_entity(*id)
                    .is_some_and(|entity| entity.position.chebyshev(self.target_cursor) <= self.target_radius)
            })
            .collect::<Vec<_>>();
        if targets.is_empty() {
            session
                .ui
                .add_message("There are no targets in the radius.", COLOR_DEFAULT);
            return None;
        }
        Some(targets)
    }

    fn open_escape_menu_if_dead(&self, session: &mut GameSession) {
        let is_alive = session.player().is_some_and(|player| player.is_alive);
        if !is_alive && !session.ui.escape_menu_open {
            session.ui.escape_menu_open = true;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ItemMenu {
    Inventory,
    Drop,
}

impl ItemMenu {
    fn flag(self, ui: &mut UiState) -> &mut bool {
        match self {
            Self::Inventory => &mut ui.inventory_open,
            Self::Drop => &mut ui.drop_menu_open,
        }
    }
}

/// Opens or closes an item menu; an empty inventory only gets a message.
fn toggle_item_menu(session: &mut GameSession, player: EntityId, menu: ItemMenu) {
    let has_items = session
        .actor_data
        .get(&player)
        .is_some_and(|data| !data.inventory.items.is_empty());
    let is_open = *menu.flag(&mut session.ui);
    if !has_items && !is_open {
        session.ui.add_message("You have no items.", COLOR_IMPOSSIBLE);
        return;
    }
    session.ui.close_menus();
    *menu.flag(&mut session.ui) = !is_open;
}
