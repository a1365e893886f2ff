/// Result of trying to use an inventory item outside target mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UseOutcome {
    Consumed,
    /// The item needs a target; `area_radius` is `None` for single-target items.
    TargetRequested { area_radius: Option<i32> },
    Failed,
}

fn wait_action(session: &mut GameSession) -> bool {
    session.end_turn();
    true
}

fn movement_action(
    session: &mut GameSession,
    world: &mut SceneWorld,
    actor: EntityId,
    direction: (i32, i32),
) -> bool {
    let Some(from) = world.find_entity(actor).map(|entity| entity.position) else {
        return false;
    };
    let to = from.offset(direction.0, direction.1);
    if !is_valid_position(world, to) || session.get_actor_at_location(world, to).is_some() {
        return false;
    }
    if let Some(entity) = world.find_entity_mut(actor) {
        entity.position = to;
    }
    session.update_field_of_view(world, actor);
    session.end_turn();
    true
}

fn melee_action(
    session: &mut GameSession,
    world: &mut SceneWorld,
    attacker: EntityId,
    target: EntityId,
) -> bool {
    let (Some(attacker_actor), Some(target_actor)) =
        (session.actor_data.get(&attacker), session.actor_data.get(&target))
    else {
        return false;
    };
    let damage = attacker_actor.fighter.power - target_actor.fighter.defense;
    let attacker_is_player = attacker_actor.is_player;

    let attack = format!(
        "{} attacks {}",
        capitalize(session.entity_name(world, attacker)),
        session.entity_name(world, target)
    );
    let color = if attacker_is_player {
        COLOR_PLAYER_ATTACK
    } else {
        COLOR_ENEMY_ATTACK
    };
    if damage > 0 {
        session
            .ui
            .add_message(format!("{attack} for {damage} hit points."), color);
        apply_damage(session, world, target, damage);
    } else {
        session
            .ui
            .add_message(format!("{attack} but does no damage."), color);
    }
    session.end_turn();
    true
}

/// Attacks a blocking actor in `direction`, otherwise walks there.
/// Returns false when the cell is not walkable.
fn bump_action(
    session: &mut GameSession,
    world: &mut SceneWorld,
    actor: EntityId,
    direction: (i32, i32),
) -> bool {
    let Some(from) = world.find_entity(actor).map(|entity| entity.position) else {
        return false;
    };
    let to = from.offset(direction.0, direction.1);
    if !is_valid_position(world, to) {
        return false;
    }
    match session.get_actor_at_location(world, to) {
        Some(target) if target != actor => melee_action(session, world, actor, target),
        Some(_) => false,
        None => movement_action(session, world, actor, direction),
    }
}

fn pickup_action(session: &mut GameSession, world: &mut SceneWorld, actor: EntityId) -> bool {
    let Some(position) = world.find_entity(actor).map(|entity| entity.position) else {
        return false;
    };
    let item = session.entities.iter().copied().find(|id| {
        session
            .item_data
            .get(id)
            .is_some_and(|item| item.owner.is_none())
            && world
                .find_entity(*id)
                .is_some_and(|entity| entity.active && entity.position == position)
    });
    let Some(item) = item else {
        session
            .ui
            .add_message("There is nothing here to pick up.", COLOR_IMPOSSIBLE);
        return false;
    };
    let Some(inventory) = session
        .actor_data
        .get_mut(&actor)
        .map(|data| &mut data.inventory)
    else {
        return false;
    };
    if inventory.is_full() {
        session
            .ui
            .add_message("Your inventory is full.", COLOR_IMPOSSIBLE);
        return false;
    }
    inventory.items.push(item);
    if let Some(data) = session.item_data.get_mut(&item) {
        data.owner = Some(actor);
    }
    session.remove_entity(world, item);
    let name = session.entity_name(world, item).to_string();
    session
        .ui
        .add_message(format!("You picked up the {name}!"), COLOR_DEFAULT);
    session.end_turn();
    true
}

fn drop_action(
    session: &mut GameSession,
    world: &mut SceneWorld,
    actor: EntityId,
    item: EntityId,
) -> bool {
    let Some(position) = world.find_entity(actor).map(|entity| entity.position) else {
        return false;
    };
    let removed = session
        .actor_data
        .get_mut(&actor)
        .is_some_and(|data| data.inventory.remove(item));
    if !removed {
        return false;
    }
    if let Some(data) = session.item_data.get_mut(&item) {
        data.owner = None;
    }
    if let Some(entity) = world.find_entity_mut(item) {
        entity.position = position;
    }
    session.add_entity(world, item);
    let name = session.entity_name(world, item).to_string();
    session
        .ui
        .add_message(format!("You dropped the {name}."), COLOR_DEFAULT);
    session.end_turn();
    true
}

fn use_action(
    session: &mut GameSession,
    world: &mut SceneWorld,
    actor: EntityId,
    item: EntityId,
) -> UseOutcome {
    let name = session.entity_name(world, item).to_string();
    let Some(consumable) = session.item_data.get(&item).and_then(|data| data.consumable) else {
        session
            .ui
            .add_message(format!("You cannot use the {name}."), COLOR_IMPOSSIBLE);
        return UseOutcome::Failed;
    };

    if consumable.needs_target() {
        if let Some(data) = session.actor_data.get_mut(&actor) {
            data.inventory.selected_consumable = Some(item);
        }
        let area_radius = match consumable {
            ConsumableTemplate::Fireball { radius, .. } => Some(radius),
            _ => None,
        };
        return UseOutcome::TargetRequested { area_radius };
    }
    let ConsumableTemplate::Healing { amount } = consumable else {
        return UseOutcome::Failed;
    };

    let Some(data) = session.actor_data.get_mut(&actor) else {
        return UseOutcome::Failed;
    };
    let recovered = data.fighter.heal(amount);
    if recovered <= 0 {
        session
            .ui
            .add_message("Your health is already full.", COLOR_IMPOSSIBLE);
        return UseOutcome::Failed;
    }
    session.ui.add_message(
        format!("You consume the {name}, and recover {recovered} HP!"),
        COLOR_HEALTH_RECOVERED,
    );
    consume_item(session, world, actor, item);
    session.end_turn();
    UseOutcome::Consumed
}

/// Fires the targeted consumable `item` at `targets`. Lightning hits the first target only.
fn cast_action(
    session: &mut GameSession,
    world: &mut SceneWorld,
    caster: EntityId,
    targets: &[EntityId],
    item: EntityId,
) -> bool {
    let Some(consumable) = session.item_data.get(&item).and_then(|data| data.consumable) else {
        return false;
    };
    let Some(first) = targets.first().copied() else {
        return false;
    };

    match consumable {
        ConsumableTemplate::Lightning { amount } => {
            let target_name = session.entity_name(world, first).to_string();
            session.ui.add_message(
                format!(
                    "A lightning bolt strikes the {target_name} with a loud thunder, for {amount} damage!"
                ),
                COLOR_DEFAULT,
            );
            apply_damage(session, world, first, amount);
        }
        ConsumableTemplate::Fireball { amount, .. } => {
            for target in targets {
                let target_name = session.entity_name(world, *target).to_string();
                session.ui.add_message(
                    format!(
                        "The {target_name} is engulfed in a fiery explosion, taking {amount} damage!"
                    ),
                    COLOR_FIREBALL,
                );
                apply_damage(session, world, *target, amount);
            }
        }
        ConsumableTemplate::Healing { .. } => return false,
    }
    consume_item(session, world, caster, item);
    session.end_turn();
    true
}

/// Checks for stairs under `actor`. The floor change itself is left to the scene,
/// and the turn does not end.
fn take_stairs_action(session: &mut GameSession, world: &SceneWorld, actor: EntityId) -> bool {
    let on_stairs = world
        .find_entity(actor)
        .zip(world.tilemap())
        .and_then(|(entity, tilemap)| tilemap.tile_at(entity.position))
        == Some(TILE_STAIRS);
    if !on_stairs {
        session
            .ui
            .add_message("There are no stairs here.", COLOR_IMPOSSIBLE);
        return false;
    }
    session
        .ui
        .add_message("You descend the staircase.", COLOR_DESCEND);
    true
}

fn apply_damage(session: &mut GameSession, world: &mut SceneWorld, target: EntityId, amount: i32) {
    let Some(data) = session.actor_data.get_mut(&target) else {
        return;
    };
    if !data.is_alive {
        return;
    }
    data.fighter.hp = (data.fighter.hp - amount).max(0);
    if data.fighter.hp == 0 {
        die(session, world, target);
    }
}

/// Leaves a corpse: renamed, non-blocking, and out of the turn queue unless it is the player.
fn die(session: &mut GameSession, world: &mut SceneWorld, target: EntityId) {
    let Some(data) = session.actor_data.get_mut(&target) else {
        return;
    };
    data.is_alive = false;
    data.fighter.target = None;
    let is_player = data.is_player;

    let name = session.entity_name(world, target).to_string();
    if is_player {
        session.ui.add_message("You died!", COLOR_PLAYER_DIE);
    } else {
        session
            .ui
            .add_message(format!("{name} is dead!"), COLOR_ENEMY_DIE);
    }
    if let Some(entity) = world.find_entity_mut(target) {
        entity.name = format!("{REMAINS_PREFIX}{name}");
        entity.blocks_movement = false;
    }
    if !is_player {
        session.remove_actor(target);
    }
    info!(entity = target.0, name = name.as_str(), is_player, "actor_died");
}

fn consume_item(session: &mut GameSession, world: &mut SceneWorld, owner: EntityId, item: EntityId) {
    if let Some(data) = session.actor_data.get_mut(&owner) {
        data.inventory.remove(item);
    }
    session.item_data.remove(&item);
    world.destroy(item);
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
