/// Runs one AI turn for `actor`. Every path ends the turn.
fn run_ai(session: &mut GameSession, world: &mut SceneWorld, actor: EntityId, behavior: AiBehavior) {
    match behavior {
        AiBehavior::Hostile(_) => run_hostile_enemy(session, world, actor),
    }
}

fn run_hostile_enemy(session: &mut GameSession, world: &mut SceneWorld, actor: EntityId) {
    let player = session.actors.first().copied();
    let target = acquire_target(session, actor, player);

    let Some(target) = target else {
        set_hostile_phase(session, actor, HostilePhase::Idle);
        wait_action(session);
        return;
    };
    let (Some(position), Some(target_position)) = (
        world.find_entity(actor).map(|entity| entity.position),
        world.find_entity(target).map(|entity| entity.position),
    ) else {
        wait_action(session);
        return;
    };

    let Some(hostile) = hostile_state(session, actor) else {
        wait_action(session);
        return;
    };
    let in_view = session
        .actor_data
        .get(&actor)
        .is_some_and(|data| data.field_of_view.contains(&target_position));
    if !hostile.is_fighting && !in_view {
        wait_action(session);
        return;
    }

    if !hostile.is_fighting {
        debug!(actor = actor.0, target = target.0, "hostile_engaged");
    }
    if position.distance(target_position) <= MELEE_RANGE {
        set_hostile_phase(session, actor, HostilePhase::Engaged);
        melee_action(session, world, actor, target);
        return;
    }

    set_hostile_phase(session, actor, HostilePhase::Pursuing);
    let moved = session
        .next_step_toward(world, position, target_position)
        .is_some_and(|step| {
            movement_action(
                session,
                world,
                actor,
                (step.x - position.x, step.y - position.y),
            )
        });
    if !moved {
        debug!(actor = actor.0, "hostile_path_blocked");
        wait_action(session);
    }
}

/// Defaults the target to the player, then drops it if it is dead.
fn acquire_target(
    session: &mut GameSession,
    actor: EntityId,
    player: Option<EntityId>,
) -> Option<EntityId> {
    let target = session
        .actor_data
        .get(&actor)?
        .fighter
        .target
        .or(player)
        .filter(|target| *target != actor);
    let target_alive = target.is_some_and(|target| {
        session
            .actor_data
            .get(&target)
            .is_some_and(|data| data.is_alive)
    });
    let data = session.actor_data.get_mut(&actor)?;
    if target_alive {
        data.fighter.target = target;
        return target;
    }
    data.fighter.target = None;
    if let Some(AiBehavior::Hostile(hostile)) = &mut data.ai {
        hostile.is_fighting = false;
    }
    None
}

fn hostile_state(session: &GameSession, actor: EntityId) -> Option<HostileEnemy> {
    match session.actor_data.get(&actor)?.ai? {
        AiBehavior::Hostile(hostile) => Some(hostile),
    }
}

/// Any phase other than `Idle` marks the enemy as fighting.
fn set_hostile_phase(session: &mut GameSession, actor: EntityId, phase: HostilePhase) {
    let Some(AiBehavior::Hostile(hostile)) = session
        .actor_data
        .get_mut(&actor)
        .and_then(|data| data.ai.as_mut())
    else {
        return;
    };
    hostile.is_fighting = phase != HostilePhase::Idle;
    if hostile.phase != phase {
        debug!(actor = actor.0, from = ?hostile.phase, to = ?phase, "hostile_phase_changed");
        hostile.phase = phase;
    }
}
