#[derive(Debug, Clone)]
struct TurnScheduler {
    base_time: Duration,
    delay: Duration,
    current: usize,
    is_player_turn: bool,
    /// Time left before the scheduled `start_turn` fires.
    pending_start: Option<Duration>,
}

impl TurnScheduler {
    fn new(base_time: Duration) -> Self {
        Self {
            base_time,
            delay: Duration::ZERO,
            current: 0,
            is_player_turn: false,
            pending_start: None,
        }
    }

    /// `base_time / actor_count`, or zero with no actors.
    fn recompute_delay(&mut self, actor_count: usize) {
        self.delay = match u32::try_from(actor_count) {
            Ok(0) => Duration::ZERO,
            Ok(count) => self.base_time / count,
            Err(_) => Duration::ZERO,
        };
    }

    fn schedule_start(&mut self) {
        if self.pending_start.is_some() {
            warn!("turn_start_rescheduled_before_firing");
        }
        self.pending_start = Some(self.delay);
    }

    /// Advances the pending continuation; true when it is due now.
    fn advance(&mut self, dt: Duration) -> bool {
        let Some(remaining) = self.pending_start else {
            return false;
        };
        let remaining = remaining.saturating_sub(dt);
        if remaining.is_zero() {
            self.pending_start = None;
            true
        } else {
            self.pending_start = Some(remaining);
            false
        }
    }
}

impl GameSession {
    /// Hands the turn to the next actor in the queue after the current delay.
    fn end_turn(&mut self) {
        if self.actors.is_empty() {
            return;
        }
        if self.current_actor().is_some_and(|id| self.is_player(id)) {
            self.turns.is_player_turn = false;
        }
        self.turns.current = (self.turns.current + 1) % self.actors.len();
        self.turns.schedule_start();
        debug!(
            next_index = self.turns.current,
            delay_ms = self.turns.delay.as_millis() as u64,
            "turn_ended"
        );
    }

    fn start_turn(&mut self, world: &mut SceneWorld) {
        if self.actors.is_empty() {
            return;
        }
        if self.turns.current >= self.actors.len() {
            self.turns.current = 0;
        }
        let actor_id = self.actors[self.turns.current];

        if self.is_player(actor_id) {
            self.turns.is_player_turn = true;
            world.camera_mut().attach_to(actor_id, self.player_zoom);
            world.sync_camera();
            debug!(actor = actor_id.0, "player_turn_started");
            return;
        }

        match self.actor_data.get(&actor_id).and_then(|actor| actor.ai) {
            Some(behavior) => run_ai(self, world, actor_id, behavior),
            None => {
                wait_action(self);
            }
        }
    }

    /// Fires the scheduled `start_turn` once its delay has elapsed.
    fn tick_turns(&mut self, world: &mut SceneWorld, dt: Duration) {
        if self.turns.advance(dt) {
            self.start_turn(world);
        }
    }

    fn current_actor(&self) -> Option<EntityId> {
        self.actors.get(self.turns.current).copied()
    }
}
