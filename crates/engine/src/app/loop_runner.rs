use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{info, warn};

use crate::{compile_template_database, AppPaths, ContentCompileError};

use super::scene::SceneHost;
use super::{InputSnapshot, Scene, SceneCommand, SceneWorld};

/// Supplies one input snapshot per simulation tick.
pub trait InputSource {
    fn poll(&mut self) -> InputSnapshot;
}

#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub target_tps: u32,
    pub max_frame_delta: Duration,
    pub max_ticks_per_frame: u32,
    pub metrics_log_interval: Duration,
    pub max_render_fps: Option<u32>,
    /// Stops the loop after this many frames; `None` runs until a quit.
    pub max_frames: Option<u64>,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            target_tps: 60,
            max_frame_delta: Duration::from_millis(250),
            max_ticks_per_frame: 5,
            metrics_log_interval: Duration::from_secs(5),
            max_render_fps: Some(60),
            max_frames: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("failed to compile entity templates: {0}")]
    Content(#[from] ContentCompileError),
}

pub fn run_app(
    config: LoopConfig,
    app_paths: &AppPaths,
    scene: Box<dyn Scene>,
    input: &mut dyn InputSource,
) -> Result<(), AppError> {
    info!(
        root = %app_paths.root.display(),
        base_content_dir = %app_paths.base_content_dir.display(),
        cache_dir = %app_paths.cache_dir.display(),
        "startup"
    );
    let templates = compile_template_database(&app_paths.base_content_dir)?;
    info!(template_count = templates.len(), "templates_compiled");

    let mut world = SceneWorld::default();
    world.set_template_database(templates);
    let mut host = SceneHost::new(scene, world);
    host.load();
    info!(entity_count = host.world().entity_count(), "scene_loaded");

    let target_tps = config.target_tps.max(1);
    let max_frame_delta =
        normalize_non_zero_duration(config.max_frame_delta, Duration::from_millis(250));
    let max_ticks_per_frame = config.max_ticks_per_frame.max(1);
    let metrics_log_interval =
        normalize_non_zero_duration(config.metrics_log_interval, Duration::from_secs(5));
    let fixed_dt = Duration::from_secs_f64(1.0 / target_tps as f64);
    let fixed_dt_seconds = fixed_dt.as_secs_f32();
    let render_frame_target = target_frame_duration(config.max_render_fps.filter(|fps| *fps > 0));
    info!(
        target_tps,
        max_frame_delta_ms = max_frame_delta.as_millis() as u64,
        max_ticks_per_frame,
        metrics_log_interval_ms = metrics_log_interval.as_millis() as u64,
        "loop_config"
    );

    let mut accumulator = Duration::ZERO;
    let mut last_frame_instant = Instant::now();
    let mut metrics = MetricsAccumulator::new(metrics_log_interval);
    let mut last_title: Option<String> = None;
    let mut frames = 0u64;

    'frames: loop {
        let now = Instant::now();
        let raw_frame_dt = now.saturating_duration_since(last_frame_instant);
        last_frame_instant = now;
        accumulator = accumulator.saturating_add(raw_frame_dt.min(max_frame_delta));

        let step_plan = plan_sim_steps(accumulator, fixed_dt, max_ticks_per_frame);
        for _ in 0..step_plan.ticks_to_run {
            let snapshot = input.poll();
            if snapshot.quit_requested() {
                info!(reason = "input", "shutdown_requested");
                break 'frames;
            }
            let command = host.step(fixed_dt_seconds, &snapshot);
            metrics.record_tick();
            if command == SceneCommand::Quit {
                info!(reason = "scene", "shutdown_requested");
                break 'frames;
            }
        }
        accumulator = step_plan.remaining_accumulator;
        if step_plan.dropped_backlog > Duration::ZERO {
            warn!(
                dropped_backlog_ms = step_plan.dropped_backlog.as_millis() as u64,
                max_ticks_per_frame, "sim_clamp_triggered"
            );
        }

        host.render();
        let next_title = host.debug_title();
        if next_title != last_title {
            if let Some(title) = &next_title {
                info!(title = title.as_str(), "status");
            }
            last_title = next_title;
        }
        metrics.record_frame(raw_frame_dt);
        if let Some(snapshot) = metrics.maybe_snapshot(now) {
            info!(
                fps = snapshot.fps,
                tps = snapshot.tps,
                frame_time_ms = snapshot.frame_time_ms,
                entity_count = host.world().entity_count(),
                "loop_metrics"
            );
        }

        frames = frames.saturating_add(1);
        if config.max_frames.is_some_and(|limit| frames >= limit) {
            info!(frames, "frame_limit_reached");
            break;
        }

        let elapsed = Instant::now().saturating_duration_since(now);
        let cap_sleep = compute_cap_sleep(elapsed, render_frame_target);
        if cap_sleep > Duration::ZERO {
            thread::sleep(cap_sleep);
        }
    }

    host.shutdown();
    info!("shutdown");
    Ok(())
}

struct StepPlan {
    ticks_to_run: u32,
    remaining_accumulator: Duration,
    dropped_backlog: Duration,
}

fn plan_sim_steps(
    mut accumulator: Duration,
    fixed_dt: Duration,
    max_ticks_per_frame: u32,
) -> StepPlan {
    let mut ticks_to_run = 0u32;
    while accumulator >= fixed_dt && ticks_to_run < max_ticks_per_frame {
        accumulator = accumulator.saturating_sub(fixed_dt);
        ticks_to_run = ticks_to_run.saturating_add(1);
    }

    let dropped_backlog = if accumulator >= fixed_dt {
        std::mem::take(&mut accumulator)
    } else {
        Duration::ZERO
    };
    StepPlan {
        ticks_to_run,
        remaining_accumulator: accumulator,
        dropped_backlog,
    }
}

fn normalize_non_zero_duration(value: Duration, fallback: Duration) -> Duration {
    if value.is_zero() {
        fallback
    } else {
        value
    }
}

fn target_frame_duration(max_render_fps: Option<u32>) -> Option<Duration> {
    max_render_fps.map(|fps| Duration::from_secs_f64(1.0 / fps as f64))
}

fn compute_cap_sleep(elapsed: Duration, target: Option<Duration>) -> Duration {
    match target {
        Some(frame_target) if elapsed < frame_target => frame_target - elapsed,
        _ => Duration::ZERO,
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct LoopMetricsSnapshot {
    fps: f32,
    tps: f32,
    frame_time_ms: f32,
}

#[derive(Debug)]
struct MetricsAccumulator {
    interval_start: Instant,
    interval: Duration,
    frames: u32,
    ticks: u32,
    frame_time_sum: Duration,
}

impl MetricsAccumulator {
    fn new(interval: Duration) -> Self {
        Self {
            interval_start: Instant::now(),
            interval,
            frames: 0,
            ticks: 0,
            frame_time_sum: Duration::ZERO,
        }
    }

    fn record_frame(&mut self, frame_dt: Duration) {
        self.frames = self.frames.saturating_add(1);
        self.frame_time_sum = self.frame_time_sum.saturating_add(frame_dt);
    }

    fn record_tick(&mut self) {
        self.ticks = self.ticks.saturating_add(1);
    }

    fn maybe_snapshot(&mut self, now: Instant) -> Option<LoopMetricsSnapshot> {
        let elapsed = now.saturating_duration_since(self.interval_start);
        if elapsed < self.interval {
            return None;
        }

        let elapsed_seconds = elapsed.as_secs_f32().max(f32::EPSILON);
        let frame_time_ms = if self.frames == 0 {
            0.0
        } else {
            (self.frame_time_sum.as_secs_f32() / self.frames as f32) * 1000.0
        };
        let snapshot = LoopMetricsSnapshot {
            fps: self.frames as f32 / elapsed_seconds,
            tps: self.ticks as f32 / elapsed_seconds,
            frame_time_ms,
        };

        self.interval_start = now;
        self.frames = 0;
        self.ticks = 0;
        self.frame_time_sum = Duration::ZERO;
        Some(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;
    use crate::{app_paths_for_root, GridPos, InputAction};

    struct CountingScene {
        updates: u32,
        quit_after: u32,
    }

    impl Scene for CountingScene {
        fn load(&mut self, world: &mut SceneWorld) {
            let templates = world.template_database().map_or(0, |db| db.len());
            for index in 0..templates {
                world.spawn("marker", GridPos::new(index as i32, 0), false);
            }
        }

        fn update(
            &mut self,
            _fixed_dt_seconds: f32,
            _input: &InputSnapshot,
            _world: &mut SceneWorld,
        ) -> SceneCommand {
            self.updates += 1;
            if self.updates >= self.quit_after {
                SceneCommand::Quit
            } else {
                SceneCommand::None
            }
        }

        fn render(&mut self, _world: &SceneWorld) {}

        fn unload(&mut self, _world: &mut SceneWorld) {}
    }

    struct ScriptedInput {
        polls: u32,
        quit_on_poll: Option<u32>,
    }

    impl InputSource for ScriptedInput {
        fn poll(&mut self) -> InputSnapshot {
            self.polls += 1;
            let quit = self.quit_on_poll.is_some_and(|at| self.polls >= at);
            InputSnapshot::empty()
                .with_action_down(InputAction::MoveUp, self.polls % 2 == 0)
                .with_quit_requested(quit)
        }
    }

    fn paths_with_templates() -> (TempDir, AppPaths) {
        let temp = TempDir::new().expect("temp");
        let paths = app_paths_for_root(temp.path().to_path_buf()).expect("paths");
        fs::create_dir_all(&paths.base_content_dir).expect("content dir");
        fs::write(
            paths.base_content_dir.join("entities.xml"),
            r#"<Defs><EntityDef><defName>Potion</defName><kind>Item</kind></EntityDef></Defs>"#,
        )
        .expect("write defs");
        (temp, paths)
    }

    fn fast_config() -> LoopConfig {
        LoopConfig {
            target_tps: 1000,
            max_render_fps: Some(1000),
            max_frames: Some(10_000),
            ..LoopConfig::default()
        }
    }

    #[test]
    fn plan_sim_steps_runs_expected_ticks_without_drop() {
        let fixed_dt = Duration::from_millis(16);
        let result = plan_sim_steps(Duration::from_millis(48), fixed_dt, 5);

        assert_eq!(result.ticks_to_run, 3);
        assert_eq!(result.remaining_accumulator, Duration::ZERO);
        assert_eq!(result.dropped_backlog, Duration::ZERO);
    }

    #[test]
    fn plan_sim_steps_drops_backlog_when_tick_cap_hit() {
        let fixed_dt = Duration::from_millis(16);
        let result = plan_sim_steps(Duration::from_millis(120), fixed_dt, 3);

        assert_eq!(result.ticks_to_run, 3);
        assert_eq!(result.remaining_accumulator, Duration::ZERO);
        assert_eq!(result.dropped_backlog, Duration::from_millis(72));
    }

    #[test]
    fn compute_cap_sleep_only_when_under_budget() {
        let target = target_frame_duration(Some(50));
        assert_eq!(
            compute_cap_sleep(Duration::from_millis(5), target),
            Duration::from_millis(15)
        );
        assert_eq!(
            compute_cap_sleep(Duration::from_millis(30), target),
            Duration::ZERO
        );
        assert_eq!(compute_cap_sleep(Duration::from_millis(1), None), Duration::ZERO);
    }

    #[test]
    fn scene_quit_command_stops_the_loop() {
        let (_temp, paths) = paths_with_templates();
        let mut input = ScriptedInput {
            polls: 0,
            quit_on_poll: None,
        };
        run_app(
            fast_config(),
            &paths,
            Box::new(CountingScene {
                updates: 0,
                quit_after: 3,
            }),
            &mut input,
        )
        .expect("run");
        assert_eq!(input.polls, 3);
    }

    #[test]
    fn quit_input_stops_before_the_scene_sees_it() {
        let (_temp, paths) = paths_with_templates();
        let mut input = ScriptedInput {
            polls: 0,
            quit_on_poll: Some(2),
        };
        run_app(
            fast_config(),
            &paths,
            Box::new(CountingScene {
                updates: 0,
                quit_after: u32::MAX,
            }),
            &mut input,
        )
        .expect("run");
        assert_eq!(input.polls, 2);
    }

    #[test]
    fn invalid_content_is_reported_before_the_scene_loads() {
        let (_temp, paths) = paths_with_templates();
        fs::write(paths.base_content_dir.join("broken.xml"), "<Defs>").expect("write");
        let mut input = ScriptedInput {
            polls: 0,
            quit_on_poll: None,
        };
        let err = run_app(
            fast_config(),
            &paths,
            Box::new(CountingScene {
                updates: 0,
                quit_after: 1,
            }),
            &mut input,
        )
        .expect_err("should fail");
        assert!(matches!(err, AppError::Content(_)));
        assert_eq!(input.polls, 0);
    }
}
