use std::process::ExitCode;
use std::time::Duration;

use crawl_engine::{resolve_app_paths, AppPaths, LoopConfig, Scene};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use super::gameplay::{self, GameplayConfig};

const BASE_TURN_MS_ENV_VAR: &str = "CRAWL_BASE_TURN_MS";
const TPS_ENV_VAR: &str = "CRAWL_TPS";
const AUTOSAVE_ENV_VAR: &str = "CRAWL_AUTOSAVE";
const DEFAULT_BASE_TURN_TIME: Duration = Duration::from_millis(75);
const DEFAULT_PLAYER_ZOOM: f32 = 1.0;
const SAVE_FILE_NAME: &str = "crawl.save.json";

pub(crate) struct AppWiring {
    pub(crate) config: LoopConfig,
    pub(crate) paths: AppPaths,
    pub(crate) scene: Box<dyn Scene>,
}

pub(crate) fn build_app() -> Result<AppWiring, ExitCode> {
    init_tracing();
    info!("=== Crawl Startup ===");

    let paths = resolve_app_paths().map_err(|err| {
        error!(error = %err, "startup_failed");
        ExitCode::FAILURE
    })?;
    let gameplay_config = GameplayConfig {
        base_turn_time: parse_env_value(BASE_TURN_MS_ENV_VAR, parse_base_turn_ms)
            .unwrap_or(DEFAULT_BASE_TURN_TIME),
        player_zoom: DEFAULT_PLAYER_ZOOM,
        autosave_on_first_move: parse_env_value(AUTOSAVE_ENV_VAR, parse_flag).unwrap_or(true),
        save_path: paths.saves_dir().join(SAVE_FILE_NAME),
    };
    info!(
        base_turn_ms = gameplay_config.base_turn_time.as_millis() as u64,
        autosave = gameplay_config.autosave_on_first_move,
        save_path = %gameplay_config.save_path.display(),
        "gameplay_config"
    );

    let mut config = LoopConfig::default();
    if let Some(tps) = parse_env_value(TPS_ENV_VAR, parse_tps) {
        config.target_tps = tps;
    }

    Ok(AppWiring {
        config,
        paths,
        scene: gameplay::build_gameplay_scene(gameplay_config),
    })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}

/// Reads `var` through `parse`. Unset yields `None`; invalid values warn and yield `None`.
fn parse_env_value<T>(var: &'static str, parse: fn(&str) -> Option<T>) -> Option<T> {
    let raw = std::env::var(var).ok()?;
    let parsed = parse(raw.trim());
    if parsed.is_none() {
        warn!(var, value = raw.as_str(), "invalid_env_value; using default");
    }
    parsed
}

fn parse_base_turn_ms(raw: &str) -> Option<Duration> {
    raw.parse::<u64>().ok().map(Duration::from_millis)
}

fn parse_tps(raw: &str) -> Option<u32> {
    raw.parse::<u32>().ok().filter(|tps| *tps > 0)
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw {
        "1" | "true" => Some(true),
        "0" | "false" => Some(false),
        _ => None,
    }
}
