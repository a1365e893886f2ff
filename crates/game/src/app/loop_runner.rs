use std::process::ExitCode;

use crawl_engine::run_app;
use tracing::error;

use super::bootstrap::AppWiring;
use super::console_input::ConsoleInputSource;

pub(crate) fn run(app: AppWiring) -> ExitCode {
    let mut input = ConsoleInputSource::spawn();
    if let Err(err) = run_app(app.config, &app.paths, app.scene, &mut input) {
        error!(error = %err, "startup_failed");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
