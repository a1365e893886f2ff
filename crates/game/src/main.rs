use std::process::ExitCode;

mod app;

fn main() -> ExitCode {
    let app = match app::bootstrap::build_app() {
        Ok(app) => app,
        Err(code) => return code,
    };
    app::loop_runner::run(app)
}
