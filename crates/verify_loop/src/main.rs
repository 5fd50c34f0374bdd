mod app;

use std::process::ExitCode;

use clap::Parser;

use app::cli::Cli;

fn main() -> ExitCode {
    let cli = Cli::parse();
    app::bootstrap::init_tracing();
    match app::bootstrap::build_app(&cli) {
        Ok(wiring) => app::session_runner::run(wiring),
        Err(error) => app::session_runner::startup_failed(&error),
    }
}
