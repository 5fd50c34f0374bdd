use std::io;

use harness::config::chrome_from_env;
use harness::{
    resolve_run_paths, ConfigError, ConfigFile, PathError, ProbeError, RunPlan, VerifyConfig,
    CHROME_ENV_VAR,
};
use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

use super::cli::Cli;

pub(crate) struct AppWiring {
    pub(crate) config: VerifyConfig,
    pub(crate) plan: RunPlan,
}

#[derive(Debug, Error)]
pub(crate) enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Paths(#[from] PathError),
    #[error(transparent)]
    Probe(#[from] ProbeError),
}

pub(crate) fn build_app(cli: &Cli) -> Result<AppWiring, StartupError> {
    info!("=== verify_loop startup ===");

    let config = resolve_config(cli, std::env::var(CHROME_ENV_VAR).ok().as_deref())?;
    let paths = resolve_run_paths(&config)?;
    info!(
        page = %paths.page_url,
        out_dir = %paths.out_dir.display(),
        start_key = config.start_key.code(),
        settle = config.settle.mode_name(),
        headless = config.browser.headless,
        "run_config"
    );
    let plan = RunPlan::new(&config, paths)?;

    Ok(AppWiring { config, plan })
}

/// Defaults, then the environment, then the config file, then command-line flags.
fn resolve_config(cli: &Cli, chrome_env: Option<&str>) -> Result<VerifyConfig, ConfigError> {
    let mut config = VerifyConfig::default();
    if let Some(chrome) = chrome_from_env(chrome_env) {
        config.browser.chrome_executable = Some(chrome);
    }
    if let Some(path) = &cli.config {
        ConfigFile::load(path)?.apply_to(&mut config)?;
        info!(path = %path.display(), "config_file_loaded");
    }
    cli.apply_to(&mut config)?;
    Ok(config)
}

/// Logs go to stderr so stdout carries only the transcript.
pub(crate) fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .compact()
        .init();
}
