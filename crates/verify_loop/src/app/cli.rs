use std::path::PathBuf;

use clap::Parser;
use harness::config::{fixed_settle, parse_key, poll_settle};
use harness::{ConfigError, VerifyConfig};

/// Loads a local game page in headless Chrome, presses the start key and checks that the
/// page's `state.time` and `state.distance` counters go down.
#[derive(Debug, Default, Parser)]
#[command(name = "verify_loop", version)]
pub(crate) struct Cli {
    /// Page under test, relative to the working directory [default: index.html]
    #[arg(long, value_name = "FILE")]
    pub(crate) page: Option<PathBuf>,

    /// Directory for initial.png and verification.png [default: verification]
    #[arg(long, value_name = "DIR")]
    pub(crate) out_dir: Option<PathBuf>,

    /// Name of the page's global state object [default: state]
    #[arg(long, value_name = "NAME")]
    pub(crate) state_global: Option<String>,

    /// Key that starts the game loop [default: Space]
    #[arg(long, value_name = "KEY")]
    pub(crate) key: Option<String>,

    /// Fixed wait between the key press and the second reading [default: 1000]
    #[arg(long, value_name = "MS", conflicts_with = "poll_timeout_ms")]
    pub(crate) settle_ms: Option<u64>,

    /// Poll the counters until both moved or this timeout elapses, instead of a fixed wait
    #[arg(long, value_name = "MS")]
    pub(crate) poll_timeout_ms: Option<u64>,

    /// Sampling interval while polling [default: 50]
    #[arg(long, value_name = "MS", requires = "poll_timeout_ms")]
    pub(crate) poll_interval_ms: Option<u64>,

    /// Show the browser window
    #[arg(long)]
    pub(crate) headed: bool,

    /// Launch Chrome with --no-sandbox (containers, CI)
    #[arg(long)]
    pub(crate) no_sandbox: bool,

    /// Chrome/Chromium executable (overrides VERIFY_LOOP_CHROME)
    #[arg(long, value_name = "PATH")]
    pub(crate) chrome: Option<PathBuf>,

    /// Write a JSON report of the run
    #[arg(long, value_name = "FILE")]
    pub(crate) report: Option<PathBuf>,

    /// JSON config file; flags given on the command line win over its values
    #[arg(long, value_name = "FILE")]
    pub(crate) config: Option<PathBuf>,
}

impl Cli {
    pub(crate) fn apply_to(&self, config: &mut VerifyConfig) -> Result<(), ConfigError> {
        if let Some(page) = &self.page {
            config.page = page.clone();
        }
        if let Some(out_dir) = &self.out_dir {
            config.out_dir = out_dir.clone();
        }
        if let Some(global) = &self.state_global {
            config.state_global = global.clone();
        }
        if let Some(name) = &self.key {
            config.start_key = parse_key("--key", name)?;
        }
        if let Some(delay_ms) = self.settle_ms {
            config.settle = fixed_settle("--settle-ms", delay_ms)?;
        }
        if let Some(timeout_ms) = self.poll_timeout_ms {
            config.settle = poll_settle(
                ("--poll-interval-ms", self.poll_interval_ms),
                ("--poll-timeout-ms", timeout_ms),
            )?;
        }
        if self.headed {
            config.browser.headless = false;
        }
        if self.no_sandbox {
            config.browser.sandbox = false;
        }
        if let Some(chrome) = &self.chrome {
            config.browser.chrome_executable = Some(chrome.clone());
        }
        if let Some(report) = &self.report {
            config.report_path = Some(report.clone());
        }
        Ok(())
    }
}
