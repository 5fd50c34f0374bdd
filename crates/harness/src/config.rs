use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::{Key, SettleStrategy, DEFAULT_STATE_GLOBAL};

pub const DEFAULT_PAGE: &str = "index.html";
pub const DEFAULT_OUT_DIR: &str = "verification";
pub const INITIAL_SCREENSHOT: &str = "initial.png";
pub const RUNNING_SCREENSHOT: &str = "verification.png";
pub const DEFAULT_SETTLE_MS: u64 = 1_000;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 50;
pub const CHROME_ENV_VAR: &str = "VERIFY_LOOP_CHROME";
const DEFAULT_LAUNCH_TIMEOUT_MS: u64 = 20_000;
const DEFAULT_WINDOW_WIDTH: u32 = 1280;
const DEFAULT_WINDOW_HEIGHT: u32 = 720;

#[derive(Debug, Clone, PartialEq)]
pub struct BrowserOptions {
    pub headless: bool,
    pub sandbox: bool,
    pub chrome_executable: Option<PathBuf>,
    pub window_width: u32,
    pub window_height: u32,
    pub launch_timeout: Duration,
}

impl Default for BrowserOptions {
    fn default() -> Self {
        Self {
            headless: true,
            sandbox: true,
            chrome_executable: None,
            window_width: DEFAULT_WINDOW_WIDTH,
            window_height: DEFAULT_WINDOW_HEIGHT,
            launch_timeout: Duration::from_millis(DEFAULT_LAUNCH_TIMEOUT_MS),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VerifyConfig {
    pub page: PathBuf,
    pub out_dir: PathBuf,
    pub state_global: String,
    pub start_key: Key,
    pub settle: SettleStrategy,
    pub browser: BrowserOptions,
    pub report_path: Option<PathBuf>,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            page: PathBuf::from(DEFAULT_PAGE),
            out_dir: PathBuf::from(DEFAULT_OUT_DIR),
            state_global: DEFAULT_STATE_GLOBAL.to_string(),
            start_key: Key::Space,
            settle: SettleStrategy::default(),
            browser: BrowserOptions::default(),
            report_path: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config file {path}{location}: {source}")]
    Parse {
        path: PathBuf,
        location: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid config value at {field}: {message}")]
    Invalid { field: &'static str, message: String },
}

/// On-disk overrides. Every field is optional; absent fields keep the current value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    pub page: Option<PathBuf>,
    pub out_dir: Option<PathBuf>,
    pub state_global: Option<String>,
    pub start_key: Option<String>,
    pub settle: Option<SettleFile>,
    pub browser: Option<BrowserFile>,
    pub report: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case", deny_unknown_fields)]
pub enum SettleFile {
    Fixed {
        delay_ms: u64,
    },
    Poll {
        #[serde(default)]
        interval_ms: Option<u64>,
        timeout_ms: u64,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BrowserFile {
    pub headless: Option<bool>,
    pub sandbox: Option<bool>,
    pub chrome_executable: Option<PathBuf>,
    pub window_width: Option<u32>,
    pub window_height: Option<u32>,
    pub launch_timeout_ms: Option<u64>,
}

impl ConfigFile {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(path, &raw)
    }

    pub fn parse(path: &Path, raw: &str) -> Result<Self, ConfigError> {
        let mut deserializer = serde_json::Deserializer::from_str(raw);
        serde_path_to_error::deserialize::<_, ConfigFile>(&mut deserializer).map_err(|error| {
            let field_path = error.path().to_string();
            let location = if field_path.is_empty() || field_path == "." {
                String::new()
            } else {
                format!(" at {field_path}")
            };
            ConfigError::Parse {
                path: path.to_path_buf(),
                location,
                source: error.into_inner(),
            }
        })
    }

    pub fn apply_to(&self, config: &mut VerifyConfig) -> Result<(), ConfigError> {
        if let Some(page) = &self.page {
            config.page = page.clone();
        }
        if let Some(out_dir) = &self.out_dir {
            config.out_dir = out_dir.clone();
        }
        if let Some(global) = &self.state_global {
            config.state_global = global.clone();
        }
        if let Some(name) = &self.start_key {
            config.start_key = parse_key("start_key", name)?;
        }
        if let Some(settle) = &self.settle {
            config.settle = settle.to_strategy()?;
        }
        if let Some(browser) = &self.browser {
            browser.apply_to(&mut config.browser)?;
        }
        if let Some(report) = &self.report {
            config.report_path = Some(report.clone());
        }
        Ok(())
    }
}

impl SettleFile {
    fn to_strategy(&self) -> Result<SettleStrategy, ConfigError> {
        match *self {
            SettleFile::Fixed { delay_ms } => fixed_settle("settle.delay_ms", delay_ms),
            SettleFile::Poll {
                interval_ms,
                timeout_ms,
            } => poll_settle(
                ("settle.interval_ms", interval_ms),
                ("settle.timeout_ms", timeout_ms),
            ),
        }
    }
}

impl BrowserFile {
    fn apply_to(&self, options: &mut BrowserOptions) -> Result<(), ConfigError> {
        if let Some(headless) = self.headless {
            options.headless = headless;
        }
        if let Some(sandbox) = self.sandbox {
            options.sandbox = sandbox;
        }
        if let Some(path) = &self.chrome_executable {
            options.chrome_executable = Some(path.clone());
        }
        if let Some(width) = self.window_width {
            options.window_width = non_zero("browser.window_width", width)?;
        }
        if let Some(height) = self.window_height {
            options.window_height = non_zero("browser.window_height", height)?;
        }
        if let Some(timeout_ms) = self.launch_timeout_ms {
            options.launch_timeout = non_zero_ms("browser.launch_timeout_ms", timeout_ms)?;
        }
        Ok(())
    }
}

pub fn parse_key(field: &'static str, name: &str) -> Result<Key, ConfigError> {
    Key::parse(name).ok_or_else(|| ConfigError::Invalid {
        field,
        message: format!(
            "unknown key '{name}' (expected Space, Enter, Escape, ArrowLeft, ArrowRight, ArrowUp or ArrowDown)"
        ),
    })
}

/// Browser path from the environment, ignoring empty values.
pub fn chrome_from_env(raw: Option<&str>) -> Option<PathBuf> {
    raw.map(str::trim)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

/// Fixed wait of `delay_ms`; zero is rejected under `field`.
pub fn fixed_settle(field: &'static str, delay_ms: u64) -> Result<SettleStrategy, ConfigError> {
    Ok(SettleStrategy::Fixed(non_zero_ms(field, delay_ms)?))
}

/// Poll strategy from `(field, value)` pairs; an absent interval takes the default.
pub fn poll_settle(
    interval: (&'static str, Option<u64>),
    timeout: (&'static str, u64),
) -> Result<SettleStrategy, ConfigError> {
    let (interval_field, interval_ms) = interval;
    let (timeout_field, timeout_ms) = timeout;
    Ok(SettleStrategy::Poll {
        interval: non_zero_ms(
            interval_field,
            interval_ms.unwrap_or(DEFAULT_POLL_INTERVAL_MS),
        )?,
        timeout: non_zero_ms(timeout_field, timeout_ms)?,
    })
}

fn non_zero_ms(field: &'static str, value_ms: u64) -> Result<Duration, ConfigError> {
    if value_ms == 0 {
        return Err(ConfigError::Invalid {
            field,
            message: "duration must be greater than zero".to_string(),
        });
    }
    Ok(Duration::from_millis(value_ms))
}

fn non_zero(field: &'static str, value: u32) -> Result<u32, ConfigError> {
    if value == 0 {
        Err(ConfigError::Invalid {
            field,
            message: "must be greater than zero".to_string(),
        })
    } else {
        Ok(value)
    }
}
