use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use url::Url;

pub mod artifacts;
pub mod config;
pub mod observation;
pub mod probe;
pub mod report;
pub mod runner;
pub mod session;
pub mod settle;
pub mod verdict;

#[cfg(test)]
mod testing;

pub use config::{
    BrowserOptions, ConfigError, ConfigFile, VerifyConfig, CHROME_ENV_VAR, DEFAULT_OUT_DIR,
    DEFAULT_PAGE, DEFAULT_POLL_INTERVAL_MS, DEFAULT_SETTLE_MS, INITIAL_SCREENSHOT,
    RUNNING_SCREENSHOT,
};
pub use observation::{format_reading, Observation};
pub use probe::{ProbeError, StateProbe, DEFAULT_STATE_GLOBAL};
pub use report::{SettleSummary, VerificationReport};
pub use runner::{run_and_release, run_verification, RunError, RunPlan};
pub use session::{ChromeSession, Key, PageDriver, SessionError};
pub use settle::{settle, SettleStrategy, Settled};
pub use verdict::{CheckOutcome, Signal, Verdict};

/// Filesystem locations for one verification run, all absolute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunPaths {
    pub page_file: PathBuf,
    pub page_url: Url,
    pub out_dir: PathBuf,
    pub initial_screenshot: PathBuf,
    pub running_screenshot: PathBuf,
}

#[derive(Debug, Error)]
pub enum PathError {
    #[error("failed to resolve current working directory: {0}")]
    CurrentDir(#[source] io::Error),
    #[error(
        "page under test not found: {path}\n\
Run from the directory that contains the page or pass --page <file>."
    )]
    PageMissing { path: PathBuf },
    #[error("page path cannot be expressed as a file:// URL: {path}")]
    NotFileUrl { path: PathBuf },
}

pub fn resolve_run_paths(config: &VerifyConfig) -> Result<RunPaths, PathError> {
    let cwd = std::env::current_dir().map_err(PathError::CurrentDir)?;
    resolve_run_paths_from(config, &cwd)
}

pub fn resolve_run_paths_from(config: &VerifyConfig, cwd: &Path) -> Result<RunPaths, PathError> {
    let page_file = anchor(cwd, &config.page);
    if !page_file.is_file() {
        return Err(PathError::PageMissing { path: page_file });
    }
    let page_url = Url::from_file_path(&page_file).map_err(|_| PathError::NotFileUrl {
        path: page_file.clone(),
    })?;

    let out_dir = anchor(cwd, &config.out_dir);
    Ok(RunPaths {
        initial_screenshot: out_dir.join(INITIAL_SCREENSHOT),
        running_screenshot: out_dir.join(RUNNING_SCREENSHOT),
        page_file,
        page_url,
        out_dir,
    })
}

fn anchor(cwd: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn default_paths_are_anchored_at_working_directory() {
        let temp = TempDir::new().expect("temp");
        fs::write(temp.path().join("index.html"), "<html></html>").expect("write page");

        let paths = resolve_run_paths_from(&VerifyConfig::default(), temp.path()).expect("paths");

        assert_eq!(paths.page_file, temp.path().join("index.html"));
        assert_eq!(paths.page_url.scheme(), "file");
        assert!(paths.page_url.path().ends_with("/index.html"));
        assert_eq!(
            paths.initial_screenshot,
            temp.path().join("verification").join("initial.png")
        );
        assert_eq!(
            paths.running_screenshot,
            temp.path().join("verification").join("verification.png")
        );
    }

    #[test]
    fn page_url_escapes_spaces_in_directory_names() {
        let temp = TempDir::new().expect("temp");
        let dir = temp.path().join("bike game");
        fs::create_dir_all(&dir).expect("mkdir");
        fs::write(dir.join("index.html"), "<html></html>").expect("write page");

        let paths = resolve_run_paths_from(&VerifyConfig::default(), &dir).expect("paths");

        assert!(paths.page_url.as_str().contains("bike%20game"));
    }

    #[test]
    fn missing_page_is_reported_before_launch() {
        let temp = TempDir::new().expect("temp");
        let error = resolve_run_paths_from(&VerifyConfig::default(), temp.path())
            .expect_err("missing page");
        assert!(matches!(error, PathError::PageMissing { .. }));
    }
}
