use std::io::{self, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{info, warn};

use crate::artifacts::write_artifact;
use crate::{
    format_reading, settle, Key, Observation, PageDriver, ProbeError, RunPaths, SessionError,
    SettleStrategy, SettleSummary, StateProbe, Verdict, VerificationReport, VerifyConfig,
};

#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Probe(#[from] ProbeError),
    #[error("failed to write {path}: {source}")]
    Artifact {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write transcript: {0}")]
    Transcript(#[source] io::Error),
}

/// Everything a run needs besides the open session.
#[derive(Debug, Clone, PartialEq)]
pub struct RunPlan {
    pub paths: RunPaths,
    pub probe: StateProbe,
    pub start_key: Key,
    pub settle: SettleStrategy,
}

impl RunPlan {
    pub fn new(config: &VerifyConfig, paths: RunPaths) -> Result<Self, ProbeError> {
        Ok(Self {
            paths,
            probe: StateProbe::new(config.state_global.clone())?,
            start_key: config.start_key,
            settle: config.settle,
        })
    }
}

/// Runs the procedure on `driver`, then closes it whatever the outcome.
pub fn run_and_release<D: PageDriver, W: Write>(
    driver: &mut D,
    plan: &RunPlan,
    transcript: &mut W,
) -> Result<VerificationReport, RunError> {
    let outcome = run_verification(driver, plan, transcript);
    let closed = driver.close();
    match (outcome, closed) {
        (Ok(report), Ok(())) => Ok(report),
        (Ok(_), Err(error)) => Err(error.into()),
        (Err(error), Ok(())) => Err(error),
        (Err(error), Err(close_error)) => {
            warn!(error = %close_error, "session_close_failed_after_error");
            Err(error)
        }
    }
}

/// Navigate, observe, press the start key, settle, observe again, and judge.
///
/// The session stays open; callers own its release (see [`run_and_release`]).
pub fn run_verification<D: PageDriver, W: Write>(
    driver: &mut D,
    plan: &RunPlan,
    transcript: &mut W,
) -> Result<VerificationReport, RunError> {
    let paths = &plan.paths;

    driver.navigate(paths.page_url.as_str())?;
    info!(url = %paths.page_url, "page_loaded");

    capture(driver, &paths.initial_screenshot)?;
    emit(transcript, "Initial state screenshot taken.")?;

    let initial = plan.probe.observe(driver)?;
    emit(
        transcript,
        &format!(
            "Initial Time: {}, Initial Distance: {}",
            format_reading(initial.time),
            format_reading(initial.distance)
        ),
    )?;
    info!(%initial, "initial_observation");

    driver.press_key(plan.start_key)?;
    emit(
        transcript,
        &format!("Pressed {} to start game.", plan.start_key.code()),
    )?;

    let settled = settle(driver, &plan.probe, &initial, plan.settle)?;
    let current = settled.observation;
    emit(
        transcript,
        &format!(
            "Current Time: {}, Current Distance: {}",
            format_reading(current.time),
            format_reading(current.distance)
        ),
    )?;
    info!(%current, "current_observation");

    capture(driver, &paths.running_screenshot)?;
    emit(transcript, "Running state screenshot taken.")?;

    let verdict = judge(&initial, &current, transcript)?;

    Ok(VerificationReport {
        page_url: paths.page_url.to_string(),
        initial_screenshot: paths.initial_screenshot.clone(),
        running_screenshot: paths.running_screenshot.clone(),
        initial,
        current,
        settle: SettleSummary::new(plan.settle, &settled),
        passed: verdict.passed(),
        verdict,
    })
}

fn judge<W: Write>(
    initial: &Observation,
    current: &Observation,
    transcript: &mut W,
) -> Result<Verdict, RunError> {
    let verdict = Verdict::from_observations(initial, current);
    for check in verdict.checks() {
        emit(transcript, check.message())?;
        if check.passed {
            info!(
                signal = ?check.signal,
                initial = check.initial,
                current = check.current,
                "check_passed"
            );
        } else {
            warn!(
                signal = ?check.signal,
                initial = check.initial,
                current = check.current,
                "check_failed"
            );
        }
    }
    Ok(verdict)
}

fn capture<D: PageDriver>(driver: &mut D, path: &Path) -> Result<(), RunError> {
    let png = driver.screenshot_png()?;
    write_artifact(path, &png).map_err(|source| RunError::Artifact {
        path: path.to_path_buf(),
        source,
    })?;
    info!(path = %path.display(), bytes = png.len(), "screenshot_saved");
    Ok(())
}

fn emit<W: Write>(transcript: &mut W, line: &str) -> Result<(), RunError> {
    writeln!(transcript, "{line}").map_err(RunError::Transcript)
}
