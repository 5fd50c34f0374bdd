use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::artifacts::write_artifact;
use crate::{Observation, Settled, SettleStrategy, Verdict};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SettleSummary {
    pub mode: &'static str,
    pub configured_ms: u64,
    pub waited_ms: u64,
    pub samples: u32,
}

impl SettleSummary {
    pub fn new(strategy: SettleStrategy, settled: &Settled) -> Self {
        let configured = match strategy {
            SettleStrategy::Fixed(delay) => delay,
            SettleStrategy::Poll { timeout, .. } => timeout,
        };
        Self {
            mode: strategy.mode_name(),
            configured_ms: configured.as_millis() as u64,
            waited_ms: settled.waited.as_millis() as u64,
            samples: settled.samples,
        }
    }
}

/// Machine-readable outcome of one run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerificationReport {
    pub page_url: String,
    pub initial_screenshot: PathBuf,
    pub running_screenshot: PathBuf,
    pub initial: Observation,
    pub current: Observation,
    pub settle: SettleSummary,
    pub verdict: Verdict,
    pub passed: bool,
}

impl VerificationReport {
    pub fn exit_code(&self) -> u8 {
        self.verdict.exit_code()
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn write_json(&self, path: &Path) -> io::Result<()> {
        let mut text = self.to_json_pretty().map_err(io::Error::other)?;
        text.push('\n');
        write_artifact(path, text.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    fn sample_report() -> VerificationReport {
        let initial = Observation::new(60.0, 1000.0);
        let current = Observation::new(59.0, 985.0);
        let settled = Settled {
            observation: current,
            waited: Duration::from_millis(1_003),
            samples: 1,
        };
        let verdict = Verdict::from_observations(&initial, &current);
        VerificationReport {
            page_url: "file:///tmp/game/index.html".to_string(),
            initial_screenshot: PathBuf::from("verification/initial.png"),
            running_screenshot: PathBuf::from("verification/verification.png"),
            initial,
            current,
            settle: SettleSummary::new(SettleStrategy::default(), &settled),
            passed: verdict.passed(),
            verdict,
        }
    }

    #[test]
    fn json_report_carries_verdict_and_observations() {
        let json = sample_report().to_json_pretty().expect("json");
        let value: serde_json::Value = serde_json::from_str(&json).expect("parse");

        assert_eq!(value["passed"], true);
        assert_eq!(value["initial"]["distance"], 1000.0);
        assert_eq!(value["current"]["time"], 59.0);
        assert_eq!(value["verdict"]["distance"]["signal"], "distance");
        assert_eq!(value["verdict"]["time"]["passed"], true);
        assert_eq!(value["settle"]["mode"], "fixed");
        assert_eq!(value["settle"]["configured_ms"], 1000);
    }

    #[test]
    fn write_json_replaces_previous_report() {
        let temp = TempDir::new().expect("temp");
        let path = temp.path().join("report.json");
        std::fs::write(&path, "stale").expect("seed");

        sample_report().write_json(&path).expect("write");

        let text = std::fs::read_to_string(&path).expect("read");
        assert!(text.starts_with('{'));
        assert!(text.ends_with("}\n"));
    }
}
