use std::fmt::Display;
use std::io;
use std::process::ExitCode;

use harness::{run_and_release, ChromeSession, RunError, VerificationReport};
use tracing::{error, info};

use super::bootstrap::AppWiring;

/// Launch, navigation, probe or I/O fault; distinct from a failed check (exit code 1).
pub(crate) const EXIT_FAULT: u8 = 2;

pub(crate) fn run(app: AppWiring) -> ExitCode {
    let mut session = match ChromeSession::launch(&app.config.browser) {
        Ok(session) => session,
        Err(err) => return fault("browser_launch_failed", &err),
    };

    let stdout = io::stdout();
    let mut transcript = stdout.lock();
    let outcome = run_and_release(&mut session, &app.plan, &mut transcript);

    match &outcome {
        Ok(report) => {
            if let Some(path) = &app.config.report_path {
                if let Err(err) = report.write_json(path) {
                    return fault("report_write_failed", &err);
                }
                info!(path = %path.display(), "report_written");
            }
        }
        Err(err) => error!(error = %err, "verification_aborted"),
    }

    ExitCode::from(exit_code_for(&outcome))
}

pub(crate) fn startup_failed(err: &dyn Display) -> ExitCode {
    fault("startup_failed", err)
}

fn exit_code_for(outcome: &Result<VerificationReport, RunError>) -> u8 {
    match outcome {
        Ok(report) => report.exit_code(),
        Err(_) => EXIT_FAULT,
    }
}

fn fault(event: &'static str, err: &dyn Display) -> ExitCode {
    error!(error = %err, event, "fault");
    ExitCode::from(EXIT_FAULT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use harness::{Observation, SettleSummary, Verdict};
    use std::io::Write;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
            self.0.lock().expect("buffer lock").extend_from_slice(bytes);
            Ok(bytes.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuffer {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().expect("buffer lock").clone()).expect("utf8")
        }
    }

    fn report(initial: Observation, current: Observation) -> VerificationReport {
        let verdict = Verdict::from_observations(&initial, &current);
        VerificationReport {
            page_url: "file:///game/index.html".to_string(),
            initial_screenshot: PathBuf::from("verification/initial.png"),
            running_screenshot: PathBuf::from("verification/verification.png"),
            initial,
            current,
            settle: SettleSummary {
                mode: "fixed",
                configured_ms: 1_000,
                waited_ms: 1_000,
                samples: 1,
            },
            passed: verdict.passed(),
            verdict,
        }
    }

    #[test]
    fn exit_codes_separate_pass_fail_and_fault() {
        let passing = report(Observation::new(60.0, 1000.0), Observation::new(59.0, 985.0));
        let stuck = report(Observation::new(60.0, 1000.0), Observation::new(60.0, 1000.0));
        let faulted: Result<VerificationReport, RunError> = Err(RunError::Transcript(
            io::Error::new(io::ErrorKind::BrokenPipe, "closed"),
        ));

        assert_eq!(exit_code_for(&Ok(passing)), 0);
        assert_eq!(exit_code_for(&Ok(stuck)), 1);
        assert_eq!(exit_code_for(&faulted), EXIT_FAULT);
    }

    #[test]
    fn fault_reports_the_error_once_through_tracing() {
        let logs = SharedBuffer::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            let _ = fault("startup_failed", &"page not found: index.html");
        });

        let text = logs.text();
        assert_eq!(text.matches("page not found: index.html").count(), 1, "{text}");
        assert!(text.contains("startup_failed"), "{text}");
    }
}
