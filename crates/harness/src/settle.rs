use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::{Observation, PageDriver, ProbeError, StateProbe, DEFAULT_SETTLE_MS};

/// How the runner waits between stimulating the page and the second observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettleStrategy {
    /// Blind wait, then one observation.
    Fixed(Duration),
    /// Sample every `interval` until both counters dropped below the baseline or `timeout`
    /// elapses.
    Poll { interval: Duration, timeout: Duration },
}

impl Default for SettleStrategy {
    fn default() -> Self {
        SettleStrategy::Fixed(Duration::from_millis(DEFAULT_SETTLE_MS))
    }
}

impl SettleStrategy {
    pub fn mode_name(&self) -> &'static str {
        match self {
            SettleStrategy::Fixed(_) => "fixed",
            SettleStrategy::Poll { .. } => "poll",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Settled {
    pub observation: Observation,
    pub waited: Duration,
    pub samples: u32,
}

pub fn settle<D: PageDriver>(
    driver: &mut D,
    probe: &StateProbe,
    baseline: &Observation,
    strategy: SettleStrategy,
) -> Result<Settled, ProbeError> {
    let started = Instant::now();
    let settled = match strategy {
        SettleStrategy::Fixed(delay) => {
            thread::sleep(delay);
            Settled {
                observation: probe.observe(driver)?,
                waited: started.elapsed(),
                samples: 1,
            }
        }
        SettleStrategy::Poll { interval, timeout } => {
            poll_until_moved(driver, probe, baseline, interval, started + timeout, started)?
        }
    };

    info!(
        mode = strategy.mode_name(),
        waited_ms = settled.waited.as_millis() as u64,
        samples = settled.samples,
        moved = settled.observation.both_decreased_from(baseline),
        "settle_complete"
    );
    Ok(settled)
}

fn poll_until_moved<D: PageDriver>(
    driver: &mut D,
    probe: &StateProbe,
    baseline: &Observation,
    interval: Duration,
    deadline: Instant,
    started: Instant,
) -> Result<Settled, ProbeError> {
    let mut samples = 0u32;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        thread::sleep(interval.min(remaining));

        let observation = probe.observe(driver)?;
        samples = samples.saturating_add(1);
        debug!(sample = samples, %observation, "settle_sample");

        if observation.both_decreased_from(baseline) || Instant::now() >= deadline {
            return Ok(Settled {
                observation,
                waited: started.elapsed(),
                samples,
            });
        }
    }
}
