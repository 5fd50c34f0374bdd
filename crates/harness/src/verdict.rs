use serde::Serialize;

use crate::Observation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    Distance,
    Time,
}

impl Signal {
    fn read(self, observation: &Observation) -> f64 {
        match self {
            Signal::Distance => observation.distance,
            Signal::Time => observation.time,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CheckOutcome {
    pub signal: Signal,
    pub initial: f64,
    pub current: f64,
    pub passed: bool,
}

impl CheckOutcome {
    pub fn evaluate(signal: Signal, initial: &Observation, current: &Observation) -> Self {
        let initial = signal.read(initial);
        let current = signal.read(current);
        Self {
            signal,
            initial,
            current,
            // NaN on either side compares false and lands on the failure path.
            passed: current < initial,
        }
    }

    pub fn message(&self) -> &'static str {
        match (self.signal, self.passed) {
            (Signal::Distance, true) => "SUCCESS: Distance decreased, game loop is running.",
            (Signal::Distance, false) => {
                "FAILURE: Distance did not decrease, game loop might be stuck."
            }
            (Signal::Time, true) => "SUCCESS: Time decreased.",
            (Signal::Time, false) => "FAILURE: Time did not decrease.",
        }
    }
}

/// Distance check first, then time, matching the transcript order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Verdict {
    pub distance: CheckOutcome,
    pub time: CheckOutcome,
}

impl Verdict {
    pub fn from_observations(initial: &Observation, current: &Observation) -> Self {
        Self {
            distance: CheckOutcome::evaluate(Signal::Distance, initial, current),
            time: CheckOutcome::evaluate(Signal::Time, initial, current),
        }
    }

    pub fn checks(&self) -> [&CheckOutcome; 2] {
        [&self.distance, &self.time]
    }

    pub fn passed(&self) -> bool {
        self.distance.passed && self.time.passed
    }

    pub fn exit_code(&self) -> u8 {
        if self.passed() {
            0
        } else {
            1
        }
    }
}
