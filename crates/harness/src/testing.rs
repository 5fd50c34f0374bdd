use serde_json::{json, Value};

use crate::{Key, Observation, PageDriver, SessionError};

/// Stand-in page that replays a list of observations.
///
/// Each call to `StateProbe::observe` consumes one observation (the `distance` read
/// advances the cursor); the last observation repeats once the list runs out.
#[derive(Debug, Default)]
pub(crate) struct ScriptedDriver {
    observations: Vec<Observation>,
    cursor: usize,
    pub(crate) state_missing: bool,
    pub(crate) fail_navigation: bool,
    pub(crate) navigations: Vec<String>,
    pub(crate) keys: Vec<Key>,
    pub(crate) screenshots: u32,
    pub(crate) evaluations: u32,
    pub(crate) close_calls: u32,
    pub(crate) closed: bool,
}

impl ScriptedDriver {
    pub(crate) fn new(observations: Vec<Observation>) -> Self {
        Self {
            observations,
            ..Self::default()
        }
    }

    fn current(&self) -> Observation {
        let index = self.cursor.min(self.observations.len().saturating_sub(1));
        self.observations
            .get(index)
            .copied()
            .unwrap_or(Observation::new(0.0, 0.0))
    }

    fn ensure_open(&self) -> Result<(), SessionError> {
        if self.closed {
            Err(SessionError::Closed)
        } else {
            Ok(())
        }
    }
}

impl PageDriver for ScriptedDriver {
    fn navigate(&mut self, url: &str) -> Result<(), SessionError> {
        self.ensure_open()?;
        if self.fail_navigation {
            return Err(SessionError::Config(format!("scripted navigation failure: {url}")));
        }
        self.navigations.push(url.to_string());
        Ok(())
    }

    fn screenshot_png(&mut self) -> Result<Vec<u8>, SessionError> {
        self.ensure_open()?;
        self.screenshots += 1;
        Ok(format!("png-{}", self.screenshots).into_bytes())
    }

    fn evaluate(&mut self, expression: &str) -> Result<Value, SessionError> {
        self.ensure_open()?;
        self.evaluations += 1;
        if self.state_missing {
            return Ok(json!({ "status": "missing_global" }));
        }
        let observation = self.current();
        let value = if expression.contains("\"time\"") {
            observation.time
        } else if expression.contains("\"distance\"") {
            self.cursor += 1;
            observation.distance
        } else {
            return Ok(json!({ "status": "missing_field" }));
        };
        Ok(json!({ "status": "present", "kind": "number", "value": value }))
    }

    fn press_key(&mut self, key: Key) -> Result<(), SessionError> {
        self.ensure_open()?;
        self.keys.push(key);
        Ok(())
    }

    fn close(&mut self) -> Result<(), SessionError> {
        self.close_calls += 1;
        self.closed = true;
        Ok(())
    }
}
