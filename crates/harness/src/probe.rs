//! Typed reads of the page's global game state.
//!
//! This module is the only place that builds JavaScript. Each read evaluates a small
//! expression that reports whether the global and the field exist and what JavaScript type
//! the field holds, so a missing `state` object surfaces as [`ProbeError::MissingGlobal`]
//! instead of a script exception.

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::{Observation, PageDriver, SessionError};

pub const DEFAULT_STATE_GLOBAL: &str = "state";
pub const TIME_FIELD: &str = "time";
pub const DISTANCE_FIELD: &str = "distance";

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("'{0}' is not a valid JavaScript identifier for the state global")]
    InvalidGlobalName(String),
    #[error("page does not expose a global `{global}` object")]
    MissingGlobal { global: String },
    #[error("`{global}` has no field `{field}`")]
    MissingField { global: String, field: String },
    #[error("`{global}.{field}` is not a finite number (found {kind})")]
    NotNumeric {
        global: String,
        field: String,
        kind: String,
    },
    #[error("unexpected reply while reading `{global}.{field}`{location}: {source}")]
    Decode {
        global: String,
        field: String,
        location: String,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Session(#[from] SessionError),
}

#[derive(Debug, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum FieldReading {
    MissingGlobal,
    MissingField,
    Present { kind: String, value: Option<f64> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateProbe {
    global: String,
}

impl Default for StateProbe {
    fn default() -> Self {
        Self {
            global: DEFAULT_STATE_GLOBAL.to_string(),
        }
    }
}

impl StateProbe {
    pub fn new(global: impl Into<String>) -> Result<Self, ProbeError> {
        let global = global.into();
        if !is_js_identifier(&global) {
            return Err(ProbeError::InvalidGlobalName(global));
        }
        Ok(Self { global })
    }

    pub fn global(&self) -> &str {
        &self.global
    }

    /// Reads `time` then `distance`.
    pub fn observe<D: PageDriver>(&self, driver: &mut D) -> Result<Observation, ProbeError> {
        let time = self.read_field(driver, TIME_FIELD)?;
        let distance = self.read_field(driver, DISTANCE_FIELD)?;
        Ok(Observation::new(time, distance))
    }

    pub fn read_field<D: PageDriver>(&self, driver: &mut D, field: &str) -> Result<f64, ProbeError> {
        let reply = driver.evaluate(&self.expression_for(field))?;
        debug!(global = %self.global, field, reply = %reply, "probe_reply");
        self.decode_reply(field, reply)
    }

    /// `typeof` keeps lexical `const` globals reachable, which `window[...]` would miss.
    pub fn expression_for(&self, field: &str) -> String {
        let global = &self.global;
        let key = Value::String(field.to_string());
        format!(
            "(() => {{ \
if (typeof {global} === 'undefined' || {global} === null) return {{ status: 'missing_global' }}; \
const key = {key}; \
if (!(key in Object({global}))) return {{ status: 'missing_field' }}; \
const value = {global}[key]; \
return {{ status: 'present', kind: typeof value, value: Number.isFinite(value) ? value : null }}; \
}})()"
        )
    }

    fn decode_reply(&self, field: &str, reply: Value) -> Result<f64, ProbeError> {
        let reading = serde_path_to_error::deserialize::<_, FieldReading>(reply).map_err(|error| {
            let path = error.path().to_string();
            let location = if path.is_empty() || path == "." {
                String::new()
            } else {
                format!(" at {path}")
            };
            ProbeError::Decode {
                global: self.global.clone(),
                field: field.to_string(),
                location,
                source: error.into_inner(),
            }
        })?;

        match reading {
            FieldReading::MissingGlobal => Err(ProbeError::MissingGlobal {
                global: self.global.clone(),
            }),
            FieldReading::MissingField => Err(ProbeError::MissingField {
                global: self.global.clone(),
                field: field.to_string(),
            }),
            FieldReading::Present {
                kind,
                value: Some(value),
            } if kind == "number" => Ok(value),
            FieldReading::Present { kind, value } => Err(ProbeError::NotNumeric {
                global: self.global.clone(),
                field: field.to_string(),
                kind: match (kind.as_str(), value) {
                    ("number", None) => "non-finite number".to_string(),
                    _ => kind,
                },
            }),
        }
    }
}

fn is_js_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first.is_ascii_alphabetic() || first == '_' || first == '$')
        && chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '$')
}
