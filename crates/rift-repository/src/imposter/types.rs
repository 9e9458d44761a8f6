//! Type definitions for persisted imposters and stubs.
//!
//! Field naming follows the Mountebank JSON contract (`camelCase`, `_behaviors`).

use super::actions::ShutdownAction;
use crate::stubs::HasRepeatBehavior;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Marker left on `is` responses captured by a recording proxy
pub const PROXY_RESPONSE_TIME_FIELD: &str = "_proxyResponseTime";

fn default_protocol() -> String {
    "http".to_string()
}

// ============================================================================
// Imposter
// ============================================================================

/// A mock service definition bound to a port.
///
/// Protocol-specific settings are carried through untouched in `config`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Imposter {
    pub port: u16,
    #[serde(default = "default_protocol")]
    pub protocol: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub stubs: Vec<Stub>,
    /// Persisted reference to the action that stops this imposter's listener
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop: Option<ShutdownAction>,
    /// Request log, only present when requests are persisted
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requests: Vec<Value>,
    #[serde(flatten)]
    pub config: Map<String, Value>,
}

impl Imposter {
    pub fn new(port: u16, protocol: impl Into<String>) -> Self {
        Self {
            port,
            protocol: protocol.into(),
            name: None,
            stubs: Vec::new(),
            stop: None,
            requests: Vec::new(),
            config: Map::new(),
        }
    }

    pub fn with_stubs(mut self, stubs: Vec<Stub>) -> Self {
        self.stubs = stubs;
        self
    }

    pub fn with_stop(mut self, stop: ShutdownAction) -> Self {
        self.stop = Some(stop);
        self
    }
}

// ============================================================================
// Stub Types
// ============================================================================

/// Stub definition
/// Field ordering matches Mountebank output: scenarioName, predicates, responses, matches
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Stub {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scenario_name: Option<String>,
    #[serde(default)]
    pub predicates: Vec<Value>,
    #[serde(default)]
    pub responses: Vec<ResponseConfig>,
    /// Debug trail of requests this stub answered
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub matches: Vec<Match>,
}

impl Stub {
    pub fn new(predicates: Vec<Value>, responses: Vec<ResponseConfig>) -> Self {
        Self {
            predicates,
            responses,
            ..Default::default()
        }
    }

    pub fn with_responses(responses: Vec<ResponseConfig>) -> Self {
        Self::new(Vec::new(), responses)
    }
}

/// One candidate response of a stub.
///
/// The payload (`is`, `proxy`, `inject`, `fault`, `_behaviors`, ...) is opaque
/// here; only `repeat` and the proxy capture marker are interpreted.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ResponseConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeat: Option<u32>,
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl ResponseConfig {
    /// `{"is": <response>}`
    pub fn is(response: Value) -> Self {
        let mut payload = Map::new();
        payload.insert("is".to_string(), response);
        Self {
            repeat: None,
            payload,
        }
    }

    /// Served when a stub has nothing configured: `{"is": {}}`
    pub fn empty() -> Self {
        Self::is(Value::Object(Map::new()))
    }

    pub fn with_repeat(mut self, repeat: u32) -> Self {
        self.repeat = Some(repeat);
        self
    }

    /// The `is` block, if this is a static response
    pub fn is_response(&self) -> Option<&Value> {
        self.payload.get("is")
    }

    /// True for responses captured by a recording proxy
    pub fn is_recorded_proxy_response(&self) -> bool {
        self.is_response()
            .and_then(|is| is.get(PROXY_RESPONSE_TIME_FIELD))
            .is_some()
    }
}

impl HasRepeatBehavior for ResponseConfig {
    /// Top-level `repeat`, falling back to `_behaviors.repeat`
    /// (object form or Mountebank's array-of-behaviors form).
    fn get_repeat(&self) -> Option<u32> {
        if self.repeat.is_some() {
            return self.repeat;
        }
        let behaviors = self.payload.get("_behaviors")?;
        let repeat = match behaviors {
            Value::Object(obj) => obj.get("repeat"),
            Value::Array(arr) => arr.iter().find_map(|b| b.get("repeat")),
            _ => None,
        }?;
        repeat.as_u64().and_then(|n| u32::try_from(n).ok())
    }
}

/// Debug record of one predicate match and the response it produced
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Match {
    pub timestamp: String,
    pub request: Value,
    pub response: Value,
    pub response_config: ResponseConfig,
    /// Milliseconds spent producing the response
    pub processing_time: u64,
}

/// Options for snapshotting a stub list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SnapshotOptions {
    /// Include each stub's `matches`
    pub debug: bool,
}

impl SnapshotOptions {
    pub fn debug() -> Self {
        Self { debug: true }
    }
}
