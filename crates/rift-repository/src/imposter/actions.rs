//! Shutdown actions as capability references.
//!
//! A persisted imposter never carries code. Its `stop` field names a handler
//! registered in the owning process, plus opaque arguments for it. Resolving
//! an unknown name yields no action.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Persisted descriptor of an imposter's shutdown action
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ShutdownAction {
    /// Name of the registered handler
    pub handler: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub args: Value,
}

impl ShutdownAction {
    pub fn new(handler: impl Into<String>) -> Self {
        Self {
            handler: handler.into(),
            args: Value::Null,
        }
    }

    pub fn with_args(mut self, args: Value) -> Self {
        self.args = args;
        self
    }
}

/// Process-side implementation of a shutdown action, e.g. closing a listener
#[async_trait]
pub trait ShutdownHandler: Send + Sync {
    async fn shutdown(&self, port: u16, args: &Value) -> anyhow::Result<()>;
}

/// Handler table keyed by name
#[derive(Default)]
pub struct ActionRegistry {
    handlers: RwLock<HashMap<String, Arc<dyn ShutdownHandler>>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under `name`, replacing any previous handler
    pub fn register(&self, name: impl Into<String>, handler: Arc<dyn ShutdownHandler>) {
        let name = name.into();
        debug!(handler = %name, "Registered shutdown handler");
        self.handlers.write().insert(name, handler);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.read().contains_key(name)
    }

    pub fn resolve(&self, action: &ShutdownAction) -> Option<Arc<dyn ShutdownHandler>> {
        self.handlers.read().get(&action.handler).cloned()
    }

    /// Check that a loaded action can be resolved. Unknown handlers are
    /// logged, not rejected: the imposter is still usable, it just cannot be
    /// stopped from this process.
    pub(crate) fn restore(&self, port: u16, action: Option<&ShutdownAction>) {
        if let Some(action) = action {
            if !self.contains(&action.handler) {
                warn!(
                    port = port,
                    handler = %action.handler,
                    "No shutdown handler registered; imposter cannot be stopped by this process"
                );
            }
        }
    }

    /// Run the action for `port`. Failures are logged and reported as false.
    pub async fn invoke(&self, port: u16, action: &ShutdownAction) -> bool {
        let Some(handler) = self.resolve(action) else {
            warn!(port = port, handler = %action.handler, "Unknown shutdown handler, skipping");
            return false;
        };

        match handler.shutdown(port, &action.args).await {
            Ok(()) => {
                debug!(port = port, handler = %action.handler, "Shutdown action completed");
                true
            }
            Err(e) => {
                error!(port = port, handler = %action.handler, "Shutdown action failed: {:#}", e);
                false
            }
        }
    }
}
