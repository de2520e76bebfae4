//! Outgoing requests that can carry a server-side time budget.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;

/// Field under which [`Command`] stores its time budget.
pub const MAX_TIME_MS_FIELD: &str = "maxTimeMS";

/// A request the context can attach a time budget to.
pub trait BudgetedRequest {
    fn set_time_budget(&mut self, budget: Duration);
}

/// Options for [`crate::DeadlineContext::apply_budget_to_request`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyBudgetOptions {
    /// Leave the request untouched (e.g. the target does not honour budgets).
    pub skip: bool,
}

impl ApplyBudgetOptions {
    pub fn skip() -> Self {
        Self { skip: true }
    }
}

/// A command document sent to a server.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Command {
    document: Map<String, Value>,
}

impl Command {
    /// A command named `name` (`{ name: 1 }`).
    pub fn new(name: &str) -> Self {
        let mut document = Map::new();
        document.insert(name.to_string(), Value::from(1));
        Self { document }
    }

    /// Adds a field to the command document.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.document.insert(key.to_string(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.document.get(key)
    }

    /// The attached time budget in milliseconds, if any.
    pub fn max_time_ms(&self) -> Option<u64> {
        self.document.get(MAX_TIME_MS_FIELD).and_then(Value::as_u64)
    }

    pub fn document(&self) -> &Map<String, Value> {
        &self.document
    }
}

impl BudgetedRequest for Command {
    fn set_time_budget(&mut self, budget: Duration) {
        self.document
            .insert(MAX_TIME_MS_FIELD.to_string(), Value::from(budget.as_millis() as u64));
    }
}
