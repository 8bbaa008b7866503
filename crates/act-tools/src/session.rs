//! Single-tenant test session accumulator.
//!
//! A session is a named window collecting assertion outcomes. Assertions
//! recorded while no session is active buffer into an implicit "unnamed"
//! session that the next `end()` reports. Starting while active replaces the
//! name and resets the buffer.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Name reported when assertions were recorded without a `start()`.
pub const UNNAMED_SESSION: &str = "unnamed";

/// One recorded assertion outcome.
#[derive(Debug, Clone, Serialize)]
pub struct Assertion {
    pub passed: bool,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Summary emitted when a session ends.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub name: String,
    /// True when no recorded assertion failed.
    pub passed: bool,
    pub total: usize,
    pub passed_count: usize,
    pub failed_count: usize,
    pub assertions: Vec<Assertion>,
    #[serde(rename = "startedAt")]
    pub started_at: DateTime<Utc>,
    #[serde(rename = "endedAt")]
    pub ended_at: DateTime<Utc>,
    #[serde(rename = "durationMs")]
    pub duration_ms: i64,
}

/// The accumulator. States: idle (no name) and active (name set).
#[derive(Debug, Default)]
pub struct TestSession {
    name: Option<String>,
    started_at: Option<DateTime<Utc>>,
    assertions: Vec<Assertion>,
}

impl TestSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.name.is_some()
    }

    /// Begin a named session, clearing any buffered assertions. Starting
    /// while active silently replaces the name.
    pub fn start(&mut self, name: impl Into<String>) {
        self.name = Some(name.into());
        self.started_at = Some(Utc::now());
        self.assertions.clear();
    }

    /// Record one assertion outcome with the current timestamp. Permitted
    /// while idle; the first idle assertion opens the implicit unnamed
    /// window.
    pub fn add_assertion(&mut self, passed: bool, message: impl Into<String>) {
        if self.started_at.is_none() {
            self.started_at = Some(Utc::now());
        }
        self.assertions.push(Assertion {
            passed,
            message: message.into(),
            timestamp: Utc::now(),
        });
    }

    /// Close the window and emit its summary, returning to idle.
    pub fn end(&mut self) -> SessionSummary {
        let ended_at = Utc::now();
        let started_at = self.started_at.take().unwrap_or(ended_at);
        let name = self
            .name
            .take()
            .unwrap_or_else(|| UNNAMED_SESSION.to_string());
        let assertions = std::mem::take(&mut self.assertions);

        let passed_count = assertions.iter().filter(|a| a.passed).count();
        let failed_count = assertions.len() - passed_count;

        SessionSummary {
            name,
            passed: failed_count == 0,
            total: assertions.len(),
            passed_count,
            failed_count,
            assertions,
            started_at,
            ended_at,
            duration_ms: (ended_at - started_at).num_milliseconds(),
        }
    }
}
