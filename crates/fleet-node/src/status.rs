//! Latest worker response per worker, kept on main for operator queries.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use fleet_types::{CommandName, InstanceId, WorkerResponseMessage};
use parking_lot::RwLock;
use serde_json::Value;

/// One worker's most recent answer.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerReport {
    pub worker_id: InstanceId,
    pub command: CommandName,
    pub payload: Option<Value>,
    pub received_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct WorkerStatusBoard {
    reports: RwLock<HashMap<InstanceId, WorkerReport>>,
}

impl WorkerStatusBoard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the worker's previous report.
    pub fn record(&self, response: &WorkerResponseMessage) {
        let report = WorkerReport {
            worker_id: response.worker_id.clone(),
            command: response.command,
            payload: response.payload.clone(),
            received_at: Utc::now(),
        };
        self.reports
            .write()
            .insert(response.worker_id.clone(), report);
    }

    #[must_use]
    pub fn latest(&self, worker_id: &InstanceId) -> Option<WorkerReport> {
        self.reports.read().get(worker_id).cloned()
    }

    /// All reports, ordered by worker id.
    #[must_use]
    pub fn snapshot(&self) -> Vec<WorkerReport> {
        let mut reports: Vec<_> = self.reports.read().values().cloned().collect();
        reports.sort_by(|a, b| a.worker_id.as_str().cmp(b.worker_id.as_str()));
        reports
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.reports.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.reports.read().is_empty()
    }
}
