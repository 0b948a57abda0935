//! Per-user outcomes of a pipeline cycle.

use serde::{Deserialize, Serialize};

use crate::error::{AppError, ErrorKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Refresh,
    Ingest,
    Aggregate,
    Deliver,
}

impl Stage {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Refresh => "refresh",
            Self::Ingest => "ingest",
            Self::Aggregate => "aggregate",
            Self::Deliver => "deliver",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserFailure {
    pub user_id: String,
    pub stage: Stage,
    pub kind: ErrorKind,
    pub message: String,
}

impl UserFailure {
    pub fn new(user_id: impl Into<String>, stage: Stage, error: &AppError) -> Self {
        Self {
            user_id: user_id.into(),
            stage,
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    pub succeeded: Vec<String>,
    pub failed: Vec<UserFailure>,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    pub fn failure_for(&self, user_id: &str) -> Option<&UserFailure> {
        self.failed.iter().find(|f| f.user_id == user_id)
    }

    /// Sort both lists by user id; workers finish in arbitrary order.
    pub fn normalize(&mut self) {
        self.succeeded.sort();
        self.failed.sort_by(|a, b| a.user_id.cmp(&b.user_id));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    NoEmail,
    NoSnapshot,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedDelivery {
    pub user_id: String,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryReport {
    pub sent: Vec<String>,
    pub skipped: Vec<SkippedDelivery>,
    pub failed: Vec<UserFailure>,
}

/// Combined outcome of the weekly digest job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigestReport {
    pub cycle: BatchReport,
    pub delivery: DeliveryReport,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_records_kind_and_stage() {
        let err = AppError::Refresh {
            user_id: "u2".into(),
            reason: "invalid_grant".into(),
        };
        let failure = UserFailure::new("u2", Stage::Refresh, &err);

        assert_eq!(failure.kind, ErrorKind::Refresh);
        assert_eq!(failure.stage.to_string(), "refresh");
        assert!(failure.message.contains("invalid_grant"));
    }

    #[test]
    fn test_report_normalize_and_lookup() {
        let mut report = BatchReport {
            succeeded: vec!["c".into(), "a".into()],
            failed: vec![UserFailure {
                user_id: "b".into(),
                stage: Stage::Ingest,
                kind: ErrorKind::Ingest,
                message: "boom".into(),
            }],
        };
        report.normalize();

        assert_eq!(report.succeeded, vec!["a", "c"]);
        assert_eq!(report.total(), 3);
        assert!(report.failure_for("b").is_some());
        assert!(report.failure_for("a").is_none());
    }

    #[test]
    fn test_report_serializes_snake_case() {
        let failure = UserFailure {
            user_id: "u1".into(),
            stage: Stage::Aggregate,
            kind: ErrorKind::Aggregation,
            message: "x".into(),
        };
        let json = serde_json::to_value(&failure).unwrap();
        assert_eq!(json["stage"], "aggregate");
        assert_eq!(json["kind"], "aggregation");
    }
}
