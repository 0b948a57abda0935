use serde::{Deserialize, Serialize};

/// Lookback window the music service uses to scope "top" queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeRange {
    Short,
    Medium,
    Long,
}

impl TimeRange {
    pub const ALL: [TimeRange; 3] = [Self::Short, Self::Medium, Self::Long];

    /// Value stored in the `time_range` columns.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Short => "short",
            Self::Medium => "medium",
            Self::Long => "long",
        }
    }

    /// Value the Spotify API expects in the `time_range` query parameter.
    pub fn api_value(&self) -> &str {
        match self {
            Self::Short => "short_term",
            Self::Medium => "medium_term",
            Self::Long => "long_term",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "short" | "short_term" => Some(Self::Short),
            "medium" | "medium_term" => Some(Self::Medium),
            "long" | "long_term" => Some(Self::Long),
            _ => None,
        }
    }
}

impl From<TimeRange> for String {
    fn from(range: TimeRange) -> String {
        range.as_str().to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobType {
    IngestCycle,
    AggregateCycle,
    DigestCycle,
    Newsletter,
}

impl JobType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::IngestCycle => "ingest_cycle",
            Self::AggregateCycle => "aggregate_cycle",
            Self::DigestCycle => "digest_cycle",
            Self::Newsletter => "newsletter",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "ingest_cycle" => Some(Self::IngestCycle),
            "aggregate_cycle" => Some(Self::AggregateCycle),
            "digest_cycle" => Some(Self::DigestCycle),
            "newsletter" => Some(Self::Newsletter),
            _ => None,
        }
    }
}

impl From<JobType> for String {
    fn from(job_type: JobType) -> String {
        job_type.as_str().to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl From<JobStatus> for String {
    fn from(status: JobStatus) -> String {
        status.as_str().to_string()
    }
}
