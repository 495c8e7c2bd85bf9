//! Job model: one unit of aggregation work with a unique id and kind

use std::fmt;

pub type JobId = u64;

/// The nine supported aggregation tasks
///
/// The shutdown sentinel is deliberately not a `JobKind`: it is represented
/// as [`super::QueueTask::Shutdown`] so it can never carry parameters, never
/// receives a job id and never reaches the aggregation dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    StatesMean,
    StateMean,
    Best5,
    Worst5,
    GlobalMean,
    DiffFromMean,
    StateDiffFromMean,
    MeanByCategory,
    StateMeanByCategory,
}

impl JobKind {
    /// All kinds, in wire-name order
    pub const ALL: [JobKind; 9] = [
        JobKind::StatesMean,
        JobKind::StateMean,
        JobKind::Best5,
        JobKind::Worst5,
        JobKind::GlobalMean,
        JobKind::DiffFromMean,
        JobKind::StateDiffFromMean,
        JobKind::MeanByCategory,
        JobKind::StateMeanByCategory,
    ];

    /// Parse a wire name as used by the HTTP API. Unknown names are rejected
    /// here, at intake, so an unrecognized kind can never reach a worker.
    pub fn parse(name: &str) -> Option<JobKind> {
        match name {
            "states_mean" => Some(JobKind::StatesMean),
            "state_mean" => Some(JobKind::StateMean),
            "best5" => Some(JobKind::Best5),
            "worst5" => Some(JobKind::Worst5),
            "global_mean" => Some(JobKind::GlobalMean),
            "diff_from_mean" => Some(JobKind::DiffFromMean),
            "state_diff_from_mean" => Some(JobKind::StateDiffFromMean),
            "mean_by_category" => Some(JobKind::MeanByCategory),
            "state_mean_by_category" => Some(JobKind::StateMeanByCategory),
            _ => None,
        }
    }

    pub fn wire_name(&self) -> &'static str {
        match self {
            JobKind::StatesMean => "states_mean",
            JobKind::StateMean => "state_mean",
            JobKind::Best5 => "best5",
            JobKind::Worst5 => "worst5",
            JobKind::GlobalMean => "global_mean",
            JobKind::DiffFromMean => "diff_from_mean",
            JobKind::StateDiffFromMean => "state_diff_from_mean",
            JobKind::MeanByCategory => "mean_by_category",
            JobKind::StateMeanByCategory => "state_mean_by_category",
        }
    }

    /// Kinds scoped to a single location require the `state` parameter
    pub fn requires_state(&self) -> bool {
        matches!(
            self,
            JobKind::StateMean | JobKind::StateDiffFromMean | JobKind::StateMeanByCategory
        )
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// Request parameters carried by a job
#[derive(Debug, Clone)]
pub struct JobParams {
    pub question: String,
    pub state: Option<String>,
}

impl JobParams {
    pub fn question(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            state: None,
        }
    }

    pub fn question_and_state(question: impl Into<String>, state: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            state: Some(state.into()),
        }
    }
}

/// One unit of aggregation work. Immutable once created; ids are assigned by
/// the engine in strictly increasing order starting at 1.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: JobId,
    pub kind: JobKind,
    pub params: JobParams,
}
