//! Aggregation algorithms executed by the workers
//!
//! Pure functions over a [`DatasetView`] plus task parameters. Each task is
//! a single linear scan building `(sum, count)` accumulators per grouping
//! key; means are computed once at the end and never rounded (serialization
//! writes the full f64). Nothing here touches shared mutable state, so any
//! worker can run any task concurrently.

use std::collections::HashMap;
use std::fmt;

use serde_json::{Map, Value};

use crate::dataset::DatasetView;

use super::job::{Job, JobKind};

/// Per-job failure. Contained to the failing job: the worker logs it and
/// stores an explicit error payload instead of a numeric result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The (question[, state]) combination matched zero rows. Surfaced as an
    /// explicit error instead of the unguarded 0/0 division it would
    /// otherwise become.
    EmptyAggregate {
        question: String,
        state: Option<String>,
    },
    /// A state-scoped task was submitted without the state parameter.
    MissingState(JobKind),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::EmptyAggregate { question, state } => match state {
                Some(state) => write!(
                    f,
                    "no data for question {:?} in state {:?}",
                    question, state
                ),
                None => write!(f, "no data for question {:?}", question),
            },
            EngineError::MissingState(kind) => {
                write!(f, "task {} requires a state parameter", kind)
            }
        }
    }
}

impl std::error::Error for EngineError {}

/// Running (sum, count) pair for one grouping key
#[derive(Debug, Clone, Copy, Default)]
struct Accumulator {
    sum: f64,
    count: u64,
}

impl Accumulator {
    fn add(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    fn mean(&self) -> f64 {
        // Callers guarantee count >= 1; empty aggregates error out earlier
        self.sum / self.count as f64
    }
}

/// Dispatch a job to its algorithm and render the JSON payload
pub fn run(view: &DatasetView, job: &Job) -> Result<Value, EngineError> {
    let question = job.params.question.as_str();

    match job.kind {
        JobKind::StatesMean => Ok(render_pairs(states_mean(view, question)?)),
        JobKind::StateMean => {
            let state = required_state(job)?;
            let mean = state_mean(view, question, state)?;
            Ok(render_scalar(state, mean))
        }
        JobKind::GlobalMean => Ok(render_scalar("global_mean", global_mean(view, question)?)),
        JobKind::Best5 => Ok(render_pairs(best5(view, question)?)),
        JobKind::Worst5 => Ok(render_pairs(worst5(view, question)?)),
        JobKind::DiffFromMean => Ok(render_pairs(diff_from_mean(view, question)?)),
        JobKind::StateDiffFromMean => {
            let state = required_state(job)?;
            let diff = state_diff_from_mean(view, question, state)?;
            Ok(render_scalar(state, diff))
        }
        JobKind::MeanByCategory => {
            let entries = mean_by_category(view, question)?;
            let mut map = Map::new();
            for (key, mean) in entries {
                map.insert(key.render(), Value::from(mean));
            }
            Ok(Value::Object(map))
        }
        JobKind::StateMeanByCategory => {
            let state = required_state(job)?;
            let entries = state_mean_by_category(view, question, state)?;
            let mut inner = Map::new();
            for (key, mean) in entries {
                inner.insert(key.render(), Value::from(mean));
            }
            let mut outer = Map::new();
            outer.insert(state.to_string(), Value::Object(inner));
            Ok(Value::Object(outer))
        }
    }
}

/// Payload stored when a job fails, so pollers get closure instead of an
/// id that stays "running" forever.
pub fn error_payload(err: &EngineError) -> Value {
    serde_json::json!({
        "status": "error",
        "reason": err.to_string(),
    })
}

fn required_state(job: &Job) -> Result<&str, EngineError> {
    job.params
        .state
        .as_deref()
        .ok_or(EngineError::MissingState(job.kind))
}

fn empty(question: &str, state: Option<&str>) -> EngineError {
    EngineError::EmptyAggregate {
        question: question.to_string(),
        state: state.map(|s| s.to_string()),
    }
}

/// Mean per location for one question, ascending by mean value
pub fn states_mean(view: &DatasetView, question: &str) -> Result<Vec<(String, f64)>, EngineError> {
    let mut groups: HashMap<&str, Accumulator> = HashMap::new();
    for record in view.records() {
        if record.question == question {
            groups.entry(&record.location).or_default().add(record.value);
        }
    }
    if groups.is_empty() {
        return Err(empty(question, None));
    }

    let mut means: Vec<(String, f64)> = groups
        .into_iter()
        .map(|(location, acc)| (location.to_string(), acc.mean()))
        .collect();
    means.sort_by(|a, b| a.1.total_cmp(&b.1));
    Ok(means)
}

/// Mean over all rows matching one question and one location
pub fn state_mean(view: &DatasetView, question: &str, state: &str) -> Result<f64, EngineError> {
    let mut acc = Accumulator::default();
    for record in view.records() {
        if record.question == question && record.location == state {
            acc.add(record.value);
        }
    }
    if acc.count == 0 {
        return Err(empty(question, Some(state)));
    }
    Ok(acc.mean())
}

/// Mean over all rows matching one question, across every location
pub fn global_mean(view: &DatasetView, question: &str) -> Result<f64, EngineError> {
    let mut acc = Accumulator::default();
    for record in view.records() {
        if record.question == question {
            acc.add(record.value);
        }
    }
    if acc.count == 0 {
        return Err(empty(question, None));
    }
    Ok(acc.mean())
}

/// First five of the grouped-mean ordering when a lower value is better for
/// the question, otherwise the highest five. Fewer than five groups truncate
/// to what exists; the returned slice keeps the ascending order.
pub fn best5(view: &DatasetView, question: &str) -> Result<Vec<(String, f64)>, EngineError> {
    let means = states_mean(view, question)?;
    Ok(select5(means, view.lower_is_better(question)))
}

/// The opposite selection of [`best5`] for the same question
pub fn worst5(view: &DatasetView, question: &str) -> Result<Vec<(String, f64)>, EngineError> {
    let means = states_mean(view, question)?;
    Ok(select5(means, !view.lower_is_better(question)))
}

fn select5(means: Vec<(String, f64)>, take_lowest: bool) -> Vec<(String, f64)> {
    let k = means.len().min(5);
    if take_lowest {
        means.into_iter().take(k).collect()
    } else {
        let skip = means.len() - k;
        means.into_iter().skip(skip).collect()
    }
}

/// Global mean minus each location's mean, in grouped-mean order
pub fn diff_from_mean(
    view: &DatasetView,
    question: &str,
) -> Result<Vec<(String, f64)>, EngineError> {
    let means = states_mean(view, question)?;
    let global = global_mean(view, question)?;
    Ok(means
        .into_iter()
        .map(|(location, mean)| (location, global - mean))
        .collect())
}

/// Global mean minus one location's mean
pub fn state_diff_from_mean(
    view: &DatasetView,
    question: &str,
    state: &str,
) -> Result<f64, EngineError> {
    let mean = state_mean(view, question, state)?;
    let global = global_mean(view, question)?;
    Ok(global - mean)
}

/// Grouping key for [`mean_by_category`]; structured internally and only
/// rendered to its wire form at the output boundary.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CategoryKey {
    pub location: String,
    pub category: String,
    pub value: String,
}

impl CategoryKey {
    /// Wire form kept compatible with the stored results of the original
    /// service: `('Location', 'Category', 'Value')`
    pub fn render(&self) -> String {
        format!("('{}', '{}', '{}')", self.location, self.category, self.value)
    }
}

/// Grouping key for [`state_mean_by_category`]
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StratKey {
    pub category: String,
    pub value: String,
}

impl StratKey {
    /// Wire form: `('Category', 'Value')`
    pub fn render(&self) -> String {
        format!("('{}', '{}')", self.category, self.value)
    }
}

/// Mean per (location, category, value) triple, ascending by the triple
pub fn mean_by_category(
    view: &DatasetView,
    question: &str,
) -> Result<Vec<(CategoryKey, f64)>, EngineError> {
    let mut groups: HashMap<CategoryKey, Accumulator> = HashMap::new();
    for record in view.records() {
        if record.question != question {
            continue;
        }
        let (category, value) = match (&record.strat_category, &record.strat_value) {
            (Some(c), Some(v)) => (c, v),
            _ => continue,
        };
        groups
            .entry(CategoryKey {
                location: record.location.clone(),
                category: category.clone(),
                value: value.clone(),
            })
            .or_default()
            .add(record.value);
    }
    if groups.is_empty() {
        return Err(empty(question, None));
    }

    let mut means: Vec<(CategoryKey, f64)> = groups
        .into_iter()
        .map(|(key, acc)| (key, acc.mean()))
        .collect();
    means.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(means)
}

/// Mean per (category, value) pair within one location, ascending by pair
pub fn state_mean_by_category(
    view: &DatasetView,
    question: &str,
    state: &str,
) -> Result<Vec<(StratKey, f64)>, EngineError> {
    let mut groups: HashMap<StratKey, Accumulator> = HashMap::new();
    for record in view.records() {
        if record.question != question || record.location != state {
            continue;
        }
        let (category, value) = match (&record.strat_category, &record.strat_value) {
            (Some(c), Some(v)) => (c, v),
            _ => continue,
        };
        groups
            .entry(StratKey {
                category: category.clone(),
                value: value.clone(),
            })
            .or_default()
            .add(record.value);
    }
    if groups.is_empty() {
        return Err(empty(question, Some(state)));
    }

    let mut means: Vec<(StratKey, f64)> = groups
        .into_iter()
        .map(|(key, acc)| (key, acc.mean()))
        .collect();
    means.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(means)
}

fn render_pairs(pairs: Vec<(String, f64)>) -> Value {
    let mut map = Map::new();
    for (key, value) in pairs {
        map.insert(key, Value::from(value));
    }
    Value::Object(map)
}

fn render_scalar(key: &str, value: f64) -> Value {
    let mut map = Map::new();
    map.insert(key.to_string(), Value::from(value));
    Value::Object(map)
}
