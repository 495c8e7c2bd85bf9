//! Immutable tabular dataset shared by all workers
//!
//! The dataset is loaded once at startup and never mutated afterwards, so
//! workers read it concurrently without locking. Alongside the records the
//! view carries the two fixed question classifications used by the ranking
//! tasks (best5/worst5): questions where a lower value is better and
//! questions where a higher value is better.

pub mod latch;
pub mod loader;

pub use latch::ReadyLatch;
pub use loader::{load_csv, DatasetError};

use std::collections::HashSet;

/// Questions where a lower mean is the better outcome
pub const LOWER_IS_BETTER: &[&str] = &[
    "Percent of adults aged 18 years and older who have an overweight classification",
    "Percent of adults aged 18 years and older who have obesity",
    "Percent of adults who engage in no leisure-time physical activity",
    "Percent of adults who report consuming fruit less than one time daily",
    "Percent of adults who report consuming vegetables less than one time daily",
];

/// Questions where a higher mean is the better outcome
pub const HIGHER_IS_BETTER: &[&str] = &[
    "Percent of adults who achieve at least 150 minutes a week of moderate-intensity aerobic physical activity or 75 minutes a week of vigorous-intensity aerobic activity (or an equivalent combination)",
    "Percent of adults who achieve at least 150 minutes a week of moderate-intensity aerobic physical activity or 75 minutes a week of vigorous-intensity aerobic physical activity and engage in muscle-strengthening activities on 2 or more days a week",
    "Percent of adults who achieve at least 300 minutes a week of moderate-intensity aerobic physical activity or 150 minutes a week of vigorous-intensity aerobic activity (or an equivalent combination)",
    "Percent of adults who engage in muscle-strengthening activities on 2 or more days a week",
];

/// A single row of the dataset
#[derive(Debug, Clone)]
pub struct DatasetRecord {
    pub location: String,
    pub question: String,
    pub value: f64,
    pub strat_category: Option<String>,
    pub strat_value: Option<String>,
}

/// Read-only view over the loaded records plus the question classifications
pub struct DatasetView {
    records: Vec<DatasetRecord>,
    lower_is_better: HashSet<String>,
    higher_is_better: HashSet<String>,
}

impl DatasetView {
    /// Build a view with the default question classifications
    pub fn new(records: Vec<DatasetRecord>) -> Self {
        Self::with_classifications(
            records,
            LOWER_IS_BETTER.iter().map(|q| q.to_string()).collect(),
            HIGHER_IS_BETTER.iter().map(|q| q.to_string()).collect(),
        )
    }

    /// Build a view with explicit classification lists (used by tests)
    pub fn with_classifications(
        records: Vec<DatasetRecord>,
        lower_is_better: HashSet<String>,
        higher_is_better: HashSet<String>,
    ) -> Self {
        Self {
            records,
            lower_is_better,
            higher_is_better,
        }
    }

    pub fn records(&self) -> &[DatasetRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// True when a lower mean counts as "best" for this question
    pub fn lower_is_better(&self, question: &str) -> bool {
        self.lower_is_better.contains(question)
    }

    /// True when a higher mean counts as "best" for this question
    pub fn higher_is_better(&self, question: &str) -> bool {
        self.higher_is_better.contains(question)
    }
}
