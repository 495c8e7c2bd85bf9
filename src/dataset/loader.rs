//! CSV loader for the statistics dataset
//!
//! Reads the CDC nutrition/activity/obesity subset once at startup. Column
//! positions are resolved from the header row, fields may be quoted (the
//! question texts contain commas), and rows without a numeric data value are
//! skipped with a warning.

use std::fmt;
use std::fs;
use std::io;
use std::path::Path;

use super::{DatasetRecord, DatasetView};

const COL_LOCATION: &str = "LocationDesc";
const COL_QUESTION: &str = "Question";
const COL_VALUE: &str = "Data_Value";
const COL_STRAT_CATEGORY: &str = "StratificationCategory1";
const COL_STRAT_VALUE: &str = "Stratification1";

#[derive(Debug)]
pub enum DatasetError {
    Io(io::Error),
    EmptyFile,
    MissingColumn(&'static str),
}

impl From<io::Error> for DatasetError {
    fn from(err: io::Error) -> Self {
        DatasetError::Io(err)
    }
}

impl fmt::Display for DatasetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatasetError::Io(e) => write!(f, "IO error: {}", e),
            DatasetError::EmptyFile => write!(f, "dataset file has no header row"),
            DatasetError::MissingColumn(col) => write!(f, "missing dataset column: {}", col),
        }
    }
}

impl std::error::Error for DatasetError {}

/// Load the dataset from a CSV file and freeze it into a view
pub fn load_csv(path: impl AsRef<Path>) -> Result<DatasetView, DatasetError> {
    let contents = fs::read_to_string(path.as_ref())?;
    let mut rows = split_rows(&contents).into_iter();

    let header = rows.next().ok_or(DatasetError::EmptyFile)?;
    let header_fields = split_fields(&header);

    let location_idx = column_index(&header_fields, COL_LOCATION)?;
    let question_idx = column_index(&header_fields, COL_QUESTION)?;
    let value_idx = column_index(&header_fields, COL_VALUE)?;
    let strat_category_idx = column_index(&header_fields, COL_STRAT_CATEGORY)?;
    let strat_value_idx = column_index(&header_fields, COL_STRAT_VALUE)?;

    let mut records = Vec::new();
    let mut skipped = 0usize;

    for (line_no, row) in rows.enumerate() {
        if row.trim().is_empty() {
            continue;
        }

        let fields = split_fields(&row);
        let value = fields
            .get(value_idx)
            .and_then(|v| v.trim().parse::<f64>().ok());

        let value = match value {
            Some(v) => v,
            None => {
                // Suppressed rows carry an empty Data_Value in the source data
                skipped += 1;
                log::debug!("skipping row {}: no numeric data value", line_no + 2);
                continue;
            }
        };

        records.push(DatasetRecord {
            location: field_owned(&fields, location_idx),
            question: field_owned(&fields, question_idx),
            value,
            strat_category: field_optional(&fields, strat_category_idx),
            strat_value: field_optional(&fields, strat_value_idx),
        });
    }

    if skipped > 0 {
        log::warn!("dataset loader skipped {} rows without a data value", skipped);
    }
    log::info!("loaded {} dataset records", records.len());

    Ok(DatasetView::new(records))
}

fn column_index(header: &[String], name: &'static str) -> Result<usize, DatasetError> {
    header
        .iter()
        .position(|h| h == name)
        .ok_or(DatasetError::MissingColumn(name))
}

fn field_owned(fields: &[String], idx: usize) -> String {
    fields.get(idx).cloned().unwrap_or_default()
}

fn field_optional(fields: &[String], idx: usize) -> Option<String> {
    fields
        .get(idx)
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

/// Split raw CSV text into logical rows, honoring quoted newlines
fn split_rows(contents: &str) -> Vec<String> {
    let mut rows = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for ch in contents.chars() {
        match ch {
            '"' => {
                in_quotes = !in_quotes;
                current.push(ch);
            }
            '\n' if !in_quotes => {
                rows.push(std::mem::take(&mut current));
            }
            '\r' if !in_quotes => {}
            _ => current.push(ch),
        }
    }
    if !current.is_empty() {
        rows.push(current);
    }
    rows
}

/// Split one CSV row into fields, honoring quotes and doubled-quote escapes
fn split_fields(row: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut chars = row.chars().peekable();
    let mut in_quotes = false;

    while let Some(ch) = chars.next() {
        match ch {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    current.push('"');
                } else {
                    in_quotes = false;
                }
            }
            '"' => in_quotes = true,
            ',' if !in_quotes => {
                fields.push(std::mem::take(&mut current));
            }
            _ => current.push(ch),
        }
    }
    fields.push(current);
    fields
}
