//! Run-length compression of per-interval sample series.
//!
//! Consecutive samples sharing a category and a value collapse into one
//! run spanning an inclusive index range. A change in either the value
//! or the category closes the current run.

use crate::error::{ModelkitError, Result};

/// One sample: a category key, its position, and an optional value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub category: i64,
    pub index: i64,
    pub value: Option<f64>,
}

impl Sample {
    pub fn new(category: i64, index: i64, value: impl Into<Option<f64>>) -> Self {
        Self {
            category,
            index,
            value: value.into(),
        }
    }
}

/// A compressed run over `[start, end]`, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Run {
    pub category: i64,
    pub start: i64,
    pub end: i64,
    pub value: Option<f64>,
}

/// Collapse a sample series into runs, preserving input order.
///
/// Samples are taken as given; no sorting or gap detection happens here.
/// An empty series is an error rather than an empty result, so a caller
/// cannot mistake missing data for a valid compression.
pub fn compress(samples: &[Sample]) -> Result<Vec<Run>> {
    let first = samples.first().ok_or(ModelkitError::EmptyInput)?;
    let mut runs = Vec::new();
    let mut current = Run {
        category: first.category,
        start: first.index,
        end: first.index,
        value: first.value,
    };
    for sample in &samples[1..] {
        if sample.category == current.category && sample.value == current.value {
            current.end = sample.index;
        } else {
            runs.push(current);
            current = Run {
                category: sample.category,
                start: sample.index,
                end: sample.index,
                value: sample.value,
            };
        }
    }
    runs.push(current);
    Ok(runs)
}
