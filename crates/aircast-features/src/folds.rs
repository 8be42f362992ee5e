//! Time-ordered train / validation / test partitioning.
//!
//! Each entity's rows are split by calendar month, `(year, month)` pairs in
//! chronological order: the first months train, the next month validates and
//! the remaining months test. Entities with too few months yield empty
//! validation or test partitions.

use crate::error::Result;
use crate::table::{FeatureRow, FeatureTable};
use aircast_data::Frequency;
use chrono::Datelike;
use rayon::prelude::*;

/// Month counts of the train and validation partitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FoldMonths {
    /// Months assigned to training
    pub train: usize,
    /// Months assigned to validation
    pub validation: usize,
}

impl FoldMonths {
    /// Month counts for a frequency.
    pub const fn for_frequency(frequency: Frequency) -> Self {
        match frequency {
            Frequency::Hourly => Self {
                train: 8,
                validation: 1,
            },
            Frequency::Daily => Self {
                train: 10,
                validation: 1,
            },
        }
    }
}

/// Train, validation and test partitions.
#[derive(Debug, Clone, PartialEq)]
pub struct Folds {
    /// Earliest months
    pub train: FeatureTable,
    /// Months after training
    pub validation: FeatureTable,
    /// Latest months
    pub test: FeatureTable,
}

/// Per-entity month splitter.
#[derive(Debug, Clone, Copy)]
pub struct FoldSplitter {
    months: FoldMonths,
}

impl FoldSplitter {
    /// Create a splitter for a frequency.
    pub const fn new(frequency: Frequency) -> Self {
        Self {
            months: FoldMonths::for_frequency(frequency),
        }
    }

    /// Create a splitter from a textual frequency tag.
    ///
    /// # Errors
    /// Returns [`aircast_data::DataError::InvalidFrequency`] for an unknown tag.
    pub fn from_tag(tag: &str) -> Result<Self> {
        Ok(Self::new(tag.parse()?))
    }

    /// Create a splitter with explicit month counts.
    pub const fn with_months(months: FoldMonths) -> Self {
        Self { months }
    }

    /// Month counts in use.
    pub const fn months(&self) -> FoldMonths {
        self.months
    }

    /// Split a table entity by entity.
    pub fn split(&self, table: &FeatureTable) -> Folds {
        let groups: Vec<Vec<&FeatureRow>> = table.by_entity().into_values().collect();

        let parts: Vec<[Vec<FeatureRow>; 3]> = groups
            .into_par_iter()
            .map(|rows| self.split_entity(&rows))
            .collect();

        let mut train = Vec::new();
        let mut validation = Vec::new();
        let mut test = Vec::new();
        for [tr, va, te] in parts {
            train.extend(tr);
            validation.extend(va);
            test.extend(te);
        }

        let schema = table.schema();
        Folds {
            train: FeatureTable::new(schema.clone(), train),
            validation: FeatureTable::new(schema.clone(), validation),
            test: FeatureTable::new(schema.clone(), test),
        }
    }

    fn split_entity(&self, rows: &[&FeatureRow]) -> [Vec<FeatureRow>; 3] {
        let mut months: Vec<(i32, u32)> = rows
            .iter()
            .map(|r| (r.timestamp.year(), r.timestamp.month()))
            .collect();
        months.sort_unstable();
        months.dedup();

        let train_end = self.months.train.min(months.len());
        let validation_end = (self.months.train + self.months.validation).min(months.len());
        let fold_of = |month: (i32, u32)| -> usize {
            let position = months.partition_point(|m| *m < month);
            if position < train_end {
                0
            } else if position < validation_end {
                1
            } else {
                2
            }
        };

        let mut out: [Vec<FeatureRow>; 3] = Default::default();
        for row in rows {
            let month = (row.timestamp.year(), row.timestamp.month());
            out[fold_of(month)].push((*row).clone());
        }
        out
    }
}
