use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{ArrayRef, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::stats;

// ---------------------------------------------------------------------------
// Categorical columns
// ---------------------------------------------------------------------------

/// Raised when a text cell does not name a known category.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {column} value '{value}'")]
pub struct ParseFieldError {
    pub column: &'static str,
    pub value: String,
}

/// Declares a lowercase-serialized category enum with `FromStr`, a raw
/// spelling (`as_str`) and a human label (`label`, used by `Display`).
macro_rules! category {
    (
        $(#[$meta:meta])*
        $name:ident, $column:literal {
            $($variant:ident => $raw:literal, $label:literal;)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "lowercase")]
        pub enum $name {
            $($variant,)+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant,)+];

            /// Spelling used in the source data.
            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $raw,)+
                }
            }

            /// Spelling used in reports.
            pub fn label(self) -> &'static str {
                match self {
                    $($name::$variant => $label,)+
                }
            }
        }

        impl FromStr for $name {
            type Err = ParseFieldError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim() {
                    $($raw => Ok($name::$variant),)+
                    other => Err(ParseFieldError {
                        column: $column,
                        value: other.to_string(),
                    }),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.label())
            }
        }
    };
}

category! {
    Sex, "sex" {
        Female => "female", "Female";
        Male => "male", "Male";
    }
}

category! {
    Smoker, "smoker" {
        No => "no", "Non-Smoker";
        Yes => "yes", "Smoker";
    }
}

category! {
    Region, "region" {
        Northeast => "northeast", "Northeast";
        Northwest => "northwest", "Northwest";
        Southeast => "southeast", "Southeast";
        Southwest => "southwest", "Southwest";
    }
}

// ---------------------------------------------------------------------------
// Record – one row of the dataset
// ---------------------------------------------------------------------------

/// One insured individual.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub age: u32,
    pub sex: Sex,
    pub bmi: f64,
    pub children: u32,
    pub smoker: Smoker,
    pub region: Region,
    /// Yearly charges billed by the insurer, not rounded to the cent.
    pub charges: f64,
}

impl Record {
    pub fn age_group(&self) -> AgeGroup {
        AgeGroup::of(self.age)
    }

    pub fn bmi_group(&self) -> BmiGroup {
        BmiGroup::of(self.bmi)
    }
}

// ---------------------------------------------------------------------------
// Derived categories
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AgeGroup {
    Age18To24,
    Age25To34,
    Age35To44,
    Age45To54,
    Age55Plus,
}

impl AgeGroup {
    pub fn of(age: u32) -> Self {
        match age {
            0..=24 => AgeGroup::Age18To24,
            25..=34 => AgeGroup::Age25To34,
            35..=44 => AgeGroup::Age35To44,
            45..=54 => AgeGroup::Age45To54,
            _ => AgeGroup::Age55Plus,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            AgeGroup::Age18To24 => "18 - 24",
            AgeGroup::Age25To34 => "25 - 34",
            AgeGroup::Age35To44 => "35 - 44",
            AgeGroup::Age45To54 => "45 - 54",
            AgeGroup::Age55Plus => "55+",
        }
    }
}

impl fmt::Display for AgeGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Weight status by the usual BMI cut-offs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BmiGroup {
    Underweight,
    Healthy,
    Overweight,
    Obese,
}

impl BmiGroup {
    pub fn of(bmi: f64) -> Self {
        if bmi < 18.5 {
            BmiGroup::Underweight
        } else if bmi < 25.0 {
            BmiGroup::Healthy
        } else if bmi < 30.0 {
            BmiGroup::Overweight
        } else {
            BmiGroup::Obese
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            BmiGroup::Underweight => "Underweight",
            BmiGroup::Healthy => "Healthy",
            BmiGroup::Overweight => "Overweight",
            BmiGroup::Obese => "Obese",
        }
    }
}

impl fmt::Display for BmiGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// InsuranceDataset – the complete loaded dataset
// ---------------------------------------------------------------------------

/// Columns added by [`InsuranceDataset::annotate`], index-aligned with the records.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedColumns {
    /// Median of `charges` over the whole dataset.
    pub median_charges: f64,
    pub age_group: Vec<AgeGroup>,
    pub bmi_group: Vec<BmiGroup>,
    /// `charges > median_charges`, strictly.
    pub above_median: Vec<bool>,
}

impl DerivedColumns {
    pub fn above_median_count(&self) -> usize {
        self.above_median.iter().filter(|&&above| above).count()
    }
}

/// The full parsed dataset, in file order.
#[derive(Debug, Clone, Default)]
pub struct InsuranceDataset {
    pub records: Vec<Record>,
    derived: Option<DerivedColumns>,
}

impl InsuranceDataset {
    pub fn from_records(records: Vec<Record>) -> Self {
        InsuranceDataset {
            records,
            derived: None,
        }
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the dataset is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn charges(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.charges).collect()
    }

    /// Derived columns, if [`annotate`](Self::annotate) has run.
    pub fn derived(&self) -> Option<&DerivedColumns> {
        self.derived.as_ref()
    }

    /// Add the `age_group`, `bmi_group` and `above_median` columns.
    ///
    /// Returns `None` for an empty dataset, whose median is undefined.
    /// Re-running recomputes the same columns.
    pub fn annotate(&mut self) -> Option<&DerivedColumns> {
        let median_charges = stats::median(&self.charges())?;

        let derived = DerivedColumns {
            median_charges,
            age_group: self.records.iter().map(Record::age_group).collect(),
            bmi_group: self.records.iter().map(Record::bmi_group).collect(),
            above_median: self
                .records
                .iter()
                .map(|r| r.charges > median_charges)
                .collect(),
        };
        log::debug!(
            "median charges {median_charges:.2}, {} of {} records above",
            derived.above_median_count(),
            self.len()
        );

        self.derived = Some(derived);
        self.derived.as_ref()
    }

    /// Arrow schema of the base (non-derived) columns.
    pub fn arrow_schema() -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("age", DataType::Int64, false),
            Field::new("sex", DataType::Utf8, false),
            Field::new("bmi", DataType::Float64, false),
            Field::new("children", DataType::Int64, false),
            Field::new("smoker", DataType::Utf8, false),
            Field::new("region", DataType::Utf8, false),
            Field::new("charges", DataType::Float64, false),
        ]))
    }

    /// Convert the first `limit` records (all when `None`) into a single batch.
    pub fn to_record_batch(&self, limit: Option<usize>) -> Result<RecordBatch> {
        let n = limit.map_or(self.len(), |l| l.min(self.len()));
        let rows = &self.records[..n];

        let columns: Vec<ArrayRef> = vec![
            Arc::new(Int64Array::from_iter_values(rows.iter().map(|r| i64::from(r.age)))),
            Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.sex.as_str()))),
            Arc::new(Float64Array::from_iter_values(rows.iter().map(|r| r.bmi))),
            Arc::new(Int64Array::from_iter_values(rows.iter().map(|r| i64::from(r.children)))),
            Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.smoker.as_str()))),
            Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.region.as_str()))),
            Arc::new(Float64Array::from_iter_values(rows.iter().map(|r| r.charges))),
        ];

        RecordBatch::try_new(Self::arrow_schema(), columns).context("building record batch")
    }
}
