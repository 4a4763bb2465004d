//! Descriptive statistics over U.S. medical insurance cost records.
//!
//! Load a dataset with [`data::loader::load_file`], wrap it in a
//! [`report::InsuranceReport`] and write any of the reports to a sink.

pub mod data;
pub mod report;
pub mod stats;
pub mod table;
