//! Data layer: record types, loading and writing.
//!
//! Architecture:
//! ```text
//!  .csv / .json / .parquet
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  loader   │  parse file → InsuranceDataset
//!   └──────────┘
//!        │
//!        ▼
//!   ┌──────────────────┐
//!   │ InsuranceDataset │  Vec<Record>, derived columns after annotate()
//!   └──────────────────┘
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  writer   │  InsuranceDataset → file (sample generation)
//!   └──────────┘
//! ```

use std::path::Path;

pub mod loader;
pub mod model;
pub mod writer;

/// Lower-cased file extension, empty when there is none.
fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase()
}
