use std::sync::Arc;

use anyhow::{Context, Result, ensure};
use arrow::array::{ArrayRef, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use arrow::util::pretty::pretty_format_batches;

// ---------------------------------------------------------------------------
// TextTable – a small table of preformatted cells
// ---------------------------------------------------------------------------

/// Report table whose cells are already formatted as text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl TextTable {
    pub fn new<I, S>(headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        TextTable {
            headers: headers.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push_row<I, S>(&mut self, cells: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rows.push(cells.into_iter().map(Into::into).collect());
    }

    /// Transpose the rows into one Utf8 column per header.
    pub fn to_record_batch(&self) -> Result<RecordBatch> {
        for (i, row) in self.rows.iter().enumerate() {
            ensure!(
                row.len() == self.headers.len(),
                "table row {i} has {} cells, expected {}",
                row.len(),
                self.headers.len()
            );
        }

        let schema = Arc::new(Schema::new(
            self.headers
                .iter()
                .map(|h| Field::new(h.as_str(), DataType::Utf8, false))
                .collect::<Vec<_>>(),
        ));
        let columns: Vec<ArrayRef> = (0..self.headers.len())
            .map(|col| {
                Arc::new(StringArray::from_iter_values(
                    self.rows.iter().map(|row| row[col].as_str()),
                )) as ArrayRef
            })
            .collect();

        RecordBatch::try_new(schema, columns).context("building table batch")
    }

    /// Render as a boxed text table.
    pub fn render(&self) -> Result<String> {
        render_batch(&self.to_record_batch()?)
    }
}

/// Pretty-print an arbitrary batch.
pub fn render_batch(batch: &RecordBatch) -> Result<String> {
    let formatted =
        pretty_format_batches(std::slice::from_ref(batch)).context("formatting table")?;
    Ok(formatted.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_headers_and_cells() {
        let mut table = TextTable::new(["Region", "Average Charges"]);
        table.push_row(["Northeast", "$13406.38"]);
        table.push_row(["Southwest", "$12346.94"]);

        let text = table.render().unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert!(lines[1].contains("Region"));
        assert!(lines[1].contains("Average Charges"));
        assert!(text.contains("| Northeast "));
        assert!(text.contains("$12346.94"));
        // border, header, border, two rows, border
        assert_eq!(lines.len(), 6);
    }

    #[test]
    fn ragged_rows_are_rejected() {
        let mut table = TextTable::new(["a", "b"]);
        table.push_row(["only one"]);
        let err = table.render().unwrap_err();
        assert!(err.to_string().contains("row 0 has 1 cells"));
    }
}
