use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result, anyhow, bail};
use arrow::array::{Array, ArrayRef, AsArray, Float64Array, Int64Array};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Float64Type, Int64Type};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

use super::model::{InsuranceDataset, Record};

/// Columns every input file must carry.
pub const COLUMNS: [&str; 7] = ["age", "sex", "bmi", "children", "smoker", "region", "charges"];

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load an insurance dataset from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.csv`     – header row `age,sex,bmi,children,smoker,region,charges`
/// * `.json`    – `[{ "age": 19, "sex": "female", ... }, ...]`
/// * `.parquet` – one column per field (integer, float or string typed)
pub fn load_file(path: &Path) -> Result<InsuranceDataset> {
    let ext = super::extension(path);
    log::debug!("loading {} as .{ext}", path.display());

    let records = match ext.as_str() {
        "csv" => load_csv(path),
        "json" => load_json(path),
        "parquet" | "pq" => load_parquet(path),
        other => bail!("Unsupported file extension: .{other}"),
    }
    .with_context(|| format!("loading {}", path.display()))?;

    log::info!("loaded {} records from {}", records.len(), path.display());
    Ok(InsuranceDataset::from_records(records))
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

fn load_csv(path: &Path) -> Result<Vec<Record>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .context("opening CSV")?;

    let headers = reader.headers().context("reading CSV headers")?;
    if let Some(missing) = COLUMNS.iter().find(|c| !headers.iter().any(|h| h == **c)) {
        bail!("CSV missing '{missing}' column");
    }

    reader
        .deserialize::<Record>()
        .enumerate()
        .map(|(row_no, result)| result.with_context(|| format!("CSV row {row_no}")))
        .collect()
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Records-oriented layout, the default `df.to_json(orient='records')`.
fn load_json(path: &Path) -> Result<Vec<Record>> {
    let file = File::open(path).context("opening JSON file")?;
    serde_json::from_reader(BufReader::new(file)).context("parsing JSON")
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Works with files written by Pandas (`df.to_parquet()`), Polars and
/// [`super::writer`]. Integer columns may be 32 or 64 bit, float columns
/// 32 or 64 bit, string columns Utf8 or LargeUtf8.
fn load_parquet(path: &Path) -> Result<Vec<Record>> {
    let file = File::open(path).context("opening parquet file")?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)
        .context("reading parquet metadata")?
        .build()
        .context("building parquet reader")?;

    let mut records = Vec::new();
    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        let offset = records.len();
        records.extend(records_from_batch(&batch, offset)?);
    }
    Ok(records)
}

/// Typed views over the columns of one batch.
struct Columns {
    age: Int64Array,
    sex: ArrayRef,
    bmi: Float64Array,
    children: Int64Array,
    smoker: ArrayRef,
    region: ArrayRef,
    charges: Float64Array,
}

impl Columns {
    fn from_batch(batch: &RecordBatch) -> Result<Self> {
        Ok(Columns {
            age: int_column(batch, "age")?,
            sex: string_column(batch, "sex")?,
            bmi: float_column(batch, "bmi")?,
            children: int_column(batch, "children")?,
            smoker: string_column(batch, "smoker")?,
            region: string_column(batch, "region")?,
            charges: float_column(batch, "charges")?,
        })
    }

    fn record(&self, row: usize) -> Result<Record> {
        Ok(Record {
            age: int_cell(&self.age, row, "age")?,
            sex: parse_cell(&self.sex, row, "sex")?,
            bmi: float_cell(&self.bmi, row, "bmi")?,
            children: int_cell(&self.children, row, "children")?,
            smoker: parse_cell(&self.smoker, row, "smoker")?,
            region: parse_cell(&self.region, row, "region")?,
            charges: float_cell(&self.charges, row, "charges")?,
        })
    }
}

/// `offset` is the index of the batch's first row within the file, for messages.
fn records_from_batch(batch: &RecordBatch, offset: usize) -> Result<Vec<Record>> {
    let columns = Columns::from_batch(batch)?;
    (0..batch.num_rows())
        .map(|row| {
            columns
                .record(row)
                .with_context(|| format!("Parquet row {}", offset + row))
        })
        .collect()
}

// -- Parquet / Arrow helpers --

fn column(batch: &RecordBatch, name: &str) -> Result<ArrayRef> {
    let idx = batch
        .schema()
        .index_of(name)
        .map_err(|_| anyhow!("Parquet file missing '{name}' column"))?;
    Ok(batch.column(idx).clone())
}

fn int_column(batch: &RecordBatch, name: &str) -> Result<Int64Array> {
    let col = cast(&column(batch, name)?, &DataType::Int64)
        .with_context(|| format!("column '{name}' is not an integer column"))?;
    Ok(col.as_primitive::<Int64Type>().clone())
}

fn float_column(batch: &RecordBatch, name: &str) -> Result<Float64Array> {
    let col = cast(&column(batch, name)?, &DataType::Float64)
        .with_context(|| format!("column '{name}' is not a numeric column"))?;
    Ok(col.as_primitive::<Float64Type>().clone())
}

fn string_column(batch: &RecordBatch, name: &str) -> Result<ArrayRef> {
    let col = column(batch, name)?;
    match col.data_type() {
        DataType::Utf8 => Ok(col),
        DataType::LargeUtf8 | DataType::Utf8View | DataType::Dictionary(_, _) => {
            cast(&col, &DataType::Utf8).with_context(|| format!("reading '{name}' as text"))
        }
        other => bail!("column '{name}' has type {other:?}, expected a string column"),
    }
}

fn ensure_present(col: &dyn Array, row: usize, name: &str) -> Result<()> {
    if col.is_null(row) {
        bail!("null value in '{name}'");
    }
    Ok(())
}

fn int_cell(col: &Int64Array, row: usize, name: &str) -> Result<u32> {
    ensure_present(col, row, name)?;
    let value = col.value(row);
    u32::try_from(value).with_context(|| format!("'{name}' value {value} out of range"))
}

fn float_cell(col: &Float64Array, row: usize, name: &str) -> Result<f64> {
    ensure_present(col, row, name)?;
    Ok(col.value(row))
}

fn parse_cell<T>(col: &ArrayRef, row: usize, name: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    ensure_present(col.as_ref(), row, name)?;
    Ok(col.as_string::<i32>().value(row).parse()?)
}
