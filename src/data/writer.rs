use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result, bail};
use parquet::arrow::ArrowWriter;

use super::model::InsuranceDataset;

/// Write a dataset to a file.  Dispatch by extension, same formats as
/// [`super::loader::load_file`].
pub fn write_file(path: &Path, dataset: &InsuranceDataset) -> Result<()> {
    match super::extension(path).as_str() {
        "csv" => write_csv(path, dataset),
        "json" => write_json(path, dataset),
        "parquet" | "pq" => write_parquet(path, dataset),
        other => bail!("Unsupported file extension: .{other}"),
    }
    .with_context(|| format!("writing {}", path.display()))?;

    log::info!("wrote {} records to {}", dataset.len(), path.display());
    Ok(())
}

fn write_csv(path: &Path, dataset: &InsuranceDataset) -> Result<()> {
    let mut writer = csv::Writer::from_path(path).context("creating CSV")?;
    for record in &dataset.records {
        writer.serialize(record).context("writing CSV row")?;
    }
    writer.flush().context("flushing CSV")?;
    Ok(())
}

fn write_json(path: &Path, dataset: &InsuranceDataset) -> Result<()> {
    let file = File::create(path).context("creating JSON file")?;
    let mut out = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut out, &dataset.records).context("serializing JSON")?;
    out.flush().context("flushing JSON")?;
    Ok(())
}

fn write_parquet(path: &Path, dataset: &InsuranceDataset) -> Result<()> {
    let batch = dataset.to_record_batch(None)?;
    let file = File::create(path).context("creating parquet file")?;
    let mut writer =
        ArrowWriter::try_new(file, batch.schema(), None).context("creating parquet writer")?;
    writer.write(&batch).context("writing parquet batch")?;
    writer.close().context("closing parquet writer")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::loader::load_file;
    use crate::data::model::{Record, Region, Sex, Smoker};

    fn sample() -> InsuranceDataset {
        InsuranceDataset::from_records(vec![
            Record {
                age: 19,
                sex: Sex::Female,
                bmi: 27.9,
                children: 0,
                smoker: Smoker::Yes,
                region: Region::Southwest,
                charges: 16884.924,
            },
            Record {
                age: 33,
                sex: Sex::Male,
                bmi: 22.705,
                children: 0,
                smoker: Smoker::No,
                region: Region::Northwest,
                charges: 21984.47061,
            },
        ])
    }

    #[test]
    fn csv_uses_source_spelling() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("insurance.csv");
        write_file(&path, &sample()).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("age,sex,bmi,children,smoker,region,charges"));
        assert_eq!(lines.next(), Some("19,female,27.9,0,yes,southwest,16884.924"));
    }

    #[test]
    fn every_format_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let original = sample();
        for name in ["data.csv", "data.json", "data.parquet"] {
            let path = dir.path().join(name);
            write_file(&path, &original).unwrap();
            let loaded = load_file(&path).unwrap();
            assert_eq!(loaded.records, original.records, "{name}");
        }
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = write_file(&dir.path().join("data.txt"), &sample()).unwrap_err();
        assert!(format!("{err:#}").contains("Unsupported file extension: .txt"));
    }
}
