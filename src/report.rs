use std::collections::BTreeMap;
use std::io::Write;

use anyhow::Result;
use thiserror::Error;

use crate::data::model::{AgeGroup, BmiGroup, InsuranceDataset, Record, Region, Sex, Smoker};
use crate::stats::{self, MedianSplit};
use crate::table::{TextTable, render_batch};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReportError {
    #[error("{0} needs at least one record")]
    EmptyDataset(&'static str),
}

/// Reports selectable from the command line, in the order `run_all` prints them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ReportKind {
    Preview,
    AverageAge,
    MaleFemale,
    ChildrenBmi,
    CostByRegion,
    CostFactors,
}

impl ReportKind {
    pub const ALL: [ReportKind; 6] = [
        ReportKind::Preview,
        ReportKind::AverageAge,
        ReportKind::MaleFemale,
        ReportKind::ChildrenBmi,
        ReportKind::CostByRegion,
        ReportKind::CostFactors,
    ];
}

// ---------------------------------------------------------------------------
// Report data
// ---------------------------------------------------------------------------

/// Per-sex means; `None` when no record of that sex exists.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SexAverages {
    pub count: usize,
    pub age: Option<f64>,
    pub bmi: Option<f64>,
    pub children: Option<f64>,
    pub charges: Option<f64>,
}

impl SexAverages {
    fn of<'a>(records: impl Iterator<Item = &'a Record> + Clone) -> Self {
        SexAverages {
            count: records.clone().count(),
            age: stats::mean(records.clone().map(|r| f64::from(r.age))),
            bmi: stats::mean(records.clone().map(|r| r.bmi)),
            children: stats::mean(records.clone().map(|r| f64::from(r.children))),
            charges: stats::mean(records.map(|r| r.charges)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SexSummary {
    pub male_pct: f64,
    pub female_pct: f64,
    pub male: SexAverages,
    pub female: SexAverages,
}

/// Below/above-median splits of every cost factor.
#[derive(Debug, Clone, PartialEq)]
pub struct FactorCrosstabs {
    pub median_charges: f64,
    pub age: BTreeMap<AgeGroup, MedianSplit>,
    pub sex: BTreeMap<Sex, MedianSplit>,
    pub bmi: BTreeMap<BmiGroup, MedianSplit>,
    pub children: BTreeMap<u32, MedianSplit>,
    pub smoker: BTreeMap<Smoker, MedianSplit>,
}

// ---------------------------------------------------------------------------
// InsuranceReport
// ---------------------------------------------------------------------------

/// Report generator over one loaded dataset.
///
/// Every report writes formatted text to the given sink and leaves the base
/// records untouched; `cost_factors` additionally annotates the dataset with
/// its derived columns.
pub struct InsuranceReport {
    dataset: InsuranceDataset,
}

impl InsuranceReport {
    pub fn new(dataset: InsuranceDataset) -> Self {
        InsuranceReport { dataset }
    }

    pub fn dataset(&self) -> &InsuranceDataset {
        &self.dataset
    }

    pub fn mean_age(&self) -> Result<f64, ReportError> {
        stats::mean(self.dataset.records.iter().map(|r| f64::from(r.age)))
            .ok_or(ReportError::EmptyDataset("average age"))
    }

    pub fn sex_summary(&self) -> Result<SexSummary, ReportError> {
        let records = &self.dataset.records;
        let male = SexAverages::of(records.iter().filter(|r| r.sex == Sex::Male));
        let female = SexAverages::of(records.iter().filter(|r| r.sex == Sex::Female));

        let male_pct = stats::share(male.count, male.count + female.count)
            .ok_or(ReportError::EmptyDataset("male/female split"))?;

        Ok(SexSummary {
            male_pct,
            female_pct: 100.0 - male_pct,
            male,
            female,
        })
    }

    pub fn bmi_by_children(&self) -> BTreeMap<u32, f64> {
        stats::group_mean(self.dataset.records.iter().map(|r| (r.children, r.bmi)))
    }

    pub fn charges_by_region(&self) -> BTreeMap<Region, f64> {
        stats::group_mean(self.dataset.records.iter().map(|r| (r.region, r.charges)))
    }

    /// Annotate the dataset and cross each factor against `above_median`.
    pub fn factor_crosstabs(&mut self) -> Result<FactorCrosstabs, ReportError> {
        const NAME: &str = "cost factors";
        self.dataset.annotate().ok_or(ReportError::EmptyDataset(NAME))?;

        let records = &self.dataset.records;
        let derived = self
            .dataset
            .derived()
            .ok_or(ReportError::EmptyDataset(NAME))?;
        let above = || derived.above_median.iter().copied();

        Ok(FactorCrosstabs {
            median_charges: derived.median_charges,
            age: stats::crosstab(derived.age_group.iter().copied().zip(above())),
            sex: stats::crosstab(records.iter().map(|r| r.sex).zip(above())),
            bmi: stats::crosstab(derived.bmi_group.iter().copied().zip(above())),
            children: stats::crosstab(records.iter().map(|r| r.children).zip(above())),
            smoker: stats::crosstab(records.iter().map(|r| r.smoker).zip(above())),
        })
    }

    // -----------------------------------------------------------------------
    // Printed reports
    // -----------------------------------------------------------------------

    /// First `rows` records as loaded.
    pub fn preview(&self, out: &mut dyn Write, rows: usize) -> Result<()> {
        let batch = self.dataset.to_record_batch(Some(rows))?;
        writeln!(out, "{}\n", render_batch(&batch)?)?;
        Ok(())
    }

    pub fn average_age(&self, out: &mut dyn Write) -> Result<()> {
        let avg = self.mean_age()?;
        writeln!(out, "The average age of all patients in the dataset is {avg:.2}.\n")?;
        Ok(())
    }

    pub fn male_female(&self, out: &mut dyn Write) -> Result<()> {
        let summary = self.sex_summary()?;
        writeln!(
            out,
            "The dataset is divided into {:.1}% male patients and {:.1}% female patients.\n",
            summary.male_pct, summary.female_pct
        )?;

        writeln!(out, "Average age, BMI, number of children, and insurance charges by sex:\n")?;
        for (sex, avgs) in [(Sex::Male, &summary.male), (Sex::Female, &summary.female)] {
            writeln!(
                out,
                "{sex}:\nAge: {}\nBMI: {}\nNumber of Children: {}\nInsurance Charges: {}\n",
                fixed2(avgs.age),
                fixed2(avgs.bmi),
                fixed2(avgs.children),
                avgs.charges.map_or_else(|| "n/a".to_string(), currency),
            )?;
        }
        Ok(())
    }

    pub fn children_to_bmi(&self, out: &mut dyn Write) -> Result<()> {
        let mut table = TextTable::new(["No. of Children", "Average BMI"]);
        for (children, bmi) in self.bmi_by_children() {
            table.push_row([children.to_string(), format!("{:.2}", stats::round_to(bmi, 2))]);
        }
        writeln!(out, "{}\n", table.render()?)?;
        Ok(())
    }

    pub fn cost_by_region(&self, out: &mut dyn Write) -> Result<()> {
        let mut table = TextTable::new(["Region", "Average Charges"]);
        for (region, charges) in self.charges_by_region() {
            table.push_row([region.label().to_string(), currency(charges)]);
        }
        writeln!(out, "{}\n", table.render()?)?;
        Ok(())
    }

    /// Median charge, then one below/above-median table per factor.
    ///
    /// Rows follow each factor's natural order, so weight status reads
    /// Underweight, Healthy, Overweight, Obese rather than alphabetically.
    pub fn cost_factors(&mut self, out: &mut dyn Write) -> Result<()> {
        let tabs = self.factor_crosstabs()?;
        writeln!(
            out,
            "The median of charges over the whole dataset is {}.\n",
            currency(tabs.median_charges)
        )?;

        write_crosstab(out, "Age Group", &tabs.age)?;
        write_crosstab(out, "Sex", &tabs.sex)?;
        write_crosstab(out, "Weight Status", &tabs.bmi)?;
        write_crosstab(out, "Number of Children", &tabs.children)?;
        write_crosstab(out, "Smoking Status", &tabs.smoker)?;
        Ok(())
    }

    pub fn run(
        &mut self,
        kind: ReportKind,
        out: &mut dyn Write,
        preview_rows: usize,
    ) -> Result<()> {
        log::trace!("running {kind:?} report");
        match kind {
            ReportKind::Preview => self.preview(out, preview_rows),
            ReportKind::AverageAge => self.average_age(out),
            ReportKind::MaleFemale => self.male_female(out),
            ReportKind::ChildrenBmi => self.children_to_bmi(out),
            ReportKind::CostByRegion => self.cost_by_region(out),
            ReportKind::CostFactors => self.cost_factors(out),
        }
    }

    pub fn run_all(&mut self, out: &mut dyn Write, preview_rows: usize) -> Result<()> {
        for kind in ReportKind::ALL {
            self.run(kind, out, preview_rows)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Formatting helpers
// ---------------------------------------------------------------------------

fn currency(value: f64) -> String {
    format!("${value:.2}")
}

fn fixed2(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{v:.2}"))
}

fn percent(value: f64) -> String {
    format!("{value:.1}%")
}

fn write_crosstab<K: std::fmt::Display>(
    out: &mut dyn Write,
    factor: &str,
    splits: &BTreeMap<K, MedianSplit>,
) -> Result<()> {
    let mut table = TextTable::new([factor, "Below Median", "Above Median"]);
    for (category, split) in splits {
        let (below, above) = split.percentages();
        table.push_row([category.to_string(), percent(below), percent(above)]);
    }
    writeln!(out, "{}\n", table.render()?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(
        age: u32,
        sex: Sex,
        bmi: f64,
        children: u32,
        smoker: Smoker,
        region: Region,
        charges: f64,
    ) -> Record {
        Record {
            age,
            sex,
            bmi,
            children,
            smoker,
            region,
            charges,
        }
    }

    /// The first ten rows of the public insurance dataset, charges to the cent.
    fn fixture() -> InsuranceDataset {
        use Region::*;
        use Sex::*;
        InsuranceDataset::from_records(vec![
            rec(19, Female, 27.9, 0, Smoker::Yes, Southwest, 16884.92),
            rec(18, Male, 33.77, 1, Smoker::No, Southeast, 1725.55),
            rec(28, Male, 33.0, 3, Smoker::No, Southeast, 4449.46),
            rec(33, Male, 22.705, 0, Smoker::No, Northwest, 21984.47),
            rec(32, Male, 28.88, 0, Smoker::No, Northwest, 3866.86),
            rec(31, Female, 25.74, 0, Smoker::No, Southeast, 3756.62),
            rec(46, Female, 33.44, 1, Smoker::No, Southeast, 8240.59),
            rec(37, Female, 27.74, 3, Smoker::No, Northwest, 7281.51),
            rec(37, Male, 29.83, 2, Smoker::No, Northeast, 6406.41),
            rec(60, Female, 25.84, 0, Smoker::No, Northwest, 28923.14),
        ])
    }

    fn render(report: &mut InsuranceReport, kind: ReportKind) -> String {
        let mut out = Vec::new();
        report.run(kind, &mut out, 10).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn average_age_sentence() {
        let mut report = InsuranceReport::new(fixture());
        assert!((report.mean_age().unwrap() - 34.1).abs() < 1e-9);
        assert_eq!(
            render(&mut report, ReportKind::AverageAge),
            "The average age of all patients in the dataset is 34.10.\n\n"
        );
    }

    #[test]
    fn sex_percentages_sum_to_hundred() {
        let mut ds = fixture();
        ds.records.push(rec(40, Sex::Male, 30.0, 1, Smoker::No, Region::Northeast, 5000.0));
        let report = InsuranceReport::new(ds);

        let summary = report.sex_summary().unwrap();
        assert_eq!(summary.male.count, 6);
        assert_eq!(summary.female.count, 5);
        assert!((summary.male_pct + summary.female_pct - 100.0).abs() < 1e-9);
        assert!((summary.male_pct - 54.545_454).abs() < 1e-4);
    }

    #[test]
    fn male_female_text() {
        let mut report = InsuranceReport::new(fixture());
        let text = render(&mut report, ReportKind::MaleFemale);

        assert!(text.starts_with(
            "The dataset is divided into 50.0% male patients and 50.0% female patients.\n\n"
        ));
        // Male ages 18, 28, 33, 32, 37.
        assert!(text.contains("Male:\nAge: 29.60\n"));
        assert!(text.contains("Female:\nAge: 38.60\n"));
        assert!(text.contains("Insurance Charges: $"));
    }

    #[test]
    fn missing_sex_prints_na() {
        let ds = InsuranceDataset::from_records(vec![rec(
            30,
            Sex::Male,
            24.0,
            0,
            Smoker::No,
            Region::Northeast,
            1000.0,
        )]);
        let mut report = InsuranceReport::new(ds);
        let text = render(&mut report, ReportKind::MaleFemale);
        assert!(text.contains("100.0% male patients and 0.0% female patients"));
        assert!(text.contains(
            "Female:\nAge: n/a\nBMI: n/a\nNumber of Children: n/a\nInsurance Charges: n/a\n"
        ));
    }

    #[test]
    fn bmi_grouped_by_children() {
        let report = InsuranceReport::new(fixture());
        let by_children = report.bmi_by_children();

        assert_eq!(by_children.keys().copied().collect::<Vec<_>>(), vec![0, 1, 2, 3]);
        assert!((by_children[&0] - 26.213).abs() < 1e-9);
        assert!((by_children[&3] - 30.37).abs() < 1e-9);
    }

    #[test]
    fn region_grouping_has_four_labels() {
        let mut report = InsuranceReport::new(fixture());
        let by_region = report.charges_by_region();
        assert_eq!(by_region.keys().copied().collect::<Vec<_>>(), Region::ALL.to_vec());

        let text = render(&mut report, ReportKind::CostByRegion);
        for label in ["Northeast", "Northwest", "Southeast", "Southwest"] {
            assert!(text.contains(label), "{label} missing from\n{text}");
        }
        assert!(text.contains("$6406.41"));
        assert!(text.contains("$16884.92"));
    }

    #[test]
    fn above_median_count_matches_strict_comparison() {
        let mut report = InsuranceReport::new(fixture());
        let tabs = report.factor_crosstabs().unwrap();
        assert!((tabs.median_charges - 6843.96).abs() < 1e-9);

        let derived = report.dataset().derived().unwrap();
        let strictly_greater = report
            .dataset()
            .records
            .iter()
            .filter(|r| r.charges > tabs.median_charges)
            .count();
        assert_eq!(derived.above_median_count(), strictly_greater);
        assert_eq!(strictly_greater, 5);
    }

    #[test]
    fn crosstab_pairs_sum_to_hundred() {
        let mut report = InsuranceReport::new(fixture());
        let tabs = report.factor_crosstabs().unwrap();

        let splits = tabs
            .age
            .values()
            .chain(tabs.sex.values())
            .chain(tabs.bmi.values())
            .chain(tabs.children.values())
            .chain(tabs.smoker.values());
        for split in splits {
            let (below, above) = split.percentages();
            assert!((below + above - 100.0).abs() < 1e-9, "{split:?}");
        }

        assert_eq!(tabs.age[&AgeGroup::Age25To34].percentages(), (75.0, 25.0));
        assert_eq!(tabs.age[&AgeGroup::Age55Plus].percentages(), (0.0, 100.0));
        assert_eq!(tabs.smoker[&Smoker::Yes].percentages(), (0.0, 100.0));
        assert_eq!(tabs.smoker[&Smoker::No].percentages(), (55.6, 44.4));
    }

    #[test]
    fn cost_factors_text() {
        let mut report = InsuranceReport::new(fixture());
        let text = render(&mut report, ReportKind::CostFactors);

        assert!(text.starts_with("The median of charges over the whole dataset is $6843.96.\n\n"));
        let headers = [
            "Age Group",
            "Sex",
            "Weight Status",
            "Number of Children",
            "Smoking Status",
        ];
        for header in headers {
            assert!(text.contains(header), "{header} missing");
        }
        assert!(text.contains("| Non-Smoker "));
        assert!(text.contains("55.6%"));
        assert!(text.contains("44.4%"));
    }

    #[test]
    fn weight_status_rows_in_natural_order() {
        let mut report = InsuranceReport::new(fixture());
        let text = render(&mut report, ReportKind::CostFactors);

        let healthy = text.find("| Healthy ").unwrap();
        let overweight = text.find("| Overweight ").unwrap();
        let obese = text.find("| Obese ").unwrap();
        assert!(healthy < overweight && overweight < obese, "{text}");
    }

    #[test]
    fn reports_are_idempotent() {
        let mut report = InsuranceReport::new(fixture());
        let mut first = Vec::new();
        report.run_all(&mut first, 5).unwrap();
        let mut second = Vec::new();
        report.run_all(&mut second, 5).unwrap();

        assert!(!first.is_empty());
        assert_eq!(first, second);
    }

    #[test]
    fn preview_limits_rows() {
        let mut report = InsuranceReport::new(fixture());
        let mut out = Vec::new();
        report.run(ReportKind::Preview, &mut out, 3).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.contains("| age "));
        assert!(text.contains("southwest"));
        // 3 rows + header + 3 borders
        assert_eq!(text.trim_end().lines().count(), 7);
    }

    #[test]
    fn empty_dataset_is_reported() {
        let mut report = InsuranceReport::new(InsuranceDataset::default());
        assert_eq!(report.mean_age(), Err(ReportError::EmptyDataset("average age")));
        assert_eq!(
            report.factor_crosstabs(),
            Err(ReportError::EmptyDataset("cost factors"))
        );

        let mut out = Vec::new();
        let err = report.run(ReportKind::MaleFemale, &mut out, 10).unwrap_err();
        assert_eq!(err.to_string(), "male/female split needs at least one record");
    }
}
