//! Descriptive statistics kernels: means, medians, grouped means and
//! below/above-median crosstabs.
//!
//! Grouping results are `BTreeMap`s so categories come out sorted, the same
//! order a dataframe `groupby` would produce.

use std::collections::BTreeMap;

/// Arithmetic mean, `None` when there are no values.
pub fn mean<I>(values: I) -> Option<f64>
where
    I: IntoIterator<Item = f64>,
{
    let (sum, count) = values
        .into_iter()
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}

/// Median; the mean of the two middle values for an even count.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        Some(sorted[mid])
    } else {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    }
}

/// Round to `places` decimals, ties to even (as pandas and Python `round` do).
pub fn round_to(x: f64, places: i32) -> f64 {
    let scale = 10f64.powi(places);
    (x * scale).round_ties_even() / scale
}

/// Percentage of `part` in `total`, `None` when `total` is zero.
pub fn share(part: usize, total: usize) -> Option<f64> {
    (total > 0).then(|| part as f64 / total as f64 * 100.0)
}

/// Mean of the values grouped by key.
pub fn group_mean<K, I>(pairs: I) -> BTreeMap<K, f64>
where
    K: Ord,
    I: IntoIterator<Item = (K, f64)>,
{
    let mut acc: BTreeMap<K, (f64, usize)> = BTreeMap::new();
    for (key, value) in pairs {
        let slot = acc.entry(key).or_insert((0.0, 0));
        slot.0 += value;
        slot.1 += 1;
    }
    acc.into_iter()
        .map(|(key, (sum, count))| (key, sum / count as f64))
        .collect()
}

// ---------------------------------------------------------------------------
// Median crosstab
// ---------------------------------------------------------------------------

/// Record counts on either side of the median for one category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MedianSplit {
    pub below: usize,
    pub above: usize,
}

impl MedianSplit {
    pub fn total(&self) -> usize {
        self.below + self.above
    }

    /// `(below %, above %)`, each rounded to one decimal; above is taken as
    /// the complement of the rounded below share so the pair sums to 100.
    pub fn percentages(&self) -> (f64, f64) {
        let below = round_to(share(self.below, self.total()).unwrap_or(0.0), 1);
        (below, round_to(100.0 - below, 1))
    }
}

/// Count `(category, above_median)` pairs into one split per category.
///
/// "Below" here means "not above", so records sitting exactly on the median
/// count as below.
pub fn crosstab<K, I>(pairs: I) -> BTreeMap<K, MedianSplit>
where
    K: Ord,
    I: IntoIterator<Item = (K, bool)>,
{
    let mut table: BTreeMap<K, MedianSplit> = BTreeMap::new();
    for (key, above) in pairs {
        let split = table.entry(key).or_default();
        if above {
            split.above += 1;
        } else {
            split.below += 1;
        }
    }
    table
}
