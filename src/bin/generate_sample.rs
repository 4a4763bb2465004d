use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use insurance_costs::data::model::{InsuranceDataset, Record, Region, Sex, Smoker};
use insurance_costs::data::writer::write_file;

/// Write a synthetic insurance dataset (.csv, .json or .parquet)
#[derive(Parser, Debug)]
#[command(name = "generate_sample")]
struct Args {
    /// Output file; the extension selects the format
    #[arg(default_value = "insurance.csv")]
    output: PathBuf,

    /// Number of records to generate
    #[arg(long, default_value_t = 1338)]
    rows: usize,

    /// Seed for the deterministic generator
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

/// xoshiro256** seeded through SplitMix64, so nearby seeds still give
/// unrelated streams.
struct Xoshiro256 {
    s: [u64; 4],
    /// Second Box-Muller variate, handed out on the next `normal` call.
    spare: Option<f64>,
}

impl Xoshiro256 {
    fn seed_from(seed: u64) -> Self {
        let mut sm = seed;
        let mut splitmix = || {
            sm = sm.wrapping_add(0x9E37_79B9_7F4A_7C15);
            let mut z = sm;
            z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
            z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
            z ^ (z >> 31)
        };
        Xoshiro256 {
            s: [splitmix(), splitmix(), splitmix(), splitmix()],
            spare: None,
        }
    }

    fn next_u64(&mut self) -> u64 {
        let [s0, s1, s2, s3] = &mut self.s;
        let out = s1.wrapping_mul(5).rotate_left(7).wrapping_mul(9);
        let t = *s1 << 17;
        *s2 ^= *s0;
        *s3 ^= *s1;
        *s1 ^= *s2;
        *s0 ^= *s3;
        *s2 ^= t;
        *s3 = s3.rotate_left(45);
        out
    }

    /// Uniform in `[0, 1)` with 53 bits of precision.
    fn unit(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 * f64::EPSILON / 2.0
    }

    /// Uniform in `0..n` by multiply-shift (Lemire, without rejection).
    fn below(&mut self, n: u64) -> u64 {
        ((u128::from(self.next_u64()) * u128::from(n)) >> 64) as u64
    }

    /// Uniform integer in `lo..=hi`.
    fn range(&mut self, lo: u32, hi: u32) -> u32 {
        lo + self.below(u64::from(hi - lo) + 1) as u32
    }

    fn chance(&mut self, p: f64) -> bool {
        self.unit() < p
    }

    fn pick<T: Copy>(&mut self, items: &[T]) -> T {
        items[self.below(items.len() as u64) as usize]
    }

    /// Normal variate via Box-Muller, using both outputs of each transform.
    fn normal(&mut self, mean: f64, std_dev: f64) -> f64 {
        let z = match self.spare.take() {
            Some(z) => z,
            None => {
                let radius = (-2.0 * (1.0 - self.unit()).ln()).sqrt();
                let angle = std::f64::consts::TAU * self.unit();
                self.spare = Some(radius * angle.sin());
                radius * angle.cos()
            }
        };
        mean + std_dev * z
    }
}

/// Children count, skewed towards none like the public dataset.
const CHILDREN_WEIGHTS: [(u32, f64); 6] = [
    (0, 0.43),
    (1, 0.24),
    (2, 0.18),
    (3, 0.12),
    (4, 0.02),
    (5, 0.01),
];

fn generate_record(rng: &mut Xoshiro256) -> Record {
    let age = rng.range(18, 64);
    let sex = rng.pick(Sex::ALL);
    let region = rng.pick(Region::ALL);
    let smoker = if rng.chance(0.2) { Smoker::Yes } else { Smoker::No };
    let bmi = (rng.normal(30.7, 6.1).clamp(15.9, 53.1) * 1000.0).round() / 1000.0;

    let roll = rng.unit();
    let mut acc = 0.0;
    let children = CHILDREN_WEIGHTS
        .iter()
        .find(|&&(_, w)| {
            acc += w;
            roll < acc
        })
        .map_or(0, |&(n, _)| n);

    // Charges grow with age; smoking dominates, worse when combined with obesity.
    let mut charges = 260.0 * f64::from(age) - 2000.0 + 450.0 * f64::from(children);
    if smoker == Smoker::Yes {
        charges += if bmi >= 30.0 { 33000.0 } else { 13000.0 };
    }
    charges += rng.normal(0.0, 2500.0).abs();
    let charges = (charges.max(1121.87) * 10_000.0).round() / 10_000.0;

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

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut rng = Xoshiro256::seed_from(args.seed);
    let records: Vec<Record> = (0..args.rows).map(|_| generate_record(&mut rng)).collect();
    let dataset = InsuranceDataset::from_records(records);

    write_file(&args.output, &dataset)?;

    println!(
        "Wrote {} insurance records to {}",
        dataset.len(),
        args.output.display()
    );
    Ok(())
}
