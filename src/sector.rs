use crate::dataset::Record;
use crate::stats::compute_mean;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A sector is fitted only when it holds strictly more samples than this.
pub const MIN_SECTOR_SAMPLES: usize = 10;

const MLE_MAX_ITERS: usize = 200;
const MLE_TOLERANCE: f64 = 1e-10;

/// Cache key for per-sector fit results.
///
/// A tagged key instead of a sentinel string, so a station literally named
/// "all" can never collide with the whole-dataset entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FitKey {
    AllStations,
    Station(String),
}

impl FitKey {
    pub fn from_station(station: Option<&str>) -> Self {
        match station {
            None => FitKey::AllStations,
            Some(name) => FitKey::Station(name.to_string()),
        }
    }

    pub fn station(&self) -> Option<&str> {
        match self {
            FitKey::AllStations => None,
            FitKey::Station(name) => Some(name),
        }
    }
}

impl fmt::Display for FitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FitKey::AllStations => write!(f, "all-stations"),
            FitKey::Station(name) => write!(f, "{name}"),
        }
    }
}

/// Maximum-likelihood Weibull parameters for one direction sector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeibullFit {
    /// Shape parameter `k`.
    pub shape: f64,
    /// Scale parameter `c`, in m/s.
    pub scale: f64,
    /// Sector sample count over the filtered dataset size, in `[0, 1]`.
    pub frequency: f64,
    pub samples: usize,
}

/// Fit results keyed by sector index. Sectors without enough samples are
/// absent, not zero-filled.
pub type SectorFits = BTreeMap<usize, WeibullFit>;

/// Equal-width sector boundaries over `[0, 360]`, `sector_count + 1` values.
pub fn sector_bounds(sector_count: usize) -> Vec<f64> {
    (0..=sector_count)
        .map(|idx| 360.0 * idx as f64 / sector_count as f64)
        .collect()
}

/// Midpoint angle of each sector, in degrees.
pub fn sector_centers(sector_count: usize) -> Vec<f64> {
    let half_width = 180.0 / sector_count as f64;
    (0..sector_count)
        .map(|idx| 360.0 * idx as f64 / sector_count as f64 + half_width)
        .collect()
}

/// Index of the sector containing `direction_deg`, or `None` outside `[0, 360]`.
///
/// Every sector is half-open, `[lo, hi)`, except the last one, which keeps
/// its upper bound closed so that exactly 360.0 still falls inside it.
pub fn sector_index(direction_deg: f64, bounds: &[f64]) -> Option<usize> {
    let last = bounds.len() - 2;
    for idx in 0..=last {
        let contained = if idx < last {
            bounds[idx] <= direction_deg && direction_deg < bounds[idx + 1]
        } else {
            bounds[idx] <= direction_deg && direction_deg <= bounds[idx + 1]
        };
        if contained {
            return Some(idx);
        }
    }
    None
}

/// Fit a Weibull distribution to every sector with enough samples.
///
/// Sector frequency is taken over all `records`, so frequencies of fitted
/// sectors sum to at most 1. Deterministic for identical input order.
pub fn fit_sectors(records: &[&Record], sector_count: usize) -> SectorFits {
    let bounds = sector_bounds(sector_count);
    let mut sector_speeds: Vec<Vec<f64>> = vec![Vec::new(); sector_count];
    for rec in records {
        if let Some(idx) = sector_index(rec.direction_deg, &bounds) {
            sector_speeds[idx].push(rec.speed_mps);
        }
    }

    let total = records.len();
    let mut fits = SectorFits::new();
    for (idx, speeds) in sector_speeds.iter().enumerate() {
        if speeds.len() <= MIN_SECTOR_SAMPLES {
            continue;
        }
        let Some((shape, scale)) = weibull_mle(speeds) else {
            log::debug!("sector {idx}: degenerate speed sample, fit skipped");
            continue;
        };
        fits.insert(
            idx,
            WeibullFit {
                shape,
                scale,
                frequency: speeds.len() as f64 / total as f64,
                samples: speeds.len(),
            },
        );
    }
    fits
}

/// Per-sector frequencies and mean speeds for the polar diagram.
///
/// Covers every sector; empty sectors carry zero frequency and zero mean.
#[derive(Debug, Serialize, Deserialize)]
pub struct RoseData {
    pub centers_deg: Vec<f64>,
    pub frequencies: Vec<f64>,
    pub mean_speeds: Vec<f64>,
}

pub fn rose_data(records: &[&Record], sector_count: usize) -> RoseData {
    let bounds = sector_bounds(sector_count);
    let mut sector_speeds: Vec<Vec<f64>> = vec![Vec::new(); sector_count];
    for rec in records {
        if let Some(idx) = sector_index(rec.direction_deg, &bounds) {
            sector_speeds[idx].push(rec.speed_mps);
        }
    }

    let total = records.len();
    RoseData {
        centers_deg: sector_centers(sector_count),
        frequencies: sector_speeds
            .iter()
            .map(|speeds| {
                if total == 0 {
                    0.0
                } else {
                    speeds.len() as f64 / total as f64
                }
            })
            .collect(),
        mean_speeds: sector_speeds
            .iter()
            .map(|speeds| if speeds.is_empty() { 0.0 } else { compute_mean(speeds) })
            .collect(),
    }
}

/// Maximum-likelihood estimate of two-parameter Weibull shape and scale
/// (location fixed at zero).
///
/// Solves the shape profile-likelihood equation with Newton-Raphson and
/// recovers the scale in closed form. Zero speeds carry no information for
/// a positive-support fit and are excluded. Returns `None` for degenerate
/// samples (fewer than two positive values, or no spread).
pub fn weibull_mle(speeds: &[f64]) -> Option<(f64, f64)> {
    let positive: Vec<f64> = speeds.iter().copied().filter(|&val| val > 0.0).collect();
    if positive.len() < 2 {
        return None;
    }

    let n_vals = positive.len() as f64;
    let ln_vals: Vec<f64> = positive.iter().map(|val| val.ln()).collect();
    let mean_ln = ln_vals.iter().sum::<f64>() / n_vals;

    let var_ln = ln_vals.iter().map(|val| (val - mean_ln).powi(2)).sum::<f64>() / n_vals;
    if var_ln <= 0.0 {
        return None;
    }
    // Moment-based starting point: for a Weibull sample the standard
    // deviation of ln(x) equals (pi / sqrt(6)) / k.
    let mut shape = std::f64::consts::PI / (6.0_f64.sqrt() * var_ln.sqrt());

    for _ in 0..MLE_MAX_ITERS {
        let mut s0 = 0.0;
        let mut s1 = 0.0;
        let mut s2 = 0.0;
        for (&val, &ln_val) in positive.iter().zip(&ln_vals) {
            let pow = val.powf(shape);
            s0 += pow;
            s1 += pow * ln_val;
            s2 += pow * ln_val * ln_val;
        }

        let f = s1 / s0 - 1.0 / shape - mean_ln;
        let df = (s2 * s0 - s1 * s1) / (s0 * s0) + 1.0 / (shape * shape);
        let mut next = shape - f / df;
        if next <= 0.0 || !next.is_finite() {
            next = shape / 2.0;
        }

        let converged = (next - shape).abs() <= MLE_TOLERANCE * shape;
        shape = next;
        if converged {
            break;
        }
    }
    if !shape.is_finite() || shape <= 0.0 {
        return None;
    }

    let scale = (positive.iter().map(|val| val.powf(shape)).sum::<f64>() / n_vals).powf(1.0 / shape);
    if !scale.is_finite() || scale <= 0.0 {
        return None;
    }

    Some((shape, scale))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Record;
    use chrono::NaiveDate;
    use rand::prelude::*;
    use rand_chacha::ChaCha12Rng;
    use rand_distr::Weibull;

    fn record(direction_deg: f64, speed_mps: f64) -> Record {
        let timestamp = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        Record {
            station: "a".to_string(),
            timestamp,
            direction_deg,
            speed_mps,
            height_m: None,
        }
    }

    #[test]
    fn bounds_partition_the_circle_evenly() {
        let bounds = sector_bounds(16);
        assert_eq!(bounds.len(), 17);
        assert_eq!(bounds[0], 0.0);
        assert_eq!(bounds[16], 360.0);
        for pair in bounds.windows(2) {
            assert!((pair[1] - pair[0] - 22.5).abs() < 1e-12);
        }
    }

    #[test]
    fn every_direction_falls_in_exactly_one_sector() {
        let bounds = sector_bounds(16);
        let mut direction = 0.0;
        while direction < 360.0 {
            let hits = (0..16)
                .filter(|&idx| {
                    let lo = bounds[idx];
                    let hi = bounds[idx + 1];
                    if idx < 15 {
                        lo <= direction && direction < hi
                    } else {
                        lo <= direction && direction <= hi
                    }
                })
                .count();
            assert_eq!(hits, 1, "direction {direction}");
            direction += 0.37;
        }

        assert_eq!(sector_index(0.0, &bounds), Some(0));
        assert_eq!(sector_index(22.5, &bounds), Some(1));
        // The last sector keeps both ends.
        assert_eq!(sector_index(360.0, &bounds), Some(15));
        assert_eq!(sector_index(360.1, &bounds), None);
    }

    #[test]
    fn sector_counts_sum_to_dataset_size() {
        let mut rng = ChaCha12Rng::seed_from_u64(3);
        let records: Vec<Record> = (0..500)
            .map(|_| record(rng.random_range(0.0..360.0), rng.random_range(0.0..15.0)))
            .collect();
        let refs: Vec<&Record> = records.iter().collect();

        let bounds = sector_bounds(12);
        let mut counts = vec![0usize; 12];
        for rec in &refs {
            counts[sector_index(rec.direction_deg, &bounds).unwrap()] += 1;
        }
        assert_eq!(counts.iter().sum::<usize>(), refs.len());

        let rose = rose_data(&refs, 12);
        assert!((rose.frequencies.iter().sum::<f64>() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn sample_count_threshold_is_strict() {
        let speeds = [3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 4.5, 5.5, 6.5, 7.5, 5.2];

        let ten: Vec<Record> = speeds[..10].iter().map(|&s| record(5.0, s)).collect();
        let refs: Vec<&Record> = ten.iter().collect();
        assert!(fit_sectors(&refs, 16).is_empty());

        let eleven: Vec<Record> = speeds.iter().map(|&s| record(5.0, s)).collect();
        let refs: Vec<&Record> = eleven.iter().collect();
        let fits = fit_sectors(&refs, 16);
        assert_eq!(fits.len(), 1);
        assert!(fits.contains_key(&0));
        assert_eq!(fits[&0].samples, 11);
    }

    #[test]
    fn refit_is_deterministic() {
        let mut rng = ChaCha12Rng::seed_from_u64(11);
        let records: Vec<Record> = (0..400)
            .map(|_| record(rng.random_range(0.0..360.0), rng.random_range(0.5..12.0)))
            .collect();
        let refs: Vec<&Record> = records.iter().collect();

        let first = fit_sectors(&refs, 8);
        let second = fit_sectors(&refs, 8);
        assert_eq!(first, second);
    }

    #[test]
    fn mle_recovers_generating_parameters() {
        let mut rng = ChaCha12Rng::seed_from_u64(42);
        let dist = Weibull::new(8.0, 2.0).unwrap();
        let speeds: Vec<f64> = (0..1000).map(|_| dist.sample(&mut rng)).collect();

        let (shape, scale) = weibull_mle(&speeds).unwrap();
        assert!((shape - 2.0).abs() < 0.3, "shape {shape}");
        assert!((scale - 8.0).abs() < 0.5, "scale {scale}");
    }

    #[test]
    fn mle_rejects_degenerate_samples() {
        assert!(weibull_mle(&[]).is_none());
        assert!(weibull_mle(&[5.0]).is_none());
        assert!(weibull_mle(&[0.0, 0.0, 0.0]).is_none());
        assert!(weibull_mle(&[4.0, 4.0, 4.0]).is_none());
    }

    #[test]
    fn fitted_frequencies_use_the_filtered_total() {
        // 20 samples in sector 0, 5 in sector 8: only sector 0 is fitted,
        // with frequency 20/25.
        let mut records: Vec<Record> = (0..20)
            .map(|idx| record(3.0, 3.0 + 0.3 * idx as f64))
            .collect();
        records.extend((0..5).map(|idx| record(190.0, 4.0 + idx as f64)));
        let refs: Vec<&Record> = records.iter().collect();

        let fits = fit_sectors(&refs, 16);
        assert_eq!(fits.len(), 1);
        assert!((fits[&0].frequency - 0.8).abs() < 1e-12);
    }
}
