use crate::dataset::Record;
use serde::{Deserialize, Serialize};

/// Speeds below this threshold count as calm air.
pub const CALM_THRESHOLD_MPS: f64 = 0.5;

/// Descriptive statistics for one station or for the whole dataset.
///
/// Recomputed on demand, never cached. Fields may be NaN when the
/// underlying sample is empty or too small.
#[derive(Debug, Serialize, Deserialize)]
pub struct Statistics {
    pub samples: usize,
    pub mean_speed: f64,
    pub min_speed: f64,
    pub max_speed: f64,
    pub std_dev_speed: f64,
    /// Vector-averaged direction in `[0, 360)` degrees.
    pub mean_direction_deg: f64,
    /// Fraction of samples below [`CALM_THRESHOLD_MPS`].
    pub calm_frequency: f64,
    /// `std_dev_speed / mean_speed`; non-finite when the mean speed is zero.
    pub turbulence_intensity: f64,
}

pub fn compute_statistics(records: &[&Record]) -> Statistics {
    let speeds: Vec<f64> = records.iter().map(|rec| rec.speed_mps).collect();
    let directions: Vec<f64> = records.iter().map(|rec| rec.direction_deg).collect();

    let mean = compute_mean(&speeds);
    let std_dev = compute_var(&speeds).sqrt();

    let calm_frequency = if speeds.is_empty() {
        f64::NAN
    } else {
        let n_calm = speeds.iter().filter(|&&val| val < CALM_THRESHOLD_MPS).count();
        n_calm as f64 / speeds.len() as f64
    };

    Statistics {
        samples: speeds.len(),
        mean_speed: mean,
        min_speed: speeds.iter().copied().fold(f64::NAN, f64::min),
        max_speed: speeds.iter().copied().fold(f64::NAN, f64::max),
        std_dev_speed: std_dev,
        mean_direction_deg: circular_mean_deg(&directions),
        calm_frequency,
        turbulence_intensity: std_dev / mean,
    }
}

/// Mean direction via independent sine/cosine averaging.
///
/// Averaging raw degree values is discontinuous across the 0/360 boundary;
/// recombining the component means with `atan2` is not.
pub fn circular_mean_deg(directions_deg: &[f64]) -> f64 {
    if directions_deg.is_empty() {
        return f64::NAN;
    }

    let n_vals = directions_deg.len() as f64;
    let (sin_sum, cos_sum) = directions_deg.iter().fold((0.0, 0.0), |(s, c), &deg| {
        let rad = deg.to_radians();
        (s + rad.sin(), c + rad.cos())
    });

    let mean_rad = (sin_sum / n_vals).atan2(cos_sum / n_vals);
    mean_rad.to_degrees().rem_euclid(360.0)
}

pub fn compute_mean(vals: &[f64]) -> f64 {
    if vals.is_empty() {
        return f64::NAN;
    }
    vals.iter().sum::<f64>() / vals.len() as f64
}

pub fn compute_var(vals: &[f64]) -> f64 {
    let n_vals = vals.len();
    if n_vals < 2 {
        return f64::NAN;
    }
    let mean = compute_mean(vals);
    vals.iter().map(|&val| (val - mean).powi(2)).sum::<f64>() / (n_vals - 1) as f64
}
