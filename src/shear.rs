use crate::dataset::Record;
use crate::stats::compute_mean;
use serde::{Deserialize, Serialize};

/// Mean speed observed at one measurement height.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeightMean {
    pub height_m: f64,
    pub mean_speed: f64,
}

/// Outcome of a wind-shear fit.
///
/// Failures are part of the result, never a propagated error: callers
/// inspect for the `Insufficient` marker.
#[derive(Debug, Serialize, Deserialize)]
pub enum ShearResult {
    Fitted {
        /// Power-law exponent `alpha` of the vertical speed profile.
        exponent: f64,
        profile: Vec<HeightMean>,
    },
    Insufficient {
        message: String,
    },
}

/// Fit a power-law shear exponent from mean speeds at the given heights.
///
/// Records match a height by exact equality; there is no interpolation.
/// The exponent uses only the first two heights,
/// `alpha = ln(v1/v0) / ln(h1/h0)`; further heights extend the reported
/// profile but not the fit.
pub fn analyze_shear(records: &[&Record], heights: &[f64]) -> ShearResult {
    if heights.len() < 2 {
        return ShearResult::Insufficient {
            message: format!("need at least two heights, got {}", heights.len()),
        };
    }

    let means: Vec<f64> = heights
        .iter()
        .map(|&height| {
            let speeds: Vec<f64> = records
                .iter()
                .filter(|rec| rec.height_m == Some(height))
                .map(|rec| rec.speed_mps)
                .collect();
            compute_mean(&speeds)
        })
        .collect();

    let (h0, h1) = (heights[0], heights[1]);
    let (v0, v1) = (means[0], means[1]);

    if !v0.is_finite() || !v1.is_finite() {
        return ShearResult::Insufficient {
            message: format!("no samples at height {h0} or {h1}"),
        };
    }
    if v0 <= 0.0 || v1 <= 0.0 {
        return ShearResult::Insufficient {
            message: format!("non-positive mean speed at height {h0} or {h1}"),
        };
    }
    if h0 <= 0.0 || h1 <= 0.0 || h0 == h1 {
        return ShearResult::Insufficient {
            message: format!("invalid height pair ({h0}, {h1})"),
        };
    }

    let exponent = (v1 / v0).ln() / (h1 / h0).ln();
    if !exponent.is_finite() {
        return ShearResult::Insufficient {
            message: format!("exponent is not finite for heights ({h0}, {h1})"),
        };
    }

    let profile = heights
        .iter()
        .zip(&means)
        .filter(|(_, mean)| mean.is_finite())
        .map(|(&height_m, &mean_speed)| HeightMean {
            height_m,
            mean_speed,
        })
        .collect();

    ShearResult::Fitted { exponent, profile }
}
