use crate::sector::{SectorFits, sector_bounds};
use crate::stats::Statistics;
use anyhow::Result;
use std::fmt::Write;

/// Assemble the plain-text technical report for one station.
///
/// Section headers are fixed; consumers grep for them.
pub fn compose(
    station: &str,
    stats: &Statistics,
    fits: &SectorFits,
    power: f64,
    sector_count: usize,
) -> Result<String> {
    let mut out = String::new();

    writeln!(out, "==========================================")?;
    writeln!(out, " WIND RESOURCE ASSESSMENT - {station}")?;
    writeln!(out, "==========================================")?;
    writeln!(out)?;

    writeln!(out, "--- Basic statistics ---")?;
    writeln!(out, " samples:              {}", stats.samples)?;
    writeln!(out, " mean speed:           {:.2} m/s", stats.mean_speed)?;
    writeln!(out, " min / max speed:      {:.2} / {:.2} m/s", stats.min_speed, stats.max_speed)?;
    writeln!(out, " std dev speed:        {:.2} m/s", stats.std_dev_speed)?;
    writeln!(out, " mean direction:       {:.1} deg", stats.mean_direction_deg)?;
    writeln!(out, " calm frequency:       {:.1} %", 100.0 * stats.calm_frequency)?;
    writeln!(out, " turbulence intensity: {:.3}", stats.turbulence_intensity)?;
    writeln!(out)?;

    writeln!(out, "--- Weibull distribution per sector ---")?;
    if fits.is_empty() {
        writeln!(out, " no sector with enough samples")?;
    } else {
        let bounds = sector_bounds(sector_count);
        writeln!(out, " sector        arc        k       c    freq")?;
        for (&idx, fit) in fits {
            writeln!(
                out,
                " {idx:>6}  {:>5.1}-{:<5.1}  {:>5.2}  {:>5.2}  {:>5.3}",
                bounds[idx],
                bounds[idx + 1],
                fit.shape,
                fit.scale,
                fit.frequency,
            )?;
        }
    }
    writeln!(out)?;

    writeln!(out, "--- Wind potential ---")?;
    writeln!(out, " power density:  {power:.1} W/m^2")?;
    writeln!(out, " classification: {}", classify_power(power))?;
    writeln!(out)?;

    writeln!(out, "--- Recommendations ---")?;
    writeln!(out, " {}", recommendation(power))?;

    Ok(out)
}

fn classify_power(power: f64) -> &'static str {
    if power > 500.0 {
        "exceptional"
    } else if power > 400.0 {
        "excellent"
    } else if power > 300.0 {
        "good"
    } else if power > 200.0 {
        "moderate"
    } else {
        "limited"
    }
}

fn recommendation(power: f64) -> &'static str {
    if power > 400.0 {
        "site recommended for wind power installation"
    } else if power > 300.0 {
        "site viable; a detailed measurement campaign is advised"
    } else {
        "site needs further study before any commitment"
    }
}
