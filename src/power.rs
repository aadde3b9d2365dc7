use crate::sector::SectorFits;

/// Standard sea-level air density, kg/m^3.
pub const DEFAULT_AIR_DENSITY: f64 = 1.225;

/// Mean wind power density in W/m^2 from per-sector Weibull fits.
///
/// Per sector: `0.5 * rho * c^3 * (1 + 3/k) * frequency`, summed over the
/// fitted sectors. The `(1 + 3/k)` term stands in for the third-moment
/// factor `gamma(1 + 3/k)` and must stay in this form. Missing sectors mean
/// "no data" and contribute nothing; zero fitted sectors yield 0.
pub fn power_density(fits: &SectorFits, air_density: f64) -> f64 {
    fits.values()
        .map(|fit| 0.5 * air_density * fit.scale.powi(3) * (1.0 + 3.0 / fit.shape) * fit.frequency)
        .sum()
}
