use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::{fmt::Debug, fs, ops::RangeBounds, path::Path};

/// Analysis configuration parameters.
///
/// Loaded from a TOML file and validated before use; every field has a
/// sensible default so the file may be partial or absent altogether.
/// See [`Config::load`] for loading.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Number of equal-width direction sectors over the full circle.
    pub sector_count: usize,
    /// Air density used for power-density estimates, kg/m^3.
    pub air_density: f64,
    /// Measurement heights for shear analysis, meters, strictly increasing.
    pub shear_heights: Vec<f64>,

    /// Synthetic example-data generation.
    pub synth: SynthConfig,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthConfig {
    /// RNG seed; generated from the OS when absent.
    pub seed: Option<u64>,
    /// Measurements written per station.
    pub samples_per_station: usize,
    pub stations: Vec<SynthStation>,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct SynthStation {
    pub name: String,
    /// Weibull shape of the speed distribution at the reference height.
    pub weibull_shape: f64,
    /// Weibull scale of the speed distribution, m/s.
    pub weibull_scale: f64,
    /// Power-law exponent of the vertical speed profile.
    #[serde(default = "default_shear_alpha")]
    pub shear_alpha: f64,
    /// Prevailing-direction mixture; weights need not sum to one.
    pub modes: Vec<DirectionMode>,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct DirectionMode {
    pub center_deg: f64,
    pub spread_deg: f64,
    pub weight: f64,
}

fn default_shear_alpha() -> f64 {
    0.14
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sector_count: 16,
            air_density: 1.225,
            shear_heights: vec![10.0, 40.0, 80.0, 120.0],
            synth: SynthConfig::default(),
        }
    }
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            seed: None,
            samples_per_station: 2000,
            stations: vec![
                SynthStation {
                    name: "mast-a".to_string(),
                    weibull_shape: 2.0,
                    weibull_scale: 8.0,
                    shear_alpha: 0.14,
                    modes: vec![
                        DirectionMode {
                            center_deg: 330.0,
                            spread_deg: 25.0,
                            weight: 0.7,
                        },
                        DirectionMode {
                            center_deg: 150.0,
                            spread_deg: 35.0,
                            weight: 0.3,
                        },
                    ],
                },
                SynthStation {
                    name: "mast-b".to_string(),
                    weibull_shape: 2.3,
                    weibull_scale: 6.0,
                    shear_alpha: 0.18,
                    modes: vec![
                        DirectionMode {
                            center_deg: 90.0,
                            spread_deg: 30.0,
                            weight: 1.0,
                        },
                        DirectionMode {
                            center_deg: 260.0,
                            spread_deg: 45.0,
                            weight: 0.4,
                        },
                    ],
                },
            ],
        }
    }
}

impl Config {
    /// Load a [`Config`] from a TOML file, falling back to the defaults when
    /// the file does not exist.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or deserialized, or if
    /// the configuration values are invalid.
    pub fn load<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();

        let config = if file.exists() {
            let contents =
                fs::read_to_string(file).with_context(|| format!("failed to read {file:?}"))?;
            toml::from_str(&contents).context("failed to deserialize config")?
        } else {
            log::info!("no config at {file:?}, using defaults");
            Config::default()
        };

        config.validate().context("failed to validate config")?;

        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        check_num(self.sector_count, 2..=72).context("invalid sector count")?;
        check_num(self.air_density, 0.5..2.5).context("invalid air density")?;

        if self.shear_heights.len() < 2 {
            bail!("need at least two shear heights");
        }
        for pair in self.shear_heights.windows(2) {
            if pair[0] >= pair[1] {
                bail!("shear heights must be strictly increasing");
            }
        }
        check_num(self.shear_heights[0], 0.1..)
            .context("invalid lowest shear height")?;

        check_num(self.synth.samples_per_station, 1..1_000_000)
            .context("invalid number of samples per station")?;
        for station in &self.synth.stations {
            if station.name.is_empty() {
                bail!("station name must not be empty");
            }
            check_num(station.weibull_shape, 0.1..20.0)
                .with_context(|| format!("invalid weibull shape for {:?}", station.name))?;
            check_num(station.weibull_scale, 0.1..50.0)
                .with_context(|| format!("invalid weibull scale for {:?}", station.name))?;
            check_num(station.shear_alpha, 0.0..1.0)
                .with_context(|| format!("invalid shear alpha for {:?}", station.name))?;
            if station.modes.is_empty() {
                bail!("station {:?} needs at least one direction mode", station.name);
            }
            for mode in &station.modes {
                check_num(mode.center_deg, 0.0..360.0)
                    .with_context(|| format!("invalid mode center for {:?}", station.name))?;
                check_num(mode.spread_deg, 0.1..180.0)
                    .with_context(|| format!("invalid mode spread for {:?}", station.name))?;
                check_num(mode.weight, 0.0..)
                    .with_context(|| format!("invalid mode weight for {:?}", station.name))?;
            }
        }

        Ok(())
    }
}

fn check_num<T, R>(num: T, range: R) -> Result<()>
where
    T: PartialOrd + Debug,
    R: RangeBounds<T> + Debug,
{
    if !range.contains(&num) {
        bail!("number must be in the range {range:?}, but is {num:?}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config: Config = toml::from_str("sector_count = 12\n").unwrap();
        assert_eq!(config.sector_count, 12);
        assert_eq!(config.air_density, 1.225);
        assert!(!config.synth.stations.is_empty());
    }

    #[test]
    fn invalid_values_are_rejected() {
        let config = Config {
            sector_count: 1,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            shear_heights: vec![40.0, 10.0],
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.synth.stations[0].weibull_shape = -2.0;
        assert!(config.validate().is_err());
    }
}
