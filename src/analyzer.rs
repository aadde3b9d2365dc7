use crate::dataset::Dataset;
use crate::power;
use crate::sector::{self, FitKey, RoseData, SectorFits};
use crate::shear::{self, ShearResult};
use crate::stats::{self, Statistics};
use anyhow::{Context, Result, bail};
use rmp_serde::{decode, encode};
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    fs::File,
    io::{BufReader, BufWriter},
    path::Path,
};

/// Analyzer over a prepared dataset.
///
/// Owns the dataset and the per-key fit cache. Fitting overwrites the cache
/// entry for its key; estimation reads the cache and never mutates it, so
/// the fit step stays visible at every call site.
pub struct Analyzer {
    dataset: Dataset,
    fit_cache: HashMap<FitKey, SectorFits>,
}

#[derive(Serialize, Deserialize)]
struct FitEntry {
    key: FitKey,
    sectors: SectorFits,
}

impl Analyzer {
    pub fn new(dataset: Dataset) -> Self {
        Self {
            dataset,
            fit_cache: HashMap::new(),
        }
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    /// Fail unless `station` occurs in the dataset.
    pub fn ensure_station(&self, station: &str) -> Result<()> {
        if !self.dataset.stations().iter().any(|name| name == station) {
            bail!(
                "unknown station {station:?} (known stations: {:?})",
                self.dataset.stations()
            );
        }
        Ok(())
    }

    /// Descriptive statistics for one station, or for all data when `station`
    /// is `None`. Not cached.
    pub fn statistics(&self, station: Option<&str>) -> Statistics {
        stats::compute_statistics(&self.dataset.select(station))
    }

    /// Fit per-sector Weibull distributions and cache them under `key`.
    /// A repeated call overwrites the entry; last write wins.
    pub fn fit_sectors(&mut self, key: &FitKey, sector_count: usize) -> &SectorFits {
        let records = self.dataset.select(key.station());
        let fits = sector::fit_sectors(&records, sector_count);
        log::info!(
            "fitted {} of {sector_count} sectors for {key} ({} records)",
            fits.len(),
            records.len()
        );
        let entry = self.fit_cache.entry(key.clone()).or_default();
        *entry = fits;
        entry
    }

    pub fn cached_fit(&self, key: &FitKey) -> Option<&SectorFits> {
        self.fit_cache.get(key)
    }

    /// Mean wind power density from the cached fit for `key`.
    ///
    /// Requires a prior [`Analyzer::fit_sectors`] call for the same key;
    /// estimation never fits behind the caller's back.
    pub fn estimate_power(&self, key: &FitKey, air_density: f64) -> Result<f64> {
        let fits = self
            .fit_cache
            .get(key)
            .with_context(|| format!("no cached fit for {key}; fit sectors first"))?;
        Ok(power::power_density(fits, air_density))
    }

    /// Two-point power-law shear fit for one station.
    pub fn analyze_shear(&self, station: &str, heights: &[f64]) -> ShearResult {
        shear::analyze_shear(&self.dataset.select(Some(station)), heights)
    }

    /// Per-sector frequency and mean-speed arrays for the polar diagram.
    pub fn rose_data(&self, station: Option<&str>, sector_count: usize) -> RoseData {
        sector::rose_data(&self.dataset.select(station), sector_count)
    }

    /// Persist the fit cache as MessagePack.
    pub fn save_fits<P: AsRef<Path>>(&self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let mut writer = BufWriter::new(file);

        let entries: Vec<FitEntry> = self
            .fit_cache
            .iter()
            .map(|(key, sectors)| FitEntry {
                key: key.clone(),
                sectors: sectors.clone(),
            })
            .collect();
        encode::write(&mut writer, &entries).context("failed to serialize fits")?;
        Ok(())
    }

    /// Load a fit cache persisted by [`Analyzer::save_fits`], replacing the
    /// in-memory cache.
    pub fn load_fits<P: AsRef<Path>>(&mut self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::open(file).with_context(|| format!("failed to open {file:?}"))?;
        let mut reader = BufReader::new(file);

        let entries: Vec<FitEntry> =
            decode::from_read(&mut reader).context("failed to deserialize fits")?;
        self.fit_cache = entries
            .into_iter()
            .map(|entry| (entry.key, entry.sectors))
            .collect();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Record;
    use chrono::NaiveDate;

    fn record(station: &str, direction_deg: f64, speed_mps: f64) -> Record {
        let timestamp = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        Record {
            station: station.to_string(),
            timestamp,
            direction_deg,
            speed_mps,
            height_m: None,
        }
    }

    fn analyzer() -> Analyzer {
        let records: Vec<Record> = (0..40)
            .map(|idx| record("a", 3.0, 3.0 + 0.2 * (idx % 13) as f64))
            .chain((0..30).map(|idx| record("b", 200.0, 5.0 + 0.25 * (idx % 9) as f64)))
            .collect();
        Analyzer::new(Dataset::new(records))
    }

    #[test]
    fn unknown_station_is_rejected() {
        let ana = analyzer();
        assert!(ana.ensure_station("a").is_ok());
        assert!(ana.ensure_station("nowhere").is_err());
    }

    #[test]
    fn power_requires_an_explicit_fit() {
        let mut ana = analyzer();
        let key = FitKey::Station("a".to_string());

        let err = ana.estimate_power(&key, 1.225).unwrap_err();
        assert!(err.to_string().contains("no cached fit"));

        ana.fit_sectors(&key, 16);
        let power = ana.estimate_power(&key, 1.225).unwrap();
        assert!(power > 0.0);
    }

    #[test]
    fn station_and_all_keys_do_not_collide() {
        let mut ana = analyzer();
        ana.fit_sectors(&FitKey::Station("a".to_string()), 16);

        assert!(ana.cached_fit(&FitKey::AllStations).is_none());
        assert!(ana.cached_fit(&FitKey::Station("a".to_string())).is_some());
    }

    #[test]
    fn refitting_overwrites_with_identical_results() {
        let mut ana = analyzer();
        let key = FitKey::AllStations;

        let first = ana.fit_sectors(&key, 16).clone();
        let second = ana.fit_sectors(&key, 16).clone();
        assert_eq!(first, second);
    }

    #[test]
    fn fit_cache_roundtrips_through_disk() {
        let dir = std::env::temp_dir().join("rosewind-fit-cache-test");
        std::fs::create_dir_all(&dir).unwrap();
        let file = dir.join("fits.msgpack");

        let mut ana = analyzer();
        ana.fit_sectors(&FitKey::Station("a".to_string()), 16);
        ana.fit_sectors(&FitKey::AllStations, 16);
        ana.save_fits(&file).unwrap();

        let mut other = analyzer();
        other.load_fits(&file).unwrap();
        assert_eq!(
            other.cached_fit(&FitKey::AllStations),
            ana.cached_fit(&FitKey::AllStations)
        );
        assert_eq!(
            other.cached_fit(&FitKey::Station("a".to_string())),
            ana.cached_fit(&FitKey::Station("a".to_string()))
        );

        std::fs::remove_file(&file).ok();
    }
}
