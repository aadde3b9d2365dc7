use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::path::Path;

const TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// A single directional wind-speed measurement.
///
/// After dataset preparation `direction_deg` lies in `[0, 360)` and
/// `speed_mps` is non-negative and finite.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    pub station: String,
    pub timestamp: NaiveDateTime,
    pub direction_deg: f64,
    pub speed_mps: f64,
    pub height_m: Option<f64>,
}

/// An ordered, cleaned collection of measurements.
///
/// Cleaning happens once at construction and cannot be re-applied:
/// directions are wrapped into `[0, 360)`, records with a missing or
/// non-finite direction or speed are dropped, and so are negative speeds.
/// Invalid rows are excluded without error.
pub struct Dataset {
    records: Vec<Record>,
    stations: Vec<String>,
}

impl Dataset {
    pub fn new(raw: Vec<Record>) -> Self {
        let n_raw = raw.len();
        let mut records: Vec<Record> = raw
            .into_iter()
            .filter(|rec| {
                rec.direction_deg.is_finite() && rec.speed_mps.is_finite() && rec.speed_mps >= 0.0
            })
            .collect();
        for rec in &mut records {
            rec.direction_deg = normalize_direction(rec.direction_deg);
        }

        let dropped = n_raw - records.len();
        if dropped > 0 {
            log::debug!("dropped {dropped} invalid records out of {n_raw}");
        }

        let mut stations: Vec<String> = records.iter().map(|rec| rec.station.clone()).collect();
        stations.sort();
        stations.dedup();

        Self { records, stations }
    }

    /// Load and concatenate measurement CSV files, in the order given.
    ///
    /// Each file must carry a header with the columns `station`, `timestamp`,
    /// `direction` and `speed`; a `height` column is optional. Rows that fail
    /// to parse are skipped.
    pub fn from_csv_files<P: AsRef<Path>>(files: &[P]) -> Result<Self> {
        let mut raw = Vec::new();
        for file in files {
            let file = file.as_ref();
            read_csv(file, &mut raw).with_context(|| format!("failed to read {file:?}"))?;
        }
        Ok(Self::new(raw))
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Distinct station identifiers, sorted.
    pub fn stations(&self) -> &[String] {
        &self.stations
    }

    /// Records for one station, or the whole dataset when `station` is `None`.
    pub fn select(&self, station: Option<&str>) -> Vec<&Record> {
        self.records
            .iter()
            .filter(|rec| station.is_none_or(|name| rec.station == name))
            .collect()
    }
}

/// Wrap an angle in degrees into `[0, 360)`. Idempotent.
pub fn normalize_direction(direction_deg: f64) -> f64 {
    direction_deg.rem_euclid(360.0)
}

fn read_csv(file: &Path, raw: &mut Vec<Record>) -> Result<()> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(file)?;

    let headers = reader.headers().context("failed to read headers")?.clone();
    let column = |name: &str| headers.iter().position(|header| header == name);

    let i_station = column("station").context("missing column 'station'")?;
    let i_timestamp = column("timestamp").context("missing column 'timestamp'")?;
    let i_direction = column("direction").context("missing column 'direction'")?;
    let i_speed = column("speed").context("missing column 'speed'")?;
    let i_height = column("height");

    let mut skipped = 0usize;
    for row in reader.records() {
        let row = row.context("failed to read row")?;

        let fields = (
            row.get(i_station),
            row.get(i_timestamp).and_then(parse_timestamp),
            row.get(i_direction).and_then(parse_f64),
            row.get(i_speed).and_then(parse_f64),
        );
        let (Some(station), Some(timestamp), Some(direction_deg), Some(speed_mps)) = fields else {
            skipped += 1;
            continue;
        };

        raw.push(Record {
            station: station.to_string(),
            timestamp,
            direction_deg,
            speed_mps,
            height_m: i_height.and_then(|idx| row.get(idx)).and_then(parse_f64),
        });
    }
    if skipped > 0 {
        log::debug!("skipped {skipped} unparseable rows in {file:?}");
    }

    Ok(())
}

fn parse_timestamp(field: &str) -> Option<NaiveDateTime> {
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(field, fmt).ok())
}

fn parse_f64(field: &str) -> Option<f64> {
    field.parse().ok().filter(|val: &f64| val.is_finite())
}
