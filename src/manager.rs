use crate::analyzer::Analyzer;
use crate::config::Config;
use crate::dataset::Dataset;
use crate::plot;
use crate::report;
use crate::sector::FitKey;
use crate::synth::Generator;
use anyhow::{Context, Result, bail};
use glob::glob;
use std::{
    fs,
    path::{Path, PathBuf},
};

pub struct Manager {
    data_dir: PathBuf,
    cfg: Config,
}

impl Manager {
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Result<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {data_dir:?}"))?;

        let cfg =
            Config::load(data_dir.join("analysis.toml")).context("failed to construct cfg")?;
        log::info!("{cfg:#?}");

        Ok(Self { data_dir, cfg })
    }

    pub fn generate_measurements(&self) -> Result<()> {
        let mut generator =
            Generator::new(self.cfg.synth.clone()).context("failed to construct generator")?;

        let file = self.data_dir.join("measurements.csv");
        generator
            .write_csv(&file, &self.cfg.shear_heights)
            .context("failed to generate measurements")?;
        log::info!("wrote {file:?}");

        Ok(())
    }

    pub fn compute_statistics(&self, station: Option<&str>) -> Result<()> {
        let analyzer = self.load_analyzer()?;
        let stats = analyzer.statistics(station);
        log::info!("{stats:#?}");

        let file = self.stats_file(station);
        write_json(&file, &stats)?;
        log::info!("wrote {file:?}");

        Ok(())
    }

    pub fn fit_sectors(&self, station: Option<&str>) -> Result<()> {
        let mut analyzer = self.load_analyzer()?;
        let key = FitKey::from_station(station);

        // Carry over fits persisted for other keys; only this key is rewritten.
        let fits_file = self.fits_file();
        if fits_file.exists() {
            analyzer
                .load_fits(&fits_file)
                .with_context(|| format!("failed to load {fits_file:?}"))?;
        }

        let fits = analyzer.fit_sectors(&key, self.cfg.sector_count);
        for (idx, fit) in fits {
            log::info!(
                "sector {idx}: k = {:.3}, c = {:.3} m/s, frequency = {:.3}",
                fit.shape,
                fit.scale,
                fit.frequency
            );
        }

        analyzer
            .save_fits(&fits_file)
            .context("failed to save fits")?;
        log::info!("wrote {fits_file:?}");

        Ok(())
    }

    pub fn estimate_power(&self, station: Option<&str>) -> Result<()> {
        let mut analyzer = self.load_analyzer()?;
        let key = FitKey::from_station(station);

        // Fit first, estimate second; reuse persisted fits when they exist.
        let fits_file = self.fits_file();
        if fits_file.exists() {
            analyzer
                .load_fits(&fits_file)
                .with_context(|| format!("failed to load {fits_file:?}"))?;
        }
        if analyzer.cached_fit(&key).is_none() {
            analyzer.fit_sectors(&key, self.cfg.sector_count);
        }

        let power = analyzer
            .estimate_power(&key, self.cfg.air_density)
            .context("failed to estimate power")?;
        log::info!("mean wind power density for {key}: {power:.1} W/m^2");

        Ok(())
    }

    pub fn analyze_shear(&self, station: &str) -> Result<()> {
        let analyzer = self.load_analyzer()?;
        let result = analyzer.analyze_shear(station, &self.cfg.shear_heights);
        log::info!("{result:#?}");

        let file = self.data_dir.join(format!("shear-{station}.json"));
        write_json(&file, &result)?;
        log::info!("wrote {file:?}");

        Ok(())
    }

    pub fn write_report(&self, station: &str) -> Result<()> {
        let mut analyzer = self.load_analyzer()?;
        analyzer
            .ensure_station(station)
            .context("cannot report on station")?;

        let key = FitKey::Station(station.to_string());
        let stats = analyzer.statistics(Some(station));
        analyzer.fit_sectors(&key, self.cfg.sector_count);
        let power = analyzer
            .estimate_power(&key, self.cfg.air_density)
            .context("failed to estimate power")?;

        let fits = analyzer
            .cached_fit(&key)
            .context("fit missing after fitting")?;
        let text = report::compose(station, &stats, fits, power, self.cfg.sector_count)
            .context("failed to compose report")?;

        let file = self.data_dir.join(format!("report-{station}.txt"));
        fs::write(&file, text).with_context(|| format!("failed to write {file:?}"))?;
        log::info!("wrote {file:?}");

        Ok(())
    }

    pub fn plot_rose(&self, station: Option<&str>) -> Result<()> {
        let analyzer = self.load_analyzer()?;
        let rose = analyzer.rose_data(station, self.cfg.sector_count);

        let key = FitKey::from_station(station);
        let file = self.data_dir.join(format!("rose-{key}.png"));
        plot::render_rose(&rose, &file).context("failed to render rose")?;
        log::info!("wrote {file:?}");

        Ok(())
    }

    /// Remove generated outputs; measurements and config stay.
    pub fn clean_outputs(&self) -> Result<()> {
        for pattern in ["stats-*.json", "shear-*.json", "report-*.txt", "rose-*.png"] {
            let pattern = self.data_dir.join(pattern);
            let pattern = pattern.to_str().context("pattern is not valid UTF-8")?;
            for file in glob(pattern)
                .context("failed to glob outputs")?
                .filter_map(Result::ok)
            {
                fs::remove_file(&file).with_context(|| format!("failed to remove {file:?}"))?;
                log::info!("removed {file:?}");
            }
        }

        let fits_file = self.fits_file();
        if fits_file.exists() {
            fs::remove_file(&fits_file)
                .with_context(|| format!("failed to remove {fits_file:?}"))?;
            log::info!("removed {fits_file:?}");
        }

        Ok(())
    }

    fn load_analyzer(&self) -> Result<Analyzer> {
        let pattern = self.data_dir.join("*.csv");
        let pattern = pattern.to_str().context("pattern is not valid UTF-8")?;

        let mut files: Vec<PathBuf> = glob(pattern)
            .context("failed to glob measurement files")?
            .filter_map(Result::ok)
            .collect();
        files.sort();
        if files.is_empty() {
            bail!("no measurement files in {:?}", self.data_dir);
        }

        let dataset = Dataset::from_csv_files(&files).context("failed to load dataset")?;
        if dataset.records().is_empty() {
            bail!("no valid records in {:?}", self.data_dir);
        }
        log::info!(
            "loaded {} records from {} files (stations: {:?})",
            dataset.records().len(),
            files.len(),
            dataset.stations()
        );

        Ok(Analyzer::new(dataset))
    }

    fn stats_file(&self, station: Option<&str>) -> PathBuf {
        let key = FitKey::from_station(station);
        self.data_dir.join(format!("stats-{key}.json"))
    }

    fn fits_file(&self) -> PathBuf {
        self.data_dir.join("fits.msgpack")
    }
}

fn write_json<T: serde::Serialize>(file: &Path, value: &T) -> Result<()> {
    let contents =
        serde_json::to_string_pretty(value).context("failed to serialize results")?;
    fs::write(file, contents).with_context(|| format!("failed to write {file:?}"))?;
    Ok(())
}
