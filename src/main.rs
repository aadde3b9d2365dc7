use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rosewind::manager::Manager;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(version, about)]
struct CLI {
    #[arg(long)]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    Generate,

    Stats {
        #[arg(long)]
        station: Option<String>,
    },

    Fit {
        #[arg(long)]
        station: Option<String>,
    },

    Power {
        #[arg(long)]
        station: Option<String>,
    },

    Shear {
        #[arg(long)]
        station: String,
    },

    Report {
        #[arg(long)]
        station: String,
    },

    Plot {
        #[arg(long)]
        station: Option<String>,
    },

    Clean,
}

fn main() {
    env_logger::Builder::new()
        .format_timestamp_millis()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    if let Err(error) = run_cli() {
        log::error!("{error:#?}");
        std::process::exit(1);
    }
}

fn run_cli() -> Result<()> {
    let args = CLI::parse();
    log::info!("{args:#?}");

    let mgr = Manager::new(args.data_dir).context("failed to construct mgr")?;

    match args.command {
        Command::Generate => mgr.generate_measurements()?,
        Command::Stats { station } => mgr.compute_statistics(station.as_deref())?,
        Command::Fit { station } => mgr.fit_sectors(station.as_deref())?,
        Command::Power { station } => mgr.estimate_power(station.as_deref())?,
        Command::Shear { station } => mgr.analyze_shear(&station)?,
        Command::Report { station } => mgr.write_report(&station)?,
        Command::Plot { station } => mgr.plot_rose(station.as_deref())?,
        Command::Clean => mgr.clean_outputs()?,
    }

    Ok(())
}
