use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use nmea_trip_rs::load_dir;

/// Dump accepted fixes as CSV for plotting on a map
#[derive(Parser, Debug)]
#[command(name = "track_points")]
struct Args {
    /// Directory of NMEA log files
    #[arg(value_name = "DATA_DIR")]
    data_dir: PathBuf,

    /// Sort rows by time instead of keeping file order
    #[arg(long, default_value_t = false)]
    sorted: bool,

    /// Add an RFC 3339 timestamp column
    #[arg(long, default_value_t = false)]
    timestamps: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();

    let log = load_dir(&args.data_dir)
        .with_context(|| format!("loading logs from {}", args.data_dir.display()))?;
    let table = if args.sorted {
        log.table.sorted_by_time()
    } else {
        log.table
    };

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    if args.timestamps {
        writeln!(out, "timestamp,latitude,longitude")?;
        for fix in &table {
            writeln!(out, "{},{},{}", fix.timestamp.to_rfc3339(), fix.latitude, fix.longitude)?;
        }
    } else {
        writeln!(out, "latitude,longitude")?;
        for (lat, lon) in table.points() {
            writeln!(out, "{},{}", lat, lon)?;
        }
    }
    out.flush()?;

    log::info!("Wrote {} points", table.len());
    Ok(())
}
