use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset};
use clap::Parser;
use serde_json::json;
use std::path::PathBuf;

use nmea_trip_rs::config::parse_utc_offset;
use nmea_trip_rs::{analyze, load_dir, AnalysisConfig};

#[derive(Parser, Debug)]
#[command(name = "trip_analyzer")]
#[command(about = "Summarize a trip from a directory of NMEA RMC logs", long_about = None)]
struct Args {
    /// Directory of NMEA log files (.gz files are decompressed)
    #[arg(value_name = "DATA_DIR")]
    data_dir: PathBuf,

    /// JSON file with analysis settings; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Trip start, RFC 3339 (e.g. 2025-12-13T12:00:00-06:00)
    #[arg(long)]
    start: Option<String>,

    /// Trip end, RFC 3339
    #[arg(long)]
    end: Option<String>,

    /// Minimum speed (knots) counted as moving
    #[arg(long)]
    speed_threshold: Option<f64>,

    /// Minimum speed (m/s) counted by the speed-integration estimator
    #[arg(long)]
    integration_threshold: Option<f64>,

    /// Breaks longer than this many seconds are long
    #[arg(long)]
    long_break_secs: Option<f64>,

    /// |z| above which a sampling gap is a break
    #[arg(long)]
    z_threshold: Option<f64>,

    /// Offset for printed timestamps (e.g. -05:00)
    #[arg(long, allow_hyphen_values = true)]
    utc_offset: Option<String>,

    /// Print the report and break list as JSON
    #[arg(long, default_value_t = false)]
    json: bool,
}

fn parse_instant(flag: &str, text: &str) -> Result<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(text).with_context(|| format!("--{} '{}' is not RFC 3339", flag, text))
}

fn build_config(args: &Args) -> Result<AnalysisConfig> {
    let mut config = match args.config.as_ref() {
        Some(path) => AnalysisConfig::from_json_file(path)?,
        None => AnalysisConfig::default(),
    };

    if let Some(start) = args.start.as_deref() {
        config.window.start = Some(parse_instant("start", start)?);
    }
    if let Some(end) = args.end.as_deref() {
        config.window.end = Some(parse_instant("end", end)?);
    }
    if let Some(v) = args.speed_threshold {
        config.moving_speed_threshold_knots = v;
    }
    if let Some(v) = args.integration_threshold {
        config.integration_speed_threshold_mps = v;
    }
    if let Some(v) = args.long_break_secs {
        config.long_break_secs = v;
    }
    if let Some(v) = args.z_threshold {
        config.z_score_threshold = v;
    }
    if let Some(offset) = args.utc_offset.as_deref() {
        config.display_offset_minutes = parse_utc_offset(offset)?;
    }

    config.validate()?;
    Ok(config)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let config = build_config(&args)?;

    let log = load_dir(&args.data_dir)
        .with_context(|| format!("loading logs from {}", args.data_dir.display()))?;
    let analysis = analyze(log, &config)?;

    if args.json {
        let output = json!({
            "report": analysis.report,
            "breaks": analysis.breaks,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        print!("{}", analysis.report.display(config.display_offset()?));
    }
    Ok(())
}
