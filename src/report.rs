//! Whole-trip analysis: window, sort, break detection, distances and speeds,
//! gathered into one serializable report.

use chrono::{DateTime, FixedOffset, Utc};
use serde::Serialize;
use std::fmt;

use crate::breaks::{Break, BreakSummary, SamplingStats};
use crate::config::AnalysisConfig;
use crate::distance::{DistanceComparison, DistanceEstimator, Geodesic, Haversine, SpeedIntegration};
use crate::error::Result;
use crate::ingest::{LoadedLog, ParseStats};
use crate::speed::{average_moving_speed_knots, peak_speed};
use crate::trajectory::TrajectoryTable;
use crate::units::{km_to_mi, knots_to_mph};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeakSpeed {
    pub timestamp: DateTime<Utc>,
    pub speed_mph: f64,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TripReport {
    pub parse: ParseStats,
    /// Fixes left after time-window selection
    pub fix_count: usize,
    pub first_fix: Option<DateTime<Utc>>,
    pub last_fix: Option<DateTime<Utc>>,
    pub average_moving_speed_knots: Option<f64>,
    pub average_moving_speed_mph: Option<f64>,
    pub peak_speed: Option<PeakSpeed>,
    pub breaks: BreakSummary,
    pub sampling: Option<SamplingStats>,
    pub distance: DistanceComparison,
}

/// Sorted, windowed table plus everything derived from it
#[derive(Debug, Clone)]
pub struct TripAnalysis {
    pub table: TrajectoryTable,
    pub breaks: Vec<Break>,
    pub report: TripReport,
}

/// Run the full pipeline on a loaded log.
pub fn analyze(log: LoadedLog, config: &AnalysisConfig) -> Result<TripAnalysis> {
    config.validate()?;

    let loaded = log.table.len();
    let table = log.table.within_window(&config.window).sorted_by_time();
    if !config.window.is_unbounded() {
        log::info!("{} of {} fixes fall inside the time window", table.len(), loaded);
    }
    if table.is_empty() {
        log::warn!("No fixes to analyze");
    }

    let breaks = config.break_detector().detect(&table)?;
    let sampling = SamplingStats::from_deltas(&table.time_deltas_secs()?);
    let distance = DistanceComparison::compute(&table, config.integration_speed_threshold_mps)?;

    let average_knots = average_moving_speed_knots(&table, config.moving_speed_threshold_knots);
    let peak = peak_speed(&table).map(|fix| PeakSpeed {
        timestamp: fix.timestamp,
        speed_mph: fix.speed_mph,
        latitude: fix.latitude,
        longitude: fix.longitude,
    });

    let report = TripReport {
        parse: log.stats,
        fix_count: table.len(),
        first_fix: table.fixes().first().map(|f| f.timestamp),
        last_fix: table.fixes().last().map(|f| f.timestamp),
        average_moving_speed_knots: average_knots,
        average_moving_speed_mph: average_knots.map(knots_to_mph),
        peak_speed: peak,
        breaks: BreakSummary::from_breaks(&breaks),
        sampling,
        distance,
    };

    Ok(TripAnalysis {
        table,
        breaks,
        report,
    })
}

fn or_na(value: Option<f64>, format: impl Fn(f64) -> String) -> String {
    value.map(format).unwrap_or_else(|| "n/a".to_string())
}

fn format_time(ts: &DateTime<Utc>, offset: &FixedOffset) -> String {
    ts.with_timezone(offset).format("%Y-%m-%d %H:%M:%S %:z").to_string()
}

fn minutes(secs: Option<f64>) -> String {
    or_na(secs, |s| format!("{:.2} min", s / 60.0))
}

fn hours_minutes(secs: Option<f64>) -> String {
    or_na(secs, |s| {
        format!("{} Hours {:.2} min", (s / 3600.0).trunc() as i64, (s % 3600.0) / 60.0)
    })
}

fn km_and_mi(km: f64) -> String {
    format!("{:.2} km ({:.2} mi)", km, km_to_mi(km))
}

/// [`TripReport`] formatted for a terminal, see [`TripReport::display`]
pub struct ReportDisplay<'a> {
    report: &'a TripReport,
    offset: FixedOffset,
}

impl TripReport {
    /// Human-readable summary; timestamps are shown at `offset`.
    pub fn display(&self, offset: FixedOffset) -> ReportDisplay<'_> {
        ReportDisplay {
            report: self,
            offset,
        }
    }

    pub fn render(&self, offset: &FixedOffset) -> String {
        self.display(*offset).to_string()
    }
}

impl fmt::Display for ReportDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let r = self.report;
        let offset = &self.offset;
        let p = &r.parse;
        writeln!(f, "Input:")?;
        writeln!(f, "\tFiles:           \t{}", p.files)?;
        writeln!(f, "\tLines:           \t{}", p.lines)?;
        writeln!(f, "\tFixes Accepted:  \t{}", p.accepted)?;
        writeln!(
            f,
            "\tLines Skipped:   \t{} (malformed {}, unsupported {}, void {}, no fix {}, incomplete {})",
            p.skipped(),
            p.malformed,
            p.unsupported,
            p.invalid_position,
            p.no_fix,
            p.missing_fields
        )?;
        if p.read_errors > 0 {
            writeln!(f, "\tFiles Cut Short: \t{}", p.read_errors)?;
        }
        writeln!(f, "\tFixes In Window: \t{}", r.fix_count)?;
        if let (Some(first), Some(last)) = (&r.first_fix, &r.last_fix) {
            writeln!(f, "\tFirst Fix:       \t{}", format_time(first, offset))?;
            writeln!(f, "\tLast Fix:        \t{}", format_time(last, offset))?;
        }

        writeln!(f, "Average Moving Speed:")?;
        writeln!(
            f,
            "\t{}",
            or_na(r.average_moving_speed_mph, |mph| format!("{:.2} mph", mph))
        )?;

        writeln!(f, "Maximum Speed:")?;
        match &r.peak_speed {
            Some(peak) => {
                writeln!(f, "\tAt:         \t{}", format_time(&peak.timestamp, offset))?;
                writeln!(f, "\tSpeed:      \t{:.2} mph", peak.speed_mph)?;
                writeln!(f, "\tCoordinates:\t({}, {})", peak.latitude, peak.longitude)?;
            }
            None => writeln!(f, "\tn/a")?,
        }

        let b = &r.breaks;
        writeln!(f, "Break Data:")?;
        writeln!(f, "\tTotal Number of breaks:    \t{}", b.total.count)?;
        writeln!(f, "\tTotal Average Break Time:  \t{}", minutes(b.total.mean_secs))?;
        writeln!(f, "\t\tNumber of Short Breaks:  \t{}", b.short.count)?;
        writeln!(f, "\t\tAverage Short Break Time:\t{}", minutes(b.short.mean_secs))?;
        writeln!(f, "\t\tNumber of Long Breaks:   \t{}", b.long.count)?;
        writeln!(f, "\t\tAverage Long Break Time: \t{}", hours_minutes(b.long.mean_secs))?;

        let d = &r.distance;
        let pct = |v: Option<f64>| or_na(v, |e| format!("{:.2}%", e));
        writeln!(f, "Total Distance Traveled:")?;
        let rows: [(&dyn DistanceEstimator, f64, Option<Option<f64>>); 3] = [
            (&Geodesic, d.geodesic_km, None),
            (&Haversine, d.haversine_km, Some(d.haversine_error_pct)),
            (&SpeedIntegration::default(), d.integration_km, Some(d.integration_error_pct)),
        ];
        for (estimator, km, error) in rows {
            writeln!(f, "\t{:<18}\t{}", format!("{}:", estimator.name()), km_and_mi(km))?;
            if let Some(error) = error {
                writeln!(f, "\t{:<18}\t{}", format!("{} Error:", estimator.name()), pct(error))?;
            }
        }

        writeln!(f, "Sampling Data:")?;
        match &r.sampling {
            Some(s) => {
                writeln!(f, "\tIntervals:                           \t{}", s.count)?;
                writeln!(f, "\tMean Sampling Interval:              \t{:.2} s", s.mean_secs)?;
                writeln!(f, "\tMedian Sampling Interval:            \t{:.2} s", s.median_secs)?;
                writeln!(f, "\tSampling Interval Standard Deviation:\t{:.2} s", s.std_dev_secs)?;
                writeln!(f, "\tSampling Interval Variance:          \t{:.2}", s.variance)?;
            }
            None => writeln!(f, "\tn/a")?,
        }
        Ok(())
    }
}
