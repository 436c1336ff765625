//! Detection of anomalous gaps ("breaks") in the sampling cadence.
//!
//! A receiver that is powered on and has a fix logs at a steady rate, so
//! the gap between consecutive fixes is nearly constant. Power-off, signal
//! loss and stops show up as gaps far from that typical value. Gaps are
//! scored against the sample mean and standard deviation of all gaps in
//! the table, and anything more than `z_score_threshold` standard
//! deviations away is a break. The default of one sigma is loose on
//! purpose: it is meant for exploring a trip, not for a rigorous test.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::trajectory::TrajectoryTable;

pub const DEFAULT_Z_SCORE_THRESHOLD: f64 = 1.0;
pub const DEFAULT_LONG_BREAK_SECS: f64 = 3600.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BreakKind {
    Short,
    Long,
}

/// Anomalous gap between rows `index` and `index + 1` of a sorted table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Break {
    pub index: usize,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub duration_secs: f64,
    pub kind: BreakKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BreakDetector {
    pub z_score_threshold: f64,
    pub long_break_secs: f64,
}

impl Default for BreakDetector {
    fn default() -> Self {
        Self {
            z_score_threshold: DEFAULT_Z_SCORE_THRESHOLD,
            long_break_secs: DEFAULT_LONG_BREAK_SECS,
        }
    }
}

impl BreakDetector {
    pub fn new(z_score_threshold: f64, long_break_secs: f64) -> Self {
        Self {
            z_score_threshold,
            long_break_secs,
        }
    }

    /// Gaps strictly longer than `long_break_secs` are long, everything else
    /// short; a gap of exactly `long_break_secs` is short.
    pub fn classify(&self, duration_secs: f64) -> BreakKind {
        if duration_secs > self.long_break_secs {
            BreakKind::Long
        } else {
            BreakKind::Short
        }
    }

    /// Find breaks in a table sorted by time.
    ///
    /// Returns [`crate::error::TripError::OrderingViolation`] if any row is
    /// earlier than the row before it. Fewer than two gaps, or gaps with zero
    /// spread, yield no breaks.
    pub fn detect(&self, table: &TrajectoryTable) -> Result<Vec<Break>> {
        let deltas = table.time_deltas_secs()?;

        // The N-1 standard deviation needs at least two samples.
        if deltas.len() < 2 {
            log::debug!("{} sampling gaps, too few to score", deltas.len());
            return Ok(Vec::new());
        }

        // Identical gaps can still leave a rounding-level spread (0.1 s steps
        // average to 0.0999...), which would give every gap the same |z| < 1.
        if deltas.iter().all(|&d| d == deltas[0]) {
            log::debug!("Uniform sampling ({}s), no breaks", deltas[0]);
            return Ok(Vec::new());
        }

        let mean = mean(&deltas);
        let std_dev = sample_std_dev(&deltas, mean);
        if !(std_dev.is_finite() && std_dev > f64::EPSILON * mean.abs()) {
            log::debug!("Uniform sampling (std dev {}), no breaks", std_dev);
            return Ok(Vec::new());
        }

        let breaks: Vec<Break> = deltas
            .iter()
            .enumerate()
            .filter(|&(_, &delta)| ((delta - mean) / std_dev).abs() > self.z_score_threshold)
            .map(|(i, &delta)| Break {
                index: i,
                start: table[i].timestamp,
                end: table[i + 1].timestamp,
                duration_secs: delta,
                kind: self.classify(delta),
            })
            .collect();

        log::info!(
            "Found {} breaks in {} sampling gaps (mean {:.2}s, std dev {:.2}s)",
            breaks.len(),
            deltas.len(),
            mean,
            std_dev
        );
        Ok(breaks)
    }
}

/// [`BreakDetector::detect`] with the default thresholds
pub fn detect_breaks(table: &TrajectoryTable) -> Result<Vec<Break>> {
    BreakDetector::default().detect(table)
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn sample_variance(values: &[f64], mean: f64) -> f64 {
    values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() as f64 - 1.0)
}

fn sample_std_dev(values: &[f64], mean: f64) -> f64 {
    sample_variance(values, mean).sqrt()
}

/// Descriptive statistics of the gaps between consecutive fixes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplingStats {
    pub count: usize,
    pub mean_secs: f64,
    pub median_secs: f64,
    pub variance: f64,
    pub std_dev_secs: f64,
}

impl SamplingStats {
    /// `None` for fewer than two gaps, where the sample variance is undefined.
    pub fn from_deltas(deltas: &[f64]) -> Option<Self> {
        if deltas.len() < 2 {
            return None;
        }
        let mean = mean(deltas);
        let variance = sample_variance(deltas, mean);

        let mut sorted = deltas.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let mid = sorted.len() / 2;
        let median = if sorted.len() % 2 == 0 {
            (sorted[mid - 1] + sorted[mid]) / 2.0
        } else {
            sorted[mid]
        };

        Some(Self {
            count: deltas.len(),
            mean_secs: mean,
            median_secs: median,
            variance,
            std_dev_secs: variance.sqrt(),
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct KindSummary {
    pub count: usize,
    pub mean_secs: Option<f64>,
}

impl KindSummary {
    fn from_durations(durations: &[f64]) -> Self {
        Self {
            count: durations.len(),
            mean_secs: if durations.is_empty() {
                None
            } else {
                Some(mean(durations))
            },
        }
    }
}

/// Counts and mean durations of breaks, overall and per kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BreakSummary {
    pub total: KindSummary,
    pub short: KindSummary,
    pub long: KindSummary,
}

impl BreakSummary {
    pub fn from_breaks(breaks: &[Break]) -> Self {
        let durations_of = |kind: Option<BreakKind>| -> Vec<f64> {
            breaks
                .iter()
                .filter(|b| kind.map_or(true, |k| b.kind == k))
                .map(|b| b.duration_secs)
                .collect()
        };
        Self {
            total: KindSummary::from_durations(&durations_of(None)),
            short: KindSummary::from_durations(&durations_of(Some(BreakKind::Short))),
            long: KindSummary::from_durations(&durations_of(Some(BreakKind::Long))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TripError;
    use crate::trajectory::Fix;
    use approx::assert_relative_eq;
    use chrono::{Duration, TimeZone};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 12, 14, 3, 0, 0).unwrap() + Duration::seconds(secs)
    }

    fn table_with_deltas(deltas: &[i64]) -> TrajectoryTable {
        let mut t = 0;
        let mut fixes = vec![Fix::new(at(0), 36.0, -86.0, 50.0)];
        for d in deltas {
            t += d;
            fixes.push(Fix::new(at(t), 36.0, -86.0, 50.0));
        }
        TrajectoryTable::new(fixes)
    }

    #[test]
    fn test_empty_and_single_row_tables_have_no_breaks() {
        assert!(detect_breaks(&TrajectoryTable::default()).unwrap().is_empty());
        assert!(detect_breaks(&table_with_deltas(&[])).unwrap().is_empty());
    }

    #[test]
    fn test_single_gap_has_no_breaks() {
        assert!(detect_breaks(&table_with_deltas(&[3600])).unwrap().is_empty());
    }

    #[test]
    fn test_uniform_sampling_has_no_breaks() {
        let table = table_with_deltas(&[1; 50]);
        assert!(detect_breaks(&table).unwrap().is_empty());
    }

    #[test]
    fn test_uniform_subsecond_sampling_has_no_breaks() {
        let t0 = at(0);
        let table: TrajectoryTable = (0..11)
            .map(|i| Fix::new(t0 + Duration::milliseconds(100 * i), 36.0, -86.0, 50.0))
            .collect();
        let deltas = table.time_deltas_secs().unwrap();
        assert!(deltas.iter().all(|&d| d == deltas[0]));

        assert!(BreakDetector::new(0.5, 3600.0).detect(&table).unwrap().is_empty());
        assert!(BreakDetector::new(0.1, 3600.0).detect(&table).unwrap().is_empty());
    }

    #[test]
    fn test_large_gap_flagged_at_preceding_index() {
        let table = table_with_deltas(&[1, 1, 1, 1, 100]);
        let breaks = detect_breaks(&table).unwrap();

        assert_eq!(breaks.len(), 1);
        let b = &breaks[0];
        assert_eq!(b.index, 4);
        assert_eq!(b.start, table[4].timestamp);
        assert_eq!(b.end, table[5].timestamp);
        assert_relative_eq!(b.duration_secs, 100.0);
        assert_eq!(b.kind, BreakKind::Short);
    }

    #[test]
    fn test_out_of_order_rows_fail_loudly() {
        let table = TrajectoryTable::new(vec![
            Fix::new(at(10), 36.0, -86.0, 0.0),
            Fix::new(at(5), 36.0, -86.0, 0.0),
        ]);
        match detect_breaks(&table) {
            Err(TripError::OrderingViolation {
                index,
                previous,
                current,
            }) => {
                assert_eq!(index, 1);
                assert_eq!(previous, at(10));
                assert_eq!(current, at(5));
            }
            other => panic!("expected ordering violation, got {:?}", other),
        }
    }

    #[test]
    fn test_long_break_classification() {
        let mut deltas = vec![1; 20];
        deltas.push(7200);
        deltas.extend(vec![1; 20]);
        let breaks = detect_breaks(&table_with_deltas(&deltas)).unwrap();

        assert_eq!(breaks.len(), 1);
        assert_eq!(breaks[0].index, 20);
        assert_eq!(breaks[0].kind, BreakKind::Long);

        let detector = BreakDetector::default();
        assert_eq!(detector.classify(3600.0), BreakKind::Short);
        assert_eq!(detector.classify(3600.5), BreakKind::Long);
    }

    #[test]
    fn test_threshold_is_configurable() {
        // z of the 100 s gap is about 1.79
        let table = table_with_deltas(&[1, 1, 1, 1, 100]);
        assert_eq!(BreakDetector::new(1.5, 3600.0).detect(&table).unwrap().len(), 1);
        assert!(BreakDetector::new(2.0, 3600.0).detect(&table).unwrap().is_empty());
    }

    #[test]
    fn test_sampling_stats() {
        let stats = SamplingStats::from_deltas(&[1.0, 1.0, 1.0, 1.0, 100.0]).unwrap();
        assert_eq!(stats.count, 5);
        assert_relative_eq!(stats.mean_secs, 20.8, epsilon = 1e-12);
        assert_relative_eq!(stats.median_secs, 1.0);
        assert_relative_eq!(stats.variance, 1960.2, epsilon = 1e-9);
        assert_relative_eq!(stats.std_dev_secs, 1960.2f64.sqrt(), epsilon = 1e-9);

        let even = SamplingStats::from_deltas(&[4.0, 1.0, 3.0, 2.0]).unwrap();
        assert_relative_eq!(even.median_secs, 2.5);

        assert!(SamplingStats::from_deltas(&[5.0]).is_none());
    }

    #[test]
    fn test_break_summary() {
        let mk = |duration_secs: f64, kind| Break {
            index: 0,
            start: at(0),
            end: at(0),
            duration_secs,
            kind,
        };
        let summary = BreakSummary::from_breaks(&[
            mk(60.0, BreakKind::Short),
            mk(120.0, BreakKind::Short),
            mk(7200.0, BreakKind::Long),
        ]);
        assert_eq!(summary.total.count, 3);
        assert_relative_eq!(summary.total.mean_secs.unwrap(), 2460.0);
        assert_eq!(summary.short.count, 2);
        assert_relative_eq!(summary.short.mean_secs.unwrap(), 90.0);
        assert_eq!(summary.long.count, 1);

        let empty = BreakSummary::from_breaks(&[]);
        assert_eq!(empty.total.count, 0);
        assert_eq!(empty.long.mean_secs, None);
    }
}
