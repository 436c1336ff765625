use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::TimeWindow;
use crate::error::{Result, TripError};
use crate::nmea::{MagneticVariationDirection, ModeIndicator, NavigationalStatus, RmcSentence};
use crate::units::{knots_to_mph, knots_to_mps};

/// A required RMC field was empty in an otherwise valid sentence
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("sentence is missing its {0} field")]
pub struct MissingField(pub &'static str);

/// One validated GPS observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fix {
    pub timestamp: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    pub speed_knots: f64,
    pub speed_mps: f64,
    pub speed_mph: f64,
    pub true_course: Option<f64>,
    pub magnetic_variation: Option<f64>,
    pub magnetic_variation_direction: Option<MagneticVariationDirection>,
    pub mode: Option<ModeIndicator>,
    pub nav_status: Option<NavigationalStatus>,
}

impl Fix {
    /// Build a fix from the core fields; both derived speed columns are
    /// computed from `speed_knots`.
    pub fn new(timestamp: DateTime<Utc>, latitude: f64, longitude: f64, speed_knots: f64) -> Self {
        Fix {
            timestamp,
            latitude,
            longitude,
            speed_knots,
            speed_mps: knots_to_mps(speed_knots),
            speed_mph: knots_to_mph(speed_knots),
            true_course: None,
            magnetic_variation: None,
            magnetic_variation_direction: None,
            mode: None,
            nav_status: None,
        }
    }

    /// Project an accepted candidate into a fix.
    ///
    /// Date and time-of-day always come from the same sentence, so a fix
    /// logged at 23:59:59.9 and the next one at 00:00:00.1 land on
    /// consecutive days without any rollover bookkeeping.
    pub fn from_candidate(candidate: &RmcSentence) -> std::result::Result<Self, MissingField> {
        let date = candidate.date.ok_or(MissingField("date"))?;
        let time = candidate.time.ok_or(MissingField("UTC time"))?;
        let latitude = candidate.latitude.ok_or(MissingField("latitude"))?;
        let longitude = candidate.longitude.ok_or(MissingField("longitude"))?;
        let speed_knots = candidate.speed_knots.ok_or(MissingField("speed over ground"))?;

        let timestamp = NaiveDateTime::new(date, time).and_utc();

        Ok(Fix {
            true_course: candidate.true_course,
            magnetic_variation: candidate.magnetic_variation,
            magnetic_variation_direction: candidate.magnetic_variation_direction,
            mode: candidate.mode,
            nav_status: candidate.nav_status,
            ..Fix::new(timestamp, latitude, longitude, speed_knots)
        })
    }

    pub fn position(&self) -> (f64, f64) {
        (self.latitude, self.longitude)
    }
}

/// Signed seconds from `from` to `to`, microsecond resolution
pub fn seconds_between(from: &DateTime<Utc>, to: &DateTime<Utc>) -> f64 {
    let delta = to.signed_duration_since(*from);
    match delta.num_microseconds() {
        Some(us) => us as f64 / 1e6,
        None => delta.num_milliseconds() as f64 / 1e3,
    }
}

/// Table of fixes addressed by dense 0-based position.
///
/// Rows are unordered as loaded. Anything that depends on time deltas
/// must run on a table that went through [`TrajectoryTable::sort_by_time`];
/// those operations check the order and fail with
/// [`TripError::OrderingViolation`] instead of guessing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrajectoryTable {
    fixes: Vec<Fix>,
}

impl TrajectoryTable {
    pub fn new(fixes: Vec<Fix>) -> Self {
        TrajectoryTable { fixes }
    }

    pub fn len(&self) -> usize {
        self.fixes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fixes.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Fix> {
        self.fixes.get(index)
    }

    pub fn fixes(&self) -> &[Fix] {
        &self.fixes
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Fix> {
        self.fixes.iter()
    }

    /// Concatenate another table's rows after this one's. No ordering is implied.
    pub fn append(&mut self, other: TrajectoryTable) {
        self.fixes.extend(other.fixes);
    }

    /// Stable sort by timestamp; rows with equal timestamps keep their load order.
    pub fn sort_by_time(&mut self) {
        self.fixes.sort_by_key(|fix| fix.timestamp);
    }

    pub fn sorted_by_time(mut self) -> Self {
        self.sort_by_time();
        self
    }

    pub fn is_sorted_by_time(&self) -> bool {
        self.ensure_sorted().is_ok()
    }

    /// Fail on the first row whose timestamp is earlier than its predecessor's.
    pub fn ensure_sorted(&self) -> Result<()> {
        for (i, pair) in self.fixes.windows(2).enumerate() {
            if pair[1].timestamp < pair[0].timestamp {
                return Err(TripError::OrderingViolation {
                    index: i + 1,
                    previous: pair[0].timestamp,
                    current: pair[1].timestamp,
                });
            }
        }
        Ok(())
    }

    /// Seconds between each pair of adjacent rows. Entry `i` is the gap
    /// between rows `i` and `i + 1`.
    pub fn time_deltas_secs(&self) -> Result<Vec<f64>> {
        self.ensure_sorted()?;
        Ok(self
            .pairs()
            .map(|(prev, cur)| seconds_between(&prev.timestamp, &cur.timestamp))
            .collect())
    }

    /// Adjacent row pairs `(row i, row i + 1)`
    pub fn pairs(&self) -> impl Iterator<Item = (&Fix, &Fix)> + '_ {
        self.fixes.windows(2).map(|pair| (&pair[0], &pair[1]))
    }

    /// Rows whose timestamp falls inside `window` (inclusive), re-indexed from 0.
    pub fn within_window(&self, window: &TimeWindow) -> TrajectoryTable {
        self.fixes
            .iter()
            .filter(|fix| window.contains(&fix.timestamp))
            .cloned()
            .collect()
    }

    /// `(latitude, longitude)` pairs in row order, for map overlays
    pub fn points(&self) -> Vec<(f64, f64)> {
        self.fixes.iter().map(Fix::position).collect()
    }
}

impl FromIterator<Fix> for TrajectoryTable {
    fn from_iter<I: IntoIterator<Item = Fix>>(iter: I) -> Self {
        TrajectoryTable::new(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a TrajectoryTable {
    type Item = &'a Fix;
    type IntoIter = std::slice::Iter<'a, Fix>;

    fn into_iter(self) -> Self::IntoIter {
        self.fixes.iter()
    }
}

impl std::ops::Index<usize> for TrajectoryTable {
    type Output = Fix;

    fn index(&self, index: usize) -> &Fix {
        &self.fixes[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nmea::parse_sentence;
    use approx::assert_relative_eq;
    use chrono::{Duration, FixedOffset, NaiveDate, TimeZone};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 12, 13, 18, 0, 0).unwrap() + Duration::seconds(secs)
    }

    fn table_at(offsets: &[i64]) -> TrajectoryTable {
        offsets
            .iter()
            .enumerate()
            .map(|(i, &s)| Fix::new(at(s), 35.0 + i as f64 * 0.001, -90.0, 10.0))
            .collect()
    }

    #[test]
    fn test_derived_speed_columns() {
        for knots in [0.0, 0.5, 22.4, 65.0] {
            let fix = Fix::new(at(0), 0.0, 0.0, knots);
            assert_relative_eq!(fix.speed_mps, knots * 0.514444, epsilon = 1e-12);
            assert_relative_eq!(fix.speed_mph, knots * 0.514444 * 2.23694, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_from_candidate_merges_date_and_time() {
        let rmc = parse_sentence("$GPRMC,235959.500,A,3500.000,N,09000.000,W,1.0,,131225,,,A").unwrap();
        let fix = Fix::from_candidate(&rmc).unwrap();

        let expected = NaiveDate::from_ymd_opt(2025, 12, 13)
            .unwrap()
            .and_hms_micro_opt(23, 59, 59, 500_000)
            .unwrap()
            .and_utc();
        assert_eq!(fix.timestamp, expected);
        assert_eq!(fix.mode, Some(ModeIndicator::Autonomous));
        assert_relative_eq!(fix.longitude, -90.0);
    }

    #[test]
    fn test_from_candidate_rolls_over_midnight() {
        let before = parse_sentence("$GPRMC,235959.900,A,3500.000,N,09000.000,W,1.0,,131225,,").unwrap();
        let after = parse_sentence("$GPRMC,000000.100,A,3500.000,N,09000.000,W,1.0,,141225,,").unwrap();
        let before = Fix::from_candidate(&before).unwrap();
        let after = Fix::from_candidate(&after).unwrap();

        assert_relative_eq!(seconds_between(&before.timestamp, &after.timestamp), 0.2, epsilon = 1e-9);
    }

    #[test]
    fn test_from_candidate_requires_core_fields() {
        let rmc = parse_sentence("$GPRMC,120000,A,3500.000,N,09000.000,W,,,131225,,").unwrap();
        assert_eq!(
            Fix::from_candidate(&rmc),
            Err(MissingField("speed over ground"))
        );

        let rmc = parse_sentence("$GPRMC,120000,A,3500.000,N,09000.000,W,1.0,,,,").unwrap();
        assert_eq!(Fix::from_candidate(&rmc), Err(MissingField("date")));
    }

    #[test]
    fn test_sort_is_stable_and_idempotent() {
        let mut table = table_at(&[30, 10, 20, 10, 0]);
        table.sort_by_time();
        let once = table.clone();
        table.sort_by_time();

        assert_eq!(table, once);
        assert!(table.is_sorted_by_time());
        let times: Vec<_> = table.iter().map(|f| f.timestamp).collect();
        assert_eq!(times, vec![at(0), at(10), at(10), at(20), at(30)]);
        // equal timestamps keep load order (rows 1 and 3 of the input)
        assert_relative_eq!(table[1].latitude, 35.001, epsilon = 1e-9);
        assert_relative_eq!(table[2].latitude, 35.003, epsilon = 1e-9);
    }

    #[test]
    fn test_ensure_sorted_reports_offending_rows() {
        let table = table_at(&[0, 5, 0]);
        match table.ensure_sorted() {
            Err(TripError::OrderingViolation {
                index,
                previous,
                current,
            }) => {
                assert_eq!(index, 2);
                assert_eq!(previous, at(5));
                assert_eq!(current, at(0));
            }
            other => panic!("expected ordering violation, got {:?}", other),
        }
        assert!(table.time_deltas_secs().is_err());
    }

    #[test]
    fn test_time_deltas() {
        let deltas = table_at(&[0, 1, 3, 3]).time_deltas_secs().unwrap();
        assert_eq!(deltas, vec![1.0, 2.0, 0.0]);
        assert!(table_at(&[]).time_deltas_secs().unwrap().is_empty());
        assert!(table_at(&[7]).time_deltas_secs().unwrap().is_empty());
    }

    #[test]
    fn test_window_selection_reindexes() {
        let table = table_at(&[0, 10, 20, 30, 40]);
        let cst = FixedOffset::west_opt(6 * 3600).unwrap();
        let window = TimeWindow::new(
            Some(at(10).with_timezone(&cst)),
            Some(at(30).with_timezone(&cst)),
        );
        let selected = table.within_window(&window);

        assert_eq!(selected.len(), 3);
        assert_eq!(selected[0].timestamp, at(10));
        assert_eq!(selected[2].timestamp, at(30));
        assert!(selected.get(3).is_none());
    }

    #[test]
    fn test_points_are_lat_lon() {
        let table: TrajectoryTable = vec![
            Fix::new(at(0), 35.5, -90.25, 0.0),
            Fix::new(at(1), -12.0, 45.0, 0.0),
        ]
        .into_iter()
        .collect();
        assert_eq!(table.points(), vec![(35.5, -90.25), (-12.0, 45.0)]);
    }
}
