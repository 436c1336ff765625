use crate::trajectory::{Fix, TrajectoryTable};

/// Mean ground speed (knots) over rows moving strictly faster than
/// `min_speed_knots`.
///
/// `None` when no row qualifies, e.g. a trip that never left the driveway.
pub fn average_moving_speed_knots(table: &TrajectoryTable, min_speed_knots: f64) -> Option<f64> {
    let (sum, count) = table
        .iter()
        .map(|fix| fix.speed_knots)
        .filter(|&knots| knots > min_speed_knots)
        .fold((0.0, 0usize), |(sum, count), knots| (sum + knots, count + 1));

    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

/// Row with the highest ground speed; the earliest row wins ties.
pub fn peak_speed(table: &TrajectoryTable) -> Option<&Fix> {
    table
        .iter()
        .filter(|fix| !fix.speed_knots.is_nan())
        .fold(None, |best: Option<&Fix>, fix| match best {
            Some(b) if b.speed_knots >= fix.speed_knots => Some(b),
            _ => Some(fix),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::{Duration, TimeZone, Utc};

    fn table_with_speeds(speeds: &[f64]) -> TrajectoryTable {
        let t0 = Utc.with_ymd_and_hms(2025, 12, 13, 18, 0, 0).unwrap();
        speeds
            .iter()
            .enumerate()
            .map(|(i, &knots)| Fix::new(t0 + Duration::seconds(i as i64), 35.0, -90.0, knots))
            .collect()
    }

    #[test]
    fn test_average_excludes_stationary_rows() {
        let table = table_with_speeds(&[0.0, 0.0, 5.0, 10.0]);
        assert_relative_eq!(average_moving_speed_knots(&table, 0.001).unwrap(), 7.5);
    }

    #[test]
    fn test_threshold_is_strict() {
        let table = table_with_speeds(&[2.0, 4.0, 6.0]);
        assert_relative_eq!(average_moving_speed_knots(&table, 2.0).unwrap(), 5.0);
        assert_relative_eq!(average_moving_speed_knots(&table, 0.0).unwrap(), 4.0);
    }

    #[test]
    fn test_average_undefined_without_moving_rows() {
        assert_eq!(average_moving_speed_knots(&table_with_speeds(&[0.0, 0.0]), 0.0), None);
        assert_eq!(average_moving_speed_knots(&TrajectoryTable::default(), 0.0), None);
    }

    #[test]
    fn test_peak_speed_prefers_first_of_ties() {
        let table = table_with_speeds(&[3.0, 9.0, 1.0, 9.0]);
        let peak = peak_speed(&table).unwrap();
        assert_eq!(peak.timestamp, table[1].timestamp);
        assert!(peak_speed(&TrajectoryTable::default()).is_none());
    }
}
