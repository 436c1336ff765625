use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::breaks::{BreakDetector, DEFAULT_LONG_BREAK_SECS, DEFAULT_Z_SCORE_THRESHOLD};
use crate::error::{Result, TripError};

/// Samples at or below this speed are treated as stationary noise when
/// averaging moving speed.
pub const DEFAULT_MOVING_SPEED_THRESHOLD_KNOTS: f64 = 0.001;
pub const DEFAULT_INTEGRATION_SPEED_THRESHOLD_MPS: f64 = 0.0;

/// Inclusive time range used to select the part of a log that belongs to a trip.
/// Either bound may be left open.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeWindow {
    pub start: Option<DateTime<FixedOffset>>,
    pub end: Option<DateTime<FixedOffset>>,
}

impl TimeWindow {
    pub fn new(start: Option<DateTime<FixedOffset>>, end: Option<DateTime<FixedOffset>>) -> Self {
        Self { start, end }
    }

    pub fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    pub fn contains(&self, instant: &DateTime<Utc>) -> bool {
        let after_start = self
            .start
            .map_or(true, |start| start.with_timezone(&Utc) <= *instant);
        let before_end = self
            .end
            .map_or(true, |end| *instant <= end.with_timezone(&Utc));
        after_start && before_end
    }
}

/// Analysis knobs. Every field has a default, so a JSON file only needs
/// the values it wants to change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub window: TimeWindow,
    /// Minimum speed (knots) for a row to count towards average moving speed
    pub moving_speed_threshold_knots: f64,
    /// Minimum speed (m/s) for an interval to count in the speed-integration estimator
    pub integration_speed_threshold_mps: f64,
    /// Breaks longer than this (seconds) are classified as long
    pub long_break_secs: f64,
    /// |z| above which a sampling gap is reported as a break
    pub z_score_threshold: f64,
    /// Offset applied to timestamps in the printed report, minutes east of UTC
    pub display_offset_minutes: i32,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            window: TimeWindow::default(),
            moving_speed_threshold_knots: DEFAULT_MOVING_SPEED_THRESHOLD_KNOTS,
            integration_speed_threshold_mps: DEFAULT_INTEGRATION_SPEED_THRESHOLD_MPS,
            long_break_secs: DEFAULT_LONG_BREAK_SECS,
            z_score_threshold: DEFAULT_Z_SCORE_THRESHOLD,
            display_offset_minutes: 0,
        }
    }
}

impl AnalysisConfig {
    /// Load from a JSON file; missing keys keep their defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| TripError::io(path, e))?;
        let config = Self::from_json_str(&text)?;
        log::debug!("Loaded analysis config from {}", path.display());
        Ok(config)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: AnalysisConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if let (Some(start), Some(end)) = (self.window.start, self.window.end) {
            if end < start {
                return Err(TripError::InvalidConfig(format!(
                    "time window ends ({}) before it starts ({})",
                    end.to_rfc3339(),
                    start.to_rfc3339()
                )));
            }
        }
        let non_negative = [
            ("moving_speed_threshold_knots", self.moving_speed_threshold_knots),
            ("integration_speed_threshold_mps", self.integration_speed_threshold_mps),
            ("long_break_secs", self.long_break_secs),
        ];
        for (name, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(TripError::InvalidConfig(format!(
                    "{} must be a non-negative number, got {}",
                    name, value
                )));
            }
        }
        if !self.z_score_threshold.is_finite() || self.z_score_threshold <= 0.0 {
            return Err(TripError::InvalidConfig(format!(
                "z_score_threshold must be positive, got {}",
                self.z_score_threshold
            )));
        }
        self.display_offset()?;
        Ok(())
    }

    pub fn break_detector(&self) -> BreakDetector {
        BreakDetector::new(self.z_score_threshold, self.long_break_secs)
    }

    pub fn display_offset(&self) -> Result<FixedOffset> {
        FixedOffset::east_opt(self.display_offset_minutes * 60).ok_or_else(|| {
            TripError::InvalidConfig(format!(
                "display offset of {} minutes is out of range",
                self.display_offset_minutes
            ))
        })
    }
}

/// Parse `+HH:MM`, `-HH:MM`, `+HHMM` or `Z` into minutes east of UTC.
pub fn parse_utc_offset(text: &str) -> Result<i32> {
    let bad = || TripError::InvalidConfig(format!("bad UTC offset '{}', expected e.g. -05:00", text));
    let text = text.trim();
    if text.eq_ignore_ascii_case("z") {
        return Ok(0);
    }
    let (sign, rest) = match text.chars().next() {
        Some('+') => (1, &text[1..]),
        Some('-') => (-1, &text[1..]),
        _ => return Err(bad()),
    };
    let digits: String = rest.chars().filter(|c| *c != ':').collect();
    if digits.len() != 4 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(bad());
    }
    let hours: i32 = digits[..2].parse().map_err(|_| bad())?;
    let minutes: i32 = digits[2..].parse().map_err(|_| bad())?;
    if hours > 23 || minutes > 59 {
        return Err(bad());
    }
    Ok(sign * (hours * 60 + minutes))
}
