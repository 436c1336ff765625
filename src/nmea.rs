//! RMC sentence parsing.
//!
//! Only the Recommended Minimum (RMC) sentence is turned into a candidate.
//! Every other well-formed sentence type is reported as unsupported so the
//! caller can tell "not for us" apart from "broken line".

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Sentence type this parser accepts.
pub const RMC: &str = "RMC";

/// Minimum number of data fields in an RMC sentence (NMEA 2.0 layout).
const RMC_MIN_FIELDS: usize = 11;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SentenceError {
    #[error("malformed sentence: {0}")]
    Malformed(String),

    #[error("checksum mismatch: computed {computed:02X}, sentence carries {found:02X}")]
    Checksum { computed: u8, found: u8 },

    #[error("unsupported sentence type: {0}")]
    Unsupported(String),
}

impl SentenceError {
    pub fn is_unsupported(&self) -> bool {
        matches!(self, SentenceError::Unsupported(_))
    }
}

fn malformed(msg: impl Into<String>) -> SentenceError {
    SentenceError::Malformed(msg.into())
}

/// RMC field 2: `A` = valid position, `V` = void
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionStatus {
    Valid,
    Invalid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MagneticVariationDirection {
    East,
    West,
}

/// FAA mode indicator (NMEA 2.3+)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModeIndicator {
    Autonomous,
    Differential,
    Estimated,
    FloatRtk,
    Manual,
    NotValid,
    Precise,
    Rtk,
    Simulator,
}

impl ModeIndicator {
    fn from_field(field: &str) -> Result<Option<Self>, SentenceError> {
        let mode = match field {
            "" => return Ok(None),
            "A" => ModeIndicator::Autonomous,
            "D" => ModeIndicator::Differential,
            "E" => ModeIndicator::Estimated,
            "F" => ModeIndicator::FloatRtk,
            "M" => ModeIndicator::Manual,
            "N" => ModeIndicator::NotValid,
            "P" => ModeIndicator::Precise,
            "R" => ModeIndicator::Rtk,
            "S" => ModeIndicator::Simulator,
            other => return Err(malformed(format!("unknown mode indicator '{}'", other))),
        };
        Ok(Some(mode))
    }
}

/// Navigational status (NMEA 4.1)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NavigationalStatus {
    Safe,
    Caution,
    Unsafe,
    NotValid,
}

impl NavigationalStatus {
    fn from_field(field: &str) -> Result<Option<Self>, SentenceError> {
        let status = match field {
            "" => return Ok(None),
            "S" => NavigationalStatus::Safe,
            "C" => NavigationalStatus::Caution,
            "U" => NavigationalStatus::Unsafe,
            "V" => NavigationalStatus::NotValid,
            other => return Err(malformed(format!("unknown navigational status '{}'", other))),
        };
        Ok(Some(status))
    }
}

/// One parsed RMC sentence, before any validity filtering.
///
/// Fields that were empty in the sentence are `None`. Whether a candidate is
/// usable is decided later by [`crate::filter`] and the trajectory builder.
#[derive(Debug, Clone, PartialEq)]
pub struct RmcSentence {
    pub talker: String,
    pub time: Option<NaiveTime>,
    pub status: PositionStatus,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub speed_knots: Option<f64>,
    pub true_course: Option<f64>,
    pub date: Option<NaiveDate>,
    pub magnetic_variation: Option<f64>,
    pub magnetic_variation_direction: Option<MagneticVariationDirection>,
    pub mode: Option<ModeIndicator>,
    pub nav_status: Option<NavigationalStatus>,
}

/// XOR of every byte between `$` and `*`
pub fn checksum(payload: &str) -> u8 {
    payload.bytes().fold(0u8, |acc, b| acc ^ b)
}

/// Parse one line of a log into an RMC candidate.
///
/// Surrounding whitespace (including `\r\n`) is ignored. A trailing
/// `*hh` checksum is verified when present; sentences without one are
/// accepted unchecked.
pub fn parse_sentence(line: &str) -> Result<RmcSentence, SentenceError> {
    let line = line.trim();
    let body = line
        .strip_prefix('$')
        .ok_or_else(|| malformed("missing '$' start delimiter"))?;

    let payload = match body.split_once('*') {
        Some((payload, found)) => {
            verify_checksum(payload, found)?;
            payload
        }
        None => body,
    };

    let mut fields = payload.split(',');
    let header = fields.next().unwrap_or_default();
    let (talker, kind) = split_header(header)?;
    if kind != RMC {
        return Err(SentenceError::Unsupported(header.to_string()));
    }

    let fields: Vec<&str> = fields.collect();
    if fields.len() < RMC_MIN_FIELDS {
        return Err(malformed(format!(
            "RMC needs at least {} fields, got {}",
            RMC_MIN_FIELDS,
            fields.len()
        )));
    }

    let status = match fields[1] {
        "A" => PositionStatus::Valid,
        "V" => PositionStatus::Invalid,
        other => return Err(malformed(format!("unknown position status '{}'", other))),
    };

    Ok(RmcSentence {
        talker: talker.to_string(),
        time: parse_time(fields[0])?,
        status,
        latitude: parse_coordinate(fields[2], fields[3], 'N', 'S')?,
        longitude: parse_coordinate(fields[4], fields[5], 'E', 'W')?,
        speed_knots: parse_optional_f64(fields[6], "speed over ground")?,
        true_course: parse_optional_f64(fields[7], "true course")?,
        date: parse_date(fields[8])?,
        magnetic_variation: parse_optional_f64(fields[9], "magnetic variation")?,
        magnetic_variation_direction: match fields[10] {
            "" => None,
            "E" => Some(MagneticVariationDirection::East),
            "W" => Some(MagneticVariationDirection::West),
            other => {
                return Err(malformed(format!(
                    "unknown magnetic variation direction '{}'",
                    other
                )))
            }
        },
        mode: ModeIndicator::from_field(fields.get(11).copied().unwrap_or(""))?,
        nav_status: NavigationalStatus::from_field(fields.get(12).copied().unwrap_or(""))?,
    })
}

fn verify_checksum(payload: &str, found: &str) -> Result<(), SentenceError> {
    let found = found.trim();
    if found.len() != 2 {
        return Err(malformed(format!("checksum '{}' is not two hex digits", found)));
    }
    let found = u8::from_str_radix(found, 16)
        .map_err(|_| malformed(format!("checksum '{}' is not two hex digits", found)))?;
    let computed = checksum(payload);
    if computed != found {
        return Err(SentenceError::Checksum { computed, found });
    }
    Ok(())
}

/// Split `GPRMC` into talker `GP` and type `RMC`. Proprietary `$P...`
/// sentences have no talker and are never RMC.
fn split_header(header: &str) -> Result<(&str, &str), SentenceError> {
    if header.starts_with('P') && header.len() > 1 {
        return Err(SentenceError::Unsupported(header.to_string()));
    }
    if header.len() != 5 || !header.bytes().all(|b| b.is_ascii_uppercase() || b.is_ascii_digit()) {
        return Err(malformed(format!("bad address field '{}'", header)));
    }
    Ok((&header[..2], &header[2..]))
}

fn leading_digits(field: &str, count: usize) -> bool {
    field.len() >= count && field.as_bytes()[..count].iter().all(u8::is_ascii_digit)
}

/// `hhmmss[.s...]` -> time of day, keeping up to microsecond precision
fn parse_time(field: &str) -> Result<Option<NaiveTime>, SentenceError> {
    if field.is_empty() {
        return Ok(None);
    }
    if !leading_digits(field, 6) {
        return Err(malformed(format!("bad UTC time '{}'", field)));
    }

    let bad_time = || malformed(format!("bad UTC time '{}'", field));
    let hours: u32 = field[0..2].parse().map_err(|_| bad_time())?;
    let minutes: u32 = field[2..4].parse().map_err(|_| bad_time())?;
    let seconds: u32 = field[4..6].parse().map_err(|_| bad_time())?;

    let micros = match &field[6..] {
        "" => 0,
        rest => {
            let digits = rest.strip_prefix('.').ok_or_else(bad_time)?;
            if !digits.bytes().all(|b| b.is_ascii_digit()) {
                return Err(bad_time());
            }
            // Pad or truncate the fraction to six digits.
            let mut padded: String = digits.chars().take(6).collect();
            while padded.len() < 6 {
                padded.push('0');
            }
            padded.parse::<u32>().map_err(|_| bad_time())?
        }
    };

    // A leap second is encoded by chrono as second 59 with an overflowing fraction.
    let time = if seconds == 60 {
        NaiveTime::from_hms_micro_opt(hours, minutes, 59, micros + 1_000_000)
    } else {
        NaiveTime::from_hms_micro_opt(hours, minutes, seconds, micros)
    };
    time.map(Some).ok_or_else(bad_time)
}

/// `ddmmyy` -> calendar date. Two-digit years 80-99 are 1980-1999, the rest 2000-2079.
fn parse_date(field: &str) -> Result<Option<NaiveDate>, SentenceError> {
    if field.is_empty() {
        return Ok(None);
    }
    let bad_date = || malformed(format!("bad date '{}'", field));
    if field.len() != 6 || !leading_digits(field, 6) {
        return Err(bad_date());
    }
    let day: u32 = field[0..2].parse().map_err(|_| bad_date())?;
    let month: u32 = field[2..4].parse().map_err(|_| bad_date())?;
    let yy: i32 = field[4..6].parse().map_err(|_| bad_date())?;
    let year = if yy >= 80 { 1900 + yy } else { 2000 + yy };

    NaiveDate::from_ymd_opt(year, month, day)
        .map(Some)
        .ok_or_else(bad_date)
}

/// `(d)ddmm.mmmm` plus hemisphere -> signed decimal degrees
fn parse_coordinate(
    value: &str,
    hemisphere: &str,
    positive: char,
    negative: char,
) -> Result<Option<f64>, SentenceError> {
    if value.is_empty() {
        return Ok(None);
    }
    let raw = parse_finite(value).ok_or_else(|| malformed(format!("bad coordinate '{}'", value)))?;

    let degrees = (raw / 100.0).trunc();
    let minutes = raw - degrees * 100.0;
    let decimal = degrees + minutes / 60.0;

    let mut hemi = hemisphere.chars();
    match (hemi.next(), hemi.next()) {
        (Some(c), None) if c == positive => Ok(Some(decimal)),
        (Some(c), None) if c == negative => Ok(Some(-decimal)),
        _ => Err(malformed(format!(
            "bad hemisphere '{}' for coordinate '{}'",
            hemisphere, value
        ))),
    }
}

fn parse_optional_f64(field: &str, what: &str) -> Result<Option<f64>, SentenceError> {
    if field.is_empty() {
        return Ok(None);
    }
    parse_finite(field)
        .map(Some)
        .ok_or_else(|| malformed(format!("bad {} '{}'", what, field)))
}

/// `str::parse` also accepts `NaN` and `inf`, which are not NMEA numbers.
fn parse_finite(field: &str) -> Option<f64> {
    field.parse::<f64>().ok().filter(|v| v.is_finite())
}
