use crate::nmea::{ModeIndicator, PositionStatus, RmcSentence};
use thiserror::Error;

/// Why a parsed candidate was not turned into a fix
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    #[error("position status is void")]
    InvalidPosition,

    #[error("mode indicator reports no fix")]
    NoFix,
}

/// Validity gate applied to every candidate, in order:
/// a void position status, then a "not valid" mode indicator.
///
/// Coordinates are not range-checked; a sentence flagged valid is trusted.
pub fn screen(candidate: &RmcSentence) -> Result<(), Rejection> {
    if candidate.status == PositionStatus::Invalid {
        return Err(Rejection::InvalidPosition);
    }
    if candidate.mode == Some(ModeIndicator::NotValid) {
        return Err(Rejection::NoFix);
    }
    Ok(())
}
