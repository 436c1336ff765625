//! NMEA RMC trip analysis: parse GPS logs into a time-ordered table of fixes,
//! then find sampling breaks, path length and speed statistics.

pub mod breaks;
pub mod config;
pub mod distance;
pub mod error;
pub mod filter;
pub mod ingest;
pub mod nmea;
pub mod report;
pub mod speed;
pub mod trajectory;
pub mod units;

pub use breaks::{detect_breaks, Break, BreakDetector, BreakKind, BreakSummary, SamplingStats};
pub use config::{AnalysisConfig, TimeWindow};
pub use distance::{
    geodesic_distance_km, haversine_distance_km, integrated_distance_km, percent_error,
    DistanceComparison, DistanceEstimator,
};
pub use error::{Result, TripError};
pub use ingest::{list_log_files, load_dir, load_file, load_files, LoadedLog, ParseStats};
pub use nmea::{parse_sentence, RmcSentence, SentenceError};
pub use report::{analyze, TripAnalysis, TripReport};
pub use speed::{average_moving_speed_knots, peak_speed};
pub use trajectory::{Fix, TrajectoryTable};
