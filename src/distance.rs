//! Total path length of a trip, three independent ways.
//!
//! The geodesic (WGS-84 ellipsoid) estimate is the reference. Haversine is
//! a cheaper spherical approximation, and speed integration ignores
//! positions entirely and integrates the logged ground speed over time.
//! Comparing the latter two against the reference gives a quick sanity
//! check on both the geometry and the sampling density.

use geo::{GeodesicDistance, HaversineDistance, Point};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::trajectory::{seconds_between, Fix, TrajectoryTable};

/// A path-length algorithm expressed as a per-segment distance.
pub trait DistanceEstimator {
    /// Row label in the printed report
    fn name(&self) -> &'static str;

    /// Distance in km contributed by the interval from `from` to `to`.
    fn segment_km(&self, from: &Fix, to: &Fix) -> f64;

    /// Sum of [`DistanceEstimator::segment_km`] over consecutive rows.
    /// The table must be sorted by time.
    fn total_km(&self, table: &TrajectoryTable) -> Result<f64> {
        table.ensure_sorted()?;
        Ok(table.pairs().map(|(from, to)| self.segment_km(from, to)).sum())
    }
}

fn point(fix: &Fix) -> Point<f64> {
    Point::new(fix.longitude, fix.latitude)
}

/// Shortest path on the WGS-84 ellipsoid
#[derive(Debug, Clone, Copy, Default)]
pub struct Geodesic;

impl DistanceEstimator for Geodesic {
    fn name(&self) -> &'static str {
        "Geodesic"
    }

    fn segment_km(&self, from: &Fix, to: &Fix) -> f64 {
        point(from).geodesic_distance(&point(to)) / 1000.0
    }
}

/// Great-circle distance on a sphere of mean Earth radius
#[derive(Debug, Clone, Copy, Default)]
pub struct Haversine;

impl DistanceEstimator for Haversine {
    fn name(&self) -> &'static str {
        "Haversine"
    }

    fn segment_km(&self, from: &Fix, to: &Fix) -> f64 {
        point(from).haversine_distance(&point(to)) / 1000.0
    }
}

/// Left-rectangle integration of ground speed over time.
///
/// Each interval contributes `dt * v` where `v` is the speed logged at the
/// start of the interval. Intervals starting at or below `min_speed_mps`
/// contribute nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpeedIntegration {
    pub min_speed_mps: f64,
}

impl SpeedIntegration {
    pub fn new(min_speed_mps: f64) -> Self {
        Self { min_speed_mps }
    }
}

impl DistanceEstimator for SpeedIntegration {
    fn name(&self) -> &'static str {
        "Integration"
    }

    fn segment_km(&self, from: &Fix, to: &Fix) -> f64 {
        if from.speed_mps > self.min_speed_mps {
            seconds_between(&from.timestamp, &to.timestamp) * from.speed_mps / 1000.0
        } else {
            0.0
        }
    }
}

pub fn geodesic_distance_km(table: &TrajectoryTable) -> Result<f64> {
    Geodesic.total_km(table)
}

pub fn haversine_distance_km(table: &TrajectoryTable) -> Result<f64> {
    Haversine.total_km(table)
}

pub fn integrated_distance_km(table: &TrajectoryTable, min_speed_mps: f64) -> Result<f64> {
    SpeedIntegration::new(min_speed_mps).total_km(table)
}

/// `|reference - estimate| / reference * 100`.
///
/// `None` when the reference is zero or not finite (e.g. a trip that never
/// moved), where the ratio has no meaning.
pub fn percent_error(reference: f64, estimate: f64) -> Option<f64> {
    if reference == 0.0 || !reference.is_finite() {
        return None;
    }
    Some((reference - estimate).abs() / reference * 100.0)
}

/// All three estimates side by side, with the two alternatives scored
/// against the geodesic reference.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistanceComparison {
    pub geodesic_km: f64,
    pub haversine_km: f64,
    pub integration_km: f64,
    pub haversine_error_pct: Option<f64>,
    pub integration_error_pct: Option<f64>,
}

impl DistanceComparison {
    pub fn compute(table: &TrajectoryTable, min_speed_mps: f64) -> Result<Self> {
        let geodesic_km = geodesic_distance_km(table)?;
        let haversine_km = haversine_distance_km(table)?;
        let integration_km = integrated_distance_km(table, min_speed_mps)?;

        if geodesic_km == 0.0 {
            log::warn!("Geodesic distance is zero; estimator errors are undefined");
        }

        Ok(Self {
            geodesic_km,
            haversine_km,
            integration_km,
            haversine_error_pct: percent_error(geodesic_km, haversine_km),
            integration_error_pct: percent_error(geodesic_km, integration_km),
        })
    }
}
