//! Unit conversions used across the pipeline.
//!
//! Every derived speed column is computed from the knots value through these
//! functions.

/// Metres per second in one knot.
pub const MPS_PER_KNOT: f64 = 0.514444;
/// Miles per hour in one metre per second.
pub const MPH_PER_MPS: f64 = 2.23694;
/// Kilometres in one statute mile.
pub const KM_PER_MILE: f64 = 1.609344;

/// knots -> m/s
pub fn knots_to_mps(knots: f64) -> f64 {
    knots * MPS_PER_KNOT
}

/// m/s -> mph
pub fn mps_to_mph(mps: f64) -> f64 {
    mps * MPH_PER_MPS
}

/// knots -> mph, going through m/s
pub fn knots_to_mph(knots: f64) -> f64 {
    mps_to_mph(knots_to_mps(knots))
}

/// km -> statute miles
pub fn km_to_mi(km: f64) -> f64 {
    km / KM_PER_MILE
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_knots_to_mps() {
        assert_relative_eq!(knots_to_mps(10.0), 5.14444, epsilon = 1e-12);
        assert_eq!(knots_to_mps(0.0), 0.0);
    }

    #[test]
    fn test_knots_to_mph_goes_through_mps() {
        let knots = 22.4;
        assert_relative_eq!(knots_to_mph(knots), knots * 0.514444 * 2.23694, epsilon = 1e-12);
    }

    #[test]
    fn test_km_to_mi() {
        assert_relative_eq!(km_to_mi(KM_PER_MILE), 1.0, epsilon = 1e-12);
        assert_relative_eq!(km_to_mi(123.4) * KM_PER_MILE, 123.4, epsilon = 1e-9);
    }
}
