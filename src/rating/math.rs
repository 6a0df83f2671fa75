//! Glicko-2 scale conversions and statistical primitives
//!
//! Pure functions; the engine composes them into a full update step.

use std::f64::consts::PI;

/// Ratio between the display scale and the internal Glicko-2 scale
pub const GLICKO2_SCALE: f64 = 173.7178;

/// Display-scale rating at which the internal mean is zero
pub const SCALE_CENTER: f64 = 1500.0;

/// Convert a display rating to the internal `mu`
pub fn to_glicko_scale(rating: f64) -> f64 {
    (rating - SCALE_CENTER) / GLICKO2_SCALE
}

/// Convert an internal `mu` back to a display rating
pub fn from_glicko_scale(mu: f64) -> f64 {
    mu * GLICKO2_SCALE + SCALE_CENTER
}

/// Convert a rating deviation to the internal `phi`
pub fn rd_to_glicko_scale(rd: f64) -> f64 {
    rd / GLICKO2_SCALE
}

/// Convert an internal `phi` back to a rating deviation
pub fn rd_from_glicko_scale(phi: f64) -> f64 {
    phi * GLICKO2_SCALE
}

/// Attenuation of an opponent's impact by its uncertainty
pub fn g(phi: f64) -> f64 {
    1.0 / (1.0 + 3.0 * phi * phi / (PI * PI)).sqrt()
}

/// Probability that `mu` outscores an opponent at `mu_j` with deviation `phi_j`
pub fn expectation(mu: f64, mu_j: f64, phi_j: f64) -> f64 {
    1.0 / (1.0 + (-g(phi_j) * (mu - mu_j)).exp())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale_center_maps_to_zero() {
        assert_eq!(to_glicko_scale(1500.0), 0.0);
        assert_eq!(from_glicko_scale(0.0), 1500.0);
    }

    #[test]
    fn test_scale_round_trip() {
        for rating in [800.0, 1234.5, 1500.0, 2250.0, 3500.0] {
            let back = from_glicko_scale(to_glicko_scale(rating));
            assert!((back - rating).abs() < 1e-9);
        }
        for rd in [30.0, 50.0, 200.0, 350.0] {
            let back = rd_from_glicko_scale(rd_to_glicko_scale(rd));
            assert!((back - rd).abs() < 1e-9);
        }
    }

    #[test]
    fn test_glickman_reference_values() {
        // Worked example from Glickman's Glicko-2 paper
        assert!((to_glicko_scale(1400.0) - (-0.5756)).abs() < 1e-4);
        assert!((rd_to_glicko_scale(30.0) - 0.1727).abs() < 1e-4);
        assert!((g(0.1727) - 0.9955).abs() < 1e-4);
        assert!((expectation(0.0, -0.5756, 0.1727) - 0.639).abs() < 1e-3);
    }

    #[test]
    fn test_g_decreases_with_uncertainty() {
        assert_eq!(g(0.0), 1.0);
        assert!(g(0.5) < 1.0);
        assert!(g(2.0) < g(0.5));
    }

    #[test]
    fn test_expectation_symmetry() {
        let phi = rd_to_glicko_scale(50.0);
        assert!((expectation(0.0, 0.0, phi) - 0.5).abs() < 1e-12);

        let stronger = expectation(1.0, 0.0, phi);
        let weaker = expectation(0.0, 1.0, phi);
        assert!(stronger > 0.5);
        assert!((stronger + weaker - 1.0).abs() < 1e-12);
    }
}
