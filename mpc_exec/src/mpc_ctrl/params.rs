//! Parameters structure for MpcCtrl

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for the MPC trajectory-tracking controller.
///
/// These are fixed at controller construction and do not change per cycle.
#[derive(Debug, Deserialize)]
pub struct Params {
    // ---- HORIZON ----

    /// Number of future discrete time steps the optimiser plans over.
    pub n_horizon: usize,

    /// Duration of one horizon step.
    ///
    /// Units: seconds
    pub dt_s: f64,

    // ---- WEIGHTS ----

    /// Diagonal of the state-tracking weight matrix Q, over (x, y, heading,
    /// speed) error.
    pub q_weights: Vec<f64>,

    /// Diagonal of the control-smoothness weight matrix R, over
    /// (acceleration, steering) step-to-step change.
    pub r_weights: Vec<f64>,

    // ---- GEOMETRY ----

    /// Distance from the centre of gravity to the front axle.
    ///
    /// Units: meters
    pub l_f_m: f64,

    /// Distance from the centre of gravity to the rear axle.
    ///
    /// Units: meters
    pub l_r_m: f64,

    // ---- STATE BOUNDS ----

    /// Minimum body speed (lowest negative value allows reversing).
    ///
    /// Units: meters/second
    pub v_min_ms: f64,

    /// Maximum body speed.
    ///
    /// Units: meters/second
    pub v_max_ms: f64,

    // ---- INPUT BOUNDS ----

    /// Minimum acceleration.
    ///
    /// Units: meters/second^2
    pub a_min_ms2: f64,

    /// Maximum acceleration.
    ///
    /// Units: meters/second^2
    pub a_max_ms2: f64,

    /// Minimum steering angle.
    ///
    /// Units: radians
    pub df_min_rad: f64,

    /// Maximum steering angle.
    ///
    /// Units: radians
    pub df_max_rad: f64,

    // ---- INPUT RATE BOUNDS ----

    /// Minimum acceleration rate of change.
    ///
    /// Units: meters/second^3
    pub a_dot_min_ms3: f64,

    /// Maximum acceleration rate of change.
    ///
    /// Units: meters/second^3
    pub a_dot_max_ms3: f64,

    /// Minimum steering rate of change.
    ///
    /// Units: radians/second
    pub df_dot_min_rads: f64,

    /// Maximum steering rate of change.
    ///
    /// Units: radians/second
    pub df_dot_max_rads: f64,

    // ---- SOLVER ----

    /// Maximum number of linearise-and-solve rounds per cycle.
    pub sqp_max_iters: u32,

    /// Control step infinity-norm below which the solve is considered
    /// converged.
    pub sqp_conv_tol: f64,

    /// Iteration cap handed to the QP solver. Must be conservative enough
    /// for the solve to fit within the control cycle.
    pub qp_max_iters: u32,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors raised by parameter validation. These are configuration errors and
/// are fatal at construction time.
#[derive(Debug, thiserror::Error)]
pub enum ParamsError {
    #[error("The horizon length must be at least 1")]
    InvalidHorizon,

    #[error("The step size must be positive, got {0}")]
    InvalidStepSize(f64),

    #[error("Expected {expected} weights for {name}, found {found}")]
    MismatchedWeights {
        name: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("The {0} bounds are inverted (min > max)")]
    InvertedBounds(&'static str),

    #[error("Wheelbase lengths must be positive")]
    InvalidWheelbase,

    #[error("The solver iteration limits must be at least 1")]
    InvalidSolverLimits,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Params {
    /// Check the parameters for validity.
    pub fn validate(&self) -> Result<(), ParamsError> {
        if self.n_horizon == 0 {
            return Err(ParamsError::InvalidHorizon);
        }

        if self.dt_s <= 0.0 {
            return Err(ParamsError::InvalidStepSize(self.dt_s));
        }

        if self.q_weights.len() != 4 {
            return Err(ParamsError::MismatchedWeights {
                name: "q_weights",
                expected: 4,
                found: self.q_weights.len(),
            });
        }

        if self.r_weights.len() != 2 {
            return Err(ParamsError::MismatchedWeights {
                name: "r_weights",
                expected: 2,
                found: self.r_weights.len(),
            });
        }

        if self.l_f_m <= 0.0 || self.l_r_m <= 0.0 {
            return Err(ParamsError::InvalidWheelbase);
        }

        let bound_pairs = [
            ("speed", self.v_min_ms, self.v_max_ms),
            ("acceleration", self.a_min_ms2, self.a_max_ms2),
            ("steering", self.df_min_rad, self.df_max_rad),
            ("acceleration rate", self.a_dot_min_ms3, self.a_dot_max_ms3),
            ("steering rate", self.df_dot_min_rads, self.df_dot_max_rads),
        ];

        for &(name, min, max) in bound_pairs.iter() {
            if min > max {
                return Err(ParamsError::InvertedBounds(name));
            }
        }

        if self.sqp_max_iters == 0 || self.qp_max_iters == 0 {
            return Err(ParamsError::InvalidSolverLimits);
        }

        Ok(())
    }
}

impl Default for Params {
    fn default() -> Self {
        Self {
            n_horizon: 10,
            dt_s: 0.2,
            q_weights: vec![1.0, 1.0, 0.25, 0.25],
            r_weights: vec![5.0, 5.0],
            l_f_m: 0.66,
            l_r_m: 0.66,
            v_min_ms: -0.5,
            v_max_ms: 1.5,
            a_min_ms2: -1.0,
            a_max_ms2: 1.0,
            df_min_rad: -0.5236,
            df_max_rad: 0.5236,
            a_dot_min_ms3: -1.0,
            a_dot_max_ms3: 1.0,
            df_dot_min_rads: -0.5,
            df_dot_max_rads: 0.5,
            sqp_max_iters: 5,
            sqp_conv_tol: 1e-3,
            qp_max_iters: 4000,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_default_params_valid() {
        assert!(Params::default().validate().is_ok());
    }

    #[test]
    fn test_zero_horizon_rejected() {
        let params = Params {
            n_horizon: 0,
            ..Default::default()
        };

        assert!(matches!(
            params.validate(),
            Err(ParamsError::InvalidHorizon)
        ));
    }

    #[test]
    fn test_mismatched_weights_rejected() {
        let params = Params {
            q_weights: vec![1.0, 1.0],
            ..Default::default()
        };

        assert!(matches!(
            params.validate(),
            Err(ParamsError::MismatchedWeights { .. })
        ));
    }

    #[test]
    fn test_inverted_bounds_rejected() {
        let params = Params {
            a_min_ms2: 1.0,
            a_max_ms2: -1.0,
            ..Default::default()
        };

        assert!(matches!(
            params.validate(),
            Err(ParamsError::InvertedBounds(_))
        ));
    }
}
