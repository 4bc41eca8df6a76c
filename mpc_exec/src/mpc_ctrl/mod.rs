//! # MPC trajectory-tracking controller module
//!
//! Given the current vehicle state and a lookahead reference trajectory,
//! this module formulates and solves a constrained optimisation problem over
//! a receding horizon, producing an acceleration and steering command. The
//! first optimised control action is the command applied to the vehicle; the
//! horizon then shifts forward one cycle and the problem is solved again.
//!
//! The nonlinear program (bicycle dynamics, state/input boxes, slack-relaxed
//! input-rate bounds) is solved by sequential quadratic programming: the
//! dynamics are linearised about the current iterate and the resulting QP is
//! handed to OSQP, repeating until the control step converges or the round
//! limit is hit. A failed QP never aborts the cycle: the last iterate is
//! returned as a best-effort command with the optimality flag cleared.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod constraints;
mod cost;
mod layout;
mod model;
mod params;
mod state;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
pub use layout::ProblemLayout;
pub use model::{NUM_CONTROLS, NUM_STATES};
pub use params::{Params, ParamsError};
pub use state::*;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors that can occur during MpcCtrl initialisation.
#[derive(Debug, thiserror::Error)]
pub enum MpcInitError {
    #[error("Failed to load the parameter file: {0}")]
    ParamLoadError(util::params::LoadError),

    #[error("Invalid parameters: {0}")]
    InvalidParams(#[from] ParamsError),

    #[error("Failed to set up the QP problem: {0:?}")]
    QpSetupError(osqp::SetupError),
}

/// Possible errors that can occur during MpcCtrl processing.
#[derive(Debug, thiserror::Error)]
pub enum MpcProcError {
    #[error("The controller has not been initialised")]
    NotInitialised,

    #[error("Expected reference vectors of length {expected}, found {found}")]
    MismatchedReferenceLength { expected: usize, found: usize },
}
