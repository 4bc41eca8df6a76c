//! # MPC Executable Parameters
//!
//! This module provides parameters for the MPC executable.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Serialize, Deserialize)]
pub struct MpcExecParams {
    /// Network endpoint for the localisation data stream
    pub loc_endpoint: String,

    /// Network endpoint for the drive demands socket
    pub drive_dems_endpoint: String,

    /// Maximum time to wait for a pose message in one cycle.
    ///
    /// Units: milliseconds
    pub pose_recv_timeout_ms: i32,

    /// Age beyond which a pose solution is considered stale.
    ///
    /// Units: seconds
    pub pose_stale_age_s: f64,

    /// Target body speed carried by every reference sample.
    ///
    /// Units: meters/second
    pub target_speed_ms: f64,

    /// Hard limit on the commanded body speed.
    ///
    /// Units: meters/second
    pub max_speed_ms: f64,

    /// Separation of the synthetic lookahead samples along the path.
    ///
    /// Units: meters
    pub lookahead_sep_m: f64,

    /// Distance between the front and rear axles, used to convert the
    /// steering command into a turn rate.
    ///
    /// Units: meters
    pub wheelbase_m: f64,
}
