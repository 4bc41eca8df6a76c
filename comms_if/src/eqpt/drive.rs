//! # Drive Equipment Commands
//!
//! Demands sent from the controller to the drive server, which actuates the
//! vehicle's traction and steering motors.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Demands that are sent from the DriveClient to the DriveServer.
///
/// The demand is a body velocity, the drive server is responsible for
/// converting it into individual wheel rates.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default)]
pub struct DriveDems {
    /// The demanded linear speed of the vehicle body.
    ///
    /// Units: meters/second
    pub speed_ms: f64,

    /// The demanded turn rate of the vehicle body about its centre.
    ///
    /// Units: radians/second
    pub turn_rate_rads: f64
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Response from the drive server based on the demands sent by the client.
#[derive(Serialize, Deserialize, Debug)]
pub enum DriveDemsResponse {
    /// Demands were valid and will be executed
    DemsOk,

    /// Demands were invalid and have been rejected
    DemsInvalid,

    /// Equipment is invalid so demands cannot be actuated
    EqptInvalid
}
