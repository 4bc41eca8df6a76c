//! # Localisation Equipment Data
//!
//! Messages published by the localisation server. Unlike other equipment the
//! interface is defined here rather than on the server, as the server may not
//! be written in rust.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Data published by the localisation server.
#[derive(Debug, Serialize, Deserialize)]
pub enum LocData {
    Pose {
        /// The position in the LM frame
        position_m_lm: [f64; 3],

        /// The attitude of the vehicle in the LM frame. This is a quaternion
        /// (x, y, z, w) that will rotate an object from the LM frame into the
        /// vehicle body frame.
        attitude_q_lm: [f64; 4],

        /// The time at which this pose solution was produced
        timestamp: DateTime<Utc>
    }
}
