//! # Localisation types
//!
//! The controller consumes pose solutions produced by an external
//! localisation system, expressed in the fixed Local Map (LM) frame.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::{Quaternion, UnitQuaternion, Vector2, Vector3};
use serde::{Deserialize, Serialize};

// Internal
use comms_if::eqpt::LocData;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The current pose (position and attitude in the LM frame) of the vehicle.
///
/// More specifically this represents the Vehicle Body (VB) frame in the Local
/// Map (LM) frame.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, Default)]
pub struct Pose {
    /// The position in the LM frame
    pub position_m_lm: Vector3<f64>,

    /// The attitude of the vehicle in the LM frame. This is a quaternion that
    /// will rotate an object from the LM frame into the VB frame.
    pub attitude_q_lm: UnitQuaternion<f64>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Pose {
    /// Return the heading (angle to the positive LM_X axis) of the vehicle in
    /// radians.
    ///
    /// Heading is given in the range [-pi, pi], with 0 being in the LM_X
    /// direction.
    pub fn get_heading(&self) -> f64 {
        self.attitude_q_lm.euler_angles().2
    }

    /// Return the position of the vehicle in the LM_XY plane.
    pub fn position2(&self) -> Vector2<f64> {
        Vector2::new(self.position_m_lm[0], self.position_m_lm[1])
    }

    /// Build a pose from a localisation server message.
    pub fn from_loc_data(data: &LocData) -> Self {
        match data {
            LocData::Pose {
                position_m_lm,
                attitude_q_lm,
                ..
            } => Self {
                position_m_lm: Vector3::new(
                    position_m_lm[0],
                    position_m_lm[1],
                    position_m_lm[2],
                ),
                attitude_q_lm: UnitQuaternion::from_quaternion(Quaternion::new(
                    attitude_q_lm[3],
                    attitude_q_lm[0],
                    attitude_q_lm[1],
                    attitude_q_lm[2],
                )),
            },
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn test_get_heading() {
        let pose = Pose {
            position_m_lm: Vector3::default(),
            attitude_q_lm: UnitQuaternion::from_euler_angles(0.0, 0.0, PI / 4.0),
        };

        assert!((pose.get_heading() - PI / 4.0).abs() < 1e-12);
    }
}
