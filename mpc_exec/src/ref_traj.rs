//! # Reference trajectory interpolation
//!
//! Converts the full reference path plus the current pose into the
//! fixed-length, fixed-spacing lookahead sequence the optimisation horizon
//! expects. The interpolator anchors at the path waypoint nearest the
//! vehicle and marches along the path polyline at a fixed separation,
//! extrapolating along the final segment if the path runs out.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::Vector2;
use serde::Serialize;

// Internal
use crate::loc::Pose;
use crate::path::Path;
use util::maths::{get_ang_dist_2pi, norm};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A lookahead reference trajectory aligned to the optimisation horizon.
///
/// All vectors have the same length, one entry per horizon step.
#[derive(Clone, Debug, Default, Serialize)]
pub struct ReferenceTrajectory {
    /// Reference x positions in the LM frame
    pub x_ref_m: Vec<f64>,

    /// Reference y positions in the LM frame
    pub y_ref_m: Vec<f64>,

    /// Reference headings. These are unwrapped relative to the vehicle's
    /// current heading, so consecutive entries never jump by 2 pi.
    pub psi_ref_rad: Vec<f64>,

    /// Reference speeds
    pub v_ref_ms: Vec<f64>,

    /// Along-path offset of each sample, measured from the start of the path.
    /// Strictly increasing.
    pub offset_m: Vec<f64>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors that can occur during reference interpolation.
#[derive(Debug, thiserror::Error)]
pub enum InterpError {
    /// The path contains no waypoints, so no nearest waypoint is defined and
    /// no reference is available. The caller must not attempt a solve with
    /// this path.
    #[error("Cannot interpolate an empty path, no reference available")]
    EmptyPath,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ReferenceTrajectory {
    pub fn len(&self) -> usize {
        self.x_ref_m.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x_ref_m.is_empty()
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Interpolate the reference path into a lookahead trajectory of exactly
/// `num_samples` entries, spaced `sep_m` apart along the path and anchored at
/// the waypoint nearest the current pose.
pub fn interpolate(
    path: &Path,
    pose: &Pose,
    num_samples: usize,
    sep_m: f64,
    target_speed_ms: f64,
) -> Result<ReferenceTrajectory, InterpError> {
    if path.is_empty() {
        return Err(InterpError::EmptyPath);
    }

    let nearest_index = nearest_waypoint_index(path, pose);

    // Cumulative along-path offset of every waypoint
    let mut waypoint_offsets_m = Vec::with_capacity(path.get_num_points());
    waypoint_offsets_m.push(0f64);
    for i in 1..path.get_num_points() {
        let seg_length_m = path.get_segment_to_target(i).unwrap().length_m;
        waypoint_offsets_m.push(waypoint_offsets_m[i - 1] + seg_length_m);
    }

    let anchor_offset_m = waypoint_offsets_m[nearest_index];

    let mut ref_traj = ReferenceTrajectory::default();

    // Headings are chained from the vehicle's current heading so that the
    // reference never wraps
    let mut prev_psi_rad = pose.get_heading();

    for k in 0..num_samples {
        let offset_m = anchor_offset_m + sep_m * k as f64;

        let (position_m, heading_rad) =
            sample_at_offset(path, &waypoint_offsets_m, offset_m, pose);

        let psi_rad = prev_psi_rad + get_ang_dist_2pi(prev_psi_rad, heading_rad);
        prev_psi_rad = psi_rad;

        ref_traj.x_ref_m.push(position_m[0]);
        ref_traj.y_ref_m.push(position_m[1]);
        ref_traj.psi_ref_rad.push(psi_rad);
        ref_traj.v_ref_ms.push(target_speed_ms);
        ref_traj.offset_m.push(offset_m);
    }

    Ok(ref_traj)
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Find the index of the path waypoint nearest (euclidian, 2D) to the current
/// pose. On ties the first such index wins.
fn nearest_waypoint_index(path: &Path, pose: &Pose) -> usize {
    let position_m = pose.position2();

    let mut nearest_index = 0;
    let mut nearest_dist_m = f64::INFINITY;

    for (i, point_m) in path.points_m.iter().enumerate() {
        // The unwrap here is safe since both points have two dimentions
        let dist_m = norm(point_m.as_slice(), position_m.as_slice()).unwrap();

        // Strict comparison keeps the first index on ties
        if dist_m < nearest_dist_m {
            nearest_dist_m = dist_m;
            nearest_index = i;
        }
    }

    nearest_index
}

/// Get the position and heading of the point at the given along-path offset.
///
/// Offsets beyond the end of the path extrapolate along the final segment's
/// direction. A single-point path has no direction of its own, so the
/// vehicle's current heading is used.
fn sample_at_offset(
    path: &Path,
    waypoint_offsets_m: &[f64],
    offset_m: f64,
    pose: &Pose,
) -> (Vector2<f64>, f64) {
    if path.get_num_points() < 2 {
        return (path.points_m[0], pose.get_heading());
    }

    // Find the segment containing the offset, defaulting to the last for
    // offsets beyond the path end
    let mut target_index = path.get_num_points() - 1;
    for i in 1..path.get_num_points() {
        if waypoint_offsets_m[i] >= offset_m {
            target_index = i;
            break;
        }
    }

    let segment = path.get_segment_to_target(target_index).unwrap();
    let dist_into_segment_m = offset_m - waypoint_offsets_m[target_index - 1];

    (
        segment.start_m + segment.direction * dist_into_segment_m,
        segment.heading_rad,
    )
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::path::Path;
    use nalgebra::{UnitQuaternion, Vector3};

    fn pose_at(x: f64, y: f64, heading_rad: f64) -> Pose {
        Pose {
            position_m_lm: Vector3::new(x, y, 0.0),
            attitude_q_lm: UnitQuaternion::from_euler_angles(0.0, 0.0, heading_rad),
        }
    }

    #[test]
    fn test_straight_path() {
        // 20 waypoints spaced 1 m along +x
        let path = Path::direct(Vector2::new(0.0, 0.0), Vector2::new(20.0, 0.0), 1.0);
        let pose = pose_at(0.2, 0.5, 0.0);

        let ref_traj = interpolate(&path, &pose, 10, 0.3, 1.0).unwrap();

        assert_eq!(ref_traj.len(), 10);

        for k in 0..10 {
            // Samples lie on the path, headed along it, at the target speed
            assert!(ref_traj.y_ref_m[k].abs() < 1e-9);
            assert!(ref_traj.psi_ref_rad[k].abs() < 1e-9);
            assert!((ref_traj.v_ref_ms[k] - 1.0).abs() < 1e-12);

            // Along-path offsets strictly increase
            if k > 0 {
                assert!(ref_traj.offset_m[k] > ref_traj.offset_m[k - 1]);
            }
        }
    }

    #[test]
    fn test_empty_path() {
        let path = Path::new_empty();
        let pose = pose_at(0.0, 0.0, 0.0);

        assert!(matches!(
            interpolate(&path, &pose, 10, 0.3, 1.0),
            Err(InterpError::EmptyPath)
        ));
    }

    #[test]
    fn test_nearest_anchor() {
        let path = Path::direct(Vector2::new(0.0, 0.0), Vector2::new(20.0, 0.0), 1.0);

        // Vehicle next to the waypoint at x = 5
        let pose = pose_at(5.2, 1.0, 0.0);
        let ref_traj = interpolate(&path, &pose, 5, 0.5, 1.0).unwrap();

        // First sample sits at the anchor waypoint
        assert!((ref_traj.x_ref_m[0] - 5.0).abs() < 1e-9);
        assert!((ref_traj.offset_m[0] - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_short_path_extrapolates() {
        // Path much shorter than the lookahead
        let path = Path {
            points_m: vec![Vector2::new(0.0, 0.0), Vector2::new(1.0, 0.0)],
        };
        let pose = pose_at(0.0, 0.0, 0.0);

        let ref_traj = interpolate(&path, &pose, 10, 0.5, 1.0).unwrap();

        assert_eq!(ref_traj.len(), 10);

        // Samples carry on along the final segment direction
        assert!((ref_traj.x_ref_m[9] - 4.5).abs() < 1e-9);
        assert!(ref_traj.y_ref_m[9].abs() < 1e-9);
    }

    #[test]
    fn test_heading_unwrap() {
        // Path pointing in -x, vehicle heading just under pi: the reference
        // heading must stay near the vehicle's heading rather than wrapping
        // to -pi
        let path = Path::direct(Vector2::new(0.0, 0.0), Vector2::new(-20.0, 0.0), 1.0);
        let pose = pose_at(0.0, 0.1, 3.0);

        let ref_traj = interpolate(&path, &pose, 5, 0.5, 1.0).unwrap();

        for k in 0..5 {
            assert!((ref_traj.psi_ref_rad[k] - std::f64::consts::PI).abs() < 0.2);
        }
    }
}
