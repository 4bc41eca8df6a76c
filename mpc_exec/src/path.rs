//! # Path
//!
//! This module defines the reference path consumed by the trajectory
//! controller: an ordered sequence of 2D waypoints in the LM frame.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A path defining the desired trajectory of the vehicle.
#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct Path {
    pub points_m: Vec<Vector2<f64>>,
}

/// A segment between two path points
#[derive(Default, Serialize, Deserialize)]
pub struct PathSegment {
    /// The target of the segment
    pub target_m: Vector2<f64>,

    /// The start point of the segment
    pub start_m: Vector2<f64>,

    /// The length of the segment
    pub length_m: f64,

    /// The heading (angle to the +ve x axis) of the segment
    pub heading_rad: f64,

    /// Unit vector pointing in the direction of the segment
    pub direction: Vector2<f64>,
}

// -----------------------------------------------------------------------------------------------
// ENUMS
// -----------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum PathError {
    #[error("Cannot load the path file: {0}")]
    FileLoadError(std::io::Error),

    #[error("Cannot parse the path file: {0}")]
    DeserialiseError(serde_json::Error),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Path {
    /// Create a new empty path
    pub fn new_empty() -> Self {
        Path {
            points_m: Vec::new(),
        }
    }

    /// Produces a direct path between the two position vectors, with each point in the path having
    /// at most the given separation.
    pub fn direct(from: Vector2<f64>, to: Vector2<f64>, point_sep_m: f64) -> Self {
        let diff_vec = to - from;
        let dist = diff_vec.norm();

        // If the points are closer than the separation just produce a new path with the from and
        // to being the only points.
        if dist <= point_sep_m {
            Path {
                points_m: vec![from, to],
            }
        } else {
            // Get the number of points needed to get regular spacing of the given separation,
            // noting that we should floor this so we don't end up with the last two points being
            // more than the separation apart
            let num_points = (dist / point_sep_m).floor() as usize;

            // Get the delta vector that we can add to the previous step at each new point, i.e.
            // the difference vector but of length point_sep_m.
            let delta = point_sep_m / dist * diff_vec;

            let mut path = Self {
                points_m: vec![from],
            };

            for i in 1..num_points {
                path.points_m.push(path.points_m[i - 1] + delta);
            }

            path
        }
    }

    /// Load a path from a JSON file.
    pub fn from_file(file_path: &str) -> Result<Self, PathError> {
        let path_str = std::fs::read_to_string(file_path).map_err(PathError::FileLoadError)?;

        serde_json::from_str(path_str.as_str()).map_err(PathError::DeserialiseError)
    }

    /// Returns the path segment connecting the target point and the previous
    /// point.
    ///
    /// If no segment exists (the target is the first point in the sequence or
    /// is beyond the end of the sequence) then `None` will be returned
    pub fn get_segment_to_target(&self, target_index: usize) -> Option<PathSegment> {
        // If the path is invalid (not enough points)
        if self.points_m.len() < 2 {
            return None;
        }

        // Catch invalid targets
        if target_index == 0 || target_index >= self.points_m.len() {
            return None;
        }

        let mut seg = PathSegment::default();

        seg.target_m = self.points_m[target_index];
        seg.start_m = self.points_m[target_index - 1];

        seg.length_m = (seg.target_m - seg.start_m).norm();

        let dx = seg.target_m[0] - seg.start_m[0];
        let dy = seg.target_m[1] - seg.start_m[1];

        // The heading is the angle of the segment to the +x axis
        seg.heading_rad = dy.atan2(dx);

        // Direction vector is [dx, dy] normalized by the length
        seg.direction = Vector2::new(dx / seg.length_m, dy / seg.length_m);

        Some(seg)
    }

    /// Return the length of the path in meters.
    ///
    /// If the path is empty (not enough points) then `None` is returned.
    pub fn get_length(&self) -> Option<f64> {
        if self.points_m.len() < 2 {
            return None;
        }

        let mut length_m = 0f64;

        // Length is defined as the sum of the length of all path segments
        for i in 1..self.points_m.len() {
            length_m += self.get_segment_to_target(i).unwrap().length_m;
        }

        Some(length_m)
    }

    /// Get the number of points in the path
    pub fn get_num_points(&self) -> usize {
        self.points_m.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points_m.len() == 0
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_direct() {
        let path = Path::direct(Vector2::new(0.0, 0.0), Vector2::new(10.0, 0.0), 0.5);

        // Every segment should be no longer than the separation
        for i in 1..path.get_num_points() {
            let seg = path.get_segment_to_target(i).unwrap();
            assert!(seg.length_m <= 0.5 + 1e-9);
        }

        // Total length shouldn't exceed the distance between the endpoints
        assert!(path.get_length().unwrap() <= 10.0 + 1e-9);
    }

    #[test]
    fn test_segment_geometry() {
        let path = Path {
            points_m: vec![
                Vector2::new(0.0, 0.0),
                Vector2::new(1.0, 1.0),
                Vector2::new(1.0, 2.0),
            ],
        };

        let seg = path.get_segment_to_target(1).unwrap();
        assert!((seg.length_m - 2f64.sqrt()).abs() < 1e-12);
        assert!((seg.heading_rad - std::f64::consts::FRAC_PI_4).abs() < 1e-12);

        let seg = path.get_segment_to_target(2).unwrap();
        assert!((seg.heading_rad - std::f64::consts::FRAC_PI_2).abs() < 1e-12);

        // No segment to the first point or past the end
        assert!(path.get_segment_to_target(0).is_none());
        assert!(path.get_segment_to_target(3).is_none());
    }

    #[test]
    fn test_empty() {
        let path = Path::new_empty();
        assert!(path.is_empty());
        assert!(path.get_length().is_none());
    }
}
