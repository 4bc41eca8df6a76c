//! Kinematic bicycle model
//!
//! Single-track model with the reference point on the rear axle. The state
//! is (x, y, heading, speed), the control is (acceleration, steering angle).
//! Steering induces a body slip angle `beta`, and the state evolves under a
//! forward-Euler discretisation with step `dt_s`.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::{Matrix4, Matrix4x2, Vector2, Vector4};

// Internal
use super::Params;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Number of state channels (x, y, heading, speed)
pub const NUM_STATES: usize = 4;

/// Number of control channels (acceleration, steering angle)
pub const NUM_CONTROLS: usize = 2;

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Body slip angle induced by the steering input.
pub fn slip_angle(params: &Params, steer_rad: f64) -> f64 {
    (params.l_r_m / (params.l_f_m + params.l_r_m) * steer_rad.tan()).atan()
}

/// Advance the state by one forward-Euler step.
pub fn step(params: &Params, x: &Vector4<f64>, u: &Vector2<f64>) -> Vector4<f64> {
    let (psi, v) = (x[2], x[3]);
    let (accel, steer) = (u[0], u[1]);

    let beta = slip_angle(params, steer);
    let (sin_psi_beta, cos_psi_beta) = (psi + beta).sin_cos();

    Vector4::new(
        x[0] + params.dt_s * v * cos_psi_beta,
        x[1] + params.dt_s * v * sin_psi_beta,
        psi + params.dt_s * v / params.l_r_m * beta.sin(),
        v + params.dt_s * accel,
    )
}

/// Linearise the discrete step about the given state and control.
///
/// Returns the Jacobians `(A_d, B_d)` of the step function, such that near
/// the linearisation point
/// `step(x, u) ~= step(x0, u0) + A_d (x - x0) + B_d (u - u0)`.
pub fn linearise(
    params: &Params,
    x0: &Vector4<f64>,
    u0: &Vector2<f64>,
) -> (Matrix4<f64>, Matrix4x2<f64>) {
    let dt = params.dt_s;
    let (psi, v) = (x0[2], x0[3]);
    let steer = u0[1];

    let lr_lflr = params.l_r_m / (params.l_f_m + params.l_r_m);

    let (sin_steer, cos_steer) = steer.sin_cos();
    let tan_steer = sin_steer / cos_steer;

    let beta = (lr_lflr * tan_steer).atan();
    let (sin_beta, cos_beta) = beta.sin_cos();
    let (sin_psi_beta, cos_psi_beta) = (psi + beta).sin_cos();

    // tan(beta) = lr_lflr * tan(steer)
    let d_beta_steer = lr_lflr * cos_beta * cos_beta / (cos_steer * cos_steer);

    #[cfg_attr(rustfmt, rustfmt_skip)]
    let a_d = Matrix4::new(
        1.0, 0.0, -dt * v * sin_psi_beta, dt * cos_psi_beta,
        0.0, 1.0, dt * v * cos_psi_beta, dt * sin_psi_beta,
        0.0, 0.0, 1.0, dt * sin_beta / params.l_r_m,
        0.0, 0.0, 0.0, 1.0,
    );

    #[cfg_attr(rustfmt, rustfmt_skip)]
    let b_d = Matrix4x2::new(
        0.0, -dt * v * sin_psi_beta * d_beta_steer,
        0.0, dt * v * cos_psi_beta * d_beta_steer,
        0.0, dt * v / params.l_r_m * cos_beta * d_beta_steer,
        dt, 0.0,
    );

    (a_d, b_d)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_step_straight() {
        let params = Params::default();

        // Driving straight at 1 m/s along +x
        let x = Vector4::new(0.0, 0.0, 0.0, 1.0);
        let u = Vector2::new(0.0, 0.0);

        let x_next = step(&params, &x, &u);

        assert!((x_next[0] - params.dt_s).abs() < 1e-12);
        assert!(x_next[1].abs() < 1e-12);
        assert!(x_next[2].abs() < 1e-12);
        assert!((x_next[3] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_step_turns_left() {
        let params = Params::default();

        let x = Vector4::new(0.0, 0.0, 0.0, 1.0);
        let u = Vector2::new(0.0, 0.3);

        let x_next = step(&params, &x, &u);

        // Positive steering turns the heading positive and pulls y up
        assert!(x_next[2] > 0.0);
        assert!(x_next[1] > 0.0);
    }

    #[test]
    fn test_linearise_matches_finite_difference() {
        let params = Params::default();

        let x0 = Vector4::new(0.3, -0.2, 0.4, 0.8);
        let u0 = Vector2::new(0.2, -0.15);

        let (a_d, b_d) = linearise(&params, &x0, &u0);

        let eps = 1e-7;

        for j in 0..NUM_STATES {
            let mut x_pert = x0;
            x_pert[j] += eps;
            let diff = (step(&params, &x_pert, &u0) - step(&params, &x0, &u0)) / eps;

            for i in 0..NUM_STATES {
                assert!(
                    (a_d[(i, j)] - diff[i]).abs() < 1e-5,
                    "A[({}, {})] = {} vs fd {}",
                    i, j, a_d[(i, j)], diff[i]
                );
            }
        }

        for j in 0..NUM_CONTROLS {
            let mut u_pert = u0;
            u_pert[j] += eps;
            let diff = (step(&params, &x0, &u_pert) - step(&params, &x0, &u0)) / eps;

            for i in 0..NUM_STATES {
                assert!(
                    (b_d[(i, j)] - diff[i]).abs() < 1e-5,
                    "B[({}, {})] = {} vs fd {}",
                    i, j, b_d[(i, j)], diff[i]
                );
            }
        }
    }
}
