//! Cost assembly
//!
//! The objective is the sum of three non-negative terms:
//!
//! - *Tracking*: `(z_i - ref_(i-1))^T Q (z_i - ref_(i-1))` for state steps
//!   `1..=N`.
//! - *Smoothness*: `(u_(i+1) - u_i)^T R (u_(i+1) - u_i)` for control steps
//!   `0..N-1`, penalising jerk in both channels.
//! - *Slack*: the plain sum of both slack channels across all steps, linear
//!   with weight 1, active only when the rate constraints would otherwise be
//!   infeasible.
//!
//! In the solver's `1/2 z^T P z + q^T z` form the quadratic matrix `P` is
//! constant: the reference only enters the linear term, which is rebuilt
//! each cycle.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
use super::layout::ProblemLayout;
use super::model::{NUM_CONTROLS, NUM_STATES};
use super::Params;
use crate::ref_traj::ReferenceTrajectory;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Linear penalty applied to every slack variable.
const SLACK_WEIGHT: f64 = 1.0;

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Assemble the constant quadratic cost matrix, dense column-major.
pub fn build_quadratic(params: &Params, layout: &ProblemLayout) -> Vec<f64> {
    let n = layout.horizon();
    let num_vars = layout.num_vars();

    let mut p_dense = vec![0.0; num_vars * num_vars];

    let mut add = |row: usize, col: usize, value: f64| {
        p_dense[col * num_vars + row] += value;
    };

    // Tracking term: the cost z^T Q z contributes 2 Q to P
    for i in 1..=n {
        for k in 0..NUM_STATES {
            let var = layout.state_var(i, k);
            add(var, var, 2.0 * params.q_weights[k]);
        }
    }

    // Smoothness term: expanding (u_(i+1) - u_i)^T R (u_(i+1) - u_i) couples
    // adjacent control steps
    for i in 0..n.saturating_sub(1) {
        for k in 0..NUM_CONTROLS {
            let var_i = layout.control_var(i, k);
            let var_next = layout.control_var(i + 1, k);
            let r = params.r_weights[k];

            add(var_i, var_i, 2.0 * r);
            add(var_next, var_next, 2.0 * r);
            add(var_i, var_next, -2.0 * r);
            add(var_next, var_i, -2.0 * r);
        }
    }

    p_dense
}

/// Assemble the linear cost term for the given reference trajectory.
pub fn build_linear(
    params: &Params,
    layout: &ProblemLayout,
    reference: &ReferenceTrajectory,
) -> Vec<f64> {
    let n = layout.horizon();

    debug_assert_eq!(reference.len(), n);

    let mut q_lin = vec![0.0; layout.num_vars()];

    // Tracking term: -2 Q ref on state steps 1..=N, each tracking the
    // reference entry one step behind it
    for i in 1..=n {
        let ref_state = [
            reference.x_ref_m[i - 1],
            reference.y_ref_m[i - 1],
            reference.psi_ref_rad[i - 1],
            reference.v_ref_ms[i - 1],
        ];

        for k in 0..NUM_STATES {
            q_lin[layout.state_var(i, k)] = -2.0 * params.q_weights[k] * ref_state[k];
        }
    }

    // Slack term
    for i in 0..n {
        for k in 0..NUM_CONTROLS {
            q_lin[layout.slack_var(i, k)] = SLACK_WEIGHT;
        }
    }

    q_lin
}

#[cfg(test)]
mod test {
    use super::*;

    fn zero_reference(n: usize) -> ReferenceTrajectory {
        ReferenceTrajectory {
            x_ref_m: vec![0.0; n],
            y_ref_m: vec![0.0; n],
            psi_ref_rad: vec![0.0; n],
            v_ref_ms: vec![0.0; n],
            offset_m: (0..n).map(|i| i as f64).collect(),
        }
    }

    #[test]
    fn test_quadratic_symmetric() {
        let params = Params::default();
        let layout = ProblemLayout::new(params.n_horizon);
        let num_vars = layout.num_vars();

        let p_dense = build_quadratic(&params, &layout);

        for row in 0..num_vars {
            for col in 0..num_vars {
                assert_eq!(
                    p_dense[col * num_vars + row],
                    p_dense[row * num_vars + col]
                );
            }
        }
    }

    #[test]
    fn test_no_cost_on_initial_state() {
        // Step 0 is pinned by the initial-condition constraint and carries no
        // tracking cost
        let params = Params::default();
        let layout = ProblemLayout::new(params.n_horizon);
        let num_vars = layout.num_vars();

        let p_dense = build_quadratic(&params, &layout);

        for k in 0..NUM_STATES {
            let var = layout.state_var(0, k);
            assert_eq!(p_dense[var * num_vars + var], 0.0);
        }
    }

    #[test]
    fn test_linear_slack_weight() {
        let params = Params::default();
        let layout = ProblemLayout::new(params.n_horizon);

        let q_lin = build_linear(&params, &layout, &zero_reference(params.n_horizon));

        // Zero reference leaves only the slack weights
        for i in 0..params.n_horizon {
            for k in 0..NUM_CONTROLS {
                assert_eq!(q_lin[layout.slack_var(i, k)], SLACK_WEIGHT);
            }
            for k in 0..NUM_CONTROLS {
                assert_eq!(q_lin[layout.control_var(i, k)], 0.0);
            }
        }
    }

    #[test]
    fn test_linear_reference_pullback() {
        let params = Params::default();
        let layout = ProblemLayout::new(params.n_horizon);

        let mut reference = zero_reference(params.n_horizon);
        reference.x_ref_m[0] = 2.0;

        let q_lin = build_linear(&params, &layout, &reference);

        // State step 1 tracks reference entry 0
        assert_eq!(
            q_lin[layout.state_var(1, 0)],
            -2.0 * params.q_weights[0] * 2.0
        );
    }
}
