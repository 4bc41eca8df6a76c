//! Constraint assembly
//!
//! Builds the constraint matrix and bound vectors of the QP solved at each
//! SQP round. The constraint families are:
//!
//! - *Initial condition*: the step-0 state equals the current-state
//!   parameter, componentwise.
//! - *Dynamics*: each state step is linked to the previous one through the
//!   bicycle model, linearised about the current iterate.
//! - *State bounds*: speed within `[v_min, v_max]` at every step.
//! - *Input bounds*: acceleration and steering within their physical limits.
//! - *Input-rate bounds*: the step-to-step change of each control channel is
//!   bounded by the rate limits, widened by that step's slack variable. Each
//!   two-sided slack-widened inequality is encoded as two one-sided rows,
//!   `u_i - u_(i-1) + s_i >= min` and `u_i - u_(i-1) - s_i <= max`, since the
//!   slack appears on both sides with opposite sign.
//! - *Slack non-negativity*: both slack channels at least zero at every step.
//!
//! The matrix is assembled with a fully dense column pattern so that the
//! solver sees an identical sparsity layout on every update.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::{Vector2, Vector4};

// Internal
use super::layout::ProblemLayout;
use super::model::{self, NUM_CONTROLS, NUM_STATES};
use super::Params;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Dense column-major constraint matrix with its lower and upper bound
/// vectors, `l <= A z <= u`.
pub struct ConstraintSet {
    /// Column-major matrix data, `num_rows * num_vars` entries
    pub a_dense: Vec<f64>,

    /// Lower bounds, one per row
    pub lower: Vec<f64>,

    /// Upper bounds, one per row
    pub upper: Vec<f64>,
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Assemble the full constraint set for one SQP round.
///
/// `x_op` and `u_op` are the linearisation point (the current iterate),
/// `z_curr` the current-state parameter and `u_prev` the previous-control
/// parameter feeding the step-0 rate rows.
pub fn build(
    params: &Params,
    layout: &ProblemLayout,
    x_op: &[Vector4<f64>],
    u_op: &[Vector2<f64>],
    z_curr: &Vector4<f64>,
    u_prev: &Vector2<f64>,
) -> ConstraintSet {
    let n = layout.horizon();
    let num_rows = layout.num_rows();
    let num_vars = layout.num_vars();

    debug_assert_eq!(x_op.len(), layout.num_state_steps());
    debug_assert_eq!(u_op.len(), layout.num_control_steps());

    let mut set = ConstraintSet {
        a_dense: vec![0.0; num_rows * num_vars],
        lower: vec![0.0; num_rows],
        upper: vec![0.0; num_rows],
    };

    // ---- INITIAL CONDITION ----

    for k in 0..NUM_STATES {
        let row = layout.row_init(k);
        set.coeff(num_rows, row, layout.state_var(0, k), 1.0);
        set.lower[row] = z_curr[k];
        set.upper[row] = z_curr[k];
    }

    // ---- DYNAMICS ----

    // x_(i+1) - A_d x_i - B_d u_i = f(x_op, u_op) - A_d x_op - B_d u_op
    for i in 0..n {
        let (a_d, b_d) = model::linearise(params, &x_op[i], &u_op[i]);
        let resid = model::step(params, &x_op[i], &u_op[i]) - a_d * x_op[i] - b_d * u_op[i];

        for k in 0..NUM_STATES {
            let row = layout.row_dyn(i, k);

            set.coeff(num_rows, row, layout.state_var(i + 1, k), 1.0);

            for j in 0..NUM_STATES {
                set.coeff(num_rows, row, layout.state_var(i, j), -a_d[(k, j)]);
            }
            for j in 0..NUM_CONTROLS {
                set.coeff(num_rows, row, layout.control_var(i, j), -b_d[(k, j)]);
            }

            set.lower[row] = resid[k];
            set.upper[row] = resid[k];
        }
    }

    // ---- STATE BOUNDS ----

    for i in 0..=n {
        let row = layout.row_speed(i);
        set.coeff(num_rows, row, layout.state_var(i, 3), 1.0);
        set.lower[row] = params.v_min_ms;
        set.upper[row] = params.v_max_ms;
    }

    // ---- INPUT BOUNDS ----

    let input_bounds = [
        (params.a_min_ms2, params.a_max_ms2),
        (params.df_min_rad, params.df_max_rad),
    ];

    for i in 0..n {
        for (k, (min, max)) in input_bounds.iter().enumerate() {
            let row = layout.row_input(i, k);
            set.coeff(num_rows, row, layout.control_var(i, k), 1.0);
            set.lower[row] = *min;
            set.upper[row] = *max;
        }
    }

    // ---- INPUT RATE BOUNDS ----

    let rate_bounds = [
        (params.a_dot_min_ms3, params.a_dot_max_ms3),
        (params.df_dot_min_rads, params.df_dot_max_rads),
    ];

    for i in 0..n {
        for (k, (rate_min, rate_max)) in rate_bounds.iter().enumerate() {
            // At step 0 the difference is taken against the previous-control
            // parameter, which moves to the bound side of the rows
            let prev = if i == 0 { u_prev[k] } else { 0.0 };

            // Lower: u_i - u_(i-1) + s_i >= rate_min * dt
            let row = layout.row_rate(i, k, 0);
            set.coeff(num_rows, row, layout.control_var(i, k), 1.0);
            if i > 0 {
                set.coeff(num_rows, row, layout.control_var(i - 1, k), -1.0);
            }
            set.coeff(num_rows, row, layout.slack_var(i, k), 1.0);
            set.lower[row] = rate_min * params.dt_s + prev;
            set.upper[row] = f64::INFINITY;

            // Upper: u_i - u_(i-1) - s_i <= rate_max * dt
            let row = layout.row_rate(i, k, 1);
            set.coeff(num_rows, row, layout.control_var(i, k), 1.0);
            if i > 0 {
                set.coeff(num_rows, row, layout.control_var(i - 1, k), -1.0);
            }
            set.coeff(num_rows, row, layout.slack_var(i, k), -1.0);
            set.lower[row] = f64::NEG_INFINITY;
            set.upper[row] = rate_max * params.dt_s + prev;
        }
    }

    // ---- SLACK NON-NEGATIVITY ----

    for i in 0..n {
        for k in 0..NUM_CONTROLS {
            let row = layout.row_slack(i, k);
            set.coeff(num_rows, row, layout.slack_var(i, k), 1.0);
            set.lower[row] = 0.0;
            set.upper[row] = f64::INFINITY;
        }
    }

    // Further constraint families (obstacle clearance, lateral acceleration
    // bounds) would be appended here.

    set
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ConstraintSet {
    fn coeff(&mut self, num_rows: usize, row: usize, col: usize, value: f64) {
        self.a_dense[col * num_rows + row] = value;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_dimensions() {
        let params = Params::default();
        let layout = ProblemLayout::new(params.n_horizon);

        let x_op = vec![Vector4::zeros(); layout.num_state_steps()];
        let u_op = vec![Vector2::zeros(); layout.num_control_steps()];

        let set = build(
            &params,
            &layout,
            &x_op,
            &u_op,
            &Vector4::zeros(),
            &Vector2::zeros(),
        );

        assert_eq!(set.a_dense.len(), layout.num_rows() * layout.num_vars());
        assert_eq!(set.lower.len(), layout.num_rows());
        assert_eq!(set.upper.len(), layout.num_rows());
    }

    #[test]
    fn test_zero_iterate_satisfied_by_zero() {
        // With a zero iterate, zero current state and zero previous control,
        // the zero vector must satisfy every constraint family
        let params = Params::default();
        let layout = ProblemLayout::new(params.n_horizon);

        let x_op = vec![Vector4::zeros(); layout.num_state_steps()];
        let u_op = vec![Vector2::zeros(); layout.num_control_steps()];

        let set = build(
            &params,
            &layout,
            &x_op,
            &u_op,
            &Vector4::zeros(),
            &Vector2::zeros(),
        );

        for row in 0..layout.num_rows() {
            // A z = 0 for z = 0, so the bounds must straddle zero
            assert!(
                set.lower[row] <= 1e-12 && set.upper[row] >= -1e-12,
                "row {} has bounds [{}, {}]",
                row,
                set.lower[row],
                set.upper[row]
            );
        }
    }

    #[test]
    fn test_rate_rows_reference_previous_control() {
        let params = Params::default();
        let layout = ProblemLayout::new(params.n_horizon);

        let x_op = vec![Vector4::zeros(); layout.num_state_steps()];
        let u_op = vec![Vector2::zeros(); layout.num_control_steps()];
        let u_prev = Vector2::new(0.5, 0.1);

        let set = build(
            &params,
            &layout,
            &x_op,
            &u_op,
            &Vector4::zeros(),
            &u_prev,
        );

        // Step-0 acceleration rate rows are offset by the previous control
        let row = layout.row_rate(0, 0, 0);
        assert!((set.lower[row] - (params.a_dot_min_ms3 * params.dt_s + 0.5)).abs() < 1e-12);

        let row = layout.row_rate(0, 0, 1);
        assert!((set.upper[row] - (params.a_dot_max_ms3 * params.dt_s + 0.5)).abs() < 1e-12);

        // Later steps are not
        let row = layout.row_rate(1, 0, 1);
        assert!((set.upper[row] - params.a_dot_max_ms3 * params.dt_s).abs() < 1e-12);
    }
}
