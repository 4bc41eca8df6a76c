//! Decision-variable and constraint-row layout of the transcribed problem
//!
//! The optimisation problem is transcribed over the full horizon: `N + 1`
//! state steps, `N` control steps and `N` slack pairs all appear as decision
//! variables. This module owns the bookkeeping that maps (step, channel)
//! pairs to flat vector indices, and the partition of the constraint rows
//! into their families.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use super::model::{NUM_CONTROLS, NUM_STATES};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Index bookkeeping for the transcribed problem.
///
/// The decision vector is laid out as all state steps, then all control
/// steps, then all slack pairs. Constraint rows are laid out as the initial
/// condition, the dynamics links, the speed bounds, the input bounds, the
/// input-rate bounds (a lower and an upper row per channel per step) and the
/// slack non-negativity rows.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProblemLayout {
    n: usize,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ProblemLayout {
    pub fn new(n_horizon: usize) -> Self {
        Self { n: n_horizon }
    }

    /// The horizon length `N`.
    pub fn horizon(&self) -> usize {
        self.n
    }

    /// Number of state steps (`N + 1`).
    pub fn num_state_steps(&self) -> usize {
        self.n + 1
    }

    /// Number of control steps (`N`).
    pub fn num_control_steps(&self) -> usize {
        self.n
    }

    /// Number of slack pairs (`N`).
    pub fn num_slack_steps(&self) -> usize {
        self.n
    }

    /// Total number of decision variables.
    pub fn num_vars(&self) -> usize {
        NUM_STATES * self.num_state_steps()
            + NUM_CONTROLS * self.num_control_steps()
            + NUM_CONTROLS * self.num_slack_steps()
    }

    /// Total number of constraint rows.
    pub fn num_rows(&self) -> usize {
        self.row_slack(0, 0) + NUM_CONTROLS * self.n
    }

    // ---- VARIABLE INDICES ----

    /// Index of state channel `k` at step `i` (`i` in `0..=N`).
    pub fn state_var(&self, i: usize, k: usize) -> usize {
        debug_assert!(i <= self.n && k < NUM_STATES);
        NUM_STATES * i + k
    }

    /// Index of control channel `k` at step `i` (`i` in `0..N`).
    pub fn control_var(&self, i: usize, k: usize) -> usize {
        debug_assert!(i < self.n && k < NUM_CONTROLS);
        NUM_STATES * self.num_state_steps() + NUM_CONTROLS * i + k
    }

    /// Index of slack channel `k` at step `i` (`i` in `0..N`).
    pub fn slack_var(&self, i: usize, k: usize) -> usize {
        debug_assert!(i < self.n && k < NUM_CONTROLS);
        NUM_STATES * self.num_state_steps()
            + NUM_CONTROLS * self.num_control_steps()
            + NUM_CONTROLS * i
            + k
    }

    // ---- CONSTRAINT ROWS ----

    /// Initial-condition row for state channel `k`.
    pub fn row_init(&self, k: usize) -> usize {
        k
    }

    /// Dynamics row linking state channel `k` of step `i + 1` to step `i`.
    pub fn row_dyn(&self, i: usize, k: usize) -> usize {
        NUM_STATES + NUM_STATES * i + k
    }

    /// Speed-bound row for step `i` (`i` in `0..=N`).
    pub fn row_speed(&self, i: usize) -> usize {
        NUM_STATES * (self.n + 1) + i
    }

    /// Input-bound row for control channel `k` at step `i`.
    pub fn row_input(&self, i: usize, k: usize) -> usize {
        self.row_speed(self.n) + 1 + NUM_CONTROLS * i + k
    }

    /// Input-rate row for control channel `k` at step `i`. `side` is 0 for
    /// the lower (slack-widened) row and 1 for the upper.
    pub fn row_rate(&self, i: usize, k: usize, side: usize) -> usize {
        debug_assert!(side < 2);
        self.row_input(self.n - 1, NUM_CONTROLS - 1) + 1
            + 2 * NUM_CONTROLS * i
            + 2 * k
            + side
    }

    /// Slack non-negativity row for slack channel `k` at step `i`.
    pub fn row_slack(&self, i: usize, k: usize) -> usize {
        self.row_rate(self.n - 1, NUM_CONTROLS - 1, 1) + 1 + NUM_CONTROLS * i + k
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_step_counts() {
        for n in 1..20 {
            let layout = ProblemLayout::new(n);

            assert_eq!(layout.num_state_steps(), n + 1);
            assert_eq!(layout.num_control_steps(), n);
            assert_eq!(layout.num_slack_steps(), n);
            assert_eq!(layout.num_vars(), 8 * n + 4);

            // 4 init + 4N dynamics + (N+1) speed + 2N input + 4N rate
            // + 2N slack
            assert_eq!(layout.num_rows(), 13 * n + 5);
        }
    }

    #[test]
    fn test_indices_contiguous() {
        let layout = ProblemLayout::new(5);

        // Variables cover 0..num_vars without gaps
        assert_eq!(layout.state_var(0, 0), 0);
        assert_eq!(layout.control_var(0, 0), layout.state_var(5, 3) + 1);
        assert_eq!(layout.slack_var(0, 0), layout.control_var(4, 1) + 1);
        assert_eq!(layout.slack_var(4, 1), layout.num_vars() - 1);

        // Rows cover 0..num_rows without gaps
        assert_eq!(layout.row_dyn(0, 0), layout.row_init(3) + 1);
        assert_eq!(layout.row_speed(0), layout.row_dyn(4, 3) + 1);
        assert_eq!(layout.row_input(0, 0), layout.row_speed(5) + 1);
        assert_eq!(layout.row_rate(0, 0, 0), layout.row_input(4, 1) + 1);
        assert_eq!(layout.row_slack(0, 0), layout.row_rate(4, 1, 1) + 1);
        assert_eq!(layout.row_slack(4, 1), layout.num_rows() - 1);
    }
}
