//! Implementations for the MpcCtrl state structure

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, warn};
use nalgebra::{Vector2, Vector4};
use osqp::{CscMatrix, Problem, Settings, Status};
use serde::{Deserialize, Serialize};
use std::time::Instant;

// Internal
use super::constraints::{self, ConstraintSet};
use super::cost;
use super::layout::ProblemLayout;
use super::model;
use super::{MpcInitError, MpcProcError, Params};
use crate::ref_traj::ReferenceTrajectory;
use util::{module::State, params, session::Session};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Absolute tolerance handed to the QP solver
const QP_EPS_ABS: f64 = 1e-5;

/// Relative tolerance handed to the QP solver
const QP_EPS_REL: f64 = 1e-5;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// MPC trajectory-tracking controller module state.
///
/// The optimisation problem (variables, parameters, constraints) is built
/// once at initialisation and mutated in place every cycle: parameters are
/// overwritten, never reconstructed. The struct is exclusively owned by the
/// control loop.
#[derive(Default)]
pub struct MpcCtrl {
    params: Params,

    layout: ProblemLayout,

    /// The QP problem, built once at init. `None` until then.
    problem: Option<Problem>,

    // ---- PARAMETERS, OVERWRITTEN EACH CYCLE ----
    /// Current-state parameter (x, y, heading, speed)
    z_curr: Vector4<f64>,

    /// Reference trajectory parameter
    reference: ReferenceTrajectory,

    /// Previous-control parameter feeding the step-0 rate constraints
    u_prev: Vector2<f64>,

    // ---- ITERATE, PERSISTED FOR WARM STARTING ----
    x_op: Vec<Vector4<f64>>,
    u_op: Vec<Vector2<f64>>,
    sl_op: Vec<Vector2<f64>>,

    report: StatusReport,
}

/// Input data to the module
#[derive(Clone, Default, Debug)]
pub struct InputData {
    /// The current vehicle state (x, y, heading, speed)
    pub initial_condition: [f64; 4],

    /// The lookahead reference, one entry per horizon step
    pub reference: ReferenceTrajectory,

    /// The control actually applied in the last cycle
    pub previous_control: MpcCommand,
}

/// The control action extracted from a solve.
#[derive(Clone, Copy, Default, Debug, Serialize, Deserialize)]
pub struct MpcCommand {
    /// Acceleration command
    ///
    /// Units: meters/second^2
    pub accel_ms2: f64,

    /// Steering angle command
    ///
    /// Units: radians
    pub steer_rad: f64,
}

/// The outcome of one solve.
///
/// A solve always produces a command: `is_optimal` distinguishes a certified
/// optimum from a best-effort fallback. Callers must branch on the flag
/// rather than expect an error.
#[derive(Clone, Copy, Default, Debug, Serialize)]
pub struct SolutionResult {
    /// First-step control action
    pub command: MpcCommand,

    /// True if the solver certified the solution, false if the command is
    /// the last available iterate
    pub is_optimal: bool,

    /// Wall-clock duration of the solve
    pub solve_time_ms: f64,
}

/// The status report containing monitoring quantities for the last solve.
#[derive(Clone, Copy, Default, Debug, Serialize)]
pub struct StatusReport {
    /// Wall-clock duration of the solve in milliseconds
    pub solve_time_ms: f64,

    /// True if the last solve was certified optimal
    pub is_optimal: bool,

    /// Number of linearise-and-solve rounds used
    pub sqp_rounds: u32,

    /// Largest acceleration-rate slack in the solution
    pub max_slack_accel: f64,

    /// Largest steering-rate slack in the solution
    pub max_slack_steer: f64,

    /// Smallest slack value in the solution. Should never fall below zero
    /// by more than the solver tolerance.
    pub min_slack: f64,

    /// First-step acceleration command
    pub accel_cmd_ms2: f64,

    /// First-step steering command
    pub steer_cmd_rad: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl State for MpcCtrl {
    type InitData = &'static str;
    type InitError = MpcInitError;

    type InputData = InputData;
    type OutputData = SolutionResult;
    type StatusReport = StatusReport;
    type ProcError = MpcProcError;

    /// Initialise the MpcCtrl module.
    ///
    /// Expected init data is a path to the parameter file.
    fn init(&mut self, init_data: Self::InitData, _session: &Session)
        -> Result<(), Self::InitError>
    {
        // Load the parameters
        let params: Params = params::load(init_data)
            .map_err(MpcInitError::ParamLoadError)?;

        *self = Self::with_params(params)?;

        Ok(())
    }

    /// Process one control cycle: push the parameters and solve.
    fn proc(&mut self, input_data: &Self::InputData)
        -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError>
    {
        self.update(
            &input_data.initial_condition,
            &input_data.reference,
            &[
                input_data.previous_control.accel_ms2,
                input_data.previous_control.steer_rad,
            ],
        )?;

        let result = self.solve()?;

        Ok((result, self.report))
    }
}

impl MpcCtrl {
    /// Construct a controller from explicit parameters.
    ///
    /// Fails on invalid parameters or if the QP problem cannot be set up;
    /// both are configuration errors and fatal.
    pub fn with_params(params: Params) -> Result<Self, MpcInitError> {
        params.validate()?;

        let layout = ProblemLayout::new(params.n_horizon);
        let n = layout.horizon();

        let mut ctrl = Self {
            params,
            layout,
            problem: None,
            z_curr: Vector4::zeros(),
            reference: ReferenceTrajectory {
                x_ref_m: vec![0.0; n],
                y_ref_m: vec![0.0; n],
                psi_ref_rad: vec![0.0; n],
                v_ref_ms: vec![0.0; n],
                offset_m: vec![0.0; n],
            },
            u_prev: Vector2::zeros(),
            x_op: vec![Vector4::zeros(); layout.num_state_steps()],
            u_op: vec![Vector2::zeros(); layout.num_control_steps()],
            sl_op: vec![Vector2::zeros(); layout.num_slack_steps()],
            report: StatusReport::default(),
        };

        // Build the problem once, about the neutral iterate. All later
        // cycles only overwrite its matrices and vectors.
        let p_dense = cost::build_quadratic(&ctrl.params, &ctrl.layout);
        let q_lin = cost::build_linear(&ctrl.params, &ctrl.layout, &ctrl.reference);
        let set = constraints::build(
            &ctrl.params,
            &ctrl.layout,
            &ctrl.x_op,
            &ctrl.u_op,
            &ctrl.z_curr,
            &ctrl.u_prev,
        );

        let num_vars = ctrl.layout.num_vars();
        let num_rows = ctrl.layout.num_rows();

        let p_mat = CscMatrix::from_column_iter_dense(num_vars, num_vars, p_dense)
            .into_upper_tri();
        let a_mat = CscMatrix::from_column_iter_dense(num_rows, num_vars, set.a_dense);

        let settings = Settings::default()
            .verbose(false)
            .polish(true)
            .eps_abs(QP_EPS_ABS)
            .eps_rel(QP_EPS_REL)
            .max_iter(ctrl.params.qp_max_iters);

        let problem = Problem::new(p_mat, &q_lin, a_mat, &set.lower, &set.upper, &settings)
            .map_err(MpcInitError::QpSetupError)?;

        ctrl.problem = Some(problem);

        Ok(ctrl)
    }

    /// The horizon length the controller was built with.
    pub fn horizon(&self) -> usize {
        self.layout.horizon()
    }

    /// Overwrite the current-state parameter.
    pub fn update_initial_condition(&mut self, x0_m: f64, y0_m: f64, psi0_rad: f64, v0_ms: f64) {
        self.z_curr = Vector4::new(x0_m, y0_m, psi0_rad, v0_ms);
    }

    /// Overwrite the reference-trajectory parameter.
    ///
    /// All four vectors must have exactly one entry per horizon step.
    pub fn update_reference(
        &mut self,
        x_ref_m: &[f64],
        y_ref_m: &[f64],
        psi_ref_rad: &[f64],
        v_ref_ms: &[f64],
    ) -> Result<(), MpcProcError> {
        let n = self.layout.horizon();

        for refs in [x_ref_m, y_ref_m, psi_ref_rad, v_ref_ms].iter() {
            if refs.len() != n {
                return Err(MpcProcError::MismatchedReferenceLength {
                    expected: n,
                    found: refs.len(),
                });
            }
        }

        self.reference.x_ref_m.copy_from_slice(x_ref_m);
        self.reference.y_ref_m.copy_from_slice(y_ref_m);
        self.reference.psi_ref_rad.copy_from_slice(psi_ref_rad);
        self.reference.v_ref_ms.copy_from_slice(v_ref_ms);

        Ok(())
    }

    /// Overwrite the previous-control parameter.
    pub fn update_previous_input(&mut self, accel_ms2: f64, steer_rad: f64) {
        self.u_prev = Vector2::new(accel_ms2, steer_rad);
    }

    /// Bulk parameter push, equivalent to the individual update calls.
    pub fn update(
        &mut self,
        initial_condition: &[f64; 4],
        reference: &ReferenceTrajectory,
        previous_inputs: &[f64; 2],
    ) -> Result<(), MpcProcError> {
        self.update_initial_condition(
            initial_condition[0],
            initial_condition[1],
            initial_condition[2],
            initial_condition[3],
        );
        self.update_reference(
            &reference.x_ref_m,
            &reference.y_ref_m,
            &reference.psi_ref_rad,
            &reference.v_ref_ms,
        )?;
        self.update_previous_input(previous_inputs[0], previous_inputs[1]);

        Ok(())
    }

    /// Solve the problem with the current parameter values.
    ///
    /// Runs up to `sqp_max_iters` linearise-and-solve rounds, stopping early
    /// once the control step converges. Always returns a command: when the
    /// QP solver cannot certify a solution the last iterate is extracted
    /// instead and `is_optimal` is cleared.
    pub fn solve(&mut self) -> Result<SolutionResult, MpcProcError> {
        let solve_start = Instant::now();

        let n = self.layout.horizon();
        let num_rows = self.layout.num_rows();
        let num_vars = self.layout.num_vars();

        let problem = self.problem.as_mut().ok_or(MpcProcError::NotInitialised)?;

        // Seed the iterate: anchor at the current state and roll the
        // retained control guess forward through the nonlinear model
        self.x_op[0] = self.z_curr;
        for i in 0..n {
            self.x_op[i + 1] = model::step(&self.params, &self.x_op[i], &self.u_op[i]);
        }

        // The linear cost only depends on the reference, which is fixed for
        // the whole solve
        let q_lin = cost::build_linear(&self.params, &self.layout, &self.reference);
        problem.update_lin_cost(&q_lin);

        let mut is_optimal = false;
        let mut sqp_rounds = 0u32;

        for _ in 0..self.params.sqp_max_iters {
            sqp_rounds += 1;

            let ConstraintSet {
                a_dense,
                lower,
                upper,
            } = constraints::build(
                &self.params,
                &self.layout,
                &self.x_op,
                &self.u_op,
                &self.z_curr,
                &self.u_prev,
            );

            problem.update_A(CscMatrix::from_column_iter_dense(num_rows, num_vars, a_dense));
            problem.update_bounds(&lower, &upper);

            match problem.solve() {
                Status::Solved(solution) => {
                    let step_norm = adopt_iterate(
                        &self.layout,
                        solution.x(),
                        &mut self.x_op,
                        &mut self.u_op,
                        &mut self.sl_op,
                    );

                    is_optimal = true;

                    if step_norm < self.params.sqp_conv_tol {
                        break;
                    }
                }
                // An uncertified solution is still usable as an iterate, but
                // ends the solve without the optimality flag
                Status::SolvedInaccurate(solution)
                | Status::MaxIterationsReached(solution)
                | Status::TimeLimitReached(solution) => {
                    adopt_iterate(
                        &self.layout,
                        solution.x(),
                        &mut self.x_op,
                        &mut self.u_op,
                        &mut self.sl_op,
                    );

                    warn!("QP solution not certified, using it as a best-effort iterate");
                    is_optimal = false;
                    break;
                }
                // No usable solution at all: the previous iterate stands as
                // the best-effort answer
                Status::PrimalInfeasible(_) | Status::PrimalInfeasibleInaccurate(_) => {
                    warn!("QP primal infeasible, falling back to the last iterate");
                    is_optimal = false;
                    break;
                }
                Status::DualInfeasible(_) | Status::DualInfeasibleInaccurate(_) => {
                    warn!("QP dual infeasible, falling back to the last iterate");
                    is_optimal = false;
                    break;
                }
                _ => {
                    warn!("QP solver returned an unusable status, falling back to the last iterate");
                    is_optimal = false;
                    break;
                }
            }
        }

        // Monitoring quantities from the realised slack
        let mut max_slack_accel = 0f64;
        let mut max_slack_steer = 0f64;
        let mut min_slack = f64::INFINITY;
        for sl in self.sl_op.iter() {
            max_slack_accel = max_slack_accel.max(sl[0]);
            max_slack_steer = max_slack_steer.max(sl[1]);
            min_slack = min_slack.min(sl[0]).min(sl[1]);
        }

        let command = MpcCommand {
            accel_ms2: self.u_op[0][0],
            steer_rad: self.u_op[0][1],
        };

        let solve_time_ms = solve_start.elapsed().as_secs_f64() * 1e3;

        self.report = StatusReport {
            solve_time_ms,
            is_optimal,
            sqp_rounds,
            max_slack_accel,
            max_slack_steer,
            min_slack,
            accel_cmd_ms2: command.accel_ms2,
            steer_cmd_rad: command.steer_rad,
        };

        debug!(
            "MPC solve: optimal={}, {:.2} ms, {} round(s), cmd=({:.3} m/s^2, {:.3} rad)",
            is_optimal, solve_time_ms, sqp_rounds, command.accel_ms2, command.steer_rad
        );

        Ok(SolutionResult {
            command,
            is_optimal,
            solve_time_ms,
        })
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Copy the QP solution into the iterate, returning the infinity norm of the
/// control step.
fn adopt_iterate(
    layout: &ProblemLayout,
    solution: &[f64],
    x_op: &mut [Vector4<f64>],
    u_op: &mut [Vector2<f64>],
    sl_op: &mut [Vector2<f64>],
) -> f64 {
    for (i, x) in x_op.iter_mut().enumerate() {
        for k in 0..4 {
            x[k] = solution[layout.state_var(i, k)];
        }
    }

    let mut step_norm = 0f64;
    for (i, u) in u_op.iter_mut().enumerate() {
        for k in 0..2 {
            let new = solution[layout.control_var(i, k)];
            step_norm = step_norm.max((new - u[k]).abs());
            u[k] = new;
        }
    }

    for (i, sl) in sl_op.iter_mut().enumerate() {
        for k in 0..2 {
            sl[k] = solution[layout.slack_var(i, k)];
        }
    }

    step_norm
}

#[cfg(test)]
mod test {
    use super::*;

    /// A reference holding the given state constant over the whole horizon.
    fn constant_reference(n: usize, x: f64, y: f64, psi: f64, v: f64) -> ReferenceTrajectory {
        ReferenceTrajectory {
            x_ref_m: vec![x; n],
            y_ref_m: vec![y; n],
            psi_ref_rad: vec![psi; n],
            v_ref_ms: vec![v; n],
            offset_m: (0..n).map(|i| i as f64).collect(),
        }
    }

    #[test]
    fn test_invalid_params_rejected() {
        let params = Params {
            n_horizon: 0,
            ..Default::default()
        };

        assert!(matches!(
            MpcCtrl::with_params(params),
            Err(MpcInitError::InvalidParams(_))
        ));
    }

    #[test]
    fn test_zero_problem_yields_zero_command() {
        // Zero state, all-zero reference, zero previous control: the optimum
        // is to do nothing
        let mut mpc = MpcCtrl::with_params(Params::default()).unwrap();
        let n = mpc.horizon();

        mpc.update(
            &[0.0; 4],
            &constant_reference(n, 0.0, 0.0, 0.0, 0.0),
            &[0.0; 2],
        )
        .unwrap();

        let res = mpc.solve().unwrap();

        assert!(res.is_optimal);
        assert!(res.command.accel_ms2.abs() < 1e-3);
        assert!(res.command.steer_rad.abs() < 1e-3);
        assert!(res.solve_time_ms > 0.0);
    }

    #[test]
    fn test_straight_line_zero_steering() {
        // Following a straight, constant-speed path starting at the current
        // state needs no steering and no acceleration
        let mut mpc = MpcCtrl::with_params(Params::default()).unwrap();
        let n = mpc.horizon();
        let dt = mpc.params.dt_s;

        let reference = ReferenceTrajectory {
            x_ref_m: (0..n).map(|k| (k + 1) as f64 * dt).collect(),
            y_ref_m: vec![0.0; n],
            psi_ref_rad: vec![0.0; n],
            v_ref_ms: vec![1.0; n],
            offset_m: (0..n).map(|k| (k + 1) as f64 * dt).collect(),
        };

        mpc.update(&[0.0, 0.0, 0.0, 1.0], &reference, &[0.0; 2]).unwrap();

        let res = mpc.solve().unwrap();

        assert!(res.is_optimal);
        assert!(
            res.command.steer_rad.abs() < 1e-2,
            "steering {} not near zero",
            res.command.steer_rad
        );
        assert!(res.command.accel_ms2.abs() < 1e-2);
    }

    #[test]
    fn test_acceleration_bound_honoured() {
        // A reference far ahead at high speed demands more acceleration than
        // the bound allows: the command must clamp at the bound
        let params = Params {
            v_max_ms: 10.0,
            a_min_ms2: -3.0,
            a_max_ms2: 3.0,
            // Rate limits wide enough not to bind
            a_dot_min_ms3: -30.0,
            a_dot_max_ms3: 30.0,
            ..Default::default()
        };

        let mut mpc = MpcCtrl::with_params(params).unwrap();
        let n = mpc.horizon();

        mpc.update(
            &[0.0; 4],
            &constant_reference(n, 50.0, 0.0, 0.0, 10.0),
            &[0.0; 2],
        )
        .unwrap();

        let res = mpc.solve().unwrap();

        assert!(
            res.command.accel_ms2 <= 3.0 + 1e-4,
            "acceleration {} exceeds bound",
            res.command.accel_ms2
        );
        assert!(
            res.command.accel_ms2 > 2.5,
            "acceleration {} should be near the bound",
            res.command.accel_ms2
        );
    }

    #[test]
    fn test_rate_bound_honoured_within_slack() {
        // With a previous control of (1.0, 0.2) and a zero reference, the
        // first-step controls can only back off at the rate limits, widened
        // by whatever slack the solve realises
        let mut mpc = MpcCtrl::with_params(Params::default()).unwrap();
        let n = mpc.horizon();
        let dt = mpc.params.dt_s;
        let a_dot_min = mpc.params.a_dot_min_ms3;
        let a_dot_max = mpc.params.a_dot_max_ms3;

        mpc.update(
            &[0.0; 4],
            &constant_reference(n, 0.0, 0.0, 0.0, 0.0),
            &[1.0, 0.2],
        )
        .unwrap();

        let res = mpc.solve().unwrap();
        let report = mpc.report;

        let accel = res.command.accel_ms2;
        assert!(
            accel >= 1.0 + a_dot_min * dt - report.max_slack_accel - 1e-3,
            "acceleration {} violates the lower rate bound",
            accel
        );
        assert!(
            accel <= 1.0 + a_dot_max * dt + report.max_slack_accel + 1e-3,
            "acceleration {} violates the upper rate bound",
            accel
        );

        // Slack is numerically non-negative in any successful solve
        assert!(report.min_slack >= -1e-6);
    }

    #[test]
    fn test_reference_length_checked() {
        let mut mpc = MpcCtrl::with_params(Params::default()).unwrap();

        let result = mpc.update_reference(&[0.0; 3], &[0.0; 3], &[0.0; 3], &[0.0; 3]);

        assert!(matches!(
            result,
            Err(MpcProcError::MismatchedReferenceLength { .. })
        ));
    }
}
