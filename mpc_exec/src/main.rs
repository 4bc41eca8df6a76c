//! Main MPC executable entry point.
//!
//! # Architecture
//!
//! The general execution methodology consists of:
//!
//!     - Initialise all modules
//!     - Main loop:
//!         - Pose acquisition from the localisation client
//!         - Reference interpolation over the loaded path
//!         - MPC processing (parameter push + solve)
//!         - Command integration and output to the drive client
//!         - Sleep until the next cycle tick
//!
//! The vehicle must receive a bounded command stream at all times: pose
//! dropouts, empty references and non-optimal solves all degrade the command
//! rather than drop it.

// ---------------------------------------------------------------------------
// USE MODULES FROM LIBRARY
// ---------------------------------------------------------------------------

use mpc_lib::{
    data_store::DataStore,
    drive_client::{DriveClient, DriveClientError},
    loc_client::LocClient,
    mpc_ctrl::InputData,
    params::MpcExecParams,
    path::Path,
    ref_traj::{self, InterpError},
};

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{
    eyre::{eyre, WrapErr},
    Report,
};
use log::{error, info, warn};
use nalgebra::Vector2;
use std::env;
use std::thread;
use std::time::{Duration, Instant};

// Internal
use comms_if::eqpt::{DriveDems, DriveDemsResponse};
use util::{
    host,
    logger::{logger_init, LevelFilter},
    maths::clamp,
    module::State,
    session::Session,
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Target period of one cycle.
const CYCLE_PERIOD_S: f64 = 0.10;

/// Number of cycles per second
const CYCLE_FREQUENCY_HZ: f64 = 1.0 / CYCLE_PERIOD_S;

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new("mpc_exec", "sessions").wrap_err("Failed to create the session")?;

    // Initialise logger
    logger_init(LevelFilter::Trace, &session).wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("Talos MPC Executable\n");
    info!(
        "Software root: {:?}",
        host::get_talos_sw_root().wrap_err("Failed to get the software root")?
    );
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD PARAMETERS ----

    let exec_params: MpcExecParams =
        util::params::load("mpc_exec.toml").wrap_err("Could not load exec params")?;

    info!("Exec parameters loaded");

    // ---- ACQUIRE REFERENCE PATH ----

    // Collect all arguments
    let args: Vec<String> = env::args().collect();

    let path = if args.len() == 2 {
        info!("Loading reference path from {:?}", &args[1]);
        Path::from_file(&args[1]).wrap_err("Failed to load the reference path")?
    } else if args.len() == 1 {
        info!("No path file provided, using the built-in demo path");
        demo_path()
    } else {
        return Err(eyre!(
            "Expected either zero or one argument, found {}",
            args.len() - 1
        ));
    };

    if path.is_empty() {
        warn!("The reference path is empty, the controller will idle");
    } else {
        info!(
            "Reference path has {} points over {:.1} m\n",
            path.get_num_points(),
            path.get_length().unwrap_or(0.0)
        );
    }

    // ---- INITIALISE DATASTORE ----

    info!("Initialising modules...");

    let mut ds = DataStore::default();

    // ---- INITIALISE MODULES ----

    ds.mpc_ctrl
        .init("mpc_ctrl.toml", &session)
        .wrap_err("Failed to initialise MpcCtrl")?;
    info!("MpcCtrl init complete");

    info!("Module initialisation complete\n");

    // ---- INITIALISE NETWORK ----

    info!("Initialising network");

    let zmq_ctx = comms_if::net::zmq::Context::new();

    let loc_client = LocClient::new(&zmq_ctx, &exec_params)
        .wrap_err("Failed to initialise the LocClient")?;
    info!("LocClient initialised");

    let mut drive_client = DriveClient::new(&zmq_ctx, &exec_params)
        .wrap_err("Failed to initialise the DriveClient")?;
    info!("DriveClient initialised");

    info!("Network initialisation complete");

    // ---- MAIN LOOP ----

    info!("Begining main loop\n");

    loop {
        // Get cycle start time
        let cycle_start_instant = Instant::now();

        // Clear items that need wiping at the start of the cycle
        ds.cycle_start(CYCLE_FREQUENCY_HZ);

        // ---- POSE ACQUISITION ----

        match loc_client.pose() {
            Some(pose) => {
                ds.pose_lm = Some(pose);
                ds.num_consec_pose_misses = 0;

                if let Some(age_s) = loc_client.pose_age_s() {
                    if age_s > exec_params.pose_stale_age_s {
                        warn!("Pose solution is {:.2} s old", age_s);
                    }
                }
            }
            None => {
                ds.num_consec_pose_misses += 1;

                // Loss of localisation must not halt the loop, carry on with
                // the last known pose
                warn!(
                    "No pose available ({} consecutive misses), using the last known pose",
                    ds.num_consec_pose_misses
                );
            }
        }

        let pose = ds.pose_lm.unwrap_or_default();

        // ---- REFERENCE INTERPOLATION ----

        match ref_traj::interpolate(
            &path,
            &pose,
            ds.mpc_ctrl.horizon(),
            exec_params.lookahead_sep_m,
            exec_params.target_speed_ms,
        ) {
            Ok(reference) => {
                // ---- CONTROLLER PROCESSING ----

                ds.mpc_ctrl_input = InputData {
                    initial_condition: [
                        pose.position_m_lm[0],
                        pose.position_m_lm[1],
                        pose.get_heading(),
                        exec_params.target_speed_ms,
                    ],
                    reference,
                    previous_control: ds.previous_control,
                };

                match ds.mpc_ctrl.proc(&ds.mpc_ctrl_input) {
                    Ok((output, report)) => {
                        if !output.is_optimal {
                            warn!("Solve was not optimal, applying best-effort command");
                        }

                        // ---- COMMAND INTEGRATION ----

                        // The control output is an acceleration but the drive
                        // server takes a speed
                        ds.speed_cmd_ms += output.command.accel_ms2 * CYCLE_PERIOD_S;

                        // The control output is a steering angle but the
                        // drive server takes a turn rate
                        let turn_rate_rads =
                            ds.speed_cmd_ms * output.command.steer_rad / exec_params.wheelbase_m;

                        ds.speed_cmd_ms = clamp(
                            &ds.speed_cmd_ms,
                            &-exec_params.max_speed_ms,
                            &exec_params.max_speed_ms,
                        );

                        ds.drive_dems = DriveDems {
                            speed_ms: ds.speed_cmd_ms,
                            turn_rate_rads,
                        };

                        // Store the applied control for the next cycle's rate
                        // constraints
                        ds.previous_control = output.command;
                        ds.mpc_ctrl_output = Some(output);
                        ds.mpc_ctrl_status_rpt = report;
                    }
                    Err(e) => {
                        // A failed parameter push means the reference was
                        // malformed, re-issue the previous demand
                        warn!("Error during MpcCtrl processing: {}", e)
                    }
                }
            }
            Err(InterpError::EmptyPath) => {
                // No reference available: do not solve, re-issue the previous
                // demand so the command stream never drops
                warn!("No reference available, re-issuing the previous demand");
            }
        }

        // ---- COMMAND OUTPUT ----

        match drive_client.send_demands(&ds.drive_dems) {
            Ok(DriveDemsResponse::DemsOk) => {
                ds.num_consec_drive_errors = 0;
            }
            Ok(r) => warn!("Recieved non-nominal response from DriveServer: {:?}", r),
            Err(DriveClientError::NotConnected) => {
                if ds.num_consec_drive_errors == 0 {
                    error!("Connection to the DriveServer lost");
                }
                ds.num_consec_drive_errors += 1;
            }
            Err(e) => {
                warn!("DriveClient processing error: {}", e);
                ds.num_consec_drive_errors += 1;
            }
        }

        // ---- TELEMETRY ----

        if ds.is_1_hz_cycle {
            info!(
                "Cycle {}: demand = ({:.2} m/s, {:.2} rad/s), solve {:.1} ms, optimal: {}",
                ds.num_cycles,
                ds.drive_dems.speed_ms,
                ds.drive_dems.turn_rate_rads,
                ds.mpc_ctrl_status_rpt.solve_time_ms,
                ds.mpc_ctrl_status_rpt.is_optimal
            );

            session.save(
                format!("mpc_ctrl/status_report_{:08}.json", ds.num_cycles),
                ds.mpc_ctrl_status_rpt,
            );
        }

        // ---- CYCLE MANAGEMENT ----

        let cycle_dur = Instant::now() - cycle_start_instant;

        // Get sleep duration
        match Duration::from_secs_f64(CYCLE_PERIOD_S).checked_sub(cycle_dur) {
            Some(d) => {
                ds.num_consec_cycle_overruns = 0;
                thread::sleep(d);
            }
            None => {
                warn!(
                    "Cycle overran by {:.06} s",
                    cycle_dur.as_secs_f64() - CYCLE_PERIOD_S
                );
                ds.num_consec_cycle_overruns += 1;
            }
        }

        // Increment cycle counter
        ds.num_cycles += 1;
    }
}

/// Build the built-in demo path: a straight diagonal run, matching the drive
/// test course.
fn demo_path() -> Path {
    Path::direct(Vector2::new(1.0, -1.0), Vector2::new(20.0, -20.0), 0.5)
}
