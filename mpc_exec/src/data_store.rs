//! # Data Store

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use comms_if::eqpt::DriveDems;

use crate::{
    loc::Pose,
    mpc_ctrl::{self, MpcCommand},
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Global data store for the executable.
#[derive(Default)]
pub struct DataStore {
    // Cycle management
    /// Number of cycles already executed
    pub num_cycles: u128,

    /// True if this cycle falls on a 1Hz boundary
    pub is_1_hz_cycle: bool,

    // Localisation
    /// Last known vehicle pose. Held over from earlier cycles when the pose
    /// source is unavailable.
    pub pose_lm: Option<Pose>,

    // MpcCtrl
    pub mpc_ctrl: mpc_ctrl::MpcCtrl,
    pub mpc_ctrl_input: mpc_ctrl::InputData,
    pub mpc_ctrl_output: Option<mpc_ctrl::SolutionResult>,
    pub mpc_ctrl_status_rpt: mpc_ctrl::StatusReport,

    // Command state
    /// The running speed command the solved accelerations integrate into.
    pub speed_cmd_ms: f64,

    /// The control actually applied in the last cycle, feeding the next
    /// cycle's rate constraints.
    pub previous_control: MpcCommand,

    /// The demand sent to the drive server this cycle.
    pub drive_dems: DriveDems,

    // Monitoring Counters
    /// Number of consecutive cycle overruns
    pub num_consec_cycle_overruns: u64,

    /// Number of consecutive cycles without a fresh pose
    pub num_consec_pose_misses: u64,

    /// Number of consecutive drive client errors
    pub num_consec_drive_errors: u64,
}

// ---------------------------------------------------------------------------
// IMPLS
// ---------------------------------------------------------------------------

impl DataStore {
    /// Perform actions required at the start of a cycle.
    ///
    /// Clears those items that need clearing at the start of a cycle, and sets the 1Hz cycle flag.
    pub fn cycle_start(&mut self, cycle_frequency_hz: f64) {
        self.is_1_hz_cycle = self.num_cycles % (cycle_frequency_hz as u128) == 0;

        self.mpc_ctrl_input = mpc_ctrl::InputData::default();
        self.mpc_ctrl_output = None;
    }
}
