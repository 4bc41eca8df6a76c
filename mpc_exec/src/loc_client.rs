//! # Localisation Client
//!
//! The LocClient subscribes to the pose stream published by the external
//! localisation server. A background thread drains the subscription and
//! keeps the latest pose in a shared slot, so the control loop's read is a
//! bounded, non-blocking operation: it either gets the most recent pose or
//! learns that none has arrived yet.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    thread,
};

use chrono::{DateTime, Utc};
use log::{error, warn};

use crate::loc::Pose;
use crate::params::MpcExecParams;
use comms_if::{
    eqpt::LocData,
    net::{zmq, MonitoredSocket, MonitoredSocketError, SocketOptions},
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

pub struct LocClient {
    _bg_jh: thread::JoinHandle<()>,
    bg_run: Arc<AtomicBool>,
    latest: Arc<Mutex<Option<(Pose, DateTime<Utc>)>>>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum LocClientError {
    #[error("Socket error: {0}")]
    SocketError(MonitoredSocketError),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl LocClient {
    /// Create a new instance of the localisation client.
    pub fn new(ctx: &zmq::Context, params: &MpcExecParams) -> Result<Self, LocClientError> {
        let socket_options = SocketOptions::sub_client(params.pose_recv_timeout_ms);

        let socket = MonitoredSocket::new(ctx, zmq::SUB, socket_options, &params.loc_endpoint)
            .map_err(LocClientError::SocketError)?;

        let bg_run = Arc::new(AtomicBool::new(true));
        let latest = Arc::new(Mutex::new(None));

        let bg_run_clone = bg_run.clone();
        let latest_clone = latest.clone();

        let bg_jh = thread::spawn(move || bg_thread(socket, bg_run_clone, latest_clone));

        Ok(Self {
            _bg_jh: bg_jh,
            bg_run,
            latest,
        })
    }

    /// Get the latest pose received from the localisation server, or `None`
    /// if no pose has arrived yet.
    pub fn pose(&self) -> Option<Pose> {
        let latest = self
            .latest
            .lock()
            .expect("LocClient: latest pose mutex poisoned");

        latest.map(|(pose, _)| pose)
    }

    /// Get the age of the latest pose in seconds, or `None` if no pose has
    /// arrived yet.
    pub fn pose_age_s(&self) -> Option<f64> {
        let latest = self
            .latest
            .lock()
            .expect("LocClient: latest pose mutex poisoned");

        latest
            .map(|(_, timestamp)| Utc::now() - timestamp)
            .and_then(util::time::duration_to_seconds)
    }
}

impl Drop for LocClient {
    fn drop(&mut self) {
        self.bg_run.store(false, Ordering::Relaxed);
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Background thread, updates the latest pose when the server publishes
/// something new.
fn bg_thread(
    socket: MonitoredSocket,
    run: Arc<AtomicBool>,
    latest: Arc<Mutex<Option<(Pose, DateTime<Utc>)>>>,
) {
    while run.load(Ordering::Relaxed) {
        // Read string from the socket. The receive timeout bounds this wait,
        // EAGAIN just means nothing arrived within it.
        let msg = match socket.recv_string(0) {
            Ok(Ok(s)) => s,
            Ok(Err(_)) => {
                warn!("Non UTF-8 message from the localisation server");
                continue;
            }
            Err(zmq::Error::EAGAIN) => continue,
            Err(e) => {
                error!("Error receiving message from the localisation server: {:?}", e);
                break;
            }
        };

        // Deserialize the message
        let data: LocData = match serde_json::from_str(&msg) {
            Ok(d) => d,
            Err(e) => {
                warn!("Error deserialising message from the localisation server: {:?}", e);
                continue;
            }
        };

        let LocData::Pose { timestamp, .. } = data;
        let pose = Pose::from_loc_data(&data);

        {
            let mut slot = latest.lock().expect("LocClient: latest pose mutex poisoned");

            *slot = Some((pose, timestamp));
        }
    }
}
