//! # Drive Client
//!
//! This module provides networking abstractions to connect to the drive
//! server, which actuates the vehicle's traction and steering motors from
//! body velocity demands.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::{
    eqpt::{DriveDems, DriveDemsResponse},
    net::{zmq, MonitoredSocket, MonitoredSocketError, SocketOptions},
};

use crate::params::MpcExecParams;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Maximum time to wait for the server to acknowledge a demand.
///
/// Units: milliseconds
const DEMS_RECV_TIMEOUT_MS: i32 = 10;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

pub struct DriveClient {
    dems_socket: MonitoredSocket,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(thiserror::Error, Debug)]
pub enum DriveClientError {
    #[error("Socket error: {0}")]
    SocketError(MonitoredSocketError),

    #[error("The client is not connected to the server")]
    NotConnected,

    #[error("Could not send demands to the server: {0}")]
    SendError(zmq::Error),

    #[error("Could not recieve a message from the server: {0}")]
    RecvError(zmq::Error),

    #[error("Could not serialize the demands: {0}")]
    SerializationError(serde_json::Error),

    #[error("Could not deserialize the response from the server: {0}")]
    DeserializeError(serde_json::Error),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl DriveClient {
    /// Create a new instance of the drive client.
    pub fn new(ctx: &zmq::Context, params: &MpcExecParams) -> Result<Self, DriveClientError> {
        let socket_options = SocketOptions::req_client(DEMS_RECV_TIMEOUT_MS);

        let dems_socket = MonitoredSocket::new(
            ctx,
            zmq::REQ,
            socket_options,
            &params.drive_dems_endpoint,
        )
        .map_err(DriveClientError::SocketError)?;

        Ok(Self { dems_socket })
    }

    /// Send demands to the server.
    ///
    /// Sends the given drive demands to the server. If the server
    /// acknowledges the demands within the configured timeout then `Ok()` is
    /// returned, otherwise an `Err()` is returned.
    pub fn send_demands(
        &mut self,
        demands: &DriveDems,
    ) -> Result<DriveDemsResponse, DriveClientError> {
        // If not connected return now
        if !self.dems_socket.connected() {
            return Err(DriveClientError::NotConnected);
        }

        // Serialize the demands
        let dems_str =
            serde_json::to_string(demands).map_err(DriveClientError::SerializationError)?;

        // Send the demands to the server
        self.dems_socket
            .send(dems_str.as_str(), 0)
            .map_err(DriveClientError::SendError)?;

        // Recieve response back from the server
        let msg = self.dems_socket.recv_msg(0);

        match msg {
            Ok(m) => serde_json::from_str(m.as_str().unwrap_or(""))
                .map_err(DriveClientError::DeserializeError),
            Err(e) => Err(DriveClientError::RecvError(e)),
        }
    }
}
