//! Collaborator seam for the vendor motion driver.

use thiserror::Error;

/// Channel numbers accepted by multi-channel controllers.
pub const CHANNEL_RANGE: std::ops::RangeInclusive<u8> = 1..=4;

/// Drive parameters applied to a channel before first use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelSettings {
    /// Steps per second.
    pub step_rate: u32,
    /// Steps per second squared.
    pub step_acceleration: u32,
}

/// Errors reported by a [`MotionProvider`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceError {
    /// No device with this identifier is attached.
    #[error("device {device} not found")]
    NotFound {
        /// Device identifier.
        device: String,
    },

    /// The device exists but has no open session.
    #[error("device {device} is not connected")]
    NotConnected {
        /// Device identifier.
        device: String,
    },

    /// The channel has not been configured since the device connected.
    #[error("channel {channel} of device {device} is not configured")]
    ChannelNotConfigured {
        /// Device identifier.
        device: String,
        /// Channel number.
        channel: u8,
    },

    /// The driver reported a failure.
    #[error("{message}")]
    Driver {
        /// Driver-supplied description.
        message: String,
    },
}

impl DeviceError {
    /// Builds a [`DeviceError::Driver`] from any message.
    #[must_use]
    pub fn driver(message: impl Into<String>) -> Self {
        Self::Driver {
            message: message.into(),
        }
    }
}

/// Operations the worker needs from a motion controller driver.
///
/// Calls are made from the worker's single dispatch thread, one at a time.
pub trait MotionProvider {
    /// Identifiers of every attached device.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver cannot enumerate devices.
    fn list_devices(&mut self) -> Result<Vec<String>, DeviceError>;

    /// Opens a session with `device`.
    ///
    /// # Errors
    ///
    /// Returns an error if the device is absent or refuses the connection.
    fn connect(&mut self, device: &str) -> Result<(), DeviceError>;

    /// Closes the session with `device`.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver fails to close the session.
    fn disconnect(&mut self, device: &str) -> Result<(), DeviceError>;

    /// Applies drive parameters to a channel.
    ///
    /// # Errors
    ///
    /// Returns an error if the device is not connected or rejects the settings.
    fn configure_channel(
        &mut self,
        device: &str,
        channel: u8,
        settings: ChannelSettings,
    ) -> Result<(), DeviceError>;

    /// Moves a channel to an absolute position, blocking until it arrives.
    ///
    /// # Errors
    ///
    /// Returns an error if the move cannot be performed.
    fn move_to(&mut self, device: &str, channel: u8, position: i64) -> Result<(), DeviceError>;

    /// Reads a channel's current position.
    ///
    /// # Errors
    ///
    /// Returns an error if the position cannot be read.
    fn position(&mut self, device: &str, channel: u8) -> Result<i64, DeviceError>;

    /// Declares a channel's current position to be zero.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver rejects the request.
    fn set_zero(&mut self, device: &str, channel: u8) -> Result<(), DeviceError>;
}
