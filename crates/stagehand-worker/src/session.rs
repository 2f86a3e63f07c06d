//! Per-device connection state tracked by the dispatcher.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info, warn};

use crate::provider::{ChannelSettings, DeviceError, MotionProvider};

const SESSION_TARGET: &str = "stagehand_worker::session";

/// Connection state of one device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No open session.
    #[default]
    Disconnected,
    /// A connection attempt is in progress.
    Connecting,
    /// The session is open.
    Connected,
}

#[derive(Debug, Default)]
struct Session {
    state: ConnectionState,
    configured: BTreeSet<u8>,
}

/// Sessions for every device the worker has been asked about.
///
/// A session is created on first reference and removed by an explicit
/// disconnect. Channel settings are applied lazily, once per connection.
#[derive(Debug)]
pub struct DeviceSessions {
    sessions: BTreeMap<String, Session>,
    channel_settings: ChannelSettings,
}

impl DeviceSessions {
    /// Empty registry applying `channel_settings` to channels on first use.
    #[must_use]
    pub const fn new(channel_settings: ChannelSettings) -> Self {
        Self {
            sessions: BTreeMap::new(),
            channel_settings,
        }
    }

    /// State of `device`; unknown devices are disconnected.
    #[must_use]
    pub fn state(&self, device: &str) -> ConnectionState {
        self.sessions
            .get(device)
            .map_or(ConnectionState::Disconnected, |session| session.state)
    }

    /// Opens a session with `device` unless one is already open.
    ///
    /// # Errors
    ///
    /// Returns the provider's error; the device is left disconnected.
    pub fn ensure_connected<P>(&mut self, provider: &mut P, device: &str) -> Result<(), DeviceError>
    where
        P: MotionProvider + ?Sized,
    {
        let session = self.sessions.entry(device.to_owned()).or_default();
        if session.state == ConnectionState::Connected {
            debug!(target: SESSION_TARGET, device, "device already connected");
            return Ok(());
        }

        session.state = ConnectionState::Connecting;
        session.configured.clear();
        debug!(target: SESSION_TARGET, device, "connecting to device");
        match provider.connect(device) {
            Ok(()) => {
                session.state = ConnectionState::Connected;
                info!(target: SESSION_TARGET, device, "device connected");
                Ok(())
            }
            Err(error) => {
                session.state = ConnectionState::Disconnected;
                warn!(target: SESSION_TARGET, device, error = %error, "device connection failed");
                Err(error)
            }
        }
    }

    /// Applies channel settings if not yet done for this connection.
    ///
    /// # Errors
    ///
    /// Returns the provider's error; the channel stays unconfigured.
    pub fn ensure_channel<P>(
        &mut self,
        provider: &mut P,
        device: &str,
        channel: u8,
    ) -> Result<(), DeviceError>
    where
        P: MotionProvider + ?Sized,
    {
        let settings = self.channel_settings;
        let Some(session) = self.sessions.get_mut(device) else {
            return Err(DeviceError::NotConnected {
                device: device.to_owned(),
            });
        };
        if session.configured.contains(&channel) {
            return Ok(());
        }
        provider.configure_channel(device, channel, settings)?;
        session.configured.insert(channel);
        debug!(
            target: SESSION_TARGET,
            device,
            channel,
            step_rate = settings.step_rate,
            step_acceleration = settings.step_acceleration,
            "channel configured"
        );
        Ok(())
    }

    /// Closes and forgets the session for `device`.
    ///
    /// Driver errors are logged, not returned: the session is gone either way.
    pub fn disconnect<P>(&mut self, provider: &mut P, device: &str)
    where
        P: MotionProvider + ?Sized,
    {
        let Some(session) = self.sessions.remove(device) else {
            return;
        };
        if session.state != ConnectionState::Connected {
            return;
        }
        if let Err(error) = provider.disconnect(device) {
            warn!(target: SESSION_TARGET, device, error = %error, "disconnect failed");
        } else {
            info!(target: SESSION_TARGET, device, "device disconnected");
        }
    }

    /// Closes and forgets every session.
    pub fn disconnect_all<P>(&mut self, provider: &mut P)
    where
        P: MotionProvider + ?Sized,
    {
        let devices: Vec<String> = self.sessions.keys().cloned().collect();
        for device in devices {
            self.disconnect(provider, &device);
        }
    }

    /// Devices with an open session, in identifier order.
    #[must_use]
    pub fn connected(&self) -> Vec<String> {
        self.sessions
            .iter()
            .filter(|(_, session)| session.state == ConnectionState::Connected)
            .map(|(device, _)| device.clone())
            .collect()
    }
}
