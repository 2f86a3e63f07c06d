//! In-memory motion provider used by the shipped binary and tests.

use std::collections::BTreeMap;
use std::thread;
use std::time::Duration;

use tracing::debug;

use crate::provider::{ChannelSettings, DeviceError, MotionProvider};

const SIMULATED_TARGET: &str = "stagehand_worker::simulated";

#[derive(Debug, Default)]
struct SimulatedDevice {
    connected: bool,
    channels: BTreeMap<u8, SimulatedChannel>,
}

#[derive(Debug)]
struct SimulatedChannel {
    position: i64,
    settings: Option<ChannelSettings>,
}

/// A provider whose devices exist only in memory.
///
/// Positions survive disconnects, as a physical stage would, but channel
/// settings must be reapplied after every reconnect.
#[derive(Debug, Default)]
pub struct SimulatedProvider {
    devices: BTreeMap<String, SimulatedDevice>,
    latency: Duration,
}

impl SimulatedProvider {
    /// A provider with the given devices attached.
    #[must_use]
    pub fn with_devices<I, S>(devices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            devices: devices
                .into_iter()
                .map(|device| (device.into(), SimulatedDevice::default()))
                .collect(),
            latency: Duration::ZERO,
        }
    }

    /// Delays every motion command by `latency`.
    #[must_use]
    pub const fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    fn device(&mut self, device: &str) -> Result<&mut SimulatedDevice, DeviceError> {
        let entry = self
            .devices
            .get_mut(device)
            .ok_or_else(|| DeviceError::NotFound {
                device: device.to_owned(),
            })?;
        if entry.connected {
            Ok(entry)
        } else {
            Err(DeviceError::NotConnected {
                device: device.to_owned(),
            })
        }
    }

    fn channel(&mut self, device: &str, channel: u8) -> Result<&mut SimulatedChannel, DeviceError> {
        self.device(device)?
            .channels
            .get_mut(&channel)
            .ok_or_else(|| DeviceError::ChannelNotConfigured {
                device: device.to_owned(),
                channel,
            })
    }

    fn simulate_motion(&self) {
        if !self.latency.is_zero() {
            thread::sleep(self.latency);
        }
    }
}

impl MotionProvider for SimulatedProvider {
    fn list_devices(&mut self) -> Result<Vec<String>, DeviceError> {
        Ok(self.devices.keys().cloned().collect())
    }

    fn connect(&mut self, device: &str) -> Result<(), DeviceError> {
        let entry = self
            .devices
            .get_mut(device)
            .ok_or_else(|| DeviceError::NotFound {
                device: device.to_owned(),
            })?;
        entry.connected = true;
        debug!(target: SIMULATED_TARGET, device, "connected");
        Ok(())
    }

    fn disconnect(&mut self, device: &str) -> Result<(), DeviceError> {
        let entry = self.device(device)?;
        entry.connected = false;
        for channel in entry.channels.values_mut() {
            channel.settings = None;
        }
        debug!(target: SIMULATED_TARGET, device, "disconnected");
        Ok(())
    }

    fn configure_channel(
        &mut self,
        device: &str,
        channel: u8,
        settings: ChannelSettings,
    ) -> Result<(), DeviceError> {
        let entry = self.device(device)?;
        entry
            .channels
            .entry(channel)
            .and_modify(|existing| existing.settings = Some(settings))
            .or_insert(SimulatedChannel {
                position: 0,
                settings: Some(settings),
            });
        debug!(
            target: SIMULATED_TARGET,
            device,
            channel,
            step_rate = settings.step_rate,
            step_acceleration = settings.step_acceleration,
            "channel configured"
        );
        Ok(())
    }

    fn move_to(&mut self, device: &str, channel: u8, position: i64) -> Result<(), DeviceError> {
        self.simulate_motion();
        let state = self.channel(device, channel)?;
        if state.settings.is_none() {
            return Err(DeviceError::ChannelNotConfigured {
                device: device.to_owned(),
                channel,
            });
        }
        state.position = position;
        Ok(())
    }

    fn position(&mut self, device: &str, channel: u8) -> Result<i64, DeviceError> {
        Ok(self.channel(device, channel)?.position)
    }

    fn set_zero(&mut self, device: &str, channel: u8) -> Result<(), DeviceError> {
        self.channel(device, channel)?.position = 0;
        Ok(())
    }
}
