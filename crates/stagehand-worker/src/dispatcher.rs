//! Maps worker commands onto provider actions.
//!
//! Every command produces exactly one [`Response`]. Argument and provider
//! failures become error responses; nothing escapes to the read loop.

use serde_json::json;
use stagehand_config::Config;
use stagehand_protocol::{Command, Response, commands};
use tracing::{debug, warn};

use crate::arguments::{
    ArgumentError, ChannelArgs, JogArgs, MoveArgs, expect_no_arguments, parse_device,
};
use crate::provider::{ChannelSettings, DeviceError, MotionProvider};
use crate::session::DeviceSessions;

const DISPATCH_TARGET: &str = "stagehand_worker::dispatcher";

/// Tunables for command handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchSettings {
    /// Lowest position a jog may reach.
    pub jog_min: i64,
    /// Highest position a jog may reach.
    pub jog_max: i64,
    /// Parameters applied to each channel on first use.
    pub channel: ChannelSettings,
}

impl DispatchSettings {
    /// Settings derived from a loaded configuration.
    #[must_use]
    pub const fn from_config(config: &Config) -> Self {
        let (jog_min, jog_max) = config.jog_bounds();
        Self {
            jog_min,
            jog_max,
            channel: ChannelSettings {
                step_rate: config.step_rate,
                step_acceleration: config.step_acceleration,
            },
        }
    }
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Why a command failed, before rendering into a response.
enum Failure {
    Arguments(ArgumentError),
    Connect { device: String, error: DeviceError },
    Action { prefix: &'static str, error: DeviceError },
}

impl From<ArgumentError> for Failure {
    fn from(error: ArgumentError) -> Self {
        Self::Arguments(error)
    }
}

impl Failure {
    fn action(prefix: &'static str) -> impl FnOnce(DeviceError) -> Self {
        move |error| Self::Action { prefix, error }
    }

    fn into_response(self) -> Response {
        let message = match self {
            Self::Arguments(error) => error.to_string(),
            Self::Connect { device, error } => {
                format!("Failed to connect to device {device}: {error}")
            }
            Self::Action { prefix, error } => format!("{prefix}: {error}"),
        };
        Response::error(message)
    }
}

/// Executes commands against a [`MotionProvider`].
pub struct Dispatcher<P> {
    provider: P,
    sessions: DeviceSessions,
    settings: DispatchSettings,
    running: bool,
}

impl<P: MotionProvider> Dispatcher<P> {
    /// A dispatcher driving `provider`.
    pub const fn new(provider: P, settings: DispatchSettings) -> Self {
        Self {
            provider,
            sessions: DeviceSessions::new(settings.channel),
            settings,
            running: true,
        }
    }

    /// Whether the worker should keep reading commands.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.running
    }

    /// The device sessions.
    #[must_use]
    pub const fn sessions(&self) -> &DeviceSessions {
        &self.sessions
    }

    /// Handles one command, echoing its identifier on the response.
    pub fn dispatch(&mut self, command: &Command) -> Response {
        debug!(
            target: DISPATCH_TARGET,
            command = command.name(),
            args = ?command.args(),
            "processing command"
        );
        let response = self
            .execute(command)
            .unwrap_or_else(Failure::into_response);
        if !response.is_success() {
            warn!(
                target: DISPATCH_TARGET,
                command = command.name(),
                error = %response.message(),
                "command failed"
            );
        }
        response.with_id(command.id())
    }

    /// Disconnects every device; used when input ends.
    pub fn disconnect_all(&mut self) {
        self.sessions.disconnect_all(&mut self.provider);
    }

    fn execute(&mut self, command: &Command) -> Result<Response, Failure> {
        let name = command.name();
        let args = command.args();
        match name {
            commands::LIST_DEVICES => {
                expect_no_arguments(name, args)?;
                let devices = self
                    .provider
                    .list_devices()
                    .map_err(Failure::action("Failed to list devices"))?;
                Ok(Response::success(json!(devices)))
            }
            commands::MOVE_TO => {
                let MoveArgs { target, position } = MoveArgs::parse(name, args)?;
                self.prepare(&target)?;
                self.provider
                    .move_to(&target.device, target.channel, position)
                    .map_err(Failure::action("Move failed"))?;
                Ok(Response::success("Move complete"))
            }
            commands::JOG => self.jog(JogArgs::parse(name, args)?),
            commands::GET_POSITION => {
                let target = ChannelArgs::parse(name, args)?;
                self.prepare(&target)?;
                let position = self
                    .provider
                    .position(&target.device, target.channel)
                    .map_err(Failure::action("Failed to get position"))?;
                Ok(Response::success(position))
            }
            commands::SET_ZERO => {
                let target = ChannelArgs::parse(name, args)?;
                self.prepare(&target)?;
                self.provider
                    .set_zero(&target.device, target.channel)
                    .map_err(Failure::action("Zero failed"))?;
                Ok(Response::success("Zero set"))
            }
            commands::DISCONNECT_DEVICE => {
                let device = parse_device(name, args)?;
                self.sessions.disconnect(&mut self.provider, &device);
                Ok(Response::success(format!("Device {device} disconnected")))
            }
            commands::DISCONNECT_ALL => {
                expect_no_arguments(name, args)?;
                self.disconnect_all();
                Ok(Response::success("All devices disconnected"))
            }
            commands::GET_CONNECTED_DEVICES => {
                expect_no_arguments(name, args)?;
                Ok(Response::success(json!(self.sessions.connected())))
            }
            commands::SHUTDOWN => {
                self.running = false;
                self.disconnect_all();
                Ok(Response::success("Worker shutting down"))
            }
            other => Ok(Response::error(format!("Unknown command: {other}"))),
        }
    }

    fn jog(&mut self, args: JogArgs) -> Result<Response, Failure> {
        let JogArgs {
            target,
            direction,
            step_size,
        } = args;
        self.prepare(&target)?;
        let current = self
            .provider
            .position(&target.device, target.channel)
            .map_err(Failure::action("Jog failed"))?;
        // Not `clamp`: a misconfigured min above max must not panic.
        let destination = current
            .saturating_add(direction.saturating_mul(step_size))
            .max(self.settings.jog_min)
            .min(self.settings.jog_max);
        debug!(
            target: DISPATCH_TARGET,
            device = %target.device,
            channel = target.channel,
            current,
            destination,
            "jogging"
        );
        self.provider
            .move_to(&target.device, target.channel, destination)
            .map_err(Failure::action("Jog failed"))?;
        Ok(Response::success("Jog complete"))
    }

    /// Connects the device and configures the channel as needed.
    fn prepare(&mut self, target: &ChannelArgs) -> Result<(), Failure> {
        self.sessions
            .ensure_connected(&mut self.provider, &target.device)
            .map_err(|error| Failure::Connect {
                device: target.device.clone(),
                error,
            })?;
        self.sessions
            .ensure_channel(&mut self.provider, &target.device, target.channel)
            .map_err(Failure::action("Failed to configure channel"))
    }
}
