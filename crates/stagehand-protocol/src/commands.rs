//! Names of the commands understood by the worker.
//!
//! The host forwards command names opaquely; these constants exist so the
//! few places that do issue specific commands (the monitor, the shutdown
//! sequence, the worker's dispatcher) agree on spelling.

/// Enumerates attached devices. No arguments.
pub const LIST_DEVICES: &str = "list_devices";
/// Moves a channel to an absolute position: `[device, channel, position]`.
pub const MOVE_TO: &str = "move_to";
/// Moves a channel relative to its position: `[device, channel, direction, step_size]`.
pub const JOG: &str = "jog";
/// Reads a channel position: `[device, channel]`.
pub const GET_POSITION: &str = "get_position";
/// Marks a channel's current position as zero: `[device, channel]`.
pub const SET_ZERO: &str = "set_zero";
/// Disconnects one device: `[device]`.
pub const DISCONNECT_DEVICE: &str = "disconnect_device";
/// Disconnects every device. No arguments.
pub const DISCONNECT_ALL: &str = "disconnect_all";
/// Lists devices with an open session. No arguments.
pub const GET_CONNECTED_DEVICES: &str = "get_connected_devices";
/// Disconnects everything and ends the worker loop. No arguments.
pub const SHUTDOWN: &str = "shutdown";
