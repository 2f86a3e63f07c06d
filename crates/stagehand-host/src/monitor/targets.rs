//! Registry of monitored (device, channel) pairs.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// One device channel whose position is polled.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonitoringTarget {
    device: String,
    channel: u8,
}

impl MonitoringTarget {
    /// Target for `channel` on `device`.
    #[must_use]
    pub fn new(device: impl Into<String>, channel: u8) -> Self {
        Self {
            device: device.into(),
            channel,
        }
    }

    /// Device identifier (serial number).
    #[must_use]
    pub fn device(&self) -> &str {
        &self.device
    }

    /// Channel number on the device.
    #[must_use]
    pub const fn channel(&self) -> u8 {
        self.channel
    }
}

impl fmt::Display for MonitoringTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.device, self.channel)
    }
}

/// Error parsing a `device:channel` target.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid monitoring target '{input}': expected DEVICE:CHANNEL")]
pub struct TargetParseError {
    input: String,
}

impl FromStr for MonitoringTarget {
    type Err = TargetParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let invalid = || TargetParseError {
            input: input.to_owned(),
        };
        let (device, channel) = input.rsplit_once(':').ok_or_else(invalid)?;
        if device.is_empty() {
            return Err(invalid());
        }
        let channel = channel.parse().map_err(|_| invalid())?;
        Ok(Self::new(device, channel))
    }
}

/// Targets keyed by identity, each with an active flag.
///
/// Iteration order is the key order, so every polling cycle visits targets
/// in the same sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetSet {
    entries: BTreeMap<MonitoringTarget, bool>,
}

impl TargetSet {
    /// An empty set.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Ensures `target` is present and active.
    ///
    /// Returns `true` when the target was not already present.
    pub fn add(&mut self, target: MonitoringTarget) -> bool {
        self.entries.insert(target, true).is_none()
    }

    /// Removes `target`. Returns `false` if it was absent.
    pub fn remove(&mut self, target: &MonitoringTarget) -> bool {
        self.entries.remove(target).is_some()
    }

    /// Sets the active flag on an existing target.
    ///
    /// Returns `false`, changing nothing, if the target is absent.
    pub fn set_active(&mut self, target: &MonitoringTarget, active: bool) -> bool {
        self.entries
            .get_mut(target)
            .map(|flag| *flag = active)
            .is_some()
    }

    /// Moves `from` to `to`, keeping its active flag.
    ///
    /// An absent `from` adds `to` as active.
    pub fn retarget(&mut self, from: &MonitoringTarget, to: MonitoringTarget) {
        let active = self.entries.remove(from).unwrap_or(true);
        self.entries.insert(to, active);
    }

    /// Active flag for `target`, or `None` if absent.
    #[must_use]
    pub fn is_active(&self, target: &MonitoringTarget) -> Option<bool> {
        self.entries.get(target).copied()
    }

    /// Active targets in polling order.
    #[must_use]
    pub fn active(&self) -> Vec<MonitoringTarget> {
        self.entries
            .iter()
            .filter(|(_, active)| **active)
            .map(|(target, _)| target.clone())
            .collect()
    }

    /// Every target with its flag, in polling order.
    #[must_use]
    pub fn entries(&self) -> Vec<(MonitoringTarget, bool)> {
        self.entries
            .iter()
            .map(|(target, active)| (target.clone(), *active))
            .collect()
    }

    /// Number of registered targets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no targets are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
