use crate::error::{Cp750Error, Result};
use crate::protocol;
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use std::time::Duration;

/// Default TCP port of the CP750 control interface
pub const DEFAULT_PORT: u16 = 61408;

/// Default display name
pub const DEFAULT_NAME: &str = "Dolby CP750";

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Configuration for one CP750 device instance
///
/// Immutable after construction. Assembled by whatever host application
/// integrates the device; the optional `power_switch` names an external
/// condition consulted by the availability gate before any socket activity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Hostname or IP address of the processor
    pub host: String,
    /// TCP port of the control interface
    #[serde(default = "default_port")]
    pub port: u16,
    /// Display name for logs and host UIs
    #[serde(default = "default_name")]
    pub name: String,
    /// Identifier of an external power condition gating the device, if any
    #[serde(default)]
    pub power_switch: Option<String>,
    /// Which value domain `set_fader` accepts and sends
    #[serde(default)]
    pub fader_scale: FaderScale,
    /// Cadence of the background poll loop
    #[serde(default = "default_poll_interval")]
    pub poll_interval: Duration,
}

impl DeviceConfig {
    /// Create a configuration with the default port, name, and cadence
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            name: DEFAULT_NAME.to_string(),
            power_switch: None,
            fader_scale: FaderScale::default(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Set the TCP port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the display name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Gate the device on an external power condition
    pub fn with_power_switch(mut self, condition: impl Into<String>) -> Self {
        self.power_switch = Some(condition.into());
        self
    }

    /// Set the fader value domain
    pub fn with_fader_scale(mut self, scale: FaderScale) -> Self {
        self.fader_scale = scale;
        self
    }

    /// Set the poll cadence
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

/// Value domain of the fader write path
///
/// CP750 firmware revisions disagree on whether the fader takes decibels or
/// an integer percent, so the scale is a configuration choice rather than a
/// protocol constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaderScale {
    /// Decibels, -90.0..=+10.0, sent verbatim
    #[default]
    Decibels,
    /// Percent, 0..=100, rounded to an integer before sending
    Percent,
}

impl FaderScale {
    /// The valid fader range for this scale
    pub fn range(&self) -> RangeInclusive<f64> {
        match self {
            FaderScale::Decibels => -90.0..=10.0,
            FaderScale::Percent => 0.0..=100.0,
        }
    }

    /// Validate `value` and build the device write command
    pub(crate) fn fader_command(&self, value: f64) -> Result<String> {
        let range = self.range();
        if !range.contains(&value) {
            return Err(Cp750Error::Validation(format!(
                "fader value {value} outside {:?}..={:?}",
                range.start(),
                range.end()
            )));
        }
        Ok(match self {
            FaderScale::Decibels => protocol::set_fader_command(value),
            // Coarser integer domain expected by percent-scale firmware.
            FaderScale::Percent => protocol::set_fader_percent_command(value.round() as i64),
        })
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_name() -> String {
    DEFAULT_NAME.to_string()
}

fn default_poll_interval() -> Duration {
    DEFAULT_POLL_INTERVAL
}
