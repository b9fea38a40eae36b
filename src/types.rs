use serde::{Deserialize, Serialize};
use std::fmt;

/// Input source of the CP750
///
/// The device identifies sources by short protocol tokens (`dig_1`, `analog`,
/// ...). Tokens outside the documented set are carried through as
/// [`InputSource::Other`] so an unexpected device reply never breaks a poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputSource {
    Digital1,
    Digital2,
    Digital3,
    Digital4,
    Analog,
    NonSync,
    Mic,
    /// Token reported by the device that is not part of the documented set
    Other(String),
}

impl InputSource {
    /// The documented input sources, in front-panel order
    pub const KNOWN: [InputSource; 7] = [
        InputSource::Digital1,
        InputSource::Digital2,
        InputSource::Digital3,
        InputSource::Digital4,
        InputSource::Analog,
        InputSource::NonSync,
        InputSource::Mic,
    ];

    /// Parse a protocol token into an input source
    ///
    /// Total: unknown tokens map to [`InputSource::Other`].
    pub fn from_token(token: &str) -> Self {
        match token {
            "dig_1" => InputSource::Digital1,
            "dig_2" => InputSource::Digital2,
            "dig_3" => InputSource::Digital3,
            "dig_4" => InputSource::Digital4,
            "analog" => InputSource::Analog,
            "non_sync" => InputSource::NonSync,
            "mic" => InputSource::Mic,
            other => InputSource::Other(other.to_string()),
        }
    }

    /// The protocol token sent over the wire
    pub fn token(&self) -> &str {
        match self {
            InputSource::Digital1 => "dig_1",
            InputSource::Digital2 => "dig_2",
            InputSource::Digital3 => "dig_3",
            InputSource::Digital4 => "dig_4",
            InputSource::Analog => "analog",
            InputSource::NonSync => "non_sync",
            InputSource::Mic => "mic",
            InputSource::Other(token) => token,
        }
    }

    /// Human-readable label as shown on the CP750 front panel
    ///
    /// [`InputSource::Other`] has no label and falls back to its raw token.
    pub fn label(&self) -> &str {
        match self {
            InputSource::Digital1 => "Digital 1",
            InputSource::Digital2 => "Digital 2",
            InputSource::Digital3 => "Digital 3",
            InputSource::Digital4 => "Digital 4",
            InputSource::Analog => "Multi-Ch Analog",
            InputSource::NonSync => "NonSync",
            InputSource::Mic => "Mic",
            InputSource::Other(token) => token,
        }
    }

    /// Look up a known source by its human-readable label
    pub fn from_label(label: &str) -> Option<Self> {
        Self::KNOWN.iter().find(|s| s.label() == label).cloned()
    }

    /// Whether this source is part of the documented set
    pub fn is_known(&self) -> bool {
        !matches!(self, InputSource::Other(_))
    }
}

impl fmt::Display for InputSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Immutable state snapshot produced by one poll cycle
///
/// `None` means "could not be determined this cycle" (device unreachable or
/// gated off), which is distinct from `false`/zero. A snapshot is always
/// replaced wholesale: fields are either all from one successful query
/// sequence or the whole snapshot is the all-absent [`DeviceSnapshot::offline`]
/// sentinel, never a mix of cycles.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DeviceSnapshot {
    /// Fader level as reported by the device
    pub fader: Option<f64>,
    /// Active input source
    pub input: Option<InputSource>,
    /// Global mute state
    pub mute: Option<bool>,
    /// Signal validity of digital inputs 1..=4
    pub digital_input_valid: [Option<bool>; 4],
}

impl DeviceSnapshot {
    /// The all-absent snapshot published while the device is unreachable
    pub fn offline() -> Self {
        Self::default()
    }

    /// Whether every field is absent
    pub fn is_offline(&self) -> bool {
        *self == Self::default()
    }

    /// Validity of digital input `channel` (1..=4)
    pub fn dig_valid(&self, channel: usize) -> Option<bool> {
        self.digital_input_valid
            .get(channel.checked_sub(1)?)
            .copied()
            .flatten()
    }
}
