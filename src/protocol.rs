//! Command builders and reply parsing for the CP750 line protocol.
//!
//! The protocol is plain ASCII over TCP: one CRLF-terminated command per
//! line, one reply line per command, no framing, no checksums, and no
//! distinguished error replies. A reply echoes the command name followed by
//! the value, e.g. `cp750.sys.fader -12.5`; parsers here take the second
//! whitespace token and treat anything short or malformed as absent.

use crate::types::InputSource;

/// Query the current fader level
pub const FADER_QUERY: &str = "cp750.sys.fader ?";

/// Query the active input source
pub const INPUT_MODE_QUERY: &str = "cp750.sys.input_mode ?";

/// Query the global mute state
pub const MUTE_QUERY: &str = "cp750.sys.mute ?";

/// Query whether digital input `channel` (1..=4) carries a valid signal
pub fn dig_valid_query(channel: usize) -> String {
    format!("cp750.state.dig_{channel}_valid ?")
}

/// Write command for a fader level on the decibel scale
pub fn set_fader_command(value: f64) -> String {
    format!("cp750.sys.fader {value}")
}

/// Write command for a fader level on the integer percent scale
pub fn set_fader_percent_command(value: i64) -> String {
    format!("cp750.sys.fader {value}")
}

/// Write command for the input source
pub fn set_input_command(source: &InputSource) -> String {
    format!("cp750.sys.input_mode {}", source.token())
}

/// Write command for the mute state
pub fn set_mute_command(on: bool) -> String {
    format!("cp750.sys.mute {}", u8::from(on))
}

/// Extract the value token (second whitespace-delimited token) from a reply
pub fn reply_value(reply: &str) -> Option<&str> {
    reply.split_whitespace().nth(1)
}

/// Parse a reply whose value token is a float
pub fn float_value(reply: &str) -> Option<f64> {
    reply_value(reply)?.parse().ok()
}

/// Parse a reply whose value token is `0` or `1`
///
/// The device only ever sends `0` or `1`; any other token reads as `false`,
/// matching how the processor itself treats boolean fields.
pub fn bool_value(reply: &str) -> Option<bool> {
    reply_value(reply).map(|token| token == "1")
}
