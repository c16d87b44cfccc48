//! Connection state tracking for the MQTT link.
//!
//! The link lifecycle flows through these states:
//! - `Disconnected` -> `Connecting` -> `Connected` (successful handshake)
//! - `Connected` -> `Publishing` -> `Connected` (acknowledged delivery)
//! - any state -> `Disconnected` (broker closed, network error, timeout)
//!
//! Transitions are driven by [`MqttLink`](crate::client::MqttLink) as it
//! pumps the event loop; the pipeline observes the state for logging and to
//! decide whether a queue flush is worth attempting.

use std::fmt;

/// Represents the current state of the MQTT link.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkState {
    /// No session. The `String` carries the reason for the last drop, or
    /// a placeholder before the first connection attempt.
    Disconnected(String),

    /// Actively performing the TLS + MQTT handshake, waiting for CONNACK.
    Connecting,

    /// Session established with active keep-alive. The only state in which
    /// a publish can be attempted.
    Connected,

    /// A publish is in flight, waiting for the broker acknowledgement.
    Publishing,
}

impl LinkState {
    /// Returns a short static identifier for the current state.
    ///
    /// Useful for logging where the disconnect reason isn't needed.
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkState::Disconnected(_) => "Disconnected",
            LinkState::Connecting => "Connecting",
            LinkState::Connected => "Connected",
            LinkState::Publishing => "Publishing",
        }
    }

    /// Returns contextual details: the disconnect reason, or an empty
    /// string for states that carry none.
    pub fn details(&self) -> &str {
        match self {
            LinkState::Disconnected(reason) => reason,
            _ => "",
        }
    }

    /// True when a session is up (connected or mid-publish).
    pub fn is_connected(&self) -> bool {
        matches!(self, LinkState::Connected | LinkState::Publishing)
    }
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())?;
        if !self.details().is_empty() {
            write!(f, " ({})", self.details())?;
        }
        Ok(())
    }
}
