//! Error taxonomy for the MQTT link and retry controller.

use std::time::Duration;

use thiserror::Error;

/// Errors surfaced by a single link operation (connect, publish, service).
///
/// None of these is fatal to the device: the retry controller and the
/// pipeline decide how to respond, and the worst case is that the message
/// lands in the offline queue.
#[derive(Debug, Error)]
pub enum LinkError {
    /// No CONNACK arrived within the configured window.
    #[error("connect timed out after {0:?}")]
    ConnectTimeout(Duration),

    /// The broker answered the handshake with something other than success.
    #[error("connection refused by broker: {0:?}")]
    Refused(rumqttc::ConnectReturnCode),

    /// The publish was sent but no acknowledgement arrived in time.
    #[error("publish not acknowledged within {0:?}")]
    AckTimeout(Duration),

    /// A publish was attempted without an established session.
    #[error("not connected")]
    NotConnected,

    /// The event loop reported a protocol or network failure.
    #[error("transport error: {0}")]
    Connection(#[from] rumqttc::ConnectionError),

    /// A client request could not be queued (channel closed or full).
    #[error("client request failed: {0}")]
    Client(#[from] rumqttc::ClientError),

    /// TLS material could not be read from disk at session setup.
    #[error("failed to read TLS material from {path}: {source}")]
    TlsMaterial {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Terminal outcome of a publish-with-retry sequence.
#[derive(Debug, Error)]
pub enum PublishError {
    /// The initial connect failed, so no delivery was ever attempted.
    #[error("could not establish a session: {reason}")]
    ConnectFailed { reason: String },

    /// Every permitted try failed. `attempts` counts the total tries made
    /// (first try plus retries), `last_error` the final failure reason.
    #[error("delivery failed after {attempts} attempts: {last_error}")]
    Exhausted { attempts: u32, last_error: String },
}
