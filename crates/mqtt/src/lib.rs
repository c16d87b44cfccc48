//! soilcast-mqtt — MQTT link and retry controller for the soilcast agent.
//!
//! This crate owns everything between "here is a finished message" and "the
//! broker acknowledged it": the TLS/MQTT session, the observable connection
//! state machine, the exponential backoff schedule, and the bounded
//! publish-with-retry controller that the telemetry pipeline drives.
//!
//! # Architecture
//!
//! ```text
//! Pipeline (soilcast core)
//!     ↓
//! RetryPublisher (bounded tries, backoff between them)
//!     ↓
//! Link trait  ←— FakeLink in tests
//!     ↓
//! MqttLink (rumqttc AsyncClient + inline EventLoop)
//!     ↓
//! Network (TCP/TLS)
//! ```
//!
//! The device runs a single logical thread, so `MqttLink` drives the rumqttc
//! event loop inline: `connect()` polls until CONNACK, `publish()` polls
//! until PUBACK, and `service()` pumps keep-alive traffic between cycles.
//! There is at most one in-flight publish at any time.

pub mod backoff;
pub mod client;
pub mod config;
pub mod error;
pub mod retry;
pub mod state;

pub use backoff::Backoff;
pub use client::MqttLink;
pub use config::Config;
pub use error::{LinkError, PublishError};
pub use retry::{RetryPolicy, RetryPublisher};
pub use state::LinkState;

/// Seam between the retry controller and the concrete transport.
///
/// `MqttLink` is the production implementation; tests substitute fakes.
/// All methods are driven from the single pipeline task, hence `&mut self`
/// everywhere — the link never needs internal synchronization.
#[async_trait::async_trait]
pub trait Link {
    /// Establishes a secured session. Idempotent when already connected.
    ///
    /// On failure the link stays disconnected and the reason is returned as
    /// an error value; the caller decides whether and when to retry.
    async fn connect(&mut self) -> Result<(), LinkError>;

    /// Delivers one payload and waits for the broker acknowledgement.
    ///
    /// Fails fast with [`LinkError::NotConnected`] when no session is up.
    async fn publish(&mut self, payload: &[u8]) -> Result<(), LinkError>;

    /// Pure observation of the session state, no side effects.
    fn is_connected(&self) -> bool;

    /// Lets the transport process keep-alive and inbound traffic.
    ///
    /// Must be called periodically while the device is otherwise idle.
    /// Never publishes and never retries on its own.
    async fn service(&mut self);
}
