//! soilcast — field-sensor telemetry agent with durable store-and-forward
//!
//! This crate turns periodic soil and air readings into integrity-checked
//! JSON messages, delivers them over MQTT/TLS, and guarantees that no
//! reading is silently lost while the link is down: failed messages land
//! in a bounded durable queue that survives power loss and is flushed on
//! reconnect.
//!
//! ## Modules
//!
//! * `config` — Configuration structures, loading, validation, and
//!   defaults. Supports TOML configuration files with validation via the
//!   `validator` crate.
//!
//! * `core` — Core runtime components:
//!   - Reading validation and the sensor acquisition seam
//!   - Sealed message construction (canonical payload + SHA-256 digest)
//!   - Durable record store and the bounded offline queue
//!   - The per-cycle pipeline orchestrator
//!
//! * `logger` — Centralized logging initialization using `tracing`, with
//!   console output in multiple formats (compact, pretty, JSON).
//!
//! The MQTT link and the publish-with-retry controller live in the
//! `soilcast-mqtt` workspace crate.

pub mod config;
pub mod core;
pub mod logger;
