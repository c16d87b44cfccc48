//! Core runtime components of the telemetry pipeline.

pub mod message;
pub mod pipeline;
pub mod queue;
pub mod reading;
pub mod sensor;
pub mod store;
