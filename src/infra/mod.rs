//! Infrastructure adapters and runtime bootstrap.

pub mod error;
pub mod generator;
pub mod http;
pub mod outputs;
pub mod staging;
pub mod telemetry;
