//! Domain layer types and invariants.

pub mod color;
pub mod file_name;
pub mod request;
