//! Application services: the request pipeline and its stages.

pub mod error;
pub mod generator;
pub mod invocation;
pub mod materialize;
pub mod pipeline;
pub mod translate;
pub mod validation;
