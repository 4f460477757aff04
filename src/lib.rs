//! Stereogramaxo request gateway: validates stereogram requests, stages
//! uploads and drives the external generator.

pub mod application;
pub mod config;
pub mod domain;
pub mod infra;
