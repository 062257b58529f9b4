//! Axis mapping → render configuration.

pub mod config_builder;
