//! Query result caching across projection switches.

pub mod data_cache;
pub mod fingerprint;
