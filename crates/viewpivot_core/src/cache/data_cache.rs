//! Data cache.
//!
//! # Responsibility
//! - Run queries through the injected engine at most once per fingerprint.
//! - Re-project cached rows onto a new axis mapping without re-querying.
//!
//! # Invariants
//! - A fingerprint equal to `ViewState::cached_query.fingerprint` is the only
//!   cache-hit condition.
//! - The cache keeps no rows of its own; they live in `ViewState`, which is
//!   borrowed per call.

use crate::cache::fingerprint::Fingerprint;
use crate::model::axis::AxisMapping;
use crate::model::row::Row;
use crate::model::view_state::{now_epoch_ms, CachedQuery, FilterSpec, ViewState, ViewType};
use crate::projection::config_builder::{build_projection_config, ProjectionConfig};
use log::{debug, error, info};
use serde_json::Value;
use std::cell::Cell;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::rc::Rc;
use std::time::Instant;

/// Query engine failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryError {
    pub descriptor: String,
    pub message: String,
}

impl QueryError {
    pub fn new(descriptor: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            descriptor: descriptor.into(),
            message: message.into(),
        }
    }
}

impl Display for QueryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "query `{}` failed: {}", self.descriptor, self.message)
    }
}

impl Error for QueryError {}

/// External query engine contract.
pub trait QueryEngine {
    fn execute(&self, descriptor: &str, params: &[Value]) -> Result<Vec<Row>, QueryError>;
}

/// Cached rows plus the configuration to draw them with.
#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    pub config: ProjectionConfig,
    pub rows: Rc<Vec<Row>>,
}

/// Hit/miss counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

/// Fingerprint-keyed single-entry query cache.
pub struct DataCache {
    engine: Rc<dyn QueryEngine>,
    hits: Cell<u64>,
    misses: Cell<u64>,
}

impl DataCache {
    pub fn new(engine: Rc<dyn QueryEngine>) -> Self {
        Self {
            engine,
            hits: Cell::new(0),
            misses: Cell::new(0),
        }
    }

    /// Returns rows for `(descriptor, params)`, querying only on a miss.
    ///
    /// # Errors
    /// - Returns the engine's `QueryError` unchanged; the previous cache
    ///   entry is kept in that case.
    pub fn query_and_cache(
        &self,
        state: &mut ViewState,
        descriptor: &str,
        params: &[Value],
        filters: &[FilterSpec],
    ) -> Result<Rc<Vec<Row>>, QueryError> {
        let fingerprint = Fingerprint::of(descriptor, params);

        if let Some(cached) = state.cached_query.as_mut() {
            if cached.fingerprint == fingerprint {
                self.hits.set(self.hits.get() + 1);
                cached.filters = filters.to_vec();
                debug!(
                    "event=cache_query module=cache status=hit fingerprint={fingerprint} rows={}",
                    cached.results.len()
                );
                return Ok(Rc::clone(&cached.results));
            }
        }

        self.misses.set(self.misses.get() + 1);
        let started_at = Instant::now();
        let rows = match self.engine.execute(descriptor, params) {
            Ok(rows) => Rc::new(rows),
            Err(err) => {
                error!(
                    "event=cache_query module=cache status=error fingerprint={fingerprint} duration_ms={} error={err}",
                    started_at.elapsed().as_millis()
                );
                return Err(err);
            }
        };
        info!(
            "event=cache_query module=cache status=miss fingerprint={fingerprint} rows={} duration_ms={}",
            rows.len(),
            started_at.elapsed().as_millis()
        );

        state.cached_query = Some(CachedQuery {
            descriptor: descriptor.to_string(),
            params: params.to_vec(),
            filters: filters.to_vec(),
            results: Rc::clone(&rows),
            timestamp: now_epoch_ms(),
            fingerprint,
        });
        Ok(rows)
    }

    /// Builds a projection of the cached rows for `view_type` + `mapping`.
    ///
    /// Returns `None` when nothing is cached. Never queries.
    pub fn reproject_cached_data(
        &self,
        state: &ViewState,
        view_type: ViewType,
        mapping: &AxisMapping,
    ) -> Option<Projection> {
        let Some(rows) = state.cached_rows() else {
            info!("event=cache_reproject module=cache status=skipped reason=empty view={view_type}");
            return None;
        };

        let config =
            build_projection_config(view_type, mapping, &state.selection, &state.active_filters);
        debug!(
            "event=cache_reproject module=cache status=ok view={view_type} rows={}",
            rows.len()
        );
        Some(Projection { config, rows })
    }

    /// Drops cached rows, fingerprint and filters. Returns whether anything
    /// was cached.
    pub fn clear(&self, state: &mut ViewState) -> bool {
        let dropped = state.cached_query.take().is_some();
        if dropped {
            info!("event=cache_clear module=cache status=ok");
        }
        dropped
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.get(),
            misses: self.misses.get(),
        }
    }
}
