use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::chart::ChartBacking;
use crate::error::ConfigError;

/// Order in which the supertagger's beam is explored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BeamDirection {
    /// Start narrow and loosen on lexical failure or missing analysis.
    #[default]
    MostToLeastRestrictive,
    /// Start wide and tighten only when a limit is hit.
    LeastToMostRestrictive,
}

/// Parser configuration.
///
/// Zero means "unlimited" for every limit and pruning bound.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    pub time_limit_ms: u64,
    pub edge_limit: usize,
    /// Most analyses kept per equivalence class.
    pub prune_limit: usize,
    /// Most analyses kept per chart cell, over all its classes.
    pub cell_prune_limit: usize,
    pub lazy_unpacking: bool,
    /// Analyses returned per successful parse.
    pub n_best: usize,
    pub beam_direction: BeamDirection,
    pub chart_backing: ChartBacking,
    pub glue_fallback: bool,
    /// Dump the chart at debug level when a parse fails.
    pub debug_failed_parses: bool,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            time_limit_ms: 0,
            edge_limit: 0,
            prune_limit: 0,
            cell_prune_limit: 0,
            lazy_unpacking: true,
            n_best: 10,
            beam_direction: BeamDirection::default(),
            chart_backing: ChartBacking::default(),
            glue_fallback: false,
            debug_failed_parses: false,
        }
    }
}

impl ParserConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads a configuration from JSON; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    #[must_use]
    pub fn with_time_limit_ms(mut self, ms: u64) -> Self {
        self.time_limit_ms = ms;
        self
    }

    #[must_use]
    pub fn with_edge_limit(mut self, edges: usize) -> Self {
        self.edge_limit = edges;
        self
    }

    #[must_use]
    pub fn with_prune_limit(mut self, limit: usize) -> Self {
        self.prune_limit = limit;
        self
    }

    #[must_use]
    pub fn with_cell_prune_limit(mut self, limit: usize) -> Self {
        self.cell_prune_limit = limit;
        self
    }

    #[must_use]
    pub fn with_lazy_unpacking(mut self, lazy: bool) -> Self {
        self.lazy_unpacking = lazy;
        self
    }

    #[must_use]
    pub fn with_n_best(mut self, n: usize) -> Self {
        self.n_best = n;
        self
    }

    #[must_use]
    pub fn with_beam_direction(mut self, direction: BeamDirection) -> Self {
        self.beam_direction = direction;
        self
    }

    #[must_use]
    pub fn with_chart_backing(mut self, backing: ChartBacking) -> Self {
        self.chart_backing = backing;
        self
    }

    #[must_use]
    pub fn with_glue_fallback(mut self, enabled: bool) -> Self {
        self.glue_fallback = enabled;
        self
    }

    #[must_use]
    pub fn with_debug_failed_parses(mut self, enabled: bool) -> Self {
        self.debug_failed_parses = enabled;
        self
    }

    pub fn time_limit(&self) -> Option<Duration> {
        (self.time_limit_ms > 0).then(|| Duration::from_millis(self.time_limit_ms))
    }

    pub fn edge_limit(&self) -> Option<usize> {
        (self.edge_limit > 0).then_some(self.edge_limit)
    }
}
