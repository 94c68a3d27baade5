use crate::error::GraphError;
use serde::{Deserialize, Serialize};

/// Editor tuning knobs. Every field has a default so partial JSON documents
/// are accepted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    pub grid_size: f64,
    pub snap_to_grid: bool,
    pub min_zoom: f64,
    pub max_zoom: f64,
    /// Extra screen pixels queried around the viewport when culling.
    pub cull_margin: f64,
    /// Fraction of the viewport the culling window may drift before requery.
    pub cull_hysteresis: f64,
    /// Fraction of the viewport the window extends in the direction of travel.
    pub prefetch_bias: f64,
    pub port_hit_radius: f64,
    pub connection_hit_tolerance: f64,
    pub spatial_cell_size: f64,
    /// Debug override: update the spatial index on every move, even mid-drag.
    pub live_index_updates: bool,
}

impl Default for EditorConfig {
    fn default() -> Self {
        EditorConfig {
            grid_size: 20.0,
            snap_to_grid: true,
            min_zoom: 0.1,
            max_zoom: 4.0,
            cull_margin: 200.0,
            cull_hysteresis: 0.25,
            prefetch_bias: 0.5,
            port_hit_radius: 8.0,
            connection_hit_tolerance: 6.0,
            spatial_cell_size: 256.0,
            live_index_updates: cfg!(feature = "live-index"),
        }
    }
}

impl EditorConfig {
    pub fn from_json_str(s: &str) -> Result<Self, GraphError> {
        let cfg: EditorConfig = serde_json::from_str(s).map_err(|e| GraphError::Config(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_json_value(v: serde_json::Value) -> Result<Self, GraphError> {
        let cfg: EditorConfig = serde_json::from_value(v).map_err(|e| GraphError::Config(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), GraphError> {
        let positive = |name: &str, v: f64| {
            if v.is_finite() && v > 0.0 {
                Ok(())
            } else {
                Err(GraphError::Config(format!("{} must be positive and finite", name)))
            }
        };
        positive("grid_size", self.grid_size)?;
        positive("min_zoom", self.min_zoom)?;
        positive("max_zoom", self.max_zoom)?;
        positive("spatial_cell_size", self.spatial_cell_size)?;
        if self.min_zoom > self.max_zoom {
            return Err(GraphError::Config("min_zoom exceeds max_zoom".into()));
        }
        for (name, v) in [
            ("cull_margin", self.cull_margin),
            ("cull_hysteresis", self.cull_hysteresis),
            ("prefetch_bias", self.prefetch_bias),
            ("port_hit_radius", self.port_hit_radius),
            ("connection_hit_tolerance", self.connection_hit_tolerance),
        ] {
            if !v.is_finite() || v < 0.0 {
                return Err(GraphError::Config(format!("{} must be non-negative and finite", name)));
            }
        }
        Ok(())
    }
}
