//! Visualizer configuration

use crate::canvas::Rgba;
use serde::{Deserialize, Serialize};
use soul_core::Result;
use std::time::Duration;

/// Visualizer settings
///
/// Missing fields fall back to defaults when deserializing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualizerConfig {
    /// Number of frequency bars around the ring (default: 64)
    pub bar_count: usize,

    /// Minimum bar length in pixels, so silent bins stay visible (default: 4)
    pub bar_floor_px: f32,

    /// Number of background stars (default: 180)
    pub star_count: usize,

    /// Number of nebula clouds (default: 4)
    pub nebula_count: usize,

    /// Interval between nebula color changes in milliseconds (default: 6000)
    pub nebula_retarget_ms: u64,

    /// Shortest delay between shooting stars in milliseconds (default: 1500)
    pub shooting_star_min_delay_ms: u64,

    /// Longest delay between shooting stars in milliseconds (default: 5000)
    pub shooting_star_max_delay_ms: u64,

    /// Longest frame step fed to animations in milliseconds (default: 100)
    pub max_frame_step_ms: u64,

    /// Background fill
    pub background: Rgba,

    /// Colors nebulae and bars pick from
    pub palette: Vec<Rgba>,
}

impl Default for VisualizerConfig {
    fn default() -> Self {
        Self {
            bar_count: 64,
            bar_floor_px: 4.0,
            star_count: 180,
            nebula_count: 4,
            nebula_retarget_ms: 6000,
            shooting_star_min_delay_ms: 1500,
            shooting_star_max_delay_ms: 5000,
            max_frame_step_ms: 100,
            background: Rgba::rgb(5, 6, 20),
            palette: vec![
                Rgba::rgb(124, 58, 237),
                Rgba::rgb(219, 39, 119),
                Rgba::rgb(37, 99, 235),
                Rgba::rgb(13, 148, 136),
                Rgba::rgb(234, 88, 12),
            ],
        }
    }
}

impl VisualizerConfig {
    /// Parse a config from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Nebula retarget interval
    pub fn nebula_retarget(&self) -> Duration {
        Duration::from_millis(self.nebula_retarget_ms.max(1))
    }

    /// Longest frame step
    pub fn max_frame_step(&self) -> Duration {
        Duration::from_millis(self.max_frame_step_ms)
    }

    /// Shooting star delay range in seconds, ordered
    pub(crate) fn shooting_star_delay_secs(&self) -> (f32, f32) {
        let min = self.shooting_star_min_delay_ms as f32 / 1000.0;
        let max = self.shooting_star_max_delay_ms as f32 / 1000.0;
        if min <= max {
            (min, max)
        } else {
            (max, min)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = VisualizerConfig::default();
        assert_eq!(config.bar_count, 64);
        assert_eq!(config.star_count, 180);
        assert_eq!(config.nebula_count, 4);
        assert_eq!(config.nebula_retarget(), Duration::from_secs(6));
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = VisualizerConfig::from_json(r#"{"bar_count": 32}"#).unwrap();
        assert_eq!(config.bar_count, 32);
        assert_eq!(config.star_count, 180);
        assert_eq!(config.palette.len(), 5);
    }

    #[test]
    fn swapped_delay_bounds_are_ordered() {
        let config = VisualizerConfig {
            shooting_star_min_delay_ms: 4000,
            shooting_star_max_delay_ms: 1000,
            ..VisualizerConfig::default()
        };
        assert_eq!(config.shooting_star_delay_secs(), (1.0, 4.0));
    }
}
