//! Table layout constants.

use crate::geometry::{CARD_HEIGHT, CARD_WIDTH};
use kurbo::{Point, Size};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Default cursor/card emission interval in milliseconds.
pub const DEFAULT_THROTTLE_MS: u64 = 50;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid table config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Table config out of range: {0}")]
    OutOfRange(&'static str),
}

/// Canonical table dimensions in table units. Display scaling never
/// touches these values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableConfig {
    pub card_width: f64,
    pub card_height: f64,
    pub table_width: f64,
    pub table_height: f64,
    /// Radius of the inner ring drawn around the deck.
    pub inner_circle_radius: f64,
    /// Cards released beyond this ring (plus half a card) are turned over.
    pub outer_circle_radius: f64,
    /// Radius of the circle cards are dealt onto.
    pub scatter_radius: f64,
    pub throttle_ms: u64,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            card_width: CARD_WIDTH,
            card_height: CARD_HEIGHT,
            table_width: 1024.0,
            table_height: 768.0,
            inner_circle_radius: 100.0,
            outer_circle_radius: 350.0,
            scatter_radius: 220.0,
            throttle_ms: DEFAULT_THROTTLE_MS,
        }
    }
}

impl TableConfig {
    /// Parse a config from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.card_width > 0.0 && self.card_height > 0.0) {
            return Err(ConfigError::OutOfRange("card size must be positive"));
        }
        if !(self.table_width > 0.0 && self.table_height > 0.0) {
            return Err(ConfigError::OutOfRange("table size must be positive"));
        }
        if self.outer_circle_radius < 0.0 || self.scatter_radius < 0.0 {
            return Err(ConfigError::OutOfRange("radii must not be negative"));
        }
        Ok(())
    }

    pub fn card_size(&self) -> Size {
        Size::new(self.card_width, self.card_height)
    }

    pub fn table_size(&self) -> Size {
        Size::new(self.table_width, self.table_height)
    }

    pub fn table_center(&self) -> Point {
        Point::new(self.table_width / 2.0, self.table_height / 2.0)
    }

    /// Center distance past which a released card is turned face up.
    pub fn release_distance(&self) -> f64 {
        self.outer_circle_radius + self.card_width / 2.0
    }

    pub fn throttle_interval(&self) -> Duration {
        Duration::from_millis(self.throttle_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TableConfig::default();
        assert_eq!(config.table_center(), Point::new(512.0, 384.0));
        assert!((config.release_distance() - 425.0).abs() < f64::EPSILON);
        assert_eq!(config.throttle_interval(), Duration::from_millis(50));
    }

    #[test]
    fn test_from_json_partial() {
        let config = TableConfig::from_json(r#"{"scatter_radius": 180.0}"#).unwrap();
        assert!((config.scatter_radius - 180.0).abs() < f64::EPSILON);
        assert!((config.table_width - 1024.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_from_json_rejects_bad_size() {
        let err = TableConfig::from_json(r#"{"card_width": 0}"#).unwrap_err();
        assert!(matches!(err, ConfigError::OutOfRange(_)));
        let err = TableConfig::from_json("not json").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
