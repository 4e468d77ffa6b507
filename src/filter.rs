//! Output filters and the registry that builds them from settings.
use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

use crate::geometry::Point;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FilterError {
    #[error("Unknown filter '{0}'")]
    Unknown(String),

    #[error("Filter '{filter}' requires parameter '{parameter}'")]
    MissingParameter { filter: String, parameter: String },

    #[error("Filter '{filter}' parameter '{parameter}' is invalid: {reason}")]
    InvalidParameter {
        filter: String,
        parameter: String,
        reason: String,
    },
}

/// A pure point transform applied after coordinate mapping.
pub trait Filter: Send + Sync + fmt::Debug {
    fn filter(&self, point: Point) -> Point;
}

/// Numeric filter parameters as they appear in the settings file.
pub type FilterParams = BTreeMap<String, f64>;

pub type FilterFactory =
    Box<dyn Fn(&FilterParams) -> Result<Box<dyn Filter>, FilterError> + Send + Sync>;

/// Apply filters in configured order.
pub fn apply_filters(filters: &[Box<dyn Filter>], point: Point) -> Point {
    filters.iter().fold(point, |p, f| f.filter(p))
}

// -- Built-in filters -----------------------------------------

/// Shift every point by a constant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Offset {
    pub x: f64,
    pub y: f64,
}

impl Filter for Offset {
    fn filter(&self, point: Point) -> Point {
        point + Point::new(self.x, self.y)
    }
}

/// Scale every point about the origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scale {
    pub x: f64,
    pub y: f64,
}

impl Filter for Scale {
    fn filter(&self, point: Point) -> Point {
        point.scale(Point::new(self.x, self.y))
    }
}

/// Round to the nearest multiple of `grid`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Snap {
    pub grid: f64,
}

impl Filter for Snap {
    fn filter(&self, point: Point) -> Point {
        Point::new(
            (point.x / self.grid).round() * self.grid,
            (point.y / self.grid).round() * self.grid,
        )
    }
}

fn param(params: &FilterParams, filter: &str, name: &str, default: Option<f64>) -> Result<f64, FilterError> {
    params
        .get(name)
        .copied()
        .or(default)
        .ok_or_else(|| FilterError::MissingParameter {
            filter: filter.to_string(),
            parameter: name.to_string(),
        })
}

// -- Registry -------------------------------------------------

/// Maps a filter name to a constructor.
pub struct FilterRegistry {
    factories: BTreeMap<String, FilterFactory>,
}

impl FilterRegistry {
    pub fn empty() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// Registry with `offset`, `scale` and `snap`.
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register("offset", |p| {
            Ok(Box::new(Offset {
                x: param(p, "offset", "x", Some(0.0))?,
                y: param(p, "offset", "y", Some(0.0))?,
            }))
        });
        registry.register("scale", |p| {
            Ok(Box::new(Scale {
                x: param(p, "scale", "x", Some(1.0))?,
                y: param(p, "scale", "y", Some(1.0))?,
            }))
        });
        registry.register("snap", |p| {
            let grid = param(p, "snap", "grid", None)?;
            if grid <= 0.0 || !grid.is_finite() {
                return Err(FilterError::InvalidParameter {
                    filter: "snap".to_string(),
                    parameter: "grid".to_string(),
                    reason: format!("must be a positive number, got {grid}"),
                });
            }
            Ok(Box::new(Snap { grid }))
        });
        registry
    }

    pub fn register<F>(&mut self, name: &str, factory: F)
    where
        F: Fn(&FilterParams) -> Result<Box<dyn Filter>, FilterError> + Send + Sync + 'static,
    {
        self.factories.insert(name.to_string(), Box::new(factory));
    }

    pub fn construct(&self, name: &str, params: &FilterParams) -> Result<Box<dyn Filter>, FilterError> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| FilterError::Unknown(name.to_string()))?;
        factory(params)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }
}

impl Default for FilterRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}
