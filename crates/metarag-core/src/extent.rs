//! Geographic and temporal extents of a document.
//!
//! Each extent is a closed set of variants; a value carries the fields of
//! exactly one of them. `to_canonical` renders the tagged JSON form used in
//! `structured` payloads, with a `wkt` member for the geometric variants.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GeographicExtent {
    #[serde(rename = "string")]
    StringPlace { place_name: String, #[serde(default)] description: String },
    Point { lat: f64, lon: f64 },
    #[serde(rename = "bbox")]
    BoundingBox { north: f64, west: f64, south: f64, east: f64 },
    Surface { wkt: String },
}

impl GeographicExtent {
    pub fn place(place_name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::StringPlace { place_name: place_name.into(), description: description.into() }
    }

    pub fn point(lat: f64, lon: f64) -> Self { Self::Point { lat, lon } }

    pub fn bbox(north: f64, west: f64, south: f64, east: f64) -> Self {
        Self::BoundingBox { north, west, south, east }
    }

    pub fn surface(wkt: impl Into<String>) -> Self { Self::Surface { wkt: wkt.into() } }

    /// Short variant tag used by the flat projection.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::StringPlace { .. } => "string",
            Self::Point { .. } => "point",
            Self::BoundingBox { .. } => "bbox",
            Self::Surface { .. } => "surface",
        }
    }

    /// Well-known text, absent for free-text places.
    pub fn wkt(&self) -> Option<String> {
        match self {
            Self::StringPlace { .. } => None,
            Self::Point { lat, lon } => Some(format!("POINT({} {})", fmt_float(*lon), fmt_float(*lat))),
            Self::BoundingBox { north, west, south, east } => {
                let (n, w, s, e) = (fmt_float(*north), fmt_float(*west), fmt_float(*south), fmt_float(*east));
                Some(format!("POLYGON(({w} {s}, {e} {s}, {e} {n}, {w} {n}, {w} {s}))"))
            }
            Self::Surface { wkt } => Some(wkt.clone()),
        }
    }

    pub fn to_canonical(&self) -> Value {
        let mut v = serde_json::to_value(self).unwrap_or(Value::Null);
        if let (Some(wkt), Value::Object(map)) = (self.wkt(), &mut v) {
            map.insert("wkt".into(), Value::String(wkt));
        }
        v
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            Self::StringPlace { place_name, .. } if place_name.trim().is_empty() => {
                Err(Error::validation("geographic extent: empty place name"))
            }
            Self::StringPlace { .. } => Ok(()),
            Self::Point { lat, lon } => check_lat_lon(*lat, *lon),
            Self::BoundingBox { north, west, south, east } => {
                check_lat_lon(*north, *west)?;
                check_lat_lon(*south, *east)?;
                if south > north {
                    return Err(Error::validation(format!("bbox: south {south} above north {north}")));
                }
                Ok(())
            }
            Self::Surface { wkt } if wkt.trim().is_empty() => Err(Error::validation("surface: empty wkt")),
            Self::Surface { .. } => Ok(()),
        }
    }
}

fn check_lat_lon(lat: f64, lon: f64) -> Result<()> {
    if !(-90.0..=90.0).contains(&lat) {
        return Err(Error::validation(format!("latitude {lat} outside [-90, 90]")));
    }
    if !(-180.0..=180.0).contains(&lon) {
        return Err(Error::validation(format!("longitude {lon} outside [-180, 180]")));
    }
    Ok(())
}

/// Render a float the way coordinate text is written: integral values keep one decimal.
pub fn fmt_float(x: f64) -> String {
    if x.is_finite() && x.fract() == 0.0 && x.abs() < 1e16 {
        format!("{x:.1}")
    } else {
        format!("{x}")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TemporalExtent {
    Period {
        date_from: DateTime<Utc>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        date_expected: Option<DateTime<Utc>>,
        date_to: DateTime<Utc>,
    },
    #[serde(rename = "string")]
    StringDescriptive {
        date_from: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        date_expected: Option<String>,
        date_to: String,
        #[serde(default)]
        description: String,
    },
    #[serde(rename = "number")]
    Numeric {
        date_from: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        date_expected: Option<f64>,
        date_to: f64,
        #[serde(default)]
        description: String,
    },
    #[serde(rename = "distribution")]
    BetaDistribution {
        #[serde(default)]
        description: String,
        start_instant: DateTime<Utc>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        expected_instant: Option<DateTime<Utc>>,
        end_instant: DateTime<Utc>,
        alpha: f64,
        beta: f64,
    },
}

impl TemporalExtent {
    pub fn period(from: DateTime<Utc>, expected: Option<DateTime<Utc>>, to: DateTime<Utc>) -> Self {
        Self::Period { date_from: from, date_expected: expected, date_to: to }
    }

    pub fn descriptive(
        from: impl Into<String>,
        expected: Option<String>,
        to: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self::StringDescriptive {
            date_from: from.into(),
            date_expected: expected,
            date_to: to.into(),
            description: description.into(),
        }
    }

    pub fn numeric(from: f64, expected: Option<f64>, to: f64, description: impl Into<String>) -> Self {
        Self::Numeric { date_from: from, date_expected: expected, date_to: to, description: description.into() }
    }

    pub fn beta(
        description: impl Into<String>,
        start: DateTime<Utc>,
        expected: Option<DateTime<Utc>>,
        end: DateTime<Utc>,
        alpha: f64,
        beta: f64,
    ) -> Self {
        Self::BetaDistribution {
            description: description.into(),
            start_instant: start,
            expected_instant: expected,
            end_instant: end,
            alpha,
            beta,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Period { .. } => "period",
            Self::StringDescriptive { .. } => "string",
            Self::Numeric { .. } => "number",
            Self::BetaDistribution { .. } => "distribution",
        }
    }

    pub fn description(&self) -> Option<&str> {
        match self {
            Self::Period { .. } => None,
            Self::StringDescriptive { description, .. }
            | Self::Numeric { description, .. }
            | Self::BetaDistribution { description, .. } => Some(description),
        }
    }

    /// Comparable `(from, expected, to)`: epoch seconds for periods, raw numbers for numeric years.
    pub fn numeric_range(&self) -> Option<(f64, Option<f64>, f64)> {
        match self {
            Self::Period { date_from, date_expected, date_to } => Some((
                date_from.timestamp() as f64,
                date_expected.map(|d| d.timestamp() as f64),
                date_to.timestamp() as f64,
            )),
            Self::Numeric { date_from, date_expected, date_to, .. } => Some((*date_from, *date_expected, *date_to)),
            Self::StringDescriptive { .. } | Self::BetaDistribution { .. } => None,
        }
    }

    pub fn to_canonical(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| json!({ "type": self.kind() }))
    }

    pub fn validate(&self) -> Result<()> {
        if let Some((from, expected, to)) = self.numeric_range() {
            if !(from.is_finite() && to.is_finite() && expected.map_or(true, f64::is_finite)) {
                return Err(Error::validation(format!("{} extent: bounds must be finite", self.kind())));
            }
            if from > to {
                return Err(Error::validation(format!("{} extent: from {from} after to {to}", self.kind())));
            }
            if let Some(e) = expected {
                if e < from || e > to {
                    return Err(Error::validation(format!("{} extent: expected {e} outside range", self.kind())));
                }
            }
        }
        if let Self::BetaDistribution { start_instant, expected_instant, end_instant, alpha, beta, .. } = self {
            if !(*alpha > 0.0 && *beta > 0.0 && alpha.is_finite() && beta.is_finite()) {
                return Err(Error::validation(format!("beta distribution: alpha={alpha} beta={beta} must be positive")));
            }
            if start_instant >= end_instant {
                return Err(Error::validation("beta distribution: start must precede end"));
            }
            if let Some(e) = expected_instant {
                if e <= start_instant || e >= end_instant {
                    return Err(Error::validation("beta distribution: expected instant outside (start, end)"));
                }
            }
        }
        Ok(())
    }
}
