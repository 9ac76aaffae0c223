#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Shared types for route corridor hazard matching.
//!
//! A route arrives as an encoded polyline, is decoded into [`GeoPoint`]s,
//! and is scanned against a list of [`HazardRecord`]s pulled from public
//! complaint data. Hazards that land inside the corridor become
//! [`HazardFinding`]s, and the whole pass is summarized in a
//! [`ScanResult`].

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Category assigned when the classifier cannot produce a real answer.
pub const FALLBACK_CATEGORY: &str = "Uncategorized";

/// Lowest severity score a classification can carry.
pub const MIN_SCORE: u8 = 1;

/// Highest severity score a classification can carry.
pub const MAX_SCORE: u8 = 10;

/// Descriptor used when a complaint record has none.
pub const MISSING_DESCRIPTOR: &str = "N/A";

/// A latitude/longitude pair that does not describe a point on Earth.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
#[error("Invalid coordinate ({latitude}, {longitude}): latitude must be within [-90, 90] and longitude within [-180, 180]")]
pub struct InvalidCoordinateError {
    /// The rejected latitude.
    pub latitude: f64,
    /// The rejected longitude.
    pub longitude: f64,
}

/// A WGS84 position in decimal degrees.
///
/// Always finite, with latitude in `[-90, 90]` and longitude in
/// `[-180, 180]`. Immutable once constructed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "GeoPointFields")]
pub struct GeoPoint {
    latitude: f64,
    longitude: f64,
}

#[derive(Deserialize)]
struct GeoPointFields {
    latitude: f64,
    longitude: f64,
}

impl TryFrom<GeoPointFields> for GeoPoint {
    type Error = InvalidCoordinateError;

    fn try_from(fields: GeoPointFields) -> Result<Self, Self::Error> {
        Self::new(fields.latitude, fields.longitude)
    }
}

impl GeoPoint {
    /// Creates a point after checking both axes are finite and in range.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidCoordinateError`] if either value is `NaN`,
    /// infinite, or outside its valid range.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, InvalidCoordinateError> {
        if latitude.is_finite()
            && longitude.is_finite()
            && (-90.0..=90.0).contains(&latitude)
            && (-180.0..=180.0).contains(&longitude)
        {
            Ok(Self {
                latitude,
                longitude,
            })
        } else {
            Err(InvalidCoordinateError {
                latitude,
                longitude,
            })
        }
    }

    /// Latitude in decimal degrees.
    #[must_use]
    pub const fn latitude(&self) -> f64 {
        self.latitude
    }

    /// Longitude in decimal degrees.
    #[must_use]
    pub const fn longitude(&self) -> f64 {
        self.longitude
    }
}

/// Why a hazard's coordinate could not be turned into a [`GeoPoint`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoordinateParseError {
    /// The field was absent or empty.
    #[error("Missing {field}")]
    Missing {
        /// `"latitude"` or `"longitude"`.
        field: &'static str,
    },

    /// The field was present but not a finite number.
    #[error("Non-numeric {field}: {value:?}")]
    NotNumeric {
        /// `"latitude"` or `"longitude"`.
        field: &'static str,
        /// The raw text that failed to parse.
        value: String,
    },

    /// Both fields parsed but the pair is not a valid position.
    #[error(transparent)]
    OutOfRange(#[from] InvalidCoordinateError),
}

/// A public complaint record as delivered by the hazard source.
///
/// Coordinates are kept as raw text because the upstream data does not
/// guarantee they are present or numeric; [`HazardRecord::coordinate`]
/// performs the checked conversion. Text fields tolerate `null` and
/// numbers, so any JSON object deserializes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HazardRecord {
    /// Upstream record identifier, when available.
    #[serde(
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub unique_key: Option<String>,
    /// Upstream creation timestamp (ISO 8601 text), when available.
    #[serde(
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_date: Option<String>,
    /// Complaint type label (e.g. `"Street Condition"`). Absent or null
    /// becomes empty.
    #[serde(default, deserialize_with = "text_or_empty")]
    pub complaint_type: String,
    /// Free-text descriptor (e.g. `"Pothole"`). Absent or null becomes
    /// [`MISSING_DESCRIPTOR`].
    #[serde(default = "default_descriptor", deserialize_with = "descriptor_or_default")]
    pub descriptor: String,
    /// Street address of the complaint, when available.
    #[serde(
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub incident_address: Option<String>,
    /// Raw latitude text.
    #[serde(default, deserialize_with = "string_or_number")]
    pub latitude: Option<String>,
    /// Raw longitude text.
    #[serde(default, deserialize_with = "string_or_number")]
    pub longitude: Option<String>,
}

fn default_descriptor() -> String {
    MISSING_DESCRIPTOR.to_string()
}

fn descriptor_or_default<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_text(deserializer)?.unwrap_or_else(default_descriptor))
}

fn text_or_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_text(deserializer)?.unwrap_or_default())
}

/// Strings pass through, numbers and booleans are rendered as text, and
/// anything else is treated as absent.
fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(v @ (serde_json::Value::Number(_) | serde_json::Value::Bool(_))) => {
            Some(v.to_string())
        }
        _ => None,
    })
}

/// Accepts either a JSON string or a JSON number for a coordinate field.
fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

impl HazardRecord {
    /// Creates a record at a known numeric position.
    #[must_use]
    pub fn new(
        complaint_type: impl Into<String>,
        descriptor: impl Into<String>,
        latitude: f64,
        longitude: f64,
    ) -> Self {
        Self {
            unique_key: None,
            created_date: None,
            complaint_type: complaint_type.into(),
            descriptor: descriptor.into(),
            incident_address: None,
            latitude: Some(latitude.to_string()),
            longitude: Some(longitude.to_string()),
        }
    }

    /// Parses the raw latitude/longitude text into a [`GeoPoint`].
    ///
    /// # Errors
    ///
    /// Returns [`CoordinateParseError`] if either field is missing, is not
    /// a finite number, or the pair is out of range.
    pub fn coordinate(&self) -> Result<GeoPoint, CoordinateParseError> {
        let latitude = parse_axis("latitude", self.latitude.as_deref())?;
        let longitude = parse_axis("longitude", self.longitude.as_deref())?;
        Ok(GeoPoint::new(latitude, longitude)?)
    }
}

fn parse_axis(field: &'static str, raw: Option<&str>) -> Result<f64, CoordinateParseError> {
    let text = raw
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(CoordinateParseError::Missing { field })?;

    text.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| CoordinateParseError::NotNumeric {
            field,
            value: text.to_string(),
        })
}

/// Severity assessment of a single complaint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    /// Severity from 1 (minor inconvenience) to 10 (immediate danger).
    pub score: u8,
    /// Free-form category label (e.g. `"Road Hazard"`).
    pub category: String,
}

impl Classification {
    /// Creates a classification, clamping the score into `1..=10`.
    #[must_use]
    pub fn new(score: u8, category: impl Into<String>) -> Self {
        Self {
            score: score.clamp(MIN_SCORE, MAX_SCORE),
            category: category.into(),
        }
    }

    /// The low-severity value used whenever classification fails.
    #[must_use]
    pub fn fallback() -> Self {
        Self::new(MIN_SCORE, FALLBACK_CATEGORY)
    }
}

/// A hazard found inside the route corridor, with its classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HazardFinding {
    /// Upstream record identifier, when available.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique_key: Option<String>,
    /// Upstream creation timestamp, when available.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_date: Option<String>,
    /// Complaint type label.
    pub complaint_type: String,
    /// Free-text descriptor.
    pub descriptor: String,
    /// Street address, when available.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub incident_address: Option<String>,
    /// Parsed position of the hazard.
    pub location: GeoPoint,
    /// Planar distance to the corridor, in degrees.
    pub distance: f64,
    /// Whether the hazard lies inside the corridor.
    pub is_near: bool,
    /// Classifier output.
    pub classification: Classification,
    /// Whether the classification's category is one the caller marked
    /// unsafe, i.e. whether its score feeds the total.
    pub is_counted: bool,
}

impl HazardFinding {
    /// Builds a finding for a hazard that passed the proximity test.
    ///
    /// `is_near` is always `true` here, so `is_counted` can never be set on
    /// a hazard outside the corridor.
    #[must_use]
    pub fn near(
        hazard: &HazardRecord,
        location: GeoPoint,
        distance: f64,
        classification: Classification,
        is_counted: bool,
    ) -> Self {
        Self {
            unique_key: hazard.unique_key.clone(),
            created_date: hazard.created_date.clone(),
            complaint_type: hazard.complaint_type.clone(),
            descriptor: hazard.descriptor.clone(),
            incident_address: hazard.incident_address.clone(),
            location,
            distance,
            is_near: true,
            classification,
            is_counted,
        }
    }
}

/// Whether the route geometry could be used for proximity queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CorridorStatus {
    /// The route decoded into a line with this many vertices.
    Usable {
        /// Number of decoded route vertices.
        vertices: usize,
    },
    /// The route could not be decoded or had too few points. No hazard can
    /// be near an unusable corridor.
    Unusable {
        /// Human-readable failure description.
        reason: String,
    },
}

impl CorridorStatus {
    /// Returns `true` for [`CorridorStatus::Usable`].
    #[must_use]
    pub const fn is_usable(&self) -> bool {
        matches!(self, Self::Usable { .. })
    }
}

/// Aggregate output of one hazard scan over one route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanResult {
    /// Geometry status of the scanned route.
    pub corridor: CorridorStatus,
    /// Hazards inside the corridor, in input order.
    pub findings: Vec<HazardFinding>,
    /// Sum of scores over counted findings only.
    pub total_hazard_score: u32,
    /// Number of hazard records examined.
    pub hazards_checked: usize,
    /// Number of hazard records skipped for unparseable coordinates.
    pub hazards_skipped: usize,
}

impl ScanResult {
    /// Iterates over findings whose score contributes to the total.
    pub fn counted_findings(&self) -> impl Iterator<Item = &HazardFinding> {
        self.findings.iter().filter(|f| f.is_counted)
    }
}
