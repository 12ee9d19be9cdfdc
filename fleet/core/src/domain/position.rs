// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Position Reports
//!
//! Value objects for observed vehicle locations and the parser that turns an
//! inbound message payload into a candidate report.
//!
//! A payload must be a JSON object with numeric `latitude` and `longitude`
//! fields inside the valid coordinate ranges. An optional `timestamp` may be
//! supplied as an RFC 3339 string or as integer epoch milliseconds; when it is
//! absent (or `null`) the store stamps the report at append time.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::geofence::{CoordinateError, Coordinates};

// ============================================================================
// Value Objects
// ============================================================================

/// Non-empty vehicle identifier (e.g. `vehicle-1`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VehicleId(String);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("vehicle id must not be empty")]
pub struct VehicleIdError;

impl VehicleId {
    pub fn parse(value: impl Into<String>) -> Result<Self, VehicleIdError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(VehicleIdError);
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for VehicleId {
    type Error = VehicleIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<VehicleId> for String {
    fn from(id: VehicleId) -> Self {
        id.0
    }
}

impl std::fmt::Display for VehicleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Persistence identifier assigned by the store on append.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReportId(pub Uuid);

impl ReportId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ReportId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ReportId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Reports
// ============================================================================

/// A report that has been evaluated but not yet persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPositionReport {
    pub vehicle_id: VehicleId,
    pub location: Coordinates,
    pub timestamp: Option<DateTime<Utc>>,
    pub inside_geofence: bool,
}

/// A persisted report. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionReport {
    pub id: ReportId,
    pub vehicle_id: VehicleId,
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp: DateTime<Utc>,
    pub inside_geofence: bool,
}

impl PositionReport {
    /// Materializes a new report with its store-assigned identity.
    pub fn from_new(report: NewPositionReport, id: ReportId, now: DateTime<Utc>) -> Self {
        Self {
            id,
            vehicle_id: report.vehicle_id,
            latitude: report.location.latitude,
            longitude: report.location.longitude,
            timestamp: report.timestamp.unwrap_or(now),
            inside_geofence: report.inside_geofence,
        }
    }

    pub fn location(&self) -> Coordinates {
        Coordinates {
            latitude: self.latitude,
            longitude: self.longitude,
        }
    }
}

// ============================================================================
// Inbound payload parsing
// ============================================================================

/// Why an inbound payload was dropped before reaching the store.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MalformedPosition {
    #[error("payload is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("payload is not a JSON object")]
    NotAnObject,

    #[error("missing field `{0}`")]
    MissingField(&'static str),

    #[error("field `{0}` is not a number")]
    NotNumeric(&'static str),

    #[error(transparent)]
    OutOfRange(#[from] CoordinateError),

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),
}

impl MalformedPosition {
    /// Short label used as a metrics dimension.
    pub fn reason(&self) -> &'static str {
        match self {
            MalformedPosition::InvalidJson(_) => "invalid_json",
            MalformedPosition::NotAnObject => "not_an_object",
            MalformedPosition::MissingField(_) => "missing_field",
            MalformedPosition::NotNumeric(_) => "not_numeric",
            MalformedPosition::OutOfRange(_) => "out_of_range",
            MalformedPosition::InvalidTimestamp(_) => "invalid_timestamp",
        }
    }
}

/// Validated content of one inbound position message.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionPayload {
    pub location: Coordinates,
    pub timestamp: Option<DateTime<Utc>>,
}

impl PositionPayload {
    pub fn parse(raw: &[u8]) -> Result<Self, MalformedPosition> {
        let value: Value = serde_json::from_slice(raw)
            .map_err(|e| MalformedPosition::InvalidJson(e.to_string()))?;
        let object = value.as_object().ok_or(MalformedPosition::NotAnObject)?;

        let latitude = numeric_field(object, "latitude")?;
        let longitude = numeric_field(object, "longitude")?;
        let location = Coordinates::new(latitude, longitude)?;

        let timestamp = match object.get("timestamp") {
            None | Some(Value::Null) => None,
            Some(raw) => Some(parse_timestamp(raw)?),
        };

        Ok(Self { location, timestamp })
    }
}

fn numeric_field(
    object: &serde_json::Map<String, Value>,
    field: &'static str,
) -> Result<f64, MalformedPosition> {
    match object.get(field) {
        None | Some(Value::Null) => Err(MalformedPosition::MissingField(field)),
        Some(Value::Number(n)) => n.as_f64().ok_or(MalformedPosition::NotNumeric(field)),
        Some(_) => Err(MalformedPosition::NotNumeric(field)),
    }
}

fn parse_timestamp(raw: &Value) -> Result<DateTime<Utc>, MalformedPosition> {
    match raw {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| MalformedPosition::InvalidTimestamp(format!("{}: {}", s, e))),
        Value::Number(n) => n
            .as_i64()
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single())
            .ok_or_else(|| MalformedPosition::InvalidTimestamp(n.to_string())),
        other => Err(MalformedPosition::InvalidTimestamp(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vehicle_id_rejects_blank() {
        assert!(VehicleId::parse("").is_err());
        assert!(VehicleId::parse("   ").is_err());
        assert_eq!(VehicleId::parse("vehicle-1").unwrap().as_str(), "vehicle-1");
    }

    #[test]
    fn test_vehicle_id_deserialize_validates() {
        let ok: Result<VehicleId, _> = serde_json::from_str("\"vehicle-2\"");
        assert!(ok.is_ok());
        let blank: Result<VehicleId, _> = serde_json::from_str("\"\"");
        assert!(blank.is_err());
    }

    #[test]
    fn test_parse_valid_payload() {
        let payload = PositionPayload::parse(br#"{"latitude": 12.9716, "longitude": 77.5946}"#).unwrap();
        assert_eq!(payload.location.latitude, 12.9716);
        assert_eq!(payload.location.longitude, 77.5946);
        assert!(payload.timestamp.is_none());
    }

    #[test]
    fn test_parse_accepts_integer_coordinates_and_extra_fields() {
        let payload =
            PositionPayload::parse(br#"{"latitude": 12, "longitude": 77, "speed": 40}"#).unwrap();
        assert_eq!(payload.location, Coordinates { latitude: 12.0, longitude: 77.0 });
    }

    #[test]
    fn test_parse_rejects_non_numeric_latitude() {
        let err = PositionPayload::parse(br#"{"latitude": "bad", "longitude": 77.5}"#).unwrap_err();
        assert_eq!(err, MalformedPosition::NotNumeric("latitude"));
    }

    #[test]
    fn test_parse_rejects_missing_fields() {
        let err = PositionPayload::parse(br#"{"latitude": 12.0}"#).unwrap_err();
        assert_eq!(err, MalformedPosition::MissingField("longitude"));

        let err = PositionPayload::parse(br#"{"latitude": null, "longitude": 1.0}"#).unwrap_err();
        assert_eq!(err, MalformedPosition::MissingField("latitude"));
    }

    #[test]
    fn test_parse_rejects_out_of_range() {
        let err = PositionPayload::parse(br#"{"latitude": 91.0, "longitude": 0.0}"#).unwrap_err();
        assert!(matches!(err, MalformedPosition::OutOfRange(CoordinateError::Latitude(_))));

        let err = PositionPayload::parse(br#"{"latitude": 0.0, "longitude": -181}"#).unwrap_err();
        assert!(matches!(err, MalformedPosition::OutOfRange(CoordinateError::Longitude(_))));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            PositionPayload::parse(b"not json"),
            Err(MalformedPosition::InvalidJson(_))
        ));
        assert_eq!(
            PositionPayload::parse(b"[12.0, 77.0]").unwrap_err(),
            MalformedPosition::NotAnObject
        );
    }

    #[test]
    fn test_parse_timestamp_forms() {
        let rfc = PositionPayload::parse(
            br#"{"latitude": 1.0, "longitude": 2.0, "timestamp": "2026-03-01T10:00:00+05:30"}"#,
        )
        .unwrap();
        assert_eq!(
            rfc.timestamp.unwrap(),
            Utc.with_ymd_and_hms(2026, 3, 1, 4, 30, 0).unwrap()
        );

        let millis = PositionPayload::parse(
            br#"{"latitude": 1.0, "longitude": 2.0, "timestamp": 1772359200000}"#,
        )
        .unwrap();
        assert_eq!(millis.timestamp.unwrap().timestamp_millis(), 1_772_359_200_000);

        let null = PositionPayload::parse(br#"{"latitude": 1.0, "longitude": 2.0, "timestamp": null}"#)
            .unwrap();
        assert!(null.timestamp.is_none());

        let bad = PositionPayload::parse(br#"{"latitude": 1.0, "longitude": 2.0, "timestamp": "yesterday"}"#);
        assert!(matches!(bad, Err(MalformedPosition::InvalidTimestamp(_))));
    }

    #[test]
    fn test_report_wire_shape() {
        let report = PositionReport::from_new(
            NewPositionReport {
                vehicle_id: VehicleId::parse("vehicle-1").unwrap(),
                location: Coordinates::new(12.9716, 77.5946).unwrap(),
                timestamp: None,
                inside_geofence: true,
            },
            ReportId::new(),
            Utc::now(),
        );
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["vehicleId"], "vehicle-1");
        assert_eq!(json["latitude"], 12.9716);
        assert_eq!(json["longitude"], 77.5946);
        assert_eq!(json["insideGeofence"], true);
        assert!(json["timestamp"].is_string());
    }
}
