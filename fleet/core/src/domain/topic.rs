// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Topics
//!
//! MQTT-style topic filters and the router that maps an inbound topic to the
//! vehicle that published on it.
//!
//! Filters use `/`-separated levels. `+` matches exactly one level and `#`
//! matches the remainder of the topic (it must be the last level). A route
//! either names its vehicle explicitly (`GPS/location/1 → vehicle-1`) or takes
//! the vehicle id from the level matched by the first `+`
//! (`vehicle/+/location`).

use thiserror::Error;

use crate::domain::position::VehicleId;

pub const VEHICLE_ID_PLACEHOLDER: &str = "{vehicle_id}";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TopicError {
    #[error("topic filter must not be empty")]
    Empty,

    #[error("invalid topic filter '{filter}': {reason}")]
    InvalidFilter { filter: String, reason: &'static str },

    #[error("alert topic '{0}' must contain {{vehicle_id}}")]
    MissingPlaceholder(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Level {
    Exact(String),
    Single,
    Multi,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicFilter {
    raw: String,
    levels: Vec<Level>,
}

impl TopicFilter {
    pub fn parse(filter: &str) -> Result<Self, TopicError> {
        if filter.is_empty() {
            return Err(TopicError::Empty);
        }

        let parts: Vec<&str> = filter.split('/').collect();
        let last = parts.len() - 1;
        let mut levels = Vec::with_capacity(parts.len());

        for (i, part) in parts.into_iter().enumerate() {
            let level = match part {
                "+" => Level::Single,
                "#" if i == last => Level::Multi,
                "#" => {
                    return Err(TopicError::InvalidFilter {
                        filter: filter.to_string(),
                        reason: "'#' is only allowed as the last level",
                    })
                }
                p if p.contains('+') || p.contains('#') => {
                    return Err(TopicError::InvalidFilter {
                        filter: filter.to_string(),
                        reason: "wildcards must occupy a whole level",
                    })
                }
                p => Level::Exact(p.to_string()),
            };
            levels.push(level);
        }

        Ok(Self {
            raw: filter.to_string(),
            levels,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn has_single_wildcard(&self) -> bool {
        self.levels.contains(&Level::Single)
    }

    pub fn matches(&self, topic: &str) -> bool {
        self.match_captures(topic).is_some()
    }

    /// Levels matched by `+` wildcards, in order; `None` if the topic does not match.
    fn match_captures<'t>(&self, topic: &'t str) -> Option<Vec<&'t str>> {
        let mut captures = Vec::new();
        let mut parts = topic.split('/');

        for level in &self.levels {
            match level {
                Level::Multi => return Some(captures),
                Level::Single => captures.push(parts.next()?),
                Level::Exact(expected) => {
                    if parts.next()? != expected {
                        return None;
                    }
                }
            }
        }

        match parts.next() {
            Some(_) => None,
            None => Some(captures),
        }
    }
}

impl std::fmt::Display for TopicFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

#[derive(Debug, Clone)]
pub struct TopicRoute {
    pub filter: TopicFilter,
    pub vehicle_id: Option<VehicleId>,
}

/// Resolves inbound topics to vehicles. Routes are tried in declaration order.
#[derive(Debug, Clone, Default)]
pub struct TopicRouter {
    routes: Vec<TopicRoute>,
}

impl TopicRouter {
    pub fn new(routes: Vec<TopicRoute>) -> Self {
        Self { routes }
    }

    pub fn routes(&self) -> &[TopicRoute] {
        &self.routes
    }

    pub fn resolve(&self, topic: &str) -> Option<VehicleId> {
        for route in &self.routes {
            let Some(captures) = route.filter.match_captures(topic) else {
                continue;
            };
            if let Some(vehicle_id) = &route.vehicle_id {
                return Some(vehicle_id.clone());
            }
            if let Some(segment) = captures.first() {
                if let Ok(vehicle_id) = VehicleId::parse(*segment) {
                    return Some(vehicle_id);
                }
            }
        }
        None
    }
}

/// Per-vehicle outbound topic, e.g. `vehicle/{vehicle_id}/alert`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertTopic(String);

impl AlertTopic {
    pub fn parse(template: &str) -> Result<Self, TopicError> {
        if !template.contains(VEHICLE_ID_PLACEHOLDER) {
            return Err(TopicError::MissingPlaceholder(template.to_string()));
        }
        Ok(Self(template.to_string()))
    }

    pub fn for_vehicle(&self, vehicle_id: &VehicleId) -> String {
        self.0.replace(VEHICLE_ID_PLACEHOLDER, vehicle_id.as_str())
    }

    /// Filter matching the alert topic of every vehicle.
    pub fn wildcard_filter(&self) -> Result<TopicFilter, TopicError> {
        TopicFilter::parse(&self.0.replace(VEHICLE_ID_PLACEHOLDER, "+"))
    }
}

impl Default for AlertTopic {
    fn default() -> Self {
        Self("vehicle/{vehicle_id}/alert".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vehicle(id: &str) -> VehicleId {
        VehicleId::parse(id).unwrap()
    }

    #[test]
    fn test_exact_filter() {
        let filter = TopicFilter::parse("GPS/location/1").unwrap();
        assert!(filter.matches("GPS/location/1"));
        assert!(!filter.matches("GPS/location/11"));
        assert!(!filter.matches("GPS/location"));
        assert!(!filter.matches("GPS/location/1/extra"));
    }

    #[test]
    fn test_single_level_wildcard() {
        let filter = TopicFilter::parse("vehicle/+/location").unwrap();
        assert!(filter.matches("vehicle/truck-7/location"));
        assert!(!filter.matches("vehicle/truck-7/alert"));
        assert!(!filter.matches("vehicle/a/b/location"));
        assert!(filter.has_single_wildcard());
    }

    #[test]
    fn test_multi_level_wildcard() {
        let filter = TopicFilter::parse("GPS/#").unwrap();
        assert!(filter.matches("GPS/location/1"));
        assert!(filter.matches("GPS/x"));
        assert!(!filter.matches("vehicle/1"));
    }

    #[test]
    fn test_invalid_filters() {
        assert_eq!(TopicFilter::parse(""), Err(TopicError::Empty));
        assert!(TopicFilter::parse("GPS/#/location").is_err());
        assert!(TopicFilter::parse("vehicle/veh+/location").is_err());
    }

    #[test]
    fn test_router_explicit_and_captured_routes() {
        let router = TopicRouter::new(vec![
            TopicRoute {
                filter: TopicFilter::parse("GPS/location/1").unwrap(),
                vehicle_id: Some(vehicle("vehicle-1")),
            },
            TopicRoute {
                filter: TopicFilter::parse("GPS/location/2").unwrap(),
                vehicle_id: Some(vehicle("vehicle-2")),
            },
            TopicRoute {
                filter: TopicFilter::parse("vehicle/+/location").unwrap(),
                vehicle_id: None,
            },
        ]);

        assert_eq!(router.resolve("GPS/location/1"), Some(vehicle("vehicle-1")));
        assert_eq!(router.resolve("GPS/location/2"), Some(vehicle("vehicle-2")));
        assert_eq!(router.resolve("GPS/location/12"), None);
        assert_eq!(router.resolve("vehicle/van-3/location"), Some(vehicle("van-3")));
        assert_eq!(router.resolve("vehicle//location"), None);
        assert_eq!(router.resolve("vehicle/van-3/alert"), None);
    }

    #[test]
    fn test_alert_topic() {
        let topic = AlertTopic::default();
        assert_eq!(topic.for_vehicle(&vehicle("vehicle-1")), "vehicle/vehicle-1/alert");
        assert!(topic.wildcard_filter().unwrap().matches("vehicle/vehicle-9/alert"));
        assert!(AlertTopic::parse("alerts").is_err());
    }
}
