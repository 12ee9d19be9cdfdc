// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! HTTP client for communicating with a running fleet server

use anyhow::{Context, Result};
use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio_stream::StreamExt;

use aegis_fleet_core::application::GeofenceStatus;
use aegis_fleet_core::domain::position::PositionReport;

use super::base_url;

#[derive(Debug, Clone)]
pub struct DaemonClient {
    client: Client,
    base_url: Url,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryAck {
    pub topic: String,
    pub delivered: usize,
}

impl DaemonClient {
    pub fn new(host: &str, port: u16) -> Result<Self> {
        Self::from_base_url(&base_url(host, port))
    }

    pub fn from_base_url(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            // No global timeout: the alert stream is long-lived
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = Url::parse(base_url)
            .with_context(|| format!("Invalid server URL: {}", base_url))?;

        Ok(Self { client, base_url })
    }

    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("Server URL cannot carry a path: {}", self.base_url))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// GET a JSON resource; `Ok(None)` on 404.
    async fn get_optional<T: DeserializeOwned>(&self, url: Url, what: &str) -> Result<Option<T>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch {}", what))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Failed to fetch {}: {}", what, error_text);
        }

        response
            .json()
            .await
            .map(Some)
            .with_context(|| format!("Failed to parse {} response", what))
    }

    pub async fn latest_location(&self, vehicle_id: &str) -> Result<Option<PositionReport>> {
        let url = self.url(&["api", "location", "latest", vehicle_id])?;
        self.get_optional(url, "latest location").await
    }

    pub async fn location_history(
        &self,
        vehicle_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<PositionReport>> {
        let mut url = self.url(&["api", "location", "history", vehicle_id])?;
        if let Some(limit) = limit {
            url.query_pairs_mut().append_pair("limit", &limit.to_string());
        }
        Ok(self
            .get_optional(url, "location history")
            .await?
            .unwrap_or_default())
    }

    pub async fn geofence_status(&self, vehicle_id: &str) -> Result<Option<GeofenceStatus>> {
        let url = self.url(&["api", "geofence", vehicle_id])?;
        self.get_optional(url, "geofence status").await
    }

    /// Publish a raw position payload on `topic` through the HTTP bridge.
    pub async fn publish_position(&self, topic: &str, payload: &serde_json::Value) -> Result<TelemetryAck> {
        let mut segments = vec!["api", "telemetry"];
        segments.extend(topic.split('/').filter(|s| !s.is_empty()));
        let url = self.url(&segments)?;

        let response = self
            .client
            .post(url)
            .json(payload)
            .send()
            .await
            .context("Failed to publish position")?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Failed to publish position: {}", error_text);
        }

        response
            .json()
            .await
            .context("Failed to parse publish response")
    }

    /// Follow the alert stream, calling `on_alert` with each event's JSON data.
    pub async fn stream_alerts<F>(&self, vehicle_id: Option<&str>, mut on_alert: F) -> Result<()>
    where
        F: FnMut(serde_json::Value),
    {
        let mut url = self.url(&["api", "alerts", "stream"])?;
        if let Some(vehicle_id) = vehicle_id {
            url.query_pairs_mut().append_pair("vehicle_id", vehicle_id);
        }

        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to connect to alert stream")?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Failed to stream alerts: {}", error_text);
        }

        let mut stream = response.bytes_stream();
        let mut buffer = String::new();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.context("Failed to read alert stream chunk")?;
            buffer.push_str(&String::from_utf8_lossy(&chunk));

            while let Some(end) = buffer.find("\n\n") {
                let event: String = buffer.drain(..end + 2).collect();
                for data in event.lines().filter_map(|line| line.strip_prefix("data:")) {
                    match serde_json::from_str(data.trim()) {
                        Ok(value) => on_alert(value),
                        Err(e) => tracing::debug!(error = %e, "Skipping unparsable alert event"),
                    }
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPORT: &str = r#"{
        "id": "7c0a4f0e-3a36-4c1a-9d0e-5f0f5a4b9a11",
        "vehicleId": "vehicle-1",
        "latitude": 13.2,
        "longitude": 77.8,
        "timestamp": "2026-05-04T12:00:00Z",
        "insideGeofence": false
    }"#;

    #[tokio::test]
    async fn test_latest_location() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/location/latest/vehicle-1")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(REPORT)
            .create_async()
            .await;

        let client = DaemonClient::from_base_url(&server.url()).unwrap();
        let report = client.latest_location("vehicle-1").await.unwrap().unwrap();
        assert_eq!(report.vehicle_id.as_str(), "vehicle-1");
        assert!(!report.inside_geofence);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_not_found_is_none() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/geofence/vehicle-9")
            .with_status(404)
            .with_body(r#"{"error":"No location data found"}"#)
            .create_async()
            .await;

        let client = DaemonClient::from_base_url(&server.url()).unwrap();
        assert!(client.geofence_status("vehicle-9").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_server_error_is_err() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/location/history/vehicle-1")
            .with_status(500)
            .with_body(r#"{"error":"Error fetching location history"}"#)
            .create_async()
            .await;

        let client = DaemonClient::from_base_url(&server.url()).unwrap();
        let err = client.location_history("vehicle-1", None).await.unwrap_err();
        assert!(err.to_string().contains("Error fetching location history"));
    }

    #[tokio::test]
    async fn test_history_passes_limit() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/location/history/vehicle-1")
            .match_query(mockito::Matcher::UrlEncoded("limit".into(), "5".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(format!("[{}]", REPORT))
            .create_async()
            .await;

        let client = DaemonClient::from_base_url(&server.url()).unwrap();
        let history = client.location_history("vehicle-1", Some(5)).await.unwrap();
        assert_eq!(history.len(), 1);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_publish_position_keeps_topic_levels() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/telemetry/GPS/location/1")
            .match_body(mockito::Matcher::Json(
                serde_json::json!({"latitude": 12.9716, "longitude": 77.5946}),
            ))
            .with_status(202)
            .with_header("content-type", "application/json")
            .with_body(r#"{"topic":"GPS/location/1","delivered":1}"#)
            .create_async()
            .await;

        let client = DaemonClient::from_base_url(&server.url()).unwrap();
        let ack = client
            .publish_position(
                "GPS/location/1",
                &serde_json::json!({"latitude": 12.9716, "longitude": 77.5946}),
            )
            .await
            .unwrap();
        assert_eq!(ack.delivered, 1);
        assert_eq!(ack.topic, "GPS/location/1");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_stream_alerts_parses_events() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/alerts/stream")
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_body(
                "event: alert\ndata: {\"topic\":\"vehicle/vehicle-1/alert\",\"alert\":{\"kind\":\"GEOFENCE_VIOLATION\"}}\n\n\
                 : keep-alive\n\n",
            )
            .create_async()
            .await;

        let client = DaemonClient::from_base_url(&server.url()).unwrap();
        let mut seen = Vec::new();
        client
            .stream_alerts(None, |alert| seen.push(alert))
            .await
            .unwrap();

        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0]["alert"]["kind"], "GEOFENCE_VIOLATION");
    }
}
