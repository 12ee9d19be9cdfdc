// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
// Message Bus Implementation - Topic Pub/Sub for Position and Alert Messages
//
// Provides in-process topic streaming using tokio broadcast channels.
// Inbound position messages (from the HTTP bridge or an external broker
// adapter) and outbound geofence alerts travel over the same bus; receivers
// filter by topic.
//
// In-memory only: messages are lost on restart and slow receivers lag.

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::domain::alert::{Alert, AlertPublisher, PublishError};
use crate::domain::topic::{AlertTopic, TopicFilter};

/// One message on the bus: a topic and an opaque payload.
#[derive(Debug, Clone, PartialEq)]
pub struct BusMessage {
    pub topic: String,
    pub payload: Bytes,
}

/// Bus for publishing and subscribing to topic messages
#[derive(Clone)]
pub struct MessageBus {
    sender: Arc<broadcast::Sender<BusMessage>>,
    alert_topic: AlertTopic,
}

impl MessageBus {
    /// Create a new bus with specified channel capacity
    /// Capacity determines how many messages can be buffered before receivers lag
    pub fn new(capacity: usize) -> Self {
        Self::with_alert_topic(capacity, AlertTopic::default())
    }

    pub fn with_alert_topic(capacity: usize, alert_topic: AlertTopic) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender: Arc::new(sender),
            alert_topic,
        }
    }

    /// Create bus with default capacity (1024)
    pub fn with_default_capacity() -> Self {
        Self::new(1024)
    }

    pub fn alert_topic(&self) -> &AlertTopic {
        &self.alert_topic
    }

    /// Publish a message to all subscribers; returns how many received it.
    pub fn publish(&self, topic: impl Into<String>, payload: impl Into<Bytes>) -> usize {
        let message = BusMessage {
            topic: topic.into(),
            payload: payload.into(),
        };
        debug!(topic = %message.topic, bytes = message.payload.len(), "Publishing bus message");

        // send() only fails when nobody is subscribed
        let receiver_count = self.sender.send(message).unwrap_or(0);

        if receiver_count == 0 {
            debug!("No subscribers listening to bus message");
        }
        receiver_count
    }

    /// Subscribe to every message on the bus
    pub fn subscribe(&self) -> MessageReceiver {
        MessageReceiver {
            receiver: self.sender.subscribe(),
            filters: Vec::new(),
        }
    }

    /// Subscribe to messages whose topic matches any of `filters`
    pub fn subscribe_filtered(&self, filters: Vec<TopicFilter>) -> MessageReceiver {
        MessageReceiver {
            receiver: self.sender.subscribe(),
            filters,
        }
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

#[async_trait]
impl AlertPublisher for MessageBus {
    async fn publish(&self, alert: &Alert) -> Result<(), PublishError> {
        let payload = serde_json::to_vec(&alert.payload())?;
        let topic = self.alert_topic.for_vehicle(&alert.vehicle_id);
        MessageBus::publish(self, topic, payload);
        Ok(())
    }
}

/// Receiver for bus messages, optionally filtered by topic
pub struct MessageReceiver {
    receiver: broadcast::Receiver<BusMessage>,
    filters: Vec<TopicFilter>,
}

impl MessageReceiver {
    fn accepts(&self, message: &BusMessage) -> bool {
        self.filters.is_empty() || self.filters.iter().any(|f| f.matches(&message.topic))
    }

    /// Receive the next matching message (waits until one is available)
    pub async fn recv(&mut self) -> Result<BusMessage, MessageBusError> {
        loop {
            let message = self.receiver.recv().await.map_err(|e| match e {
                broadcast::error::RecvError::Closed => MessageBusError::Closed,
                broadcast::error::RecvError::Lagged(n) => {
                    warn!("Bus receiver lagged by {} messages", n);
                    MessageBusError::Lagged(n)
                }
            })?;

            if self.accepts(&message) {
                return Ok(message);
            }
        }
    }

    /// Try to receive a matching message without waiting
    pub fn try_recv(&mut self) -> Result<BusMessage, MessageBusError> {
        loop {
            let message = self.receiver.try_recv().map_err(|e| match e {
                broadcast::error::TryRecvError::Empty => MessageBusError::Empty,
                broadcast::error::TryRecvError::Closed => MessageBusError::Closed,
                broadcast::error::TryRecvError::Lagged(n) => {
                    warn!("Bus receiver lagged by {} messages", n);
                    MessageBusError::Lagged(n)
                }
            })?;

            if self.accepts(&message) {
                return Ok(message);
            }
        }
    }
}

/// Errors that can occur when receiving messages
#[derive(Debug, thiserror::Error)]
pub enum MessageBusError {
    #[error("Message bus is closed")]
    Closed,

    #[error("No messages available")]
    Empty,

    #[error("Receiver lagged by {0} messages (messages were dropped)")]
    Lagged(u64),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::alert::VerdictTransition;
    use crate::domain::geofence::Coordinates;
    use crate::domain::position::VehicleId;
    use chrono::Utc;

    #[tokio::test]
    async fn test_publish_subscribe() {
        let bus = MessageBus::new(10);
        let mut receiver = bus.subscribe();

        let delivered = bus.publish("GPS/location/1", r#"{"latitude":1,"longitude":2}"#);
        assert_eq!(delivered, 1);

        let message = receiver.recv().await.unwrap();
        assert_eq!(message.topic, "GPS/location/1");
        assert_eq!(&message.payload[..], br#"{"latitude":1,"longitude":2}"#);
    }

    #[tokio::test]
    async fn test_topic_filtering() {
        let bus = MessageBus::new(10);
        let mut receiver =
            bus.subscribe_filtered(vec![TopicFilter::parse("vehicle/+/location").unwrap()]);

        bus.publish("vehicle/v1/alert", "ignored");
        bus.publish("vehicle/v1/location", "wanted");

        let message = receiver.recv().await.unwrap();
        assert_eq!(message.topic, "vehicle/v1/location");
        assert!(matches!(receiver.try_recv(), Err(MessageBusError::Empty)));
    }

    #[tokio::test]
    async fn test_publish_without_subscribers() {
        let bus = MessageBus::new(10);
        assert_eq!(bus.subscriber_count(), 0);
        assert_eq!(bus.publish("GPS/location/1", "x"), 0);
    }

    #[tokio::test]
    async fn test_lagged_receiver_reports_drop() {
        let bus = MessageBus::new(2);
        let mut receiver = bus.subscribe();
        for i in 0..5 {
            bus.publish("t", format!("{}", i));
        }
        assert!(matches!(receiver.recv().await, Err(MessageBusError::Lagged(3))));
        assert_eq!(&receiver.recv().await.unwrap().payload[..], b"3");
    }

    #[tokio::test]
    async fn test_alert_published_on_vehicle_topic() {
        let bus = MessageBus::new(10);
        let mut receiver = bus.subscribe();

        let alert = Alert::new(
            VehicleId::parse("vehicle-1").unwrap(),
            VerdictTransition::Exited,
            Coordinates::new(13.2, 77.8).unwrap(),
            Utc::now(),
        );
        AlertPublisher::publish(&bus, &alert).await.unwrap();

        let message = receiver.recv().await.unwrap();
        assert_eq!(message.topic, "vehicle/vehicle-1/alert");
        let json: serde_json::Value = serde_json::from_slice(&message.payload).unwrap();
        assert_eq!(json["kind"], "GEOFENCE_VIOLATION");
    }
}
