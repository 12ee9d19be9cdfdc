// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Ingest Subscriber - long-lived consumer of inbound position topics
//!
//! Subscribes to the message bus with the configured topic filters, resolves
//! each topic to a vehicle through the [`TopicRouter`] and hands the payload to
//! that vehicle's worker. Every vehicle has exactly one sequential worker fed
//! by a bounded queue, so reports for one vehicle are processed in arrival
//! order while different vehicles run in parallel.
//!
//! The loop never waits on a vehicle queue. When a vehicle's queue is full the
//! message is dropped for that vehicle only and counted in
//! `fleet_positions_dropped_total`; other vehicles keep flowing.
//!
//! One worker (a task plus its queue) is kept per distinct vehicle seen until
//! shutdown. With a `+` wildcard route that is every vehicle id that ever
//! published, so memory grows with the size of the fleet, not with traffic.
//!
//! # Shutdown
//!
//! Cancelling the token stops the loop. Messages already delivered to the
//! subscriber are still dispatched, then the queues are closed and every worker
//! drains what it has before the task completes.

use bytes::Bytes;
use metrics::counter;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::application::ingest::IngestPipeline;
use crate::domain::position::VehicleId;
use crate::domain::topic::TopicRouter;
use crate::infrastructure::message_bus::{BusMessage, MessageBus, MessageBusError, MessageReceiver};

type WorkerQueues = HashMap<VehicleId, mpsc::Sender<Bytes>>;

pub struct IngestSubscriber {
    pipeline: Arc<IngestPipeline>,
    bus: MessageBus,
    router: TopicRouter,
    queue_capacity: usize,
    shutdown_token: CancellationToken,
    workers: TaskTracker,
}

impl IngestSubscriber {
    pub fn new(
        pipeline: Arc<IngestPipeline>,
        bus: MessageBus,
        router: TopicRouter,
        queue_capacity: usize,
    ) -> Self {
        Self {
            pipeline,
            bus,
            router,
            queue_capacity: queue_capacity.max(1),
            shutdown_token: CancellationToken::new(),
            workers: TaskTracker::new(),
        }
    }

    /// Get a handle to trigger shutdown
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    /// Subscribe and start the loop. The subscription is registered before this
    /// returns, so anything published afterwards is seen by the loop.
    pub fn start(self: Arc<Self>) -> JoinHandle<()> {
        let filters = self.router.routes().iter().map(|r| r.filter.clone()).collect();
        let receiver = self.bus.subscribe_filtered(filters);

        info!(
            subscriptions = self.router.routes().len(),
            "Starting ingest subscriber"
        );

        tokio::spawn(async move {
            self.run(receiver).await;
        })
    }

    async fn run(&self, mut receiver: MessageReceiver) {
        let mut queues = WorkerQueues::new();
        let mut dispatched = 0u64;

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown_token.cancelled() => {
                    info!("Shutdown signal received, stopping ingest subscriber");
                    break;
                }
                message = receiver.recv() => match message {
                    Ok(message) => {
                        self.dispatch(&mut queues, message);
                        dispatched += 1;
                    }
                    Err(MessageBusError::Lagged(n)) => {
                        warn!("Ingest subscriber lagged by {} messages, positions were dropped", n);
                    }
                    Err(MessageBusError::Closed) => {
                        info!("Message bus closed, stopping ingest subscriber");
                        break;
                    }
                    Err(MessageBusError::Empty) => continue,
                }
            }
        }

        // Flush what was already delivered to this subscriber.
        loop {
            match receiver.try_recv() {
                Ok(message) => {
                    self.dispatch(&mut queues, message);
                    dispatched += 1;
                }
                Err(MessageBusError::Lagged(_)) => continue,
                Err(_) => break,
            }
        }

        let vehicles = queues.len();
        drop(queues);
        self.workers.close();
        self.workers.wait().await;

        info!(dispatched, vehicles, "Ingest subscriber stopped");
    }

    fn dispatch(&self, queues: &mut WorkerQueues, message: BusMessage) {
        let Some(vehicle_id) = self.router.resolve(&message.topic) else {
            debug!(topic = %message.topic, "No vehicle route for topic, ignoring message");
            return;
        };

        let queue = match queues.get(&vehicle_id) {
            Some(queue) if !queue.is_closed() => queue.clone(),
            _ => {
                let queue = self.spawn_worker(vehicle_id.clone());
                queues.insert(vehicle_id.clone(), queue.clone());
                queue
            }
        };

        match queue.try_send(message.payload) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                counter!("fleet_positions_dropped_total").increment(1);
                warn!(vehicle_id = %vehicle_id, "Vehicle queue full, dropping position message");
            }
            Err(mpsc::error::TrySendError::Closed(payload)) => {
                warn!(vehicle_id = %vehicle_id, "Vehicle worker stopped unexpectedly, restarting");
                let queue = self.spawn_worker(vehicle_id.clone());
                queues.insert(vehicle_id.clone(), queue.clone());
                if queue.try_send(payload).is_err() {
                    warn!(vehicle_id = %vehicle_id, "Dropping position message, vehicle worker unavailable");
                }
            }
        }
    }

    fn spawn_worker(&self, vehicle_id: VehicleId) -> mpsc::Sender<Bytes> {
        let (sender, mut queue) = mpsc::channel::<Bytes>(self.queue_capacity);
        let pipeline = self.pipeline.clone();

        debug!(vehicle_id = %vehicle_id, "Starting vehicle worker");
        self.workers.spawn(async move {
            while let Some(payload) = queue.recv().await {
                pipeline.on_message(&payload, &vehicle_id).await;
            }
            debug!(vehicle_id = %vehicle_id, "Vehicle worker drained");
        });

        sender
    }
}
