//! Per-cycle telemetry pipeline.
//!
//! One cycle is the whole life of a reading:
//!
//! 1. acquire from the sensor source;
//! 2. gate on validity — an invalid reading skips the cycle entirely;
//! 3. build the sealed message;
//! 4. publish with bounded retries;
//! 5. on failure, store the message in the offline queue (a full queue is
//!    logged as data loss, distinct from the publish failure);
//! 6. always attempt a flush: deliver every queued entry in FIFO order and
//!    clear only when all of them made it; any failure leaves the queue
//!    exactly as it was.
//!
//! Between cycles the pipeline sleeps in short slices and services the
//! link each slice so keep-alive and inbound command traffic keep moving.
//! No failure on this path ever stops the loop — the worst case is
//! bounded data loss when the queue saturates.

use std::time::Duration;

use soilcast_mqtt::{Link, RetryPublisher};
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info, warn};

use super::{
    message::MessageBuilder,
    queue::{OfflineQueue, QueueError},
    sensor::SensorSource,
    store::RecordStore,
};

/// Interval-driven orchestrator owning every collaborator explicitly.
pub struct Pipeline<S: SensorSource, L: Link, R: RecordStore> {
    sensor: S,
    publisher: RetryPublisher<L>,
    queue: OfflineQueue<R>,
    builder: MessageBuilder,
    interval: Duration,
    service_interval: Duration,
}

impl<S: SensorSource, L: Link, R: RecordStore> Pipeline<S, L, R> {
    pub fn new(
        sensor: S,
        publisher: RetryPublisher<L>,
        queue: OfflineQueue<R>,
        builder: MessageBuilder,
        interval: Duration,
        service_interval: Duration,
    ) -> Self {
        Self {
            sensor,
            publisher,
            queue,
            builder,
            interval,
            service_interval,
        }
    }

    /// Runs cycles forever.
    pub async fn run(mut self) -> ! {
        info!(
            "telemetry pipeline started (interval: {}s, {} readings queued)",
            self.interval.as_secs(),
            self.queue.count()
        );

        loop {
            let started = Instant::now();
            self.cycle().await;
            self.idle_until(started + self.interval).await;
        }
    }

    /// One acquisition cycle.
    async fn cycle(&mut self) {
        let reading = self.sensor.acquire().await;

        if !reading.is_valid() {
            warn!("invalid reading, skipping cycle");
            return;
        }

        let message = match self.builder.build(&reading) {
            Ok(message) => message,
            Err(e) => {
                error!("failed to build message: {e}");
                return;
            }
        };

        match self.publisher.publish(message.as_bytes()).await {
            Ok(retries) => {
                if retries == 0 {
                    info!("reading published");
                } else {
                    info!("reading published after {retries} retries");
                }
            }
            Err(e) => {
                warn!("publish failed: {e}");
                match self.queue.enqueue(&message) {
                    Ok(()) => info!(
                        "reading stored for later delivery ({} queued)",
                        self.queue.count()
                    ),
                    Err(QueueError::Full { capacity }) => {
                        warn!("offline queue full ({capacity} entries); newest reading lost")
                    }
                    Err(e) => error!("failed to store reading offline: {e}"),
                }
            }
        }

        self.flush().await;
    }

    /// Attempts to deliver the whole queue, oldest first.
    async fn flush(&mut self) {
        if self.queue.is_empty() {
            return;
        }

        if !self.publisher.link().is_connected()
            && self.publisher.link_mut().connect().await.is_err()
        {
            debug!("link down, {} readings stay queued", self.queue.count());
            return;
        }

        let entries = self.queue.drain_all();
        info!("flushing {} queued readings", entries.len());

        for (index, entry) in entries.iter().enumerate() {
            if let Err(e) = self.publisher.publish(entry).await {
                // Stop here; the queue keeps all entries in order for the
                // next cycle.
                warn!(
                    "flush stopped at entry {}/{}: {e}",
                    index + 1,
                    entries.len()
                );
                return;
            }
        }

        match self.queue.clear() {
            Ok(()) => info!("offline queue flushed"),
            Err(e) => error!("delivered queued readings but failed to clear store: {e}"),
        }
    }

    /// Sleeps until `deadline`, servicing the link each slice.
    async fn idle_until(&mut self, deadline: Instant) {
        loop {
            let now = Instant::now();
            if now >= deadline {
                return;
            }
            let slice = (deadline - now).min(self.service_interval);
            sleep(slice).await;
            self.publisher.link_mut().service().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use soilcast_mqtt::{LinkError, RetryPolicy};
    use tracing_test::traced_test;

    use super::*;
    use crate::core::{
        message::Message,
        reading::{Reading, SENSOR_ERROR},
        store::StoreError,
    };

    struct FakeSensor {
        readings: VecDeque<Reading>,
    }

    #[async_trait::async_trait]
    impl SensorSource for FakeSensor {
        async fn acquire(&mut self) -> Reading {
            self.readings.pop_front().expect("script exhausted")
        }
    }

    /// Scripted link; publish outcomes pop from the front, and an empty
    /// script means success.
    #[derive(Default)]
    struct FakeLink {
        connected: bool,
        refuse_connect: bool,
        publish_script: VecDeque<bool>,
        publishes: Vec<Vec<u8>>,
    }

    #[async_trait::async_trait]
    impl Link for FakeLink {
        async fn connect(&mut self) -> Result<(), LinkError> {
            if self.refuse_connect {
                return Err(LinkError::NotConnected);
            }
            self.connected = true;
            Ok(())
        }

        async fn publish(&mut self, payload: &[u8]) -> Result<(), LinkError> {
            self.publishes.push(payload.to_vec());
            match self.publish_script.pop_front() {
                Some(false) => Err(LinkError::NotConnected),
                _ => Ok(()),
            }
        }

        fn is_connected(&self) -> bool {
            self.connected
        }

        async fn service(&mut self) {}
    }

    #[derive(Default)]
    struct MemStore {
        records: Vec<Vec<u8>>,
    }

    impl RecordStore for MemStore {
        fn append(&mut self, record: &[u8]) -> Result<(), StoreError> {
            self.records.push(record.to_vec());
            Ok(())
        }

        fn list(&self) -> Vec<Vec<u8>> {
            self.records.clone()
        }

        fn clear(&mut self) -> Result<(), StoreError> {
            self.records.clear();
            Ok(())
        }
    }

    fn valid_reading(seq: u64) -> Reading {
        Reading::new(45.0, 22.5, 25.0, 60.0, 1_700_000_000 + seq)
    }

    fn invalid_reading() -> Reading {
        Reading::new(SENSOR_ERROR, 22.5, 25.0, 60.0, 1_700_000_000)
    }

    fn pipeline(
        readings: Vec<Reading>,
        link: FakeLink,
        capacity: usize,
    ) -> Pipeline<FakeSensor, FakeLink, MemStore> {
        let sensor = FakeSensor {
            readings: readings.into(),
        };
        let publisher = RetryPublisher::new(
            link,
            RetryPolicy {
                base_delay: Duration::from_millis(10),
                max_retries: 0,
            },
        );
        let queue = OfflineQueue::new(MemStore::default(), capacity);
        Pipeline::new(
            sensor,
            publisher,
            queue,
            MessageBuilder::new("F1", "D1"),
            Duration::from_secs(900),
            Duration::from_millis(100),
        )
    }

    fn build_message(seq: u64) -> Message {
        MessageBuilder::new("F1", "D1")
            .build(&valid_reading(seq))
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_reading_skips_cycle_entirely() {
        let mut pipeline = pipeline(vec![invalid_reading()], FakeLink::default(), 10);

        pipeline.cycle().await;

        assert!(pipeline.publisher.link().publishes.is_empty());
        assert!(pipeline.queue.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_successful_publish_leaves_queue_empty() {
        let mut pipeline = pipeline(vec![valid_reading(1)], FakeLink::default(), 10);

        pipeline.cycle().await;

        assert_eq!(pipeline.publisher.link().publishes.len(), 1);
        assert!(pipeline.queue.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_publish_is_queued() {
        let link = FakeLink {
            connected: true,
            // The cycle publish fails, and so does the flush attempt that
            // follows — the entry must stay queued.
            publish_script: VecDeque::from([false, false]),
            ..Default::default()
        };
        let mut pipeline = pipeline(vec![valid_reading(1)], link, 10);

        pipeline.cycle().await;

        assert_eq!(pipeline.queue.count(), 1);
        let expected = build_message(1);
        assert_eq!(pipeline.queue.drain_all()[0], expected.as_bytes());
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_delivers_fifo_and_clears() {
        let mut pipeline = pipeline(vec![valid_reading(10)], FakeLink::default(), 10);
        let first = build_message(1);
        let second = build_message(2);
        pipeline.queue.enqueue(&first).unwrap();
        pipeline.queue.enqueue(&second).unwrap();

        pipeline.cycle().await;

        // Cycle message first, then the two queued entries oldest-first.
        let publishes = &pipeline.publisher.link().publishes;
        assert_eq!(publishes.len(), 3);
        assert_eq!(publishes[1], first.as_bytes());
        assert_eq!(publishes[2], second.as_bytes());
        assert!(pipeline.queue.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_failure_leaves_queue_untouched() {
        let link = FakeLink {
            // Cycle publish succeeds, first flush entry succeeds, second
            // flush entry fails.
            publish_script: VecDeque::from([true, true, false]),
            ..Default::default()
        };
        let mut pipeline = pipeline(vec![valid_reading(10)], link, 10);
        let first = build_message(1);
        let second = build_message(2);
        let third = build_message(3);
        for msg in [&first, &second, &third] {
            pipeline.queue.enqueue(msg).unwrap();
        }

        pipeline.cycle().await;

        // No partial removal: all three entries remain, in order.
        let entries = pipeline.queue.drain_all();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0], first.as_bytes());
        assert_eq!(entries[1], second.as_bytes());
        assert_eq!(entries[2], third.as_bytes());
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_queue_drops_newest_reading() {
        let link = FakeLink {
            connected: true,
            // Cycle publish fails (reading must be queued, but the queue
            // is full), then the flush attempt fails too.
            publish_script: VecDeque::from([false, false]),
            ..Default::default()
        };
        let mut pipeline = pipeline(vec![valid_reading(10)], link, 1);
        let oldest = build_message(1);
        pipeline.queue.enqueue(&oldest).unwrap();

        pipeline.cycle().await;

        // Queue stays at capacity with the oldest entry intact.
        let entries = pipeline.queue.drain_all();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0], oldest.as_bytes());
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_skipped_while_link_down() {
        let link = FakeLink {
            refuse_connect: true,
            ..Default::default()
        };
        let mut pipeline = pipeline(vec![valid_reading(10)], link, 10);
        pipeline.queue.enqueue(&build_message(1)).unwrap();

        pipeline.cycle().await;

        // Connect failed for both the cycle publish and the flush: the new
        // reading joins the queue and nothing ever reaches the link.
        assert!(pipeline.publisher.link().publishes.is_empty());
        assert_eq!(pipeline.queue.count(), 2);
    }

    #[tokio::test(start_paused = true)]
    #[traced_test]
    async fn test_queue_full_is_logged_as_data_loss() {
        let link = FakeLink {
            connected: true,
            publish_script: VecDeque::from([false, false]),
            ..Default::default()
        };
        let mut pipeline = pipeline(vec![valid_reading(10)], link, 1);
        pipeline.queue.enqueue(&build_message(1)).unwrap();

        pipeline.cycle().await;

        assert!(logs_contain("offline queue full"));
    }
}
