//! Triple Buffer Implementation

use crate::{BufferError, Sample};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// Exchange counters, updated inside the swap critical section
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BufferStats {
    /// Samples moved into the Shared slot
    pub published: u64,
    /// Samples taken by the consumer
    pub consumed: u64,
    /// Samples overwritten in the Shared slot before the consumer saw them
    pub dropped: u64,
}

/// The Shared role: exchange point between both halves
struct Exchange<T> {
    slot: Box<T>,
    has_new_data: bool,
    stats: BufferStats,
}

type SharedExchange<T> = Arc<Mutex<Exchange<T>>>;

/// The critical section only swaps boxes, so a panic elsewhere cannot leave
/// the exchange half-updated. Recover instead of propagating the poison.
fn lock<T>(shared: &Mutex<Exchange<T>>) -> MutexGuard<'_, Exchange<T>> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Producer half, owns the Back slot
pub struct Producer<T> {
    back: Box<T>,
    shared: SharedExchange<T>,
    capacity: usize,
    last_published: Option<f64>,
}

impl<T: Sample> Producer<T> {
    /// Check whether a sample taken at `timestamp` would be published.
    ///
    /// Non-finite timestamps are never accepted, and a finite one must be
    /// strictly newer than the last published sample. Callers check this
    /// before copying so a skipped sample leaves the Back slot untouched.
    pub fn accepts(&self, timestamp: f64) -> bool {
        timestamp.is_finite() && self.last_published.map_or(true, |last| timestamp > last)
    }

    /// Fill the Back slot with `fill` and publish it.
    ///
    /// `fill` performs the one payload copy and returns whether the slot
    /// should be published. Returns `Ok(false)` when the sample was skipped:
    /// the closure declined, the slot ended up empty, or its timestamp is not
    /// [accepted](Self::accepts).
    pub fn update_with<F, E>(&mut self, fill: F) -> Result<bool, E>
    where
        F: FnOnce(&mut T) -> Result<bool, E>,
    {
        if !fill(&mut self.back)? || self.back.is_empty() {
            return Ok(false);
        }
        debug_assert!(self.back.len() <= self.back.capacity());

        let timestamp = self.back.timestamp();
        if !self.accepts(timestamp) {
            return Ok(false);
        }

        self.publish();
        self.last_published = Some(timestamp);
        Ok(true)
    }

    /// Copy `sample` into the Back slot and publish it.
    ///
    /// Empty samples and samples that are not [accepted](Self::accepts)
    /// are skipped without touching the Back slot. Samples longer than the
    /// capacity are rejected with [`BufferError::CapacityExceeded`] and
    /// nothing is published.
    pub fn update(&mut self, sample: &T) -> Result<bool, BufferError> {
        if sample.is_empty() || !self.accepts(sample.timestamp()) {
            return Ok(false);
        }
        if sample.len() > self.capacity {
            return Err(BufferError::CapacityExceeded {
                len: sample.len(),
                capacity: self.capacity,
            });
        }
        self.update_with(|back| back.copy_from(sample).map(|_| true))
    }

    /// Swap Back <-> Shared and raise the new-data flag
    fn publish(&mut self) {
        let mut exchange = lock(&self.shared);
        std::mem::swap(&mut self.back, &mut exchange.slot);
        if exchange.has_new_data {
            exchange.stats.dropped += 1;
        }
        exchange.has_new_data = true;
        exchange.stats.published += 1;
    }

    /// Maximum sample length accepted by this buffer
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Snapshot of the exchange counters
    pub fn stats(&self) -> BufferStats {
        lock(&self.shared).stats
    }
}

/// Consumer half, owns the Front slot
pub struct Consumer<T> {
    front: Box<T>,
    shared: SharedExchange<T>,
    capacity: usize,
}

impl<T: Sample> Consumer<T> {
    /// Get the freshest sample and whether it changed since the last poll.
    ///
    /// If the producer published since the previous call, Shared and Front
    /// swap roles first. Otherwise the same Front slot is returned again
    /// with `false`. Before the first publish the Front slot is empty.
    pub fn get_latest(&mut self) -> (&T, bool) {
        let is_new = {
            let mut exchange = lock(&self.shared);
            if exchange.has_new_data {
                std::mem::swap(&mut self.front, &mut exchange.slot);
                exchange.has_new_data = false;
                exchange.stats.consumed += 1;
                true
            } else {
                false
            }
        };
        (&self.front, is_new)
    }

    /// The current Front slot, without polling
    pub fn front(&self) -> &T {
        &self.front
    }

    /// Check whether a newer sample is waiting in the Shared slot
    pub fn has_new_data(&self) -> bool {
        lock(&self.shared).has_new_data
    }

    /// Maximum sample length accepted by this buffer
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Snapshot of the exchange counters
    pub fn stats(&self) -> BufferStats {
        lock(&self.shared).stats
    }
}

/// Triple-buffer manager owning the three sample slots.
///
/// Use it directly from a single owner, or [`split`](Self::split) it into a
/// [`Producer`] for the sensor callback thread and a [`Consumer`] for the
/// render loop. Dropping both halves frees all three slots.
pub struct BufferManager<T> {
    producer: Producer<T>,
    consumer: Consumer<T>,
}

impl<T: Sample> BufferManager<T> {
    /// Create a manager whose three slots are built by `allocate(capacity)`.
    pub fn new<F>(capacity: usize, mut allocate: F) -> Result<Self, BufferError>
    where
        F: FnMut(usize) -> Result<T, BufferError>,
    {
        if capacity == 0 {
            return Err(BufferError::invalid("buffer capacity must be positive"));
        }

        let mut slot = || -> Result<Box<T>, BufferError> {
            let sample = allocate(capacity)?;
            if sample.capacity() < capacity {
                return Err(BufferError::AllocationFailure { capacity });
            }
            Ok(Box::new(sample))
        };
        let back = slot()?;
        let middle = slot()?;
        let front = slot()?;

        debug!("Allocated triple buffer: capacity={}", capacity);

        let shared = Arc::new(Mutex::new(Exchange {
            slot: middle,
            has_new_data: false,
            stats: BufferStats::default(),
        }));

        Ok(Self {
            producer: Producer {
                back,
                shared: Arc::clone(&shared),
                capacity,
                last_published: None,
            },
            consumer: Consumer {
                front,
                shared,
                capacity,
            },
        })
    }

    /// Separate the producer and consumer halves
    pub fn split(self) -> (Producer<T>, Consumer<T>) {
        (self.producer, self.consumer)
    }

    /// See [`Producer::update_with`]
    pub fn update_with<F, E>(&mut self, fill: F) -> Result<bool, E>
    where
        F: FnOnce(&mut T) -> Result<bool, E>,
    {
        self.producer.update_with(fill)
    }

    /// See [`Producer::update`]
    pub fn update(&mut self, sample: &T) -> Result<bool, BufferError> {
        self.producer.update(sample)
    }

    /// See [`Consumer::get_latest`]
    pub fn get_latest(&mut self) -> (&T, bool) {
        self.consumer.get_latest()
    }

    /// Maximum sample length accepted by this buffer
    pub fn capacity(&self) -> usize {
        self.producer.capacity
    }

    /// Snapshot of the exchange counters
    pub fn stats(&self) -> BufferStats {
        self.producer.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::try_with_capacity;
    use proptest::prelude::*;
    use std::thread;

    #[derive(Debug, Clone)]
    struct Reading {
        timestamp: f64,
        values: Vec<u32>,
    }

    impl Reading {
        fn allocate(capacity: usize) -> Result<Self, BufferError> {
            Ok(Self {
                timestamp: 0.0,
                values: try_with_capacity(capacity)?,
            })
        }

        fn new(timestamp: f64, len: usize) -> Self {
            Self {
                timestamp,
                values: (0..len as u32).collect(),
            }
        }
    }

    impl Sample for Reading {
        fn timestamp(&self) -> f64 {
            self.timestamp
        }

        fn len(&self) -> usize {
            self.values.len()
        }

        fn capacity(&self) -> usize {
            self.values.capacity()
        }

        fn copy_from(&mut self, source: &Self) -> Result<(), BufferError> {
            if source.values.len() > self.values.capacity() {
                return Err(BufferError::CapacityExceeded {
                    len: source.values.len(),
                    capacity: self.values.capacity(),
                });
            }
            self.values.clear();
            self.values.extend_from_slice(&source.values);
            self.timestamp = source.timestamp;
            Ok(())
        }
    }

    fn manager(capacity: usize) -> BufferManager<Reading> {
        BufferManager::new(capacity, Reading::allocate).unwrap()
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let result = BufferManager::new(0, Reading::allocate);
        assert!(matches!(result, Err(BufferError::InvalidArgument(_))));
    }

    #[test]
    fn test_allocation_failure_propagates() {
        let result = BufferManager::<Reading>::new(8, |capacity| {
            Err(BufferError::AllocationFailure { capacity })
        });
        assert!(matches!(
            result,
            Err(BufferError::AllocationFailure { capacity: 8 })
        ));
    }

    #[test]
    fn test_no_data_before_first_update() {
        let mut buffer = manager(16);
        let (front, is_new) = buffer.get_latest();
        assert!(!is_new);
        assert!(front.is_empty());
        assert_eq!(front.capacity(), 16);
    }

    #[test]
    fn test_update_then_poll() {
        let mut buffer = manager(1000);
        assert_eq!(buffer.update(&Reading::new(1.0, 500)), Ok(true));

        let (front, is_new) = buffer.get_latest();
        assert!(is_new);
        assert_eq!(front.len(), 500);
        assert_eq!(front.timestamp(), 1.0);
        let first = front as *const Reading;

        let (front, is_new) = buffer.get_latest();
        assert!(!is_new);
        assert!(std::ptr::eq(first, front));
    }

    #[test]
    fn test_intermediate_sample_dropped() {
        let mut buffer = manager(10);
        buffer.update(&Reading::new(1.0, 3)).unwrap();
        buffer.update(&Reading::new(1.1, 4)).unwrap();

        let (front, is_new) = buffer.get_latest();
        assert!(is_new);
        assert_eq!(front.timestamp(), 1.1);
        assert_eq!(front.len(), 4);

        let stats = buffer.stats();
        assert_eq!(stats.published, 2);
        assert_eq!(stats.consumed, 1);
        assert_eq!(stats.dropped, 1);
    }

    #[test]
    fn test_empty_sample_skipped() {
        let mut buffer = manager(10);
        buffer.update(&Reading::new(1.0, 2)).unwrap();
        assert_eq!(buffer.update(&Reading::new(2.0, 0)), Ok(false));

        let (front, _) = buffer.get_latest();
        assert_eq!(front.timestamp(), 1.0);
        assert_eq!(buffer.stats().published, 1);
    }

    #[test]
    fn test_oversized_sample_rejected() {
        let mut buffer = manager(4);
        let result = buffer.update(&Reading::new(1.0, 5));
        assert_eq!(
            result,
            Err(BufferError::CapacityExceeded { len: 5, capacity: 4 })
        );

        let (front, is_new) = buffer.get_latest();
        assert!(!is_new);
        assert!(front.is_empty());
    }

    #[test]
    fn test_stale_timestamp_skipped() {
        let mut buffer = manager(4);
        buffer.update(&Reading::new(2.0, 1)).unwrap();
        assert_eq!(buffer.update(&Reading::new(2.0, 2)), Ok(false));
        assert_eq!(buffer.update(&Reading::new(1.5, 2)), Ok(false));

        let (front, _) = buffer.get_latest();
        assert_eq!(front.len(), 1);
    }

    #[test]
    fn test_non_finite_timestamp_skipped() {
        let (mut producer, mut consumer) = manager(4).split();
        assert!(!producer.accepts(f64::NAN));
        assert!(!producer.accepts(f64::INFINITY));
        assert_eq!(producer.update(&Reading::new(f64::NAN, 1)), Ok(false));
        assert_eq!(producer.update(&Reading::new(f64::INFINITY, 1)), Ok(false));

        for i in 1..=3 {
            assert_eq!(producer.update(&Reading::new(i as f64, 2)), Ok(true));
        }
        let (front, is_new) = consumer.get_latest();
        assert!(is_new);
        assert_eq!(front.timestamp(), 3.0);
    }

    #[test]
    fn test_non_finite_fill_not_published() {
        let mut buffer = manager(4);
        let published: Result<bool, BufferError> = buffer.update_with(|back| {
            back.timestamp = f64::NAN;
            back.values.push(1);
            Ok(true)
        });
        assert_eq!(published, Ok(false));
        assert_eq!(buffer.update(&Reading::new(1.0, 1)), Ok(true));

        let (front, is_new) = buffer.get_latest();
        assert!(is_new);
        assert_eq!(front.timestamp(), 1.0);
    }

    #[test]
    fn test_stale_sample_leaves_back_slot() {
        let (mut producer, _consumer) = manager(4).split();
        producer.update(&Reading::new(2.0, 1)).unwrap();
        producer.back.values.clear();
        producer.back.timestamp = 0.0;

        assert_eq!(producer.update(&Reading::new(1.0, 3)), Ok(false));
        assert!(producer.back.values.is_empty());
        assert_eq!(producer.back.timestamp, 0.0);
    }

    #[test]
    fn test_update_with_declined() {
        let mut buffer = manager(4);
        let published: Result<bool, BufferError> = buffer.update_with(|back| {
            back.timestamp = 1.0;
            back.values.push(7);
            Ok(false)
        });
        assert_eq!(published, Ok(false));
        assert!(!buffer.consumer.has_new_data());
    }

    #[test]
    fn test_slots_are_not_reallocated() {
        let mut buffer = manager(8);
        let mut seen = Vec::new();
        for i in 0..9 {
            buffer.update(&Reading::new(i as f64, 8)).unwrap();
            let (front, _) = buffer.get_latest();
            seen.push(front as *const Reading);
        }
        seen.sort();
        seen.dedup();
        assert!(seen.len() <= 3);
    }

    #[test]
    fn test_producer_not_blocked_by_held_front() {
        let (mut producer, mut consumer) = manager(4).split();
        producer.update(&Reading::new(1.0, 1)).unwrap();

        let (front, _) = consumer.get_latest();
        // Consumer still reading the front slot
        for i in 2..10 {
            producer.update(&Reading::new(i as f64, 2)).unwrap();
        }
        assert_eq!(front.timestamp(), 1.0);
        assert_eq!(front.len(), 1);

        let (front, is_new) = consumer.get_latest();
        assert!(is_new);
        assert_eq!(front.timestamp(), 9.0);
    }

    #[test]
    fn test_threaded_handoff_is_monotonic() {
        let (mut producer, mut consumer) = manager(64).split();
        const SAMPLES: usize = 20_000;

        let writer = thread::spawn(move || {
            for i in 1..=SAMPLES {
                producer.update(&Reading::new(i as f64, i % 64 + 1)).unwrap();
            }
        });

        let mut last = 0.0;
        loop {
            let (front, is_new) = consumer.get_latest();
            if is_new {
                assert!(front.timestamp() > last);
                assert_eq!(front.len(), front.timestamp() as usize % 64 + 1);
                last = front.timestamp();
            }
            if last == SAMPLES as f64 {
                break;
            }
            thread::yield_now();
        }

        writer.join().unwrap();
        let stats = consumer.stats();
        assert_eq!(stats.published, SAMPLES as u64);
        assert_eq!(stats.consumed + stats.dropped, SAMPLES as u64);
    }

    proptest! {
        #[test]
        fn prop_polls_never_go_backwards(ops in prop::collection::vec(any::<bool>(), 1..200)) {
            let mut buffer = manager(8);
            let mut next_timestamp = 0.0;
            let mut last_seen = f64::NEG_INFINITY;
            let mut last_written = None;

            for is_update in ops {
                if is_update {
                    next_timestamp += 0.1;
                    buffer.update(&Reading::new(next_timestamp, 1)).unwrap();
                    last_written = Some(next_timestamp);
                } else {
                    let (front, is_new) = buffer.get_latest();
                    if is_new {
                        prop_assert!(front.timestamp() >= last_seen);
                        prop_assert_eq!(Some(front.timestamp()), last_written);
                        last_seen = front.timestamp();
                    }
                }
            }
        }

        #[test]
        fn prop_length_within_capacity_is_exact(len in 1usize..=32, capacity in 1usize..=32) {
            let mut buffer = manager(capacity);
            let result = buffer.update(&Reading::new(1.0, len));
            if len <= capacity {
                prop_assert_eq!(result, Ok(true));
                let (front, _) = buffer.get_latest();
                prop_assert_eq!(front.len(), len);
            } else {
                prop_assert!(result.is_err());
                let (front, is_new) = buffer.get_latest();
                prop_assert!(!is_new);
                prop_assert!(front.is_empty());
            }
        }
    }
}
