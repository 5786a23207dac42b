//! Triple-buffered point cloud manager

use crate::{PointCloud, PointCloudError, PointCloudFrame};
use pose_support::{FramePair, Pose, PoseError, PoseProvider};
use tracing::info;
use triple_buffer::{BufferManager, BufferStats, Consumer, Producer, Sample};

/// Latest cloud together with the pose valid at its timestamp
#[derive(Debug)]
pub struct LatestWithPose<'a> {
    pub cloud: &'a PointCloud,
    pub pose: Pose,
    /// Whether `cloud` changed since the previous poll
    pub is_new: bool,
}


/// Producer half, driven by the depth callback thread
pub struct PointCloudProducer {
    inner: Producer<PointCloud>,
}

impl PointCloudProducer {
    /// Copy `frame` into the back buffer and publish it.
    ///
    /// Returns `Ok(false)` for an empty frame, a non-finite timestamp, or one
    /// not newer than the last published cloud. Skipped and oversized frames
    /// leave the back buffer untouched.
    pub fn update(&mut self, frame: &PointCloudFrame<'_>) -> Result<bool, PointCloudError> {
        if frame.points.is_empty() || !self.inner.accepts(frame.timestamp) {
            return Ok(false);
        }
        let published = self
            .inner
            .update_with(|back| back.fill(frame).map(|_| true))?;
        Ok(published)
    }

    /// Maximum points per cloud
    pub fn max_points(&self) -> usize {
        self.inner.capacity()
    }

    pub fn stats(&self) -> BufferStats {
        self.inner.stats()
    }
}

/// Consumer half, polled by the render or processing loop
pub struct PointCloudConsumer {
    inner: Consumer<PointCloud>,
}

impl PointCloudConsumer {
    /// Latest published cloud and whether it is new since the last poll.
    ///
    /// The cloud is empty until the first update.
    pub fn get_latest(&mut self) -> (&PointCloud, bool) {
        self.inner.get_latest()
    }

    /// Latest cloud plus the pose `frame` at that cloud's timestamp.
    ///
    /// The timestamp is read from the cloud already swapped to the front, so
    /// a cloud arriving during the lookup cannot mismatch the pair. Fails
    /// with [`PointCloudError::NoData`] before the first update and with a
    /// pose error when the provider has no valid pose.
    pub fn get_latest_with_pose<P>(
        &mut self,
        provider: &P,
        frame: FramePair,
    ) -> Result<LatestWithPose<'_>, PointCloudError>
    where
        P: PoseProvider + ?Sized,
    {
        let (cloud, is_new) = self.inner.get_latest();
        if cloud.is_empty() {
            return Err(PointCloudError::NoData);
        }

        let pose = provider.pose_at(cloud.timestamp(), frame)?;
        if !pose.is_valid() {
            return Err(PoseError::InvalidPose {
                timestamp: cloud.timestamp(),
            }
            .into());
        }

        Ok(LatestWithPose {
            cloud,
            pose,
            is_new,
        })
    }

    /// Check whether a newer cloud is waiting
    pub fn has_new_data(&self) -> bool {
        self.inner.has_new_data()
    }

    /// Maximum points per cloud
    pub fn max_points(&self) -> usize {
        self.inner.capacity()
    }

    pub fn stats(&self) -> BufferStats {
        self.inner.stats()
    }
}

/// Point cloud manager holding both halves
pub struct PointCloudManager {
    producer: PointCloudProducer,
    consumer: PointCloudConsumer,
}

impl PointCloudManager {
    /// Allocate three clouds of `max_points` each
    pub fn new(max_points: usize) -> Result<Self, PointCloudError> {
        let (producer, consumer) =
            BufferManager::new(max_points, PointCloud::with_capacity)?.split();
        info!("Created point cloud manager: max_points={}", max_points);

        Ok(Self {
            producer: PointCloudProducer { inner: producer },
            consumer: PointCloudConsumer { inner: consumer },
        })
    }

    /// Separate the callback-side and render-side halves
    pub fn split(self) -> (PointCloudProducer, PointCloudConsumer) {
        (self.producer, self.consumer)
    }

    /// See [`PointCloudProducer::update`]
    pub fn update(&mut self, frame: &PointCloudFrame<'_>) -> Result<bool, PointCloudError> {
        self.producer.update(frame)
    }

    /// See [`PointCloudConsumer::get_latest`]
    pub fn get_latest(&mut self) -> (&PointCloud, bool) {
        self.consumer.get_latest()
    }

    /// See [`PointCloudConsumer::get_latest_with_pose`]
    pub fn get_latest_with_pose<P>(
        &mut self,
        provider: &P,
        frame: FramePair,
    ) -> Result<LatestWithPose<'_>, PointCloudError>
    where
        P: PoseProvider + ?Sized,
    {
        self.consumer.get_latest_with_pose(provider, frame)
    }

    pub fn max_points(&self) -> usize {
        self.producer.max_points()
    }

    pub fn stats(&self) -> BufferStats {
        self.producer.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pose_support::{CoordinateFrame, PoseStatus, StaticPoseProvider};
    use proptest::prelude::*;
    use std::cell::RefCell;
    use triple_buffer::BufferError;

    fn synthetic_points(count: usize) -> Vec<[f32; 3]> {
        (0..count)
            .map(|i| [i as f32 * 0.01, 0.0, 1.0 + (i % 10) as f32 * 0.1])
            .collect()
    }

    fn depth_in_start_of_service() -> FramePair {
        FramePair::new(CoordinateFrame::StartOfService, CoordinateFrame::CameraDepth)
    }

    /// Records every lookup and can publish a newer cloud mid-lookup
    struct RecordingProvider<'a> {
        requests: RefCell<Vec<f64>>,
        producer: Option<RefCell<&'a mut PointCloudProducer>>,
    }

    impl PoseProvider for RecordingProvider<'_> {
        fn pose_at(&self, timestamp: f64, frame: FramePair) -> Result<Pose, PoseError> {
            self.requests.borrow_mut().push(timestamp);
            if let Some(producer) = &self.producer {
                let points = synthetic_points(5);
                producer
                    .borrow_mut()
                    .update(&PointCloudFrame::new(timestamp + 1.0, &points))
                    .map_err(|e| PoseError::Provider(e.to_string()))?;
            }
            Ok(Pose::identity(timestamp, frame))
        }
    }

    #[test]
    fn test_create_rejects_zero_points() {
        assert!(matches!(
            PointCloudManager::new(0),
            Err(PointCloudError::Buffer(BufferError::InvalidArgument(_)))
        ));
    }

    #[test]
    fn test_update_and_poll() {
        let mut manager = PointCloudManager::new(1000).unwrap();
        let points = synthetic_points(500);
        assert_eq!(manager.update(&PointCloudFrame::new(1.0, &points)), Ok(true));

        let (cloud, is_new) = manager.get_latest();
        assert!(is_new);
        assert_eq!(cloud.len(), 500);
        assert_eq!(cloud.timestamp(), 1.0);
        let first = cloud as *const PointCloud;

        let (cloud, is_new) = manager.get_latest();
        assert!(!is_new);
        assert!(std::ptr::eq(first, cloud));
    }

    #[test]
    fn test_only_newest_cloud_observed() {
        let mut manager = PointCloudManager::new(1000).unwrap();
        let older = synthetic_points(10);
        let newer = synthetic_points(20);
        manager.update(&PointCloudFrame::new(1.0, &older)).unwrap();
        manager.update(&PointCloudFrame::new(1.1, &newer)).unwrap();

        let (cloud, is_new) = manager.get_latest();
        assert!(is_new);
        assert_eq!(cloud.timestamp(), 1.1);
        assert_eq!(cloud.len(), 20);
    }

    #[test]
    fn test_empty_cloud_skipped() {
        let mut manager = PointCloudManager::new(10).unwrap();
        assert_eq!(manager.update(&PointCloudFrame::new(1.0, &[])), Ok(false));
        let (cloud, is_new) = manager.get_latest();
        assert!(!is_new);
        assert!(cloud.is_empty());
    }

    #[test]
    fn test_oversized_cloud_rejected() {
        let mut manager = PointCloudManager::new(10).unwrap();
        let points = synthetic_points(11);
        assert_eq!(
            manager.update(&PointCloudFrame::new(1.0, &points)),
            Err(PointCloudError::Buffer(BufferError::CapacityExceeded {
                len: 11,
                capacity: 10
            }))
        );
    }

    #[test]
    fn test_non_finite_timestamp_does_not_stall_updates() {
        let mut manager = PointCloudManager::new(10).unwrap();
        let points = synthetic_points(1);
        assert_eq!(manager.update(&PointCloudFrame::new(f64::NAN, &points)), Ok(false));
        assert_eq!(
            manager.update(&PointCloudFrame::new(f64::NEG_INFINITY, &points)),
            Ok(false)
        );

        for timestamp in [1.0, 2.0, 3.0] {
            assert_eq!(manager.update(&PointCloudFrame::new(timestamp, &points)), Ok(true));
        }
        let (cloud, is_new) = manager.get_latest();
        assert!(is_new);
        assert_eq!(cloud.timestamp(), 3.0);
        assert_eq!(manager.stats().published, 3);
    }

    #[test]
    fn test_pose_before_first_cloud() {
        let mut manager = PointCloudManager::new(10).unwrap();
        let provider = StaticPoseProvider::identity();
        assert_eq!(
            manager
                .get_latest_with_pose(&provider, depth_in_start_of_service())
                .unwrap_err(),
            PointCloudError::NoData
        );
    }

    #[test]
    fn test_pose_matches_cloud_timestamp() {
        let mut manager = PointCloudManager::new(100).unwrap();
        let points = synthetic_points(50);
        manager.update(&PointCloudFrame::new(2.5, &points)).unwrap();

        let provider = StaticPoseProvider::identity();
        let latest = manager
            .get_latest_with_pose(&provider, depth_in_start_of_service())
            .unwrap();
        assert!(latest.is_new);
        assert_eq!(latest.pose.timestamp, latest.cloud.timestamp());
        assert_eq!(latest.pose.frame, depth_in_start_of_service());
    }

    #[test]
    fn test_pose_stays_paired_when_cloud_arrives_during_lookup() {
        let (mut producer, mut consumer) = PointCloudManager::new(100).unwrap().split();
        let points = synthetic_points(8);
        producer.update(&PointCloudFrame::new(1.0, &points)).unwrap();

        let provider = RecordingProvider {
            requests: RefCell::new(Vec::new()),
            producer: Some(RefCell::new(&mut producer)),
        };
        let latest = consumer
            .get_latest_with_pose(&provider, depth_in_start_of_service())
            .unwrap();

        assert_eq!(latest.cloud.timestamp(), 1.0);
        assert_eq!(latest.cloud.len(), 8);
        assert_eq!(latest.pose.timestamp, 1.0);
        assert_eq!(*provider.requests.borrow(), vec![1.0]);

        let (cloud, is_new) = consumer.get_latest();
        assert!(is_new);
        assert_eq!(cloud.timestamp(), 2.0);
    }

    #[test]
    fn test_invalid_pose_reported() {
        struct Lost;
        impl PoseProvider for Lost {
            fn pose_at(&self, timestamp: f64, frame: FramePair) -> Result<Pose, PoseError> {
                Ok(Pose {
                    status: PoseStatus::Invalid,
                    ..Pose::identity(timestamp, frame)
                })
            }
        }

        let mut manager = PointCloudManager::new(10).unwrap();
        manager
            .update(&PointCloudFrame::new(3.0, &synthetic_points(3)))
            .unwrap();
        assert_eq!(
            manager
                .get_latest_with_pose(&Lost, depth_in_start_of_service())
                .unwrap_err(),
            PointCloudError::Pose(PoseError::InvalidPose { timestamp: 3.0 })
        );
    }

    proptest! {
        #[test]
        fn prop_cloud_length_is_exact_or_rejected(len in 1usize..=64, max_points in 1usize..=48) {
            let mut manager = PointCloudManager::new(max_points).unwrap();
            let points = synthetic_points(len);
            let result = manager.update(&PointCloudFrame::new(1.0, &points));

            if len <= max_points {
                prop_assert_eq!(result, Ok(true));
                let (cloud, is_new) = manager.get_latest();
                prop_assert!(is_new);
                prop_assert_eq!(cloud.len(), len);
                prop_assert_eq!(cloud.points(), &points[..]);
            } else {
                prop_assert_eq!(
                    result,
                    Err(PointCloudError::Buffer(BufferError::CapacityExceeded {
                        len,
                        capacity: max_points,
                    }))
                );
                let (cloud, is_new) = manager.get_latest();
                prop_assert!(!is_new);
                prop_assert!(cloud.is_empty());
                prop_assert_eq!(manager.stats().published, 0);
            }
        }
    }
}
