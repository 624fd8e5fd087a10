//! Per-frame driver
//!
//! A frame walks a fixed sequence of stages:
//!
//! ```text
//! Idle -> WaitFence -> ResetFence -> AcquireImage -> Record -> Submit -> Present -> Idle
//! ```
//!
//! [`FrameDriver`] owns the sequencing and the frame counter; the GPU work for
//! each stage is delegated to a [`FrameBackend`]. Any stage error aborts the
//! frame and is returned to the caller as fatal. Once retired, a driver
//! refuses to start another frame.

use crate::render::vulkan::{VulkanError, VulkanResult};

/// Frames the CPU may record ahead of the GPU
pub const MAX_FRAMES_IN_FLIGHT: usize = 1;

/// Default bound for fence waits and image acquisition: 10 seconds
pub const DEFAULT_FRAME_TIMEOUT_NS: u64 = 10_000_000_000;

/// Position within the frame sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameStage {
    /// Between frames
    #[default]
    Idle,
    /// Waiting for the previous submission's fence
    WaitFence,
    /// Returning the fence to unsignalled
    ResetFence,
    /// Acquiring a swapchain image
    AcquireImage,
    /// Recording the command buffer
    Record,
    /// Submitting to the graphics queue
    Submit,
    /// Queueing the image for presentation
    Present,
}

impl FrameStage {
    /// The only legal successor of each stage
    pub fn next(self) -> Self {
        match self {
            Self::Idle => Self::WaitFence,
            Self::WaitFence => Self::ResetFence,
            Self::ResetFence => Self::AcquireImage,
            Self::AcquireImage => Self::Record,
            Self::Record => Self::Submit,
            Self::Submit => Self::Present,
            Self::Present => Self::Idle,
        }
    }
}

/// GPU work performed at each frame stage
pub trait FrameBackend {
    /// Block on the render fence
    fn wait_for_fence(&mut self, timeout_ns: u64) -> VulkanResult<()>;

    /// Unsignal the render fence
    fn reset_fence(&mut self) -> VulkanResult<()>;

    /// Acquire the next swapchain image, returning its index
    fn acquire_next_image(&mut self, timeout_ns: u64) -> VulkanResult<u32>;

    /// Record the frame's commands for the acquired image
    fn record(&mut self, image_index: u32, frame_number: u64) -> VulkanResult<()>;

    /// Submit the recorded commands
    fn submit(&mut self) -> VulkanResult<()>;

    /// Present the acquired image
    fn present(&mut self, image_index: u32) -> VulkanResult<()>;
}

/// Sequences frames and counts the ones that completed
#[derive(Debug, Clone)]
pub struct FrameDriver {
    frame_number: u64,
    timeout_ns: u64,
    stage: FrameStage,
    retired: bool,
}

impl FrameDriver {
    /// Driver starting at frame 0
    pub fn new(timeout_ns: u64) -> Self {
        Self {
            frame_number: 0,
            timeout_ns,
            stage: FrameStage::Idle,
            retired: false,
        }
    }

    /// Stop drawing for good; the backend's objects are about to be released
    pub fn retire(&mut self) {
        self.retired = true;
    }

    /// True once [`FrameDriver::retire`] has been called
    pub fn is_retired(&self) -> bool {
        self.retired
    }

    /// Frames presented so far
    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    /// Current stage; after a failed frame, the stage that failed
    pub fn stage(&self) -> FrameStage {
        self.stage
    }

    /// Run one full frame against `backend`
    ///
    /// The frame counter only advances once the image has been presented.
    /// A retired driver returns an error without touching the backend.
    pub fn draw_frame<B: FrameBackend>(&mut self, backend: &mut B) -> VulkanResult<()> {
        if self.retired {
            return Err(VulkanError::InvalidOperation {
                reason: "engine already cleaned up".to_string(),
            });
        }

        let mut image_index = 0;
        let mut stage = FrameStage::Idle.next();

        while stage != FrameStage::Idle {
            self.stage = stage;
            log::trace!("Frame {}: {:?}", self.frame_number, stage);

            match stage {
                FrameStage::Idle => {}
                FrameStage::WaitFence => backend.wait_for_fence(self.timeout_ns)?,
                FrameStage::ResetFence => backend.reset_fence()?,
                FrameStage::AcquireImage => image_index = backend.acquire_next_image(self.timeout_ns)?,
                FrameStage::Record => backend.record(image_index, self.frame_number)?,
                FrameStage::Submit => backend.submit()?,
                FrameStage::Present => backend.present(image_index)?,
            }

            stage = stage.next();
        }

        self.stage = FrameStage::Idle;
        self.frame_number += 1;
        Ok(())
    }

    /// Clear color for `frame_number`: blue pulsing with period 120π frames
    pub fn clear_color(frame_number: u64) -> [f32; 4] {
        let flash = (frame_number as f32 / 120.0).sin().abs();
        [0.0, 0.0, flash, 1.0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Call {
        Wait,
        Reset,
        Acquire,
        Record(u32, u64),
        Submit,
        Present(u32),
    }

    #[derive(Default)]
    struct MockBackend {
        calls: Vec<Call>,
        fail_at: Option<FrameStage>,
        next_image: u32,
    }

    impl MockBackend {
        fn failing_at(stage: FrameStage) -> Self {
            Self {
                fail_at: Some(stage),
                ..Default::default()
            }
        }

        fn check(&self, stage: FrameStage) -> VulkanResult<()> {
            if self.fail_at == Some(stage) {
                Err(VulkanError::Api(vk::Result::TIMEOUT))
            } else {
                Ok(())
            }
        }
    }

    impl FrameBackend for MockBackend {
        fn wait_for_fence(&mut self, _timeout_ns: u64) -> VulkanResult<()> {
            self.calls.push(Call::Wait);
            self.check(FrameStage::WaitFence)
        }

        fn reset_fence(&mut self) -> VulkanResult<()> {
            self.calls.push(Call::Reset);
            self.check(FrameStage::ResetFence)
        }

        fn acquire_next_image(&mut self, _timeout_ns: u64) -> VulkanResult<u32> {
            self.calls.push(Call::Acquire);
            self.check(FrameStage::AcquireImage)?;
            let index = self.next_image;
            self.next_image = (self.next_image + 1) % 3;
            Ok(index)
        }

        fn record(&mut self, image_index: u32, frame_number: u64) -> VulkanResult<()> {
            self.calls.push(Call::Record(image_index, frame_number));
            self.check(FrameStage::Record)
        }

        fn submit(&mut self) -> VulkanResult<()> {
            self.calls.push(Call::Submit);
            self.check(FrameStage::Submit)
        }

        fn present(&mut self, image_index: u32) -> VulkanResult<()> {
            self.calls.push(Call::Present(image_index));
            self.check(FrameStage::Present)
        }
    }

    #[test]
    fn test_stage_cycle() {
        let mut stage = FrameStage::Idle;
        let mut visited = Vec::new();
        for _ in 0..7 {
            stage = stage.next();
            visited.push(stage);
        }

        assert_eq!(
            visited,
            vec![
                FrameStage::WaitFence,
                FrameStage::ResetFence,
                FrameStage::AcquireImage,
                FrameStage::Record,
                FrameStage::Submit,
                FrameStage::Present,
                FrameStage::Idle,
            ]
        );
    }

    #[test]
    fn test_frame_runs_stages_in_order() {
        let mut driver = FrameDriver::new(DEFAULT_FRAME_TIMEOUT_NS);
        let mut backend = MockBackend::default();

        driver.draw_frame(&mut backend).unwrap();

        assert_eq!(
            backend.calls,
            vec![
                Call::Wait,
                Call::Reset,
                Call::Acquire,
                Call::Record(0, 0),
                Call::Submit,
                Call::Present(0),
            ]
        );
        assert_eq!(driver.frame_number(), 1);
        assert_eq!(driver.stage(), FrameStage::Idle);
    }

    #[test]
    fn test_acquire_always_follows_wait_and_reset() {
        let mut driver = FrameDriver::new(DEFAULT_FRAME_TIMEOUT_NS);
        let mut backend = MockBackend::default();

        for _ in 0..5 {
            driver.draw_frame(&mut backend).unwrap();
        }

        for (i, call) in backend.calls.iter().enumerate() {
            if *call == Call::Acquire {
                assert!(i >= 2);
                assert_eq!(backend.calls[i - 2], Call::Wait);
                assert_eq!(backend.calls[i - 1], Call::Reset);
            }
        }
        assert_eq!(driver.frame_number(), 5);
    }

    #[test]
    fn test_image_index_flows_to_record_and_present() {
        let mut driver = FrameDriver::new(DEFAULT_FRAME_TIMEOUT_NS);
        let mut backend = MockBackend {
            next_image: 2,
            ..Default::default()
        };

        driver.draw_frame(&mut backend).unwrap();

        assert!(backend.calls.contains(&Call::Record(2, 0)));
        assert!(backend.calls.contains(&Call::Present(2)));
    }

    #[test]
    fn test_fence_timeout_halts_frame() {
        let mut driver = FrameDriver::new(DEFAULT_FRAME_TIMEOUT_NS);
        let mut backend = MockBackend::failing_at(FrameStage::WaitFence);

        let result = driver.draw_frame(&mut backend);

        assert!(matches!(result, Err(VulkanError::Api(vk::Result::TIMEOUT))));
        assert_eq!(backend.calls, vec![Call::Wait]);
        assert_eq!(driver.frame_number(), 0);
        assert_eq!(driver.stage(), FrameStage::WaitFence);
    }

    #[test]
    fn test_error_at_any_stage_stops_later_stages() {
        let stages = [
            FrameStage::WaitFence,
            FrameStage::ResetFence,
            FrameStage::AcquireImage,
            FrameStage::Record,
            FrameStage::Submit,
            FrameStage::Present,
        ];

        for (i, stage) in stages.iter().enumerate() {
            let mut driver = FrameDriver::new(DEFAULT_FRAME_TIMEOUT_NS);
            let mut backend = MockBackend::failing_at(*stage);

            assert!(driver.draw_frame(&mut backend).is_err());
            assert_eq!(backend.calls.len(), i + 1);
            assert_eq!(driver.frame_number(), 0);
            assert_eq!(driver.stage(), *stage);
        }
    }

    #[test]
    fn test_frame_number_reaches_recording() {
        let mut driver = FrameDriver::new(DEFAULT_FRAME_TIMEOUT_NS);
        let mut backend = MockBackend::default();

        driver.draw_frame(&mut backend).unwrap();
        driver.draw_frame(&mut backend).unwrap();

        let recorded: Vec<u64> = backend
            .calls
            .iter()
            .filter_map(|c| match c {
                Call::Record(_, frame) => Some(*frame),
                _ => None,
            })
            .collect();
        assert_eq!(recorded, vec![0, 1]);
    }

    #[test]
    fn test_retired_driver_never_reaches_backend() {
        let mut driver = FrameDriver::new(DEFAULT_FRAME_TIMEOUT_NS);
        let mut backend = MockBackend::default();

        driver.draw_frame(&mut backend).unwrap();
        driver.retire();
        assert!(driver.is_retired());

        let result = driver.draw_frame(&mut backend);

        assert!(matches!(result, Err(VulkanError::InvalidOperation { .. })));
        assert_eq!(backend.calls.len(), 6);
        assert_eq!(driver.frame_number(), 1);
        assert_eq!(driver.stage(), FrameStage::Idle);
    }

    #[test]
    fn test_clear_color_pulses_blue() {
        assert_eq!(FrameDriver::clear_color(0), [0.0, 0.0, 0.0, 1.0]);

        let quarter = FrameDriver::clear_color(188); // 188 / 120 ≈ π/2
        approx::assert_relative_eq!(quarter[2], 1.0, epsilon = 1e-3);

        for frame in [1, 500, 10_000, 123_456] {
            let color = FrameDriver::clear_color(frame);
            assert!((0.0..=1.0).contains(&color[2]));
            assert_eq!(color[3], 1.0);
        }
    }

    #[test]
    fn test_single_frame_in_flight() {
        assert_eq!(MAX_FRAMES_IN_FLIGHT, 1);
    }
}
