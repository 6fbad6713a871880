//! Frames-in-flight state machine
//!
//! [`FrameLoop::draw_frame`] runs one iteration of the per-frame protocol
//! against any [`FrameOps`] implementation. Slot `i`'s fence is signaled
//! exactly when slot `i` has no outstanding GPU work, its command buffer and
//! uniform buffer are only touched between the fence wait and the submit,
//! and an out-of-date acquire leaves the fence signaled so the next attempt
//! at the same slot does not deadlock.

use ash::prelude::VkResult;
use ash::vk;

use crate::render::vulkan::context::{VulkanError, VulkanResult};

/// Result of acquiring a swapchain image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// An image is ready to render into
    Ready {
        /// Swapchain image index
        image_index: u32,
        /// The swapchain no longer matches the surface exactly but is usable
        suboptimal: bool,
    },
    /// The swapchain must be recreated before rendering
    OutOfDate,
}

/// Map the raw acquire result; anything but success, suboptimal or out-of-date is fatal
pub fn classify_acquire(result: VkResult<(u32, bool)>) -> VulkanResult<AcquireOutcome> {
    match result {
        Ok((image_index, suboptimal)) => Ok(AcquireOutcome::Ready { image_index, suboptimal }),
        Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(AcquireOutcome::OutOfDate),
        Err(e) => Err(VulkanError::Api(e)),
    }
}

/// Result of presenting an image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentStatus {
    /// Presented and the swapchain still matches the surface
    Optimal,
    /// Presented or dropped; the swapchain should be rebuilt
    NeedsRecreate,
}

/// Map the raw present result; suboptimal and out-of-date both ask for recreation
pub fn classify_present(result: VkResult<bool>) -> VulkanResult<PresentStatus> {
    match result {
        Ok(false) => Ok(PresentStatus::Optimal),
        Ok(true) | Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(PresentStatus::NeedsRecreate),
        Err(e) => Err(VulkanError::Api(e)),
    }
}

/// What one call to [`FrameLoop::draw_frame`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// A frame was submitted and presented
    Presented,
    /// A frame was submitted and presented, then the swapchain was rebuilt
    PresentedAndRecreated,
    /// Acquire reported out-of-date; the swapchain was rebuilt and nothing was drawn
    Skipped,
}

/// The individual steps of a frame, performed on behalf of [`FrameLoop`]
pub trait FrameOps {
    /// Block until slot `slot`'s previous submission has finished
    fn wait_for_slot(&mut self, slot: usize) -> VulkanResult<()>;

    /// Acquire the next swapchain image, signaling slot `slot`'s image-available semaphore
    fn acquire_image(&mut self, slot: usize) -> VulkanResult<AcquireOutcome>;

    /// Write fresh uniforms into slot `slot`'s mapped buffer
    fn update_uniforms(&mut self, slot: usize) -> VulkanResult<()>;

    /// Return slot `slot`'s fence to the unsignaled state
    fn reset_fence(&mut self, slot: usize) -> VulkanResult<()>;

    /// Re-record slot `slot`'s command buffer for `image_index`
    fn record_commands(&mut self, slot: usize, image_index: u32) -> VulkanResult<()>;

    /// Submit slot `slot`'s command buffer, signaling its fence on completion
    fn submit(&mut self, slot: usize) -> VulkanResult<()>;

    /// Present `image_index` once slot `slot`'s rendering is done
    fn present(&mut self, slot: usize, image_index: u32) -> VulkanResult<PresentStatus>;

    /// Read and clear the window's resize flag
    fn take_resize_flag(&mut self) -> bool;

    /// Rebuild the swapchain and everything sized by it
    fn recreate_swapchain(&mut self) -> VulkanResult<()>;
}

/// Tracks the current frame slot
#[derive(Debug, Clone)]
pub struct FrameLoop {
    current_frame: usize,
    frames_in_flight: usize,
}

impl FrameLoop {
    /// Start at slot 0 with `frames_in_flight` slots (at least one)
    pub fn new(frames_in_flight: usize) -> Self {
        Self {
            current_frame: 0,
            frames_in_flight: frames_in_flight.max(1),
        }
    }

    /// Slot the next frame will use
    pub fn current_frame(&self) -> usize {
        self.current_frame
    }

    /// Number of slots
    pub fn frames_in_flight(&self) -> usize {
        self.frames_in_flight
    }

    /// Run one frame
    pub fn draw_frame<O: FrameOps>(&mut self, ops: &mut O) -> VulkanResult<FrameOutcome> {
        let slot = self.current_frame;

        ops.wait_for_slot(slot)?;

        let image_index = match ops.acquire_image(slot)? {
            AcquireOutcome::Ready { image_index, .. } => image_index,
            AcquireOutcome::OutOfDate => {
                // Fence stays signaled and the slot is retried next call
                ops.recreate_swapchain()?;
                return Ok(FrameOutcome::Skipped);
            }
        };

        ops.update_uniforms(slot)?;
        ops.reset_fence(slot)?;
        ops.record_commands(slot, image_index)?;
        ops.submit(slot)?;

        let status = ops.present(slot, image_index)?;
        let resized = ops.take_resize_flag();

        let outcome = if status == PresentStatus::NeedsRecreate || resized {
            ops.recreate_swapchain()?;
            FrameOutcome::PresentedAndRecreated
        } else {
            FrameOutcome::Presented
        };

        self.current_frame = (self.current_frame + 1) % self.frames_in_flight;
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Step {
        Wait(usize),
        Acquire(usize),
        Update(usize),
        Reset(usize),
        Record(usize, u32),
        Submit(usize),
        Present(usize, u32),
        TakeResize,
        Recreate,
    }

    struct MockOps {
        steps: Vec<Step>,
        acquire: Vec<VkResult<(u32, bool)>>,
        present: Vec<VkResult<bool>>,
        resized: bool,
    }

    impl MockOps {
        fn new() -> Self {
            Self {
                steps: Vec::new(),
                acquire: Vec::new(),
                present: Vec::new(),
                resized: false,
            }
        }

        fn with_acquire(mut self, result: VkResult<(u32, bool)>) -> Self {
            self.acquire.push(result);
            self
        }

        fn with_present(mut self, result: VkResult<bool>) -> Self {
            self.present.push(result);
            self
        }
    }

    impl FrameOps for MockOps {
        fn wait_for_slot(&mut self, slot: usize) -> VulkanResult<()> {
            self.steps.push(Step::Wait(slot));
            Ok(())
        }

        fn acquire_image(&mut self, slot: usize) -> VulkanResult<AcquireOutcome> {
            self.steps.push(Step::Acquire(slot));
            let result = if self.acquire.is_empty() {
                Ok((slot as u32, false))
            } else {
                self.acquire.remove(0)
            };
            classify_acquire(result)
        }

        fn update_uniforms(&mut self, slot: usize) -> VulkanResult<()> {
            self.steps.push(Step::Update(slot));
            Ok(())
        }

        fn reset_fence(&mut self, slot: usize) -> VulkanResult<()> {
            self.steps.push(Step::Reset(slot));
            Ok(())
        }

        fn record_commands(&mut self, slot: usize, image_index: u32) -> VulkanResult<()> {
            self.steps.push(Step::Record(slot, image_index));
            Ok(())
        }

        fn submit(&mut self, slot: usize) -> VulkanResult<()> {
            self.steps.push(Step::Submit(slot));
            Ok(())
        }

        fn present(&mut self, slot: usize, image_index: u32) -> VulkanResult<PresentStatus> {
            self.steps.push(Step::Present(slot, image_index));
            let result = if self.present.is_empty() {
                Ok(false)
            } else {
                self.present.remove(0)
            };
            classify_present(result)
        }

        fn take_resize_flag(&mut self) -> bool {
            self.steps.push(Step::TakeResize);
            std::mem::take(&mut self.resized)
        }

        fn recreate_swapchain(&mut self) -> VulkanResult<()> {
            self.steps.push(Step::Recreate);
            Ok(())
        }
    }

    #[test]
    fn test_steps_run_in_order() {
        let mut frames = FrameLoop::new(2);
        let mut ops = MockOps::new().with_acquire(Ok((1, false)));

        let outcome = frames.draw_frame(&mut ops).unwrap();

        assert_eq!(outcome, FrameOutcome::Presented);
        assert_eq!(
            ops.steps,
            vec![
                Step::Wait(0),
                Step::Acquire(0),
                Step::Update(0),
                Step::Reset(0),
                Step::Record(0, 1),
                Step::Submit(0),
                Step::Present(0, 1),
                Step::TakeResize,
            ]
        );
        assert_eq!(frames.current_frame(), 1);
    }

    #[test]
    fn test_out_of_date_acquire_skips_frame() {
        let mut frames = FrameLoop::new(2);
        let mut ops = MockOps::new().with_acquire(Err(vk::Result::ERROR_OUT_OF_DATE_KHR));

        let outcome = frames.draw_frame(&mut ops).unwrap();

        assert_eq!(outcome, FrameOutcome::Skipped);
        assert_eq!(ops.steps, vec![Step::Wait(0), Step::Acquire(0), Step::Recreate]);
        assert!(!ops.steps.contains(&Step::Reset(0)));
        assert!(!ops.steps.contains(&Step::Submit(0)));
        assert_eq!(frames.current_frame(), 0);
    }

    #[test]
    fn test_suboptimal_acquire_still_renders() {
        let mut frames = FrameLoop::new(2);
        let mut ops = MockOps::new().with_acquire(Ok((0, true)));

        assert_eq!(frames.draw_frame(&mut ops).unwrap(), FrameOutcome::Presented);
        assert!(ops.steps.contains(&Step::Submit(0)));
    }

    #[test]
    fn test_present_out_of_date_recreates() {
        let mut frames = FrameLoop::new(2);
        let mut ops = MockOps::new().with_present(Err(vk::Result::ERROR_OUT_OF_DATE_KHR));

        assert_eq!(frames.draw_frame(&mut ops).unwrap(), FrameOutcome::PresentedAndRecreated);
        assert_eq!(ops.steps.last(), Some(&Step::Recreate));
        assert_eq!(frames.current_frame(), 1);
    }

    #[test]
    fn test_present_suboptimal_recreates() {
        let mut frames = FrameLoop::new(2);
        let mut ops = MockOps::new().with_present(Ok(true));

        assert_eq!(frames.draw_frame(&mut ops).unwrap(), FrameOutcome::PresentedAndRecreated);
    }

    #[test]
    fn test_resize_flag_recreates_and_is_cleared() {
        let mut frames = FrameLoop::new(2);
        let mut ops = MockOps::new();
        ops.resized = true;

        assert_eq!(frames.draw_frame(&mut ops).unwrap(), FrameOutcome::PresentedAndRecreated);
        assert!(!ops.resized);

        ops.steps.clear();
        assert_eq!(frames.draw_frame(&mut ops).unwrap(), FrameOutcome::Presented);
        assert!(!ops.steps.contains(&Step::Recreate));
    }

    #[test]
    fn test_other_errors_are_fatal() {
        let mut frames = FrameLoop::new(2);
        let mut ops = MockOps::new().with_acquire(Err(vk::Result::ERROR_DEVICE_LOST));
        assert!(matches!(
            frames.draw_frame(&mut ops),
            Err(VulkanError::Api(vk::Result::ERROR_DEVICE_LOST))
        ));

        let mut ops = MockOps::new().with_present(Err(vk::Result::ERROR_SURFACE_LOST_KHR));
        assert!(matches!(
            frames.draw_frame(&mut ops),
            Err(VulkanError::Api(vk::Result::ERROR_SURFACE_LOST_KHR))
        ));
    }

    #[test]
    fn test_slots_wrap_around() {
        let mut frames = FrameLoop::new(2);
        let mut ops = MockOps::new();

        let slots: Vec<usize> = (0..5)
            .map(|_| {
                let slot = frames.current_frame();
                frames.draw_frame(&mut ops).unwrap();
                slot
            })
            .collect();

        assert_eq!(slots, vec![0, 1, 0, 1, 0]);
    }

    #[test]
    fn test_zero_frames_clamped_to_one() {
        let frames = FrameLoop::new(0);
        assert_eq!(frames.frames_in_flight(), 1);
    }

    #[test]
    fn test_classification() {
        assert_eq!(
            classify_acquire(Ok((2, true))).unwrap(),
            AcquireOutcome::Ready {
                image_index: 2,
                suboptimal: true
            }
        );
        assert_eq!(classify_present(Ok(false)).unwrap(), PresentStatus::Optimal);
        assert_eq!(
            classify_present(Err(vk::Result::ERROR_OUT_OF_DATE_KHR)).unwrap(),
            PresentStatus::NeedsRecreate
        );
    }
}
