//! GPU memory allocation
//!
//! [`BufferAllocator`] is the narrow interface the mesh upload path needs:
//! allocate a buffer, map/unmap it, destroy it. [`GpuAllocator`] implements it
//! on top of the Vulkan Memory Allocator (`vk-mem`).
//!
//! Allocations are never freed implicitly. Whoever allocates registers the
//! matching `destroy_buffer` with the deletion queue, and the allocator's own
//! release is queued before any buffer, so LIFO playback frees every buffer first.

use ash::vk;
use std::rc::Rc;
use vk_mem::Alloc;

use crate::render::DeletionQueue;
use super::context::{DeviceContext, VulkanError, VulkanInstance, VulkanResult};

/// Where an allocation should live
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryUsageHint {
    /// Host-visible memory written once by the CPU and read by the GPU
    CpuToGpu,
}

impl MemoryUsageHint {
    fn vma_usage(self) -> vk_mem::MemoryUsage {
        match self {
            Self::CpuToGpu => vk_mem::MemoryUsage::CpuToGpu,
        }
    }
}

/// Buffer allocation interface used by the upload path
pub trait BufferAllocator: Clone + 'static {
    /// Opaque allocation record returned alongside each buffer
    type Allocation: 'static;

    /// Create a buffer of `size` bytes backed by freshly allocated memory
    fn allocate_buffer(
        &self,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        hint: MemoryUsageHint,
    ) -> VulkanResult<(vk::Buffer, Self::Allocation)>;

    /// Map the allocation and return a pointer to its first byte
    fn map(&self, allocation: &mut Self::Allocation) -> VulkanResult<*mut u8>;

    /// Undo a successful [`BufferAllocator::map`]
    fn unmap(&self, allocation: &mut Self::Allocation);

    /// Destroy the buffer and free its memory
    fn destroy_buffer(&self, buffer: vk::Buffer, allocation: Self::Allocation);
}

/// Pooled allocator over `vk-mem`
///
/// Cloning is cheap and shares the same allocator; buffer release actions keep
/// a clone so they can free their memory at flush time.
#[derive(Clone)]
pub struct GpuAllocator {
    inner: Rc<vk_mem::Allocator>,
}

impl GpuAllocator {
    /// Create the allocator and queue its own destruction
    pub fn new(
        instance: &VulkanInstance,
        device: &DeviceContext,
        deletion_queue: &mut DeletionQueue,
    ) -> VulkanResult<Self> {
        let create_info = vk_mem::AllocatorCreateInfo::new(
            &instance.instance,
            &device.device,
            device.physical_device,
        );

        let allocator = vk_mem::Allocator::new(create_info).map_err(VulkanError::Api)?;

        let allocator = Self {
            inner: Rc::new(allocator),
        };

        let released = allocator.clone();
        deletion_queue.push(move || released.release());

        log::debug!("GPU memory allocator created");
        Ok(allocator)
    }

    /// Destroy the allocator if this is the last handle to it
    fn release(self) {
        match Rc::try_unwrap(self.inner) {
            Ok(allocator) => {
                drop(allocator);
                log::debug!("GPU memory allocator destroyed");
            }
            Err(shared) => {
                // Destroying it later would happen after the device is gone
                log::error!(
                    "GPU allocator still has {} other owners at teardown; leaking it",
                    Rc::strong_count(&shared) - 1
                );
                std::mem::forget(shared);
            }
        }
    }
}

impl BufferAllocator for GpuAllocator {
    type Allocation = vk_mem::Allocation;

    fn allocate_buffer(
        &self,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        hint: MemoryUsageHint,
    ) -> VulkanResult<(vk::Buffer, Self::Allocation)> {
        let buffer_info = vk::BufferCreateInfo::builder()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let allocation_info = vk_mem::AllocationCreateInfo {
            usage: hint.vma_usage(),
            ..Default::default()
        };

        unsafe {
            self.inner
                .create_buffer(&buffer_info, &allocation_info)
                .map_err(VulkanError::Api)
        }
    }

    fn map(&self, allocation: &mut Self::Allocation) -> VulkanResult<*mut u8> {
        unsafe { self.inner.map_memory(allocation).map_err(VulkanError::Api) }
    }

    fn unmap(&self, allocation: &mut Self::Allocation) {
        unsafe { self.inner.unmap_memory(allocation) }
    }

    fn destroy_buffer(&self, buffer: vk::Buffer, mut allocation: Self::Allocation) {
        unsafe { self.inner.destroy_buffer(buffer, &mut allocation) }
    }
}

/// Host-memory allocator standing in for the GPU in tests
#[cfg(test)]
pub(crate) mod host {
    use super::*;
    use ash::vk::Handle;
    use std::cell::RefCell;
    use std::collections::HashMap;

    #[derive(Default)]
    struct HostBuffer {
        bytes: Vec<u8>,
        usage: vk::BufferUsageFlags,
        hint: Option<MemoryUsageHint>,
        mapped: bool,
    }

    #[derive(Default)]
    struct HostState {
        next_id: u64,
        buffers: HashMap<u64, HostBuffer>,
        fail_map: bool,
    }

    /// Buffers are plain byte vectors keyed by a fake handle
    #[derive(Clone, Default)]
    pub(crate) struct HostAllocator {
        state: Rc<RefCell<HostState>>,
    }

    impl HostAllocator {
        pub(crate) fn failing_map() -> Self {
            let allocator = Self::default();
            allocator.state.borrow_mut().fail_map = true;
            allocator
        }

        pub(crate) fn contents(&self, buffer: vk::Buffer) -> Option<Vec<u8>> {
            self.state
                .borrow()
                .buffers
                .get(&buffer.as_raw())
                .map(|b| b.bytes.clone())
        }

        pub(crate) fn usage(&self, buffer: vk::Buffer) -> Option<(vk::BufferUsageFlags, Option<MemoryUsageHint>)> {
            self.state
                .borrow()
                .buffers
                .get(&buffer.as_raw())
                .map(|b| (b.usage, b.hint))
        }

        pub(crate) fn is_mapped(&self, buffer: vk::Buffer) -> bool {
            self.state
                .borrow()
                .buffers
                .get(&buffer.as_raw())
                .map_or(false, |b| b.mapped)
        }

        pub(crate) fn live_buffers(&self) -> usize {
            self.state.borrow().buffers.len()
        }
    }

    impl BufferAllocator for HostAllocator {
        type Allocation = u64;

        fn allocate_buffer(
            &self,
            size: vk::DeviceSize,
            usage: vk::BufferUsageFlags,
            hint: MemoryUsageHint,
        ) -> VulkanResult<(vk::Buffer, u64)> {
            let mut state = self.state.borrow_mut();
            state.next_id += 1;
            let id = state.next_id;
            state.buffers.insert(
                id,
                HostBuffer {
                    bytes: vec![0; size as usize],
                    usage,
                    hint: Some(hint),
                    mapped: false,
                },
            );
            Ok((vk::Buffer::from_raw(id), id))
        }

        fn map(&self, allocation: &mut u64) -> VulkanResult<*mut u8> {
            let mut state = self.state.borrow_mut();
            if state.fail_map {
                return Err(VulkanError::Api(vk::Result::ERROR_MEMORY_MAP_FAILED));
            }
            let buffer = state
                .buffers
                .get_mut(allocation)
                .ok_or_else(|| VulkanError::InvalidOperation {
                    reason: format!("unknown allocation {}", allocation),
                })?;
            buffer.mapped = true;
            Ok(buffer.bytes.as_mut_ptr())
        }

        fn unmap(&self, allocation: &mut u64) {
            if let Some(buffer) = self.state.borrow_mut().buffers.get_mut(allocation) {
                buffer.mapped = false;
            }
        }

        fn destroy_buffer(&self, _buffer: vk::Buffer, allocation: u64) {
            self.state.borrow_mut().buffers.remove(&allocation);
        }
    }
}
