//! Vertex buffer upload
//!
//! A single blocking, write-once transfer: allocate host-visible memory,
//! map it, copy the vertices, unmap. No staging buffer and no streaming.

use ash::vk;

use crate::render::mesh::{Mesh, Vertex};
use crate::render::DeletionQueue;
use super::allocator::{BufferAllocator, MemoryUsageHint};
use super::context::VulkanResult;

/// GPU buffer handle plus its size
///
/// The memory behind it is owned by the buffer's release action in the
/// deletion queue, not by this struct.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocatedBuffer {
    /// Vulkan buffer handle
    pub buffer: vk::Buffer,
    /// Size in bytes
    pub size: vk::DeviceSize,
}

/// Upload `bytes` into a new buffer with the given usage
///
/// The buffer's release is queued as soon as the allocation exists and before
/// any map/copy error is returned, so a failed copy never leaks the buffer.
pub fn upload_bytes<A: BufferAllocator>(
    allocator: &A,
    deletion_queue: &mut DeletionQueue,
    bytes: &[u8],
    usage: vk::BufferUsageFlags,
) -> VulkanResult<AllocatedBuffer> {
    let size = bytes.len() as vk::DeviceSize;
    let (buffer, mut allocation) = allocator.allocate_buffer(size, usage, MemoryUsageHint::CpuToGpu)?;

    let copied = write_mapped(allocator, &mut allocation, bytes);

    let owner = allocator.clone();
    deletion_queue.push(move || owner.destroy_buffer(buffer, allocation));

    copied?;
    Ok(AllocatedBuffer { buffer, size })
}

fn write_mapped<A: BufferAllocator>(
    allocator: &A,
    allocation: &mut A::Allocation,
    bytes: &[u8],
) -> VulkanResult<()> {
    let data = allocator.map(allocation)?;
    unsafe {
        std::ptr::copy_nonoverlapping(bytes.as_ptr(), data, bytes.len());
    }
    allocator.unmap(allocation);
    Ok(())
}

/// Upload a mesh's vertices into a vertex buffer and store the handle on the mesh
///
/// Empty meshes are left without a buffer.
pub fn upload_mesh<A: BufferAllocator>(
    allocator: &A,
    deletion_queue: &mut DeletionQueue,
    mesh: &mut Mesh,
) -> VulkanResult<()> {
    if mesh.vertices.is_empty() {
        log::warn!("Skipping upload of empty mesh");
        return Ok(());
    }

    let bytes: &[u8] = bytemuck::cast_slice(&mesh.vertices);
    debug_assert_eq!(bytes.len(), mesh.vertices.len() * std::mem::size_of::<Vertex>());

    let buffer = upload_bytes(allocator, deletion_queue, bytes, vk::BufferUsageFlags::VERTEX_BUFFER)?;
    log::debug!("Uploaded {} vertices ({} bytes)", mesh.vertices.len(), buffer.size);

    mesh.vertex_buffer = Some(buffer);
    Ok(())
}
