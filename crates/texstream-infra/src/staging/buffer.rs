// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use super::memory::find_memory_type_index;
use std::ptr::NonNull;
use texstream_core::traits::vulkan::{BufferHandle, MemoryHandle, MemoryPropertyFlags};
use texstream_core::traits::VulkanDevice;
use texstream_core::{TextureError, TextureResult};

/// A host pointer into mapped device memory.
#[derive(Debug, Clone, Copy)]
struct MappedPtr(NonNull<u8>);

// The mapping is only dereferenced on the render thread, which owns the buffer.
unsafe impl Send for MappedPtr {}

/// A host-visible buffer used as the source of one buffer-to-image copy.
///
/// A transfer buffer owns its device objects but cannot release them on
/// drop, because it does not know whether the GPU is done with them. It must
/// be handed to [`release`](TransferBuffer::release) explicitly, normally via
/// the deferred destruction queue.
#[derive(Debug)]
pub struct TransferBuffer {
    buffer: BufferHandle,
    memory: MemoryHandle,
    mapped: MappedPtr,
    size: u64,
    allocation_size: u64,
    memory_flags: MemoryPropertyFlags,
}

/// Device objects created so far by [`TransferBuffer::allocate`], released on
/// drop unless the allocation completes.
struct PartialAllocation<'a> {
    device: &'a dyn VulkanDevice,
    buffer: Option<BufferHandle>,
    memory: Option<MemoryHandle>,
    mapped: bool,
}

impl PartialAllocation<'_> {
    fn disarm(&mut self) {
        self.buffer = None;
        self.memory = None;
        self.mapped = false;
    }
}

impl Drop for PartialAllocation<'_> {
    fn drop(&mut self) {
        if let Some(buffer) = self.buffer {
            self.device.destroy_buffer(buffer);
        }
        if let Some(memory) = self.memory {
            if self.mapped {
                self.device.unmap_memory(memory);
            }
            self.device.free_memory(memory);
        }
    }
}

impl TransferBuffer {
    /// Creates a mapped, host-visible buffer of `size` bytes.
    ///
    /// If any step fails, everything created so far is released immediately;
    /// none of it was ever visible to the GPU.
    pub fn allocate(device: &dyn VulkanDevice, size: u64) -> TextureResult<Self> {
        let failure = |reason: String| TextureError::AllocationFailure {
            bytes: size,
            reason,
        };
        if size == 0 {
            return Err(failure("zero-sized transfer buffer".to_owned()));
        }

        let mut partial = PartialAllocation {
            device,
            buffer: None,
            memory: None,
            mapped: false,
        };

        let buffer = device
            .create_buffer(size)
            .map_err(|e| failure(format!("buffer creation: {e}")))?;
        partial.buffer = Some(buffer);

        let requirements = device.buffer_memory_requirements(buffer);
        let properties = device.memory_properties();
        let memory_type_index = find_memory_type_index(
            &properties,
            &requirements,
            MemoryPropertyFlags::HOST_VISIBLE,
        )
        .ok_or_else(|| failure("no host-visible memory type".to_owned()))?;

        let memory = device
            .allocate_memory(requirements.size, memory_type_index)
            .map_err(|e| failure(format!("memory allocation: {e}")))?;
        partial.memory = Some(memory);

        let mapped = device
            .map_memory(memory)
            .map_err(|e| failure(format!("memory map: {e}")))?;
        partial.mapped = true;

        device.bind_buffer_memory(buffer, memory)
            .map_err(|e| failure(format!("memory bind: {e}")))?;

        partial.disarm();
        Ok(Self {
            buffer,
            memory,
            mapped: MappedPtr(mapped),
            size,
            allocation_size: requirements.size,
            memory_flags: properties.memory_types[memory_type_index as usize].property_flags,
        })
    }

    /// The device buffer.
    pub fn buffer(&self) -> BufferHandle {
        self.buffer
    }

    /// The usable size in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// The size of the backing allocation, at least [`size`](Self::size).
    pub fn allocation_size(&self) -> u64 {
        self.allocation_size
    }

    /// The property flags of the backing memory type.
    pub fn memory_flags(&self) -> MemoryPropertyFlags {
        self.memory_flags
    }

    /// Copies `data` to the start of the buffer and makes it visible to the device.
    pub fn write(&mut self, device: &dyn VulkanDevice, data: &[u8]) -> TextureResult<()> {
        if data.len() as u64 > self.size {
            return Err(TextureError::AllocationFailure {
                bytes: data.len() as u64,
                reason: format!("payload exceeds transfer buffer of {} bytes", self.size),
            });
        }
        // SAFETY: the mapping covers at least `size` bytes and nothing else
        // aliases it until the copy recorded after this write executes.
        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), self.mapped.0.as_ptr(), data.len());
        }
        if !self.memory_flags.contains(MemoryPropertyFlags::HOST_COHERENT) {
            device.flush_mapped_memory(self.memory)
                .map_err(|e| TextureError::AllocationFailure {
                    bytes: self.size,
                    reason: format!("flush of non-coherent memory: {e}"),
                })?;
        }
        Ok(())
    }

    /// Destroys the buffer, then unmaps and frees its memory.
    pub fn release(self, device: &dyn VulkanDevice) {
        device.destroy_buffer(self.buffer);
        device.unmap_memory(self.memory);
        device.free_memory(self.memory);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockVulkanHost, VulkanCall};

    #[test]
    fn test_allocate_write_release() {
        let host = MockVulkanHost::new();
        let mut buffer = TransferBuffer::allocate(&host, 100).unwrap();
        assert_eq!(buffer.size(), 100);
        assert!(buffer.allocation_size() >= 100);
        assert!(buffer.memory_flags().contains(MemoryPropertyFlags::HOST_VISIBLE));

        buffer.write(&host, &[9u8; 100]).unwrap();
        assert_eq!(host.buffer_contents(buffer.buffer()), Some(vec![9u8; 100]));
        assert_eq!(host.flush_count(), 0);

        buffer.release(&host);
        assert_eq!(host.live_buffers(), 0);
        assert_eq!(host.live_allocations(), 0);
    }

    #[test]
    fn test_non_coherent_memory_is_flushed() {
        let host = MockVulkanHost::new().with_coherent_memory(false);
        let mut buffer = TransferBuffer::allocate(&host, 16).unwrap();
        buffer.write(&host, &[1u8; 16]).unwrap();
        assert_eq!(host.flush_count(), 1);
        buffer.release(&host);
    }

    #[test]
    fn test_oversized_write_is_rejected() {
        let host = MockVulkanHost::new();
        let mut buffer = TransferBuffer::allocate(&host, 4).unwrap();
        assert!(buffer.write(&host, &[0u8; 5]).is_err());
        buffer.release(&host);
    }

    #[test]
    fn test_failed_allocation_unwinds_partial_objects() {
        for failing in [
            VulkanCall::AllocateMemory,
            VulkanCall::MapMemory,
            VulkanCall::BindBufferMemory,
        ] {
            let host = MockVulkanHost::new();
            host.fail_next(failing);
            let err = TransferBuffer::allocate(&host, 64).unwrap_err();
            assert!(
                matches!(err, TextureError::AllocationFailure { bytes: 64, .. }),
                "{failing:?}: {err:?}"
            );
            assert_eq!(host.live_buffers(), 0, "{failing:?}");
            assert_eq!(host.live_allocations(), 0, "{failing:?}");
            assert_eq!(host.mapped_allocations(), 0, "{failing:?}");
        }
    }

    #[test]
    fn test_no_host_visible_memory() {
        let host = MockVulkanHost::new().without_host_visible_memory();
        assert!(matches!(
            TransferBuffer::allocate(&host, 64),
            Err(TextureError::AllocationFailure { .. })
        ));
        assert_eq!(host.live_buffers(), 0);
    }

    #[test]
    fn test_zero_size_is_rejected() {
        let host = MockVulkanHost::new();
        assert!(TransferBuffer::allocate(&host, 0).is_err());
        assert_eq!(host.live_buffers(), 0);
    }
}
