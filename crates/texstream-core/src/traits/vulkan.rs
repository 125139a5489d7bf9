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

//! Explicit-memory device primitives for Vulkan hosts.
//!
//! The host engine owns the Vulkan instance, device, queues and command
//! buffers. Through [`VulkanHost`] it lends the plugin its recording state
//! (command buffer plus frame counters), access to its textures as images
//! ready for transfer writes, and the raw handles of its device. Buffer and
//! memory management goes through a [`VulkanDevice`] built on those handles.

use crate::texture::{Extent3D, NativeTextureHandle, Origin3D, TextureDescriptor};
use std::fmt::Debug;
use std::ptr::NonNull;
use thiserror::Error;

/// A `VkResult` error code returned by a host primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("vulkan call failed with VkResult {code}")]
pub struct VulkanError {
    /// The raw `VkResult` value.
    pub code: i32,
}

impl VulkanError {
    /// `VK_ERROR_OUT_OF_HOST_MEMORY`.
    pub const OUT_OF_HOST_MEMORY: Self = Self { code: -1 };
    /// `VK_ERROR_OUT_OF_DEVICE_MEMORY`.
    pub const OUT_OF_DEVICE_MEMORY: Self = Self { code: -2 };
    /// `VK_ERROR_MEMORY_MAP_FAILED`.
    pub const MEMORY_MAP_FAILED: Self = Self { code: -5 };
}

/// A specialized `Result` for Vulkan host primitives.
pub type VulkanResult<T> = Result<T, VulkanError>;

macro_rules! vk_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u64);
    };
}

vk_handle!(
    /// A `VkBuffer`.
    BufferHandle
);
vk_handle!(
    /// A `VkDeviceMemory` allocation.
    MemoryHandle
);
vk_handle!(
    /// A `VkImage`.
    ImageHandle
);
vk_handle!(
    /// A `VkCommandBuffer` in the recording state.
    CommandBufferHandle
);

/// Property flags of a device memory type (`VkMemoryPropertyFlags`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MemoryPropertyFlags {
    bits: u32,
}

impl MemoryPropertyFlags {
    /// No properties.
    pub const NONE: Self = Self { bits: 0 };
    /// Most efficient for device access.
    pub const DEVICE_LOCAL: Self = Self { bits: 1 << 0 };
    /// Can be mapped for host access.
    pub const HOST_VISIBLE: Self = Self { bits: 1 << 1 };
    /// Host writes are visible to the device without an explicit flush.
    pub const HOST_COHERENT: Self = Self { bits: 1 << 2 };
    /// Cached on the host.
    pub const HOST_CACHED: Self = Self { bits: 1 << 3 };

    /// Creates flags from raw bits.
    pub const fn from_bits(bits: u32) -> Self {
        Self { bits }
    }

    /// Returns the raw bits.
    pub const fn bits(&self) -> u32 {
        self.bits
    }

    /// Combines two sets of flags.
    pub const fn union(self, other: Self) -> Self {
        Self {
            bits: self.bits | other.bits,
        }
    }

    /// Checks if every flag in `other` is also set in `self`.
    pub const fn contains(&self, other: Self) -> bool {
        (self.bits & other.bits) == other.bits
    }

    /// Checks if no flag is set.
    pub const fn is_empty(&self) -> bool {
        self.bits == 0
    }
}

impl std::ops::BitOr for MemoryPropertyFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        self.union(rhs)
    }
}

impl std::ops::BitOrAssign for MemoryPropertyFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        *self = self.union(rhs);
    }
}

/// One entry of the physical device's memory type table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryType {
    /// The properties of this memory type.
    pub property_flags: MemoryPropertyFlags,
    /// The heap this type allocates from.
    pub heap_index: u32,
}

/// The physical device's memory type table (`VkPhysicalDeviceMemoryProperties`).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MemoryProperties {
    /// The memory types, indexed by memory type index.
    pub memory_types: Vec<MemoryType>,
}

/// Size, alignment and allowed memory types of a buffer (`VkMemoryRequirements`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryRequirements {
    /// The allocation size the buffer needs, possibly larger than requested.
    pub size: u64,
    /// The required alignment.
    pub alignment: u64,
    /// Bit `i` is set if memory type `i` may back the buffer.
    pub memory_type_bits: u32,
}

/// The host's command recording state for the current frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordingState {
    /// The command buffer currently being recorded.
    pub command_buffer: CommandBufferHandle,
    /// The frame being recorded.
    pub current_frame_number: u64,
    /// The most recent frame whose GPU work is known to have finished.
    pub safe_frame_number: u64,
}

/// One buffer-to-image copy region (`VkBufferImageCopy`, tightly packed, color aspect).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferImageCopy {
    /// Offset of the first texel in the source buffer.
    pub buffer_offset: u64,
    /// Destination offset in the image.
    pub image_offset: Origin3D,
    /// Size of the region.
    pub image_extent: Extent3D,
    /// Destination mip level.
    pub mip_level: u32,
}

/// Where a plugin event must run relative to the host's render pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderPassPrecondition {
    /// The host makes no guarantee.
    #[default]
    DontCare,
    /// The event runs inside a render pass.
    EnsureInside,
    /// The event runs outside any render pass.
    EnsureOutside,
}

/// Which graphics queue state a plugin event needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GraphicsQueueAccess {
    /// The event does not care.
    #[default]
    DontCare,
    /// The event may submit to the graphics queue.
    Allow,
}

/// How the host should prepare for a plugin render event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VulkanEventConfig {
    /// Render pass requirement.
    pub render_pass_precondition: RenderPassPrecondition,
    /// Queue access requirement.
    pub graphics_queue_access: GraphicsQueueAccess,
    /// The previous frame must be submitted before the event runs.
    pub ensure_previous_frame_submission: bool,
    /// Pending command buffers must be flushed before the event runs.
    pub flush_command_buffers: bool,
    /// The event records into the host's command buffer.
    pub modifies_command_buffers_state: bool,
}

/// The raw dispatchable handles of the host's Vulkan device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VulkanDeviceHandles {
    /// `VkInstance`.
    pub instance: u64,
    /// `VkPhysicalDevice` the logical device was created from.
    pub physical_device: u64,
    /// `VkDevice`.
    pub device: u64,
}

/// The engine-side operations the host lends to the staging backend.
///
/// All methods are called on the render thread.
pub trait VulkanHost: Send + Sync + Debug {
    /// The current command buffer and frame counters, or `None` if the host
    /// is not recording (e.g. between frames).
    fn command_recording_state(&self) -> Option<RecordingState>;

    /// Ends the host's render pass if one is open.
    fn ensure_outside_render_pass(&self);

    /// Transitions `texture` to the transfer-destination layout and returns
    /// its image, or `None` if the handle is not a texture the host knows.
    fn access_texture(&self, texture: NativeTextureHandle) -> Option<ImageHandle>;

    /// Declares how the host must prepare before running render event `event_id`.
    fn configure_event(&self, event_id: i32, config: &VulkanEventConfig);

    /// Creates a sampled 3D texture owned by the host.
    fn create_texture_3d(&self, descriptor: &TextureDescriptor)
        -> VulkanResult<NativeTextureHandle>;

    /// Destroys a texture created by [`create_texture_3d`](VulkanHost::create_texture_3d).
    fn destroy_texture(&self, texture: NativeTextureHandle);

    /// The host's instance, physical device and logical device.
    ///
    /// The handles must stay valid until the device shutdown event.
    fn device_handles(&self) -> VulkanDeviceHandles;
}

/// Buffer, memory and transfer commands on the host's logical device.
///
/// All methods are called on the render thread.
pub trait VulkanDevice: Send + Sync + Debug {
    /// The physical device's memory type table.
    fn memory_properties(&self) -> MemoryProperties;

    /// Creates a transfer-source buffer of `size` bytes with no memory bound.
    fn create_buffer(&self, size: u64) -> VulkanResult<BufferHandle>;

    /// The memory requirements of `buffer`.
    fn buffer_memory_requirements(&self, buffer: BufferHandle) -> MemoryRequirements;

    /// Allocates `size` bytes from memory type `memory_type_index`.
    fn allocate_memory(&self, size: u64, memory_type_index: u32) -> VulkanResult<MemoryHandle>;

    /// Maps the whole of `memory` into the host address space.
    fn map_memory(&self, memory: MemoryHandle) -> VulkanResult<NonNull<u8>>;

    /// Unmaps `memory`.
    fn unmap_memory(&self, memory: MemoryHandle);

    /// Binds `memory` to `buffer` at offset zero.
    fn bind_buffer_memory(&self, buffer: BufferHandle, memory: MemoryHandle) -> VulkanResult<()>;

    /// Makes host writes to the whole of `memory` visible to the device.
    fn flush_mapped_memory(&self, memory: MemoryHandle) -> VulkanResult<()>;

    /// Destroys `buffer`.
    fn destroy_buffer(&self, buffer: BufferHandle);

    /// Frees `memory`.
    fn free_memory(&self, memory: MemoryHandle);

    /// Records a buffer-to-image copy into `command_buffer`. The image must be
    /// in the transfer-destination layout.
    fn cmd_copy_buffer_to_image(
        &self,
        command_buffer: CommandBufferHandle,
        buffer: BufferHandle,
        image: ImageHandle,
        region: &BufferImageCopy,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_flags_contains() {
        let flags = MemoryPropertyFlags::HOST_VISIBLE | MemoryPropertyFlags::HOST_COHERENT;
        assert!(flags.contains(MemoryPropertyFlags::HOST_VISIBLE));
        assert!(flags.contains(MemoryPropertyFlags::HOST_COHERENT));
        assert!(!flags.contains(MemoryPropertyFlags::DEVICE_LOCAL));
        assert!(flags.contains(MemoryPropertyFlags::NONE));
        assert!(MemoryPropertyFlags::NONE.is_empty());
        assert_eq!(flags.bits(), 0b110);
    }

    #[test]
    fn test_vulkan_error_message() {
        assert_eq!(
            VulkanError::OUT_OF_DEVICE_MEMORY.to_string(),
            "vulkan call failed with VkResult -2"
        );
    }
}
