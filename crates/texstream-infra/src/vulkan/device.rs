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


use super::conversions::{
    error_from_vk, memory_properties_from_vk, memory_requirements_from_vk, IntoVk,
};
use ash::vk;
use ash::vk::Handle;
use std::ffi::c_void;
use std::fmt;
use std::ptr::NonNull;
use texstream_core::traits::vulkan::{
    BufferHandle, BufferImageCopy, CommandBufferHandle, ImageHandle, MemoryHandle,
    MemoryProperties, MemoryRequirements, VulkanDeviceHandles, VulkanError, VulkanResult,
};
use texstream_core::traits::VulkanDevice;
use texstream_core::{TextureError, TextureResult};

/// The host's logical device, driven through `ash`.
///
/// The instance and device belong to the host: dropping this value unloads
/// the function tables but destroys nothing.
pub struct AshVulkanDevice {
    _entry: ash::Entry,
    instance: ash::Instance,
    device: ash::Device,
    physical_device: vk::PhysicalDevice,
}

impl AshVulkanDevice {
    /// Loads the Vulkan library and the function tables of the host's device.
    ///
    /// # Safety
    ///
    /// `handles` must name a live instance, one of its physical devices and a
    /// logical device created from it, all outliving the returned value.
    pub unsafe fn from_handles(handles: &VulkanDeviceHandles) -> TextureResult<Self> {
        if handles.instance == 0 || handles.physical_device == 0 || handles.device == 0 {
            return Err(TextureError::DeviceQueryFailure(
                "host reported a null Vulkan device handle".to_owned(),
            ));
        }

        // SAFETY: loading the system Vulkan library runs its initialisation code.
        let entry = unsafe { ash::Entry::load() }.map_err(|err| {
            TextureError::DeviceQueryFailure(format!("failed to load the Vulkan library: {err}"))
        })?;
        // SAFETY: the caller guarantees the instance and device handles are live.
        let instance = unsafe {
            ash::Instance::load(entry.static_fn(), vk::Instance::from_raw(handles.instance))
        };
        let device =
            unsafe { ash::Device::load(instance.fp_v1_0(), vk::Device::from_raw(handles.device)) };

        log::debug!(
            "AshVulkanDevice: Loaded device {:#x} on physical device {:#x}",
            handles.device,
            handles.physical_device
        );
        Ok(Self {
            _entry: entry,
            instance,
            device,
            physical_device: vk::PhysicalDevice::from_raw(handles.physical_device),
        })
    }
}

impl fmt::Debug for AshVulkanDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AshVulkanDevice")
            .field("instance", &self.instance.handle())
            .field("physical_device", &self.physical_device)
            .field("device", &self.device.handle())
            .finish()
    }
}

impl VulkanDevice for AshVulkanDevice {
    fn memory_properties(&self) -> MemoryProperties {
        // SAFETY: the physical device belongs to the loaded instance.
        let properties = unsafe {
            self.instance
                .get_physical_device_memory_properties(self.physical_device)
        };
        memory_properties_from_vk(&properties)
    }

    fn create_buffer(&self, size: u64) -> VulkanResult<BufferHandle> {
        let info = vk::BufferCreateInfo::default()
            .size(size)
            .usage(vk::BufferUsageFlags::TRANSFER_SRC)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);
        // SAFETY: the create info is fully initialised and outlives the call.
        let buffer = unsafe { self.device.create_buffer(&info, None) }.map_err(error_from_vk)?;
        Ok(BufferHandle(buffer.as_raw()))
    }

    fn buffer_memory_requirements(&self, buffer: BufferHandle) -> MemoryRequirements {
        // SAFETY: `buffer` was created on this device and is not destroyed yet.
        let requirements = unsafe {
            self.device
                .get_buffer_memory_requirements(vk::Buffer::from_raw(buffer.0))
        };
        memory_requirements_from_vk(requirements)
    }

    fn allocate_memory(&self, size: u64, memory_type_index: u32) -> VulkanResult<MemoryHandle> {
        let info = vk::MemoryAllocateInfo::default()
            .allocation_size(size)
            .memory_type_index(memory_type_index);
        // SAFETY: the allocate info is fully initialised and outlives the call.
        let memory = unsafe { self.device.allocate_memory(&info, None) }.map_err(error_from_vk)?;
        Ok(MemoryHandle(memory.as_raw()))
    }

    fn map_memory(&self, memory: MemoryHandle) -> VulkanResult<NonNull<u8>> {
        // SAFETY: `memory` is host visible and not currently mapped.
        let pointer: *mut c_void = unsafe {
            self.device.map_memory(
                vk::DeviceMemory::from_raw(memory.0),
                0,
                vk::WHOLE_SIZE,
                vk::MemoryMapFlags::empty(),
            )
        }
        .map_err(error_from_vk)?;
        NonNull::new(pointer.cast::<u8>()).ok_or(VulkanError::MEMORY_MAP_FAILED)
    }

    fn unmap_memory(&self, memory: MemoryHandle) {
        // SAFETY: `memory` is currently mapped.
        unsafe { self.device.unmap_memory(vk::DeviceMemory::from_raw(memory.0)) };
    }

    fn bind_buffer_memory(&self, buffer: BufferHandle, memory: MemoryHandle) -> VulkanResult<()> {
        // SAFETY: the buffer has no memory bound and the allocation satisfies its requirements.
        unsafe {
            self.device.bind_buffer_memory(
                vk::Buffer::from_raw(buffer.0),
                vk::DeviceMemory::from_raw(memory.0),
                0,
            )
        }
        .map_err(error_from_vk)
    }

    fn flush_mapped_memory(&self, memory: MemoryHandle) -> VulkanResult<()> {
        let range = vk::MappedMemoryRange::default()
            .memory(vk::DeviceMemory::from_raw(memory.0))
            .offset(0)
            .size(vk::WHOLE_SIZE);
        // SAFETY: `memory` is currently mapped as a whole.
        unsafe { self.device.flush_mapped_memory_ranges(&[range]) }.map_err(error_from_vk)
    }

    fn destroy_buffer(&self, buffer: BufferHandle) {
        // SAFETY: the GPU no longer reads from `buffer`.
        unsafe { self.device.destroy_buffer(vk::Buffer::from_raw(buffer.0), None) };
    }

    fn free_memory(&self, memory: MemoryHandle) {
        // SAFETY: `memory` is unmapped and no longer bound to a live buffer.
        unsafe { self.device.free_memory(vk::DeviceMemory::from_raw(memory.0), None) };
    }

    fn cmd_copy_buffer_to_image(
        &self,
        command_buffer: CommandBufferHandle,
        buffer: BufferHandle,
        image: ImageHandle,
        region: &BufferImageCopy,
    ) {
        let region: vk::BufferImageCopy = region.into_vk();
        // SAFETY: the command buffer is recording outside a render pass and the
        // image was transitioned to the transfer-destination layout by the host.
        unsafe {
            self.device.cmd_copy_buffer_to_image(
                vk::CommandBuffer::from_raw(command_buffer.0),
                vk::Buffer::from_raw(buffer.0),
                vk::Image::from_raw(image.0),
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &[region],
            )
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_handles_are_rejected() {
        let handles = VulkanDeviceHandles {
            instance: 0x10,
            physical_device: 0,
            device: 0x30,
        };
        let result = unsafe { AshVulkanDevice::from_handles(&handles) };
        assert!(matches!(result, Err(TextureError::DeviceQueryFailure(_))));
    }
}
