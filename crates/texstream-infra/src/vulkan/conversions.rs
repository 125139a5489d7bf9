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


use ash::vk;
use texstream_core::traits::vulkan::{
    BufferImageCopy, MemoryProperties, MemoryPropertyFlags, MemoryRequirements, MemoryType,
    VulkanError,
};
use texstream_core::{Extent3D, Origin3D};

/// A local extension trait to convert texstream types into `ash` types.
pub trait IntoVk<T> {
    /// Consumes self and converts it into an `ash` type.
    fn into_vk(self) -> T;
}

impl IntoVk<vk::Offset3D> for Origin3D {
    fn into_vk(self) -> vk::Offset3D {
        // Offsets are validated against the texture extent, which fits in i32.
        vk::Offset3D {
            x: self.x as i32,
            y: self.y as i32,
            z: self.z as i32,
        }
    }
}

impl IntoVk<vk::Extent3D> for Extent3D {
    fn into_vk(self) -> vk::Extent3D {
        vk::Extent3D {
            width: self.width,
            height: self.height,
            depth: self.depth,
        }
    }
}

impl IntoVk<vk::BufferImageCopy> for &BufferImageCopy {
    fn into_vk(self) -> vk::BufferImageCopy {
        vk::BufferImageCopy::default()
            .buffer_offset(self.buffer_offset)
            .buffer_row_length(0)
            .buffer_image_height(0)
            .image_subresource(vk::ImageSubresourceLayers {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                mip_level: self.mip_level,
                base_array_layer: 0,
                layer_count: 1,
            })
            .image_offset(self.image_offset.into_vk())
            .image_extent(self.image_extent.into_vk())
    }
}

/// Our flag bits share Vulkan's values.
pub(crate) fn memory_flags_from_vk(flags: vk::MemoryPropertyFlags) -> MemoryPropertyFlags {
    MemoryPropertyFlags::from_bits(flags.as_raw())
}

pub(crate) fn memory_properties_from_vk(
    properties: &vk::PhysicalDeviceMemoryProperties,
) -> MemoryProperties {
    let count = (properties.memory_type_count as usize).min(properties.memory_types.len());
    MemoryProperties {
        memory_types: properties.memory_types[..count]
            .iter()
            .map(|memory_type| MemoryType {
                property_flags: memory_flags_from_vk(memory_type.property_flags),
                heap_index: memory_type.heap_index,
            })
            .collect(),
    }
}

pub(crate) fn memory_requirements_from_vk(
    requirements: vk::MemoryRequirements,
) -> MemoryRequirements {
    MemoryRequirements {
        size: requirements.size,
        alignment: requirements.alignment,
        memory_type_bits: requirements.memory_type_bits,
    }
}

pub(crate) fn error_from_vk(result: vk::Result) -> VulkanError {
    VulkanError {
        code: result.as_raw(),
    }
}
