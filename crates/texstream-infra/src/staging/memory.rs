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

use texstream_core::traits::vulkan::{MemoryProperties, MemoryPropertyFlags, MemoryRequirements};

/// Finds the first memory type allowed by `requirements` whose properties
/// include all of `required`.
pub fn find_memory_type_index(
    properties: &MemoryProperties,
    requirements: &MemoryRequirements,
    required: MemoryPropertyFlags,
) -> Option<u32> {
    properties
        .memory_types
        .iter()
        .enumerate()
        .take(32)
        .find(|(index, memory_type)| {
            requirements.memory_type_bits & (1 << index) != 0
                && memory_type.property_flags.contains(required)
        })
        .map(|(index, _)| index as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use texstream_core::traits::vulkan::MemoryType;

    fn properties(flags: &[MemoryPropertyFlags]) -> MemoryProperties {
        MemoryProperties {
            memory_types: flags
                .iter()
                .map(|&property_flags| MemoryType {
                    property_flags,
                    heap_index: 0,
                })
                .collect(),
        }
    }

    fn requirements(memory_type_bits: u32) -> MemoryRequirements {
        MemoryRequirements {
            size: 256,
            alignment: 16,
            memory_type_bits,
        }
    }

    #[test]
    fn test_first_matching_type_wins() {
        let props = properties(&[
            MemoryPropertyFlags::DEVICE_LOCAL,
            MemoryPropertyFlags::HOST_VISIBLE,
            MemoryPropertyFlags::HOST_VISIBLE | MemoryPropertyFlags::HOST_COHERENT,
        ]);
        assert_eq!(
            find_memory_type_index(&props, &requirements(0b111), MemoryPropertyFlags::HOST_VISIBLE),
            Some(1)
        );
    }

    #[test]
    fn test_requirement_mask_is_respected() {
        let props = properties(&[
            MemoryPropertyFlags::DEVICE_LOCAL,
            MemoryPropertyFlags::HOST_VISIBLE,
            MemoryPropertyFlags::HOST_VISIBLE | MemoryPropertyFlags::HOST_COHERENT,
        ]);
        assert_eq!(
            find_memory_type_index(&props, &requirements(0b101), MemoryPropertyFlags::HOST_VISIBLE),
            Some(2)
        );
    }

    #[test]
    fn test_no_match() {
        let props = properties(&[MemoryPropertyFlags::DEVICE_LOCAL]);
        assert_eq!(
            find_memory_type_index(&props, &requirements(u32::MAX), MemoryPropertyFlags::HOST_VISIBLE),
            None
        );
    }
}
