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

//! Defines the contracts that decouple texture streaming from any specific graphics API.
//!
//! - [`TextureBackend`]: the capability interface implemented once per graphics API family.
//! - [`HostInterfaces`]: what the host engine exposes to the plugin.
//! - [`DirectDevice`]: a device whose uploads are single synchronous driver calls.
//! - [`VulkanHost`]: the engine-side recording state and textures of a Vulkan host.
//! - [`VulkanDevice`]: the buffer and memory primitives the staging backend is built on.

mod backend;
mod direct;
mod host;
pub mod vulkan;

pub use self::backend::{BackendKind, TextureBackend};
pub use self::direct::DirectDevice;
pub use self::host::{HostInterfaces, HostLogLevel, HostLogSink};
pub use self::vulkan::{VulkanDevice, VulkanHost};
