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

//! # Texstream Infra
//!
//! Concrete implementations of the [`TextureBackend`](texstream_core::TextureBackend)
//! contract, one per graphics API family, and the factory that picks one for
//! the device the host reports.

#![warn(missing_docs)]

pub mod direct;
pub mod factory;
pub mod null;
pub mod staging;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
#[cfg(feature = "vulkan")]
pub mod vulkan;
#[cfg(feature = "wgpu")]
pub mod wgpu;

pub use direct::DirectBackend;
pub use factory::create_backend;
pub use null::NullBackend;
pub use staging::StagingBackend;
#[cfg(feature = "vulkan")]
pub use self::vulkan::AshVulkanDevice;
#[cfg(feature = "wgpu")]
pub use self::wgpu::WgpuDirectDevice;
