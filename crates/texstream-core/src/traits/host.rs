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

use crate::device::DeviceType;
use crate::traits::{DirectDevice, VulkanDevice, VulkanHost};
use std::sync::Arc;

/// Severity of a message forwarded to the host's log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostLogLevel {
    /// Something failed.
    Error,
    /// Something looks wrong but processing continues.
    Warning,
    /// Informational output.
    Log,
}

/// A log sink owned by the host engine (e.g. its editor console).
pub trait HostLogSink: Send + Sync {
    /// Writes one message.
    fn log(&self, level: HostLogLevel, message: &str);
}

/// The interfaces the host engine exposes to the plugin.
///
/// Only [`renderer`](HostInterfaces::renderer) is mandatory. The remaining
/// accessors return `None` when the host does not provide that interface,
/// which the backend that needs it reports as a device query failure.
pub trait HostInterfaces: Send + Sync {
    /// The graphics API the host is currently rendering with.
    fn renderer(&self) -> DeviceType;

    /// Explicit-memory device primitives, available on Vulkan hosts.
    fn vulkan(&self) -> Option<Arc<dyn VulkanHost>> {
        None
    }

    /// A buffer and memory device the host has already wrapped for the plugin.
    ///
    /// When `None`, the staging backend loads one from
    /// [`VulkanHost::device_handles`].
    fn vulkan_device(&self) -> Option<Arc<dyn VulkanDevice>> {
        None
    }

    /// A single-call upload device, available on OpenGL-style and wgpu hosts.
    fn direct_device(&self) -> Option<Arc<dyn DirectDevice>> {
        None
    }

    /// The host's log sink, if it has one.
    fn log_sink(&self) -> Option<Arc<dyn HostLogSink>> {
        None
    }
}
