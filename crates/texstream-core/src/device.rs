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

//! Device types and lifecycle events reported by the host engine.

use std::fmt;

/// The graphics API the host engine is rendering with.
///
/// Raw values follow the host's renderer enumeration; values texstream has no
/// backend for are preserved in [`DeviceType::Other`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceType {
    /// No graphics device (batch mode, headless servers).
    Null,
    /// Direct3D 11.
    Direct3D11,
    /// Direct3D 12.
    Direct3D12,
    /// OpenGL core profile (desktop).
    OpenGLCore,
    /// OpenGL ES 3.0 (mobile and embedded).
    OpenGLES30,
    /// Vulkan.
    Vulkan,
    /// Metal.
    Metal,
    /// A host rendering through wgpu / WebGPU.
    WebGpu,
    /// Any other renderer, identified by its raw value.
    Other(i32),
}

impl DeviceType {
    /// Decodes the host's raw renderer value.
    pub const fn from_raw(raw: i32) -> Self {
        match raw {
            2 => DeviceType::Direct3D11,
            4 => DeviceType::Null,
            11 => DeviceType::OpenGLES30,
            16 => DeviceType::Metal,
            17 => DeviceType::OpenGLCore,
            18 => DeviceType::Direct3D12,
            21 => DeviceType::Vulkan,
            28 => DeviceType::WebGpu,
            other => DeviceType::Other(other),
        }
    }

    /// The host's raw renderer value.
    pub const fn as_raw(self) -> i32 {
        match self {
            DeviceType::Direct3D11 => 2,
            DeviceType::Null => 4,
            DeviceType::OpenGLES30 => 11,
            DeviceType::Metal => 16,
            DeviceType::OpenGLCore => 17,
            DeviceType::Direct3D12 => 18,
            DeviceType::Vulkan => 21,
            DeviceType::WebGpu => 28,
            DeviceType::Other(raw) => raw,
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceType::Null => write!(f, "Null"),
            DeviceType::Direct3D11 => write!(f, "Direct3D 11"),
            DeviceType::Direct3D12 => write!(f, "Direct3D 12"),
            DeviceType::OpenGLCore => write!(f, "OpenGL Core"),
            DeviceType::OpenGLES30 => write!(f, "OpenGL ES 3.0"),
            DeviceType::Vulkan => write!(f, "Vulkan"),
            DeviceType::Metal => write!(f, "Metal"),
            DeviceType::WebGpu => write!(f, "WebGPU"),
            DeviceType::Other(raw) => write!(f, "unknown renderer ({raw})"),
        }
    }
}

/// A lifecycle notification about the graphics device, delivered by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceEvent {
    /// The device was created; a backend should be constructed.
    Initialize,
    /// The device is going away; all GPU state must be released.
    Shutdown,
    /// The device is about to be reset.
    BeforeReset,
    /// The device has been reset; device-level state may need reloading.
    AfterReset,
}

impl DeviceEvent {
    /// Decodes the host's raw event value.
    pub const fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            0 => Some(DeviceEvent::Initialize),
            1 => Some(DeviceEvent::Shutdown),
            2 => Some(DeviceEvent::BeforeReset),
            3 => Some(DeviceEvent::AfterReset),
            _ => None,
        }
    }

    /// The host's raw event value.
    pub const fn as_raw(self) -> i32 {
        match self {
            DeviceEvent::Initialize => 0,
            DeviceEvent::Shutdown => 1,
            DeviceEvent::BeforeReset => 2,
            DeviceEvent::AfterReset => 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_type_raw_values_match() {
        for device in [
            DeviceType::Null,
            DeviceType::Direct3D11,
            DeviceType::Direct3D12,
            DeviceType::OpenGLCore,
            DeviceType::OpenGLES30,
            DeviceType::Vulkan,
            DeviceType::Metal,
            DeviceType::WebGpu,
        ] {
            assert_eq!(DeviceType::from_raw(device.as_raw()), device);
        }
        assert_eq!(DeviceType::from_raw(99), DeviceType::Other(99));
    }

    #[test]
    fn test_device_event_decoding() {
        assert_eq!(DeviceEvent::from_raw(0), Some(DeviceEvent::Initialize));
        assert_eq!(DeviceEvent::from_raw(1), Some(DeviceEvent::Shutdown));
        assert_eq!(DeviceEvent::from_raw(2), Some(DeviceEvent::BeforeReset));
        assert_eq!(DeviceEvent::from_raw(3), Some(DeviceEvent::AfterReset));
        assert_eq!(DeviceEvent::from_raw(4), None);
    }
}
