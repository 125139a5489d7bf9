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

//! Chooses the backend for the renderer the host reports.

use crate::{DirectBackend, NullBackend, StagingBackend};
use texstream_core::config::BackendConfig;
use texstream_core::{DeviceType, TextureBackend};

/// Constructs the backend for `device_type`, not yet initialized.
///
/// Returns `None` for renderers texstream has no backend for, unless
/// `config.fallback_to_null` asks for the null backend instead.
pub fn create_backend(
    device_type: DeviceType,
    config: &BackendConfig,
) -> Option<Box<dyn TextureBackend>> {
    match device_type {
        DeviceType::Vulkan => Some(Box::new(StagingBackend::new())),
        DeviceType::OpenGLCore | DeviceType::OpenGLES30 | DeviceType::WebGpu => {
            Some(Box::new(DirectBackend::new(config.texture_label.clone())))
        }
        DeviceType::Null => Some(Box::new(NullBackend::new())),
        other if config.fallback_to_null => {
            log::warn!("No texture backend for {other}, falling back to the null backend");
            Some(Box::new(NullBackend::new()))
        }
        other => {
            log::error!("No texture backend for {other}");
            None
        }
    }
}
