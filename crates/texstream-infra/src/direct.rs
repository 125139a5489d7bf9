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

//! The backend for APIs whose uploads are single synchronous driver calls.
//!
//! OpenGL-style hosts and wgpu hosts hand the plugin a [`DirectDevice`]; this
//! backend validates every request, forwards it, and then drains the device's
//! error queue so that a failed call is reported instead of silently
//! poisoning the next one.

use std::fmt::Write as _;
use std::sync::Arc;
use texstream_core::traits::{BackendKind, DirectDevice, HostInterfaces, TextureBackend};
use texstream_core::{
    DeviceEvent, NativeTextureHandle, TextureDescriptor, TextureError, TextureResult,
    TextureUpload,
};

/// Drives a [`DirectDevice`] acquired from the host on `Initialize`.
#[derive(Debug)]
pub struct DirectBackend {
    device: Option<Arc<dyn DirectDevice>>,
    texture_label: String,
}

impl DirectBackend {
    /// Creates a backend that will label its textures with `texture_label`.
    pub fn new(texture_label: impl Into<String>) -> Self {
        Self {
            device: None,
            texture_label: texture_label.into(),
        }
    }

    fn device(&self) -> TextureResult<&Arc<dyn DirectDevice>> {
        self.device.as_ref().ok_or(TextureError::BackendUnavailable)
    }

    fn acquire(&mut self, host: &dyn HostInterfaces) -> TextureResult<()> {
        let device = host.direct_device().ok_or_else(|| {
            TextureError::DeviceQueryFailure("host exposes no direct upload device".to_owned())
        })?;
        // Stale errors from the host's own work would be blamed on our first call.
        let stale = device.take_errors();
        if !stale.is_empty() {
            log::debug!(
                "DirectBackend: Cleared {} stale device error(s)",
                stale.len()
            );
        }
        self.device = Some(device);
        Ok(())
    }

    fn check_errors(&self, device: &dyn DirectDevice, operation: &str) -> TextureResult<()> {
        let errors = device.take_errors();
        if errors.is_empty() {
            return Ok(());
        }
        let mut message = format!("{operation} error(s):");
        for code in errors {
            let _ = write!(message, " {code:#x}");
        }
        Err(TextureError::DeviceQueryFailure(message))
    }
}

impl TextureBackend for DirectBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Direct
    }

    fn process_device_event(
        &mut self,
        event: DeviceEvent,
        host: &dyn HostInterfaces,
    ) -> TextureResult<()> {
        match event {
            DeviceEvent::Initialize | DeviceEvent::AfterReset => {
                self.acquire(host)?;
                log::debug!("DirectBackend: Acquired device on {event:?}");
            }
            DeviceEvent::BeforeReset => {}
            DeviceEvent::Shutdown => {
                self.device = None;
                log::debug!("DirectBackend: Released device");
            }
        }
        Ok(())
    }

    fn create_texture_3d(
        &mut self,
        descriptor: &TextureDescriptor,
    ) -> TextureResult<NativeTextureHandle> {
        let device = self.device()?;
        if let Some(max) = device.max_texture_dimension() {
            log::info!("DirectBackend: Device maximum 3D texture size: {max}");
            descriptor.validate(max)?;
        }
        let handle = device.create_texture_3d(descriptor, &self.texture_label)?;
        if let Err(err) = self.check_errors(device.as_ref(), "create_texture_3d") {
            // The texture may or may not exist; deleting it is harmless either way.
            let _ = device.delete_texture(handle);
            let _ = device.take_errors();
            return Err(err);
        }
        log::debug!(
            "DirectBackend: Created texture {handle} ({} {:?})",
            descriptor.extent,
            descriptor.format
        );
        Ok(handle)
    }

    fn sub_image_2d(&mut self, upload: &TextureUpload<'_>) -> TextureResult<()> {
        let device = self.device()?;
        upload.payload()?;
        device.tex_sub_image_2d(upload)?;
        self.check_errors(device.as_ref(), "sub_image_2d")
    }

    fn sub_image_3d(&mut self, upload: &TextureUpload<'_>) -> TextureResult<()> {
        let device = self.device()?;
        upload.payload()?;
        device.tex_sub_image_3d(upload)?;
        self.check_errors(device.as_ref(), "sub_image_3d")
    }

    fn destroy_texture_3d(&mut self, handle: NativeTextureHandle) -> TextureResult<()> {
        let device = self.device()?;
        device.delete_texture(handle)?;
        self.check_errors(device.as_ref(), "destroy_texture_3d")
    }
}
