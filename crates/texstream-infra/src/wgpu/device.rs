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

use super::conversions::IntoWgpu;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use texstream_core::traits::DirectDevice;
use texstream_core::{
    NativeTextureHandle, TextureDescriptor, TextureError, TextureResult, TextureUpload,
};

/// Reported when an upload names an unknown texture.
const INVALID_OPERATION: u32 = 0x502;
/// Reported when an upload region does not fit inside its texture.
const INVALID_VALUE: u32 = 0x501;

#[derive(Debug)]
struct WgpuTextureEntry {
    texture: wgpu::Texture,
    descriptor: TextureDescriptor,
}

/// Creates and fills 3D textures on a wgpu device.
///
/// Handles are indices into an internal table, never wgpu pointers. Uploads
/// are validated before reaching wgpu (whose validation errors are fatal by
/// default); rejected uploads queue an error code, read back through
/// [`DirectDevice::take_errors`].
#[derive(Debug)]
pub struct WgpuDirectDevice {
    device: wgpu::Device,
    queue: wgpu::Queue,
    textures: Mutex<HashMap<NativeTextureHandle, WgpuTextureEntry>>,
    errors: Mutex<Vec<u32>>,
    next_texture_id: AtomicUsize,
}

impl WgpuDirectDevice {
    /// Wraps a device and queue owned by the host.
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        Self {
            device,
            queue,
            textures: Mutex::new(HashMap::new()),
            errors: Mutex::new(Vec::new()),
            next_texture_id: AtomicUsize::new(1),
        }
    }

    /// Creates a device on the default adapter, or `None` if there is no usable adapter.
    pub fn request_headless() -> Option<Arc<Self>> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::new_without_display_handle());
        let adapter =
            pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions::default()))
                .ok()?;
        log::info!(
            "WgpuDirectDevice: Using adapter '{}'",
            adapter.get_info().name
        );
        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("texstream headless device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            experimental_features: wgpu::ExperimentalFeatures::disabled(),
            memory_hints: wgpu::MemoryHints::default(),
            trace: wgpu::Trace::Off,
        }))
        .ok()?;
        Some(Arc::new(Self::new(device, queue)))
    }

    /// The number of textures currently alive.
    pub fn live_textures(&self) -> usize {
        self.textures().len()
    }

    fn textures(&self) -> MutexGuard<'_, HashMap<NativeTextureHandle, WgpuTextureEntry>> {
        self.textures.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push_error(&self, code: u32) {
        self.errors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(code);
    }

    fn write(&self, upload: &TextureUpload<'_>) -> TextureResult<()> {
        let data = upload.payload()?;
        let textures = self.textures();
        let Some(entry) = textures.get(&upload.handle) else {
            log::warn!("WgpuDirectDevice: Upload to unknown texture {}", upload.handle);
            self.push_error(INVALID_OPERATION);
            return Ok(());
        };

        let size = entry.descriptor.extent;
        let fits = |offset: u32, len: u32, max: u32| {
            offset.checked_add(len).is_some_and(|end| end <= max)
        };
        if upload.mip_level != 0
            || upload.format != entry.descriptor.format
            || !fits(upload.origin.x, upload.extent.width, size.width)
            || !fits(upload.origin.y, upload.extent.height, size.height)
            || !fits(upload.origin.z, upload.extent.depth, size.depth)
        {
            log::warn!(
                "WgpuDirectDevice: Rejected {} region at {:?} for texture {} of size {}",
                upload.extent,
                upload.origin,
                upload.handle,
                size
            );
            self.push_error(INVALID_VALUE);
            return Ok(());
        }

        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &entry.texture,
                mip_level: upload.mip_level,
                origin: upload.origin.into_wgpu(),
                aspect: wgpu::TextureAspect::All,
            },
            data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(upload.extent.width * upload.format.bytes_per_texel() as u32),
                rows_per_image: Some(upload.extent.height),
            },
            upload.extent.into_wgpu(),
        );
        log::debug!(
            "WgpuDirectDevice: Wrote {} bytes to texture {} at {:?}",
            data.len(),
            upload.handle,
            upload.origin
        );
        Ok(())
    }
}

impl DirectDevice for WgpuDirectDevice {
    fn create_texture_3d(
        &self,
        descriptor: &TextureDescriptor,
        label: &str,
    ) -> TextureResult<NativeTextureHandle> {
        let id = self.next_texture_id.fetch_add(1, Ordering::Relaxed);
        let handle = NativeTextureHandle::new(id).ok_or(TextureError::AllocationFailure {
            bytes: descriptor.size_in_bytes(),
            reason: "texture handle space exhausted".to_owned(),
        })?;

        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: descriptor.extent.into_wgpu(),
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D3,
            format: descriptor.format.into_wgpu(),
            usage: wgpu::TextureUsages::COPY_DST | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        self.textures().insert(
            handle,
            WgpuTextureEntry {
                texture,
                descriptor: *descriptor,
            },
        );
        log::info!(
            "WgpuDirectDevice: Created texture '{label}' with handle {handle}, size: {} bytes (VRAM)",
            descriptor.size_in_bytes()
        );
        Ok(handle)
    }

    fn tex_sub_image_2d(&self, upload: &TextureUpload<'_>) -> TextureResult<()> {
        self.write(upload)
    }

    fn tex_sub_image_3d(&self, upload: &TextureUpload<'_>) -> TextureResult<()> {
        self.write(upload)
    }

    fn delete_texture(&self, handle: NativeTextureHandle) -> TextureResult<()> {
        match self.textures().remove(&handle) {
            Some(entry) => {
                entry.texture.destroy();
                log::debug!("WgpuDirectDevice: Destroyed texture {handle}");
            }
            None => self.push_error(INVALID_VALUE),
        }
        Ok(())
    }

    fn take_errors(&self) -> Vec<u32> {
        std::mem::take(&mut *self.errors.lock().unwrap_or_else(PoisonError::into_inner))
    }

    fn max_texture_dimension(&self) -> Option<u32> {
        Some(self.device.limits().max_texture_dimension_3d)
    }
}
