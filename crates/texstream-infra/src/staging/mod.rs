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

//! The streaming upload backend for hosts whose textures are not host-writable.
//!
//! Every upload goes through a freshly allocated host-visible
//! [`TransferBuffer`]: the payload is copied into it and a buffer-to-image
//! copy is recorded into the host's current command buffer. The copy runs
//! later, when the host submits that command buffer, so the buffer cannot be
//! freed when the upload returns. Instead it stays current until the next
//! upload supersedes it, is then retired into a [`DeferredDestructionQueue`]
//! tagged with the frame being recorded, and is released once the host's safe
//! frame number reaches that tag. Destroyed textures follow the same path,
//! and uploads naming a texture that awaits release are rejected.
//!
//! The engine-side calls go through the host's [`VulkanHost`]; buffers and
//! memory go through a [`VulkanDevice`], either lent by the host or loaded
//! with `ash` from the host's device handles.
//!
//! Correctness rests on one assumption: the host never reports a safe frame
//! number whose GPU work is still running. Under-reporting only delays release.

mod buffer;
mod memory;

pub use self::buffer::TransferBuffer;
pub use self::memory::find_memory_type_index;

use std::collections::HashSet;
use std::sync::Arc;
use texstream_core::traits::vulkan::{
    BufferImageCopy, GraphicsQueueAccess, RecordingState, RenderPassPrecondition,
    VulkanEventConfig,
};
use texstream_core::traits::{BackendKind, HostInterfaces, TextureBackend, VulkanDevice, VulkanHost};
use texstream_core::{
    DeferredDestructionQueue, DeviceEvent, NativeTextureHandle, RenderEventId, TextureDescriptor,
    TextureError, TextureResult, TextureUpload,
};

/// The host interfaces the backend records through between `Initialize` and `Shutdown`.
#[derive(Debug, Clone)]
struct Attached {
    host: Arc<dyn VulkanHost>,
    device: Arc<dyn VulkanDevice>,
}

/// A device object waiting for the GPU to finish with it.
#[derive(Debug)]
enum Retired {
    Buffer(TransferBuffer),
    Texture(NativeTextureHandle),
}

/// Uploads through staging buffers with frame-tagged deferred release.
#[derive(Debug, Default)]
pub struct StagingBackend {
    attached: Option<Attached>,
    staging: Option<TransferBuffer>,
    retired: DeferredDestructionQueue<Retired>,
    /// Destroyed textures still held by `retired`.
    retired_textures: HashSet<NativeTextureHandle>,
    /// The most recent frame seen recording.
    last_frame: u64,
}

impl StagingBackend {
    /// Creates a backend with no host attached; the host is acquired on `Initialize`.
    pub fn new() -> Self {
        Self::default()
    }

    /// The number of retired objects not yet released.
    pub fn pending_destructions(&self) -> usize {
        self.retired.len()
    }

    /// Returns `true` while the most recent upload's transfer buffer is held.
    pub fn has_current_staging_buffer(&self) -> bool {
        self.staging.is_some()
    }

    fn attached(&self) -> TextureResult<Attached> {
        self.attached.clone().ok_or(TextureError::BackendUnavailable)
    }

    fn recording_state(&mut self, host: &dyn VulkanHost) -> TextureResult<RecordingState> {
        let state = host.command_recording_state().ok_or_else(|| {
            TextureError::DeviceQueryFailure(
                "failed to intercept the current command buffer state".to_owned(),
            )
        })?;
        self.last_frame = self.last_frame.max(state.current_frame_number);
        Ok(state)
    }

    #[cfg(feature = "vulkan")]
    fn load_device(host: &dyn VulkanHost) -> TextureResult<Arc<dyn VulkanDevice>> {
        // SAFETY: the host keeps its handles valid until `Shutdown`, which drops the device.
        let handles = host.device_handles();
        let device = unsafe { crate::vulkan::AshVulkanDevice::from_handles(&handles) }?;
        Ok(Arc::new(device))
    }

    #[cfg(not(feature = "vulkan"))]
    fn load_device(_host: &dyn VulkanHost) -> TextureResult<Arc<dyn VulkanDevice>> {
        Err(TextureError::DeviceQueryFailure(
            "host lends no Vulkan device and the `vulkan` feature is disabled".to_owned(),
        ))
    }

    fn release(&mut self, attached: &Attached, items: Vec<Retired>) {
        for item in items {
            match item {
                Retired::Buffer(buffer) => buffer.release(attached.device.as_ref()),
                Retired::Texture(texture) => {
                    self.retired_textures.remove(&texture);
                    attached.host.destroy_texture(texture);
                }
            }
        }
    }

    /// Releases everything retired at or before `safe_frame`.
    fn collect_garbage(&mut self, attached: &Attached, safe_frame: u64) {
        let expired = self.retired.collect(safe_frame);
        if !expired.is_empty() {
            log::trace!(
                "StagingBackend: Releasing {} object(s) up to frame {safe_frame}",
                expired.len()
            );
        }
        self.release(attached, expired);
    }

    /// Releases every held object immediately, regardless of GPU progress.
    fn force_drain(&mut self, attached: &Attached) {
        if let Some(buffer) = self.staging.take() {
            buffer.release(attached.device.as_ref());
        }
        let drained = self.retired.drain_all();
        if !drained.is_empty() {
            log::debug!(
                "StagingBackend: Force-released {} deferred object(s)",
                drained.len()
            );
        }
        self.release(attached, drained);
    }

    fn configure_events(host: &dyn VulkanHost) {
        let config = VulkanEventConfig {
            render_pass_precondition: RenderPassPrecondition::EnsureOutside,
            graphics_queue_access: GraphicsQueueAccess::DontCare,
            ensure_previous_frame_submission: true,
            flush_command_buffers: false,
            modifies_command_buffers_state: true,
        };
        for event in RenderEventId::ALL.into_iter().filter(|e| e.is_upload()) {
            host.configure_event(event as i32, &config);
        }
    }

    fn upload(&mut self, upload: &TextureUpload<'_>) -> TextureResult<()> {
        let attached = self.attached()?;
        let (host, device) = (attached.host.as_ref(), attached.device.as_ref());
        let state = self.recording_state(host)?;
        let payload = upload.payload()?;
        if self.retired_textures.contains(&upload.handle) {
            return Err(TextureError::DeviceQueryFailure(format!(
                "texture {} was destroyed and awaits release",
                upload.handle
            )));
        }

        // The previous copy may still be in flight; its buffer is retired, not freed.
        if let Some(previous) = self.staging.take() {
            self.retired
                .retire(state.current_frame_number, Retired::Buffer(previous));
        }
        self.collect_garbage(&attached, state.safe_frame_number);

        let staging = self
            .staging
            .insert(TransferBuffer::allocate(device, payload.len() as u64)?);
        staging.write(device, payload)?;

        host.ensure_outside_render_pass();
        let image = host.access_texture(upload.handle).ok_or_else(|| {
            TextureError::DeviceQueryFailure(format!(
                "failed to access texture from provided texture handle: {}",
                upload.handle
            ))
        })?;

        device.cmd_copy_buffer_to_image(
            state.command_buffer,
            staging.buffer(),
            image,
            &BufferImageCopy {
                buffer_offset: 0,
                image_offset: upload.origin,
                image_extent: upload.extent,
                mip_level: upload.mip_level,
            },
        );
        log::trace!(
            "StagingBackend: Recorded {} byte copy into {} at frame {}",
            payload.len(),
            upload.handle,
            state.current_frame_number
        );
        Ok(())
    }
}

impl TextureBackend for StagingBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Staging
    }

    fn process_device_event(
        &mut self,
        event: DeviceEvent,
        host: &dyn HostInterfaces,
    ) -> TextureResult<()> {
        match event {
            DeviceEvent::Initialize => {
                let vulkan = host.vulkan().ok_or_else(|| {
                    TextureError::DeviceQueryFailure("host exposes no Vulkan interface".to_owned())
                })?;
                let device = match host.vulkan_device() {
                    Some(device) => device,
                    None => Self::load_device(vulkan.as_ref())?,
                };
                Self::configure_events(vulkan.as_ref());
                self.attached = Some(Attached {
                    host: vulkan,
                    device,
                });
                log::debug!("StagingBackend: Initialized");
            }
            DeviceEvent::Shutdown => {
                if let Some(attached) = self.attached.take() {
                    self.force_drain(&attached);
                }
                log::debug!("StagingBackend: Shut down");
            }
            DeviceEvent::BeforeReset | DeviceEvent::AfterReset => {}
        }
        Ok(())
    }

    fn create_texture_3d(
        &mut self,
        descriptor: &TextureDescriptor,
    ) -> TextureResult<NativeTextureHandle> {
        let attached = self.attached()?;
        attached
            .host
            .create_texture_3d(descriptor)
            .map_err(|e| TextureError::AllocationFailure {
                bytes: descriptor.size_in_bytes(),
                reason: e.to_string(),
            })
    }

    fn sub_image_2d(&mut self, upload: &TextureUpload<'_>) -> TextureResult<()> {
        self.upload(upload)
    }

    fn sub_image_3d(&mut self, upload: &TextureUpload<'_>) -> TextureResult<()> {
        self.upload(upload)
    }

    fn destroy_texture_3d(&mut self, handle: NativeTextureHandle) -> TextureResult<()> {
        let attached = self.attached()?;
        if !self.retired_textures.insert(handle) {
            return Err(TextureError::DeviceQueryFailure(format!(
                "texture {handle} is already awaiting release"
            )));
        }
        // Between frames, the last recorded frame is the newest that can reference the texture.
        let frame = match attached.host.command_recording_state() {
            Some(state) => {
                self.last_frame = self.last_frame.max(state.current_frame_number);
                state.current_frame_number
            }
            None => self.last_frame,
        };
        self.retired.retire(frame, Retired::Texture(handle));
        Ok(())
    }
}

impl Drop for StagingBackend {
    fn drop(&mut self) {
        if let Some(attached) = self.attached.take() {
            self.force_drain(&attached);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockHost, MockVulkanHost, VulkanCall};
    use texstream_core::{DeviceType, Extent3D, Origin3D, PixelFormat};

    fn setup() -> (Arc<MockVulkanHost>, MockHost, StagingBackend) {
        let vulkan = Arc::new(MockVulkanHost::new());
        let host = MockHost::new(DeviceType::Vulkan).with_vulkan(vulkan.clone());
        let mut backend = StagingBackend::new();
        backend
            .process_device_event(DeviceEvent::Initialize, &host)
            .unwrap();
        (vulkan, host, backend)
    }

    fn texture(backend: &mut StagingBackend) -> NativeTextureHandle {
        backend
            .create_texture_3d(&TextureDescriptor::new(
                Extent3D::new(16, 16, 16),
                PixelFormat::R8Uint,
            ))
            .unwrap()
    }

    fn upload(handle: NativeTextureHandle, data: &[u8]) -> TextureUpload<'_> {
        TextureUpload {
            handle,
            origin: Origin3D::new(1, 2, 3),
            extent: Extent3D::new(4, 4, 2),
            mip_level: 0,
            format: PixelFormat::R8Uint,
            data,
        }
    }

    #[test]
    fn test_initialize_configures_upload_events() {
        let (vulkan, _host, _backend) = setup();
        let configured = vulkan.configured_events();
        assert_eq!(
            configured.iter().map(|(id, _)| *id).collect::<Vec<_>>(),
            vec![0, 1]
        );
        for (_, config) in configured {
            assert_eq!(
                config.render_pass_precondition,
                RenderPassPrecondition::EnsureOutside
            );
            assert!(config.modifies_command_buffers_state);
        }
    }

    #[test]
    fn test_upload_records_copy() {
        let (vulkan, _host, mut backend) = setup();
        let handle = texture(&mut backend);
        let data: Vec<u8> = (0..32).collect();

        backend.sub_image_3d(&upload(handle, &data)).unwrap();

        let copies = vulkan.recorded_copies();
        assert_eq!(copies.len(), 1);
        assert_eq!(copies[0].region.image_offset, Origin3D::new(1, 2, 3));
        assert_eq!(copies[0].region.image_extent, Extent3D::new(4, 4, 2));
        assert_eq!(copies[0].contents, data);
        assert_eq!(vulkan.render_pass_exits(), 1);
        assert!(backend.has_current_staging_buffer());
        assert_eq!(backend.pending_destructions(), 0);
    }

    #[test]
    fn test_previous_buffer_released_only_when_safe() {
        let (vulkan, _host, mut backend) = setup();
        let handle = texture(&mut backend);
        let data = [0u8; 32];

        vulkan.set_frames(10, 8);
        backend.sub_image_3d(&upload(handle, &data)).unwrap();
        vulkan.set_frames(11, 9);
        backend.sub_image_3d(&upload(handle, &data)).unwrap();
        assert_eq!(vulkan.live_buffers(), 2);
        assert_eq!(backend.pending_destructions(), 1);

        // Safe frame 10 is still behind the first buffer's tag of 11.
        vulkan.set_frames(12, 10);
        backend.sub_image_3d(&upload(handle, &data)).unwrap();
        assert_eq!(vulkan.live_buffers(), 3);
        assert_eq!(backend.pending_destructions(), 2);

        vulkan.set_frames(13, 11);
        backend.sub_image_3d(&upload(handle, &data)).unwrap();
        assert_eq!(vulkan.live_buffers(), 3);
        assert_eq!(vulkan.live_allocations(), 3);
        assert_eq!(backend.pending_destructions(), 2);
    }

    #[test]
    fn test_recording_state_failure_changes_nothing() {
        let (vulkan, _host, mut backend) = setup();
        let handle = texture(&mut backend);
        vulkan.set_recording(false);
        let err = backend.sub_image_3d(&upload(handle, &[0u8; 32])).unwrap_err();
        assert!(matches!(err, TextureError::DeviceQueryFailure(_)));
        assert_eq!(vulkan.live_buffers(), 0);
        assert!(vulkan.recorded_copies().is_empty());
    }

    #[test]
    fn test_short_payload_allocates_nothing() {
        let (vulkan, _host, mut backend) = setup();
        let handle = texture(&mut backend);
        let err = backend.sub_image_3d(&upload(handle, &[0u8; 31])).unwrap_err();
        assert_eq!(
            err,
            TextureError::PayloadTooSmall {
                expected: 32,
                actual: 31
            }
        );
        assert_eq!(vulkan.live_buffers(), 0);
    }

    #[test]
    fn test_allocation_failure_keeps_queue_consistent() {
        let (vulkan, _host, mut backend) = setup();
        let handle = texture(&mut backend);
        backend.sub_image_3d(&upload(handle, &[0u8; 32])).unwrap();

        vulkan.fail_next(VulkanCall::AllocateMemory);
        let err = backend.sub_image_3d(&upload(handle, &[0u8; 32])).unwrap_err();
        assert!(matches!(err, TextureError::AllocationFailure { .. }));
        assert!(!backend.has_current_staging_buffer());
        assert_eq!(backend.pending_destructions(), 1);
        assert_eq!(vulkan.live_buffers(), 1);
    }

    #[test]
    fn test_unknown_texture_is_reported_after_allocation() {
        let (vulkan, _host, mut backend) = setup();
        let bogus = NativeTextureHandle::new(0xdead).unwrap();
        let err = backend.sub_image_2d(&upload(bogus, &[0u8; 32])).unwrap_err();
        assert!(matches!(err, TextureError::DeviceQueryFailure(_)));
        assert!(vulkan.recorded_copies().is_empty());
        // The buffer is held as current and retired by the next upload.
        assert!(backend.has_current_staging_buffer());
    }

    #[test]
    fn test_destroyed_texture_waits_for_safe_frame() {
        let (vulkan, _host, mut backend) = setup();
        let handle = texture(&mut backend);
        let other = texture(&mut backend);

        vulkan.set_frames(5, 3);
        backend.destroy_texture_3d(handle).unwrap();
        assert_eq!(vulkan.live_textures(), 2);

        vulkan.set_frames(6, 5);
        backend.sub_image_3d(&upload(other, &[0u8; 32])).unwrap();
        assert_eq!(vulkan.live_textures(), 1);
    }

    #[test]
    fn test_upload_to_destroyed_texture_is_rejected() {
        let (vulkan, _host, mut backend) = setup();
        let handle = texture(&mut backend);
        let other = texture(&mut backend);

        vulkan.set_frames(5, 3);
        backend.destroy_texture_3d(handle).unwrap();

        vulkan.set_frames(7, 4);
        let err = backend.sub_image_3d(&upload(handle, &[0u8; 32])).unwrap_err();
        assert!(matches!(err, TextureError::DeviceQueryFailure(_)));
        assert!(vulkan.recorded_copies().is_empty());
        assert!(!backend.has_current_staging_buffer());
        assert_eq!(vulkan.live_textures(), 2);

        // Nothing was recorded against the texture after frame 5.
        vulkan.set_frames(8, 5);
        backend.sub_image_3d(&upload(other, &[0u8; 32])).unwrap();
        assert_eq!(vulkan.recorded_copies().len(), 1);
        assert_eq!(vulkan.live_textures(), 1);
        assert_eq!(backend.pending_destructions(), 0);
    }

    #[test]
    fn test_destroy_twice_is_rejected() {
        let (vulkan, _host, mut backend) = setup();
        let handle = texture(&mut backend);
        vulkan.set_frames(5, 3);
        backend.destroy_texture_3d(handle).unwrap();
        assert!(matches!(
            backend.destroy_texture_3d(handle),
            Err(TextureError::DeviceQueryFailure(_))
        ));
        assert_eq!(backend.pending_destructions(), 1);
    }

    #[test]
    fn test_destroy_between_frames_uses_last_recorded_frame() {
        let (vulkan, _host, mut backend) = setup();
        let handle = texture(&mut backend);
        let other = texture(&mut backend);

        vulkan.set_frames(9, 7);
        backend.sub_image_3d(&upload(handle, &[0u8; 32])).unwrap();
        vulkan.set_recording(false);
        backend.destroy_texture_3d(handle).unwrap();
        vulkan.set_recording(true);

        vulkan.set_frames(10, 8);
        backend.sub_image_3d(&upload(other, &[0u8; 32])).unwrap();
        assert_eq!(vulkan.live_textures(), 2);

        vulkan.set_frames(11, 9);
        backend.sub_image_3d(&upload(other, &[0u8; 32])).unwrap();
        assert_eq!(vulkan.live_textures(), 1);
    }

    #[test]
    fn test_initialize_without_usable_device_handles() {
        let vulkan = Arc::new(MockVulkanHost::new());
        let host = MockHost::new(DeviceType::Vulkan)
            .with_vulkan(vulkan.clone())
            .without_vulkan_device();
        let mut backend = StagingBackend::new();
        let err = backend
            .process_device_event(DeviceEvent::Initialize, &host)
            .unwrap_err();
        assert!(matches!(err, TextureError::DeviceQueryFailure(_)));
        assert!(vulkan.configured_events().is_empty());
        assert_eq!(
            backend.create_texture_3d(&TextureDescriptor::new(
                Extent3D::new(2, 2, 2),
                PixelFormat::R8Uint
            )),
            Err(TextureError::BackendUnavailable)
        );
    }

    #[test]
    fn test_shutdown_drains_everything() {
        let (vulkan, host, mut backend) = setup();
        let handle = texture(&mut backend);
        vulkan.set_frames(100, 0);
        backend.sub_image_3d(&upload(handle, &[0u8; 32])).unwrap();
        backend.sub_image_3d(&upload(handle, &[0u8; 32])).unwrap();
        backend.destroy_texture_3d(handle).unwrap();

        backend
            .process_device_event(DeviceEvent::Shutdown, &host)
            .unwrap();
        assert_eq!(backend.pending_destructions(), 0);
        assert!(!backend.has_current_staging_buffer());
        assert_eq!(vulkan.live_buffers(), 0);
        assert_eq!(vulkan.live_allocations(), 0);
        assert_eq!(vulkan.live_textures(), 0);
    }

    #[test]
    fn test_drop_releases_held_objects() {
        let (vulkan, _host, mut backend) = setup();
        let handle = texture(&mut backend);
        backend.sub_image_3d(&upload(handle, &[0u8; 32])).unwrap();
        drop(backend);
        assert_eq!(vulkan.live_buffers(), 0);
    }

    #[test]
    fn test_upload_before_initialize() {
        let mut backend = StagingBackend::new();
        let handle = NativeTextureHandle::new(1).unwrap();
        assert_eq!(
            backend.sub_image_3d(&upload(handle, &[0u8; 32])),
            Err(TextureError::BackendUnavailable)
        );
    }
}
