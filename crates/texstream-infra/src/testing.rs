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

//! In-memory hosts and devices for exercising backends without a GPU.
//!
//! Every mock keeps strict accounting of the objects it hands out, so tests
//! can assert that nothing leaked and nothing was released early.

use std::collections::{HashMap, HashSet};
use std::ptr::NonNull;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use texstream_core::traits::vulkan::{
    BufferHandle, BufferImageCopy, CommandBufferHandle, ImageHandle, MemoryHandle,
    MemoryProperties, MemoryPropertyFlags, MemoryRequirements, MemoryType, RecordingState,
    VulkanDeviceHandles, VulkanError, VulkanEventConfig, VulkanResult,
};
use texstream_core::traits::{
    DirectDevice, HostInterfaces, HostLogLevel, HostLogSink, VulkanDevice, VulkanHost,
};
use texstream_core::{
    DeviceType, NativeTextureHandle, TextureDescriptor, TextureError, TextureResult,
    TextureUpload,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A fallible Vulkan primitive whose next call can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VulkanCall {
    /// [`VulkanDevice::create_buffer`].
    CreateBuffer,
    /// [`VulkanDevice::allocate_memory`].
    AllocateMemory,
    /// [`VulkanDevice::map_memory`].
    MapMemory,
    /// [`VulkanDevice::bind_buffer_memory`].
    BindBufferMemory,
    /// [`VulkanDevice::flush_mapped_memory`].
    FlushMappedMemory,
    /// [`VulkanHost::create_texture_3d`].
    CreateTexture,
}

/// A buffer-to-image copy recorded by a [`MockVulkanHost`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCopy {
    /// The command buffer it was recorded into.
    pub command_buffer: CommandBufferHandle,
    /// The frame that was being recorded.
    pub frame: u64,
    /// The source buffer.
    pub buffer: BufferHandle,
    /// The destination image.
    pub image: ImageHandle,
    /// The copy region.
    pub region: BufferImageCopy,
    /// The source buffer's bytes at the time the copy was recorded.
    pub contents: Vec<u8>,
}

const MOCK_ALIGNMENT: u64 = 256;

#[derive(Debug)]
struct MockBuffer {
    size: u64,
    memory: Option<MemoryHandle>,
}

#[derive(Debug)]
struct MockAllocation {
    bytes: Box<[u8]>,
    mapped: bool,
}

#[derive(Debug)]
struct VulkanState {
    recording: bool,
    current_frame: u64,
    safe_frame: u64,
    next_handle: u64,
    failures: HashSet<VulkanCall>,
    memory_types: Vec<MemoryType>,
    buffers: HashMap<BufferHandle, MockBuffer>,
    allocations: HashMap<MemoryHandle, MockAllocation>,
    textures: HashSet<NativeTextureHandle>,
    copies: Vec<RecordedCopy>,
    configured: Vec<(i32, VulkanEventConfig)>,
    flushes: usize,
    render_pass_exits: usize,
}

impl VulkanState {
    fn next_handle(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }

    fn check(&mut self, call: VulkanCall, error: VulkanError) -> VulkanResult<()> {
        if self.failures.remove(&call) {
            Err(error)
        } else {
            Ok(())
        }
    }
}

/// A [`VulkanHost`] and its [`VulkanDevice`], backed by plain memory.
///
/// It reports null device handles, so nothing can load a real device from it.
///
/// Memory type 0 is device-local, memory type 1 is host-visible (and
/// host-coherent unless configured otherwise). The host starts recording
/// frame 1 with safe frame 0.
#[derive(Debug)]
pub struct MockVulkanHost {
    state: Mutex<VulkanState>,
}

impl MockVulkanHost {
    /// Creates a recording host with coherent host-visible memory.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(VulkanState {
                recording: true,
                current_frame: 1,
                safe_frame: 0,
                next_handle: 0x1000,
                failures: HashSet::new(),
                memory_types: vec![
                    MemoryType {
                        property_flags: MemoryPropertyFlags::DEVICE_LOCAL,
                        heap_index: 0,
                    },
                    MemoryType {
                        property_flags: MemoryPropertyFlags::HOST_VISIBLE
                            | MemoryPropertyFlags::HOST_COHERENT,
                        heap_index: 1,
                    },
                ],
                buffers: HashMap::new(),
                allocations: HashMap::new(),
                textures: HashSet::new(),
                copies: Vec::new(),
                configured: Vec::new(),
                flushes: 0,
                render_pass_exits: 0,
            }),
        }
    }

    /// Makes the host-visible memory type coherent or not.
    pub fn with_coherent_memory(self, coherent: bool) -> Self {
        {
            let mut state = lock(&self.state);
            state.memory_types[1].property_flags = if coherent {
                MemoryPropertyFlags::HOST_VISIBLE | MemoryPropertyFlags::HOST_COHERENT
            } else {
                MemoryPropertyFlags::HOST_VISIBLE
            };
        }
        self
    }

    /// Removes every host-visible memory type.
    pub fn without_host_visible_memory(self) -> Self {
        lock(&self.state).memory_types[1].property_flags = MemoryPropertyFlags::DEVICE_LOCAL;
        self
    }

    /// Sets the frame being recorded and the last frame known to be complete.
    pub fn set_frames(&self, current: u64, safe: u64) {
        let mut state = lock(&self.state);
        state.current_frame = current;
        state.safe_frame = safe;
    }

    /// Starts or stops command recording.
    pub fn set_recording(&self, recording: bool) {
        lock(&self.state).recording = recording;
    }

    /// Makes the next call to `call` fail.
    pub fn fail_next(&self, call: VulkanCall) {
        lock(&self.state).failures.insert(call);
    }

    /// Buffers created and not yet destroyed.
    pub fn live_buffers(&self) -> usize {
        lock(&self.state).buffers.len()
    }

    /// Memory allocations not yet freed.
    pub fn live_allocations(&self) -> usize {
        lock(&self.state).allocations.len()
    }

    /// Memory allocations currently mapped.
    pub fn mapped_allocations(&self) -> usize {
        lock(&self.state)
            .allocations
            .values()
            .filter(|a| a.mapped)
            .count()
    }

    /// Textures created and not yet destroyed.
    pub fn live_textures(&self) -> usize {
        lock(&self.state).textures.len()
    }

    /// The bytes currently held by `buffer`'s memory, if it is bound.
    pub fn buffer_contents(&self, buffer: BufferHandle) -> Option<Vec<u8>> {
        let state = lock(&self.state);
        Self::contents_of(&state, buffer)
    }

    fn contents_of(state: &VulkanState, buffer: BufferHandle) -> Option<Vec<u8>> {
        let entry = state.buffers.get(&buffer)?;
        let allocation = state.allocations.get(&entry.memory?)?;
        Some(allocation.bytes[..entry.size as usize].to_vec())
    }

    /// Every copy recorded so far.
    pub fn recorded_copies(&self) -> Vec<RecordedCopy> {
        lock(&self.state).copies.clone()
    }

    /// Every `configure_event` call so far.
    pub fn configured_events(&self) -> Vec<(i32, VulkanEventConfig)> {
        lock(&self.state).configured.clone()
    }

    /// How many times mapped memory was flushed.
    pub fn flush_count(&self) -> usize {
        lock(&self.state).flushes
    }

    /// How many times the plugin asked to leave the render pass.
    pub fn render_pass_exits(&self) -> usize {
        lock(&self.state).render_pass_exits
    }
}

impl Default for MockVulkanHost {
    fn default() -> Self {
        Self::new()
    }
}

impl VulkanHost for MockVulkanHost {
    fn command_recording_state(&self) -> Option<RecordingState> {
        let state = lock(&self.state);
        state.recording.then_some(RecordingState {
            command_buffer: CommandBufferHandle(0xc0),
            current_frame_number: state.current_frame,
            safe_frame_number: state.safe_frame,
        })
    }

    fn ensure_outside_render_pass(&self) {
        lock(&self.state).render_pass_exits += 1;
    }

    fn access_texture(&self, texture: NativeTextureHandle) -> Option<ImageHandle> {
        let state = lock(&self.state);
        state
            .textures
            .contains(&texture)
            .then(|| ImageHandle(texture.get() as u64))
    }

    fn configure_event(&self, event_id: i32, config: &VulkanEventConfig) {
        lock(&self.state).configured.push((event_id, *config));
    }

    fn create_texture_3d(
        &self,
        _descriptor: &TextureDescriptor,
    ) -> VulkanResult<NativeTextureHandle> {
        let mut state = lock(&self.state);
        state.check(VulkanCall::CreateTexture, VulkanError::OUT_OF_DEVICE_MEMORY)?;
        let raw = state.next_handle();
        let handle = NativeTextureHandle::new(raw as usize).ok_or(VulkanError::OUT_OF_HOST_MEMORY)?;
        state.textures.insert(handle);
        Ok(handle)
    }

    fn destroy_texture(&self, texture: NativeTextureHandle) {
        let removed = lock(&self.state).textures.remove(&texture);
        assert!(removed, "destroyed unknown texture {texture}");
    }

    fn device_handles(&self) -> VulkanDeviceHandles {
        VulkanDeviceHandles {
            instance: 0,
            physical_device: 0,
            device: 0,
        }
    }
}

impl VulkanDevice for MockVulkanHost {
    fn memory_properties(&self) -> MemoryProperties {
        MemoryProperties {
            memory_types: lock(&self.state).memory_types.clone(),
        }
    }

    fn create_buffer(&self, size: u64) -> VulkanResult<BufferHandle> {
        let mut state = lock(&self.state);
        state.check(VulkanCall::CreateBuffer, VulkanError::OUT_OF_DEVICE_MEMORY)?;
        let handle = BufferHandle(state.next_handle());
        state
            .buffers
            .insert(handle, MockBuffer { size, memory: None });
        Ok(handle)
    }

    fn buffer_memory_requirements(&self, buffer: BufferHandle) -> MemoryRequirements {
        let state = lock(&self.state);
        let size = state.buffers.get(&buffer).map_or(0, |b| b.size);
        MemoryRequirements {
            size: size.div_ceil(MOCK_ALIGNMENT) * MOCK_ALIGNMENT,
            alignment: MOCK_ALIGNMENT,
            memory_type_bits: 0b11,
        }
    }

    fn allocate_memory(&self, size: u64, memory_type_index: u32) -> VulkanResult<MemoryHandle> {
        let mut state = lock(&self.state);
        state.check(VulkanCall::AllocateMemory, VulkanError::OUT_OF_DEVICE_MEMORY)?;
        assert!(
            (memory_type_index as usize) < state.memory_types.len(),
            "invalid memory type {memory_type_index}"
        );
        let handle = MemoryHandle(state.next_handle());
        state.allocations.insert(
            handle,
            MockAllocation {
                bytes: vec![0u8; size as usize].into_boxed_slice(),
                mapped: false,
            },
        );
        Ok(handle)
    }

    fn map_memory(&self, memory: MemoryHandle) -> VulkanResult<NonNull<u8>> {
        let mut state = lock(&self.state);
        state.check(VulkanCall::MapMemory, VulkanError::MEMORY_MAP_FAILED)?;
        let allocation = state
            .allocations
            .get_mut(&memory)
            .ok_or(VulkanError::MEMORY_MAP_FAILED)?;
        assert!(!allocation.mapped, "memory mapped twice");
        allocation.mapped = true;
        NonNull::new(allocation.bytes.as_mut_ptr()).ok_or(VulkanError::MEMORY_MAP_FAILED)
    }

    fn unmap_memory(&self, memory: MemoryHandle) {
        if let Some(allocation) = lock(&self.state).allocations.get_mut(&memory) {
            allocation.mapped = false;
        }
    }

    fn bind_buffer_memory(&self, buffer: BufferHandle, memory: MemoryHandle) -> VulkanResult<()> {
        let mut state = lock(&self.state);
        state.check(VulkanCall::BindBufferMemory, VulkanError::OUT_OF_DEVICE_MEMORY)?;
        let entry = state
            .buffers
            .get_mut(&buffer)
            .ok_or(VulkanError::OUT_OF_HOST_MEMORY)?;
        entry.memory = Some(memory);
        Ok(())
    }

    fn flush_mapped_memory(&self, _memory: MemoryHandle) -> VulkanResult<()> {
        let mut state = lock(&self.state);
        state.check(VulkanCall::FlushMappedMemory, VulkanError::OUT_OF_HOST_MEMORY)?;
        state.flushes += 1;
        Ok(())
    }

    fn destroy_buffer(&self, buffer: BufferHandle) {
        let removed = lock(&self.state).buffers.remove(&buffer);
        assert!(removed.is_some(), "destroyed unknown buffer {buffer:?}");
    }

    fn free_memory(&self, memory: MemoryHandle) {
        let removed = lock(&self.state).allocations.remove(&memory);
        assert!(removed.is_some(), "freed unknown memory {memory:?}");
    }

    fn cmd_copy_buffer_to_image(
        &self,
        command_buffer: CommandBufferHandle,
        buffer: BufferHandle,
        image: ImageHandle,
        region: &BufferImageCopy,
    ) {
        let mut state = lock(&self.state);
        let contents = Self::contents_of(&state, buffer).unwrap_or_default();
        let frame = state.current_frame;
        state.copies.push(RecordedCopy {
            command_buffer,
            frame,
            buffer,
            image,
            region: *region,
            contents,
        });
    }
}

#[derive(Debug)]
struct DirectState {
    next_handle: usize,
    textures: HashMap<NativeTextureHandle, TextureDescriptor>,
    labels: Vec<String>,
    uploads: Vec<(NativeTextureHandle, usize)>,
    errors: Vec<u32>,
    fail_next: Option<u32>,
    max_dimension: Option<u32>,
}

impl DirectState {
    fn finish_call(&mut self) {
        if let Some(code) = self.fail_next.take() {
            self.errors.push(code);
        }
    }
}

/// A [`DirectDevice`] that records uploads and can inject device errors.
#[derive(Debug)]
pub struct MockDirectDevice {
    state: Mutex<DirectState>,
}

/// `GL_INVALID_VALUE`.
pub const INVALID_VALUE: u32 = 0x501;

impl MockDirectDevice {
    /// Creates a device with a 2048 texel dimension limit.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(DirectState {
                next_handle: 1,
                textures: HashMap::new(),
                labels: Vec::new(),
                uploads: Vec::new(),
                errors: Vec::new(),
                fail_next: None,
                max_dimension: Some(2048),
            }),
        }
    }

    /// Queues an error code as if a previous call had failed.
    pub fn push_error(&self, code: u32) {
        lock(&self.state).errors.push(code);
    }

    /// Makes the next call report `code` through [`DirectDevice::take_errors`].
    pub fn fail_next_call(&self, code: u32) {
        lock(&self.state).fail_next = Some(code);
    }

    /// Changes the reported dimension limit.
    pub fn set_max_texture_dimension(&self, max: Option<u32>) {
        lock(&self.state).max_dimension = max;
    }

    /// Textures created and not yet deleted.
    pub fn live_textures(&self) -> usize {
        lock(&self.state).textures.len()
    }

    /// The labels passed to every texture creation, in order.
    pub fn labels(&self) -> Vec<String> {
        lock(&self.state).labels.clone()
    }

    /// Every successful upload as `(texture, byte count)`.
    pub fn uploads(&self) -> Vec<(NativeTextureHandle, usize)> {
        lock(&self.state).uploads.clone()
    }

    fn record_upload(&self, upload: &TextureUpload<'_>) -> TextureResult<()> {
        let payload = upload.payload()?;
        let mut state = lock(&self.state);
        if state.fail_next.is_none() {
            if state.textures.contains_key(&upload.handle) {
                state.uploads.push((upload.handle, payload.len()));
            } else {
                state.errors.push(INVALID_VALUE);
            }
        }
        state.finish_call();
        Ok(())
    }
}

impl Default for MockDirectDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl DirectDevice for MockDirectDevice {
    fn create_texture_3d(
        &self,
        descriptor: &TextureDescriptor,
        label: &str,
    ) -> TextureResult<NativeTextureHandle> {
        let mut state = lock(&self.state);
        let handle = NativeTextureHandle::new(state.next_handle).ok_or(
            TextureError::AllocationFailure {
                bytes: descriptor.size_in_bytes(),
                reason: "handle space exhausted".to_owned(),
            },
        )?;
        state.next_handle += 1;
        state.textures.insert(handle, *descriptor);
        state.labels.push(label.to_owned());
        state.finish_call();
        Ok(handle)
    }

    fn tex_sub_image_2d(&self, upload: &TextureUpload<'_>) -> TextureResult<()> {
        self.record_upload(upload)
    }

    fn tex_sub_image_3d(&self, upload: &TextureUpload<'_>) -> TextureResult<()> {
        self.record_upload(upload)
    }

    fn delete_texture(&self, handle: NativeTextureHandle) -> TextureResult<()> {
        let mut state = lock(&self.state);
        state.textures.remove(&handle);
        state.finish_call();
        Ok(())
    }

    fn take_errors(&self) -> Vec<u32> {
        std::mem::take(&mut lock(&self.state).errors)
    }

    fn max_texture_dimension(&self) -> Option<u32> {
        lock(&self.state).max_dimension
    }
}

/// A [`HostLogSink`] that keeps every message.
#[derive(Debug, Default)]
pub struct RecordingLogSink {
    messages: Mutex<Vec<(HostLogLevel, String)>>,
}

impl RecordingLogSink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every message received so far.
    pub fn messages(&self) -> Vec<(HostLogLevel, String)> {
        lock(&self.messages).clone()
    }
}

impl HostLogSink for RecordingLogSink {
    fn log(&self, level: HostLogLevel, message: &str) {
        lock(&self.messages).push((level, message.to_owned()));
    }
}

/// A configurable [`HostInterfaces`].
#[derive(Clone)]
pub struct MockHost {
    renderer: DeviceType,
    vulkan: Option<Arc<dyn VulkanHost>>,
    vulkan_device: Option<Arc<dyn VulkanDevice>>,
    direct: Option<Arc<dyn DirectDevice>>,
    log_sink: Option<Arc<dyn HostLogSink>>,
}

impl MockHost {
    /// Creates a host rendering with `renderer` and exposing nothing else.
    pub fn new(renderer: DeviceType) -> Self {
        Self {
            renderer,
            vulkan: None,
            vulkan_device: None,
            direct: None,
            log_sink: None,
        }
    }

    /// Exposes a Vulkan interface and lends its device.
    pub fn with_vulkan(mut self, vulkan: Arc<MockVulkanHost>) -> Self {
        self.vulkan_device = Some(vulkan.clone());
        self.vulkan = Some(vulkan);
        self
    }

    /// Stops lending a Vulkan device, leaving only the host's raw handles.
    pub fn without_vulkan_device(mut self) -> Self {
        self.vulkan_device = None;
        self
    }

    /// Exposes a direct upload device.
    pub fn with_direct_device(mut self, device: Arc<dyn DirectDevice>) -> Self {
        self.direct = Some(device);
        self
    }

    /// Exposes a log sink.
    pub fn with_log_sink(mut self, sink: Arc<dyn HostLogSink>) -> Self {
        self.log_sink = Some(sink);
        self
    }
}

impl HostInterfaces for MockHost {
    fn renderer(&self) -> DeviceType {
        self.renderer
    }

    fn vulkan(&self) -> Option<Arc<dyn VulkanHost>> {
        self.vulkan.clone()
    }

    fn vulkan_device(&self) -> Option<Arc<dyn VulkanDevice>> {
        self.vulkan_device.clone()
    }

    fn direct_device(&self) -> Option<Arc<dyn DirectDevice>> {
        self.direct.clone()
    }

    fn log_sink(&self) -> Option<Arc<dyn HostLogSink>> {
        self.log_sink.clone()
    }
}
