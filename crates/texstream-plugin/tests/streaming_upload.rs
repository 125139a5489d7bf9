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

//! End-to-end streaming through render events on a mock Vulkan host.

use std::ffi::c_void;
use std::sync::Arc;
use texstream_core::command::{CreateTexture3DParams, DestroyTexture3DParams, SubImage3DParams};
use texstream_core::{DeviceType, PluginConfig, RenderEventId, TextureError, TextureId};
use texstream_infra::testing::{MockHost, MockVulkanHost};
use texstream_plugin::PluginContext;

fn vulkan_context() -> (Arc<MockVulkanHost>, PluginContext) {
    let vulkan = Arc::new(MockVulkanHost::new());
    let context = PluginContext::new(PluginConfig::default());
    context.on_load(Arc::new(
        MockHost::new(DeviceType::Vulkan).with_vulkan(vulkan.clone()),
    ));
    (vulkan, context)
}

fn send<T>(context: &PluginContext, event: RenderEventId, params: &T) {
    unsafe { context.render_event(event as i32, params as *const T as *const c_void) };
}

fn create(context: &PluginContext, id: u32, size: u32, format: i32) {
    send(
        context,
        RenderEventId::CreateTexture3D,
        &CreateTexture3DParams {
            texture_id: id,
            width: size,
            height: size,
            depth: size,
            format,
        },
    );
}

fn upload_volume(context: &PluginContext, handle: *mut c_void, size: i32, data: &[u8]) {
    send(
        context,
        RenderEventId::SubImage3D,
        &SubImage3DParams {
            texture_handle: handle,
            xoffset: 0,
            yoffset: 0,
            zoffset: 0,
            width: size,
            height: size,
            depth: size,
            data_ptr: data.as_ptr().cast(),
            level: 0,
            format: 0,
        },
    );
}

#[test]
fn test_stream_full_volume_then_destroy() {
    let (vulkan, context) = vulkan_context();
    create(&context, 7, 64, 0);
    let handle = context
        .retrieve_texture_3d(TextureId(7))
        .unwrap()
        .expect("texture 7 should be ready");
    assert_eq!(vulkan.live_textures(), 1);

    let volume: Vec<u8> = (0..64 * 64 * 64).map(|i| (i % 251) as u8).collect();
    assert_eq!(volume.len(), 262_144);
    upload_volume(&context, handle.as_ptr(), 64, &volume);

    let copies = vulkan.recorded_copies();
    assert_eq!(copies.len(), 1);
    assert_eq!(copies[0].contents.len(), 262_144);
    assert_eq!(copies[0].contents, volume);

    send(
        &context,
        RenderEventId::DestroyTexture3D,
        &DestroyTexture3DParams { texture_id: 7 },
    );
    assert_eq!(
        context.retrieve_texture_3d(TextureId(7)),
        Err(TextureError::UnknownId(TextureId(7)))
    );

    context.on_unload();
    assert_eq!(vulkan.live_textures(), 0);
    assert_eq!(vulkan.live_buffers(), 0);
    assert_eq!(vulkan.live_allocations(), 0);
}

#[test]
fn test_consecutive_uploads_defer_previous_buffer() {
    let (vulkan, context) = vulkan_context();
    create(&context, 1, 8, 0);
    let handle = context.retrieve_texture_3d(TextureId(1)).unwrap().unwrap();
    let data = vec![3u8; 8 * 8 * 8];

    vulkan.set_frames(20, 18);
    upload_volume(&context, handle.as_ptr(), 8, &data);
    vulkan.set_frames(21, 19);
    upload_volume(&context, handle.as_ptr(), 8, &data);

    // The first buffer was retired at frame 21 and the GPU has only finished 19.
    assert_eq!(vulkan.live_buffers(), 2);

    vulkan.set_frames(22, 21);
    upload_volume(&context, handle.as_ptr(), 8, &data);
    assert_eq!(vulkan.live_buffers(), 2);
    assert_eq!(vulkan.recorded_copies().len(), 3);

    context.on_unload();
    assert_eq!(vulkan.live_buffers(), 0);
    assert_eq!(vulkan.mapped_allocations(), 0);
}

#[test]
fn test_r16_upload_uses_two_bytes_per_texel() {
    let (vulkan, context) = vulkan_context();
    create(&context, 2, 4, 1);
    let handle = context.retrieve_texture_3d(TextureId(2)).unwrap().unwrap();

    let texels: Vec<u16> = (0..4 * 4 * 4).map(|i| i as u16 * 1000).collect();
    let bytes: &[u8] = bytemuck::cast_slice(&texels);
    send(
        &context,
        RenderEventId::SubImage3D,
        &SubImage3DParams {
            texture_handle: handle.as_ptr(),
            xoffset: 0,
            yoffset: 0,
            zoffset: 0,
            width: 4,
            height: 4,
            depth: 4,
            data_ptr: bytes.as_ptr().cast(),
            level: 0,
            format: 1,
        },
    );

    let copies = vulkan.recorded_copies();
    assert_eq!(copies.len(), 1);
    assert_eq!(copies[0].contents.len(), 128);
    assert_eq!(copies[0].contents, bytes);
}

#[test]
fn test_rejected_commands_record_nothing() {
    let (vulkan, context) = vulkan_context();
    create(&context, 3, 4, 0);
    let handle = context.retrieve_texture_3d(TextureId(3)).unwrap().unwrap();
    let data = vec![0u8; 64];

    // Unsupported format code.
    create(&context, 4, 4, 9);
    assert!(!context.registry().contains(TextureId(4)));

    // Negative extent.
    send(
        &context,
        RenderEventId::SubImage3D,
        &SubImage3DParams {
            texture_handle: handle.as_ptr(),
            xoffset: 0,
            yoffset: 0,
            zoffset: 0,
            width: -4,
            height: 4,
            depth: 4,
            data_ptr: data.as_ptr().cast(),
            level: 0,
            format: 0,
        },
    );
    // Unknown event id.
    unsafe { context.render_event(42, std::ptr::null()) };

    assert!(vulkan.recorded_copies().is_empty());
    assert_eq!(vulkan.live_buffers(), 0);
}
