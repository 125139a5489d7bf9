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

//! The render command protocol spoken with the host engine.
//!
//! The host delivers `(event_id, params)` pairs on the render thread, where
//! `params` points at one of the fixed-layout blocks below. Those layouts are
//! the binary contract with the host and must not change. Everything past the
//! boundary works with the typed [`RenderCommand`] instead.

use crate::error::{TextureError, TextureResult};
use crate::texture::{
    Extent3D, NativeTextureHandle, Origin3D, PixelFormat, TextureDescriptor, TextureId,
    TextureUpload,
};
use std::ffi::c_void;

/// The render event ids understood by the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum RenderEventId {
    /// Partial 2D upload, parameters in [`SubImage2DParams`].
    SubImage2D = 0,
    /// Partial 3D upload, parameters in [`SubImage3DParams`].
    SubImage3D = 1,
    /// Texture creation, parameters in [`CreateTexture3DParams`].
    CreateTexture3D = 2,
    /// Texture destruction, parameters in [`DestroyTexture3DParams`].
    DestroyTexture3D = 3,
}

impl RenderEventId {
    /// Every event id, in protocol order.
    pub const ALL: [RenderEventId; 4] = [
        RenderEventId::SubImage2D,
        RenderEventId::SubImage3D,
        RenderEventId::CreateTexture3D,
        RenderEventId::DestroyTexture3D,
    ];

    /// Decodes a raw event id, returning `None` for ids the protocol does not define.
    pub const fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            0 => Some(RenderEventId::SubImage2D),
            1 => Some(RenderEventId::SubImage3D),
            2 => Some(RenderEventId::CreateTexture3D),
            3 => Some(RenderEventId::DestroyTexture3D),
            _ => None,
        }
    }

    /// Returns `true` for the events that record GPU uploads.
    pub const fn is_upload(self) -> bool {
        matches!(self, RenderEventId::SubImage2D | RenderEventId::SubImage3D)
    }
}

/// Parameter block for [`RenderEventId::SubImage2D`].
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct SubImage2DParams {
    /// The destination texture handle.
    pub texture_handle: *mut c_void,
    /// Region x offset.
    pub xoffset: i32,
    /// Region y offset.
    pub yoffset: i32,
    /// Region width.
    pub width: i32,
    /// Region height.
    pub height: i32,
    /// Tightly packed source texels.
    pub data_ptr: *const c_void,
    /// Destination mip level.
    pub level: i32,
    /// Raw [`PixelFormat`] value.
    pub format: i32,
}

/// Parameter block for [`RenderEventId::SubImage3D`].
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct SubImage3DParams {
    /// The destination texture handle.
    pub texture_handle: *mut c_void,
    /// Region x offset.
    pub xoffset: i32,
    /// Region y offset.
    pub yoffset: i32,
    /// Region z offset.
    pub zoffset: i32,
    /// Region width.
    pub width: i32,
    /// Region height.
    pub height: i32,
    /// Region depth.
    pub depth: i32,
    /// Tightly packed source texels.
    pub data_ptr: *const c_void,
    /// Destination mip level.
    pub level: i32,
    /// Raw [`PixelFormat`] value.
    pub format: i32,
}

/// Parameter block for [`RenderEventId::CreateTexture3D`].
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct CreateTexture3DParams {
    /// The caller-assigned texture ID.
    pub texture_id: u32,
    /// Texture width.
    pub width: u32,
    /// Texture height.
    pub height: u32,
    /// Texture depth.
    pub depth: u32,
    /// Raw [`PixelFormat`] value.
    pub format: i32,
}

/// Parameter block for [`RenderEventId::DestroyTexture3D`].
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct DestroyTexture3DParams {
    /// The caller-assigned texture ID.
    pub texture_id: u32,
}

/// A decoded render command.
#[derive(Debug, Clone, Copy)]
pub enum RenderCommand<'a> {
    /// Write a 2D region (`depth == 1`, `z == 0`).
    SubImage2D(TextureUpload<'a>),
    /// Write a 3D region.
    SubImage3D(TextureUpload<'a>),
    /// Create a texture and register it under `id`.
    CreateTexture3D {
        /// The caller-assigned ID.
        id: TextureId,
        /// What to create.
        descriptor: TextureDescriptor,
    },
    /// Destroy the texture registered under `id`.
    DestroyTexture3D {
        /// The caller-assigned ID.
        id: TextureId,
    },
}

fn non_negative(value: i32, field: &str) -> TextureResult<u32> {
    u32::try_from(value)
        .map_err(|_| TextureError::InvalidParameters(format!("{field} is negative ({value})")))
}

fn handle_from(ptr: *mut c_void) -> TextureResult<NativeTextureHandle> {
    NativeTextureHandle::from_ptr(ptr)
        .ok_or_else(|| TextureError::InvalidParameters("texture handle is null".to_owned()))
}

/// Builds the payload slice for a region.
///
/// # Safety
/// `data` must point to at least `extent.payload_len(format)` readable bytes
/// that stay valid and unmodified for `'a`.
unsafe fn payload_from<'a>(
    data: *const c_void,
    extent: Extent3D,
    format: PixelFormat,
) -> TextureResult<&'a [u8]> {
    if data.is_null() {
        return Err(TextureError::InvalidParameters(
            "data pointer is null".to_owned(),
        ));
    }
    let len = extent
        .payload_len(format)
        .ok_or(TextureError::InvalidExtent {
            extent,
            reason: "payload size overflows",
        })?;
    Ok(std::slice::from_raw_parts(data.cast::<u8>(), len))
}

impl<'a> RenderCommand<'a> {
    /// Decodes a host parameter block.
    ///
    /// Returns `Ok(None)` for unknown event ids, which the dispatcher ignores.
    ///
    /// # Safety
    /// For a known `event_id`, `params` must be null or point to a valid block
    /// of the matching layout. Upload blocks must reference payloads of at
    /// least `width * height * depth * bytes_per_texel` bytes that outlive `'a`.
    pub unsafe fn decode(event_id: i32, params: *const c_void) -> TextureResult<Option<Self>> {
        let Some(event) = RenderEventId::from_raw(event_id) else {
            return Ok(None);
        };
        if params.is_null() {
            return Err(TextureError::InvalidParameters(format!(
                "null parameter block for {event:?}"
            )));
        }

        let command = match event {
            RenderEventId::SubImage2D => {
                let p = &*params.cast::<SubImage2DParams>();
                let format = PixelFormat::try_from(p.format)?;
                let extent = Extent3D::new(
                    non_negative(p.width, "width")?,
                    non_negative(p.height, "height")?,
                    1,
                );
                RenderCommand::SubImage2D(TextureUpload {
                    handle: handle_from(p.texture_handle)?,
                    origin: Origin3D::new(
                        non_negative(p.xoffset, "xoffset")?,
                        non_negative(p.yoffset, "yoffset")?,
                        0,
                    ),
                    extent,
                    mip_level: non_negative(p.level, "level")?,
                    format,
                    data: payload_from(p.data_ptr, extent, format)?,
                })
            }
            RenderEventId::SubImage3D => {
                let p = &*params.cast::<SubImage3DParams>();
                let format = PixelFormat::try_from(p.format)?;
                let extent = Extent3D::new(
                    non_negative(p.width, "width")?,
                    non_negative(p.height, "height")?,
                    non_negative(p.depth, "depth")?,
                );
                RenderCommand::SubImage3D(TextureUpload {
                    handle: handle_from(p.texture_handle)?,
                    origin: Origin3D::new(
                        non_negative(p.xoffset, "xoffset")?,
                        non_negative(p.yoffset, "yoffset")?,
                        non_negative(p.zoffset, "zoffset")?,
                    ),
                    extent,
                    mip_level: non_negative(p.level, "level")?,
                    format,
                    data: payload_from(p.data_ptr, extent, format)?,
                })
            }
            RenderEventId::CreateTexture3D => {
                let p = &*params.cast::<CreateTexture3DParams>();
                RenderCommand::CreateTexture3D {
                    id: TextureId(p.texture_id),
                    descriptor: TextureDescriptor::new(
                        Extent3D::new(p.width, p.height, p.depth),
                        PixelFormat::try_from(p.format)?,
                    ),
                }
            }
            RenderEventId::DestroyTexture3D => {
                let p = &*params.cast::<DestroyTexture3DParams>();
                RenderCommand::DestroyTexture3D {
                    id: TextureId(p.texture_id),
                }
            }
        };
        Ok(Some(command))
    }

    /// The event id this command was decoded from.
    pub fn event_id(&self) -> RenderEventId {
        match self {
            RenderCommand::SubImage2D(_) => RenderEventId::SubImage2D,
            RenderCommand::SubImage3D(_) => RenderEventId::SubImage3D,
            RenderCommand::CreateTexture3D { .. } => RenderEventId::CreateTexture3D,
            RenderCommand::DestroyTexture3D { .. } => RenderEventId::DestroyTexture3D,
        }
    }
}
