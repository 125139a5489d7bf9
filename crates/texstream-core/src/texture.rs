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

//! Defines the texture identifiers, formats and region types used across texstream.

use crate::error::{TextureError, TextureResult};
use std::ffi::c_void;
use std::fmt;
use std::num::NonZeroUsize;

/// A caller-assigned texture identifier.
///
/// IDs are chosen by the host application and must be unique among live
/// textures. The [`TextureRegistry`](crate::TextureRegistry) enforces this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub u32);

impl fmt::Display for TextureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An opaque, pointer-sized reference to a GPU texture owned by the active backend.
///
/// The value is never interpreted outside the backend that produced it. Zero is
/// never a valid handle, so `Option<NativeTextureHandle>` crosses the C boundary
/// as a nullable pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct NativeTextureHandle(NonZeroUsize);

impl NativeTextureHandle {
    /// Wraps a raw handle value, returning `None` for zero.
    pub const fn new(raw: usize) -> Option<Self> {
        match NonZeroUsize::new(raw) {
            Some(raw) => Some(Self(raw)),
            None => None,
        }
    }

    /// Wraps a handle received from the host as a pointer.
    pub fn from_ptr(ptr: *mut c_void) -> Option<Self> {
        Self::new(ptr as usize)
    }

    /// Returns the raw handle value.
    pub const fn get(self) -> usize {
        self.0.get()
    }

    /// Returns the handle in the pointer form expected by the host.
    pub fn as_ptr(self) -> *mut c_void {
        self.0.get() as *mut c_void
    }
}

impl fmt::Display for NativeTextureHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// The texel formats a streamed texture can use.
///
/// The discriminants are the values used in host parameter blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum PixelFormat {
    /// A single unsigned 8-bit integer channel.
    R8Uint = 0,
    /// A single unsigned 16-bit integer channel.
    R16Uint = 1,
}

impl PixelFormat {
    /// The number of bytes occupied by one texel.
    pub const fn bytes_per_texel(self) -> usize {
        match self {
            PixelFormat::R8Uint => 1,
            PixelFormat::R16Uint => 2,
        }
    }

    /// Decodes a raw format value, returning `None` when it is unknown.
    pub const fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            0 => Some(PixelFormat::R8Uint),
            1 => Some(PixelFormat::R16Uint),
            _ => None,
        }
    }

    /// The raw value of this format in host parameter blocks.
    pub const fn as_raw(self) -> i32 {
        self as i32
    }
}

impl TryFrom<i32> for PixelFormat {
    type Error = TextureError;

    fn try_from(raw: i32) -> Result<Self, Self::Error> {
        Self::from_raw(raw).ok_or(TextureError::UnsupportedFormat(raw))
    }
}

/// A texel offset inside a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Origin3D {
    /// Offset along the x axis.
    pub x: u32,
    /// Offset along the y axis.
    pub y: u32,
    /// Offset along the z axis (always 0 for 2D uploads).
    pub z: u32,
}

impl Origin3D {
    /// The origin of the texture.
    pub const ZERO: Self = Self { x: 0, y: 0, z: 0 };

    /// Creates a new origin.
    pub const fn new(x: u32, y: u32, z: u32) -> Self {
        Self { x, y, z }
    }
}

/// The size of a texture or of an upload region, in texels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Extent3D {
    /// Width in texels.
    pub width: u32,
    /// Height in texels.
    pub height: u32,
    /// Depth in texels (1 for 2D regions).
    pub depth: u32,
}

impl Extent3D {
    /// Creates a new extent.
    pub const fn new(width: u32, height: u32, depth: u32) -> Self {
        Self {
            width,
            height,
            depth,
        }
    }

    /// Returns `true` if any dimension is zero.
    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0 || self.depth == 0
    }

    /// The largest of the three dimensions.
    pub fn max_dimension(&self) -> u32 {
        self.width.max(self.height).max(self.depth)
    }

    /// The number of bytes a tightly packed region of this extent occupies,
    /// or `None` if it does not fit in `usize`.
    pub fn payload_len(&self, format: PixelFormat) -> Option<usize> {
        (self.width as usize)
            .checked_mul(self.height as usize)?
            .checked_mul(self.depth as usize)?
            .checked_mul(format.bytes_per_texel())
    }
}

impl fmt::Display for Extent3D {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{}", self.width, self.height, self.depth)
    }
}

/// Describes a 3D texture to create.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureDescriptor {
    /// The size of the texture.
    pub extent: Extent3D,
    /// The texel format.
    pub format: PixelFormat,
}

impl TextureDescriptor {
    /// Creates a new descriptor.
    pub const fn new(extent: Extent3D, format: PixelFormat) -> Self {
        Self { extent, format }
    }

    /// Checks that the texture is non-empty and no dimension exceeds `max_dimension`.
    pub fn validate(&self, max_dimension: u32) -> TextureResult<()> {
        if self.extent.is_empty() {
            return Err(TextureError::InvalidExtent {
                extent: self.extent,
                reason: "every dimension must be non-zero",
            });
        }
        if self.extent.max_dimension() > max_dimension {
            return Err(TextureError::InvalidExtent {
                extent: self.extent,
                reason: "a dimension exceeds the maximum texture size",
            });
        }
        Ok(())
    }

    /// The size in bytes of the whole texture.
    pub fn size_in_bytes(&self) -> u64 {
        u64::from(self.extent.width)
            * u64::from(self.extent.height)
            * u64::from(self.extent.depth)
            * self.format.bytes_per_texel() as u64
    }
}

/// A sub-region write into an existing texture.
///
/// `data` holds the tightly packed texels of the region; it may be longer than
/// the region needs, in which case only the leading bytes are used.
#[derive(Debug, Clone, Copy)]
pub struct TextureUpload<'a> {
    /// The destination texture.
    pub handle: NativeTextureHandle,
    /// Where the region starts inside the texture.
    pub origin: Origin3D,
    /// The size of the region.
    pub extent: Extent3D,
    /// The destination mip level.
    pub mip_level: u32,
    /// The texel format of `data`.
    pub format: PixelFormat,
    /// The source texels.
    pub data: &'a [u8],
}

impl<'a> TextureUpload<'a> {
    /// Returns exactly the bytes covered by the region.
    ///
    /// Fails with [`TextureError::InvalidExtent`] for an empty or overflowing
    /// region and [`TextureError::PayloadTooSmall`] when `data` is short.
    pub fn payload(&self) -> TextureResult<&'a [u8]> {
        if self.extent.is_empty() {
            return Err(TextureError::InvalidExtent {
                extent: self.extent,
                reason: "every dimension must be non-zero",
            });
        }
        let expected =
            self.extent
                .payload_len(self.format)
                .ok_or(TextureError::InvalidExtent {
                    extent: self.extent,
                    reason: "payload size overflows",
                })?;
        self.data
            .get(..expected)
            .ok_or(TextureError::PayloadTooSmall {
                expected,
                actual: self.data.len(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle() -> NativeTextureHandle {
        NativeTextureHandle::new(0x10).unwrap()
    }

    #[test]
    fn test_bytes_per_texel_is_fixed_per_format() {
        assert_eq!(PixelFormat::R8Uint.bytes_per_texel(), 1);
        assert_eq!(PixelFormat::R16Uint.bytes_per_texel(), 2);
    }

    #[test]
    fn test_format_from_raw() {
        assert_eq!(PixelFormat::try_from(0), Ok(PixelFormat::R8Uint));
        assert_eq!(PixelFormat::try_from(1), Ok(PixelFormat::R16Uint));
        assert_eq!(
            PixelFormat::try_from(2),
            Err(TextureError::UnsupportedFormat(2))
        );
        assert_eq!(
            PixelFormat::try_from(-1),
            Err(TextureError::UnsupportedFormat(-1))
        );
    }

    #[test]
    fn test_payload_len_uses_depth() {
        let extent = Extent3D::new(64, 32, 8);
        assert_eq!(extent.payload_len(PixelFormat::R8Uint), Some(64 * 32 * 8));
        assert_eq!(
            extent.payload_len(PixelFormat::R16Uint),
            Some(64 * 32 * 8 * 2)
        );
    }

    #[test]
    fn test_payload_len_overflow() {
        let extent = Extent3D::new(u32::MAX, u32::MAX, u32::MAX);
        assert_eq!(extent.payload_len(PixelFormat::R16Uint), None);
    }

    #[test]
    fn test_zero_handle_is_rejected() {
        assert!(NativeTextureHandle::new(0).is_none());
        assert!(NativeTextureHandle::from_ptr(std::ptr::null_mut()).is_none());
        assert_eq!(handle().get(), 0x10);
        assert_eq!(handle().as_ptr() as usize, 0x10);
    }

    #[test]
    fn test_upload_payload_trims_to_region() {
        let data = vec![7u8; 100];
        let upload = TextureUpload {
            handle: handle(),
            origin: Origin3D::ZERO,
            extent: Extent3D::new(4, 4, 2),
            mip_level: 0,
            format: PixelFormat::R16Uint,
            data: &data,
        };
        assert_eq!(upload.payload().unwrap().len(), 64);
    }

    #[test]
    fn test_upload_payload_too_small() {
        let data = vec![0u8; 10];
        let upload = TextureUpload {
            handle: handle(),
            origin: Origin3D::ZERO,
            extent: Extent3D::new(4, 4, 1),
            mip_level: 0,
            format: PixelFormat::R8Uint,
            data: &data,
        };
        assert_eq!(
            upload.payload(),
            Err(TextureError::PayloadTooSmall {
                expected: 16,
                actual: 10
            })
        );
    }

    #[test]
    fn test_upload_payload_rejects_empty_region() {
        let upload = TextureUpload {
            handle: handle(),
            origin: Origin3D::ZERO,
            extent: Extent3D::new(4, 0, 1),
            mip_level: 0,
            format: PixelFormat::R8Uint,
            data: &[],
        };
        assert!(matches!(
            upload.payload(),
            Err(TextureError::InvalidExtent { .. })
        ));
    }

    #[test]
    fn test_descriptor_validation() {
        let ok = TextureDescriptor::new(Extent3D::new(64, 64, 64), PixelFormat::R8Uint);
        assert!(ok.validate(2048).is_ok());
        assert_eq!(ok.size_in_bytes(), 262_144);

        let too_big = TextureDescriptor::new(Extent3D::new(4096, 1, 1), PixelFormat::R8Uint);
        assert!(too_big.validate(2048).is_err());

        let empty = TextureDescriptor::new(Extent3D::new(0, 1, 1), PixelFormat::R8Uint);
        assert!(empty.validate(2048).is_err());
    }
}
