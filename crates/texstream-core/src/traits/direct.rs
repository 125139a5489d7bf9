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

use crate::error::TextureResult;
use crate::texture::{NativeTextureHandle, TextureDescriptor, TextureUpload};
use std::fmt::Debug;

/// A graphics device whose texture uploads are single synchronous calls.
///
/// OpenGL's `glTexImage3D` / `glTexSubImage*` family and wgpu's
/// `Queue::write_texture` fit this shape: the driver copies the caller's data
/// before the call returns, so no staging lifetime has to be managed.
pub trait DirectDevice: Send + Sync + Debug {
    /// Allocates a 3D texture, tagging it with `label` where the API supports it.
    fn create_texture_3d(
        &self,
        descriptor: &TextureDescriptor,
        label: &str,
    ) -> TextureResult<NativeTextureHandle>;

    /// Writes a 2D region (`depth == 1`).
    fn tex_sub_image_2d(&self, upload: &TextureUpload<'_>) -> TextureResult<()>;

    /// Writes a 3D region.
    fn tex_sub_image_3d(&self, upload: &TextureUpload<'_>) -> TextureResult<()>;

    /// Frees a texture.
    fn delete_texture(&self, handle: NativeTextureHandle) -> TextureResult<()>;

    /// Drains the device's pending error codes (`glGetError` style).
    fn take_errors(&self) -> Vec<u32>;

    /// The device's largest supported 3D texture dimension, if it can be queried.
    fn max_texture_dimension(&self) -> Option<u32>;
}
