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

use crate::device::DeviceEvent;
use crate::error::TextureResult;
use crate::texture::{NativeTextureHandle, TextureDescriptor, TextureUpload};
use crate::traits::HostInterfaces;
use std::fmt::{self, Debug};

/// Identifies which family of backend is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// Accepts every command and touches no GPU.
    Null,
    /// Uploads through single synchronous driver calls.
    Direct,
    /// Uploads through host-visible staging buffers with deferred release.
    Staging,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Null => write!(f, "null"),
            BackendKind::Direct => write!(f, "direct"),
            BackendKind::Staging => write!(f, "staging"),
        }
    }
}

/// The capability interface every graphics backend implements.
///
/// Exactly one backend is active at a time, and every method is called from
/// the host's render thread only, never concurrently.
pub trait TextureBackend: Send + Debug {
    /// The family this backend belongs to.
    fn kind(&self) -> BackendKind;

    /// Reacts to a device lifecycle event.
    /// ## Arguments
    /// * `event` - The event delivered by the host.
    /// * `host` - The host interfaces, used to (re)acquire device objects.
    /// ## Errors
    /// * `TextureError::DeviceQueryFailure` - If `Initialize` cannot acquire the device.
    fn process_device_event(
        &mut self,
        event: DeviceEvent,
        host: &dyn HostInterfaces,
    ) -> TextureResult<()>;

    /// Creates a 3D texture.
    /// ## Arguments
    /// * `descriptor` - The size and format of the texture.
    /// ## Returns
    /// The native handle of the new texture.
    /// ## Errors
    /// * `TextureError::AllocationFailure` - If the device cannot create the texture.
    fn create_texture_3d(
        &mut self,
        descriptor: &TextureDescriptor,
    ) -> TextureResult<NativeTextureHandle>;

    /// Writes a 2D region (`depth == 1`) into a texture.
    fn sub_image_2d(&mut self, upload: &TextureUpload<'_>) -> TextureResult<()>;

    /// Writes a 3D region into a texture.
    fn sub_image_3d(&mut self, upload: &TextureUpload<'_>) -> TextureResult<()>;

    /// Releases a texture, immediately or once the GPU no longer uses it.
    fn destroy_texture_3d(&mut self, handle: NativeTextureHandle) -> TextureResult<()>;
}
