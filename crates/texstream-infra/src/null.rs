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

//! A backend that accepts every command without touching a GPU.

use std::collections::HashSet;
use texstream_core::traits::{BackendKind, HostInterfaces, TextureBackend};
use texstream_core::{
    DeviceEvent, NativeTextureHandle, TextureDescriptor, TextureError, TextureResult,
    TextureUpload,
};

/// The backend used for headless hosts.
///
/// Textures are synthetic handles tracked in memory so that creation,
/// retrieval and destruction behave exactly as on a real device. Uploads only
/// validate their payload.
#[derive(Debug)]
pub struct NullBackend {
    next_handle: usize,
    live: HashSet<NativeTextureHandle>,
}

impl NullBackend {
    /// Creates a null backend with no textures.
    pub fn new() -> Self {
        Self {
            next_handle: 1,
            live: HashSet::new(),
        }
    }

    /// The number of textures currently alive.
    pub fn live_textures(&self) -> usize {
        self.live.len()
    }

    fn check_live(&self, handle: NativeTextureHandle) -> TextureResult<()> {
        if self.live.contains(&handle) {
            Ok(())
        } else {
            Err(TextureError::DeviceQueryFailure(format!(
                "handle {handle} does not name a live texture"
            )))
        }
    }
}

impl Default for NullBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl TextureBackend for NullBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Null
    }

    fn process_device_event(
        &mut self,
        event: DeviceEvent,
        _host: &dyn HostInterfaces,
    ) -> TextureResult<()> {
        if event == DeviceEvent::Shutdown {
            log::debug!(
                "NullBackend: Dropping {} texture(s) on shutdown",
                self.live.len()
            );
            self.live.clear();
        }
        Ok(())
    }

    fn create_texture_3d(
        &mut self,
        descriptor: &TextureDescriptor,
    ) -> TextureResult<NativeTextureHandle> {
        let handle = NativeTextureHandle::new(self.next_handle).ok_or(
            TextureError::AllocationFailure {
                bytes: descriptor.size_in_bytes(),
                reason: "handle space exhausted".to_owned(),
            },
        )?;
        self.next_handle = self.next_handle.wrapping_add(1);
        self.live.insert(handle);
        log::trace!(
            "NullBackend: Created texture {handle} ({} {:?})",
            descriptor.extent,
            descriptor.format
        );
        Ok(handle)
    }

    fn sub_image_2d(&mut self, upload: &TextureUpload<'_>) -> TextureResult<()> {
        self.check_live(upload.handle)?;
        upload.payload().map(|_| ())
    }

    fn sub_image_3d(&mut self, upload: &TextureUpload<'_>) -> TextureResult<()> {
        self.check_live(upload.handle)?;
        upload.payload().map(|_| ())
    }

    fn destroy_texture_3d(&mut self, handle: NativeTextureHandle) -> TextureResult<()> {
        if self.live.remove(&handle) {
            Ok(())
        } else {
            Err(TextureError::DeviceQueryFailure(format!(
                "handle {handle} does not name a live texture"
            )))
        }
    }
}
