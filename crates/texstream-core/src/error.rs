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

//! Defines the error type shared by the registry, the dispatcher and every backend.

use crate::texture::{Extent3D, TextureId};
use thiserror::Error;

/// An error raised while creating, updating, querying or destroying a texture.
///
/// Every variant is recoverable at the call boundary: the triggering command is
/// dropped, the failure is logged, and the registry and backend stay consistent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TextureError {
    /// A live texture already uses the requested ID.
    #[error("a texture with ID {0} already exists")]
    DuplicateId(TextureId),

    /// No texture was created with the given ID (or it has been destroyed).
    #[error("no texture was created with ID {0}")]
    UnknownId(TextureId),

    /// The raw format value does not name a supported [`PixelFormat`](crate::PixelFormat).
    #[error("unsupported texture format: {0}")]
    UnsupportedFormat(i32),

    /// The device or host could not be queried, or refused access to a resource.
    #[error("device query failed: {0}")]
    DeviceQueryFailure(String),

    /// A transfer buffer or its backing memory could not be allocated.
    #[error("failed to allocate {bytes} bytes: {reason}")]
    AllocationFailure {
        /// The number of bytes requested.
        bytes: u64,
        /// What went wrong.
        reason: String,
    },

    /// No backend is active (before initialization, after shutdown, or on an
    /// unsupported device).
    #[error("no texture backend is active")]
    BackendUnavailable,

    /// The requested texture or region extent cannot be used.
    #[error("invalid extent {extent}: {reason}")]
    InvalidExtent {
        /// The offending extent.
        extent: Extent3D,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// The caller supplied fewer bytes than the region requires.
    #[error("payload too small: expected {expected} bytes, got {actual}")]
    PayloadTooSmall {
        /// Bytes required by the region and format.
        expected: usize,
        /// Bytes actually supplied.
        actual: usize,
    },

    /// A host parameter block held a null pointer or a negative value.
    #[error("invalid render command parameters: {0}")]
    InvalidParameters(String),
}

/// A specialized `Result` for texture operations.
pub type TextureResult<T> = Result<T, TextureError>;
