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

//! # Texstream Core
//!
//! Foundational crate containing the types, traits and bookkeeping structures
//! shared by every texstream backend.
//!
//! This crate defines the 'what' of texture streaming: the texture registry,
//! the render command protocol spoken with the host engine, the deferred
//! destruction queue and the contracts a backend (and the host underneath it)
//! must fulfil. The 'how' lives in `texstream-infra`, which implements these
//! traits for concrete graphics APIs.

#![warn(missing_docs)]

pub mod command;
pub mod config;
pub mod deferred;
pub mod device;
pub mod error;
pub mod registry;
pub mod texture;
pub mod traits;

pub use command::{RenderCommand, RenderEventId};
pub use config::{BackendConfig, ConfigError, LimitsConfig, LoggingConfig, PluginConfig};
pub use deferred::DeferredDestructionQueue;
pub use device::{DeviceEvent, DeviceType};
pub use error::{TextureError, TextureResult};
pub use registry::{TextureRegistry, TextureSlot};
pub use texture::{
    Extent3D, NativeTextureHandle, Origin3D, PixelFormat, TextureDescriptor, TextureId,
    TextureUpload,
};
pub use traits::{
    BackendKind, DirectDevice, HostInterfaces, HostLogLevel, HostLogSink, TextureBackend,
    VulkanDevice, VulkanHost,
};
