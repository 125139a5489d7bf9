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

//! The plugin context: lifecycle state machine, texture registry and render
//! command dispatcher.
//!
//! Exactly one backend is active between an `Initialize` and the following
//! `Shutdown` device event. All backend work is serialized by the lifecycle
//! mutex, which in practice is only ever taken on the host's render thread.
//! Caller threads querying textures only touch the registry and an atomic
//! "backend active" flag, so a lookup never waits for an upload.

use std::ffi::c_void;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use texstream_core::{
    BackendKind, DeviceEvent, DeviceType, HostInterfaces, NativeTextureHandle, PluginConfig,
    RenderCommand, TextureBackend, TextureDescriptor, TextureError, TextureId, TextureRegistry,
    TextureResult, TextureSlot,
};
use texstream_infra::create_backend;

/// The externally visible lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecyclePhase {
    /// No backend exists.
    Uninitialized,
    /// A backend is initialized and accepting commands.
    Active,
    /// The backend is releasing its GPU state.
    ShuttingDown,
}

#[derive(Debug)]
enum Lifecycle {
    Uninitialized,
    Active {
        device_type: DeviceType,
        backend: Box<dyn TextureBackend>,
    },
    ShuttingDown,
}

/// Owns everything the plugin keeps between host calls.
pub struct PluginContext {
    config: PluginConfig,
    host: RwLock<Option<Arc<dyn HostInterfaces>>>,
    lifecycle: Mutex<Lifecycle>,
    backend_active: AtomicBool,
    registry: TextureRegistry,
}

impl PluginContext {
    /// Creates an unloaded context.
    pub fn new(config: PluginConfig) -> Self {
        Self {
            config,
            host: RwLock::new(None),
            lifecycle: Mutex::new(Lifecycle::Uninitialized),
            backend_active: AtomicBool::new(false),
            registry: TextureRegistry::new(),
        }
    }

    /// The configuration the context was created with.
    pub fn config(&self) -> &PluginConfig {
        &self.config
    }

    /// The texture registry.
    pub fn registry(&self) -> &TextureRegistry {
        &self.registry
    }

    fn lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn host(&self) -> Option<Arc<dyn HostInterfaces>> {
        self.host
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The current lifecycle phase.
    pub fn phase(&self) -> LifecyclePhase {
        match *self.lifecycle() {
            Lifecycle::Uninitialized => LifecyclePhase::Uninitialized,
            Lifecycle::Active { .. } => LifecyclePhase::Active,
            Lifecycle::ShuttingDown => LifecyclePhase::ShuttingDown,
        }
    }

    /// The kind of the active backend, if any.
    pub fn active_backend(&self) -> Option<BackendKind> {
        match &*self.lifecycle() {
            Lifecycle::Active { backend, .. } => Some(backend.kind()),
            _ => None,
        }
    }

    /// The device type the active backend was created for, if any.
    pub fn device_type(&self) -> Option<DeviceType> {
        match &*self.lifecycle() {
            Lifecycle::Active { device_type, .. } => Some(*device_type),
            _ => None,
        }
    }

    /// Attaches the host and initializes a backend for its current renderer.
    pub fn on_load(&self, host: Arc<dyn HostInterfaces>) {
        *self.host.write().unwrap_or_else(PoisonError::into_inner) = Some(host);
        self.on_device_event(DeviceEvent::Initialize);
    }

    /// Shuts the backend down, releasing all deferred GPU objects, and detaches the host.
    pub fn on_unload(&self) {
        self.on_device_event(DeviceEvent::Shutdown);
        *self.host.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Drives the lifecycle state machine.
    ///
    /// # Panics
    /// Panics on `Initialize` while a backend is already active.
    pub fn on_device_event(&self, event: DeviceEvent) {
        log::debug!("PluginContext: Device event {event:?}");
        match event {
            DeviceEvent::Initialize => self.initialize(),
            DeviceEvent::Shutdown => self.shutdown(),
            DeviceEvent::BeforeReset | DeviceEvent::AfterReset => {
                let Some(host) = self.host() else {
                    return;
                };
                if let Lifecycle::Active { backend, .. } = &mut *self.lifecycle() {
                    if let Err(err) = backend.process_device_event(event, host.as_ref()) {
                        log::error!("{event:?} failed: {err}");
                    }
                }
            }
        }
    }

    fn initialize(&self) {
        let mut lifecycle = self.lifecycle();
        if matches!(*lifecycle, Lifecycle::Active { .. }) {
            panic!("texture backend initialized twice without an intervening shutdown");
        }
        let Some(host) = self.host() else {
            log::error!("Cannot initialize: no host interfaces attached");
            return;
        };

        let device_type = host.renderer();
        let Some(mut backend) = create_backend(device_type, &self.config.backend) else {
            return;
        };
        if let Err(err) = backend.process_device_event(DeviceEvent::Initialize, host.as_ref()) {
            log::error!("Failed to initialize the {} backend for {device_type}: {err}", backend.kind());
            return;
        }

        log::info!("Initialized the {} texture backend for {device_type}", backend.kind());
        *lifecycle = Lifecycle::Active {
            device_type,
            backend,
        };
        self.backend_active.store(true, Ordering::Release);
    }

    fn shutdown(&self) {
        let mut lifecycle = self.lifecycle();
        let Lifecycle::Active {
            device_type,
            mut backend,
        } = std::mem::replace(&mut *lifecycle, Lifecycle::ShuttingDown)
        else {
            *lifecycle = Lifecycle::Uninitialized;
            return;
        };
        self.backend_active.store(false, Ordering::Release);

        let mut released = 0;
        for (id, slot) in self.registry.drain() {
            released += 1;
            if let Some(handle) = slot.handle() {
                if let Err(err) = backend.destroy_texture_3d(handle) {
                    log::warn!("Failed to release texture {id} on shutdown: {err}");
                }
            }
        }

        match self.host() {
            Some(host) => {
                if let Err(err) = backend.process_device_event(DeviceEvent::Shutdown, host.as_ref())
                {
                    log::error!("Shutdown of the {} backend failed: {err}", backend.kind());
                }
            }
            None => log::warn!("Shutting down the {} backend without host interfaces", backend.kind()),
        }
        drop(backend);

        log::info!("Shut down the texture backend for {device_type}, released {released} texture(s)");
        *lifecycle = Lifecycle::Uninitialized;
    }

    /// Runs `f` on the active backend, or fails with `BackendUnavailable`.
    fn with_backend<R>(
        &self,
        f: impl FnOnce(&mut dyn TextureBackend) -> TextureResult<R>,
    ) -> TextureResult<R> {
        match &mut *self.lifecycle() {
            Lifecycle::Active { backend, .. } => f(backend.as_mut()),
            _ => Err(TextureError::BackendUnavailable),
        }
    }

    /// Creates a texture and registers it under `id`.
    ///
    /// The ID is reserved before the backend is called, so a concurrent
    /// create with the same ID fails with `DuplicateId` instead of leaking a
    /// second texture.
    pub fn create_texture_3d(
        &self,
        id: TextureId,
        descriptor: &TextureDescriptor,
    ) -> TextureResult<()> {
        descriptor.validate(self.config.limits.max_texture_dimension)?;
        self.with_backend(|backend| {
            self.registry.reserve(id)?;
            let handle = match backend.create_texture_3d(descriptor) {
                Ok(handle) => handle,
                Err(err) => {
                    self.registry.release(id);
                    return Err(err);
                }
            };
            if let Err(err) = self.registry.populate(id, handle) {
                discard_unregistered(backend, id, handle);
                return Err(err);
            }
            log::debug!("Created texture {id} ({} {:?})", descriptor.extent, descriptor.format);
            Ok(())
        })
    }

    /// Looks up the native handle of texture `id`.
    ///
    /// Callable from any thread. Returns `Ok(None)` while the texture is
    /// still being created.
    pub fn retrieve_texture_3d(&self, id: TextureId) -> TextureResult<Option<NativeTextureHandle>> {
        if !self.backend_active.load(Ordering::Acquire) {
            return Err(TextureError::BackendUnavailable);
        }
        self.registry.retrieve(id)
    }

    /// Unregisters texture `id` and asks the backend to release it.
    ///
    /// The ID is reusable as soon as this returns, even if the backend defers
    /// the release until the GPU is done with the texture.
    pub fn destroy_texture_3d(&self, id: TextureId) -> TextureResult<()> {
        self.with_backend(|backend| match self.registry.remove(id)? {
            TextureSlot::Ready(handle) => backend.destroy_texture_3d(handle),
            TextureSlot::Pending => Ok(()),
        })
    }

    /// Executes one decoded render command.
    ///
    /// Commands arriving while no backend is active are dropped silently.
    pub fn dispatch(&self, command: RenderCommand<'_>) -> TextureResult<()> {
        if !self.backend_active.load(Ordering::Acquire) {
            log::trace!("Dropping {:?} with no active backend", command.event_id());
            return Ok(());
        }
        match command {
            RenderCommand::CreateTexture3D { id, descriptor } => {
                self.create_texture_3d(id, &descriptor)
            }
            RenderCommand::DestroyTexture3D { id } => self.destroy_texture_3d(id),
            RenderCommand::SubImage2D(upload) => {
                self.with_backend(|backend| backend.sub_image_2d(&upload))
            }
            RenderCommand::SubImage3D(upload) => {
                self.with_backend(|backend| backend.sub_image_3d(&upload))
            }
        }
    }

    /// Decodes and executes a render event delivered by the host.
    ///
    /// Unknown event ids are ignored. Failures are logged and the command dropped.
    ///
    /// # Safety
    /// `params` must satisfy the contract of [`RenderCommand::decode`] for `event_id`.
    pub unsafe fn render_event(&self, event_id: i32, params: *const c_void) {
        if !self.backend_active.load(Ordering::Acquire) {
            return;
        }
        match RenderCommand::decode(event_id, params) {
            Ok(Some(command)) => {
                let event = command.event_id();
                if let Err(err) = self.dispatch(command) {
                    log::error!("{event:?} failed: {err}");
                }
            }
            Ok(None) => log::trace!("Ignoring unknown render event {event_id}"),
            Err(err) => log::error!("Rejected render event {event_id}: {err}"),
        }
    }
}

impl std::fmt::Debug for PluginContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginContext")
            .field("config", &self.config)
            .field("phase", &self.phase())
            .field("textures", &self.registry.len())
            .finish()
    }
}

/// Destroys a texture whose reservation vanished while it was being created.
fn discard_unregistered(
    backend: &mut dyn TextureBackend,
    id: TextureId,
    handle: NativeTextureHandle,
) {
    if let Err(err) = backend.destroy_texture_3d(handle) {
        log::warn!("Failed to release unregistered texture {id} ({handle}): {err}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use texstream_core::{Extent3D, PixelFormat, TextureUpload};
    use texstream_infra::testing::MockHost;

    /// Accepts everything except destruction.
    #[derive(Debug, Default)]
    struct UndestroyableBackend {
        destroy_calls: Vec<NativeTextureHandle>,
    }

    impl TextureBackend for UndestroyableBackend {
        fn kind(&self) -> BackendKind {
            BackendKind::Null
        }

        fn process_device_event(
            &mut self,
            _event: DeviceEvent,
            _host: &dyn HostInterfaces,
        ) -> TextureResult<()> {
            Ok(())
        }

        fn create_texture_3d(
            &mut self,
            _descriptor: &TextureDescriptor,
        ) -> TextureResult<NativeTextureHandle> {
            NativeTextureHandle::new(1)
                .ok_or_else(|| TextureError::InvalidParameters("null handle".to_owned()))
        }

        fn sub_image_2d(&mut self, _upload: &TextureUpload<'_>) -> TextureResult<()> {
            Ok(())
        }

        fn sub_image_3d(&mut self, _upload: &TextureUpload<'_>) -> TextureResult<()> {
            Ok(())
        }

        fn destroy_texture_3d(&mut self, handle: NativeTextureHandle) -> TextureResult<()> {
            self.destroy_calls.push(handle);
            Err(TextureError::DeviceQueryFailure("device lost".to_owned()))
        }
    }

    fn descriptor() -> TextureDescriptor {
        TextureDescriptor::new(Extent3D::new(4, 4, 4), PixelFormat::R8Uint)
    }

    fn loaded(device_type: DeviceType) -> PluginContext {
        let context = PluginContext::new(PluginConfig::default());
        context.on_load(Arc::new(MockHost::new(device_type)));
        context
    }

    #[test]
    fn test_load_initializes_backend() {
        let context = loaded(DeviceType::Null);
        assert_eq!(context.phase(), LifecyclePhase::Active);
        assert_eq!(context.active_backend(), Some(BackendKind::Null));
        assert_eq!(context.device_type(), Some(DeviceType::Null));
    }

    #[test]
    fn test_unsupported_renderer_stays_uninitialized() {
        let context = loaded(DeviceType::Metal);
        assert_eq!(context.phase(), LifecyclePhase::Uninitialized);
        assert_eq!(
            context.create_texture_3d(TextureId(1), &descriptor()),
            Err(TextureError::BackendUnavailable)
        );
        assert!(context.registry().is_empty());
    }

    #[test]
    fn test_failed_backend_initialize_stays_uninitialized() {
        // A Vulkan renderer without a Vulkan interface cannot initialize.
        let context = loaded(DeviceType::Vulkan);
        assert_eq!(context.phase(), LifecyclePhase::Uninitialized);
    }

    #[test]
    #[should_panic(expected = "initialized twice")]
    fn test_double_initialize_panics() {
        let context = loaded(DeviceType::Null);
        context.on_device_event(DeviceEvent::Initialize);
    }

    #[test]
    fn test_create_rejects_oversized_texture() {
        let context = loaded(DeviceType::Null);
        let huge = TextureDescriptor::new(Extent3D::new(4096, 1, 1), PixelFormat::R8Uint);
        assert!(matches!(
            context.create_texture_3d(TextureId(1), &huge),
            Err(TextureError::InvalidExtent { .. })
        ));
        assert!(!context.registry().contains(TextureId(1)));
    }

    #[test]
    fn test_reset_events_keep_registry() {
        let context = loaded(DeviceType::Null);
        context.create_texture_3d(TextureId(1), &descriptor()).unwrap();
        context.on_device_event(DeviceEvent::BeforeReset);
        context.on_device_event(DeviceEvent::AfterReset);
        assert_eq!(context.phase(), LifecyclePhase::Active);
        assert!(context.retrieve_texture_3d(TextureId(1)).unwrap().is_some());
    }

    #[test]
    fn test_unregistered_texture_is_destroyed_despite_failure() {
        let mut backend = UndestroyableBackend::default();
        let handle = NativeTextureHandle::new(0x42).unwrap();
        discard_unregistered(&mut backend, TextureId(8), handle);
        assert_eq!(backend.destroy_calls, vec![handle]);
    }

    #[test]
    fn test_shutdown_without_backend_is_noop() {
        let context = PluginContext::new(PluginConfig::default());
        context.on_device_event(DeviceEvent::Shutdown);
        assert_eq!(context.phase(), LifecyclePhase::Uninitialized);
    }
}
