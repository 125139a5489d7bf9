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

//! The C ABI the host engine binds to.
//!
//! The host attaches itself through [`plugin_load`], then drives the plugin
//! through the `extern "C"` functions below. One process-wide
//! [`PluginContext`] backs all of them.

use crate::context::PluginContext;
use crate::logging;
use std::ffi::c_void;
use std::sync::{Arc, OnceLock};
use texstream_core::config::PluginConfig;
use texstream_core::{DeviceEvent, HostInterfaces, TextureId};

static CONTEXT: OnceLock<PluginContext> = OnceLock::new();

/// Signature of the callback the host invokes on its render thread.
pub type RenderEventFn = unsafe extern "C" fn(event_id: i32, data: *mut c_void);

/// Attaches the host and initializes the backend for its renderer.
///
/// The configuration is read once, on the first load of the process. An
/// unreadable configuration falls back to the defaults; the warning is
/// logged once the host's sink is installed.
pub fn plugin_load(host: Arc<dyn HostInterfaces>) -> &'static PluginContext {
    let mut config_error = None;
    let context = CONTEXT.get_or_init(|| {
        PluginContext::new(PluginConfig::load().unwrap_or_else(|err| {
            config_error = Some(err);
            PluginConfig::default()
        }))
    });
    logging::init(&context.config().logging, host.log_sink());
    if let Some(err) = config_error {
        log::warn!("Ignoring plugin configuration: {err}");
    }
    log::info!("texstream loaded for {}", host.renderer());
    context.on_load(host);
    context
}

/// The loaded context, if [`plugin_load`] has run.
pub fn context() -> Option<&'static PluginContext> {
    CONTEXT.get()
}

unsafe extern "C" fn on_render_event(event_id: i32, data: *mut c_void) {
    if let Some(context) = CONTEXT.get() {
        // SAFETY: the host passes the parameter block matching `event_id`.
        unsafe { context.render_event(event_id, data.cast_const()) };
    }
}

/// Returns the callback the host issues render events through.
#[no_mangle]
pub extern "C" fn texstream_get_render_event_func() -> RenderEventFn {
    on_render_event
}

/// Returns the native handle of texture `texture_id`, or null if it does not
/// exist, is still being created, or no backend is active.
#[no_mangle]
pub extern "C" fn texstream_retrieve_created_texture_3d(texture_id: u32) -> *mut c_void {
    let Some(context) = CONTEXT.get() else {
        return std::ptr::null_mut();
    };
    match context.retrieve_texture_3d(TextureId(texture_id)) {
        Ok(Some(handle)) => handle.as_ptr(),
        Ok(None) => std::ptr::null_mut(),
        Err(err) => {
            log::warn!("Cannot retrieve texture {texture_id}: {err}");
            std::ptr::null_mut()
        }
    }
}

/// Forwards a graphics device event from the host.
#[no_mangle]
pub extern "C" fn texstream_on_device_event(event: i32) {
    let Some(context) = CONTEXT.get() else {
        return;
    };
    match DeviceEvent::from_raw(event) {
        Some(event) => context.on_device_event(event),
        None => log::warn!("Ignoring unknown device event {event}"),
    }
}

/// Shuts the backend down and detaches the host.
#[no_mangle]
pub extern "C" fn texstream_plugin_unload() {
    if let Some(context) = CONTEXT.get() {
        context.on_unload();
        log::info!("texstream unloaded");
    }
    logging::detach_host_sink();
}
