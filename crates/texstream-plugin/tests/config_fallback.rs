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


//! Loading with an unreadable configuration file.
//!
//! The plugin's context and logger are process-wide, so this runs in its own
//! test binary.

use std::sync::Arc;
use texstream_core::config::{PluginConfig, CONFIG_ENV};
use texstream_core::{DeviceType, HostLogLevel};
use texstream_infra::testing::{MockHost, RecordingLogSink};
use texstream_plugin::ffi::{self, texstream_plugin_unload};
use texstream_plugin::LifecyclePhase;

#[test]
fn test_bad_config_warns_through_host_sink() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("texstream.json");
    std::fs::write(&path, "{not json").unwrap();
    std::env::set_var(CONFIG_ENV, &path);

    let sink = Arc::new(RecordingLogSink::new());
    let host = MockHost::new(DeviceType::Null).with_log_sink(sink.clone());
    let context = ffi::plugin_load(Arc::new(host));
    assert_eq!(context.phase(), LifecyclePhase::Active);
    assert_eq!(context.config(), &PluginConfig::default());

    let messages = sink.messages();
    assert!(messages.iter().any(|(level, message)| {
        *level == HostLogLevel::Warning && message.contains("Ignoring plugin configuration")
    }));
    assert!(messages
        .iter()
        .any(|(_, message)| message.contains("texstream loaded")));

    texstream_plugin_unload();
    std::env::remove_var(CONFIG_ENV);
}
