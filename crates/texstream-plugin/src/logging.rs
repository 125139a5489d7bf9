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

//! Routes `log` records to the host engine's console, or to stderr.
//!
//! When the host provides a [`HostLogSink`], a [`HostLogger`] forwards every
//! record that passes the configured filter (parsed with `env_filter`) to it.
//! Otherwise `env_logger` is
//! used, honoring `RUST_LOG` over the configured default. A process has one
//! global logger, so whichever is installed first stays; the host sink itself
//! is swapped on every load and cleared on unload.

use env_filter::{Builder as FilterBuilder, Filter};
use log::{Level, Log, Metadata, Record};
use std::sync::{Arc, PoisonError, RwLock};
use texstream_core::config::LoggingConfig;
use texstream_core::traits::{HostLogLevel, HostLogSink};

static HOST_SINK: RwLock<Option<Arc<dyn HostLogSink>>> = RwLock::new(None);

fn set_sink(sink: Option<Arc<dyn HostLogSink>>) {
    *HOST_SINK.write().unwrap_or_else(PoisonError::into_inner) = sink;
}

fn host_level(level: Level) -> HostLogLevel {
    match level {
        Level::Error => HostLogLevel::Error,
        Level::Warn => HostLogLevel::Warning,
        Level::Info | Level::Debug | Level::Trace => HostLogLevel::Log,
    }
}

/// A [`Log`] implementation that forwards to the host's log sink.
pub struct HostLogger {
    filter: Filter,
}

impl HostLogger {
    /// Creates a logger filtering with `filter` (env_logger syntax).
    pub fn new(filter: &str) -> Self {
        Self {
            filter: FilterBuilder::new().parse(filter).build(),
        }
    }

    /// The most verbose level this logger may accept.
    pub fn max_level(&self) -> log::LevelFilter {
        self.filter.filter()
    }
}

impl Log for HostLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        self.filter.enabled(metadata)
    }

    fn log(&self, record: &Record<'_>) {
        if !self.filter.matches(record) {
            return;
        }
        let sink = HOST_SINK.read().unwrap_or_else(PoisonError::into_inner);
        if let Some(sink) = sink.as_ref() {
            sink.log(
                host_level(record.level()),
                &format!("[texstream] {}: {}", record.target(), record.args()),
            );
        }
    }

    fn flush(&self) {}
}

/// Installs the plugin's logger. Safe to call on every load.
pub fn init(config: &LoggingConfig, sink: Option<Arc<dyn HostLogSink>>) {
    match sink {
        Some(sink) => {
            set_sink(Some(sink));
            let logger = HostLogger::new(&config.filter);
            let max_level = logger.max_level();
            if log::set_boxed_logger(Box::new(logger)).is_ok() {
                log::set_max_level(max_level);
            }
        }
        None => {
            use env_logger::{Builder, Env};

            let _ = Builder::from_env(Env::default().default_filter_or(config.filter.as_str()))
                .filter_module("wgpu_hal", log::LevelFilter::Error)
                .try_init();
        }
    }
}

/// Detaches the host sink; records logged afterwards are dropped.
pub fn detach_host_sink() {
    set_sink(None);
}

#[cfg(test)]
mod tests {
    use super::*;
    use log::LevelFilter;

    #[test]
    fn test_level_mapping() {
        assert_eq!(host_level(Level::Error), HostLogLevel::Error);
        assert_eq!(host_level(Level::Warn), HostLogLevel::Warning);
        assert_eq!(host_level(Level::Debug), HostLogLevel::Log);
    }

    #[test]
    fn test_filter_parsing() {
        assert_eq!(HostLogger::new("info").max_level(), LevelFilter::Info);
        assert_eq!(
            HostLogger::new("warn,texstream_infra=trace").max_level(),
            LevelFilter::Trace
        );
        let logger = HostLogger::new("warn");
        let debug = Metadata::builder()
            .level(Level::Debug)
            .target("texstream_plugin")
            .build();
        assert!(!logger.enabled(&debug));
    }
}
