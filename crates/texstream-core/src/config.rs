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

//! Plugin configuration, loaded once when the plugin is loaded by the host.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// The environment variable naming an optional JSON configuration file.
pub const CONFIG_ENV: &str = "TEXSTREAM_CONFIG";

/// An error raised while loading the plugin configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// The file that was read.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The configuration could not be parsed.
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// A filter in `env_logger` syntax, e.g. `"info"` or `"texstream_infra=debug"`.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_owned(),
        }
    }
}

/// Resource limits applied before a backend is asked to allocate anything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// The largest width, height or depth accepted for a 3D texture.
    pub max_texture_dimension: u32,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_texture_dimension: 2048,
        }
    }
}

/// Backend selection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Use the null backend for renderers texstream has no backend for,
    /// instead of leaving the plugin without a backend.
    pub fallback_to_null: bool,
    /// Debug label given to textures created through label-aware devices.
    pub texture_label: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            fallback_to_null: false,
            texture_label: "texstream_texture_3d".to_owned(),
        }
    }
}

/// The complete plugin configuration.
///
/// Every section is optional in the serialized form; missing fields take
/// their default value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginConfig {
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Resource limits.
    pub limits: LimitsConfig,
    /// Backend selection settings.
    pub backend: BackendConfig,
}

impl PluginConfig {
    /// Parses a configuration from a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads and parses a JSON configuration file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&contents)
    }

    /// Loads the file named by [`CONFIG_ENV`], or the defaults when it is unset.
    pub fn load() -> Result<Self, ConfigError> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) if !path.is_empty() => Self::from_path(path),
            _ => Ok(Self::default()),
        }
    }
}
