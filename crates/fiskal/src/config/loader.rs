/*
 *  Copyright 2025-2026 Colliery Software
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

use super::validation::Validate;
use super::{ConfigError, FiscalConfig};
use regex::Regex;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable naming an explicit configuration file.
pub const CONFIG_ENV_VAR: &str = "FISKAL_CONFIG";

pub struct ConfigLoader {
    search_paths: Vec<PathBuf>,
}

impl ConfigLoader {
    /// Create a new config loader with default search paths
    pub fn new() -> Self {
        let mut search_paths = vec![PathBuf::from("./fiskal.toml")];

        if let Some(config_dir) = dirs::config_dir() {
            search_paths.push(config_dir.join("fiskal").join("config.toml"));
        }

        search_paths.push(PathBuf::from("/etc/fiskal/config.toml"));

        Self { search_paths }
    }

    pub fn with_search_paths(search_paths: Vec<PathBuf>) -> Self {
        Self { search_paths }
    }

    /// Loads and validates configuration.
    ///
    /// Resolution order: `config_file`, then `FISKAL_CONFIG`, then the first
    /// existing search path. Without any file the defaults are used.
    pub fn load_config(&self, config_file: Option<&Path>) -> Result<FiscalConfig, ConfigError> {
        let config_path = if let Some(path) = config_file {
            Some(path.to_path_buf())
        } else if let Ok(env_config) = env::var(CONFIG_ENV_VAR) {
            Some(PathBuf::from(env_config))
        } else {
            self.find_config_file()
        };

        let config = match config_path {
            Some(path) => self.load_config_from_file(&path)?,
            None => {
                debug!("No configuration file found, using defaults");
                FiscalConfig::default()
            }
        };

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file without validating it
    pub fn load_config_from_file(&self, path: &Path) -> Result<FiscalConfig, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;

        let substituted_content = self.substitute_env_vars(&content)?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") | None => {
                debug!("Loading configuration from {}", path.display());
                Ok(toml::from_str::<FiscalConfig>(&substituted_content)?)
            }
            Some(ext) => Err(ConfigError::UnsupportedFormat {
                extension: ext.to_string(),
            }),
        }
    }

    /// Find the first existing configuration file in search paths
    pub fn find_config_file(&self) -> Option<PathBuf> {
        self.search_paths
            .iter()
            .find(|path| path.is_file())
            .cloned()
    }

    /// Substitute environment variables in configuration content
    fn substitute_env_vars(&self, content: &str) -> Result<String, ConfigError> {
        // ${VAR}, ${VAR:-default}, ${VAR:?error}
        let re = Regex::new(r"\$\{([^}]+)\}")
            .map_err(|e| ConfigError::EnvSubstitutionError(e.to_string()))?;

        let mut result = String::with_capacity(content.len());
        let mut last = 0;
        for cap in re.captures_iter(content) {
            let Some(full_match) = cap.get(0) else {
                continue;
            };
            result.push_str(&content[last..full_match.start()]);
            result.push_str(&self.process_var_expression(&cap[1])?);
            last = full_match.end();
        }
        result.push_str(&content[last..]);

        Ok(result)
    }

    /// Process a variable expression like "VAR", "VAR:-default", or "VAR:?error"
    fn process_var_expression(&self, expr: &str) -> Result<String, ConfigError> {
        if let Some((var_name, default_value)) = expr.split_once(":-") {
            Ok(env::var(var_name).unwrap_or_else(|_| default_value.to_string()))
        } else if let Some((var_name, error_msg)) = expr.split_once(":?") {
            env::var(var_name).map_err(|_| {
                ConfigError::EnvSubstitutionError(format!(
                    "Required environment variable '{}' is not set: {}",
                    var_name, error_msg
                ))
            })
        } else {
            env::var(expr).map_err(|_| {
                ConfigError::EnvSubstitutionError(format!(
                    "Required environment variable '{}' is not set",
                    expr
                ))
            })
        }
    }

    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
