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

//! Runtime configuration of the chain coordinator.

use std::time::Duration;

/// Configuration for the [`ChainCoordinator`](super::ChainCoordinator).
///
/// Use [`ChainConfig::builder()`] to create a configuration:
///
/// ```rust,ignore
/// let config = ChainConfig::builder()
///     .lock_timeout(Duration::from_secs(2))
///     .max_persist_attempts(5)
///     .build();
/// ```
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct ChainConfig {
    lock_timeout: Duration,
    max_persist_attempts: u32,
    retry_backoff: Duration,
}

impl ChainConfig {
    /// Creates a new configuration builder with default values.
    pub fn builder() -> ChainConfigBuilder {
        ChainConfigBuilder::default()
    }

    /// Bounded wait for a register's extension right.
    pub fn lock_timeout(&self) -> Duration {
        self.lock_timeout
    }

    /// How many times read-sign-append is attempted before failing.
    pub fn max_persist_attempts(&self) -> u32 {
        self.max_persist_attempts
    }

    /// Base delay between attempts. Attempt `n` waits `n * retry_backoff`.
    pub fn retry_backoff(&self) -> Duration {
        self.retry_backoff
    }
}

impl Default for ChainConfig {
    fn default() -> Self {
        ChainConfigBuilder::default().build()
    }
}

/// Builder for [`ChainConfig`].
#[derive(Debug, Clone)]
pub struct ChainConfigBuilder {
    config: ChainConfig,
}

impl Default for ChainConfigBuilder {
    fn default() -> Self {
        Self {
            config: ChainConfig {
                lock_timeout: Duration::from_millis(5000),
                max_persist_attempts: 3,
                retry_backoff: Duration::from_millis(50),
            },
        }
    }
}

impl ChainConfigBuilder {
    /// Sets the bounded wait for the extension right.
    pub fn lock_timeout(mut self, value: Duration) -> Self {
        self.config.lock_timeout = value;
        self
    }

    /// Sets the number of persistence attempts. Values below 1 are raised to 1.
    pub fn max_persist_attempts(mut self, value: u32) -> Self {
        self.config.max_persist_attempts = value.max(1);
        self
    }

    /// Sets the base retry delay.
    pub fn retry_backoff(mut self, value: Duration) -> Self {
        self.config.retry_backoff = value;
        self
    }

    pub fn build(self) -> ChainConfig {
        self.config
    }
}
