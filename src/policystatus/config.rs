/*
 * Copyright (C) 2024 The Nanocloud Authors
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 * http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

use crate::policystatus::logger::LogFormat;
use crate::policystatus::util::error::ConfigValueError;
use std::env;
use std::error::Error;

pub const DEFAULT_CONTROLLER_NAME: &str = "gateway.envoyproxy.io/gatewayclass-controller";

/// Enum for supported configuration parameters
#[derive(Debug, Clone, Copy)]
pub enum Config {
    ControllerName,
    LogFormat,
    UpdateQueueSize,
    ConflictRetries,
}

impl Config {
    /// Returns the associated environment variable for the config parameter.
    pub fn env_var(&self) -> &'static str {
        match self {
            Config::ControllerName => "POLICYSTATUS_CONTROLLER_NAME",
            Config::LogFormat => "POLICYSTATUS_LOG_FORMAT",
            Config::UpdateQueueSize => "POLICYSTATUS_UPDATE_QUEUE",
            Config::ConflictRetries => "POLICYSTATUS_CONFLICT_RETRIES",
        }
    }

    pub fn default_value(&self) -> &'static str {
        match self {
            Config::ControllerName => DEFAULT_CONTROLLER_NAME,
            Config::LogFormat => "text",
            Config::UpdateQueueSize => "100",
            Config::ConflictRetries => "5",
        }
    }

    /// Returns the effective value, either from environment or default.
    /// Blank values count as unset.
    pub fn get(&self) -> String {
        match env::var(self.env_var()) {
            Ok(value) if !value.trim().is_empty() => value.trim().to_string(),
            _ => self.default_value().to_string(),
        }
    }

    fn get_usize(&self, minimum: usize) -> Result<usize, Box<dyn Error + Send + Sync>> {
        let raw = self.get();
        match raw.parse::<usize>() {
            Ok(value) if value >= minimum => Ok(value),
            _ => Err(Box::new(ConfigValueError {
                variable: self.env_var(),
                value: raw,
                expected: if minimum > 0 {
                    "a positive integer"
                } else {
                    "a non-negative integer"
                },
            })),
        }
    }
}

/// Identity written into `controllerName` of every ancestor entry this
/// process reports.
pub fn controller_name() -> String {
    Config::ControllerName.get()
}

pub fn log_format() -> Result<LogFormat, Box<dyn Error + Send + Sync>> {
    let raw = Config::LogFormat.get();
    match raw.to_ascii_lowercase().as_str() {
        "text" => Ok(LogFormat::Text),
        "json" => Ok(LogFormat::Json),
        _ => Err(Box::new(ConfigValueError {
            variable: Config::LogFormat.env_var(),
            value: raw,
            expected: "'text' or 'json'",
        })),
    }
}

/// Tuning for the status write-back queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdaterSettings {
    pub queue_size: usize,
    pub max_conflict_retries: usize,
}

impl Default for UpdaterSettings {
    fn default() -> Self {
        Self {
            queue_size: 100,
            max_conflict_retries: 5,
        }
    }
}

impl UpdaterSettings {
    pub fn from_env() -> Result<Self, Box<dyn Error + Send + Sync>> {
        Ok(Self {
            queue_size: Config::UpdateQueueSize.get_usize(1)?,
            max_conflict_retries: Config::ConflictRetries.get_usize(0)?,
        })
    }
}
