// Copyright 2018 The GeoRust Developers
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//	http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Layer store configuration.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::{Error, WGS84_SRID};

/// Largest accepted upload: 10 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
pub const DEFAULT_PAGE_SIZE: u32 = 15;
pub const DEFAULT_CONSOLE_PAGE_SIZE: u32 = 10;
/// Longest accepted layer name, in characters.
pub const MAX_NAME_CHARS: usize = 100;

/// Settings shared by the service, the read API and the console.
///
/// # Example
///
/// ```
/// use geolayers::Config;
///
/// let config = Config::default();
/// assert_eq!(config.srid(), 4326);
/// assert_eq!(config.max_upload_bytes(), 10 * 1024 * 1024);
///
/// let config = Config::new()
///     .with_page_size(50)
///     .with_database_path("layers.sqlite");
/// assert_eq!(config.page_size(), 50);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SRID every stored geometry is in; only WGS 84 is accepted
    srid: i32,
    /// Largest upload the service will parse
    max_upload_bytes: usize,
    /// Default page size for listings
    page_size: u32,
    /// Page size of the console listing
    console_page_size: u32,
    /// SQLite database file; `None` keeps the store in memory
    database_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            srid: WGS84_SRID,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            page_size: DEFAULT_PAGE_SIZE,
            console_page_size: DEFAULT_CONSOLE_PAGE_SIZE,
            database_path: None,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load settings from a JSON object; absent keys keep their defaults.
    ///
    /// Distances are measured on the sphere in degrees, so an `srid` other
    /// than WGS 84 fails with [`Error::SridMismatch`].
    pub fn from_json_str(s: &str) -> Result<Self, Error> {
        let config: Config =
            serde_json::from_str(s).map_err(|e| Error::MalformedJson(e.to_string()))?;
        if config.srid != WGS84_SRID {
            return Err(Error::SridMismatch {
                expected: WGS84_SRID,
                found: config.srid,
            });
        }
        Ok(config)
    }

    pub fn with_max_upload_bytes(mut self, bytes: usize) -> Self {
        self.max_upload_bytes = bytes;
        self
    }

    /// Set the default listing page size. Zero is raised to one.
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_console_page_size(mut self, page_size: u32) -> Self {
        self.console_page_size = page_size.max(1);
        self
    }

    pub fn with_database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.database_path = Some(path.into());
        self
    }

    pub fn srid(&self) -> i32 {
        self.srid
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_bytes
    }

    pub fn page_size(&self) -> u32 {
        self.page_size.max(1)
    }

    pub fn console_page_size(&self) -> u32 {
        self.console_page_size.max(1)
    }

    pub fn database_path(&self) -> Option<&Path> {
        self.database_path.as_deref()
    }
}
