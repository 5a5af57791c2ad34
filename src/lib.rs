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

//! Named geographic layers: GeoJSON ingestion, spatial storage and queries.
//!
//! An upload goes through [`Document`] (structural validation), then
//! [`normalize`] (reduce `Feature`/`FeatureCollection` wrappers to one
//! geometry), then [`LayerRepository`], which persists it through the
//! [`SpatialStore`]. Reads come back as GeoJSON `Feature`s.
//!
//! ```
//! use geolayers::{Config, LayerService, SpatialStore, LayerRepository};
//!
//! let config = Config::default();
//! let store = SpatialStore::open_in_memory(config.srid())?;
//! let mut service = LayerService::new(LayerRepository::new(store), config);
//!
//! let upload = br#"{"type":"Point","coordinates":[-46.6333,-23.5505]}"#;
//! let layer = service.create_from_geojson("Sao Paulo", upload)?;
//!
//! let hits = service.repository().find_within_distance(-46.6333, -23.5505, 10.0)?;
//! assert_eq!(hits[0].id(), layer.id());
//! # Ok::<(), geolayers::Error>(())
//! ```

/// WGS 84 longitude/latitude.
pub const WGS84_SRID: i32 = 4326;

mod json {
    pub use serde_json::{Map, Value as JsonValue};
    pub type JsonObject = Map<String, JsonValue>;
}

pub mod api;
pub mod config;
pub mod console;
mod document;
mod error;
pub mod layer;
mod normalize;
mod predicate;
mod repository;
mod service;
mod store;
mod util;

pub use crate::config::Config;
pub use crate::document::{validate, Document};
pub use crate::error::{Error, InvalidGeoJson, ValidationErrors};
pub use crate::json::{JsonObject, JsonValue};
pub use crate::layer::{Layer, LayerId};
pub use crate::normalize::normalize;
pub use crate::predicate::Predicate;
pub use crate::repository::{LayerChanges, LayerRepository, Page, PageRequest};
pub use crate::service::LayerService;
pub use crate::store::{GeometrySource, SpatialStore, StoredGeometry};

pub type Result<T, E = Error> = std::result::Result<T, E>;
