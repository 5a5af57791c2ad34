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

//! The layer record and its GeoJSON form.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use geojson::feature::Id;
use geojson::{Feature, FeatureCollection, Geometry};

use crate::json::{JsonObject, JsonValue};

/// Store-assigned layer identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LayerId(pub i64);

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for LayerId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(LayerId)
    }
}

impl From<i64> for LayerId {
    fn from(id: i64) -> Self {
        LayerId(id)
    }
}

/// A named geometry as read back from the store.
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    pub(crate) id: LayerId,
    pub(crate) name: String,
    pub(crate) geometry: Geometry,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) updated_at: DateTime<Utc>,
}

impl Layer {
    pub fn id(&self) -> LayerId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// The layer as a GeoJSON Feature carrying its name and timestamps.
    pub fn to_feature(&self) -> Feature {
        let mut properties = JsonObject::new();
        properties.insert(String::from("name"), JsonValue::from(self.name.clone()));
        properties.insert(String::from("created_at"), iso8601(self.created_at));
        properties.insert(String::from("updated_at"), iso8601(self.updated_at));
        Feature {
            bbox: None,
            geometry: Some(self.geometry.clone()),
            id: Some(Id::Number(self.id.0.into())),
            properties: Some(properties),
            foreign_members: None,
        }
    }
}

fn iso8601(at: DateTime<Utc>) -> JsonValue {
    JsonValue::from(at.to_rfc3339_opts(SecondsFormat::Secs, false))
}

/// Wrap layers as a GeoJSON FeatureCollection, keeping their order.
pub fn feature_collection<'a>(layers: impl IntoIterator<Item = &'a Layer>) -> FeatureCollection {
    FeatureCollection {
        bbox: None,
        features: layers.into_iter().map(Layer::to_feature).collect(),
        foreign_members: None,
    }
}
