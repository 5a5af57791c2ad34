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

//! Public read-only endpoints, independent of any HTTP framework.
//!
//! | Path | Query | Body |
//! |---|---|---|
//! | `/layers` | | all layers as a `FeatureCollection` |
//! | `/layers/contains` | `longitude`, `latitude` | layers containing the point |
//! | `/layers/within` | `longitude`, `latitude`, `distance` | layers within `distance` meters |
//! | `/layers/{id}` | | one `Feature` |

use geojson::FeatureCollection;
use log::error;
use serde::Serialize;
use serde_json::json;

use crate::json::JsonValue;
use crate::layer::{self, Layer};
use crate::{Error, LayerId, LayerService};

/// A status code and a JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: u16,
    pub body: JsonValue,
}

impl Response {
    fn ok(body: JsonValue) -> Self {
        Response { status: 200, body }
    }

    fn error(status: u16, error: &str, message: String) -> Self {
        Response {
            status,
            body: json!({ "error": error, "message": message }),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Read API over a [`LayerService`].
pub struct LayerApi<'a> {
    service: &'a LayerService,
}

impl<'a> LayerApi<'a> {
    pub fn new(service: &'a LayerService) -> Self {
        LayerApi { service }
    }

    /// Answer a `GET` for `path` with already-decoded query pairs.
    pub fn get(&self, path: &str, query: &[(&str, &str)]) -> Response {
        let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
        let result = match segments.as_slice() {
            ["layers"] => self.index(),
            ["layers", "contains"] => self.contains(query),
            ["layers", "within"] => self.within(query),
            ["layers", id] => self.show(id),
            _ => {
                return Response::error(404, "not found", format!("no route for {}", path));
            }
        };
        result.unwrap_or_else(into_response)
    }

    fn index(&self) -> Result<Response, Error> {
        to_response(&self.service.feature_collection()?)
    }

    fn show(&self, id: &str) -> Result<Response, Error> {
        let layer = match id.parse::<LayerId>() {
            Ok(id) => self.service.find(id)?,
            Err(_) => {
                return Ok(Response::error(
                    404,
                    "layer not found",
                    format!("no layer with id {}", id),
                ))
            }
        };
        to_response(&layer.to_feature())
    }

    fn contains(&self, query: &[(&str, &str)]) -> Result<Response, Error> {
        let [longitude, latitude] = numbers(query, ["longitude", "latitude"])?;
        let layers = self
            .service
            .repository()
            .find_containing_point(longitude, latitude)?;
        collection(&layers)
    }

    fn within(&self, query: &[(&str, &str)]) -> Result<Response, Error> {
        let [longitude, latitude, distance] =
            numbers(query, ["longitude", "latitude", "distance"])?;
        let layers = self
            .service
            .repository()
            .find_within_distance(longitude, latitude, distance)?;
        collection(&layers)
    }
}

fn collection(layers: &[Layer]) -> Result<Response, Error> {
    let collection: FeatureCollection = layer::feature_collection(layers);
    to_response(&collection)
}

fn to_response<T: Serialize>(body: &T) -> Result<Response, Error> {
    serde_json::to_value(body)
        .map(Response::ok)
        .map_err(Error::Serialization)
}

/// Read every named parameter as a finite number.
///
/// Absent and blank parameters are reported together; the first value that
/// does not parse is reported alone.
fn numbers<const N: usize>(
    query: &[(&str, &str)],
    names: [&'static str; N],
) -> Result<[f64; N], Error> {
    let lookup = |name: &str| {
        query
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.trim())
            .filter(|value| !value.is_empty())
    };
    if names.iter().any(|name| lookup(*name).is_none()) {
        return Err(Error::MissingParameter(names.to_vec()));
    }
    let mut values = [0.0; N];
    for (value, name) in values.iter_mut().zip(names.iter()) {
        *value = lookup(*name)
            .and_then(|v| v.parse::<f64>().ok())
            .filter(|v| v.is_finite())
            .ok_or(Error::InvalidParameter(*name))?;
    }
    Ok(values)
}

fn into_response(e: Error) -> Response {
    match e {
        Error::MissingParameter(names) => Response::error(
            400,
            "invalid parameters",
            format!("the {} parameters are required", join_names(&names)),
        ),
        Error::InvalidParameter(name) => Response::error(
            400,
            "invalid parameters",
            format!("the {} parameter must be a finite number", name),
        ),
        Error::NotFound(id) => {
            Response::error(404, "layer not found", format!("no layer with id {}", id))
        }
        e => {
            error!("read API request failed: {}", e);
            Response::error(
                500,
                "internal error",
                "the request could not be completed".to_owned(),
            )
        }
    }
}

// "a", "a and b", "a, b and c"
fn join_names(names: &[&str]) -> String {
    match names.split_last() {
        Some((last, rest)) if !rest.is_empty() => format!("{} and {}", rest.join(", "), last),
        Some((last, _)) => (*last).to_owned(),
        None => String::new(),
    }
}
