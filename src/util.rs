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

use geojson::{Geometry, Position, Value};

use crate::json::{JsonObject, JsonValue};
use crate::{InvalidGeoJson, WGS84_SRID};

pub fn expect_object(value: JsonValue) -> Result<JsonObject, InvalidGeoJson> {
    match value {
        JsonValue::Object(o) => Ok(o),
        _ => Err(InvalidGeoJson::NotAnObject),
    }
}

pub fn expect_type(object: &JsonObject) -> Result<&str, InvalidGeoJson> {
    match object.get("type") {
        Some(JsonValue::String(s)) => Ok(s),
        _ => Err(InvalidGeoJson::MissingType),
    }
}

/// A member that is absent or `null` counts as missing.
pub fn has_member(object: &JsonObject, name: &str) -> bool {
    !matches!(object.get(name), None | Some(JsonValue::Null))
}

/// Take a non-null member out of `object`.
pub fn take_member(object: &mut JsonObject, name: &str) -> Option<JsonValue> {
    match object.remove(name) {
        Some(JsonValue::Null) | None => None,
        Some(v) => Some(v),
    }
}

/// Retrieve the 'properties' member of a Feature if any.
pub fn get_properties(object: &mut JsonObject) -> Option<JsonObject> {
    match object.remove("properties") {
        Some(JsonValue::Object(properties)) => Some(properties),
        _ => None,
    }
}

/// Retrieve the 'features' member of a FeatureCollection.
///
/// A missing member is an empty collection.
pub fn get_features(object: &mut JsonObject) -> Result<Vec<JsonValue>, InvalidGeoJson> {
    match object.remove("features") {
        Some(JsonValue::Array(features)) => Ok(features),
        Some(JsonValue::Null) | None => Ok(Vec::new()),
        Some(_) => Err(InvalidGeoJson::Malformed(
            "'features' must be an array".to_owned(),
        )),
    }
}

/// Retrieve the SRID named by a legacy 'crs' member, if one is declared.
///
/// Accepts named CRS objects (`EPSG:4326`, `urn:ogc:def:crs:EPSG::4326`,
/// the OGC `CRS84` URNs) and the older `{"type":"EPSG","properties":{"code":..}}`
/// form.
pub fn get_crs(object: &JsonObject) -> Result<Option<i32>, InvalidGeoJson> {
    let crs = match object.get("crs") {
        Some(JsonValue::Null) | None => return Ok(None),
        Some(crs) => crs,
    };
    let properties = crs.get("properties");
    if let Some(code) = properties.and_then(|p| p.get("code")).and_then(JsonValue::as_i64) {
        return i32::try_from(code)
            .map(Some)
            .map_err(|_| InvalidGeoJson::UnsupportedCrs(code.to_string()));
    }
    let name = match properties.and_then(|p| p.get("name")).and_then(JsonValue::as_str) {
        Some(name) => name,
        None => return Err(InvalidGeoJson::UnsupportedCrs(crs.to_string())),
    };
    parse_crs_name(name)
        .map(Some)
        .ok_or_else(|| InvalidGeoJson::UnsupportedCrs(name.to_owned()))
}

fn parse_crs_name(name: &str) -> Option<i32> {
    if name.ends_with("CRS84") {
        return Some(WGS84_SRID);
    }
    let upper = name.to_ascii_uppercase();
    if !upper.contains("EPSG") {
        return None;
    }
    name.rsplit(':').next().and_then(|code| code.trim().parse().ok())
}

/// Decode a geometry body with the `geojson` crate.
pub fn decode_geometry(value: JsonValue) -> Result<Geometry, InvalidGeoJson> {
    let geometry = Geometry::from_json_value(value)
        .map_err(|e| InvalidGeoJson::Malformed(e.to_string()))?;
    check_positions(&geometry.value)?;
    Ok(geometry)
}

pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Point(..) => "Point",
        Value::MultiPoint(..) => "MultiPoint",
        Value::LineString(..) => "LineString",
        Value::MultiLineString(..) => "MultiLineString",
        Value::Polygon(..) => "Polygon",
        Value::MultiPolygon(..) => "MultiPolygon",
        Value::GeometryCollection(..) => "GeometryCollection",
    }
}

/// Positions are exactly `[longitude, latitude]`, line strings have two or
/// more of them and polygons have at least one closed ring of four or more.
pub fn check_positions(value: &Value) -> Result<(), InvalidGeoJson> {
    fn check(position: &Position) -> Result<(), InvalidGeoJson> {
        match position.len() {
            2 => Ok(()),
            n if n < 2 => Err(InvalidGeoJson::Malformed(format!(
                "position {:?} has fewer than two elements",
                position
            ))),
            _ => Err(InvalidGeoJson::Malformed(format!(
                "position {:?} has more than two elements",
                position
            ))),
        }
    }

    fn line(positions: &[Position]) -> Result<(), InvalidGeoJson> {
        if positions.len() < 2 {
            return Err(InvalidGeoJson::Malformed(
                "line string has fewer than two positions".to_owned(),
            ));
        }
        positions.iter().try_for_each(check)
    }

    fn polygon(rings: &[Vec<Position>]) -> Result<(), InvalidGeoJson> {
        if rings.is_empty() {
            return Err(InvalidGeoJson::Malformed("polygon has no rings".to_owned()));
        }
        for ring in rings {
            if ring.len() < 4 {
                return Err(InvalidGeoJson::Malformed(
                    "linear ring has fewer than four positions".to_owned(),
                ));
            }
            ring.iter().try_for_each(check)?;
            if ring.first() != ring.last() {
                return Err(InvalidGeoJson::Malformed(
                    "linear ring is not closed".to_owned(),
                ));
            }
        }
        Ok(())
    }

    match value {
        Value::Point(p) => check(p),
        Value::MultiPoint(ps) => ps.iter().try_for_each(check),
        Value::LineString(ps) => line(ps),
        Value::MultiLineString(lines) => lines.iter().try_for_each(|l| line(l)),
        Value::Polygon(rings) => polygon(rings),
        Value::MultiPolygon(polygons) => polygons.iter().try_for_each(|p| polygon(p)),
        Value::GeometryCollection(geometries) => geometries
            .iter()
            .try_for_each(|g| check_positions(&g.value)),
    }
}
