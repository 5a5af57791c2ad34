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

use std::str::FromStr;

use geojson::Geometry;
use log::debug;

use crate::json::{JsonObject, JsonValue};
use crate::{util, Error, InvalidGeoJson};

/// An uploaded GeoJSON document, decoded into one of the shapes a layer can
/// be built from.
#[derive(Clone, Debug, PartialEq)]
pub enum Document {
    /// One of the six basic geometry kinds, or a GeometryCollection.
    Geometry { geometry: Geometry, srid: Option<i32> },
    Feature {
        geometry: Geometry,
        properties: Option<JsonObject>,
        srid: Option<i32>,
    },
    /// Geometries of the members that carry one, in member order.
    FeatureCollection {
        geometries: Vec<Geometry>,
        skipped: usize,
        srid: Option<i32>,
    },
}

/// Check that `value` is a GeoJSON document a layer can be built from.
pub fn validate(value: &JsonValue) -> Result<(), Error> {
    Document::from_json_value(value.clone()).map(|_| ())
}

impl Document {
    pub fn from_json_value(value: JsonValue) -> Result<Self, Error> {
        let object = util::expect_object(value)?;
        Document::from_json_object(object)
    }

    pub fn from_json_object(mut object: JsonObject) -> Result<Self, Error> {
        let type_ = util::expect_type(&object)?;
        let type_ = Type::from_str(type_)
            .ok_or_else(|| InvalidGeoJson::UnrecognizedType(type_.to_owned()))?;

        match type_ {
            Type::Feature if !util::has_member(&object, "geometry") => {
                return Err(InvalidGeoJson::FeatureMissingGeometry.into())
            }
            t if t.has_coordinates() && !util::has_member(&object, "coordinates") => {
                return Err(InvalidGeoJson::MissingCoordinates.into())
            }
            _ => {}
        }

        let srid = util::get_crs(&object)?;
        let document = match type_ {
            Type::Feature => {
                let geometry = util::take_member(&mut object, "geometry")
                    .ok_or(InvalidGeoJson::FeatureMissingGeometry)?;
                Document::Feature {
                    geometry: util::decode_geometry(geometry)?,
                    properties: util::get_properties(&mut object),
                    srid,
                }
            }
            Type::FeatureCollection => {
                let features = util::get_features(&mut object)?;
                let total = features.len();
                let mut geometries = Vec::with_capacity(total);
                for feature in features {
                    let geometry = match feature {
                        JsonValue::Object(mut feature) => util::take_member(&mut feature, "geometry"),
                        _ => None,
                    };
                    if let Some(geometry) = geometry {
                        geometries.push(util::decode_geometry(geometry)?);
                    }
                }
                let skipped = total - geometries.len();
                if skipped > 0 {
                    debug!("skipped {} of {} features without a geometry", skipped, total);
                }
                Document::FeatureCollection {
                    geometries,
                    skipped,
                    srid,
                }
            }
            _ => Document::Geometry {
                geometry: util::decode_geometry(JsonValue::Object(object))?,
                srid,
            },
        };
        Ok(document)
    }

    /// SRID declared by the document's `crs` member, if any.
    pub fn srid(&self) -> Option<i32> {
        match *self {
            Document::Geometry { srid, .. }
            | Document::Feature { srid, .. }
            | Document::FeatureCollection { srid, .. } => srid,
        }
    }

    /// Reject a document that declares a CRS other than `srid`.
    ///
    /// Documents without a declared CRS are taken to be in `srid`.
    pub fn ensure_srid(&self, srid: i32) -> Result<(), Error> {
        match self.srid() {
            Some(declared) if declared != srid => Err(InvalidGeoJson::UnsupportedCrs(format!(
                "EPSG:{} (expected EPSG:{})",
                declared, srid
            ))
            .into()),
            _ => Ok(()),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match *self {
            Document::Geometry { ref geometry, .. } => util::type_name(&geometry.value),
            Document::Feature { .. } => "Feature",
            Document::FeatureCollection { .. } => "FeatureCollection",
        }
    }
}

#[derive(PartialEq, Clone, Copy, Debug)]
enum Type {
    Point,
    LineString,
    Polygon,
    MultiPoint,
    MultiLineString,
    MultiPolygon,
    GeometryCollection,
    Feature,
    FeatureCollection,
}

impl Type {
    fn from_str(s: &str) -> Option<Self> {
        match s {
            "Point" => Some(Type::Point),
            "LineString" => Some(Type::LineString),
            "Polygon" => Some(Type::Polygon),
            "MultiPoint" => Some(Type::MultiPoint),
            "MultiLineString" => Some(Type::MultiLineString),
            "MultiPolygon" => Some(Type::MultiPolygon),
            "GeometryCollection" => Some(Type::GeometryCollection),
            "Feature" => Some(Type::Feature),
            "FeatureCollection" => Some(Type::FeatureCollection),
            _ => None,
        }
    }

    /// The six basic kinds carry a 'coordinates' member.
    fn has_coordinates(self) -> bool {
        !matches!(
            self,
            Type::GeometryCollection | Type::Feature | Type::FeatureCollection
        )
    }
}

impl FromStr for Document {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: JsonValue =
            serde_json::from_str(s).map_err(|e| Error::MalformedJson(e.to_string()))?;
        Document::from_json_value(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geojson::Value;
    use serde_json::json;

    fn reason(value: JsonValue) -> InvalidGeoJson {
        match Document::from_json_value(value) {
            Err(Error::InvalidGeoJson(reason)) => reason,
            other => panic!("expected invalid GeoJSON, got {:?}", other),
        }
    }

    #[test]
    fn rejects_non_objects() {
        assert_eq!(reason(json!([1, 2])), InvalidGeoJson::NotAnObject);
        assert_eq!(reason(json!("Point")), InvalidGeoJson::NotAnObject);
        assert_eq!(reason(JsonValue::Null), InvalidGeoJson::NotAnObject);
    }

    #[test]
    fn rejects_missing_type() {
        assert_eq!(reason(json!({})), InvalidGeoJson::MissingType);
        assert_eq!(reason(json!({"type": 7})), InvalidGeoJson::MissingType);
    }

    #[test]
    fn rejects_unrecognized_type() {
        assert_eq!(
            reason(json!({"type": "Triangle"})),
            InvalidGeoJson::UnrecognizedType("Triangle".to_owned())
        );
        assert_eq!(
            reason(json!({"type": "Triangle"})).to_string(),
            "unrecognized type: Triangle"
        );
    }

    #[test]
    fn rejects_feature_without_geometry() {
        assert_eq!(reason(json!({"type": "Feature"})), InvalidGeoJson::FeatureMissingGeometry);
        assert_eq!(
            reason(json!({"type": "Feature", "geometry": null, "properties": {}})),
            InvalidGeoJson::FeatureMissingGeometry
        );
    }

    #[test]
    fn rejects_geometry_without_coordinates() {
        assert_eq!(reason(json!({"type": "Point"})), InvalidGeoJson::MissingCoordinates);
        assert_eq!(
            reason(json!({"type": "MultiPolygon", "bbox": [0, 0, 1, 1]})),
            InvalidGeoJson::MissingCoordinates
        );
    }

    #[test]
    fn first_failure_wins() {
        // A Feature is checked for 'geometry', never for 'coordinates'.
        assert_eq!(
            reason(json!({"type": "Feature", "coordinates": [1, 2]})),
            InvalidGeoJson::FeatureMissingGeometry
        );
    }

    #[test]
    fn feature_geometry_must_be_a_geometry() {
        assert!(matches!(
            reason(json!({"type": "Feature", "geometry": {"type": "Feature", "geometry": null}})),
            InvalidGeoJson::Malformed(_)
        ));
        assert!(matches!(
            reason(json!({"type": "Feature", "geometry": "POINT(1 2)"})),
            InvalidGeoJson::Malformed(_)
        ));
    }

    #[test]
    fn decodes_feature_collection() {
        let doc: Document = r#"{"type":"FeatureCollection","features":[
            {"type":"Feature","properties":{},"geometry":{"type":"Point","coordinates":[1.0,2.0]}},
            {"type":"Feature","properties":{"a":1}},
            {"type":"Feature","geometry":null},
            {"type":"Feature","geometry":{"type":"LineString","coordinates":[[0.0,0.0],[1.0,1.0]]}}
        ]}"#
        .parse()
        .unwrap();

        match doc {
            Document::FeatureCollection {
                geometries, skipped, ..
            } => {
                assert_eq!(skipped, 2);
                assert_eq!(geometries.len(), 2);
                assert_eq!(geometries[0].value, Value::Point(vec![1.0, 2.0]));
                assert_eq!(util::type_name(&geometries[1].value), "LineString");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn feature_collection_without_features_is_empty() {
        let doc = Document::from_json_value(json!({"type": "FeatureCollection"})).unwrap();
        assert_eq!(
            doc,
            Document::FeatureCollection {
                geometries: vec![],
                skipped: 0,
                srid: None
            }
        );
    }

    #[test]
    fn keeps_feature_properties() {
        let doc = Document::from_json_value(json!({
            "type": "Feature",
            "properties": {"name": "park"},
            "geometry": {"type": "Point", "coordinates": [1.0, 2.0]}
        }))
        .unwrap();
        match doc {
            Document::Feature { properties, .. } => {
                assert_eq!(properties.unwrap()["name"], json!("park"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn malformed_text_is_malformed_json() {
        assert!(matches!("{\"type\":".parse::<Document>(), Err(Error::MalformedJson(_))));
    }

    #[test]
    fn declared_crs_is_checked() {
        let doc = Document::from_json_value(json!({
            "type": "Point",
            "coordinates": [500000.0, 4649776.0],
            "crs": {"type": "name", "properties": {"name": "EPSG:32633"}}
        }))
        .unwrap();
        assert_eq!(doc.srid(), Some(32633));
        assert!(matches!(
            doc.ensure_srid(4326),
            Err(Error::InvalidGeoJson(InvalidGeoJson::UnsupportedCrs(_)))
        ));

        let doc = Document::from_json_value(json!({"type": "Point", "coordinates": [1.0, 2.0]})).unwrap();
        assert!(doc.ensure_srid(4326).is_ok());
    }

    #[test]
    fn type_names() {
        let name = |value: JsonValue| Document::from_json_value(value).unwrap().type_name();
        assert_eq!(name(json!({"type": "MultiPoint", "coordinates": [[1.0, 2.0]]})), "MultiPoint");
        assert_eq!(
            name(json!({"type": "Feature", "geometry": {"type": "Point", "coordinates": [1.0, 2.0]}})),
            "Feature"
        );
        assert_eq!(name(json!({"type": "FeatureCollection", "features": []})), "FeatureCollection");
    }

    #[test]
    fn validate_accepts_every_kind() {
        let documents = [
            json!({"type": "Point", "coordinates": [1.0, 2.0]}),
            json!({"type": "LineString", "coordinates": [[1.0, 2.0], [3.0, 4.0]]}),
            json!({"type": "Polygon", "coordinates": [[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 0.0]]]}),
            json!({"type": "MultiPoint", "coordinates": [[1.0, 2.0]]}),
            json!({"type": "MultiLineString", "coordinates": [[[1.0, 2.0], [3.0, 4.0]]]}),
            json!({"type": "MultiPolygon", "coordinates": [[[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 0.0]]]]}),
            json!({"type": "GeometryCollection", "geometries": []}),
            json!({"type": "Feature", "geometry": {"type": "Point", "coordinates": [1.0, 2.0]}}),
            json!({"type": "FeatureCollection", "features": []}),
        ];
        for document in documents.iter() {
            assert!(validate(document).is_ok(), "{}", document);
        }
    }
}
