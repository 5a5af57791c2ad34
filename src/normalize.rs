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

use geojson::{Geometry, Value};

use crate::Document;

/// Reduce a validated document to the single geometry stored for a layer.
///
/// A `FeatureCollection` becomes a `GeometryCollection` of its members'
/// geometries, a `Feature` yields its geometry, and a bare geometry is
/// returned unchanged.
pub fn normalize(document: Document) -> Geometry {
    match document {
        Document::FeatureCollection { geometries, .. } => {
            Geometry::new(Value::GeometryCollection(geometries))
        }
        Document::Feature { geometry, .. } => geometry,
        Document::Geometry { geometry, .. } => geometry,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::json::JsonValue;
    use serde_json::json;

    fn normalized(value: JsonValue) -> JsonValue {
        let document = Document::from_json_value(value).unwrap();
        serde_json::to_value(normalize(document)).unwrap()
    }

    #[test]
    fn basic_geometries_are_unchanged() {
        let geometries = [
            json!({"type": "Point", "coordinates": [-46.6333, -23.5505]}),
            json!({"type": "LineString", "coordinates": [[0.0, 0.0], [1.0, 1.0]]}),
            json!({"type": "Polygon", "coordinates": [[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 0.0]]]}),
            json!({"type": "MultiPoint", "coordinates": [[0.0, 0.0], [1.0, 1.0]]}),
            json!({"type": "MultiLineString", "coordinates": [[[0.0, 0.0], [1.0, 1.0]]]}),
            json!({"type": "MultiPolygon", "coordinates": [[[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 0.0]]]]}),
            json!({"type": "Point", "coordinates": [1.0, 2.0], "bbox": [1.0, 2.0, 1.0, 2.0]}),
        ];
        for geometry in geometries.iter() {
            assert_eq!(&normalized(geometry.clone()), geometry);
        }
    }

    #[test]
    fn feature_yields_its_geometry() {
        let geometry = json!({"type": "Polygon", "coordinates": [[[0.0, 0.0], [2.0, 0.0], [2.0, 2.0], [0.0, 0.0]]]});
        let feature = json!({
            "type": "Feature",
            "id": 9,
            "properties": {"name": "x"},
            "geometry": geometry.clone()
        });
        assert_eq!(normalized(feature), geometry);
    }

    #[test]
    fn feature_collection_keeps_member_order_and_skips_empty_members() {
        let collection = json!({
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature", "properties": {}, "geometry": {"type": "Point", "coordinates": [3.0, 3.0]}},
                {"type": "Feature", "properties": {}},
                {"type": "Feature", "properties": {}, "geometry": {"type": "Point", "coordinates": [1.0, 1.0]}},
                {"type": "Feature", "properties": {}, "geometry": null},
                {"type": "Feature", "properties": {}, "geometry": {"type": "Point", "coordinates": [2.0, 2.0]}}
            ]
        });
        assert_eq!(
            normalized(collection),
            json!({
                "type": "GeometryCollection",
                "geometries": [
                    {"type": "Point", "coordinates": [3.0, 3.0]},
                    {"type": "Point", "coordinates": [1.0, 1.0]},
                    {"type": "Point", "coordinates": [2.0, 2.0]}
                ]
            })
        );
    }

    #[test]
    fn geometry_collection_is_unchanged() {
        let collection = json!({
            "type": "GeometryCollection",
            "geometries": [
                {"type": "Point", "coordinates": [1.0, 1.0]},
                {"type": "LineString", "coordinates": [[0.0, 0.0], [1.0, 1.0]]}
            ]
        });
        assert_eq!(normalized(collection.clone()), collection);
    }
}
