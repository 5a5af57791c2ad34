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

use geojson::{FeatureCollection, Geometry};
use log::{debug, info};

use crate::config::MAX_NAME_CHARS;
use crate::json::JsonValue;
use crate::{
    normalize, Config, Document, Error, Layer, LayerChanges, LayerId, LayerRepository, Page,
    PageRequest, ValidationErrors,
};

pub(crate) const NAME_FIELD: &str = "name";
pub(crate) const GEOJSON_FIELD: &str = "geojson";

const MALFORMED_JSON: &str = "the file does not contain valid JSON";

/// Business rules around the repository: input checks, the upload
/// pipeline and the audit log.
pub struct LayerService {
    repository: LayerRepository,
    config: Config,
}

impl LayerService {
    pub fn new(repository: LayerRepository, config: Config) -> Self {
        LayerService { repository, config }
    }

    pub fn repository(&self) -> &LayerRepository {
        &self.repository
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Page `page` of a listing at the configured page size.
    pub fn page(&self, page: u32) -> PageRequest {
        PageRequest::new(page, self.config.page_size())
    }

    /// Parse, validate and store an uploaded GeoJSON document as a new layer.
    pub fn create_from_geojson(&mut self, name: &str, upload: &[u8]) -> Result<Layer, Error> {
        let mut errors = ValidationErrors::new();
        let name = check_name(name, &mut errors);
        self.check_size(upload, &mut errors);
        errors.into_result()?;

        let geometry = self.parse_upload(upload)?;
        let layer = self
            .repository
            .create(name, &geometry)
            .map_err(into_validation)?;

        info!(
            "layer created: layer_id={} name={:?} file_size={}",
            layer.id(),
            layer.name(),
            upload.len()
        );
        Ok(layer)
    }

    /// Rename layer `id`, replacing its geometry when `upload` is given.
    ///
    /// Returns the record as re-read from the store.
    pub fn update(&mut self, id: LayerId, name: &str, upload: Option<&[u8]>) -> Result<Layer, Error> {
        let layer = self.repository.find_by_id_or_fail(id)?;

        let mut errors = ValidationErrors::new();
        let name = check_name(name, &mut errors);
        if let Some(upload) = upload {
            self.check_size(upload, &mut errors);
        }
        errors.into_result()?;

        let geometry = upload.map(|u| self.parse_upload(u)).transpose()?;
        let mut changes = LayerChanges::new().name(name);
        if let Some(ref geometry) = geometry {
            changes = changes.geometry(geometry);
        }
        if !self
            .repository
            .update(&layer, changes)
            .map_err(into_validation)?
        {
            return Err(Error::NotFound(id));
        }

        info!(
            "layer updated: layer_id={} name={:?} file_size={}",
            id,
            name,
            upload.map_or(0, <[u8]>::len)
        );
        self.repository.find_by_id_or_fail(id)
    }

    pub fn delete(&mut self, id: LayerId) -> Result<bool, Error> {
        let layer = self.repository.find_by_id_or_fail(id)?;
        let deleted = self.repository.delete(&layer)?;
        info!("layer deleted: layer_id={} name={:?}", id, layer.name());
        Ok(deleted)
    }

    /// Name search for a non-blank `term`, otherwise the plain listing.
    pub fn search(&self, term: Option<&str>, request: PageRequest) -> Result<Page<Layer>, Error> {
        match term.map(str::trim).filter(|t| !t.is_empty()) {
            Some(term) => self.repository.search_by_name(term, request),
            None => self.repository.paginate(request),
        }
    }

    pub fn find(&self, id: LayerId) -> Result<Layer, Error> {
        self.repository.find_by_id_or_fail(id)
    }

    pub fn feature_collection(&self) -> Result<FeatureCollection, Error> {
        self.repository.feature_collection()
    }

    fn check_size(&self, upload: &[u8], errors: &mut ValidationErrors) {
        let max = self.config.max_upload_bytes();
        if upload.len() > max {
            errors.add(
                GEOJSON_FIELD,
                format!("the file may not be larger than {} bytes", max),
            );
        }
    }

    fn parse_upload(&self, upload: &[u8]) -> Result<Geometry, Error> {
        let value: JsonValue = serde_json::from_slice(upload)
            .map_err(|_| Error::Validation(ValidationErrors::single(GEOJSON_FIELD, MALFORMED_JSON)))?;
        let document = Document::from_json_value(value).map_err(into_validation)?;
        document
            .ensure_srid(self.config.srid())
            .map_err(into_validation)?;
        debug!("accepted {} upload of {} bytes", document.type_name(), upload.len());
        Ok(normalize(document))
    }
}

pub(crate) fn check_name<'a>(name: &'a str, errors: &mut ValidationErrors) -> &'a str {
    let name = name.trim();
    if name.is_empty() {
        errors.add(NAME_FIELD, "the layer name is required");
    } else if name.chars().count() > MAX_NAME_CHARS {
        errors.add(
            NAME_FIELD,
            format!("the name may not be longer than {} characters", MAX_NAME_CHARS),
        );
    }
    name
}

// Upload problems are reported against the `geojson` field.
fn into_validation(e: Error) -> Error {
    match e {
        Error::MalformedJson(_) => {
            Error::Validation(ValidationErrors::single(GEOJSON_FIELD, MALFORMED_JSON))
        }
        Error::InvalidGeoJson(reason) => {
            Error::Validation(ValidationErrors::single(GEOJSON_FIELD, reason.to_string()))
        }
        Error::InvalidGeometry(_) | Error::SridMismatch { .. } => {
            Error::Validation(ValidationErrors::single(GEOJSON_FIELD, e.to_string()))
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SpatialStore;
    use geojson::Value;

    fn service_with(config: Config) -> LayerService {
        let store = SpatialStore::open_in_memory(config.srid()).unwrap();
        LayerService::new(LayerRepository::new(store), config)
    }

    fn service() -> LayerService {
        service_with(Config::default())
    }

    fn validation(result: Result<Layer, Error>) -> ValidationErrors {
        match result {
            Err(Error::Validation(errors)) => errors,
            other => panic!("expected validation errors, got {:?}", other),
        }
    }

    const POINT: &[u8] = br#"{"type":"Point","coordinates":[-46.6333,-23.5505]}"#;

    #[test]
    fn feature_collection_upload_is_stored_as_geometry_collection() {
        let mut service = service();
        let upload = br#"{
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature", "properties": {}, "geometry": {"type": "Point", "coordinates": [1.0, 2.0]}},
                {"type": "Feature", "properties": {}, "geometry": null},
                {"type": "Feature", "properties": {}, "geometry": {"type": "LineString", "coordinates": [[0.0, 0.0], [1.0, 1.0]]}},
                {"type": "Feature", "properties": {}, "geometry": {"type": "Point", "coordinates": [3.0, 4.0]}}
            ]
        }"#;
        let layer = service.create_from_geojson("mixed", upload).unwrap();

        let stored = service.find(layer.id()).unwrap();
        match stored.geometry().value {
            Value::GeometryCollection(ref members) => {
                assert_eq!(members.len(), 3);
                assert_eq!(members[0].value, Value::Point(vec![1.0, 2.0]));
                assert_eq!(
                    members[1].value,
                    Value::LineString(vec![vec![0.0, 0.0], vec![1.0, 1.0]])
                );
                assert_eq!(members[2].value, Value::Point(vec![3.0, 4.0]));
            }
            ref other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn feature_upload_stores_its_geometry() {
        let mut service = service();
        let upload = br#"{"type":"Feature","properties":{"x":1},"geometry":{"type":"Point","coordinates":[5.0,6.0]}}"#;
        let layer = service.create_from_geojson("  padded  ", upload).unwrap();
        assert_eq!(layer.name(), "padded");
        assert_eq!(layer.geometry().value, Value::Point(vec![5.0, 6.0]));
    }

    #[test]
    fn name_is_checked() {
        let mut service = service();
        let errors = validation(service.create_from_geojson("   ", POINT));
        assert_eq!(errors.first("name"), Some("the layer name is required"));

        let long = "x".repeat(101);
        let errors = validation(service.create_from_geojson(&long, POINT));
        assert_eq!(
            errors.first("name"),
            Some("the name may not be longer than 100 characters")
        );

        let exact = "é".repeat(100);
        assert!(service.create_from_geojson(&exact, POINT).is_ok());
    }

    #[test]
    fn upload_size_is_checked() {
        let mut service = service_with(Config::default().with_max_upload_bytes(16));
        let errors = validation(service.create_from_geojson("", POINT));
        assert_eq!(errors.fields().collect::<Vec<_>>(), vec!["name", "geojson"]);
        assert_eq!(service.repository().count().unwrap(), 0);
    }

    #[test]
    fn upload_errors_are_reported_on_the_geojson_field() {
        let mut service = service();
        let cases: [(&[u8], &str); 7] = [
            (b"{not json", MALFORMED_JSON),
            (br#"{"coordinates":[1,2]}"#, "missing type"),
            (br#"{"type":"Circle"}"#, "unrecognized type: Circle"),
            (br#"{"type":"Feature","properties":{}}"#, "Feature missing geometry"),
            (br#"{"type":"Polygon"}"#, "geometry missing coordinates"),
            (
                br#"{"type":"Point","coordinates":[1.0,2.0,760.0]}"#,
                "malformed geometry: position [1.0, 2.0, 760.0] has more than two elements",
            ),
            (
                br#"{"type":"Polygon","coordinates":[[[0,0],[1,0],[1,1],[0,1]]]}"#,
                "malformed geometry: linear ring is not closed",
            ),
        ];
        for (upload, message) in cases.iter() {
            let errors = validation(service.create_from_geojson("layer", upload));
            assert_eq!(errors.first("geojson"), Some(*message));
        }
        assert_eq!(service.repository().count().unwrap(), 0);
    }

    #[test]
    fn foreign_crs_is_rejected() {
        let mut service = service();
        let upload = br#"{
            "type": "Point",
            "coordinates": [500000.0, 4649776.0],
            "crs": {"type": "name", "properties": {"name": "EPSG:32633"}}
        }"#;
        let errors = validation(service.create_from_geojson("utm", upload));
        assert!(errors.first("geojson").unwrap().starts_with("unsupported crs"));

        let upload = br#"{
            "type": "Point",
            "coordinates": [1.0, 2.0],
            "crs": {"type": "name", "properties": {"name": "urn:ogc:def:crs:OGC:1.3:CRS84"}}
        }"#;
        assert!(service.create_from_geojson("wgs84", upload).is_ok());
    }

    #[test]
    fn update_renames_and_replaces_geometry() {
        let mut service = service();
        let layer = service.create_from_geojson("before", POINT).unwrap();

        let renamed = service.update(layer.id(), "after", None).unwrap();
        assert_eq!(renamed.name(), "after");
        assert_eq!(renamed.geometry(), layer.geometry());

        let upload: &[u8] = br#"{"type":"Feature","geometry":{"type":"Point","coordinates":[7.0,8.0]}}"#;
        let moved = service.update(layer.id(), "after", Some(upload)).unwrap();
        assert_eq!(moved.geometry().value, Value::Point(vec![7.0, 8.0]));
        assert_eq!(moved.created_at(), layer.created_at());
    }

    #[test]
    fn update_checks_inputs() {
        let mut service = service();
        let layer = service.create_from_geojson("kept", POINT).unwrap();

        let errors = validation(service.update(layer.id(), "", Some(&b"[]"[..])));
        assert_eq!(errors.first("name"), Some("the layer name is required"));

        let errors = validation(service.update(layer.id(), "x", Some(&b"[]"[..])));
        assert_eq!(errors.first("geojson"), Some("not a JSON object"));

        assert_eq!(service.find(layer.id()).unwrap().name(), "kept");
        assert!(matches!(
            service.update(LayerId(404), "x", None),
            Err(Error::NotFound(LayerId(404)))
        ));
    }

    #[test]
    fn deleting_a_missing_id_is_not_found() {
        let mut service = service();
        let layer = service.create_from_geojson("only", POINT).unwrap();

        assert!(matches!(
            service.delete(LayerId(layer.id().0 + 1)),
            Err(Error::NotFound(_))
        ));
        assert_eq!(service.repository().count().unwrap(), 1);

        assert!(service.delete(layer.id()).unwrap());
        assert_eq!(service.repository().count().unwrap(), 0);
    }

    #[test]
    fn blank_search_lists_everything() {
        let mut service = service();
        service.create_from_geojson("Rios", POINT).unwrap();
        service.create_from_geojson("Parques", POINT).unwrap();

        let page = service.search(Some("  "), service.page(1)).unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.per_page, 15);

        let page = service.search(Some("rio"), service.page(1)).unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].name(), "Rios");

        let page = service.search(None, service.page(1)).unwrap();
        assert_eq!(page.items[0].name(), "Parques");
    }

    #[test]
    fn feature_collection_lists_layers() {
        let mut service = service();
        service.create_from_geojson("a", POINT).unwrap();
        assert_eq!(service.feature_collection().unwrap().features.len(), 1);
    }
}
