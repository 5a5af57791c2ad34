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

use std::collections::BTreeMap;
use std::fmt;

use crate::layer::LayerId;

/// Why a document was rejected as GeoJSON.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum InvalidGeoJson {
    NotAnObject,
    MissingType,
    UnrecognizedType(String),
    FeatureMissingGeometry,
    MissingCoordinates,
    UnsupportedCrs(String),
    Malformed(String),
}

impl fmt::Display for InvalidGeoJson {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            InvalidGeoJson::NotAnObject => write!(f, "not a JSON object"),
            InvalidGeoJson::MissingType => write!(f, "missing type"),
            InvalidGeoJson::UnrecognizedType(ref ty) => write!(f, "unrecognized type: {}", ty),
            InvalidGeoJson::FeatureMissingGeometry => write!(f, "Feature missing geometry"),
            InvalidGeoJson::MissingCoordinates => write!(f, "geometry missing coordinates"),
            InvalidGeoJson::UnsupportedCrs(ref name) => write!(f, "unsupported crs: {}", name),
            InvalidGeoJson::Malformed(ref detail) => write!(f, "malformed geometry: {}", detail),
        }
    }
}

/// Field-level validation messages, keyed by input name.
///
/// Keys keep their first-seen order so a form can show them in the order
/// the checks ran.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    order: Vec<&'static str>,
    messages: BTreeMap<&'static str, Vec<String>>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: &'static str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        if !self.messages.contains_key(field) {
            self.order.push(field);
        }
        self.messages.entry(field).or_default().push(message.into());
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.messages.get(field).map(Vec::as_slice)
    }

    /// First message recorded for `field`.
    pub fn first(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(|m| m.first()).map(String::as_str)
    }

    pub fn fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.order.iter().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// `Ok(())` when nothing was recorded, otherwise `Error::Validation`.
    pub fn into_result(self) -> Result<(), Error> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation(self))
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut first = true;
        for field in &self.order {
            for message in &self.messages[field] {
                if !first {
                    f.write_str("; ")?;
                }
                write!(f, "{}: {}", field, message)?;
                first = false;
            }
        }
        Ok(())
    }
}

#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    MalformedJson(String),
    InvalidGeoJson(InvalidGeoJson),
    InvalidGeometry(String),
    SridMismatch { expected: i32, found: i32 },
    Validation(ValidationErrors),
    NotFound(LayerId),
    MissingParameter(Vec<&'static str>),
    InvalidParameter(&'static str),
    Database(rusqlite::Error),
    /// A response body could not be serialized.
    Serialization(serde_json::Error),
}

impl Error {
    /// Whether the caller can recover by correcting its input.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::Validation(..)
                | Error::MalformedJson(..)
                | Error::InvalidGeoJson(..)
                | Error::InvalidGeometry(..)
                | Error::SridMismatch { .. }
                | Error::MissingParameter(..)
                | Error::InvalidParameter(..)
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::MalformedJson(ref detail) => write!(f, "Encountered malformed JSON: {}", detail),
            Error::InvalidGeoJson(ref reason) => write!(f, "Invalid GeoJSON: {}", reason),
            Error::InvalidGeometry(ref detail) => write!(f, "Invalid geometry: {}", detail),
            Error::SridMismatch { expected, found } => write!(
                f,
                "Expected geometry in SRID {}, found SRID {}",
                expected, found
            ),
            Error::Validation(ref errors) => write!(f, "Validation failed: {}", errors),
            Error::NotFound(id) => write!(f, "No layer with id {}", id),
            Error::MissingParameter(ref names) => {
                write!(f, "Missing required parameters: {}", names.join(", "))
            }
            Error::InvalidParameter(name) => {
                write!(f, "The {} parameter must be a finite number", name)
            }
            Error::Database(ref e) => write!(f, "Database error: {}", e),
            Error::Serialization(ref e) => write!(f, "Could not serialize response: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match *self {
            Error::Database(ref e) => Some(e),
            Error::Serialization(ref e) => Some(e),
            _ => None,
        }
    }
}

impl From<InvalidGeoJson> for Error {
    fn from(reason: InvalidGeoJson) -> Self {
        Error::InvalidGeoJson(reason)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        Error::Database(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reasons_read_as_documented() {
        assert_eq!(InvalidGeoJson::NotAnObject.to_string(), "not a JSON object");
        assert_eq!(InvalidGeoJson::MissingType.to_string(), "missing type");
        assert_eq!(
            InvalidGeoJson::UnrecognizedType("Triangle".into()).to_string(),
            "unrecognized type: Triangle"
        );
        assert_eq!(
            InvalidGeoJson::FeatureMissingGeometry.to_string(),
            "Feature missing geometry"
        );
        assert_eq!(
            InvalidGeoJson::MissingCoordinates.to_string(),
            "geometry missing coordinates"
        );
    }

    #[test]
    fn validation_errors_keep_field_order() {
        let mut errors = ValidationErrors::new();
        errors.add("name", "the name is required");
        errors.add("geojson", "missing type");
        errors.add("name", "second");

        assert_eq!(errors.fields().collect::<Vec<_>>(), vec!["name", "geojson"]);
        assert_eq!(errors.first("geojson"), Some("missing type"));
        assert_eq!(errors.get("name").map(|m| m.len()), Some(2));
        assert_eq!(
            errors.to_string(),
            "name: the name is required; name: second; geojson: missing type"
        );
    }

    #[test]
    fn input_errors_are_recoverable() {
        assert!(Error::InvalidGeometry("x".into()).is_recoverable());
        assert!(Error::MissingParameter(vec!["latitude"]).is_recoverable());
        assert!(!Error::NotFound(LayerId(1)).is_recoverable());
        assert!(!Error::Database(rusqlite::Error::QueryReturnedNoRows).is_recoverable());
    }

    #[test]
    fn empty_validation_errors_are_ok() {
        assert!(ValidationErrors::new().into_result().is_ok());
        match ValidationErrors::single("geojson", "x").into_result() {
            Err(Error::Validation(errors)) => assert_eq!(errors.first("geojson"), Some("x")),
            other => panic!("unexpected {:?}", other),
        }
    }
}
