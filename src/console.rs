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

//! Administrative list, create, edit and delete flows.
//!
//! Each action returns an [`Outcome`] for the caller to render: a redirect
//! with a flash message, the form again with its errors, or a failure page.

use std::path::Path;

use log::error;

use crate::service::{self, GEOJSON_FIELD};
use crate::{Error, Layer, LayerId, LayerService, Page, PageRequest, ValidationErrors};

const EXTENSIONS: [&str; 2] = ["json", "geojson"];

/// An uploaded file.
#[derive(Debug, Clone, Copy)]
pub struct Upload<'a> {
    pub file_name: &'a str,
    pub bytes: &'a [u8],
}

/// The layer form as submitted.
#[derive(Debug, Clone, Copy)]
pub struct LayerForm<'a> {
    pub name: &'a str,
    pub upload: Option<Upload<'a>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Back to the listing with a flash message.
    Redirect(String),
    /// The form again, with its errors.
    Invalid(ValidationErrors),
    NotFound,
    /// Unexpected failure; the message carries no internal detail.
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListView {
    pub layers: Page<Layer>,
    pub search: Option<String>,
}

pub struct Console<'a> {
    service: &'a mut LayerService,
}

impl<'a> Console<'a> {
    pub fn new(service: &'a mut LayerService) -> Self {
        Console { service }
    }

    pub fn index(&self, search: Option<&str>, page: u32) -> Result<ListView, Error> {
        let request = PageRequest::new(page, self.service.config().console_page_size());
        let layers = self.service.search(search, request)?;
        Ok(ListView {
            layers,
            search: search.map(str::to_owned),
        })
    }

    pub fn store(&mut self, form: &LayerForm) -> Outcome {
        let mut errors = ValidationErrors::new();
        service::check_name(form.name, &mut errors);
        let upload = check_upload(form.upload, true, &mut errors);
        if !errors.is_empty() {
            return Outcome::Invalid(errors);
        }
        let bytes = upload.map_or(&[][..], |u| u.bytes);
        match self.service.create_from_geojson(form.name, bytes) {
            Ok(layer) => Outcome::Redirect(format!("layer '{}' created", layer.name())),
            Err(e) => failure(e, "could not create the layer"),
        }
    }

    pub fn edit(&self, id: LayerId) -> Result<Layer, Error> {
        self.service.find(id)
    }

    /// Like [`Console::store`], but the upload may be left out to keep the
    /// current geometry.
    pub fn update(&mut self, id: LayerId, form: &LayerForm) -> Outcome {
        let mut errors = ValidationErrors::new();
        service::check_name(form.name, &mut errors);
        let upload = check_upload(form.upload, false, &mut errors);
        if !errors.is_empty() {
            return Outcome::Invalid(errors);
        }
        match self.service.update(id, form.name, upload.map(|u| u.bytes)) {
            Ok(layer) => Outcome::Redirect(format!("layer '{}' updated", layer.name())),
            Err(e) => failure(e, "could not update the layer"),
        }
    }

    pub fn destroy(&mut self, id: LayerId) -> Outcome {
        match self.service.delete(id) {
            Ok(_) => Outcome::Redirect("layer removed".to_owned()),
            Err(e) => failure(e, "could not remove the layer"),
        }
    }
}

fn check_upload<'u>(
    upload: Option<Upload<'u>>,
    required: bool,
    errors: &mut ValidationErrors,
) -> Option<Upload<'u>> {
    let upload = match upload {
        Some(upload) => upload,
        None => {
            if required {
                errors.add(GEOJSON_FIELD, "the GeoJSON file is required");
            }
            return None;
        }
    };
    let extension = Path::new(upload.file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match extension {
        Some(ref e) if EXTENSIONS.contains(&e.as_str()) => {}
        _ => errors.add(GEOJSON_FIELD, "the file must be a .json or .geojson file"),
    }
    Some(upload)
}

fn failure(e: Error, message: &str) -> Outcome {
    match e {
        Error::Validation(errors) => Outcome::Invalid(errors),
        Error::NotFound(_) => Outcome::NotFound,
        e if e.is_recoverable() => {
            Outcome::Invalid(ValidationErrors::single(GEOJSON_FIELD, e.to_string()))
        }
        e => {
            error!("{}: {}", message, e);
            Outcome::Failed(message.to_owned())
        }
    }
}
