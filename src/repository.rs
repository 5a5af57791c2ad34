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

use chrono::{DateTime, Utc};
use geojson::FeatureCollection;
use log::debug;
use rusqlite::{params, OptionalExtension, Row};

use crate::layer::{self, Layer, LayerId};
use crate::predicate::{Predicate, INDEX_FILTER};
use crate::store::{self, GeometrySource, SpatialStore, StoredGeometry};
use crate::Error;

const COLUMNS: &str = "l.id, l.name, l.geometry, l.created_at, l.updated_at";
const NEWEST_FIRST: &str = "ORDER BY l.created_at DESC, l.id DESC";

/// A 1-based page of a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub per_page: u32,
}

impl PageRequest {
    /// Zero page numbers and sizes are raised to one.
    pub fn new(page: u32, per_page: u32) -> Self {
        PageRequest {
            page: page.max(1),
            per_page: per_page.max(1),
        }
    }

    pub fn first(per_page: u32) -> Self {
        PageRequest::new(1, per_page)
    }

    fn limit(&self) -> i64 {
        i64::from(self.per_page.max(1))
    }

    fn offset(&self) -> i64 {
        i64::from(self.page.max(1) - 1) * self.limit()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Matching rows across all pages
    pub total: u64,
    pub page: u32,
    pub per_page: u32,
}

impl<T> Page<T> {
    pub fn last_page(&self) -> u32 {
        let per_page = u64::from(self.per_page.max(1));
        let pages = (self.total + per_page - 1) / per_page;
        u32::try_from(pages).unwrap_or(u32::MAX).max(1)
    }

    pub fn has_more_pages(&self) -> bool {
        self.page < self.last_page()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Fields to change on an existing layer. Unset fields are kept.
#[derive(Debug, Clone, Copy, Default)]
pub struct LayerChanges<'a> {
    pub name: Option<&'a str>,
    pub geometry: Option<GeometrySource<'a>>,
}

impl<'a> LayerChanges<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: &'a str) -> Self {
        self.name = Some(name);
        self
    }

    pub fn geometry(mut self, geometry: impl Into<GeometrySource<'a>>) -> Self {
        self.geometry = Some(geometry.into());
        self
    }
}

// A row as read from SQLite, before its geometry is decoded.
struct LayerRow {
    id: i64,
    name: String,
    geometry: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl LayerRow {
    fn read(row: &Row) -> rusqlite::Result<Self> {
        Ok(LayerRow {
            id: row.get(0)?,
            name: row.get(1)?,
            geometry: row.get(2)?,
            created_at: row.get(3)?,
            updated_at: row.get(4)?,
        })
    }

    fn into_layer(self, stored: &StoredGeometry) -> Layer {
        Layer {
            id: LayerId(self.id),
            name: self.name,
            geometry: stored.to_geojson(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    fn decode(self) -> Result<Layer, Error> {
        let stored = StoredGeometry::from_wkt(&self.geometry)?;
        Ok(self.into_layer(&stored))
    }
}

/// Named layers persisted through a [`SpatialStore`].
pub struct LayerRepository {
    store: SpatialStore,
}

impl LayerRepository {
    pub fn new(store: SpatialStore) -> Self {
        LayerRepository { store }
    }

    pub fn store(&self) -> &SpatialStore {
        &self.store
    }

    /// Every layer, newest first.
    pub fn all(&self) -> Result<Vec<Layer>, Error> {
        let sql = format!("SELECT {} FROM layers l {}", COLUMNS, NEWEST_FIRST);
        self.query(&sql, params![])
    }

    pub fn paginate(&self, request: PageRequest) -> Result<Page<Layer>, Error> {
        let sql = format!(
            "SELECT {} FROM layers l {} LIMIT ?1 OFFSET ?2",
            COLUMNS, NEWEST_FIRST
        );
        let items = self.query(&sql, params![request.limit(), request.offset()])?;
        Ok(Page {
            items,
            total: self.count()?,
            page: request.page,
            per_page: request.per_page,
        })
    }

    /// Layers whose name contains `term`, ignoring case.
    pub fn search_by_name(&self, term: &str, request: PageRequest) -> Result<Page<Layer>, Error> {
        let pattern = like_pattern(&term.to_lowercase());
        let sql = format!(
            "SELECT {} FROM layers l WHERE casefold(l.name) LIKE ?1 ESCAPE '\\' {} LIMIT ?2 OFFSET ?3",
            COLUMNS, NEWEST_FIRST
        );
        let items = self.query(&sql, params![pattern, request.limit(), request.offset()])?;
        let total: i64 = self.store.connection().query_row(
            "SELECT COUNT(*) FROM layers l WHERE casefold(l.name) LIKE ?1 ESCAPE '\\'",
            params![pattern],
            |row| row.get(0),
        )?;
        Ok(Page {
            items,
            total: total as u64,
            page: request.page,
            per_page: request.per_page,
        })
    }

    pub fn find_by_id(&self, id: LayerId) -> Result<Option<Layer>, Error> {
        let sql = format!("SELECT {} FROM layers l WHERE l.id = ?1", COLUMNS);
        let row = self
            .store
            .connection()
            .query_row(&sql, params![id.0], LayerRow::read)
            .optional()?;
        row.map(LayerRow::decode).transpose()
    }

    pub fn find_by_id_or_fail(&self, id: LayerId) -> Result<Layer, Error> {
        self.find_by_id(id)?.ok_or(Error::NotFound(id))
    }

    pub fn create<'a>(
        &mut self,
        name: &str,
        geometry: impl Into<GeometrySource<'a>>,
    ) -> Result<Layer, Error> {
        let stored = self.store.store(geometry.into())?;
        let now = Utc::now();

        let tx = self.store.connection_mut().transaction()?;
        tx.execute(
            "INSERT INTO layers (name, geometry, created_at, updated_at) VALUES (?1, ?2, ?3, ?3)",
            params![name, stored.as_wkt(), now],
        )?;
        let id = tx.last_insert_rowid();
        store::index(&tx, id, &stored)?;
        tx.commit()?;

        debug!("inserted layer {}", id);
        Ok(Layer {
            id: LayerId(id),
            name: name.to_owned(),
            geometry: stored.to_geojson(),
            created_at: now,
            updated_at: now,
        })
    }

    /// Apply `changes` to `layer`. `Ok(false)` if the row no longer exists.
    pub fn update(&mut self, layer: &Layer, changes: LayerChanges) -> Result<bool, Error> {
        let stored = match changes.geometry {
            Some(source) => Some(self.store.store(source)?),
            None => None,
        };
        let id = layer.id.0;

        let tx = self.store.connection_mut().transaction()?;
        let rows = tx.execute(
            "UPDATE layers
             SET name = COALESCE(?1, name), geometry = COALESCE(?2, geometry), updated_at = ?3
             WHERE id = ?4",
            params![
                changes.name,
                stored.as_ref().map(StoredGeometry::as_wkt),
                Utc::now(),
                id
            ],
        )?;
        if rows == 0 {
            return Ok(false);
        }
        if let Some(ref stored) = stored {
            store::index(&tx, id, stored)?;
        }
        tx.commit()?;
        Ok(true)
    }

    /// Remove `layer` and its index entry. `Ok(false)` if it was already gone.
    pub fn delete(&mut self, layer: &Layer) -> Result<bool, Error> {
        let id = layer.id.0;
        let tx = self.store.connection_mut().transaction()?;
        let rows = tx.execute("DELETE FROM layers WHERE id = ?1", params![id])?;
        store::unindex(&tx, id)?;
        tx.commit()?;
        Ok(rows > 0)
    }

    /// Layers whose geometry contains the point, newest first.
    pub fn find_containing_point(&self, longitude: f64, latitude: f64) -> Result<Vec<Layer>, Error> {
        self.find_matching(&Predicate::contains_point(longitude, latitude))
    }

    /// Layers within `meters` of the point on the sphere, newest first.
    pub fn find_within_distance(
        &self,
        longitude: f64,
        latitude: f64,
        meters: f64,
    ) -> Result<Vec<Layer>, Error> {
        self.find_matching(&Predicate::within_distance(longitude, latitude, meters))
    }

    /// Filter candidates through the R*Tree, then test each exactly.
    pub fn find_matching(&self, predicate: &Predicate) -> Result<Vec<Layer>, Error> {
        let window = match predicate.index_params() {
            Some(window) => window,
            None => return Ok(Vec::new()),
        };
        let sql = format!(
            "SELECT {} FROM layers l JOIN layers_geometry_idx i ON i.id = l.id WHERE {} {}",
            COLUMNS, INDEX_FILTER, NEWEST_FIRST
        );
        let mut stmt = self.store.connection().prepare(&sql)?;
        let rows = stmt.query_map(
            params![window[0], window[1], window[2], window[3]],
            LayerRow::read,
        )?;

        let mut candidates = 0;
        let mut layers = Vec::new();
        for row in rows {
            let row = row?;
            candidates += 1;
            let stored = StoredGeometry::from_wkt(&row.geometry)?;
            if predicate.matches(stored.geometry()) {
                layers.push(row.into_layer(&stored));
            }
        }
        debug!(
            "{:?}: {} of {} index candidates matched",
            predicate,
            layers.len(),
            candidates
        );
        Ok(layers)
    }

    pub fn count(&self) -> Result<u64, Error> {
        let count: i64 = self
            .store
            .connection()
            .query_row("SELECT COUNT(*) FROM layers", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Every layer as a GeoJSON FeatureCollection, newest first.
    pub fn feature_collection(&self) -> Result<FeatureCollection, Error> {
        Ok(layer::feature_collection(&self.all()?))
    }

    fn query(&self, sql: &str, params: &[&dyn rusqlite::ToSql]) -> Result<Vec<Layer>, Error> {
        let mut stmt = self.store.connection().prepare(sql)?;
        let rows = stmt.query_map(params, LayerRow::read)?;
        let mut layers = Vec::new();
        for row in rows {
            layers.push(row?.decode()?);
        }
        Ok(layers)
    }
}

/// Substring LIKE pattern with the wildcards in `term` escaped.
fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}
