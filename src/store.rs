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

//! SQLite-backed geometry storage with an R*Tree bounding-box index.
//!
//! Geometries are kept as WKT text in the `layers` table. Every row with a
//! non-empty geometry has a matching entry in `layers_geometry_idx`.

use std::path::Path;

use geo::{BoundingRect, Rect};
use log::{debug, info};
use rusqlite::functions::FunctionFlags;
use rusqlite::{params, Connection, OptionalExtension};
use wkt::{ToWkt, TryFromWkt};

use crate::json::JsonValue;
use crate::{util, Config, Error};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS spatial_ref (
    srid INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS layers (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    geometry TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS layers_created_at_idx ON layers (created_at);
CREATE VIRTUAL TABLE IF NOT EXISTS layers_geometry_idx USING rtree(
    id, min_x, max_x, min_y, max_y
);
";

/// Geometry input accepted by [`SpatialStore::store`].
#[derive(Debug, Clone, Copy)]
pub enum GeometrySource<'a> {
    GeoJson(&'a geojson::Geometry),
    /// GeoJSON text, WKT, or EWKT (`SRID=4326;POINT(1 2)`).
    Text(&'a str),
}

impl<'a> From<&'a geojson::Geometry> for GeometrySource<'a> {
    fn from(geometry: &'a geojson::Geometry) -> Self {
        GeometrySource::GeoJson(geometry)
    }
}

impl<'a> From<&'a str> for GeometrySource<'a> {
    fn from(text: &'a str) -> Self {
        GeometrySource::Text(text)
    }
}

/// A geometry in its stored representation.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredGeometry {
    wkt: String,
    geometry: geo::Geometry<f64>,
    bounds: Option<Rect<f64>>,
}

impl StoredGeometry {
    /// Fails when the WKT written for `geometry` would not decode again.
    fn from_geo(geometry: geo::Geometry<f64>) -> Result<Self, Error> {
        let wkt = geometry.wkt_string();
        if let Err(e) = geo::Geometry::<f64>::try_from_wkt_str(&wkt) {
            return Err(Error::InvalidGeometry(format!("{} cannot be stored: {}", wkt, e)));
        }
        Ok(StoredGeometry {
            wkt,
            bounds: geometry.bounding_rect(),
            geometry,
        })
    }

    /// Decode the text of a `layers.geometry` column.
    pub(crate) fn from_wkt(text: &str) -> Result<Self, Error> {
        let geometry = geo::Geometry::<f64>::try_from_wkt_str(text)
            .map_err(|e| Error::InvalidGeometry(e.to_string()))?;
        Ok(StoredGeometry {
            wkt: text.to_owned(),
            bounds: geometry.bounding_rect(),
            geometry,
        })
    }

    pub fn as_wkt(&self) -> &str {
        &self.wkt
    }

    pub fn geometry(&self) -> &geo::Geometry<f64> {
        &self.geometry
    }

    /// Bounding box, `None` for an empty geometry.
    pub fn bounds(&self) -> Option<Rect<f64>> {
        self.bounds
    }

    pub fn to_geojson(&self) -> geojson::Geometry {
        geojson::Geometry::new(geojson::Value::from(&self.geometry))
    }
}

/// Relational store with spatial indexing for one SRID.
pub struct SpatialStore {
    conn: Connection,
    srid: i32,
}

impl SpatialStore {
    /// Open (creating if needed) a database file.
    ///
    /// Fails with [`Error::SridMismatch`] if the file was created for a
    /// different SRID.
    pub fn open(path: impl AsRef<Path>, srid: i32) -> Result<Self, Error> {
        let path = path.as_ref();
        info!("opening layer store at {}", path.display());
        SpatialStore::init(Connection::open(path)?, srid)
    }

    pub fn open_in_memory(srid: i32) -> Result<Self, Error> {
        SpatialStore::init(Connection::open_in_memory()?, srid)
    }

    /// Open the database named by `config`, or an in-memory one.
    pub fn from_config(config: &Config) -> Result<Self, Error> {
        match config.database_path() {
            Some(path) => SpatialStore::open(path, config.srid()),
            None => SpatialStore::open_in_memory(config.srid()),
        }
    }

    fn init(conn: Connection, srid: i32) -> Result<Self, Error> {
        conn.execute_batch(SCHEMA)?;
        // SQLite's own LIKE and lower() only fold ASCII letters.
        conn.create_scalar_function(
            "casefold",
            1,
            FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
            |ctx| Ok(ctx.get::<String>(0)?.to_lowercase()),
        )?;
        let existing: Option<i32> = conn
            .query_row("SELECT srid FROM spatial_ref LIMIT 1", [], |row| row.get(0))
            .optional()?;
        match existing {
            Some(found) if found != srid => {
                return Err(Error::SridMismatch {
                    expected: srid,
                    found,
                })
            }
            Some(_) => {}
            None => {
                conn.execute("INSERT INTO spatial_ref (srid) VALUES (?1)", params![srid])?;
            }
        }
        Ok(SpatialStore { conn, srid })
    }

    pub fn srid(&self) -> i32 {
        self.srid
    }

    /// Convert a geometry to its stored representation.
    ///
    /// Text starting with `{` or `[` is read as GeoJSON, anything else as
    /// WKT with an optional EWKT `SRID=n;` prefix.
    pub fn store(&self, source: GeometrySource) -> Result<StoredGeometry, Error> {
        match source {
            GeometrySource::GeoJson(geometry) => from_geojson(geometry),
            GeometrySource::Text(text) => {
                let text = text.trim();
                if text.starts_with('{') || text.starts_with('[') {
                    let value: JsonValue = serde_json::from_str(text)
                        .map_err(|e| Error::InvalidGeometry(e.to_string()))?;
                    let geometry = util::decode_geometry(value)
                        .map_err(|e| Error::InvalidGeometry(e.to_string()))?;
                    from_geojson(&geometry)
                } else {
                    self.parse_ewkt(text)
                }
            }
        }
    }

    /// Convert a stored geometry back to GeoJSON.
    pub fn to_geojson(&self, stored: &StoredGeometry) -> geojson::Geometry {
        stored.to_geojson()
    }

    fn parse_ewkt(&self, text: &str) -> Result<StoredGeometry, Error> {
        let (srid, body) = split_ewkt(text)?;
        if let Some(found) = srid {
            if found != self.srid {
                return Err(Error::SridMismatch {
                    expected: self.srid,
                    found,
                });
            }
        }
        let parsed = StoredGeometry::from_wkt(body.trim())?;
        StoredGeometry::from_geo(parsed.geometry)
    }

    /// Rebuild the bounding-box index from the `layers` table.
    pub fn reindex(&mut self) -> Result<usize, Error> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM layers_geometry_idx", [])?;
        let rows: Vec<(i64, String)> = {
            let mut stmt = tx.prepare("SELECT id, geometry FROM layers")?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
            })?;
            rows.collect::<Result<_, _>>()?
        };
        let mut indexed = 0;
        for (id, text) in rows {
            let stored = StoredGeometry::from_wkt(&text)?;
            if stored.bounds.is_some() {
                indexed += 1;
            }
            index(&tx, id, &stored)?;
        }
        tx.commit()?;
        debug!("reindexed {} layer geometries", indexed);
        Ok(indexed)
    }

    pub(crate) fn connection(&self) -> &Connection {
        &self.conn
    }

    pub(crate) fn connection_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }
}

fn from_geojson(geometry: &geojson::Geometry) -> Result<StoredGeometry, Error> {
    util::check_positions(&geometry.value).map_err(|e| Error::InvalidGeometry(e.to_string()))?;
    let geometry = geo::Geometry::<f64>::try_from(geometry.clone())
        .map_err(|e| Error::InvalidGeometry(e.to_string()))?;
    StoredGeometry::from_geo(geometry)
}

fn split_ewkt(text: &str) -> Result<(Option<i32>, &str), Error> {
    let head = match text.get(..5) {
        Some(head) if head.eq_ignore_ascii_case("SRID=") => &text[5..],
        _ => return Ok((None, text)),
    };
    let (srid, body) = head
        .split_once(';')
        .ok_or_else(|| Error::InvalidGeometry("EWKT SRID prefix is not terminated".to_owned()))?;
    let srid = srid
        .trim()
        .parse()
        .map_err(|_| Error::InvalidGeometry(format!("invalid EWKT SRID: {}", srid)))?;
    Ok((Some(srid), body))
}

/// Replace the index entry of layer `id`. Empty geometries are left out.
pub(crate) fn index(conn: &Connection, id: i64, stored: &StoredGeometry) -> rusqlite::Result<()> {
    unindex(conn, id)?;
    if let Some(bounds) = stored.bounds {
        conn.execute(
            "INSERT INTO layers_geometry_idx (id, min_x, max_x, min_y, max_y)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                id,
                bounds.min().x,
                bounds.max().x,
                bounds.min().y,
                bounds.max().y
            ],
        )?;
    }
    Ok(())
}

pub(crate) fn unindex(conn: &Connection, id: i64) -> rusqlite::Result<()> {
    conn.execute("DELETE FROM layers_geometry_idx WHERE id = ?1", params![id])?;
    Ok(())
}
