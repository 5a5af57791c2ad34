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

use std::f64::consts::PI;

use geo::{
    Closest, Contains, Coord, Geometry, HaversineClosestPoint, HaversineDistance, Intersects,
    LineString, Point, Polygon, Rect,
};

/// Mean Earth radius in meters, the sphere distances are measured on.
pub const MEAN_EARTH_RADIUS: f64 = 6_371_008.8;

/// Bounding-box filter on the `layers_geometry_idx` R*Tree (aliased `i`).
///
/// Bound in order: envelope min x, max x, min y, max y.
pub(crate) const INDEX_FILTER: &str =
    "i.max_x >= ?1 AND i.min_x <= ?2 AND i.max_y >= ?3 AND i.min_y <= ?4";

// Slack added around search windows, in degrees.
const PAD: f64 = 1e-9;

/// A spatial test evaluated against stored geometries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Predicate {
    /// The geometry contains the point (OGC semantics: boundary excluded).
    ContainsPoint { longitude: f64, latitude: f64 },
    /// The geometry lies within `meters` of the point, measured on the sphere.
    WithinDistance {
        longitude: f64,
        latitude: f64,
        meters: f64,
    },
}

impl Predicate {
    pub fn contains_point(longitude: f64, latitude: f64) -> Self {
        Predicate::ContainsPoint {
            longitude,
            latitude,
        }
    }

    pub fn within_distance(longitude: f64, latitude: f64, meters: f64) -> Self {
        Predicate::WithinDistance {
            longitude,
            latitude,
            meters,
        }
    }

    pub fn point(&self) -> Point<f64> {
        match *self {
            Predicate::ContainsPoint {
                longitude,
                latitude,
            }
            | Predicate::WithinDistance {
                longitude,
                latitude,
                ..
            } => Point::new(longitude, latitude),
        }
    }

    /// Window every matching geometry's bounding box must intersect.
    ///
    /// `None` when nothing can match (a negative or NaN distance).
    pub fn envelope(&self) -> Option<Rect<f64>> {
        match *self {
            Predicate::ContainsPoint {
                longitude,
                latitude,
            } => Some(rect(longitude, latitude, longitude, latitude)),
            Predicate::WithinDistance {
                longitude,
                latitude,
                meters,
            } => distance_envelope(longitude, latitude, meters),
        }
    }

    pub(crate) fn index_params(&self) -> Option<[f64; 4]> {
        self.envelope()
            .map(|env| [env.min().x, env.max().x, env.min().y, env.max().y])
    }

    /// Exact test against a decoded geometry.
    pub fn matches(&self, geometry: &Geometry<f64>) -> bool {
        let point = self.point();
        match *self {
            Predicate::ContainsPoint { .. } => geometry.contains(&point),
            Predicate::WithinDistance { meters, .. } => {
                meters >= 0.0 && geodesic_distance(geometry, &point).map_or(false, |d| d <= meters)
            }
        }
    }
}

fn rect(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Rect<f64> {
    Rect::new(Coord { x: min_x, y: min_y }, Coord { x: max_x, y: max_y })
}

/// Bounding box of the spherical cap of radius `meters` around a point.
///
/// Caps reaching a pole or crossing the antimeridian get the full
/// longitude range.
fn distance_envelope(longitude: f64, latitude: f64, meters: f64) -> Option<Rect<f64>> {
    if !(meters >= 0.0) {
        return None;
    }
    let angular = meters / MEAN_EARTH_RADIUS;
    if angular >= PI {
        return Some(rect(-f64::MAX, -f64::MAX, f64::MAX, f64::MAX));
    }
    let dlat = angular.to_degrees() + PAD;
    let (min_lat, max_lat) = (latitude - dlat, latitude + dlat);
    if min_lat <= -90.0 || max_lat >= 90.0 {
        return Some(rect(-f64::MAX, min_lat, f64::MAX, max_lat));
    }
    let ratio = angular.sin() / latitude.to_radians().cos();
    if ratio >= 1.0 {
        return Some(rect(-f64::MAX, min_lat, f64::MAX, max_lat));
    }
    let dlon = ratio.asin().to_degrees() + PAD;
    let (min_lon, max_lon) = (longitude - dlon, longitude + dlon);
    if min_lon < -180.0 || max_lon > 180.0 {
        return Some(rect(-f64::MAX, min_lat, f64::MAX, max_lat));
    }
    Some(rect(min_lon, min_lat, max_lon, max_lat))
}

/// Haversine distance in meters from `point` to the nearest part of
/// `geometry`; zero when they intersect.
///
/// `None` for empty geometries.
pub fn geodesic_distance(geometry: &Geometry<f64>, point: &Point<f64>) -> Option<f64> {
    if geometry.intersects(point) {
        return Some(0.0);
    }
    closest_point(geometry, point).map(|closest| closest.haversine_distance(point))
}

fn closest_point(geometry: &Geometry<f64>, from: &Point<f64>) -> Option<Point<f64>> {
    match geometry {
        Geometry::Point(p) => Some(*p),
        Geometry::Line(line) => on_line_string(&LineString::from(vec![line.start, line.end]), from),
        Geometry::LineString(ls) => on_line_string(ls, from),
        Geometry::Polygon(polygon) => on_polygon(polygon, from),
        Geometry::MultiPoint(mp) => nearest(mp.iter().copied(), from),
        Geometry::MultiLineString(mls) => {
            nearest(mls.iter().filter_map(|ls| on_line_string(ls, from)), from)
        }
        Geometry::MultiPolygon(mp) => nearest(mp.iter().filter_map(|p| on_polygon(p, from)), from),
        Geometry::GeometryCollection(gc) => {
            nearest(gc.iter().filter_map(|g| closest_point(g, from)), from)
        }
        Geometry::Rect(r) => on_polygon(&r.to_polygon(), from),
        Geometry::Triangle(t) => on_polygon(&t.to_polygon(), from),
    }
}

fn on_line_string(line_string: &LineString<f64>, from: &Point<f64>) -> Option<Point<f64>> {
    match line_string.haversine_closest_point(from) {
        Closest::Intersection(p) | Closest::SinglePoint(p) => Some(p),
        Closest::Indeterminate => line_string.points().next(),
    }
}

// Only reached for points outside the polygon, so the nearest point lies on
// one of its rings.
fn on_polygon(polygon: &Polygon<f64>, from: &Point<f64>) -> Option<Point<f64>> {
    let rings = std::iter::once(polygon.exterior()).chain(polygon.interiors());
    nearest(rings.filter_map(|ring| on_line_string(ring, from)), from)
}

fn nearest(candidates: impl Iterator<Item = Point<f64>>, from: &Point<f64>) -> Option<Point<f64>> {
    candidates
        .map(|p| (p.haversine_distance(from), p))
        .min_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, p)| p)
}
