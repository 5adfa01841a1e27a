//! Geofence shapes and their containment/intersection tests.
//!
//! Longitude is treated as the x axis and latitude as the y axis. A polygon
//! is an implicitly closed ring; fewer than three vertices make it degenerate.

use serde::{Deserialize, Serialize};

use super::location::Location;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum Geofence {
    /// All points within `radius` degrees of `center`.
    Circle { center: Location, radius: f64 },
    /// Closed ring of vertices, first vertex is not repeated.
    Polygon { vertices: Vec<Location> },
    /// Contains nothing and intersects nothing.
    Undefined,
}

impl Geofence {
    pub fn circle(center: Location, radius: f64) -> Self {
        Geofence::Circle { center, radius }
    }

    pub fn polygon(vertices: Vec<Location>) -> Self {
        Geofence::Polygon { vertices }
    }

    /// Axis-aligned rectangle spanned by its south-west and north-east corners.
    pub fn rectangle(south_west: Location, north_east: Location) -> Self {
        Geofence::Polygon {
            vertices: vec![
                south_west,
                Location::new(south_west.lat, north_east.lon),
                north_east,
                Location::new(north_east.lat, south_west.lon),
            ],
        }
    }

    /// Rectangle covering every valid coordinate.
    pub fn world() -> Self {
        Self::rectangle(Location::new(-90.0, -180.0), Location::new(90.0, 180.0))
    }

    fn is_degenerate(&self) -> bool {
        match self {
            Geofence::Circle { radius, .. } => !radius.is_finite() || *radius < 0.0,
            Geofence::Polygon { vertices } => vertices.len() < 3,
            Geofence::Undefined => true,
        }
    }

    /// Whether `location` lies inside. An undefined geofence contains nothing.
    pub fn contains(&self, location: &Location) -> bool {
        if self.is_degenerate() {
            return false;
        }
        match self {
            Geofence::Circle { center, radius } => center.distance_deg(location) <= *radius,
            Geofence::Polygon { vertices } => {
                polygon_contains(vertices, location) || on_boundary(vertices, location)
            }
            Geofence::Undefined => false,
        }
    }

    pub fn intersects(&self, other: &Geofence) -> bool {
        if self.is_degenerate() || other.is_degenerate() {
            return false;
        }
        match (self, other) {
            (
                Geofence::Circle { center: a, radius: ra },
                Geofence::Circle { center: b, radius: rb },
            ) => a.distance_deg(b) <= ra + rb,
            (Geofence::Circle { center, radius }, Geofence::Polygon { vertices })
            | (Geofence::Polygon { vertices }, Geofence::Circle { center, radius }) => {
                polygon_contains(vertices, center)
                    || edges(vertices).any(|(p, q)| segment_distance(center, p, q) <= *radius)
            }
            (Geofence::Polygon { vertices: a }, Geofence::Polygon { vertices: b }) => {
                a.iter().any(|v| polygon_contains(b, v))
                    || b.iter().any(|v| polygon_contains(a, v))
                    || edges(a).any(|(p, q)| edges(b).any(|(r, s)| segments_cross(p, q, r, s)))
            }
            _ => false,
        }
    }

    /// Approximate center, used as a stand-in location for publishers that
    /// never reported one.
    pub fn centroid(&self) -> Option<Location> {
        if self.is_degenerate() {
            return None;
        }
        match self {
            Geofence::Circle { center, .. } => Some(*center),
            Geofence::Polygon { vertices } => {
                let n = vertices.len() as f64;
                let (lat, lon) = vertices
                    .iter()
                    .fold((0.0, 0.0), |(lat, lon), v| (lat + v.lat, lon + v.lon));
                Some(Location::new(lat / n, lon / n))
            }
            Geofence::Undefined => None,
        }
    }
}

impl std::fmt::Display for Geofence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Geofence::Circle { center, radius } => write!(f, "CIRCLE({center}, {radius})"),
            Geofence::Polygon { vertices } => write!(f, "POLYGON({} vertices)", vertices.len()),
            Geofence::Undefined => write!(f, "UNDEFINED"),
        }
    }
}

fn edges(vertices: &[Location]) -> impl Iterator<Item = (&Location, &Location)> {
    vertices
        .iter()
        .zip(vertices.iter().cycle().skip(1))
        .take(vertices.len())
}

// Even-odd ray casting towards +x.
fn polygon_contains(vertices: &[Location], point: &Location) -> bool {
    let mut inside = false;
    for (a, b) in edges(vertices) {
        if (a.lat > point.lat) != (b.lat > point.lat) {
            let x = a.lon + (point.lat - a.lat) / (b.lat - a.lat) * (b.lon - a.lon);
            if point.lon < x {
                inside = !inside;
            }
        }
    }
    inside
}

fn on_boundary(vertices: &[Location], point: &Location) -> bool {
    edges(vertices).any(|(a, b)| segment_distance(point, a, b) <= f64::EPSILON)
}

fn segment_distance(point: &Location, a: &Location, b: &Location) -> f64 {
    let (dx, dy) = (b.lon - a.lon, b.lat - a.lat);
    let len_sq = dx * dx + dy * dy;
    if len_sq == 0.0 {
        return point.distance_deg(a);
    }
    let t = (((point.lon - a.lon) * dx + (point.lat - a.lat) * dy) / len_sq).clamp(0.0, 1.0);
    let projected = Location::new(a.lat + t * dy, a.lon + t * dx);
    point.distance_deg(&projected)
}

fn orientation(a: &Location, b: &Location, c: &Location) -> f64 {
    (b.lon - a.lon) * (c.lat - a.lat) - (b.lat - a.lat) * (c.lon - a.lon)
}

fn segments_cross(p: &Location, q: &Location, r: &Location, s: &Location) -> bool {
    let d1 = orientation(r, s, p);
    let d2 = orientation(r, s, q);
    let d3 = orientation(p, q, r);
    let d4 = orientation(p, q, s);
    if ((d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0))
        && ((d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0))
    {
        return true;
    }
    // collinear touching
    (d1 == 0.0 && segment_distance(p, r, s) == 0.0)
        || (d2 == 0.0 && segment_distance(q, r, s) == 0.0)
        || (d3 == 0.0 && segment_distance(r, p, q) == 0.0)
        || (d4 == 0.0 && segment_distance(s, p, q) == 0.0)
}
