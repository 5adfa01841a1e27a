//! Spatial primitives used for routing decisions.
//!
//! Brokers and clients only ever ask two questions of a geofence: does it
//! contain a location, and does it intersect another geofence. Both are
//! answered in planar latitude/longitude degree space, which is also the
//! unit circle radii are configured in.

pub mod geofence;
pub mod location;

pub use geofence::Geofence;
pub use location::Location;
