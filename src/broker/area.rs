//! Broker area registry
//!
//! Knows the area this broker covers and the areas of every other broker in
//! the federation. At most one broker is the root: it has no hard area
//! restriction and is responsible for every location no other broker covers.
//! Its configured area still decides which publications it matches locally
//! and which publications other brokers forward to it.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::geo::{Geofence, Location};
use crate::protocol::BrokerInfo;
use crate::utils::RegistryError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrokerArea {
    pub broker: BrokerInfo,
    pub area: Geofence,
    #[serde(default)]
    pub root: bool,
}

impl BrokerArea {
    pub fn new(broker: BrokerInfo, area: Geofence) -> Self {
        Self {
            broker,
            area,
            root: false,
        }
    }

    /// The root broker's entry. It serves every location no regular broker covers.
    pub fn root(broker: BrokerInfo, area: Geofence) -> Self {
        Self {
            broker,
            area,
            root: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BrokerAreaRegistry {
    own: BrokerArea,
    others: Vec<BrokerArea>,
}

impl BrokerAreaRegistry {
    /// Splits `areas` into the entry for `own_broker_id` and everybody else.
    pub fn new(own_broker_id: &str, areas: Vec<BrokerArea>) -> Result<Self, RegistryError> {
        if areas.iter().filter(|a| a.root).count() > 1 {
            return Err(RegistryError::MultipleRoots);
        }
        let (own, others): (Vec<_>, Vec<_>) = areas
            .into_iter()
            .partition(|a| a.broker.broker_id == own_broker_id);
        let own = own
            .into_iter()
            .next()
            .ok_or_else(|| RegistryError::UnknownBroker(own_broker_id.to_string()))?;
        Ok(Self { own, others })
    }

    /// A single broker covering `area` with no peers.
    pub fn standalone(own: BrokerArea) -> Self {
        Self {
            own,
            others: Vec::new(),
        }
    }

    /// Reads a JSON array of [`BrokerArea`] entries.
    pub fn from_file(own_broker_id: &str, path: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| RegistryError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let areas: Vec<BrokerArea> = serde_json::from_str(&json)?;
        Self::new(own_broker_id, areas)
    }

    pub fn own_info(&self) -> &BrokerInfo {
        &self.own.broker
    }

    pub fn own_area(&self) -> &BrokerArea {
        &self.own
    }

    pub fn is_root(&self) -> bool {
        self.own.root
    }

    /// Every peer broker, regular and root.
    pub fn other_infos(&self) -> impl Iterator<Item = &BrokerInfo> {
        self.others.iter().map(|a| &a.broker)
    }

    /// Whether this broker must serve a client at `location`. A missing
    /// location lies in no area, so only the root is responsible for it.
    pub fn is_responsible_for(&self, location: Option<&Location>) -> bool {
        if self.own.root {
            return !self
                .others
                .iter()
                .any(|a| !a.root && location.is_some_and(|l| a.area.contains(l)));
        }
        location.is_some_and(|l| self.own.area.contains(l))
    }

    /// Whether publications within `geofence` may have subscribers here.
    pub fn own_area_intersects(&self, geofence: &Geofence) -> bool {
        self.own.area.intersects(geofence)
    }

    /// The other broker responsible for `location`: a regular broker whose
    /// area contains it, otherwise the root broker if it is a peer.
    pub fn other_broker_containing(&self, location: Option<&Location>) -> Option<&BrokerInfo> {
        if let Some(l) = location {
            if let Some(area) = self.others.iter().find(|a| !a.root && a.area.contains(l)) {
                return Some(&area.broker);
            }
        }
        self.others.iter().find(|a| a.root).map(|a| &a.broker)
    }

    /// Peer brokers whose area overlaps `geofence`, the root broker included.
    pub fn other_brokers_intersecting(&self, geofence: &Geofence) -> Vec<BrokerInfo> {
        self.others
            .iter()
            .filter(|a| a.area.intersects(geofence))
            .map(|a| a.broker.clone())
            .collect()
    }
}
