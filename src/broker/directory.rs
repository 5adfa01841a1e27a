//! Client directory
//!
//! Holds one [`ClientRecord`] per connected client: its last reported
//! location and its subscriptions, at most one per topic. Subscription ids
//! are minted here so that the topic index can refer back to their owner.

use std::collections::HashMap;

use crate::geo::{Geofence, Location};
use crate::protocol::Topic;

pub type ClientId = String;

/// Identifies one subscription of one client.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionId {
    pub client_id: ClientId,
    pub seq: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub topic: Topic,
    pub geofence: Geofence,
}

#[derive(Debug, Clone)]
pub struct ClientRecord {
    pub client_id: ClientId,
    pub location: Option<Location>,
    pub subscriptions: HashMap<Topic, Subscription>,
}

#[derive(Debug, Default)]
pub struct ClientDirectory {
    clients: HashMap<ClientId, ClientRecord>,
    next_subscription_seq: u64,
}

impl ClientDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a record. Returns false if the id is already taken.
    pub fn add_client(&mut self, client_id: &str, location: Option<Location>) -> bool {
        if self.clients.contains_key(client_id) {
            return false;
        }
        self.clients.insert(
            client_id.to_string(),
            ClientRecord {
                client_id: client_id.to_string(),
                location,
                subscriptions: HashMap::new(),
            },
        );
        true
    }

    /// Removes the record, handing it back so its subscriptions can be unindexed.
    pub fn remove_client(&mut self, client_id: &str) -> Option<ClientRecord> {
        self.clients.remove(client_id)
    }

    /// Checks whether a client is currently connected.
    pub fn contains(&self, client_id: &str) -> bool {
        self.clients.contains_key(client_id)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Returns false if the client is unknown.
    pub fn update_location(&mut self, client_id: &str, location: Option<Location>) -> bool {
        match self.clients.get_mut(client_id) {
            Some(record) => {
                record.location = location;
                true
            }
            None => false,
        }
    }

    /// `None` if the client is unknown or never reported a location.
    pub fn location(&self, client_id: &str) -> Option<Location> {
        self.clients.get(client_id).and_then(|r| r.location)
    }

    pub fn subscription(&self, client_id: &str, topic: &Topic) -> Option<&Subscription> {
        self.clients.get(client_id)?.subscriptions.get(topic)
    }

    pub fn subscription_count(&self, client_id: &str) -> usize {
        self.clients
            .get(client_id)
            .map_or(0, |r| r.subscriptions.len())
    }

    /// Stores a subscription under a fresh id, replacing any previous one on
    /// the same topic. Returns the replaced subscription alongside the new id,
    /// or `None` if the client is unknown.
    pub fn put_subscription(
        &mut self,
        client_id: &str,
        topic: Topic,
        geofence: Geofence,
    ) -> Option<(SubscriptionId, Option<Subscription>)> {
        let record = self.clients.get_mut(client_id)?;
        self.next_subscription_seq += 1;
        let id = SubscriptionId {
            client_id: client_id.to_string(),
            seq: self.next_subscription_seq,
        };
        let replaced = record.subscriptions.insert(
            topic.clone(),
            Subscription {
                id: id.clone(),
                topic,
                geofence,
            },
        );
        Some((id, replaced))
    }

    /// Drops the client's subscription on `topic`, if any.
    pub fn remove_subscription(&mut self, client_id: &str, topic: &Topic) -> Option<Subscription> {
        self.clients.get_mut(client_id)?.subscriptions.remove(topic)
    }
}
