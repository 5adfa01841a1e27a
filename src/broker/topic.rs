//! Topic and geofence index
//!
//! Maps each topic to the subscriptions on it and their geofences so that a
//! publication can be matched without walking every client. Callers must
//! synchronize access (the engine lives behind the server's lock) and keep
//! the index consistent with the client directory.

use std::collections::HashMap;

use crate::broker::directory::SubscriptionId;
use crate::geo::{Geofence, Location};
use crate::protocol::Topic;

#[derive(Debug, Default)]
pub struct TopicIndex {
    topics: HashMap<Topic, HashMap<SubscriptionId, Geofence>>,
}

impl TopicIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Indexes a subscription under `topic`. An existing entry with the same
    /// id has its geofence replaced.
    pub fn insert(&mut self, id: SubscriptionId, topic: &Topic, geofence: Geofence) {
        self.topics
            .entry(topic.clone())
            .or_default()
            .insert(id, geofence);
    }

    /// Removes a mapping, dropping the topic entry once it has no subscribers left.
    pub fn remove(&mut self, id: &SubscriptionId, topic: &Topic) -> bool {
        let Some(subscriptions) = self.topics.get_mut(topic) else {
            return false;
        };
        let removed = subscriptions.remove(id).is_some();
        if subscriptions.is_empty() {
            self.topics.remove(topic);
        }
        removed
    }

    /// Subscriptions on `topic` whose geofence contains `location`.
    pub fn matching(&self, topic: &Topic, location: &Location) -> Vec<SubscriptionId> {
        self.topics
            .get(topic)
            .map(|subscriptions| {
                subscriptions
                    .iter()
                    .filter(|(_, fence)| fence.contains(location))
                    .map(|(id, _)| id.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Number of subscriptions on `topic`.
    pub fn subscription_count(&self, topic: &Topic) -> usize {
        self.topics.get(topic).map_or(0, HashMap::len)
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }
}
