//! Broker engine
//!
//! The matching and forwarding logic of a single broker in the federation:
//! - deciding whether this broker is responsible for a client's location and
//!   redirecting the client otherwise
//! - maintaining client records and geofenced subscriptions
//! - matching publications against local subscribers
//! - forwarding publications to peer brokers whose area they reach
//!
//! Concurrency and usage notes:
//! - The engine does no I/O. [`Broker::handle`] consumes one payload and
//!   returns a [`Dispatch`] describing what must be sent where; the transport
//!   performs the sends after releasing the broker lock.
//! - Hold the engine behind a lock (for example `Arc<Mutex<Broker>>`); every
//!   payload is processed to completion before the next one.

use tracing::{debug, trace, warn};

use crate::broker::area::BrokerAreaRegistry;
use crate::broker::directory::{ClientDirectory, ClientId};
use crate::broker::policy::{ForwardContext, ForwardingPolicy, SuffixPolicy};
use crate::broker::topic::TopicIndex;
use crate::geo::{Geofence, Location};
use crate::protocol::{BrokerInfo, Payload, PublishPayload, ReasonCode, Topic};

/// Messages produced while handling one inbound payload, in send order.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Dispatch {
    /// For peers connected to this broker: clients, or a broker that forwarded to us.
    pub outgoing: Vec<(String, Payload)>,
    /// For other brokers in the federation.
    pub forwards: Vec<(BrokerInfo, Payload)>,
}

impl Dispatch {
    fn send(&mut self, peer: &str, payload: Payload) {
        self.outgoing.push((peer.to_string(), payload));
    }

    fn forward(&mut self, broker: BrokerInfo, payload: Payload) {
        self.forwards.push((broker, payload));
    }

    /// Everything addressed to `peer`, in order.
    pub fn sent_to(&self, peer: &str) -> Vec<&Payload> {
        self.outgoing
            .iter()
            .filter(|(to, _)| to == peer)
            .map(|(_, payload)| payload)
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.outgoing.is_empty() && self.forwards.is_empty()
    }
}

#[derive(Debug)]
pub struct Broker {
    directory: ClientDirectory,
    index: TopicIndex,
    areas: BrokerAreaRegistry,
    policy: Box<dyn ForwardingPolicy>,
}

impl Broker {
    /// Engine with the default [`SuffixPolicy`].
    pub fn new(areas: BrokerAreaRegistry) -> Self {
        Self::with_policy(areas, SuffixPolicy::default())
    }

    /// Engine that consults `policy` before forwarding publications to peers.
    pub fn with_policy(areas: BrokerAreaRegistry, policy: impl ForwardingPolicy + 'static) -> Self {
        Self {
            directory: ClientDirectory::new(),
            index: TopicIndex::new(),
            areas,
            policy: Box::new(policy),
        }
    }

    /// Id of the broker this engine runs.
    pub fn broker_id(&self) -> &str {
        &self.areas.own_info().broker_id
    }

    pub fn areas(&self) -> &BrokerAreaRegistry {
        &self.areas
    }

    /// Connected clients and their subscriptions.
    pub fn directory(&self) -> &ClientDirectory {
        &self.directory
    }

    pub fn index(&self) -> &TopicIndex {
        &self.index
    }

    /// Processes one payload received from `peer` (a client id, or a broker id
    /// for broker-forward payloads).
    pub fn handle(&mut self, peer: &str, payload: Payload) -> Dispatch {
        let mut out = Dispatch::default();
        match payload {
            Payload::Connect { location } => self.process_connect(peer, location, &mut out),
            Payload::Disconnect { reason_code, .. } => self.process_disconnect(peer, reason_code),
            Payload::PingReq { location } => self.process_pingreq(peer, location, &mut out),
            Payload::Subscribe { topic, geofence } => {
                self.process_subscribe(peer, topic, geofence, &mut out)
            }
            Payload::Unsubscribe { topic } => self.process_unsubscribe(peer, &topic, &mut out),
            Payload::Publish(publish) => self.process_publish(peer, publish, &mut out),
            Payload::BrokerForwardPublish {
                publish,
                publisher_location,
            } => self.process_broker_forward_publish(peer, publish, publisher_location, &mut out),
            // Client state does not migrate between brokers; clients re-register themselves.
            Payload::BrokerForwardDisconnect { client_id, .. }
            | Payload::BrokerForwardPingreq { client_id, .. }
            | Payload::BrokerForwardSubscribe { client_id, .. }
            | Payload::BrokerForwardUnsubscribe { client_id, .. } => {
                warn!("Unsupported forward from broker {peer} for client {client_id}, message is discarded");
            }
            Payload::ConnAck { .. }
            | Payload::PingResp { .. }
            | Payload::SubAck { .. }
            | Payload::UnsubAck { .. }
            | Payload::PubAck { .. } => {
                warn!("Peer {peer} sent a reply payload to the broker, dropping it");
            }
        }
        out
    }

    /// Removes the client and all of its subscriptions.
    fn evict(&mut self, client_id: &str) -> bool {
        let Some(record) = self.directory.remove_client(client_id) else {
            return false;
        };
        debug!(
            "Evicting client {client_id} with {} active subscriptions",
            record.subscriptions.len()
        );
        for subscription in record.subscriptions.values() {
            self.index.remove(&subscription.id, &subscription.topic);
        }
        true
    }

    /// Checks whether this broker must serve a client at `location`. If not,
    /// tells the client which broker to use (if any) and forgets it.
    fn is_responsible_for(
        &mut self,
        client_id: &str,
        location: Option<Location>,
        out: &mut Dispatch,
    ) -> bool {
        if self.areas.is_responsible_for(location.as_ref()) {
            return true;
        }
        let responsible = self.areas.other_broker_containing(location.as_ref()).cloned();
        debug!(
            "Not responsible for client {client_id}, responsible broker is {:?}",
            responsible.as_ref().map(|b| &b.broker_id)
        );
        out.send(
            client_id,
            Payload::Disconnect {
                reason_code: ReasonCode::WrongBroker,
                broker_info: responsible,
            },
        );
        self.evict(client_id);
        false
    }

    fn process_connect(&mut self, client_id: &str, location: Option<Location>, out: &mut Dispatch) {
        if !self.is_responsible_for(client_id, location, out) {
            return;
        }
        if self.directory.add_client(client_id, location) {
            debug!("Created client {client_id}, acknowledging");
            out.send(
                client_id,
                Payload::ConnAck {
                    reason_code: ReasonCode::Success,
                },
            );
        } else {
            debug!("Client {client_id} already exists, so protocol error. Disconnecting");
            self.evict(client_id);
            out.send(
                client_id,
                Payload::Disconnect {
                    reason_code: ReasonCode::ProtocolError,
                    broker_info: None,
                },
            );
        }
    }

    fn process_disconnect(&mut self, client_id: &str, reason_code: ReasonCode) {
        if self.evict(client_id) {
            debug!("Disconnected client {client_id}, code {reason_code}");
        } else {
            trace!("Client {client_id} did not exist");
        }
    }

    fn process_pingreq(&mut self, client_id: &str, location: Option<Location>, out: &mut Dispatch) {
        if !self.is_responsible_for(client_id, location, out) {
            return;
        }
        let reason_code = if self.directory.update_location(client_id, location) {
            debug!("Updated location of {client_id} to {location:?}");
            ReasonCode::LocationUpdated
        } else {
            debug!("Client {client_id} is not connected");
            ReasonCode::NotConnectedOrNoLocation
        };
        out.send(client_id, Payload::PingResp { reason_code });
    }

    fn process_subscribe(
        &mut self,
        client_id: &str,
        topic: Topic,
        geofence: Geofence,
        out: &mut Dispatch,
    ) {
        if let Some(existing) = self.directory.subscription(client_id, &topic) {
            let id = existing.id.clone();
            self.index.remove(&id, &topic);
        }
        let reason_code = match self
            .directory
            .put_subscription(client_id, topic.clone(), geofence.clone())
        {
            Some((id, _)) => {
                debug!("Client {client_id} subscribed to topic {topic} and geofence {geofence}");
                self.index.insert(id, &topic, geofence);
                ReasonCode::GrantedQoS0
            }
            None => {
                debug!("Client {client_id} is not connected");
                ReasonCode::NotConnectedOrNoLocation
            }
        };
        out.send(client_id, Payload::SubAck { reason_code });
    }

    fn process_unsubscribe(&mut self, client_id: &str, topic: &Topic, out: &mut Dispatch) {
        let reason_code = match self.directory.remove_subscription(client_id, topic) {
            Some(subscription) => {
                self.index.remove(&subscription.id, topic);
                debug!(
                    "Client {client_id} unsubscribed from {topic}, subscription had the id {}",
                    subscription.id.seq
                );
                ReasonCode::Success
            }
            None => {
                debug!("Client {client_id} has no subscription with topic {topic}");
                ReasonCode::NoSubscriptionExisted
            }
        };
        out.send(client_id, Payload::UnsubAck { reason_code });
    }

    fn process_publish(&mut self, client_id: &str, publish: PublishPayload, out: &mut Dispatch) {
        let reason_code = match self.directory.location(client_id) {
            Some(location) => self.publish_from(client_id, location, &publish, out),
            None => {
                debug!("Client {client_id} is not connected or has not provided a location");
                let approximate = publish.geofence.centroid();
                if self.is_responsible_for(client_id, approximate, out) {
                    ReasonCode::NotConnectedOrNoLocation
                } else {
                    // The publisher got a redirect instead of an acknowledgement.
                    match self.areas.other_broker_containing(approximate.as_ref()).cloned() {
                        Some(responsible) => {
                            warn!(
                                "Forwarding publish of {client_id} to the responsible broker {}",
                                responsible.broker_id
                            );
                            out.forward(
                                responsible,
                                Payload::BrokerForwardPublish {
                                    publish,
                                    publisher_location: approximate,
                                },
                            );
                        }
                        None => warn!("No broker is responsible for the publish of {client_id}, dropping it"),
                    }
                    return;
                }
            }
        };
        trace!("Sending PUBACK to {client_id} with reason code {reason_code}");
        out.send(client_id, Payload::PubAck { reason_code });
    }

    fn publish_from(
        &mut self,
        client_id: &str,
        location: Location,
        publish: &PublishPayload,
        out: &mut Dispatch,
    ) -> ReasonCode {
        let local_result = if self.areas.own_area_intersects(&publish.geofence) {
            self.publish_to_local_clients(&location, publish, out)
        } else {
            ReasonCode::NoMatchingSubscribers
        };

        let ctx = ForwardContext {
            publisher_id: client_id,
            topic: &publish.topic,
            local_result,
        };
        let mut forwarded = 0;
        if self.policy.suppress_forward(&ctx) {
            debug!("Publication of {client_id} on {} stays local", publish.topic);
        } else {
            for other in self.areas.other_brokers_intersecting(&publish.geofence) {
                debug!(
                    "Broker area of {} intersects with message from client {client_id}",
                    other.broker_id
                );
                out.forward(
                    other,
                    Payload::BrokerForwardPublish {
                        publish: publish.clone(),
                        publisher_location: Some(location),
                    },
                );
                forwarded += 1;
            }
        }

        match local_result {
            ReasonCode::NoMatchingSubscribers if forwarded > 0 => {
                ReasonCode::NoMatchingSubscribersButForwarded
            }
            ReasonCode::NoMatchingSubscribers => ReasonCode::NoMatchingSubscribers,
            _ => ReasonCode::Success,
        }
    }

    /// Delivers to every subscriber whose geofence contains the publisher and
    /// who is itself inside the publication's geofence.
    fn publish_to_local_clients(
        &self,
        publisher_location: &Location,
        publish: &PublishPayload,
        out: &mut Dispatch,
    ) -> ReasonCode {
        debug!("Publishing topic {} to all subscribers", publish.topic);
        let mut subscribers: Vec<ClientId> = self
            .index
            .matching(&publish.topic, publisher_location)
            .into_iter()
            .map(|id| id.client_id)
            .filter(|subscriber| {
                self.directory
                    .location(subscriber)
                    .is_some_and(|l| publish.geofence.contains(&l))
            })
            .collect();
        subscribers.sort();
        subscribers.dedup();

        for subscriber in &subscribers {
            debug!("Client {subscriber} is a subscriber");
            out.send(subscriber, Payload::Publish(publish.clone()));
        }

        if subscribers.is_empty() {
            debug!("No subscriber exists");
            ReasonCode::NoMatchingSubscribers
        } else {
            ReasonCode::Success
        }
    }

    /// Matches a publication another broker received from one of its clients
    /// and acknowledges it to that broker.
    fn process_broker_forward_publish(
        &mut self,
        other_broker_id: &str,
        publish: PublishPayload,
        publisher_location: Option<Location>,
        out: &mut Dispatch,
    ) {
        debug!(
            "Processing BrokerForwardPublish from broker {other_broker_id} on {}",
            publish.topic
        );
        let reason_code = match publisher_location {
            Some(location) => self.publish_to_local_clients(&location, &publish, out),
            None => ReasonCode::ProtocolError,
        };
        out.send(other_broker_id, Payload::PubAck { reason_code });
    }
}
