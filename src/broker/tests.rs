use super::area::{BrokerArea, BrokerAreaRegistry};
use super::{Broker, ForwardAll};
use crate::geo::{Geofence, Location};
use crate::protocol::{BrokerInfo, Payload, PublishPayload, ReasonCode, Topic};

fn berlin() -> BrokerInfo {
    BrokerInfo::new("berlin", "127.0.0.1:6001")
}

fn paris() -> BrokerInfo {
    BrokerInfo::new("paris", "127.0.0.1:6002")
}

fn cloud() -> BrokerInfo {
    BrokerInfo::new("cloud", "127.0.0.1:6000")
}

fn edge_areas() -> Vec<BrokerArea> {
    vec![
        BrokerArea::new(
            berlin(),
            Geofence::rectangle(Location::new(52.0, 13.0), Location::new(53.0, 14.0)),
        ),
        BrokerArea::new(
            paris(),
            Geofence::rectangle(Location::new(48.0, 2.0), Location::new(49.0, 3.0)),
        ),
    ]
}

fn federation() -> Vec<BrokerArea> {
    let mut areas = edge_areas();
    areas.push(BrokerArea::root(cloud(), Geofence::world()));
    areas
}

fn broker(own: &str, areas: Vec<BrokerArea>) -> Broker {
    Broker::new(BrokerAreaRegistry::new(own, areas).unwrap())
}

fn in_berlin() -> Location {
    Location::new(52.5, 13.4)
}

fn in_paris() -> Location {
    Location::new(48.8, 2.3)
}

fn at_sea() -> Location {
    Location::new(40.0, -30.0)
}

fn connect(broker: &mut Broker, client: &str, location: Location) {
    let out = broker.handle(
        client,
        Payload::Connect {
            location: Some(location),
        },
    );
    assert_eq!(
        out.sent_to(client),
        vec![&Payload::ConnAck {
            reason_code: ReasonCode::Success
        }]
    );
}

fn subscribe(broker: &mut Broker, client: &str, topic: &str, geofence: Geofence) {
    let out = broker.handle(
        client,
        Payload::Subscribe {
            topic: Topic::new(topic),
            geofence,
        },
    );
    assert_eq!(
        out.sent_to(client),
        vec![&Payload::SubAck {
            reason_code: ReasonCode::GrantedQoS0
        }]
    );
}

fn puback(reason_code: ReasonCode) -> Payload {
    Payload::PubAck { reason_code }
}

#[test]
fn test_connect_inside_area() {
    let mut broker = broker("berlin", federation());
    connect(&mut broker, "c1", in_berlin());
    assert!(broker.directory().contains("c1"));
    assert_eq!(broker.directory().location("c1"), Some(in_berlin()));
}

#[test]
fn test_connect_outside_area_redirects() {
    let mut broker = broker("berlin", federation());
    let out = broker.handle(
        "c1",
        Payload::Connect {
            location: Some(in_paris()),
        },
    );
    assert_eq!(
        out.sent_to("c1"),
        vec![&Payload::Disconnect {
            reason_code: ReasonCode::WrongBroker,
            broker_info: Some(paris()),
        }]
    );
    assert!(!broker.directory().contains("c1"));
}

#[test]
fn test_connect_without_any_responsible_broker() {
    let mut broker = broker("berlin", edge_areas());
    let out = broker.handle(
        "c1",
        Payload::Connect {
            location: Some(at_sea()),
        },
    );
    assert_eq!(
        out.sent_to("c1"),
        vec![&Payload::Disconnect {
            reason_code: ReasonCode::WrongBroker,
            broker_info: None,
        }]
    );
}

#[test]
fn test_root_broker_covers_the_complement() {
    let mut root = broker("cloud", federation());
    connect(&mut root, "sailor", at_sea());

    let out = root.handle(
        "tourist",
        Payload::Connect {
            location: Some(in_berlin()),
        },
    );
    assert_eq!(
        out.sent_to("tourist"),
        vec![&Payload::Disconnect {
            reason_code: ReasonCode::WrongBroker,
            broker_info: Some(berlin()),
        }]
    );

    // edge brokers send unknown territory to the root
    let mut edge = broker("paris", federation());
    let out = edge.handle("sailor", Payload::Connect { location: None });
    assert_eq!(
        out.sent_to("sailor"),
        vec![&Payload::Disconnect {
            reason_code: ReasonCode::WrongBroker,
            broker_info: Some(cloud()),
        }]
    );
}

#[test]
fn test_exactly_one_broker_is_responsible() {
    let registries: Vec<BrokerAreaRegistry> = ["berlin", "paris", "cloud"]
        .iter()
        .map(|id| BrokerAreaRegistry::new(id, federation()).unwrap())
        .collect();

    for location in [in_berlin(), in_paris(), at_sea(), Location::new(52.0, 13.0)] {
        let responsible: Vec<_> = registries
            .iter()
            .filter(|r| r.is_responsible_for(Some(&location)))
            .map(|r| r.own_info().broker_id.clone())
            .collect();
        assert_eq!(responsible.len(), 1, "{location} is served by {responsible:?}");

        // following one redirect from anywhere lands on the responsible broker
        for registry in &registries {
            let target = if registry.is_responsible_for(Some(&location)) {
                registry.own_info().clone()
            } else {
                registry
                    .other_broker_containing(Some(&location))
                    .cloned()
                    .unwrap()
            };
            assert_eq!(target.broker_id, responsible[0]);
        }
    }
}

#[test]
fn test_duplicate_client_id_is_rejected() {
    let mut broker = broker("berlin", federation());
    connect(&mut broker, "c1", in_berlin());
    subscribe(&mut broker, "c1", "news", Geofence::world());

    let out = broker.handle(
        "c1",
        Payload::Connect {
            location: Some(in_berlin()),
        },
    );
    assert_eq!(
        out.sent_to("c1"),
        vec![&Payload::Disconnect {
            reason_code: ReasonCode::ProtocolError,
            broker_info: None,
        }]
    );
    // the stale session is gone, so a retry succeeds
    assert!(!broker.directory().contains("c1"));
    assert!(broker.index().is_empty());
    connect(&mut broker, "c1", in_berlin());
}

#[test]
fn test_disconnect_is_idempotent_and_silent() {
    let mut broker = broker("berlin", federation());
    connect(&mut broker, "c1", in_berlin());
    subscribe(&mut broker, "c1", "news", Geofence::world());

    let disconnect = Payload::Disconnect {
        reason_code: ReasonCode::NormalDisconnection,
        broker_info: None,
    };
    assert!(broker.handle("c1", disconnect.clone()).is_empty());
    assert!(broker.handle("c1", disconnect).is_empty());
    assert!(broker.directory().is_empty());
    assert!(broker.index().is_empty());
}

#[test]
fn test_pingreq_updates_location() {
    let mut broker = broker("berlin", federation());
    connect(&mut broker, "c1", in_berlin());

    let moved = Location::new(52.9, 13.9);
    let out = broker.handle("c1", Payload::PingReq { location: Some(moved) });
    assert_eq!(
        out.sent_to("c1"),
        vec![&Payload::PingResp {
            reason_code: ReasonCode::LocationUpdated
        }]
    );
    assert_eq!(broker.directory().location("c1"), Some(moved));

    let out = broker.handle("stranger", Payload::PingReq { location: Some(moved) });
    assert_eq!(
        out.sent_to("stranger"),
        vec![&Payload::PingResp {
            reason_code: ReasonCode::NotConnectedOrNoLocation
        }]
    );
    assert!(!broker.directory().contains("stranger"));
}

#[test]
fn test_pingreq_outside_area_evicts() {
    let mut broker = broker("berlin", federation());
    connect(&mut broker, "c1", in_berlin());
    subscribe(&mut broker, "c1", "news", Geofence::world());

    let out = broker.handle(
        "c1",
        Payload::PingReq {
            location: Some(in_paris()),
        },
    );
    assert_eq!(
        out.sent_to("c1"),
        vec![&Payload::Disconnect {
            reason_code: ReasonCode::WrongBroker,
            broker_info: Some(paris()),
        }]
    );
    assert!(!broker.directory().contains("c1"));
    assert_eq!(broker.index().subscription_count(&Topic::new("news")), 0);
}

#[test]
fn test_subscribe_requires_connection() {
    let mut broker = broker("berlin", federation());
    let out = broker.handle(
        "ghost",
        Payload::Subscribe {
            topic: Topic::new("news"),
            geofence: Geofence::world(),
        },
    );
    assert_eq!(
        out.sent_to("ghost"),
        vec![&Payload::SubAck {
            reason_code: ReasonCode::NotConnectedOrNoLocation
        }]
    );
    assert!(broker.index().is_empty());
}

#[test]
fn test_resubscribe_replaces_geofence() {
    let mut broker = broker("berlin", edge_areas());
    connect(&mut broker, "sub", in_berlin());
    connect(&mut broker, "near", Location::new(52.1, 13.1));
    connect(&mut broker, "far", Location::new(52.9, 13.9));

    subscribe(&mut broker, "sub", "alerts", Geofence::circle(Location::new(52.1, 13.1), 0.05));
    subscribe(&mut broker, "sub", "alerts", Geofence::circle(Location::new(52.9, 13.9), 0.05));

    let topic = Topic::new("alerts");
    assert_eq!(broker.index().subscription_count(&topic), 1);
    assert_eq!(broker.directory().subscription_count("sub"), 1);

    let fence = Geofence::rectangle(Location::new(52.0, 13.0), Location::new(53.0, 14.0));
    let out = broker.handle("near", Payload::publish("alerts", fence.clone(), "x"));
    assert!(out.sent_to("sub").is_empty());
    assert_eq!(out.sent_to("near"), vec![&puback(ReasonCode::NoMatchingSubscribers)]);

    let out = broker.handle("far", Payload::publish("alerts", fence.clone(), "y"));
    assert_eq!(out.sent_to("sub"), vec![&Payload::publish("alerts", fence, "y")]);
    assert_eq!(out.sent_to("far"), vec![&puback(ReasonCode::Success)]);
}

#[test]
fn test_unsubscribe() {
    let mut broker = broker("berlin", federation());
    connect(&mut broker, "c1", in_berlin());
    subscribe(&mut broker, "c1", "news", Geofence::world());

    let unsubscribe = Payload::Unsubscribe {
        topic: Topic::new("news"),
    };
    let out = broker.handle("c1", unsubscribe.clone());
    assert_eq!(
        out.sent_to("c1"),
        vec![&Payload::UnsubAck {
            reason_code: ReasonCode::Success
        }]
    );
    assert!(broker.index().is_empty());

    let out = broker.handle("c1", unsubscribe);
    assert_eq!(
        out.sent_to("c1"),
        vec![&Payload::UnsubAck {
            reason_code: ReasonCode::NoSubscriptionExisted
        }]
    );
}

#[test]
fn test_double_containment_matching() {
    let mut broker = broker("berlin", edge_areas());
    let subscriber_at = Location::new(52.2, 13.2);
    let publisher_at = Location::new(52.8, 13.8);
    connect(&mut broker, "sub", subscriber_at);
    connect(&mut broker, "pub", publisher_at);

    let around_publisher = Geofence::circle(publisher_at, 0.1);
    let around_subscriber = Geofence::circle(subscriber_at, 0.1);

    // subscription geofence contains the publisher, publication geofence misses the subscriber
    subscribe(&mut broker, "sub", "t", around_publisher.clone());
    let out = broker.handle("pub", Payload::publish("t", around_publisher.clone(), "a"));
    assert!(out.sent_to("sub").is_empty());
    assert_eq!(out.sent_to("pub"), vec![&puback(ReasonCode::NoMatchingSubscribers)]);

    // publication geofence reaches the subscriber, subscription geofence misses the publisher
    subscribe(&mut broker, "sub", "t", around_subscriber.clone());
    let out = broker.handle("pub", Payload::publish("t", around_subscriber.clone(), "b"));
    assert!(out.sent_to("sub").is_empty());

    // both hold
    subscribe(&mut broker, "sub", "t", around_publisher);
    let out = broker.handle("pub", Payload::publish("t", around_subscriber.clone(), "c"));
    assert_eq!(
        out.sent_to("sub"),
        vec![&Payload::publish("t", around_subscriber, "c")]
    );
    assert_eq!(out.sent_to("pub"), vec![&puback(ReasonCode::Success)]);

    // other topics never match
    let out = broker.handle("pub", Payload::publish("u", Geofence::world(), "d"));
    assert!(out.sent_to("sub").is_empty());
}

#[test]
fn test_publish_reply_codes() {
    // no peers reachable
    let mut alone = broker("berlin", edge_areas());
    connect(&mut alone, "pub", in_berlin());
    let local_fence = Geofence::circle(in_berlin(), 0.2);
    let out = alone.handle("pub", Payload::publish("t", local_fence, "a"));
    assert_eq!(out.sent_to("pub"), vec![&puback(ReasonCode::NoMatchingSubscribers)]);
    assert!(out.forwards.is_empty());

    // no local match, but paris is reachable
    let wide_fence = Geofence::rectangle(Location::new(48.0, 2.0), Location::new(53.0, 14.0));
    let out = alone.handle("pub", Payload::publish("t", wide_fence.clone(), "b"));
    assert_eq!(
        out.sent_to("pub"),
        vec![&puback(ReasonCode::NoMatchingSubscribersButForwarded)]
    );
    assert_eq!(out.forwards.len(), 1);
    assert_eq!(out.forwards[0].0, paris());
    assert_eq!(
        out.forwards[0].1,
        Payload::BrokerForwardPublish {
            publish: PublishPayload {
                topic: Topic::new("t"),
                geofence: wide_fence.clone(),
                content: "b".to_string(),
            },
            publisher_location: Some(in_berlin()),
        }
    );

    // local match wins even when forwarded
    connect(&mut alone, "sub", Location::new(52.6, 13.6));
    subscribe(&mut alone, "sub", "t", Geofence::world());
    let out = alone.handle("pub", Payload::publish("t", wide_fence, "c"));
    assert_eq!(out.sent_to("pub"), vec![&puback(ReasonCode::Success)]);
    assert_eq!(out.forwards.len(), 1);
}

#[test]
fn test_no_local_matching_outside_own_area() {
    let mut broker = broker("berlin", edge_areas());
    connect(&mut broker, "pub", in_berlin());
    connect(&mut broker, "sub", Location::new(52.6, 13.6));
    subscribe(&mut broker, "sub", "t", Geofence::world());

    let out = broker.handle("pub", Payload::publish("t", Geofence::circle(in_paris(), 0.1), "x"));
    assert!(out.sent_to("sub").is_empty());
    assert_eq!(
        out.sent_to("pub"),
        vec![&puback(ReasonCode::NoMatchingSubscribersButForwarded)]
    );
}

#[test]
fn test_satisfied_request_is_not_forwarded() {
    let wide_fence = Geofence::rectangle(Location::new(48.0, 2.0), Location::new(53.0, 14.0));

    let mut broker = broker("berlin", edge_areas());
    connect(&mut broker, "client", in_berlin());
    connect(&mut broker, "GeoFaaS-berlin", Location::new(52.6, 13.6));
    subscribe(&mut broker, "GeoFaaS-berlin", "functions/sieve/call", Geofence::world());

    let out = broker.handle("client", Payload::publish("functions/sieve/call", wide_fence.clone(), "c"));
    assert_eq!(out.sent_to("GeoFaaS-berlin").len(), 1);
    assert!(out.forwards.is_empty());
    assert_eq!(out.sent_to("client"), vec![&puback(ReasonCode::Success)]);

    // unsatisfied requests still fan out
    let out = broker.handle("client", Payload::publish("functions/other/call", wide_fence.clone(), "c"));
    assert_eq!(out.forwards.len(), 1);

    // results of a local service stay local
    let out = broker.handle(
        "GeoFaaS-berlin",
        Payload::publish("functions/sieve/result", wide_fence.clone(), "r"),
    );
    assert!(out.forwards.is_empty());
    assert_eq!(
        out.sent_to("GeoFaaS-berlin"),
        vec![&puback(ReasonCode::NoMatchingSubscribers)]
    );

    // ...unless the policy is replaced
    let mut unfiltered = Broker::with_policy(
        BrokerAreaRegistry::new("berlin", edge_areas()).unwrap(),
        ForwardAll,
    );
    connect(&mut unfiltered, "GeoFaaS-berlin", Location::new(52.6, 13.6));
    let out = unfiltered.handle(
        "GeoFaaS-berlin",
        Payload::publish("functions/sieve/result", wide_fence, "r"),
    );
    assert_eq!(out.forwards.len(), 1);
}

#[test]
fn test_anonymous_publisher_in_own_area() {
    let mut broker = broker("berlin", federation());
    connect(&mut broker, "sub", in_berlin());
    subscribe(&mut broker, "sub", "t", Geofence::world());

    let out = broker.handle("producer", Payload::publish("t", Geofence::circle(in_berlin(), 0.2), "x"));
    assert_eq!(
        out.sent_to("producer"),
        vec![&puback(ReasonCode::NotConnectedOrNoLocation)]
    );
    assert!(out.sent_to("sub").is_empty());
    assert!(out.forwards.is_empty());
}

#[test]
fn test_anonymous_publisher_elsewhere_is_forwarded() {
    let mut broker = broker("berlin", federation());
    let fence = Geofence::circle(in_paris(), 0.2);
    let out = broker.handle("producer", Payload::publish("t", fence.clone(), "x"));

    assert_eq!(
        out.sent_to("producer"),
        vec![&Payload::Disconnect {
            reason_code: ReasonCode::WrongBroker,
            broker_info: Some(paris()),
        }]
    );
    assert_eq!(
        out.forwards,
        vec![(
            paris(),
            Payload::BrokerForwardPublish {
                publish: PublishPayload {
                    topic: Topic::new("t"),
                    geofence: fence.clone(),
                    content: "x".to_string(),
                },
                publisher_location: fence.centroid(),
            }
        )]
    );
}

#[test]
fn test_broker_forward_publish_matches_and_acks_the_broker() {
    let mut broker = broker("paris", federation());
    connect(&mut broker, "sub", in_paris());
    subscribe(&mut broker, "sub", "t", Geofence::world());

    let publish = PublishPayload {
        topic: Topic::new("t"),
        geofence: Geofence::circle(in_paris(), 0.5),
        content: "hello".to_string(),
    };
    let out = broker.handle(
        "berlin",
        Payload::BrokerForwardPublish {
            publish: publish.clone(),
            publisher_location: Some(in_berlin()),
        },
    );
    assert_eq!(out.sent_to("sub"), vec![&Payload::Publish(publish.clone())]);
    assert_eq!(out.sent_to("berlin"), vec![&puback(ReasonCode::Success)]);
    assert!(out.forwards.is_empty());

    let out = broker.handle(
        "berlin",
        Payload::BrokerForwardPublish {
            publish,
            publisher_location: None,
        },
    );
    assert_eq!(out.sent_to("berlin"), vec![&puback(ReasonCode::ProtocolError)]);
    assert!(out.sent_to("sub").is_empty());
}

#[test]
fn test_inert_forward_handlers() {
    let mut broker = broker("paris", federation());
    connect(&mut broker, "c1", in_paris());

    let payloads = vec![
        Payload::BrokerForwardDisconnect {
            client_id: "c1".to_string(),
            reason_code: ReasonCode::NormalDisconnection,
        },
        Payload::BrokerForwardPingreq {
            client_id: "c1".to_string(),
            location: Some(in_berlin()),
        },
        Payload::BrokerForwardSubscribe {
            client_id: "c1".to_string(),
            topic: Topic::new("t"),
            geofence: Geofence::world(),
        },
        Payload::BrokerForwardUnsubscribe {
            client_id: "c1".to_string(),
            topic: Topic::new("t"),
        },
    ];
    for payload in payloads {
        assert!(broker.handle("berlin", payload).is_empty());
    }
    assert_eq!(broker.directory().location("c1"), Some(in_paris()));
    assert!(broker.index().is_empty());
}

#[test]
fn test_registry_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("areas.json");
    std::fs::write(&path, serde_json::to_string(&federation()).unwrap()).unwrap();

    let registry = BrokerAreaRegistry::from_file("paris", &path).unwrap();
    assert_eq!(registry.own_info(), &paris());
    assert!(!registry.is_root());
    assert_eq!(registry.other_infos().count(), 2);

    assert!(BrokerAreaRegistry::from_file("lyon", &path).is_err());
    assert!(BrokerAreaRegistry::from_file("paris", dir.path().join("missing.json")).is_err());
}

#[test]
fn test_example_registry_file() {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("config/areas.example.json");
    let root = BrokerAreaRegistry::from_file("cloud", &path).unwrap();
    assert!(root.is_root());
    assert!(!root.is_responsible_for(Some(&Location::new(48.86, 2.35))));
    assert!(root.is_responsible_for(Some(&at_sea())));

    let berlin = BrokerAreaRegistry::from_file("berlin", &path).unwrap();
    assert_eq!(
        berlin.other_broker_containing(Some(&Location::new(48.9, 2.4))).map(|b| b.broker_id.as_str()),
        Some("paris")
    );
}
