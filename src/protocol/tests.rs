use super::function::{FunctionAction, FunctionMessage, RequestId, ResponseTopic, TypeCode, function_topic};
use super::{BrokerInfo, Frame, Payload, PayloadKind, ReasonCode, Topic};
use crate::geo::{Geofence, Location};

#[test]
fn test_payload_json_is_tagged() {
    let payload = Payload::Disconnect {
        reason_code: ReasonCode::WrongBroker,
        broker_info: Some(BrokerInfo::new("paris", "10.0.0.2:5559")),
    };
    let value = serde_json::to_value(&payload).unwrap();
    assert_eq!(value["type"], "disconnect");
    assert_eq!(value["reason_code"], "WrongBroker");
    assert_eq!(value["broker_info"]["broker_id"], "paris");
}

#[test]
fn test_publish_frame_decodes_from_wire_text() {
    let text = r#"{
        "sender": "client-1",
        "payload": {
            "type": "publish",
            "topic": "sensors/temp",
            "geofence": {"shape": "circle", "center": {"lat": 1.0, "lon": 2.0}, "radius": 0.5},
            "content": "21.5"
        }
    }"#;
    let frame = Frame::decode(text).unwrap();
    assert_eq!(frame.sender, "client-1");
    match frame.payload {
        Payload::Publish(publish) => {
            assert_eq!(publish.topic, Topic::new("sensors/temp"));
            assert_eq!(publish.content, "21.5");
            assert!(publish.geofence.contains(&Location::new(1.0, 2.0)));
        }
        other => panic!("Expected publish, got {other:?}"),
    }
}

#[test]
fn test_connect_without_location() {
    let frame = Frame::decode(r#"{"sender":"c","payload":{"type":"connect","location":null}}"#).unwrap();
    assert_eq!(frame.payload, Payload::Connect { location: None });
}

#[test]
fn test_kind_and_reason_code() {
    let ack = Payload::SubAck {
        reason_code: ReasonCode::GrantedQoS0,
    };
    assert_eq!(ack.kind(), PayloadKind::SubAck);
    assert_eq!(ack.reason_code(), Some(ReasonCode::GrantedQoS0));

    let publish = Payload::publish("a/b", Geofence::Undefined, "x");
    assert_eq!(publish.kind(), PayloadKind::Publish);
    assert_eq!(publish.reason_code(), None);
}

#[test]
fn test_topic_last_level() {
    let topic = Topic::new("functions/sieve/result");
    assert!(topic.ends_with_level("result"));
    assert!(!topic.ends_with_level("sieve/result2"));
    assert!(!Topic::new("functions/sieve/noresult").ends_with_level("result"));
    assert!(Topic::new("result").ends_with_level("result"));
}

#[test]
fn test_function_message_content() {
    let fence = Geofence::circle(Location::new(52.5, 13.4), 0.1);
    let msg = FunctionMessage {
        func_name: "sieve".to_string(),
        action: FunctionAction::Call,
        data: "100".to_string(),
        type_code: TypeCode::Normal,
        response_topic: ResponseTopic {
            topic: function_topic("sieve", FunctionAction::Result),
            fence,
        },
        sender_id: "client1".to_string(),
        receiver_id: String::new(),
        req_id: RequestId::new(3, "client1").at("berlin"),
    };
    let content = msg.encode().unwrap();
    let value: serde_json::Value = serde_json::from_str(&content).unwrap();
    assert_eq!(value["action"], "CALL");
    assert_eq!(value["response_topic"]["topic"], "functions/sieve/result");
    assert_eq!(FunctionMessage::decode(&content).unwrap(), msg);
    assert_eq!(msg.req_id.to_string(), "client1#3");
}
