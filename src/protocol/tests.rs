use super::codec::{CodecError, MAX_DATAGRAM_SIZE, Packet, decode, encode};
use super::message::{Message, Priority, QosLevel};

#[test]
fn test_decode_subscribe() {
    let packet = decode("SUBSCRIBE:Sports").unwrap();
    assert_eq!(
        packet,
        Packet::Subscribe {
            topic: "Sports".to_string()
        }
    );
}

#[test]
fn test_topics_are_case_sensitive() {
    let lower = decode("SUBSCRIBE:sports").unwrap();
    let upper = decode("SUBSCRIBE:Sports").unwrap();
    assert_ne!(lower, upper);
}

#[test]
fn test_decode_minimal_publish() {
    let packet = decode("PUBLISH:Sports:Messi scored a goal!:101").unwrap();
    match packet {
        Packet::Publish(msg) => {
            assert_eq!(msg.topic, "Sports");
            assert_eq!(msg.content, "Messi scored a goal!");
            assert_eq!(msg.message_id, 101);
            assert_eq!(msg.priority, None);
            assert_eq!(msg.timestamp, None);
        }
        other => panic!("Expected PUBLISH, got {other:?}"),
    }
}

#[test]
fn test_decode_full_publish() {
    let packet = decode("PUBLISH:Sports:Messi scored a goal!:101:HIGH:1725000000000").unwrap();
    match packet {
        Packet::Publish(msg) => {
            assert_eq!(msg.message_id, 101);
            assert_eq!(msg.priority, Some(Priority::High));
            assert_eq!(msg.timestamp, Some(1_725_000_000_000));
        }
        other => panic!("Expected PUBLISH, got {other:?}"),
    }
}

#[test]
fn test_decode_ack_with_trailing_newline() {
    assert_eq!(
        decode("ACK:101\n").unwrap(),
        Packet::Ack { message_id: 101 }
    );
}

#[test]
fn test_publish_roundtrip_preserves_fields() {
    let original = Message::new("Sports", "Messi scored a goal!", 101, Priority::High);
    let line = encode(&Packet::Publish(original.clone())).unwrap();
    assert!(line.starts_with("PUBLISH:Sports:Messi scored a goal!:101:HIGH:"));

    match decode(&line).unwrap() {
        Packet::Publish(decoded) => assert_eq!(decoded, original),
        other => panic!("Expected PUBLISH, got {other:?}"),
    }
}

#[test]
fn test_minimal_publish_encodes_four_fields() {
    let msg = Message::new("Sports", "kickoff", 7, Priority::Low).minimal();
    let line = encode(&Packet::Publish(msg)).unwrap();
    assert_eq!(line, "PUBLISH:Sports:kickoff:7");
}

#[test]
fn test_delimiter_in_content_is_escaped() {
    let msg = Message::new("Scores", "Final: 2:1 (100%)", 9, Priority::Medium);
    let line = encode(&Packet::Publish(msg.clone())).unwrap();

    assert_eq!(line.split(':').count(), 6);
    assert!(line.contains("Final%3A 2%3A1 (100%25)"));

    match decode(&line).unwrap() {
        Packet::Publish(decoded) => assert_eq!(decoded.content, "Final: 2:1 (100%)"),
        other => panic!("Expected PUBLISH, got {other:?}"),
    }
}

#[test]
fn test_unescaped_percent_is_kept_literally() {
    match decode("PUBLISH:Deals:50% off, 100%e:3").unwrap() {
        Packet::Publish(msg) => assert_eq!(msg.content, "50% off, 100%e"),
        other => panic!("Expected PUBLISH, got {other:?}"),
    }
}

#[test]
fn test_malformed_datagrams_are_rejected() {
    assert_eq!(decode(""), Err(CodecError::Empty));
    assert!(matches!(
        decode("HELLO:world"),
        Err(CodecError::UnknownKind(kind)) if kind == "HELLO"
    ));
    assert!(matches!(
        decode("PUBLISH:Sports:goal"),
        Err(CodecError::FieldCount { found: 3, .. })
    ));
    assert!(matches!(
        decode("PUBLISH:Sports:goal:1:HIGH"),
        Err(CodecError::FieldCount { found: 5, .. })
    ));
    assert!(matches!(
        decode("PUBLISH:Sports:goal:abc"),
        Err(CodecError::InvalidId(_))
    ));
    assert!(matches!(
        decode("PUBLISH:Sports:goal:1:URGENT:5"),
        Err(CodecError::InvalidPriority(p)) if p == "URGENT"
    ));
    assert!(matches!(
        decode("PUBLISH:Sports:goal:1:HIGH:yesterday"),
        Err(CodecError::InvalidTimestamp(_))
    ));
    assert_eq!(decode("SUBSCRIBE:"), Err(CodecError::EmptyField("topic")));
    assert!(matches!(decode("ACK:1:2"), Err(CodecError::FieldCount { .. })));
}

#[test]
fn test_oversize_datagram_is_rejected_on_encode() {
    let content = "g".repeat(MAX_DATAGRAM_SIZE);
    let msg = Message::new("Sports", &content, 1, Priority::Low);
    assert!(matches!(
        encode(&Packet::Publish(msg)),
        Err(CodecError::Oversize(_))
    ));
}

#[test]
fn test_priority_order_and_names() {
    assert!(Priority::High > Priority::Medium);
    assert!(Priority::Medium > Priority::Low);
    assert_eq!("HIGH".parse::<Priority>(), Ok(Priority::High));
    assert!("high".parse::<Priority>().is_err());
    assert_eq!(Priority::Medium.to_string(), "MEDIUM");
}

#[test]
fn test_qos_level_parsing() {
    assert_eq!("at_least_once".parse::<QosLevel>(), Ok(QosLevel::AtLeastOnce));
    assert_eq!("AT-MOST-ONCE".parse::<QosLevel>(), Ok(QosLevel::AtMostOnce));
    assert_eq!("2".parse::<QosLevel>(), Ok(QosLevel::ExactlyOnce));
    assert!("sometimes".parse::<QosLevel>().is_err());
}

#[test]
fn test_message_age_uses_embedded_timestamp() {
    let mut msg = Message::new("Sports", "goal", 1, Priority::High);
    msg.timestamp = Some(1_000);
    assert_eq!(msg.age_ms(61_000), Some(60_000));
    assert_eq!(msg.age_ms(500), Some(0));
    assert_eq!(msg.minimal().age_ms(61_000), None);
}

#[test]
fn test_message_age_saturates_on_extreme_timestamps() {
    let mut msg = Message::new("Sports", "bad", 1, Priority::High);
    msg.timestamp = Some(i64::MIN);
    assert_eq!(msg.age_ms(1_000), Some(i64::MAX));
    msg.timestamp = Some(i64::MAX);
    assert_eq!(msg.age_ms(-1_000), Some(0));
}

#[test]
fn test_priority_without_timestamp_is_not_encoded() {
    let mut msg = Message::new("Sports", "goal", 1, Priority::High);
    msg.timestamp = None;
    assert_eq!(
        encode(&Packet::Publish(msg.clone())),
        Err(CodecError::PartialMetadata)
    );

    msg.priority = None;
    msg.timestamp = Some(1_000);
    assert_eq!(
        encode(&Packet::Publish(msg)),
        Err(CodecError::PartialMetadata)
    );
}
