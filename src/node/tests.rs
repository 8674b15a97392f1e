use super::{AckTable, Node};
use crate::utils::PubSubError;
use std::time::Duration;
use tokio::net::UdpSocket;

#[tokio::test]
async fn test_ack_table_complete_and_cancel() {
    let table = AckTable::default();
    let rx = table.register(101);
    assert!(table.is_waiting(101));
    assert!(table.complete(101));
    assert!(rx.await.is_ok());
    assert!(!table.is_waiting(101));

    // nobody waiting
    assert!(!table.complete(101));

    let _rx = table.register(102);
    table.cancel(102);
    assert!(!table.complete(102));
}

#[tokio::test]
async fn test_ack_table_second_registration_supersedes_first() {
    let table = AckTable::default();
    let first = table.register(7);
    let second = table.register(7);
    assert!(first.await.is_err());
    assert!(table.complete(7));
    assert!(second.await.is_ok());
}

#[tokio::test]
async fn test_bind_with_fallback_skips_taken_port() {
    let taken = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let port = taken.local_addr().unwrap().port();
    // the next port might also be busy on a loaded machine; give the scan room
    let last = port.saturating_add(20);

    let node = Node::bind_with_fallback("fallback", "127.0.0.1", port, last)
        .await
        .unwrap();
    let bound = node.local_addr().unwrap().port();
    assert_ne!(bound, port);
    assert!(bound > port && bound <= last);
}

#[tokio::test]
async fn test_bind_with_fallback_reports_exhausted_range() {
    let taken = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let port = taken.local_addr().unwrap().port();

    let result = Node::bind_with_fallback("busy", "127.0.0.1", port, port).await;
    assert!(matches!(
        result,
        Err(PubSubError::NoFreePort { first, last, .. }) if first == port && last == port
    ));
}

#[tokio::test]
async fn test_inbound_ack_completes_waiter() {
    let node = Node::bind("acker", "127.0.0.1:0").await.unwrap();
    let rx = node.acks().register(55);

    let peer = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    peer.send_to(b"ACK:55", node.local_addr().unwrap())
        .await
        .unwrap();

    tokio::time::timeout(Duration::from_secs(2), rx)
        .await
        .expect("ACK not routed")
        .unwrap();
}

#[tokio::test]
async fn test_publish_is_routed_to_attached_inbox_only() {
    let node = Node::bind("inbox", "127.0.0.1:0").await.unwrap();
    let mut inbox = node.attach_inbox().unwrap();
    assert!(matches!(
        node.attach_inbox(),
        Err(PubSubError::InboxTaken(name)) if name == "inbox"
    ));

    let peer = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let node_addr = node.local_addr().unwrap();
    peer.send_to(b"not a message", node_addr).await.unwrap();
    peer.send_to(b"PUBLISH:Sports:goal:9", node_addr)
        .await
        .unwrap();

    let inbound = tokio::time::timeout(Duration::from_secs(2), inbox.recv())
        .await
        .expect("PUBLISH not routed")
        .unwrap();
    assert_eq!(inbound.message.message_id, 9);
    assert_eq!(inbound.message.content, "goal");
    assert_eq!(inbound.from, peer.local_addr().unwrap());

    node.detach_inbox();
    assert!(node.attach_inbox().is_ok());
}

#[test]
fn test_generated_names_are_unique() {
    let a = Node::generate_name("node");
    let b = Node::generate_name("node");
    assert!(a.starts_with("node-"));
    assert_ne!(a, b);
}

#[tokio::test]
async fn test_dropped_wait_releases_only_its_own_registration() {
    let table = AckTable::default();

    let wait = table.register(11);
    drop(wait);
    assert!(!table.is_waiting(11));

    let old = table.register(12);
    let new = table.register(12);
    drop(old);
    assert!(table.is_waiting(12));
    assert!(table.complete(12));
    assert!(new.await.is_ok());
}
