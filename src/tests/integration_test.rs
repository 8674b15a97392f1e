use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{PublisherSettings, RegistrySettings};
use crate::node::Node;
use crate::protocol::{Priority, QosLevel};
use crate::publisher::RetryPolicy;
use crate::registry::{Registry, RegistryServer};
use crate::subscriber::{SubscriberOptions, SubscriptionFilter};

async fn spawn_registry(settings: RegistrySettings) -> SocketAddr {
    let server = RegistryServer::bind("127.0.0.1:0", Registry::new(&settings))
        .await
        .unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(server.run());
    addr
}

fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        ack_timeout: Duration::from_millis(200),
    }
}

#[tokio::test]
async fn integration_at_least_once_end_to_end() {
    let registry = spawn_registry(RegistrySettings::default()).await;

    let sub_node = Node::bind("subscriber", "127.0.0.1:0").await.unwrap();
    let subscriber = sub_node
        .create_subscriber(
            registry,
            SubscriberOptions::new(["Sports"])
                .filter(SubscriptionFilter::default().keyword("goal"))
                .ack_retries(Duration::from_millis(100), 2),
        )
        .await
        .unwrap();

    // let the SUBSCRIBE land before publishing
    tokio::time::sleep(Duration::from_millis(100)).await;

    let pub_node = Node::bind("publisher", "127.0.0.1:0").await.unwrap();
    let publisher = pub_node
        .create_publisher(
            registry,
            "Sports",
            QosLevel::AtLeastOnce,
            &PublisherSettings::default(),
        )
        .with_retry_policy(fast_retry());

    let acked = publisher
        .publish("Messi scored a goal!", 101, Priority::High)
        .await
        .unwrap();
    assert!(acked, "ACK should be relayed back through the registry");

    let accepted = subscriber.accepted();
    assert_eq!(accepted.len(), 1);
    assert_eq!(accepted[0].topic, "Sports");
    assert_eq!(accepted[0].message_id, 101);
    assert_eq!(accepted[0].content, "Messi scored a goal!");
    // the registry forwards the minimal form by default
    assert_eq!(accepted[0].priority, None);

    subscriber.stop().await;
}

#[tokio::test]
async fn integration_publish_without_subscribers_is_not_acked() {
    let registry = spawn_registry(RegistrySettings::default()).await;

    let pub_node = Node::bind("publisher", "127.0.0.1:0").await.unwrap();
    let publisher = pub_node
        .create_publisher(
            registry,
            "Weather",
            QosLevel::AtLeastOnce,
            &PublisherSettings {
                enable_filtering: false,
                ..PublisherSettings::default()
            },
        )
        .with_retry_policy(RetryPolicy {
            max_attempts: 2,
            ack_timeout: Duration::from_millis(100),
        });

    let acked = publisher.publish("Sunny", 1, Priority::Low).await.unwrap();
    assert!(!acked);
}

#[tokio::test]
async fn integration_forwarded_metadata_feeds_priority_filter() {
    let registry = spawn_registry(RegistrySettings {
        forward_metadata: true,
        ..RegistrySettings::default()
    })
    .await;

    let sub_node = Node::bind("subscriber", "127.0.0.1:0").await.unwrap();
    let subscriber = sub_node
        .create_subscriber(
            registry,
            SubscriberOptions::new(["Sports"])
                .filter(SubscriptionFilter::default().high_priority_only(true)),
        )
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    // publisher and subscriber may share a node
    let publisher = Arc::new(sub_node.create_publisher(
        registry,
        "Sports",
        QosLevel::AtMostOnce,
        &PublisherSettings::default(),
    ));

    assert!(publisher.publish("goal by the keeper", 1, Priority::Medium).await.unwrap());
    assert!(publisher.publish("late goal", 2, Priority::High).await.unwrap());
    tokio::time::sleep(Duration::from_millis(200)).await;

    let ids: Vec<u32> = subscriber.accepted().iter().map(|m| m.message_id).collect();
    assert_eq!(ids, vec![2]);
    assert_eq!(subscriber.accepted()[0].priority, Some(Priority::High));

    subscriber.stop().await;
}

#[tokio::test]
async fn integration_unsubscribe_stops_delivery() {
    let registry = spawn_registry(RegistrySettings::default()).await;

    let first = Node::bind("first", "127.0.0.1:0").await.unwrap();
    let second = Node::bind("second", "127.0.0.1:0").await.unwrap();
    let a = first
        .create_subscriber(registry, SubscriberOptions::new(["Sports"]))
        .await
        .unwrap();
    let b = second
        .create_subscriber(registry, SubscriberOptions::new(["Sports"]))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let pub_node = Node::bind("publisher", "127.0.0.1:0").await.unwrap();
    let publisher = pub_node.create_publisher(
        registry,
        "Sports",
        QosLevel::AtMostOnce,
        &PublisherSettings::default(),
    );

    publisher.publish("first goal", 1, Priority::High).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(a.accepted().len(), 1);
    assert_eq!(b.accepted().len(), 1);

    b.stop().await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    publisher.publish("second goal", 2, Priority::High).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(a.accepted().len(), 2);
    assert_eq!(b.accepted().len(), 1);

    a.stop().await;
}
