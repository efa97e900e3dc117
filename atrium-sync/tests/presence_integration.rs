//! Integration tests for presence over the real push transport.
//!
//! These start a real gateway on a free port and connect real clients,
//! verifying join/leave snapshot fan-out, topic isolation, and the
//! teardown-while-joining ordering guarantee.

use atrium_sync::presence::{Participant, PresenceTracker};
use atrium_sync::client::{PushClient, PushEvent};
use atrium_sync::server::{GatewayConfig, GatewayHandle, PushGateway};
use tokio::sync::mpsc;
use tokio::time::{timeout, Duration};
use uuid::Uuid;

/// Find a free port for testing.
async fn free_port() -> u16 {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

/// Start a gateway on a free port, return the port and its handle.
async fn start_test_gateway() -> (u16, GatewayHandle) {
    let port = free_port().await;
    let config = GatewayConfig {
        bind_addr: format!("127.0.0.1:{port}"),
        hub_capacity: 64,
        max_members_per_topic: 10,
    };
    let gateway = PushGateway::new(config);
    let handle = gateway.handle();
    tokio::spawn(async move {
        gateway.run().await.unwrap();
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    (port, handle)
}

/// Connect a client to the test gateway, draining the Connected event.
async fn connect_client(name: &str, url: &str) -> (PushClient, mpsc::Receiver<PushEvent>) {
    let identity = Participant::new(Uuid::new_v4(), name);
    let mut client = PushClient::new(identity, url);
    let mut events = client.take_event_rx().unwrap();
    client.connect().await.unwrap();
    match timeout(Duration::from_secs(1), events.recv()).await {
        Ok(Some(PushEvent::Connected)) => {}
        other => panic!("expected Connected, got {other:?}"),
    }
    (client, events)
}

/// Wait until a presence snapshot for `topic` with exactly `count`
/// participants arrives.
async fn wait_for_roster(
    events: &mut mpsc::Receiver<PushEvent>,
    topic: &str,
    count: usize,
) -> Vec<Participant> {
    let result = timeout(Duration::from_secs(3), async {
        loop {
            match events.recv().await {
                Some(PushEvent::Presence {
                    topic: seen,
                    participants,
                }) if seen == topic && participants.len() == count => {
                    return participants;
                }
                Some(_) => continue,
                None => panic!("event channel closed while waiting for roster"),
            }
        }
    })
    .await;
    result.unwrap_or_else(|_| panic!("no roster of size {count} for {topic} within deadline"))
}

// ─── Join / leave snapshot fan-out ───────────────────────────────

#[tokio::test]
async fn test_join_broadcasts_full_roster_to_everyone() {
    let (port, _handle) = start_test_gateway().await;
    let url = format!("ws://127.0.0.1:{port}");
    let topic = format!("rooms:{}", Uuid::new_v4());

    let (alice, mut alice_events) = connect_client("Alice", &url).await;
    alice.join(&topic).await.unwrap();
    let roster = wait_for_roster(&mut alice_events, &topic, 1).await;
    assert_eq!(roster[0].name, "Alice");

    let (bob, mut bob_events) = connect_client("Bob", &url).await;
    bob.join(&topic).await.unwrap();

    // Both the joiner and the existing member see the two-person roster.
    let seen_by_bob = wait_for_roster(&mut bob_events, &topic, 2).await;
    let seen_by_alice = wait_for_roster(&mut alice_events, &topic, 2).await;

    let mut names_bob: Vec<String> = seen_by_bob.into_iter().map(|p| p.name).collect();
    let mut names_alice: Vec<String> = seen_by_alice.into_iter().map(|p| p.name).collect();
    names_bob.sort();
    names_alice.sort();
    assert_eq!(names_bob, vec!["Alice", "Bob"]);
    assert_eq!(names_alice, vec!["Alice", "Bob"]);
}

#[tokio::test]
async fn test_leave_shrinks_the_roster() {
    let (port, _handle) = start_test_gateway().await;
    let url = format!("ws://127.0.0.1:{port}");
    let topic = format!("rooms:{}", Uuid::new_v4());

    let (alice, mut alice_events) = connect_client("Alice", &url).await;
    let (bob, mut bob_events) = connect_client("Bob", &url).await;
    alice.join(&topic).await.unwrap();
    bob.join(&topic).await.unwrap();
    wait_for_roster(&mut alice_events, &topic, 2).await;
    wait_for_roster(&mut bob_events, &topic, 2).await;

    bob.leave(&topic).await.unwrap();

    let roster = wait_for_roster(&mut alice_events, &topic, 1).await;
    assert_eq!(roster[0].name, "Alice");
}

#[tokio::test]
async fn test_disconnect_acts_as_leave() {
    let (port, handle) = start_test_gateway().await;
    let url = format!("ws://127.0.0.1:{port}");
    let topic = format!("rooms:{}", Uuid::new_v4());

    let (alice, mut alice_events) = connect_client("Alice", &url).await;
    alice.join(&topic).await.unwrap();
    wait_for_roster(&mut alice_events, &topic, 1).await;

    {
        let (bob, mut bob_events) = connect_client("Bob", &url).await;
        bob.join(&topic).await.unwrap();
        wait_for_roster(&mut bob_events, &topic, 2).await;
        // Bob's client drops here without an explicit leave.
    }

    let roster = wait_for_roster(&mut alice_events, &topic, 1).await;
    assert_eq!(roster[0].name, "Alice");
    let server_roster = handle.roster(&topic).await.unwrap();
    assert_eq!(server_roster.len(), 1);
}

// ─── Topic isolation ─────────────────────────────────────────────

#[tokio::test]
async fn test_snapshots_stay_inside_their_topic() {
    let (port, _handle) = start_test_gateway().await;
    let url = format!("ws://127.0.0.1:{port}");
    let topic_x = format!("rooms:{}", Uuid::new_v4());
    let topic_y = format!("rooms:{}", Uuid::new_v4());

    let (alice, mut alice_events) = connect_client("Alice", &url).await;
    let (bob, mut bob_events) = connect_client("Bob", &url).await;
    alice.join(&topic_x).await.unwrap();
    bob.join(&topic_y).await.unwrap();

    wait_for_roster(&mut alice_events, &topic_x, 1).await;
    wait_for_roster(&mut bob_events, &topic_y, 1).await;

    // Nothing about topic X ever reaches Bob, and a tracker viewing Y
    // would ignore it even if it did.
    let mut tracker = PresenceTracker::new(topic_y.clone());
    while let Ok(Some(event)) = timeout(Duration::from_millis(200), bob_events.recv()).await {
        if let PushEvent::Presence {
            topic,
            participants,
        } = event
        {
            assert_ne!(topic, topic_x, "cross-topic snapshot leaked");
            tracker.receive_snapshot(&topic, participants);
        }
    }
    assert_eq!(tracker.topic(), topic_y);
}

// ─── Teardown ordering ───────────────────────────────────────────

#[tokio::test]
async fn test_leave_immediately_after_join_leaves_nothing_behind() {
    let (port, handle) = start_test_gateway().await;
    let url = format!("ws://127.0.0.1:{port}");
    let topic = format!("rooms:{}", Uuid::new_v4());

    let (alice, _alice_events) = connect_client("Alice", &url).await;
    // Teardown races the join: both are queued back to back on the
    // ordered write channel, so the gateway sees join then leave.
    alice.join(&topic).await.unwrap();
    alice.leave(&topic).await.unwrap();

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(handle.roster(&topic).await.is_none());
}

#[tokio::test]
async fn test_leave_for_unjoined_topic_is_noop() {
    let (port, handle) = start_test_gateway().await;
    let url = format!("ws://127.0.0.1:{port}");

    let (alice, _alice_events) = connect_client("Alice", &url).await;
    alice.leave("rooms:never-joined").await.unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(handle.roster("rooms:never-joined").await.is_none());
}
