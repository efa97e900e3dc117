//! Integration tests for event fan-out through the gateway.
//!
//! A backend publishes entity events through a [`GatewayHandle`]; topic
//! subscribers receive them as decoded [`PushEvent`]s, and the session
//! model absorbs duplicates idempotently.

use atrium_sync::api::InitData;
use atrium_sync::client::{PushClient, PushEvent};
use atrium_sync::connection::Connection;
use atrium_sync::events::{consume, InboundEvent};
use atrium_sync::presence::Participant;
use atrium_sync::server::{GatewayConfig, GatewayHandle, PushGateway};
use atrium_sync::session::SessionModel;
use atrium_sync::types::{Post, Room, Space, User};
use chrono::{FixedOffset, TimeZone};
use tokio::sync::mpsc;
use tokio::time::{timeout, Duration};
use uuid::Uuid;

async fn free_port() -> u16 {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

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

async fn connect_and_join(
    name: &str,
    url: &str,
    topic: &str,
) -> (PushClient, mpsc::Receiver<PushEvent>) {
    let identity = Participant::new(Uuid::new_v4(), name);
    let mut client = PushClient::new(identity, url);
    let mut events = client.take_event_rx().unwrap();
    client.connect().await.unwrap();
    client.join(topic).await.unwrap();
    // Drain the Connected event and the join's own snapshot.
    let deadline = Duration::from_millis(500);
    while let Ok(Some(event)) = timeout(deadline, events.recv()).await {
        if matches!(event, PushEvent::Presence { .. }) {
            break;
        }
    }
    (client, events)
}

async fn next_inbound_event(events: &mut mpsc::Receiver<PushEvent>) -> InboundEvent {
    let result = timeout(Duration::from_secs(3), async {
        loop {
            match events.recv().await {
                Some(PushEvent::Event(event)) => return event,
                Some(_) => continue,
                None => panic!("event channel closed"),
            }
        }
    })
    .await;
    result.expect("no inbound event within deadline")
}

fn model_for(room: &Room, space: &Space) -> SessionModel {
    SessionModel::from_init(InitData {
        viewer: User::new("viewer", "Viewer"),
        space: space.clone(),
        room: room.clone(),
        bookmarks: Vec::new(),
        posts: Connection::default(),
        now: FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2024, 3, 1, 9, 0, 0)
            .unwrap(),
    })
}

fn fixtures() -> (Space, Room) {
    let space = Space {
        id: Uuid::new_v4(),
        slug: "acme".into(),
        name: "Acme".into(),
    };
    let room = Room {
        id: Uuid::new_v4(),
        space_id: space.id,
        name: "general".into(),
        purpose: None,
    };
    (space, room)
}

#[tokio::test]
async fn test_published_event_reaches_all_subscribers() {
    let (port, handle) = start_test_gateway().await;
    let url = format!("ws://127.0.0.1:{port}");
    let (space, room) = fixtures();
    let topic = format!("rooms:{}", room.id);

    let (_alice, mut alice_events) = connect_and_join("Alice", &url, &topic).await;
    let (_bob, mut bob_events) = connect_and_join("Bob", &url, &topic).await;
    // Bob's join re-snapshots Alice; give the frames a moment to settle.
    tokio::time::sleep(Duration::from_millis(100)).await;

    let post = Post::new(room.id, User::new("carol", "Carol"), "shipped!");
    let event = InboundEvent::PostCreated {
        room_id: room.id,
        post: post.clone(),
    };
    let delivered = handle.publish(&topic, &event).await.unwrap();
    assert!(delivered >= 2, "expected both subscribers, got {delivered}");

    let got_alice = next_inbound_event(&mut alice_events).await;
    let got_bob = next_inbound_event(&mut bob_events).await;
    assert_eq!(got_alice, event);
    assert_eq!(got_bob, event);

    // Feeding the event into a session model lands the post once.
    let mut model = model_for(&room, &space);
    consume(&mut model, &got_alice);
    assert!(model.posts.contains(post.id));
}

#[tokio::test]
async fn test_duplicate_delivery_lands_once() {
    let (port, handle) = start_test_gateway().await;
    let url = format!("ws://127.0.0.1:{port}");
    let (space, room) = fixtures();
    let topic = format!("rooms:{}", room.id);

    let (_alice, mut alice_events) = connect_and_join("Alice", &url, &topic).await;

    let post = Post::new(room.id, User::new("carol", "Carol"), "once only");
    let event = InboundEvent::PostCreated {
        room_id: room.id,
        post: post.clone(),
    };
    // The transport may deliver duplicates; publish twice to force it.
    handle.publish(&topic, &event).await.unwrap();
    handle.publish(&topic, &event).await.unwrap();

    let mut model = model_for(&room, &space);
    consume(&mut model, &next_inbound_event(&mut alice_events).await);
    consume(&mut model, &next_inbound_event(&mut alice_events).await);

    assert_eq!(model.posts.len(), 1);
}

#[tokio::test]
async fn test_event_scoped_to_its_topic() {
    let (port, handle) = start_test_gateway().await;
    let url = format!("ws://127.0.0.1:{port}");
    let (_space, room) = fixtures();
    let topic = format!("rooms:{}", room.id);
    let other_topic = format!("rooms:{}", Uuid::new_v4());

    let (_bob, mut bob_events) = connect_and_join("Bob", &url, &other_topic).await;

    let post = Post::new(room.id, User::new("carol", "Carol"), "not for bob");
    handle
        .publish(
            &topic,
            &InboundEvent::PostCreated {
                room_id: room.id,
                post,
            },
        )
        .await
        .unwrap();

    // Bob is subscribed elsewhere and must see nothing.
    let got = timeout(Duration::from_millis(300), async {
        loop {
            match bob_events.recv().await {
                Some(PushEvent::Event(event)) => return Some(event),
                Some(_) => continue,
                None => return None,
            }
        }
    })
    .await;
    assert!(got.is_err(), "event leaked across topics: {got:?}");
}

#[tokio::test]
async fn test_publish_counts_subscribers() {
    let (port, handle) = start_test_gateway().await;
    let url = format!("ws://127.0.0.1:{port}");
    let (_space, room) = fixtures();
    let topic = format!("rooms:{}", room.id);

    let event = InboundEvent::PostDeleted {
        room_id: room.id,
        post_id: Uuid::new_v4(),
    };
    assert_eq!(handle.publish(&topic, &event).await.unwrap(), 0);

    let (_alice, _alice_events) = connect_and_join("Alice", &url, &topic).await;
    assert_eq!(handle.publish(&topic, &event).await.unwrap(), 1);
}
