use super::message::{PostRequest, ServerMessage, UserRequest};
use super::websocket::{Connection, Service};
use super::{PostsService, UsersService};
use crate::bus::{Event, EventBus, POST_CREATED};
use crate::gateway::MutationGateway;
use crate::store::{NewPost, PostStore, SledStore};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tungstenite::protocol::Message as WsMessage;

fn posts_service() -> (PostsService<SledStore>, Arc<SledStore>, Arc<EventBus>) {
    let store = Arc::new(SledStore::temporary().unwrap());
    let bus = Arc::new(EventBus::default());
    let gateway = MutationGateway::new(store.clone(), bus.clone());
    (PostsService::new(gateway), store, bus)
}

fn connection() -> (Connection, mpsc::Receiver<WsMessage>) {
    connection_with_capacity(64)
}

fn connection_with_capacity(capacity: usize) -> (Connection, mpsc::Receiver<WsMessage>) {
    let (tx, rx) = mpsc::channel(capacity);
    (Connection::new(tx), rx)
}

fn decode(msg: WsMessage) -> ServerMessage {
    match msg {
        WsMessage::Text(text) => serde_json::from_str(text.as_str()).unwrap(),
        other => panic!("Expected a text message, got {other:?}"),
    }
}

fn reply(rx: &mut mpsc::Receiver<WsMessage>) -> ServerMessage {
    decode(rx.try_recv().unwrap())
}

async fn next_frame(rx: &mut mpsc::Receiver<WsMessage>) -> ServerMessage {
    let msg = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for a frame")
        .expect("outbound channel closed");
    decode(msg)
}

// Parses a raw frame the way the server does before handing it to a service.
fn handle_json<S: Service>(service: &S, conn: &mut Connection, msg: serde_json::Value) {
    let request: S::Request = serde_json::from_value(msg).unwrap();
    service.handle(conn, request);
}

#[test]
fn test_request_wire_shapes() {
    let req: PostRequest = serde_json::from_value(json!({ "type": "posts" })).unwrap();
    assert_eq!(req, PostRequest::Posts);

    let req: PostRequest = serde_json::from_value(json!({
        "type": "create_post",
        "title": "A",
        "content": "B",
        "ownerId": "u1"
    }))
    .unwrap();
    assert_eq!(
        req,
        PostRequest::CreatePost {
            title: "A".to_string(),
            content: "B".to_string(),
            owner_id: "u1".to_string(),
        }
    );

    let req: PostRequest =
        serde_json::from_value(json!({ "type": "update_post", "id": "3", "title": "T" })).unwrap();
    assert_eq!(
        req,
        PostRequest::UpdatePost {
            id: "3".to_string(),
            title: Some("T".to_string()),
            content: None,
        }
    );

    let req: UserRequest =
        serde_json::from_value(json!({ "type": "create_user", "name": "Ada", "email": "a@b.c" }))
            .unwrap();
    assert!(matches!(req, UserRequest::CreateUser { .. }));
}

#[test]
fn test_event_frame_shape() {
    let (service, _store, _bus) = posts_service();
    let (mut conn, mut rx) = connection();
    handle_json(
        &service,
        &mut conn,
        json!({ "type": "create_post", "title": "A", "content": "B", "ownerId": "u1" }),
    );
    let ServerMessage::Post { post } = reply(&mut rx) else {
        panic!("Expected a post reply");
    };

    let frame = ServerMessage::Event {
        topic: POST_CREATED.to_string(),
        event: Event::PostCreated(post.clone()),
    };
    let value = serde_json::to_value(&frame).unwrap();
    assert_eq!(value["type"], "event");
    assert_eq!(value["topic"], "post-created");
    assert_eq!(value["event"]["kind"], "post_created");
    assert_eq!(value["event"]["id"], post.id.as_str());
    assert_eq!(value["event"]["ownerId"], "u1");
}

#[test]
fn test_handle_create_and_query_posts() {
    let (service, store, _bus) = posts_service();
    let (mut conn, mut rx) = connection();

    handle_json(
        &service,
        &mut conn,
        json!({ "type": "create_post", "title": "A", "content": "B", "ownerId": "u1" }),
    );
    let created = match reply(&mut rx) {
        ServerMessage::Post { post } => post,
        other => panic!("Expected Post, got {other:?}"),
    };

    handle_json(&service, &mut conn, json!({ "type": "posts" }));
    assert_eq!(
        reply(&mut rx),
        ServerMessage::Posts {
            posts: vec![created.clone()]
        }
    );

    handle_json(&service, &mut conn, json!({ "type": "post", "id": &created.id }));
    assert_eq!(reply(&mut rx), ServerMessage::Post { post: created });
    assert_eq!(store.posts().unwrap().len(), 1);
}

#[test]
fn test_handle_store_errors_become_error_frames() {
    let (service, _store, _bus) = posts_service();
    let (mut conn, mut rx) = connection();

    handle_json(
        &service,
        &mut conn,
        json!({ "type": "create_post", "title": "", "content": "B", "ownerId": "u1" }),
    );
    match reply(&mut rx) {
        ServerMessage::Error { message } => assert!(message.contains("title")),
        other => panic!("Expected Error, got {other:?}"),
    }

    handle_json(&service, &mut conn, json!({ "type": "post", "id": "99" }));
    match reply(&mut rx) {
        ServerMessage::Error { message } => assert_eq!(message, "post 99 not found"),
        other => panic!("Expected Error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_handle_subscribe_forwards_events() {
    let (service, _store, bus) = posts_service();
    let (mut subscriber, mut sub_rx) = connection();
    let (mut publisher, mut pub_rx) = connection();

    handle_json(
        &service,
        &mut subscriber,
        json!({ "type": "subscribe", "topic": POST_CREATED }),
    );
    assert_eq!(
        next_frame(&mut sub_rx).await,
        ServerMessage::Subscribed {
            topic: POST_CREATED.to_string()
        }
    );
    assert_eq!(bus.listener_count(POST_CREATED), 1);

    handle_json(
        &service,
        &mut publisher,
        json!({ "type": "create_post", "title": "A", "content": "B", "ownerId": "u1" }),
    );
    let ServerMessage::Post { post } = reply(&mut pub_rx) else {
        panic!("Expected a post reply");
    };

    assert_eq!(
        next_frame(&mut sub_rx).await,
        ServerMessage::Event {
            topic: POST_CREATED.to_string(),
            event: Event::PostCreated(post),
        }
    );
    // The publisher never subscribed.
    assert!(pub_rx.try_recv().is_err());
}

#[tokio::test]
async fn test_handle_duplicate_subscribe_is_rejected() {
    let (service, _store, bus) = posts_service();
    let (mut conn, mut rx) = connection();

    handle_json(&service, &mut conn, json!({ "type": "subscribe", "topic": POST_CREATED }));
    handle_json(&service, &mut conn, json!({ "type": "subscribe", "topic": POST_CREATED }));

    assert!(matches!(next_frame(&mut rx).await, ServerMessage::Subscribed { .. }));
    assert!(matches!(next_frame(&mut rx).await, ServerMessage::Error { .. }));
    assert_eq!(bus.listener_count(POST_CREATED), 1);
}

#[tokio::test]
async fn test_handle_unsubscribe_releases_registration() {
    let (service, _store, bus) = posts_service();
    let (mut conn, mut rx) = connection();

    handle_json(&service, &mut conn, json!({ "type": "subscribe", "topic": POST_CREATED }));
    assert!(matches!(next_frame(&mut rx).await, ServerMessage::Subscribed { .. }));

    handle_json(&service, &mut conn, json!({ "type": "unsubscribe", "topic": POST_CREATED }));
    assert_eq!(
        next_frame(&mut rx).await,
        ServerMessage::Unsubscribed {
            topic: POST_CREATED.to_string()
        }
    );
    // Acknowledged only once the registration is gone.
    assert_eq!(bus.registration_count(), 0);
    assert_eq!(conn.subscription_count(), 0);

    // Unknown topics still get an acknowledgement.
    handle_json(&service, &mut conn, json!({ "type": "unsubscribe", "topic": "nope" }));
    assert_eq!(
        reply(&mut rx),
        ServerMessage::Unsubscribed {
            topic: "nope".to_string()
        }
    );
}

#[tokio::test]
async fn test_no_event_frame_after_unsubscribed() {
    let (service, store, bus) = posts_service();
    let (mut conn, mut rx) = connection();

    handle_json(&service, &mut conn, json!({ "type": "subscribe", "topic": POST_CREATED }));
    assert!(matches!(next_frame(&mut rx).await, ServerMessage::Subscribed { .. }));

    // Events still queued on the bus side when the client unsubscribes.
    for title in ["a", "b", "c"] {
        let post = store.create_post(NewPost::new(title, "body", "u1")).unwrap();
        bus.publish(POST_CREATED, Event::PostCreated(post));
    }
    handle_json(&service, &mut conn, json!({ "type": "unsubscribe", "topic": POST_CREATED }));

    loop {
        match next_frame(&mut rx).await {
            ServerMessage::Event { .. } => continue,
            ServerMessage::Unsubscribed { topic } => {
                assert_eq!(topic, POST_CREATED);
                break;
            }
            other => panic!("Expected Event or Unsubscribed, got {other:?}"),
        }
    }
    assert_eq!(bus.registration_count(), 0);

    let post = store.create_post(NewPost::new("d", "body", "u1")).unwrap();
    bus.publish(POST_CREATED, Event::PostCreated(post));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_slow_client_queue_stays_bounded() {
    let store = Arc::new(SledStore::temporary().unwrap());
    let bus = Arc::new(EventBus::new(&crate::config::BusSettings {
        max_registrations: 8,
        channel_capacity: 2,
    }));
    let service = PostsService::new(MutationGateway::new(store, bus.clone()));
    let (mut subscriber, mut sub_rx) = connection_with_capacity(4);
    let (mut author, mut author_rx) = connection();

    handle_json(
        &service,
        &mut subscriber,
        json!({ "type": "subscribe", "topic": POST_CREATED }),
    );

    for i in 0..200 {
        handle_json(
            &service,
            &mut author,
            json!({
                "type": "create_post",
                "title": format!("post {i}"),
                "content": "B",
                "ownerId": "u1"
            }),
        );
        assert!(matches!(reply(&mut author_rx), ServerMessage::Post { .. }));
        tokio::task::yield_now().await;
    }
    tokio::time::sleep(Duration::from_millis(50)).await;

    // Never more than the queue holds: the Subscribed ack plus three events.
    let mut queued = Vec::new();
    while let Ok(msg) = sub_rx.try_recv() {
        queued.push(decode(msg));
    }
    assert_eq!(queued.len(), 4);
    assert!(matches!(queued[0], ServerMessage::Subscribed { .. }));
    assert!(queued[1..].iter().all(ServerMessage::is_event));

    // The subscription survived the drops and delivers again once drained.
    handle_json(
        &service,
        &mut author,
        json!({ "type": "create_post", "title": "late", "content": "B", "ownerId": "u1" }),
    );
    let ServerMessage::Post { post } = reply(&mut author_rx) else {
        panic!("Expected a post reply");
    };
    loop {
        let frame = next_frame(&mut sub_rx).await;
        if let ServerMessage::Event {
            event: Event::PostCreated(seen),
            ..
        } = frame
        {
            if seen.id == post.id {
                break;
            }
        }
    }
    assert_eq!(bus.listener_count(POST_CREATED), 1);
}

#[tokio::test]
async fn test_dropped_connection_releases_registration() {
    let (service, _store, bus) = posts_service();
    let (mut conn, _rx) = connection();

    handle_json(&service, &mut conn, json!({ "type": "subscribe", "topic": POST_CREATED }));
    assert_eq!(bus.registration_count(), 1);

    drop(conn);
    wait_for(|| bus.registration_count() == 0).await;
}

#[tokio::test]
async fn test_subscribe_reports_capacity_error() {
    let store = Arc::new(SledStore::temporary().unwrap());
    let bus = Arc::new(EventBus::new(&crate::config::BusSettings {
        max_registrations: 0,
        channel_capacity: 4,
    }));
    let service = PostsService::new(MutationGateway::new(store, bus));
    let (mut conn, mut rx) = connection();

    handle_json(&service, &mut conn, json!({ "type": "subscribe", "topic": POST_CREATED }));

    match reply(&mut rx) {
        ServerMessage::Error { message } => assert!(message.contains("registration table full")),
        other => panic!("Expected Error, got {other:?}"),
    }
    assert!(!conn.is_subscribed(POST_CREATED));
}

#[test]
fn test_users_service_crud() {
    let store = Arc::new(SledStore::temporary().unwrap());
    let service = UsersService::new(store);
    let (mut conn, mut rx) = connection();

    handle_json(
        &service,
        &mut conn,
        json!({ "type": "create_user", "name": "Ada", "email": "ada@example.com" }),
    );
    let ServerMessage::User { user } = reply(&mut rx) else {
        panic!("Expected a user reply");
    };

    handle_json(
        &service,
        &mut conn,
        json!({ "type": "update_user", "id": &user.id, "name": "Ada L." }),
    );
    match reply(&mut rx) {
        ServerMessage::User { user: updated } => {
            assert_eq!(updated.name, "Ada L.");
            assert_eq!(updated.email, "ada@example.com");
        }
        other => panic!("Expected User, got {other:?}"),
    }

    handle_json(&service, &mut conn, json!({ "type": "delete_user", "id": &user.id }));
    assert!(matches!(reply(&mut rx), ServerMessage::User { .. }));

    handle_json(&service, &mut conn, json!({ "type": "users" }));
    assert_eq!(reply(&mut rx), ServerMessage::Users { users: vec![] });
}

async fn wait_for(mut condition: impl FnMut() -> bool) {
    for _ in 0..100 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}
