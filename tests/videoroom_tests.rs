use rust_janus_gateway::plugins::VIDEOROOM_PLUGIN;
use rust_janus_gateway::*;
use serde_json::{json, Value};
use test_utils::*;

const OFFER: &str = "v=0\r\nm=audio 9 UDP/TLS/RTP/SAVPF 111\r\na=sendrecv\r\n";
const ANSWER: &str = "v=0\r\nm=audio 9 UDP/TLS/RTP/SAVPF 111\r\na=recvonly\r\n";

fn videoroom_reply(data: Value) -> Value {
    json!({
        "janus": "success",
        "plugindata": {"plugin": VIDEOROOM_PLUGIN, "data": data}
    })
}

fn videoroom_event(data: Value, jsep: Value) -> Value {
    json!({
        "janus": "event",
        "plugindata": {"plugin": VIDEOROOM_PLUGIN, "data": data},
        "jsep": jsep
    })
}

/// Answer an `attach` for the videoroom plugin with `handle_id`
async fn accept_attach(server: &mut MockServer, handle_id: u64) {
    let request = server.expect("attach").await;
    assert_eq!(request["plugin"], VIDEOROOM_PLUGIN);
    server.reply(&request, json!({"janus": "success", "data": {"id": handle_id}}));
}

#[tokio::test]
async fn test_publish_feed_keeps_answer_and_publisher_id() {
    init_logging();
    let mut h = connected(test_config()).await;
    let session = h.create_session(json!(10)).await;
    let video_room = session.video_room();

    let server = &mut h.server;
    let (handle, _) = tokio::join!(video_room.publish_feed(JanusId::from(1234u64), OFFER), async {
        accept_attach(server, 20).await;

        let message = server.expect("message").await;
        assert_eq!(message["handle_id"], 20);
        assert_eq!(message["body"]["request"], "joinandconfigure");
        assert_eq!(message["body"]["ptype"], "publisher");
        assert_eq!(message["body"]["room"], 1234);
        assert_eq!(message["body"]["audio"], true);
        assert_eq!(message["jsep"]["type"], "offer");
        assert_eq!(message["jsep"]["sdp"], OFFER);

        server.reply(&message, json!({"janus": "ack"}));
        server.reply(
            &message,
            videoroom_event(
                json!({"videoroom": "joined", "room": 1234, "id": 555, "publishers": []}),
                json!({"type": "answer", "sdp": ANSWER}),
            ),
        );
    });

    let handle = handle.unwrap();
    assert_eq!(handle.id(), &JanusId::from(20u64));
    assert_eq!(
        handle.role().await,
        VideoRoomRole::Publisher {
            room: JanusId::from(1234u64),
            publisher_id: Some(JanusId::from(555u64)),
            answer: Some(ANSWER.to_string()),
        }
    );
}

#[tokio::test]
async fn test_subscribe_feed_then_start_with_recvonly_answer() {
    let mut h = connected(test_config()).await;
    let session = h.create_session(json!(10)).await;
    let video_room = session.video_room();

    let server = &mut h.server;
    let (handle, _) = tokio::join!(
        video_room.subscribe_feed(JanusId::from(1234u64), JanusId::from(555u64)),
        async {
            accept_attach(server, 30).await;

            let message = server.expect("message").await;
            assert_eq!(message["body"]["request"], "join");
            assert_eq!(message["body"]["ptype"], "subscriber");
            assert_eq!(message["body"]["feed"], 555);
            assert!(message.get("jsep").is_none());

            server.reply(&message, json!({"janus": "ack"}));
            server.reply(
                &message,
                videoroom_event(
                    json!({"videoroom": "attached", "room": 1234, "id": 555}),
                    json!({"type": "offer", "sdp": OFFER}),
                ),
            );
        }
    );
    let handle = handle.unwrap();
    match handle.role().await {
        VideoRoomRole::Subscriber { offer, .. } => assert_eq!(offer.as_deref(), Some(OFFER)),
        other => panic!("Expected subscriber role, got {:?}", other),
    }

    let local_answer = "v=0\r\nm=audio 9 UDP/TLS/RTP/SAVPF 111\r\na=sendrecv\r\n";
    let (started, _) = tokio::join!(handle.set_remote_answer(local_answer), async {
        let message = server.expect("message").await;
        assert_eq!(message["body"]["request"], "start");
        assert_eq!(message["body"]["room"], 1234);
        assert_eq!(message["body"]["feed"], 555);
        assert_eq!(message["jsep"]["type"], "answer");
        assert_eq!(message["jsep"]["sdp"], ANSWER);

        server.reply(&message, json!({"janus": "ack"}));
        server.reply(
            &message,
            videoroom_event(json!({"videoroom": "event", "started": "ok"}), Value::Null),
        );
    });
    assert_eq!(started.unwrap().data_field("started"), Some(&json!("ok")));
}

#[tokio::test]
async fn test_role_operations_check_the_role() {
    let mut h = connected(test_config()).await;
    let session = h.create_session(json!(10)).await;
    let video_room = session.video_room();

    let server = &mut h.server;
    let (handle, _) = tokio::join!(video_room.create_handle(), accept_attach(server, 40));
    let handle = handle.unwrap();

    assert!(matches!(handle.create_answer(OFFER).await, Err(JanusError::InvalidOperation(_))));
    assert!(matches!(handle.create_offer().await, Err(JanusError::InvalidOperation(_))));
    match handle.set_remote_answer(ANSWER).await {
        Err(error) => {
            assert_eq!(error.code(), "INVALID_OPERATION");
            assert!(error.to_string().contains("set_remote_answer"));
        }
        other => panic!("Expected invalid operation, got {:?}", other),
    }
    h.server.assert_idle();
}

#[tokio::test]
async fn test_get_feeds_reuses_default_handle() {
    let mut h = connected(test_config()).await;
    let session = h.create_session(json!(10)).await;
    let video_room = session.video_room();
    let participants = json!({
        "videoroom": "participants",
        "room": 1234,
        "participants": [
            {"id": 1, "publisher": true},
            {"id": 2, "publisher": false},
            {"id": 3, "publisher": "true"}
        ]
    });

    let server = &mut h.server;
    let room = JanusId::from(1234u64);
    let (feeds, _) = tokio::join!(video_room.get_feeds(&room), async {
        accept_attach(server, 50).await;
        let message = server.expect("message").await;
        assert_eq!(message["handle_id"], 50);
        assert_eq!(message["body"]["request"], "listparticipants");
        server.reply(&message, videoroom_reply(participants.clone()));
    });
    assert_eq!(feeds.unwrap(), vec![JanusId::from(1u64), JanusId::from(3u64)]);

    // a second lookup, through a fresh binding of the same session, attaches nothing
    let again = session.video_room();
    let excluded = JanusId::from(3u64);
    let (feeds, _) = tokio::join!(again.get_feeds_exclude(&room, &excluded), async {
        let message = server.expect("message").await;
        assert_eq!(message["handle_id"], 50);
        server.reply(&message, videoroom_reply(participants.clone()));
    });
    assert_eq!(feeds.unwrap(), vec![JanusId::from(1u64)]);
}

#[tokio::test]
async fn test_room_management_requests() {
    let mut h = connected(test_config()).await;
    let session = h.create_session(json!(10)).await;
    let video_room = session.video_room();

    let server = &mut h.server;
    let (handle, _) = tokio::join!(video_room.default_handle(), accept_attach(server, 60));
    let handle = handle.unwrap();
    let room = JanusId::from(4321u64);

    let (created, _) = tokio::join!(handle.create(json!({"room": 4321, "publishers": 6})), async {
        let message = server.expect("message").await;
        assert_eq!(message["body"]["request"], "create");
        assert_eq!(message["body"]["publishers"], 6);
        server.reply(&message, videoroom_reply(json!({"videoroom": "created", "room": 4321})));
    });
    assert_eq!(created.unwrap().room, Some(room.clone()));

    let (exists, _) = tokio::join!(handle.exists(&room), async {
        let message = server.expect("message").await;
        assert_eq!(message["body"]["request"], "exists");
        server.reply(&message, videoroom_reply(json!({"videoroom": "success", "room": 4321, "exists": "true"})));
    });
    assert!(exists.unwrap());

    let (rooms, _) = tokio::join!(handle.list(), async {
        let message = server.expect("message").await;
        assert_eq!(message["body"]["request"], "list");
        server.reply(&message, videoroom_reply(json!({"videoroom": "success", "rooms": [{"room": 4321}]})));
    });
    assert_eq!(rooms.unwrap().len(), 1);

    let (destroyed, _) = tokio::join!(handle.destroy(&room, json!({"permanent": false})), async {
        let message = server.expect("message").await;
        assert_eq!(message["body"]["request"], "destroy");
        assert_eq!(message["body"]["room"], 4321);
        assert_eq!(message["body"]["permanent"], false);
        server.reply(
            &message,
            videoroom_reply(json!({"videoroom": "error", "error_code": 426, "error": "No such room"})),
        );
    });
    match destroyed {
        Err(JanusError::Plugin { code, handle_id, .. }) => {
            assert_eq!(code, 426);
            assert_eq!(handle_id, JanusId::from(60u64));
        }
        other => panic!("Expected plugin error, got {:?}", other),
    }
}
