use rust_janus_gateway::*;
use serde_json::json;
use std::time::Duration;
use test_utils::*;

const ECHO: &str = "janus.plugin.echotest";

async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

#[tokio::test(start_paused = true)]
async fn test_event_with_known_sender_reaches_only_the_handle() {
    let mut h = connected(test_config()).await;
    let session = h.create_session(json!(100)).await;
    let handle = h.attach(&session, ECHO, json!(200)).await;
    let mut session_events = session.subscribe();
    let mut handle_events = handle.subscribe();

    let body = json!({
        "janus": "event",
        "session_id": 100,
        "sender": 200,
        "plugindata": {"plugin": ECHO, "data": {"echotest": "event", "result": "ok"}}
    });
    h.server.push(body.clone());

    assert_eq!(recv_event(&mut handle_events).await, HandleEvent::Event(body));
    settle().await;
    assert!(session_events.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_event_with_unknown_sender_goes_to_session() {
    let mut h = connected(test_config()).await;
    let session = h.create_session(json!(100)).await;
    let handle = h.attach(&session, ECHO, json!(200)).await;
    let mut session_events = session.subscribe();
    let mut handle_events = handle.subscribe();

    let body = json!({"janus": "event", "session_id": 100, "sender": 999});
    h.server.push(body.clone());

    assert_eq!(recv_event(&mut session_events).await, SessionEvent::Event(body));
    settle().await;
    assert!(handle_events.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_event_for_unknown_session_is_dropped() {
    let mut h = connected(test_config()).await;
    let session = h.create_session(json!(100)).await;
    let mut session_events = session.subscribe();
    let mut client_events = h.client.subscribe();

    h.server.push(json!({"janus": "event", "session_id": 555, "sender": 1}));
    settle().await;
    assert!(session_events.try_recv().is_err());
    assert!(client_events.try_recv().is_err());
}

#[tokio::test]
async fn test_webrtcup_and_hangup_drive_connectivity() {
    let mut h = connected(test_config()).await;
    let session = h.create_session(json!(1)).await;
    let handle = h.attach(&session, ECHO, json!(2)).await;
    let mut events = handle.subscribe();
    assert!(!handle.is_connected());

    h.server.push(json!({"janus": "webrtcup", "session_id": 1, "sender": 2}));
    assert!(matches!(recv_event(&mut events).await, HandleEvent::WebrtcUp(_)));
    assert!(handle.is_connected());

    h.server.push(json!({"janus": "media", "session_id": 1, "sender": 2, "type": "audio", "receiving": true}));
    h.server.push(json!({"janus": "slowlink", "session_id": 1, "sender": 2, "uplink": true}));
    assert!(matches!(recv_event(&mut events).await, HandleEvent::Media(_)));
    assert!(matches!(recv_event(&mut events).await, HandleEvent::SlowLink(_)));
    assert!(handle.is_connected());

    h.server.push(json!({"janus": "hangup", "session_id": 1, "sender": 2, "reason": "DTLS alert"}));
    match recv_event(&mut events).await {
        HandleEvent::Hangup(body) => assert_eq!(body["reason"], "DTLS alert"),
        other => panic!("Expected hangup, got {:?}", other),
    }
    assert!(!handle.is_connected());

    h.server.push(json!({"janus": "detached", "session_id": 1, "sender": 2}));
    assert!(matches!(recv_event(&mut events).await, HandleEvent::Detached(_)));
}

#[tokio::test]
async fn test_hangup_requires_connected_handle() {
    let mut h = connected(test_config()).await;
    let session = h.create_session(json!(1)).await;
    let handle = h.attach(&session, ECHO, json!(2)).await;

    let result = handle.hangup().await;
    assert!(matches!(result, Err(JanusError::HandleNotConnected(id)) if id == JanusId::from(2u64)));
    h.server.assert_idle();

    let mut connectivity = handle.connectivity();
    h.server.push(json!({"janus": "webrtcup", "session_id": 1, "sender": 2}));
    connectivity.wait_for(|connected| *connected).await.unwrap();

    let server = &mut h.server;
    let (result, _) = tokio::join!(handle.hangup(), async {
        let request = server.expect("hangup").await;
        assert_eq!(request["session_id"], 1);
        assert_eq!(request["handle_id"], 2);
        server.reply(&request, json!({"janus": "success"}));
    });
    result.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_dispose_twice_fails_without_remote_call() {
    let mut h = connected(test_config()).await;
    let session = h.create_session(json!(1)).await;
    let handle = h.attach(&session, ECHO, json!(2)).await;

    let server = &mut h.server;
    let (result, _) = tokio::join!(handle.dispose(), async {
        let request = server.expect("detach").await;
        assert_eq!(request["handle_id"], 2);
        server.reply(&request, json!({"janus": "success"}));
    });
    result.unwrap();
    assert!(handle.is_disposed());
    assert!(!handle.plugin().has_handle(handle.id()).await.unwrap());

    let again = handle.dispose().await;
    assert!(matches!(again, Err(JanusError::AlreadyDisposed(_))));
    settle().await;
    h.server.assert_idle();
}

#[tokio::test]
async fn test_destroy_handle_is_best_effort() {
    let mut h = connected(test_config()).await;
    let session = h.create_session(json!(1)).await;
    let handle = h.attach(&session, ECHO, json!(2)).await;
    let plugin = handle.plugin().clone();

    let server = &mut h.server;
    let (result, _) = tokio::join!(plugin.destroy_handle_by_id(handle.id()), async {
        let request = server.expect("detach").await;
        server.reply(&request, json!({"janus": "error", "error": {"code": 459, "reason": "No such handle"}}));
    });
    assert!(matches!(result, Err(JanusError::Response { code: 459, .. })));
    assert!(!plugin.has_handle(handle.id()).await.unwrap());

    let unknown = plugin.destroy_handle_by_id(&JanusId::from(404u64)).await;
    assert!(matches!(unknown, Err(JanusError::InvalidHandle(_))));
    h.server.assert_idle();
}

#[tokio::test]
async fn test_request_message_lifts_jsep() {
    let mut h = connected(test_config()).await;
    let session = h.create_session(json!(1)).await;
    let handle = h.attach(&session, ECHO, json!(2)).await;

    let body = json!({"audio": true, "jsep": {"type": "offer", "sdp": "v=0"}});
    let server = &mut h.server;
    let (response, _) = tokio::join!(handle.request_message(body, RequestOptions::ack()), async {
        let request = server.expect("message").await;
        assert_eq!(request["jsep"]["type"], "offer");
        assert!(request["body"].get("jsep").is_none());
        assert_eq!(request["body"]["audio"], true);
        server.reply(&request, json!({"janus": "ack"}));
        server.reply(
            &request,
            json!({
                "janus": "event",
                "sender": 2,
                "plugindata": {"plugin": ECHO, "data": {"echotest": "event", "result": "ok"}},
                "jsep": {"type": "answer", "sdp": "v=0"}
            }),
        );
    });

    let response = response.unwrap();
    assert_eq!(response.name(), Some(ECHO));
    assert_eq!(response.data_field("result"), Some(&json!("ok")));
    assert_eq!(response.jsep().and_then(|jsep| jsep.get("type")), Some(&json!("answer")));
    assert!(response.client_response().acknowledged());
}

#[tokio::test]
async fn test_plugin_error_carries_handle() {
    let mut h = connected(test_config()).await;
    let session = h.create_session(json!(1)).await;
    let handle = h.attach(&session, ECHO, json!(2)).await;

    let server = &mut h.server;
    let (response, _) = tokio::join!(handle.request_message(json!({"bitrate": -1}), RequestOptions::default()), async {
        let request = server.expect("message").await;
        server.reply(
            &request,
            json!({
                "janus": "success",
                "plugindata": {"plugin": ECHO, "data": {"error_code": 412, "error": "Invalid bitrate"}}
            }),
        );
    });

    match response {
        Err(JanusError::Plugin { code, reason, handle_id, .. }) => {
            assert_eq!(code, 412);
            assert_eq!(reason, "Invalid bitrate");
            assert_eq!(handle_id, JanusId::from(2u64));
        }
        other => panic!("Expected plugin error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_trickle_candidates() {
    let mut h = connected(test_config()).await;
    let session = h.create_session(json!(1)).await;
    let handle = h.attach(&session, ECHO, json!(2)).await;

    let candidate = json!({"sdpMid": "0", "sdpMLineIndex": 0, "candidate": "candidate:1 1 udp 2122260223 10.0.0.2 50000 typ host"});
    let server = &mut h.server;
    let (sent, completed, _) = tokio::join!(handle.trickle(candidate.clone()), handle.trickle_completed(), async {
        let first = server.expect("trickle").await;
        assert_eq!(first["candidate"], candidate);
        server.reply(&first, json!({"janus": "ack"}));
        let second = server.expect("trickle").await;
        assert_eq!(second["candidate"]["completed"], true);
        server.reply(&second, json!({"janus": "ack"}));
    });
    assert!(sent.unwrap().is_ack());
    assert!(completed.unwrap().is_ack());
}
