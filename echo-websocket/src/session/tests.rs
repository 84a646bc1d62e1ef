use super::*;
use crate::config::{HeartbeatConfig, ReconnectionConfig, WebSocketConfig};
use crate::connection::Frame;
use crate::connection::fake::FakeTransport;
use crate::interceptor::{Direction, FnInterceptor};
use serde_json::json;
use std::time::Duration;
use tokio::time::Instant;

const URL: &str = "ws://fake.test/ws";

fn config(reconnection: ReconnectionConfig, heartbeat: HeartbeatConfig) -> SessionConfig {
    SessionConfig::new(URL)
        .with_websocket(
            WebSocketConfig::builder()
                .url(URL)
                .ping_interval(Duration::ZERO)
                .read_timeout(Duration::from_secs(1))
                .build(),
        )
        .with_heartbeat(heartbeat)
        .with_reconnection(reconnection)
}

fn quiet_config() -> SessionConfig {
    config(ReconnectionConfig::DEFAULT, HeartbeatConfig::NONE)
}

fn session(transport: &FakeTransport, config: SessionConfig) -> WebSocketSession {
    WebSocketSession::builder(config)
        .transport(Arc::new(transport.clone()))
        .build()
        .unwrap()
}

async fn wait_for_state(
    session: &WebSocketSession,
    predicate: impl FnMut(&ConnectionState) -> bool,
) -> ConnectionState {
    let mut state = session.subscribe_state();
    let matched = state.wait_for(predicate).await.unwrap().clone();
    matched
}

async fn wait_for_event(
    events: &mut broadcast::Receiver<SessionEvent>,
    predicate: impl Fn(&SessionEvent) -> bool,
) -> SessionEvent {
    loop {
        let event = events.recv().await.unwrap();
        if predicate(&event) {
            return event;
        }
    }
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    while !condition() {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

async fn connected(transport: &FakeTransport, config: SessionConfig) -> WebSocketSession {
    let session = session(transport, config);
    session.connect();
    wait_for_state(&session, ConnectionState::is_connected).await;
    session
}

#[tokio::test(start_paused = true)]
async fn test_connect_and_receive() {
    let transport = FakeTransport::new();
    let session = session(&transport, quiet_config());
    let mut incoming = session.incoming();
    let mut events = session.events();
    assert_eq!(session.state(), ConnectionState::Idle);

    session.connect();
    wait_for_state(&session, ConnectionState::is_connected).await;
    assert_eq!(
        wait_for_event(&mut events, |_| true).await,
        SessionEvent::Connected {
            url: URL.to_string()
        }
    );

    transport
        .server()
        .unwrap()
        .send_text(r#"{"type":"chat","text":"hi"}"#);
    let message = incoming.recv().await.unwrap();
    assert_eq!(message.message_type().as_deref(), Some("chat"));
    assert!(matches!(
        wait_for_event(&mut events, |_| true).await,
        SessionEvent::Message(_)
    ));
}

#[tokio::test(start_paused = true)]
async fn test_malformed_inbound_text_is_dropped() {
    let transport = FakeTransport::new();
    let session = connected(&transport, quiet_config()).await;
    let mut incoming = session.incoming();

    let server = transport.server().unwrap();
    server.send_text("not json");
    server.send_binary(vec![7, 7]);
    server.send_text(r#"{"type":"after"}"#);

    assert_eq!(
        incoming.recv().await.unwrap(),
        WebSocketMessage::binary(vec![7, 7])
    );
    assert_eq!(
        incoming.recv().await.unwrap().message_type().as_deref(),
        Some("after")
    );
    assert!(session.state().is_connected());
}

#[tokio::test(start_paused = true)]
async fn test_connect_is_idempotent() {
    let transport = FakeTransport::new();
    let session = session(&transport, quiet_config());

    session.connect();
    session.connect();
    wait_for_state(&session, ConnectionState::is_connected).await;
    session.connect();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(transport.attempts(), 1);
    assert!(session.state().is_connected());
}

#[tokio::test(start_paused = true)]
async fn test_send_json_runs_outbound_interceptors() {
    let transport = FakeTransport::new();
    let session = WebSocketSession::builder(quiet_config())
        .transport(Arc::new(transport.clone()))
        .token_provider(Arc::new(StaticTokenProvider::new(Some("tok-9".to_string()))))
        .build()
        .unwrap();
    session.connect();
    wait_for_state(&session, ConnectionState::is_connected).await;

    session
        .send_json(&json!({"type": "chat", "text": "hi"}))
        .await
        .unwrap();
    wait_until(|| !transport.sent_texts().is_empty()).await;

    let sent = WebSocketMessage::Text(transport.sent_texts().remove(0));
    let object = sent.json_object().unwrap();
    assert_eq!(object["type"], "chat");
    assert_eq!(object["token"], "tok-9");
    assert!(object["timestamp"].is_i64());
}

#[tokio::test(start_paused = true)]
async fn test_interceptor_drop_is_silent() {
    let transport = FakeTransport::new();
    let chain = InterceptorChain::new().with(FnInterceptor::new(
        "no-secrets",
        |message: WebSocketMessage, _: Direction| (message.as_text() != Some("secret")).then_some(message),
    ));
    let session = WebSocketSession::builder(quiet_config())
        .transport(Arc::new(transport.clone()))
        .interceptors(chain)
        .build()
        .unwrap();
    session.connect();
    wait_for_state(&session, ConnectionState::is_connected).await;

    session.send(WebSocketMessage::text("secret")).await.unwrap();
    session.send(WebSocketMessage::text("ok")).await.unwrap();
    wait_until(|| !transport.sent_texts().is_empty()).await;

    assert_eq!(transport.sent_texts(), vec!["ok".to_string()]);
    assert_eq!(session.pending_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_buffered_messages_flush_before_new_sends() {
    let transport = FakeTransport::new();
    let session = connected(&transport, quiet_config()).await;
    let mut events = session.events();

    transport.server().unwrap().break_writes();
    for i in 1..=3 {
        session
            .send(WebSocketMessage::text(format!("hi-{i}")))
            .await
            .unwrap();
    }
    let mut pending = session.subscribe_pending();
    pending.wait_for(|count| *count == 3).await.unwrap();

    wait_for_event(&mut events, |e| matches!(e, SessionEvent::Connected { .. })).await;
    session.send(WebSocketMessage::text("after")).await.unwrap();
    wait_until(|| transport.sent_texts().len() == 4).await;

    assert_eq!(
        transport.sent_texts(),
        vec!["hi-1", "hi-2", "hi-3", "after"]
    );
    assert_eq!(session.pending_count(), 0);
    assert_eq!(transport.attempts(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_failed_flush_keeps_the_rest_in_order() {
    let transport = FakeTransport::new();
    let session = session(&transport, quiet_config());
    let mut events = session.events();

    for i in 1..=3 {
        session
            .send(WebSocketMessage::text(format!("m-{i}")))
            .await
            .unwrap();
    }
    session
        .subscribe_pending()
        .wait_for(|count| *count == 3)
        .await
        .unwrap();

    transport.limit_next_writes(1);
    session.connect();
    assert_eq!(
        wait_for_event(&mut events, |e| matches!(e, SessionEvent::Reconnecting { .. })).await,
        SessionEvent::Reconnecting {
            attempt: 1,
            delay_ms: 1000
        }
    );
    assert_eq!(session.pending_count(), 2);
    assert_eq!(transport.sent_texts(), vec!["m-1"]);

    wait_for_event(&mut events, |e| matches!(e, SessionEvent::Connected { .. })).await;
    wait_until(|| transport.sent_texts().len() == 3).await;
    assert_eq!(transport.sent_texts(), vec!["m-1", "m-2", "m-3"]);
    assert_eq!(session.pending_count(), 0);
    assert_eq!(transport.attempts(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_sends_before_connect_are_buffered() {
    let transport = FakeTransport::new();
    let session = session(&transport, quiet_config());

    session.send(WebSocketMessage::text("early")).await.unwrap();
    session
        .subscribe_pending()
        .wait_for(|count| *count == 1)
        .await
        .unwrap();

    session.connect();
    wait_until(|| transport.sent_texts() == vec!["early".to_string()]).await;
    assert_eq!(session.pending_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_heartbeat_timeout_triggers_reconnect() {
    let transport = FakeTransport::new();
    transport.set_auto_pong(false);
    let session = connected(
        &transport,
        config(ReconnectionConfig::DEFAULT, HeartbeatConfig::new(30_000, 10_000)),
    )
    .await;
    let mut events = session.events();
    let started = Instant::now();

    wait_for_event(&mut events, |e| *e == SessionEvent::ConnectionLost).await;
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(40_000), "{elapsed:?}");
    assert!(elapsed <= Duration::from_millis(40_001), "{elapsed:?}");

    assert!(matches!(
        wait_for_event(&mut events, |_| true).await,
        SessionEvent::Error(WebSocketError::Timeout { .. })
    ));
    assert_eq!(
        wait_for_event(&mut events, |_| true).await,
        SessionEvent::Reconnecting {
            attempt: 1,
            delay_ms: 1000
        }
    );
    wait_for_event(&mut events, |e| matches!(e, SessionEvent::Connected { .. })).await;
    assert_eq!(transport.attempts(), 2);
    assert!(
        transport
            .sent_frames()
            .iter()
            .any(|frame| matches!(frame, Frame::Ping(_)))
    );
}

#[tokio::test(start_paused = true)]
async fn test_pongs_keep_connection_alive() {
    let transport = FakeTransport::new();
    let session = connected(
        &transport,
        config(ReconnectionConfig::DEFAULT, HeartbeatConfig::new(30_000, 10_000)),
    )
    .await;

    tokio::time::sleep(Duration::from_secs(150)).await;
    assert!(session.state().is_connected());
    assert_eq!(transport.attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_remote_close_reconnects() {
    let transport = FakeTransport::new();
    let session = connected(&transport, quiet_config()).await;
    let mut events = session.events();

    transport.server().unwrap().close(1001, "going away");

    assert_eq!(
        wait_for_event(&mut events, |_| true).await,
        SessionEvent::Disconnected {
            code: 1001,
            reason: "going away".to_string()
        }
    );
    assert_eq!(
        wait_for_event(&mut events, |_| true).await,
        SessionEvent::Reconnecting {
            attempt: 1,
            delay_ms: 1000
        }
    );
    wait_for_event(&mut events, |e| matches!(e, SessionEvent::Connected { .. })).await;
    assert_eq!(transport.attempts(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_normal_remote_close_without_reconnect_on_close() {
    let transport = FakeTransport::new();
    let reconnection = ReconnectionConfig {
        reconnect_on_close: false,
        ..ReconnectionConfig::DEFAULT
    };
    let session = connected(&transport, config(reconnection, HeartbeatConfig::NONE)).await;

    transport.server().unwrap().close(1000, "done");
    let state = wait_for_state(&session, |s| matches!(s, ConnectionState::Disconnected { .. })).await;
    assert_eq!(
        state,
        ConnectionState::Disconnected {
            code: 1000,
            reason: "done".to_string()
        }
    );

    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(transport.attempts(), 1);
    assert!(matches!(session.state(), ConnectionState::Disconnected { .. }));
}

#[tokio::test(start_paused = true)]
async fn test_local_close_is_terminal() {
    let transport = FakeTransport::new();
    let session = connected(&transport, quiet_config()).await;

    session.close(1000, "bye").await;
    assert_eq!(
        session.state(),
        ConnectionState::Disconnected {
            code: 1000,
            reason: "bye".to_string()
        }
    );
    assert!(
        transport
            .sent_frames()
            .contains(&Frame::Close(Some((1000, "bye".to_string()))))
    );

    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(transport.attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_close_cancels_pending_reconnect() {
    let transport = FakeTransport::new();
    transport.refuse_next(WebSocketError::connection_failed("refused"));
    let session = session(&transport, quiet_config());

    session.connect();
    wait_for_state(&session, |s| matches!(s, ConnectionState::Reconnecting { .. })).await;
    session.close(1000, "user").await;

    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(transport.attempts(), 1);
    assert_eq!(
        session.state(),
        ConnectionState::Disconnected {
            code: 1000,
            reason: "user".to_string()
        }
    );
}

#[tokio::test(start_paused = true)]
async fn test_failures_exhaust_retries() {
    let transport = FakeTransport::new();
    for _ in 0..3 {
        transport.refuse_next(WebSocketError::connection_failed("refused"));
    }
    let reconnection = ReconnectionConfig {
        max_retries: 2,
        initial_delay_ms: 100,
        ..ReconnectionConfig::DEFAULT
    };
    let session = session(&transport, config(reconnection, HeartbeatConfig::NONE));
    let mut events = session.events();

    session.connect();
    let mut names = Vec::new();
    loop {
        let event = events.recv().await.unwrap();
        names.push(event.name());
        if matches!(event, SessionEvent::ReconnectExhausted { .. }) {
            assert_eq!(event, SessionEvent::ReconnectExhausted { attempts: 2 });
            break;
        }
    }

    assert_eq!(
        names,
        vec![
            "error",
            "reconnecting",
            "error",
            "reconnecting",
            "error",
            "reconnect_exhausted"
        ]
    );
    assert!(matches!(session.state(), ConnectionState::Failed { .. }));
    assert_eq!(transport.attempts(), 3);

    session.connect();
    wait_for_state(&session, ConnectionState::is_connected).await;
    assert_eq!(transport.attempts(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_attempt_counter_resets_after_success() {
    let transport = FakeTransport::new();
    transport.refuse_next(WebSocketError::connection_failed("refused"));
    let session = session(&transport, quiet_config());
    let mut events = session.events();

    session.connect();
    wait_for_event(&mut events, |e| matches!(e, SessionEvent::Connected { .. })).await;

    transport.server().unwrap().drop_connection();
    assert_eq!(
        wait_for_event(&mut events, |e| matches!(e, SessionEvent::Reconnecting { .. })).await,
        SessionEvent::Reconnecting {
            attempt: 1,
            delay_ms: 1000
        }
    );
}

#[tokio::test(start_paused = true)]
async fn test_reconnection_disabled_stays_failed() {
    let transport = FakeTransport::new();
    let session = connected(&transport, config(ReconnectionConfig::NONE, HeartbeatConfig::NONE)).await;

    transport
        .server()
        .unwrap()
        .fail(WebSocketError::connection_failed("reset by peer"));
    let state = wait_for_state(&session, |s| matches!(s, ConnectionState::Failed { .. })).await;
    assert_eq!(
        state,
        ConnectionState::Failed {
            error: WebSocketError::connection_failed("reset by peer")
        }
    );

    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(transport.attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_clears_buffer_and_rejects_sends() {
    let transport = FakeTransport::new();
    let session = session(&transport, quiet_config());
    let mut incoming = session.incoming();

    session.send(WebSocketMessage::text("a")).await.unwrap();
    session.send(WebSocketMessage::text("b")).await.unwrap();
    session
        .subscribe_pending()
        .wait_for(|count| *count == 2)
        .await
        .unwrap();

    session.shutdown().await;

    assert_eq!(session.pending_count(), 0);
    assert_eq!(
        session.state(),
        ConnectionState::Disconnected {
            code: 1000,
            reason: "Client shutdown".to_string()
        }
    );
    assert_eq!(
        session.send(WebSocketMessage::text("late")).await,
        Err(WebSocketError::channel_closed())
    );
    assert!(incoming.recv().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_closes_open_connection() {
    let transport = FakeTransport::new();
    let session = connected(&transport, quiet_config()).await;

    session.shutdown().await;

    assert!(
        transport
            .sent_frames()
            .contains(&Frame::Close(Some((1000, "Client shutdown".to_string()))))
    );
    assert!(matches!(
        session.state(),
        ConnectionState::Disconnected { code: 1000, .. }
    ));
}

#[test]
fn test_invalid_config_is_rejected() {
    let zero_interval = config(ReconnectionConfig::DEFAULT, HeartbeatConfig::new(0, 100));
    assert!(matches!(
        WebSocketSession::new(zero_interval),
        Err(ConfigError::InvalidValue { field, .. }) if field == "heartbeat.interval_ms"
    ));

    let zero_delay = ReconnectionConfig {
        initial_delay_ms: 0,
        ..ReconnectionConfig::DEFAULT
    };
    assert!(WebSocketSession::new(config(zero_delay, HeartbeatConfig::NONE)).is_err());

    let shrinking = ReconnectionConfig {
        backoff_multiplier: 0.5,
        ..ReconnectionConfig::DEFAULT
    };
    assert!(matches!(
        WebSocketSession::new(config(shrinking, HeartbeatConfig::NONE)),
        Err(ConfigError::InvalidValue { field, .. }) if field == "reconnection.backoff_multiplier"
    ));
}
