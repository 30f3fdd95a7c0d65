//! End-to-end session tests against the stub chat service
//!
//! Every test runs the production websocket connector against a stub
//! server bound to an ephemeral port.

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use tokio::sync::watch;
use tokio::time::timeout;

use docchat_core::{
    ClientConfig, RejectReason, SendOutcome, SessionHandle, SessionPhase, SessionRunner,
    SessionUpdate, StaticTokenProvider, Token, TranscriptSnapshot, WebSocketConnector,
    DEFAULT_GREETING,
};
use docchat_stub_server::{ConnectionRegistry, StubConfig, StubServer, IDLE_TIMEOUT_MESSAGE};

const WAIT: Duration = Duration::from_secs(5);

struct Stub {
    endpoint: String,
    registry: ConnectionRegistry,
    _task: tokio::task::JoinHandle<Result<(), docchat_stub_server::StubError>>,
}

async fn start_stub(mut config: StubConfig) -> Stub {
    config.bind_addr = "127.0.0.1:0".parse().unwrap();
    config.chunk_delay = Duration::from_millis(1);
    let server = StubServer::bind(config).await.unwrap();
    Stub {
        endpoint: server.endpoint().unwrap(),
        registry: server.registry(),
        _task: server.spawn(),
    }
}

fn client_config(stub: &Stub) -> ClientConfig {
    let mut config = ClientConfig::default();
    config.websocket_uri = stub.endpoint.clone();
    config.connect_timeout = Duration::from_secs(2);
    config.token_refresh_interval = Duration::from_millis(50);
    config
}

fn spawn_session(stub: &Stub, token: &str) -> (watch::Sender<Option<Token>>, SessionHandle) {
    let (tx, rx) = watch::channel(Token::new(token));
    let connector = Arc::new(WebSocketConnector::new(Duration::from_secs(2)));
    let handle = SessionRunner::spawn_with_tokens(client_config(stub), rx, connector);
    (tx, handle)
}

async fn wait_for(
    handle: &mut SessionHandle,
    mut pred: impl FnMut(&SessionUpdate) -> bool,
) -> SessionUpdate {
    timeout(WAIT, async {
        loop {
            match handle.recv_update().await {
                Some(update) if pred(&update) => return update,
                Some(_) => {}
                None => panic!("session ended while waiting"),
            }
        }
    })
    .await
    .expect("timed out waiting for session update")
}

async fn wait_for_phase(handle: &mut SessionHandle, phase: SessionPhase) {
    wait_for(handle, |u| *u == SessionUpdate::Phase(phase)).await;
}

async fn wait_for_transcript(
    handle: &mut SessionHandle,
    mut pred: impl FnMut(&TranscriptSnapshot) -> bool,
) -> TranscriptSnapshot {
    match wait_for(handle, |u| matches!(u, SessionUpdate::Transcript(t) if pred(t))).await {
        SessionUpdate::Transcript(t) => t,
        other => panic!("unexpected update: {other:?}"),
    }
}

async fn eventually(mut cond: impl FnMut() -> bool) {
    timeout(WAIT, async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

#[tokio::test]
async fn greeting_scenario_end_to_end() {
    let stub = start_stub(StubConfig::default().with_reply("What is X?", "X is Y")).await;
    let (_tokens, mut session) = spawn_session(&stub, "T1");

    wait_for_phase(&mut session, SessionPhase::Open).await;

    let outcome = tokio_test::assert_ok!(session.send("What is X?").await);
    assert_eq!(outcome, SendOutcome::Sent);

    let pending = wait_for_transcript(&mut session, |t| t.pending).await;
    assert_eq!(pending.turns, vec![DEFAULT_GREETING, "What is X?", ""]);

    let done = wait_for_transcript(&mut session, |t| t.last() == Some("X is Y")).await;
    assert_eq!(done.turns, vec![DEFAULT_GREETING, "What is X?", "X is Y"]);
    assert!(!done.pending);

    session.teardown().await;
}

#[tokio::test]
async fn second_message_rejected_while_reply_pending() {
    let stub = start_stub(StubConfig::default()).await;
    let (_tokens, mut session) = spawn_session(&stub, "T1");
    wait_for_phase(&mut session, SessionPhase::Open).await;

    // Nothing answers /info, so the placeholder stays pending
    assert_eq!(session.send("/info quiet").await.unwrap(), SendOutcome::Sent);
    assert_eq!(
        session.send("another").await.unwrap(),
        SendOutcome::Rejected(RejectReason::ReplyPending)
    );

    session.teardown().await;
}

#[tokio::test]
async fn error_frame_raises_alert_without_touching_transcript() {
    let stub = start_stub(StubConfig::default()).await;
    let (_tokens, mut session) = spawn_session(&stub, "T1");
    wait_for_phase(&mut session, SessionPhase::Open).await;

    session.send("/error boom").await.unwrap();

    let alert = match wait_for(&mut session, |u| matches!(u, SessionUpdate::Alert(_))).await {
        SessionUpdate::Alert(alert) => alert,
        other => panic!("unexpected update: {other:?}"),
    };
    assert_eq!(alert.text, "boom");

    session.dismiss_alert(alert.id).await.unwrap();
    wait_for(&mut session, |u| *u == SessionUpdate::AlertDismissed(alert.id)).await;

    session.teardown().await;
}

#[tokio::test]
async fn malformed_and_unknown_frames_are_ignored() {
    let stub = start_stub(StubConfig::default().with_reply("after", "still here")).await;
    let (tokens, mut session) = spawn_session(&stub, "T1");
    wait_for_phase(&mut session, SessionPhase::Open).await;

    session
        .send(r#"/raw {"message_type":"typing","content":"..."}"#)
        .await
        .unwrap();

    // The pending placeholder is never resolved by an unknown frame, so the
    // next token refresh is the only way forward
    tokens.send(Token::new("T2")).unwrap();
    let reopened = wait_for_transcript(&mut session, |t| !t.pending).await;
    assert_eq!(reopened.last(), Some(""));
    wait_for_phase(&mut session, SessionPhase::Open).await;

    session.send("after").await.unwrap();
    let done = wait_for_transcript(&mut session, |t| t.last() == Some("still here")).await;
    assert_eq!(done.turns.len(), 5);

    session.teardown().await;
}

#[tokio::test]
async fn token_rotation_leaves_one_connection_under_new_token() {
    let stub = start_stub(StubConfig::default()).await;
    let (tokens, mut session) = spawn_session(&stub, "T1");

    wait_for_phase(&mut session, SessionPhase::Open).await;
    eventually(|| stub.registry.tokens() == vec!["T1".to_string()]).await;

    tokens.send(Token::new("T2")).unwrap();
    wait_for_phase(&mut session, SessionPhase::Connecting).await;
    wait_for_phase(&mut session, SessionPhase::Open).await;

    eventually(|| stub.registry.tokens() == vec!["T2".to_string()]).await;
    assert!(stub.registry.len() <= 1);

    session.teardown().await;
    eventually(|| stub.registry.is_empty()).await;
}

#[tokio::test]
async fn token_rotation_while_connecting_leaves_one_connection() {
    let mut config = StubConfig::default();
    config.handshake_delay = Duration::from_millis(300);
    let stub = start_stub(config).await;
    let (tokens, mut session) = spawn_session(&stub, "T1");

    wait_for_phase(&mut session, SessionPhase::Connecting).await;
    tokens.send(Token::new("T2")).unwrap();
    wait_for_phase(&mut session, SessionPhase::Open).await;

    eventually(|| stub.registry.tokens() == vec!["T2".to_string()]).await;
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(stub.registry.tokens(), vec!["T2".to_string()]);

    session.teardown().await;
    eventually(|| stub.registry.is_empty()).await;
}

#[tokio::test]
async fn invalid_token_alerts_then_closes() {
    let stub = start_stub(StubConfig::default().with_tokens(["good"])).await;
    let (_tokens, mut session) = spawn_session(&stub, "bad");

    let alert = wait_for(&mut session, |u| matches!(u, SessionUpdate::Alert(_))).await;
    assert!(matches!(alert, SessionUpdate::Alert(a) if a.text.starts_with("Invalid token")));

    wait_for_phase(&mut session, SessionPhase::Closed).await;
    assert_eq!(
        session.send("hi").await.unwrap(),
        SendOutcome::Rejected(RejectReason::NotOpen)
    );
    assert!(stub.registry.is_empty());

    session.teardown().await;
}

#[tokio::test]
async fn no_token_means_no_connection() {
    let stub = start_stub(StubConfig::default()).await;
    let connector = Arc::new(WebSocketConnector::default());
    let mut session = SessionRunner::spawn(
        client_config(&stub),
        Arc::new(StaticTokenProvider::unauthenticated()),
        connector,
    );

    wait_for_phase(&mut session, SessionPhase::NoToken).await;
    let initial = wait_for_transcript(&mut session, |_| true).await;
    assert_eq!(initial.turns, vec![DEFAULT_GREETING]);
    assert_eq!(
        session.send("hello").await.unwrap(),
        SendOutcome::Rejected(RejectReason::NotOpen)
    );

    // Give the refresher a few polls
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(stub.registry.is_empty());
    assert!(session.try_recv_update().is_none());

    session.teardown().await;
}

#[tokio::test]
async fn provider_backed_session_round_trip() {
    let stub = start_stub(StubConfig::default().with_reply("ping", "pong")).await;
    let mut session = SessionRunner::spawn(
        client_config(&stub),
        Arc::new(StaticTokenProvider::new("T1")),
        Arc::new(WebSocketConnector::default()),
    );

    wait_for_phase(&mut session, SessionPhase::Open).await;
    assert!(session.send("ping").await.unwrap().is_sent());
    wait_for_transcript(&mut session, |t| t.last() == Some("pong")).await;

    session.teardown().await;
}

#[tokio::test]
async fn idle_timeout_alerts_and_closes() {
    let mut config = StubConfig::default();
    config.idle_timeout = Duration::from_millis(200);
    let stub = start_stub(config).await;
    let (_tokens, mut session) = spawn_session(&stub, "T1");

    wait_for_phase(&mut session, SessionPhase::Open).await;
    let alert = wait_for(&mut session, |u| matches!(u, SessionUpdate::Alert(_))).await;
    assert!(matches!(alert, SessionUpdate::Alert(a) if a.text == IDLE_TIMEOUT_MESSAGE));
    wait_for_phase(&mut session, SessionPhase::Closed).await;

    session.teardown().await;
}

#[tokio::test]
async fn pending_reply_abandoned_after_remote_close_and_refresh() {
    let stub = start_stub(StubConfig::default()).await;
    let (tokens, mut session) = spawn_session(&stub, "T1");
    wait_for_phase(&mut session, SessionPhase::Open).await;

    session.send("/close").await.unwrap();
    wait_for_phase(&mut session, SessionPhase::Closed).await;

    // Same token again reconnects once the connection is gone
    tokens.send(Token::new("T1")).unwrap();
    let cleared = wait_for_transcript(&mut session, |t| !t.pending).await;
    assert_eq!(cleared.turns, vec![DEFAULT_GREETING, "/close", ""]);
    wait_for_phase(&mut session, SessionPhase::Open).await;

    assert!(session.send("again").await.unwrap().is_sent());

    session.teardown().await;
}
