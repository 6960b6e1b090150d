use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::net::{DatagramReply, DatagramRequest, DatagramTransport};
use core_runtime::config::{CoreConfig, QueueKind, SessionMode};
use core_runtime::events::{CoreEvent, QueueState, SessionEvent};
use core_service::{CoreDependencies, CoreService, SessionTransports};
use provider_anidb::{Command, FileRef, OutcomeKind};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::timeout;

/// Accepts every login and acknowledges every list edit.
#[derive(Default)]
struct AcceptingServer {
    sent: Mutex<Vec<String>>,
}

impl AcceptingServer {
    fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl DatagramTransport for AcceptingServer {
    async fn exchange(&self, request: DatagramRequest) -> BridgeResult<DatagramReply> {
        let text = String::from_utf8(request.payload.to_vec()).unwrap();
        let reply = if text.starts_with("AUTH ") {
            "200 tok1 LOGIN ACCEPTED"
        } else if text.starts_with("LOGOUT") {
            "203 LOGGED OUT"
        } else {
            "311 MYLIST ENTRY EDITED"
        };
        self.sent.lock().unwrap().push(text);
        Ok(DatagramReply::new(reply, Duration::from_millis(1)))
    }
}

fn config(mode: SessionMode) -> CoreConfig {
    let mut builder = CoreConfig::builder()
        .credentials("alice", "secret")
        .session_mode(mode)
        .shutdown_timeout(Duration::from_secs(2));
    for kind in QueueKind::ALL {
        builder = builder.queue_pacing_ms(kind, 0);
    }
    builder.build().unwrap()
}

#[tokio::test]
async fn test_shutdown_drains_and_logs_out() {
    let server = Arc::new(AcceptingServer::default());
    let core = CoreService::bootstrap(
        config(SessionMode::Shared),
        CoreDependencies::new(SessionTransports::Shared(server.clone())),
    )
    .unwrap();
    let mut events = core.subscribe();
    core.start().unwrap();

    let ticket = core
        .enqueue(
            Command::mark_file_as_disk(FileRef::by_id(42).unwrap()),
            QueueKind::General,
        )
        .unwrap();
    let completion = timeout(Duration::from_secs(5), ticket.wait())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(completion.outcome, OutcomeKind::Success);

    core.shutdown().await.unwrap();

    for snapshot in core.snapshot() {
        assert_eq!(snapshot.state, QueueState::Stopped);
    }
    assert_eq!(server.sent().last().map(String::as_str), Some("LOGOUT s=tok1"));

    let mut logged_out = false;
    while let Some(Ok(event)) = events.try_recv() {
        if matches!(event, CoreEvent::Session(SessionEvent::LoggedOut { .. })) {
            logged_out = true;
        }
    }
    assert!(logged_out);
}

#[tokio::test]
async fn test_shutdown_without_session_sends_nothing() {
    let general = Arc::new(AcceptingServer::default());
    let images = Arc::new(AcceptingServer::default());
    let hasher = Arc::new(AcceptingServer::default());
    let core = CoreService::bootstrap(
        config(SessionMode::PerQueue),
        CoreDependencies::new(SessionTransports::PerQueue {
            general: general.clone(),
            images: images.clone(),
            hasher: hasher.clone(),
        }),
    )
    .unwrap();
    core.start().unwrap();

    core.shutdown().await.unwrap();

    assert!(general.sent().is_empty());
    assert!(images.sent().is_empty());
    assert!(hasher.sent().is_empty());
}

#[tokio::test]
async fn test_per_queue_sessions_log_in_separately() {
    let general = Arc::new(AcceptingServer::default());
    let images = Arc::new(AcceptingServer::default());
    let hasher = Arc::new(AcceptingServer::default());
    let core = CoreService::bootstrap(
        config(SessionMode::PerQueue),
        CoreDependencies::new(SessionTransports::PerQueue {
            general: general.clone(),
            images: images.clone(),
            hasher: hasher.clone(),
        }),
    )
    .unwrap();
    core.start().unwrap();

    let on_general = core
        .enqueue(
            Command::mark_file_as_disk(FileRef::by_id(1).unwrap()),
            QueueKind::General,
        )
        .unwrap();
    let on_hasher = core
        .enqueue(
            Command::mark_file_as_disk(FileRef::by_id(2).unwrap()),
            QueueKind::Hasher,
        )
        .unwrap();
    timeout(Duration::from_secs(5), on_general.wait()).await.unwrap();
    timeout(Duration::from_secs(5), on_hasher.wait()).await.unwrap();

    assert!(general.sent()[0].starts_with("AUTH "));
    assert!(hasher.sent()[0].starts_with("AUTH "));
    assert!(images.sent().is_empty());

    core.shutdown().await.unwrap();
}
