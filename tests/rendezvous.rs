mod utils;

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::timeout;

use tandem::peer::PeerRole;
use tandem::signaling::{SignalingMessage, SignalingServer};
use tandem::transport::{self, TransportError, TransportEvent};

use utils::init_tracing;

const WAIT: Duration = Duration::from_secs(5);

async fn start_server() -> String {
    let server = SignalingServer::bind("127.0.0.1:0")
        .await
        .expect("bind signaling server");
    let addr = server.local_addr().unwrap();
    tokio::spawn(server.run());
    format!("ws://{}", addr)
}

async fn next_event(rx: &mut mpsc::UnboundedReceiver<TransportEvent>) -> TransportEvent {
    timeout(WAIT, rx.recv())
        .await
        .expect("timed out waiting for transport event")
        .expect("transport stream ended")
}

#[tokio::test]
async fn roster_decides_roles() {
    init_tracing();
    let url = start_server().await;

    let (a, _a_tx, _a_rx) = transport::connect(&url, "roles").await.unwrap();
    let (b, _b_tx, _b_rx) = transport::connect(&url, "roles").await.unwrap();

    assert!(a.roster.is_empty());
    assert_eq!(PeerRole::from_roster(&a.roster), PeerRole::Creator);
    assert!(b.roster.contains_key(&a.local_id));
    assert_eq!(PeerRole::from_roster(&b.roster), PeerRole::Joiner);
}

#[tokio::test]
async fn relay_suppresses_self_echo() {
    init_tracing();
    let url = start_server().await;

    let (a, _a_tx, mut a_rx) = transport::connect(&url, "echo").await.unwrap();
    let (b, b_tx, mut b_rx) = transport::connect(&url, "echo").await.unwrap();

    b_tx.send(SignalingMessage::Init);
    b_tx.send(SignalingMessage::Offer {
        sdp: "v=0".to_string(),
    });

    assert_eq!(
        next_event(&mut a_rx).await,
        TransportEvent::Signal {
            from: b.local_id,
            message: SignalingMessage::Init
        }
    );
    assert_eq!(
        next_event(&mut a_rx).await,
        TransportEvent::Signal {
            from: b.local_id,
            message: SignalingMessage::Offer {
                sdp: "v=0".to_string()
            }
        }
    );

    // b hears nothing of its own traffic
    assert!(
        timeout(Duration::from_millis(200), b_rx.recv())
            .await
            .is_err()
    );
    assert_ne!(a.local_id, b.local_id);
}

#[tokio::test]
async fn leaving_peer_is_announced_as_remove() {
    init_tracing();
    let url = start_server().await;

    let (_a, _a_tx, mut a_rx) = transport::connect(&url, "bye").await.unwrap();
    let (b, b_tx, _b_rx) = transport::connect(&url, "bye").await.unwrap();

    b_tx.leave();

    assert_eq!(
        next_event(&mut a_rx).await,
        TransportEvent::Signal {
            from: b.local_id,
            message: SignalingMessage::Remove
        }
    );
}

#[tokio::test]
async fn third_peer_is_turned_away() {
    init_tracing();
    let url = start_server().await;

    let _a = transport::connect(&url, "pair").await.unwrap();
    let _b = transport::connect(&url, "pair").await.unwrap();
    let third = transport::connect(&url, "pair").await;

    match third {
        Err(TransportError::Rejected(reason)) => assert!(reason.contains("room full")),
        Err(e) => panic!("unexpected error: {}", e),
        Ok(_) => panic!("third peer should not join"),
    }
}

#[tokio::test]
async fn rooms_are_isolated() {
    init_tracing();
    let url = start_server().await;

    let (_a, _a_tx, mut a_rx) = transport::connect(&url, "left").await.unwrap();
    let (c, _c_tx, _c_rx) = transport::connect(&url, "right").await.unwrap();
    let (_d, d_tx, _d_rx) = transport::connect(&url, "right").await.unwrap();

    assert!(c.roster.is_empty());
    d_tx.send(SignalingMessage::Init);

    assert!(
        timeout(Duration::from_millis(200), a_rx.recv())
            .await
            .is_err()
    );
}
