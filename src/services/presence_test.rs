use super::*;
use crate::state::test_helpers;
use events::Notice;
use tokio::time::{Duration, timeout};

fn ping() -> ServerEvent {
    ServerEvent::Connected(Notice::new("ping"))
}

async fn recv(rx: &mut mpsc::Receiver<ServerEvent>) -> ServerEvent {
    timeout(Duration::from_millis(200), rx.recv())
        .await
        .expect("receive timed out")
        .expect("channel closed unexpectedly")
}

fn assert_empty(rx: &mut mpsc::Receiver<ServerEvent>) {
    assert!(rx.try_recv().is_err(), "expected no queued event");
}

#[tokio::test]
async fn broadcast_skips_unjoined_and_excluded() {
    let state = test_helpers::test_app_state();
    let (_lurker, _tx, mut lurker_rx) = test_helpers::seed_client(&state).await;
    let (alice, _, mut alice_rx) = test_helpers::seed_member(&state, "alice").await;
    let (_bob, _, mut bob_rx) = test_helpers::seed_member(&state, "bob").await;

    broadcast(&state, &ping(), Some(alice)).await;

    assert_eq!(recv(&mut bob_rx).await, ping());
    assert_empty(&mut alice_rx);
    assert_empty(&mut lurker_rx);
}

#[tokio::test]
async fn roster_is_sorted_and_deduplicated() {
    let state = test_helpers::test_app_state();
    test_helpers::seed_member(&state, "carol").await;
    test_helpers::seed_member(&state, "alice").await;
    test_helpers::seed_member(&state, "carol").await;
    test_helpers::seed_client(&state).await;

    let names: Vec<String> = roster(&state).await.into_iter().map(|u| u.username).collect();
    assert_eq!(names, ["alice", "carol"]);
}

#[tokio::test]
async fn attach_reports_first_connection_only() {
    let state = test_helpers::test_app_state();
    let (a, _, _rx_a) = test_helpers::seed_client(&state).await;
    let (b, _, _rx_b) = test_helpers::seed_client(&state).await;

    assert!(attach(&state, a, Member::new("alice")).await);
    assert!(!attach(&state, b, Member::new("alice")).await);
    // Re-attaching the same connection does not count itself as another tab.
    assert!(!attach(&state, a, Member::new("alice")).await);
}

#[tokio::test]
async fn disconnect_reports_last_connection_only() {
    let state = test_helpers::test_app_state();
    let (a, _, _rx_a) = test_helpers::seed_member(&state, "alice").await;
    let (b, _, _rx_b) = test_helpers::seed_member(&state, "alice").await;

    assert_eq!(disconnect(&state, a).await, None);
    assert!(is_online(&state, "alice").await);
    assert_eq!(disconnect(&state, b).await.map(|m| m.username), Some("alice".to_owned()));
    assert!(!is_online(&state, "alice").await);
    assert!(state.clients.read().await.is_empty());
}

#[tokio::test]
async fn disconnect_unknown_or_unjoined_is_none() {
    let state = test_helpers::test_app_state();
    assert_eq!(disconnect(&state, Uuid::new_v4()).await, None);
    let (lurker, _, _rx) = test_helpers::seed_client(&state).await;
    assert_eq!(disconnect(&state, lurker).await, None);
}

#[tokio::test]
async fn detach_keeps_connection_registered() {
    let state = test_helpers::test_app_state();
    let (a, _, _rx) = test_helpers::seed_member(&state, "alice").await;

    assert_eq!(detach(&state, a).await.map(|m| m.username), Some("alice".to_owned()));
    assert!(state.clients.read().await.contains_key(&a));
    assert!(roster(&state).await.is_empty());
}

#[tokio::test]
async fn send_to_user_reaches_every_tab() {
    let state = test_helpers::test_app_state();
    let (_, _, mut tab1) = test_helpers::seed_member(&state, "alice").await;
    let (_, _, mut tab2) = test_helpers::seed_member(&state, "alice").await;
    let (_, _, mut bob_rx) = test_helpers::seed_member(&state, "bob").await;

    assert_eq!(send_to_user(&state, "alice", &ping()).await, 2);
    assert_eq!(recv(&mut tab1).await, ping());
    assert_eq!(recv(&mut tab2).await, ping());
    assert_empty(&mut bob_rx);

    assert_eq!(send_to_user(&state, "nobody", &ping()).await, 0);
}

#[tokio::test]
async fn full_channel_drops_instead_of_blocking() {
    let state = test_helpers::test_app_state();
    let client_id = Uuid::new_v4();
    let (tx, mut rx) = mpsc::channel(1);
    connect(&state, client_id, tx).await;
    attach(&state, client_id, Member::new("slow")).await;

    broadcast(&state, &ping(), None).await;
    broadcast(&state, &ping(), None).await;

    assert_eq!(recv(&mut rx).await, ping());
    assert_empty(&mut rx);
}
