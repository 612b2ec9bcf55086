//! End-to-end session tests over the simulation harness.
//!
//! These tests drive the full connect → join → message → reconnect flow the
//! way the production transport driver does, with the gateway scripted and
//! time virtual. The session unit tests cover each transition in isolation;
//! these verify the composed behavior a consumer observes.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use palaver_client::OutboundFrame;
use palaver_harness::{SimDriver, SimGateway, message_frame};

const RECIPIENT: u64 = 42;
const SELF_ID: u64 = 7;
const ROOM: u64 = 99;

fn connected_driver() -> SimDriver {
    let gateway = SimGateway::new().with_auto_room(ROOM);
    let mut driver = SimDriver::new(gateway, Some("tok".to_string()), RECIPIENT, Some(SELF_ID));
    driver.start();
    driver
}

/// The canonical flow: connect, get the room binding, post a message, and
/// have the gateway's echo of it suppressed while the partner's reply is
/// delivered.
#[test]
fn message_round_trip_suppresses_only_the_echo() {
    let gateway = SimGateway::new().with_auto_room(ROOM).with_echo_from(SELF_ID);
    let mut driver = SimDriver::new(gateway, Some("tok".to_string()), RECIPIENT, Some(SELF_ID));

    driver.start();
    assert!(driver.is_connected());
    assert_eq!(driver.room_id(), Some(ROOM));
    driver.drain_delivered(); // the room_joined frame

    // The echo arrives through the gateway script and is absorbed.
    assert!(driver.send_message("hello", None));
    assert!(driver.delivered().is_empty());

    // The partner's reply flows through untouched.
    driver.deliver_raw(&message_frame(ROOM, 8, "hi yourself", 2));
    assert_eq!(driver.delivered().len(), 1);

    let sent = driver.gateway_mut().drain_received();
    assert_eq!(sent, vec![
        OutboundFrame::JoinRoom { recipient_id: RECIPIENT, token: "tok".to_string() },
        OutboundFrame::SendMessage { room_id: ROOM, content: "hello".to_string() },
    ]);
}

/// An echo older than the dedup window must be delivered: the signature has
/// expired and the frame can no longer be attributed to our send.
#[test]
fn echo_after_window_expiry_is_delivered() {
    let mut driver = connected_driver();
    driver.drain_delivered();

    assert!(driver.send_message("hello", None));
    driver.advance(Duration::from_secs(6));

    driver.deliver_raw(&message_frame(ROOM, SELF_ID, "hello", 1));
    assert_eq!(driver.delivered().len(), 1);
}

/// Identical content from the partner must never be swallowed by our own
/// pending signature.
#[test]
fn partner_message_with_identical_content_is_delivered() {
    let mut driver = connected_driver();
    driver.drain_delivered();

    assert!(driver.send_message("hello", None));
    driver.deliver_raw(&message_frame(ROOM, 8, "hello", 1));

    assert_eq!(driver.delivered().len(), 1);
}

/// Property: a dropped transport is redialed exactly once per close, a fixed
/// delay after it, and the session rejoins the room on the new connection.
#[test]
fn dropped_transport_reconnects_after_fixed_delay() {
    let mut driver = connected_driver();
    driver.gateway_mut().drain_received();

    driver.drop_connection();
    assert!(!driver.is_connected());
    assert_eq!(driver.dials(), 1);

    driver.advance(Duration::from_secs(2));
    assert!(!driver.is_connected());

    driver.advance(Duration::from_secs(1));
    assert!(driver.is_connected());
    assert_eq!(driver.dials(), 2);

    // The new connection re-joins with the same recipient key.
    assert!(matches!(
        driver.gateway_mut().received().first(),
        Some(OutboundFrame::JoinRoom { recipient_id: RECIPIENT, .. })
    ));

    // No further dials without another close.
    driver.advance(Duration::from_secs(30));
    assert_eq!(driver.dials(), 2);
}

/// A dial that fails keeps retrying, one deadline at a time.
#[test]
fn failed_redial_is_retried_on_a_fresh_deadline() {
    let gateway = SimGateway::new().with_auto_room(ROOM);
    let mut driver = SimDriver::new(gateway, Some("tok".to_string()), RECIPIENT, Some(SELF_ID));
    driver.refuse_next_dials(2);

    driver.start();
    assert_eq!(driver.dials(), 1);

    driver.advance(Duration::from_secs(3));
    assert_eq!(driver.dials(), 2);
    assert!(!driver.is_connected());

    driver.advance(Duration::from_secs(3));
    assert_eq!(driver.dials(), 3);
    assert!(driver.is_connected());
}

/// Sends while disconnected fail silently: no queueing, no transmission, and
/// the gateway sees nothing when the connection comes back.
#[test]
fn send_while_disconnected_is_a_silent_no_op() {
    let mut driver = connected_driver();
    driver.drop_connection();
    driver.gateway_mut().drain_received();

    assert!(!driver.send_message("lost", None));
    assert!(!driver.send_typing());
    assert!(!driver.mark_read(1));

    driver.advance(Duration::from_secs(3));
    assert!(driver.is_connected());

    // Only the rejoin reached the gateway; nothing was replayed.
    let sent = driver.gateway_mut().drain_received();
    assert_eq!(sent.len(), 1);
    assert!(matches!(sent[0], OutboundFrame::JoinRoom { .. }));
}

/// Teardown is idempotent and cancels a pending reconnect; a stale close
/// event arriving afterwards must not resurrect the timer.
#[test]
fn teardown_cancels_reconnect_and_survives_stale_close() {
    let mut driver = connected_driver();

    driver.drop_connection();
    driver.disconnect();
    driver.disconnect();

    // The closed socket's own close notification straggles in.
    driver.drop_connection();

    driver.advance(Duration::from_secs(30));
    assert!(!driver.is_connected());
    assert_eq!(driver.dials(), 1);
}

/// The session adopts whatever room id the gateway last announced, and
/// subsequent sends follow it.
#[test]
fn room_rebinding_redirects_subsequent_sends() {
    let mut driver = connected_driver();
    driver.gateway_mut().drain_received();

    driver.deliver_raw(r#"{"action":"room_joined","room_id":123}"#);
    assert_eq!(driver.room_id(), Some(123));

    assert!(driver.send_message("where am i", None));
    assert_eq!(driver.gateway_mut().received(), &[OutboundFrame::SendMessage {
        room_id: 123,
        content: "where am i".to_string(),
    }]);
}

/// Malformed and unknown frames: garbage is dropped without touching the
/// connection, unknown-but-valid frames pass through to the consumer.
#[test]
fn malformed_frames_are_dropped_without_closing() {
    let mut driver = connected_driver();
    driver.drain_delivered();

    driver.deliver_raw("{definitely not json");
    driver.deliver_raw("[1,2,3]");
    assert!(driver.delivered().is_empty());
    assert!(driver.is_connected());

    driver.deliver_raw(r#"{"action":"presence","users":[1,2]}"#);
    assert_eq!(driver.delivered().len(), 1);

    // Still fully operational afterwards.
    assert!(driver.send_message("still here", None));
}

/// A logged-out caller gets a session that reports itself disconnected and
/// never dials.
#[test]
fn session_without_credential_never_dials() {
    let gateway = SimGateway::new().with_auto_room(ROOM);
    let mut driver = SimDriver::new(gateway, None, RECIPIENT, Some(SELF_ID));

    driver.start();
    driver.advance(Duration::from_secs(30));

    assert!(!driver.is_connected());
    assert_eq!(driver.dials(), 0);
    assert!(!driver.send_message("hello", Some(ROOM)));
}
