#![allow(missing_docs)]
//! Startup protocol, credential exchange and sample handling

use assert_matches::assert_matches;
use friendify_app::AppError;
use friendify_core::{Direction, DistanceDirectionState, SessionState};
use friendify_ranging::{HandleId, RangingCapability};
use friendify_testkit::{fixtures, Harness};

#[test]
fn test_end_to_end_handshake_and_sample() {
    let mut harness = Harness::new();
    harness.connect();
    assert_eq!(harness.orchestrator().state(), SessionState::Discovering);

    harness.peer_connected(1);
    let handle = harness.handle_of(1).unwrap();
    assert_eq!(harness.ranging().created(), vec![handle]);
    assert_eq!(
        harness.transport().credentials_sent_to(&fixtures::peer(1)),
        vec![fixtures::local_credential(handle)]
    );
    assert!(harness.session(1).unwrap().credential_shared);
    assert_eq!(harness.orchestrator().state(), SessionState::Connected);

    harness.receive_credential(1);
    assert_eq!(
        harness.ranging().runs_for(handle),
        vec![fixtures::peer_credential(1)]
    );
    assert_eq!(
        harness.session(1).unwrap().peer_credential,
        Some(fixtures::peer_credential(1))
    );

    assert!(harness.sample(1, fixtures::close_left()));
    let view = harness.view();
    assert_eq!(
        view.distance_direction_state(),
        DistanceDirectionState::CloseUpInView
    );
    assert_eq!(view.azimuth(), Some(Direction::Left));
    assert!(view.rotation_angle() < 0.0);
    assert_eq!(view.peers()[0].distance, Some(0.1));
    assert_eq!(view.peers()[0].display_name, "peer 1");
}

#[test]
fn test_credential_is_shared_once_per_handle() {
    let mut harness = Harness::new();
    harness.connect();
    harness.peer_connected(1);
    harness.receive_credential(1);
    harness.receive_credential(1);
    harness.connect();

    assert_eq!(
        harness
            .transport()
            .credentials_sent_to(&fixtures::peer(1))
            .len(),
        1
    );
    // Every receipt and the repeated connect re-issue the run on one handle
    assert_eq!(harness.ranging().created().len(), 1);
    assert_eq!(harness.ranging().runs_for(HandleId(1)).len(), 3);
}

#[test]
fn test_connect_is_idempotent_without_peers() {
    let mut harness = Harness::new();
    harness.connect();
    harness.connect();
    harness.connect();

    assert_eq!(harness.transport().starts(), 1);
    assert_eq!(harness.orchestrator().state(), SessionState::Discovering);
    assert!(harness.ranging().created().is_empty());
}

#[test]
fn test_connect_does_not_run_without_peer_credential() {
    let mut harness = Harness::new();
    harness.connect();
    harness.peer_connected(1);
    harness.connect();

    assert_eq!(harness.ranging().run_count(), 0);
    assert_eq!(harness.ranging().created().len(), 1);
    assert_eq!(harness.orchestrator().state(), SessionState::Connected);
}

#[test]
fn test_duplicate_connect_event_keeps_session() {
    let mut harness = Harness::new();
    harness.connect();
    harness.peer_connected(1);
    harness.receive_credential(1);
    harness.peer_connected(1);

    assert_eq!(harness.orchestrator().peers().len(), 1);
    assert!(harness.session(1).unwrap().peer_credential.is_some());
    assert_eq!(harness.ranging().created().len(), 1);
}

#[test]
fn test_credential_without_session_is_dropped() {
    let mut harness = Harness::new();
    harness.connect();
    harness.receive_credential(7);

    assert_eq!(harness.ranging().run_count(), 0);
    assert!(harness.session(7).is_none());
}

#[test]
fn test_sample_with_stale_credential_is_ignored() {
    let mut harness = Harness::new();
    harness.connect();
    harness.peer_connected(1);

    // No peer credential yet, so nothing matches
    assert!(harness.sample(1, fixtures::close_left()));
    assert_eq!(harness.session(1).unwrap().last_distance, None);
    assert_eq!(
        harness.view().distance_direction_state(),
        DistanceDirectionState::Unknown
    );
}

#[test]
fn test_peers_are_ordered_by_distance() {
    let mut harness = Harness::new();
    harness.connect();
    for seed in 1..=3 {
        harness.peer_connected(seed);
        harness.receive_credential(seed);
    }

    harness.sample(1, fixtures::far_ahead(4.0));
    harness.sample(2, fixtures::far_ahead(1.5));

    let order: Vec<_> = harness.view().peers().iter().map(|p| p.id).collect();
    assert_eq!(
        order,
        vec![fixtures::peer(2), fixtures::peer(1), fixtures::peer(3)]
    );
    assert_eq!(
        harness.view().distance_direction_state(),
        DistanceDirectionState::NotCloseUpInView
    );

    harness.sample(3, fixtures::close_left());
    assert_eq!(harness.view().peers()[0].id, fixtures::peer(3));
    assert_eq!(
        harness.view().distance_direction_state(),
        DistanceDirectionState::CloseUpInView
    );
}

#[test]
fn test_indicators_freeze_out_of_view() {
    let mut harness = Harness::new();
    harness.connect();
    harness.peer_connected(1);
    harness.receive_credential(1);

    harness.sample(1, fixtures::close_left());
    harness.sample(1, fixtures::out_of_view(2.0));

    let view = harness.view();
    assert_eq!(view.distance_direction_state(), DistanceDirectionState::OutOfView);
    assert_eq!(view.azimuth(), Some(Direction::Left));
    assert_eq!(view.elevation(), Some(Direction::Up));
}

#[test]
fn test_chat_in_both_directions() {
    let mut harness = Harness::new();
    harness.connect();
    harness.peer_connected(1);

    assert_eq!(harness.send_message("hello").unwrap(), 1);
    harness.receive_text(1, "hi back");
    harness.receive_text(1, "");

    assert_eq!(
        harness.transport().texts_sent_to(&fixtures::peer(1)),
        vec!["hello"]
    );
    assert_eq!(harness.view().chat(), vec!["You: hello", "peer 1: hi back"]);
}

#[test]
fn test_whitespace_chat_is_sent_verbatim() {
    let mut harness = Harness::new();
    harness.connect();
    harness.peer_connected(1);

    assert_eq!(harness.send_message("  ").unwrap(), 1);
    assert_matches!(harness.send_message(""), Err(AppError::Input(_)));
    harness.receive_text(1, " ");

    assert_eq!(
        harness.transport().texts_sent_to(&fixtures::peer(1)),
        vec!["  "]
    );
    assert_eq!(harness.view().chat(), vec!["You:   ", "peer 1:  "]);
}

#[test]
fn test_send_failure_is_reported_not_thrown() {
    let mut harness = Harness::new();
    harness.connect();
    harness.peer_connected(1);
    harness.transport().fail_sends("radio off");

    assert_eq!(harness.send_message("hello").unwrap(), 1);
    assert!(harness
        .view()
        .logs()
        .iter()
        .any(|line| line.contains("Error sending data to peer 1") && line.contains("radio off")));
    assert_eq!(harness.orchestrator().state(), SessionState::Connected);
}

#[test]
fn test_send_before_connect_is_rejected() {
    let mut harness = Harness::new();
    assert_matches!(harness.send_message("hello"), Err(AppError::NotStarted));
    assert!(harness.view().chat().is_empty());
}

#[test]
fn test_malformed_payload_is_counted() {
    let mut harness = Harness::new();
    harness.connect();
    harness.peer_connected(1);
    harness.receive(1, vec![0xC3, 0x28]);

    assert_eq!(harness.session(1).unwrap().protocol_violations, 1);
    assert_eq!(harness.orchestrator().state(), SessionState::Connected);
}

#[test]
fn test_access_required_is_sticky_but_chat_works() {
    let mut harness = Harness::with_capability(RangingCapability::AccessRequired);
    harness.connect();
    assert_eq!(harness.orchestrator().state(), SessionState::AccessRequired);

    harness.peer_connected(1);
    harness.receive_credential(1);
    assert_eq!(harness.orchestrator().state(), SessionState::AccessRequired);
    assert!(harness.ranging().created().is_empty());
    assert_eq!(harness.transport().starts(), 1);

    assert_eq!(harness.send_message("can you see me").unwrap(), 1);
    harness.peer_disconnected(1);
    assert_eq!(harness.view().state(), SessionState::AccessRequired);
}

#[test]
fn test_unsupported_device() {
    let mut harness = Harness::with_capability(RangingCapability::Unsupported);
    harness.connect();
    assert_eq!(harness.view().state(), SessionState::Unsupported);
    assert!(harness
        .view()
        .logs()
        .iter()
        .any(|line| line == SessionState::Unsupported.label()));
}
