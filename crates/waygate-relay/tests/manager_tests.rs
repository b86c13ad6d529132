// SPDX-FileCopyrightText: 2026 Waygate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the session connection manager: single-flight
//! acquire, the pairing state machine, close handling, idle eviction, and
//! restore.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{build_manager, fast_settings, wait_until};
use waygate_core::{CloseReason, Credentials, LinkEvent, SessionId, SessionStatus, WaygateError};
use waygate_storage::queries::sessions;
use waygate_test_utils::TestHarness;

#[tokio::test]
async fn concurrent_acquires_share_one_connection() {
    let harness = TestHarness::new().await;
    harness.create_user("u-1", 100).await;
    let sid = harness
        .create_session("s-1", "u-1", SessionStatus::Pending, None)
        .await;
    let (manager, cancel) = build_manager(&harness, fast_settings());

    let mut handles = Vec::new();
    for _ in 0..10 {
        let manager = manager.clone();
        let sid = sid.clone();
        handles.push(tokio::spawn(async move { manager.acquire(&sid).await }));
    }

    let mut links = Vec::new();
    for handle in handles {
        links.push(handle.await.unwrap().unwrap());
    }

    assert_eq!(harness.transport.open_count(), 1);
    assert_eq!(manager.live_connections(), 1);
    for link in &links[1..] {
        assert!(Arc::ptr_eq(&links[0], link));
    }
    cancel.cancel();
}

#[tokio::test]
async fn open_failures_surface_connection_unavailable_after_cap() {
    let harness = TestHarness::new().await;
    harness.create_user("u-1", 100).await;
    let sid = harness
        .create_session("s-1", "u-1", SessionStatus::Pending, None)
        .await;
    harness.transport.fail_next_opens(10);
    let (manager, cancel) = build_manager(&harness, fast_settings());

    let err = manager.acquire(&sid).await.unwrap_err();
    assert!(matches!(err, WaygateError::ConnectionUnavailable { .. }));
    // The open policy allows three attempts.
    assert_eq!(harness.transport.open_count(), 3);
    assert_eq!(manager.live_connections(), 0);
    cancel.cancel();
}

#[tokio::test]
async fn pairing_events_drive_the_session_state_machine() {
    let harness = TestHarness::new().await;
    harness.create_user("u-1", 100).await;
    let sid = harness
        .create_session("s-1", "u-1", SessionStatus::Pending, None)
        .await;
    let (manager, cancel) = build_manager(&harness, fast_settings());

    manager.acquire(&sid).await.unwrap();
    let link = harness.transport.link(&sid).await.unwrap();

    link.emit(LinkEvent::PairingChallenge {
        value: "XYZ".into(),
        ttl: Duration::from_secs(60),
    })
    .await;
    {
        let db = harness.db.clone();
        let sid = sid.clone();
        wait_until(Duration::from_secs(2), move || {
            let db = db.clone();
            let sid = sid.clone();
            async move {
                sessions::get_session(&db, &sid)
                    .await
                    .unwrap()
                    .is_some_and(|s| s.status == SessionStatus::QrReady)
            }
        })
        .await;
    }
    let session = sessions::get_session(&harness.db, &sid).await.unwrap().unwrap();
    assert_eq!(session.qr_challenge.as_deref(), Some("XYZ"));
    assert!(session.qr_expires_at.is_some());

    link.emit(LinkEvent::Opened {
        identity: "15551230000".into(),
    })
    .await;
    {
        let db = harness.db.clone();
        let sid = sid.clone();
        wait_until(Duration::from_secs(2), move || {
            let db = db.clone();
            let sid = sid.clone();
            async move {
                sessions::get_session(&db, &sid)
                    .await
                    .unwrap()
                    .is_some_and(|s| s.status == SessionStatus::Connected)
            }
        })
        .await;
    }
    let session = sessions::get_session(&harness.db, &sid).await.unwrap().unwrap();
    assert_eq!(session.phone_number.as_deref(), Some("15551230000"));
    assert!(session.qr_challenge.is_none());
    cancel.cancel();
}

#[tokio::test]
async fn terminal_close_logs_out_and_erases_credentials() {
    let harness = TestHarness::new().await;
    harness.create_user("u-1", 100).await;
    let sid = harness
        .create_session("s-1", "u-1", SessionStatus::Connected, None)
        .await;
    harness.seed_credentials(&sid, "15551230000").await;
    let (manager, cancel) = build_manager(&harness, fast_settings());

    manager.acquire(&sid).await.unwrap();
    let link = harness.transport.link(&sid).await.unwrap();
    link.emit_closed(CloseReason::LoggedOut).await;

    {
        let db = harness.db.clone();
        let sid = sid.clone();
        wait_until(Duration::from_secs(2), move || {
            let db = db.clone();
            let sid = sid.clone();
            async move {
                sessions::get_session(&db, &sid)
                    .await
                    .unwrap()
                    .is_some_and(|s| s.status == SessionStatus::LoggedOut)
            }
        })
        .await;
    }
    assert!(!harness.store.has_blob(&sid).await.unwrap());
    assert_eq!(manager.live_connections(), 0);

    // Terminal: no automatic reconnect happens.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(harness.transport.open_count(), 1);
    cancel.cancel();
}

#[tokio::test]
async fn transient_close_keeps_credentials_and_reconnects() {
    let harness = TestHarness::new().await;
    harness.create_user("u-1", 100).await;
    let sid = harness
        .create_session("s-1", "u-1", SessionStatus::Connected, None)
        .await;
    harness.seed_credentials(&sid, "15551230000").await;
    let (manager, cancel) = build_manager(&harness, fast_settings());

    manager.acquire(&sid).await.unwrap();
    let link = harness.transport.link(&sid).await.unwrap();
    link.emit_closed(CloseReason::ConnectionLost).await;

    // The manager re-opens from the retained credential blob.
    {
        let transport = harness.transport.clone();
        wait_until(Duration::from_secs(2), move || {
            let transport = transport.clone();
            async move { transport.open_count() >= 2 }
        })
        .await;
    }
    assert!(harness.store.has_blob(&sid).await.unwrap());

    let reopened = harness.transport.opened_with(&sid).await.unwrap();
    assert_eq!(reopened.paired_identity.as_deref(), Some("15551230000"));
    cancel.cancel();
}

#[tokio::test]
async fn release_is_idempotent_and_closes_the_link() {
    let harness = TestHarness::new().await;
    harness.create_user("u-1", 100).await;
    let sid = harness
        .create_session("s-1", "u-1", SessionStatus::Pending, None)
        .await;
    let (manager, cancel) = build_manager(&harness, fast_settings());

    manager.acquire(&sid).await.unwrap();
    let link = harness.transport.link(&sid).await.unwrap();

    manager.release(&sid).await;
    assert!(link.is_closed());
    assert_eq!(manager.live_connections(), 0);
    manager.release(&sid).await;

    // A deliberate release never flips the session status.
    let session = sessions::get_session(&harness.db, &sid).await.unwrap().unwrap();
    assert_eq!(session.status, SessionStatus::Pending);
    cancel.cancel();
}

#[tokio::test]
async fn idle_links_are_swept_and_reacquire_reopens() {
    let harness = TestHarness::new().await;
    harness.create_user("u-1", 100).await;
    let sid = harness
        .create_session("s-1", "u-1", SessionStatus::Connected, None)
        .await;
    harness.seed_credentials(&sid, "15551230000").await;

    let mut settings = fast_settings();
    settings.idle_window = Duration::from_millis(50);
    settings.sweep_interval = Duration::from_millis(25);
    let (manager, cancel) = build_manager(&harness, settings);
    let sweep = manager.spawn_idle_sweep();

    manager.acquire(&sid).await.unwrap();
    assert_eq!(manager.live_connections(), 1);

    {
        let manager = manager.clone();
        wait_until(Duration::from_secs(2), move || {
            let manager = manager.clone();
            async move { manager.live_connections() == 0 }
        })
        .await;
    }

    // Eviction left the persisted status untouched.
    let session = sessions::get_session(&harness.db, &sid).await.unwrap().unwrap();
    assert_eq!(session.status, SessionStatus::Connected);

    // Re-acquire rebuilds the link from stored credentials, no re-pairing.
    manager.acquire(&sid).await.unwrap();
    assert_eq!(harness.transport.open_count(), 2);
    let creds = harness.transport.opened_with(&sid).await.unwrap();
    assert!(creds.is_paired());

    cancel.cancel();
    let _ = sweep.await;
}

#[tokio::test]
async fn credential_updates_flow_through_the_coalescing_saver() {
    let harness = TestHarness::new().await;
    harness.create_user("u-1", 100).await;
    let sid = harness
        .create_session("s-1", "u-1", SessionStatus::Pending, None)
        .await;
    let (manager, cancel) = build_manager(&harness, fast_settings());

    manager.acquire(&sid).await.unwrap();
    let link = harness.transport.link(&sid).await.unwrap();

    let mut creds = Credentials::initial();
    creds.registration_id = 99;
    link.emit(LinkEvent::CredentialsUpdated(creds)).await;

    {
        let store = harness.store.clone();
        let sid = sid.clone();
        wait_until(Duration::from_secs(2), move || {
            let store = store.clone();
            let sid = sid.clone();
            async move {
                store
                    .load(&sid)
                    .await
                    .is_ok_and(|c| c.registration_id == 99)
            }
        })
        .await;
    }
    cancel.cancel();
}

#[tokio::test]
async fn store_listener_starts_new_sessions_and_stops_disconnected_ones() {
    let harness = TestHarness::new().await;
    harness.create_user("u-1", 100).await;
    let (manager, cancel) = build_manager(&harness, fast_settings());
    let listener = manager.spawn_store_listener();

    // An insert by the external layer brings the session up.
    let sid = harness
        .create_session("s-new", "u-1", SessionStatus::Pending, None)
        .await;
    {
        let manager = manager.clone();
        wait_until(Duration::from_secs(2), move || {
            let manager = manager.clone();
            async move { manager.live_connections() == 1 }
        })
        .await;
    }

    // An external teardown request tears it down.
    sessions::set_status(&harness.db, &sid, SessionStatus::Disconnected)
        .await
        .unwrap();
    {
        let manager = manager.clone();
        wait_until(Duration::from_secs(2), move || {
            let manager = manager.clone();
            async move { manager.live_connections() == 0 }
        })
        .await;
    }

    cancel.cancel();
    let _ = listener.await;
}

#[tokio::test]
async fn restore_brings_back_sessions_and_resets_stale_qr() {
    let harness = TestHarness::new().await;
    harness.create_user("u-1", 100).await;
    let connected = harness
        .create_session("s-conn", "u-1", SessionStatus::Connected, None)
        .await;
    harness.seed_credentials(&connected, "15551230000").await;
    let stale_qr = harness
        .create_session("s-qr", "u-1", SessionStatus::QrReady, None)
        .await;
    harness
        .create_session("s-out", "u-1", SessionStatus::LoggedOut, None)
        .await;

    let (manager, cancel) = build_manager(&harness, fast_settings());
    let count = manager.restore_sessions().await.unwrap();
    assert_eq!(count, 2);

    {
        let manager = manager.clone();
        wait_until(Duration::from_secs(2), move || {
            let manager = manager.clone();
            async move { manager.live_connections() == 2 }
        })
        .await;
    }

    let session = sessions::get_session(&harness.db, &stale_qr).await.unwrap().unwrap();
    // The stale challenge was discarded; a fresh one will arrive from the
    // new connection.
    assert_ne!(session.status, SessionStatus::QrReady);
    cancel.cancel();
}
