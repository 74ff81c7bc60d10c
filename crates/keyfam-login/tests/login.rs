//! Login orchestrator integration tests

#![allow(clippy::unwrap_used)]

mod common;

use assert_matches::assert_matches;
use common::{quick_config, Harness};
use keyfam_core::{DeviceId, DeviceIdentity, KeyfamError, LoginConfig};
use keyfam_login::{InFlightRegistry, LoginOrchestrator, LoginRequest, ProvisioningState};
use keyfam_testkit::{FakeUser, PeerBehavior, ScriptedKexPeer, TEST_DEVICE_NAME};
use std::time::Duration;

#[tokio::test]
async fn test_login_provisions_and_returns_session() {
    let harness = Harness::new(FakeUser::with_passphrase_key("alice"));
    let orchestrator = harness.orchestrator(quick_config());

    let session = orchestrator.login(&harness.request(), None).await.unwrap();

    assert_eq!(session.username(), "alice");
    assert_eq!(session.device().name(), TEST_DEVICE_NAME);
    assert_eq!(harness.prompter.prompt_count(), 1);
    let family = harness.server.family(harness.user.identity());
    assert_eq!(
        ProvisioningState::of(&family, session.device()),
        ProvisioningState::HasDeviceKey {
            key_id: session.device_key()
        }
    );
}

#[tokio::test]
async fn test_second_login_does_no_provisioning() {
    let harness = Harness::new(FakeUser::with_passphrase_key("alice"));
    let orchestrator = harness.orchestrator(quick_config());

    let first = orchestrator.login(&harness.request(), None).await.unwrap();
    first.logout();
    let second = orchestrator.login(&harness.request(), None).await.unwrap();

    assert_eq!(harness.keygen.count(), 1);
    assert_eq!(harness.decision.select_count(), 1);
    assert_eq!(harness.prompter.prompt_count(), 1);
    assert_eq!(second.device().name(), TEST_DEVICE_NAME);
}

#[tokio::test]
async fn test_user_without_keys_logs_in_without_signer() {
    let harness = Harness::new(FakeUser::without_keys("alice"));
    let orchestrator = harness.orchestrator(quick_config());

    let session = orchestrator.login(&harness.request(), None).await.unwrap();

    assert_eq!(harness.decision.select_count(), 0);
    let family = harness.server.family(harness.user.identity());
    assert_eq!(family.eldest_id(), Some(session.device_key()));
}

#[tokio::test]
async fn test_forced_login_of_user_without_keys_replaces_session() {
    let harness = Harness::new(FakeUser::without_keys("alice"));
    let bob = FakeUser::with_passphrase_key("bob");
    harness.add_user(&bob);
    let orchestrator = harness.orchestrator(quick_config());
    let bob_session = orchestrator
        .login(&LoginRequest::new("bob", bob.passphrase.clone()), None)
        .await
        .unwrap();

    let alice = orchestrator
        .login(&harness.request().with_force(true), Some(&bob_session))
        .await
        .unwrap();

    assert_eq!(alice.username(), "alice");
    assert_eq!(harness.decision.select_count(), 1);
    let family = harness.server.family(harness.user.identity());
    assert_eq!(family.eldest_id(), Some(alice.device_key()));
    assert_eq!(
        ProvisioningState::of(&family, alice.device()),
        ProvisioningState::HasDeviceKey {
            key_id: alice.device_key()
        }
    );
}

#[tokio::test]
async fn test_bad_passphrase_is_rejected_before_provisioning() {
    let harness = Harness::new(FakeUser::with_passphrase_key("alice"));
    let orchestrator = harness.orchestrator(quick_config());

    let result = orchestrator
        .login(&LoginRequest::new("alice", "not it"), None)
        .await;

    let error = result.unwrap_err();
    assert_matches!(error, KeyfamError::Authentication { .. });
    assert!(error.is_fatal());
    assert_eq!(harness.keygen.count(), 0);
    assert_eq!(harness.server.load_count(), 0);
}

#[tokio::test]
async fn test_switching_users_requires_force() {
    let harness = Harness::new(FakeUser::with_passphrase_key("alice"));
    let bob = FakeUser::with_passphrase_key("bob");
    harness.add_user(&bob);
    let orchestrator = harness.orchestrator(quick_config());

    let alice_session = orchestrator.login(&harness.request(), None).await.unwrap();

    let bob_request = LoginRequest::new("bob", bob.passphrase.clone());
    let result = orchestrator.login(&bob_request, Some(&alice_session)).await;
    assert_matches!(result, Err(KeyfamError::AlreadyLoggedIn { username }) if username == "alice");

    let bob_session = orchestrator
        .login(&bob_request.with_force(true), Some(&alice_session))
        .await
        .unwrap();
    assert_eq!(bob_session.username(), "bob");
    assert_eq!(harness.keygen.count(), 2);
}

#[tokio::test]
async fn test_login_logout_switch_users() {
    let harness = Harness::new(FakeUser::with_passphrase_key("alice"));
    let bob = FakeUser::with_synced_pgp("bob");
    harness.add_user(&bob);
    let orchestrator = harness.orchestrator(quick_config());

    let alice = orchestrator.login(&harness.request(), None).await.unwrap();
    alice.logout();

    let bob_session = orchestrator
        .login(&LoginRequest::new("bob", bob.passphrase.clone()), None)
        .await
        .unwrap();
    assert_eq!(bob_session.identity(), bob.identity());
    assert_eq!(bob_session.device().id(), harness.device.id());
}

#[tokio::test]
async fn test_same_user_resumes_without_authenticating() {
    let harness = Harness::new(FakeUser::with_passphrase_key("alice"));
    let orchestrator = harness.orchestrator(quick_config());
    let session = orchestrator.login(&harness.request(), None).await.unwrap();

    // A stale passphrase is fine: the existing session is only re-checked.
    let resumed = orchestrator
        .login(&LoginRequest::new("alice", "stale"), Some(&session))
        .await
        .unwrap();
    assert_ne!(resumed.id(), session.id());
    assert_eq!(resumed.device_key(), session.device_key());

    let forced = orchestrator
        .login(&LoginRequest::new("alice", "stale").with_force(true), Some(&session))
        .await;
    assert_matches!(forced, Err(KeyfamError::Authentication { .. }));
}

#[tokio::test]
async fn test_configured_device_name_skips_prompt() {
    let harness = Harness::new(FakeUser::with_passphrase_key("alice"));
    let config = LoginConfig {
        device_name: Some("work laptop".into()),
        ..quick_config()
    };
    let orchestrator = harness.orchestrator(config);

    let session = orchestrator.login(&harness.request(), None).await.unwrap();

    assert_eq!(session.device().name(), "work laptop");
    assert_eq!(harness.prompter.prompt_count(), 0);
}

#[tokio::test]
async fn test_invalid_config_is_rejected() {
    let harness = Harness::new(FakeUser::with_passphrase_key("alice"));
    let config = LoginConfig {
        kex_timeout_secs: 0,
        ..LoginConfig::default()
    };

    let result = LoginOrchestrator::new(harness.effects(), config, harness.device.id());
    assert_matches!(result, Err(KeyfamError::Config { .. }));
}

#[tokio::test]
async fn test_provisioning_failure_yields_no_session() {
    let harness = Harness::new(FakeUser::with_public_pgp("alice"));
    let config = LoginConfig {
        remote_keyring_fetch: false,
        ..quick_config()
    };
    let orchestrator = harness.orchestrator(config);

    let result = orchestrator.login(&harness.request(), None).await;
    assert_matches!(result, Err(KeyfamError::NoSignerAvailable { .. }));
    assert!(orchestrator.provisioner().registry().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_orchestrators_sharing_a_registry_reject_concurrent_login() {
    let phone = DeviceIdentity::new(DeviceId::new(), "phone").unwrap();
    let user = FakeUser::with_device("alice", &phone);
    let phone_key = user.device_secret(phone.id()).unwrap();
    let harness = Harness::new(user).with_kex(ScriptedKexPeer::new().with_device(phone.id(), phone_key));
    harness
        .kex()
        .set_behavior(PeerBehavior::Delay(Duration::from_secs(2)));

    let registry = InFlightRegistry::new();
    let first = harness.orchestrator(quick_config()).with_registry(registry.clone());
    let second = harness.orchestrator(quick_config()).with_registry(registry.clone());
    let request = harness.request();

    let (first, second) = futures::join!(first.login(&request, None), async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        second.login(&request, None).await
    });

    assert_eq!(first.unwrap().username(), "alice");
    assert_matches!(second, Err(KeyfamError::AlreadyInProgress { .. }));
    assert_eq!(harness.keygen.count(), 1);
    assert_eq!(harness.server.submit_count(), 1);
    assert!(registry.is_empty());
}
