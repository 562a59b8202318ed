mod common;

use tokenlink_adapters::{Eip1193Adapter, SessionAction, SessionStatus, WalletConnectAdapter};
use tokenlink_core::{Phase, PortError, TransportKind, USER_REJECTED};

use common::{funded_wallet, holder, other_holder, resolver, POLYGON};

#[tokio::test]
async fn exhausted_attempts_fail_in_resolve_phase() {
    let remote = WalletConnectAdapter::in_memory();
    let err = resolver(Eip1193Adapter::disabled("no extension"), remote.clone())
        .resolve(None)
        .await
        .expect_err("nothing to resolve");

    assert_eq!(err.phase, Phase::Resolve);
    assert!(err.message.contains("after 3 attempts"), "{err}");
    assert_eq!(remote.connect_attempts(), 3);
}

#[tokio::test]
async fn remote_session_that_becomes_ready_resolves() {
    let remote = WalletConnectAdapter::in_memory();
    remote
        .insert_pending_session("topic-1", funded_wallet(POLYGON), 2)
        .expect("insert session");

    let connection = resolver(Eip1193Adapter::disabled("no extension"), remote.clone())
        .resolve(None)
        .await
        .expect("remote session approved on second check");

    assert_eq!(connection.kind(), TransportKind::RemoteSession);
    assert_eq!(connection.account(), holder());
    assert_eq!(remote.connect_attempts(), 2);
    let sessions = remote.list_sessions().expect("list sessions");
    assert_eq!(sessions[0].status, SessionStatus::Approved);
}

#[tokio::test]
async fn injected_provider_is_preferred() {
    let remote = WalletConnectAdapter::in_memory();
    remote
        .insert_session("topic-1", funded_wallet(POLYGON), SessionStatus::Approved)
        .expect("insert session");

    let connection = resolver(funded_wallet(POLYGON), remote.clone())
        .resolve(None)
        .await
        .expect("resolve");

    assert_eq!(connection.kind(), TransportKind::Injected);
    assert_eq!(remote.connect_attempts(), 0);
}

#[tokio::test]
async fn user_rejection_is_not_retried() {
    let wallet = funded_wallet(POLYGON);
    wallet
        .debug_fail_next(
            "eth_requestAccounts",
            PortError::Rpc {
                code: USER_REJECTED,
                message: "User rejected the request.".to_owned(),
            },
        )
        .expect("script failure");

    let err = resolver(wallet.clone(), WalletConnectAdapter::in_memory())
        .resolve(None)
        .await
        .expect_err("rejected");

    assert_eq!(err.phase, Phase::Resolve);
    assert_eq!(wallet.requests("eth_requestAccounts").len(), 1);
}

#[tokio::test]
async fn transient_failure_is_retried() {
    let wallet = funded_wallet(POLYGON);
    wallet
        .debug_fail_next(
            "eth_requestAccounts",
            PortError::Transport("extension not ready".to_owned()),
        )
        .expect("script failure");

    let connection = resolver(wallet.clone(), WalletConnectAdapter::in_memory())
        .resolve(None)
        .await
        .expect("second attempt succeeds");

    assert_eq!(connection.account(), holder());
    assert_eq!(wallet.requests("eth_requestAccounts").len(), 2);
}

#[tokio::test]
async fn requested_account_must_be_exposed() {
    let wallet = funded_wallet(POLYGON);
    wallet
        .debug_set_accounts(vec![holder(), other_holder()])
        .expect("accounts");

    let r = resolver(wallet, WalletConnectAdapter::in_memory());
    let picked = r.resolve(Some(other_holder())).await.expect("exposed account");
    assert_eq!(picked.account(), other_holder());

    let missing = alloy::primitives::Address::with_last_byte(9);
    assert!(r.resolve(Some(missing)).await.is_err());
}

#[tokio::test]
async fn rejected_and_disconnected_sessions_are_skipped() {
    let remote = WalletConnectAdapter::in_memory();
    remote
        .insert_session("a", funded_wallet(POLYGON), SessionStatus::Approved)
        .expect("insert");
    remote
        .session_action("a", SessionAction::Disconnect)
        .expect("disconnect");
    remote
        .insert_session("b", funded_wallet(POLYGON), SessionStatus::Rejected)
        .expect("insert");

    let err = resolver(Eip1193Adapter::disabled("none"), remote)
        .resolve(None)
        .await
        .expect_err("no approved sessions");
    assert!(err.message.contains("no approved WalletConnect session"), "{err}");
}

#[tokio::test]
async fn missing_requested_account_is_not_retried() {
    let wallet = funded_wallet(POLYGON);
    let missing = alloy::primitives::Address::with_last_byte(9);

    let err = resolver(wallet.clone(), WalletConnectAdapter::in_memory())
        .resolve(Some(missing))
        .await
        .expect_err("account not exposed");

    assert_eq!(err.phase, Phase::Resolve);
    assert!(err.message.contains("not exposed"), "{err}");
    assert_eq!(wallet.requests("eth_requestAccounts").len(), 1);
}

#[tokio::test]
async fn remote_policy_refusal_is_not_retried() {
    let locked = funded_wallet(POLYGON);
    locked.debug_set_accounts(Vec::new()).expect("accounts");
    let remote = WalletConnectAdapter::in_memory();
    remote
        .insert_session("topic-1", locked.clone(), SessionStatus::Approved)
        .expect("insert session");

    let err = resolver(Eip1193Adapter::disabled("no extension"), remote.clone())
        .resolve(None)
        .await
        .expect_err("locked wallet exposes no accounts");

    assert_eq!(err.phase, Phase::Resolve);
    assert_eq!(remote.connect_attempts(), 1);
    assert_eq!(locked.requests("eth_requestAccounts").len(), 1);
}
