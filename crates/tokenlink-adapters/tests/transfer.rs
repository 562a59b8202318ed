mod common;

use std::time::Duration;

use alloy::primitives::{Bytes, U256};
use alloy::sol_types::SolCall;
use tokenlink_core::{
    BalanceSynchronizer, NetworkDescriptor, Phase, PortError, TokenDescriptor, TransferRequest,
    TransferSubmitter, IERC20, USER_REJECTED,
};

use common::{funded_wallet, recipient, usdt, verified, POLYGON};

fn submitter(timeout: Duration) -> TransferSubmitter {
    TransferSubmitter::new(
        TokenDescriptor::polygon_usdt(),
        Duration::from_millis(5),
        timeout,
    )
}

fn request(to: &str, amount: &str) -> TransferRequest {
    TransferRequest {
        recipient: to.to_owned(),
        amount: amount.to_owned(),
    }
}

#[tokio::test]
async fn transfer_encodes_token_units_and_waits_for_receipt() {
    let wallet = funded_wallet(POLYGON);
    wallet
        .debug_set_token_balance(POLYGON, usdt(), common::holder(), U256::from(5_000_000u64))
        .expect("token balance");
    wallet.debug_set_receipt_delay(2).expect("receipt delay");
    let conn = verified(&wallet).await;

    let receipt = submitter(Duration::from_secs(2))
        .submit(&conn, &request(&recipient().to_string(), "2.5"))
        .await
        .expect("transfer confirmed");

    assert_eq!(receipt.recipient, recipient());
    assert_eq!(receipt.amount_raw, U256::from(2_500_000u64));
    assert_eq!(receipt.amount, "2.5");
    assert!(receipt.block_number.is_some());
    assert_eq!(wallet.requests("eth_getTransactionReceipt").len(), 3);

    let sent = wallet.requests("eth_sendTransaction");
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0][0]["to"], usdt().to_string());
    assert_eq!(sent[0][0]["from"], common::holder().to_string());
    let data: Bytes = sent[0][0]["data"]
        .as_str()
        .expect("data field")
        .parse()
        .expect("hex data");
    let call = IERC20::transferCall::abi_decode(&data, true).expect("transfer calldata");
    assert_eq!(call.to, recipient());
    assert_eq!(call.amount, U256::from(2_500_000u64));

    let after = BalanceSynchronizer::new(NetworkDescriptor::polygon(), TokenDescriptor::polygon_usdt())
        .sync(&conn)
        .await
        .expect("resync");
    assert_eq!(after.token_amount, "2.5");
}

#[tokio::test]
async fn reverted_transfer_is_an_error() {
    let wallet = funded_wallet(POLYGON);
    let conn = verified(&wallet).await;

    let err = submitter(Duration::from_secs(2))
        .submit(&conn, &request(&recipient().to_string(), "2.5"))
        .await
        .expect_err("insufficient balance reverts");

    assert_eq!(err.phase, Phase::SubmitTransfer);
    assert!(err.message.contains("reverted"), "{err}");
}

#[tokio::test]
async fn invalid_input_never_reaches_the_wallet() {
    let wallet = funded_wallet(POLYGON);
    let conn = verified(&wallet).await;
    let s = submitter(Duration::from_secs(2));

    let bad_recipient = s
        .submit(&conn, &request("0x1234", "1"))
        .await
        .expect_err("short address");
    assert_eq!(bad_recipient.phase, Phase::SubmitTransfer);

    let bad_amount = s
        .submit(&conn, &request(&recipient().to_string(), "-1"))
        .await
        .expect_err("negative amount");
    assert_eq!(bad_amount.phase, Phase::SubmitTransfer);

    assert!(wallet.requests("eth_sendTransaction").is_empty());
}

#[tokio::test]
async fn rejected_signature_is_reported() {
    let wallet = funded_wallet(POLYGON);
    let conn = verified(&wallet).await;
    wallet
        .debug_fail_next(
            "eth_sendTransaction",
            PortError::Rpc {
                code: USER_REJECTED,
                message: "User denied transaction signature.".to_owned(),
            },
        )
        .expect("script failure");

    let err = submitter(Duration::from_secs(2))
        .submit(&conn, &request(&recipient().to_string(), "1"))
        .await
        .expect_err("rejected");
    assert!(err.message.contains("User denied"), "{err}");
}

#[tokio::test]
async fn unconfirmed_transfer_times_out() {
    let wallet = funded_wallet(POLYGON);
    wallet.debug_set_receipt_delay(u32::MAX).expect("receipt delay");
    let conn = verified(&wallet).await;

    let err = submitter(Duration::from_millis(50))
        .submit(&conn, &request(&recipient().to_string(), "1"))
        .await
        .expect_err("no receipt");

    assert_eq!(err.phase, Phase::SubmitTransfer);
    assert!(err.message.contains("not confirmed"), "{err}");
}
