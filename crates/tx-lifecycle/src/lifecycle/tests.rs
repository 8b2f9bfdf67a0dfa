use core::time::Duration;

use ibc_proto::cosmos::tx::signing::v1beta1::SignMode;
use ibc_proto::cosmos::tx::v1beta1::mode_info::Sum;
use tokio::time::sleep;

use crate::config::types::Memo;
use crate::journal::TxJournal;
use crate::lifecycle::{SubmissionErrorKind, TxController, TxHandle, TxLifecycleState::*};
use crate::signer::SigningScheme;
use crate::testing::{TestSetup, TEST_CHAIN_ID};

fn setup() -> TestSetup {
    TestSetup::new(SigningScheme::Direct).unwrap()
}

async fn submit(setup: &TestSetup, amounts: &[u64]) -> TxHandle {
    let messages = amounts.iter().map(|amount| setup.send(*amount)).collect();

    setup
        .controller
        .submit(setup.address(), messages, "", vec![])
        .await
}

async fn wait_for_fee_cleared(handle: &TxHandle) {
    while handle.fee().is_some() {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn submit_estimates_fee() {
    let setup = setup();

    let handle = submit(&setup, &[5]).await;

    assert_eq!(handle.state(), Estimating);
    assert_eq!(handle.history(), vec![Initial, Estimating]);
    assert_eq!(handle.error(), None);

    let fee = handle.fee().unwrap();
    assert_eq!(fee.gas_limit, 140_000);
    assert_eq!(fee.amount[0].amount, "700");
    assert_eq!(fee.amount[0].denom, "uatom");

    assert_eq!(setup.simulator.calls(), 1);
    assert_eq!(setup.chain.broadcast_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn happy_path_walks_every_state() {
    let setup = setup();
    setup.indexer.script([Some("success")]);

    let handle = submit(&setup, &[5]).await;
    let hash = handle.sign_and_broadcast().await.unwrap();

    assert_eq!(handle.tx_hash(), Some(hash));

    let lifecycle = handle.wait_terminal().await;

    assert_eq!(lifecycle.state, Finalized);
    assert_eq!(
        lifecycle.history,
        vec![
            Initial,
            Estimating,
            Signing,
            Submitted,
            ConfirmedOnChain,
            ConfirmedByIndexer,
            Finalized
        ]
    );

    let broadcasts = setup.chain.broadcasts();
    assert_eq!(broadcasts.len(), 1);
    assert_eq!(broadcasts[0].hash, hash);
    assert_eq!(broadcasts[0].sequence, 0);
    assert_eq!(broadcasts[0].tx.fee(), handle.fee().as_ref());

    let cached = setup.controller.cached_account(setup.address()).await.unwrap();
    assert_eq!(cached.sequence.to_u64(), 1);
    assert_eq!(cached.number.to_u64(), TestSetup::ACCOUNT_NUMBER);
}

#[tokio::test(start_paused = true)]
async fn finalized_on_sixth_indexer_poll() {
    let setup = setup();

    setup
        .indexer
        .script(std::iter::repeat(Some("pending")).take(5));
    setup.indexer.script([Some("success")]);

    let handle = submit(&setup, &[5]).await;
    handle.sign_and_broadcast().await.unwrap();

    let lifecycle = handle.wait_terminal().await;

    assert_eq!(lifecycle.state, Finalized);
    assert_eq!(setup.indexer.calls(), 6);
    assert_eq!(setup.chain.tx_queries(), 1);

    sleep(Duration::from_secs(10)).await;

    assert_eq!(setup.indexer.calls(), 6);
    assert_eq!(setup.chain.tx_queries(), 1);
}

#[tokio::test(start_paused = true)]
async fn failed_execution_stops_polling() {
    let setup = setup();
    setup
        .chain
        .set_tx_result(11, "out of gas in location: WriteFlat");

    let handle = submit(&setup, &[5]).await;
    handle.sign_and_broadcast().await.unwrap();

    let lifecycle = handle.wait_terminal().await;

    assert_eq!(lifecycle.state, Failed);
    assert_eq!(lifecycle.history.last(), Some(&Failed));
    assert!(!lifecycle.history.contains(&ConfirmedOnChain));

    let error = lifecycle.error.unwrap();
    assert_eq!(error.kind, SubmissionErrorKind::Transaction);
    assert!(error.message.contains("code 11"));
    assert!(error.message.contains("out of gas in location: WriteFlat"));

    sleep(Duration::from_secs(10)).await;

    assert_eq!(setup.chain.tx_queries(), 1);
    assert_eq!(setup.indexer.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn indexer_error_status_fails_submission() {
    let setup = setup();
    setup
        .indexer
        .script([None, Some("processing"), Some("error: invalid metadata")]);

    let handle = submit(&setup, &[5]).await;
    handle.sign_and_broadcast().await.unwrap();

    let lifecycle = handle.wait_terminal().await;

    assert_eq!(lifecycle.state, Failed);
    assert_eq!(
        lifecycle.history[3..],
        [Submitted, ConfirmedOnChain, ConfirmedByIndexer, Failed]
    );

    let error = lifecycle.error.unwrap();
    assert_eq!(error.kind, SubmissionErrorKind::Transaction);
    assert!(error.message.contains("error: invalid metadata"));
    assert_eq!(setup.indexer.calls(), 3);
}

#[tokio::test]
async fn concurrent_submissions_use_distinct_sequences() {
    let setup = setup();

    let first = submit(&setup, &[1]).await;
    let second = submit(&setup, &[2]).await;
    let third = submit(&setup, &[3]).await;

    let (a, b, c) = tokio::join!(
        first.sign_and_broadcast(),
        second.sign_and_broadcast(),
        third.sign_and_broadcast()
    );

    let hashes = [a.unwrap(), b.unwrap(), c.unwrap()];
    assert_ne!(hashes[0], hashes[1]);
    assert_ne!(hashes[1], hashes[2]);

    let mut sequences: Vec<u64> = setup
        .chain
        .broadcasts()
        .iter()
        .map(|b| b.sequence)
        .collect();
    sequences.sort_unstable();

    assert_eq!(sequences, vec![0, 1, 2]);
    assert_eq!(setup.chain.broadcast_calls(), 3);
    assert_eq!(setup.chain.account_queries(), 1);
}

#[tokio::test(start_paused = true)]
async fn signing_requires_a_live_estimate() {
    let setup = setup();
    let handle = submit(&setup, &[5]).await;

    setup.simulator.delay_next([Duration::from_secs(5)]);

    let task = tokio::spawn({
        let handle = handle.clone();
        let messages = vec![setup.send(5), setup.send(6)];
        async move { handle.update_messages(messages).await }
    });

    wait_for_fee_cleared(&handle).await;

    let error = handle.sign_and_broadcast().await.unwrap_err();
    assert_eq!(error.kind, SubmissionErrorKind::Validation);
    assert!(error.message.contains("fee has not been computed"));

    assert_eq!(handle.state(), Estimating);
    assert_eq!(handle.error(), None);

    task.await.unwrap().unwrap();

    assert_eq!(handle.fee().unwrap().gas_limit, 280_000);
    assert!(handle.sign_and_broadcast().await.is_ok());
    assert_eq!(setup.chain.broadcasts()[0].tx.body.messages.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn stale_estimate_is_discarded() {
    let setup = setup();
    let handle = submit(&setup, &[5]).await;

    setup.simulator.delay_next([Duration::from_secs(10)]);

    let slow = tokio::spawn({
        let handle = handle.clone();
        let messages = vec![setup.send(1), setup.send(2), setup.send(3)];
        async move { handle.update_messages(messages).await }
    });

    wait_for_fee_cleared(&handle).await;

    handle
        .update_messages(vec![setup.send(1), setup.send(2)])
        .await
        .unwrap();

    assert_eq!(handle.fee().unwrap().gas_limit, 280_000);

    slow.await.unwrap().unwrap();

    assert_eq!(handle.fee().unwrap().gas_limit, 280_000);
    assert_eq!(handle.request().unwrap().messages.len(), 2);
    assert_eq!(handle.history(), vec![Initial, Estimating]);
}

#[tokio::test]
async fn estimation_failure_is_recorded_and_retried() {
    let setup = setup();
    setup
        .simulator
        .fail_with("out of gas in location: ReadFlat");

    let handle = submit(&setup, &[5]).await;

    assert_eq!(handle.state(), Failed);
    assert_eq!(handle.fee(), None);

    let error = handle.error().unwrap();
    assert_eq!(error.kind, SubmissionErrorKind::Estimation);
    assert!(error.message.contains("out of gas in location: ReadFlat"));

    setup.simulator.recover();
    handle.retry().await.unwrap();

    assert_eq!(handle.state(), Estimating);
    assert_eq!(handle.error(), None);
    assert_eq!(handle.fee().unwrap().gas_limit, 140_000);
    assert_eq!(
        handle.history(),
        vec![Initial, Estimating, Failed, Initial, Estimating]
    );
}

#[tokio::test(start_paused = true)]
async fn retry_after_rejection_reuses_fee() {
    let setup = setup();
    setup.chain.script_check_tx([13]);
    setup.indexer.script([Some("success")]);

    let handle = submit(&setup, &[5]).await;
    let fee = handle.fee().unwrap();

    let error = handle.sign_and_broadcast().await.unwrap_err();
    assert_eq!(error.kind, SubmissionErrorKind::Transaction);
    assert!(error.message.contains("code 13"));
    assert_eq!(handle.state(), Failed);
    assert_eq!(handle.error(), Some(error));

    handle.retry().await.unwrap();

    let lifecycle = handle.wait_terminal().await;

    assert_eq!(lifecycle.state, Finalized);
    assert_eq!(
        lifecycle.history[..6],
        [Initial, Estimating, Signing, Failed, Initial, Estimating]
    );
    assert_eq!(setup.simulator.calls(), 1);
    assert_eq!(handle.fee(), Some(fee.clone()));

    let broadcasts = setup.chain.broadcasts();
    assert_eq!(broadcasts.len(), 1);
    assert_eq!(broadcasts[0].sequence, 0);
    assert_eq!(broadcasts[0].tx.fee(), Some(&fee));
}

#[tokio::test]
async fn unknown_signer_fails_before_network_calls() {
    let setup = setup();

    let handle = setup
        .controller
        .submit("cosmos1nobody", vec![setup.send(5)], "", vec![])
        .await;

    assert_eq!(handle.state(), Failed);

    let error = handle.error().unwrap();
    assert_eq!(error.kind, SubmissionErrorKind::Generic);
    assert!(error.message.contains("cosmos1nobody"));

    assert_eq!(setup.chain.account_queries(), 0);
    assert_eq!(setup.simulator.calls(), 0);
}

#[tokio::test]
async fn incorrect_sequence_refreshes_account() {
    let setup = setup();

    let handle = submit(&setup, &[5]).await;
    assert_eq!(setup.chain.account_queries(), 1);

    // Another client spends sequences behind our back.
    setup
        .chain
        .set_account(setup.address(), TestSetup::ACCOUNT_NUMBER, 5);

    let error = handle.sign_and_broadcast().await.unwrap_err();
    assert_eq!(error.kind, SubmissionErrorKind::Transaction);
    assert!(error.message.contains("code 32"));
    assert_eq!(setup.controller.cached_account(setup.address()).await, None);

    handle.retry().await.unwrap();

    assert_eq!(handle.state(), Submitted);
    assert_eq!(setup.chain.account_queries(), 2);
    assert_eq!(setup.chain.broadcasts()[0].sequence, 5);
}

#[tokio::test]
async fn broadcast_transport_error_drops_cached_account() {
    let setup = setup();
    setup.chain.fail_broadcasts(1);

    let handle = submit(&setup, &[5]).await;

    let error = handle.sign_and_broadcast().await.unwrap_err();
    assert_eq!(error.kind, SubmissionErrorKind::Transaction);
    assert_eq!(setup.controller.cached_account(setup.address()).await, None);

    handle.retry().await.unwrap();
    assert_eq!(handle.state(), Submitted);
}

#[tokio::test(start_paused = true)]
async fn cancel_stops_polling() {
    let setup = setup();
    setup.chain.set_pending_polls(usize::MAX);

    let handle = submit(&setup, &[5]).await;
    handle.sign_and_broadcast().await.unwrap();

    sleep(Duration::from_millis(3_500)).await;
    assert_eq!(setup.chain.tx_queries(), 3);

    handle.cancel();
    handle.cancel();
    assert!(handle.is_cancelled());

    sleep(Duration::from_secs(10)).await;

    assert_eq!(setup.chain.tx_queries(), 3);
    assert_eq!(handle.state(), Submitted);
    assert_eq!(handle.wait_terminal().await.state, Submitted);

    let error = handle.retry().await.unwrap_err();
    assert_eq!(error.kind, SubmissionErrorKind::Generic);
    assert!(error.message.contains("cancelled"));
}

#[tokio::test(start_paused = true)]
async fn dropping_every_handle_stops_polling() {
    let setup = setup();
    setup.chain.set_pending_polls(usize::MAX);

    let handle = submit(&setup, &[5]).await;
    let lifecycle = handle.subscribe();
    handle.sign_and_broadcast().await.unwrap();

    sleep(Duration::from_millis(3_500)).await;
    assert_eq!(setup.chain.tx_queries(), 3);

    // A clone still owns the submission.
    let copy = handle.clone();
    drop(handle);

    sleep(Duration::from_secs(2)).await;
    assert_eq!(setup.chain.tx_queries(), 5);

    drop(copy);

    sleep(Duration::from_secs(30)).await;
    assert_eq!(setup.chain.tx_queries(), 5);
    assert_eq!(lifecycle.borrow().state, Submitted);
}

#[tokio::test(start_paused = true)]
async fn dropping_a_tracked_handle_stops_polling() {
    let setup = setup();
    setup.chain.set_pending_polls(usize::MAX);

    let handle = submit(&setup, &[5]).await;
    let hash = handle.sign_and_broadcast().await.unwrap();
    handle.cancel();

    let tracked = setup.controller.track(setup.address(), hash);

    sleep(Duration::from_millis(2_500)).await;
    let polled = setup.chain.tx_queries();
    assert_eq!(polled, 2);

    drop(tracked);

    sleep(Duration::from_secs(30)).await;
    assert_eq!(setup.chain.tx_queries(), polled);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_retries_broadcast_once() {
    let setup = setup();
    setup.chain.script_check_tx([13]);

    let handle = submit(&setup, &[5]).await;
    handle.sign_and_broadcast().await.unwrap_err();
    assert_eq!(handle.state(), Failed);

    let retries: Vec<_> = (0..4)
        .map(|_| {
            let handle = handle.clone();
            tokio::spawn(async move { handle.retry().await })
        })
        .collect();

    let mut outcomes = Vec::new();
    for retry in retries {
        outcomes.push(retry.await.unwrap());
    }

    assert_eq!(outcomes.iter().filter(|outcome| outcome.is_ok()).count(), 1);

    for error in outcomes.into_iter().filter_map(Result::err) {
        assert_eq!(error.kind, SubmissionErrorKind::Validation);
        assert!(error.message.contains("cannot retry"), "{}", error.message);
    }

    assert_eq!(setup.chain.broadcasts().len(), 1);
    assert_eq!(
        handle.history()[..8],
        [Initial, Estimating, Signing, Failed, Initial, Estimating, Signing, Submitted]
    );
}

#[tokio::test(start_paused = true)]
async fn tracked_hash_cannot_be_retried() {
    let setup = setup();
    setup.chain.set_tx_result(5, "insufficient funds");

    let handle = submit(&setup, &[5]).await;
    let hash = handle.sign_and_broadcast().await.unwrap();
    assert_eq!(handle.wait_terminal().await.state, Failed);

    let tracked = setup.controller.track(setup.address(), hash);
    let lifecycle = tracked.wait_terminal().await;

    assert_eq!(lifecycle.history, vec![Submitted, Failed]);
    assert_eq!(tracked.request(), None);

    let error = tracked.retry().await.unwrap_err();
    assert_eq!(error.kind, SubmissionErrorKind::Generic);
    assert!(error.message.contains("no prepared transaction data"));
    assert_eq!(tracked.state(), Failed);
}

#[tokio::test(start_paused = true)]
async fn transient_poll_failures_are_tolerated() {
    let setup = setup();
    setup.chain.fail_tx_queries(3);
    setup.indexer.script([Some("success")]);

    let handle = submit(&setup, &[5]).await;
    handle.sign_and_broadcast().await.unwrap();

    assert_eq!(handle.wait_terminal().await.state, Finalized);
    assert_eq!(setup.chain.tx_queries(), 4);
}

#[tokio::test(start_paused = true)]
async fn consecutive_poll_failures_fail_submission() {
    let setup = setup();
    setup.chain.fail_tx_queries(100);

    let handle = submit(&setup, &[5]).await;
    handle.sign_and_broadcast().await.unwrap();

    let lifecycle = handle.wait_terminal().await;
    let error = lifecycle.error.unwrap();

    assert_eq!(lifecycle.state, Failed);
    assert_eq!(error.kind, SubmissionErrorKind::Transaction);
    assert!(error.message.contains("5 consecutive failed polls"));
    assert_eq!(setup.chain.tx_queries(), 5);
}

#[tokio::test(start_paused = true)]
async fn poll_timeout_fails_submission() {
    let mut config = TestSetup::config();
    config.poll_timeout = Some(Duration::from_secs(5));

    let setup = TestSetup::with_config(SigningScheme::Direct, config).unwrap();
    setup.chain.set_pending_polls(usize::MAX);

    let handle = submit(&setup, &[5]).await;
    handle.sign_and_broadcast().await.unwrap();

    let lifecycle = handle.wait_terminal().await;
    let error = lifecycle.error.unwrap();

    assert_eq!(lifecycle.state, Failed);
    assert_eq!(error.kind, SubmissionErrorKind::Transaction);
    assert!(error.message.contains("was not confirmed"));
    assert_eq!(setup.chain.tx_queries(), 4);
}

#[tokio::test]
async fn invalid_calls_are_not_recorded() {
    let setup = setup();
    let handle = submit(&setup, &[5]).await;

    let error = handle.retry().await.unwrap_err();
    assert_eq!(error.kind, SubmissionErrorKind::Validation);

    handle.sign_and_broadcast().await.unwrap();

    let error = handle.sign_and_broadcast().await.unwrap_err();
    assert_eq!(error.kind, SubmissionErrorKind::Validation);

    let error = handle.update_messages(vec![setup.send(1)]).await.unwrap_err();
    assert_eq!(error.kind, SubmissionErrorKind::Validation);

    assert_eq!(handle.state(), Submitted);
    assert_eq!(handle.error(), None);
    assert_eq!(setup.chain.broadcast_calls(), 1);
}

#[tokio::test]
async fn memo_defaults_and_limits() {
    let mut config = TestSetup::config();
    config.default_memo = Memo::new("sent with txctl").unwrap();

    let setup = TestSetup::with_config(SigningScheme::Direct, config).unwrap();

    let handle = submit(&setup, &[5]).await;
    handle.sign_and_broadcast().await.unwrap();
    assert_eq!(setup.chain.broadcasts()[0].tx.body.memo, "sent with txctl");

    let long_memo = "m".repeat(257);
    let handle = setup
        .controller
        .submit(setup.address(), vec![setup.send(5)], &long_memo, vec![])
        .await;

    assert_eq!(handle.state(), Failed);
    assert_eq!(handle.error().unwrap().kind, SubmissionErrorKind::Validation);
}

#[tokio::test(start_paused = true)]
async fn amino_submission_end_to_end() {
    let setup = TestSetup::new(SigningScheme::Amino).unwrap();
    setup.indexer.script([Some("success")]);

    assert_eq!(setup.controller.signing_scheme(), SigningScheme::Amino);

    let handle = setup
        .controller
        .submit(setup.address(), vec![setup.send(5)], "a < b", vec![])
        .await;

    handle.sign_and_broadcast().await.unwrap();
    assert_eq!(handle.wait_terminal().await.state, Finalized);

    let tx = &setup.chain.broadcasts()[0].tx;
    assert_eq!(tx.body.memo, "a < b");
    assert_eq!(tx.fee(), handle.fee().as_ref());

    let mode = tx.auth_info.signer_infos[0]
        .mode_info
        .as_ref()
        .and_then(|m| m.sum.as_ref());

    assert!(matches!(mode, Some(Sum::Single(s)) if s.mode == SignMode::LegacyAminoJson as i32));
}

#[tokio::test]
async fn amino_rejects_extension_options() {
    let setup = TestSetup::new(SigningScheme::Amino).unwrap();

    let handle = setup
        .controller
        .submit(
            setup.address(),
            vec![setup.send(5)],
            "",
            vec![setup.send(1)],
        )
        .await;

    let error = handle.sign_and_broadcast().await.unwrap_err();

    assert_eq!(error.kind, SubmissionErrorKind::Validation);
    assert_eq!(handle.state(), Failed);
    assert_eq!(setup.chain.broadcast_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn journal_allows_resuming_pending_transactions() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("journal.json");

    let setup = setup();
    setup.chain.set_pending_polls(usize::MAX);

    let controller = TxController::builder(
        TEST_CHAIN_ID,
        setup.chain.clone(),
        setup.simulator.clone(),
        setup.indexer.clone(),
        setup.signer.clone(),
        TestSetup::config(),
    )
    .journal(TxJournal::open(&path).unwrap())
    .build();

    let handle = controller
        .submit(setup.address(), vec![setup.send(5)], "", vec![])
        .await;
    let hash = handle.sign_and_broadcast().await.unwrap();
    handle.cancel();

    controller.journal().unwrap().flush().await.unwrap();

    let journal = TxJournal::open(&path).unwrap();
    assert_eq!(journal.get(&hash).unwrap().state, Submitted);

    // A new process picks the transaction up again.
    setup.chain.set_pending_polls(0);
    setup.indexer.script([Some("success")]);

    let restarted = TxController::builder(
        TEST_CHAIN_ID,
        setup.chain.clone(),
        setup.simulator.clone(),
        setup.indexer.clone(),
        setup.signer.clone(),
        TestSetup::config(),
    )
    .journal(journal)
    .build();

    let resumed = restarted.resume_pending();
    assert_eq!(resumed.len(), 1);
    assert_eq!(resumed[0].tx_hash(), Some(hash));
    assert_eq!(resumed[0].signer_address(), setup.address());

    assert_eq!(resumed[0].wait_terminal().await.state, Finalized);

    let journal = restarted.journal().unwrap();
    assert_eq!(journal.get(&hash).unwrap().state, Finalized);
    journal.flush().await.unwrap();

    // Finished transactions are not carried over to the next run.
    let journal = TxJournal::open(&path).unwrap();
    assert!(journal.entries().is_empty());
    assert!(journal.pending().is_empty());
}
