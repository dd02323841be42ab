//! Transaction executor.
//!
//! Submits ledger-mutating calls with a nonce fetched from the pending view
//! immediately before each attempt, waits for the receipt, and retries on
//! sequencing conflicts up to a fixed budget. Submissions are serialized so
//! two calls never race for the same nonce.

use ethers::types::U256;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{ExecError, LedgerError, LedgerErrorKind};
use crate::ledger::{LedgerCall, LedgerClient, LedgerTx};
use crate::types::{PendingTransaction, TxReceipt, TxState};

pub const DEFAULT_MAX_RETRIES: u32 = 3;

pub struct TransactionExecutor {
    ledger: Arc<dyn LedgerClient>,
    max_retries: u32,
    /// Treat a reverted call like a nonce conflict and resubmit it.
    retry_on_revert: bool,
    submit_lock: Mutex<()>,
}

impl TransactionExecutor {
    pub fn new(ledger: Arc<dyn LedgerClient>, max_retries: u32, retry_on_revert: bool) -> Self {
        Self {
            ledger,
            max_retries: max_retries.max(1),
            retry_on_revert,
            submit_lock: Mutex::new(()),
        }
    }

    pub fn ledger(&self) -> &Arc<dyn LedgerClient> {
        &self.ledger
    }

    /// Submit the call produced by `build` and wait for a successful receipt.
    ///
    /// `build` receives the nonce for the current attempt, so the caller
    /// never holds a stale one.
    pub async fn submit<F>(&self, label: &str, build: F) -> Result<TxReceipt, ExecError>
    where
        F: Fn(U256) -> LedgerCall + Send + Sync,
    {
        let _guard = self.submit_lock.lock().await;
        let owner = self.ledger.wallet_address();
        let mut last_error: Option<LedgerError> = None;

        for attempt in 1..=self.max_retries {
            let result = self.attempt(label, owner, attempt, &build).await;
            let err = match result {
                Ok(receipt) => return Ok(receipt),
                Err(err) => err,
            };

            if !self.is_retryable(&err) {
                warn!(label, attempt, error = %err, "Transaction failed, not retrying");
                return Err(ExecError::Fatal(err));
            }

            if attempt < self.max_retries {
                warn!(
                    label,
                    attempt,
                    max = self.max_retries,
                    error = %err,
                    "Sequencing conflict, retrying with a fresh nonce"
                );
            }
            last_error = Some(err);
        }

        let last = last_error
            .unwrap_or_else(|| LedgerError::other("retry budget exhausted without an attempt"));
        warn!(label, attempts = self.max_retries, error = %last, "Retry budget exhausted");
        Err(ExecError::RetryExhausted {
            attempts: self.max_retries,
            last,
        })
    }

    async fn attempt<F>(
        &self,
        label: &str,
        owner: ethers::types::Address,
        attempt: u32,
        build: &F,
    ) -> Result<TxReceipt, LedgerError>
    where
        F: Fn(U256) -> LedgerCall + Send + Sync,
    {
        let nonce = self.ledger.next_nonce(owner).await?;
        let mut pending = PendingTransaction::new(label, nonce, attempt);
        let tx = LedgerTx {
            nonce,
            call: build(nonce),
        };

        let hash = match self.ledger.submit(tx).await {
            Ok(hash) => hash,
            Err(e) => {
                pending.settle(TxState::Failed);
                return Err(e);
            }
        };
        pending.submitted(hash);
        debug!(label, attempt, nonce = %nonce, hash = ?hash, "Submitted, awaiting receipt");

        let receipt = match self.ledger.await_receipt(hash).await {
            Ok(receipt) => receipt,
            Err(e) => {
                pending.settle(TxState::Failed);
                return Err(e);
            }
        };

        if !receipt.succeeded() {
            pending.settle(TxState::Reverted);
            return Err(LedgerError::reverted(format!(
                "transaction {hash:?} reverted in block {:?}",
                receipt.block_number
            )));
        }

        pending.settle(TxState::Confirmed);
        info!(label, attempt, nonce = %nonce, hash = ?hash, "Transaction confirmed");
        Ok(receipt)
    }

    fn is_retryable(&self, err: &LedgerError) -> bool {
        match err.kind {
            LedgerErrorKind::Conflict => true,
            LedgerErrorKind::Reverted => self.retry_on_revert,
            LedgerErrorKind::Transport | LedgerErrorKind::Other => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::MockLedgerClient;
    use crate::types::TxStatus;
    use ethers::types::{Address, TxHash};
    use mockall::Sequence;
    use std::sync::Mutex as StdMutex;

    fn approve_call(_nonce: U256) -> LedgerCall {
        LedgerCall::Approve {
            token: Address::repeat_byte(2),
            spender: Address::repeat_byte(3),
            amount: U256::MAX,
        }
    }

    fn receipt(status: TxStatus) -> TxReceipt {
        TxReceipt {
            hash: TxHash::repeat_byte(9),
            status,
            block_number: Some(100),
        }
    }

    fn base_mock() -> MockLedgerClient {
        let mut mock = MockLedgerClient::new();
        mock.expect_wallet_address()
            .return_const(Address::repeat_byte(1));
        let counter = StdMutex::new(10u64);
        mock.expect_next_nonce().returning(move |_| {
            let mut n = counter.lock().unwrap();
            *n += 1;
            Ok(U256::from(*n))
        });
        mock
    }

    #[tokio::test]
    async fn test_retries_conflicts_then_succeeds_with_fresh_nonces() {
        let mut mock = base_mock();
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let seen_in = seen.clone();
        let mut seq = Sequence::new();
        for _ in 0..2 {
            mock.expect_submit()
                .times(1)
                .in_sequence(&mut seq)
                .returning({
                    let seen = seen_in.clone();
                    move |tx| {
                        seen.lock().unwrap().push(tx.nonce);
                        Err(LedgerError::conflict("nonce too low"))
                    }
                });
        }
        mock.expect_submit()
            .times(1)
            .in_sequence(&mut seq)
            .returning(move |tx| {
                seen_in.lock().unwrap().push(tx.nonce);
                Ok(TxHash::repeat_byte(9))
            });
        mock.expect_await_receipt()
            .times(1)
            .returning(|_| Ok(receipt(TxStatus::Success)));

        let exec = TransactionExecutor::new(Arc::new(mock), 3, true);
        let result = exec.submit("approve", approve_call).await.unwrap();
        assert!(result.succeeded());

        let nonces = seen.lock().unwrap().clone();
        assert_eq!(nonces.len(), 3);
        assert_ne!(nonces[0], nonces[1]);
        assert_ne!(nonces[1], nonces[2]);
    }

    #[tokio::test]
    async fn test_always_conflicting_exhausts_budget() {
        let mut mock = base_mock();
        mock.expect_submit()
            .times(3)
            .returning(|_| Err(LedgerError::conflict("nonce has already been used")));
        mock.expect_await_receipt().never();

        let exec = TransactionExecutor::new(Arc::new(mock), 3, true);
        let err = exec.submit("swap", approve_call).await.unwrap_err();
        match err {
            ExecError::RetryExhausted { attempts, last } => {
                assert_eq!(attempts, 3);
                assert_eq!(last.kind, LedgerErrorKind::Conflict);
            }
            other => panic!("expected RetryExhausted, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_non_conflict_error_is_not_retried() {
        let mut mock = base_mock();
        mock.expect_submit()
            .times(1)
            .returning(|_| Err(LedgerError::transport("connection refused")));

        let exec = TransactionExecutor::new(Arc::new(mock), 3, true);
        let err = exec.submit("swap", approve_call).await.unwrap_err();
        assert!(matches!(err, ExecError::Fatal(ref e) if e.kind == LedgerErrorKind::Transport));
    }

    #[tokio::test]
    async fn test_reverted_receipt_retried_when_enabled() {
        let mut mock = base_mock();
        mock.expect_submit()
            .times(2)
            .returning(|_| Ok(TxHash::repeat_byte(9)));
        let mut seq = Sequence::new();
        mock.expect_await_receipt()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(receipt(TxStatus::Reverted)));
        mock.expect_await_receipt()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(receipt(TxStatus::Success)));

        let exec = TransactionExecutor::new(Arc::new(mock), 3, true);
        assert!(exec.submit("swap", approve_call).await.is_ok());
    }

    #[tokio::test]
    async fn test_reverted_receipt_fatal_when_disabled() {
        let mut mock = base_mock();
        mock.expect_submit()
            .times(1)
            .returning(|_| Ok(TxHash::repeat_byte(9)));
        mock.expect_await_receipt()
            .times(1)
            .returning(|_| Ok(receipt(TxStatus::Reverted)));

        let exec = TransactionExecutor::new(Arc::new(mock), 3, false);
        let err = exec.submit("swap", approve_call).await.unwrap_err();
        assert!(matches!(err, ExecError::Fatal(ref e) if e.kind == LedgerErrorKind::Reverted));
    }

    #[tokio::test]
    async fn test_nonce_read_failure_is_fatal() {
        let mut mock = MockLedgerClient::new();
        mock.expect_wallet_address()
            .return_const(Address::repeat_byte(1));
        mock.expect_next_nonce()
            .times(1)
            .returning(|_| Err(LedgerError::transport("timeout")));
        mock.expect_submit().never();

        let exec = TransactionExecutor::new(Arc::new(mock), 3, true);
        assert!(matches!(
            exec.submit("swap", approve_call).await,
            Err(ExecError::Fatal(_))
        ));
    }
}
