use std::sync::Arc;

use solana_sdk::{pubkey::Pubkey, signature::Keypair, signature::Signature, signer::Signer};
use spl_token::{amount_to_ui_amount, native_mint};
use tokio_util::sync::CancellationToken;

use crate::common::{
    constants::{WITHDRAWAL_FLOOR_LAMPORTS, WITHDRAWAL_QUANTUM_LAMPORTS},
    logger::Logger,
};
use crate::core::{
    retry::RetryPolicy,
    tx::{signed_transfer, Ledger},
};

/// Drips a fixed quantum from the wallet to the withdrawal address whenever
/// the balance sits strictly above the floor. At most one transfer per sweep.
pub struct Treasury {
    ledger: Arc<dyn Ledger>,
    wallet: Arc<Keypair>,
    destination: Pubkey,
    floor: u64,
    quantum: u64,
    retry: RetryPolicy,
    logger: Logger,
}

impl Treasury {
    pub fn new(ledger: Arc<dyn Ledger>, wallet: Arc<Keypair>, destination: Pubkey) -> Self {
        Treasury {
            ledger,
            wallet,
            destination,
            floor: WITHDRAWAL_FLOOR_LAMPORTS,
            quantum: WITHDRAWAL_QUANTUM_LAMPORTS,
            retry: RetryPolicy::default(),
            logger: Logger::new("[TREASURY] => "),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub async fn sweep(&self, cancel: &CancellationToken) -> Option<Signature> {
        self.logger
            .log("Checking for available funds to withdraw.".to_string());

        let balance = match self.ledger.balance(&self.wallet.pubkey()).await {
            Ok(lamports) => lamports,
            Err(e) => {
                self.logger
                    .error(format!("Failed to withdraw profits: balance query: {}", e));
                return None;
            }
        };
        if balance <= self.floor {
            self.logger.log(format!(
                "Not enough funds available to withdraw ({} Sol).",
                sol(balance)
            ));
            return None;
        }

        let blockhash = match self.ledger.latest_blockhash().await {
            Ok(hash) => hash,
            Err(e) => {
                self.logger
                    .error(format!("Failed to withdraw profits: blockhash: {}", e));
                return None;
            }
        };
        let txn = signed_transfer(&self.wallet, &self.destination, self.quantum, blockhash);

        let sig = self
            .retry
            .run("WITHDRAW", cancel, &self.logger, || self.ledger.submit(&txn))
            .await?;
        self.logger.success(format!(
            "Profit withdrawn: {} Sol to {}, Tx: {}",
            sol(self.quantum),
            self.destination,
            sig
        ));
        Some(sig)
    }
}

fn sol(lamports: u64) -> f64 {
    amount_to_ui_amount(lamports, native_mint::DECIMALS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use solana_sdk::{
        hash::Hash, system_instruction::SystemInstruction, transaction::VersionedTransaction,
    };
    use std::sync::{
        atomic::{AtomicU32, Ordering},
        Mutex,
    };
    use std::time::Duration;

    struct StubLedger {
        balance: Result<u64, &'static str>,
        failures_before_success: u32,
        attempts: AtomicU32,
        submitted: Mutex<Vec<VersionedTransaction>>,
    }

    impl StubLedger {
        fn with_balance(balance: u64) -> Self {
            StubLedger {
                balance: Ok(balance),
                failures_before_success: 0,
                attempts: AtomicU32::new(0),
                submitted: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Ledger for StubLedger {
        async fn balance(&self, _owner: &Pubkey) -> Result<u64> {
            self.balance.map_err(|e| anyhow!(e))
        }

        async fn latest_blockhash(&self) -> Result<Hash> {
            Ok(Hash::new_unique())
        }

        async fn submit(&self, txn: &VersionedTransaction) -> Result<Signature> {
            let n = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
            self.submitted.lock().unwrap().push(txn.clone());
            if n <= self.failures_before_success {
                return Err(anyhow!("blockhash not found"));
            }
            Ok(txn.signatures[0])
        }
    }

    fn treasury(ledger: Arc<StubLedger>, destination: Pubkey) -> Treasury {
        Treasury::new(ledger, Arc::new(Keypair::new()), destination)
    }

    fn transferred_lamports(txn: &VersionedTransaction) -> u64 {
        let ix = &txn.message.instructions()[0];
        match bincode::deserialize::<SystemInstruction>(&ix.data).unwrap() {
            SystemInstruction::Transfer { lamports } => lamports,
            other => panic!("unexpected instruction {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn balance_above_floor_withdraws_one_quantum() {
        let ledger = Arc::new(StubLedger::with_balance(10_000_001));
        let destination = Pubkey::new_unique();
        let sig = treasury(ledger.clone(), destination)
            .sweep(&CancellationToken::new())
            .await;

        assert!(sig.is_some());
        let submitted = ledger.submitted.lock().unwrap();
        assert_eq!(submitted.len(), 1);
        assert_eq!(transferred_lamports(&submitted[0]), 10_000_000);
        assert!(submitted[0].message.static_account_keys().contains(&destination));
    }

    #[tokio::test(start_paused = true)]
    async fn balance_at_floor_does_nothing() {
        let ledger = Arc::new(StubLedger::with_balance(10_000_000));
        let sig = treasury(ledger.clone(), Pubkey::new_unique())
            .sweep(&CancellationToken::new())
            .await;

        assert!(sig.is_none());
        assert!(ledger.submitted.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn large_balance_still_moves_only_one_quantum() {
        let ledger = Arc::new(StubLedger::with_balance(5_000_000_000));
        treasury(ledger.clone(), Pubkey::new_unique())
            .sweep(&CancellationToken::new())
            .await;

        let submitted = ledger.submitted.lock().unwrap();
        assert_eq!(submitted.len(), 1);
        assert_eq!(transferred_lamports(&submitted[0]), WITHDRAWAL_QUANTUM_LAMPORTS);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_resubmit_identical_signed_bytes() {
        let ledger = Arc::new(StubLedger {
            failures_before_success: 2,
            ..StubLedger::with_balance(20_000_000)
        });
        let start = tokio::time::Instant::now();
        let sig = treasury(ledger.clone(), Pubkey::new_unique())
            .sweep(&CancellationToken::new())
            .await;

        assert!(sig.is_some());
        let submitted = ledger.submitted.lock().unwrap();
        assert_eq!(submitted.len(), 3);
        assert!(submitted.iter().all(|t| t.signatures == submitted[0].signatures));
        assert_eq!(start.elapsed(), Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_yield_no_signature() {
        let ledger = Arc::new(StubLedger {
            failures_before_success: u32::MAX,
            ..StubLedger::with_balance(20_000_000)
        });
        let sig = treasury(ledger.clone(), Pubkey::new_unique())
            .with_retry(RetryPolicy::new(5, Duration::from_secs(5)))
            .sweep(&CancellationToken::new())
            .await;

        assert!(sig.is_none());
        assert_eq!(ledger.attempts.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn balance_error_is_absorbed() {
        let ledger = Arc::new(StubLedger {
            balance: Err("connection refused"),
            ..StubLedger::with_balance(0)
        });
        let sig = treasury(ledger.clone(), Pubkey::new_unique())
            .sweep(&CancellationToken::new())
            .await;
        assert!(sig.is_none());
        assert!(ledger.submitted.lock().unwrap().is_empty());
    }
}
