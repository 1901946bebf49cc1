use anyhow::Result;
use async_trait::async_trait;
use solana_client::{nonblocking::rpc_client::RpcClient, rpc_config::RpcSendTransactionConfig};
use solana_sdk::{
    hash::Hash,
    pubkey::Pubkey,
    signature::{Keypair, Signature},
    system_transaction,
    transaction::VersionedTransaction,
};

/// The blockchain RPC surface the bot needs.
#[async_trait]
pub trait Ledger: Send + Sync {
    async fn balance(&self, owner: &Pubkey) -> Result<u64>;

    async fn latest_blockhash(&self) -> Result<Hash>;

    /// Submits an already signed transaction without preflight simulation.
    async fn submit(&self, txn: &VersionedTransaction) -> Result<Signature>;
}

#[async_trait]
impl Ledger for RpcClient {
    async fn balance(&self, owner: &Pubkey) -> Result<u64> {
        Ok(self.get_balance(owner).await?)
    }

    async fn latest_blockhash(&self) -> Result<Hash> {
        Ok(self.get_latest_blockhash().await?)
    }

    async fn submit(&self, txn: &VersionedTransaction) -> Result<Signature> {
        let sig = self
            .send_transaction_with_config(
                txn,
                RpcSendTransactionConfig {
                    skip_preflight: true,
                    ..RpcSendTransactionConfig::default()
                },
            )
            .await?;
        Ok(sig)
    }
}

/// Single system transfer from `keypair` to `to`, signed once.
pub fn signed_transfer(
    keypair: &Keypair,
    to: &Pubkey,
    lamports: u64,
    recent_blockhash: Hash,
) -> VersionedTransaction {
    VersionedTransaction::from(system_transaction::transfer(
        keypair,
        to,
        lamports,
        recent_blockhash,
    ))
}
