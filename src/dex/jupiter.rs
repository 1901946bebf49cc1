use std::{sync::Arc, time::Duration};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use solana_sdk::{signature::Keypair, signer::Signer, transaction::VersionedTransaction};

use crate::{
    common::{
        constants::{HTTP_TIMEOUT, QUOTE_NOTIONAL_AMOUNT, SLIPPAGE_BPS},
        logger::Logger,
    },
    core::tx::Ledger,
};

/// Current tradable volume for a mint, in the quote asset's smallest unit.
#[async_trait]
pub trait VolumeOracle: Send + Sync {
    async fn fetch_volume(&self, mint: &str) -> Result<u64>;

    /// Never fails: any query error is logged and reported as zero volume.
    async fn trading_volume(&self, mint: &str) -> u64 {
        match self.fetch_volume(mint).await {
            Ok(volume) => volume,
            Err(e) => {
                Logger::new("[VOLUME] => ")
                    .error(format!("Error retrieving volume for {}: {}", mint, e));
                0
            }
        }
    }
}

/// Sells a fixed clip of a token into the native asset.
#[async_trait]
pub trait DisposalExecutor: Send + Sync {
    async fn dispose(&self, mint: &str) -> Result<String>;
}

#[derive(Clone)]
pub struct Jupiter {
    client: Client,
    quote_api: String,
    swap_api: String,
    output_mint: String,
    wallet: Arc<Keypair>,
    ledger: Arc<dyn Ledger>,
}

impl Jupiter {
    pub fn new(
        quote_api: impl Into<String>,
        swap_api: impl Into<String>,
        wallet: Arc<Keypair>,
        ledger: Arc<dyn Ledger>,
    ) -> Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(30))
            .timeout(Duration::from_secs(HTTP_TIMEOUT))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Jupiter {
            client,
            quote_api: quote_api.into(),
            swap_api: swap_api.into(),
            output_mint: spl_token::native_mint::ID.to_string(),
            wallet,
            ledger,
        })
    }

    async fn quote(&self, input_mint: &str) -> Result<Value> {
        let amount = QUOTE_NOTIONAL_AMOUNT.to_string();
        let slippage = SLIPPAGE_BPS.to_string();
        let response = self
            .client
            .get(&self.quote_api)
            .query(&[
                ("inputMint", input_mint),
                ("outputMint", self.output_mint.as_str()),
                ("amount", amount.as_str()),
                ("slippageBps", slippage.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json::<Value>().await?)
    }

    async fn swap_transaction(&self, quote: Value) -> Result<VersionedTransaction> {
        let request_body = json!({
            "quoteResponse": quote,
            "userPublicKey": self.wallet.pubkey().to_string(),
            "wrapAndUnwrapSol": true,
        });
        let response: Value = self
            .client
            .post(&self.swap_api)
            .json(&request_body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        let encoded = response["swapTransaction"]
            .as_str()
            .ok_or_else(|| anyhow!("swap response has no swapTransaction"))?;
        let bytes = base64::decode(encoded).context("swapTransaction is not base64")?;
        let unsigned: VersionedTransaction =
            bincode::deserialize(&bytes).context("swapTransaction is not a transaction")?;
        let signed = VersionedTransaction::try_new(unsigned.message, &[self.wallet.as_ref()])?;
        Ok(signed)
    }
}

#[async_trait]
impl VolumeOracle for Jupiter {
    async fn fetch_volume(&self, mint: &str) -> Result<u64> {
        let quote = self.quote(mint).await?;
        parse_out_amount(&quote)
    }
}

#[async_trait]
impl DisposalExecutor for Jupiter {
    async fn dispose(&self, mint: &str) -> Result<String> {
        let quote = self.quote(mint).await?;
        let txn = self.swap_transaction(quote).await?;
        let sig = self.ledger.submit(&txn).await?;
        Ok(sig.to_string())
    }
}

/// Reads `outAmount`, which newer APIs send as a decimal string and older
/// ones as a number.
pub fn parse_out_amount(quote: &Value) -> Result<u64> {
    match &quote["outAmount"] {
        Value::String(raw) => raw
            .parse::<u64>()
            .map_err(|e| anyhow!("outAmount {:?} is not an integer: {}", raw, e)),
        Value::Number(n) => n
            .as_u64()
            .ok_or_else(|| anyhow!("outAmount {} is not an unsigned integer", n)),
        Value::Null => Err(anyhow!("quote has no outAmount")),
        other => Err(anyhow!("unexpected outAmount {}", other)),
    }
}
