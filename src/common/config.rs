use anyhow::{anyhow, Context, Result};
use clap::Parser;
use dotenv::dotenv;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::{
    commitment_config::CommitmentConfig, pubkey::Pubkey, signature::Keypair, signer::Signer,
};
use spl_token::{amount_to_ui_amount, native_mint};
use std::{env, path::PathBuf, str::FromStr, sync::Arc};

use crate::common::{
    constants::{
        DEFAULT_JUPITER_QUOTE_API, DEFAULT_JUPITER_SWAP_API, DEFAULT_LOG_FILE,
        DEFAULT_PUMP_WS_URL, DEFAULT_REGISTRY_PATH, DEFAULT_RPC_HTTPS,
        DEFAULT_WITHDRAWAL_ADDRESS, INIT_MSG,
    },
    logger::Logger,
};

#[derive(Parser, Debug, Clone)]
#[command(name = "pump-lifecycle-bot", about = "Deploy, monitor, dump and sweep")]
pub struct Cli {
    /// JSON file holding the deployed-token registry
    #[arg(long, env = "REGISTRY_PATH", default_value = DEFAULT_REGISTRY_PATH)]
    pub registry_path: PathBuf,

    /// File receiving the plain-text log
    #[arg(long, env = "LOG_FILE", default_value = DEFAULT_LOG_FILE)]
    pub log_file: PathBuf,
}

pub struct Config {
    pub pump_ws_url: String,
    pub jupiter_quote_api: String,
    pub jupiter_swap_api: String,
    pub withdrawal_address: Pubkey,
    pub registry_path: PathBuf,
    pub app_state: AppState,
}

#[derive(Clone)]
pub struct AppState {
    pub rpc_nonblocking_client: Arc<RpcClient>,
    pub wallet: Arc<Keypair>,
}

impl Config {
    pub async fn new(cli: &Cli) -> Result<Self> {
        println!("{}", INIT_MSG);

        dotenv().ok();

        let logger = Logger::new("[INIT] => ");

        let wallet = import_wallet()?;
        let rpc_https = env_or_default("RPC_HTTPS", DEFAULT_RPC_HTTPS);
        let rpc_nonblocking_client = create_nonblocking_rpc_client(&rpc_https);
        let pump_ws_url = env_or_default("PUMP_WS_URL", DEFAULT_PUMP_WS_URL);
        let jupiter_quote_api = env_or_default("JUPITER_QUOTE_API", DEFAULT_JUPITER_QUOTE_API);
        let jupiter_swap_api = env_or_default("JUPITER_SWAP_API", DEFAULT_JUPITER_SWAP_API);
        let withdrawal_address =
            parse_pubkey(&env_or_default("WITHDRAWAL_ADDRESS", DEFAULT_WITHDRAWAL_ADDRESS))
                .context("WITHDRAWAL_ADDRESS")?;

        let balance = match rpc_nonblocking_client.get_balance(&wallet.pubkey()).await {
            Ok(lamports) => format!(
                "{} Sol",
                amount_to_ui_amount(lamports, native_mint::DECIMALS)
            ),
            Err(e) => format!("unavailable ({})", e),
        };

        logger.log(format!(
            "[BOT ENVIRONMENT]: \n\t * [RPC]: {} \n\t * [Creation Feed]: {} \n\t * [Wallet]: {} * [Balance]: {} \n\t * [Withdrawal]: {} \n\t * [Registry]: {}",
            rpc_https,
            pump_ws_url,
            wallet.pubkey(),
            balance,
            withdrawal_address,
            cli.registry_path.display(),
        ));

        Ok(Config {
            pump_ws_url,
            jupiter_quote_api,
            jupiter_swap_api,
            withdrawal_address,
            registry_path: cli.registry_path.clone(),
            app_state: AppState {
                rpc_nonblocking_client,
                wallet,
            },
        })
    }
}

pub fn import_env_var(key: &str) -> Result<String> {
    env::var(key).map_err(|_| anyhow!("Environment variable {} is not set", key))
}

fn env_or_default(key: &str, default: &str) -> String {
    env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

pub fn create_nonblocking_rpc_client(rpc_https: &str) -> Arc<RpcClient> {
    Arc::new(RpcClient::new_with_commitment(
        rpc_https.to_string(),
        CommitmentConfig::processed(),
    ))
}

pub fn import_wallet() -> Result<Arc<Keypair>> {
    let priv_key = import_env_var("PRIVATE_KEY")?;
    Ok(Arc::new(decode_keypair(priv_key.trim())?))
}

pub fn decode_keypair(base58: &str) -> Result<Keypair> {
    let bytes = bs58::decode(base58)
        .into_vec()
        .map_err(|e| anyhow!("PRIVATE_KEY is not valid base58: {}", e))?;
    Keypair::from_bytes(&bytes).map_err(|e| anyhow!("PRIVATE_KEY is not a keypair: {}", e))
}

pub fn parse_pubkey(address: &str) -> Result<Pubkey> {
    Pubkey::from_str(address.trim()).map_err(|e| anyhow!("invalid address {}: {}", address, e))
}
