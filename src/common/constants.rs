pub const INIT_MSG: &str = "
  ____                         _     _  __                      _
 |  _ \\ _   _ _ __ ___  _ __   | |   (_)/ _| ___  ___ _   _  ___| | ___
 | |_) | | | | '_ ` _ \\| '_ \\  | |   | | |_ / _ \\/ __| | | |/ __| |/ _ \\
 |  __/| |_| | | | | | | |_) | | |___| |  _|  __/ (__| |_| | (__| |  __/
 |_|    \\__,_|_| |_| |_| .__/  |_____|_|_|  \\___|\\___|\\__, |\\___|_|\\___|
                       |_|                            |___/
";

pub const RUN_MSG: &str = "
  >> deploy -> wait -> monitor & dump -> sweep -> wait -> repeat <<
";

/* Cycle timing (seconds) */
pub const DEPLOY_INTERVAL: u64 = 300;
pub const MONITOR_INTERVAL: u64 = 300;
pub const TX_RETRY_BACKOFF: u64 = 5;
pub const RECONNECT_BACKOFF: u64 = 10;
pub const ACK_TIMEOUT: u64 = 120;
pub const HTTP_TIMEOUT: u64 = 10;

/* Policy */
pub const DUMP_THRESHOLD: u64 = 10_000;
pub const WITHDRAWAL_FLOOR_LAMPORTS: u64 = 10_000_000;
pub const WITHDRAWAL_QUANTUM_LAMPORTS: u64 = 10_000_000;
pub const MAX_TX_RETRIES: u32 = 5;
pub const MAX_REDEPLOY_ATTEMPTS: u32 = 3;

/* Quote / swap */
pub const QUOTE_NOTIONAL_AMOUNT: u64 = 1_000_000;
pub const SLIPPAGE_BPS: u16 = 50;

/* Endpoints */
pub const DEFAULT_RPC_HTTPS: &str = "https://api.mainnet-beta.solana.com";
pub const DEFAULT_PUMP_WS_URL: &str = "wss://pumpportal.fun/api/data";
pub const DEFAULT_JUPITER_QUOTE_API: &str = "https://quote-api.jup.ag/v6/quote";
pub const DEFAULT_JUPITER_SWAP_API: &str = "https://quote-api.jup.ag/v6/swap";
pub const DEFAULT_WITHDRAWAL_ADDRESS: &str = "BBvWTfL18ZJYAEH8SyMHMjuACd1XhmKK51hmxGxNCtGa";

pub const DEFAULT_REGISTRY_PATH: &str = "deployed_tokens.json";
pub const DEFAULT_LOG_FILE: &str = "lifecycle_bot.log";

/* Token identity generation */
pub const TOKEN_SUPPLY_MIN: u64 = 1_000_000_000;
pub const TOKEN_SUPPLY_MAX: u64 = 10_000_000_000;

pub const NAME_PREFIXES: &[&str] = &[
    "Moon", "Doge", "Pepe", "Frog", "Shiba", "Pump", "Rug", "Fomo", "Sol", "Musk", "Tesla",
    "Inu", "Coin", "Swap", "Token", "X", "Cash", "AI",
];

pub const NAME_SUFFIXES: &[&str] = &[
    "Inu", "Coin", "Swap", "Token", "X", "Cash", "AI", "Musk", "Tesla", "Moon", "Doge", "Pepe",
    "Frog", "Shiba", "Pump", "Rug", "Fomo", "Sol",
];
