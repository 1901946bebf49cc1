use std::{fmt, sync::Arc, time::Duration};

use anyhow::Result;
use solana_sdk::signer::Signer;
use tokio_util::sync::CancellationToken;

use tokio::time::{sleep_until, Instant};

use crate::common::{
    config::Config,
    constants::{DEPLOY_INTERVAL, DUMP_THRESHOLD, MONITOR_INTERVAL},
    logger::Logger,
};
use crate::core::tx::Ledger;
use crate::dex::jupiter::{DisposalExecutor, Jupiter, VolumeOracle};
use crate::engine::{
    deployer::{Deployer, DeployerHandle, DeploymentEvent, PumpPortalConnector},
    monitor::monitor_and_dispose,
    registry::{JsonFileStore, TokenRegistry},
    treasury::Treasury,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Deploying,
    WaitingDeploy,
    Monitoring,
    Sweeping,
    WaitingMonitor,
}

impl fmt::Display for CycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CycleState::Deploying => "DEPLOYING",
            CycleState::WaitingDeploy => "WAITING-DEPLOY",
            CycleState::Monitoring => "MONITORING",
            CycleState::Sweeping => "SWEEPING",
            CycleState::WaitingMonitor => "WAITING-MONITOR",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleTiming {
    pub deploy_interval: Duration,
    pub monitor_interval: Duration,
    pub dump_threshold: u64,
}

impl Default for CycleTiming {
    fn default() -> Self {
        CycleTiming {
            deploy_interval: Duration::from_secs(DEPLOY_INTERVAL),
            monitor_interval: Duration::from_secs(MONITOR_INTERVAL),
            dump_threshold: DUMP_THRESHOLD,
        }
    }
}

/// Drives deploy -> wait -> monitor & dump -> sweep -> wait, forever or
/// until cancelled.
///
/// Deployment outcomes arrive on the deployer's event channel. They are
/// applied to the registry as they arrive during either wait and again at the
/// start of each Monitoring step, which makes the orchestrator the registry's
/// only owner.
pub struct Orchestrator {
    state: CycleState,
    timing: CycleTiming,
    registry: TokenRegistry,
    deployer: DeployerHandle,
    oracle: Arc<dyn VolumeOracle>,
    executor: Arc<dyn DisposalExecutor>,
    treasury: Treasury,
    cancel: CancellationToken,
    logger: Logger,
}

impl Orchestrator {
    pub fn new(
        registry: TokenRegistry,
        deployer: DeployerHandle,
        oracle: Arc<dyn VolumeOracle>,
        executor: Arc<dyn DisposalExecutor>,
        treasury: Treasury,
        cancel: CancellationToken,
    ) -> Self {
        Orchestrator {
            state: CycleState::Deploying,
            timing: CycleTiming::default(),
            registry,
            deployer,
            oracle,
            executor,
            treasury,
            cancel,
            logger: Logger::new("[LIFECYCLE] => "),
        }
    }

    pub fn with_timing(mut self, timing: CycleTiming) -> Self {
        self.timing = timing;
        self
    }

    pub fn state(&self) -> CycleState {
        self.state
    }

    pub fn registry(&self) -> &TokenRegistry {
        &self.registry
    }

    pub async fn run(mut self) {
        self.logger.log(format!(
            "[STARTED] {} token(s) restored from registry",
            self.registry.len()
        ));
        while self.step().await {}
        self.logger.log("[STOPPED] cancellation received".to_string());
    }

    /// Performs the current state's action and moves to the next state.
    /// Returns `false` once cancelled.
    pub async fn step(&mut self) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        let next = match self.state {
            CycleState::Deploying => {
                if !self.deployer.request_deployment() {
                    self.logger
                        .error("Deployer is not running, skipping deployment".to_string());
                }
                CycleState::WaitingDeploy
            }
            CycleState::WaitingDeploy => {
                if !self.wait(self.timing.deploy_interval).await {
                    return false;
                }
                CycleState::Monitoring
            }
            CycleState::Monitoring => {
                self.apply_deployment_events();
                let report = tokio::select! {
                    _ = self.cancel.cancelled() => return false,
                    report = monitor_and_dispose(
                        &mut self.registry,
                        self.oracle.as_ref(),
                        self.executor.as_ref(),
                        self.timing.dump_threshold,
                    ) => report,
                };
                self.logger.log(format!(
                    "Pass complete: {} checked, {} disposed ({} sale failures)",
                    report.checked, report.disposed, report.disposal_failures
                ));
                CycleState::Sweeping
            }
            CycleState::Sweeping => {
                self.treasury.sweep(&self.cancel).await;
                CycleState::WaitingMonitor
            }
            CycleState::WaitingMonitor => {
                if !self.wait(self.timing.monitor_interval).await {
                    return false;
                }
                CycleState::Deploying
            }
        };
        self.logger.log(format!("[{}] -> [{}]", self.state, next));
        self.state = next;
        !self.cancel.is_cancelled()
    }

    /// Sleeps for `duration`, registering deployment outcomes as they
    /// arrive. Returns `false` if cancelled first.
    async fn wait(&mut self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        let mut deployer_alive = true;
        loop {
            let event = tokio::select! {
                _ = self.cancel.cancelled() => return false,
                _ = sleep_until(deadline) => return true,
                event = self.deployer.next_event(), if deployer_alive => event,
            };
            match event {
                Some(event) => self.apply_deployment_event(event),
                None => deployer_alive = false,
            }
        }
    }

    fn apply_deployment_events(&mut self) {
        for event in self.deployer.drain() {
            self.apply_deployment_event(event);
        }
    }

    fn apply_deployment_event(&mut self, event: DeploymentEvent) {
        match event {
            DeploymentEvent::Deployed(token) => {
                let label = token.to_string();
                match self.registry.append(token) {
                    Ok(true) => self.logger.success(format!("[REGISTERED] {}", label)),
                    Ok(false) => self
                        .logger
                        .warn(format!("{} already registered, ignoring", label)),
                    Err(e) => self
                        .logger
                        .error(format!("Failed to register {}: {}", label, e)),
                };
            }
            DeploymentEvent::Failed(token) => {
                self.logger.warn(format!("[FAILED] {}", token));
            }
        }
    }
}

/// Wires the real collaborators from `config` and runs until `cancel` fires.
pub async fn run_lifecycle_bot(config: Config, cancel: CancellationToken) -> Result<()> {
    let wallet = config.app_state.wallet.clone();
    let ledger: Arc<dyn Ledger> = config.app_state.rpc_nonblocking_client.clone();

    let registry = TokenRegistry::open(Box::new(JsonFileStore::new(&config.registry_path)))?;

    let jupiter = Arc::new(Jupiter::new(
        config.jupiter_quote_api.as_str(),
        config.jupiter_swap_api.as_str(),
        wallet.clone(),
        ledger.clone(),
    )?);
    let treasury = Treasury::new(ledger, wallet.clone(), config.withdrawal_address);

    let (deployer, listener) = Deployer::new(
        PumpPortalConnector::new(config.pump_ws_url.as_str()),
        wallet.pubkey(),
    )
    .spawn(cancel.clone());

    Orchestrator::new(
        registry,
        deployer,
        jupiter.clone(),
        jupiter,
        treasury,
        cancel.clone(),
    )
    .run()
    .await;

    cancel.cancel();
    listener.await?;
    Ok(())
}
