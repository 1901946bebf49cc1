use crate::common::logger::Logger;
use crate::dex::jupiter::{DisposalExecutor, VolumeOracle};
use crate::engine::registry::TokenRegistry;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MonitorReport {
    pub checked: usize,
    pub disposed: usize,
    pub disposal_failures: usize,
}

/// One sequential pass over every `Deployed` token in registry order.
///
/// A token whose volume strictly exceeds `threshold` is handed to the
/// executor and marked `Disposed` whether or not the sale went through, so a
/// token is never sold twice. The registry persists each disposal as it
/// happens.
pub async fn monitor_and_dispose(
    registry: &mut TokenRegistry,
    oracle: &dyn VolumeOracle,
    executor: &dyn DisposalExecutor,
    threshold: u64,
) -> MonitorReport {
    let logger = Logger::new(format!("[MONITOR]({}) => ", registry.len()));
    let mut report = MonitorReport::default();

    for mint in registry.deployed_mints() {
        let label = registry
            .get(&mint)
            .map(|t| t.to_string())
            .unwrap_or_else(|| mint.clone());
        logger.log(format!("Checking activity for {}", label));
        report.checked += 1;

        let volume = oracle.trading_volume(&mint).await;
        if volume <= threshold {
            continue;
        }

        logger.warn(format!(
            "[DUMP] {}: volume {} > {} detected, selling",
            label, volume, threshold
        ));
        match executor.dispose(&mint).await {
            Ok(sig) => logger.success(format!("[SUCCESSFUL-SELL]({}): {}", mint, sig)),
            Err(e) => {
                report.disposal_failures += 1;
                logger.error(format!("Failed to sell {}: {}", mint, e))
            }
        };
        if let Err(e) = registry.mark_disposed(&mint) {
            logger.error(format!("Failed to record disposal of {}: {}", label, e));
            continue;
        }
        report.disposed += 1;
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::token::{LifecycleState, Token, TokenRecord};
    use crate::engine::registry::TokenStore;
    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use crate::engine::registry::JsonFileStore;
    use std::{collections::HashMap, sync::Mutex};
    use tempfile::TempDir;

    struct MemoryStore;

    impl TokenStore for MemoryStore {
        fn load(&self) -> Result<Vec<TokenRecord>> {
            Ok(Vec::new())
        }

        fn save(&self, _records: &[TokenRecord]) -> Result<()> {
            Ok(())
        }
    }

    struct StubOracle {
        volumes: HashMap<&'static str, Result<u64, &'static str>>,
        queried: Mutex<Vec<String>>,
    }

    impl StubOracle {
        fn new(volumes: &[(&'static str, Result<u64, &'static str>)]) -> Self {
            StubOracle {
                volumes: volumes.iter().cloned().collect(),
                queried: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl VolumeOracle for StubOracle {
        async fn fetch_volume(&self, mint: &str) -> Result<u64> {
            self.queried.lock().unwrap().push(mint.to_string());
            match self.volumes.get(mint) {
                Some(Ok(v)) => Ok(*v),
                Some(Err(e)) => Err(anyhow!(*e)),
                None => Ok(0),
            }
        }
    }

    #[derive(Default)]
    struct StubExecutor {
        sold: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl DisposalExecutor for StubExecutor {
        async fn dispose(&self, mint: &str) -> Result<String> {
            self.sold.lock().unwrap().push(mint.to_string());
            if self.fail {
                Err(anyhow!("swap rejected"))
            } else {
                Ok(format!("sig-{}", mint))
            }
        }
    }

    fn registry_with(mints: &[&str]) -> TokenRegistry {
        let mut registry = TokenRegistry::open(Box::new(MemoryStore)).unwrap();
        for mint in mints {
            let mut token = Token::new(format!("Token{}", mint), 1_000_000_000);
            token.mark_deployed(*mint).unwrap();
            registry.append(token).unwrap();
        }
        registry
    }

    fn state_of(registry: &TokenRegistry, mint: &str) -> LifecycleState {
        registry
            .tokens()
            .iter()
            .find(|t| t.mint() == Some(mint))
            .map(Token::state)
            .unwrap()
    }

    #[tokio::test]
    async fn token_over_threshold_is_disposed_exactly_once() {
        let mut registry = registry_with(&["M1"]);
        let oracle = StubOracle::new(&[("M1", Ok(15_000))]);
        let executor = StubExecutor::default();

        let first = monitor_and_dispose(&mut registry, &oracle, &executor, 10_000).await;
        assert_eq!(first.disposed, 1);
        assert_eq!(state_of(&registry, "M1"), LifecycleState::Disposed);

        let second = monitor_and_dispose(&mut registry, &oracle, &executor, 10_000).await;
        assert_eq!(second.checked, 0);
        assert_eq!(*executor.sold.lock().unwrap(), vec!["M1".to_string()]);
        assert_eq!(oracle.queried.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn threshold_is_exclusive() {
        let mut registry = registry_with(&["M1"]);
        let oracle = StubOracle::new(&[("M1", Ok(10_000))]);
        let executor = StubExecutor::default();

        let report = monitor_and_dispose(&mut registry, &oracle, &executor, 10_000).await;
        assert_eq!(report.disposed, 0);
        assert!(executor.sold.lock().unwrap().is_empty());
        assert_eq!(state_of(&registry, "M1"), LifecycleState::Deployed);
    }

    #[tokio::test]
    async fn oracle_error_does_not_block_later_tokens() {
        let mut registry = registry_with(&["M2", "M3"]);
        let oracle = StubOracle::new(&[("M2", Err("timeout")), ("M3", Ok(20_000))]);
        let executor = StubExecutor::default();

        let report = monitor_and_dispose(&mut registry, &oracle, &executor, 10_000).await;

        assert_eq!(
            *oracle.queried.lock().unwrap(),
            vec!["M2".to_string(), "M3".to_string()]
        );
        assert_eq!(report.checked, 2);
        assert_eq!(state_of(&registry, "M2"), LifecycleState::Deployed);
        assert_eq!(state_of(&registry, "M3"), LifecycleState::Disposed);
    }

    #[tokio::test]
    async fn failed_sale_still_counts_as_handled() {
        let mut registry = registry_with(&["M1"]);
        let oracle = StubOracle::new(&[("M1", Ok(50_000))]);
        let executor = StubExecutor {
            fail: true,
            ..StubExecutor::default()
        };

        let report = monitor_and_dispose(&mut registry, &oracle, &executor, 10_000).await;
        assert_eq!(report.disposal_failures, 1);
        assert_eq!(state_of(&registry, "M1"), LifecycleState::Disposed);

        monitor_and_dispose(&mut registry, &oracle, &executor, 10_000).await;
        assert_eq!(executor.sold.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn tokens_are_checked_in_insertion_order() {
        let mut registry = registry_with(&["C", "A", "B"]);
        let oracle = StubOracle::new(&[]);
        let executor = StubExecutor::default();

        monitor_and_dispose(&mut registry, &oracle, &executor, 10_000).await;
        assert_eq!(
            *oracle.queried.lock().unwrap(),
            vec!["C".to_string(), "A".to_string(), "B".to_string()]
        );
    }

    #[tokio::test]
    async fn disposal_is_remembered_across_restart() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("deployed_tokens.json");
        let oracle = StubOracle::new(&[("M1", Ok(15_000))]);
        let executor = StubExecutor::default();

        let mut registry = TokenRegistry::open(Box::new(JsonFileStore::new(&path))).unwrap();
        let mut token = Token::new("MoonInu333", 1_000_000_000);
        token.mark_deployed("M1").unwrap();
        registry.append(token).unwrap();
        monitor_and_dispose(&mut registry, &oracle, &executor, 10_000).await;
        drop(registry);

        let mut restarted = TokenRegistry::open(Box::new(JsonFileStore::new(&path))).unwrap();
        let report = monitor_and_dispose(&mut restarted, &oracle, &executor, 10_000).await;

        assert_eq!(report.checked, 0);
        assert_eq!(state_of(&restarted, "M1"), LifecycleState::Disposed);
        assert_eq!(*executor.sold.lock().unwrap(), vec!["M1".to_string()]);
    }
}
