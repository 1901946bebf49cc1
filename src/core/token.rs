use std::fmt;

use anyhow::{bail, Result};
use rand::{seq::SliceRandom, Rng};
use serde::{Deserialize, Serialize};

use crate::common::constants::{NAME_PREFIXES, NAME_SUFFIXES, TOKEN_SUPPLY_MAX, TOKEN_SUPPLY_MIN};

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum LifecycleState {
    Pending,
    Deployed,
    Disposed,
    Failed,
}

impl LifecycleState {
    /// Pending -> Deployed -> Disposed, or Pending -> Failed.
    pub fn can_transition(self, to: LifecycleState) -> bool {
        matches!(
            (self, to),
            (LifecycleState::Pending, LifecycleState::Deployed)
                | (LifecycleState::Pending, LifecycleState::Failed)
                | (LifecycleState::Deployed, LifecycleState::Disposed)
        )
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            LifecycleState::Pending => "pending",
            LifecycleState::Deployed => "deployed",
            LifecycleState::Disposed => "disposed",
            LifecycleState::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// On-disk shape of a deployed token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub name: String,
    pub mint: String,
    #[serde(default)]
    pub supply: u64,
    #[serde(default)]
    pub disposed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    name: String,
    mint: Option<String>,
    supply: u64,
    state: LifecycleState,
}

impl Token {
    pub fn new(name: impl Into<String>, supply: u64) -> Self {
        Token {
            name: name.into(),
            mint: None,
            supply,
            state: LifecycleState::Pending,
        }
    }

    /// Fresh pending token with a meme name and a supply between 1B and 10B.
    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let prefix = NAME_PREFIXES.choose(rng).copied().unwrap_or("Moon");
        let suffix = NAME_SUFFIXES.choose(rng).copied().unwrap_or("Coin");
        let name = format!("{}{}{}", prefix, suffix, rng.gen_range(100..=999));
        let supply = rng.gen_range(TOKEN_SUPPLY_MIN..=TOKEN_SUPPLY_MAX);
        Token::new(name, supply)
    }

    /// Rebuilds a token persisted by a previous run.
    pub fn restore(record: TokenRecord) -> Self {
        let state = if record.disposed {
            LifecycleState::Disposed
        } else {
            LifecycleState::Deployed
        };
        Token {
            name: record.name,
            mint: Some(record.mint),
            supply: record.supply,
            state,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mint(&self) -> Option<&str> {
        self.mint.as_deref()
    }

    pub fn supply(&self) -> u64 {
        self.supply
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn mark_deployed(&mut self, mint: impl Into<String>) -> Result<()> {
        self.transition(LifecycleState::Deployed)?;
        self.mint = Some(mint.into());
        Ok(())
    }

    pub fn mark_failed(&mut self) -> Result<()> {
        self.transition(LifecycleState::Failed)
    }

    pub fn mark_disposed(&mut self) -> Result<()> {
        self.transition(LifecycleState::Disposed)
    }

    pub fn record(&self) -> Option<TokenRecord> {
        self.mint.as_ref().map(|mint| TokenRecord {
            name: self.name.clone(),
            mint: mint.clone(),
            supply: self.supply,
            disposed: self.state == LifecycleState::Disposed,
        })
    }

    fn transition(&mut self, to: LifecycleState) -> Result<()> {
        if !self.state.can_transition(to) {
            bail!(
                "token {}: illegal transition {} -> {}",
                self.name,
                self.state,
                to
            );
        }
        self.state = to;
        Ok(())
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.mint {
            Some(mint) => write!(f, "{} ({})", self.name, mint),
            None => write!(f, "{}", self.name),
        }
    }
}
