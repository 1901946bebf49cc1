use std::{
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use tempfile::NamedTempFile;

use crate::core::token::{LifecycleState, Token, TokenRecord};

/// Durable mirror of the registry.
pub trait TokenStore: Send + Sync {
    fn load(&self) -> Result<Vec<TokenRecord>>;

    /// Replaces the whole persisted sequence.
    fn save(&self, records: &[TokenRecord]) -> Result<()>;
}

/// JSON array on disk, rewritten through a temp file + rename so an
/// interrupted write never leaves a torn file.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonFileStore { path: path.into() }
    }
}

impl TokenStore for JsonFileStore {
    fn load(&self) -> Result<Vec<TokenRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("reading {}", self.path.display()))?;
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&content)
            .with_context(|| format!("parsing {}", self.path.display()))
    }

    fn save(&self, records: &[TokenRecord]) -> Result<()> {
        let data = serde_json::to_vec_pretty(records)?;
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => {
                std::fs::create_dir_all(parent)?;
                parent
            }
            _ => Path::new("."),
        };
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(&data)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}

/// Append-only, insertion-ordered set of deployed tokens.
pub struct TokenRegistry {
    store: Box<dyn TokenStore>,
    tokens: Vec<Token>,
}

impl TokenRegistry {
    pub fn open(store: Box<dyn TokenStore>) -> Result<Self> {
        let mut tokens: Vec<Token> = Vec::new();
        for record in store.load()? {
            if tokens.iter().any(|t| t.mint() == Some(record.mint.as_str())) {
                continue;
            }
            tokens.push(Token::restore(record));
        }
        Ok(TokenRegistry { store, tokens })
    }

    /// Adds a freshly deployed token and persists the full sequence.
    /// Returns `Ok(false)` when the mint is already registered.
    pub fn append(&mut self, token: Token) -> Result<bool> {
        if token.state() != LifecycleState::Deployed {
            bail!("only deployed tokens can be registered, {} is {}", token, token.state());
        }
        let Some(mint) = token.mint() else {
            bail!("deployed token {} has no mint", token);
        };
        if self.contains_mint(mint) {
            return Ok(false);
        }
        self.tokens.push(token);
        self.persist()?;
        Ok(true)
    }

    pub fn contains_mint(&self, mint: &str) -> bool {
        self.tokens.iter().any(|t| t.mint() == Some(mint))
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn get(&self, mint: &str) -> Option<&Token> {
        self.tokens.iter().find(|t| t.mint() == Some(mint))
    }

    /// Mints still awaiting disposal, in insertion order.
    pub fn deployed_mints(&self) -> Vec<String> {
        self.tokens
            .iter()
            .filter(|t| t.state() == LifecycleState::Deployed)
            .filter_map(|t| t.mint().map(str::to_owned))
            .collect()
    }

    /// Moves `mint` to `Disposed` and rewrites the store so the disposal
    /// outlives a restart.
    pub fn mark_disposed(&mut self, mint: &str) -> Result<()> {
        let Some(token) = self.tokens.iter_mut().find(|t| t.mint() == Some(mint)) else {
            bail!("mint {} is not registered", mint);
        };
        token.mark_disposed()?;
        self.persist()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    fn persist(&self) -> Result<()> {
        let records: Vec<TokenRecord> = self.tokens.iter().filter_map(Token::record).collect();
        self.store.save(&records)
    }
}
