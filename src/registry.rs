//! Registry capability and an in-memory registry.
//!
//! The reducer only needs one operation from the registry: merge a keep set
//! and a burn set in a single transactional step. [`InMemoryRegistry`] is a
//! local stand-in with the same all-or-nothing contract, used by the CLI and
//! in tests.

use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::TokenId;
use crate::errors::RegistryError;

/// Abstraction over the external token registry.
#[async_trait]
pub trait Registry: Send + Sync {
    /// Burn every token in `burn` and merge every token in `keep`.
    ///
    /// Either the whole batch is applied or none of it is.
    async fn merge_batch(&self, keep: &[TokenId], burn: &[TokenId]) -> Result<(), RegistryError>;
}

/// State of one token in the [`InMemoryRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum TokenState {
    /// Live token; `level` counts the merges it has taken part in as a keeper.
    Live { level: u32 },
    Burned,
}

/// One accepted merge batch, in the order it was applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergeBatch {
    pub keep: Vec<TokenId>,
    pub burn: Vec<TokenId>,
}

#[derive(Debug, Clone)]
struct TokenRecord {
    owner: String,
    state: TokenState,
}

#[derive(Debug, Default)]
struct Ledger {
    tokens: BTreeMap<TokenId, TokenRecord>,
    batches: Vec<MergeBatch>,
}

impl Ledger {
    fn validate(&self, actor: &str, keep: &[TokenId], burn: &[TokenId]) -> Result<(), RegistryError> {
        if keep.is_empty() {
            return Err(RegistryError::EmptyKeep);
        }

        let mut seen = HashSet::with_capacity(keep.len() + burn.len());
        for &token in keep.iter().chain(burn) {
            if !seen.insert(token) {
                return Err(RegistryError::Overlap { token });
            }
            let record = self
                .tokens
                .get(&token)
                .ok_or(RegistryError::UnknownToken { token })?;
            if record.state == TokenState::Burned {
                return Err(RegistryError::AlreadyBurned { token });
            }
            if record.owner != actor {
                return Err(RegistryError::Unauthorized {
                    token,
                    actor: actor.to_string(),
                });
            }
        }
        Ok(())
    }

    fn apply(&mut self, keep: &[TokenId], burn: &[TokenId]) {
        for token in burn {
            if let Some(record) = self.tokens.get_mut(token) {
                record.state = TokenState::Burned;
            }
        }
        for token in keep {
            if let Some(record) = self.tokens.get_mut(token)
                && let TokenState::Live { level } = record.state
            {
                record.state = TokenState::Live { level: level + 1 };
            }
        }
        self.batches.push(MergeBatch {
            keep: keep.to_vec(),
            burn: burn.to_vec(),
        });
    }
}

/// Registry kept entirely in memory.
///
/// Every batch is submitted as `actor`; tokens owned by anyone else are
/// rejected with [`RegistryError::Unauthorized`].
#[derive(Debug)]
pub struct InMemoryRegistry {
    actor: String,
    ledger: Mutex<Ledger>,
}

impl InMemoryRegistry {
    pub fn new(actor: impl Into<String>) -> Self {
        Self {
            actor: actor.into(),
            ledger: Mutex::new(Ledger::default()),
        }
    }

    /// Create a registry where `actor` already owns `tokens`.
    pub fn with_tokens(actor: impl Into<String>, tokens: &[TokenId]) -> Self {
        let actor = actor.into();
        let mut ledger = Ledger::default();
        for &token in tokens {
            ledger.tokens.insert(
                token,
                TokenRecord {
                    owner: actor.clone(),
                    state: TokenState::Live { level: 0 },
                },
            );
        }
        Self {
            actor,
            ledger: Mutex::new(ledger),
        }
    }

    pub fn actor(&self) -> &str {
        &self.actor
    }

    /// Mint `tokens` for `owner`. Existing ids are left untouched.
    pub async fn mint(&self, owner: &str, tokens: &[TokenId]) {
        let mut ledger = self.ledger.lock().await;
        for &token in tokens {
            ledger.tokens.entry(token).or_insert_with(|| TokenRecord {
                owner: owner.to_string(),
                state: TokenState::Live { level: 0 },
            });
        }
    }

    pub async fn state_of(&self, token: TokenId) -> Option<TokenState> {
        self.ledger.lock().await.tokens.get(&token).map(|r| r.state)
    }

    pub async fn is_live(&self, token: TokenId) -> bool {
        matches!(self.state_of(token).await, Some(TokenState::Live { .. }))
    }

    pub async fn level_of(&self, token: TokenId) -> Option<u32> {
        match self.state_of(token).await {
            Some(TokenState::Live { level }) => Some(level),
            _ => None,
        }
    }

    /// Live token ids in ascending order.
    pub async fn live_tokens(&self) -> Vec<TokenId> {
        self.ledger
            .lock()
            .await
            .tokens
            .iter()
            .filter(|(_, r)| matches!(r.state, TokenState::Live { .. }))
            .map(|(id, _)| *id)
            .collect()
    }

    /// Accepted batches in application order.
    pub async fn batches(&self) -> Vec<MergeBatch> {
        self.ledger.lock().await.batches.clone()
    }
}

#[async_trait]
impl Registry for InMemoryRegistry {
    async fn merge_batch(&self, keep: &[TokenId], burn: &[TokenId]) -> Result<(), RegistryError> {
        let mut ledger = self.ledger.lock().await;
        if let Err(e) = ledger.validate(&self.actor, keep, burn) {
            tracing::warn!(actor = %self.actor, ?keep, ?burn, error = %e, "merge batch rejected");
            return Err(e);
        }
        ledger.apply(keep, burn);
        tracing::debug!(actor = %self.actor, ?keep, ?burn, "merge batch applied");
        Ok(())
    }
}
