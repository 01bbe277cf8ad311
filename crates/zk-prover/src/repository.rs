//! Credential repository port
//!
//! Disclosure reads a holder's credentials through [`CredentialRepository`]
//! so the storage backend (wallet, database, chain indexer) is injected
//! rather than global.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::credential::VerifiableCredential;
use crate::error::{Result, ZkError};

/// Source of a holder's verifiable credentials
pub trait CredentialRepository: Send + Sync {
    /// All credentials held by `holder`, in the order they were issued to
    /// the wallet. An unknown holder has no credentials.
    fn credentials_for(&self, holder: &str) -> Result<Vec<VerifiableCredential>>;
}

impl<R: CredentialRepository + ?Sized> CredentialRepository for &R {
    fn credentials_for(&self, holder: &str) -> Result<Vec<VerifiableCredential>> {
        (**self).credentials_for(holder)
    }
}

/// In-memory repository keyed by wallet address.
///
/// Addresses are compared case-insensitively, so checksummed and lowercase
/// forms of the same address resolve to the same holder.
#[derive(Debug, Default)]
pub struct InMemoryCredentialRepository {
    credentials: RwLock<HashMap<String, Vec<VerifiableCredential>>>,
}

impl InMemoryCredentialRepository {
    /// Empty repository
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a credential to `holder`'s wallet
    pub fn insert(&self, holder: &str, credential: VerifiableCredential) -> Result<()> {
        let mut credentials = self.credentials.write().map_err(|_| poisoned())?;
        credentials
            .entry(holder.to_lowercase())
            .or_default()
            .push(credential);
        Ok(())
    }

    /// Number of credentials held by `holder`
    pub fn count(&self, holder: &str) -> Result<usize> {
        let credentials = self.credentials.read().map_err(|_| poisoned())?;
        Ok(credentials.get(&holder.to_lowercase()).map_or(0, Vec::len))
    }
}

impl CredentialRepository for InMemoryCredentialRepository {
    fn credentials_for(&self, holder: &str) -> Result<Vec<VerifiableCredential>> {
        let credentials = self.credentials.read().map_err(|_| poisoned())?;
        Ok(credentials
            .get(&holder.to_lowercase())
            .cloned()
            .unwrap_or_default())
    }
}

fn poisoned() -> ZkError {
    ZkError::Repository {
        reason: "credential store lock poisoned".into(),
    }
}
