//! Persisted registry of known mints.
//!
//! Holds an ordered, duplicate-free list of mint URLs plus the single
//! active entry. Every mutation persists synchronously before it reports
//! success, so a crash never loses an acknowledged change.

use crate::utils::{has_http_scheme, normalize_mint_url};
use crate::wallet::WalletError;
use crate::wallet::repositories::{MintListRepository, MintListState};

use tracing::info;

pub struct MintRegistry {
    state: MintListState,
    repo: Box<dyn MintListRepository>,
}

impl MintRegistry {
    /// Load the registry from its repository, starting empty when nothing
    /// was persisted yet.
    pub async fn load(repo: Box<dyn MintListRepository>) -> Result<Self, WalletError> {
        let state = repo.load().await?.unwrap_or_default();
        Ok(Self { state, repo })
    }

    /// Add a mint URL to the end of the list. Idempotent: re-adding an
    /// existing URL changes nothing. The first entry automatically becomes
    /// active. Returns the normalized URL under which the mint is stored.
    pub async fn add(&mut self, url: &str) -> Result<String, WalletError> {
        if !has_http_scheme(url) {
            return Err(WalletError::Validation(format!(
                "mint URL must use http or https: {}",
                url
            )));
        }
        let url = normalize_mint_url(url);

        if self.state.mints.iter().any(|m| *m == url) {
            return Ok(url);
        }

        self.state.mints.push(url.clone());
        if self.state.active.is_none() {
            self.state.active = Some(url.clone());
        }
        self.repo.save(&self.state).await?;
        info!("Added mint {}", url);
        Ok(url)
    }

    /// Make `url` the active mint. Returns false (without persisting) when
    /// the URL is not a member.
    pub async fn set_active(&mut self, url: &str) -> Result<bool, WalletError> {
        let url = normalize_mint_url(url);
        if !self.state.mints.iter().any(|m| *m == url) {
            return Ok(false);
        }
        if self.state.active.as_deref() != Some(url.as_str()) {
            self.state.active = Some(url.clone());
            self.repo.save(&self.state).await?;
            info!("Active mint is now {}", url);
        }
        Ok(true)
    }

    /// Remove a mint. The active mint can never be removed; failure leaves
    /// the registry untouched.
    pub async fn remove(&mut self, url: &str) -> Result<(), WalletError> {
        let url = normalize_mint_url(url);
        if self.state.active.as_deref() == Some(url.as_str()) {
            return Err(WalletError::CannotRemoveActiveMint(url));
        }
        let before = self.state.mints.len();
        self.state.mints.retain(|m| *m != url);
        if self.state.mints.len() != before {
            self.repo.save(&self.state).await?;
            info!("Removed mint {}", url);
        }
        Ok(())
    }

    /// All known mint URLs in insertion order.
    pub fn list(&self) -> Vec<String> {
        self.state.mints.clone()
    }

    /// The currently active mint URL, if any.
    pub fn active(&self) -> Option<&str> {
        self.state.active.as_deref()
    }

    pub fn contains(&self, url: &str) -> bool {
        let url = normalize_mint_url(url);
        self.state.mints.iter().any(|m| *m == url)
    }
}
