//! Admin privilege resolution.
//!
//! The admin flag is a client-side convenience only; the server stays
//! authoritative for anything privileged.

use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashSet;

/// Decides whether an address gets the admin flag.
#[async_trait]
pub trait AdminCheck: Send + Sync {
    async fn is_admin(&self, address: &str) -> Result<bool>;
}

/// Static allow-list of admin addresses.
#[derive(Debug, Clone, Default)]
pub struct AllowList {
    wallets: HashSet<String>,
}

impl AllowList {
    pub fn new<I, S>(wallets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            wallets: wallets.into_iter().map(Into::into).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.wallets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wallets.is_empty()
    }
}

#[async_trait]
impl AdminCheck for AllowList {
    async fn is_admin(&self, address: &str) -> Result<bool> {
        Ok(self.wallets.contains(address))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_allow_list() {
        let list = AllowList::new(["Wa11et1", "Wa11et2"]);
        assert_eq!(list.len(), 2);
        assert!(list.is_admin("Wa11et1").await.unwrap());
        assert!(!list.is_admin("Wa11et9").await.unwrap());
        // addresses are case-sensitive base58
        assert!(!list.is_admin("wa11et1").await.unwrap());
    }

    #[tokio::test]
    async fn test_empty_allow_list() {
        let list = AllowList::default();
        assert!(list.is_empty());
        tokio_test::assert_ok!(list.is_admin("anyone").await);
    }
}
