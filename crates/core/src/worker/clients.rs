//! Client pages and which generation controls them.

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::GenerationId;

/// Listing row for one attached client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ClientInfo {
    pub id: String,
    pub controller: Option<GenerationId>,
}

/// Registry of attached clients.
#[derive(Debug, Default)]
pub struct Clients {
    inner: RwLock<BTreeMap<String, Option<GenerationId>>>,
}

impl Clients {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a client, optionally already controlled.
    ///
    /// Returns false if the id was attached before; its controller is
    /// left unchanged then.
    pub async fn attach(&self, id: impl Into<String>, controller: Option<GenerationId>) -> bool {
        let mut inner = self.inner.write().await;
        let id = id.into();
        if inner.contains_key(&id) {
            return false;
        }
        inner.insert(id, controller);
        true
    }

    pub async fn detach(&self, id: &str) -> bool {
        self.inner.write().await.remove(id).is_some()
    }

    /// Take control of every attached client without a reload.
    ///
    /// Returns the number of clients now controlled.
    pub async fn claim(&self, generation: &GenerationId) -> usize {
        let mut inner = self.inner.write().await;
        for controller in inner.values_mut() {
            *controller = Some(generation.clone());
        }
        inner.len()
    }

    pub async fn controller(&self, id: &str) -> Option<GenerationId> {
        self.inner.read().await.get(id).cloned().flatten()
    }

    pub async fn list(&self) -> Vec<ClientInfo> {
        self.inner
            .read()
            .await
            .iter()
            .map(|(id, controller)| ClientInfo { id: id.clone(), controller: controller.clone() })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_attach_is_idempotent() {
        let clients = Clients::new();
        assert!(clients.attach("tab", None).await);
        assert!(!clients.attach("tab", Some(GenerationId::new("v1").unwrap())).await);
        assert_eq!(clients.controller("tab").await, None);
    }

    #[tokio::test]
    async fn test_claim_replaces_controller() {
        let clients = Clients::new();
        let v1 = GenerationId::new("v1").unwrap();
        let v2 = GenerationId::new("v2").unwrap();
        clients.attach("a", Some(v1)).await;
        clients.attach("b", None).await;

        assert_eq!(clients.claim(&v2).await, 2);
        assert!(clients.list().await.iter().all(|c| c.controller.as_ref() == Some(&v2)));
    }

    #[tokio::test]
    async fn test_detach() {
        let clients = Clients::new();
        clients.attach("a", None).await;
        assert!(clients.detach("a").await);
        assert!(!clients.detach("a").await);
        assert!(clients.list().await.is_empty());
    }
}
