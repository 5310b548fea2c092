//! The worker: lifecycle state machine plus fetch dispatch.
//!
//! States follow `Parsed → Installing → Installed → Activating → Activated`.
//! A failed install leaves the worker `Redundant` until it is installed again.
//! Fetch events are routed through the bucket only while `Activated`; before
//! that the page is uncontrolled and requests go straight to the network.

pub mod clients;

use std::sync::Arc;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use url::Url;

pub use clients::{ClientInfo, Clients};

use crate::cache::CacheStorage;
use crate::{
    ActivateOutcome, Error, FetchRouter, Fetcher, GenerationId, InstallOutcome, LifecycleManager, ResponseSource,
    RouteTable, Routed, SiteRequest,
};

/// Lifecycle state of the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    Parsed,
    Installing,
    Installed,
    Activating,
    Activated,
    Redundant,
}

/// One generation's worker.
pub struct ServiceWorker {
    storage: Arc<dyn CacheStorage>,
    fetcher: Arc<dyn Fetcher>,
    clients: Arc<Clients>,
    lifecycle: LifecycleManager,
    router: FetchRouter,
    state: RwLock<WorkerState>,
}

impl ServiceWorker {
    pub fn new(
        storage: Arc<dyn CacheStorage>, fetcher: Arc<dyn Fetcher>, generation: GenerationId, routes: RouteTable,
    ) -> Self {
        let clients = Arc::new(Clients::new());
        let router = FetchRouter::new(storage.clone(), fetcher.clone(), &generation, routes);
        let lifecycle = LifecycleManager::new(storage.clone(), fetcher.clone(), clients.clone(), generation);
        Self { storage, fetcher, clients, lifecycle, router, state: RwLock::new(WorkerState::Parsed) }
    }

    /// Pre-populate these URLs at install time.
    pub fn with_manifest(mut self, manifest: Vec<Url>) -> Self {
        self.lifecycle = self.lifecycle.with_manifest(manifest);
        self
    }

    pub fn generation(&self) -> &GenerationId {
        self.lifecycle.generation()
    }

    pub fn storage(&self) -> &Arc<dyn CacheStorage> {
        &self.storage
    }

    pub fn router(&self) -> &FetchRouter {
        &self.router
    }

    pub fn clients(&self) -> &Clients {
        &self.clients
    }

    pub async fn state(&self) -> WorkerState {
        *self.state.read().await
    }

    async fn enter(&self, allowed: &[WorkerState], next: WorkerState, event: &str) -> Result<(), Error> {
        let mut state = self.state.write().await;
        if !allowed.contains(&state) {
            return Err(Error::WorkerState(format!("cannot {event} while {:?}", *state)));
        }
        *state = next;
        Ok(())
    }

    async fn set(&self, next: WorkerState) {
        *self.state.write().await = next;
    }

    /// Deliver the install event.
    ///
    /// # Errors
    ///
    /// Fails if another lifecycle event is in progress, or with the install
    /// error, in which case the worker becomes `Redundant`.
    pub async fn install(&self) -> Result<InstallOutcome, Error> {
        use WorkerState::*;
        self.enter(&[Parsed, Installed, Activated, Redundant], Installing, "install").await?;

        match self.lifecycle.install().await {
            Ok(outcome) => {
                self.set(Installed).await;
                Ok(outcome)
            }
            Err(e) => {
                tracing::error!(generation = %self.generation(), error = %e, "install failed");
                self.set(Redundant).await;
                Err(e)
            }
        }
    }

    /// Deliver the activate event.
    ///
    /// # Errors
    ///
    /// Fails unless the worker is installed (or already active). A failed
    /// activation leaves the worker `Installed` so it can be retried.
    pub async fn activate(&self) -> Result<ActivateOutcome, Error> {
        use WorkerState::*;
        self.enter(&[Installed, Activated], Activating, "activate").await?;

        match self.lifecycle.activate().await {
            Ok(outcome) => {
                self.set(Activated).await;
                Ok(outcome)
            }
            Err(e) => {
                self.set(Installed).await;
                Err(e)
            }
        }
    }

    /// Install, then activate straight away when install asks to skip waiting.
    pub async fn start(&self) -> Result<(InstallOutcome, Option<ActivateOutcome>), Error> {
        let installed = self.install().await?;
        let activated = if installed.skip_waiting { Some(self.activate().await?) } else { None };
        Ok((installed, activated))
    }

    /// Attach a client; it is controlled immediately if the worker is active.
    pub async fn attach_client(&self, id: impl Into<String>) -> bool {
        let controller = (self.state().await == WorkerState::Activated).then(|| self.generation().clone());
        self.clients.attach(id, controller).await
    }

    /// Forget a client once its session ends. Returns whether it was attached.
    pub async fn detach_client(&self, id: &str) -> bool {
        let detached = self.clients.detach(id).await;
        if detached {
            tracing::debug!(client = id, "client detached");
        }
        detached
    }

    /// Deliver a fetch event.
    pub async fn fetch(&self, request: &SiteRequest) -> Result<Routed, Error> {
        if self.state().await != WorkerState::Activated {
            tracing::debug!(url = %request.url, "worker not active, uncontrolled fetch");
            let response = self.fetcher.fetch(request).await?;
            return Ok(Routed { response, source: ResponseSource::Passthrough, strategy: None, store: None });
        }
        self.router.handle(request).await
    }
}
