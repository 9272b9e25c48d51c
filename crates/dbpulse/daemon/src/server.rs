//! Server setup and lifecycle management

use crate::admin::AdminService;
use crate::api::{create_router, AppState};
use crate::collectors::{CollectorRunner, SourceRegistry, StaticInventory};
use crate::config::{DaemonConfig, StorageConfig};
use crate::error::{DaemonError, DaemonResult};
use crate::scheduler::{CollectorOrchestrator, HealthConsolidator};
use crate::storage::{InMemoryStorage, PostgresStorage, Storage};
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;

/// dbpulse daemon server
pub struct Server {
    config: DaemonConfig,
    storage: Arc<dyn Storage>,
    orchestrator: Arc<CollectorOrchestrator>,
    consolidator: Arc<HealthConsolidator>,
    admin: AdminService,
}

impl Server {
    /// Create a new server with the given configuration
    pub async fn new(config: DaemonConfig) -> DaemonResult<Self> {
        let storage = connect_storage(&config.storage).await?;
        let sources = SourceRegistry::simulated(&config.inventory);
        Self::with_parts(config, storage, sources).await
    }

    /// Create a server over an existing storage backend and metric sources
    pub async fn with_parts(
        config: DaemonConfig,
        storage: Arc<dyn Storage>,
        sources: SourceRegistry,
    ) -> DaemonResult<Self> {
        config
            .scoring
            .validate()
            .map_err(|e| DaemonError::Config(e.to_string()))?;

        let inventory = Arc::new(StaticInventory::new(config.inventory.instances.clone()));
        let runner = CollectorRunner::new(
            storage.clone(),
            inventory,
            Arc::new(sources),
            config.scheduler.measurement_timeout(),
        );

        let orchestrator = CollectorOrchestrator::new(storage.clone(), runner);
        let consolidator = HealthConsolidator::new(
            storage.clone(),
            config.scoring.clone(),
            config.scheduler.consolidation_interval(),
        );
        let admin = AdminService::new(storage.clone(), orchestrator.clone(), consolidator.clone());

        admin
            .ensure_defaults()
            .await
            .map_err(|e| DaemonError::Config(format!("Failed to seed collectors: {}", e)))?;

        Ok(Self {
            config,
            storage,
            orchestrator,
            consolidator,
            admin,
        })
    }

    /// Build the HTTP router for this server
    pub fn router(&self) -> Router {
        let state = AppState::new(self.storage.clone(), self.admin.clone());
        create_router(state, self.config.server.enable_cors)
    }

    /// Administrative operations
    pub fn admin(&self) -> &AdminService {
        &self.admin
    }

    /// Start collector timers and the consolidation loop
    pub async fn start_background(&self) -> DaemonResult<()> {
        let timers = self
            .orchestrator
            .start()
            .await
            .map_err(|e| DaemonError::Server(e.to_string()))?;
        self.consolidator.start().await;

        tracing::info!(timers, "Background scheduling started");
        Ok(())
    }

    /// Stop scheduling and wait for in-flight runs
    pub async fn shutdown(&self) {
        let grace = self.config.scheduler.shutdown_grace();
        let drained = self.orchestrator.stop(grace).await;
        self.consolidator.stop().await;

        if drained {
            tracing::info!("All collector runs finished");
        } else {
            tracing::warn!(
                grace_secs = grace.as_secs(),
                "Collector runs still in flight after grace period, aborted"
            );
        }
    }

    /// Run the server
    pub async fn run(self) -> DaemonResult<()> {
        let addr = self.config.server.listen_addr;
        let app = self.router();

        let listener = TcpListener::bind(addr).await?;
        tracing::info!("dbpulse daemon listening on {}", addr);

        if self.config.scheduler.autostart {
            self.start_background().await?;
        } else {
            tracing::info!("Autostart disabled, collectors run on manual trigger only");
        }

        // Run server with graceful shutdown
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| DaemonError::Server(e.to_string()))?;

        tracing::info!("dbpulse daemon shutting down");
        self.shutdown().await;

        Ok(())
    }
}

async fn connect_storage(config: &StorageConfig) -> DaemonResult<Arc<dyn Storage>> {
    match config {
        StorageConfig::Memory => {
            tracing::warn!("Using in-memory storage, scores are lost on restart");
            Ok(Arc::new(InMemoryStorage::new()))
        }
        StorageConfig::Postgres {
            url,
            max_connections,
            connect_timeout_secs,
        } => {
            let storage = PostgresStorage::new(url, *max_connections, *connect_timeout_secs).await?;
            tracing::info!(max_connections, "Connected to PostgreSQL storage");
            Ok(Arc::new(storage))
        }
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
    }
}
