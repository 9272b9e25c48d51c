//! Exception registry backed by the store.
//!
//! Expiry is evaluated at lookup time; expired rows are kept and simply stop
//! applying.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dbpulse_scoring::{catalog, exceptions, ScoringError};
use dbpulse_types::{CollectorException, CollectorKind, ExceptionId, NewException, ServerName};
use tracing::{info, instrument};

use crate::error::AdminResult;
use crate::storage::{Storage, StorageResult};

/// Lookup and maintenance of collector exceptions.
#[derive(Clone)]
pub struct ExceptionRegistry {
    storage: Arc<dyn Storage>,
}

impl ExceptionRegistry {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Whether `(kind, server)` is excepted right now.
    pub async fn is_excepted_now(
        &self,
        kind: CollectorKind,
        server: &ServerName,
    ) -> StorageResult<bool> {
        self.is_excepted_at(kind, server, Utc::now()).await
    }

    /// Whether `(kind, server)` is excepted at `now`.
    pub async fn is_excepted_at(
        &self,
        kind: CollectorKind,
        server: &ServerName,
        now: DateTime<Utc>,
    ) -> StorageResult<bool> {
        Ok(self.active_exception(kind, server, now).await?.is_some())
    }

    /// The exception covering `(kind, server)` at `now`, if any.
    pub async fn active_exception(
        &self,
        kind: CollectorKind,
        server: &ServerName,
        now: DateTime<Utc>,
    ) -> StorageResult<Option<CollectorException>> {
        let listed = self.storage.list_exceptions(Some(kind)).await?;
        Ok(exceptions::find_active(&listed, kind, server, now).cloned())
    }

    /// Create an exception for `kind`.
    #[instrument(skip(self, request), fields(server = %request.server))]
    pub async fn add(
        &self,
        kind: CollectorKind,
        request: NewException,
    ) -> AdminResult<CollectorException> {
        if request.server.as_str().trim().is_empty() {
            return Err(ScoringError::InvalidConfig {
                kind,
                reason: "exception server must not be empty".to_string(),
            }
            .into());
        }
        catalog::check_exception_kind(kind, request.exception_kind.as_deref())?;
        if let Some(expires_at) = request.expires_at {
            if expires_at <= Utc::now() {
                return Err(ScoringError::InvalidConfig {
                    kind,
                    reason: format!("exception already expired at {}", expires_at),
                }
                .into());
            }
        }

        let exception = request.into_exception(kind);
        self.storage.insert_exception(exception.clone()).await?;

        info!(
            kind = %kind,
            exception_id = %exception.id,
            exception_kind = ?exception.exception_kind,
            "Exception added"
        );
        Ok(exception)
    }

    /// Remove an exception; `false` when it did not exist.
    pub async fn remove(&self, id: &ExceptionId) -> StorageResult<bool> {
        let removed = self.storage.delete_exception(id).await?;
        if removed {
            info!(exception_id = %id, "Exception removed");
        }
        Ok(removed)
    }

    /// Exceptions of one collector, expired ones included.
    pub async fn list(&self, kind: CollectorKind) -> StorageResult<Vec<CollectorException>> {
        self.storage.list_exceptions(Some(kind)).await
    }

    /// Labels `kind` accepts as `exception_kind`.
    pub fn supported_exception_kinds(kind: CollectorKind) -> Vec<&'static str> {
        catalog::definition(kind).exception_kinds.to_vec()
    }
}
