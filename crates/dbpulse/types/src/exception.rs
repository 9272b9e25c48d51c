//! Server-level collector exceptions
//!
//! An exception suppresses penalty scoring for one (collector, server) pair.
//! Expired records stay in the store but no longer apply.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::collector::CollectorKind;
use crate::ids::{ExceptionId, ServerName};

/// Operator-declared suppression for one collector on one server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectorException {
    /// Unique exception identifier
    pub id: ExceptionId,

    /// Collector the exception applies to
    pub kind: CollectorKind,

    /// Server the exception applies to
    pub server: ServerName,

    /// Optional sub-label (e.g. `no_full_backup_required`)
    #[serde(default)]
    pub exception_kind: Option<String>,

    /// Free-text reason
    #[serde(default)]
    pub reason: Option<String>,

    /// Expiry; `None` means the exception never expires
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,

    /// Operator who created the exception
    pub created_by: String,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl CollectorException {
    pub fn new(kind: CollectorKind, server: ServerName, created_by: impl Into<String>) -> Self {
        Self {
            id: ExceptionId::generate(),
            kind,
            server,
            exception_kind: None,
            reason: None,
            expires_at: None,
            created_by: created_by.into(),
            created_at: Utc::now(),
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_exception_kind(mut self, label: impl Into<String>) -> Self {
        self.exception_kind = Some(label.into());
        self
    }

    pub fn expiring_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Whether the exception is in force at `now`.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => now < expires_at,
            None => true,
        }
    }

    /// Whether the exception covers the given pair at `now`.
    pub fn covers(&self, kind: CollectorKind, server: &ServerName, now: DateTime<Utc>) -> bool {
        self.kind == kind && &self.server == server && self.is_active_at(now)
    }
}

/// Request body for creating an exception
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewException {
    pub server: ServerName,
    #[serde(default)]
    pub exception_kind: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    pub created_by: String,
}

impl NewException {
    /// Materialise the request into a stored exception for `kind`.
    pub fn into_exception(self, kind: CollectorKind) -> CollectorException {
        CollectorException {
            id: ExceptionId::generate(),
            kind,
            server: self.server,
            exception_kind: self.exception_kind,
            reason: self.reason,
            expires_at: self.expires_at,
            created_by: self.created_by,
            created_at: Utc::now(),
        }
    }
}
