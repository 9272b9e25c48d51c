//! Exception lookup.
//!
//! Expiry is checked lazily at lookup time; expired rows are never swept.

use chrono::{DateTime, Utc};
use dbpulse_types::{CollectorException, CollectorKind, ServerName};

/// First exception covering `(kind, server)` at `now`.
pub fn find_active<'a>(
    exceptions: &'a [CollectorException],
    kind: CollectorKind,
    server: &ServerName,
    now: DateTime<Utc>,
) -> Option<&'a CollectorException> {
    exceptions.iter().find(|e| e.covers(kind, server, now))
}
