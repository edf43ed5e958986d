//! Trade ledger: what each peer still owes us.
//!
//! Every accepted offer appends an entry for the peer: what we sent and what
//! we expect back. A later confirmation from that peer claiming it sent
//! resources settles all of its outstanding entries. The ledger is purely
//! informational and never gates a decision.
//!
//! When a path is configured the ledger is persisted as pretty JSON after
//! each change, keyed by peer alias:
//!
//! ```json
//! { "bea": [ { "sent": {"piedra": 2}, "expected": {"madera": 2}, "recorded_at": "..." } ] }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use trueque_types::{Alias, ResourceMap};

/// Errors raised while persisting the ledger.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// Failed to write the ledger file.
    #[error("failed to write ledger file {path}: {source}")]
    Io {
        /// File being written.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to serialize the ledger.
    #[error("failed to serialize ledger: {0}")]
    Serde(#[from] serde_json::Error),
}

/// One accepted trade awaiting the peer's side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// What we sent to the peer.
    pub sent: ResourceMap,
    /// What the peer promised in return.
    pub expected: ResourceMap,
    /// When the trade was accepted.
    pub recorded_at: DateTime<Utc>,
}

/// Per-peer record of outstanding trades.
#[derive(Debug, Clone, Default)]
pub struct TradeLedger {
    path: Option<PathBuf>,
    entries: BTreeMap<Alias, Vec<LedgerEntry>>,
}

impl TradeLedger {
    /// An empty ledger that is never written to disk.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Open the ledger at `path`.
    ///
    /// A missing file yields an empty ledger. An unreadable or malformed file
    /// also yields an empty ledger, with a warning; it is overwritten on the
    /// next save.
    pub fn open(path: &Path) -> Self {
        let entries = match std::fs::read_to_string(path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "malformed ledger file, starting empty");
                BTreeMap::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "unreadable ledger file, starting empty");
                BTreeMap::new()
            }
        };
        Self {
            path: Some(path.to_path_buf()),
            entries,
        }
    }

    /// Record an accepted trade with `peer`.
    pub fn record(&mut self, peer: &Alias, sent: ResourceMap, expected: ResourceMap) {
        self.entries.entry(peer.clone()).or_default().push(LedgerEntry {
            sent,
            expected,
            recorded_at: Utc::now(),
        });
        debug!(peer = %peer, outstanding = self.outstanding(peer).len(), "trade recorded");
    }

    /// Clear every outstanding entry for `peer`. Returns how many were
    /// cleared.
    pub fn settle(&mut self, peer: &Alias) -> usize {
        self.entries.remove(peer).map_or(0, |cleared| cleared.len())
    }

    /// Outstanding entries for `peer`.
    pub fn outstanding(&self, peer: &Alias) -> &[LedgerEntry] {
        self.entries.get(peer).map(Vec::as_slice).unwrap_or_default()
    }

    /// Number of peers with outstanding entries.
    pub fn peers_owing(&self) -> usize {
        self.entries.len()
    }

    /// Write the ledger to its file, if it has one.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] if serialization or the write fails.
    pub fn save(&self) -> Result<(), LedgerError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let json = serde_json::to_string_pretty(&self.entries)?;
        std::fs::write(path, json).map_err(|source| LedgerError::Io {
            path: path.clone(),
            source,
        })
    }
}
