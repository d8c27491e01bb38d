//! Reloadable IP white-list
//!
//! Holds the parsed white-list used by the session IP-change check:
//! - Immutable [`WhitelistSnapshot`] per configuration value
//! - Atomic snapshot swap on reload, readers never block
//! - Invalid entries are logged and skipped, the others stay active
//! - Lookup statistics
//!
//! # Examples
//!
//! ```
//! use ipcheck_whitelist::IpWhitelist;
//!
//! let whitelist = IpWhitelist::new("10.30.73.4,10.30.77.0/24");
//! assert!(whitelist.is_whitelisted("10.30.77.12"));
//!
//! let summary = whitelist.reload("192.168.0.0/16,10.0.0.0/33");
//! assert_eq!(summary.active, 1);
//! assert_eq!(summary.rejected, 1);
//! assert!(!whitelist.is_whitelisted("10.30.77.12"));
//! assert!(whitelist.is_whitelisted("192.168.1.1"));
//! ```

pub mod config;

pub use config::{WhitelistConfig, WHITELIST_ENV};

use arc_swap::ArcSwap;
use ipcheck_range::{
    is_whitelisted_from_rate_limit, parse_list_report, IpRange, ParsedList, RejectedEntry,
};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Parsed white-list published as a unit
#[derive(Debug, Clone, Default)]
pub struct WhitelistSnapshot {
    ranges: Vec<IpRange>,
    rejected: Vec<RejectedEntry>,
    version: u64,
}

impl WhitelistSnapshot {
    fn from_parsed(parsed: ParsedList, version: u64) -> Self {
        Self {
            ranges: parsed.ranges,
            rejected: parsed.rejected,
            version,
        }
    }

    /// Active ranges
    pub fn ranges(&self) -> &[IpRange] {
        &self.ranges
    }

    /// Entries skipped while parsing
    pub fn rejected(&self) -> &[RejectedEntry] {
        &self.rejected
    }

    /// Snapshot version, starting at 0 and bumped on every reload
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Whether no range is active
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}

/// Result of publishing a new snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReloadSummary {
    /// Version of the published snapshot
    pub version: u64,
    /// Ranges now active
    pub active: usize,
    /// Entries that were skipped
    pub rejected: usize,
}

/// White-list statistics
#[derive(Debug, Clone, Default, Serialize)]
pub struct WhitelistStats {
    /// Addresses checked
    pub lookups: u64,
    /// Addresses found white-listed
    pub hits: u64,
    /// Snapshots published after construction
    pub reloads: u64,
    /// Ranges in the current snapshot
    pub active_ranges: usize,
    /// Entries skipped in the current snapshot
    pub rejected_entries: usize,
}

impl WhitelistStats {
    /// Share of lookups that were white-listed, as a percentage
    pub fn hit_rate(&self) -> f64 {
        if self.lookups == 0 {
            0.0
        } else {
            (self.hits as f64 / self.lookups as f64) * 100.0
        }
    }
}

/// White-list with atomically swapped snapshots
///
/// Safe to share between threads. Lookups read the current snapshot
/// without locking; [`IpWhitelist::reload`] replaces it as a whole.
#[derive(Debug)]
pub struct IpWhitelist {
    current: ArcSwap<WhitelistSnapshot>,
    lookups: AtomicU64,
    hits: AtomicU64,
    reloads: AtomicU64,
}

impl IpWhitelist {
    /// Create a white-list from a comma-separated configuration value
    ///
    /// # Arguments
    ///
    /// * `value` - Range specifications (e.g., "10.30.73.4,10.30.77.0/24")
    pub fn new(value: &str) -> Self {
        let snapshot = WhitelistSnapshot::from_parsed(parse_list_report(value), 0);
        info!(
            active = snapshot.ranges.len(),
            rejected = snapshot.rejected.len(),
            "Loaded IP white-list"
        );

        Self::with_snapshot(snapshot)
    }

    /// Create a white-list without any ranges
    pub fn empty() -> Self {
        Self::with_snapshot(WhitelistSnapshot::default())
    }

    /// Create a white-list from a loaded configuration
    pub fn from_config(config: &WhitelistConfig) -> Self {
        Self::new(&config.value)
    }

    fn with_snapshot(snapshot: WhitelistSnapshot) -> Self {
        Self {
            current: ArcSwap::from_pointee(snapshot),
            lookups: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            reloads: AtomicU64::new(0),
        }
    }

    /// Replace the white-list with a new configuration value
    ///
    /// The new snapshot is built completely before it is published.
    pub fn reload(&self, value: &str) -> ReloadSummary {
        let parsed = parse_list_report(value);
        let mut version = 0;

        self.current.rcu(|old| {
            version = old.version + 1;
            WhitelistSnapshot::from_parsed(parsed.clone(), version)
        });
        self.reloads.fetch_add(1, Ordering::Relaxed);

        let summary = ReloadSummary {
            version,
            active: parsed.ranges.len(),
            rejected: parsed.rejected.len(),
        };
        info!(
            version = summary.version,
            active = summary.active,
            rejected = summary.rejected,
            "Reloaded IP white-list"
        );

        summary
    }

    /// Replace the white-list with a loaded configuration
    pub fn reload_config(&self, config: &WhitelistConfig) -> ReloadSummary {
        self.reload(&config.value)
    }

    /// Check if an address literal is white-listed
    ///
    /// Malformed addresses are never white-listed.
    pub fn is_whitelisted(&self, address: &str) -> bool {
        let snapshot = self.current.load();
        let hit = is_whitelisted_from_rate_limit(address, snapshot.ranges.iter());

        self.lookups.fetch_add(1, Ordering::Relaxed);
        if hit {
            self.hits.fetch_add(1, Ordering::Relaxed);
        }
        debug!(address, hit, version = snapshot.version, "White-list lookup");

        hit
    }

    /// Current snapshot
    pub fn snapshot(&self) -> Arc<WhitelistSnapshot> {
        self.current.load_full()
    }

    /// Get white-list statistics
    pub fn stats(&self) -> WhitelistStats {
        let snapshot = self.current.load();
        WhitelistStats {
            lookups: self.lookups.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
            reloads: self.reloads.load(Ordering::Relaxed),
            active_ranges: snapshot.ranges.len(),
            rejected_entries: snapshot.rejected.len(),
        }
    }
}

impl Default for IpWhitelist {
    fn default() -> Self {
        Self::empty()
    }
}
