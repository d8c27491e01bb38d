//! Parallel batch checks using Rayon
//!
//! Checks many addresses against one white-list snapshot:
//! - Configurable thread pool
//! - Malformed addresses reported per line
//! - Progress logging

use anyhow::Result;
use ipcheck_whitelist::IpWhitelist;
use rayon::prelude::*;
use serde::Serialize;
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Outcome for one input line
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchResult {
    pub address: String,
    pub valid: bool,
    pub whitelisted: bool,
}

/// Batch checker with parallel execution
pub struct BatchChecker {
    whitelist: Arc<IpWhitelist>,
    thread_pool: rayon::ThreadPool,
}

impl BatchChecker {
    /// Create a new batch checker
    ///
    /// # Arguments
    ///
    /// * `whitelist` - White-list to check against
    /// * `num_threads` - Number of threads (default: CPU cores)
    pub fn new(whitelist: Arc<IpWhitelist>, num_threads: Option<usize>) -> Result<Self> {
        let num_threads = num_threads.unwrap_or_else(num_cpus::get);

        let thread_pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build()?;

        Ok(Self {
            whitelist,
            thread_pool,
        })
    }

    /// Check a batch of address literals in parallel
    ///
    /// Results keep the input order.
    pub fn check(&self, addresses: Vec<String>) -> Vec<BatchResult> {
        let total = addresses.len();
        let processed = AtomicUsize::new(0);

        self.thread_pool.install(|| {
            addresses
                .into_par_iter()
                .map(|address| {
                    let valid = address.trim().parse::<IpAddr>().is_ok();
                    let whitelisted = valid && self.whitelist.is_whitelisted(&address);

                    let count = processed.fetch_add(1, Ordering::Relaxed) + 1;
                    if count % 1000 == 0 || count == total {
                        debug!("Checked {}/{} addresses", count, total);
                    }

                    BatchResult {
                        address,
                        valid,
                        whitelisted,
                    }
                })
                .collect()
        })
    }

    /// Get thread pool info
    pub fn thread_count(&self) -> usize {
        self.thread_pool.current_num_threads()
    }
}

/// Split input into address lines, dropping blanks and `#` comments
pub fn read_addresses(input: &str) -> Vec<String> {
    input
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}
