//! White-list configuration
//!
//! The white-list is a single comma-separated value. It is read from the
//! `IPCHECK_WHITELIST` environment variable or from a text file.

use ipcheck_core::{IpCheckError, Result};
use ipcheck_range::{parse_list_report, ParsedList};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use tracing::warn;

/// Environment variable holding the white-list
pub const WHITELIST_ENV: &str = "IPCHECK_WHITELIST";

/// Raw white-list configuration value
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhitelistConfig {
    /// Comma-separated range specifications
    pub value: String,
}

impl WhitelistConfig {
    /// Use a literal configuration value
    pub fn from_value(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }

    /// Read the white-list from `IPCHECK_WHITELIST`
    pub fn from_env() -> Result<Self> {
        Self::from_env_var(WHITELIST_ENV)
    }

    /// Read the white-list from the named environment variable
    pub fn from_env_var(name: &str) -> Result<Self> {
        match env::var(name) {
            Ok(value) => Ok(Self::from_value(value)),
            Err(env::VarError::NotPresent) => {
                Err(IpCheckError::Config(format!("{} not set", name)))
            }
            Err(env::VarError::NotUnicode(_)) => Err(IpCheckError::Config(format!(
                "{} is not valid UTF-8",
                name
            ))),
        }
    }

    /// Read `IPCHECK_WHITELIST`, treating a missing variable as an empty white-list
    ///
    /// A variable that is set but unreadable is still an error.
    pub fn from_env_or_default() -> Result<Self> {
        Self::from_env_var_or_default(WHITELIST_ENV)
    }

    /// Read the named environment variable, treating a missing variable as an empty white-list
    pub fn from_env_var_or_default(name: &str) -> Result<Self> {
        match env::var_os(name) {
            None => Ok(Self::default()),
            Some(_) => Self::from_env_var(name).map_err(|err| {
                warn!(variable = name, %err, "Unreadable white-list variable");
                err
            }),
        }
    }

    /// Read the white-list from a text file
    ///
    /// Entries are separated by commas or new lines. `#` starts a comment
    /// that runs to the end of the line.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let value = content
            .lines()
            .map(|line| line.split('#').next().unwrap_or("").trim())
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join(",");

        Ok(Self { value })
    }

    /// Whether no entries are configured
    pub fn is_empty(&self) -> bool {
        self.value.trim().is_empty()
    }

    /// Parse the configured entries
    pub fn parse(&self) -> ParsedList {
        parse_list_report(&self.value)
    }
}
