//! Core types for ipcheck
//!
//! This crate provides the foundational types shared by the ipcheck crates:
//! - [`AddressFamily`] - IPv4 or IPv6
//! - [`to_numeric`] / [`from_numeric`] - addresses as unsigned big-endian integers
//! - [`IpCheckError`] - Error types
//!
//! ```
//! use ipcheck_core::{to_numeric, AddressFamily};
//!
//! let (family, value) = to_numeric("192.168.1.1".parse().unwrap());
//! assert_eq!(family, AddressFamily::V4);
//! assert_eq!(value, 0xC0A80101);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use thiserror::Error;

/// Address family of an IP address
///
/// Determines the bit width and the textual notation of an address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressFamily {
    /// 32-bit dotted-quad addresses
    V4,
    /// 128-bit colon-hex addresses
    V6,
}

impl AddressFamily {
    /// Family of the given address
    pub fn of(addr: &IpAddr) -> Self {
        match addr {
            IpAddr::V4(_) => AddressFamily::V4,
            IpAddr::V6(_) => AddressFamily::V6,
        }
    }

    /// Bit width of an address in this family
    pub fn bits(self) -> u8 {
        match self {
            AddressFamily::V4 => 32,
            AddressFamily::V6 => 128,
        }
    }

    /// Highest numeric address of this family (all bits set)
    ///
    /// ```
    /// use ipcheck_core::AddressFamily;
    ///
    /// assert_eq!(AddressFamily::V4.max_value(), 0xFFFF_FFFF);
    /// assert_eq!(AddressFamily::V6.max_value(), u128::MAX);
    /// ```
    pub fn max_value(self) -> u128 {
        match self {
            AddressFamily::V4 => u128::from(u32::MAX),
            AddressFamily::V6 => u128::MAX,
        }
    }
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressFamily::V4 => write!(f, "IPv4"),
            AddressFamily::V6 => write!(f, "IPv6"),
        }
    }
}

/// Convert an address to its family and unsigned big-endian value
///
/// IPv4 addresses occupy the low 32 bits of the returned value.
pub fn to_numeric(addr: IpAddr) -> (AddressFamily, u128) {
    match addr {
        IpAddr::V4(v4) => (AddressFamily::V4, u128::from(u32::from(v4))),
        IpAddr::V6(v6) => (AddressFamily::V6, u128::from(v6)),
    }
}

/// Convert a numeric value back to an address of the given family
///
/// For IPv4 only the low 32 bits are used.
pub fn from_numeric(family: AddressFamily, value: u128) -> IpAddr {
    match family {
        AddressFamily::V4 => IpAddr::V4(Ipv4Addr::from((value & family.max_value()) as u32)),
        AddressFamily::V6 => IpAddr::V6(Ipv6Addr::from(value)),
    }
}

/// Error types for ipcheck operations
#[derive(Error, Debug)]
pub enum IpCheckError {
    /// Invalid IP address literal
    #[error("Invalid IP address: {0}")]
    InvalidAddress(String),

    /// Invalid range specification
    #[error("Invalid range: {0}")]
    InvalidRange(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for ipcheck operations
pub type Result<T> = std::result::Result<T, IpCheckError>;
