//! IP range parsing and membership tests
//!
//! Provides utilities for working with white-listed IP ranges:
//! - Parse single addresses (e.g., "192.168.32.99" or "::1")
//! - Parse dashed ranges (e.g., "192.168.32.99-192.168.33.20")
//! - Parse CIDR notation (e.g., "10.30.77.0/24")
//! - Check if an address is in a range or in a list of ranges
//!
//! IPv4 and IPv6 are both supported. Bounds are kept as unsigned
//! big-endian integers, so ranges crossing octet or segment boundaries
//! compare correctly.
//!
//! # Examples
//!
//! ```
//! use ipcheck_range::IpRange;
//!
//! let range = IpRange::parse("192.168.32.99-192.168.33.20").unwrap();
//! assert!(range.contains("192.168.32.100"));
//! assert!(range.contains("192.168.33.19"));
//! assert!(!range.contains("192.168.34.0"));
//! assert!(!range.contains("::1"));
//! ```

use ipcheck_core::{from_numeric, to_numeric, AddressFamily, IpCheckError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, warn};

/// Range parsing errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RangeError {
    /// Nothing to parse
    #[error("Empty range specification")]
    Empty,

    /// Invalid IP address
    #[error("Invalid IP address: {0}")]
    InvalidAddress(String),

    /// Prefix length is not a decimal number
    #[error("Invalid prefix length: {0}")]
    InvalidPrefix(String),

    /// Prefix length too large for the address family
    #[error("Invalid prefix length: /{prefix} (must be 0-{max})")]
    PrefixOutOfRange { prefix: u32, max: u8 },

    /// Range end points from different families
    #[error("Mixed IPv4 and IPv6 addresses: {start}-{end}")]
    MixedFamilies { start: IpAddr, end: IpAddr },

    /// Range end point below its start point
    #[error("Wrong order: {end} precedes {start}")]
    WrongOrder { start: IpAddr, end: IpAddr },
}

pub type Result<T> = std::result::Result<T, RangeError>;

impl From<RangeError> for IpCheckError {
    fn from(err: RangeError) -> Self {
        IpCheckError::InvalidRange(err.to_string())
    }
}

/// Inclusive range of IP addresses of a single family
///
/// Built from a single address, a dashed range or a CIDR block. Immutable
/// once parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IpRange {
    family: AddressFamily,
    /// Inclusive start address
    lower: u128,
    /// Inclusive end address
    upper: u128,
}

impl IpRange {
    /// Parse a range specification
    ///
    /// # Arguments
    ///
    /// * `spec` - `"<ip>"`, `"<ip1>-<ip2>"` or `"<ip>/<prefix>"`
    ///
    /// An IPv4 end point may be shortened to its trailing octets, the
    /// missing ones are taken from the start point.
    ///
    /// # Examples
    ///
    /// ```
    /// use ipcheck_range::IpRange;
    ///
    /// let range = IpRange::parse("10.30.77.0/24").unwrap();
    /// assert_eq!(range.lower_bound().to_string(), "10.30.77.0");
    /// assert_eq!(range.upper_bound().to_string(), "10.30.77.255");
    ///
    /// let range = IpRange::parse("10.0.0.5-20").unwrap();
    /// assert_eq!(range.upper_bound().to_string(), "10.0.0.20");
    /// ```
    pub fn parse(spec: &str) -> Result<Self> {
        let spec = spec.trim();
        if spec.is_empty() {
            return Err(RangeError::Empty);
        }

        if let Some((addr, prefix)) = spec.split_once('/') {
            return Self::parse_cidr(addr, prefix);
        }

        if let Some((start, end)) = spec.split_once('-') {
            return Self::parse_dashed(start, end);
        }

        Ok(Self::single(parse_addr(spec)?))
    }

    /// Create a range holding exactly one address
    pub fn single(addr: IpAddr) -> Self {
        let (family, value) = to_numeric(addr);
        Self {
            family,
            lower: value,
            upper: value,
        }
    }

    /// Create a range from explicit inclusive bounds
    ///
    /// Both bounds must be of the same family and `start <= end`.
    pub fn new(start: IpAddr, end: IpAddr) -> Result<Self> {
        let (family, lower) = to_numeric(start);
        let (end_family, upper) = to_numeric(end);

        if family != end_family {
            return Err(RangeError::MixedFamilies { start, end });
        }

        if lower > upper {
            return Err(RangeError::WrongOrder { start, end });
        }

        Ok(Self {
            family,
            lower,
            upper,
        })
    }

    /// Create a range covering the subnet `addr/prefix_len`
    ///
    /// Host bits set in `addr` are ignored.
    pub fn cidr(addr: IpAddr, prefix_len: u8) -> Result<Self> {
        Self::with_prefix(addr, u32::from(prefix_len))
    }

    fn with_prefix(addr: IpAddr, prefix_len: u32) -> Result<Self> {
        let (family, value) = to_numeric(addr);
        if prefix_len > u32::from(family.bits()) {
            return Err(RangeError::PrefixOutOfRange {
                prefix: prefix_len,
                max: family.bits(),
            });
        }

        // Shifting a u128 by 128 overflows, a /128 has no host bits
        let host_mask = family.max_value().checked_shr(prefix_len).unwrap_or(0);
        let network = value & !host_mask;

        Ok(Self {
            family,
            lower: network,
            upper: network | host_mask,
        })
    }

    fn parse_cidr(addr: &str, prefix: &str) -> Result<Self> {
        let addr = parse_addr(addr)?;
        let prefix = prefix.trim();

        if prefix.is_empty() || !prefix.bytes().all(|b| b.is_ascii_digit()) {
            return Err(RangeError::InvalidPrefix(prefix.to_string()));
        }

        let prefix_len: u32 = prefix
            .parse()
            .map_err(|_| RangeError::InvalidPrefix(prefix.to_string()))?;

        Self::with_prefix(addr, prefix_len)
    }

    fn parse_dashed(start: &str, end: &str) -> Result<Self> {
        let start = parse_addr(start)?;
        let end = match start {
            IpAddr::V4(v4) => expand_ipv4_end(v4, end.trim())?,
            IpAddr::V6(_) => parse_addr(end)?,
        };

        Self::new(start, end)
    }

    /// Address family of the range
    pub fn family(&self) -> AddressFamily {
        self.family
    }

    /// Inclusive start address
    pub fn lower_bound(&self) -> IpAddr {
        from_numeric(self.family, self.lower)
    }

    /// Inclusive end address
    pub fn upper_bound(&self) -> IpAddr {
        from_numeric(self.family, self.upper)
    }

    /// Whether the range holds exactly one address
    pub fn is_single(&self) -> bool {
        self.lower == self.upper
    }

    /// Number of addresses in the range
    ///
    /// Saturates at `u128::MAX` for `::/0`.
    pub fn size(&self) -> u128 {
        (self.upper - self.lower).saturating_add(1)
    }

    /// Check if an address literal is in this range
    ///
    /// Malformed literals and addresses of the other family are never
    /// contained.
    ///
    /// # Arguments
    ///
    /// * `address` - IP address literal (e.g., "192.168.1.1")
    pub fn contains(&self, address: &str) -> bool {
        match address.trim().parse::<IpAddr>() {
            Ok(addr) => self.contains_addr(addr),
            Err(_) => false,
        }
    }

    /// Check if an address is in this range
    pub fn contains_addr(&self, addr: IpAddr) -> bool {
        let (family, value) = to_numeric(addr);
        family == self.family && self.lower <= value && value <= self.upper
    }
}

impl FromStr for IpRange {
    type Err = RangeError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for IpRange {
    type Error = RangeError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<IpRange> for String {
    fn from(range: IpRange) -> Self {
        range.to_string()
    }
}

impl fmt::Display for IpRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_single() {
            write!(f, "{}", self.lower_bound())
        } else {
            write!(f, "{}-{}", self.lower_bound(), self.upper_bound())
        }
    }
}

fn parse_addr(s: &str) -> Result<IpAddr> {
    let s = s.trim();
    s.parse()
        .map_err(|_| RangeError::InvalidAddress(s.to_string()))
}

/// Resolve the end point of an IPv4 dashed range
///
/// `"33.20"` after `192.168.32.99` becomes `192.168.33.20`.
fn expand_ipv4_end(start: Ipv4Addr, end: &str) -> Result<IpAddr> {
    let parts: Vec<&str> = end.split('.').collect();
    if end.contains(':') || parts.len() >= 4 {
        return parse_addr(end);
    }

    let mut octets = start.octets();
    let offset = octets.len() - parts.len();
    for (i, part) in parts.iter().enumerate() {
        octets[offset + i] =
            parse_octet(part).ok_or_else(|| RangeError::InvalidAddress(end.to_string()))?;
    }

    Ok(IpAddr::V4(Ipv4Addr::from(octets)))
}

fn parse_octet(s: &str) -> Option<u8> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if s.len() > 1 && s.starts_with('0') {
        return None;
    }
    s.parse().ok()
}

/// Parse a single range specification
///
/// Same as [`IpRange::parse`].
pub fn parse_range(spec: &str) -> Result<IpRange> {
    IpRange::parse(spec)
}

/// Entry of a configuration value that failed to parse
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedEntry {
    /// Entry text as configured
    pub entry: String,
    /// Why it was rejected
    pub error: RangeError,
}

/// Outcome of parsing a comma-separated list of ranges
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedList {
    /// Ranges that parsed
    pub ranges: Vec<IpRange>,
    /// Entries that were skipped
    pub rejected: Vec<RejectedEntry>,
}

/// Parse a list of ranges, keeping track of rejected entries
///
/// Entries are separated by commas or new lines; blank entries are
/// ignored. Invalid entries are logged and skipped, the remaining ones are
/// still returned.
pub fn parse_list_report(value: &str) -> ParsedList {
    let mut parsed = ParsedList::default();

    for entry in value
        .split([',', '\n'])
        .map(str::trim)
        .filter(|e| !e.is_empty())
    {
        match IpRange::parse(entry) {
            Ok(range) => parsed.ranges.push(range),
            Err(error) => {
                warn!(entry, %error, "Skipping invalid IP range");
                parsed.rejected.push(RejectedEntry {
                    entry: entry.to_string(),
                    error,
                });
            }
        }
    }

    parsed
}

/// Parse a comma-separated list of ranges, skipping invalid entries
///
/// # Examples
///
/// ```
/// use ipcheck_range::parse_list;
///
/// let ranges = parse_list("10.30.73.4, 10.30.77.0/24, 10.0.0.0/33");
/// assert_eq!(ranges.len(), 2);
/// ```
pub fn parse_list(value: &str) -> Vec<IpRange> {
    parse_list_report(value).ranges
}

/// Check if an address literal is in any of the ranges
///
/// Stops at the first matching range. An empty collection or a malformed
/// address yields `false`.
///
/// # Examples
///
/// ```
/// use ipcheck_range::{is_whitelisted_from_rate_limit, parse_list};
///
/// let ranges = parse_list("10.30.73.4,10.30.77.0/24,10.30.73.0/24");
/// assert!(is_whitelisted_from_rate_limit("10.30.73.4", &ranges));
/// assert!(!is_whitelisted_from_rate_limit("10.30.78.1", &ranges));
/// ```
pub fn is_whitelisted_from_rate_limit<'a, I>(address: &str, ranges: I) -> bool
where
    I: IntoIterator<Item = &'a IpRange>,
{
    match address.trim().parse::<IpAddr>() {
        Ok(addr) => is_whitelisted_addr(addr, ranges),
        Err(_) => {
            debug!(address, "Not an IP address, not white-listed");
            false
        }
    }
}

/// Check if an address is in any of the ranges
pub fn is_whitelisted_addr<'a, I>(addr: IpAddr, ranges: I) -> bool
where
    I: IntoIterator<Item = &'a IpRange>,
{
    ranges.into_iter().any(|range| range.contains_addr(addr))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_single_ipv4() {
        let range = IpRange::parse("192.168.32.99").unwrap();
        assert_eq!(range.family(), AddressFamily::V4);
        assert!(range.is_single());
        assert_eq!(range.size(), 1);
        assert!(range.contains("192.168.32.99"));
        assert!(!range.contains("192.168.32.98"));
        assert!(!range.contains("192.168.32.100"));
    }

    #[test]
    fn test_parse_single_ipv6() {
        let range = IpRange::parse("::1").unwrap();
        assert_eq!(range.family(), AddressFamily::V6);
        assert!(range.contains("::1"));
        assert!(range.contains("0:0:0:0:0:0:0:1"));
        assert!(!range.contains("::2"));
    }

    #[test]
    fn test_parse_trims_whitespace() {
        let range = IpRange::parse("  10.0.0.1 - 10.0.0.9 ").unwrap();
        assert!(range.contains("10.0.0.5"));
        assert!(range.contains(" 10.0.0.9 "));
    }

    #[test]
    fn test_parse_dashed_same_octet() {
        let range = IpRange::parse("192.168.32.100-192.168.32.200").unwrap();
        assert!(range.contains("192.168.32.150"));
        assert!(range.contains("192.168.32.100"));
        assert!(range.contains("192.168.32.200"));
        assert!(!range.contains("192.168.32.99"));
        assert!(!range.contains("192.168.32.201"));
        assert!(!range.contains("191.168.32.150"));
    }

    #[test]
    fn test_parse_dashed_cross_octet() {
        let range = IpRange::parse("192.168.32.99-192.168.33.20").unwrap();
        assert_eq!(range.lower_bound().to_string(), "192.168.32.99");
        assert_eq!(range.upper_bound().to_string(), "192.168.33.20");
        assert!(range.contains("192.168.32.100"));
        assert!(range.contains("192.168.32.255"));
        assert!(range.contains("192.168.33.0"));
        assert!(range.contains("192.168.33.19"));
        assert!(!range.contains("192.168.34.0"));
        assert!(!range.contains("192.168.32.98"));
    }

    #[test]
    fn test_parse_dashed_ipv6() {
        let range = IpRange::parse("::1-::128").unwrap();
        assert!(range.contains("::12"));
        assert!(range.contains("::24"));
        assert!(range.contains("::ff"));
        assert!(!range.contains("::168"));
        assert!(!range.contains("::"));
    }

    #[test]
    fn test_parse_dashed_abbreviated_end() {
        let range = IpRange::parse("10.0.0.5-20").unwrap();
        assert_eq!(range.upper_bound().to_string(), "10.0.0.20");

        let range = IpRange::parse("192.168.32.99-33.20").unwrap();
        assert_eq!(range.upper_bound().to_string(), "192.168.33.20");
        assert!(range.contains("192.168.33.1"));
    }

    #[test]
    fn test_parse_dashed_abbreviated_invalid() {
        assert!(matches!(
            IpRange::parse("10.0.0.5-256"),
            Err(RangeError::InvalidAddress(_))
        ));
        assert!(matches!(
            IpRange::parse("10.0.0.5-"),
            Err(RangeError::InvalidAddress(_))
        ));
        assert!(matches!(
            IpRange::parse("10.0.0.5-020"),
            Err(RangeError::InvalidAddress(_))
        ));
    }

    #[test]
    fn test_parse_dashed_abbreviated_end_does_not_carry() {
        // Inherited octets come from the start point as-is; a smaller
        // trailing octet is a reversed range, not a jump to the next block
        assert_eq!(
            IpRange::parse("192.168.32.99-20"),
            Err(RangeError::WrongOrder {
                start: "192.168.32.99".parse().unwrap(),
                end: "192.168.32.20".parse().unwrap(),
            })
        );
    }

    #[test]
    fn test_parse_dashed_mixed_families() {
        assert!(matches!(
            IpRange::parse("10.0.0.1-::1"),
            Err(RangeError::MixedFamilies { .. })
        ));
        assert!(matches!(
            IpRange::parse("::1-10.0.0.1"),
            Err(RangeError::MixedFamilies { .. })
        ));
    }

    #[test]
    fn test_parse_dashed_wrong_order() {
        assert!(matches!(
            IpRange::parse("192.168.33.20-192.168.32.99"),
            Err(RangeError::WrongOrder { .. })
        ));
        assert!(matches!(
            IpRange::parse("::128-::1"),
            Err(RangeError::WrongOrder { .. })
        ));
    }

    #[test]
    fn test_parse_cidr_ipv4() {
        let range = IpRange::parse("10.30.77.0/24").unwrap();
        assert_eq!(range.lower_bound().to_string(), "10.30.77.0");
        assert_eq!(range.upper_bound().to_string(), "10.30.77.255");
        assert_eq!(range.size(), 256);
        assert!(range.contains("10.30.77.42"));
        assert!(!range.contains("10.30.78.0"));
    }

    #[test]
    fn test_parse_cidr_masks_host_bits() {
        let range = IpRange::parse("10.30.73.4/24").unwrap();
        assert_eq!(range.lower_bound().to_string(), "10.30.73.0");
        assert_eq!(range.upper_bound().to_string(), "10.30.73.255");
    }

    #[test]
    fn test_parse_cidr_edges() {
        let all = IpRange::parse("0.0.0.0/0").unwrap();
        assert_eq!(all.size(), 1 << 32);
        assert!(all.contains("255.255.255.255"));
        assert!(!all.contains("::1"));

        let host = IpRange::parse("192.168.1.1/32").unwrap();
        assert!(host.is_single());

        let all_v6 = IpRange::parse("::/0").unwrap();
        assert_eq!(all_v6.size(), u128::MAX);
        assert!(all_v6.contains("ffff:ffff:ffff:ffff:ffff:ffff:ffff:ffff"));

        let host_v6 = IpRange::parse("2001:db8::1/128").unwrap();
        assert!(host_v6.is_single());
        assert!(host_v6.contains("2001:db8::1"));
    }

    #[test]
    fn test_parse_cidr_ipv6() {
        let range = IpRange::parse("2001:db8::/32").unwrap();
        assert_eq!(range.lower_bound().to_string(), "2001:db8::");
        assert_eq!(
            range.upper_bound().to_string(),
            "2001:db8:ffff:ffff:ffff:ffff:ffff:ffff"
        );
        assert!(range.contains("2001:db8:1234::1"));
        assert!(!range.contains("2001:db9::"));
    }

    #[test]
    fn test_parse_cidr_invalid_prefix() {
        assert_eq!(
            IpRange::parse("10.0.0.0/33"),
            Err(RangeError::PrefixOutOfRange { prefix: 33, max: 32 })
        );
        assert_eq!(
            IpRange::parse("::/129"),
            Err(RangeError::PrefixOutOfRange { prefix: 129, max: 128 })
        );
        assert!(matches!(
            IpRange::parse("10.0.0.0/"),
            Err(RangeError::InvalidPrefix(_))
        ));
        assert!(matches!(
            IpRange::parse("10.0.0.0/+8"),
            Err(RangeError::InvalidPrefix(_))
        ));
        assert!(matches!(
            IpRange::parse("10.0.0.0/-1"),
            Err(RangeError::InvalidPrefix(_))
        ));
        assert!(matches!(
            IpRange::parse("10.0.0.0/8/8"),
            Err(RangeError::InvalidPrefix(_))
        ));
    }

    #[test]
    fn test_parse_invalid() {
        assert_eq!(IpRange::parse(""), Err(RangeError::Empty));
        assert_eq!(IpRange::parse("   "), Err(RangeError::Empty));
        assert!(IpRange::parse("256.0.0.0").is_err());
        assert!(IpRange::parse("10.0.0").is_err());
        assert!(IpRange::parse("example.com").is_err());
        assert!(IpRange::parse(":::1").is_err());
    }

    #[test]
    fn test_cidr_constructor() {
        let range = IpRange::cidr("192.168.1.77".parse().unwrap(), 30).unwrap();
        assert_eq!(range.lower_bound().to_string(), "192.168.1.76");
        assert_eq!(range.upper_bound().to_string(), "192.168.1.79");
        assert!(IpRange::cidr("192.168.1.0".parse().unwrap(), 40).is_err());
    }

    #[test]
    fn test_contains_rejects_garbage() {
        let range = IpRange::parse("10.0.0.0/8").unwrap();
        assert!(!range.contains(""));
        assert!(!range.contains("10.0.0"));
        assert!(!range.contains("not an ip"));
        assert!(!range.contains("::ffff:10.0.0.1"));
    }

    #[test]
    fn test_parse_is_idempotent() {
        let a = IpRange::parse("192.168.32.99-192.168.33.20").unwrap();
        let b = IpRange::parse("192.168.32.99-192.168.33.20").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_display() {
        assert_eq!(IpRange::parse("10.0.0.1").unwrap().to_string(), "10.0.0.1");
        assert_eq!(
            IpRange::parse("10.0.0.0/30").unwrap().to_string(),
            "10.0.0.0-10.0.0.3"
        );
        assert_eq!(IpRange::parse("::1-::128").unwrap().to_string(), "::1-::128");
    }

    #[test]
    fn test_from_str() {
        let range: IpRange = "10.0.0.0/8".parse().unwrap();
        assert!(range.contains("10.255.0.1"));
    }

    #[test]
    fn test_serialization() {
        let range = IpRange::parse("10.30.77.0/24").unwrap();
        let json = serde_json::to_string(&range).expect("serialization failed");
        assert_eq!(json, "\"10.30.77.0-10.30.77.255\"");

        let back: IpRange = serde_json::from_str(&json).expect("deserialization failed");
        assert_eq!(back, range);

        assert!(serde_json::from_str::<IpRange>("\"10.0.0.0/33\"").is_err());
    }

    #[test]
    fn test_error_conversion() {
        let err: IpCheckError = RangeError::Empty.into();
        assert_eq!(err.to_string(), "Invalid range: Empty range specification");
    }

    #[test]
    fn test_parse_list_report() {
        let parsed = parse_list_report("10.30.73.4,, 10.30.77.0/24\n10.0.0.0/33,bogus");
        assert_eq!(parsed.ranges.len(), 2);
        assert_eq!(parsed.rejected.len(), 2);
        assert_eq!(parsed.rejected[0].entry, "10.0.0.0/33");
        assert_eq!(
            parsed.rejected[0].error,
            RangeError::PrefixOutOfRange { prefix: 33, max: 32 }
        );
        assert_eq!(parsed.rejected[1].entry, "bogus");
    }

    #[test]
    fn test_parse_list_empty() {
        assert!(parse_list("").is_empty());
        assert!(parse_list(" , ,\n").is_empty());
    }

    #[test]
    fn test_whitelisted() {
        let ranges = parse_list("10.30.73.4,10.30.77.0/24,10.30.73.0/24");
        assert_eq!(ranges.len(), 3);
        assert!(is_whitelisted_from_rate_limit("10.30.73.4", &ranges));
        assert!(is_whitelisted_from_rate_limit("10.30.73.200", &ranges));
        assert!(is_whitelisted_from_rate_limit("10.30.77.1", &ranges));
        assert!(!is_whitelisted_from_rate_limit("10.30.74.1", &ranges));
        assert!(!is_whitelisted_from_rate_limit("garbage", &ranges));
    }

    #[test]
    fn test_whitelisted_empty_collection() {
        let ranges: Vec<IpRange> = Vec::new();
        assert!(!is_whitelisted_from_rate_limit("10.30.73.4", &ranges));
    }
}
