//! Disk size parsing.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

const DISK_SIZE_PATTERN: &str = r"^(?i)(\d+)([BKMGTPE]?)(ib|b)?$";

const GIB: u64 = 1024 * 1024 * 1024;

/// A parsed disk capacity in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DiskSize(u64);

impl DiskSize {
    /// Creates a disk size from a byte count.
    #[must_use]
    pub const fn from_bytes(bytes: u64) -> Self {
        Self(bytes)
    }

    /// Creates a disk size from whole GiB.
    #[must_use]
    pub const fn from_gib(gib: u64) -> Self {
        Self(gib * GIB)
    }

    /// Returns the capacity in bytes.
    #[must_use]
    pub const fn bytes(self) -> u64 {
        self.0
    }

    /// Returns the capacity in KiB, as the endpoint's disk spec expects.
    #[must_use]
    pub const fn kib(self) -> u64 {
        self.0 / 1024
    }

    /// Parses sizes like `20`, `20G`, `20GiB`, `512M` or `1t`.
    ///
    /// A bare number is read as GiB.
    pub fn parse(input: &str) -> Result<Self, String> {
        let re = Regex::new(DISK_SIZE_PATTERN).map_err(|e| e.to_string())?;
        let trimmed = input.trim();
        let caps = re
            .captures(trimmed)
            .ok_or_else(|| format!("Invalid disk size '{input}': expected a number with an optional B/K/M/G/T/P/E suffix"))?;

        let value: u64 = caps[1]
            .parse()
            .map_err(|e| format!("Invalid disk size '{input}': {e}"))?;

        let unit = caps
            .get(2)
            .map(|m| m.as_str().to_ascii_uppercase())
            .unwrap_or_default();
        let multiplier: u64 = match unit.as_str() {
            "" | "G" => GIB,
            "B" => 1,
            "K" => 1024,
            "M" => 1024 * 1024,
            "T" => GIB * 1024,
            "P" => GIB * 1024 * 1024,
            "E" => GIB * 1024 * 1024 * 1024,
            other => return Err(format!("Invalid disk size unit '{other}'")),
        };

        let bytes = value
            .checked_mul(multiplier)
            .ok_or_else(|| format!("Disk size '{input}' is too large"))?;
        if bytes == 0 {
            return Err("Disk size must be greater than zero".to_string());
        }
        Ok(Self(bytes))
    }
}

impl fmt::Display for DiskSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 % GIB == 0 {
            write!(f, "{}GiB", self.0 / GIB)
        } else {
            write!(f, "{}B", self.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_number_is_gib() {
        assert_eq!(DiskSize::parse("20").unwrap(), DiskSize::from_gib(20));
    }

    #[test]
    fn test_suffixes() {
        assert_eq!(DiskSize::parse("20G").unwrap(), DiskSize::from_gib(20));
        assert_eq!(DiskSize::parse("20gib").unwrap(), DiskSize::from_gib(20));
        assert_eq!(DiskSize::parse("512M").unwrap().bytes(), 512 * 1024 * 1024);
        assert_eq!(DiskSize::parse("1T").unwrap(), DiskSize::from_gib(1024));
        assert_eq!(DiskSize::parse("2048KB").unwrap().kib(), 2048);
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(DiskSize::parse("").is_err());
        assert!(DiskSize::parse("twenty").is_err());
        assert!(DiskSize::parse("20 GB extra").is_err());
        assert!(DiskSize::parse("0").is_err());
    }

    #[test]
    fn test_overflow_rejected() {
        assert!(DiskSize::parse("99999999999E").is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(DiskSize::from_gib(40).to_string(), "40GiB");
        assert_eq!(DiskSize::from_bytes(1000).to_string(), "1000B");
    }
}
