//! Firmware version strings
//!
//! `sys get ver`, `sys reset` and `sys factoryRESET` all answer with a
//! version string such as `RN2483 1.0.4 Mar 23 1991 13:37:00`.

use std::fmt;

use chrono::NaiveDateTime;

use crate::error::ParseError;

const RELEASE_TIME_FORMAT: &str = "%b %d %Y %H:%M:%S";

/// Device model reported in the version string
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DeviceSku {
    Rn2483,
    Rn2903,
    /// A model this library does not know about
    Other(String),
}

impl DeviceSku {
    fn parse(s: &str) -> Self {
        match s {
            "RN2483" => DeviceSku::Rn2483,
            "RN2903" => DeviceSku::Rn2903,
            other => DeviceSku::Other(other.to_string()),
        }
    }

    /// Name as reported by the device
    pub fn as_str(&self) -> &str {
        match self {
            DeviceSku::Rn2483 => "RN2483",
            DeviceSku::Rn2903 => "RN2903",
            DeviceSku::Other(s) => s,
        }
    }
}

/// A parsed firmware version string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirmwareVersion {
    /// The string exactly as reported
    pub raw: String,
    pub sku: DeviceSku,
    pub major: u32,
    pub minor: u32,
    pub revision: u32,
    /// When this firmware was built (device local time, no zone)
    pub release_time: NaiveDateTime,
}

impl FirmwareVersion {
    /// Parse a version string of the form `<sku> <major>.<minor>.<revision> <Mon DD YYYY HH:MM:SS>`
    pub fn parse(s: &str) -> Result<Self, ParseError> {
        let invalid = || ParseError::InvalidVersion(s.to_string());
        let tokens: Vec<&str> = s.split_whitespace().collect();

        // The SKU may contain spaces, so take the last version-shaped token
        // that still leaves a date after it.
        let at = (1..tokens.len().saturating_sub(1))
            .rev()
            .find(|&i| split_version(tokens[i]).is_some())
            .ok_or_else(invalid)?;
        let (major, minor, revision) = split_version(tokens[at]).ok_or_else(invalid)?;

        let date = tokens[at + 1..].join(" ");
        let release_time = NaiveDateTime::parse_from_str(&date, RELEASE_TIME_FORMAT)
            .map_err(|e| ParseError::InvalidVersion(format!("{s}: release date: {e}")))?;

        Ok(Self {
            raw: s.to_string(),
            sku: DeviceSku::parse(&tokens[..at].join(" ")),
            major,
            minor,
            revision,
            release_time,
        })
    }

    /// `major.minor.revision`
    pub fn version_string(&self) -> String {
        format!("{}.{}.{}", self.major, self.minor, self.revision)
    }

    /// Whether the SKU is one this library knows about
    pub fn is_known_sku(&self) -> bool {
        !matches!(self.sku, DeviceSku::Other(_))
    }
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn split_version(token: &str) -> Option<(u32, u32, u32)> {
    let mut parts = token.split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = parts.next()?.parse().ok()?;
    let revision = parts.next()?.parse().ok()?;
    parts.next().is_none().then_some((major, minor, revision))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_parse_version() {
        let v = FirmwareVersion::parse("RN2483 1.0.4 Mar 23 1991 13:37:00").unwrap();
        assert_eq!(v.raw, "RN2483 1.0.4 Mar 23 1991 13:37:00");
        assert_eq!(v.sku, DeviceSku::Rn2483);
        assert_eq!((v.major, v.minor, v.revision), (1, 0, 4));
        assert_eq!(v.version_string(), "1.0.4");
        assert_eq!(
            v.release_time,
            NaiveDate::from_ymd_opt(1991, 3, 23)
                .unwrap()
                .and_hms_opt(13, 37, 0)
                .unwrap()
        );
        assert!(v.is_known_sku());
    }

    #[test]
    fn test_unknown_sku() {
        let v = FirmwareVersion::parse("RN9999 2.1.0 Jan 01 2020 00:00:00").unwrap();
        assert_eq!(v.sku, DeviceSku::Other("RN9999".to_string()));
        assert!(!v.is_known_sku());
    }

    #[test]
    fn test_malformed_versions() {
        for s in [
            "",
            "RN2483",
            "RN2483 1.0.4",
            "RN2483 1.0 Mar 23 1991 13:37:00",
            "RN2483 1.0.4 not a date",
        ] {
            assert!(FirmwareVersion::parse(s).is_err(), "{s:?} should not parse");
        }
    }
}
