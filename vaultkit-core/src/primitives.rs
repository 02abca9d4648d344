//! Parsing of primitive values from user input.

use std::str::FromStr;

use alloy_primitives::{Address, Bytes, B256, U256};

use crate::error::VaultError;

/// Parses primitive types from user provided strings (CLI flags, JSON configs).
///
/// Failures are reported as `InvalidInput` naming the offending attribute.
///
/// # Examples
/// ```rust
/// use alloy_primitives::Address;
/// use vaultkit_core::primitives::ParseFromString;
///
/// let vault = Address::parse_from_str("0x8D29bE29923b68abfDD21e541b9374737B49cdAD", "vault").unwrap();
/// assert!(Address::parse_from_str("0x1234", "vault").is_err());
/// ```
pub trait ParseFromString: Sized {
    /// Parses `s`, naming `attr` in the error.
    ///
    /// # Errors
    /// `InvalidInput` if `s` is not a valid value.
    fn parse_from_str(s: &str, attr: &'static str) -> Result<Self, VaultError>;

    /// Parses `s` if present.
    ///
    /// # Errors
    /// `InvalidInput` if `s` is present and not a valid value.
    fn parse_from_str_optional(
        s: Option<&str>,
        attr: &'static str,
    ) -> Result<Option<Self>, VaultError> {
        s.map(|s| Self::parse_from_str(s, attr)).transpose()
    }
}

fn invalid(attr: &'static str, reason: impl ToString) -> VaultError {
    VaultError::InvalidInput {
        attribute: attr.to_string(),
        reason: reason.to_string(),
    }
}

impl ParseFromString for Address {
    fn parse_from_str(s: &str, attr: &'static str) -> Result<Self, VaultError> {
        Self::from_str(s.trim()).map_err(|e| invalid(attr, e))
    }
}

impl ParseFromString for B256 {
    fn parse_from_str(s: &str, attr: &'static str) -> Result<Self, VaultError> {
        Self::from_str(s.trim()).map_err(|e| invalid(attr, e))
    }
}

impl ParseFromString for U256 {
    /// Accepts decimal and `0x`-prefixed hexadecimal.
    fn parse_from_str(s: &str, attr: &'static str) -> Result<Self, VaultError> {
        Self::from_str(s.trim()).map_err(|e| invalid(attr, e))
    }
}

impl ParseFromString for Bytes {
    /// Accepts hex with or without `0x`; the empty string is empty bytes.
    fn parse_from_str(s: &str, attr: &'static str) -> Result<Self, VaultError> {
        let s = s.trim();
        let digits = s.strip_prefix("0x").unwrap_or(s);
        hex::decode(digits)
            .map(Self::from)
            .map_err(|e| invalid(attr, e))
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::{address, bytes};

    use super::*;

    #[test]
    fn test_parse_address() {
        assert_eq!(
            Address::parse_from_str(" 0x8D29bE29923b68abfDD21e541b9374737B49cdAD ", "to").unwrap(),
            address!("0x8D29bE29923b68abfDD21e541b9374737B49cdAD")
        );
        let err = Address::parse_from_str("vault", "to").unwrap_err();
        assert!(matches!(err, VaultError::InvalidInput { attribute, .. } if attribute == "to"));
    }

    #[test]
    fn test_parse_integers_and_bytes() {
        assert_eq!(U256::parse_from_str("1000", "value").unwrap(), U256::from(1000));
        assert_eq!(U256::parse_from_str("0x10", "value").unwrap(), U256::from(16));
        assert_eq!(Bytes::parse_from_str("0xbeef", "data").unwrap(), bytes!("0xbeef"));
        assert_eq!(Bytes::parse_from_str("", "data").unwrap(), Bytes::new());
        assert!(Bytes::parse_from_str("0xbee", "data").is_err());
    }

    #[test]
    fn test_parse_optional() {
        assert_eq!(B256::parse_from_str_optional(None, "digest").unwrap(), None);
        assert_eq!(
            B256::parse_from_str_optional(Some(&format!("{}", B256::ZERO)), "digest").unwrap(),
            Some(B256::ZERO)
        );
    }
}
