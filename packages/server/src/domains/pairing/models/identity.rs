use std::fmt;

use phonenumber::Mode;

use crate::domains::pairing::errors::PairingError;

/// Shown to callers whose number fails validation
pub const INVALID_NUMBER_MESSAGE: &str =
    "Invalid phone number. Enter full international format without + (e.g., 263775000000)";

/// Domain suffix of a user's own messaging address
pub const USER_ADDRESS_DOMAIN: &str = "s.whatsapp.net";

/// Canonical phone identity: E.164 digits without the leading `+`.
///
/// Only constructed through [`Identity::parse`], so holding one means the
/// number passed validation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity(String);

impl Identity {
    /// Normalize and validate a caller-supplied number.
    pub fn parse(raw: &str) -> Result<Self, PairingError> {
        let digits = normalize_digits(raw);
        if digits.is_empty() {
            return Err(PairingError::InvalidIdentity);
        }

        let number = phonenumber::parse(None, format!("+{}", digits))
            .map_err(|_| PairingError::InvalidIdentity)?;
        if !number.is_valid() {
            return Err(PairingError::InvalidIdentity);
        }

        let e164 = number.format().mode(Mode::E164).to_string();
        Ok(Self(e164.trim_start_matches('+').to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The identity's own messaging address (self-delivery target).
    pub fn address(&self) -> String {
        format!("{}@{}", self.0, USER_ADDRESS_DOMAIN)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Strip everything that is not an ASCII digit.
pub fn normalize_digits(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_formatted_number_is_canonicalized() {
        let identity = Identity::parse("+263 775 000 000").unwrap();
        assert_eq!(identity.as_str(), "263775000000");
        assert_eq!(identity.address(), "263775000000@s.whatsapp.net");
    }

    #[test]
    fn test_punctuation_is_ignored() {
        let identity = Identity::parse("(263) 775-000-000").unwrap();
        assert_eq!(identity.as_str(), "263775000000");
    }

    #[test]
    fn test_short_number_is_rejected() {
        assert!(matches!(
            Identity::parse("123"),
            Err(PairingError::InvalidIdentity)
        ));
    }

    #[test]
    fn test_empty_and_symbol_only_input_is_rejected() {
        assert!(Identity::parse("").is_err());
        assert!(Identity::parse("+-() ").is_err());
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let once = normalize_digits("+1 (415) 555-2671");
        assert_eq!(once, "14155552671");
        assert_eq!(normalize_digits(&once), once);
    }

    #[test]
    fn test_us_number_is_valid() {
        let identity = Identity::parse("1 (201) 555-0123").unwrap();
        assert_eq!(identity.to_string(), "12015550123");
    }
}
