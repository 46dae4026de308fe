use serde::Serialize;
use std::fmt;

/// Longest address the store accepts (`VARCHAR(128)`).
pub const MAX_ADDRESS_LEN: usize = 128;

/// Prefixes of the chain families whose addresses are accepted.
pub const ALLOWED_PREFIXES: [&str; 2] = ["0x", "osmo"];

/// A trimmed address that passed [`validate`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Address {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Validate and normalize a raw chain address.
///
/// The input is trimmed (including wrapping quotes) and cut to
/// [`MAX_ADDRESS_LEN`] characters before the checks. It is accepted only
/// when it is exactly 42 or 44 characters long and starts with one of
/// [`ALLOWED_PREFIXES`].
pub fn validate(raw: &str) -> Option<Address> {
    let trimmed = raw.trim().trim_matches(|c| c == '\'' || c == '"').trim();
    let clean: String = trimmed.chars().take(MAX_ADDRESS_LEN).collect();

    let len = clean.chars().count();
    if len != 42 && len != 44 {
        return None;
    }
    if !ALLOWED_PREFIXES.iter().any(|p| clean.starts_with(p)) {
        return None;
    }
    Some(Address(clean))
}

#[cfg(test)]
mod tests {
    use super::*;

    const EVM: &str = "0x6b175474e89094c44da98b954eedeac495271d0f";

    #[test]
    fn accepts_evm_address() {
        let addr = validate(EVM).unwrap();
        assert_eq!(addr.as_str(), EVM);
        assert_eq!(EVM.len(), 42);
    }

    #[test]
    fn accepts_44_char_osmo_address() {
        let raw = format!("osmo{}", "1".repeat(40));
        assert_eq!(raw.len(), 44);
        assert!(validate(&raw).is_some());
    }

    #[test]
    fn trims_whitespace_and_quotes() {
        let addr = validate(&format!("  '{}'\n", EVM)).unwrap();
        assert_eq!(addr.as_str(), EVM);
    }

    #[test]
    fn rejects_wrong_length() {
        assert!(validate("short").is_none());
        assert!(validate(&EVM[..41]).is_none());
        assert!(validate(&format!("{}0", EVM)).is_none()); // 43
    }

    #[test]
    fn rejects_unknown_prefix() {
        let solana_like = "So11111111111111111111111111111111111111112";
        assert!(validate(solana_like).is_none());
        assert!(validate(&format!("1x{}", &EVM[2..])).is_none());
    }

    #[test]
    fn truncation_happens_before_length_check() {
        // 200 chars truncate to 128, which is neither 42 nor 44.
        let long = format!("0x{}", "a".repeat(198));
        assert!(validate(&long).is_none());
    }

    #[test]
    fn acceptance_matches_length_and_prefix_rule() {
        for len in 0..=130usize {
            for prefix in ["0x", "osmo", "xx"] {
                let raw = if len >= prefix.len() {
                    format!("{}{}", prefix, "f".repeat(len - prefix.len()))
                } else {
                    continue;
                };
                let expected = (len == 42 || len == 44) && prefix != "xx";
                assert_eq!(validate(&raw).is_some(), expected, "len={} prefix={}", len, prefix);
            }
        }
    }
}
