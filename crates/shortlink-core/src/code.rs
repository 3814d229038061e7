use crate::error::StorageError;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Characters allowed in a short code besides ASCII alphanumerics.
///
/// Together with `[A-Za-z0-9]` this is the set of characters that may appear
/// unescaped in a URL path segment, so a code never needs percent-encoding.
const EXTRA_CHARS: &[char] = &[
    '-', '.', '_', '~', '!', '$', '&', '\'', '(', ')', '*', '+', ',', ';', '=', ':', '@',
];

/// A validated short code identifying a redirect target.
///
/// Codes are non-empty and contain only characters matching
/// `[A-Za-z0-9\-._~!$&'()*+,;=:@]`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Code(String);

impl Code {
    /// Creates a new `Code` after validating the input.
    pub fn new(code: impl Into<String>) -> std::result::Result<Self, StorageError> {
        let code = code.into();
        if !Self::is_valid(&code) {
            return Err(StorageError::InvalidCode(code));
        }
        Ok(Self(code))
    }

    /// Creates a `Code` without validation.
    ///
    /// Use this only for codes from trusted internal sources, such as keys
    /// that already passed the migration pass.
    pub fn new_unchecked(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// Returns the code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the code, returning the inner string.
    pub fn into_string(self) -> String {
        self.0
    }

    /// Checks whether a string satisfies the code-format invariant.
    pub fn is_valid(code: &str) -> bool {
        !code.is_empty()
            && code
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || EXTRA_CHARS.contains(&c))
    }

    /// Checks whether a raw stored key satisfies the code-format invariant.
    ///
    /// Keys that are not valid UTF-8 can never be valid codes. Used by the
    /// migration pass, which scans keys as they exist on disk.
    pub fn is_valid_bytes(key: &[u8]) -> bool {
        std::str::from_utf8(key).is_ok_and(Self::is_valid)
    }
}

impl Display for Code {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_codes() {
        assert!(Code::new("abc123").is_ok());
        assert!(Code::new("a").is_ok());
        assert!(Code::new("Abc-123_xyz").is_ok());
        assert!(Code::new("~!$&'()*+,;=:@").is_ok());
        assert!(Code::new("some.dotted.code").is_ok());
    }

    #[test]
    fn empty_code() {
        assert!(Code::new("").is_err());
    }

    #[test]
    fn invalid_characters() {
        assert!(Code::new("abc def").is_err());
        assert!(Code::new("abc/def").is_err());
        assert!(Code::new("abc#def").is_err());
        assert!(Code::new("abc?def").is_err());
        assert!(Code::new("bad key!").is_err());
        assert!(Code::new("schlüssel").is_err());
    }

    #[test]
    fn invalid_code_error_carries_input() {
        let err = Code::new("bad key!").unwrap_err();
        assert!(matches!(err, StorageError::InvalidCode(ref c) if c == "bad key!"));
    }

    #[test]
    fn raw_key_validation() {
        assert!(Code::is_valid_bytes(b"abc123"));
        assert!(!Code::is_valid_bytes(b"bad key!"));
        assert!(!Code::is_valid_bytes(b""));
        // Not UTF-8, so never a valid code.
        assert!(!Code::is_valid_bytes(&[0xff, 0xfe, 0x61]));
    }

    #[test]
    fn display_round_trip() {
        let code = Code::new("my-code").unwrap();
        assert_eq!(code.to_string(), "my-code");
        assert_eq!(code.as_str(), "my-code");
    }
}
