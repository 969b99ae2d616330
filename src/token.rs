//! Parsing of raw `message--digest` tokens.

use std::str::FromStr;

use base64::{engine::general_purpose, Engine};

/// Separator between the base64 message and its hex digest.
pub const DELIMITER: &str = "--";

/// The error type for tokens that cannot be split into a message and a digest.
#[derive(Debug, PartialEq, thiserror::Error)]
pub enum ParseError {
    /// The token did not contain exactly one `--` delimiter.
    #[error("malformed token structure")]
    Structure,

    /// The message component is not valid standard base64.
    #[error("invalid encoding: {0}")]
    Encoding(#[from] base64::DecodeError),
}

/// A token split into its signed message and the digest claimed for it.
///
/// Nothing about a [SignedToken] is trusted until [crate::KeySet::is_valid] has accepted it.
#[derive(Debug, Clone, PartialEq)]
pub struct SignedToken {
    message: String,
    digest: String,
    decoded: Vec<u8>,
}

impl SignedToken {
    /// Parses `raw` into a [SignedToken].
    ///
    /// ```rust
    /// use hmac_auth::SignedToken;
    ///
    /// let token = SignedToken::parse("InRlc3Qi--3dd740af30f0453dd5220b56ba4fe57f48f892af").unwrap();
    /// assert_eq!(token.message(), "InRlc3Qi");
    /// assert_eq!(token.decoded(), b"\"test\"");
    /// ```
    pub fn parse(raw: &str) -> Result<Self, ParseError> {
        if raw == DELIMITER {
            return Err(ParseError::Structure);
        }
        let (message, digest) = raw.split_once(DELIMITER).ok_or(ParseError::Structure)?;
        if digest.contains(DELIMITER) {
            return Err(ParseError::Structure);
        }

        let decoded = general_purpose::STANDARD.decode(message)?;

        Ok(SignedToken {
            message: message.to_owned(),
            digest: digest.to_owned(),
            decoded,
        })
    }

    /// The base64 text the digest was computed over.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The hex digest carried by the token, as received.
    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// The decoded message bytes.
    pub fn decoded(&self) -> &[u8] {
        &self.decoded
    }

    /// The decoded message as text, if it is valid UTF-8.
    pub fn decoded_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.decoded).ok()
    }
}

impl FromStr for SignedToken {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SignedToken::parse(s)
    }
}
