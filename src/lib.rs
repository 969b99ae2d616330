#![warn(missing_docs)]
//!
//! This crate verifies signed, expiring tokens of the form `base64(payload)--hex(HMAC-SHA1(key, base64(payload)))`, the format produced by Rails' [ActiveSupport::MessageVerifier](https://api.rubyonrails.org/classes/ActiveSupport/MessageVerifier.html) for tamper-evident links and cookies. The payload is a JSON array whose first element is the Unix timestamp after which the token expires.
//!
//! Only verification is implemented. Issue tokens from the application that owns the keys.
//!
//! ## Usage
//!
//! Add `hmac-auth` to your dependencies in your project's Cargo.toml. The `axum` feature (on by default) provides [middleware::require_token] for guarding routes.
//!
//! ```toml
//! [dependencies]
//! hmac-auth = "latest"
//! ```
//!
use serde::Deserialize;
use tracing::{debug, warn};

mod keys;
#[cfg(feature = "axum")]
pub mod middleware;
mod payload;
mod token;

pub use keys::KeySet;
pub use payload::{check_expiry, Payload, PayloadError};
pub use token::{ParseError, SignedToken, DELIMITER};

/// Name of the request parameter read when none is configured.
pub const DEFAULT_PARAM: &str = "token";

/// HmacAuth is the main entry point you'll be working with. Create with [HmacAuth::new] or from a [Config].
#[derive(Debug)]
pub struct HmacAuth {
    keys: KeySet,
    param: String,
}

/// Settings for an [HmacAuth], deserializable from any serde source.
///
/// ```rust
/// use hmac_auth::{Config, HmacAuth};
///
/// let config: Config = serde_json::from_str(r#"{"keys": ["current", "previous"]}"#).unwrap();
/// let auth = HmacAuth::try_from(config).unwrap();
/// assert_eq!(auth.param(), "token");
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Accepted secret keys, tried in order.
    pub keys: Vec<String>,

    /// Query or form parameter carrying the token.
    #[serde(default = "default_param")]
    pub param: String,
}

fn default_param() -> String {
    DEFAULT_PARAM.to_owned()
}

/// The error type for an [HmacAuth] that cannot be constructed.
#[derive(Debug, PartialEq, thiserror::Error)]
pub enum ConfigError {
    /// No secret keys were supplied.
    #[error("at least one key is required")]
    NoKeys,

    /// The parameter name is empty.
    #[error("parameter name must not be empty")]
    EmptyParam,
}

/// The error type for rejected tokens.
///
/// Every variant maps to the same unauthorized response; the variants only exist for diagnostics.
#[derive(Debug, PartialEq, thiserror::Error)]
pub enum AuthError {
    /// The request did not carry exactly one token parameter.
    #[error("missing token")]
    MissingToken,

    /// The token could not be split into message and digest. See associated [ParseError] for details.
    #[error("malformed token: {0}")]
    MalformedToken(#[from] ParseError),

    /// No configured key produced the token's digest.
    #[error("invalid signature")]
    InvalidSignature,

    /// The signed message is not a payload with a timestamp. See associated [PayloadError] for details.
    #[error("malformed payload: {0}")]
    MalformedPayload(#[from] PayloadError),

    /// The payload expired at `expiry`, before `now`.
    #[error("token expired at {expiry} (now {now})")]
    Expired {
        /// Expiry timestamp carried by the token.
        expiry: i64,
        /// Clock reading the token was checked against.
        now: i64,
    },
}

impl AuthError {
    /// Short, stable name of the failure for log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            AuthError::MissingToken => "missing_token",
            AuthError::MalformedToken(_) => "malformed_token",
            AuthError::InvalidSignature => "invalid_signature",
            AuthError::MalformedPayload(_) => "malformed_payload",
            AuthError::Expired { .. } => "expired",
        }
    }
}

impl HmacAuth {
    /// Creates a new [HmacAuth] accepting tokens signed with any of `keys`, read from the request parameter `param`.
    pub fn new<I, K>(keys: I, param: impl Into<String>) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = K>,
        K: AsRef<[u8]>,
    {
        let keys = KeySet::new(keys);
        if keys.is_empty() {
            return Err(ConfigError::NoKeys);
        }

        let param = param.into();
        if param.is_empty() {
            return Err(ConfigError::EmptyParam);
        }

        Ok(HmacAuth { keys, param })
    }

    /// The configured keys.
    pub fn keys(&self) -> &KeySet {
        &self.keys
    }

    /// Name of the request parameter carrying the token.
    pub fn param(&self) -> &str {
        &self.param
    }

    /// Verify a token against the current time. When successful, the resulting [Payload] holds the token's data.
    ///
    /// ```rust
    /// use hmac_auth::{AuthError, HmacAuth};
    ///
    /// let auth = HmacAuth::new(["testkey"], "token").unwrap();
    ///
    /// // ["4102444800"] carries its timestamp as a string
    /// let result = auth.verify("WyI0MTAyNDQ0ODAwIl0=--4c64118ea3d63f2ba42827224c6b0f956541b0ad");
    /// assert!(matches!(result, Err(AuthError::MalformedPayload(_))));
    ///
    /// // [4102444800] expires in 2100
    /// let payload = auth.verify("WzQxMDI0NDQ4MDBd--cd5781defae3ff6d63f12e8dfe7ca22bf9a8931c").unwrap();
    /// assert_eq!(payload.expiry(), 4102444800);
    /// ```
    pub fn verify(&self, raw: &str) -> Result<Payload, AuthError> {
        self.verify_at(raw, chrono::Utc::now().timestamp())
    }

    /// Verify a token against the clock reading `now` (Unix seconds).
    pub fn verify_at(&self, raw: &str, now: i64) -> Result<Payload, AuthError> {
        let token = SignedToken::parse(raw)?;

        if !self.keys.is_valid(&token) {
            return Err(AuthError::InvalidSignature);
        }

        let payload = Payload::decode(token.decoded())?;
        if !payload.check_expiry(now) {
            return Err(AuthError::Expired {
                expiry: payload.expiry(),
                now,
            });
        }

        Ok(payload)
    }

    /// Authenticate the values a request supplied for the token parameter, and hand the payload to `continuation` if it is accepted.
    ///
    /// `values` holds every value found for [HmacAuth::param]; anything but exactly one is rejected. The continuation is never called for a rejected token.
    ///
    /// ```rust
    /// use hmac_auth::{AuthError, HmacAuth};
    ///
    /// let auth = HmacAuth::new(["testkey"], "token").unwrap();
    /// let token = "WzE1ODczNjAwMTBd--de4702a95398d2305d52ddb0ec37b68ef80f92f6";
    ///
    /// let expiry = auth.authenticate(&[token], 1_000_000_000, |payload| payload.expiry());
    /// assert_eq!(expiry, Ok(1587360010));
    ///
    /// let expired = auth.authenticate(&[token], 2_000_000_000, |payload| payload.expiry());
    /// assert!(matches!(expired, Err(AuthError::Expired { .. })));
    /// ```
    pub fn authenticate<S, F, R>(&self, values: &[S], now: i64, continuation: F) -> Result<R, AuthError>
    where
        S: AsRef<str>,
        F: FnOnce(Payload) -> R,
    {
        let result = match values {
            [raw] => self.verify_at(raw.as_ref(), now),
            _ => Err(AuthError::MissingToken),
        };

        match result {
            Ok(payload) => {
                debug!(param = %self.param, expiry = payload.expiry(), "token accepted");
                Ok(continuation(payload))
            }
            Err(err) => {
                warn!(param = %self.param, reason = err.kind(), values = values.len(), "token rejected: {}", err);
                Err(err)
            }
        }
    }
}

impl TryFrom<Config> for HmacAuth {
    type Error = ConfigError;

    fn try_from(config: Config) -> Result<Self, Self::Error> {
        HmacAuth::new(&config.keys, config.param)
    }
}
