use serde::Serialize;
use serde_json::Value;

/// The error type for decoded messages that are not a usable payload.
#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    /// The decoded message is not valid JSON.
    #[error("payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The decoded message is JSON, but not an array.
    #[error("payload is not a JSON array")]
    NotArray,

    /// The payload array has no timestamp.
    #[error("no timestamp given")]
    Empty,

    /// The first element is not an integer Unix timestamp.
    #[error("timestamp is not an integer: {0}")]
    Timestamp(Value),
}

impl PartialEq for PayloadError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            // serde_json errors have no equality of their own
            (PayloadError::Json(a), PayloadError::Json(b)) => a.to_string() == b.to_string(),
            (PayloadError::NotArray, PayloadError::NotArray) => true,
            (PayloadError::Empty, PayloadError::Empty) => true,
            (PayloadError::Timestamp(a), PayloadError::Timestamp(b)) => a == b,
            _ => false,
        }
    }
}

/// The data carried by a verified token: an expiry timestamp followed by application values.
///
/// Serializes back to the JSON array it was decoded from.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Payload {
    #[serde(skip)]
    expiry: i64,
    values: Vec<Value>,
}

impl Payload {
    /// Decodes a JSON array whose first element is an integer Unix timestamp (seconds).
    ///
    /// ```rust
    /// use hmac_auth::Payload;
    ///
    /// let payload = Payload::decode(br#"[1587360010, "alice"]"#).unwrap();
    /// assert_eq!(payload.expiry(), 1587360010);
    /// assert_eq!(payload.data(), &["alice"]);
    /// ```
    pub fn decode(bytes: &[u8]) -> Result<Self, PayloadError> {
        let values = match serde_json::from_slice::<Value>(bytes)? {
            Value::Array(values) => values,
            _ => return Err(PayloadError::NotArray),
        };

        let first = values.first().ok_or(PayloadError::Empty)?;
        let expiry = first
            .as_i64()
            .ok_or_else(|| PayloadError::Timestamp(first.clone()))?;

        Ok(Payload { expiry, values })
    }

    /// Unix timestamp (seconds) after which the token is no longer accepted.
    pub fn expiry(&self) -> i64 {
        self.expiry
    }

    /// Application values following the timestamp.
    pub fn data(&self) -> &[Value] {
        &self.values[1..]
    }

    /// The whole decoded array, timestamp included.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Returns `true` while the payload is still valid at `now`. The expiry second itself is still valid.
    pub fn check_expiry(&self, now: i64) -> bool {
        self.expiry >= now
    }
}

/// Decodes `decoded` and checks its expiry, failing closed on anything that is not a payload.
pub fn check_expiry(decoded: &[u8], now: i64) -> bool {
    Payload::decode(decoded).is_ok_and(|payload| payload.check_expiry(now))
}
