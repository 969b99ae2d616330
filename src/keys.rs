use std::fmt;

use hmac::{Hmac, Mac};
use sha1::Sha1;
use subtle::ConstantTimeEq;

use crate::token::SignedToken;

type HmacSha1 = Hmac<Sha1>;

/// The secret keys a token may be signed with.
///
/// A token is accepted when any one key produces its digest, so a rotation is done by
/// configuring the old and the new key together until the old tokens have expired.
#[derive(Clone, Default)]
pub struct KeySet {
    keys: Vec<Vec<u8>>,
}

impl KeySet {
    /// Creates a [KeySet] from keys in the order they should be tried.
    pub fn new<I, K>(keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: AsRef<[u8]>,
    {
        KeySet {
            keys: keys.into_iter().map(|k| k.as_ref().to_vec()).collect(),
        }
    }

    /// Number of configured keys.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Returns `true` when no keys are configured. Such a set accepts nothing.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Checks the digest of `token` against every key.
    ///
    /// ```rust
    /// use hmac_auth::{KeySet, SignedToken};
    ///
    /// let token = SignedToken::parse("InRlc3Qi--3dd740af30f0453dd5220b56ba4fe57f48f892af").unwrap();
    /// assert!(KeySet::new(["testkey"]).is_valid(&token));
    /// assert!(!KeySet::new(["wrongkey"]).is_valid(&token));
    /// ```
    pub fn is_valid(&self, token: &SignedToken) -> bool {
        let claimed = token.digest().as_bytes();
        self.keys.iter().any(|key| {
            let expected = digest(key, token.message());
            bool::from(expected.as_bytes().ct_eq(claimed))
        })
    }
}

// Key bytes stay out of logs and panic messages.
impl fmt::Debug for KeySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeySet").field("len", &self.keys.len()).finish()
    }
}

/// Lowercase hex HMAC-SHA1 of `message` under `key`.
pub(crate) fn digest(key: &[u8], message: &str) -> String {
    let mut mac = HmacSha1::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(message.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    use base64::{engine::general_purpose, Engine};

    fn sign(key: &str, payload: &[u8]) -> String {
        let message = general_purpose::STANDARD.encode(payload);
        let mac = digest(key.as_bytes(), &message);
        format!("{}--{}", message, mac)
    }

    fn parse(raw: &str) -> SignedToken {
        SignedToken::parse(raw).unwrap()
    }

    #[test]
    fn expected_hmac_value() {
        assert_eq!(
            digest(b"testkey", "InRlc3Qi"),
            "3dd740af30f0453dd5220b56ba4fe57f48f892af"
        );
    }

    #[test]
    fn message_verifier_token() {
        let keys = KeySet::new(["testkey", "othertestkey"]);
        let token = parse("WyIxNTg3MzYwMDEwIl0=--af40819c97a2a5d86d0e3222f5aada76ac3af397");

        assert!(keys.is_valid(&token));
    }

    #[test]
    fn alternate_key_succeeds() {
        let keys = KeySet::new(["testkey", "othertestkey"]);
        let token = parse("WzE1MzUwMzc5MTNd--84081843e19ace8210ddb70ac27e401c44c01781");

        assert!(keys.is_valid(&token));
        assert!(!KeySet::new(["testkey"]).is_valid(&token));
    }

    #[test]
    fn wrong_key_fails() {
        let token = parse("InRlc3Qi--3dd740af30f0453dd5220b56ba4fe57f48f892af");

        assert!(KeySet::new(["testkey"]).is_valid(&token));
        assert!(!KeySet::new(["wrongkey"]).is_valid(&token));
    }

    #[test]
    fn empty_set_accepts_nothing() {
        let token = parse("InRlc3Qi--3dd740af30f0453dd5220b56ba4fe57f48f892af");

        assert!(KeySet::default().is_empty());
        assert!(!KeySet::default().is_valid(&token));
    }

    #[test]
    fn digest_covers_base64_text() {
        let token = parse("InRlc3Qi--3dd740af30f0453dd5220b56ba4fe57f48f892af");
        let over_decoded = digest(b"testkey", "\"test\"");

        assert_ne!(token.digest(), over_decoded);
    }

    #[test]
    fn uppercase_digest_fails() {
        let token = parse("InRlc3Qi--3DD740AF30F0453DD5220B56BA4FE57F48F892AF");
        assert!(!KeySet::new(["testkey"]).is_valid(&token));
    }

    #[test]
    fn debug_hides_keys() {
        let keys = KeySet::new(["testkey", "othertestkey"]);
        let printed = format!("{:?}", keys);

        assert_eq!(printed, "KeySet { len: 2 }");
        assert!(!printed.contains("testkey"));
    }

    proptest! {
        #[test]
        fn signed_tokens_verify(key in "[ -~]{1,64}", payload in proptest::collection::vec(any::<u8>(), 0..128)) {
            let token = parse(&sign(&key, &payload));

            prop_assert_eq!(token.decoded(), &payload[..]);
            prop_assert!(KeySet::new([key.as_str()]).is_valid(&token));
        }

        #[test]
        fn tampered_digest_fails(key in "[ -~]{1,64}", payload in proptest::collection::vec(any::<u8>(), 1..128), pos in 0usize..40, replacement in "[0-9a-f]") {
            let raw = sign(&key, &payload);
            let (message, mac) = raw.split_once("--").unwrap();

            let mut tampered: Vec<char> = mac.chars().collect();
            let replacement = replacement.chars().next().unwrap();
            prop_assume!(tampered[pos] != replacement);
            tampered[pos] = replacement;
            let tampered: String = tampered.into_iter().collect();

            let token = parse(&format!("{}--{}", message, tampered));
            prop_assert!(!KeySet::new([key.as_str()]).is_valid(&token));
        }
    }
}
