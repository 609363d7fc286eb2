use crate::{OsRandom, RandSource, Result, ValidationError};
use base64::{Engine, engine::general_purpose::URL_SAFE};
use core::{fmt, str::FromStr};

/// Length of a key, in bytes and in characters.
pub const KEY_SIZE: usize = 6;

/// Base64 output length for [`KEY_SIZE`] random bytes (no padding needed).
const ENCODED_SIZE: usize = KEY_SIZE / 3 * 4;

/// A short, URL-safe key.
///
/// A `Key` is exactly [`KEY_SIZE`] bytes from the alphabet `[A-Za-z0-9_-]`.
/// It is a plain value: two keys with the same bytes are the same key. The
/// only ways to obtain one are [`Key::generate`] and [`Key::parse`], so every
/// `Key` in circulation satisfies both invariants.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key([u8; KEY_SIZE]);

impl Key {
    /// Generates a fresh key from the operating system CSPRNG.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RandomSource`](crate::Error::RandomSource) if the OS random source is
    /// unavailable. This is not expected to happen on a healthy host.
    ///
    /// # Example
    ///
    /// ```
    /// use keygen::Key;
    ///
    /// let key = Key::generate().unwrap();
    /// assert!(Key::parse(key.as_bytes()).is_ok());
    /// ```
    pub fn generate() -> Result<Self> {
        Self::generate_with(&OsRandom)
    }

    /// Generates a key from the given random source.
    ///
    /// [`KEY_SIZE`] random bytes are base64-encoded with the URL-safe alphabet
    /// and the first [`KEY_SIZE`] characters of the encoding become the key.
    #[cfg_attr(feature = "tracing", tracing::instrument(level = "trace", skip_all))]
    pub fn generate_with<R: RandSource + ?Sized>(rng: &R) -> Result<Self> {
        let mut raw = [0_u8; KEY_SIZE];
        rng.try_fill(&mut raw)?;

        let mut encoded = [0_u8; ENCODED_SIZE];
        URL_SAFE.encode_slice(raw, &mut encoded)?;

        Ok(Self::parse(&encoded[..KEY_SIZE])?)
    }

    /// Validates `raw` and builds a key from it.
    ///
    /// The size and charset checks both run, so the error lists every
    /// problem with the input rather than only the first.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] with one or more violations.
    ///
    /// # Example
    ///
    /// ```
    /// use keygen::Key;
    ///
    /// assert_eq!(Key::parse(b"abc123").unwrap().as_str(), "abc123");
    ///
    /// let err = Key::parse(b"abcd12@4").unwrap_err();
    /// assert!(err.has("size"));
    /// assert!(err.has("charset"));
    /// ```
    pub fn parse(raw: &[u8]) -> Result<Self, ValidationError> {
        if let Some(err) = ValidationError::check("key", raw) {
            return Err(err);
        }

        let mut bytes = [0_u8; KEY_SIZE];
        bytes.copy_from_slice(raw);
        Ok(Self(bytes))
    }

    pub const fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }

    pub fn as_str(&self) -> &str {
        // SAFETY: a `Key` is only built after validation, and the URL-safe
        // alphabet is pure ASCII.
        unsafe { core::str::from_utf8_unchecked(&self.0) }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Key").field(&self.as_str()).finish()
    }
}

impl AsRef<[u8]> for Key {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<Key> for Vec<u8> {
    fn from(key: Key) -> Self {
        key.0.to_vec()
    }
}

impl TryFrom<&[u8]> for Key {
    type Error = ValidationError;

    fn try_from(raw: &[u8]) -> Result<Self, Self::Error> {
        Self::parse(raw)
    }
}

impl FromStr for Key {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use std::collections::HashSet;

    struct FixedRand([u8; KEY_SIZE]);

    impl RandSource for FixedRand {
        fn try_fill(&self, dest: &mut [u8]) -> Result<()> {
            dest.copy_from_slice(&self.0[..dest.len()]);
            Ok(())
        }
    }

    struct BrokenRand;

    impl RandSource for BrokenRand {
        fn try_fill(&self, _dest: &mut [u8]) -> Result<()> {
            Err(Error::RandomSource {
                reason: "entropy pool closed".to_string(),
            })
        }
    }

    #[test]
    fn parse_round_trips_bytes() {
        for raw in ["abc123", "testk1", "A-z_09", "______", "------"] {
            let key = Key::parse(raw.as_bytes()).unwrap();
            assert_eq!(key.as_bytes(), raw.as_bytes());
            assert_eq!(key.as_str(), raw);
            assert_eq!(key.to_string(), raw);
            assert_eq!(raw.parse::<Key>().unwrap(), key);
        }
    }

    #[test]
    fn generated_keys_are_valid() {
        for _ in 0..1_000 {
            let key = Key::generate().unwrap();
            assert!(Key::parse(key.as_bytes()).is_ok(), "{key:?}");
        }
    }

    #[test]
    fn generated_keys_do_not_repeat_in_practice() {
        let keys: HashSet<Key> = (0..1_000).map(|_| Key::generate().unwrap()).collect();
        assert_eq!(keys.len(), 1_000);
    }

    #[test]
    fn generation_uses_url_safe_base64_prefix() {
        // 0xfb 0xff 0xbf encodes to "-_-_" under the URL-safe alphabet, where
        // standard base64 would produce "+/+/".
        let key = Key::generate_with(&FixedRand([0xfb, 0xff, 0xbf, 0xfb, 0xff, 0xbf])).unwrap();
        assert_eq!(key.as_str(), "-_-_-_");

        let key = Key::generate_with(&FixedRand([0; KEY_SIZE])).unwrap();
        assert_eq!(key.as_str(), "AAAAAA");
    }

    #[test]
    fn generation_fails_only_when_random_source_fails() {
        let err = Key::generate_with(&BrokenRand).unwrap_err();
        assert!(matches!(err, Error::RandomSource { .. }));
        assert!(err.to_string().contains("entropy pool closed"));
    }

    #[test]
    fn conversions_agree_with_parse() {
        let raw: &[u8] = b"xyz789";
        let key = Key::try_from(raw).unwrap();
        assert_eq!(key.as_ref(), raw);
        assert_eq!(Vec::from(key), raw.to_vec());
        assert!(Key::try_from(&b"nope"[..]).is_err());
    }

    #[test]
    fn debug_shows_text() {
        let key = Key::parse(b"abc123").unwrap();
        assert_eq!(format!("{key:?}"), "Key(\"abc123\")");
    }
}
