use crate::Key;
use core::fmt;
use serde::{
    Deserialize, Deserializer, Serialize, Serializer,
    de::{self, Visitor},
};

/// Serializes as the 6-character string.
impl Serialize for Key {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        s.serialize_str(self.as_str())
    }
}

/// Deserializes from a string or byte sequence, running the same validation
/// as [`Key::parse`].
impl<'de> Deserialize<'de> for Key {
    fn deserialize<D>(d: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct KeyVisitor;

        impl Visitor<'_> for KeyVisitor {
            type Value = Key;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a 6-character URL-safe key")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Key, E> {
                Key::parse(v.as_bytes()).map_err(E::custom)
            }

            fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<Key, E> {
                Key::parse(v).map_err(E::custom)
            }
        }

        d.deserialize_str(KeyVisitor)
    }
}
