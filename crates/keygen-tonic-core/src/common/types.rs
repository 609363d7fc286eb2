//! Conversions between wire messages and [`Key`].
//!
//! Keys travel as raw `bytes` on the wire. Anything coming from a caller goes
//! through [`Key::parse`], so a handler never sees an unvalidated key.

use crate::proto::{KeyRequest, KeyResponse};
use keygen::{Key, ValidationError};

impl From<Key> for KeyResponse {
    fn from(key: Key) -> Self {
        Self { key: key.into() }
    }
}

impl From<Key> for KeyRequest {
    fn from(key: Key) -> Self {
        Self { key: key.into() }
    }
}

impl TryFrom<KeyRequest> for Key {
    type Error = ValidationError;

    fn try_from(req: KeyRequest) -> Result<Self, Self::Error> {
        Self::parse(&req.key)
    }
}

impl TryFrom<KeyResponse> for Key {
    type Error = ValidationError;

    fn try_from(res: KeyResponse) -> Result<Self, Self::Error> {
        Self::parse(&res.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_key_is_validated() {
        let req = KeyRequest {
            key: b"testk1".to_vec(),
        };
        assert_eq!(Key::try_from(req).unwrap().as_str(), "testk1");

        let err = Key::try_from(KeyRequest { key: b"ab1/".to_vec() }).unwrap_err();
        assert!(err.has("size"));
        assert!(err.has("charset"));
    }

    #[test]
    fn response_carries_raw_bytes() {
        let key = Key::parse(b"A-z_09").unwrap();
        assert_eq!(KeyResponse::from(key).key, b"A-z_09".to_vec());
        assert_eq!(KeyRequest::from(key).key, b"A-z_09".to_vec());
    }
}
