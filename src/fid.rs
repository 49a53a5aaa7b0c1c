//! Fragment identifiers
//!
//! A [`Fid`] is the content-derived identity of one immutable fragment in
//! durable storage: the SHA-256 digest of the fragment's canonical JSON
//! encoding. Two fragments with identical content share a FID, which is
//! what makes persistence idempotent.
//!
//! The canonical string form (hex, lower case) doubles as the storage key
//! the fragment lives under.

use crate::error::{Error, Result};
use sha2::Digest;
use std::fmt;
use std::str::FromStr;

/// Content-derived identifier for an immutable fragment
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fid([u8; 32]);

impl Fid {
    /// Compute the FID of a fragment's encoded bytes
    pub fn from_content(bytes: &[u8]) -> Self {
        let mut hasher = sha2::Sha256::new();
        hasher.update(bytes);
        Fid(hasher.finalize().into())
    }

    /// Raw digest bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// The storage key this fragment lives under
    pub fn storage_key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Fid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for Fid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fid({})", self)
    }
}

impl FromStr for Fid {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let bytes = hex::decode(s)
            .map_err(|e| Error::store_inconsistent(format!("malformed fragment id {s:?}: {e}")))?;
        let digest: [u8; 32] = bytes.try_into().map_err(|_| {
            Error::store_inconsistent(format!("fragment id {s:?} is not a 32-byte digest"))
        })?;
        Ok(Fid(digest))
    }
}

impl serde::Serialize for Fid {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> serde::Deserialize<'de> for Fid {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = <String as serde::Deserialize>::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deterministic() {
        let a = Fid::from_content(b"hello");
        let b = Fid::from_content(b"hello");
        let c = Fid::from_content(b"world");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_string_round_trip() {
        let fid = Fid::from_content(b"some fragment");
        let s = fid.to_string();
        assert_eq!(s.len(), 64);
        let parsed: Fid = s.parse().unwrap();
        assert_eq!(fid, parsed);
    }

    #[test]
    fn test_malformed_rejected() {
        assert!("not-hex".parse::<Fid>().is_err());
        assert!("abcd".parse::<Fid>().is_err()); // too short
    }

    #[test]
    fn test_serde_as_string() {
        let fid = Fid::from_content(b"x");
        let json = serde_json::to_string(&fid).unwrap();
        assert_eq!(json, format!("\"{fid}\""));
        let back: Fid = serde_json::from_str(&json).unwrap();
        assert_eq!(fid, back);
    }
}
