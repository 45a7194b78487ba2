//! Session identifiers

use std::fmt;
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Length of every session id
pub const SESSION_ID_LEN: usize = 8;

const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Short, typeable session name: 8 ASCII letters
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionId(String);

impl SessionId {
    /// A fresh id with each letter drawn uniformly from `[A-Za-z]`
    ///
    /// Uniqueness is not checked here; the session store retries on collision.
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let id: String = (0..SESSION_ID_LEN)
            .map(|_| char::from(ALPHABET[rng.gen_range(0..ALPHABET.len())]))
            .collect();
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn is_valid(s: &str) -> bool {
        s.len() == SESSION_ID_LEN && s.bytes().all(|b| b.is_ascii_alphabetic())
    }
}

impl FromStr for SessionId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if Self::is_valid(s) {
            Ok(Self(s.to_string()))
        } else {
            Err(Error::InvalidSessionId(s.to_string()))
        }
    }
}

impl TryFrom<String> for SessionId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<SessionId> for String {
    fn from(id: SessionId) -> Self {
        id.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SessionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_eight_letters() {
        for _ in 0..1000 {
            let id = SessionId::generate();
            assert_eq!(id.as_str().len(), SESSION_ID_LEN);
            assert!(id.as_str().bytes().all(|b| b.is_ascii_alphabetic()), "{id}");
        }
    }

    #[test]
    fn test_generated_ids_use_both_cases() {
        let all: String = (0..200).map(|_| SessionId::generate().0).collect();
        assert!(all.bytes().any(|b| b.is_ascii_uppercase()));
        assert!(all.bytes().any(|b| b.is_ascii_lowercase()));
    }

    #[test]
    fn test_parse_valid_id() {
        let id: SessionId = "AbCdEfGh".parse().unwrap();
        assert_eq!(id.to_string(), "AbCdEfGh");
        let id: SessionId = "  qwertyui\n".parse().unwrap();
        assert_eq!(id.as_str(), "qwertyui");
    }

    #[test]
    fn test_parse_rejects_malformed_ids() {
        for bad in ["", "short", "toolongid", "abc12345", "../../et", "abcd efg"] {
            assert!(
                matches!(bad.parse::<SessionId>(), Err(Error::InvalidSessionId(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_serde_validates() {
        let id: SessionId = serde_json::from_str("\"ZzYyXxWw\"").unwrap();
        assert_eq!(id.as_str(), "ZzYyXxWw");
        assert!(serde_json::from_str::<SessionId>("\"nope\"").is_err());
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"ZzYyXxWw\"");
    }
}
